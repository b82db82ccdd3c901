pub mod camera;
pub mod clear_color;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod obj;
pub mod resource_state;
pub mod scene;
pub mod stats;
pub mod sync;
pub mod timer;
pub mod upload;

#[cfg(windows)]
pub mod d3d12;
