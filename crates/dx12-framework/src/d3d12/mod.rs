//! Direct3D 12 backend. Every decision about ordering and resource state is
//! made by the platform-neutral types in the crate root; the modules here turn
//! those decisions into API calls.

pub mod app;
pub mod barrier;
pub mod buffers;
pub mod demo;
pub mod device;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod timeline;
pub mod window;
