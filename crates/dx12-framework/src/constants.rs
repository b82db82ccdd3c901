use bevy_math::Mat4;
use bevy_math::Vec3;
use bevy_math::Vec4;
use bytemuck::Pod;
use bytemuck::Zeroable;

use crate::upload::align_constant_buffer_size;

/// Material and light parameters shared by the lit demos.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub light_dir: Vec3,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub shininess: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            light_dir: Vec3::new(0.5, -1.0, -0.3),
            diffuse: Vec4::new(0.0, 0.8, 0.2, 1.0),
            specular: Vec4::ONE,
            shininess: 16.0,
        }
    }
}

/// Contents of the `b0` constant buffer. Matrices are column-major, matching
/// the default HLSL packing so the shader can use `mul(matrix, vector)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world_view_proj: [f32; 16],
    pub world: [f32; 16],
    pub eye_pos: [f32; 3],
    pub _pad0: f32,
    pub light_dir: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
    pub _pad1: [f32; 3],
}

/// Bytes to allocate for one [`ObjectConstants`] buffer.
pub const OBJECT_CONSTANTS_BUFFER_SIZE: u64 =
    align_constant_buffer_size(size_of::<ObjectConstants>() as u64);

impl ObjectConstants {
    pub fn new(world: Mat4, view: Mat4, proj: Mat4, eye: Vec3, lighting: &Lighting) -> Self {
        Self {
            world_view_proj: (proj * view * world).to_cols_array(),
            world: world.to_cols_array(),
            eye_pos: eye.to_array(),
            _pad0: 0.0,
            light_dir: lighting.light_dir.extend(0.0).to_array(),
            diffuse: lighting.diffuse.to_array(),
            specular: lighting.specular.to_array(),
            shininess: lighting.shininess,
            _pad1: [0.0; 3],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
