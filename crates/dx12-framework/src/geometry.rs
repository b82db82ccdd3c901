use bevy_math::Vec3;
use bytemuck::Pod;
use bytemuck::Zeroable;

/// Position and normal, matching the `POSITION`/`NORMAL` input layout.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

/// CPU copy of a mesh, ready for upload. Triangles are clockwise when seen
/// from their front side (the Direct3D default).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Two triangles per quad: `0,1,2` and `0,2,3`.
    fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3]) {
        let base = self.vertices.len() as u32;
        self.vertices
            .extend(corners.map(|position| Vertex::new(position, normal)));
        self.indices
            .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    fn push_triangle(&mut self, corners: [[f32; 3]; 3]) {
        let [a, b, c] = corners.map(Vec3::from_array);
        let normal = (b - a).cross(c - a).normalize().to_array();
        let base = self.vertices.len() as u32;
        self.vertices
            .extend(corners.map(|position| Vertex::new(position, normal)));
        self.indices.extend([base, base + 1, base + 2]);
    }
}

/// 2x2x2 cube centred on the origin, one flat-shaded quad per face.
pub fn cube() -> MeshData {
    let mut mesh = MeshData::default();
    let faces: [([[f32; 3]; 4], [f32; 3]); 6] = [
        // -Z
        (
            [[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0]],
            [0.0, 0.0, -1.0],
        ),
        // +Z
        (
            [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
            [0.0, 0.0, 1.0],
        ),
        // -X
        (
            [[-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]],
            [-1.0, 0.0, 0.0],
        ),
        // +X
        (
            [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]],
            [1.0, 0.0, 0.0],
        ),
        // +Y
        (
            [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]],
            [0.0, 1.0, 0.0],
        ),
        // -Y
        (
            [[-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0]],
            [0.0, -1.0, 0.0],
        ),
    ];
    for (corners, normal) in faces {
        mesh.push_quad(corners, normal);
    }
    mesh
}

/// Square-based pyramid with its apex at `+Y`.
pub fn pyramid() -> MeshData {
    const APEX: [f32; 3] = [0.0, 1.0, 0.0];
    let base = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, -1.0, 1.0],
        [-1.0, -1.0, 1.0],
    ];
    let mut mesh = MeshData::default();
    for side in 0..4 {
        mesh.push_triangle([base[side], APEX, base[(side + 1) % 4]]);
    }
    mesh.push_quad(
        [base[3], base[0], base[1], base[2]],
        [0.0, -1.0, 0.0],
    );
    mesh
}
