use glam::Vec3;

/// Interleaved vertex layout shared by every scene pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Axis-aligned bounds as (center, half extent).
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = Vec3::from_array(self.vertices.first()?.position);
        let (min, max) = self.vertices.iter().fold((first, first), |(min, max), vertex| {
            let p = Vec3::from_array(vertex.position);
            (min.min(p), max.max(p))
        });
        Some(((min + max) * 0.5, (max - min) * 0.5))
    }
}

/// Closed cone with its base ring on z = 0 and the apex at z = `height`,
/// so the mesh points along +Z.
pub fn cone_mesh(base_radius: f32, height: f32, segments: usize) -> MeshData {
    let n = segments.max(8);
    let mut vertices = Vec::with_capacity(n * 2 + 2);
    let mut indices = Vec::with_capacity(n * 6);

    let slope = base_radius / height.max(1e-6);
    let apex = vertices.len() as u32;
    vertices.push(MeshVertex {
        position: [0.0, 0.0, height],
        normal: [0.0, 0.0, 1.0],
        uv: [0.5, 0.0],
    });
    let side_start = vertices.len() as u32;
    for i in 0..n {
        let t = (i as f32 / n as f32) * std::f32::consts::TAU;
        let (sin, cos) = t.sin_cos();
        let normal = Vec3::new(cos, sin, slope).normalize();
        vertices.push(MeshVertex {
            position: [base_radius * cos, base_radius * sin, 0.0],
            normal: normal.to_array(),
            uv: [i as f32 / n as f32, 1.0],
        });
    }

    let base_center = vertices.len() as u32;
    vertices.push(MeshVertex {
        position: [0.0, 0.0, 0.0],
        normal: [0.0, 0.0, -1.0],
        uv: [0.5, 0.5],
    });
    let base_start = vertices.len() as u32;
    for i in 0..n {
        let t = (i as f32 / n as f32) * std::f32::consts::TAU;
        let (sin, cos) = t.sin_cos();
        vertices.push(MeshVertex {
            position: [base_radius * cos, base_radius * sin, 0.0],
            normal: [0.0, 0.0, -1.0],
            uv: [0.5 + cos * 0.5, 0.5 + sin * 0.5],
        });
    }

    for i in 0..n as u32 {
        let next = (i + 1) % n as u32;
        indices.extend_from_slice(&[apex, side_start + i, side_start + next]);
        indices.extend_from_slice(&[base_center, base_start + next, base_start + i]);
    }

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::cone_mesh;
    use glam::Vec3;

    #[test]
    fn cone_points_along_positive_z() {
        let cone = cone_mesh(1.0, 2.0, 32);
        let (center, extent) = cone.bounds().unwrap();
        assert!((center - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
        assert!((extent - Vec3::new(1.0, 1.0, 1.0)).length() < 1e-4);
        assert_eq!(cone.indices.len(), 32 * 6);
        assert!(cone
            .indices
            .iter()
            .all(|index| (*index as usize) < cone.vertices.len()));
    }

    #[test]
    fn cone_clamps_segment_count() {
        let cone = cone_mesh(0.5, 1.0, 3);
        assert_eq!(cone.indices.len(), 8 * 6);
    }
}
