use crate::assets::GeometryId;
use glam::{EulerRot, Mat4, Quat, Vec3};

/// Stable index of a node inside a [`SceneGraph`]. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Local transform of a node. Rotation is Euler XYZ in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            translation,
            rotation: Vec3::new(x, y, z),
            scale,
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    pub fn set_quat(&mut self, rotation: Quat) {
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        self.rotation = Vec3::new(x, y, z);
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.translation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Unlit flat colour. Used for helpers and for meshes awaiting their shading material.
    Basic { color: [f32; 3], opacity: f32 },
    /// Lit by the shared uniform block.
    Shading,
}

impl Material {
    pub fn is_translucent(&self) -> bool {
        matches!(self, Material::Basic { opacity, .. } if *opacity < 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    DirectionalLight { color: [f32; 3], intensity: f32 },
    Mesh { geometry: GeometryId, material: Material },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub node: NodeId,
    pub geometry: GeometryId,
    pub material: Material,
    pub world: Mat4,
}

#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        transform: Transform,
        parent: Option<NodeId>,
    ) -> NodeId {
        let parent = parent.filter(|id| self.contains(*id));
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            name: name.into(),
            kind,
            transform,
            visible: true,
            parent,
        }));
        id
    }

    #[cfg(test)]
    /// Removes `id` and every node below it. Returns the number of nodes removed.
    pub fn remove(&mut self, id: NodeId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        let children: Vec<NodeId> = self.children(id).collect();
        let mut removed = 0;
        for child in children {
            removed += self.remove(child);
        }
        self.nodes[id.index()] = None;
        removed + 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|node| node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|node| node.as_mut())
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    #[cfg(test)]
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(move |(_, node)| node.parent == Some(id))
            .map(|(child, _)| child)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.as_ref().map(|node| (NodeId(index as u32), node)))
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let node = self.get(id)?;
        let local = node.transform.matrix();
        match node.parent.and_then(|parent| self.world_matrix(parent)) {
            Some(parent) => Some(parent * local),
            None => Some(local),
        }
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|matrix| matrix.transform_point3(Vec3::ZERO))
    }

    /// Whether the node and all of its ancestors are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.get(current) else {
                return false;
            };
            if !node.visible {
                return false;
            }
            cursor = node.parent;
        }
        true
    }

    /// Visible meshes in draw order: opaque first, translucent last.
    pub fn draw_list(&self) -> Vec<DrawItem> {
        let mut items: Vec<DrawItem> = self
            .iter()
            .filter_map(|(id, node)| match node.kind {
                NodeKind::Mesh { geometry, material } if self.is_visible(id) => {
                    Some(DrawItem {
                        node: id,
                        geometry,
                        material,
                        world: self.world_matrix(id)?,
                    })
                }
                _ => None,
            })
            .collect();
        items.sort_by_key(|item| item.material.is_translucent());
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(id: u32) -> NodeKind {
        NodeKind::Mesh {
            geometry: GeometryId::from_raw(id),
            material: Material::Basic {
                color: [1.0, 1.0, 1.0],
                opacity: 1.0,
            },
        }
    }

    #[test]
    fn world_matrix_composes_parent_rotation() {
        let mut graph = SceneGraph::new();
        let mut pivot_transform = Transform::default();
        pivot_transform.rotation.y = std::f32::consts::FRAC_PI_2;
        let pivot = graph.add("pivot", NodeKind::Group, pivot_transform, None);
        let child = graph.add(
            "child",
            NodeKind::Group,
            Transform::from_translation(Vec3::X),
            Some(pivot),
        );
        let position = graph.world_position(child).unwrap();
        assert!((position - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn remove_is_recursive() {
        let mut graph = SceneGraph::new();
        let root = graph.add("root", NodeKind::Group, Transform::default(), None);
        let child = graph.add("child", NodeKind::Group, Transform::default(), Some(root));
        graph.add("leaf", mesh(0), Transform::default(), Some(child));
        let other = graph.add("other", NodeKind::Group, Transform::default(), None);

        assert_eq!(graph.remove(root), 3);
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(other));
        assert!(!graph.contains(child));
        assert_eq!(graph.remove(root), 0);
    }

    #[test]
    fn draw_list_puts_translucent_meshes_last_and_skips_hidden() {
        let mut graph = SceneGraph::new();
        let cone = graph.add(
            "cone",
            NodeKind::Mesh {
                geometry: GeometryId::from_raw(1),
                material: Material::Basic {
                    color: [1.0, 1.0, 0.0],
                    opacity: 0.5,
                },
            },
            Transform::default(),
            None,
        );
        let body = graph.add("body", mesh(2), Transform::default(), None);
        let hidden = graph.add("hidden", mesh(3), Transform::default(), None);
        graph.get_mut(hidden).unwrap().visible = false;

        let order: Vec<NodeId> = graph.draw_list().iter().map(|item| item.node).collect();
        assert_eq!(order, vec![body, cone]);
    }

    #[test]
    fn transform_matrix_round_trips_through_euler() {
        let mut transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        transform.set_quat(Quat::from_rotation_arc(Vec3::Z, Vec3::new(1.0, 1.0, 0.0).normalize()));
        let rebuilt = Transform::from_matrix(transform.matrix());
        let probe = Vec3::new(0.3, -0.2, 0.9);
        assert!(
            (transform.matrix().transform_point3(probe) - rebuilt.matrix().transform_point3(probe))
                .length()
                < 1e-4
        );
    }
}
