use crate::assets::GeometryStore;
use crate::scene::{cone_mesh, Material, NodeId, NodeKind, SceneGraph, Transform};
use glam::{Quat, Vec3};

const GIZMO_COLOR: [f32; 3] = [1.0, 1.0, 0.0];
const GIZMO_OPACITY: f32 = 0.5;
const GIZMO_SEGMENTS: usize = 32;

/// Placement of the light, its pivot and the direction gizmo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigLayout {
    pub color: [f32; 3],
    /// World position of the pivot group.
    pub pivot: Vec3,
    /// Light position relative to the pivot.
    pub light_offset: Vec3,
    /// Point the gizmo aims at, in pivot space. Fixed at construction.
    pub gizmo_target: Vec3,
    pub gizmo_radius: f32,
    pub gizmo_height: f32,
}

impl Default for RigLayout {
    fn default() -> Self {
        Self {
            color: [1.0, 0.0, 0.0],
            pivot: Vec3::ZERO,
            light_offset: Vec3::new(1.5, 1.0, 1.5),
            gizmo_target: Vec3::ZERO,
            gizmo_radius: 0.1,
            gizmo_height: 0.2,
        }
    }
}

impl RigLayout {
    /// The wide placement: pivot pushed to (-8,-8,-4), light ten units out on
    /// every axis, and a full-size cone aimed further along the same diagonal.
    pub fn classic() -> Self {
        Self {
            pivot: Vec3::new(-8.0, -8.0, -4.0),
            light_offset: Vec3::splat(10.0),
            gizmo_target: Vec3::splat(15.0),
            gizmo_radius: 1.0,
            gizmo_height: 2.0,
            ..Self::default()
        }
    }
}

/// Light position and pivot yaw as currently held by the scene graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigTransform {
    pub position: Vec3,
    /// Pivot rotation about +Y, radians.
    pub rotation: f32,
}

/// A directional light and its cone gizmo sharing one rotating pivot.
pub struct LightRig {
    pivot: NodeId,
    light: NodeId,
    gizmo: NodeId,
    angle_deg: f32,
    intensity: f32,
}

impl LightRig {
    pub fn new(
        scene: &mut SceneGraph,
        geometry: &mut GeometryStore,
        layout: &RigLayout,
        intensity: f32,
    ) -> Self {
        let pivot = scene.add(
            "light-pivot",
            NodeKind::Group,
            Transform::from_translation(layout.pivot),
            None,
        );
        let light = scene.add(
            "directional-light",
            NodeKind::DirectionalLight {
                color: layout.color,
                intensity,
            },
            Transform::from_translation(layout.light_offset),
            Some(pivot),
        );

        let cone = geometry.insert(cone_mesh(
            layout.gizmo_radius,
            layout.gizmo_height,
            GIZMO_SEGMENTS,
        ));
        let mut cone_transform = Transform::from_translation(layout.light_offset);
        let aim = (layout.gizmo_target - layout.light_offset).normalize_or_zero();
        if aim != Vec3::ZERO {
            cone_transform.set_quat(Quat::from_rotation_arc(Vec3::Z, aim));
        }
        let gizmo = scene.add(
            "light-gizmo",
            NodeKind::Mesh {
                geometry: cone,
                material: Material::Basic {
                    color: GIZMO_COLOR,
                    opacity: GIZMO_OPACITY,
                },
            },
            cone_transform,
            Some(pivot),
        );

        Self {
            pivot,
            light,
            gizmo,
            angle_deg: 0.0,
            intensity,
        }
    }

    pub fn set_orientation(&mut self, angle_deg: f32) {
        self.angle_deg = angle_deg;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
    }

    #[cfg(test)]
    pub fn angle_deg(&self) -> f32 {
        self.angle_deg
    }

    #[cfg(test)]
    pub fn light(&self) -> NodeId {
        self.light
    }

    #[cfg(test)]
    pub fn gizmo(&self) -> NodeId {
        self.gizmo
    }

    /// Writes the stored angle and intensity into the scene graph. Only the
    /// pivot rotates; the gizmo keeps its construction-time local transform.
    pub fn apply(&self, scene: &mut SceneGraph) {
        if let Some(pivot) = scene.get_mut(self.pivot) {
            pivot.transform.rotation.y = self.angle_deg.to_radians();
        }
        if let Some(light) = scene.get_mut(self.light) {
            if let NodeKind::DirectionalLight { intensity, .. } = &mut light.kind {
                *intensity = self.intensity;
            }
        }
        if log::log_enabled!(log::Level::Trace) {
            if let Some(axis) = self.gizmo_direction(scene) {
                log::trace!("light at {:.1} deg, gizmo axis {:.3?}", self.angle_deg, axis);
            }
        }
    }

    pub fn current_transform(&self, scene: &SceneGraph) -> Option<RigTransform> {
        let rotation = scene.get(self.pivot)?.transform.rotation.y;
        let position = scene.world_position(self.light)?;
        Some(RigTransform { position, rotation })
    }

    /// World-space axis the cone currently points along.
    pub fn gizmo_direction(&self, scene: &SceneGraph) -> Option<Vec3> {
        let world = scene.world_matrix(self.gizmo)?;
        Some(world.transform_vector3(Vec3::Z).normalize())
    }

    #[cfg(test)]
    pub fn light_color(&self, scene: &SceneGraph) -> Option<[f32; 3]> {
        match scene.get(self.light)?.kind {
            NodeKind::DirectionalLight { color, .. } => Some(color),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn light_intensity(&self, scene: &SceneGraph) -> Option<f32> {
        match scene.get(self.light)?.kind {
            NodeKind::DirectionalLight { intensity, .. } => Some(intensity),
            _ => None,
        }
    }
}
