pub mod geometry;
pub mod graph;

pub use geometry::{cone_mesh, MeshData, MeshVertex};
pub use graph::{DrawItem, Material, NodeId, NodeKind, SceneGraph, Transform};

/// User-adjustable light parameters. Written by panel handlers or the
/// autonomous policy, read once per frame by the render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub color: [f32; 3],
    pub angle_deg: f32,
    pub intensity: f32,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            color: [1.0, 0.0, 0.0],
            angle_deg: 0.0,
            intensity: 1.0,
        }
    }
}

pub const ANGLE_RANGE_DEG: (f32, f32) = (-180.0, 180.0);
pub const INTENSITY_RANGE: (f32, f32) = (0.0, 2.0);
pub const ALPHA_RANGE: (f32, f32) = (1.0, 200.0);
pub const SPECULAR_RANGE: (f32, f32) = (0.0, 1.0);

/// Material scalars forwarded to the shading stage.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaterialParams {
    pub alpha: f32,
    pub specular: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            alpha: 100.0,
            specular: 1.0,
        }
    }
}

/// How the light angle evolves between panel edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightPolicy {
    #[default]
    UserDriven,
    Autonomous { degrees_per_frame: f32 },
}

impl LightPolicy {
    /// Per-frame update applied before the rig is synchronised.
    pub fn advance(&self, state: &mut LightState) {
        if let LightPolicy::Autonomous { degrees_per_frame } = *self {
            state.angle_deg = wrap_degrees(state.angle_deg + degrees_per_frame);
        }
    }
}

/// Wraps an angle into [-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    if !angle.is_finite() || (ANGLE_RANGE_DEG.0..=ANGLE_RANGE_DEG.1).contains(&angle) {
        return angle;
    }
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::{wrap_degrees, LightPolicy, LightState};

    #[test]
    fn user_driven_policy_leaves_state_alone() {
        let mut state = LightState {
            angle_deg: 42.0,
            ..LightState::default()
        };
        LightPolicy::UserDriven.advance(&mut state);
        assert_eq!(state.angle_deg, 42.0);
    }

    #[test]
    fn autonomous_policy_increments_and_wraps() {
        let policy = LightPolicy::Autonomous {
            degrees_per_frame: 1.5,
        };
        let mut state = LightState {
            angle_deg: 179.0,
            ..LightState::default()
        };
        policy.advance(&mut state);
        assert!((state.angle_deg - -179.5).abs() < 1e-4);
        for _ in 0..1000 {
            policy.advance(&mut state);
            assert!((-180.0..=180.0).contains(&state.angle_deg));
        }
    }

    #[test]
    fn wrap_keeps_in_range_values_exact() {
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), -180.0);
        assert_eq!(wrap_degrees(90.0), 90.0);
        assert!((wrap_degrees(270.0) - -90.0).abs() < 1e-4);
    }

    #[test]
    fn policy_deserializes_from_config_json() {
        let policy: LightPolicy =
            serde_json::from_str(r#"{"autonomous":{"degrees_per_frame":0.5}}"#).unwrap();
        assert_eq!(
            policy,
            LightPolicy::Autonomous {
                degrees_per_frame: 0.5
            }
        );
        let policy: LightPolicy = serde_json::from_str(r#""user_driven""#).unwrap();
        assert_eq!(policy, LightPolicy::UserDriven);
    }
}
