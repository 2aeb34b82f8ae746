use crate::render::light_rig::RigLayout;
use crate::render::uniforms::UniformStrategy;
use crate::scene::{LightPolicy, MaterialParams};
use clap::Parser;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Default)]
#[command(name = "lightrig")]
#[command(about = "Textured model viewer with an interactive directional light rig")]
pub struct Cli {
    /// JSON configuration file; missing fields use defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Rotate the light by this many degrees every frame
    #[arg(long, value_name = "DEG_PER_FRAME", allow_negative_numbers = true)]
    pub autonomous: Option<f32>,

    /// Use the wide light placement instead of the close-up one
    #[arg(long)]
    pub classic_rig: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub light: LightConfig,
    pub material: MaterialParams,
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub uniforms: UniformStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Light Rig".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Relative asset paths resolve against this directory.
    pub root: PathBuf,
    pub mesh: String,
    pub diffuse: String,
    pub ambient_occlusion: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            mesh: "data/ogre/ogre_smile_tangent.gltf".to_string(),
            diffuse: "data/ogre/diffuse.png".to_string(),
            ambient_occlusion: "data/ogre/ao_smile.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub color: [f32; 3],
    pub pivot: [f32; 3],
    /// Light position relative to the pivot.
    pub position: [f32; 3],
    pub gizmo_target: [f32; 3],
    pub gizmo_radius: f32,
    pub gizmo_height: f32,
    pub angle_deg: f32,
    pub intensity: f32,
    pub policy: LightPolicy,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self::from_layout(&RigLayout::default())
    }
}

impl LightConfig {
    pub fn from_layout(layout: &RigLayout) -> Self {
        Self {
            color: layout.color,
            pivot: layout.pivot.to_array(),
            position: layout.light_offset.to_array(),
            gizmo_target: layout.gizmo_target.to_array(),
            gizmo_radius: layout.gizmo_radius,
            gizmo_height: layout.gizmo_height,
            angle_deg: 0.0,
            intensity: 1.0,
            policy: LightPolicy::UserDriven,
        }
    }

    /// Replaces the placement, keeping angle, intensity and policy.
    pub fn set_layout(&mut self, layout: &RigLayout) {
        *self = Self {
            angle_deg: self.angle_deg,
            intensity: self.intensity,
            policy: self.policy,
            ..Self::from_layout(layout)
        };
    }

    pub fn layout(&self) -> RigLayout {
        RigLayout {
            color: self.color,
            pivot: Vec3::from_array(self.pivot),
            light_offset: Vec3::from_array(self.position),
            gizmo_target: Vec3::from_array(self.gizmo_target),
            gizmo_radius: self.gizmo_radius,
            gizmo_height: self.gizmo_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 48.0,
            near: 0.1,
            far: 1000.0,
            distance: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub directory: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Loads the file named on the command line, then applies flag overrides.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if cli.classic_rig {
            config.light.set_layout(&RigLayout::classic());
        }
        if let Some(degrees_per_frame) = cli.autonomous {
            config.light.policy = LightPolicy::Autonomous { degrees_per_frame };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "material": { "alpha": 20.0 }, "uniforms": "rebuild", "window": { "width": 800 } }"#,
        )
        .unwrap();
        assert_eq!(config.material.alpha, 20.0);
        assert_eq!(config.material.specular, 1.0);
        assert_eq!(config.uniforms, UniformStrategy::Rebuild);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.camera.fov_deg, 48.0);
    }

    #[test]
    fn defaults_match_reference_scene() {
        let config = AppConfig::default();
        assert_eq!(config.light.color, [1.0, 0.0, 0.0]);
        assert_eq!(config.light.intensity, 1.0);
        assert_eq!(config.uniforms, UniformStrategy::Patch);
        assert_eq!(config.light.layout(), RigLayout::default());
        assert_eq!(config.assets.diffuse, "data/ogre/diffuse.png");
    }

    #[test]
    fn cli_flag_selects_autonomous_policy() {
        let cli = Cli::parse_from(["lightrig", "--autonomous", "-0.5"]);
        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(
            config.light.policy,
            LightPolicy::Autonomous {
                degrees_per_frame: -0.5
            }
        );
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let err = AppConfig::load(Path::new("no/such/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn classic_rig_flag_replaces_placement_only() {
        let cli = Cli::parse_from(["lightrig", "--classic-rig", "--autonomous", "1.0"]);
        let config = AppConfig::from_cli(&cli).unwrap();
        assert_eq!(config.light.layout(), RigLayout::classic());
        assert_eq!(config.light.pivot, [-8.0, -8.0, -4.0]);
        assert_eq!(config.light.position, [10.0, 10.0, 10.0]);
        assert_eq!(config.light.intensity, 1.0);
        assert_eq!(
            config.light.policy,
            LightPolicy::Autonomous {
                degrees_per_frame: 1.0
            }
        );
    }

    #[test]
    fn shipped_classic_config_matches_preset() {
        let config =
            AppConfig::from_json(include_str!("../configs/classic-rig.json")).unwrap();
        assert_eq!(config.light.layout(), RigLayout::classic());
        assert_eq!(config.light.angle_deg, 0.0);
        assert_eq!(config.camera, CameraConfig::default());
    }
}
