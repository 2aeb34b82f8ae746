use crate::assets::TextureHandle;
use crate::scene::{LightState, MaterialParams};
use glam::Vec3;

/// CPU-side shading parameters for the lit material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBlock {
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    pub light_position: Vec3,
    pub alpha: f32,
    pub specular: f32,
    pub diffuse_texture: Option<TextureHandle>,
    pub ao_texture: Option<TextureHandle>,
}

impl Default for UniformBlock {
    fn default() -> Self {
        let light = LightState::default();
        let material = MaterialParams::default();
        Self {
            light_color: light.color,
            light_intensity: light.intensity,
            light_position: Vec3::ZERO,
            alpha: material.alpha,
            specular: material.specular,
            diffuse_texture: None,
            ao_texture: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformField {
    LightColor([f32; 3]),
    LightIntensity(f32),
    LightPosition(Vec3),
    Alpha(f32),
    Specular(f32),
    DiffuseTexture(TextureHandle),
    AoTexture(TextureHandle),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureBindings {
    pub diffuse: Option<TextureHandle>,
    pub ao: Option<TextureHandle>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformStrategy {
    /// Recreate the block from scratch every frame.
    Rebuild,
    /// Write only the fields whose values differ.
    #[default]
    Patch,
}

impl UniformBlock {
    pub fn rebuild(
        light: &LightState,
        light_position: Vec3,
        material: &MaterialParams,
        textures: TextureBindings,
    ) -> Self {
        Self {
            light_color: light.color,
            light_intensity: light.intensity,
            light_position,
            alpha: material.alpha,
            specular: material.specular,
            diffuse_texture: textures.diffuse,
            ao_texture: textures.ao,
        }
    }

    /// Writes one field in place. Returns true when the stored value changed.
    ///
    /// Texture handles are write-once: once set they are never replaced or cleared.
    pub fn patch(&mut self, field: UniformField) -> bool {
        match field {
            UniformField::LightColor(color) => replace(&mut self.light_color, color),
            UniformField::LightIntensity(value) => replace(&mut self.light_intensity, value),
            UniformField::LightPosition(position) => replace(&mut self.light_position, position),
            UniformField::Alpha(value) => replace(&mut self.alpha, value),
            UniformField::Specular(value) => replace(&mut self.specular, value),
            UniformField::DiffuseTexture(handle) => {
                set_once(&mut self.diffuse_texture, handle, "diffuse")
            }
            UniformField::AoTexture(handle) => set_once(&mut self.ao_texture, handle, "ao"),
        }
    }

    /// Brings the block up to date with the current frame inputs.
    pub fn refresh(
        &mut self,
        strategy: UniformStrategy,
        light: &LightState,
        light_position: Vec3,
        material: &MaterialParams,
        textures: TextureBindings,
    ) {
        match strategy {
            UniformStrategy::Rebuild => {
                // Handles already bound stay bound even if the caller lost track of them.
                let textures = TextureBindings {
                    diffuse: self.diffuse_texture.or(textures.diffuse),
                    ao: self.ao_texture.or(textures.ao),
                };
                *self = Self::rebuild(light, light_position, material, textures);
            }
            UniformStrategy::Patch => {
                self.patch(UniformField::LightColor(light.color));
                self.patch(UniformField::LightIntensity(light.intensity));
                self.patch(UniformField::LightPosition(light_position));
                self.patch(UniformField::Alpha(material.alpha));
                self.patch(UniformField::Specular(material.specular));
                if let Some(handle) = textures.diffuse {
                    self.patch(UniformField::DiffuseTexture(handle));
                }
                if let Some(handle) = textures.ao {
                    self.patch(UniformField::AoTexture(handle));
                }
            }
        }
    }

    pub fn textures_ready(&self) -> bool {
        self.diffuse_texture.is_some() && self.ao_texture.is_some()
    }

    pub fn gpu(&self) -> ShadingUniforms {
        ShadingUniforms {
            light_color: self.light_color,
            light_intensity: self.light_intensity,
            light_position: self.light_position.to_array(),
            alpha: self.alpha,
            specular: self.specular,
            _pad: [0.0; 3],
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn set_once(slot: &mut Option<TextureHandle>, handle: TextureHandle, name: &str) -> bool {
    match *slot {
        None => {
            *slot = Some(handle);
            true
        }
        Some(existing) if existing == handle => false,
        Some(existing) => {
            log::warn!(
                "Ignoring {} texture {:?}; {:?} is already bound",
                name,
                handle,
                existing
            );
            false
        }
    }
}

/// GPU mirror of [`UniformBlock`]. Matches `Shading` in `shaded.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadingUniforms {
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    pub light_position: [f32; 3],
    pub alpha: f32,
    pub specular: f32,
    pub _pad: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textures() -> TextureBindings {
        TextureBindings {
            diffuse: Some(TextureHandle::from_raw(0)),
            ao: Some(TextureHandle::from_raw(1)),
        }
    }

    #[test]
    fn rebuild_from_unchanged_inputs_is_equal() {
        let light = LightState::default();
        let material = MaterialParams::default();
        let position = Vec3::new(1.5, 1.0, 1.5);
        let first = UniformBlock::rebuild(&light, position, &material, textures());
        let second = UniformBlock::rebuild(&light, position, &material, textures());
        assert_eq!(first, second);
    }

    #[test]
    fn patch_and_rebuild_strategies_agree() {
        let light = LightState {
            angle_deg: 30.0,
            intensity: 0.25,
            ..LightState::default()
        };
        let material = MaterialParams {
            alpha: 12.0,
            specular: 0.4,
        };
        let position = Vec3::new(0.0, 2.0, -1.0);

        let mut patched = UniformBlock::default();
        patched.refresh(UniformStrategy::Patch, &light, position, &material, textures());
        let mut rebuilt = UniformBlock::default();
        rebuilt.refresh(UniformStrategy::Rebuild, &light, position, &material, textures());
        assert_eq!(patched, rebuilt);
    }

    #[test]
    fn texture_handles_are_set_once_and_never_cleared() {
        let mut block = UniformBlock::default();
        assert!(block.patch(UniformField::DiffuseTexture(TextureHandle::from_raw(3))));
        assert!(!block.patch(UniformField::DiffuseTexture(TextureHandle::from_raw(3))));
        assert!(!block.patch(UniformField::DiffuseTexture(TextureHandle::from_raw(9))));
        assert_eq!(block.diffuse_texture, Some(TextureHandle::from_raw(3)));

        block.refresh(
            UniformStrategy::Rebuild,
            &LightState::default(),
            Vec3::ZERO,
            &MaterialParams::default(),
            TextureBindings::default(),
        );
        assert_eq!(block.diffuse_texture, Some(TextureHandle::from_raw(3)));
    }

    #[test]
    fn scalars_are_forwarded_verbatim() {
        let mut block = UniformBlock::default();
        assert!(block.patch(UniformField::Alpha(500.0)));
        assert!(block.patch(UniformField::Specular(-2.0)));
        assert_eq!(block.alpha, 500.0);
        assert_eq!(block.specular, -2.0);
        assert!(!block.patch(UniformField::Alpha(500.0)));
    }

    #[test]
    fn gpu_layout_is_three_vec4s() {
        assert_eq!(std::mem::size_of::<ShadingUniforms>(), 48);
        let block = UniformBlock {
            light_intensity: 0.5,
            alpha: 7.0,
            ..UniformBlock::default()
        };
        let gpu = block.gpu();
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&gpu));
        assert_eq!(floats[3], 0.5);
        assert_eq!(floats[7], 7.0);
        assert_eq!(floats[8], 1.0);
    }
}
