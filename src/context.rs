//! The single owner of mutable render state.
//!
//! Created once at startup and passed by reference to the light rig, the
//! uniform manager, the capture path and the render loop. Everything here
//! runs on the event-loop thread; asset workers only ever talk to it through
//! [`AssetEvent`]s.

use crate::assets::{
    AssetEvent, GeometryStore, LoadTicket, MeshPrimitive, TextureSlot, TextureStore,
};
use crate::config::AppConfig;
use crate::render::camera::{OrbitCamera, Projection};
use crate::render::capture::CaptureRequest;
use crate::render::light_rig::LightRig;
use crate::render::uniforms::{TextureBindings, UniformBlock, UniformField, UniformStrategy};
use crate::scene::{
    LightPolicy, LightState, Material, MaterialParams, NodeId, NodeKind, SceneGraph, Transform,
};
use glam::Vec3;
use std::sync::Arc;

/// Flat colour for loaded meshes until the shading material is attached.
const UNSHADED: Material = Material::Basic {
    color: [0.8, 0.8, 0.8],
    opacity: 1.0,
};

pub struct RenderContext {
    lifetime: Arc<()>,
    pub scene: SceneGraph,
    pub rig: LightRig,
    pub light: LightState,
    pub material: MaterialParams,
    pub policy: LightPolicy,
    pub uniforms: UniformBlock,
    pub strategy: UniformStrategy,
    pub capture: CaptureRequest,
    pub camera: OrbitCamera,
    pub geometry: GeometryStore,
    pub textures: TextureStore,
    bindings: TextureBindings,
    loaded_meshes: Vec<NodeId>,
    shading_attached: bool,
}

impl RenderContext {
    pub fn new(config: &AppConfig) -> Self {
        let mut scene = SceneGraph::new();
        let mut geometry = GeometryStore::default();
        let layout = config.light.layout();
        let light = LightState {
            color: layout.color,
            angle_deg: config.light.angle_deg,
            intensity: config.light.intensity,
        };
        let mut rig = LightRig::new(&mut scene, &mut geometry, &layout, light.intensity);
        rig.set_orientation(light.angle_deg);
        rig.apply(&mut scene);

        let camera = OrbitCamera::new(
            config.camera.distance,
            Projection::new(config.camera.fov_deg, config.camera.near, config.camera.far),
        );

        let mut ctx = Self {
            lifetime: Arc::new(()),
            scene,
            rig,
            light,
            material: config.material,
            policy: config.light.policy,
            uniforms: UniformBlock::default(),
            strategy: config.uniforms,
            capture: CaptureRequest::default(),
            camera,
            geometry,
            textures: TextureStore::default(),
            bindings: TextureBindings::default(),
            loaded_meshes: Vec::new(),
            shading_attached: false,
        };
        ctx.refresh_uniforms();
        ctx
    }

    /// Token for asset loads issued on behalf of this context.
    pub fn ticket(&self) -> LoadTicket {
        LoadTicket::new(&self.lifetime)
    }

    pub fn on_angle_changed(&mut self, angle_deg: f32) {
        self.light.angle_deg = angle_deg;
    }

    pub fn on_intensity_changed(&mut self, intensity: f32) {
        self.light.intensity = intensity;
    }

    pub fn on_alpha_changed(&mut self, alpha: f32) {
        self.material.alpha = alpha;
    }

    pub fn on_specular_changed(&mut self, specular: f32) {
        self.material.specular = specular;
    }

    pub fn request_capture(&mut self) {
        self.capture.request();
    }

    /// Frame step 1: advance the policy and push the light state into the rig.
    pub fn apply_light_state(&mut self) {
        self.policy.advance(&mut self.light);
        self.rig.set_orientation(self.light.angle_deg);
        self.rig.set_intensity(self.light.intensity);
        self.rig.apply(&mut self.scene);
    }

    /// Frame step 2.
    pub fn refresh_uniforms(&mut self) {
        let light_position = self
            .rig
            .current_transform(&self.scene)
            .map(|transform| transform.position)
            .unwrap_or(Vec3::ZERO);
        self.uniforms.refresh(
            self.strategy,
            &self.light,
            light_position,
            &self.material,
            self.bindings,
        );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
    }

    #[cfg(test)]
    pub fn loaded_meshes(&self) -> &[NodeId] {
        &self.loaded_meshes
    }

    #[cfg(test)]
    pub fn shading_attached(&self) -> bool {
        self.shading_attached
    }

    /// Continuation for every asset load. A completion whose ticket belongs
    /// to another (or dropped) context changes nothing.
    pub fn complete_asset(&mut self, event: AssetEvent) {
        match event {
            AssetEvent::Mesh {
                ticket,
                path,
                result,
            } => {
                if !ticket.is_for(&self.lifetime) {
                    log::debug!("Dropping stale mesh completion for {}", path.display());
                    return;
                }
                match result {
                    Ok(primitives) => {
                        let count = primitives.len();
                        for primitive in primitives {
                            self.add_primitive(primitive);
                        }
                        log::info!(
                            "Loaded {} primitive(s) from {} ({} scene nodes)",
                            count,
                            path.display(),
                            self.scene.len()
                        );
                    }
                    Err(err) => log::error!("{}", err),
                }
            }
            AssetEvent::Texture {
                ticket,
                slot,
                path,
                result,
            } => {
                if !ticket.is_for(&self.lifetime) {
                    log::debug!("Dropping stale texture completion for {}", path.display());
                    return;
                }
                match result {
                    Ok(image) => {
                        log::info!(
                            "Loaded {:?} texture {} ({}x{})",
                            slot,
                            path.display(),
                            image.width,
                            image.height
                        );
                        let handle = self.textures.insert(image);
                        let field = match slot {
                            TextureSlot::Diffuse => {
                                self.bindings.diffuse.get_or_insert(handle);
                                UniformField::DiffuseTexture(handle)
                            }
                            TextureSlot::AmbientOcclusion => {
                                self.bindings.ao.get_or_insert(handle);
                                UniformField::AoTexture(handle)
                            }
                        };
                        self.uniforms.patch(field);
                    }
                    Err(err) => log::error!("{}", err),
                }
            }
        }
        self.attach_shading_if_ready();
    }

    fn add_primitive(&mut self, primitive: MeshPrimitive) {
        if let Some((center, extent)) = primitive.mesh.bounds() {
            log::debug!(
                "Mesh '{}': {} vertices, center {:.2?}, extent {:.2?}",
                primitive.name,
                primitive.mesh.vertices.len(),
                center,
                extent
            );
        }
        let geometry = self.geometry.insert(primitive.mesh);
        let id = self.scene.add(
            primitive.name,
            NodeKind::Mesh {
                geometry,
                material: UNSHADED,
            },
            Transform::from_matrix(primitive.transform),
            None,
        );
        self.loaded_meshes.push(id);
    }

    fn attach_shading_if_ready(&mut self) {
        if self.shading_attached || self.loaded_meshes.is_empty() || !self.uniforms.textures_ready()
        {
            return;
        }
        let mut attached = 0;
        for id in &self.loaded_meshes {
            let Some(node) = self.scene.get_mut(*id) else {
                log::debug!("Mesh node {:?} is gone; skipping material attach", id);
                continue;
            };
            if let NodeKind::Mesh { material, .. } = &mut node.kind {
                *material = Material::Shading;
                log::debug!("Shading material on '{}'", node.name);
                attached += 1;
            }
        }
        self.shading_attached = true;
        log::info!("Attached shading material to {} mesh node(s)", attached);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::tests::{two_row_png, TRIANGLE_GLTF};
    use crate::assets::{decode_texture, load_mesh_from_slice, TextureHandle, TextureOptions};
    use std::path::PathBuf;

    pub(crate) fn context() -> RenderContext {
        RenderContext::new(&AppConfig::default())
    }

    pub(crate) fn mesh_event(ticket: LoadTicket) -> AssetEvent {
        AssetEvent::Mesh {
            ticket,
            path: PathBuf::from("tri.gltf"),
            result: load_mesh_from_slice(TRIANGLE_GLTF.as_bytes()),
        }
    }

    pub(crate) fn texture_event(ticket: LoadTicket, slot: TextureSlot) -> AssetEvent {
        AssetEvent::Texture {
            ticket,
            slot,
            path: PathBuf::from("tex.png"),
            result: Ok(decode_texture(&two_row_png(), TextureOptions { flip_y: false }).unwrap()),
        }
    }

    fn material_of(ctx: &RenderContext, id: NodeId) -> Material {
        match ctx.scene.get(id).unwrap().kind {
            NodeKind::Mesh { material, .. } => material,
            _ => panic!("not a mesh"),
        }
    }

    #[test]
    fn shading_attaches_once_mesh_and_both_textures_arrive() {
        let mut ctx = context();
        let ticket = ctx.ticket();

        ctx.complete_asset(texture_event(ticket.clone(), TextureSlot::Diffuse));
        ctx.complete_asset(mesh_event(ticket.clone()));
        let mesh = ctx.loaded_meshes()[0];
        assert_eq!(ctx.scene.get(mesh).unwrap().name, "Tri#0");
        assert_eq!(material_of(&ctx, mesh), UNSHADED);
        assert!(!ctx.shading_attached());

        ctx.complete_asset(texture_event(ticket, TextureSlot::AmbientOcclusion));
        assert_eq!(material_of(&ctx, mesh), Material::Shading);
        assert!(ctx.uniforms.textures_ready());
        assert_eq!(ctx.uniforms.diffuse_texture, Some(TextureHandle::from_raw(0)));
        assert_eq!(ctx.uniforms.ao_texture, Some(TextureHandle::from_raw(1)));
    }

    #[test]
    fn completions_for_another_context_are_ignored() {
        let mut ctx = context();
        let other = context();
        let count = ctx.scene.len();
        ctx.complete_asset(mesh_event(other.ticket()));
        assert_eq!(ctx.scene.len(), count);

        let dropped = {
            let gone = context();
            gone.ticket()
        };
        ctx.complete_asset(texture_event(dropped, TextureSlot::Diffuse));
        assert_eq!(ctx.textures.len(), 0);
        assert_eq!(ctx.uniforms.diffuse_texture, None);
    }

    #[test]
    fn attach_skips_meshes_removed_before_textures_resolved() {
        let mut ctx = context();
        let ticket = ctx.ticket();
        ctx.complete_asset(mesh_event(ticket.clone()));
        let mesh = ctx.loaded_meshes()[0];
        ctx.scene.remove(mesh);
        ctx.complete_asset(texture_event(ticket.clone(), TextureSlot::Diffuse));
        ctx.complete_asset(texture_event(ticket, TextureSlot::AmbientOcclusion));
        assert!(ctx.shading_attached());
        assert!(!ctx.scene.contains(mesh));
    }

    #[test]
    fn failed_loads_leave_mesh_unshaded() {
        let mut ctx = context();
        let ticket = ctx.ticket();
        ctx.complete_asset(mesh_event(ticket.clone()));
        ctx.complete_asset(AssetEvent::Texture {
            ticket,
            slot: TextureSlot::Diffuse,
            path: PathBuf::from("missing.png"),
            result: Err(crate::assets::AssetError::NoPrimitives {
                path: "missing.png".to_string(),
            }),
        });
        let mesh = ctx.loaded_meshes()[0];
        assert_eq!(material_of(&ctx, mesh), UNSHADED);
    }

    #[test]
    fn handlers_forward_values_without_clamping() {
        let mut ctx = context();
        ctx.on_angle_changed(270.0);
        ctx.on_intensity_changed(5.0);
        ctx.on_alpha_changed(0.0);
        ctx.on_specular_changed(3.0);
        assert_eq!(ctx.light.angle_deg, 270.0);
        assert_eq!(ctx.light.intensity, 5.0);
        assert_eq!(ctx.material.alpha, 0.0);
        assert_eq!(ctx.material.specular, 3.0);
    }

    #[test]
    fn uniform_light_position_follows_rig() {
        let mut ctx = context();
        ctx.on_angle_changed(90.0);
        ctx.apply_light_state();
        ctx.refresh_uniforms();
        let expected = ctx.rig.current_transform(&ctx.scene).unwrap().position;
        assert_eq!(ctx.uniforms.light_position, expected);
    }
}
