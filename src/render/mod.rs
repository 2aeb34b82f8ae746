pub mod camera;
pub mod capture;
mod egui_overlay;
pub mod frame_loop;
pub mod light_rig;
mod readback;
pub mod uniforms;

pub use camera::CameraMovement;
pub use capture::DirectorySink;
pub use frame_loop::{FrameBackend, RenderLoop};

use crate::assets::{GeometryId, TextureHandle};
use crate::context::RenderContext;
use crate::scene::{DrawItem, Material, NodeId};
use capture::{CaptureError, CapturedFrame, FrameSource};
use egui_overlay::EguiOverlay;
use glam::{Mat3, Mat4};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uniforms::ShadingUniforms;
use wgpu::util::DeviceExt;
use winit::window::Window;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const SHADED_SHADER: &str = include_str!("shaders/shaded.wgsl");
const UNLIT_SHADER: &str = include_str!("shaders/unlit.wgsl");
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.03,
    a: 1.0,
};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    SurfaceCreate(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create GPU device: {0}")]
    DeviceCreate(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    UnsupportedSurface,
    #[error("rendering surface lost")]
    SurfaceLost,
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("failed to acquire surface frame: {0}")]
    Surface(wgpu::SurfaceError),
}

impl RenderError {
    /// Context loss and exhausted memory end the render loop. Anything else
    /// costs one frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::Surface(_))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniforms {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    tint: [f32; 4],
}

impl ModelUniforms {
    fn new(model: Mat4, material: Material) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        let tint = match material {
            Material::Basic { color, opacity } => [color[0], color[1], color[2], opacity],
            Material::Shading => [1.0; 4],
        };
        Self {
            model: model.to_cols_array_2d(),
            normal: [
                normal.x_axis.extend(0.0).to_array(),
                normal.y_axis.extend(0.0).to_array(),
                normal.z_axis.extend(0.0).to_array(),
            ],
            tint,
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct NodeSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct SceneLayouts {
    camera: wgpu::BindGroupLayout,
    model: wgpu::BindGroupLayout,
    shading: wgpu::BindGroupLayout,
}

/// Scene pipelines compiled for one colour target format.
struct ScenePipelines {
    shaded: wgpu::RenderPipeline,
    unlit: wgpu::RenderPipeline,
    translucent: wgpu::RenderPipeline,
}

#[derive(Clone, Copy)]
enum Target {
    Surface,
    Capture,
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    layouts: SceneLayouts,
    surface_pipelines: ScenePipelines,
    capture_pipelines: Option<ScenePipelines>,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    shading_buffer: wgpu::Buffer,
    shading_bind_group: Option<wgpu::BindGroup>,
    sampler: wgpu::Sampler,
    meshes: HashMap<GeometryId, GpuMesh>,
    textures: HashMap<TextureHandle, wgpu::TextureView>,
    node_slots: HashMap<NodeId, NodeSlot>,
    overlay: EguiOverlay,
    last_render_ms: f32,
    warned_unbound_shading: bool,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;
        let info = adapter.get_info();
        log::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lightrig_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface configured: {}x{} {:?}",
            config.width,
            config.height,
            config.format
        );

        let layouts = SceneLayouts::new(&device);
        let surface_pipelines = ScenePipelines::new(&device, &layouts, format);
        let depth_view = create_depth_view(&device, config.width, config.height);

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });
        let shading_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shading_uniforms"),
            size: std::mem::size_of::<ShadingUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let overlay = EguiOverlay::new(&device, format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            layouts,
            surface_pipelines,
            capture_pipelines: None,
            camera_buffer,
            camera_bind_group,
            shading_buffer,
            shading_bind_group: None,
            sampler,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            node_slots: HashMap::new(),
            overlay,
            last_render_ms: 0.0,
            warned_unbound_shading: false,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if self.config.width == width && self.config.height == height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, width, height);
    }

    /// Reapplies the current configuration after the surface went out of date.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn last_render_ms(&self) -> f32 {
        self.last_render_ms
    }

    pub fn update_ui(
        &mut self,
        clipped_primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        pixels_per_point: f32,
    ) -> Result<(), String> {
        // Scissors must fit the surface, which can lag the window during a resize.
        self.overlay.update(
            &self.device,
            &self.queue,
            clipped_primitives,
            textures_delta,
            pixels_per_point,
            [self.config.width, self.config.height],
        )
    }

    /// Uploads whatever the draw list needs that the GPU does not have yet,
    /// then writes this frame's uniforms.
    fn prepare_scene(&mut self, ctx: &RenderContext, draw_list: &[DrawItem]) {
        let camera = CameraUniforms {
            view_proj: ctx.camera.view_proj().to_cols_array_2d(),
            eye: ctx.camera.eye().extend(1.0).to_array(),
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera));
        self.queue.write_buffer(
            &self.shading_buffer,
            0,
            bytemuck::bytes_of(&ctx.uniforms.gpu()),
        );

        if self.shading_bind_group.is_none() {
            if let (Some(diffuse), Some(ao)) =
                (ctx.uniforms.diffuse_texture, ctx.uniforms.ao_texture)
            {
                self.create_shading_bind_group(ctx, diffuse, ao);
            }
        }

        self.node_slots.retain(|id, _| ctx.scene.contains(*id));
        for item in draw_list {
            if !self.meshes.contains_key(&item.geometry) {
                let Some(mesh) = ctx.geometry.get(item.geometry) else {
                    continue;
                };
                let gpu = GpuMesh {
                    vertex_buffer: self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some("mesh_vertices"),
                            contents: bytemuck::cast_slice(&mesh.vertices),
                            usage: wgpu::BufferUsages::VERTEX,
                        },
                    ),
                    index_buffer: self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some("mesh_indices"),
                            contents: bytemuck::cast_slice(&mesh.indices),
                            usage: wgpu::BufferUsages::INDEX,
                        },
                    ),
                    index_count: mesh.index_count(),
                };
                self.meshes.insert(item.geometry, gpu);
            }

            let uniforms = ModelUniforms::new(item.world, item.material);
            if let Some(slot) = self.node_slots.get(&item.node) {
                self.queue
                    .write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&uniforms));
            } else {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("model_uniforms"),
                        contents: bytemuck::bytes_of(&uniforms),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    });
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("model_bind_group"),
                    layout: &self.layouts.model,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                self.node_slots
                    .insert(item.node, NodeSlot { buffer, bind_group });
            }
        }
    }

    fn create_shading_bind_group(
        &mut self,
        ctx: &RenderContext,
        diffuse: TextureHandle,
        ao: TextureHandle,
    ) {
        for (handle, format) in [
            (diffuse, wgpu::TextureFormat::Rgba8UnormSrgb),
            (ao, wgpu::TextureFormat::Rgba8Unorm),
        ] {
            if self.textures.contains_key(&handle) {
                continue;
            }
            let Some(image) = ctx.textures.get(handle) else {
                log::warn!("Texture {:?} is bound but not in the store", handle);
                return;
            };
            let view = upload_texture(&self.device, &self.queue, image, format);
            self.textures.insert(handle, view);
        }
        let (Some(diffuse_view), Some(ao_view)) =
            (self.textures.get(&diffuse), self.textures.get(&ao))
        else {
            return;
        };
        self.shading_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shading_bind_group"),
            layout: &self.layouts.shading,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.shading_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(diffuse_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(ao_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
        log::debug!("Shading bind group ready");
    }

    fn encode_scene(&self, pass: &mut wgpu::RenderPass<'_>, draw_list: &[DrawItem], target: Target) {
        let pipelines = match target {
            Target::Surface => &self.surface_pipelines,
            Target::Capture => match &self.capture_pipelines {
                Some(pipelines) => pipelines,
                None => return,
            },
        };
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        for item in draw_list {
            let (Some(mesh), Some(slot)) =
                (self.meshes.get(&item.geometry), self.node_slots.get(&item.node))
            else {
                continue;
            };
            match item.material {
                Material::Shading => {
                    let Some(shading) = &self.shading_bind_group else {
                        continue;
                    };
                    pass.set_pipeline(&pipelines.shaded);
                    pass.set_bind_group(2, shading, &[]);
                }
                material if material.is_translucent() => {
                    pass.set_pipeline(&pipelines.translucent);
                }
                Material::Basic { .. } => pass.set_pipeline(&pipelines.unlit),
            }
            pass.set_bind_group(1, &slot.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    fn warn_unbound_shading(&mut self, draw_list: &[DrawItem]) {
        if self.shading_bind_group.is_some() || self.warned_unbound_shading {
            return;
        }
        if draw_list
            .iter()
            .any(|item| item.material == Material::Shading)
        {
            log::warn!("Shading material attached before its textures were uploaded; skipping.");
            self.warned_unbound_shading = true;
        }
    }
}

impl FrameBackend for Renderer {
    fn draw(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        let start = Instant::now();
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) => return Err(RenderError::SurfaceLost),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => return Err(RenderError::Surface(err)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let draw_list = ctx.scene.draw_list();
        self.prepare_scene(ctx, &draw_list);
        self.warn_unbound_shading(&draw_list);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let mut pass = begin_scene_pass(&mut encoder, &view, &self.depth_view, "frame_pass");
            self.encode_scene(&mut pass, &draw_list, Target::Surface);
            self.overlay.render(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        self.last_render_ms = start.elapsed().as_secs_f32() * 1000.0;
        Ok(())
    }
}

impl FrameSource for Renderer {
    /// Re-renders the scene without the control panel into an offscreen
    /// RGBA8 target the size of the window, then reads it back.
    fn read_frame(&mut self, ctx: &RenderContext) -> Result<CapturedFrame, CaptureError> {
        if self.capture_pipelines.is_none() {
            self.capture_pipelines = Some(ScenePipelines::new(
                &self.device,
                &self.layouts,
                CAPTURE_FORMAT,
            ));
        }
        let (width, height) = self.size();
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture_color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let draw_list = ctx.scene.draw_list();
        self.prepare_scene(ctx, &draw_list);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture_encoder"),
            });
        {
            let mut pass =
                begin_scene_pass(&mut encoder, &color_view, &self.depth_view, "capture_pass");
            self.encode_scene(&mut pass, &draw_list, Target::Capture);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        readback::read_rgba8(&self.device, &self.queue, &color)
    }
}

impl SceneLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };

        Self {
            camera: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camera_layout"),
                entries: &[uniform_entry(0)],
            }),
            model: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("model_layout"),
                entries: &[uniform_entry(0)],
            }),
            shading: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("shading_layout"),
                entries: &[
                    uniform_entry(0),
                    texture_entry(1),
                    texture_entry(2),
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            }),
        }
    }
}

impl ScenePipelines {
    fn new(device: &wgpu::Device, layouts: &SceneLayouts, format: wgpu::TextureFormat) -> Self {
        let shaded_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaded_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADED_SHADER.into()),
        });
        let unlit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("unlit_shader"),
            source: wgpu::ShaderSource::Wgsl(UNLIT_SHADER.into()),
        });
        let shaded_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shaded_layout"),
            bind_group_layouts: &[&layouts.camera, &layouts.model, &layouts.shading],
            push_constant_ranges: &[],
        });
        let unlit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("unlit_layout"),
            bind_group_layouts: &[&layouts.camera, &layouts.model],
            push_constant_ranges: &[],
        });

        Self {
            shaded: scene_pipeline(
                device,
                "shaded_pipeline",
                &shaded_layout,
                &shaded_module,
                format,
                false,
            ),
            unlit: scene_pipeline(
                device,
                "unlit_pipeline",
                &unlit_layout,
                &unlit_module,
                format,
                false,
            ),
            translucent: scene_pipeline(
                device,
                "translucent_pipeline",
                &unlit_layout,
                &unlit_module,
                format,
                true,
            ),
        }
    }
}

fn scene_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    translucent: bool,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[crate::scene::MeshVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(if translucent {
                    wgpu::BlendState::ALPHA_BLENDING
                } else {
                    wgpu::BlendState::REPLACE
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !translucent,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn begin_scene_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    color: &wgpu::TextureView,
    depth: &wgpu::TextureView,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: color,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &crate::assets::TextureImage,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: image.width.max(1),
        height: image.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("material_texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::{CameraUniforms, ModelUniforms};
    use crate::scene::Material;
    use glam::{Mat4, Vec3};

    #[test]
    fn uniform_structs_match_shader_sizes() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 80);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 128);
    }

    #[test]
    fn basic_material_tint_carries_opacity() {
        let uniforms = ModelUniforms::new(
            Mat4::from_translation(Vec3::X),
            Material::Basic {
                color: [1.0, 1.0, 0.0],
                opacity: 0.5,
            },
        );
        assert_eq!(uniforms.tint, [1.0, 1.0, 0.0, 0.5]);
        assert_eq!(uniforms.model[3][0], 1.0);
        assert_eq!(uniforms.normal[0], [1.0, 0.0, 0.0, 0.0]);
    }
}
