use std::collections::HashMap;
use wgpu::util::DeviceExt;

const EGUI_SHADER: &str = include_str!("shaders/egui.wgsl");
const INITIAL_VERTICES: usize = 4_096;
const INITIAL_INDICES: usize = 12_288;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct UiVertex {
    pos: [f32; 2],
    uv: [f32; 2],
    color: [u8; 4],
}

impl UiVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4];
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ScreenUniforms {
    size: [f32; 2],
    _pad: [f32; 2],
}

struct OverlayTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct DrawRange {
    texture_id: egui::TextureId,
    scissor: [u32; 4],
    first_index: u32,
    index_count: u32,
    base_vertex: i32,
}

/// Draws tessellated egui output on top of the scene, in the same pass.
pub struct EguiOverlay {
    pipeline: wgpu::RenderPipeline,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: HashMap<egui::TextureId, OverlayTexture>,
    pending_free: Vec<egui::TextureId>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    vertices: Vec<UiVertex>,
    indices: Vec<u32>,
    draws: Vec<DrawRange>,
    warned_missing_texture: bool,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("egui_shader"),
            source: wgpu::ShaderSource::Wgsl(EGUI_SHADER.into()),
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("egui_screen_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("egui_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("egui_pipeline_layout"),
            bind_group_layouts: &[&screen_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("egui_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<UiVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &UiVertex::ATTRIBS,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            // Shares the scene pass, so it must accept the depth attachment.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: super::DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let screen_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("egui_screen"),
            contents: bytemuck::bytes_of(&ScreenUniforms {
                size: [1.0, 1.0],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("egui_screen_bind_group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("egui_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            screen_buffer,
            screen_bind_group,
            texture_layout,
            sampler,
            textures: HashMap::new(),
            pending_free: Vec::new(),
            vertex_buffer: create_buffer(
                device,
                "egui_vertices",
                INITIAL_VERTICES * std::mem::size_of::<UiVertex>(),
                wgpu::BufferUsages::VERTEX,
            ),
            index_buffer: create_buffer(
                device,
                "egui_indices",
                INITIAL_INDICES * std::mem::size_of::<u32>(),
                wgpu::BufferUsages::INDEX,
            ),
            vertex_capacity: INITIAL_VERTICES,
            index_capacity: INITIAL_INDICES,
            vertices: Vec::new(),
            indices: Vec::new(),
            draws: Vec::new(),
            warned_missing_texture: false,
        }
    }

    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        clipped_primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        pixels_per_point: f32,
        screen_size_px: [u32; 2],
    ) -> Result<(), String> {
        // Frees requested last frame are safe now that frame has been presented.
        for texture_id in self.pending_free.drain(..) {
            self.textures.remove(&texture_id);
        }

        queue.write_buffer(
            &self.screen_buffer,
            0,
            bytemuck::bytes_of(&ScreenUniforms {
                size: [screen_size_px[0].max(1) as f32, screen_size_px[1].max(1) as f32],
                _pad: [0.0; 2],
            }),
        );
        self.apply_textures(device, queue, textures_delta)?;
        self.build_mesh(clipped_primitives, pixels_per_point, screen_size_px);
        self.upload_mesh(device, queue);
        self.pending_free.extend(textures_delta.free.iter().copied());
        Ok(())
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.draws.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.screen_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for draw in &self.draws {
            let Some(texture) = self.textures.get(&draw.texture_id) else {
                continue;
            };
            let [x, y, w, h] = draw.scissor;
            pass.set_scissor_rect(x, y, w, h);
            pass.set_bind_group(1, &texture.bind_group, &[]);
            pass.draw_indexed(
                draw.first_index..draw.first_index + draw.index_count,
                draw.base_vertex,
                0..1,
            );
        }
    }

    fn apply_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        textures_delta: &egui::TexturesDelta,
    ) -> Result<(), String> {
        for (texture_id, image_delta) in &textures_delta.set {
            let (w, h, pixels) = image_to_rgba8(image_delta)?;
            let origin = match image_delta.pos {
                Some([x, y]) => {
                    let x = u32::try_from(x).map_err(|_| "egui texture x overflow".to_string())?;
                    let y = u32::try_from(y).map_err(|_| "egui texture y overflow".to_string())?;
                    let Some(existing) = self.textures.get(texture_id) else {
                        return Err(format!(
                            "partial update for unknown egui texture {:?}",
                            texture_id
                        ));
                    };
                    if x.saturating_add(w) > existing.texture.width()
                        || y.saturating_add(h) > existing.texture.height()
                    {
                        return Err("egui partial texture update exceeds bounds".to_string());
                    }
                    wgpu::Origin3d { x, y, z: 0 }
                }
                None => {
                    let texture = device.create_texture(&wgpu::TextureDescriptor {
                        label: Some("egui_texture"),
                        size: wgpu::Extent3d {
                            width: w.max(1),
                            height: h.max(1),
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: wgpu::TextureFormat::Rgba8UnormSrgb,
                        usage: wgpu::TextureUsages::TEXTURE_BINDING
                            | wgpu::TextureUsages::COPY_DST,
                        view_formats: &[],
                    });
                    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("egui_texture_bind_group"),
                        layout: &self.texture_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(&view),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&self.sampler),
                            },
                        ],
                    });
                    self.textures.insert(
                        *texture_id,
                        OverlayTexture {
                            texture,
                            bind_group,
                        },
                    );
                    wgpu::Origin3d::ZERO
                }
            };

            if w == 0 || h == 0 {
                continue;
            }
            let Some(target) = self.textures.get(texture_id) else {
                continue;
            };
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &target.texture,
                    mip_level: 0,
                    origin,
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * w),
                    rows_per_image: Some(h),
                },
                wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    fn build_mesh(
        &mut self,
        clipped_primitives: &[egui::ClippedPrimitive],
        pixels_per_point: f32,
        screen_size_px: [u32; 2],
    ) {
        let ppp = pixels_per_point.max(0.01);
        self.vertices.clear();
        self.indices.clear();
        self.draws.clear();

        for clipped in clipped_primitives {
            let egui::epaint::Primitive::Mesh(mesh) = &clipped.primitive else {
                continue;
            };
            if !self.textures.contains_key(&mesh.texture_id) {
                if !self.warned_missing_texture {
                    log::warn!("egui texture {:?} was never uploaded.", mesh.texture_id);
                    self.warned_missing_texture = true;
                }
                continue;
            }
            let Some(scissor) = scissor_rect(clipped.clip_rect, ppp, screen_size_px) else {
                continue;
            };

            let base_vertex = self.vertices.len() as i32;
            let first_index = self.indices.len() as u32;
            self.vertices.extend(mesh.vertices.iter().map(|v| UiVertex {
                pos: [v.pos.x * ppp, v.pos.y * ppp],
                uv: [v.uv.x, v.uv.y],
                color: v.color.to_array(),
            }));
            self.indices.extend_from_slice(&mesh.indices);
            self.draws.push(DrawRange {
                texture_id: mesh.texture_id,
                scissor,
                first_index,
                index_count: mesh.indices.len() as u32,
                base_vertex,
            });
        }
    }

    fn upload_mesh(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.vertices.len() > self.vertex_capacity {
            self.vertex_capacity = self.vertices.len().next_power_of_two();
            self.vertex_buffer = create_buffer(
                device,
                "egui_vertices",
                self.vertex_capacity * std::mem::size_of::<UiVertex>(),
                wgpu::BufferUsages::VERTEX,
            );
        }
        if self.indices.len() > self.index_capacity {
            self.index_capacity = self.indices.len().next_power_of_two();
            self.index_buffer = create_buffer(
                device,
                "egui_indices",
                self.index_capacity * std::mem::size_of::<u32>(),
                wgpu::BufferUsages::INDEX,
            );
        }
        if !self.vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
        }
        if !self.indices.is_empty() {
            queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&self.indices));
        }
    }
}

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    size: usize,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as wgpu::BufferAddress,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Clip rect in points to a pixel scissor clamped to the screen. None if empty.
fn scissor_rect(clip: egui::Rect, pixels_per_point: f32, screen_size_px: [u32; 2]) -> Option<[u32; 4]> {
    let [screen_w, screen_h] = screen_size_px;
    let min_x = ((clip.min.x * pixels_per_point).round().max(0.0) as u32).min(screen_w);
    let min_y = ((clip.min.y * pixels_per_point).round().max(0.0) as u32).min(screen_h);
    let max_x = ((clip.max.x * pixels_per_point).round().max(0.0) as u32).min(screen_w);
    let max_y = ((clip.max.y * pixels_per_point).round().max(0.0) as u32).min(screen_h);
    if max_x <= min_x || max_y <= min_y {
        return None;
    }
    Some([min_x, min_y, max_x - min_x, max_y - min_y])
}

fn image_to_rgba8(
    image_delta: &egui::epaint::ImageDelta,
) -> Result<(u32, u32, Vec<u8>), String> {
    let (w, h, pixels): (usize, usize, Vec<egui::Color32>) = match &image_delta.image {
        egui::ImageData::Color(image) => (image.width(), image.height(), image.pixels.clone()),
        egui::ImageData::Font(image) => (
            image.width(),
            image.height(),
            image.srgba_pixels(None).collect(),
        ),
    };
    let w = u32::try_from(w).map_err(|_| "egui image width overflow".to_string())?;
    let h = u32::try_from(h).map_err(|_| "egui image height overflow".to_string())?;
    let bytes = pixels.iter().flat_map(|pixel| pixel.to_array()).collect();
    Ok((w, h, bytes))
}

#[cfg(test)]
mod tests {
    use super::scissor_rect;

    #[test]
    fn scissor_scales_and_clamps_to_screen() {
        let clip = egui::Rect::from_min_max(egui::pos2(-10.0, 5.0), egui::pos2(500.0, 50.0));
        assert_eq!(scissor_rect(clip, 2.0, [800, 600]), Some([0, 10, 800, 90]));
    }

    #[test]
    fn empty_scissor_is_skipped() {
        let clip = egui::Rect::from_min_max(egui::pos2(900.0, 0.0), egui::pos2(1000.0, 10.0));
        assert_eq!(scissor_rect(clip, 1.0, [800, 600]), None);
    }

    #[test]
    fn scissor_stays_inside_a_target_smaller_than_the_layout() {
        // Panel laid out for a 1000 px window while the surface is still 800 px.
        let straddling = egui::Rect::from_min_max(egui::pos2(700.0, 8.0), egui::pos2(992.0, 200.0));
        assert_eq!(scissor_rect(straddling, 1.0, [800, 600]), Some([700, 8, 100, 192]));
        let beyond = egui::Rect::from_min_max(egui::pos2(820.0, 8.0), egui::pos2(992.0, 200.0));
        assert_eq!(scissor_rect(beyond, 1.0, [800, 600]), None);
    }
}
