//! Device-side state of a linked program: bind group layout, uniform block
//! storage, and the pipelines built for it on demand.

use std::collections::HashMap;
use std::num::NonZeroU64;

use super::api::{AttributeFormat, AttributeSlot, BufferId, TextureId, UniformSlot};
use crate::shader::{ProgramInterface, ResourceKind};

/// Uniform blocks are backed by buffers at least this large.
const MIN_UNIFORM_BLOCK: u32 = 16;

pub(crate) struct DeviceBuffer {
    pub usage: wgpu::BufferUsages,
    pub buffer: wgpu::Buffer,
    pub capacity: u64,
    /// Bytes written by the last upload.
    pub len: u64,
}

pub(crate) struct DeviceTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Enabled attributes sourced from one vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VertexStream {
    pub buffer: BufferId,
    pub stride: u32,
    /// `(slot, format, offset)`, ordered by slot.
    pub attributes: Vec<(AttributeSlot, AttributeFormat, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    format: wgpu::TextureFormat,
    layouts: Vec<(u32, Vec<(AttributeSlot, AttributeFormat, u32)>)>,
}

struct UniformBlock {
    binding: u32,
    buffer: wgpu::Buffer,
    staging: Vec<u8>,
    dirty: bool,
}

pub(crate) struct LinkedProgram {
    interface: ProgramInterface,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniforms: Vec<UniformBlock>,
    /// Texture binding -> texture unit. Unset bindings sample unit 0.
    texture_units: HashMap<u32, u32>,
    bind_groups: HashMap<Vec<TextureId>, wgpu::BindGroup>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl LinkedProgram {
    /// Builds the bind group layout from the reflected resources.
    ///
    /// `Err` carries a linker-style log line.
    pub fn new(
        device: &wgpu::Device,
        interface: ProgramInterface,
        vertex: wgpu::ShaderModule,
        fragment: wgpu::ShaderModule,
    ) -> Result<Self, String> {
        let mut entries = Vec::with_capacity(interface.resources().len());
        let mut uniforms = Vec::new();

        for linked in interface.resources() {
            let r = &linked.resource;
            if r.group != 0 {
                return Err(format!(
                    "error: resource `{}` is declared in bind group {}; only group 0 is supported",
                    r.name, r.group
                ));
            }

            let mut visibility = wgpu::ShaderStages::NONE;
            if linked.vertex {
                visibility |= wgpu::ShaderStages::VERTEX;
            }
            if linked.fragment {
                visibility |= wgpu::ShaderStages::FRAGMENT;
            }

            let ty = match r.kind {
                ResourceKind::UniformBlock { size } => {
                    let size = size.max(MIN_UNIFORM_BLOCK).next_multiple_of(MIN_UNIFORM_BLOCK);
                    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&r.name),
                        size: u64::from(size),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    });
                    uniforms.push(UniformBlock {
                        binding: r.binding,
                        buffer,
                        staging: vec![0; size as usize],
                        dirty: true,
                    });
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(u64::from(size)),
                    }
                }
                ResourceKind::Texture => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                ResourceKind::Sampler => {
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                }
            };

            entries.push(wgpu::BindGroupLayoutEntry {
                binding: r.binding,
                visibility,
                ty,
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessel program bgl"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tessel program pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Ok(Self {
            interface,
            vertex,
            fragment,
            bind_group_layout,
            pipeline_layout,
            uniforms,
            texture_units: HashMap::new(),
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
        })
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    /// Stages `bytes` at the slot's offset inside its uniform block.
    pub fn write_uniform(&mut self, slot: UniformSlot, bytes: &[u8]) -> Result<(), String> {
        let block = self
            .uniforms
            .iter_mut()
            .find(|b| b.binding == slot.binding)
            .ok_or_else(|| format!("no uniform block at binding {}", slot.binding))?;

        let start = slot.offset as usize;
        let end = start + bytes.len();
        let Some(dst) = block.staging.get_mut(start..end) else {
            return Err(format!(
                "uniform write {start}..{end} overflows block at binding {} ({} bytes)",
                slot.binding,
                block.staging.len()
            ));
        };
        dst.copy_from_slice(bytes);
        block.dirty = true;
        Ok(())
    }

    pub fn set_texture_unit(&mut self, binding: u32, unit: u32) {
        if self.texture_units.insert(binding, unit) != Some(unit) {
            self.bind_groups.clear();
        }
    }

    /// Drops cached bind groups referencing `texture`.
    pub fn forget_texture(&mut self, texture: TextureId) {
        self.bind_groups.retain(|key, _| !key.contains(&texture));
    }

    pub fn flush_uniforms(&mut self, queue: &wgpu::Queue) {
        for block in self.uniforms.iter_mut().filter(|b| b.dirty) {
            queue.write_buffer(&block.buffer, 0, &block.staging);
            block.dirty = false;
        }
    }

    /// Location of the first program attribute not present in `streams`.
    pub fn missing_attribute(&self, streams: &[VertexStream]) -> Option<(String, u32)> {
        self.interface
            .attributes()
            .iter()
            .find(|a| {
                !streams
                    .iter()
                    .any(|s| s.attributes.iter().any(|(slot, _, _)| slot.0 == a.location))
            })
            .map(|a| (a.name.clone(), a.location))
    }

    /// Bind group for the textures currently bound to the units this program
    /// samples, created on first use.
    pub fn bind_group(
        &mut self,
        device: &wgpu::Device,
        sampler: &wgpu::Sampler,
        units: &HashMap<u32, TextureId>,
        textures: &HashMap<TextureId, DeviceTexture>,
    ) -> Result<&wgpu::BindGroup, String> {
        let mut key = Vec::new();
        for linked in self.interface.resources() {
            let r = &linked.resource;
            if r.kind != ResourceKind::Texture {
                continue;
            }
            let unit = self.texture_units.get(&r.binding).copied().unwrap_or(0);
            let texture = units
                .get(&unit)
                .filter(|t| textures.contains_key(t))
                .ok_or_else(|| format!("no texture bound to unit {unit} for `{}`", r.name))?;
            key.push(*texture);
        }

        if !self.bind_groups.contains_key(&key) {
            let mut views = key.iter().filter_map(|t| textures.get(t)).map(|t| &t.view);
            let mut entries = Vec::with_capacity(self.interface.resources().len());
            for linked in self.interface.resources() {
                let r = &linked.resource;
                let resource = match r.kind {
                    ResourceKind::UniformBlock { .. } => {
                        let Some(block) = self.uniforms.iter().find(|b| b.binding == r.binding)
                        else {
                            continue;
                        };
                        block.buffer.as_entire_binding()
                    }
                    ResourceKind::Texture => match views.next() {
                        Some(view) => wgpu::BindingResource::TextureView(view),
                        None => continue,
                    },
                    ResourceKind::Sampler => wgpu::BindingResource::Sampler(sampler),
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: r.binding,
                    resource,
                });
            }

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tessel program bind group"),
                layout: &self.bind_group_layout,
                entries: &entries,
            });
            self.bind_groups.insert(key.clone(), bind_group);
        }

        self.bind_groups
            .get(&key)
            .ok_or_else(|| "bind group cache miss".to_owned())
    }

    /// Render pipeline for this program fed by `streams`, created on first use.
    pub fn pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        streams: &[VertexStream],
    ) -> &wgpu::RenderPipeline {
        let key = PipelineKey {
            format,
            layouts: streams
                .iter()
                .map(|s| (s.stride, s.attributes.clone()))
                .collect(),
        };

        self.pipelines.entry(key).or_insert_with_key(|key| {
            let attributes: Vec<Vec<wgpu::VertexAttribute>> = key
                .layouts
                .iter()
                .map(|(_, attrs)| {
                    attrs
                        .iter()
                        .map(|(slot, fmt, offset)| wgpu::VertexAttribute {
                            format: vertex_format(*fmt),
                            offset: u64::from(*offset),
                            shader_location: slot.0,
                        })
                        .collect()
                })
                .collect();

            let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
                .layouts
                .iter()
                .zip(&attributes)
                .map(|((stride, _), attrs)| wgpu::VertexBufferLayout {
                    array_stride: u64::from(*stride),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: attrs,
                })
                .collect();

            log::debug!("building pipeline for {} vertex stream(s)", buffers.len());

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("tessel sprite pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.vertex,
                    entry_point: Some(self.interface.vertex_entry()),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.fragment,
                    entry_point: Some(self.interface.fragment_entry()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: Some(premul_alpha_blend()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })
    }
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
    }
}

/// Source color is taken as premultiplied.
fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}
