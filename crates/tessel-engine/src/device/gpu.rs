use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;

use super::api::*;
use super::frame::GpuFrame;
use super::linked::{DeviceBuffer, DeviceTexture, LinkedProgram};
use super::scope::{scoped, ErrorScope};
use super::state::{grown_capacity, index_bytes, padded_len, BindState};
use super::surface::{choose_alpha_mode, choose_surface_format, map_surface_error, SurfaceErrorAction};
use super::{GpuInit, NativeWindow};
use crate::coords::DrawableSize;
use crate::shader::StageInterface;

struct CompiledStage {
    module: wgpu::ShaderModule,
    interface: StageInterface,
}

/// wgpu implementation of [`GpuApi`], bound to one window surface.
///
/// Owns Instance/Adapter/Device/Queue and the surface configuration, plus a
/// handle table for every object created through the trait. A frame is
/// acquired by the first clear or draw and submitted by `present`.
///
/// Errors raised by wgpu validation are caught by an error scope that stays
/// open for the device's lifetime; `poll_error` pops it and opens a fresh
/// one.
pub struct WgpuDevice<W: NativeWindow> {
    window: Arc<W>,

    /// Kept alive for the surface.
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: DrawableSize,

    sampler: wgpu::Sampler,

    next_handle: u32,
    shaders: HashMap<ShaderId, CompiledStage>,
    programs: HashMap<ProgramId, LinkedProgram>,
    buffers: HashMap<BufferId, DeviceBuffer>,
    textures: HashMap<TextureId, DeviceTexture>,

    bind: BindState,
    frame: Option<GpuFrame>,
    pending_clear: Option<[f32; 4]>,
    errors: VecDeque<String>,
    /// Standing validation scope; closed in `Drop` before the device goes.
    scope: Option<ErrorScope>,
}

impl<W: NativeWindow> WgpuDevice<W> {
    /// Creates a context bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: Arc<W>, init: GpuInit) -> Result<Self> {
        let size = window.drawable_size();
        anyhow::ensure!(!size.is_empty(), "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessel device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps, init.prefer_srgb)
            .context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode: choose_alpha_mode(&caps, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let sampler = atlas_sampler(&device);

        // Standing scope drained by `poll_error`.
        let scope = ErrorScope::open(&device);

        log::debug!(
            "surface configured: {}x{} {:?}",
            size.width,
            size.height,
            format
        );

        Ok(Self {
            window,
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            sampler,
            next_handle: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bind: BindState::default(),
            frame: None,
            pending_clear: None,
            errors: VecDeque::new(),
            scope: Some(scope),
        })
    }

    fn alloc(&mut self) -> u32 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }

    fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("queued device error: {message}");
        self.errors.push_back(message);
    }

    /// Acquires the surface texture for the frame being built.
    fn acquire_frame(&mut self) -> bool {
        if self.frame.is_some() {
            return true;
        }
        match self.surface.get_current_texture() {
            Ok(surface_texture) => {
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let encoder = self
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("tessel frame encoder"),
                    });
                self.frame = Some(GpuFrame {
                    surface_texture,
                    view,
                    encoder,
                });
                true
            }
            Err(err) => {
                let action =
                    map_surface_error(&self.surface, &self.device, &self.config, self.size, &err);
                match action {
                    SurfaceErrorAction::Fatal => self.report(format!("acquire frame: {err}")),
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("skipping frame: {err}")
                    }
                }
                false
            }
        }
    }

    fn encode_draw(&mut self, indices: BufferId, count: u32) -> Result<(), String> {
        let program_id = self.bind.program.ok_or("draw with no program in use")?;
        let streams = self.bind.vertex_streams()?;

        let index = self
            .buffers
            .get(&indices)
            .ok_or_else(|| format!("unknown index buffer {}", indices.raw()))?;
        let index_bytes = index_bytes(index.len, count, indices)?;
        for stream in &streams {
            if !self.buffers.contains_key(&stream.buffer) {
                return Err(format!("unknown vertex buffer {}", stream.buffer.raw()));
            }
        }

        let format = self.config.format;
        let program = self
            .programs
            .get_mut(&program_id)
            .ok_or_else(|| format!("unknown program {}", program_id.raw()))?;
        if let Some((name, location)) = program.missing_attribute(&streams) {
            return Err(format!(
                "vertex input `{name}` at location {location} is not enabled"
            ));
        }

        program.flush_uniforms(&self.queue);
        // Validate bindings before a frame is acquired.
        program.bind_group(&self.device, &self.sampler, &self.bind.units, &self.textures)?;
        program.pipeline(&self.device, format, &streams);

        if !self.acquire_frame() {
            return Ok(());
        }
        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        let Some(program) = self.programs.get_mut(&program_id) else {
            return Ok(());
        };
        let bind_group = program
            .bind_group(&self.device, &self.sampler, &self.bind.units, &self.textures)?
            .clone();
        let pipeline = program.pipeline(&self.device, format, &streams);

        let load = match self.pending_clear.take() {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(r),
                g: f64::from(g),
                b: f64::from(b),
                a: f64::from(a),
            }),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tessel sprite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        for (i, stream) in streams.iter().enumerate() {
            if let Some(vb) = self.buffers.get(&stream.buffer) {
                rpass.set_vertex_buffer(i as u32, vb.buffer.slice(..vb.len.max(4)));
            }
        }
        if let Some(ib) = self.buffers.get(&indices) {
            rpass.set_index_buffer(ib.buffer.slice(..index_bytes.max(4)), wgpu::IndexFormat::Uint16);
        }
        rpass.draw_indexed(0..count, 0, 0..1);
        Ok(())
    }

    /// Runs a pass whose only effect is the pending clear.
    fn flush_clear(&mut self) {
        let Some([r, g, b, a]) = self.pending_clear else {
            return;
        };
        if !self.acquire_frame() {
            return;
        }
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        self.pending_clear = None;
        let _rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tessel clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(r),
                        g: f64::from(g),
                        b: f64::from(b),
                        a: f64::from(a),
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
}

impl<W: NativeWindow> GpuApi for WgpuDevice<W> {
    fn drawable_size(&self) -> DrawableSize {
        self.window.drawable_size()
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let interface = StageInterface::compile(stage, source)?;
        let (module, error) = scoped(&self.device, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "tessel vertex stage",
                    ShaderStage::Fragment => "tessel fragment stage",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        if let Some(err) = error {
            return Err(err.to_string());
        }

        let id = ShaderId(self.alloc());
        self.shaders.insert(id, CompiledStage { module, interface });
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let (Some(vs), Some(fs)) = (self.shaders.get(&vertex), self.shaders.get(&fragment)) else {
            return Err("error: unknown shader handle".to_owned());
        };
        let interface = crate::shader::ProgramInterface::link(&vs.interface, &fs.interface)?;
        let (vs_module, fs_module) = (vs.module.clone(), fs.module.clone());

        let (linked, error) = scoped(&self.device, |device| {
            LinkedProgram::new(device, interface, vs_module, fs_module)
        });
        if let Some(err) = error {
            return Err(err.to_string());
        }
        let linked = linked?;

        let id = ProgramId(self.alloc());
        self.programs.insert(id, linked);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.bind.program == Some(program) {
            self.bind.program = None;
        }
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeSlot> {
        self.programs
            .get(&program)?
            .interface()
            .attribute_location(name)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        self.programs.get(&program)?.interface().uniform_location(name)
    }

    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId, String> {
        let usage = match target {
            BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let capacity = wgpu::COPY_BUFFER_ALIGNMENT;
        let (buffer, error) = scoped(&self.device, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tessel buffer"),
                size: capacity,
                usage,
                mapped_at_creation: false,
            })
        });
        if let Some(err) = error {
            return Err(err.to_string());
        }

        let id = BufferId(self.alloc());
        self.buffers.insert(
            id,
            DeviceBuffer {
                usage,
                buffer,
                capacity,
                len: 0,
            },
        );
        Ok(id)
    }

    fn buffer_data(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) {
        let Some(entry) = self.buffers.get_mut(&buffer) else {
            self.report(format!("buffer_data on unknown buffer {}", buffer.raw()));
            return;
        };

        let padded = padded_len(data.len());
        if let Some(capacity) = grown_capacity(entry.capacity, padded, usage) {
            entry.buffer.destroy();
            entry.buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tessel buffer"),
                size: capacity,
                usage: entry.usage,
                mapped_at_creation: false,
            });
            entry.capacity = capacity;
        }

        if padded == data.len() as u64 {
            self.queue.write_buffer(&entry.buffer, 0, data);
        } else {
            let mut staged = data.to_vec();
            staged.resize(padded as usize, 0);
            self.queue.write_buffer(&entry.buffer, 0, &staged);
        }
        entry.len = data.len() as u64;
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(entry) = self.buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
        self.bind.forget_buffer(buffer);
    }

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId, String> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err("texture image is empty".to_owned());
        }
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let (texture, error) = scoped(&self.device, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("tessel atlas"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        });
        if let Some(err) = error {
            return Err(err.to_string());
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId(self.alloc());
        self.textures.insert(id, DeviceTexture { texture, view });
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        for program in self.programs.values_mut() {
            program.forget_texture(texture);
        }
        self.bind.forget_texture(texture);
        if let Some(entry) = self.textures.remove(&texture) {
            entry.texture.destroy();
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.pending_clear = Some(color);
    }

    fn use_program(&mut self, program: ProgramId) {
        if !self.programs.contains_key(&program) {
            self.report(format!("use_program on unknown program {}", program.raw()));
            return;
        }
        self.bind.program = Some(program);
    }

    fn uniform_vec2(&mut self, slot: UniformSlot, value: [f32; 2]) {
        let result = match self.bind.program.and_then(|p| self.programs.get_mut(&p)) {
            Some(program) => program.write_uniform(slot, bytemuck::cast_slice(&value)),
            None => Err("uniform write with no program in use".to_owned()),
        };
        if let Err(message) = result {
            self.report(message);
        }
    }

    fn uniform_texture_unit(&mut self, slot: UniformSlot, unit: u32) {
        let Some(program) = self.bind.program.and_then(|p| self.programs.get_mut(&p)) else {
            self.report("texture unit write with no program in use");
            return;
        };
        program.set_texture_unit(slot.binding, unit);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if !self.textures.contains_key(&texture) {
            self.report(format!("bind_texture on unknown texture {}", texture.raw()));
            return;
        }
        self.bind.units.insert(unit, texture);
    }

    fn vertex_attrib_pointer(
        &mut self,
        slot: AttributeSlot,
        buffer: BufferId,
        pointer: AttributePointer,
    ) {
        if !self.buffers.contains_key(&buffer) {
            self.report(format!("attribute pointer into unknown buffer {}", buffer.raw()));
            return;
        }
        self.bind.pointers.insert(slot, (buffer, pointer));
    }

    fn enable_attribute(&mut self, slot: AttributeSlot) {
        self.bind.enabled.insert(slot);
    }

    fn disable_attribute(&mut self, slot: AttributeSlot) {
        self.bind.enabled.remove(&slot);
    }

    fn draw_indexed(&mut self, indices: BufferId, count: u32) {
        if let Err(message) = self.encode_draw(indices, count) {
            self.report(format!("draw: {message}"));
        }
    }

    fn present(&mut self) {
        self.flush_clear();
        let Some(frame) = self.frame.take() else {
            return;
        };
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);
        self.window.pre_present_notify();
        frame.surface_texture.present();
    }

    fn poll_error(&mut self) -> Option<String> {
        if let Some(message) = self.errors.pop_front() {
            return Some(message);
        }
        self.scope.as_mut()?.drain(&self.device)
    }
}

/// Linear, edge-clamped sampler shared by every atlas texture.
fn atlas_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("tessel atlas sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

impl<W: NativeWindow> Drop for WgpuDevice<W> {
    fn drop(&mut self) {
        let leaked =
            self.shaders.len() + self.programs.len() + self.buffers.len() + self.textures.len();
        if leaked > 0 {
            log::warn!("destroying context with {leaked} live object(s)");
        }
        // Unsubmitted work is discarded with the encoder.
        self.frame = None;
        self.scope = None;
        log::debug!("context destroyed");
    }
}
