//! In-memory `GpuApi` for tests.
//!
//! Records every call into a [`Ledger`] shared through `Rc<RefCell<_>>`, so
//! tests can inspect it after the device has been moved into (and dropped
//! by) a renderer. Compilation and linking go through the same naga
//! reflection as the wgpu backend.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

use image::RgbaImage;

use super::api::*;
use crate::coords::DrawableSize;
use crate::error::SetupError;
use crate::renderer::ContextFactory;
use crate::shader::{ProgramInterface, StageInterface};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateContext,
    DestroyContext,
    CompileShader(ShaderId, ShaderStage),
    DeleteShader(ShaderId),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    CreateBuffer(BufferId, BufferTarget),
    BufferData {
        buffer: BufferId,
        len: usize,
        usage: BufferUsage,
    },
    DeleteBuffer(BufferId),
    CreateTexture(TextureId),
    DeleteTexture(TextureId),
    Clear([f32; 4]),
    UseProgram(ProgramId),
    UniformVec2 {
        slot: UniformSlot,
        value: [f32; 2],
    },
    UniformTextureUnit {
        slot: UniformSlot,
        unit: u32,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    VertexAttribPointer {
        slot: AttributeSlot,
        buffer: BufferId,
        pointer: AttributePointer,
    },
    EnableAttribute(AttributeSlot),
    DisableAttribute(AttributeSlot),
    DrawIndexed {
        indices: BufferId,
        count: u32,
        enabled: Vec<AttributeSlot>,
    },
    Present,
}

/// Everything observed across every context attached to one ledger.
#[derive(Debug)]
pub(crate) struct Ledger {
    pub calls: Vec<Call>,
    pub drawable: DrawableSize,

    pub live_contexts: usize,
    pub live_shaders: BTreeSet<ShaderId>,
    pub live_programs: BTreeSet<ProgramId>,
    pub live_buffers: BTreeSet<BufferId>,
    pub live_textures: BTreeSet<TextureId>,

    /// Attribute-enable state of the current context.
    pub enabled: BTreeSet<AttributeSlot>,

    /// Last contents written to each buffer.
    pub buffer_contents: HashMap<BufferId, Vec<u8>>,

    /// Errors handed out by `poll_error`, oldest first.
    pub queued_errors: VecDeque<String>,

    /// When set, buffer creation number `n` (zero-based, per ledger) fails.
    pub fail_buffer_at: Option<usize>,
    pub fail_texture: bool,
    pub fail_context: bool,

    buffers_created: usize,
    next_id: u32,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            drawable: DrawableSize::new(800, 600),
            live_contexts: 0,
            live_shaders: BTreeSet::new(),
            live_programs: BTreeSet::new(),
            live_buffers: BTreeSet::new(),
            live_textures: BTreeSet::new(),
            enabled: BTreeSet::new(),
            buffer_contents: HashMap::new(),
            queued_errors: VecDeque::new(),
            fail_buffer_at: None,
            fail_texture: false,
            fail_context: false,
            buffers_created: 0,
            next_id: 1,
        }
    }
}

impl Ledger {
    pub fn shared() -> Rc<RefCell<Ledger>> {
        Rc::new(RefCell::new(Ledger::default()))
    }

    /// GPU objects still alive, contexts excluded.
    pub fn live_objects(&self) -> usize {
        self.live_shaders.len()
            + self.live_programs.len()
            + self.live_buffers.len()
            + self.live_textures.len()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn rposition(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().rposition(pred)
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

pub(crate) struct RecordingDevice {
    ledger: Rc<RefCell<Ledger>>,
    stages: HashMap<ShaderId, StageInterface>,
    programs: HashMap<ProgramId, ProgramInterface>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::attach(Ledger::shared())
    }

    /// Opens a new context recording into `ledger`.
    pub fn attach(ledger: Rc<RefCell<Ledger>>) -> Self {
        {
            let mut l = ledger.borrow_mut();
            l.live_contexts += 1;
            l.enabled.clear();
            l.calls.push(Call::CreateContext);
        }
        Self {
            ledger,
            stages: HashMap::new(),
            programs: HashMap::new(),
        }
    }

    pub fn ledger(&self) -> Ref<'_, Ledger> {
        self.ledger.borrow()
    }

    pub fn ledger_mut(&self) -> RefMut<'_, Ledger> {
        self.ledger.borrow_mut()
    }

    fn record(&self, call: Call) {
        self.ledger.borrow_mut().calls.push(call);
    }
}

impl Drop for RecordingDevice {
    fn drop(&mut self) {
        let mut l = self.ledger.borrow_mut();
        l.live_contexts -= 1;
        l.enabled.clear();
        l.calls.push(Call::DestroyContext);
    }
}

impl GpuApi for RecordingDevice {
    fn drawable_size(&self) -> DrawableSize {
        self.ledger.borrow().drawable
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let iface = StageInterface::compile(stage, source)?;
        let mut l = self.ledger.borrow_mut();
        let id = ShaderId(l.alloc());
        l.live_shaders.insert(id);
        l.calls.push(Call::CompileShader(id, stage));
        drop(l);
        self.stages.insert(id, iface);
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.stages.remove(&shader);
        let mut l = self.ledger.borrow_mut();
        l.live_shaders.remove(&shader);
        l.calls.push(Call::DeleteShader(shader));
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let (Some(vs), Some(fs)) = (self.stages.get(&vertex), self.stages.get(&fragment)) else {
            return Err("error: unknown shader handle".to_owned());
        };
        let iface = ProgramInterface::link(vs, fs)?;
        let mut l = self.ledger.borrow_mut();
        let id = ProgramId(l.alloc());
        l.live_programs.insert(id);
        l.calls.push(Call::LinkProgram(id));
        drop(l);
        self.programs.insert(id, iface);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        let mut l = self.ledger.borrow_mut();
        l.live_programs.remove(&program);
        l.calls.push(Call::DeleteProgram(program));
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeSlot> {
        self.programs.get(&program)?.attribute_location(name)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformSlot> {
        self.programs.get(&program)?.uniform_location(name)
    }

    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId, String> {
        let mut l = self.ledger.borrow_mut();
        let n = l.buffers_created;
        l.buffers_created += 1;
        if l.fail_buffer_at == Some(n) {
            return Err("out of device memory".to_owned());
        }
        let id = BufferId(l.alloc());
        l.live_buffers.insert(id);
        l.calls.push(Call::CreateBuffer(id, target));
        Ok(id)
    }

    fn buffer_data(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) {
        let mut l = self.ledger.borrow_mut();
        l.buffer_contents.insert(buffer, data.to_vec());
        l.calls.push(Call::BufferData {
            buffer,
            len: data.len(),
            usage,
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        let mut l = self.ledger.borrow_mut();
        l.live_buffers.remove(&buffer);
        l.calls.push(Call::DeleteBuffer(buffer));
    }

    fn create_texture(&mut self, _image: &RgbaImage) -> Result<TextureId, String> {
        let mut l = self.ledger.borrow_mut();
        if l.fail_texture {
            return Err("texture allocation refused".to_owned());
        }
        let id = TextureId(l.alloc());
        l.live_textures.insert(id);
        l.calls.push(Call::CreateTexture(id));
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        let mut l = self.ledger.borrow_mut();
        l.live_textures.remove(&texture);
        l.calls.push(Call::DeleteTexture(texture));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.record(Call::Clear(color));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.record(Call::UseProgram(program));
    }

    fn uniform_vec2(&mut self, slot: UniformSlot, value: [f32; 2]) {
        self.record(Call::UniformVec2 { slot, value });
    }

    fn uniform_texture_unit(&mut self, slot: UniformSlot, unit: u32) {
        self.record(Call::UniformTextureUnit { slot, unit });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.record(Call::BindTexture { unit, texture });
    }

    fn vertex_attrib_pointer(
        &mut self,
        slot: AttributeSlot,
        buffer: BufferId,
        pointer: AttributePointer,
    ) {
        self.record(Call::VertexAttribPointer {
            slot,
            buffer,
            pointer,
        });
    }

    fn enable_attribute(&mut self, slot: AttributeSlot) {
        let mut l = self.ledger.borrow_mut();
        l.enabled.insert(slot);
        l.calls.push(Call::EnableAttribute(slot));
    }

    fn disable_attribute(&mut self, slot: AttributeSlot) {
        let mut l = self.ledger.borrow_mut();
        l.enabled.remove(&slot);
        l.calls.push(Call::DisableAttribute(slot));
    }

    fn draw_indexed(&mut self, indices: BufferId, count: u32) {
        let mut l = self.ledger.borrow_mut();
        let enabled = l.enabled.iter().copied().collect();
        l.calls.push(Call::DrawIndexed {
            indices,
            count,
            enabled,
        });
    }

    fn present(&mut self) {
        self.record(Call::Present);
    }

    fn poll_error(&mut self) -> Option<String> {
        self.ledger.borrow_mut().queued_errors.pop_front()
    }
}

/// Context factory handing out recording devices bound to one ledger.
///
/// `window` stands in for the native window handle a real factory holds.
pub(crate) struct RecordingFactory {
    pub ledger: Rc<RefCell<Ledger>>,
    pub window: &'static str,
}

impl RecordingFactory {
    pub fn new(window: &'static str) -> Self {
        Self {
            ledger: Ledger::shared(),
            window,
        }
    }
}

impl ContextFactory for RecordingFactory {
    type Api = RecordingDevice;

    fn create_context(&mut self) -> Result<RecordingDevice, SetupError> {
        if self.ledger.borrow().fail_context {
            return Err(SetupError::device("create context", "no suitable adapter"));
        }
        Ok(RecordingDevice::attach(self.ledger.clone()))
    }
}
