use std::fmt;

use image::RgbaImage;

use crate::coords::DrawableSize;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw handle value, for diagnostics.
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Compiled shader stage.
    ShaderId
);
handle!(
    /// Linked program.
    ProgramId
);
handle!(
    /// Device buffer (vertex or index).
    BufferId
);
handle!(
    /// Sampled 2D texture.
    TextureId
);

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// What a buffer is bound as.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Update-frequency hint for a buffer upload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    /// Replaced occasionally; sized exactly.
    Dynamic,
    /// Replaced every frame; storage grows geometrically and is reused.
    Stream,
}

/// Vertex-input slot resolved from a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AttributeSlot(pub u32);

/// Uniform slot resolved from a program.
///
/// `offset` is the byte offset inside the uniform block at
/// (`group`, `binding`); it is zero for non-block resources such as textures.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
    pub offset: u32,
}

/// Component format of one vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
}

impl AttributeFormat {
    pub fn size(self) -> u32 {
        match self {
            Self::Float32 => 4,
            Self::Float32x2 => 8,
        }
    }
}

/// Where an attribute lives inside its buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttributePointer {
    pub format: AttributeFormat,
    pub stride: u32,
    pub offset: u32,
}

/// Handle-based command surface over one graphics context.
///
/// The shape follows classic immediate-style GPU APIs: objects are created
/// and deleted through opaque handles, state (current program, bound
/// textures, attribute pointers, enabled attributes) is global to the
/// context, and errors are queued and drained with [`GpuApi::poll_error`]
/// rather than returned from every call.
///
/// Dropping the implementor destroys the context. Owners must delete the
/// objects they created before that happens.
pub trait GpuApi {
    /// Current drawable size of the bound surface, in physical pixels.
    fn drawable_size(&self) -> DrawableSize;

    /// Compiles one stage. `Err` carries the compiler log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    /// Links two compiled stages. `Err` carries the linker log.
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String>;

    fn delete_program(&mut self, program: ProgramId);

    /// `None` when the program has no active attribute with that name.
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeSlot>;

    /// `None` when the program has no active uniform with that name.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformSlot>;

    /// Allocates an empty buffer. `Err` carries the device message.
    fn create_buffer(&mut self, target: BufferTarget) -> Result<BufferId, String>;

    /// Replaces the whole contents of `buffer`.
    fn buffer_data(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage);

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Uploads an RGBA8 image with linear filtering.
    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId, String>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Clears the color buffer of the frame being built.
    fn clear(&mut self, color: [f32; 4]);

    fn use_program(&mut self, program: ProgramId);

    /// Writes a `vec2<f32>` uniform of the current program.
    fn uniform_vec2(&mut self, slot: UniformSlot, value: [f32; 2]);

    /// Points a sampled-texture uniform of the current program at `unit`.
    fn uniform_texture_unit(&mut self, slot: UniformSlot, unit: u32);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn vertex_attrib_pointer(
        &mut self,
        slot: AttributeSlot,
        buffer: BufferId,
        pointer: AttributePointer,
    );

    fn enable_attribute(&mut self, slot: AttributeSlot);

    fn disable_attribute(&mut self, slot: AttributeSlot);

    /// Draws `count` 16-bit indices from `indices` as a triangle list.
    fn draw_indexed(&mut self, indices: BufferId, count: u32);

    /// Presents the frame built since the last present.
    fn present(&mut self);

    /// Pops the oldest queued error, if any.
    fn poll_error(&mut self) -> Option<String>;
}
