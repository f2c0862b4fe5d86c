//! GPU device layer.
//!
//! [`GpuApi`] is the handle-based command surface the renderer is written
//! against. [`WgpuDevice`] implements it on wgpu:
//! - creates the wgpu Instance/Adapter/Device/Queue
//! - creates & configures the Surface (swapchain) for a [`NativeWindow`]
//! - builds pipelines lazily from the enabled attribute pointers
//! - acquires a frame on first use and presents it on `present`
//! - keeps a validation scope open so `poll_error` can report errors

mod api;
mod frame;
mod gpu;
mod init;
mod linked;
mod scope;
mod state;
mod surface;
mod window;

#[cfg(test)]
pub(crate) mod headless;
#[cfg(test)]
pub(crate) mod recording;

pub use api::{
    AttributeFormat, AttributePointer, AttributeSlot, BufferId, BufferTarget, BufferUsage,
    GpuApi, ProgramId, ShaderId, ShaderStage, TextureId, UniformSlot,
};
pub use gpu::WgpuDevice;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
pub use window::NativeWindow;
