//! Tessel engine crate.
//!
//! Renders an animated grid of textured sprites through a retained-mode GPU
//! pipeline: static per-corner geometry is uploaded rarely, per-frame
//! transforms are streamed every frame.

pub mod atlas;
pub mod coords;
pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod renderer;
pub mod shader;
pub mod time;

pub use atlas::{Atlas, AtlasError};
pub use error::{SetupError, ShaderError, TransientGraphicsError};
pub use render::{FrameInput, FrameResult};
pub use renderer::{ContextFactory, Renderer, RendererConfig, RendererState, WgpuFactory};
