//! Sprite grid rendering.
//!
//! - [`GridTopology`]: grid layout, index list, vertex fills
//! - [`GeometryBuffers`]: static / dynamic / index device buffers
//! - [`UploadCadence`]: when static data is regenerated
//! - [`FrameComposer`]: the per-frame sequence from clear to present

mod buffers;
mod cadence;
mod composer;
mod grid;
mod vertex;

pub use buffers::GeometryBuffers;
pub use cadence::UploadCadence;
pub use composer::{FrameComposer, FrameInput, FrameResult, FrameTargets};
pub use grid::{GridTopology, CORNER_INDEX};
pub use vertex::{DynamicVertex, StaticVertex};
