//! Coordinate types.
//!
//! World space: sprite grid spans roughly [-1, 1] on both axes, +Y down.
//! Device space: normalized device coordinates, +Y up. The camera scale
//! uniform maps one to the other (see [`DrawableSize::camera_scale`]).

mod drawable;
mod vec2;

pub use drawable::DrawableSize;
pub use vec2::Vec2;
