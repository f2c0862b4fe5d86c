//! Embedded shader sources.

/// Vertex stage: rotates each corner, offsets it by the sprite position and
/// maps world coordinates to clip space through the camera uniforms.
pub const SPRITE_VERTEX: &str = include_str!("sprite_vertex.wgsl");

/// Fragment stage: samples the atlas.
pub const SPRITE_FRAGMENT: &str = include_str!("sprite_fragment.wgsl");
