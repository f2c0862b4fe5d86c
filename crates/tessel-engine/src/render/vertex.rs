use bytemuck::{Pod, Zeroable};

use crate::device::{AttributeFormat, AttributePointer};

/// Per-corner attributes that only change with the atlas layout or grid.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct StaticVertex {
    /// Corner relative to the sprite centre, world units.
    pub corner: [f32; 2],
    /// Texture s,t of this corner.
    pub texcoord: [f32; 2],
}

impl StaticVertex {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub const CORNER: AttributePointer = AttributePointer {
        format: AttributeFormat::Float32x2,
        stride: Self::STRIDE,
        offset: std::mem::offset_of!(StaticVertex, corner) as u32,
    };

    pub const TEXCOORD: AttributePointer = AttributePointer {
        format: AttributeFormat::Float32x2,
        stride: Self::STRIDE,
        offset: std::mem::offset_of!(StaticVertex, texcoord) as u32,
    };
}

/// Per-corner attributes rewritten every frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct DynamicVertex {
    /// Sprite centre, world units.
    pub position: [f32; 2],
    /// Radians.
    pub rotation: f32,
}

impl DynamicVertex {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub const POSITION: AttributePointer = AttributePointer {
        format: AttributeFormat::Float32x2,
        stride: Self::STRIDE,
        offset: std::mem::offset_of!(DynamicVertex, position) as u32,
    };

    pub const ROTATION: AttributePointer = AttributePointer {
        format: AttributeFormat::Float32,
        stride: Self::STRIDE,
        offset: std::mem::offset_of!(DynamicVertex, rotation) as u32,
    };
}
