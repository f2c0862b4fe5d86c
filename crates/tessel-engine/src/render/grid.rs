use super::vertex::{DynamicVertex, StaticVertex};
use crate::atlas::SpriteLocation;
use crate::error::SetupError;

/// Corner order of the two triangles making up one sprite quad.
pub const CORNER_INDEX: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Vertex count limit for 16-bit indices. Index 0xFFFF is never emitted.
const MAX_VERTICES: u64 = u16::MAX as u64;

/// Staggered `side` x `side` sprite grid spanning roughly [-1, 1]².
///
/// Odd rows are shifted half a cell to the right.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GridTopology {
    side: u32,
}

impl GridTopology {
    pub fn new(side: u32) -> Result<Self, SetupError> {
        let vertices = u64::from(side) * u64::from(side) * 4;
        if side == 0 || vertices > MAX_VERTICES {
            return Err(SetupError::GridTooLarge { side, vertices });
        }
        Ok(Self { side })
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn sprite_count(&self) -> usize {
        (self.side * self.side) as usize
    }

    pub fn vertex_count(&self) -> usize {
        self.sprite_count() * 4
    }

    pub fn index_count(&self) -> usize {
        self.sprite_count() * 6
    }

    /// World size of one grid cell.
    pub fn cell(&self) -> f32 {
        2.0 / self.side as f32
    }

    /// Centre of sprite `j`, independent of time.
    pub fn sprite_center(&self, j: usize) -> [f32; 2] {
        let side = self.side as usize;
        let s = self.side as f32;
        let col = (j % side) as f32;
        let row = (j / side) as f32;
        let stagger = ((j / side) % 2) as f32 * 0.5;
        [
            (0.5 + col - 0.5 * s + stagger - 0.25) * self.cell(),
            (0.5 + row - 0.5 * s) * self.cell(),
        ]
    }

    /// Rewrites `out` with the index list: six per sprite, offset by 4 per sprite.
    pub fn fill_indices(&self, out: &mut Vec<u16>) {
        out.clear();
        out.extend((0..self.sprite_count()).flat_map(|j| {
            let base = (j * 4) as u16;
            CORNER_INDEX.iter().map(move |&c| base + c)
        }));
    }

    /// Rewrites `out` with four corners per sprite, all cut from `sprite`.
    pub fn fill_static(&self, sprite: &SpriteLocation, out: &mut Vec<StaticVertex>) {
        let corners = sprite.corners(self.cell()).map(|[x, y, s, t]| StaticVertex {
            corner: [x, y],
            texcoord: [s, t],
        });
        out.clear();
        out.reserve(self.vertex_count());
        for _ in 0..self.sprite_count() {
            out.extend_from_slice(&corners);
        }
    }

    /// Rewrites `out` with every sprite's centre and rotation at time `t`.
    ///
    /// Sprite `j` turns at `0.03 * j` times the base rate, so the grid fans
    /// out as `t` grows. All four corners of a sprite carry the same record.
    pub fn fill_dynamic(&self, rotation: f32, t: f32, out: &mut Vec<DynamicVertex>) {
        out.clear();
        out.reserve(self.vertex_count());
        for j in 0..self.sprite_count() {
            let record = DynamicVertex {
                position: self.sprite_center(j),
                rotation: rotation + j as f32 * 0.03 * t,
            };
            out.extend_from_slice(&[record; 4]);
        }
    }
}
