/// One sprite inside an atlas.
///
/// `x0..x1`, `y0..y1` is the sprite quad in sprite-local units (centred on the
/// origin, +Y down); `s0..s1`, `t0..t1` is the matching normalized texture
/// sub-rectangle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteLocation {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub s0: f32,
    pub t0: f32,
    pub s1: f32,
    pub t1: f32,
}

impl SpriteLocation {
    /// Whole-texture sprite for a `width` x `height` image, unit-sized along
    /// its longer side.
    pub fn whole_image(width: u32, height: u32) -> Self {
        let longest = width.max(height).max(1) as f32;
        let hw = 0.5 * width as f32 / longest;
        let hh = 0.5 * height as f32 / longest;
        Self {
            x0: -hw,
            y0: -hh,
            x1: hw,
            y1: hh,
            s0: 0.0,
            t0: 0.0,
            s1: 1.0,
            t1: 1.0,
        }
    }

    /// Corners in draw order: top-left, top-right, bottom-left, bottom-right.
    ///
    /// Each is `(x, y, s, t)` with the quad scaled by `scale`.
    pub fn corners(&self, scale: f32) -> [[f32; 4]; 4] {
        [
            [self.x0 * scale, self.y0 * scale, self.s0, self.t0],
            [self.x1 * scale, self.y0 * scale, self.s1, self.t0],
            [self.x0 * scale, self.y1 * scale, self.s0, self.t1],
            [self.x1 * scale, self.y1 * scale, self.s1, self.t1],
        ]
    }
}
