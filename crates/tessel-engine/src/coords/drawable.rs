use super::Vec2;

/// Drawable surface size in physical pixels.
///
/// May differ from the window's logical size under display scaling.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DrawableSize {
    pub width: u32,
    pub height: u32,
}

impl DrawableSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-sized drawable.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Per-axis scale from world units to normalized device coordinates.
    ///
    /// `(min(w, h) / w, -min(w, h) / h)`: sprites stay square on non-square
    /// surfaces, and the negated Y flips world space (+Y down) into device
    /// space (+Y up) so texture coordinates need no flip.
    ///
    /// Returns `None` for an empty drawable.
    pub fn camera_scale(self) -> Option<Vec2> {
        if self.is_empty() {
            return None;
        }
        let w = self.width as f32;
        let h = self.height as f32;
        let side = w.min(h);
        Some(Vec2::new(side / w, -side / h))
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for DrawableSize {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}
