use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::coords::DrawableSize;

/// A native window a wgpu surface can be created for.
///
/// The context factory keeps an `Arc` of it, so the same window is reused by
/// every context rebuilt after a resize.
pub trait NativeWindow: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static {
    /// Drawable size in physical pixels.
    fn drawable_size(&self) -> DrawableSize;

    /// Called right before a frame is presented.
    fn pre_present_notify(&self) {}
}

impl NativeWindow for winit::window::Window {
    fn drawable_size(&self) -> DrawableSize {
        self.inner_size().into()
    }

    fn pre_present_notify(&self) {
        winit::window::Window::pre_present_notify(self);
    }
}
