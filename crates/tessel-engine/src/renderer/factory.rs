use std::sync::Arc;

use crate::device::{GpuApi, GpuInit, NativeWindow, WgpuDevice};
use crate::error::SetupError;

/// Creates graphics contexts for one window.
///
/// The renderer keeps its factory for its whole life and asks it for a fresh
/// context on every rebuild, so the window it wraps is never replaced.
pub trait ContextFactory {
    type Api: GpuApi;

    fn create_context(&mut self) -> Result<Self::Api, SetupError>;
}

/// Context factory for the wgpu backend.
pub struct WgpuFactory<W: NativeWindow> {
    window: Arc<W>,
    init: GpuInit,
}

impl<W: NativeWindow> WgpuFactory<W> {
    pub fn new(window: Arc<W>, init: GpuInit) -> Self {
        Self { window, init }
    }
}

impl<W: NativeWindow> ContextFactory for WgpuFactory<W> {
    type Api = WgpuDevice<W>;

    fn create_context(&mut self) -> Result<WgpuDevice<W>, SetupError> {
        pollster::block_on(WgpuDevice::new(self.window.clone(), self.init.clone()))
            .map_err(|e| SetupError::device("create graphics context", format!("{e:#}")))
    }
}
