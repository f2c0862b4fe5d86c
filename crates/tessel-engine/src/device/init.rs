/// Initialization parameters for a wgpu-backed context.
///
/// Kept alongside the window in the context factory so every rebuild after a
/// resize requests the same device.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Backends the instance may pick from.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Prefer an sRGB surface format when available.
    ///
    /// The atlas is uploaded as sRGB, so an sRGB target keeps sampled colors
    /// unchanged on screen.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is the only mode guaranteed everywhere.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference; falls back to the first supported one.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Hint only; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            desired_maximum_frame_latency: 2,
        }
    }
}
