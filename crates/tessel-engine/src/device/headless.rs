//! Surface-less device for tests of the wgpu backend.

/// Opens a device on any available adapter, software ones included.
///
/// `None` when the machine has no adapter at all; callers skip.
pub(crate) fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(err) => {
                eprintln!("no GPU adapter, skipping: {err}");
                return None;
            }
        };

        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessel test device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .ok()
    })
}
