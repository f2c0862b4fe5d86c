/// The frame being built between two presents.
///
/// Acquired lazily by the first command that needs the target. Holding the
/// surface texture blocks acquisition of the next one, so the frame must be
/// presented (or dropped) promptly.
pub(crate) struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
