use super::RendererConfig;
use crate::atlas::Atlas;
use crate::device::{GpuApi, TextureId};
use crate::error::SetupError;
use crate::render::{FrameComposer, FrameInput, FrameResult, FrameTargets, GeometryBuffers};
use crate::shader::ShaderProgram;

/// Everything bound to one graphics context.
///
/// Built all at once and torn down all at once. Dropping the core deletes the
/// texture, buffers and program through the context, then drops the context
/// itself.
pub(crate) struct RenderCore<A: GpuApi> {
    api: A,
    program: Option<ShaderProgram>,
    buffers: Option<GeometryBuffers>,
    texture: Option<TextureId>,
    /// Set once a frame has been drawn on this context.
    initialized: bool,
}

impl<A: GpuApi> RenderCore<A> {
    pub fn new(api: A, atlas: &Atlas, config: &RendererConfig) -> Result<Self, SetupError> {
        // Partially built cores release what they hold on drop.
        let mut core = Self {
            api,
            program: None,
            buffers: None,
            texture: None,
            initialized: false,
        };

        core.program = Some(ShaderProgram::create(
            &mut core.api,
            &config.vertex_shader,
            &config.fragment_shader,
        )?);
        core.buffers = Some(GeometryBuffers::create(&mut core.api)?);
        core.texture = Some(
            core.api
                .create_texture(atlas.image())
                .map_err(|message| SetupError::device("upload atlas texture", message))?,
        );

        while let Some(message) = core.api.poll_error() {
            log::warn!("setup: {message}");
        }

        Ok(core)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn render(
        &mut self,
        composer: &mut FrameComposer,
        atlas: &Atlas,
        input: &FrameInput,
    ) -> FrameResult {
        let (Some(program), Some(buffers), Some(texture)) =
            (self.program.as_ref(), self.buffers.as_ref(), self.texture)
        else {
            return FrameResult::skipped();
        };

        let targets = FrameTargets {
            program,
            buffers,
            texture,
            atlas,
        };
        let result = composer.compose(&mut self.api, &targets, input, !self.initialized);
        if result.drawn {
            self.initialized = true;
        }
        result
    }
}

impl<A: GpuApi> Drop for RenderCore<A> {
    fn drop(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.api.delete_texture(texture);
        }
        if let Some(buffers) = self.buffers.take() {
            buffers.release(&mut self.api);
        }
        if let Some(program) = self.program.take() {
            program.release(&mut self.api);
        }
        log::debug!("render core released");
    }
}
