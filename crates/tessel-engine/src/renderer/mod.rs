//! Surface/context manager.
//!
//! [`Renderer`] owns the context factory, the atlas and the frame composer,
//! plus at most one render core. A resize drops the core (and with it the
//! context) and builds a new one from the same factory.

mod factory;
mod render_core;

use std::borrow::Cow;

use self::render_core::RenderCore;
use crate::atlas::Atlas;
use crate::device::GpuApi;
use crate::error::SetupError;
use crate::render::{FrameComposer, FrameInput, FrameResult, GridTopology, UploadCadence};
use crate::shader::source::{SPRITE_FRAGMENT, SPRITE_VERTEX};
use crate::time::AnimationClock;

pub use factory::{ContextFactory, WgpuFactory};

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Sprites per grid row and column.
    pub side: u32,

    /// Frames between static-data refreshes; `None` refreshes only on the
    /// first frame of each context.
    pub static_refresh_interval: Option<u64>,

    /// Animation phase added per rendered frame.
    pub animation_step: f32,

    pub clear_color: [f32; 4],

    pub vertex_shader: Cow<'static, str>,
    pub fragment_shader: Cow<'static, str>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            side: 10,
            static_refresh_interval: Some(UploadCadence::DEFAULT_INTERVAL),
            animation_step: AnimationClock::DEFAULT_STEP,
            clear_color: [1.0, 1.0, 1.0, 1.0],
            vertex_shader: Cow::Borrowed(SPRITE_VERTEX),
            fragment_shader: Cow::Borrowed(SPRITE_FRAGMENT),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RendererState {
    /// No core: a rebuild failed, frames are skipped.
    Uninitialized,
    Ready,
}

pub struct Renderer<F: ContextFactory> {
    factory: F,
    atlas: Atlas,
    config: RendererConfig,
    composer: FrameComposer,
    core: Option<RenderCore<F::Api>>,
}

impl<F: ContextFactory> Renderer<F> {
    /// Builds the first core. Any failure is fatal to the caller.
    pub fn create(factory: F, atlas: Atlas, config: RendererConfig) -> Result<Self, SetupError> {
        let grid = GridTopology::new(config.side)?;
        let composer = FrameComposer::new(
            grid,
            UploadCadence::from_interval(config.static_refresh_interval),
            AnimationClock::new(config.animation_step),
            config.clear_color,
        );

        let mut renderer = Self {
            factory,
            atlas,
            config,
            composer,
            core: None,
        };
        renderer.core = Some(renderer.build_core()?);

        log::info!(
            "renderer ready: {0}x{0} sprites, static refresh {1}",
            grid.side(),
            match renderer.config.static_refresh_interval {
                Some(n) => format!("every {n} frames"),
                None => "once per context".to_owned(),
            }
        );
        Ok(renderer)
    }

    fn build_core(&mut self) -> Result<RenderCore<F::Api>, SetupError> {
        let api = self.factory.create_context()?;
        RenderCore::new(api, &self.atlas, &self.config)
    }

    /// Draws and presents one frame. Skipped while uninitialized.
    pub fn render(&mut self, input: &FrameInput) -> FrameResult {
        match self.core.as_mut() {
            Some(core) => core.render(&mut self.composer, &self.atlas, input),
            None => FrameResult::skipped(),
        }
    }

    /// Tears the whole core down and rebuilds it for the current surface size.
    ///
    /// The old context is gone before the new one is created. On failure the
    /// renderer stays uninitialized until the next successful call.
    pub fn handle_resize(&mut self) -> Result<(), SetupError> {
        self.core = None;
        let core = self.build_core()?;
        log::info!("render core rebuilt at {:?}", core.api().drawable_size());
        self.core = Some(core);
        Ok(())
    }

    pub fn state(&self) -> RendererState {
        if self.core.is_some() {
            RendererState::Ready
        } else {
            RendererState::Uninitialized
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Releases every GPU object, then the context.
    pub fn destroy(mut self) {
        self.core = None;
        log::info!("renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{DrawableSize, Vec2};
    use crate::device::recording::{Call, RecordingFactory};
    use crate::error::ShaderError;

    fn input(frame_index: u64) -> FrameInput {
        FrameInput {
            camera: Vec2::ZERO,
            rotation: 0.0,
            frame_index,
        }
    }

    fn renderer() -> Renderer<RecordingFactory> {
        Renderer::create(
            RecordingFactory::new("main window"),
            Atlas::placeholder(16),
            RendererConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn create_is_ready_and_renders() {
        let mut r = renderer();
        assert_eq!(r.state(), RendererState::Ready);

        let result = r.render(&input(0));
        assert!(result.drawn);
        assert!(result.static_uploaded);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn resize_round_trip_rebuilds_everything() {
        let mut r = renderer();
        let ledger = r.factory().ledger.clone();
        for f in 0..57 {
            r.render(&input(f));
        }
        let objects_before = ledger.borrow().live_objects();

        ledger.borrow_mut().drawable = DrawableSize::new(1024, 768);
        r.handle_resize().unwrap();

        assert_eq!(r.state(), RendererState::Ready);
        assert_eq!(r.factory().window, "main window");
        {
            let l = ledger.borrow();
            assert_eq!(l.live_contexts, 1);
            assert_eq!(l.live_objects(), objects_before);
        }

        let result = r.render(&input(57));
        assert!(result.drawn);
        assert!(result.static_uploaded, "fresh context must get static data");
    }

    #[test]
    fn old_objects_are_released_before_the_old_context() {
        let mut r = renderer();
        let ledger = r.factory().ledger.clone();
        r.render(&input(0));
        r.handle_resize().unwrap();

        let l = ledger.borrow();
        let destroyed = l
            .position(|c| matches!(c, Call::DestroyContext))
            .unwrap();
        let recreated = l
            .rposition(|c| matches!(c, Call::CreateContext))
            .unwrap();
        let deleted_texture = l.position(|c| matches!(c, Call::DeleteTexture(_))).unwrap();
        let deleted_buffer = l.position(|c| matches!(c, Call::DeleteBuffer(_))).unwrap();
        let deleted_program = l.position(|c| matches!(c, Call::DeleteProgram(_))).unwrap();

        assert!(deleted_texture < destroyed);
        assert!(deleted_buffer < destroyed);
        assert!(deleted_program < destroyed);
        assert!(destroyed < recreated);
        assert_eq!(l.count(|c| matches!(c, Call::DeleteBuffer(_))), 3);
    }

    #[test]
    fn destroy_leaks_nothing() {
        let mut r = renderer();
        let ledger = r.factory().ledger.clone();
        for f in 0..5 {
            r.render(&input(f));
        }
        r.handle_resize().unwrap();
        r.render(&input(5));
        r.destroy();

        let l = ledger.borrow();
        assert_eq!(l.live_objects(), 0);
        assert_eq!(l.live_contexts, 0);
    }

    #[test]
    fn animation_survives_rebuild() {
        let mut r = renderer();
        for f in 0..3 {
            r.render(&input(f));
        }
        r.handle_resize().unwrap();
        r.render(&input(3));
        assert!((r.composer.clock().now() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn link_failure_makes_create_fail() {
        let factory = RecordingFactory::new("main window");
        let ledger = factory.ledger.clone();
        let config = RendererConfig {
            fragment_shader: Cow::Borrowed(
                "@fragment fn fs_main(@location(3) glow: f32) -> @location(0) vec4<f32> { return vec4<f32>(glow); }",
            ),
            ..RendererConfig::default()
        };

        let err = Renderer::create(factory, Atlas::placeholder(16), config)
            .err()
            .unwrap();
        assert!(matches!(
            &err,
            SetupError::Shader(ShaderError::Link { log })
                if log == "error: fragment input `glow` at location 3 is not written by the vertex stage"
        ));
        assert_eq!(err.operation(), "link shaders");

        let l = ledger.borrow();
        assert_eq!(l.live_objects(), 0);
        assert_eq!(l.live_contexts, 0);
    }

    #[test]
    fn texture_failure_releases_program_and_buffers() {
        let factory = RecordingFactory::new("main window");
        let ledger = factory.ledger.clone();
        ledger.borrow_mut().fail_texture = true;

        let err = Renderer::create(factory, Atlas::placeholder(16), RendererConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.operation(), "upload atlas texture");
        assert_eq!(ledger.borrow().live_objects(), 0);
        assert_eq!(ledger.borrow().live_contexts, 0);
    }

    #[test]
    fn failed_rebuild_leaves_renderer_uninitialized_until_next_resize() {
        let mut r = renderer();
        let ledger = r.factory().ledger.clone();

        ledger.borrow_mut().fail_context = true;
        let err = r.handle_resize().unwrap_err();
        assert_eq!(err.operation(), "create context");
        assert_eq!(r.state(), RendererState::Uninitialized);
        assert!(!r.render(&input(1)).drawn);
        assert_eq!(ledger.borrow().live_contexts, 0);

        ledger.borrow_mut().fail_context = false;
        r.handle_resize().unwrap();
        assert_eq!(r.state(), RendererState::Ready);
        assert!(r.render(&input(2)).drawn);
    }

    #[test]
    fn oversized_grid_is_fatal() {
        let config = RendererConfig {
            side: 200,
            ..RendererConfig::default()
        };
        let err = Renderer::create(RecordingFactory::new("w"), Atlas::placeholder(4), config)
            .err()
            .unwrap();
        assert_eq!(err.operation(), "size sprite grid");
    }
}
