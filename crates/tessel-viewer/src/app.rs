use std::sync::Arc;

use anyhow::{Context, Result};
use tessel_engine::device::GpuInit;
use tessel_engine::time::FrameClock;
use tessel_engine::{Atlas, Renderer, RendererConfig, WgpuFactory};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::controls::Controls;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "tessel".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Runs the viewer until the window closes.
///
/// Returns the first fatal error raised while the loop was running.
pub fn run(
    runtime: RuntimeConfig,
    gpu_init: GpuInit,
    renderer_config: RendererConfig,
    atlas: Atlas,
) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut viewer = Viewer {
        runtime,
        gpu_init,
        renderer_config,
        atlas,
        session: None,
        controls: Controls::default(),
        clock: FrameClock::new(),
        visibility: Visibility::default(),
        fatal: None,
    };

    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;

    match viewer.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Session {
    window: Arc<Window>,
    renderer: Renderer<WgpuFactory<Window>>,
}

struct Viewer {
    runtime: RuntimeConfig,
    gpu_init: GpuInit,
    renderer_config: RendererConfig,
    atlas: Atlas,

    session: Option<Session>,
    controls: Controls,
    clock: FrameClock,
    visibility: Visibility,
    fatal: Option<anyhow::Error>,
}

/// Frames are drawn only while the window is neither occluded nor zero
/// sized. The two conditions are tracked independently.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Visibility {
    occluded: bool,
    zero_size: bool,
}

impl Visibility {
    fn is_visible(self) -> bool {
        !self.occluded && !self.zero_size
    }

    fn set_occluded(&mut self, occluded: bool) {
        self.occluded = occluded;
    }

    /// Records a new inner size; `false` when it is empty.
    fn resized(&mut self, width: u32, height: u32) -> bool {
        self.zero_size = width == 0 || height == 0;
        !self.zero_size
    }
}

impl Viewer {
    fn open_session(&self, event_loop: &ActiveEventLoop) -> Result<Session> {
        let attrs = Window::default_attributes()
            .with_title(self.runtime.title.clone())
            .with_inner_size(self.runtime.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let factory = WgpuFactory::new(window.clone(), self.gpu_init.clone());
        let renderer = Renderer::create(
            factory,
            self.atlas.clone(),
            self.renderer_config.clone(),
        )
        .context("failed to initialize renderer")?;

        Ok(Session { window, renderer })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal.get_or_insert(err);
        event_loop.exit();
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if code == KeyCode::Escape && event.state == ElementState::Released {
            event_loop.exit();
            return;
        }
        self.controls.key(code, event.state.is_pressed());
    }

    fn redraw(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !self.visibility.is_visible() {
            return;
        }

        let ft = self.clock.tick();
        let input = self.controls.frame(ft.frame_index);
        let result = session.renderer.render(&input);

        if !result.errors.is_empty() {
            log::debug!(
                "frame {} finished with {} GPU error(s)",
                ft.frame_index,
                result.errors.len()
            );
        }
        if ft.frame_index % 600 == 0 {
            log::debug!("frame {} dt={:.2}ms", ft.frame_index, ft.dt * 1000.0);
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }

        match self.open_session(event_loop) {
            Ok(session) => {
                session.window.request_redraw();
                self.session = Some(session);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw while visible.
        if self.visibility.is_visible() {
            if let Some(session) = &self.session {
                session.window.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput { event, .. } => self.on_key(event_loop, &event),

            WindowEvent::MouseWheel { delta, .. } => self.controls.wheel(delta),

            WindowEvent::Focused(false) => self.controls.release_all(),

            WindowEvent::Occluded(occluded) => {
                self.visibility.set_occluded(occluded);
                if !occluded {
                    self.clock.reset();
                }
            }

            WindowEvent::Resized(size) => {
                if !self.visibility.resized(size.width, size.height) {
                    return;
                }

                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if let Err(err) = session.renderer.handle_resize() {
                    self.fail(event_loop, anyhow::Error::new(err).context("failed to rebuild renderer"));
                }
            }

            WindowEvent::RedrawRequested => self.redraw(),

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.take() {
            session.renderer.destroy();
        }
    }
}
