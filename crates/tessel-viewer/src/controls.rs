use std::collections::HashSet;

use tessel_engine::FrameInput;
use tessel_engine::coords::Vec2;
use winit::event::MouseScrollDelta;
use winit::keyboard::KeyCode;

/// Camera movement per frame while a pan key is held.
const PAN_STEP: f32 = 0.01;
/// Rotation change per frame while a rotate key is held.
const ROTATE_STEP: f32 = 0.05;
/// Camera movement per wheel line.
const WHEEL_STEP: f32 = 0.1;
/// Pixels counted as one wheel line for touchpads.
const PIXELS_PER_LINE: f64 = 20.0;

/// Camera and rotation state driven by keyboard and wheel.
///
/// Q/E pan along x, W/S along y, A/D rotate. Held keys act once per frame.
#[derive(Debug, Default)]
pub struct Controls {
    held: HashSet<KeyCode>,
    camera: Vec2,
    rotation: f32,
}

impl Controls {
    pub fn key(&mut self, code: KeyCode, pressed: bool) {
        if pressed {
            self.held.insert(code);
        } else {
            self.held.remove(&code);
        }
    }

    pub fn wheel(&mut self, delta: MouseScrollDelta) {
        let (dx, dy) = match delta {
            MouseScrollDelta::LineDelta(x, y) => (x, y),
            MouseScrollDelta::PixelDelta(p) => (
                (p.x / PIXELS_PER_LINE) as f32,
                (p.y / PIXELS_PER_LINE) as f32,
            ),
        };
        self.camera += Vec2::new(dx, dy) * WHEEL_STEP;
    }

    /// Forgets held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    /// Applies held keys for one frame and snapshots the result.
    pub fn frame(&mut self, frame_index: u64) -> FrameInput {
        for code in &self.held {
            match code {
                KeyCode::KeyQ => self.camera.x -= PAN_STEP,
                KeyCode::KeyE => self.camera.x += PAN_STEP,
                KeyCode::KeyW => self.camera.y -= PAN_STEP,
                KeyCode::KeyS => self.camera.y += PAN_STEP,
                KeyCode::KeyA => self.rotation -= ROTATE_STEP,
                KeyCode::KeyD => self.rotation += ROTATE_STEP,
                _ => {}
            }
        }

        FrameInput {
            camera: self.camera,
            rotation: self.rotation,
            frame_index,
        }
    }
}
