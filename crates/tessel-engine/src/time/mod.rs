//! Time subsystem.
//!
//! - [`FrameClock`]: host-side frame counter with clamped delta time
//! - [`AnimationClock`]: fixed-step animation phase advanced once per frame

mod animation;
mod frame_clock;

pub use animation::AnimationClock;
pub use frame_clock::{FrameClock, FrameTime};
