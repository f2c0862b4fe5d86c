/// Fixed-step animation clock.
///
/// Advances by the same step every rendered frame regardless of wall time,
/// so the animation is a pure function of the number of frames drawn.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AnimationClock {
    t: f32,
    step: f32,
}

impl AnimationClock {
    pub const DEFAULT_STEP: f32 = 0.01;

    pub fn new(step: f32) -> Self {
        debug_assert!(step >= 0.0 && step.is_finite());
        Self { t: 0.0, step }
    }

    /// Advances the clock and returns the new phase.
    ///
    /// The first call returns `step`, never zero.
    pub fn advance(&mut self) -> f32 {
        self.t += self.step;
        self.t
    }

    /// Current phase without advancing.
    pub fn now(&self) -> f32 {
        self.t
    }
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STEP)
    }
}
