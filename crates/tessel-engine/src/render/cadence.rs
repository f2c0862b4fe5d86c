/// When static vertex data and the index list are regenerated and uploaded.
///
/// Always on the first frame drawn with a fresh context and on frame 0.
/// With `Some(n)`, also on every frame index divisible by `n`; with `None`
/// the data is uploaded once per context and never again.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UploadCadence {
    interval: Option<u64>,
}

impl UploadCadence {
    pub const DEFAULT_INTERVAL: u64 = 100;

    pub fn every(interval: u64) -> Self {
        Self {
            interval: Some(interval.max(1)),
        }
    }

    pub fn once_per_context() -> Self {
        Self { interval: None }
    }

    pub fn from_interval(interval: Option<u64>) -> Self {
        interval.map_or_else(Self::once_per_context, Self::every)
    }

    pub fn interval(&self) -> Option<u64> {
        self.interval
    }

    pub fn static_due(&self, frame_index: u64, first_on_context: bool) -> bool {
        first_on_context
            || frame_index == 0
            || self.interval.is_some_and(|n| frame_index % n == 0)
    }
}

impl Default for UploadCadence {
    fn default() -> Self {
        Self::every(Self::DEFAULT_INTERVAL)
    }
}
