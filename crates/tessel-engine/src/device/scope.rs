//! Validation error scopes.
//!
//! wgpu hands out a guard per pushed scope; whatever the scope catches is
//! only reported by popping that guard. Errors raised while no scope is open
//! go to the uncaptured-error handler, which panics by default.

/// A validation scope kept open for the life of a device.
///
/// [`ErrorScope::drain`] pops it and opens a fresh one in its place, so
/// exactly one standing scope exists between calls.
pub(crate) struct ErrorScope {
    standing: Option<wgpu::ErrorScopeGuard>,
}

impl ErrorScope {
    pub fn open(device: &wgpu::Device) -> Self {
        Self {
            standing: Some(device.push_error_scope(wgpu::ErrorFilter::Validation)),
        }
    }

    /// Returns what the standing scope caught since the last drain.
    pub fn drain(&mut self, device: &wgpu::Device) -> Option<String> {
        let caught = self.close();
        self.standing = Some(device.push_error_scope(wgpu::ErrorFilter::Validation));
        caught
    }

    /// Pops the standing scope without opening another.
    fn close(&mut self) -> Option<String> {
        let guard = self.standing.take()?;
        pollster::block_on(guard.pop()).map(|e| e.to_string())
    }
}

impl Drop for ErrorScope {
    fn drop(&mut self) {
        if let Some(message) = self.close() {
            log::warn!("error caught while closing device: {message}");
        }
    }
}

/// Runs `f` inside its own validation scope and returns what it caught.
///
/// Must be called while the standing scope is the innermost one.
pub(crate) fn scoped<T>(
    device: &wgpu::Device,
    f: impl FnOnce(&wgpu::Device) -> T,
) -> (T, Option<wgpu::Error>) {
    let guard = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f(device);
    let error = pollster::block_on(guard.pop());
    (value, error)
}
