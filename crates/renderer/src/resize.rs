use std::time::Duration;

use scheduler::{Host, TimerHandle, TimerKind};

use crate::gpu::SurfaceSize;

/// Debounces container size observations into one settled size.
#[derive(Debug)]
pub struct ResizeHandler {
    quiet_period: Duration,
    pending: Option<TimerHandle>,
    latest: Option<SurfaceSize>,
}

impl ResizeHandler {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
            latest: None,
        }
    }

    /// Records a size and restarts the quiet period.
    pub fn observe<H: Host>(&mut self, host: &mut H, size: SurfaceSize) {
        self.latest = Some(size);
        if let Some(timer) = self.pending.take() {
            host.clear_timer(timer);
        }
        self.pending = Some(host.set_timer(self.quiet_period, TimerKind::ResizeSettle));
    }

    /// Returns the settled size when `handle` is the live quiet-period timer.
    pub fn on_timer(&mut self, handle: TimerHandle) -> Option<SurfaceSize> {
        if self.pending != Some(handle) {
            return None;
        }
        self.pending = None;
        self.latest.take()
    }

    pub fn cancel<H: Host>(&mut self, host: &mut H) {
        if let Some(timer) = self.pending.take() {
            host.clear_timer(timer);
        }
        self.latest = None;
    }
}
