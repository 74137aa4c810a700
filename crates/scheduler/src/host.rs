use std::fmt;
use std::time::Duration;

/// Token for one requested animation-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

/// Token for one scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Delay between a completed transition and the next cycle.
    CycleWait,
    /// Re-check for images that were not resident yet.
    ImagePoll,
    /// Fixed-interval progress step when pacing by wall clock.
    FrameTick,
    /// Backoff before rebuilding a lost rendering context.
    ContextRestore,
    /// Quiet period after the last container resize.
    ResizeSettle,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerKind::CycleWait => "cycle-wait",
            TimerKind::ImagePoll => "image-poll",
            TimerKind::FrameTick => "frame-tick",
            TimerKind::ContextRestore => "context-restore",
            TimerKind::ResizeSettle => "resize-settle",
        };
        f.write_str(name)
    }
}

/// Event-loop capability the engine schedules its work through.
///
/// Callbacks are one-shot. The host later reports an elapsed frame or timer
/// back to the engine with the handle it returned here; handles the engine no
/// longer holds are stale and get ignored there, so cancellation that races a
/// callback already in flight is harmless.
pub trait Host {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
    fn set_timer(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle;
    fn clear_timer(&mut self, handle: TimerHandle);
}

impl<H: Host + ?Sized> Host for &mut H {
    fn request_frame(&mut self) -> FrameHandle {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        (**self).cancel_frame(handle)
    }

    fn set_timer(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        (**self).set_timer(delay, kind)
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        (**self).clear_timer(handle)
    }
}
