use std::time::Duration;

use crate::host::{FrameHandle, Host, TimerHandle, TimerKind};

#[derive(Debug, Clone, Copy)]
struct ScheduledTimer {
    handle: TimerHandle,
    kind: TimerKind,
    due: Duration,
}

/// Deterministic host driven by virtual time.
///
/// Frames are delivered only when the caller drains them with
/// [`ManualHost::take_frames`]; timers fire when [`ManualHost::advance`] moves
/// the clock past their deadline.
#[derive(Debug, Default)]
pub struct ManualHost {
    now: Duration,
    next_id: u64,
    frames: Vec<FrameHandle>,
    timers: Vec<ScheduledTimer>,
    frames_requested: u64,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_timers_of(&self, kind: TimerKind) -> usize {
        self.timers.iter().filter(|timer| timer.kind == kind).count()
    }

    pub fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    /// Deadline of the earliest pending timer, relative to the current time.
    pub fn next_due(&self) -> Option<Duration> {
        self.timers
            .iter()
            .map(|timer| timer.due.saturating_sub(self.now))
            .min()
    }

    /// Hands out every frame callback requested so far, as one display refresh
    /// would.
    pub fn take_frames(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.frames)
    }

    /// Moves the clock forward and returns the timers that expired, earliest
    /// first. Expired timers are removed from the pending set.
    pub fn advance(&mut self, by: Duration) -> Vec<(TimerHandle, TimerKind)> {
        self.now += by;
        let now = self.now;
        let mut expired: Vec<ScheduledTimer> = Vec::new();
        self.timers.retain(|timer| {
            if timer.due <= now {
                expired.push(*timer);
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|timer| (timer.due, timer.handle));
        expired
            .into_iter()
            .map(|timer| (timer.handle, timer.kind))
            .collect()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for ManualHost {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id());
        self.frames.push(handle);
        self.frames_requested += 1;
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.frames.retain(|pending| *pending != handle);
    }

    fn set_timer(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let handle = TimerHandle(self.next_id());
        self.timers.push(ScheduledTimer {
            handle,
            kind,
            due: self.now + delay,
        });
        handle
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        self.timers.retain(|timer| timer.handle != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut host = ManualHost::new();
        let late = host.set_timer(Duration::from_millis(300), TimerKind::CycleWait);
        let early = host.set_timer(Duration::from_millis(100), TimerKind::ImagePoll);
        assert_eq!(host.next_due(), Some(Duration::from_millis(100)));

        assert!(host.advance(Duration::from_millis(99)).is_empty());
        let fired = host.advance(Duration::from_millis(250));
        assert_eq!(
            fired,
            vec![(early, TimerKind::ImagePoll), (late, TimerKind::CycleWait)]
        );
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn cancelled_work_is_not_delivered() {
        let mut host = ManualHost::new();
        let frame = host.request_frame();
        let timer = host.set_timer(Duration::from_millis(10), TimerKind::FrameTick);
        host.cancel_frame(frame);
        host.clear_timer(timer);
        assert!(host.take_frames().is_empty());
        assert!(host.advance(Duration::from_secs(1)).is_empty());
        assert_eq!(host.frames_requested(), 1);
    }
}
