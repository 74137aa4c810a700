use std::time::Duration;

use fadeconfig::{CarouselConfig, Pacing};
use tracing::{debug, info};

use crate::host::{FrameHandle, Host, TimerHandle, TimerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Transitioning,
    Waiting,
    Paused,
    Stopped,
}

impl Status {
    /// Whether the carousel is cycling on its own (as opposed to parked).
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Status::Loading | Status::Transitioning | Status::Waiting
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub status: Status,
    pub progress: f32,
    pub effect_index: usize,
    pub image_index: usize,
}

/// The effect and image pair of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    pub effect_index: usize,
    pub from_image: usize,
    pub to_image: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Program linked and textures uploaded; an effect may carry its own step
    /// interval for wall-clock pacing.
    Ready { frame_interval: Option<Duration> },
    /// Images for the cue are not resident yet.
    Pending,
}

/// What playback drives: the GPU-facing half of a carousel.
pub trait Stage {
    type Error: std::error::Error + 'static;

    fn image_count(&self) -> usize;
    fn effect_count(&self) -> usize;
    fn prepare(&mut self, cue: &Cue) -> Result<Readiness, Self::Error>;
    fn draw(&mut self, cue: &Cue, progress: f32) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError<E: std::error::Error + 'static> {
    #[error("playback was stopped; rebuild the surface before starting again")]
    Stopped,
    #[error(
        "cycle aborted for effect {} (image {} -> {})",
        cue.effect_index,
        cue.from_image,
        cue.to_image
    )]
    Stage {
        cue: Cue,
        #[source]
        source: E,
    },
}

/// Outcome of one call into [`Playback`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Nothing to do: stale handle, or a no-op for the current status.
    Ignored,
    /// Images are not resident; a poll timer is armed.
    Pending,
    /// The transition loop is registered for this cue.
    Started(Cue),
    Drawn { progress: f32 },
    /// The final frame was drawn and the inter-cycle wait is armed.
    Completed(Cue),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub carousel_time: Duration,
    pub step: f32,
    pub pacing: Pacing,
    pub frame_interval: Duration,
    pub image_poll: Duration,
}

impl PlaybackSettings {
    pub fn from_config(config: &CarouselConfig) -> Self {
        Self {
            carousel_time: config.carousel_time,
            step: config.step,
            pacing: config.pacing,
            frame_interval: config.frame_interval,
            image_poll: config.image_poll,
        }
    }

    /// Number of steps after which progress reads exactly 1.0.
    fn frames_to_complete(&self) -> u32 {
        ((1.0 / self.step) - 1e-3).ceil().max(1.0) as u32
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from_config(&CarouselConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Frame(FrameHandle),
    Interval(TimerHandle),
}

/// Playback state machine.
///
/// Every piece of scheduled work is held as a single token: at most one tick
/// (frame callback or interval timer) and at most one pending timer (cycle wait
/// or image poll). Scheduling anything cancels the previous token first, and
/// callbacks carrying a token that is no longer held are ignored.
#[derive(Debug)]
pub struct Playback {
    settings: PlaybackSettings,
    status: Status,
    frames: u32,
    effect_index: usize,
    image_index: usize,
    current: Option<Cue>,
    tick: Option<Tick>,
    pending: Option<(TimerHandle, TimerKind)>,
    interval: Duration,
    resume_after_rebuild: bool,
}

impl Playback {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            interval: settings.frame_interval,
            settings,
            status: Status::Idle,
            frames: 0,
            effect_index: 0,
            image_index: 0,
            current: None,
            tick: None,
            pending: None,
            resume_after_rebuild: false,
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn progress(&self) -> f32 {
        if self.frames >= self.settings.frames_to_complete() {
            1.0
        } else {
            self.frames as f32 * self.settings.step
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            progress: self.progress(),
            effect_index: self.effect_index,
            image_index: self.image_index,
        }
    }

    /// Cue for the current indices; the last image pairs with the first.
    pub fn cue_for<S: Stage>(&self, stage: &S) -> Cue {
        Cue {
            effect_index: self.effect_index,
            from_image: self.image_index,
            to_image: wrap_next(self.image_index, stage.image_count()),
        }
    }

    pub fn outstanding_ticks(&self) -> usize {
        usize::from(self.tick.is_some())
    }

    pub fn outstanding_timers(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    pub fn start<H: Host, S: Stage>(
        &mut self,
        host: &mut H,
        stage: &mut S,
    ) -> Result<Step, PlaybackError<S::Error>> {
        match self.status {
            Status::Stopped => Err(PlaybackError::Stopped),
            Status::Paused => self.resume(host, stage),
            Status::Idle => self.begin_cycle(host, stage),
            status => {
                debug!(?status, "start ignored; playback already running");
                Ok(Step::Ignored)
            }
        }
    }

    pub fn on_frame<H: Host, S: Stage>(
        &mut self,
        host: &mut H,
        stage: &mut S,
        handle: FrameHandle,
    ) -> Result<Step, PlaybackError<S::Error>> {
        if self.tick != Some(Tick::Frame(handle)) {
            return Ok(Step::Ignored);
        }
        self.tick = None;
        self.advance_frame(host, stage)
    }

    /// Handles a playback-owned timer (`FrameTick`, `CycleWait` or `ImagePoll`).
    pub fn on_timer<H: Host, S: Stage>(
        &mut self,
        host: &mut H,
        stage: &mut S,
        handle: TimerHandle,
    ) -> Result<Step, PlaybackError<S::Error>> {
        if self.tick == Some(Tick::Interval(handle)) {
            self.tick = None;
            return self.advance_frame(host, stage);
        }
        match self.pending {
            Some((pending, kind)) if pending == handle => {
                self.pending = None;
                debug!(%kind, "playback timer elapsed");
                self.begin_cycle(host, stage)
            }
            _ => Ok(Step::Ignored),
        }
    }

    /// Parks playback. Progress survives only when paused mid-transition.
    /// A start waiting on a surface rebuild is withdrawn and playback parks
    /// between cycles.
    pub fn pause<H: Host>(&mut self, host: &mut H) -> bool {
        if std::mem::take(&mut self.resume_after_rebuild) {
            self.cancel_all(host);
            self.frames = 0;
            self.status = Status::Paused;
            debug!("pending restart withdrawn; playback paused");
            return true;
        }
        if !self.status.is_active() {
            return false;
        }
        self.cancel_all(host);
        if self.status != Status::Transitioning {
            self.frames = 0;
        }
        debug!(progress = self.progress(), "playback paused");
        self.status = Status::Paused;
        true
    }

    pub fn resume<H: Host, S: Stage>(
        &mut self,
        host: &mut H,
        stage: &mut S,
    ) -> Result<Step, PlaybackError<S::Error>> {
        if self.status != Status::Paused {
            return Ok(Step::Ignored);
        }
        if self.frames == 0 {
            self.status = Status::Idle;
            return self.begin_cycle(host, stage);
        }
        let cue = self.current.unwrap_or_else(|| self.cue_for(stage));
        self.status = Status::Transitioning;
        self.schedule_tick(host);
        debug!(progress = self.progress(), "playback resumed");
        Ok(Step::Started(cue))
    }

    pub fn stop<H: Host>(&mut self, host: &mut H) {
        self.cancel_all(host);
        self.frames = 0;
        self.current = None;
        self.resume_after_rebuild = false;
        self.status = Status::Stopped;
        debug!("playback stopped");
    }

    /// Abandons in-flight work because the rendering surface went away.
    pub fn interrupt<H: Host>(&mut self, host: &mut H) {
        let was_active = self.status.is_active();
        self.cancel_all(host);
        self.frames = 0;
        self.current = None;
        if was_active {
            self.status = Status::Idle;
            self.resume_after_rebuild = true;
        }
        debug!(
            resume = self.resume_after_rebuild,
            "playback interrupted"
        );
    }

    /// Called once a fresh surface exists. Returns whether playback should be
    /// started again.
    pub fn reset_after_rebuild(&mut self) -> bool {
        if self.status == Status::Stopped {
            self.status = Status::Idle;
        }
        std::mem::take(&mut self.resume_after_rebuild)
    }

    /// Asks for a start once the surface is rebuilt. Only parked playback can
    /// be deferred.
    pub fn defer_until_rebuild(&mut self) -> bool {
        if matches!(self.status, Status::Idle | Status::Paused) {
            self.resume_after_rebuild = true;
        }
        self.resume_after_rebuild
    }

    /// Re-registers the tick of a running transition without touching
    /// progress.
    pub fn restart_loop<H: Host>(&mut self, host: &mut H) -> bool {
        if self.status != Status::Transitioning {
            return false;
        }
        self.schedule_tick(host);
        true
    }

    pub fn cancel_all<H: Host>(&mut self, host: &mut H) {
        self.cancel_tick(host);
        if let Some((handle, _)) = self.pending.take() {
            host.clear_timer(handle);
        }
    }

    fn begin_cycle<H: Host, S: Stage>(
        &mut self,
        host: &mut H,
        stage: &mut S,
    ) -> Result<Step, PlaybackError<S::Error>> {
        self.cancel_all(host);
        self.frames = 0;
        self.status = Status::Loading;
        let cue = self.cue_for(stage);
        self.current = Some(cue);
        debug!(
            effect = cue.effect_index,
            from = cue.from_image,
            to = cue.to_image,
            "loading transition"
        );

        match stage.prepare(&cue) {
            Ok(Readiness::Pending) => {
                let handle = host.set_timer(self.settings.image_poll, TimerKind::ImagePoll);
                self.pending = Some((handle, TimerKind::ImagePoll));
                Ok(Step::Pending)
            }
            Ok(Readiness::Ready { frame_interval }) => {
                self.interval = frame_interval
                    .filter(|interval| !interval.is_zero())
                    .unwrap_or(self.settings.frame_interval);
                self.status = Status::Transitioning;
                self.schedule_tick(host);
                Ok(Step::Started(cue))
            }
            Err(source) => {
                self.abort(host);
                Err(PlaybackError::Stage { cue, source })
            }
        }
    }

    fn advance_frame<H: Host, S: Stage>(
        &mut self,
        host: &mut H,
        stage: &mut S,
    ) -> Result<Step, PlaybackError<S::Error>> {
        if self.status != Status::Transitioning {
            return Ok(Step::Ignored);
        }
        let cue = self.current.unwrap_or_else(|| self.cue_for(stage));
        let progress = self.progress();
        if let Err(source) = stage.draw(&cue, progress) {
            self.abort(host);
            return Err(PlaybackError::Stage { cue, source });
        }

        if progress >= 1.0 {
            self.complete(host, stage, cue);
            return Ok(Step::Completed(cue));
        }

        self.frames += 1;
        self.schedule_tick(host);
        Ok(Step::Drawn { progress })
    }

    fn complete<H: Host, S: Stage>(&mut self, host: &mut H, stage: &S, cue: Cue) {
        self.cancel_all(host);
        self.frames = 0;
        self.current = None;
        self.image_index = wrap_next(self.image_index, stage.image_count());
        self.effect_index = wrap_next(self.effect_index, stage.effect_count());
        self.status = Status::Waiting;
        let handle = host.set_timer(self.settings.carousel_time, TimerKind::CycleWait);
        self.pending = Some((handle, TimerKind::CycleWait));
        info!(
            effect = cue.effect_index,
            from = cue.from_image,
            to = cue.to_image,
            next_effect = self.effect_index,
            next_image = self.image_index,
            "transition complete"
        );
    }

    fn abort<H: Host>(&mut self, host: &mut H) {
        self.cancel_all(host);
        self.frames = 0;
        self.current = None;
        self.status = Status::Idle;
    }

    fn schedule_tick<H: Host>(&mut self, host: &mut H) {
        self.cancel_tick(host);
        let tick = match self.settings.pacing {
            Pacing::Frame => Tick::Frame(host.request_frame()),
            Pacing::Interval => Tick::Interval(host.set_timer(self.interval, TimerKind::FrameTick)),
        };
        self.tick = Some(tick);
    }

    fn cancel_tick<H: Host>(&mut self, host: &mut H) {
        match self.tick.take() {
            Some(Tick::Frame(handle)) => host.cancel_frame(handle),
            Some(Tick::Interval(handle)) => host.clear_timer(handle),
            None => {}
        }
    }
}

fn wrap_next(index: usize, len: usize) -> usize {
    if len == 0 || index + 1 >= len {
        0
    } else {
        index + 1
    }
}
