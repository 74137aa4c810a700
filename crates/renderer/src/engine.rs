use std::sync::Arc;

use fadeconfig::CarouselConfig;
use scheduler::{
    Cue, FrameHandle, Host, Playback, PlaybackError, PlaybackSettings, PlaybackState, Readiness,
    Stage, Status, Step, TimerHandle, TimerKind,
};
use tracing::{debug, error, info, warn};
use transitions::TransitionDescriptor;

use crate::context::{ContextManager, LossResponse, Platform};
use crate::error::EngineError;
use crate::gpu::{RenderingSurface, SurfaceSize};
use crate::images::{ImageFetch, ImageSource};
use crate::resize::ResizeHandler;

type ResizeCallback = Box<dyn FnMut(SurfaceSize)>;

/// The crossfading image carousel.
///
/// Owns the playback state machine, the rendering surface and the image
/// sequence. Everything runs on the thread that drives the [`Host`]: the host
/// calls [`Carousel::on_frame`] and [`Carousel::on_timer`] for the handles the
/// carousel handed out, and the platform forwards context loss through
/// [`Carousel::on_context_lost`].
pub struct Carousel<P: Platform, H: Host, I: ImageSource> {
    host: H,
    context: ContextManager<P>,
    playback: Playback,
    resize: ResizeHandler,
    images: I,
    effects: Vec<Arc<TransitionDescriptor>>,
    watch_resize: bool,
    on_resize: Option<ResizeCallback>,
    disposed: bool,
}

/// Borrowed view the scheduler renders through.
struct CarouselStage<'a, P: Platform, I: ImageSource> {
    context: &'a mut ContextManager<P>,
    images: &'a mut I,
    effects: &'a [Arc<TransitionDescriptor>],
}

impl<P: Platform, I: ImageSource> Stage for CarouselStage<'_, P, I> {
    type Error = EngineError;

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn effect_count(&self) -> usize {
        self.effects.len()
    }

    fn prepare(&mut self, cue: &Cue) -> Result<Readiness, EngineError> {
        let descriptor = self.effects.get(cue.effect_index).ok_or_else(|| {
            EngineError::Resource(format!("no effect at index {}", cue.effect_index))
        })?;

        let from = self.images.fetch(cue.from_image);
        let to = self.images.fetch(cue.to_image);
        let (from, to) = match (from, to) {
            (ImageFetch::Failed(err), _) | (_, ImageFetch::Failed(err)) => {
                warn!(error = %err, "image unavailable; cycle abandoned");
                return Err(err.into());
            }
            (ImageFetch::Ready(from), ImageFetch::Ready(to)) => (from, to),
            _ => {
                debug!(
                    from = cue.from_image,
                    to = cue.to_image,
                    "waiting for images to become resident"
                );
                return Ok(Readiness::Pending);
            }
        };

        self.context
            .usable_surface()?
            .prepare(descriptor, &from, &to)?;
        Ok(Readiness::Ready {
            frame_interval: descriptor.frame_interval_hint,
        })
    }

    fn draw(&mut self, _cue: &Cue, progress: f32) -> Result<(), EngineError> {
        self.context.usable_surface()?.draw(progress)
    }
}

impl<P: Platform, H: Host, I: ImageSource> Carousel<P, H, I> {
    /// Validates the inputs and creates the first rendering surface. Playback
    /// stays idle until [`Carousel::start`].
    pub fn new(
        platform: P,
        host: H,
        images: I,
        effects: Vec<Arc<TransitionDescriptor>>,
        config: &CarouselConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if effects.is_empty() {
            return Err(EngineError::Configuration(
                "at least 1 effect required".into(),
            ));
        }
        if images.len() < 2 {
            return Err(EngineError::Configuration(
                "at least 2 images required".into(),
            ));
        }

        let mut context = ContextManager::new(platform, config.recovery.clone());
        context.initialize()?;
        info!(
            images = images.len(),
            effects = effects.len(),
            pacing = ?config.pacing,
            "carousel ready"
        );

        Ok(Self {
            host,
            context,
            playback: Playback::new(PlaybackSettings::from_config(config)),
            resize: ResizeHandler::new(config.resize_debounce),
            images,
            effects,
            watch_resize: config.watch_resize,
            on_resize: None,
            disposed: false,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The image sequence. Appending images is picked up on the next cycle.
    pub fn images_mut(&mut self) -> &mut I {
        &mut self.images
    }

    pub fn surface(&self) -> Option<&RenderingSurface<P::Api>> {
        self.context.surface()
    }

    pub fn platform(&self) -> &P {
        self.context.platform()
    }

    pub fn platform_mut(&mut self) -> &mut P {
        self.context.platform_mut()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn set_resize_callback(&mut self, callback: impl FnMut(SurfaceSize) + 'static) {
        self.on_resize = Some(Box::new(callback));
    }

    fn drive<R>(
        &mut self,
        run: impl FnOnce(&mut Playback, &mut H, &mut CarouselStage<'_, P, I>) -> R,
    ) -> R {
        let mut stage = CarouselStage {
            context: &mut self.context,
            images: &mut self.images,
            effects: &self.effects,
        };
        run(&mut self.playback, &mut self.host, &mut stage)
    }

    fn settle(&self, result: Result<Step, PlaybackError<EngineError>>) -> Result<(), EngineError> {
        match result {
            Ok(_) => Ok(()),
            Err(PlaybackError::Stopped) => Err(EngineError::Stopped),
            Err(PlaybackError::Stage { cue, source }) if source.is_recoverable() => {
                warn!(
                    effect = cue.effect_index,
                    from = cue.from_image,
                    to = cue.to_image,
                    error = %source,
                    "transition cycle aborted"
                );
                Err(source)
            }
            Err(PlaybackError::Stage { cue, source }) => {
                error!(
                    effect = cue.effect_index,
                    error = %source,
                    "carousel cannot render"
                );
                Err(source)
            }
        }
    }

    /// Starts or continues playback.
    ///
    /// Errors abort only the attempted cycle; the carousel stays idle and a
    /// later `start` retries. While the context is lost the start is deferred
    /// until the surface is rebuilt.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        if self.context.is_lost() {
            if self.playback.status() == Status::Stopped {
                return Err(EngineError::Stopped);
            }
            self.playback.defer_until_rebuild();
            debug!("start deferred until the surface is rebuilt");
            return Ok(());
        }
        let result = self.drive(|playback, host, stage| playback.start(host, stage));
        self.settle(result)
    }

    pub fn stop(&mut self) {
        if self.disposed {
            return;
        }
        self.playback.stop(&mut self.host);
    }

    /// Returns whether playback was running.
    pub fn pause(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.playback.pause(&mut self.host)
    }

    /// Continues from the paused progress, or starts the next cycle fresh when
    /// paused between cycles.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        if self.playback.status() != Status::Paused {
            return Ok(());
        }
        if self.context.is_lost() {
            self.playback.defer_until_rebuild();
            return Ok(());
        }
        let result = self.drive(|playback, host, stage| playback.resume(host, stage));
        self.settle(result)
    }

    /// Releases every GPU object and removes the surface node. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.playback.stop(&mut self.host);
        self.resize.cancel(&mut self.host);
        self.context.dispose(&mut self.host);
        self.on_resize = None;
        self.disposed = true;
        info!("carousel disposed");
    }

    /// Asks the platform to drop the context, once per surface. The loss
    /// itself arrives later through [`Carousel::on_context_lost`].
    pub fn simulate_context_loss(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.context.simulate_loss()
    }

    pub fn on_context_lost(&mut self) -> Option<LossResponse> {
        if self.disposed {
            return None;
        }
        self.playback.interrupt(&mut self.host);
        Some(self.context.on_context_lost(&mut self.host))
    }

    /// Records a container size. Settles after the debounce period.
    pub fn observe_resize(&mut self, size: SurfaceSize) {
        if self.disposed || !self.watch_resize {
            return;
        }
        self.resize.observe(&mut self.host, size);
    }

    pub fn on_frame(&mut self, handle: FrameHandle) {
        if self.disposed {
            return;
        }
        let result = self.drive(|playback, host, stage| playback.on_frame(host, stage, handle));
        let _ = self.settle(result);
    }

    pub fn on_timer(&mut self, handle: TimerHandle, kind: TimerKind) {
        if self.disposed {
            return;
        }
        match kind {
            TimerKind::ContextRestore => {
                if self.context.owns_timer(handle) {
                    self.rebuild();
                }
            }
            TimerKind::ResizeSettle => {
                if let Some(size) = self.resize.on_timer(handle) {
                    self.apply_resize(size);
                }
            }
            TimerKind::CycleWait | TimerKind::ImagePoll | TimerKind::FrameTick => {
                let result =
                    self.drive(|playback, host, stage| playback.on_timer(host, stage, handle));
                let _ = self.settle(result);
            }
        }
    }

    fn rebuild(&mut self) {
        self.playback.cancel_all(&mut self.host);
        if let Err(err) = self.context.rebuild() {
            error!(error = %err, "surface rebuild failed; carousel is inert");
            return;
        }
        if self.playback.reset_after_rebuild() {
            debug!("restarting playback on the rebuilt surface");
            let result = self.drive(|playback, host, stage| playback.start(host, stage));
            let _ = self.settle(result);
        }
    }

    fn apply_resize(&mut self, size: SurfaceSize) {
        if !self.context.resize(size) {
            return;
        }
        debug!(width = size.width, height = size.height, "surface resized");
        if let Some(callback) = self.on_resize.as_mut() {
            callback(size);
        }
        self.playback.restart_loop(&mut self.host);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::gpu::ShaderStage;
    use crate::images::{ImageLoadError, StaticImages};
    use crate::testkit::{solid_image, FakePlatform, RecordingApi, ScriptedImages};
    use scheduler::ManualHost;

    type TestCarousel<I = StaticImages> = Carousel<FakePlatform, ManualHost, I>;

    fn images(count: usize) -> StaticImages {
        StaticImages::new(
            (0..count)
                .map(|index| solid_image([index as u8 * 40, 0, 0, 255]))
                .collect(),
        )
    }

    fn effects(count: usize) -> Vec<Arc<TransitionDescriptor>> {
        (0..count)
            .map(|index| Arc::new(transitions::crossfade().with_name(format!("fade-{index}"))))
            .collect()
    }

    fn carousel_with<I: ImageSource>(
        images: I,
        effects: usize,
        config: &CarouselConfig,
    ) -> Carousel<FakePlatform, ManualHost, I> {
        Carousel::new(
            FakePlatform::new(),
            ManualHost::new(),
            images,
            self::effects(effects),
            config,
        )
        .unwrap()
    }

    fn carousel(images: usize, effects: usize) -> TestCarousel {
        carousel_with(self::images(images), effects, &CarouselConfig::default())
    }

    fn api<I: ImageSource>(carousel: &Carousel<FakePlatform, ManualHost, I>) -> RecordingApi {
        carousel.platform().current().unwrap().clone()
    }

    fn deliver<I: ImageSource>(carousel: &mut Carousel<FakePlatform, ManualHost, I>, count: usize) {
        for _ in 0..count {
            let frames = carousel.host_mut().take_frames();
            assert_eq!(frames.len(), 1, "exactly one frame callback outstanding");
            carousel.on_frame(frames[0]);
        }
    }

    fn run_transition<I: ImageSource>(carousel: &mut Carousel<FakePlatform, ManualHost, I>) -> usize {
        let mut delivered = 0;
        loop {
            let frames = carousel.host_mut().take_frames();
            if frames.is_empty() {
                return delivered;
            }
            for frame in frames {
                carousel.on_frame(frame);
                delivered += 1;
            }
            assert!(delivered < 10_000, "transition never completed");
        }
    }

    fn advance<I: ImageSource>(carousel: &mut Carousel<FakePlatform, ManualHost, I>, millis: u64) {
        let fired = carousel.host_mut().advance(Duration::from_millis(millis));
        for (handle, kind) in fired {
            carousel.on_timer(handle, kind);
        }
    }

    #[test]
    fn rejects_fewer_than_two_images() {
        let err = Carousel::new(
            FakePlatform::new(),
            ManualHost::new(),
            images(1),
            effects(1),
            &CarouselConfig::default(),
        )
        .err()
        .unwrap();
        match err {
            EngineError::Configuration(message) => {
                assert_eq!(message, "at least 2 images required")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_effect_list() {
        let err = Carousel::new(
            FakePlatform::new(),
            ManualHost::new(),
            images(2),
            Vec::new(),
            &CarouselConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn reports_unavailable_context() {
        let mut platform = FakePlatform::new();
        platform.fail_create = true;
        let err = Carousel::new(
            platform,
            ManualHost::new(),
            images(2),
            effects(1),
            &CarouselConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::ContextUnavailable(_)));
    }

    #[test]
    fn three_images_one_effect_cycle() {
        let mut carousel = carousel(3, 1);
        carousel.start().unwrap();
        assert_eq!(carousel.state().status, Status::Transitioning);
        assert_eq!(carousel.surface().unwrap().live_textures(), 2);

        assert_eq!(run_transition(&mut carousel), 51);
        let state = carousel.state();
        assert_eq!(state.status, Status::Waiting);
        assert_eq!((state.effect_index, state.image_index), (0, 1));

        advance(&mut carousel, 2999);
        assert_eq!(carousel.state().status, Status::Waiting);
        advance(&mut carousel, 1);
        assert_eq!(carousel.state().status, Status::Transitioning);
        assert_eq!(carousel.state().progress, 0.0);

        let api = api(&carousel);
        let log = api.log();
        assert_eq!(log.draws, 51);
        assert_eq!(log.clears, 1);
        assert_eq!(log.live_textures.len(), 2);
        assert_eq!(log.programs_created, 1, "single effect keeps its program");
        assert_eq!(log.uploads[2].first_pixel, [80, 0, 0, 255], "to image 2 on unit 0");
        assert_eq!(log.uploads[3].first_pixel, [40, 0, 0, 255], "from image 1 on unit 1");
    }

    #[test]
    fn last_image_pairs_with_first() {
        let mut carousel = carousel(2, 2);
        carousel.start().unwrap();
        run_transition(&mut carousel);
        advance(&mut carousel, 3000);
        run_transition(&mut carousel);
        let state = carousel.state();
        assert_eq!((state.effect_index, state.image_index), (0, 0));
    }

    #[test]
    fn repeated_start_keeps_one_loop() {
        let mut carousel = carousel(2, 1);
        carousel.start().unwrap();
        carousel.start().unwrap();
        deliver(&mut carousel, 3);
        carousel.start().unwrap();
        assert_eq!(carousel.host().pending_frames(), 1);
        assert_eq!(api(&carousel).log().draws, 3);
    }

    #[test]
    fn pause_and_resume_keep_progress() {
        let config = CarouselConfig::default().with_step(0.1);
        let mut carousel = carousel_with(images(2), 1, &config);
        carousel.start().unwrap();
        deliver(&mut carousel, 3);
        assert!((carousel.state().progress - 0.3).abs() < 1e-6);

        assert!(carousel.pause());
        assert_eq!(carousel.host().pending_frames(), 0);
        assert_eq!(carousel.host().pending_timers(), 0);
        assert_eq!(carousel.state().status, Status::Paused);

        carousel.resume().unwrap();
        deliver(&mut carousel, 1);
        assert!((carousel.state().progress - 0.4).abs() < 1e-6);
        assert_eq!(api(&carousel).log().textures_created, 2, "no re-upload on resume");
    }

    #[test]
    fn context_loss_mid_transition_resumes_same_pair() {
        let mut carousel = carousel(3, 2);
        carousel.start().unwrap();
        run_transition(&mut carousel);
        advance(&mut carousel, 3000);
        deliver(&mut carousel, 5);
        let in_flight = carousel.host_mut().take_frames();
        let old = api(&carousel);

        let response = carousel.on_context_lost();
        assert_eq!(
            response,
            Some(LossResponse::RebuildScheduled(Duration::from_millis(3000)))
        );
        assert_eq!(carousel.host().pending_frames(), 0);
        assert_eq!(carousel.host().pending_timers_of(TimerKind::ContextRestore), 1);

        let draws_before = old.log().draws;
        carousel.on_frame(in_flight[0]);
        assert_eq!(old.log().draws, draws_before, "stale frame is ignored");

        advance(&mut carousel, 3000);
        assert_eq!(carousel.platform().apis.len(), 2);
        assert_eq!(carousel.platform().live_nodes(), 1);
        {
            let log = old.log();
            assert!(log.live_textures.is_empty());
            assert!(log.live_programs.is_empty());
            assert!(log.live_buffers.is_empty());
        }

        let state = carousel.state();
        assert_eq!(state.status, Status::Transitioning);
        assert_eq!((state.effect_index, state.image_index), (1, 1));
        assert_eq!(state.progress, 0.0);
        assert_eq!(carousel.surface().unwrap().live_textures(), 2);

        run_transition(&mut carousel);
        assert_eq!(api(&carousel).log().clears, 1, "fresh surface clears once");
    }

    #[test]
    fn duplicate_loss_signals_rebuild_once() {
        let mut carousel = carousel(2, 1);
        carousel.start().unwrap();
        carousel.on_context_lost();
        assert_eq!(carousel.on_context_lost(), Some(LossResponse::Ignored));
        assert_eq!(carousel.host().pending_timers_of(TimerKind::ContextRestore), 1);

        advance(&mut carousel, 3000);
        assert_eq!(carousel.platform().apis.len(), 2);

        carousel.on_context_lost();
        advance(&mut carousel, 999);
        assert_eq!(carousel.platform().apis.len(), 2);
        advance(&mut carousel, 1);
        assert_eq!(carousel.platform().apis.len(), 3);
        assert_eq!(carousel.state().status, Status::Transitioning);
    }

    #[test]
    fn simulated_loss_is_honoured_once_per_surface() {
        let mut carousel = carousel(2, 1);
        assert!(carousel.simulate_context_loss());
        assert!(!carousel.simulate_context_loss());
        assert_eq!(carousel.platform().lose_requests, 1);

        carousel.on_context_lost();
        advance(&mut carousel, 3000);
        assert!(carousel.simulate_context_loss());
        assert_eq!(carousel.platform().lose_requests, 2);
    }

    #[test]
    fn start_while_lost_waits_for_rebuild() {
        let mut carousel = carousel(2, 1);
        carousel.on_context_lost();
        carousel.start().unwrap();
        assert_eq!(carousel.state().status, Status::Idle);
        assert_eq!(carousel.host().pending_frames(), 0);

        advance(&mut carousel, 3000);
        assert_eq!(carousel.state().status, Status::Transitioning);
    }

    #[test]
    fn paused_carousel_rebuilds_without_autostart() {
        let mut carousel = carousel(2, 1);
        carousel.start().unwrap();
        deliver(&mut carousel, 2);
        carousel.pause();
        carousel.on_context_lost();
        advance(&mut carousel, 3000);

        assert_eq!(carousel.platform().apis.len(), 2);
        assert_eq!(carousel.state().status, Status::Paused);
        assert_eq!(carousel.host().pending_frames(), 0);

        carousel.resume().unwrap();
        assert_eq!(carousel.state().status, Status::Transitioning);
        assert_eq!(carousel.state().progress, 0.0);
    }

    #[test]
    fn pause_while_lost_is_kept_across_rebuild() {
        let mut carousel = carousel(2, 1);
        carousel.start().unwrap();
        deliver(&mut carousel, 2);
        carousel.on_context_lost();
        assert!(carousel.pause());
        advance(&mut carousel, 3000);

        assert_eq!(carousel.platform().apis.len(), 2);
        assert_eq!(carousel.state().status, Status::Paused);
        assert_eq!(carousel.host().pending_frames(), 0);

        carousel.resume().unwrap();
        assert_eq!(carousel.state().status, Status::Transitioning);
        assert_eq!(carousel.host().pending_frames(), 1);
    }

    #[test]
    fn pause_withdraws_start_deferred_while_lost() {
        let mut carousel = carousel(2, 1);
        carousel.start().unwrap();
        carousel.pause();
        carousel.on_context_lost();
        carousel.resume().unwrap();
        assert!(carousel.pause());
        advance(&mut carousel, 3000);

        assert_eq!(carousel.state().status, Status::Paused);
        assert_eq!(carousel.host().pending_frames(), 0);
    }

    #[test]
    fn stopped_carousel_starts_again_after_rebuild() {
        let mut carousel = carousel(2, 1);
        carousel.start().unwrap();
        carousel.stop();
        assert!(matches!(carousel.start(), Err(EngineError::Stopped)));

        carousel.on_context_lost();
        advance(&mut carousel, 3000);
        assert_eq!(carousel.state().status, Status::Idle);
        assert_eq!(carousel.host().pending_frames(), 0);

        carousel.start().unwrap();
        assert_eq!(carousel.state().status, Status::Transitioning);
    }

    #[test]
    fn waits_for_pending_images() {
        let mut images = ScriptedImages::solid(2);
        images.pending.insert(1, 2);
        let mut carousel = carousel_with(images, 1, &CarouselConfig::default());

        carousel.start().unwrap();
        assert_eq!(carousel.state().status, Status::Loading);
        assert_eq!(carousel.surface().unwrap().live_textures(), 0);

        advance(&mut carousel, 50);
        assert_eq!(carousel.state().status, Status::Loading);
        advance(&mut carousel, 50);
        assert_eq!(carousel.state().status, Status::Transitioning);
        assert_eq!(carousel.surface().unwrap().live_textures(), 2);

        run_transition(&mut carousel);
        assert!(api(&carousel).log().textures_at_draw.iter().all(|&live| live == 2));
    }

    #[test]
    fn image_failure_aborts_cycle_only() {
        let mut images = ScriptedImages::solid(2);
        images.failing.insert(1);
        let mut carousel = carousel_with(images, 1, &CarouselConfig::default());

        let err = carousel.start().unwrap_err();
        assert!(matches!(
            err,
            EngineError::ImageLoad(ImageLoadError::Decode { index: 1, .. })
        ));
        assert_eq!(carousel.state().status, Status::Idle);
        assert_eq!(carousel.surface().unwrap().live_textures(), 0);
        assert_eq!(carousel.host().pending_timers(), 0);

        carousel.images_mut().failing.clear();
        carousel.start().unwrap();
        assert_eq!(carousel.state().status, Status::Transitioning);
    }

    #[test]
    fn compile_failure_leaves_carousel_retryable() {
        let mut carousel = carousel(2, 1);
        let api = api(&carousel);
        api.fail_compile(ShaderStage::Fragment);

        let err = carousel.start().unwrap_err();
        assert!(matches!(
            err,
            EngineError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(carousel.state().status, Status::Idle);
        assert_eq!(api.log().draws, 0);

        api.clear_failures();
        carousel.start().unwrap();
        assert_eq!(carousel.state().status, Status::Transitioning);
    }

    #[test]
    fn link_failure_is_reported() {
        let mut carousel = carousel(2, 1);
        api(&carousel).fail_link("varying v_TexCoord not written");
        assert!(matches!(carousel.start(), Err(EngineError::Link { .. })));
        assert_eq!(carousel.host().pending_frames(), 0);
    }

    #[test]
    fn resize_is_debounced_and_keeps_progress() {
        let config = CarouselConfig::default().with_watch_resize(true);
        let mut carousel = carousel_with(images(2), 1, &config);
        let notified = Rc::new(Cell::new(0u32));
        let last = Rc::new(Cell::new(None));
        {
            let notified = Rc::clone(&notified);
            let last = Rc::clone(&last);
            carousel.set_resize_callback(move |size| {
                notified.set(notified.get() + 1);
                last.set(Some(size));
            });
        }

        carousel.start().unwrap();
        deliver(&mut carousel, 4);
        let progress = carousel.state().progress;

        carousel.observe_resize(SurfaceSize::new(700, 500));
        advance(&mut carousel, 100);
        carousel.observe_resize(SurfaceSize::new(800, 600));
        advance(&mut carousel, 299);
        assert_eq!(notified.get(), 0);
        advance(&mut carousel, 1);

        assert_eq!(notified.get(), 1);
        assert_eq!(last.get(), Some(SurfaceSize::new(800, 600)));
        assert_eq!(carousel.platform().resized, vec![SurfaceSize::new(800, 600)]);
        assert_eq!(api(&carousel).log().viewport, Some((800, 600)));
        assert_eq!(carousel.state().progress, progress);
        assert_eq!(carousel.host().pending_frames(), 1);

        carousel.observe_resize(SurfaceSize::new(800, 600));
        advance(&mut carousel, 300);
        assert_eq!(notified.get(), 1, "unchanged size does not notify");
    }

    #[test]
    fn resize_ignored_unless_watched() {
        let mut carousel = carousel(2, 1);
        carousel.observe_resize(SurfaceSize::new(800, 600));
        assert_eq!(carousel.host().pending_timers(), 0);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut carousel = carousel(3, 1);
        carousel.start().unwrap();
        deliver(&mut carousel, 2);
        let api = api(&carousel);

        carousel.dispose();
        carousel.dispose();

        let log = api.log();
        assert!(log.live_textures.is_empty());
        assert!(log.live_programs.is_empty());
        assert!(log.live_shaders.is_empty());
        assert!(log.live_buffers.is_empty());
        assert_eq!(carousel.platform().live_nodes(), 0);
        assert_eq!(carousel.host().pending_frames(), 0);
        assert_eq!(carousel.host().pending_timers(), 0);
        assert!(matches!(carousel.start(), Err(EngineError::Disposed)));
        assert!(!carousel.simulate_context_loss());
        assert_eq!(carousel.on_context_lost(), None);
    }
}
