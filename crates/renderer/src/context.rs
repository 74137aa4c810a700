use std::time::Duration;

use fadeconfig::RecoveryConfig;
use scheduler::{Host, TimerHandle, TimerKind};
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::gpu::{GraphicsApi, RenderingSurface, SurfaceSize, FALLBACK_SIZE};

/// Where rendering surfaces come from.
///
/// A platform owns the container the surface node lives in. Every surface it
/// creates carries its own context-loss listener, and that listener must
/// suppress the default "context is gone for good" handling before
/// forwarding the loss to the carousel.
pub trait Platform {
    type Api: GraphicsApi;

    /// Current size of the container, if it has one.
    fn container_size(&self) -> Option<SurfaceSize>;

    /// Inserts a new surface node of `size` and returns its context.
    fn create_surface(&mut self, size: SurfaceSize) -> anyhow::Result<Self::Api>;

    fn resize_surface(&mut self, size: SurfaceSize);

    /// Detaches listeners and removes the surface node. No-op without one.
    fn destroy_surface(&mut self);

    /// Asks the platform to drop the current context. Returns whether a loss
    /// was requested.
    fn lose_context(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossResponse {
    /// A rebuild is scheduled after the given backoff.
    RebuildScheduled(Duration),
    /// A rebuild is already pending; this signal was counted and dropped.
    Ignored,
}

/// Owns the live rendering surface and replaces it after a context loss.
pub struct ContextManager<P: Platform> {
    platform: P,
    surface: Option<RenderingSurface<P::Api>>,
    recovery: RecoveryConfig,
    losses: u32,
    recoveries: u32,
    restore_timer: Option<TimerHandle>,
    simulated: bool,
}

impl<P: Platform> ContextManager<P> {
    pub fn new(platform: P, recovery: RecoveryConfig) -> Self {
        Self {
            platform,
            surface: None,
            recovery,
            losses: 0,
            recoveries: 0,
            restore_timer: None,
            simulated: false,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn surface(&self) -> Option<&RenderingSurface<P::Api>> {
        self.surface.as_ref()
    }

    /// The surface, unless its context is lost and awaiting a rebuild.
    pub fn usable_surface(&mut self) -> Result<&mut RenderingSurface<P::Api>, EngineError> {
        if self.losses > 0 {
            return Err(EngineError::ContextLost);
        }
        self.surface.as_mut().ok_or(EngineError::ContextLost)
    }

    pub fn is_lost(&self) -> bool {
        self.losses > 0
    }

    pub fn owns_timer(&self, handle: TimerHandle) -> bool {
        self.restore_timer == Some(handle)
    }

    fn target_size(&self) -> SurfaceSize {
        self.platform.container_size().unwrap_or(FALLBACK_SIZE)
    }

    pub fn initialize(&mut self) -> Result<(), EngineError> {
        let size = self.target_size();
        let surface = self.create(size)?;
        debug!(width = size.width, height = size.height, "rendering surface created");
        self.surface = Some(surface);
        Ok(())
    }

    fn create(&mut self, size: SurfaceSize) -> Result<RenderingSurface<P::Api>, EngineError> {
        let api = self.platform.create_surface(size).map_err(|err| {
            error!(error = %err, "platform could not provide a GPU context");
            EngineError::ContextUnavailable(format!("{err:#}"))
        })?;
        RenderingSurface::new(api, size).map_err(|err| {
            self.platform.destroy_surface();
            err
        })
    }

    /// Records an asynchronous loss and schedules the rebuild. Signals after
    /// the first one are ignored until a rebuild completes.
    pub fn on_context_lost<H: Host>(&mut self, host: &mut H) -> LossResponse {
        self.losses += 1;
        if self.losses > 1 {
            warn!(losses = self.losses, "context loss ignored; rebuild already pending");
            return LossResponse::Ignored;
        }

        let backoff = self.recovery.backoff(self.recoveries);
        if let Some(previous) = self.restore_timer.take() {
            host.clear_timer(previous);
        }
        self.restore_timer = Some(host.set_timer(backoff, TimerKind::ContextRestore));
        info!(backoff_ms = backoff.as_millis() as u64, "context lost; rebuild scheduled");
        LossResponse::RebuildScheduled(backoff)
    }

    /// Tears down the old surface and creates a fresh one sized to the
    /// container.
    pub fn rebuild(&mut self) -> Result<(), EngineError> {
        self.restore_timer = None;
        if let Some(mut surface) = self.surface.take() {
            surface.dispose();
        }
        self.platform.destroy_surface();

        let size = self.target_size();
        let result = self.create(size);
        self.losses = 0;
        self.simulated = false;
        let surface = result?;
        self.surface = Some(surface);
        self.recoveries += 1;
        info!(
            width = size.width,
            height = size.height,
            recoveries = self.recoveries,
            "rendering surface rebuilt"
        );
        Ok(())
    }

    /// Requests a loss through the platform, once per surface.
    pub fn simulate_loss(&mut self) -> bool {
        if self.simulated || self.surface.is_none() || self.losses > 0 {
            debug!("simulated context loss ignored");
            return false;
        }
        self.simulated = self.platform.lose_context();
        self.simulated
    }

    /// Applies a settled container size. Returns whether anything changed.
    pub fn resize(&mut self, size: SurfaceSize) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        if surface.size() == size {
            return false;
        }
        surface.resize(size);
        self.platform.resize_surface(size);
        true
    }

    pub fn dispose<H: Host>(&mut self, host: &mut H) {
        if let Some(timer) = self.restore_timer.take() {
            host.clear_timer(timer);
        }
        if let Some(mut surface) = self.surface.take() {
            surface.dispose();
        }
        self.platform.destroy_surface();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::FakePlatform;
    use scheduler::ManualHost;

    fn manager(platform: FakePlatform) -> ContextManager<FakePlatform> {
        let mut manager = ContextManager::new(platform, RecoveryConfig::default());
        manager.initialize().unwrap();
        manager
    }

    #[test]
    fn uses_container_size_or_fallback() {
        let manager = self::manager(FakePlatform::with_size(SurfaceSize::new(300, 200)));
        assert_eq!(manager.surface().unwrap().size(), SurfaceSize::new(300, 200));

        let manager = self::manager(FakePlatform::without_size());
        assert_eq!(manager.surface().unwrap().size(), FALLBACK_SIZE);
    }

    #[test]
    fn unavailable_context_is_reported() {
        let mut platform = FakePlatform::new();
        platform.fail_create = true;
        let mut manager = ContextManager::new(platform, RecoveryConfig::default());
        assert!(matches!(
            manager.initialize(),
            Err(EngineError::ContextUnavailable(_))
        ));
        assert!(manager.surface().is_none());
    }

    #[test]
    fn duplicate_losses_schedule_one_rebuild() {
        let mut host = ManualHost::new();
        let mut manager = manager(FakePlatform::new());

        assert_eq!(
            manager.on_context_lost(&mut host),
            LossResponse::RebuildScheduled(Duration::from_millis(3000))
        );
        assert_eq!(manager.on_context_lost(&mut host), LossResponse::Ignored);
        assert_eq!(host.pending_timers_of(TimerKind::ContextRestore), 1);
        assert!(manager.usable_surface().is_err());

        manager.rebuild().unwrap();
        assert!(!manager.is_lost());
        assert_eq!(
            manager.on_context_lost(&mut host),
            LossResponse::RebuildScheduled(Duration::from_millis(1000))
        );
    }

    #[test]
    fn rebuild_replaces_surface_and_node() {
        let mut manager = manager(FakePlatform::new());
        let first = manager.platform().apis[0].clone();
        manager.rebuild().unwrap();

        assert_eq!(manager.platform().apis.len(), 2);
        assert_eq!(manager.platform().destroyed, 1);
        assert!(first.log().live_buffers.is_empty());
        assert_eq!(manager.platform().live_nodes(), 1);
    }

    #[test]
    fn simulated_loss_is_guarded_until_rebuild() {
        let mut host = ManualHost::new();
        let mut manager = manager(FakePlatform::new());
        assert!(manager.simulate_loss());
        assert!(!manager.simulate_loss());
        assert_eq!(manager.platform().lose_requests, 1);

        manager.on_context_lost(&mut host);
        assert!(!manager.simulate_loss());
        manager.rebuild().unwrap();
        assert!(manager.simulate_loss());
        assert_eq!(manager.platform().lose_requests, 2);
    }

    #[test]
    fn resize_ignores_equal_size() {
        let mut manager = manager(FakePlatform::with_size(SurfaceSize::new(300, 200)));
        assert!(!manager.resize(SurfaceSize::new(300, 200)));
        assert!(manager.resize(SurfaceSize::new(640, 480)));
        assert_eq!(manager.platform().resized, vec![SurfaceSize::new(640, 480)]);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut host = ManualHost::new();
        let mut manager = manager(FakePlatform::new());
        manager.on_context_lost(&mut host);
        manager.dispose(&mut host);
        manager.dispose(&mut host);
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(manager.platform().live_nodes(), 0);
        assert!(manager.surface().is_none());
    }
}
