use std::collections::HashMap;
use std::rc::Weak;
use std::time::Duration;

use scheduler::{FrameHandle, Host, TimerHandle, TimerKind};
use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::Window;

use super::{dispatch, Slot};

/// `requestAnimationFrame` / `setTimeout` host.
///
/// Callbacks hold only a weak reference to the carousel, so a carousel that
/// was dropped while callbacks were queued is never touched.
pub(crate) struct WebHost {
    window: Window,
    slot: Weak<Slot>,
    next_id: u64,
    frames: HashMap<FrameHandle, i32>,
    timers: HashMap<TimerHandle, i32>,
}

impl WebHost {
    pub fn new(window: Window, slot: Weak<Slot>) -> Self {
        Self {
            window,
            slot,
            next_id: 0,
            frames: HashMap::new(),
            timers: HashMap::new(),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Forgets a frame the browser has already delivered.
    pub fn frame_fired(&mut self, handle: FrameHandle) {
        self.frames.remove(&handle);
    }

    pub fn timer_fired(&mut self, handle: TimerHandle) {
        self.timers.remove(&handle);
    }
}

fn delay_ms(delay: Duration) -> i32 {
    delay.as_millis().min(i32::MAX as u128) as i32
}

impl Host for WebHost {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id());
        let slot = self.slot.clone();
        let callback = Closure::once_into_js(move |_timestamp: f64| {
            dispatch(&slot, move |carousel| {
                carousel.host_mut().frame_fired(handle);
                carousel.on_frame(handle);
            });
        });
        match self.window.request_animation_frame(callback.unchecked_ref()) {
            Ok(id) => {
                self.frames.insert(handle, id);
            }
            Err(err) => warn!(error = ?err, "requestAnimationFrame failed"),
        }
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Some(id) = self.frames.remove(&handle) {
            if let Err(err) = self.window.cancel_animation_frame(id) {
                warn!(error = ?err, "cancelAnimationFrame failed");
            }
        }
    }

    fn set_timer(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let handle = TimerHandle(self.next_id());
        let slot = self.slot.clone();
        let callback = Closure::once_into_js(move || {
            dispatch(&slot, move |carousel| {
                carousel.host_mut().timer_fired(handle);
                carousel.on_timer(handle, kind);
            });
        });
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                delay_ms(delay),
            ) {
            Ok(id) => {
                self.timers.insert(handle, id);
            }
            Err(err) => warn!(error = ?err, %kind, "setTimeout failed"),
        }
        handle
    }

    fn clear_timer(&mut self, handle: TimerHandle) {
        if let Some(id) = self.timers.remove(&handle) {
            self.window.clear_timeout_with_handle(id);
        }
    }
}
