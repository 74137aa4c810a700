//! JavaScript-facing carousel.

mod host;
mod images;
mod platform;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use renderer::{Carousel, EngineError, Platform};
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlImageElement, ResizeObserver};

use crate::options::{load_effects, CarouselOptions};
use host::WebHost;
use images::WebImages;
use platform::WebPlatform;

pub(crate) type Engine = Carousel<WebPlatform, WebHost, WebImages>;

/// Shared cell the browser callbacks dispatch into. Empty while the carousel
/// is being constructed.
pub(crate) type Slot = RefCell<Option<Engine>>;

/// Runs `task` against the carousel. When the carousel is already borrowed
/// (a browser event fired synchronously from inside a carousel call), the task
/// is queued behind a zero-delay timeout.
pub(crate) fn dispatch(slot: &Weak<Slot>, task: impl FnOnce(&mut Engine) + 'static) {
    let Some(cell) = slot.upgrade() else {
        return;
    };
    match cell.try_borrow_mut() {
        Ok(mut engine) => {
            if let Some(engine) = engine.as_mut() {
                task(engine);
            }
        }
        Err(_) => defer(slot.clone(), task),
    }
}

fn defer(slot: Weak<Slot>, task: impl FnOnce(&mut Engine) + 'static) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once_into_js(move || dispatch(&slot, task));
    if let Err(err) =
        window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0)
    {
        warn!(error = ?err, "failed to defer carousel callback");
    }
}

fn to_js(err: EngineError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn busy() -> JsValue {
    js_sys::Error::new("carousel is busy; call it outside its own callbacks").into()
}

#[wasm_bindgen(start)]
pub fn install() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    let _ = tracing_wasm::try_set_as_global_default();
}

struct ContainerWatch {
    observer: ResizeObserver,
    _callback: Closure<dyn FnMut(js_sys::Array)>,
}

/// Crossfading image carousel rendered into a canvas inside `container`.
#[wasm_bindgen]
pub struct WebCarousel {
    slot: Rc<Slot>,
    watch: Option<ContainerWatch>,
}

#[wasm_bindgen]
impl WebCarousel {
    /// `container` is a CSS selector. `effects` is the effect catalog, either
    /// as JSON text or as a plain object or array. `images` holds image URLs
    /// or already loaded `HTMLImageElement`s. `carousel_time` is in
    /// milliseconds.
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: &str,
        effects: JsValue,
        images: js_sys::Array,
        carousel_time: Option<f64>,
        watch_resize: Option<bool>,
    ) -> Result<WebCarousel, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        if container.trim().is_empty() {
            return Err(to_js(EngineError::Configuration(
                "container selector is required".into(),
            )));
        }
        let element = document.query_selector(container)?.ok_or_else(|| {
            to_js(EngineError::Configuration(format!(
                "container `{container}` not found"
            )))
        })?;

        let catalog = match effects.as_string() {
            Some(json) => json,
            None => js_sys::JSON::stringify(&effects)?
                .as_string()
                .unwrap_or_default(),
        };
        let effects = load_effects(&catalog).map_err(to_js)?;
        let options = CarouselOptions {
            carousel_time_ms: carousel_time,
            watch_resize: watch_resize.unwrap_or(false),
        };
        let config = options.into_config().map_err(to_js)?;

        let mut sources = WebImages::new(document.clone());
        for item in images.iter() {
            if let Some(url) = item.as_string() {
                sources.push_url(&url)?;
            } else if let Ok(element) = item.dyn_into::<HtmlImageElement>() {
                sources.push_element(element);
            } else {
                return Err(to_js(EngineError::Configuration(
                    "images must be URLs or HTMLImageElements".into(),
                )));
            }
        }

        let slot: Rc<Slot> = Rc::new(RefCell::new(None));
        let platform = WebPlatform::new(document, element.clone(), Rc::downgrade(&slot));
        let host = WebHost::new(window, Rc::downgrade(&slot));
        let engine = Carousel::new(platform, host, sources, effects, &config).map_err(to_js)?;
        *slot.borrow_mut() = Some(engine);

        let mut carousel = WebCarousel { slot, watch: None };
        if config.watch_resize {
            carousel.watch_container(&element)?;
        }
        Ok(carousel)
    }

    /// Feeds the container's box size into the carousel whenever layout
    /// changes it.
    fn watch_container(&mut self, container: &Element) -> Result<(), JsValue> {
        let slot = Rc::downgrade(&self.slot);
        let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |_entries: js_sys::Array| {
            dispatch(&slot, |carousel| {
                if let Some(size) = carousel.platform().container_size() {
                    carousel.observe_resize(size);
                }
            });
        });
        let observer = ResizeObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe(container);
        self.watch = Some(ContainerWatch {
            observer,
            _callback: callback,
        });
        Ok(())
    }

    fn with_engine<R>(&self, run: impl FnOnce(&mut Engine) -> R) -> Result<R, JsValue> {
        let mut engine = self.slot.try_borrow_mut().map_err(|_| busy())?;
        engine
            .as_mut()
            .map(run)
            .ok_or_else(|| to_js(EngineError::Disposed))
    }

    pub fn start(&self) -> Result<(), JsValue> {
        self.with_engine(|carousel| carousel.start())?.map_err(to_js)
    }

    pub fn stop(&self) -> Result<(), JsValue> {
        self.with_engine(|carousel| carousel.stop())
    }

    /// Returns whether playback was running.
    pub fn pause(&self) -> Result<bool, JsValue> {
        self.with_engine(|carousel| carousel.pause())
    }

    #[wasm_bindgen(js_name = "continue")]
    pub fn resume(&self) -> Result<(), JsValue> {
        self.with_engine(|carousel| carousel.resume())?.map_err(to_js)
    }

    #[wasm_bindgen(js_name = simulateContextLoss)]
    pub fn simulate_context_loss(&self) -> Result<bool, JsValue> {
        self.with_engine(|carousel| carousel.simulate_context_loss())
    }

    /// `callback(width, height)` runs after each settled resize.
    #[wasm_bindgen(js_name = setResizeCallback)]
    pub fn set_resize_callback(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_engine(move |carousel| {
            carousel.set_resize_callback(move |size| {
                let width = JsValue::from(size.width);
                let height = JsValue::from(size.height);
                if let Err(err) = callback.call2(&JsValue::NULL, &width, &height) {
                    warn!(error = ?err, "resize callback threw");
                }
            });
        })
    }

    #[wasm_bindgen(getter)]
    pub fn status(&self) -> Result<String, JsValue> {
        self.with_engine(|carousel| format!("{:?}", carousel.state().status).to_lowercase())
    }

    #[wasm_bindgen(getter)]
    pub fn progress(&self) -> Result<f32, JsValue> {
        self.with_engine(|carousel| carousel.state().progress)
    }

    /// Stops playback, releases GPU objects and removes the canvas.
    pub fn dispose(&mut self) -> Result<(), JsValue> {
        if let Some(watch) = self.watch.take() {
            watch.observer.disconnect();
        }
        let mut engine = self.slot.try_borrow_mut().map_err(|_| busy())?;
        if let Some(mut carousel) = engine.take() {
            carousel.dispose();
        }
        Ok(())
    }
}

impl Drop for WebCarousel {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(error = ?err, "carousel dropped while busy");
        }
    }
}
