use std::rc::Weak;

use anyhow::{anyhow, Result};
use renderer::{GlowApi, Platform, SurfaceSize};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Event, HtmlCanvasElement, WebGlRenderingContext, WebglLoseContext};

use super::{dispatch, Slot};
use crate::options::surface_id;

const CONTEXT_LOST_EVENT: &str = "webglcontextlost";

fn js_error(context: &str, value: JsValue) -> anyhow::Error {
    anyhow!("{context}: {value:?}")
}

struct Surface {
    canvas: HtmlCanvasElement,
    context: WebGlRenderingContext,
    on_lost: Closure<dyn FnMut(Event)>,
}

/// Canvas surfaces inside a container element.
pub(crate) struct WebPlatform {
    document: Document,
    container: Element,
    slot: Weak<Slot>,
    surface: Option<Surface>,
}

impl WebPlatform {
    pub fn new(document: Document, container: Element, slot: Weak<Slot>) -> Self {
        Self {
            document,
            container,
            slot,
            surface: None,
        }
    }

    fn insert_canvas(&self, size: SurfaceSize) -> Result<HtmlCanvasElement> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|err| js_error("creating canvas", err))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| anyhow!("created element is not a canvas"))?;
        canvas.set_id(&surface_id(js_sys::Math::random()));
        canvas.set_width(size.width);
        canvas.set_height(size.height);
        self.container
            .append_child(&canvas)
            .map_err(|err| js_error("inserting canvas", err))?;
        Ok(canvas)
    }

    fn attach(&self, canvas: &HtmlCanvasElement) -> Result<Surface> {
        let slot = self.slot.clone();
        let on_lost = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            // Without this the browser never restores the context.
            event.prevent_default();
            dispatch(&slot, |carousel| {
                carousel.on_context_lost();
            });
        });
        canvas
            .add_event_listener_with_callback(CONTEXT_LOST_EVENT, on_lost.as_ref().unchecked_ref())
            .map_err(|err| js_error("adding context loss listener", err))?;

        let context = canvas
            .get_context("webgl")
            .map_err(|err| js_error("requesting webgl context", err))?
            .ok_or_else(|| anyhow!("WebGL is not supported by this browser"))?
            .dyn_into::<WebGlRenderingContext>()
            .map_err(|_| anyhow!("context is not a WebGL1 rendering context"))?;

        Ok(Surface {
            canvas: canvas.clone(),
            context,
            on_lost,
        })
    }
}

impl Platform for WebPlatform {
    type Api = GlowApi;

    fn container_size(&self) -> Option<SurfaceSize> {
        SurfaceSize::from_box(
            f64::from(self.container.client_width()),
            f64::from(self.container.client_height()),
        )
    }

    fn create_surface(&mut self, size: SurfaceSize) -> Result<GlowApi> {
        let canvas = self.insert_canvas(size)?;
        let surface = match self.attach(&canvas) {
            Ok(surface) => surface,
            Err(err) => {
                canvas.remove();
                return Err(err);
            }
        };
        let gl = glow::Context::from_webgl1_context(surface.context.clone());
        debug!(id = %canvas.id(), "canvas surface inserted");
        self.surface = Some(surface);
        Ok(GlowApi::new(gl))
    }

    fn resize_surface(&mut self, size: SurfaceSize) {
        if let Some(surface) = &self.surface {
            surface.canvas.set_width(size.width);
            surface.canvas.set_height(size.height);
        }
    }

    fn destroy_surface(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        if let Err(err) = surface.canvas.remove_event_listener_with_callback(
            CONTEXT_LOST_EVENT,
            surface.on_lost.as_ref().unchecked_ref(),
        ) {
            warn!(error = ?err, "failed to remove context loss listener");
        }
        surface.canvas.remove();
        debug!(id = %surface.canvas.id(), "canvas surface removed");
    }

    fn lose_context(&mut self) -> bool {
        let Some(surface) = &self.surface else {
            return false;
        };
        let extension = match surface.context.get_extension("WEBGL_lose_context") {
            Ok(Some(extension)) => extension,
            Ok(None) => {
                warn!("WEBGL_lose_context is not available");
                return false;
            }
            Err(err) => {
                warn!(error = ?err, "failed to query WEBGL_lose_context");
                return false;
            }
        };
        extension.unchecked_into::<WebglLoseContext>().lose_context();
        true
    }
}
