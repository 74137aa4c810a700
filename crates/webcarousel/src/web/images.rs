use renderer::{DecodedImage, ImageFetch, ImageLoadError, ImageSource};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement};

struct Entry {
    element: HtmlImageElement,
    decoded: Option<DecodedImage>,
}

/// Images backed by `<img>` elements, rasterized through a 2D canvas the first
/// time they are needed.
pub(crate) struct WebImages {
    document: Document,
    entries: Vec<Entry>,
}

impl WebImages {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            entries: Vec::new(),
        }
    }

    /// Starts loading `url` with anonymous CORS so the pixels stay readable.
    pub fn push_url(&mut self, url: &str) -> Result<(), JsValue> {
        let element = HtmlImageElement::new()?;
        element.set_cross_origin(Some("anonymous"));
        element.set_src(url);
        self.push_element(element);
        Ok(())
    }

    pub fn push_element(&mut self, element: HtmlImageElement) {
        self.entries.push(Entry {
            element,
            decoded: None,
        });
    }

    fn rasterize(&self, index: usize, element: &HtmlImageElement) -> Result<DecodedImage, ImageLoadError> {
        let decode_error = |message: String| ImageLoadError::Decode { index, message };
        let width = element.natural_width();
        let height = element.natural_height();

        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|err| decode_error(format!("{err:?}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| decode_error("created element is not a canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        let context = canvas
            .get_context("2d")
            .map_err(|err| decode_error(format!("{err:?}")))?
            .ok_or_else(|| decode_error("2d context unavailable".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| decode_error("unexpected 2d context type".into()))?;

        context
            .draw_image_with_html_image_element(element, 0.0, 0.0)
            .map_err(|err| decode_error(format!("{err:?}")))?;
        // Throws for cross-origin images served without CORS headers.
        let pixels = context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .map_err(|err| decode_error(format!("pixels are not readable: {err:?}")))?;
        DecodedImage::from_raw(width, height, pixels.data().0)
            .ok_or_else(|| decode_error("pixel buffer does not match image size".into()))
    }
}

impl ImageSource for WebImages {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn fetch(&mut self, index: usize) -> ImageFetch {
        let Some(entry) = self.entries.get(index) else {
            return ImageFetch::Failed(ImageLoadError::Missing { index });
        };
        if let Some(decoded) = &entry.decoded {
            return ImageFetch::Ready(decoded.clone());
        }
        if !entry.element.complete() {
            return ImageFetch::Pending;
        }
        if entry.element.natural_width() == 0 || entry.element.natural_height() == 0 {
            return ImageFetch::Failed(ImageLoadError::Fetch {
                index,
                message: format!("failed to load {}", entry.element.src()),
            });
        }

        let element = entry.element.clone();
        match self.rasterize(index, &element) {
            Ok(decoded) => {
                tracing::debug!(
                    index,
                    width = decoded.width(),
                    height = decoded.height(),
                    "image rasterized"
                );
                if let Some(entry) = self.entries.get_mut(index) {
                    entry.decoded = Some(decoded.clone());
                }
                ImageFetch::Ready(decoded)
            }
            Err(err) => ImageFetch::Failed(err),
        }
    }
}
