use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageLoadError {
    #[error("image {index} is out of range")]
    Missing { index: usize },

    #[error("failed to fetch image {index}: {message}")]
    Fetch { index: usize, message: String },

    #[error("failed to decode image {index}: {message}")]
    Decode { index: usize, message: String },
}

/// RGBA8 pixels ready for upload. Clones share the pixel buffer.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn from_raw(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, rgba).map(Self::from_rgba)
    }

    pub fn decode(index: usize, bytes: &[u8]) -> Result<Self, ImageLoadError> {
        image::load_from_memory(bytes)
            .map(|decoded| Self::from_rgba(decoded.to_rgba8()))
            .map_err(|err| ImageLoadError::Decode {
                index,
                message: err.to_string(),
            })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Debug, Clone)]
pub enum ImageFetch {
    Ready(DecodedImage),
    /// Not resident yet; ask again later.
    Pending,
    Failed(ImageLoadError),
}

/// Ordered images for the carousel. The sequence may grow while playing.
pub trait ImageSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts loading `index` if needed and reports what is available now.
    fn fetch(&mut self, index: usize) -> ImageFetch;
}

/// Images that are all decoded up front.
#[derive(Debug, Clone, Default)]
pub struct StaticImages {
    images: Vec<DecodedImage>,
}

impl StaticImages {
    pub fn new(images: Vec<DecodedImage>) -> Self {
        Self { images }
    }

    pub fn push(&mut self, image: DecodedImage) {
        self.images.push(image);
    }
}

impl ImageSource for StaticImages {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn fetch(&mut self, index: usize) -> ImageFetch {
        match self.images.get(index) {
            Some(image) => ImageFetch::Ready(image.clone()),
            None => ImageFetch::Failed(ImageLoadError::Missing { index }),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use files::FileImages;

#[cfg(not(target_arch = "wasm32"))]
mod files {
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::thread::{self, JoinHandle};

    use anyhow::{anyhow, Context, Result};
    use crossbeam_channel::{unbounded, Receiver, Sender};

    use super::{DecodedImage, ImageFetch, ImageLoadError, ImageSource};

    enum Slot {
        Requested,
        Ready(DecodedImage),
        Failed(ImageLoadError),
    }

    /// Image files decoded on a background thread.
    pub struct FileImages {
        paths: Vec<PathBuf>,
        slots: HashMap<usize, Slot>,
        jobs: Option<Sender<(usize, PathBuf)>>,
        results: Receiver<(usize, Result<DecodedImage, ImageLoadError>)>,
        worker: Option<JoinHandle<()>>,
    }

    impl FileImages {
        pub fn spawn(paths: Vec<PathBuf>) -> Result<Self> {
            let (job_tx, job_rx) = unbounded::<(usize, PathBuf)>();
            let (result_tx, result_rx) = unbounded();
            let worker = thread::Builder::new()
                .name("fadeshow-images".into())
                .spawn(move || {
                    for (index, path) in job_rx {
                        let result = decode_file(index, &path);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|err| anyhow!("failed to spawn image worker: {err}"))?;

            Ok(Self {
                paths,
                slots: HashMap::new(),
                jobs: Some(job_tx),
                results: result_rx,
                worker: Some(worker),
            })
        }

        pub fn push(&mut self, path: PathBuf) {
            self.paths.push(path);
        }

        fn drain_results(&mut self) {
            for (index, result) in self.results.try_iter() {
                let slot = match result {
                    Ok(image) => Slot::Ready(image),
                    Err(err) => Slot::Failed(err),
                };
                self.slots.insert(index, slot);
            }
        }
    }

    fn decode_file(index: usize, path: &Path) -> Result<DecodedImage, ImageLoadError> {
        let bytes = fs::read(path)
            .with_context(|| format!("reading {}", path.display()))
            .map_err(|err| ImageLoadError::Fetch {
                index,
                message: format!("{err:#}"),
            })?;
        DecodedImage::decode(index, &bytes)
    }

    impl ImageSource for FileImages {
        fn len(&self) -> usize {
            self.paths.len()
        }

        fn fetch(&mut self, index: usize) -> ImageFetch {
            self.drain_results();
            // A failure is reported once; the next fetch retries.
            if matches!(self.slots.get(&index), Some(Slot::Failed(_))) {
                if let Some(Slot::Failed(err)) = self.slots.remove(&index) {
                    return ImageFetch::Failed(err);
                }
            }
            match self.slots.get(&index) {
                Some(Slot::Ready(image)) => return ImageFetch::Ready(image.clone()),
                Some(Slot::Requested) => return ImageFetch::Pending,
                Some(Slot::Failed(_)) | None => {}
            }

            let Some(path) = self.paths.get(index).cloned() else {
                return ImageFetch::Failed(ImageLoadError::Missing { index });
            };
            let sent = self
                .jobs
                .as_ref()
                .is_some_and(|jobs| jobs.send((index, path)).is_ok());
            if !sent {
                return ImageFetch::Failed(ImageLoadError::Fetch {
                    index,
                    message: "image worker is not running".into(),
                });
            }
            self.slots.insert(index, Slot::Requested);
            ImageFetch::Pending
        }
    }

    impl Drop for FileImages {
        fn drop(&mut self) {
            // Closing the job channel ends the worker loop.
            self.jobs.take();
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
    }
}
