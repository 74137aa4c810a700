use image::imageops::flip_vertical_in_place;

use super::api::GraphicsApi;
use crate::error::EngineError;
use crate::images::DecodedImage;

/// Unit holding the image the transition moves towards.
pub const TO_UNIT: u32 = 0;
/// Unit holding the image the transition starts from.
pub const FROM_UNIT: u32 = 1;

struct TexturePair<A: GraphicsApi> {
    to: A::Texture,
    from: A::Texture,
}

/// Holds either no textures or exactly one from/to pair.
pub struct TextureBuffer<A: GraphicsApi> {
    pair: Option<TexturePair<A>>,
}

impl<A: GraphicsApi> Default for TextureBuffer<A> {
    fn default() -> Self {
        Self { pair: None }
    }
}

impl<A: GraphicsApi> TextureBuffer<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_textures(&self) -> usize {
        if self.pair.is_some() {
            2
        } else {
            0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pair.is_some()
    }

    /// Replaces the pair. The previous pair is deleted first; if either upload
    /// fails the buffer is left empty.
    pub fn upload(
        &mut self,
        api: &A,
        from: &DecodedImage,
        to: &DecodedImage,
    ) -> Result<(), EngineError> {
        self.release(api);
        let to_texture = upload_one(api, TO_UNIT, to)?;
        let from_texture = match upload_one(api, FROM_UNIT, from) {
            Ok(texture) => texture,
            Err(err) => {
                api.delete_texture(to_texture);
                return Err(err);
            }
        };
        self.pair = Some(TexturePair {
            to: to_texture,
            from: from_texture,
        });
        Ok(())
    }

    pub fn bind(&self, api: &A) {
        if let Some(pair) = &self.pair {
            api.bind_texture(TO_UNIT, Some(pair.to));
            api.bind_texture(FROM_UNIT, Some(pair.from));
        }
    }

    pub fn release(&mut self, api: &A) {
        if let Some(pair) = self.pair.take() {
            api.bind_texture(TO_UNIT, None);
            api.bind_texture(FROM_UNIT, None);
            api.delete_texture(pair.to);
            api.delete_texture(pair.from);
        }
    }
}

fn upload_one<A: GraphicsApi>(
    api: &A,
    unit: u32,
    image: &DecodedImage,
) -> Result<A::Texture, EngineError> {
    let texture = api.create_texture().map_err(EngineError::Resource)?;
    // GL samples rows bottom-up.
    let mut pixels = image.rgba().clone();
    flip_vertical_in_place(&mut pixels);
    api.upload_texture(unit, texture, &pixels);
    Ok(texture)
}
