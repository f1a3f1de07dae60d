use std::fmt;
use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::UploadError;

/// Tightly packed RGBA8 pixels, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Opens and decodes an image file into RGBA8.
pub fn decode_image(path: &Path) -> Result<DecodedImage, UploadError> {
    let image = image::open(path).map_err(|source| UploadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = rgba8_from_image(&image);
    tracing::debug!(
        path = %path.display(),
        width = decoded.width,
        height = decoded.height,
        color = ?image.color(),
        "decoded texture image"
    );
    Ok(decoded)
}

/// Flattens any decoded color type into RGBA8.
///
/// Channels wider than 8 bits are narrowed with `v / 256`, not the rounding
/// conversion `image` applies, so 16-bit sources keep the exact byte values
/// a 16-to-8 truncation produces.
pub fn rgba8_from_image(image: &DynamicImage) -> DecodedImage {
    let (width, height) = image.dimensions();
    let color = image.color();
    let bits_per_channel = color.bits_per_pixel() / u16::from(color.channel_count());
    let pixels = if bits_per_channel <= 8 {
        image.to_rgba8().into_raw()
    } else {
        image
            .to_rgba16()
            .into_raw()
            .into_iter()
            .map(narrow_channel)
            .collect()
    };
    DecodedImage {
        width,
        height,
        pixels,
    }
}

pub(crate) fn narrow_channel(value: u16) -> u8 {
    (value / 256) as u8
}
