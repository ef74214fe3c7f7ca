//! Image encoding collaborator and payload compression.
//!
//! Turning a picture into panel bytes (dithering, palette mapping, bit
//! packing) is delegated to an [`ImageEncoder`]. This module only checks the
//! preconditions and wraps zlib compression of the result.

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::error::{Error, Result};
use crate::types::{ColorScheme, DisplayConfig, DitherMode};

/// Default zlib compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// An RGB image, 3 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u16,
    height: u16,
    rgb: Vec<u8>,
}

impl RawImage {
    /// Wraps RGB pixel data, checking that its length matches the size.
    pub fn new(width: u16, height: u16, rgb: Vec<u8>) -> Result<Self> {
        let expected = usize::from(width) * usize::from(height) * 3;
        if rgb.len() != expected {
            return Err(Error::Encoding {
                message: format!(
                    "{width}x{height} image needs {expected} RGB bytes, got {}",
                    rgb.len()
                ),
            });
        }
        Ok(Self { width, height, rgb })
    }

    /// Returns the width in pixels.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Returns the height in pixels.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Returns the RGB pixel data.
    #[must_use]
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }
}

/// Converts images into the panel's native byte format.
///
/// Implementations must be deterministic: the same input yields the same
/// bytes.
pub trait ImageEncoder: Send + Sync {
    /// Encodes `image` for a `width` x `height` panel.
    fn prepare_image(
        &self,
        image: &RawImage,
        width: u16,
        height: u16,
        color_scheme: ColorScheme,
        dither: DitherMode,
    ) -> Result<Vec<u8>>;
}

/// Encodes `image` for `display`, checking scheme and dimensions first.
pub fn prepare_for_display(
    encoder: &dyn ImageEncoder,
    image: &RawImage,
    display: &DisplayConfig,
    dither: DitherMode,
) -> Result<Vec<u8>> {
    let scheme = display.color_scheme().ok_or_else(|| Error::Encoding {
        message: format!("unsupported color scheme {}", display.color_scheme),
    })?;

    if image.width() != display.pixel_width || image.height() != display.pixel_height {
        return Err(Error::Encoding {
            message: format!(
                "image is {}x{}, display is {}x{}",
                image.width(),
                image.height(),
                display.pixel_width,
                display.pixel_height
            ),
        });
    }

    let encoded = encoder.prepare_image(
        image,
        display.pixel_width,
        display.pixel_height,
        scheme,
        dither,
    )?;
    if encoded.is_empty() {
        return Err(Error::Encoding {
            message: "encoder produced no data".into(),
        });
    }

    tracing::debug!(
        "encoded {}x{} image as {:?}: {} bytes",
        image.width(),
        image.height(),
        scheme,
        encoded.len()
    );
    Ok(encoded)
}

/// zlib-compresses `data` at `level` (0-10).
#[must_use]
pub fn compress(data: &[u8], level: u8) -> Vec<u8> {
    compress_to_vec_zlib(data, level)
}

/// Inflates zlib data.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_to_vec_zlib(data).map_err(|e| Error::Encoding {
        message: format!("zlib inflate failed: {e:?}"),
    })
}
