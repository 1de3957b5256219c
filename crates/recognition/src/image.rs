//! Owned input raster.
//!
//! An [`Image`] is validated once when it is built; everything downstream can
//! assume non-zero dimensions and a buffer that matches them.

use crate::error::InvalidImage;
use image::{ColorType, DynamicImage, GrayImage, ImageBuffer};
use std::path::Path;

/// Immutable 8-bit raster with 1, 3 or 4 channels
#[derive(Debug, Clone)]
pub struct Image {
    inner: DynamicImage,
}

impl Image {
    /// Build an image from raw interleaved pixel data
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, InvalidImage> {
        if width == 0 || height == 0 {
            return Err(InvalidImage::EmptyDimensions { width, height });
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(InvalidImage::UnsupportedChannels(channels));
        }

        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(InvalidImage::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let actual = data.len();
        let inner = match channels {
            1 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            3 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            _ => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
        }
        .ok_or(InvalidImage::BufferSize { expected, actual })?;

        Ok(Self { inner })
    }

    /// Wrap an already decoded image, narrowing it to 8-bit storage
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, InvalidImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(InvalidImage::EmptyDimensions {
                width: image.width(),
                height: image.height(),
            });
        }

        let inner = match image.color() {
            ColorType::L8 | ColorType::Rgb8 | ColorType::Rgba8 => image,
            ColorType::L16 => DynamicImage::ImageLuma8(image.to_luma8()),
            ColorType::Rgb16 | ColorType::Rgb32F => DynamicImage::ImageRgb8(image.to_rgb8()),
            _ => DynamicImage::ImageRgba8(image.to_rgba8()),
        };

        Ok(Self { inner })
    }

    pub fn from_gray(image: GrayImage) -> Result<Self, InvalidImage> {
        Self::from_dynamic(DynamicImage::ImageLuma8(image))
    }

    /// Decode an encoded file (jpeg, png, bmp, ...) held in memory
    pub fn decode(bytes: &[u8]) -> Result<Self, InvalidImage> {
        let decoded = image::load_from_memory(bytes)?;
        Self::from_dynamic(decoded)
    }

    /// Read and decode an image file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InvalidImage> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| InvalidImage::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn channels(&self) -> u8 {
        self.inner.color().channel_count()
    }

    /// Interleaved pixel data, row-major
    pub fn pixels(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Grayscale copy used by the classical stages
    pub fn to_luma(&self) -> GrayImage {
        self.inner.to_luma8()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.inner
    }
}
