//! Image optimization.
//!
//! Each image family gets its own settings:
//! - palette images (`png`) are re-encoded losslessly at maximum compression,
//!   `gif` is validated and kept as is
//! - photographic images (`jpg`, `jpeg`) are re-encoded at a fixed quality,
//!   `webp` is validated and kept as is
//! - vector images (`svg`) are re-serialized without whitespace
//!
//! The `image` crate has no GIF or WebP optimizer (its encoders only
//! re-encode, usually larger), so those two families are copied once they
//! decode as the format their extension claims.
//!
//! An optimized file that is not smaller than its source is discarded in
//! favour of the original bytes.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};

use crate::class::AssetClass;
use crate::traits::{Transform, TransformError};

/// Image family, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Gif,
    Jpeg,
    Webp,
    Svg,
}

impl ImageKind {
    /// Classify a path by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "webp" => Some(ImageKind::Webp),
            "svg" => Some(ImageKind::Svg),
            _ => None,
        }
    }
}

/// Options for the image transform.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self { jpeg_quality: 75 }
    }
}

/// Optimizes raster and vector images.
#[derive(Debug, Clone, Default)]
pub struct ImageTransform {
    options: ImageOptions,
}

impl ImageTransform {
    pub fn new(options: ImageOptions) -> Self {
        Self { options }
    }

    fn optimize_png(&self, content: &[u8]) -> Result<Vec<u8>, String> {
        let img = image::load_from_memory_with_format(content, ImageFormat::Png)
            .map_err(|e| e.to_string())?;

        let mut out = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
        img.write_with_encoder(encoder).map_err(|e| e.to_string())?;
        Ok(out)
    }

    fn optimize_jpeg(&self, content: &[u8]) -> Result<Vec<u8>, String> {
        let img = image::load_from_memory_with_format(content, ImageFormat::Jpeg)
            .map_err(|e| e.to_string())?;

        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut out = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut out, self.options.jpeg_quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|e| e.to_string())?;
        Ok(out.into_inner())
    }

    fn optimize_svg(&self, content: &[u8]) -> Result<Vec<u8>, String> {
        // usvg drops <text> without a font database; keep such files intact.
        if contains(content, b"<text") {
            return Ok(content.to_vec());
        }

        let tree = usvg::Tree::from_data(content, &usvg::Options::default())
            .map_err(|e| format!("Failed to parse SVG: {}", e))?;

        let write_options = usvg::WriteOptions {
            indent: usvg::Indent::None,
            ..Default::default()
        };

        Ok(tree.to_string(&write_options).into_bytes())
    }

    fn validate(&self, content: &[u8], expected: ImageFormat) -> Result<Vec<u8>, String> {
        match image::guess_format(content) {
            Ok(format) if format == expected => Ok(content.to_vec()),
            Ok(format) => Err(format!("expected {:?} data, found {:?}", expected, format)),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Transform for ImageTransform {
    fn class(&self) -> AssetClass {
        AssetClass::Image
    }

    fn transform(&self, content: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
        let kind = ImageKind::from_path(path).ok_or_else(|| TransformError::Image {
            path: path.to_path_buf(),
            message: "unsupported image extension".to_string(),
        })?;

        let optimized = match kind {
            ImageKind::Png => self.optimize_png(content),
            ImageKind::Jpeg => self.optimize_jpeg(content),
            ImageKind::Svg => self.optimize_svg(content),
            ImageKind::Gif => self.validate(content, ImageFormat::Gif),
            ImageKind::Webp => self.validate(content, ImageFormat::WebP),
        }
        .map_err(|message| TransformError::Image {
            path: path.to_path_buf(),
            message,
        })?;

        if optimized.len() >= content.len() {
            tracing::debug!("Keeping original {} (optimized was not smaller)", path.display());
            return Ok(content.to_vec());
        }

        Ok(optimized)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
