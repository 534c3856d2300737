//! Shrink and re-encode an image so it fits a platform's upload limits.
//!
//! The image is scaled down (never up) to fit a bounding box, then encoded
//! as JPEG at decreasing quality until the output fits the byte budget or
//! the quality floor is reached. The floor is a hard stop: an image that is
//! still too large at the floor is written anyway and the caller gets to see
//! the final quality in [`TranscodedImage::quality`].

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Limits for one target platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Byte budget in KiB.
    pub max_kb: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub start_quality: u8,
    pub quality_step: u8,
    pub quality_floor: u8,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            max_kb: 976,
            max_width: 720,
            max_height: 720,
            start_quality: 85,
            quality_step: 5,
            quality_floor: 20,
        }
    }
}

impl TranscodeOptions {
    pub fn max_bytes(&self) -> u64 {
        self.max_kb * 1024
    }
}

/// A re-encoded image written next to its source.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodedImage {
    pub path: PathBuf,
    pub bytes: u64,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeOutcome {
    Transcoded(TranscodedImage),
    /// The source was missing; nothing was decoded.
    Fallback(PathBuf),
}

impl TranscodeOutcome {
    pub fn path(&self) -> &Path {
        match self {
            TranscodeOutcome::Transcoded(t) => &t.path,
            TranscodeOutcome::Fallback(p) => p,
        }
    }
}

/// `media/foo.png` -> `media/foo_compressed.jpg`
pub fn compressed_path(src: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    src.with_file_name(format!("{stem}_compressed.jpg"))
}

/// Largest size with the same aspect ratio that fits in the box.
/// Images already inside the box keep their size.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    (w, h)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, TranscodeError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Transcode `src` under `opts`, or hand back `fallback` if `src` is missing.
#[instrument(level = "info", skip_all, fields(src = %src.display()))]
pub fn transcode(
    src: &Path,
    opts: &TranscodeOptions,
    fallback: &Path,
) -> Result<TranscodeOutcome, TranscodeError> {
    if !src.exists() {
        warn!(fallback = %fallback.display(), "Source image missing; skipping transcode");
        return Ok(TranscodeOutcome::Fallback(fallback.to_path_buf()));
    }

    let img = ImageReader::open(src)?.with_guessed_format()?.decode()?;
    let (orig_w, orig_h) = img.dimensions();
    let (w, h) = fit_within(orig_w, orig_h, opts.max_width, opts.max_height);
    let img = if (w, h) != (orig_w, orig_h) {
        img.resize(w, h, FilterType::Lanczos3)
    } else {
        img
    };
    // JPEG has no alpha channel.
    let img = DynamicImage::ImageRgb8(img.to_rgb8());
    let (width, height) = img.dimensions();

    let budget = opts.max_bytes();
    let mut quality = opts.start_quality.max(opts.quality_floor);
    let encoded = loop {
        let buf = encode_jpeg(&img, quality)?;
        debug!(quality, bytes = buf.len(), budget, "Encoded candidate");
        if buf.len() as u64 <= budget || quality <= opts.quality_floor {
            break buf;
        }
        quality = quality
            .saturating_sub(opts.quality_step.max(1))
            .max(opts.quality_floor);
    };

    let out = compressed_path(src);
    std::fs::write(&out, &encoded)?;
    let bytes = encoded.len() as u64;
    if bytes > budget {
        warn!(bytes, budget, quality, "Quality floor reached above budget");
    }
    info!(path = %out.display(), bytes, quality, width, height, "Wrote transcoded image");

    Ok(TranscodeOutcome::Transcoded(TranscodedImage {
        path: out,
        bytes,
        quality,
        width,
        height,
    }))
}
