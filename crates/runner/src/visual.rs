//! Artifact comparison

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::artifact::sha256_hex;
use crate::error::{RunnerError, RunnerResult};

/// Result of a visual comparison
#[derive(Debug, Clone, Serialize)]
pub struct VisualDiff {
    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    /// Number of different pixels
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Whether both images have the same width and height
    pub dimensions_match: bool,

    /// Path to the diff image (if generated)
    pub diff_image_path: Option<PathBuf>,

    /// Hash of the actual image file
    pub actual_hash: String,

    /// Hash of the baseline image file
    pub baseline_hash: String,
}

/// How strict a comparison is
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Allowed share of differing pixels (0.0 - 100.0 percent)
    pub threshold: f64,

    /// Where to write a diff image when pixels differ
    pub diff_path: Option<PathBuf>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            diff_path: None,
        }
    }
}

/// Per-channel difference tolerated before a pixel counts as changed
const TOLERANCE: i32 = 5;

/// Compare two image files, by hash first and then pixel by pixel
pub fn compare(actual: &Path, baseline: &Path, options: &CompareOptions) -> RunnerResult<VisualDiff> {
    for path in [actual, baseline] {
        if !path.exists() {
            return Err(RunnerError::Visual(format!(
                "image not found: {}",
                path.display()
            )));
        }
    }

    let actual_bytes = std::fs::read(actual)?;
    let baseline_bytes = std::fs::read(baseline)?;
    let actual_hash = sha256_hex(&actual_bytes);
    let baseline_hash = sha256_hex(&baseline_bytes);

    let actual_img = image::load_from_memory(&actual_bytes)?;
    let baseline_img = image::load_from_memory(&baseline_bytes)?;
    let dimensions_match = actual_img.dimensions() == baseline_img.dimensions();

    if actual_hash == baseline_hash {
        debug!("Images match exactly (same hash)");
        return Ok(VisualDiff {
            matches: true,
            diff_percent: 0.0,
            diff_pixels: 0,
            total_pixels: (actual_img.width() as u64) * (actual_img.height() as u64),
            dimensions_match,
            diff_image_path: None,
            actual_hash,
            baseline_hash,
        });
    }

    if !dimensions_match {
        warn!(
            "Image dimensions differ: actual {:?} vs baseline {:?}",
            actual_img.dimensions(),
            baseline_img.dimensions()
        );
    }

    // Compare over the union, pixels outside the overlap count as changed
    let width = actual_img.width().max(baseline_img.width());
    let height = actual_img.height().max(baseline_img.height());
    let actual_rgba = actual_img.to_rgba8();
    let baseline_rgba = baseline_img.to_rgba8();

    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;
    let total_pixels = (width as u64) * (height as u64);

    for y in 0..height {
        for x in 0..width {
            let a = (x < actual_rgba.width() && y < actual_rgba.height())
                .then(|| actual_rgba.get_pixel(x, y));
            let b = (x < baseline_rgba.width() && y < baseline_rgba.height())
                .then(|| baseline_rgba.get_pixel(x, y));

            match (a, b) {
                (Some(a), Some(b)) if !pixels_differ(a, b) => {
                    let c = a.channels();
                    diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
                _ => {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    let diff_percent = if total_pixels == 0 {
        0.0
    } else {
        (diff_pixels as f64 / total_pixels as f64) * 100.0
    };
    let matches = dimensions_match && diff_percent <= options.threshold;

    let diff_image_path = match &options.diff_path {
        Some(path) if diff_pixels > 0 => {
            diff_img.save(path)?;
            Some(path.clone())
        }
        _ => None,
    };

    if !matches {
        warn!(
            "{} differs from {}: {:.2}% pixels differ (threshold: {:.2}%)",
            actual.display(),
            baseline.display(),
            diff_percent,
            options.threshold
        );
    }

    Ok(VisualDiff {
        matches,
        diff_percent,
        diff_pixels,
        total_pixels,
        dimensions_match,
        diff_image_path,
        actual_hash,
        baseline_hash,
    })
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > TOLERANCE)
}
