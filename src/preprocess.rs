//! Image preprocessing before recognition.
//!
//! The enabled pipeline is grayscale, optional deskew, then Otsu
//! binarization. Every step is deterministic.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::config::OcrConfig;
use crate::error::{Error, Result};

/// Coarse sweep half-range in degrees.
const COARSE_RANGE: f32 = 15.0;
const COARSE_STEP: f32 = 1.0;
const FINE_STEP: f32 = 0.1;
/// Angles smaller than this are left alone.
const MIN_CORRECTION: f32 = 0.05;
/// Upper bound of foreground samples scored per angle.
const MAX_SAMPLES: usize = 40_000;

/// Decode an uploaded image. Multi-frame TIFFs yield their first frame.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data).map_err(|e| Error::InvalidImageData(e.to_string()))
}

/// Prepare an image for recognition according to the OCR settings.
///
/// With preprocessing disabled the image is returned unchanged.
pub fn preprocess(image: DynamicImage, config: &OcrConfig) -> DynamicImage {
    if !config.apply_preprocessing {
        return image;
    }

    let mut gray = image.to_luma8();
    if config.deskew {
        gray = deskew(&gray);
    }
    DynamicImage::ImageLuma8(binarize(&gray))
}

/// Global Otsu binarization: ink becomes 0, background 255.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// Rotate the image so its text lines run horizontally.
pub fn deskew(gray: &GrayImage) -> GrayImage {
    let angle = estimate_skew(gray);
    if angle.abs() < MIN_CORRECTION {
        return gray.clone();
    }
    log::debug!("Deskewing by {:.1} degrees", angle);
    rotate_about_center(
        gray,
        angle.to_radians(),
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

/// Estimate the clockwise rotation in degrees that levels the text lines.
///
/// Projection profile search: every candidate angle projects the ink pixels
/// onto the rotated vertical axis, and the sharpest row histogram wins. A
/// coarse 1° sweep over ±15° is refined in 0.1° steps around the best angle.
/// Ties keep the angle closest to zero.
pub fn estimate_skew(gray: &GrayImage) -> f32 {
    let points = ink_points(gray);
    if points.len() < 2 {
        return 0.0;
    }

    let coarse = candidates(-COARSE_RANGE, COARSE_RANGE, COARSE_STEP);
    let reach = half_diagonal(gray);
    let best = best_angle(&points, reach, &coarse);

    let fine = candidates(best - COARSE_STEP, best + COARSE_STEP, FINE_STEP);
    best_angle(&points, reach, &fine)
}

/// Farthest distance of any pixel from the image centre.
fn half_diagonal(gray: &GrayImage) -> usize {
    let (w, h) = (gray.width() as f32, gray.height() as f32);
    ((w * w + h * h).sqrt() / 2.0).ceil() as usize + 1
}

/// Candidate angles ordered by distance from zero, then ascending.
fn candidates(from: f32, to: f32, step: f32) -> Vec<f32> {
    let count = ((to - from) / step).round() as i32;
    let mut angles: Vec<f32> = (0..=count)
        .map(|i| ((from + i as f32 * step) * 10.0).round() / 10.0)
        .collect();
    angles.sort_by(|a, b| {
        a.abs()
            .total_cmp(&b.abs())
            .then(a.total_cmp(b))
    });
    angles
}

fn best_angle(points: &[(f32, f32)], reach: usize, angles: &[f32]) -> f32 {
    let mut best = 0.0;
    let mut best_score = f64::MIN;
    for &angle in angles {
        let score = profile_score(points, reach, angle);
        if score > best_score {
            best_score = score;
            best = angle;
        }
    }
    best
}

/// Sum of squared row counts of the projected ink.
fn profile_score(points: &[(f32, f32)], reach: usize, angle: f32) -> f64 {
    let (sin, cos) = angle.to_radians().sin_cos();
    let offset = reach as f32;
    let mut bins = vec![0u32; reach * 2 + 1];
    for &(x, y) in points {
        let projected = x * sin + y * cos + offset;
        if projected >= 0.0 {
            if let Some(bin) = bins.get_mut(projected as usize) {
                *bin += 1;
            }
        }
    }
    bins.iter().map(|&c| (c as f64) * (c as f64)).sum()
}

/// Ink pixel coordinates relative to the image centre.
fn ink_points(gray: &GrayImage) -> Vec<(f32, f32)> {
    let level = otsu_level(gray);
    let total = gray.pixels().filter(|p| p[0] <= level).count();
    let stride = (total / MAX_SAMPLES).max(1);
    let cx = gray.width() as f32 / 2.0;
    let cy = gray.height() as f32 / 2.0;

    gray.enumerate_pixels()
        .filter(|(_, _, p)| p[0] <= level)
        .step_by(stride)
        .map(|(x, y, _)| (x as f32 - cx, y as f32 - cy))
        .collect()
}
