use thiserror::Error;

use crate::shared::frame::{Frame, GrayFrame};

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Fixed blur kernel for sensor-noise suppression.
const BLUR_KERNEL_SIZE: usize = 5;

/// Normalize a raw color frame for change detection.
///
/// Steps, in order: RGB → grayscale (BT.601 luma), 5×5 Gaussian blur,
/// histogram equalization. Returns the equalized plane replicated back to
/// three channels (suitable for display) together with the plane itself.
/// Pure function of its input.
pub fn preprocess_frame(frame: &Frame) -> Result<(Frame, GrayFrame), PreprocessError> {
    if frame.width() == 0 || frame.height() == 0 || frame.data().is_empty() {
        return Err(PreprocessError::InvalidFrame(
            "empty frame".to_string(),
        ));
    }
    if frame.channels() != 3 {
        return Err(PreprocessError::InvalidFrame(format!(
            "expected 3 channels, got {}",
            frame.channels()
        )));
    }

    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let expected = width * height * frame.channels() as usize;
    if frame.data().len() != expected {
        return Err(PreprocessError::InvalidFrame(format!(
            "buffer holds {} bytes, dimensions require {expected}",
            frame.data().len()
        )));
    }

    let mut plane = to_grayscale(frame.data());
    gaussian_blur_plane(&mut plane, width, height, BLUR_KERNEL_SIZE);
    let equalized = equalize_plane(&plane);

    let mut display = Vec::with_capacity(equalized.len() * 3);
    for &v in &equalized {
        display.extend_from_slice(&[v, v, v]);
    }

    let gray = GrayFrame::new(equalized, frame.width(), frame.height());
    let display_frame = Frame::new(display, frame.width(), frame.height(), 3, frame.index());
    Ok((display_frame, gray))
}

/// BT.601 luma conversion of interleaved RGB bytes.
fn to_grayscale(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| {
            let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            luma.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Precompute a 1D Gaussian kernel of the given odd size.
///
/// Sigma is derived as `kernel_size / 6.0`, matching OpenCV's sigma=0
/// convention.
fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel.iter().map(|&v| v as f32).collect()
}

/// Separable Gaussian blur over a single-channel plane, edge-clamped.
fn gaussian_blur_plane(plane: &mut [u8], width: usize, height: usize, kernel_size: usize) {
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    let kernel = gaussian_kernel_1d(kernel_size);
    let half = kernel_size / 2;
    let mut temp = vec![0.0f32; width * height];

    // Horizontal pass: plane → temp
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - half as isize)
                    .max(0)
                    .min((width - 1) as isize) as usize;
                sum += plane[y * width + sx] as f32 * w;
            }
            temp[y * width + x] = sum;
        }
    }

    // Vertical pass: temp → plane
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - half as isize)
                    .max(0)
                    .min((height - 1) as isize) as usize;
                sum += temp[sy * width + x] * w;
            }
            plane[y * width + x] = sum.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Histogram equalization of a grayscale plane.
///
/// A plane containing a single intensity is returned unchanged, since the
/// normalization denominator degenerates to zero in that case.
fn equalize_plane(plane: &[u8]) -> Vec<u8> {
    let total = plane.len() as u64;
    if total == 0 {
        return Vec::new();
    }

    let mut histogram = [0u64; 256];
    for &v in plane {
        histogram[v as usize] += 1;
    }

    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (i, &count) in histogram.iter().enumerate() {
        running += count;
        cdf[i] = running;
    }

    let cdf_min = cdf
        .iter()
        .copied()
        .find(|&c| c > 0)
        .unwrap_or(0);
    let denom = total - cdf_min;
    if denom == 0 {
        return plane.to_vec();
    }

    let mut lut = [0u8; 256];
    for i in 0..256 {
        let scaled = (cdf[i].saturating_sub(cdf_min)) as f64 * 255.0 / denom as f64;
        lut[i] = scaled.round().clamp(0.0, 255.0) as u8;
    }
    plane.iter().map(|&v| lut[v as usize]).collect()
}
