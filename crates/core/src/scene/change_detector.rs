use thiserror::Error;

use crate::scene::morphology::{open3x3, ChangeMask};
use crate::scene::ratio_history::RatioHistory;
use crate::shared::constants::{
    DEFAULT_CHANGE_RATIO, DEFAULT_INTENSITY_THRESHOLD, DEFAULT_SMOOTHING,
};
use crate::shared::frame::GrayFrame;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
}

/// Tuning knobs for [`SceneChangeDetector`].
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    /// Pixel-intensity delta above which a pixel counts as changed.
    pub intensity_threshold: f64,
    /// Smoothed changed-pixel ratio above which a change is signalled.
    pub change_ratio: f64,
    /// Smoothing window size; values below 1 are clamped to 1.
    pub smoothing: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            intensity_threshold: DEFAULT_INTENSITY_THRESHOLD,
            change_ratio: DEFAULT_CHANGE_RATIO,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

/// Stateful temporal classifier for significant scene changes.
///
/// Compares each grayscale frame against the previous one: pixelwise
/// absolute difference, binarized at the intensity threshold, cleaned with
/// a 3×3 morphological opening, reduced to a changed-pixel ratio, then
/// averaged over a sliding window before comparing against the change
/// ratio. The first call after construction (or [`reset`](Self::reset))
/// only primes the previous frame and never signals.
///
/// State is owned by exactly one monitoring session and is mutated once
/// per `detect` call.
pub struct SceneChangeDetector {
    intensity_threshold: f64,
    change_ratio: f64,
    previous: Option<GrayFrame>,
    history: RatioHistory,
}

impl SceneChangeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            intensity_threshold: config.intensity_threshold,
            change_ratio: config.change_ratio,
            previous: None,
            history: RatioHistory::new(config.smoothing),
        }
    }

    /// Classify the next frame of the session.
    ///
    /// Fails only when the frame dimensions differ from the stored previous
    /// frame; the caller should [`reset`](Self::reset) and continue.
    pub fn detect(&mut self, gray: &GrayFrame) -> Result<bool, DetectError> {
        let Some(previous) = &self.previous else {
            self.previous = Some(gray.clone());
            return Ok(false);
        };

        if previous.dimensions() != gray.dimensions() {
            let (expected_width, expected_height) = previous.dimensions();
            let (width, height) = gray.dimensions();
            return Err(DetectError::FrameSizeMismatch {
                expected_width,
                expected_height,
                width,
                height,
            });
        }

        let mask = self.change_mask(previous, gray);
        let ratio = mask.set_ratio();

        self.previous = Some(gray.clone());
        self.history.push(ratio);
        Ok(self.history.mean() > self.change_ratio)
    }

    /// Drop the previous frame and ratio history, returning to the
    /// uninitialized state.
    pub fn reset(&mut self) {
        self.previous = None;
        self.history.clear();
    }

    fn change_mask(&self, previous: &GrayFrame, current: &GrayFrame) -> ChangeMask {
        let raw: Vec<u8> = previous
            .data()
            .iter()
            .zip(current.data())
            .map(|(&p, &c)| {
                let delta = (p as i16 - c as i16).abs() as f64;
                if delta > self.intensity_threshold {
                    255
                } else {
                    0
                }
            })
            .collect();
        open3x3(&ChangeMask::new(raw, current.width(), current.height()))
    }
}

impl Default for SceneChangeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 20;
    const H: u32 = 20;

    fn zeros() -> GrayFrame {
        GrayFrame::new(vec![0u8; (W * H) as usize], W, H)
    }

    /// Invert the given row/column span of a frame (0 ↔ 255). Every pixel
    /// in the span differs from the source by 255, well above the default
    /// intensity threshold, and solid spans of at least 3×3 survive the
    /// morphological opening exactly.
    fn flip_block(frame: &GrayFrame, rows: std::ops::Range<u32>, cols: std::ops::Range<u32>) -> GrayFrame {
        let mut data = frame.data().to_vec();
        for y in rows {
            for x in cols.clone() {
                let i = (y * W + x) as usize;
                data[i] = 255 - data[i];
            }
        }
        GrayFrame::new(data, W, H)
    }

    #[test]
    fn test_first_detect_is_always_false() {
        let mut detector = SceneChangeDetector::default();
        let noisy = GrayFrame::new(
            (0..(W * H) as usize).map(|i| (i * 37 % 256) as u8).collect(),
            W,
            H,
        );
        assert!(!detector.detect(&noisy).unwrap());
    }

    #[test]
    fn test_identical_frames_do_not_signal() {
        let mut detector = SceneChangeDetector::default();
        let frame = zeros();
        detector.detect(&frame).unwrap();
        assert!(!detector.detect(&frame.clone()).unwrap());
    }

    #[test]
    fn test_smoothing_one_signals_on_single_frame_ratio() {
        let config = DetectorConfig {
            smoothing: 1,
            ..DetectorConfig::default()
        };
        let mut detector = SceneChangeDetector::new(config);
        let f0 = zeros();
        detector.detect(&f0).unwrap();

        // 10x20 block flipped: ratio 0.5 > 0.25
        let f1 = flip_block(&f0, 0..10, 0..20);
        assert!(detector.detect(&f1).unwrap());

        // 4x10 block flipped: ratio 0.1, not signalled
        let f2 = flip_block(&f1, 0..4, 0..10);
        assert!(!detector.detect(&f2).unwrap());
    }

    #[test]
    fn test_windowed_mean_is_strictly_compared() {
        // Engineered ratio sequence 0.1, 0.4, 0.5 with smoothing 3:
        // running means 0.1, 0.25, 0.333 → signals false, false, true.
        // The exact-threshold mean of 0.25 must NOT signal.
        let config = DetectorConfig {
            smoothing: 3,
            ..DetectorConfig::default()
        };
        let mut detector = SceneChangeDetector::new(config);

        let f0 = zeros();
        let f1 = flip_block(&f0, 0..5, 0..8); // 40 px  = 0.1
        let f2 = flip_block(&f1, 5..13, 0..20); // 160 px = 0.4
        let f3 = flip_block(&f2, 0..10, 0..20); // 200 px = 0.5

        assert!(!detector.detect(&f0).unwrap());
        assert!(!detector.detect(&f1).unwrap());
        assert!(!detector.detect(&f2).unwrap());
        assert!(detector.detect(&f3).unwrap());
    }

    #[test]
    fn test_old_ratios_fall_out_of_window() {
        let config = DetectorConfig {
            smoothing: 2,
            ..DetectorConfig::default()
        };
        let mut detector = SceneChangeDetector::new(config);

        let f0 = zeros();
        let f1 = flip_block(&f0, 0..10, 0..20); // ratio 0.5

        detector.detect(&f0).unwrap();
        assert!(detector.detect(&f1).unwrap()); // mean 0.5
        assert!(!detector.detect(&f1.clone()).unwrap()); // mean (0.5 + 0) / 2 = 0.25
        // The 0.5 has been evicted: window is [0, 0].
        assert!(!detector.detect(&f1.clone()).unwrap());
    }

    #[test]
    fn test_isolated_noise_pixels_do_not_count() {
        let config = DetectorConfig {
            change_ratio: 0.0,
            smoothing: 1,
            ..DetectorConfig::default()
        };
        let mut detector = SceneChangeDetector::new(config);

        let f0 = zeros();
        detector.detect(&f0).unwrap();

        // Scattered single-pixel flips are removed by the opening, so even
        // a zero change-ratio threshold sees a 0.0 ratio.
        let mut data = f0.data().to_vec();
        for i in [0usize, 57, 133, 209, 341] {
            data[i] = 255;
        }
        let speckled = GrayFrame::new(data, W, H);
        assert!(!detector.detect(&speckled).unwrap());
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let mut detector = SceneChangeDetector::default();
        detector.detect(&zeros()).unwrap();

        let small = GrayFrame::new(vec![0u8; 25], 5, 5);
        let err = detector.detect(&small).unwrap_err();
        assert!(matches!(err, DetectError::FrameSizeMismatch { .. }));
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let mut detector = SceneChangeDetector::default();
        detector.detect(&zeros()).unwrap();
        detector.reset();

        // After reset the next frame primes again, regardless of size.
        let small = GrayFrame::new(vec![0u8; 25], 5, 5);
        assert!(!detector.detect(&small).unwrap());
    }
}
