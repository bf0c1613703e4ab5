use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;

/// Receives frames the scene detector flagged as significant.
///
/// Decouples the monitoring loop from what happens to an interesting frame
/// (save to disk, push to a queue, trigger recognition downstream).
pub trait ChangeSink: Send {
    fn on_significant_change(&mut self, frame: &Frame);
}

/// Receives identification events for faces matched against the gallery.
pub trait FaceSink: Send {
    fn on_identified_face(&mut self, label: &str, confidence: f64, frame: &Frame);
}

/// Sink that discards all events. Used when a caller only wants the
/// session statistics.
pub struct NullSink;

impl ChangeSink for NullSink {
    fn on_significant_change(&mut self, _frame: &Frame) {}
}

impl FaceSink for NullSink {
    fn on_identified_face(&mut self, _label: &str, _confidence: f64, _frame: &Frame) {}
}

/// Saves each significant frame as a PNG under a target directory,
/// named by frame index.
pub struct DirectoryChangeSink {
    dir: PathBuf,
    saved: usize,
}

impl DirectoryChangeSink {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            saved: 0,
        }
    }

    pub fn saved(&self) -> usize {
        self.saved
    }
}

impl ChangeSink for DirectoryChangeSink {
    fn on_significant_change(&mut self, frame: &Frame) {
        if let Err(e) = save_frame(&self.dir, frame) {
            log::warn!("failed to save change frame {}: {e}", frame.index());
            return;
        }
        self.saved += 1;
    }
}

fn save_frame(dir: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("frame data does not match its dimensions")?;
    img.save(dir.join(format!("change_{:06}.png", frame.index())))?;
    Ok(())
}
