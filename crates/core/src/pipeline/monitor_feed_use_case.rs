use std::sync::Arc;

use crate::pipeline::frame_sinks::{ChangeSink, FaceSink};
use crate::recognition::domain::face_encoder::FaceEncoder;
use crate::recognition::domain::gallery::SharedGallery;
use crate::recognition::domain::matcher::{best_match, MatchResult};
use crate::scene::change_detector::{DetectError, SceneChangeDetector};
use crate::scene::preprocess::preprocess_frame;
use crate::video::domain::frame_source::FrameSource;

/// Counters for one monitoring session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub frames_processed: u64,
    pub significant_changes: u64,
    pub faces_identified: u64,
}

/// Optional recognition stage: runs on every decoded frame.
pub struct RecognitionStage {
    pub encoder: Arc<dyn FaceEncoder>,
    pub gallery: Arc<SharedGallery>,
    pub match_threshold: f64,
}

/// Monitoring pipeline: acquire → preprocess → detect change → notify sinks.
///
/// When a recognition stage is configured, every frame is also run through
/// face encoding and gallery matching, independent of the change signal, and
/// identified faces are reported to the face sink.
pub struct MonitorFeedUseCase {
    source: Box<dyn FrameSource>,
    detector: SceneChangeDetector,
    change_sink: Box<dyn ChangeSink>,
    face_sink: Box<dyn FaceSink>,
    recognition: Option<RecognitionStage>,
}

impl MonitorFeedUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: SceneChangeDetector,
        change_sink: Box<dyn ChangeSink>,
        face_sink: Box<dyn FaceSink>,
        recognition: Option<RecognitionStage>,
    ) -> Self {
        Self {
            source,
            detector,
            change_sink,
            face_sink,
            recognition,
        }
    }

    /// Runs the loop until the source is exhausted or fails.
    ///
    /// Per-frame problems (undecodable frame, dimension change) are logged
    /// and skipped; a source read failure ends the session with the stats
    /// collected so far.
    pub fn run(&mut self) -> FeedStats {
        let mut stats = FeedStats::default();

        loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::error!("frame source failed, ending session: {e}");
                    break;
                }
            };
            stats.frames_processed += 1;

            let (_display, gray) = match preprocess_frame(&frame) {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("skipping frame {}: {e}", frame.index());
                    continue;
                }
            };

            let significant = match self.detector.detect(&gray) {
                Ok(significant) => significant,
                Err(e @ DetectError::FrameSizeMismatch { .. }) => {
                    // Dimension change invalidates the reference frame.
                    log::warn!("frame {}: {e}; resetting detector", frame.index());
                    self.detector.reset();
                    false
                }
            };
            if significant {
                stats.significant_changes += 1;
                log::info!("significant change at frame {}", frame.index());
                self.change_sink.on_significant_change(&frame);
            }

            if let Some(stage) = &self.recognition {
                let faces = match stage.encoder.encode(&frame) {
                    Ok(faces) => faces,
                    Err(e) => {
                        log::warn!("face encoding failed on frame {}: {e}", frame.index());
                        continue;
                    }
                };
                let embeddings: Vec<_> = faces.into_iter().map(|f| f.embedding).collect();
                let gallery = stage.gallery.snapshot();
                if let MatchResult::Match { label, confidence } =
                    best_match(&embeddings, &gallery, stage.match_threshold)
                {
                    stats.faces_identified += 1;
                    log::info!("identified {label} (confidence {confidence:.2})");
                    self.face_sink.on_identified_face(&label, confidence, &frame);
                }
            }
        }

        stats
    }
}
