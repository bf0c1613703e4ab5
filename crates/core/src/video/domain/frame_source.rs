use crate::shared::frame::Frame;

/// Produces frames for the monitoring pipeline.
///
/// Implementations handle acquisition details (camera, directory of stills,
/// network feed) while the pipeline works with the abstract `Frame` type.
pub trait FrameSource: Send {
    /// Returns the next frame, `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;
}
