use crate::recognition::domain::embedding::FaceEmbedding;
use crate::shared::frame::Frame;

/// Axis-aligned face bounding box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One detected face: where it is and its embedding.
#[derive(Clone, Debug)]
pub struct DetectedFace {
    pub region: FaceBox,
    pub embedding: FaceEmbedding,
}

/// Domain interface for the external face detection + embedding capability.
///
/// Given an image, implementations return zero or more detected faces with
/// fixed-length embeddings. `Send + Sync` so one encoder can serve
/// concurrent recognition requests.
pub trait FaceEncoder: Send + Sync {
    fn encode(
        &self,
        frame: &Frame,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error + Send + Sync>>;
}
