pub const DETECT_MODEL_NAME: &str = "yolo11n-face_widerface.onnx";
pub const DETECT_MODEL_URL: &str =
    "https://github.com/scenewatch/scenewatch/releases/download/v0.1.0/yolo11n-face_widerface.onnx";

pub const EMBED_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBED_MODEL_URL: &str =
    "https://github.com/scenewatch/scenewatch/releases/download/v0.1.0/w600k_r50.onnx";

/// Pixel-intensity delta above which a pixel counts as changed (0-255 scale).
pub const DEFAULT_INTENSITY_THRESHOLD: f64 = 35.0;

/// Smoothed changed-pixel ratio above which a frame signals a scene change.
pub const DEFAULT_CHANGE_RATIO: f64 = 0.25;

/// Number of most recent change ratios averaged before signalling.
pub const DEFAULT_SMOOTHING: usize = 5;

/// Euclidean-distance cutoff below which an embedding matches a profile.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.45;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// Extensions accepted when loading profile images.
pub const PROFILE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];
