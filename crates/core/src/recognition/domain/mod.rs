pub mod embedding;
pub mod face_encoder;
pub mod gallery;
pub mod matcher;
