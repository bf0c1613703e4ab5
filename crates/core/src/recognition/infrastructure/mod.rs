pub mod directory_loader;
pub mod onnx_face_encoder;
