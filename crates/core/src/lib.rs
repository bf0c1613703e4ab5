pub mod config;
pub mod pipeline;
pub mod recognition;
pub mod scene;
pub mod shared;
pub mod video;
