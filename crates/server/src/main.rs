use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tracing::info;

use scenewatch_core::config::Config;
use scenewatch_core::recognition::domain::gallery::SharedGallery;
use scenewatch_core::recognition::infrastructure::directory_loader::DirectoryGalleryLoader;
use scenewatch_core::recognition::infrastructure::onnx_face_encoder::{
    OnnxFaceEncoder, DEFAULT_DETECT_CONFIDENCE,
};

mod routes;

use routes::AppState;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.exists() {
        match Config::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", config_path.display());
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let encoder = match OnnxFaceEncoder::from_resolved_models(
        DEFAULT_DETECT_CONFIDENCE,
        config.recognition.models_dir.as_deref(),
    ) {
        Ok(encoder) => Arc::new(encoder),
        Err(e) => {
            eprintln!("Failed to initialize face encoder: {e}");
            process::exit(1);
        }
    };

    let loader = DirectoryGalleryLoader::new(
        config.recognition.profiles_dir.clone(),
        config.recognition.layout,
    );
    let gallery = loader.rebuild(encoder.as_ref());
    info!(
        profiles_loaded = gallery.len(),
        dir = %loader.root().display(),
        "gallery loaded"
    );

    let state = Arc::new(AppState {
        gallery: SharedGallery::new(gallery),
        encoder,
        loader,
        match_threshold: config.recognition.match_threshold,
    });
    let app = routes::router(state, config.server.max_upload_bytes);

    let addr = format!("0.0.0.0:{}", config.server.port);
    info!(addr, "recognition API server starting");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind to {addr}: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {e}");
        process::exit(1);
    }
}
