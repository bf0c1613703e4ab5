use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info};

use scenewatch_core::recognition::domain::face_encoder::FaceEncoder;
use scenewatch_core::recognition::domain::gallery::SharedGallery;
use scenewatch_core::recognition::domain::matcher::{best_match, MatchResult};
use scenewatch_core::recognition::infrastructure::directory_loader::DirectoryGalleryLoader;
use scenewatch_core::shared::frame::Frame;

pub struct AppState {
    pub gallery: SharedGallery,
    pub encoder: Arc<dyn FaceEncoder>,
    pub loader: DirectoryGalleryLoader,
    pub match_threshold: f64,
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recognize", post(recognize))
        .route("/reload", post(reload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// GET /health — liveness plus a summary of the loaded gallery.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let gallery = state.gallery.snapshot();
    Json(json!({
        "status": "ok",
        "profiles_loaded": gallery.len(),
        "profiles": gallery.labels(),
    }))
}

/// POST /recognize — multipart form with an `image` field; responds with the
/// best-confidence gallery match across all detected faces.
async fn recognize(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut image_bytes = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().map(ToString::to_string);
                if name.as_deref() != Some("image") {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => {
                        image_bytes = Some(bytes);
                        break;
                    }
                    Err(e) => {
                        return bad_request(format!("Failed to read upload: {e}"));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => return bad_request(format!("Invalid multipart body: {e}")),
        }
    }

    let Some(data) = image_bytes else {
        return bad_request("No image file provided (field name 'image')".to_string());
    };
    if data.is_empty() {
        return bad_request("Empty image upload".to_string());
    }

    let img = match image::load_from_memory(&data) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            error!(error = %e, "image decode failed");
            return processing_error(&e.to_string());
        }
    };
    let frame = Frame::from_rgb_image(img, 0);

    let encoder = state.encoder.clone();
    let gallery = state.gallery.snapshot();
    let threshold = state.match_threshold;

    // Inference is CPU-bound; keep it off the async runtime.
    let result = tokio::task::spawn_blocking(move || -> Result<MatchResult, String> {
        let faces = encoder.encode(&frame).map_err(|e| e.to_string())?;
        let embeddings: Vec<_> = faces.into_iter().map(|f| f.embedding).collect();
        Ok(best_match(&embeddings, &gallery, threshold))
    })
    .await;

    match result {
        Ok(Ok(MatchResult::Match { label, confidence })) => {
            info!(label, confidence, "profile matched");
            Json(json!({ "success": true, "name": label, "confidence": confidence }))
                .into_response()
        }
        Ok(Ok(MatchResult::NoMatch)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "No matching profile" })),
        )
            .into_response(),
        Ok(Ok(MatchResult::NoFaceDetected)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "No face detected" })),
        )
            .into_response(),
        Ok(Ok(MatchResult::GalleryEmpty)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "No profiles loaded" })),
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "face encoding failed");
            processing_error(&e)
        }
        Err(e) => {
            error!(error = %e, "spawn_blocking failed");
            processing_error(&e.to_string())
        }
    }
}

/// POST /reload — rebuild the gallery from the profile directory and swap
/// it in. In-flight requests keep their snapshot.
async fn reload(State(state): State<Arc<AppState>>) -> Response {
    let worker_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        let gallery = worker_state.loader.rebuild(worker_state.encoder.as_ref());
        let count = gallery.len();
        worker_state.gallery.replace(gallery);
        count
    })
    .await;

    match result {
        Ok(count) => {
            info!(profiles_loaded = count, "gallery reloaded");
            Json(json!({ "status": "ok", "profiles_loaded": count })).into_response()
        }
        Err(e) => {
            error!(error = %e, "spawn_blocking failed");
            processing_error(&e.to_string())
        }
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn processing_error(detail: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("Processing error: {detail}") })),
    )
        .into_response()
}
