//! File serving routes
//!
//! Serves stored resume PDFs and PNG previews from object storage.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new().route("/*path", get(serve_file))
}

/// Serve a stored object
async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response> {
    let s3_client = state.s3_client();

    let metadata = s3_client.head_object(&path).await?;
    let stream = s3_client.get_object_stream(&path).await?;

    let content_type = metadata
        .content_type
        .unwrap_or_else(|| guess_content_type(&path));

    let filename = path.rsplit('/').next().unwrap_or(&path);

    let bytes = stream
        .collect()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read file stream: {}", e)))?
        .into_bytes();

    let body = Body::from(bytes);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, metadata.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))?)
}

/// Guess content type from file extension
fn guess_content_type(path: &str) -> String {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("resumes/x/cv.pdf"), "application/pdf");
        assert_eq!(guess_content_type("resumes/x/cv.PNG"), "image/png");
        assert_eq!(guess_content_type("noext"), "application/octet-stream");
    }
}
