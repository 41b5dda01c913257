//! Resume API endpoints
//!
//! - GET    /api/v1/resumes              - list stored records
//! - POST   /api/v1/resumes              - multipart PDF upload + preview render
//! - GET    /api/v1/resumes/:id          - one record
//! - PUT    /api/v1/resumes/:id/feedback - attach feedback JSON
//! - DELETE /api/v1/resumes/:id          - delete record and stored files

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::error::{AppError, Result};
use crate::raster::RenderedImage;
use crate::resumes::ResumeRecord;
use crate::state::AppState;

/// Uploads above this size are rejected outright
const MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;

/// Response for the resume list
#[derive(Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeSummary>,
    pub total: usize,
}

/// Summary of a record for the list view
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub id: String,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub image_path: String,
    pub overall_score: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<&ResumeRecord> for ResumeSummary {
    fn from(record: &ResumeRecord) -> Self {
        Self {
            id: record.id.clone(),
            company_name: record.company_name.clone(),
            job_title: record.job_title.clone(),
            image_path: record.image_path.clone(),
            overall_score: record.overall_score(),
            created_at: record.created_at,
        }
    }
}

/// Create the resumes router
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_resumes).post(upload_resume))
        .route("/:id", get(get_resume).delete(delete_resume))
        .route("/:id/feedback", put(set_feedback))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
}

/// List all stored resume records in store order
async fn list_resumes(State(state): State<AppState>) -> Result<Json<ResumeListResponse>> {
    let records = state.resumes().list().await?;

    let resumes: Vec<ResumeSummary> = records.iter().map(ResumeSummary::from).collect();
    let total = resumes.len();

    Ok(Json(ResumeListResponse { resumes, total }))
}

/// Upload a resume PDF: persist the original, render the first page to a PNG
/// preview, persist that too, and create the record.
async fn upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeRecord>)> {
    let mut pdf: Option<(String, Vec<u8>)> = None;
    let mut company_name: Option<String> = None;
    let mut job_title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "resume" | "file" => {
                let file_name = field
                    .file_name()
                    .map(sanitize_file_name)
                    .unwrap_or_else(|| "resume.pdf".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                pdf = Some((file_name, data.to_vec()));
            }
            "companyName" => {
                company_name = field.text().await.ok().filter(|s| !s.is_empty());
            }
            "jobTitle" => {
                job_title = field.text().await.ok().filter(|s| !s.is_empty());
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown upload field");
            }
        }
    }

    let (file_name, data) = pdf
        .ok_or_else(|| AppError::BadRequest("missing resume file field".to_string()))?;

    if !file_name.to_lowercase().ends_with(".pdf") {
        return Err(AppError::BadRequest(format!(
            "unsupported file type: {}",
            file_name
        )));
    }

    // Render the preview before storing anything so a bad PDF leaves no
    // orphan objects behind.
    let conversion = state.rasterizer().convert(data.clone(), &file_name).await;
    let preview: RenderedImage = match conversion.file {
        Some(file) => file,
        None => {
            let reason = conversion
                .error
                .unwrap_or_else(|| "conversion produced no output".to_string());
            return Err(AppError::BadRequest(reason));
        }
    };

    let id = Uuid::new_v4().to_string();
    let resume_path = format!("resumes/{}/{}", id, file_name);
    let image_path = format!("resumes/{}/{}", id, preview.file_name);

    let s3 = state.s3_client();
    s3.put_object(&resume_path, data, "application/pdf").await?;
    s3.put_object(&image_path, preview.data, RenderedImage::CONTENT_TYPE)
        .await?;

    // The spool copy served its purpose; this route owns its cleanup.
    if !conversion.image_url.is_empty() {
        if let Err(e) = tokio::fs::remove_file(&conversion.image_url).await {
            tracing::debug!(path = %conversion.image_url, "Spool cleanup failed: {}", e);
        }
    }

    let mut record = ResumeRecord::new(company_name, job_title, resume_path, image_path);
    record.id = id;
    state.resumes().save(&record).await?;

    tracing::info!(
        id = %record.id,
        file = %file_name,
        width = preview.width,
        height = preview.height,
        "Resume uploaded"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// Get a single record
async fn get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResumeRecord>> {
    let record = state
        .resumes()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("resume {}", id)))?;

    Ok(Json(record))
}

/// Attach feedback JSON to a record
async fn set_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(feedback): Json<serde_json::Value>,
) -> Result<Json<ResumeRecord>> {
    let record = state
        .resumes()
        .set_feedback(&id, feedback)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("resume {}", id)))?;

    Ok(Json(record))
}

/// Delete a record and its stored files
async fn delete_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.resumes().delete(&id).await? {
        return Err(AppError::NotFound(format!("resume {}", id)));
    }

    // Best-effort cleanup of the stored PDF and preview
    let prefix = format!("resumes/{}/", id);
    match state.s3_client().list_prefix(&prefix).await {
        Ok(objects) => {
            for object in objects {
                if let Err(e) = state.s3_client().delete_object(&object.key).await {
                    tracing::warn!(key = %object.key, "Failed to delete object: {}", e);
                }
            }
        }
        Err(e) => {
            tracing::warn!(prefix = %prefix, "Failed to list objects for cleanup: {}", e);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Strip any path components from a client-provided file name
fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_file_name("../../etc/cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cv.pdf"), "cv.pdf");
    }

    #[test]
    fn test_summary_from_record() {
        let mut record = ResumeRecord::new(
            Some("Acme".to_string()),
            None,
            "resumes/x/cv.pdf".to_string(),
            "resumes/x/cv.png".to_string(),
        );
        record.feedback = Some(serde_json::json!({ "overallScore": 75 }));

        let summary = ResumeSummary::from(&record);
        assert_eq!(summary.company_name.as_deref(), Some("Acme"));
        assert_eq!(summary.overall_score, Some(75));
        assert_eq!(summary.image_path, "resumes/x/cv.png");
    }
}
