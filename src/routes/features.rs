//! Static feature content
//!
//! Marketing copy shown on the landing page. Served from the backend so the
//! client renders it alongside the resume list without a second deploy.

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize, Clone)]
pub struct Feature {
    pub title: &'static str,
    pub description: &'static str,
}

const FEATURES: &[Feature] = &[
    Feature {
        title: "AI-Powered Analysis",
        description: "Advanced AI analyzes your resume content, structure, and formatting to provide comprehensive feedback and improvement suggestions.",
    },
    Feature {
        title: "ATS Score Rating",
        description: "Get an accurate ATS (Applicant Tracking System) score based on your job description to ensure your resume passes automated filters.",
    },
    Feature {
        title: "Smart Matching",
        description: "Compare your resume against specific job descriptions and get tailored recommendations to increase your match rate.",
    },
    Feature {
        title: "Instant Feedback",
        description: "Receive detailed analysis within seconds, including keyword optimization, formatting tips, and content suggestions.",
    },
];

/// Create the features router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_features))
}

async fn list_features() -> Json<Vec<Feature>> {
    Json(FEATURES.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_features_are_always_available() {
        let Json(features) = list_features().await;
        assert_eq!(features.len(), 4);
        assert_eq!(features[0].title, "AI-Powered Analysis");
    }
}
