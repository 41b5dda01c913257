//! Resume record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored resume record
///
/// Serialized as camelCase JSON into the key-value store under
/// `resume:{id}`. `feedback` is opaque JSON produced by the analysis
/// collaborator; this service stores and returns it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    /// Storage key of the uploaded PDF
    pub resume_path: String,

    /// Storage key of the first-page PNG preview
    pub image_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(
        company_name: Option<String>,
        job_title: Option<String>,
        resume_path: String,
        image_path: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            company_name,
            job_title,
            resume_path,
            image_path,
            feedback: None,
            created_at: Utc::now(),
        }
    }

    /// Overall score from the attached feedback, if any
    pub fn overall_score(&self) -> Option<i64> {
        self.feedback
            .as_ref()
            .and_then(|f| f.get("overallScore"))
            .and_then(|v| v.as_i64())
    }
}

/// Key-value store key for a resume id
pub fn resume_key(id: &str) -> String {
    format!("resume:{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = ResumeRecord::new(
            Some("Acme".to_string()),
            Some("Engineer".to_string()),
            "resumes/1/cv.pdf".to_string(),
            "resumes/1/cv.png".to_string(),
        );
        record.feedback = Some(serde_json::json!({ "overallScore": 82 }));

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"companyName\":\"Acme\""));
        assert!(json.contains("\"jobTitle\":\"Engineer\""));
        assert!(json.contains("\"resumePath\""));
        assert!(json.contains("\"imagePath\""));
        assert!(json.contains("\"createdAt\""));

        let back: ResumeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.overall_score(), Some(82));
    }

    #[test]
    fn test_optional_fields_absent() {
        let json = r#"{
            "id": "abc",
            "resumePath": "resumes/abc/cv.pdf",
            "imagePath": "resumes/abc/cv.png",
            "createdAt": "2026-01-01T00:00:00Z"
        }"#;

        let record: ResumeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.company_name, None);
        assert_eq!(record.feedback, None);
        assert_eq!(record.overall_score(), None);
    }

    #[test]
    fn test_resume_key() {
        assert_eq!(resume_key("abc"), "resume:abc");
    }
}
