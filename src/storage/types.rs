//! Storage types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata about a stored object
#[derive(Debug, Clone, Serialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}
