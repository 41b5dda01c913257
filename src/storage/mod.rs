//! S3-compatible object storage
//!
//! Holds uploaded resume PDFs and their PNG previews under
//! `resumes/{id}/...` keys. Works against MinIO, R2, or AWS S3.

mod s3_client;
mod types;

pub use s3_client::S3Client;
pub use types::*;
