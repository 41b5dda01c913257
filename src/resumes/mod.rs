//! Resume record domain

mod store;
mod types;

pub use store::ResumeStore;
pub use types::{resume_key, ResumeRecord};
