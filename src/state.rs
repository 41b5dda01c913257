//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::kv::KvStore;
use crate::raster::PdfRasterizer;
use crate::resumes::ResumeStore;
use crate::storage::S3Client;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    s3_client: S3Client,
    resumes: ResumeStore,
    sessions: SessionStore,
    rasterizer: PdfRasterizer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The render engine is not initialized here; the rasterizer's loader
    /// acquires it lazily on the first conversion.
    pub fn new(config: Config, s3_client: S3Client, db: SqlitePool) -> Self {
        let kv = KvStore::new(db.clone());
        let resumes = ResumeStore::new(kv);
        let sessions = SessionStore::new(db, config.auth.session_ttl_hours);
        let rasterizer = PdfRasterizer::new(&config.raster);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                s3_client,
                resumes,
                sessions,
                rasterizer,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn s3_client(&self) -> &S3Client {
        &self.inner.s3_client
    }

    pub fn resumes(&self) -> &ResumeStore {
        &self.inner.resumes
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn rasterizer(&self) -> &PdfRasterizer {
        &self.inner.rasterizer
    }
}
