//! Render engine acquisition
//!
//! MuPDF is linked into the process, but its runtime is only trusted after a
//! successful probe render. `EngineLoader` memoizes that acquisition in a
//! single slot: the first caller starts it, concurrent callers share the same
//! in-flight future and observe its one outcome, and a failed acquisition
//! resets the slot so a later call can retry fresh. The cached handle lives
//! for the rest of the process.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use mupdf::{Colorspace, Document, Matrix};
use parking_lot::Mutex;
use thiserror::Error;

/// Engine acquisition errors. Clone is required so a single failure can be
/// delivered to every caller sharing the in-flight load.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Render engine failed to initialize: {0}")]
    Init(String),

    #[error("Render engine initialization timed out after {0} seconds")]
    InitTimeout(u64),
}

/// One-page document used to verify the MuPDF runtime during acquisition.
pub(crate) const PROBE_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj\n\
<< /Type /Catalog /Pages 2 0 R >>\n\
endobj\n\
2 0 obj\n\
<< /Type /Pages /Kids [3 0 R] /Count 1 >>\n\
endobj\n\
3 0 obj\n\
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>\n\
endobj\n\
xref\n\
0 4\n\
0000000000 65535 f \n\
0000000009 00000 n \n\
0000000058 00000 n \n\
0000000115 00000 n \n\
trailer\n\
<< /Size 4 /Root 1 0 R >>\n\
startxref\n\
186\n\
%%EOF\n";

/// Counts in-flight render operations on the engine.
///
/// MuPDF documents are opened fresh per operation, so there is no shared
/// mutable state to guard; the gate exists for visibility into how many
/// blocking renders are running at once.
#[derive(Debug)]
pub struct RenderGate {
    active: AtomicUsize,
    total: AtomicUsize,
}

impl RenderGate {
    fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    /// Enter the gate. The returned permit decrements the active count on drop.
    pub(crate) fn enter(&self) -> RenderPermit<'_> {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        RenderPermit { gate: self }
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            active: self.active.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}

/// RAII guard for an in-flight render
pub(crate) struct RenderPermit<'a> {
    gate: &'a RenderGate,
}

impl Drop for RenderPermit<'_> {
    fn drop(&mut self) {
        self.gate.active.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct GateStats {
    pub active: usize,
    pub total: usize,
}

/// Handle to the verified MuPDF runtime
#[derive(Debug)]
pub struct RasterEngine {
    gate: RenderGate,
}

impl RasterEngine {
    fn new() -> Self {
        Self {
            gate: RenderGate::new(),
        }
    }

    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    /// Render one page of a PDF to a pixmap. Blocking; callers run this on a
    /// blocking thread.
    pub(crate) fn render_page_blocking(
        &self,
        data: &[u8],
        page_index: i32,
        scale: f32,
    ) -> Result<mupdf::Pixmap, mupdf::Error> {
        let _permit = self.gate.enter();

        let doc = Document::from_bytes(data, "application/pdf")?;
        let page = doc.load_page(page_index)?;

        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        page.to_pixmap(&matrix, &colorspace, true, true)
    }
}

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<RasterEngine>, EngineError>>>;

enum LoadState {
    Idle,
    Loading(LoadFuture),
    Ready(Arc<RasterEngine>),
}

/// Memoized singleton loader for the render engine
pub struct EngineLoader {
    slot: Mutex<LoadState>,
    init_timeout: Duration,
}

impl EngineLoader {
    pub fn new(init_timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(LoadState::Idle),
            init_timeout,
        }
    }

    /// Acquire the engine, initializing it on first use.
    ///
    /// Concurrent callers during an in-flight load share one initialization
    /// attempt and all receive its single outcome. A failed attempt resets
    /// the slot so the next call starts over.
    pub async fn acquire(&self) -> Result<Arc<RasterEngine>, EngineError> {
        self.acquire_with(initialize_engine).await
    }

    async fn acquire_with<F, Fut>(&self, init: F) -> Result<Arc<RasterEngine>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RasterEngine, EngineError>> + Send + 'static,
    {
        let fut = {
            let mut slot = self.slot.lock();
            match &*slot {
                LoadState::Ready(engine) => return Ok(engine.clone()),
                LoadState::Loading(fut) => fut.clone(),
                LoadState::Idle => {
                    let timeout = self.init_timeout;
                    let init_fut = init();
                    let fut = async move {
                        match tokio::time::timeout(timeout, init_fut).await {
                            Ok(result) => result.map(Arc::new),
                            Err(_) => Err(EngineError::InitTimeout(timeout.as_secs())),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = LoadState::Loading(fut.clone());
                    fut
                }
            }
        };

        let result = fut.clone().await;

        // First caller back transitions the slot; the pointer check keeps a
        // stale outcome from clobbering a newer load.
        let mut slot = self.slot.lock();
        if let LoadState::Loading(current) = &*slot {
            if Shared::ptr_eq(current, &fut) {
                *slot = match &result {
                    Ok(engine) => {
                        tracing::info!("Render engine ready");
                        LoadState::Ready(engine.clone())
                    }
                    Err(err) => {
                        tracing::warn!("Render engine acquisition failed: {}", err);
                        LoadState::Idle
                    }
                };
            }
        }

        result
    }
}

async fn initialize_engine() -> Result<RasterEngine, EngineError> {
    tokio::task::spawn_blocking(probe_runtime)
        .await
        .map_err(|e| EngineError::Init(format!("probe task failed: {}", e)))??;

    Ok(RasterEngine::new())
}

/// Open and render the built-in probe document to confirm the runtime works.
fn probe_runtime() -> Result<(), EngineError> {
    let doc = Document::from_bytes(PROBE_PDF, "application/pdf")
        .map_err(|e| EngineError::Init(format!("probe document failed to open: {}", e)))?;

    let page = doc
        .load_page(0)
        .map_err(|e| EngineError::Init(format!("probe page failed to load: {}", e)))?;

    let matrix = Matrix::new_scale(1.0, 1.0);
    let colorspace = Colorspace::device_rgb();
    let pixmap = page
        .to_pixmap(&matrix, &colorspace, false, true)
        .map_err(|e| EngineError::Init(format!("probe render failed: {}", e)))?;

    if pixmap.samples().is_empty() {
        return Err(EngineError::Init("probe render produced no output".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> EngineLoader {
        EngineLoader::new(Duration::from_secs(5))
    }

    #[test]
    fn test_render_gate_counts() {
        let gate = RenderGate::new();

        {
            let _a = gate.enter();
            let _b = gate.enter();
            let stats = gate.stats();
            assert_eq!(stats.active, 2);
            assert_eq!(stats.total, 2);
        }

        let stats = gate.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_initializes_once() {
        let loader = Arc::new(loader());
        let init_count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let loader = loader.clone();
            let init_count = init_count.clone();
            handles.push(tokio::spawn(async move {
                loader
                    .acquire_with(move || async move {
                        init_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(RasterEngine::new())
                    })
                    .await
            }));
        }

        let mut engines = Vec::new();
        for handle in handles {
            engines.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(init_count.load(Ordering::SeqCst), 1);
        for engine in &engines[1..] {
            assert!(Arc::ptr_eq(&engines[0], engine));
        }
    }

    #[tokio::test]
    async fn test_failed_acquisition_allows_retry() {
        let loader = loader();
        let init_count = Arc::new(AtomicUsize::new(0));

        let count = init_count.clone();
        let err = loader
            .acquire_with(move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err(EngineError::Init("no runtime".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Init(_)));

        // Slot was reset, so the next call runs a fresh initialization.
        let count = init_count.clone();
        let engine = loader
            .acquire_with(move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(RasterEngine::new())
            })
            .await
            .unwrap();

        assert_eq!(init_count.load(Ordering::SeqCst), 2);
        assert_eq!(engine.gate_stats().active, 0);
    }

    #[tokio::test]
    async fn test_ready_engine_skips_initialization() {
        let loader = loader();
        let init_count = Arc::new(AtomicUsize::new(0));

        let count = init_count.clone();
        let first = loader
            .acquire_with(move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(RasterEngine::new())
            })
            .await
            .unwrap();

        let count = init_count.clone();
        let second = loader
            .acquire_with(move || async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(RasterEngine::new())
            })
            .await
            .unwrap();

        assert_eq!(init_count.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_acquisition_timeout() {
        let loader = EngineLoader::new(Duration::from_millis(20));

        let err = loader
            .acquire_with(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(RasterEngine::new())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InitTimeout(_)));
    }
}
