//! PDF first-page rasterization
//!
//! Acquires the render engine once per process (memoized, retry after
//! failure) and converts uploaded PDFs to PNG previews of page one.

mod convert;
mod engine;

pub use convert::{ConversionResult, PdfRasterizer, RenderedImage, RENDER_SCALE};
pub use engine::{EngineError, EngineLoader, GateStats, RasterEngine};
