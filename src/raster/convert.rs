//! PDF to PNG conversion pipeline
//!
//! Converts the first page of a PDF to a PNG preview. The pipeline never
//! returns an error to the caller: every failure is absorbed into the
//! `ConversionResult`, which holds either a rendered file or an error string,
//! never both.

use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use image::DynamicImage;
use thiserror::Error;
use uuid::Uuid;

use crate::config::RasterConfig;

use super::engine::{EngineError, EngineLoader};

/// Fixed upscale factor for preview sharpness
pub const RENDER_SCALE: f32 = 4.0;

/// Outcome of a conversion. Exactly one of `file` or `error` is populated;
/// `image_url` is empty exactly when `file` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    /// Path to the transient spool copy of the PNG. The caller owns deletion;
    /// the upload flow removes it once the image is persisted to storage.
    pub image_url: String,
    pub file: Option<RenderedImage>,
    pub error: Option<String>,
}

impl ConversionResult {
    fn from_error(err: ConvertError) -> Self {
        let error = match err {
            // The encoder signals failure by producing nothing rather than
            // raising, so it gets its own message.
            ConvertError::EncodeFailed => "Failed to create image blob".to_string(),
            other => format!("Failed to convert PDF: {}", other),
        };

        Self {
            image_url: String::new(),
            file: None,
            error: Some(error),
        }
    }
}

/// A rendered first-page preview, named after the source PDF
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub file_name: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    pub const CONTENT_TYPE: &'static str = "image/png";
}

#[derive(Debug, Error)]
enum ConvertError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Document(String),

    #[error("image encode produced no data")]
    EncodeFailed,

    #[error("render task failed: {0}")]
    Task(String),

    #[error("spool write failed: {0}")]
    Spool(#[from] std::io::Error),
}

impl From<mupdf::Error> for ConvertError {
    fn from(err: mupdf::Error) -> Self {
        ConvertError::Document(err.to_string())
    }
}

/// First-page PDF rasterizer
///
/// Owns the engine loader and the spool directory for transient previews.
pub struct PdfRasterizer {
    loader: EngineLoader,
    spool_dir: PathBuf,
}

impl PdfRasterizer {
    pub fn new(config: &RasterConfig) -> Self {
        Self {
            loader: EngineLoader::new(Duration::from_secs(config.init_timeout_secs)),
            spool_dir: config.spool_dir.clone(),
        }
    }

    /// Convert the first page of a PDF to a PNG preview.
    ///
    /// Never fails: check the result for a populated `file` versus `error`.
    pub async fn convert(&self, data: Vec<u8>, file_name: &str) -> ConversionResult {
        match self.try_convert(data, file_name).await {
            Ok((image_url, file)) => ConversionResult {
                image_url,
                file: Some(file),
                error: None,
            },
            Err(err) => {
                tracing::warn!(file = %file_name, "PDF conversion failed: {}", err);
                ConversionResult::from_error(err)
            }
        }
    }

    async fn try_convert(
        &self,
        data: Vec<u8>,
        file_name: &str,
    ) -> Result<(String, RenderedImage), ConvertError> {
        let engine = self.loader.acquire().await?;

        let (png, width, height) = tokio::task::spawn_blocking(move || {
            // Page index 0 only: multi-page documents are a deliberate scope
            // limit of the preview, not an oversight.
            let pixmap = engine.render_page_blocking(&data, 0, RENDER_SCALE)?;
            encode_png(&pixmap).ok_or(ConvertError::EncodeFailed)
        })
        .await
        .map_err(|e| ConvertError::Task(e.to_string()))??;

        let out_name = output_file_name(file_name);

        tokio::fs::create_dir_all(&self.spool_dir).await?;
        let spool_path = self.spool_dir.join(format!("{}-{}", Uuid::new_v4(), out_name));
        tokio::fs::write(&spool_path, &png).await?;

        tracing::debug!(
            file = %out_name,
            width,
            height,
            spool = %spool_path.display(),
            "PDF page rendered to PNG"
        );

        Ok((
            spool_path.to_string_lossy().into_owned(),
            RenderedImage {
                file_name: out_name,
                data: png,
                width,
                height,
            },
        ))
    }
}

/// Encode a pixmap to PNG. Returns `None` when no image data can be produced.
fn encode_png(pixmap: &mupdf::Pixmap) -> Option<(Vec<u8>, u32, u32)> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba_buffer = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba_buffer.extend_from_slice(&[r, g, b, a]);
        }
    }

    let img = image::RgbaImage::from_raw(width, height, rgba_buffer)?;

    let mut output = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| tracing::warn!("PNG encode failed: {}", e))
        .ok()?;

    if output.is_empty() {
        return None;
    }

    Some((output, width, height))
}

/// Derive the output name: strip a trailing `.pdf` (case-insensitive) and
/// append `.png`.
fn output_file_name(name: &str) -> String {
    let bytes = name.as_bytes();
    let stem = if bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".pdf") {
        &name[..name.len() - 4]
    } else {
        name
    };

    format!("{}.png", stem)
}

#[cfg(test)]
mod tests {
    use super::super::engine::PROBE_PDF;
    use super::*;

    /// Two pages with different sizes: 200x200pt then 100x100pt. Rendering
    /// page index 0 at 4x must yield the larger dimensions.
    const TWO_PAGE_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj\n\
<< /Type /Catalog /Pages 2 0 R >>\n\
endobj\n\
2 0 obj\n\
<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>\n\
endobj\n\
3 0 obj\n\
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>\n\
endobj\n\
4 0 obj\n\
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >>\n\
endobj\n\
xref\n\
0 5\n\
0000000000 65535 f \n\
0000000009 00000 n \n\
0000000058 00000 n \n\
0000000121 00000 n \n\
0000000192 00000 n \n\
trailer\n\
<< /Size 5 /Root 1 0 R >>\n\
startxref\n\
263\n\
%%EOF\n";

    fn rasterizer(spool_dir: &std::path::Path) -> PdfRasterizer {
        PdfRasterizer::new(&RasterConfig {
            spool_dir: spool_dir.to_path_buf(),
            init_timeout_secs: 30,
        })
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("resume.pdf"), "resume.png");
        assert_eq!(output_file_name("Resume.PDF"), "Resume.png");
        assert_eq!(output_file_name("my resume.Pdf"), "my resume.png");
        // No trailing .pdf: the suffix is appended as-is
        assert_eq!(output_file_name("notes.txt"), "notes.txt.png");
        assert_eq!(output_file_name("pdf"), "pdf.png");
    }

    #[test]
    fn test_encode_failure_result_shape() {
        let result = ConversionResult::from_error(ConvertError::EncodeFailed);
        assert_eq!(
            result,
            ConversionResult {
                image_url: String::new(),
                file: None,
                error: Some("Failed to create image blob".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_convert_garbage_input_never_panics() {
        let dir = tempfile::tempdir().unwrap();
        let raster = rasterizer(dir.path());

        let result = raster.convert(b"this is not a pdf".to_vec(), "junk.pdf").await;

        assert!(result.file.is_none());
        assert!(result.image_url.is_empty());
        let error = result.error.expect("error must be populated");
        assert!(error.starts_with("Failed to convert PDF:"), "{}", error);
    }

    #[tokio::test]
    async fn test_convert_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let raster = rasterizer(dir.path());

        let result = raster.convert(PROBE_PDF.to_vec(), "sample.pdf").await;

        assert_eq!(result.error, None);
        let file = result.file.expect("conversion should produce a file");
        assert_eq!(file.file_name, "sample.png");
        assert!(file.data.starts_with(&[0x89, b'P', b'N', b'G']));
        // 200pt page at 4x scale
        assert!((795..=805).contains(&file.width), "width {}", file.width);
        assert!((795..=805).contains(&file.height), "height {}", file.height);

        // Spool copy exists at the returned url until the caller removes it
        assert!(!result.image_url.is_empty());
        assert!(std::path::Path::new(&result.image_url).exists());
    }

    #[tokio::test]
    async fn test_convert_renders_first_page_only() {
        let dir = tempfile::tempdir().unwrap();
        let raster = rasterizer(dir.path());

        let result = raster.convert(TWO_PAGE_PDF.to_vec(), "multi.pdf").await;

        assert_eq!(result.error, None);
        let file = result.file.expect("conversion should produce a file");
        // Page 0 is 200pt wide; page 1 would render at ~400px
        assert!(file.width > 600, "expected first page, got width {}", file.width);
    }
}
