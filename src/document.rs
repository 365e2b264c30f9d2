use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use mime_guess::from_path;
use std::path::Path;

const PDF_MIME: &str = "application/pdf";

/// A file picked up for ingestion, read fully into memory
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// The file name without directories
    pub filename: String,
    /// The detected MIME type
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Read a PDF from disk. Other formats are rejected before any parsing.
    pub async fn from_path<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RagError::Extraction(format!("Invalid file name: {}", path.display())))?
            .to_string();

        let mime_type = detect_mime(path);
        debug!("Detected MIME type: {}", mime_type);
        if !mime_type.starts_with(PDF_MIME) {
            return Err(RagError::UnsupportedFormat(mime_type));
        }

        let bytes = tokio::fs::read(path).await?;
        info!("Loaded {} ({} bytes)", filename, bytes.len());

        Ok(SourceFile {
            filename,
            mime_type,
            bytes,
        })
    }
}

/// Guess the MIME type of a path from its extension
pub fn detect_mime<P: AsRef<Path>>(path: P) -> String {
    from_path(path).first_or_octet_stream().to_string()
}

/// Converts raw document bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Pages in order, separated by a single newline, words by a single space.
    async fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// [`TextExtractor`] for PDF files based on `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        PdfExtractor
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        let owned = bytes.to_vec();
        // the parser is CPU bound and may panic on malformed input
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&owned)
        })
        .await
        .map_err(|e| RagError::Extraction(format!("PDF parser aborted: {e}")))?
        .map_err(|e| RagError::Extraction(format!("Failed to parse PDF: {e}")))?;

        if pages.is_empty() {
            return Err(RagError::Extraction("PDF has no pages".to_string()));
        }

        let text = join_pages(&pages);
        if text.trim().is_empty() {
            warn!("Extracted PDF content is empty or contains only whitespace");
        }
        debug!("Extracted {} characters from {} pages", text.len(), pages.len());
        Ok(text)
    }
}

/// Collapse whitespace inside each page to single spaces and put one newline between pages
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|page| normalize_whitespace(page.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join words with a single space
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
