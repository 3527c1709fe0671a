//! Per-page text extraction from PDF bytes
//!
//! `pdf-extract` reads the text layer (it follows ToUnicode CMaps, so
//! Identity-H CJK fonts come out as text). lopdf supplies the page numbers and
//! is the fallback for pages the text layer could not produce.

use crate::document::SourceDocument;
use crate::error::{Result, SyllabotError};
use lopdf::Document;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Parse a PDF held in memory and return one `SourceDocument` per page,
/// numbered as the PDF numbers them (starting at 1).
///
/// A page whose text cannot be extracted is kept with empty text so page
/// numbers stay aligned with the original document.
pub fn extract_pages(pdf_bytes: &[u8]) -> Result<Vec<SourceDocument>> {
    let document = Document::load_mem(pdf_bytes)
        .map_err(|e| SyllabotError::Pdf(format!("Failed to parse PDF: {}", e)))?;

    let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();
    debug!("PDF has {} pages", page_numbers.len());

    let layer = text_layer(pdf_bytes);
    if layer.len() < page_numbers.len() {
        debug!(
            "Text layer covers {} of {} pages, using lopdf for the rest",
            layer.len(),
            page_numbers.len()
        );
    }

    let pages = page_numbers
        .into_iter()
        .enumerate()
        .map(|(position, page)| {
            let text = match layer.get(position) {
                Some(text) => text.clone(),
                None => document.extract_text(&[page]).unwrap_or_else(|e| {
                    warn!(page, error = %e, "Failed to extract page text, treating it as empty");
                    String::new()
                }),
            };
            SourceDocument::new(page, super::normalize_text(&text))
        })
        .collect();

    Ok(pages)
}

/// Page texts in page order, possibly fewer than the document has
///
/// `pdf-extract` panics on some malformed fonts; that is treated like an
/// extraction error and yields no pages.
fn text_layer(pdf_bytes: &[u8]) -> Vec<String> {
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
    }));

    match extracted {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!(error = %e, "Text layer extraction failed");
            Vec::new()
        }
        Err(_) => {
            warn!("Text layer extraction aborted on an unsupported font");
            Vec::new()
        }
    }
}
