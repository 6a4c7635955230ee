//! Local PDF text extraction
//!
//! Offline fallback for the partitioning API: text only, one entry per page.
//! Tables and embedded images are not recovered here.

use crate::errors::IngestionError;
use lopdf::{Document, ObjectId};
use std::path::Path;
use tracing::{debug, warn};

/// Text of a single PDF page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

/// Extract cleaned text per page from a PDF file
///
/// Pages with no recoverable text are omitted. Blocking; call from
/// `spawn_blocking` in async code.
pub fn extract_pages_from_pdf(path: &Path) -> Result<Vec<PageText>, IngestionError> {
    let doc = Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut result = Vec::with_capacity(pages.len());
    for (&page_number, &page_id) in pages.iter() {
        let raw = match doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => match extract_page_text(&doc, page_id) {
                Ok(text) => text,
                Err(e) => {
                    warn!(page = page_number, error = %e, "Failed to extract text from page, skipping");
                    continue;
                }
            },
        };

        let text = clean_text(&raw);
        if !text.is_empty() {
            result.push(PageText { page_number, text });
        }
    }

    if result.is_empty() {
        return Err(IngestionError::PdfParseError {
            path: path.display().to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    Ok(result)
}

/// Extract text from a single page by scanning its content stream
fn extract_page_text(doc: &Document, page_id: ObjectId) -> Result<String, String> {
    let content = doc.get_page_content(page_id).map_err(|e| e.to_string())?;
    Ok(extract_text_from_content(&content))
}

/// Collect the operands of text-showing operators inside BT/ET blocks
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Handle `(text) Tj`, `'`, `"` and `[(text) n (text)] TJ`
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if end > start {
            return Some(decode_pdf_string(&line[start + 1..end]));
        }
        return None;
    }

    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Collapse whitespace, drop BOMs and normalize typographic quotes
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
