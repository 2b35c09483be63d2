//! Statement text extraction via lopdf.
//!
//! Providers that prompt an LLM need the statement as text; scanned
//! image-only PDFs are rejected here rather than sent to a model that
//! cannot read them.

use super::ProviderError;

/// Extracts embedded text from PDF bytes, page by page.
pub fn extract_text(bytes: &[u8]) -> Result<String, ProviderError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ProviderError::Pdf(format!("failed to load PDF: {}", e)))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    if text.trim().is_empty() {
        return Err(ProviderError::Pdf(
            "no extractable text; the statement may be scanned or image-based".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bytes_are_a_pdf_error() {
        let result = extract_text(b"definitely not a pdf");
        match result {
            Err(ProviderError::Pdf(message)) => assert!(message.contains("load")),
            other => panic!("Expected Pdf error, got {:?}", other),
        }
    }
}
