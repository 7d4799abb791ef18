//! PDF text extraction via lopdf.
//!
//! The uploaded bytes are staged in a named temporary file before parsing
//! begins; the file is flushed first so the parser never sees a partial
//! write. The temp file is removed when the handle drops.

use std::io::Write;

use lopdf::Document;
use paperchat_schema::UploadedFile;

use crate::ExtractError;

pub(crate) fn extract_pdf(file: &UploadedFile) -> Result<String, ExtractError> {
    let io_err = |source| ExtractError::Io {
        file: file.name.clone(),
        source,
    };

    let mut staged = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(io_err)?;
    staged.write_all(&file.bytes).map_err(io_err)?;
    staged.flush().map_err(io_err)?;

    let doc = Document::load(staged.path()).map_err(|source| ExtractError::Pdf {
        file: file.name.clone(),
        source,
    })?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        let text = doc
            .extract_text(&[*page_number])
            .map_err(|source| ExtractError::Pdf {
                file: file.name.clone(),
                source,
            })?;
        pages.push(text.trim_end_matches('\n').to_string());
    }

    tracing::debug!(file = %file.name, pages = pages.len(), "extracted PDF text");
    Ok(pages.join("\n"))
}
