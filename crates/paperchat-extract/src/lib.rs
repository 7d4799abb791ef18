//! Raw text extraction from uploaded files.
//!
//! Dispatches on the (case-insensitive) filename extension: `txt` and `md`
//! are decoded as UTF-8 verbatim, `pdf` goes through the PDF parser, and
//! anything else is reported as unsupported so the caller can skip the file
//! and keep processing the rest of the batch.

mod pdf;

use paperchat_schema::UploadedFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("{file}: not valid UTF-8")]
    Decode {
        file: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("{file}: failed to parse PDF")]
    Pdf {
        file: String,
        #[source]
        source: lopdf::Error,
    },
    #[error("{file}: i/o error while staging PDF bytes")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// True for failures that only concern this file; the batch continues.
    pub fn is_per_file(&self) -> bool {
        // Every variant is scoped to a single file today; the method exists
        // so callers don't hard-code that assumption.
        true
    }
}

/// Extract the raw text of one uploaded file.
pub fn extract(file: &UploadedFile) -> Result<String, ExtractError> {
    match file.extension().as_deref() {
        Some("txt") | Some("md") => {
            let text = std::str::from_utf8(&file.bytes).map_err(|source| ExtractError::Decode {
                file: file.name.clone(),
                source,
            })?;
            Ok(text.to_string())
        }
        Some("pdf") => pdf::extract_pdf(file),
        _ => {
            tracing::debug!(file = %file.name, "skipping unsupported document type");
            Err(ExtractError::Unsupported(file.name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_decodes_utf8_verbatim() {
        let file = UploadedFile::new("notes.txt", b"hello".to_vec());
        assert_eq!(extract(&file).unwrap(), "hello");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let file = UploadedFile::new("notes.TXT", b"hello".to_vec());
        assert_eq!(extract(&file).unwrap(), "hello");
    }

    #[test]
    fn markdown_is_treated_as_text() {
        let file = UploadedFile::new("readme.md", "# Title\n\nbody".as_bytes().to_vec());
        assert_eq!(extract(&file).unwrap(), "# Title\n\nbody");
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let file = UploadedFile::new("notes.csv", b"a,b,c".to_vec());
        match extract(&file) {
            Err(ExtractError::Unsupported(name)) => assert_eq!(name, "notes.csv"),
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn missing_extension_is_unsupported() {
        let file = UploadedFile::new("Makefile", b"all:".to_vec());
        assert!(matches!(extract(&file), Err(ExtractError::Unsupported(_))));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error_not_a_panic() {
        let file = UploadedFile::new("broken.txt", vec![0xff, 0xfe, 0x68]);
        match extract(&file) {
            Err(ExtractError::Decode { file, .. }) => assert_eq!(file, "broken.txt"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn decode_errors_are_per_file() {
        let file = UploadedFile::new("broken.txt", vec![0xff]);
        let err = extract(&file).unwrap_err();
        assert!(err.is_per_file());
    }
}
