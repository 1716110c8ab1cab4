//! Upload acceptance and document encoding
//!
//! A file only becomes an `UploadCandidate` after passing the media type and
//! size checks. Encoding turns the candidate into the inline payload Gemini
//! accepts: base64 content, declared media type and a SHA-256 content digest.

use crate::error::AnalysisError;
use crate::models::MediaType;
use crate::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 10 MiB
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
enum DocumentSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// A selected file that passed upload acceptance.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    source: DocumentSource,
    media_type: MediaType,
    size_bytes: u64,
    original_name: String,
}

impl UploadCandidate {
    /// Accept an in-memory upload with a declared MIME type.
    pub fn from_bytes(
        original_name: impl Into<String>,
        declared_mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let media_type = parse_declared(declared_mime)?;
        let size_bytes = bytes.len() as u64;
        check_size(size_bytes)?;

        Ok(Self {
            source: DocumentSource::Bytes(bytes),
            media_type,
            size_bytes,
            original_name: original_name.into(),
        })
    }

    /// Accept a file on disk. The media type comes from the extension; the
    /// content is read later by the encoder.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(MediaType::from_extension)
            .ok_or_else(unsupported_type)?;

        let metadata = std::fs::metadata(path).map_err(|e| {
            AnalysisError::ValidationFailure(format!("cannot open {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(AnalysisError::ValidationFailure(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        check_size(metadata.len())?;

        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            source: DocumentSource::Path(path.to_path_buf()),
            media_type,
            size_bytes: metadata.len(),
            original_name,
        })
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }
}

fn unsupported_type() -> AnalysisError {
    AnalysisError::ValidationFailure(
        "Unsupported file type. Please upload PDF, JPG, PNG or WEBP.".to_string(),
    )
}

fn parse_declared(mime: &str) -> Result<MediaType> {
    MediaType::from_mime(mime).ok_or_else(unsupported_type)
}

fn check_size(size: u64) -> Result<()> {
    if size == 0 {
        return Err(AnalysisError::ValidationFailure("File is empty.".to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(AnalysisError::ValidationFailure(
            "File is too large. Max 10MB.".to_string(),
        ));
    }
    Ok(())
}

/// Inline payload ready to be placed in a model request.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedDocument {
    pub data_base64: String,
    pub media_type: MediaType,
    pub digest: String,
    pub size_bytes: u64,
    pub original_name: String,
}

impl EncodedDocument {
    pub fn is_empty(&self) -> bool {
        self.data_base64.is_empty()
    }
}

/// Reads the candidate's bytes and builds the inline payload.
pub fn encode(candidate: &UploadCandidate) -> Result<EncodedDocument> {
    let bytes: std::borrow::Cow<'_, [u8]> = match &candidate.source {
        DocumentSource::Bytes(bytes) => bytes.as_slice().into(),
        DocumentSource::Path(path) => std::fs::read(path)
            .map_err(|e| {
                AnalysisError::EncodingFailure(format!("{}: {}", candidate.original_name, e))
            })?
            .into(),
    };

    if bytes.is_empty() {
        return Err(AnalysisError::EncodingFailure(format!(
            "{}: no content",
            candidate.original_name
        )));
    }
    if bytes.len() as u64 != candidate.size_bytes {
        return Err(AnalysisError::EncodingFailure(format!(
            "{}: expected {} bytes, read {}",
            candidate.original_name,
            candidate.size_bytes,
            bytes.len()
        )));
    }

    let digest = hex::encode(Sha256::digest(&bytes));
    let data_base64 = BASE64.encode(&bytes);

    debug!(
        file = %candidate.original_name,
        media_type = %candidate.media_type,
        size_bytes = candidate.size_bytes,
        digest = %digest,
        "Document encoded"
    );

    Ok(EncodedDocument {
        data_base64,
        media_type: candidate.media_type,
        digest,
        size_bytes: candidate.size_bytes,
        original_name: candidate.original_name.clone(),
    })
}
