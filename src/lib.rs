//! ImageForge Library
//!
//! Single-purpose image and PDF tools shared between the CLI/proxy binary and
//! the WASM build: JPEG compression, format conversion, a fixed-rectangle
//! watermark blur, text stamping, PDF metadata rewrite, and a relay to a
//! remote background-removal API.
//!
//! Every tool is one linear invocation: decode the source, apply a single
//! [`surface::Operation`], encode the result.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod blur;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
pub mod page;
pub mod pdf;
#[cfg(not(target_arch = "wasm32"))]
pub mod remote;
pub mod surface;
pub mod text;
pub mod tools;

use base64::{engine::general_purpose, Engine as _};
use std::fmt;

pub use page::{Invocation, ToolPage};
pub use pdf::{inspect_pdf, unlock_pdf_bytes, PdfSummary, UnlockOptions};
pub use surface::{OutputFormat, Operation, RasterBackend, Rect, Surface, SurfaceBackend};
pub use tools::{run_local, ConversionMode, Tool, ToolKind};

/// Media type used when the declared type is unknown
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Message shown when a selected file cannot be read
pub const READ_FAILED_MESSAGE: &str = "Failed to read file";

/// A user-selected file: raw bytes plus the media type it was declared with.
///
/// The declared type is never checked against the content; decoders sniff the
/// bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl SourceFile {
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Preview of a source file, as a `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub data_uri: String,
}

impl PreviewImage {
    pub fn from_source(source: &SourceFile) -> Self {
        Self {
            data_uri: data_uri(&source.media_type, &source.bytes),
        }
    }
}

/// Output of exactly one transform invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// Encoded output bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub media_type: &'static str,
    /// Suggested download filename
    pub filename: &'static str,
}

impl TransformResult {
    pub fn data_uri(&self) -> String {
        data_uri(self.media_type, &self.bytes)
    }
}

/// Server-held secret attached to outbound background-removal calls.
///
/// May be empty: an unset key produces an unauthenticated (failing) upstream
/// call rather than a startup error.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxyCredential(String);

impl ProxyCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("ProxyCredential(<unset>)")
        } else {
            f.write_str("ProxyCredential(<redacted>)")
        }
    }
}

/// Flat, user-facing failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    FileRead,
    Processing,
    Api,
}

/// Error type for ImageForge operations
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("Failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Quality must be between 1 and 100")]
    InvalidQuality,
    #[error("Missing input: {0}")]
    MissingInput(&'static str),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Failed to load PDF: {0}")]
    PdfLoad(String),
    #[error("PDF is encrypted")]
    PdfEncrypted,
    #[error("Failed to save PDF: {0}")]
    PdfSave(String),
    #[error("API request failed: {0}")]
    Api(String),
    #[error("{0} only runs through the remote proxy")]
    RemoteOnly(&'static str),
}

impl ForgeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ForgeError::Read(_) => ErrorClass::FileRead,
            ForgeError::Api(_) | ForgeError::RemoteOnly(_) => ErrorClass::Api,
            _ => ErrorClass::Processing,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Encode bytes as a `data:` URI
pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Guess a media type from a file extension, the way a file picker would
pub fn media_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        _ => OCTET_STREAM,
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use std::path::Path;

    /// Read a source file from disk, declaring its media type from the extension
    pub fn read_source(path: &Path) -> Result<SourceFile> {
        let bytes = std::fs::read(path)?;
        let media_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(media_type_for_extension)
            .unwrap_or(OCTET_STREAM);
        tracing::debug!(?path, media_type, size = bytes.len(), "read source file");
        Ok(SourceFile::new(bytes, media_type))
    }

    /// Write a transform result to disk
    pub fn write_result(path: &Path, result: &TransformResult) -> Result<()> {
        std::fs::write(path, &result.bytes)?;
        tracing::debug!(?path, size = result.bytes.len(), "wrote result");
        Ok(())
    }

    /// Run a local tool from file path to file path
    pub fn transform_file(
        backend: &impl SurfaceBackend,
        tool: &Tool,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<TransformResult> {
        let source = read_source(input_path)?;
        let result = run_local(backend, tool, &source)?;
        write_result(output_path, &result)?;
        Ok(result)
    }
}
