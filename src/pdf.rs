//! PDF metadata rewrite ("unlock").
//!
//! Loads the document, rewrites the Info title with its own value, stamps the
//! producer and saves it back out. No access-control or encryption handling:
//! an encrypted document is a plain failure.

use crate::{ForgeError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;

/// Producer written into every saved document
pub const PRODUCER: &str = "imageforge";

/// Options for re-serializing a PDF
#[derive(Debug, Clone)]
pub struct UnlockOptions {
    /// Compress PDF streams (reduces file size)
    pub compress_streams: bool,
}

impl Default for UnlockOptions {
    fn default() -> Self {
        Self {
            compress_streams: true,
        }
    }
}

/// What the CLI reports about a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfSummary {
    pub page_count: usize,
    pub title: Option<String>,
    pub encrypted: bool,
}

fn load(pdf_bytes: &[u8]) -> Result<Document> {
    Document::load_mem(pdf_bytes).map_err(|e| ForgeError::PdfLoad(e.to_string()))
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise bytes as-is)
fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

/// Object ID of the trailer's Info dictionary, if it is an indirect one
fn info_id(doc: &Document) -> Option<ObjectId> {
    match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

fn info_dict(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Dictionary(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

fn title_of(doc: &Document) -> Option<String> {
    match info_dict(doc)?.get(b"Title").ok()? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

/// lopdf opens documents with an empty user password transparently and
/// drops `/Encrypt`, so both states count
fn is_locked(doc: &Document) -> bool {
    doc.is_encrypted() || doc.was_encrypted()
}

/// Summarize a PDF without modifying it
pub fn inspect_pdf(pdf_bytes: &[u8]) -> Result<PdfSummary> {
    let doc = load(pdf_bytes)?;
    Ok(PdfSummary {
        page_count: doc.get_pages().len(),
        title: title_of(&doc),
        encrypted: is_locked(&doc),
    })
}

/// Re-serialize a PDF after a no-op title rewrite
pub fn unlock_pdf_bytes(input_bytes: &[u8], options: &UnlockOptions) -> Result<Vec<u8>> {
    let mut doc = load(input_bytes)?;

    if is_locked(&doc) {
        tracing::debug!("refusing encrypted PDF");
        return Err(ForgeError::PdfEncrypted);
    }

    rewrite_info(&mut doc);

    if options.compress_streams {
        doc.compress();
    }

    let mut output_bytes = Vec::new();
    doc.save_to(&mut output_bytes)
        .map_err(|e| ForgeError::PdfSave(e.to_string()))?;

    tracing::debug!(
        pages = doc.get_pages().len(),
        input = input_bytes.len(),
        output = output_bytes.len(),
        "re-serialized PDF"
    );
    Ok(output_bytes)
}

/// Set Title to its current value and stamp the producer
fn rewrite_info(doc: &mut Document) {
    let title = match info_dict(doc).and_then(|d| d.get(b"Title").ok()) {
        Some(Object::String(bytes, format)) => Some((bytes.clone(), format.clone())),
        _ => None,
    };
    let producer = Object::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal);

    let apply = |info: &mut Dictionary| {
        if let Some((bytes, format)) = title.clone() {
            info.set("Title", Object::String(bytes, format));
        }
        info.set("Producer", producer.clone());
    };

    if let Some(id) = info_id(doc) {
        if let Ok(Object::Dictionary(info)) = doc.get_object_mut(id) {
            apply(info);
            return;
        }
    }
    if let Ok(Object::Dictionary(info)) = doc.trailer.get_mut(b"Info") {
        apply(info);
        return;
    }

    let mut info = Dictionary::new();
    apply(&mut info);
    let id = doc.add_object(info);
    doc.trailer.set("Info", Object::Reference(id));
}
