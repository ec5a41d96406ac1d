//! WebAssembly bindings for ImageForge
//!
//! Plain functions for one-shot transforms, plus [`ToolPageJs`] which keeps a
//! tool page's state (file, preview, busy flag, result, error) on the Rust
//! side. Background removal stays a browser `fetch` to `/api/removebg`; the
//! page only records its outcome.

use crate::page::ToolPage;
use crate::surface::RasterBackend;
use crate::tools::{run_local, ConversionMode, Tool, ToolKind};
use crate::{ForgeError, SourceFile, TransformResult};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn run(tool: Tool, bytes: &[u8], media_type: &str) -> Result<Vec<u8>, JsError> {
    let source = SourceFile::new(bytes, media_type);
    run_local(&RasterBackend::new(), &tool, &source)
        .map(|r| r.bytes)
        .map_err(|e| {
            web_sys::console::warn_1(&JsValue::from_str(&e.to_string()));
            JsError::new(tool.kind().failure_message())
        })
}

/// Re-encode an image as JPEG
///
/// # Arguments
/// * `image_bytes` - The source image
/// * `quality` - JPEG quality 1-100 (default: 75)
#[wasm_bindgen]
pub fn compress_image(image_bytes: &[u8], quality: Option<u8>) -> Result<Vec<u8>, JsError> {
    let quality = quality.unwrap_or(crate::tools::DEFAULT_QUALITY);
    run(Tool::Compressor { quality }, image_bytes, "image/jpeg")
}

/// Re-encode an image into another container
///
/// # Arguments
/// * `image_bytes` - The source image
/// * `mode` - `webp-to-png`, `png-to-jpg` or `jpg-to-png`
#[wasm_bindgen]
pub fn convert_image(image_bytes: &[u8], mode: &str) -> Result<Vec<u8>, JsError> {
    let mode: ConversionMode = mode.parse().map_err(|e: String| JsError::new(&e))?;
    run(Tool::Converter { mode }, image_bytes, mode.accept())
}

/// Blur-fill the top-centre band, returns PNG
#[wasm_bindgen]
pub fn remove_watermark(image_bytes: &[u8]) -> Result<Vec<u8>, JsError> {
    run(Tool::WatermarkRemover, image_bytes, "image/*")
}

/// Stamp `name` bottom-left and `dob` bottom-right, returns PNG
#[wasm_bindgen]
pub fn overlay_text(image_bytes: &[u8], name: &str, dob: &str) -> Result<Vec<u8>, JsError> {
    let tool = Tool::TextOverlay {
        name: name.to_string(),
        dob: dob.to_string(),
    };
    run(tool, image_bytes, "image/*")
}

/// Re-serialize a PDF after a no-op title rewrite
#[wasm_bindgen]
pub fn unlock_pdf(pdf_bytes: &[u8]) -> Result<Vec<u8>, JsError> {
    run(Tool::PdfUnlocker, pdf_bytes, "application/pdf")
}

/// Page count, title and encryption flag as JSON
#[wasm_bindgen]
pub fn inspect_pdf(pdf_bytes: &[u8]) -> Result<String, JsError> {
    let summary = crate::pdf::inspect_pdf(pdf_bytes)
        .map_err(|e| JsError::new(&format!("Failed to load PDF: {}", e)))?;
    serde_json::to_string(&summary)
        .map_err(|e| JsError::new(&format!("Failed to serialize summary: {}", e)))
}

fn kind_from_str(kind: &str) -> Option<ToolKind> {
    Some(match kind {
        "compressor" => ToolKind::Compressor,
        "converter" => ToolKind::Converter,
        "watermark-remover" => ToolKind::WatermarkRemover,
        "text-overlay" => ToolKind::TextOverlay,
        "pdf-unlocker" => ToolKind::PdfUnlocker,
        "background-remover" => ToolKind::BackgroundRemover,
        _ => return None,
    })
}

/// State of one tool page
#[wasm_bindgen]
pub struct ToolPageJs {
    page: ToolPage,
}

#[wasm_bindgen]
impl ToolPageJs {
    /// `kind` is one of `compressor`, `converter`, `watermark-remover`,
    /// `text-overlay`, `pdf-unlocker`, `background-remover`
    #[wasm_bindgen(constructor)]
    pub fn new(kind: &str) -> Result<ToolPageJs, JsError> {
        let kind = kind_from_str(kind)
            .ok_or_else(|| JsError::new(&format!("unknown tool '{}'", kind)))?;
        Ok(ToolPageJs {
            page: ToolPage::new(kind),
        })
    }

    pub fn select_file(&mut self, bytes: &[u8], media_type: &str) {
        self.page.select_file(SourceFile::new(bytes, media_type));
    }

    pub fn read_failed(&mut self) {
        self.page.read_failed();
    }

    pub fn set_quality(&mut self, quality: u8) {
        self.page.set_quality(quality);
    }

    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsError> {
        let mode: ConversionMode = mode.parse().map_err(|e: String| JsError::new(&e))?;
        self.page.set_conversion_mode(mode);
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) {
        self.page.set_name(name);
    }

    pub fn set_dob(&mut self, dob: &str) {
        self.page.set_dob(dob);
    }

    /// File picker `accept` filter
    #[wasm_bindgen(getter)]
    pub fn accept(&self) -> String {
        self.page.tool().accept().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn can_run(&self) -> bool {
        self.page.can_run()
    }

    #[wasm_bindgen(getter)]
    pub fn busy(&self) -> bool {
        self.page.is_busy()
    }

    #[wasm_bindgen(getter)]
    pub fn action_label(&self) -> String {
        self.page.action_label().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn error(&self) -> Option<String> {
        self.page.error().map(str::to_string)
    }

    #[wasm_bindgen(getter)]
    pub fn preview_uri(&self) -> Option<String> {
        self.page.preview().map(|p| p.data_uri.clone())
    }

    #[wasm_bindgen(getter)]
    pub fn result_uri(&self) -> Option<String> {
        self.page.result().map(|r| r.data_uri())
    }

    #[wasm_bindgen(getter)]
    pub fn result_bytes(&self) -> Option<js_sys::Uint8Array> {
        self.page
            .download()
            .map(|(_, bytes)| js_sys::Uint8Array::from(bytes))
    }

    #[wasm_bindgen(getter)]
    pub fn download_name(&self) -> Option<String> {
        self.page.download().map(|(name, _)| name.to_string())
    }

    /// Run a local tool. Returns false when the action is disabled.
    pub fn run(&mut self) -> bool {
        self.page.run_local(&RasterBackend::new())
    }

    /// Mark a background-removal request as started. Returns false when the
    /// action is disabled; the caller must not send the request then.
    pub fn begin_remote(&mut self) -> bool {
        self.page.begin().is_some()
    }

    /// Record the PNG returned by `/api/removebg`. Ignored unless
    /// `begin_remote` started a request on a background-remover page.
    pub fn finish_remote(&mut self, png_bytes: &[u8]) {
        let tool = Tool::BackgroundRemover;
        self.page.complete_remote(Ok(TransformResult {
            bytes: png_bytes.to_vec(),
            media_type: tool.output_media_type(),
            filename: tool.filename(),
        }));
    }

    /// Record a failed background-removal request
    pub fn fail_remote(&mut self) {
        self.page
            .complete_remote(Err(ForgeError::Api("request failed".to_string())));
    }

    /// Drop file, preview and result when leaving the page
    pub fn clear(&mut self) {
        self.page.clear();
    }
}
