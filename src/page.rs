//! Per-tool page state.
//!
//! A [`ToolPage`] is the short-lived, single-owner state behind one tool:
//! the selected file, its preview, the current result, a busy flag and the
//! last error message. Runs are linear: [`ToolPage::begin`] snapshots the
//! inputs into an owned [`Invocation`], and [`ToolPage::complete`] publishes
//! the outcome.

use crate::surface::SurfaceBackend;
use crate::tools::{run_local, ConversionMode, Tool, ToolKind};
use crate::{
    ForgeError, PreviewImage, Result, SourceFile, TransformResult, READ_FAILED_MESSAGE,
};
use std::sync::Arc;

/// Inputs of one transform run, owned independently of the page
#[derive(Debug, Clone)]
pub struct Invocation {
    pub tool: Tool,
    pub source: SourceFile,
}

impl Invocation {
    /// Run locally through `backend`
    pub fn execute(&self, backend: &impl SurfaceBackend) -> Result<TransformResult> {
        run_local(backend, &self.tool, &self.source)
    }
}

#[derive(Debug, Clone)]
pub struct ToolPage {
    tool: Tool,
    source: Option<SourceFile>,
    preview: Option<PreviewImage>,
    result: Option<Arc<TransformResult>>,
    busy: bool,
    error: Option<String>,
}

impl ToolPage {
    pub fn new(kind: ToolKind) -> Self {
        Self::with_tool(Tool::new(kind))
    }

    pub fn with_tool(tool: Tool) -> Self {
        Self {
            tool,
            source: None,
            preview: None,
            result: None,
            busy: false,
            error: None,
        }
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn kind(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewImage> {
        self.preview.as_ref()
    }

    /// The current result. Holders of an earlier `Arc` keep their copy intact
    /// when a later run publishes a new one.
    pub fn result(&self) -> Option<Arc<TransformResult>> {
        self.result.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Label for the action control in its current state
    pub fn action_label(&self) -> &'static str {
        if self.busy {
            self.kind().busy_label()
        } else {
            self.kind().action_label()
        }
    }

    /// Replace the selected file and its preview
    pub fn select_file(&mut self, file: SourceFile) {
        self.preview = self
            .kind()
            .shows_preview()
            .then(|| PreviewImage::from_source(&file));
        self.source = Some(file);
        self.error = None;
    }

    /// Record that reading the selected file failed
    pub fn read_failed(&mut self) {
        self.error = Some(READ_FAILED_MESSAGE.to_string());
    }

    pub fn set_quality(&mut self, value: u8) {
        if let Tool::Compressor { quality } = &mut self.tool {
            *quality = value.clamp(1, 100);
        }
    }

    pub fn set_conversion_mode(&mut self, value: ConversionMode) {
        if let Tool::Converter { mode } = &mut self.tool {
            *mode = value;
        }
    }

    pub fn set_name(&mut self, value: impl Into<String>) {
        if let Tool::TextOverlay { name, .. } = &mut self.tool {
            *name = value.into();
        }
    }

    pub fn set_dob(&mut self, value: impl Into<String>) {
        if let Tool::TextOverlay { dob, .. } = &mut self.tool {
            *dob = value.into();
        }
    }

    /// Whether the action control is enabled
    pub fn can_run(&self) -> bool {
        !self.busy && self.source.is_some() && self.tool.check_inputs().is_ok()
    }

    /// Start a run: mark busy, clear the error, snapshot the inputs.
    ///
    /// Returns `None` (and changes nothing) when the action is disabled.
    pub fn begin(&mut self) -> Option<Invocation> {
        if !self.can_run() {
            return None;
        }
        let source = self.source.clone()?;
        self.busy = true;
        self.error = None;
        Some(Invocation {
            tool: self.tool.clone(),
            source,
        })
    }

    /// Finish a run. Failure keeps the previous result.
    pub fn complete(&mut self, outcome: Result<TransformResult>) {
        self.busy = false;
        match outcome {
            Ok(result) => {
                tracing::info!(
                    tool = ?self.kind(),
                    filename = result.filename,
                    size = result.bytes.len(),
                    "result ready"
                );
                self.result = Some(Arc::new(result));
            }
            Err(e) => {
                tracing::debug!(tool = ?self.kind(), class = ?e.class(), error = %e, "run failed");
                self.error = Some(self.failure_message(&e).to_string());
            }
        }
    }

    /// Finish a background-removal request driven from outside. Ignored
    /// (returns false) unless this is a background-remover page with a run
    /// in flight.
    pub fn complete_remote(&mut self, outcome: Result<TransformResult>) -> bool {
        if !self.busy || self.kind() != ToolKind::BackgroundRemover {
            tracing::debug!(tool = ?self.kind(), busy = self.busy, "ignoring stray remote result");
            return false;
        }
        self.complete(outcome);
        true
    }

    fn failure_message(&self, e: &ForgeError) -> &'static str {
        match e {
            ForgeError::Read(_) => READ_FAILED_MESSAGE,
            _ => self.kind().failure_message(),
        }
    }

    /// Run a local tool to completion. Returns whether a run happened.
    pub fn run_local(&mut self, backend: &impl SurfaceBackend) -> bool {
        let Some(invocation) = self.begin() else {
            return false;
        };
        let outcome = invocation.execute(backend);
        self.complete(outcome);
        true
    }

    /// Run the background remover through `client`. Returns whether a run
    /// happened.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn run_remote(&mut self, client: &crate::remote::RemoveBgClient) -> bool {
        let Some(invocation) = self.begin() else {
            return false;
        };
        let outcome = client.remove_background(&invocation.source).await;
        self.complete(outcome);
        true
    }

    /// Filename and bytes for the download link
    pub fn download(&self) -> Option<(&'static str, &[u8])> {
        self.result
            .as_deref()
            .map(|r| (r.filename, r.bytes.as_slice()))
    }

    /// Leave the page: drop everything but the tool settings
    pub fn clear(&mut self) {
        self.source = None;
        self.preview = None;
        self.result = None;
        self.busy = false;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RasterBackend;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn no_file_means_disabled() {
        let mut page = ToolPage::new(ToolKind::WatermarkRemover);
        assert!(!page.can_run());
        assert!(page.begin().is_none());
        assert!(!page.run_local(&RasterBackend::new()));
        assert!(!page.is_busy());
    }

    #[test]
    fn busy_page_refuses_second_run() {
        let mut page = ToolPage::new(ToolKind::Converter);
        page.select_file(SourceFile::new(tiny_png(), "image/webp"));
        let first = page.begin();
        assert!(first.is_some());
        assert!(page.is_busy());
        assert_eq!(page.action_label(), "Converting...");
        assert!(page.begin().is_none());
    }

    #[test]
    fn selecting_a_file_builds_preview() {
        let mut page = ToolPage::new(ToolKind::Compressor);
        page.read_failed();
        page.select_file(SourceFile::new(vec![1, 2, 3], "image/jpeg"));
        assert_eq!(
            page.preview().map(|p| p.data_uri.as_str()),
            Some("data:image/jpeg;base64,AQID")
        );
        assert!(page.error().is_none());
    }

    #[test]
    fn read_failure_shows_read_message() {
        let mut page = ToolPage::new(ToolKind::Converter);
        page.read_failed();
        assert_eq!(page.error(), Some(READ_FAILED_MESSAGE));

        page.select_file(SourceFile::new(tiny_png(), "image/webp"));
        assert!(page.begin().is_some());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        page.complete(Err(ForgeError::Read(io)));
        assert_eq!(page.error(), Some("Failed to read file"));
        assert!(!page.is_busy());
    }

    fn cutout() -> TransformResult {
        TransformResult {
            bytes: tiny_png(),
            media_type: "image/png",
            filename: "background-removed.png",
        }
    }

    #[test]
    fn stray_remote_results_are_ignored() {
        let mut idle = ToolPage::new(ToolKind::BackgroundRemover);
        assert!(!idle.complete_remote(Ok(cutout())));
        assert!(idle.download().is_none());

        let mut compressor = ToolPage::new(ToolKind::Compressor);
        compressor.select_file(SourceFile::new(tiny_png(), "image/jpeg"));
        assert!(compressor.begin().is_some());
        assert!(!compressor.complete_remote(Ok(cutout())));
        assert!(!compressor.complete_remote(Err(ForgeError::Api("502".into()))));
        assert!(compressor.download().is_none());
        assert!(compressor.error().is_none());
    }

    #[test]
    fn remote_result_lands_after_begin() {
        let mut page = ToolPage::new(ToolKind::BackgroundRemover);
        page.select_file(SourceFile::new(tiny_png(), "image/png"));
        assert!(page.begin().is_some());
        assert!(page.complete_remote(Ok(cutout())));
        assert_eq!(page.download().map(|(name, _)| name), Some("background-removed.png"));
        assert!(!page.is_busy());
        assert!(!page.complete_remote(Ok(cutout())));
    }

    #[test]
    fn pdf_page_keeps_no_preview() {
        let mut page = ToolPage::new(ToolKind::PdfUnlocker);
        page.select_file(SourceFile::new(b"%PDF".to_vec(), "application/pdf"));
        assert!(page.preview().is_none());
        assert!(page.can_run());
    }

    #[test]
    fn failure_keeps_previous_result() {
        let backend = RasterBackend::new();
        let mut page = ToolPage::new(ToolKind::Converter);
        page.select_file(SourceFile::new(tiny_png(), "image/webp"));
        assert!(page.run_local(&backend));
        let first = page.result().unwrap();

        page.select_file(SourceFile::new(b"broken".to_vec(), "image/webp"));
        assert!(page.run_local(&backend));
        assert_eq!(page.error(), Some("Conversion failed"));
        assert!(Arc::ptr_eq(&first, &page.result().unwrap()));
        assert!(!page.is_busy());
    }

    #[test]
    fn new_result_does_not_touch_held_one() {
        let backend = RasterBackend::new();
        let mut page = ToolPage::new(ToolKind::Compressor);
        page.select_file(SourceFile::new(tiny_png(), "image/jpeg"));
        page.set_quality(90);
        assert!(page.run_local(&backend));
        let downloading = page.result().unwrap();
        let snapshot = downloading.bytes.clone();

        page.set_quality(10);
        assert!(page.run_local(&backend));
        assert_eq!(downloading.bytes, snapshot);
        assert!(!Arc::ptr_eq(&downloading, &page.result().unwrap()));
    }

    #[test]
    fn text_overlay_needs_both_fields() {
        let mut page = ToolPage::new(ToolKind::TextOverlay);
        page.select_file(SourceFile::new(tiny_png(), "image/png"));
        assert!(!page.can_run());
        page.set_name("Alice");
        assert!(!page.can_run());
        page.set_dob("2000-01-01");
        assert!(page.can_run());
    }

    #[test]
    fn quality_is_clamped() {
        let mut page = ToolPage::new(ToolKind::Compressor);
        page.set_quality(0);
        assert_eq!(page.tool(), &Tool::Compressor { quality: 1 });
        page.set_quality(200);
        assert_eq!(page.tool(), &Tool::Compressor { quality: 100 });
    }

    #[test]
    fn conversion_mode_changes_accept_filter() {
        let mut page = ToolPage::new(ToolKind::Converter);
        assert_eq!(page.tool().accept(), "image/webp");
        page.set_conversion_mode(ConversionMode::PngToJpg);
        assert_eq!(page.tool().accept(), "image/png");
        assert_eq!(page.tool().filename(), "converted.jpg");
    }

    #[test]
    fn clear_drops_state() {
        let backend = RasterBackend::new();
        let mut page = ToolPage::new(ToolKind::WatermarkRemover);
        page.select_file(SourceFile::new(tiny_png(), "image/png"));
        page.run_local(&backend);
        assert!(page.download().is_some());
        page.clear();
        assert!(page.download().is_none());
        assert!(page.source().is_none());
    }
}
