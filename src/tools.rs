//! Per-tool transforms.
//!
//! A [`Tool`] carries the tool's parameters; [`run_local`] turns one source
//! file into one [`TransformResult`] through a [`SurfaceBackend`] (or the PDF
//! path for the unlocker).

use crate::pdf::{unlock_pdf_bytes, UnlockOptions};
use crate::surface::{Operation, OutputFormat, Rect, SurfaceBackend};
use crate::text::{Align, TextStamp};
use crate::{ForgeError, Result, SourceFile, TransformResult};
use image::Rgba;
use std::fmt;
use std::str::FromStr;

/// Default compressor quality
pub const DEFAULT_QUALITY: u8 = 75;

/// Quality used for JPEG output when the caller gives none (canvas default)
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Height of the watermark blur band
pub const WATERMARK_BAND_HEIGHT: u32 = 100;

/// Standard deviation of the watermark blur, in pixels
pub const WATERMARK_BLUR_SIGMA: f32 = 10.0;

/// Text overlay glyph cell; an 8x8 face at 24px sits like 30px sans text
pub const OVERLAY_FONT_PX: u32 = 24;

/// Text overlay distance from the left/right/bottom edges
pub const OVERLAY_MARGIN: i64 = 20;

/// Source/target pair for the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMode {
    #[default]
    WebpToPng,
    PngToJpg,
    JpgToPng,
}

impl ConversionMode {
    pub const ALL: [ConversionMode; 3] = [
        ConversionMode::WebpToPng,
        ConversionMode::PngToJpg,
        ConversionMode::JpgToPng,
    ];

    /// Media type the file picker filters on
    pub fn accept(&self) -> &'static str {
        match self {
            ConversionMode::WebpToPng => "image/webp",
            ConversionMode::PngToJpg => "image/png",
            ConversionMode::JpgToPng => "image/jpeg",
        }
    }

    pub fn output(&self) -> OutputFormat {
        match self {
            ConversionMode::WebpToPng | ConversionMode::JpgToPng => OutputFormat::Png,
            ConversionMode::PngToJpg => OutputFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
        }
    }

    pub fn filename(&self) -> &'static str {
        match self.output() {
            OutputFormat::Png => "converted.png",
            OutputFormat::Jpeg { .. } => "converted.jpg",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::WebpToPng => "webp-to-png",
            ConversionMode::PngToJpg => "png-to-jpg",
            ConversionMode::JpgToPng => "jpg-to-png",
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ConversionMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown conversion mode '{}' (expected webp-to-png, png-to-jpg or jpg-to-png)",
                    s
                )
            })
    }
}

/// Which tool, without its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Compressor,
    Converter,
    WatermarkRemover,
    TextOverlay,
    PdfUnlocker,
    BackgroundRemover,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::Compressor,
        ToolKind::Converter,
        ToolKind::WatermarkRemover,
        ToolKind::TextOverlay,
        ToolKind::PdfUnlocker,
        ToolKind::BackgroundRemover,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ToolKind::Compressor => "Image Compressor",
            ToolKind::Converter => "Image Converter",
            ToolKind::WatermarkRemover => "Watermark Remover",
            ToolKind::TextOverlay => "Text Overlay",
            ToolKind::PdfUnlocker => "PDF Unlocker",
            ToolKind::BackgroundRemover => "Background Remover",
        }
    }

    pub fn action_label(&self) -> &'static str {
        match self {
            ToolKind::Compressor => "Compress",
            ToolKind::Converter => "Convert",
            ToolKind::WatermarkRemover => "Remove Watermark",
            ToolKind::TextOverlay => "Apply Text",
            ToolKind::PdfUnlocker => "Unlock PDF",
            ToolKind::BackgroundRemover => "Remove Background",
        }
    }

    pub fn busy_label(&self) -> &'static str {
        match self {
            ToolKind::Compressor => "Compressing...",
            ToolKind::Converter => "Converting...",
            ToolKind::WatermarkRemover | ToolKind::BackgroundRemover => "Removing...",
            ToolKind::TextOverlay => "Applying...",
            ToolKind::PdfUnlocker => "Unlocking...",
        }
    }

    /// The single message a failed run surfaces
    pub fn failure_message(&self) -> &'static str {
        match self {
            ToolKind::Compressor => "Compression failed",
            ToolKind::Converter => "Conversion failed",
            ToolKind::WatermarkRemover => "Watermark removal failed",
            ToolKind::TextOverlay => "Failed to apply text",
            ToolKind::PdfUnlocker => "Failed to unlock PDF (encrypted PDFs require a password)",
            ToolKind::BackgroundRemover => "Background removal failed. Check API key or file.",
        }
    }

    /// Whether the page keeps an image preview of the selected file
    pub fn shows_preview(&self) -> bool {
        !matches!(self, ToolKind::PdfUnlocker)
    }
}

/// A tool together with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    Compressor { quality: u8 },
    Converter { mode: ConversionMode },
    WatermarkRemover,
    TextOverlay { name: String, dob: String },
    PdfUnlocker,
    BackgroundRemover,
}

impl Tool {
    /// A tool with its default parameters
    pub fn new(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Compressor => Tool::Compressor {
                quality: DEFAULT_QUALITY,
            },
            ToolKind::Converter => Tool::Converter {
                mode: ConversionMode::default(),
            },
            ToolKind::WatermarkRemover => Tool::WatermarkRemover,
            ToolKind::TextOverlay => Tool::TextOverlay {
                name: String::new(),
                dob: String::new(),
            },
            ToolKind::PdfUnlocker => Tool::PdfUnlocker,
            ToolKind::BackgroundRemover => Tool::BackgroundRemover,
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Tool::Compressor { .. } => ToolKind::Compressor,
            Tool::Converter { .. } => ToolKind::Converter,
            Tool::WatermarkRemover => ToolKind::WatermarkRemover,
            Tool::TextOverlay { .. } => ToolKind::TextOverlay,
            Tool::PdfUnlocker => ToolKind::PdfUnlocker,
            Tool::BackgroundRemover => ToolKind::BackgroundRemover,
        }
    }

    /// Media type filter for the file picker
    pub fn accept(&self) -> &'static str {
        match self {
            Tool::Compressor { .. } => "image/jpeg",
            Tool::Converter { mode } => mode.accept(),
            Tool::PdfUnlocker => "application/pdf",
            _ => "image/*",
        }
    }

    pub fn filename(&self) -> &'static str {
        match self {
            Tool::Compressor { .. } => "compressed.jpg",
            Tool::Converter { mode } => mode.filename(),
            Tool::WatermarkRemover => "watermark-removed.png",
            Tool::TextOverlay { .. } => "text-overlay.png",
            Tool::PdfUnlocker => "unlocked.pdf",
            Tool::BackgroundRemover => "background-removed.png",
        }
    }

    pub fn output_media_type(&self) -> &'static str {
        match self {
            Tool::Compressor { .. } => "image/jpeg",
            Tool::Converter { mode } => mode.output().media_type(),
            Tool::PdfUnlocker => "application/pdf",
            _ => "image/png",
        }
    }

    /// Inputs beyond the file that must be present before running
    pub fn check_inputs(&self) -> Result<()> {
        match self {
            Tool::Compressor { quality } if *quality == 0 || *quality > 100 => {
                Err(ForgeError::InvalidQuality)
            }
            Tool::TextOverlay { name, .. } if name.is_empty() => {
                Err(ForgeError::MissingInput("name"))
            }
            Tool::TextOverlay { dob, .. } if dob.is_empty() => {
                Err(ForgeError::MissingInput("date of birth"))
            }
            _ => Ok(()),
        }
    }

    /// Drawing operation for a `width` x `height` surface
    pub fn operation(&self, width: u32, height: u32) -> Operation {
        match self {
            Tool::WatermarkRemover => Operation::BlurFill {
                rect: watermark_rect(width, height),
                sigma: WATERMARK_BLUR_SIGMA,
                color: Rgba([0, 0, 0, 255]),
            },
            Tool::TextOverlay { name, dob } => {
                let baseline = height as i64 - OVERLAY_MARGIN;
                let white = Rgba([255, 255, 255, 255]);
                Operation::TextStamp(vec![
                    TextStamp {
                        text: name.clone(),
                        x: OVERLAY_MARGIN,
                        baseline,
                        px: OVERLAY_FONT_PX,
                        align: Align::Left,
                        color: white,
                    },
                    TextStamp {
                        text: dob.clone(),
                        x: width as i64 - OVERLAY_MARGIN,
                        baseline,
                        px: OVERLAY_FONT_PX,
                        align: Align::Right,
                        color: white,
                    },
                ])
            }
            _ => Operation::Redraw,
        }
    }

    /// Output encoding for raster tools
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Tool::Compressor { quality } => OutputFormat::Jpeg { quality: *quality },
            Tool::Converter { mode } => mode.output(),
            _ => OutputFormat::Png,
        }
    }
}

/// The top-centre band blurred by the watermark remover:
/// x in [w/4, 3w/4), y in [0, 100)
pub fn watermark_rect(width: u32, height: u32) -> Rect {
    let x0 = width / 4;
    let x1 = width * 3 / 4;
    Rect::new(x0, 0, x1 - x0, WATERMARK_BAND_HEIGHT).clipped(width, height)
}

/// Run one local transform invocation
pub fn run_local(
    backend: &impl SurfaceBackend,
    tool: &Tool,
    source: &SourceFile,
) -> Result<TransformResult> {
    tool.check_inputs()?;
    tracing::debug!(
        tool = ?tool.kind(),
        media_type = %source.media_type,
        size = source.len(),
        "running transform"
    );

    let bytes = match tool {
        Tool::BackgroundRemover => return Err(ForgeError::RemoteOnly(tool.kind().title())),
        Tool::PdfUnlocker => unlock_pdf_bytes(&source.bytes, &UnlockOptions::default())?,
        _ => {
            let surface = backend.decode(&source.bytes)?;
            let (width, height) = surface.dimensions();
            let surface = backend.draw(surface, &Operation::Redraw)?;
            let surface = match tool.operation(width, height) {
                Operation::Redraw => surface,
                op => backend.draw(surface, &op)?,
            };
            backend.encode(&surface, tool.output_format())?
        }
    };

    tracing::debug!(tool = ?tool.kind(), size = bytes.len(), "transform finished");
    Ok(TransformResult {
        bytes,
        media_type: tool.output_media_type(),
        filename: tool.filename(),
    })
}
