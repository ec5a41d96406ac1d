//! Drawing surface adapter.
//!
//! The [`SurfaceBackend`] trait is the capability boundary every tool goes
//! through: `decode` bytes into a [`Surface`], `draw` one [`Operation`], then
//! `encode` to an [`OutputFormat`]. [`RasterBackend`] is the production
//! implementation on top of the `image` and `jpeg-encoder` crates.

use crate::blur::{gaussian_kernel, span_profile};
use crate::text::{self, TextStamp};
use crate::{ForgeError, Result};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// An addressable RGBA raster matching the source dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// Axis-aligned rectangle in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Intersect with a `width` x `height` surface
    pub fn clipped(&self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One fixed drawing operation applied to a surface
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Draw the source unchanged
    Redraw,
    /// Fill `rect` with `color` through a Gaussian of `sigma` pixels,
    /// clipped to `rect`
    BlurFill {
        rect: Rect,
        sigma: f32,
        color: Rgba<u8>,
    },
    /// Stamp each string in order
    TextStamp(Vec<TextStamp>),
}

/// Target encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    /// Baseline JPEG; quality 1-100
    Jpeg { quality: u8 },
}

impl OutputFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Decode, draw and encode capability.
///
/// Each tool supplies its own [`Operation`]; the backend owns everything
/// format- and pixel-specific.
pub trait SurfaceBackend {
    /// Decode an encoded raster into a surface of its native dimensions.
    fn decode(&self, bytes: &[u8]) -> Result<Surface>;

    /// Apply one operation.
    fn draw(&self, surface: Surface, op: &Operation) -> Result<Surface>;

    /// Serialize the surface.
    fn encode(&self, surface: &Surface, format: OutputFormat) -> Result<Vec<u8>>;
}

/// Pure-Rust raster backend
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterBackend;

impl RasterBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SurfaceBackend for RasterBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Surface> {
        if bytes.is_empty() {
            return Err(ForgeError::Decode("empty input".to_string()));
        }
        let img = image::load_from_memory(bytes).map_err(|e| ForgeError::Decode(e.to_string()))?;
        tracing::debug!(width = img.width(), height = img.height(), "decoded surface");
        Ok(Surface::new(img.to_rgba8()))
    }

    fn draw(&self, surface: Surface, op: &Operation) -> Result<Surface> {
        let mut pixels = surface.into_pixels();
        match op {
            Operation::Redraw => {}
            Operation::BlurFill { rect, sigma, color } => {
                blur_fill(&mut pixels, *rect, *sigma, *color);
            }
            Operation::TextStamp(stamps) => {
                for s in stamps {
                    text::stamp(&mut pixels, s);
                }
            }
        }
        Ok(Surface::new(pixels))
    }

    fn encode(&self, surface: &Surface, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => encode_png(surface.pixels()),
            OutputFormat::Jpeg { quality } => encode_jpeg(surface.pixels(), quality),
        }
    }
}

/// Least coverage a pixel inside a blur fill receives. Small rectangles
/// otherwise get a profile too faint to survive 8-bit rounding.
pub const MIN_BLUR_COVERAGE: f64 = 0.1;

/// Composite `color` over `img` with blurred rectangle coverage
fn blur_fill(img: &mut RgbaImage, rect: Rect, sigma: f32, color: Rgba<u8>) {
    let rect = rect.clipped(img.width(), img.height());
    if rect.is_empty() {
        return;
    }

    let kernel = gaussian_kernel(sigma);
    let px = span_profile(rect.x, rect.right(), &kernel);
    let py = span_profile(rect.y, rect.bottom(), &kernel);
    let fill_alpha = color[3] as f64 / 255.0;

    for (j, cy) in py.iter().enumerate() {
        for (i, cx) in px.iter().enumerate() {
            let coverage = (cx * cy).max(MIN_BLUR_COVERAGE) * fill_alpha;
            let dst = img.get_pixel_mut(rect.x + i as u32, rect.y + j as u32);
            *dst = source_over(*dst, color, coverage);
        }
    }
}

/// Straight-alpha source-over with `src` at opacity `a`
fn source_over(dst: Rgba<u8>, src: Rgba<u8>, a: f64) -> Rgba<u8> {
    let da = dst[3] as f64 / 255.0;
    let out_a = a + da * (1.0 - a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f64 * a + dst[c] as f64 * da * (1.0 - a)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    DynamicImage::ImageRgba8(pixels.clone())
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| ForgeError::Encode(format!("Failed to encode PNG: {}", e)))?;
    Ok(png_bytes)
}

/// JPEG export flattens transparency onto black, like a 2D canvas does
fn encode_jpeg(pixels: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    if quality == 0 || quality > 100 {
        return Err(ForgeError::InvalidQuality);
    }

    let (width, height) = pixels.dimensions();
    let (w16, h16) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ForgeError::Encode(format!(
                "{}x{} exceeds the JPEG size limit",
                width, height
            )))
        }
    };

    let mut rgb_data = Vec::with_capacity(width as usize * height as usize * 3);
    for p in pixels.pixels() {
        let a = p[3] as u32;
        for c in 0..3 {
            rgb_data.push(((p[c] as u32 * a + 127) / 255) as u8);
        }
    }

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    encoder
        .encode(&rgb_data, w16, h16, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| ForgeError::Encode(format!("Failed to encode JPEG: {}", e)))?;

    Ok(jpeg_bytes)
}
