//! Bitmap text stamping.
//!
//! Glyphs come from the 8x8 `font8x8` face and are scaled with
//! nearest-neighbour sampling to the requested pixel size. Rendering is
//! deterministic and needs no system fonts, so it behaves the same natively
//! and in the browser build.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};

/// Horizontal anchoring of a stamp relative to its `x` coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// One string drawn at a baseline point
#[derive(Debug, Clone, PartialEq)]
pub struct TextStamp {
    pub text: String,
    pub x: i64,
    pub baseline: i64,
    /// Glyph cell size in pixels
    pub px: u32,
    pub align: Align,
    pub color: Rgba<u8>,
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Width in pixels of `text` at cell size `px`
pub fn text_width(text: &str, px: u32) -> i64 {
    text.chars().count() as i64 * px as i64
}

/// Draw one stamp onto `img`, clipping at the image bounds
pub fn stamp(img: &mut RgbaImage, stamp: &TextStamp) {
    if stamp.px == 0 || stamp.text.is_empty() {
        return;
    }

    let px = stamp.px as i64;
    let left = match stamp.align {
        Align::Left => stamp.x,
        Align::Right => stamp.x - text_width(&stamp.text, stamp.px),
    };
    // Row 7 of the face is the descender row
    let top = stamp.baseline - px * 7 / 8;
    let (w, h) = (img.width() as i64, img.height() as i64);

    for (i, c) in stamp.text.chars().enumerate() {
        let rows = glyph(c);
        let cell_x = left + i as i64 * px;
        if cell_x >= w || cell_x + px <= 0 {
            continue;
        }

        for dy in 0..px {
            let y = top + dy;
            if y < 0 || y >= h {
                continue;
            }
            let row = rows[(dy * 8 / px) as usize];
            for dx in 0..px {
                let x = cell_x + dx;
                if x < 0 || x >= w {
                    continue;
                }
                let bit = (dx * 8 / px) as u8;
                if row & (1 << bit) != 0 {
                    blend(img.get_pixel_mut(x as u32, y as u32), stamp.color);
                }
            }
        }
    }
}

/// Source-over blend of `src` onto `dst`
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let a = src[3] as u32;
    if a == 255 {
        *dst = src;
        return;
    }
    let inv = 255 - a;
    for c in 0..3 {
        dst[c] = ((src[c] as u32 * a + dst[c] as u32 * inv + 127) / 255) as u8;
    }
    dst[3] = (a + (dst[3] as u32 * inv + 127) / 255).min(255) as u8;
}
