//! Row-at-a-time conversion from a declared source pixel layout into the
//! destination layout.
//!
//! One swizzler is created per decode and fed one source row per call.
//! Destination addressing is `row * row_bytes`, which is how the callers
//! resolve top-down vs bottom-up row order. Each call reports whether the
//! produced row contained non-opaque pixels so the decoders can decide
//! whether the image has meaningful alpha.

use alloc::format;

use crate::color_table::ColorTable;
use crate::error::CodecError;
use crate::info::{AlphaType, ColorType, ImageInfo};

/// Source row layout handed to [`Swizzler::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SrcConfig {
    /// 1-bit palette indices, most significant bit first.
    Index1,
    /// 2-bit palette indices.
    Index2,
    /// 4-bit palette indices.
    Index4,
    /// One palette index byte per pixel.
    Index8,
    /// One grayscale byte per pixel.
    Gray8,
    /// 3 bytes per pixel, B,G,R.
    Bgr24,
    /// 4 bytes per pixel, B,G,R plus a padding byte.
    Bgrx32,
    /// 4 bytes per pixel, B,G,R,A.
    Bgra32,
    /// 3 bytes per pixel, R,G,B.
    Rgb24,
    /// 4 bytes per pixel, R,G,B plus a padding byte.
    Rgbx32,
    /// 4 bytes per pixel, R,G,B,A.
    Rgba32,
}

impl SrcConfig {
    /// Bits per pixel in the source row.
    pub fn bits_per_pixel(self) -> usize {
        match self {
            Self::Index1 => 1,
            Self::Index2 => 2,
            Self::Index4 => 4,
            Self::Index8 | Self::Gray8 => 8,
            Self::Bgr24 | Self::Rgb24 => 24,
            Self::Bgrx32 | Self::Bgra32 | Self::Rgbx32 | Self::Rgba32 => 32,
        }
    }

    /// Bytes per pixel for whole-byte configs (sub-byte indices round up).
    pub fn bytes_per_pixel(self) -> usize {
        self.bits_per_pixel().div_ceil(8)
    }

    fn is_index(self) -> bool {
        matches!(
            self,
            Self::Index1 | Self::Index2 | Self::Index4 | Self::Index8
        )
    }

    fn has_alpha(self) -> bool {
        matches!(self, Self::Bgra32 | Self::Rgba32)
    }
}

/// Alpha summary of one produced row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultAlpha {
    /// Every output alpha byte was 0xFF.
    Opaque,
    /// Every output alpha byte was 0.
    Transparent,
    /// Anything in between.
    Translucent,
}

impl ResultAlpha {
    pub fn is_opaque(self) -> bool {
        matches!(self, Self::Opaque)
    }

    pub fn is_transparent(self) -> bool {
        matches!(self, Self::Transparent)
    }

    fn from_accumulators(all_zero: bool, all_ff: bool) -> Self {
        if all_ff {
            Self::Opaque
        } else if all_zero {
            Self::Transparent
        } else {
            Self::Translucent
        }
    }
}

/// `(a * v) / 255` with rounding; the premultiply primitive.
#[inline]
pub(crate) fn mul_div_255(a: u8, v: u8) -> u8 {
    let p = u32::from(a) * u32::from(v) + 128;
    ((p + (p >> 8)) >> 8) as u8
}

/// Write one pixel in the destination byte order.
#[inline]
pub(crate) fn write_pixel(out: &mut [u8], color: ColorType, r: u8, g: u8, b: u8, a: u8) {
    match color {
        ColorType::Rgba8888 => out[..4].copy_from_slice(&[r, g, b, a]),
        ColorType::Bgra8888 => out[..4].copy_from_slice(&[b, g, r, a]),
        ColorType::Rgb565 => {
            let px = (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3);
            out[..2].copy_from_slice(&px.to_le_bytes());
        }
        ColorType::Alpha8 => out[0] = a,
    }
}

/// Converts source rows of one [`SrcConfig`] into the destination layout.
pub struct Swizzler {
    src: SrcConfig,
    color_table: Option<ColorTable>,
    dst_color: ColorType,
    width: usize,
    row_bytes: usize,
    opaque: bool,
    premultiply: bool,
}

impl Swizzler {
    /// Build a swizzler for `src` rows targeting `dst_info` at stride
    /// `row_bytes`. Index configs require a color table; the only
    /// destinations supported here are the 32-bit orders, plus `Alpha8`
    /// for grayscale sources.
    pub fn new(
        src: SrcConfig,
        color_table: Option<ColorTable>,
        dst_info: &ImageInfo,
        row_bytes: usize,
    ) -> Result<Self, CodecError> {
        if src.is_index() && color_table.is_none() {
            return Err(CodecError::InvalidInput(format!(
                "{src:?} source requires a color table"
            )));
        }
        match dst_info.color_type() {
            ColorType::Rgba8888 | ColorType::Bgra8888 => {}
            ColorType::Alpha8 if src == SrcConfig::Gray8 => {}
            _ => return Err(CodecError::Unimplemented("unsupported swizzle destination")),
        }

        let dst_alpha = dst_info.alpha_type();
        Ok(Self {
            src,
            color_table,
            dst_color: dst_info.color_type(),
            width: dst_info.width() as usize,
            row_bytes,
            opaque: dst_alpha == AlphaType::Opaque,
            premultiply: dst_alpha == AlphaType::Premul && src.has_alpha(),
        })
    }

    #[inline]
    fn emit(&self, out: &mut [u8], r: u8, g: u8, b: u8, a: u8, all_zero: &mut bool, all_ff: &mut bool) {
        let (r, g, b, a) = if self.opaque {
            (r, g, b, 0xFF)
        } else if self.premultiply {
            (
                mul_div_255(a, r),
                mul_div_255(a, g),
                mul_div_255(a, b),
                a,
            )
        } else {
            (r, g, b, a)
        };
        *all_zero &= a == 0;
        *all_ff &= a == 0xFF;
        write_pixel(out, self.dst_color, r, g, b, a);
    }

    /// Convert one source row into destination row `row` (at
    /// `row * row_bytes` within `dst`).
    pub fn next(&self, src_row: &[u8], dst: &mut [u8], row: usize) -> ResultAlpha {
        let bpp = self.dst_color.bytes_per_pixel();
        let start = row * self.row_bytes;
        let dst_row = &mut dst[start..start + self.width * bpp];

        let mut all_zero = true;
        let mut all_ff = true;

        match self.src {
            SrcConfig::Index1 | SrcConfig::Index2 | SrcConfig::Index4 => {
                let bits = self.src.bits_per_pixel();
                let per_byte = 8 / bits;
                let mask = (1usize << bits) - 1;
                let table = self.color_table.as_ref().unwrap();
                for (x, out) in dst_row.chunks_exact_mut(bpp).enumerate() {
                    let byte = src_row[x / per_byte];
                    let shift = 8 - bits - (x % per_byte) * bits;
                    let idx = (usize::from(byte) >> shift) & mask;
                    let [r, g, b, a] = table.get(idx);
                    all_zero &= a == 0;
                    all_ff &= a == 0xFF;
                    write_pixel(out, self.dst_color, r, g, b, a);
                }
            }
            SrcConfig::Index8 => {
                let table = self.color_table.as_ref().unwrap();
                for (x, out) in dst_row.chunks_exact_mut(bpp).enumerate() {
                    let [r, g, b, a] = table.get(usize::from(src_row[x]));
                    all_zero &= a == 0;
                    all_ff &= a == 0xFF;
                    write_pixel(out, self.dst_color, r, g, b, a);
                }
            }
            SrcConfig::Gray8 => {
                if self.dst_color == ColorType::Alpha8 {
                    // The gray value becomes the alpha byte.
                    for (x, out) in dst_row.iter_mut().enumerate() {
                        let g = src_row[x];
                        all_zero &= g == 0;
                        all_ff &= g == 0xFF;
                        *out = g;
                    }
                } else {
                    for (x, out) in dst_row.chunks_exact_mut(bpp).enumerate() {
                        let g = src_row[x];
                        self.emit(out, g, g, g, 0xFF, &mut all_zero, &mut all_ff);
                    }
                }
            }
            SrcConfig::Bgr24 => {
                for (px, out) in src_row.chunks_exact(3).zip(dst_row.chunks_exact_mut(bpp)) {
                    self.emit(out, px[2], px[1], px[0], 0xFF, &mut all_zero, &mut all_ff);
                }
            }
            SrcConfig::Bgrx32 => {
                for (px, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(bpp)) {
                    self.emit(out, px[2], px[1], px[0], 0xFF, &mut all_zero, &mut all_ff);
                }
            }
            SrcConfig::Bgra32 => {
                for (px, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(bpp)) {
                    self.emit(out, px[2], px[1], px[0], px[3], &mut all_zero, &mut all_ff);
                }
            }
            SrcConfig::Rgb24 => {
                for (px, out) in src_row.chunks_exact(3).zip(dst_row.chunks_exact_mut(bpp)) {
                    self.emit(out, px[0], px[1], px[2], 0xFF, &mut all_zero, &mut all_ff);
                }
            }
            SrcConfig::Rgbx32 => {
                for (px, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(bpp)) {
                    self.emit(out, px[0], px[1], px[2], 0xFF, &mut all_zero, &mut all_ff);
                }
            }
            SrcConfig::Rgba32 => {
                for (px, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(bpp)) {
                    self.emit(out, px[0], px[1], px[2], px[3], &mut all_zero, &mut all_ff);
                }
            }
        }

        ResultAlpha::from_accumulators(all_zero, all_ff)
    }
}
