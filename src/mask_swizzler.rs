//! Swizzler variant for BMP bit-mask pixel formats.
//!
//! The source pixel is a 16- or 32-bit little-endian word and channel
//! extraction is driven by a validated [`Masks`] set instead of a fixed
//! layout. Used by the BMP BitMask engine at 16 and 32 bpp.

use crate::error::CodecError;
use crate::info::{AlphaType, ColorType, ImageInfo};
use crate::masks::Masks;
use crate::swizzler::{mul_div_255, write_pixel, ResultAlpha};

pub struct MaskSwizzler {
    masks: Masks,
    sample_bytes: usize,
    dst_color: ColorType,
    width: usize,
    row_bytes: usize,
    opaque: bool,
    premultiply: bool,
}

impl MaskSwizzler {
    pub fn new(
        dst_info: &ImageInfo,
        row_bytes: usize,
        masks: Masks,
        bits_per_pixel: u16,
    ) -> Result<Self, CodecError> {
        let sample_bytes = match bits_per_pixel {
            16 => 2,
            32 => 4,
            _ => {
                return Err(CodecError::InvalidInput(alloc::format!(
                    "bit-mask sampling is not defined for {bits_per_pixel} bpp"
                )));
            }
        };
        if !matches!(
            dst_info.color_type(),
            ColorType::Rgba8888 | ColorType::Bgra8888
        ) {
            return Err(CodecError::Unimplemented("unsupported swizzle destination"));
        }

        let dst_alpha = dst_info.alpha_type();
        Ok(Self {
            masks,
            sample_bytes,
            dst_color: dst_info.color_type(),
            width: dst_info.width() as usize,
            row_bytes,
            opaque: dst_alpha == AlphaType::Opaque,
            premultiply: dst_alpha == AlphaType::Premul && masks.alpha_mask() != 0,
        })
    }

    /// Convert one source row into destination row `row`.
    pub fn next(&self, src_row: &[u8], dst: &mut [u8], row: usize) -> ResultAlpha {
        let bpp = self.dst_color.bytes_per_pixel();
        let start = row * self.row_bytes;
        let dst_row = &mut dst[start..start + self.width * bpp];

        let mut all_zero = true;
        let mut all_ff = true;

        for (px, out) in src_row
            .chunks_exact(self.sample_bytes)
            .zip(dst_row.chunks_exact_mut(bpp))
        {
            let sample = if self.sample_bytes == 2 {
                u32::from(u16::from_le_bytes([px[0], px[1]]))
            } else {
                u32::from_le_bytes([px[0], px[1], px[2], px[3]])
            };
            let mut r = self.masks.red(sample);
            let mut g = self.masks.green(sample);
            let mut b = self.masks.blue(sample);
            let a = if self.opaque {
                0xFF
            } else {
                self.masks.alpha(sample)
            };
            if self.premultiply {
                r = mul_div_255(a, r);
                g = mul_div_255(a, g);
                b = mul_div_255(a, b);
            }
            all_zero &= a == 0;
            all_ff &= a == 0xFF;
            write_pixel(out, self.dst_color, r, g, b, a);
        }

        if all_ff {
            ResultAlpha::Opaque
        } else if all_zero {
            ResultAlpha::Transparent
        } else {
            ResultAlpha::Translucent
        }
    }
}
