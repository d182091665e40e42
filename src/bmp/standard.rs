//! Standard (uncompressed) BMP pixel engine, including the 1-bpp AND-mask
//! post-pass for BMP-in-ICO.

use alloc::vec;

use enough::Stop;

use crate::error::CodecError;
use crate::info::{AlphaType, ImageInfo};
use crate::stream::Stream;
use crate::swizzler::{SrcConfig, Swizzler};

use super::{src_row_bytes, BmpCodec, RowOrder};

pub(super) fn decode<S: Stream>(
    codec: &mut BmpCodec<S>,
    dst_info: &ImageInfo,
    dst: &mut [u8],
    dst_row_bytes: usize,
    stop: &dyn Stop,
) -> Result<(), CodecError> {
    let width = dst_info.width();
    let height = dst_info.height() as usize;
    let row_bytes = src_row_bytes(width, u32::from(codec.bits_per_pixel));

    let src_config = match codec.bits_per_pixel {
        1 => SrcConfig::Index1,
        2 => SrcConfig::Index2,
        4 => SrcConfig::Index4,
        8 => SrcConfig::Index8,
        24 => SrcConfig::Bgr24,
        32 => {
            if dst_info.alpha_type() == AlphaType::Opaque {
                SrcConfig::Bgrx32
            } else {
                SrcConfig::Bgra32
            }
        }
        other => {
            return Err(CodecError::InvalidInput(alloc::format!(
                "no standard-format engine for {other} bpp"
            )));
        }
    };

    let swizzler = Swizzler::new(
        src_config,
        codec.color_table.clone(),
        dst_info,
        dst_row_bytes,
    )?;

    let mut src_row = vec![0u8; row_bytes];
    for y in 0..height {
        if y % 16 == 0 {
            stop.check()?;
        }
        if codec.stream.read_fully(&mut src_row) != row_bytes {
            return Err(CodecError::IncompleteInput);
        }

        let row = match codec.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => height - 1 - y,
        };
        let result = swizzler.next(&src_row, dst, row);
        codec.really_has_alpha |= !result.is_opaque();
    }

    if codec.is_ico {
        apply_and_mask(codec, dst_info, dst, dst_row_bytes, stop)?;
    }
    Ok(())
}

/// Read the trailing 1-bpp AND mask of an ICO entry and clear every
/// destination pixel whose mask bit is set (including its alpha).
fn apply_and_mask<S: Stream>(
    codec: &mut BmpCodec<S>,
    dst_info: &ImageInfo,
    dst: &mut [u8],
    dst_row_bytes: usize,
    stop: &dyn Stop,
) -> Result<(), CodecError> {
    let width = dst_info.width() as usize;
    let height = dst_info.height() as usize;
    let dst_bpp = dst_info.color_type().bytes_per_pixel();
    let mask_row_bytes = src_row_bytes(dst_info.width(), 1);

    let mut mask_row = vec![0u8; mask_row_bytes];
    for y in 0..height {
        if y % 16 == 0 {
            stop.check()?;
        }
        if codec.stream.read_fully(&mut mask_row) != mask_row_bytes {
            return Err(CodecError::IncompleteInput);
        }

        let row = match codec.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => height - 1 - y,
        };
        let dst_row = &mut dst[row * dst_row_bytes..][..width * dst_bpp];
        for x in 0..width {
            let bit = (mask_row[x >> 3] >> (7 - (x & 7))) & 1;
            if bit == 1 {
                dst_row[x * dst_bpp..(x + 1) * dst_bpp].fill(0);
                codec.really_has_alpha = true;
            }
        }
    }
    Ok(())
}
