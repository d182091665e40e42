//! Bit-mask BMP pixel engine (16 and 32 bpp with header-supplied masks).
//!
//! The whole image is buffered so that a file whose alpha channel is
//! entirely zero can be re-swizzled as opaque: many authoring tools write
//! a 32-bit alpha mask and then leave every alpha sample blank, expecting
//! opaque rendering.

use alloc::vec;

use enough::Stop;

use crate::error::CodecError;
use crate::info::{AlphaType, ImageInfo};
use crate::mask_swizzler::MaskSwizzler;
use crate::stream::Stream;

use super::{src_row_bytes, BmpCodec, RowOrder};

pub(super) fn decode<S: Stream>(
    codec: &mut BmpCodec<S>,
    dst_info: &ImageInfo,
    dst: &mut [u8],
    dst_row_bytes: usize,
    stop: &dyn Stop,
) -> Result<(), CodecError> {
    let height = dst_info.height() as usize;
    let row_bytes = src_row_bytes(dst_info.width(), u32::from(codec.bits_per_pixel));

    let swizzler = MaskSwizzler::new(dst_info, dst_row_bytes, codec.masks, codec.bits_per_pixel)?;

    let mut src = vec![0u8; height * row_bytes];
    let mut transparent = true;
    for y in 0..height {
        if y % 16 == 0 {
            stop.check()?;
        }
        let src_row = &mut src[y * row_bytes..(y + 1) * row_bytes];
        if codec.stream.read_fully(src_row) != row_bytes {
            return Err(CodecError::IncompleteInput);
        }

        let row = match codec.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => height - 1 - y,
        };
        let result = swizzler.next(src_row, dst, row);
        transparent &= result.is_transparent();
        codec.really_has_alpha |= !result.is_opaque();
    }

    // A fully transparent result means the alpha channel was left blank;
    // re-run the buffered rows as opaque.
    if transparent && dst_info.alpha_type() != AlphaType::Opaque {
        let opaque_info = dst_info.with_alpha_type(AlphaType::Opaque);
        let opaque_swizzler =
            MaskSwizzler::new(&opaque_info, dst_row_bytes, codec.masks, codec.bits_per_pixel)?;
        for y in 0..height {
            if y % 16 == 0 {
                stop.check()?;
            }
            let row = match codec.row_order {
                RowOrder::TopDown => y,
                RowOrder::BottomUp => height - 1 - y,
            };
            opaque_swizzler.next(&src[y * row_bytes..(y + 1) * row_bytes], dst, row);
        }
        codec.really_has_alpha = false;
    }
    Ok(())
}
