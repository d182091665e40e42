//! BMP header parsing: the 14-byte file header (absent for BMP-in-ICO),
//! the info-header version zoo, compression dispatch, and bit-mask
//! sourcing.

use alloc::format;
use alloc::string::String;
use alloc::vec;

use crate::error::CodecError;
use crate::info::AlphaType;
use crate::masks::{InputMasks, Masks};
use crate::stream::Stream;

/// How the pixel array is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InputFormat {
    Standard,
    BitMask,
    Rle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RowOrder {
    TopDown,
    BottomUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderType {
    InfoV1,
    InfoV2,
    InfoV3,
    InfoV4,
    InfoV5,
    Os2V1,
    Os2V2,
    Unknown,
}

// Compression method values from the info header.
const COMP_NONE: u32 = 0;
const COMP_RLE8: u32 = 1;
const COMP_RLE4: u32 = 2;
const COMP_BIT_MASKS: u32 = 3;
const COMP_JPEG: u32 = 4;
const COMP_PNG: u32 = 5;
const COMP_ALPHA_BIT_MASKS: u32 = 6;
const COMP_CMYK: u32 = 11;
const COMP_CMYK_RLE8: u32 = 12;
const COMP_CMYK_RLE4: u32 = 13;

const FILE_HEADER_BYTES: u32 = 14;
const OS2V1_BYTES: u32 = 12;
const MASK_BYTES: usize = 12;
const MAX_DIM: u32 = 1 << 16;

/// Everything the pixel engines need, produced by [`parse_header`].
pub(crate) struct ParsedHeader {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u16,
    pub input_format: InputFormat,
    pub masks: Masks,
    pub num_colors: u32,
    pub bytes_per_color: u32,
    /// Bytes between the end of the headers and the pixel array, consumed
    /// after the color table. Always 0 for BMP-in-ICO.
    pub pixel_data_gap: u32,
    pub row_order: RowOrder,
    pub rle_bytes: usize,
    pub alpha_type: AlphaType,
}

fn invalid(msg: impl Into<String>) -> CodecError {
    CodecError::InvalidInput(msg.into())
}

fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Parse the headers of a BMP stream, leaving the stream positioned at the
/// start of the color table (or pixel data when there is none).
///
/// For `is_ico` the 14-byte file header is absent: parsing starts at the
/// info-header size field, the total file size is unknown, and pixel data
/// begins immediately after the color table.
pub(crate) fn parse_header<S: Stream>(
    stream: &mut S,
    is_ico: bool,
) -> Result<ParsedHeader, CodecError> {
    let total_bytes;
    let pixel_offset;
    let info_bytes;

    if !is_ico {
        // File header plus the info-header size field.
        let mut hbuf = [0u8; 18];
        if stream.read_fully(&mut hbuf) != hbuf.len() {
            return Err(invalid("unable to read BMP file header"));
        }
        if hbuf[0] != b'B' || hbuf[1] != b'M' {
            return Err(CodecError::UnrecognizedFormat);
        }

        total_bytes = get_u32(&hbuf, 2);
        pixel_offset = get_u32(&hbuf, 10);
        if pixel_offset < FILE_HEADER_BYTES + OS2V1_BYTES {
            return Err(invalid("pixel data offset overlaps the BMP headers"));
        }
        info_bytes = get_u32(&hbuf, 14);
    } else {
        // Only used by RLE, which BMP-in-ICO never is; if the compression
        // field claims RLE anyway, the RLE size check below rejects it.
        total_bytes = 0;
        pixel_offset = 0;

        let mut sbuf = [0u8; 4];
        if stream.read_fully(&mut sbuf) != sbuf.len() {
            return Err(invalid("unable to read BMP info header size"));
        }
        info_bytes = get_u32(&sbuf, 0);
    }

    if info_bytes < OS2V1_BYTES {
        return Err(invalid(format!("BMP info header size {info_bytes} is too small")));
    }

    // The size field itself is already consumed. A hostile size cannot
    // force a large allocation: only the fields of the largest known
    // header are buffered, the rest is skipped.
    let info_remaining = (info_bytes - 4) as usize;
    let buffered = info_remaining.min(120);
    let mut ibuf = vec![0u8; buffered];
    if stream.read_fully(&mut ibuf) != buffered {
        return Err(invalid("unable to read BMP info header"));
    }
    let tail = info_remaining - buffered;
    if stream.skip(tail) != tail {
        return Err(invalid("BMP info header extends past the end of input"));
    }

    let header_type;
    let raw_width;
    let raw_height;
    let mut bits_per_pixel;
    let mut compression = COMP_NONE;
    let mut num_colors = 0u32;
    let bytes_per_color;

    if info_bytes >= 16 {
        header_type = match info_bytes {
            40 => HeaderType::InfoV1,
            52 => HeaderType::InfoV2,
            56 => HeaderType::InfoV3,
            108 => HeaderType::InfoV4,
            124 => HeaderType::InfoV5,
            16 | 20 | 24 | 28 | 32 | 36 | 42 | 46 | 48 | 60 | 64 => HeaderType::Os2V2,
            // Newer or undocumented header sizes tend to extend the v1
            // layout, so parse the common fields and keep going.
            _ => HeaderType::Unknown,
        };
        raw_width = get_u32(&ibuf, 0) as i32;
        raw_height = get_u32(&ibuf, 4) as i32;
        bits_per_pixel = get_u16(&ibuf, 10);

        // Shorter variants lack these fields; keep the defaults then.
        if info_remaining >= 16 {
            compression = get_u32(&ibuf, 12);
            if info_remaining >= 32 {
                num_colors = get_u32(&ibuf, 28);
            }
        }
        bytes_per_color = 4;
    } else {
        header_type = HeaderType::Os2V1;
        raw_width = i32::from(get_u16(&ibuf, 0));
        raw_height = i32::from(get_u16(&ibuf, 2));
        bits_per_pixel = get_u16(&ibuf, 6);
        bytes_per_color = 3;
    }

    let mut row_order = RowOrder::BottomUp;
    let mut height = raw_height;
    if height < 0 {
        // i32::MIN saturates to i32::MAX and fails the dimension check.
        height = height.saturating_neg();
        row_order = RowOrder::TopDown;
    }
    // An ICO entry stacks the XOR color plane on top of the AND mask, and
    // declares the combined height.
    if is_ico {
        height /= 2;
    }
    if raw_width < 0 || raw_width as u32 >= MAX_DIM || height as u32 >= MAX_DIM {
        return Err(CodecError::DimensionsTooLarge {
            width: raw_width as u32,
            height: height as u32,
        });
    }
    if raw_width == 0 || height == 0 {
        return Err(invalid("BMP dimensions must be positive"));
    }
    let width = raw_width as u32;
    let height = height as u32;

    let mut input_masks = InputMasks::default();
    let mut mask_bytes = 0u32;
    let input_format = match compression {
        COMP_NONE => InputFormat::Standard,
        COMP_RLE8 => {
            // Tolerated mismatch; the compression field wins.
            bits_per_pixel = 8;
            InputFormat::Rle
        }
        COMP_RLE4 => {
            bits_per_pixel = 4;
            InputFormat::Rle
        }
        COMP_BIT_MASKS | COMP_ALPHA_BIT_MASKS => {
            match header_type {
                HeaderType::InfoV1 => {
                    // The v1 header stores the three RGB masks after the
                    // info header.
                    let mut mbuf = [0u8; MASK_BYTES];
                    if stream.read_fully(&mut mbuf) != MASK_BYTES {
                        return Err(invalid("unable to read BMP bit masks"));
                    }
                    mask_bytes = MASK_BYTES as u32;
                    input_masks.red = get_u32(&mbuf, 0);
                    input_masks.green = get_u32(&mbuf, 4);
                    input_masks.blue = get_u32(&mbuf, 8);
                }
                HeaderType::InfoV2
                | HeaderType::InfoV3
                | HeaderType::InfoV4
                | HeaderType::InfoV5 => {
                    input_masks.red = get_u32(&ibuf, 36);
                    input_masks.green = get_u32(&ibuf, 40);
                    input_masks.blue = get_u32(&ibuf, 44);
                }
                HeaderType::Os2V2 => {
                    return Err(invalid("OS2 Huffman-coded BMP is not supported"));
                }
                HeaderType::Os2V1 | HeaderType::Unknown => {
                    return Err(invalid("this BMP header variant cannot carry bit masks"));
                }
            }
            InputFormat::BitMask
        }
        // Compression 4 nominally means JPEG-in-BMP, but with 24 bpp it is
        // the de-facto RLE24 variant.
        COMP_JPEG if bits_per_pixel == 24 => InputFormat::Rle,
        COMP_JPEG | COMP_PNG => {
            return Err(invalid("JPEG/PNG-in-BMP compression is not supported"));
        }
        COMP_CMYK | COMP_CMYK_RLE8 | COMP_CMYK_RLE4 => {
            return Err(invalid("CMYK BMP is not supported"));
        }
        other => {
            return Err(invalid(format!("invalid BMP compression method {other}")));
        }
    };

    // Most BMPs render opaque even when a 32-bit channel is present;
    // authoring tools usually leave it zero. The alpha mask is honored for
    // v4/v5 (and v3 inside ICO), and 32-bit ICO entries always use their
    // alpha channel.
    let mut alpha_type = AlphaType::Opaque;
    if matches!(header_type, HeaderType::InfoV4 | HeaderType::InfoV5)
        || (header_type == HeaderType::InfoV3 && is_ico)
    {
        input_masks.alpha = get_u32(&ibuf, 48);
        if input_masks.alpha != 0 {
            alpha_type = AlphaType::Unpremul;
        }
    }
    if is_ico && bits_per_pixel == 32 {
        alpha_type = AlphaType::Unpremul;
    }

    let input_format = match bits_per_pixel {
        // The standard 16-bit layout is XRRRRRGGGGGBBBBB, handled as the
        // default mask set.
        16 => {
            if input_format != InputFormat::BitMask {
                input_masks.red = 0x7C00;
                input_masks.green = 0x03E0;
                input_masks.blue = 0x001F;
                InputFormat::BitMask
            } else {
                input_format
            }
        }
        1 | 2 | 4 | 8 | 24 | 32 => input_format,
        other => {
            return Err(invalid(format!("invalid BMP bit depth {other}")));
        }
    };

    let masks = Masks::create(input_masks, u32::from(bits_per_pixel))?;

    if input_format == InputFormat::Rle && total_bytes <= pixel_offset {
        return Err(invalid("RLE BMP requires a valid total file size"));
    }
    let rle_bytes = total_bytes.saturating_sub(pixel_offset) as usize;

    let file_header_bytes = if is_ico { 0 } else { FILE_HEADER_BYTES };
    let bytes_read =
        u64::from(file_header_bytes) + u64::from(info_bytes) + u64::from(mask_bytes);
    if !is_ico && u64::from(pixel_offset) < bytes_read {
        return Err(invalid("pixel data offset lies inside the BMP headers"));
    }
    let pixel_data_gap = if is_ico {
        0
    } else {
        (u64::from(pixel_offset) - bytes_read) as u32
    };

    Ok(ParsedHeader {
        width,
        height,
        bits_per_pixel,
        input_format,
        masks,
        num_colors,
        bytes_per_color,
        pixel_data_gap,
        row_order,
        rle_bytes,
        alpha_type,
    })
}
