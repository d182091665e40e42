//! # zenraster
//!
//! Decode-only BMP and PNG rasterizer writing canonical 32-bit RGBA/BGRA
//! (premultiplied, unpremultiplied, or opaque) into caller-owned buffers.
//!
//! ## Supported inputs
//!
//! ### BMP (`"BM"` magic)
//! - All standard bit depths: 1, 2, 4, 8, 16, 24, 32
//! - Header variants: OS2 v1/v2 family, info v1 through v5
//! - Compression: uncompressed, RLE4/RLE8 (and the de-facto RLE24),
//!   BITFIELDS / ALPHABITFIELDS with validated channel masks
//! - Bottom-up and top-down row order, palette expansion,
//!   blank-alpha-channel correction for bit-mask files
//! - BMP-in-ICO: header-less entries with the trailing 1-bpp AND mask
//!   applied to the decoded pixels
//!
//! ### PNG (8-byte signature)
//! - All color types and bit depths; 16-bit channels are stripped to 8
//! - PLTE + tRNS palettes, Adam7 interlacing (whole-image decode),
//!   row-at-a-time scanline decoding for non-interlaced streams
//!
//! ## Usage
//!
//! ```no_run
//! use zenraster::*;
//!
//! // One-shot: auto-detect the format, decode to tightly packed RGBA.
//! # let data: &[u8] = &[];
//! let image = decode(data, Unstoppable)?;
//! assert_eq!(image.row_bytes, image.info.width() as usize * 4);
//!
//! // Streaming facade: decode into a caller-owned buffer with a stride.
//! let mut codec = Codec::from_stream(MemStream::new(data))?;
//! let info = *codec.info();
//! let row_bytes = info.min_row_bytes();
//! let mut dst = vec![0u8; info.compute_byte_size(row_bytes)];
//! codec.get_pixels(&info, &mut dst, row_bytes, &DecodeOptions::default(), &Unstoppable)?;
//! # Ok::<(), zenraster::CodecError>(())
//! ```
//!
//! Every decode entry point takes a [`Stop`] token for cooperative
//! cancellation; pass [`Unstoppable`] when cancellation is not needed.
//!
//! ## Compatibility
//!
//! The decode semantics (header tolerance, RLE opcode handling, the
//! blank-alpha corrections) match what mainstream browser decoders
//! accept, because real-world files are authored against them rather
//! than against the written formats.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

mod bmp;
mod codec;
mod color_table;
mod error;
mod info;
mod limits;
mod mask_swizzler;
mod masks;
mod png;
mod stream;
mod swizzler;

pub use bmp::BmpCodec;
pub use codec::Codec;
pub use color_table::ColorTable;
pub use enough::{Stop, Unstoppable};
pub use error::CodecError;
pub use info::{AlphaType, ColorType, DecodeOptions, ImageFormat, ImageInfo};
pub use limits::Limits;
pub use mask_swizzler::MaskSwizzler;
pub use masks::{InputMasks, Masks};
pub use png::{PngCodec, PngScanlineDecoder};
pub use stream::{MemStream, Stream};
pub use swizzler::{ResultAlpha, SrcConfig, Swizzler};

// ── Format detection ─────────────────────────────────────────────────

/// Detect the image format from magic bytes.
///
/// Returns `None` if the data matches neither the BMP `"BM"` magic nor
/// the 8-byte PNG signature.
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() >= 2 && data[0] == b'B' && data[1] == b'M' {
        return Some(ImageFormat::Bmp);
    }
    if data.len() >= 8 && data[..8] == png::reader::SIGNATURE {
        return Some(ImageFormat::Png);
    }
    None
}

// ── One-shot decoding ────────────────────────────────────────────────

/// A decoded image with its own tightly packed pixel storage.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub info: ImageInfo,
    pub row_bytes: usize,
}

/// Decode any supported format (auto-detected from magic bytes) to
/// tightly packed `Rgba8888` with the format's default alpha type.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<DecodedImage, CodecError> {
    let codec = Codec::from_stream(MemStream::new(data))?;
    run_to_image(codec, None, &stop)
}

/// Decode any supported format with resource limits.
pub fn decode_with_limits(
    data: &[u8],
    limits: &Limits,
    stop: impl Stop,
) -> Result<DecodedImage, CodecError> {
    let codec = Codec::from_stream(MemStream::new(data))?;
    run_to_image(codec, Some(limits), &stop)
}

/// Decode a standalone BMP stream.
pub fn decode_bmp(data: &[u8], stop: impl Stop) -> Result<DecodedImage, CodecError> {
    let codec = Codec::Bmp(BmpCodec::from_stream(MemStream::new(data))?);
    run_to_image(codec, None, &stop)
}

/// Decode a BMP stream with resource limits.
pub fn decode_bmp_with_limits(
    data: &[u8],
    limits: &Limits,
    stop: impl Stop,
) -> Result<DecodedImage, CodecError> {
    let codec = Codec::Bmp(BmpCodec::from_stream(MemStream::new(data))?);
    run_to_image(codec, Some(limits), &stop)
}

/// Decode a BMP embedded in an ICO container (no file header; the AND
/// mask is applied to the output).
pub fn decode_ico_bmp(data: &[u8], stop: impl Stop) -> Result<DecodedImage, CodecError> {
    let codec = Codec::Bmp(BmpCodec::from_ico_stream(MemStream::new(data))?);
    run_to_image(codec, None, &stop)
}

/// Decode an ICO-embedded BMP with resource limits.
pub fn decode_ico_bmp_with_limits(
    data: &[u8],
    limits: &Limits,
    stop: impl Stop,
) -> Result<DecodedImage, CodecError> {
    let codec = Codec::Bmp(BmpCodec::from_ico_stream(MemStream::new(data))?);
    run_to_image(codec, Some(limits), &stop)
}

/// Decode a PNG stream.
pub fn decode_png(data: &[u8], stop: impl Stop) -> Result<DecodedImage, CodecError> {
    let codec = Codec::Png(PngCodec::from_stream(MemStream::new(data))?);
    run_to_image(codec, None, &stop)
}

/// Decode a PNG stream with resource limits.
pub fn decode_png_with_limits(
    data: &[u8],
    limits: &Limits,
    stop: impl Stop,
) -> Result<DecodedImage, CodecError> {
    let codec = Codec::Png(PngCodec::from_stream(MemStream::new(data))?);
    run_to_image(codec, Some(limits), &stop)
}

fn run_to_image<S: Stream>(
    mut codec: Codec<S>,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<DecodedImage, CodecError> {
    let info = *codec.info();
    if let Some(limits) = limits {
        limits.check(info.width(), info.height())?;
    }

    let row_bytes = info.min_row_bytes();
    let byte_size = info.compute_byte_size(row_bytes);
    if let Some(limits) = limits {
        limits.check_memory(byte_size)?;
    }

    stop.check()?;
    let mut pixels = vec![0u8; byte_size];
    let options = DecodeOptions {
        zero_initialized: true,
    };
    codec.get_pixels(&info, &mut pixels, row_bytes, &options, stop)?;

    Ok(DecodedImage {
        pixels,
        info,
        row_bytes,
    })
}

// ── Typed pixel API (rgb feature) ────────────────────────────────────

/// Decode any supported format to typed RGBA pixels.
#[cfg(feature = "rgb")]
pub fn decode_rgba(data: &[u8], stop: impl Stop) -> Result<(Vec<rgb::RGBA8>, u32, u32), CodecError> {
    use rgb::AsPixels as _;
    let image = decode(data, stop)?;
    let pixels: &[rgb::RGBA8] = image.pixels.as_pixels();
    Ok((pixels.to_vec(), image.info.width(), image.info.height()))
}

/// Decode a BMP stream to typed RGBA pixels.
#[cfg(feature = "rgb")]
pub fn decode_bmp_rgba(
    data: &[u8],
    stop: impl Stop,
) -> Result<(Vec<rgb::RGBA8>, u32, u32), CodecError> {
    use rgb::AsPixels as _;
    let image = decode_bmp(data, stop)?;
    let pixels: &[rgb::RGBA8] = image.pixels.as_pixels();
    Ok((pixels.to_vec(), image.info.width(), image.info.height()))
}

// ── ImgVec/ImgRef API (imgref feature) ───────────────────────────────

/// Decode any supported format to an [`imgref::ImgVec`] of RGBA pixels.
#[cfg(feature = "imgref")]
pub fn decode_img(data: &[u8], stop: impl Stop) -> Result<imgref::ImgVec<rgb::RGBA8>, CodecError> {
    let (pixels, w, h) = decode_rgba(data, stop)?;
    Ok(imgref::ImgVec::new(pixels, w as usize, h as usize))
}

/// Decode directly into an existing [`imgref::ImgRefMut`] buffer,
/// honoring its stride. The buffer dimensions must match the image.
#[cfg(feature = "imgref")]
pub fn decode_into(
    data: &[u8],
    mut output: imgref::ImgRefMut<'_, rgb::RGBA8>,
    stop: impl Stop,
) -> Result<(), CodecError> {
    use rgb::ComponentBytes as _;

    let mut codec = Codec::from_stream(MemStream::new(data))?;
    let dst_info = ImageInfo::new(
        output.width() as u32,
        output.height() as u32,
        ColorType::Rgba8888,
        codec.info().alpha_type(),
    );
    let row_bytes = output.stride() * 4;
    let buf = output.buf_mut().as_bytes_mut();
    codec.get_pixels(&dst_info, buf, row_bytes, &DecodeOptions::default(), &stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bmp_and_png_magic() {
        assert_eq!(detect_format(b"BM\x00\x00"), Some(ImageFormat::Bmp));
        assert_eq!(
            detect_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            Some(ImageFormat::Png)
        );
        assert_eq!(detect_format(b"GIF89a"), None);
        assert_eq!(detect_format(&[0x89, 0x50]), None);
    }
}
