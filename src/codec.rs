//! Shared decode contract over the per-format codecs.
//!
//! [`Codec::from_stream`] sniffs the magic bytes and hands the stream to
//! the matching decoder; `get_pixels` and `scanline_decoder` share one
//! precondition set (rewind-if-needed, exact dimensions, a legal
//! color/alpha conversion, and a large-enough destination).

use enough::Stop;

use crate::bmp::BmpCodec;
use crate::error::CodecError;
use crate::info::{DecodeOptions, ImageInfo};
use crate::png::{PngCodec, PngScanlineDecoder};
use crate::stream::Stream;

/// Validate stride and destination size for a decode into `dst`.
pub(crate) fn check_dst_buffer(
    dst_info: &ImageInfo,
    dst: &[u8],
    row_bytes: usize,
) -> Result<(), CodecError> {
    if row_bytes < dst_info.min_row_bytes() {
        return Err(CodecError::InvalidInput(
            "destination stride is smaller than one row".into(),
        ));
    }
    let needed = dst_info.compute_byte_size(row_bytes);
    if dst.len() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            actual: dst.len(),
        });
    }
    Ok(())
}

/// A decoder for any supported format.
pub enum Codec<S: Stream> {
    Bmp(BmpCodec<S>),
    Png(PngCodec<S>),
}

impl<S: Stream> Codec<S> {
    /// Sniff the magic bytes and build the matching decoder. The stream
    /// must be rewindable so the decoder can re-read from the start.
    pub fn from_stream(mut stream: S) -> Result<Self, CodecError> {
        let mut magic = [0u8; 2];
        let got = stream.read(&mut magic);
        if !stream.rewind() {
            return Err(CodecError::CouldNotRewind);
        }
        if got < 2 {
            return Err(CodecError::UnrecognizedFormat);
        }
        match magic {
            [b'B', b'M'] => Ok(Self::Bmp(BmpCodec::from_stream(stream)?)),
            [0x89, b'P'] => Ok(Self::Png(PngCodec::from_stream(stream)?)),
            _ => Err(CodecError::UnrecognizedFormat),
        }
    }

    /// Parsed image description: dimensions, suggested color type, and
    /// the default alpha type.
    pub fn info(&self) -> &ImageInfo {
        match self {
            Self::Bmp(c) => c.info(),
            Self::Png(c) => c.info(),
        }
    }

    /// Decode the whole image into `dst` with stride `dst_row_bytes`.
    ///
    /// `dst_info` must match the image dimensions exactly and request a
    /// legal conversion: the alpha types must be equal, or the source
    /// unpremultiplied and the destination premultiplied.
    pub fn get_pixels(
        &mut self,
        dst_info: &ImageInfo,
        dst: &mut [u8],
        dst_row_bytes: usize,
        options: &DecodeOptions,
        stop: &dyn Stop,
    ) -> Result<(), CodecError> {
        match self {
            Self::Bmp(c) => c.get_pixels(dst_info, dst, dst_row_bytes, options, stop),
            Self::Png(c) => c.get_pixels(dst_info, dst, dst_row_bytes, options, stop),
        }
    }

    /// Row-at-a-time decoding. Only non-interlaced PNG supports it.
    pub fn scanline_decoder(
        &mut self,
        dst_info: &ImageInfo,
    ) -> Result<PngScanlineDecoder<'_, S>, CodecError> {
        match self {
            Self::Bmp(_) => Err(CodecError::Unimplemented(
                "scanline decoding of BMP streams",
            )),
            Self::Png(c) => c.scanline_decoder(dst_info),
        }
    }

    /// True if the last decode produced any non-opaque pixel.
    pub fn really_has_alpha(&self) -> bool {
        match self {
            Self::Bmp(c) => c.really_has_alpha(),
            Self::Png(c) => c.really_has_alpha(),
        }
    }
}
