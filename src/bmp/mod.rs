//! BMP decoder: header parsing plus three pixel engines (standard,
//! bit-mask, RLE), including BMP streams embedded in ICO containers.
//!
//! A [`BmpCodec`] is created from a stream via [`BmpCodec::from_stream`]
//! (or [`BmpCodec::from_ico_stream`] for the header-less ICO form), which
//! consumes and validates the headers. Pixels are then pulled with
//! `get_pixels`; repeated calls rewind the stream and re-parse.

mod header;
mod mask;
mod rle;
mod standard;

use alloc::format;
use alloc::vec::Vec;

use enough::Stop;

pub(crate) use header::{InputFormat, RowOrder};

use crate::color_table::ColorTable;
use crate::error::CodecError;
use crate::info::{AlphaType, ColorType, DecodeOptions, ImageInfo};
use crate::masks::Masks;
use crate::stream::Stream;
use crate::swizzler::mul_div_255;

/// Source row size on the wire: pixel bits rounded up to whole bytes, then
/// to 4-byte alignment.
pub(crate) fn src_row_bytes(width: u32, bits_per_pixel: u32) -> usize {
    ((width as usize * bits_per_pixel as usize).div_ceil(8) + 3) & !3
}

/// Decoder for BMP and BMP-in-ICO streams.
pub struct BmpCodec<S: Stream> {
    pub(crate) stream: S,
    info: ImageInfo,
    pub(crate) bits_per_pixel: u16,
    pub(crate) input_format: InputFormat,
    pub(crate) masks: Masks,
    pub(crate) color_table: Option<ColorTable>,
    num_colors: u32,
    bytes_per_color: u32,
    pixel_data_gap: u32,
    pub(crate) row_order: RowOrder,
    pub(crate) rle_bytes: usize,
    pub(crate) is_ico: bool,
    needs_rewind: bool,
    pub(crate) really_has_alpha: bool,
}

impl<S: Stream> BmpCodec<S> {
    /// Parse the headers of a standalone BMP stream (starting at the
    /// `"BM"` signature) and build a decoder.
    pub fn from_stream(stream: S) -> Result<Self, CodecError> {
        Self::new(stream, false)
    }

    /// Parse a BMP embedded in an ICO container: no file header, and the
    /// declared height covers the XOR color plane plus the AND mask.
    pub fn from_ico_stream(stream: S) -> Result<Self, CodecError> {
        Self::new(stream, true)
    }

    fn new(mut stream: S, is_ico: bool) -> Result<Self, CodecError> {
        let h = header::parse_header(&mut stream, is_ico)?;
        let info = ImageInfo::new(h.width, h.height, ColorType::Rgba8888, h.alpha_type);
        Ok(Self {
            stream,
            info,
            bits_per_pixel: h.bits_per_pixel,
            input_format: h.input_format,
            masks: h.masks,
            color_table: None,
            num_colors: h.num_colors,
            bytes_per_color: h.bytes_per_color,
            pixel_data_gap: h.pixel_data_gap,
            row_order: h.row_order,
            rle_bytes: h.rle_bytes,
            is_ico,
            needs_rewind: false,
            really_has_alpha: false,
        })
    }

    /// Parsed image description: dimensions, suggested color type, and the
    /// default alpha type.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// True if the last decode produced any non-opaque pixel.
    pub fn really_has_alpha(&self) -> bool {
        self.really_has_alpha
    }

    fn rewind_if_needed(&mut self) -> Result<(), CodecError> {
        if !self.needs_rewind {
            return Ok(());
        }
        if !self.stream.rewind() {
            return Err(CodecError::CouldNotRewind);
        }
        // Re-parse to reposition the stream after the headers; the parsed
        // state is refreshed wholesale (it cannot change for a fixed
        // stream, but RLE bpp corrections make reassignment the simplest
        // way to keep the two in lockstep).
        let h = header::parse_header(&mut self.stream, self.is_ico)?;
        self.bits_per_pixel = h.bits_per_pixel;
        self.input_format = h.input_format;
        self.masks = h.masks;
        self.color_table = None;
        self.num_colors = h.num_colors;
        self.bytes_per_color = h.bytes_per_color;
        self.pixel_data_gap = h.pixel_data_gap;
        self.row_order = h.row_order;
        self.rle_bytes = h.rle_bytes;
        self.needs_rewind = false;
        Ok(())
    }

    fn conversion_possible(&self, dst: &ImageInfo) -> Result<(), CodecError> {
        if dst.profile_id() != self.info.profile_id() {
            return Err(CodecError::InvalidConversion);
        }
        let src_alpha = self.info.alpha_type();
        let alpha_ok = dst.alpha_type() == src_alpha
            || (dst.alpha_type() == AlphaType::Premul && src_alpha == AlphaType::Unpremul);
        let ok = match dst.color_type() {
            ColorType::Rgba8888 | ColorType::Bgra8888 => alpha_ok,
            // 565 is only wired through the RLE pixel setters.
            ColorType::Rgb565 => {
                self.input_format == InputFormat::Rle
                    && dst.alpha_type() == AlphaType::Opaque
                    && alpha_ok
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CodecError::InvalidConversion)
        }
    }

    /// Read the color table (for `bpp <= 8`) and skip the gap between the
    /// headers and the pixel array. Entry packing depends on the
    /// destination alpha type, so this runs once per decode.
    fn create_color_table(&mut self, dst_alpha: AlphaType) -> Result<(), CodecError> {
        let mut color_bytes = 0usize;
        if self.bits_per_pixel <= 8 {
            let max_colors = 1u32 << self.bits_per_pixel;
            // Zero means "maximum"; so does an oversized count.
            if self.num_colors == 0 || self.num_colors >= max_colors {
                self.num_colors = max_colors;
            }

            color_bytes = self.num_colors as usize * self.bytes_per_color as usize;
            let mut cbuf = alloc::vec![0u8; color_bytes];
            if self.stream.read_fully(&mut cbuf) != color_bytes {
                return Err(CodecError::InvalidInput(format!(
                    "unable to read {} BMP color table entries",
                    self.num_colors
                )));
            }

            let opaque = dst_alpha == AlphaType::Opaque;
            let premul = dst_alpha == AlphaType::Premul;
            let bpc = self.bytes_per_color as usize;
            let mut entries: Vec<[u8; 4]> = Vec::with_capacity(max_colors as usize);
            for chunk in cbuf.chunks_exact(bpc) {
                let (b, g, r) = (chunk[0], chunk[1], chunk[2]);
                // 3-byte tables carry no alpha; 4-byte tables only keep it
                // when the header declared an alpha mask.
                let a = if opaque || bpc == 3 {
                    0xFF
                } else {
                    ((self.masks.alpha_mask() >> 24) as u8) & chunk[3]
                };
                if premul {
                    entries.push([
                        mul_div_255(a, r),
                        mul_div_255(a, g),
                        mul_div_255(a, b),
                        a,
                    ]);
                } else {
                    entries.push([r, g, b, a]);
                }
            }
            // Pad with opaque black so out-of-range pixel indices stay
            // harmless.
            entries.resize(max_colors as usize, [0, 0, 0, 0xFF]);
            self.color_table = Some(ColorTable::new(entries));
        }

        // ICO pixel data begins immediately after the color table; plain
        // BMP declares an explicit offset that may leave a gap.
        if !self.is_ico {
            let gap = self.pixel_data_gap as usize;
            if gap < color_bytes {
                return Err(CodecError::InvalidInput(
                    "pixel data offset lies inside the color table".into(),
                ));
            }
            let skip = gap - color_bytes;
            if self.stream.skip(skip) != skip {
                return Err(CodecError::InvalidInput(
                    "unable to skip to the BMP pixel array".into(),
                ));
            }
        }
        Ok(())
    }

    /// Decode the whole image into `dst` with stride `dst_row_bytes`.
    pub fn get_pixels(
        &mut self,
        dst_info: &ImageInfo,
        dst: &mut [u8],
        dst_row_bytes: usize,
        options: &DecodeOptions,
        stop: &dyn Stop,
    ) -> Result<(), CodecError> {
        self.rewind_if_needed()?;
        if dst_info.dimensions() != self.info.dimensions() {
            return Err(CodecError::InvalidScale);
        }
        self.conversion_possible(dst_info)?;
        crate::codec::check_dst_buffer(dst_info, dst, dst_row_bytes)?;
        self.needs_rewind = true;
        self.really_has_alpha = false;

        self.create_color_table(dst_info.alpha_type())?;

        match self.input_format {
            InputFormat::Standard => standard::decode(self, dst_info, dst, dst_row_bytes, stop),
            InputFormat::BitMask => mask::decode(self, dst_info, dst, dst_row_bytes, stop),
            InputFormat::Rle => rle::decode(self, dst_info, dst, dst_row_bytes, options, stop),
        }
    }
}
