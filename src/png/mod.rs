//! PNG decoder: header/palette handling and a pull-row loop over the
//! inflate output, supporting whole-image decode (interlaced or not) and
//! a scanline decoder for non-interlaced streams.

pub(crate) mod reader;

use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;

use crate::color_table::ColorTable;
use crate::error::CodecError;
use crate::info::{AlphaType, ColorType, DecodeOptions, ImageInfo};
use crate::stream::Stream;
use crate::swizzler::{mul_div_255, SrcConfig, Swizzler};

use reader::{
    expand_row, parse_chunks, pass_dimensions, pass_position, raw_row_bytes, RowEngine,
    COLOR_GRAY, COLOR_GRAY_ALPHA, COLOR_PALETTE, COLOR_RGBA,
};

/// Decoder for PNG streams.
pub struct PngCodec<S: Stream> {
    pub(crate) stream: S,
    info: ImageInfo,
    bit_depth: u8,
    png_color_type: u8,
    interlaced: bool,
    palette: Vec<[u8; 3]>,
    trans: Vec<u8>,
    first_idat_len: usize,
    color_table: Option<ColorTable>,
    number_passes: u32,
    really_has_alpha: bool,
    needs_rewind: bool,
}

impl<S: Stream> PngCodec<S> {
    /// Validate the signature, read the chunks up to the first IDAT, and
    /// build a decoder.
    pub fn from_stream(mut stream: S) -> Result<Self, CodecError> {
        let h = parse_chunks(&mut stream)?;

        if h.width == 0 || h.height == 0 {
            return Err(CodecError::InvalidInput("PNG dimensions must be positive".into()));
        }
        if h.width >= 1 << 16 || h.height >= 1 << 16 {
            return Err(CodecError::DimensionsTooLarge {
                width: h.width,
                height: h.height,
            });
        }
        // 4 bytes per pixel must stay addressable with a signed 32-bit
        // byte count.
        if u64::from(h.width) * u64::from(h.height) > (i32::MAX as u64) >> 2 {
            return Err(CodecError::DimensionsTooLarge {
                width: h.width,
                height: h.height,
            });
        }

        let alpha_type = match h.color_type {
            COLOR_PALETTE => {
                if h.trans.is_empty() {
                    AlphaType::Opaque
                } else {
                    AlphaType::Unpremul
                }
            }
            COLOR_GRAY_ALPHA | COLOR_RGBA => AlphaType::Unpremul,
            _ => AlphaType::Opaque,
        };
        let info = ImageInfo::new(h.width, h.height, ColorType::Rgba8888, alpha_type);

        Ok(Self {
            stream,
            info,
            bit_depth: h.bit_depth,
            png_color_type: h.color_type,
            interlaced: h.interlaced,
            palette: h.palette,
            trans: h.trans,
            first_idat_len: h.first_idat_len,
            color_table: None,
            number_passes: 0,
            really_has_alpha: false,
            needs_rewind: false,
        })
    }

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
        let h = parse_chunks(&mut self.stream)?;
        self.palette = h.palette;
        self.trans = h.trans;
        self.first_idat_len = h.first_idat_len;
        self.color_table = None;
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
            ColorType::Alpha8 => self.png_color_type == COLOR_GRAY,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(CodecError::InvalidConversion)
        }
    }

    /// Build the color table from PLTE and tRNS.
    ///
    /// Some images contain index bytes equal to the palette length, so a
    /// palette of fewer than 256 entries grows by one slot duplicating the
    /// last color; real files rely on this.
    fn decode_palette(&mut self, premultiply: bool) -> Result<(), CodecError> {
        if self.palette.is_empty() {
            return Err(CodecError::InvalidInput("paletted PNG without a PLTE chunk".into()));
        }
        let n = self.palette.len();
        let num_trans = self.trans.len().min(n);

        let mut entries: Vec<[u8; 4]> = Vec::with_capacity(n + 1);
        let mut trans_below_ff = false;
        for (i, &[r, g, b]) in self.palette.iter().enumerate().take(num_trans) {
            let a = self.trans[i];
            trans_below_ff |= a < 0xFF;
            if premultiply {
                entries.push([mul_div_255(a, r), mul_div_255(a, g), mul_div_255(a, b), a]);
            } else {
                entries.push([r, g, b, a]);
            }
        }
        self.really_has_alpha = trans_below_ff;
        for &[r, g, b] in self.palette.iter().skip(num_trans) {
            entries.push([r, g, b, 0xFF]);
        }
        if n < 256 {
            entries.push(entries[n - 1]);
        }
        self.color_table = Some(ColorTable::new(entries));
        Ok(())
    }

    /// Resolve the source config for this destination, build the swizzler
    /// and the row engine.
    fn initialize_swizzler(
        &mut self,
        dst_info: &ImageInfo,
        dst_row_bytes: usize,
    ) -> Result<(SrcConfig, Swizzler, RowEngine), CodecError> {
        self.number_passes = if self.interlaced { 7 } else { 1 };
        self.really_has_alpha = false;

        let src_config = if self.png_color_type == COLOR_PALETTE {
            self.decode_palette(dst_info.alpha_type() == AlphaType::Premul)?;
            SrcConfig::Index8
        } else if dst_info.color_type() == ColorType::Alpha8 {
            SrcConfig::Gray8
        } else if self.info.alpha_type() == AlphaType::Opaque {
            SrcConfig::Rgbx32
        } else {
            SrcConfig::Rgba32
        };

        let swizzler = Swizzler::new(
            src_config,
            self.color_table.clone(),
            dst_info,
            dst_row_bytes,
        )?;
        let engine = RowEngine::new(self.first_idat_len, self.bit_depth, self.png_color_type);
        Ok((src_config, swizzler, engine))
    }

    /// Decode the whole image into `dst` with stride `dst_row_bytes`.
    pub fn get_pixels(
        &mut self,
        dst_info: &ImageInfo,
        dst: &mut [u8],
        dst_row_bytes: usize,
        _options: &DecodeOptions,
        stop: &dyn Stop,
    ) -> Result<(), CodecError> {
        self.rewind_if_needed()?;
        if dst_info.dimensions() != self.info.dimensions() {
            return Err(CodecError::InvalidScale);
        }
        self.conversion_possible(dst_info)?;
        crate::codec::check_dst_buffer(dst_info, dst, dst_row_bytes)?;
        self.needs_rewind = true;

        let (src_config, swizzler, mut engine) =
            self.initialize_swizzler(dst_info, dst_row_bytes)?;

        let width = self.info.width();
        let height = self.info.height() as usize;
        let src_bpp = src_config.bytes_per_pixel();
        let src_row_bytes = width as usize * src_bpp;

        if self.number_passes > 1 {
            // Interlaced: assemble the Adam7 passes into a full-image
            // buffer, then swizzle it in one sweep.
            let mut storage = vec![0u8; src_row_bytes * height];
            for pass in 1..=self.number_passes as usize {
                let (pw, ph) = pass_dimensions(pass, width, self.info.height());
                if pw == 0 || ph == 0 {
                    continue;
                }
                engine.start_pass(raw_row_bytes(pw, self.bit_depth, self.png_color_type));
                let mut pass_row = vec![0u8; pw as usize * src_bpp];
                for r in 0..ph {
                    if r % 16 == 0 {
                        stop.check()?;
                    }
                    let raw = engine.next_row(&mut self.stream)?;
                    expand_row(
                        raw,
                        &mut pass_row,
                        pw as usize,
                        self.bit_depth,
                        self.png_color_type,
                        src_config,
                    );
                    for i in 0..pw {
                        let (x, y) = pass_position(pass, i, r);
                        let dst_off = (y as usize * width as usize + x as usize) * src_bpp;
                        let src_off = i as usize * src_bpp;
                        storage[dst_off..dst_off + src_bpp]
                            .copy_from_slice(&pass_row[src_off..src_off + src_bpp]);
                    }
                }
            }
            for y in 0..height {
                let row = &storage[y * src_row_bytes..(y + 1) * src_row_bytes];
                let result = swizzler.next(row, dst, y);
                self.really_has_alpha |= !result.is_opaque();
            }
        } else {
            engine.start_pass(raw_row_bytes(width, self.bit_depth, self.png_color_type));
            let mut src_row = vec![0u8; src_row_bytes];
            for y in 0..height {
                if y % 16 == 0 {
                    stop.check()?;
                }
                let raw = engine.next_row(&mut self.stream)?;
                expand_row(
                    raw,
                    &mut src_row,
                    width as usize,
                    self.bit_depth,
                    self.png_color_type,
                    src_config,
                );
                let result = swizzler.next(&src_row, dst, y);
                self.really_has_alpha |= !result.is_opaque();
            }
        }

        // Trailing ancillary chunks; failures no longer matter.
        engine.finish(&mut self.stream);
        Ok(())
    }

    /// Scanline access for non-interlaced streams; interlaced images only
    /// support whole-image decode.
    pub fn scanline_decoder(
        &mut self,
        dst_info: &ImageInfo,
    ) -> Result<PngScanlineDecoder<'_, S>, CodecError> {
        if self.interlaced {
            return Err(CodecError::Unimplemented(
                "scanline decoding of interlaced PNG",
            ));
        }
        self.rewind_if_needed()?;
        if dst_info.dimensions() != self.info.dimensions() {
            return Err(CodecError::InvalidScale);
        }
        self.conversion_possible(dst_info)?;
        self.needs_rewind = true;

        let (src_config, swizzler, mut engine) =
            self.initialize_swizzler(dst_info, dst_info.min_row_bytes())?;
        engine.start_pass(raw_row_bytes(
            self.info.width(),
            self.bit_depth,
            self.png_color_type,
        ));

        let src_row = vec![0u8; self.info.width() as usize * src_config.bytes_per_pixel()];
        Ok(PngScanlineDecoder {
            dst_info: *dst_info,
            src_config,
            src_row,
            swizzler,
            engine,
            has_alpha: false,
            codec: self,
        })
    }
}

/// Reads consecutive rows of a non-interlaced PNG on demand.
pub struct PngScanlineDecoder<'a, S: Stream> {
    codec: &'a mut PngCodec<S>,
    dst_info: ImageInfo,
    src_config: SrcConfig,
    src_row: Vec<u8>,
    swizzler: Swizzler,
    engine: RowEngine,
    has_alpha: bool,
}

impl<S: Stream> PngScanlineDecoder<'_, S> {
    /// Decode `count` consecutive rows into `dst` with stride `row_bytes`.
    pub fn get_scanlines(
        &mut self,
        dst: &mut [u8],
        count: usize,
        row_bytes: usize,
        stop: &dyn Stop,
    ) -> Result<(), CodecError> {
        let min_row = self.dst_info.min_row_bytes();
        if row_bytes < min_row {
            return Err(CodecError::InvalidInput(
                "destination stride is smaller than one row".into(),
            ));
        }
        if count > 0 {
            let needed = (count - 1) * row_bytes + min_row;
            if dst.len() < needed {
                return Err(CodecError::BufferTooSmall {
                    needed,
                    actual: dst.len(),
                });
            }
        }
        for i in 0..count {
            if i % 16 == 0 {
                stop.check()?;
            }
            let raw = self.engine.next_row(&mut self.codec.stream)?;
            expand_row(
                raw,
                &mut self.src_row,
                self.dst_info.width() as usize,
                self.codec.bit_depth,
                self.codec.png_color_type,
                self.src_config,
            );
            let out = &mut dst[i * row_bytes..i * row_bytes + min_row];
            let result = self.swizzler.next(&self.src_row, out, 0);
            self.has_alpha |= !result.is_opaque();
        }
        Ok(())
    }

    /// Pull and discard `count` rows (their contents still feed the
    /// filters of the rows that follow).
    pub fn skip_scanlines(&mut self, count: usize, stop: &dyn Stop) -> Result<(), CodecError> {
        for i in 0..count {
            if i % 16 == 0 {
                stop.check()?;
            }
            self.engine.next_row(&mut self.codec.stream)?;
        }
        Ok(())
    }

    /// True if any row decoded so far contained a non-opaque pixel.
    pub fn really_has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Consume the rest of the stream through IEND; failures here are
    /// ignored.
    pub fn finish(mut self) {
        self.engine.finish(&mut self.codec.stream);
        self.codec.really_has_alpha = self.has_alpha;
    }
}
