//! PNG plumbing under the codec: chunk framing, the streaming inflate of
//! the IDAT sequence, per-row unfiltering, Adam7 geometry, and the sample
//! transforms that normalize every color type to one of the swizzler's
//! source configs.

use alloc::vec;
use alloc::vec::Vec;

use miniz_oxide::inflate::stream::{inflate, InflateState};
use miniz_oxide::{DataFormat, MZError, MZFlush, MZStatus};

use crate::error::CodecError;
use crate::stream::Stream;
use crate::swizzler::SrcConfig;

pub(crate) const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub(crate) const COLOR_GRAY: u8 = 0;
pub(crate) const COLOR_RGB: u8 = 2;
pub(crate) const COLOR_PALETTE: u8 = 3;
pub(crate) const COLOR_GRAY_ALPHA: u8 = 4;
pub(crate) const COLOR_RGBA: u8 = 6;

fn invalid(msg: &str) -> CodecError {
    CodecError::InvalidInput(msg.into())
}

/// Samples per pixel on the wire for a PNG color type.
pub(crate) fn samples_per_pixel(color_type: u8) -> usize {
    match color_type {
        COLOR_GRAY | COLOR_PALETTE => 1,
        COLOR_GRAY_ALPHA => 2,
        COLOR_RGB => 3,
        _ => 4,
    }
}

/// Filtered scanline length (without the filter byte) for `width` pixels.
pub(crate) fn raw_row_bytes(width: u32, bit_depth: u8, color_type: u8) -> usize {
    (width as usize * samples_per_pixel(color_type) * usize::from(bit_depth)).div_ceil(8)
}

/// Byte distance between corresponding bytes of horizontally adjacent
/// pixels, as used by the Sub/Average/Paeth filters.
pub(crate) fn filter_bpp(bit_depth: u8, color_type: u8) -> usize {
    (samples_per_pixel(color_type) * usize::from(bit_depth)).div_ceil(8)
}

// ── Header chunk walk ───────────────────────────────────────────────

/// Everything gathered before the first IDAT chunk.
pub(crate) struct PngHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub interlaced: bool,
    pub palette: Vec<[u8; 3]>,
    /// tRNS alpha bytes (palette images only).
    pub trans: Vec<u8>,
    /// Data length of the first IDAT chunk; the stream is left positioned
    /// at the start of its data.
    pub first_idat_len: usize,
}

fn read_chunk_header<S: Stream>(stream: &mut S) -> Result<(usize, [u8; 4]), CodecError> {
    let mut hdr = [0u8; 8];
    if stream.read_fully(&mut hdr) != hdr.len() {
        return Err(invalid("PNG ended inside a chunk header"));
    }
    let len = u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
    if len > i32::MAX as u32 {
        return Err(invalid("PNG chunk length out of range"));
    }
    Ok((len as usize, [hdr[4], hdr[5], hdr[6], hdr[7]]))
}

fn skip_or_eof<S: Stream>(stream: &mut S, n: usize) -> Result<(), CodecError> {
    if stream.skip(n) != n {
        return Err(invalid("PNG ended inside a chunk"));
    }
    Ok(())
}

/// Validate the signature and walk chunks up to the first IDAT,
/// collecting IHDR, PLTE, and tRNS. Chunk CRCs are skipped, not checked.
pub(crate) fn parse_chunks<S: Stream>(stream: &mut S) -> Result<PngHeader, CodecError> {
    let mut sig = [0u8; 8];
    if stream.read_fully(&mut sig) != sig.len() || sig != SIGNATURE {
        return Err(CodecError::UnrecognizedFormat);
    }

    let (len, ty) = read_chunk_header(stream)?;
    if ty != *b"IHDR" || len != 13 {
        return Err(invalid("PNG does not start with a valid IHDR chunk"));
    }
    let mut ihdr = [0u8; 13];
    if stream.read_fully(&mut ihdr) != ihdr.len() {
        return Err(invalid("PNG ended inside IHDR"));
    }
    skip_or_eof(stream, 4)?;

    let width = u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]);
    let height = u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]);
    let bit_depth = ihdr[8];
    let color_type = ihdr[9];
    if ihdr[10] != 0 {
        return Err(invalid("unknown PNG compression method"));
    }
    if ihdr[11] != 0 {
        return Err(invalid("unknown PNG filter method"));
    }
    let interlaced = match ihdr[12] {
        0 => false,
        1 => true,
        _ => return Err(invalid("unknown PNG interlace method")),
    };

    let depth_ok = match color_type {
        COLOR_GRAY => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
        COLOR_PALETTE => matches!(bit_depth, 1 | 2 | 4 | 8),
        COLOR_RGB | COLOR_GRAY_ALPHA | COLOR_RGBA => matches!(bit_depth, 8 | 16),
        _ => return Err(invalid("unknown PNG color type")),
    };
    if !depth_ok {
        return Err(invalid("illegal PNG bit depth for this color type"));
    }

    let mut palette = Vec::new();
    let mut trans = Vec::new();
    loop {
        let (len, ty) = read_chunk_header(stream)?;
        match &ty {
            b"IDAT" => {
                return Ok(PngHeader {
                    width,
                    height,
                    bit_depth,
                    color_type,
                    interlaced,
                    palette,
                    trans,
                    first_idat_len: len,
                });
            }
            b"PLTE" => {
                if len % 3 != 0 || len > 256 * 3 {
                    return Err(invalid("PLTE length is not a legal palette size"));
                }
                let mut buf = vec![0u8; len];
                if stream.read_fully(&mut buf) != len {
                    return Err(invalid("PNG ended inside PLTE"));
                }
                palette = buf.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
                skip_or_eof(stream, 4)?;
            }
            b"tRNS" if color_type == COLOR_PALETTE => {
                if len > 256 {
                    return Err(invalid("tRNS longer than the palette"));
                }
                trans = vec![0u8; len];
                if stream.read_fully(&mut trans) != len {
                    return Err(invalid("PNG ended inside tRNS"));
                }
                skip_or_eof(stream, 4)?;
            }
            b"IEND" => return Err(invalid("PNG contains no image data")),
            _ => skip_or_eof(stream, len + 4)?,
        }
    }
}

// ── Adam7 geometry ──────────────────────────────────────────────────

/// Per-pass `(x0, dx, y0, dy)` of the Adam7 pattern, passes 1..=7.
const ADAM7: [(u32, u32, u32, u32); 7] = [
    (0, 8, 0, 8),
    (4, 8, 0, 8),
    (0, 4, 4, 8),
    (2, 4, 0, 4),
    (0, 2, 2, 4),
    (1, 2, 0, 2),
    (0, 1, 1, 2),
];

/// Dimensions of reduced image `pass` (1-based); either may be zero.
pub(crate) fn pass_dimensions(pass: usize, width: u32, height: u32) -> (u32, u32) {
    let (x0, dx, y0, dy) = ADAM7[pass - 1];
    let w = (width + dx - 1 - x0) / dx;
    let h = (height + dy - 1 - y0) / dy;
    (w, h)
}

/// Full-image position of sample `i` in row `r` of reduced image `pass`.
pub(crate) fn pass_position(pass: usize, i: u32, r: u32) -> (u32, u32) {
    let (x0, dx, y0, dy) = ADAM7[pass - 1];
    (x0 + i * dx, y0 + r * dy)
}

// ── Unfiltering ─────────────────────────────────────────────────────

fn paeth_predict(a: u8, b: u8, c: u8) -> u8 {
    let (a_, b_, c_) = (i32::from(a), i32::from(b), i32::from(c));
    let p = a_ + b_ - c_;
    let pa = (p - a_).abs();
    let pb = (p - b_).abs();
    let pc = (p - c_).abs();
    // The order of these comparisons is fixed by the PNG spec.
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn unfilter(filter: u8, row: &mut [u8], prev: &[u8], bpp: usize) -> Result<(), CodecError> {
    match filter {
        0 => {}
        1 => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        2 => {
            for i in 0..row.len() {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        3 => {
            for i in 0..bpp.min(row.len()) {
                row[i] = row[i].wrapping_add(prev[i] / 2);
            }
            for i in bpp..row.len() {
                let sum = u16::from(row[i - bpp]) + u16::from(prev[i]);
                row[i] = row[i].wrapping_add((sum / 2) as u8);
            }
        }
        4 => {
            for i in 0..bpp.min(row.len()) {
                row[i] = row[i].wrapping_add(paeth_predict(0, prev[i], 0));
            }
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(paeth_predict(row[i - bpp], prev[i], prev[i - bpp]));
            }
        }
        _ => return Err(invalid("invalid PNG filter type")),
    }
    Ok(())
}

// ── Pull-row inflate engine ─────────────────────────────────────────

const IN_BUF_BYTES: usize = 8 * 1024;

/// Pulls unfiltered raw scanlines out of the IDAT sequence, one at a time.
pub(crate) struct RowEngine {
    state: Box<InflateState>,
    in_buf: Vec<u8>,
    in_start: usize,
    in_end: usize,
    idat_remaining: usize,
    idat_done: bool,
    stream_end: bool,
    bpp: usize,
    raw_row_bytes: usize,
    filt: Vec<u8>,
    prev: Vec<u8>,
}

impl RowEngine {
    pub fn new(first_idat_len: usize, bit_depth: u8, color_type: u8) -> Self {
        Self {
            state: InflateState::new_boxed(DataFormat::Zlib),
            in_buf: vec![0u8; IN_BUF_BYTES],
            in_start: 0,
            in_end: 0,
            idat_remaining: first_idat_len,
            idat_done: false,
            stream_end: false,
            bpp: filter_bpp(bit_depth, color_type),
            raw_row_bytes: 0,
            filt: Vec::new(),
            prev: Vec::new(),
        }
    }

    /// Begin a (reduced) image of rows that are `raw_row_bytes` long. The
    /// filter history resets: the first row of each pass has an implied
    /// all-zero predecessor.
    pub fn start_pass(&mut self, raw_row_bytes: usize) {
        self.raw_row_bytes = raw_row_bytes;
        self.filt.clear();
        self.filt.resize(1 + raw_row_bytes, 0);
        self.prev.clear();
        self.prev.resize(raw_row_bytes, 0);
    }

    /// Top up the input buffer from the IDAT sequence, crossing chunk
    /// boundaries as needed. Silently stops at the end of the sequence.
    fn fill_input<S: Stream>(&mut self, stream: &mut S) {
        if self.idat_remaining == 0 {
            // CRC of the chunk just finished, then the next header; the
            // IDAT sequence ends at the first non-IDAT chunk.
            loop {
                if stream.skip(4) != 4 {
                    self.idat_done = true;
                    return;
                }
                match read_chunk_header(stream) {
                    Ok((len, ty)) if ty == *b"IDAT" => {
                        self.idat_remaining = len;
                        if len > 0 {
                            break;
                        }
                    }
                    _ => {
                        self.idat_done = true;
                        return;
                    }
                }
            }
        }
        let want = self.in_buf.len().min(self.idat_remaining);
        let got = stream.read(&mut self.in_buf[..want]);
        if got == 0 {
            self.idat_done = true;
            return;
        }
        self.in_start = 0;
        self.in_end = got;
        self.idat_remaining -= got;
    }

    /// Inflate and unfilter the next scanline of the current pass.
    pub fn next_row<S: Stream>(&mut self, stream: &mut S) -> Result<&[u8], CodecError> {
        let need = self.filt.len();
        let mut out_pos = 0;

        while out_pos < need {
            if self.stream_end {
                return Err(CodecError::IncompleteInput);
            }
            if self.in_start == self.in_end {
                if self.idat_done {
                    return Err(CodecError::IncompleteInput);
                }
                self.fill_input(stream);
            }

            let res = inflate(
                &mut self.state,
                &self.in_buf[self.in_start..self.in_end],
                &mut self.filt[out_pos..],
                MZFlush::None,
            );
            self.in_start += res.bytes_consumed;
            out_pos += res.bytes_written;

            match res.status {
                Ok(MZStatus::Ok) => {}
                Ok(MZStatus::StreamEnd) => {
                    self.stream_end = true;
                    if out_pos < need {
                        return Err(CodecError::IncompleteInput);
                    }
                }
                // Buf means "give me more input"; the next iteration
                // refills (or reports truncation).
                Err(MZError::Buf) => {}
                _ => return Err(invalid("corrupt PNG image data")),
            }
        }

        let filter = self.filt[0];
        unfilter(filter, &mut self.filt[1..], &self.prev, self.bpp)?;
        self.prev.copy_from_slice(&self.filt[1..]);
        Ok(&self.prev)
    }

    /// Consume whatever remains of the IDAT sequence and the trailing
    /// chunks through IEND. Called after the last row; failures here are
    /// ignored because success has already been determined.
    pub fn finish<S: Stream>(&mut self, stream: &mut S) {
        stream.skip(self.idat_remaining);
        self.idat_remaining = 0;
        loop {
            if stream.skip(4) != 4 {
                return;
            }
            match read_chunk_header(stream) {
                Ok((_, ty)) if ty == *b"IEND" => return,
                Ok((len, _)) => {
                    if stream.skip(len) != len {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }
}

// ── Sample transforms ───────────────────────────────────────────────

/// Scale factors that replicate a 1/2/4-bit sample across 8 bits.
fn gray_scale(bit_depth: u8) -> u8 {
    match bit_depth {
        1 => 0xFF,
        2 => 0x55,
        _ => 0x11,
    }
}

/// Unpack sub-byte samples to one byte each, scaling when `scale` is set
/// (grayscale) and leaving raw indices otherwise (palette).
fn unpack_bits(bit_depth: u8, scale: bool, input: &[u8], out: &mut [u8]) {
    let bits = usize::from(bit_depth);
    let per_byte = 8 / bits;
    let mask = (1u8 << bits) - 1;
    let factor = if scale { gray_scale(bit_depth) } else { 1 };
    for (x, out_val) in out.iter_mut().enumerate() {
        let byte = input[x / per_byte];
        let shift = 8 - bits - (x % per_byte) * bits;
        *out_val = ((byte >> shift) & mask).wrapping_mul(factor);
    }
}

/// Normalize one raw scanline of `width` pixels into `src_config` samples:
/// 16-bit channels strip to their high byte, sub-byte samples unpack to
/// whole bytes, grayscale expands to RGB, and RGB gains an opaque filler
/// byte, exactly as installed by the header parse.
pub(crate) fn expand_row(
    raw: &[u8],
    out: &mut [u8],
    width: usize,
    bit_depth: u8,
    color_type: u8,
    src_config: SrcConfig,
) {
    match (color_type, src_config) {
        (COLOR_PALETTE, SrcConfig::Index8) => {
            if bit_depth < 8 {
                unpack_bits(bit_depth, false, raw, &mut out[..width]);
            } else {
                out[..width].copy_from_slice(&raw[..width]);
            }
        }
        (COLOR_GRAY, SrcConfig::Gray8) => {
            expand_gray(raw, &mut out[..width], width, bit_depth);
        }
        (COLOR_GRAY, _) => {
            // Gray converted to RGB plus opaque filler.
            let mut gray = vec![0u8; width];
            expand_gray(raw, &mut gray, width, bit_depth);
            for (g, px) in gray.iter().zip(out.chunks_exact_mut(4)) {
                px.copy_from_slice(&[*g, *g, *g, 0xFF]);
            }
        }
        (COLOR_GRAY_ALPHA, _) => {
            let step = if bit_depth == 16 { 4 } else { 2 };
            for (src, px) in raw.chunks_exact(step).zip(out.chunks_exact_mut(4)) {
                let (g, a) = if bit_depth == 16 {
                    (src[0], src[2])
                } else {
                    (src[0], src[1])
                };
                px.copy_from_slice(&[g, g, g, a]);
            }
        }
        (COLOR_RGB, _) => {
            let step = if bit_depth == 16 { 6 } else { 3 };
            for (src, px) in raw.chunks_exact(step).zip(out.chunks_exact_mut(4)) {
                let (r, g, b) = if bit_depth == 16 {
                    (src[0], src[2], src[4])
                } else {
                    (src[0], src[1], src[2])
                };
                px.copy_from_slice(&[r, g, b, 0xFF]);
            }
        }
        _ => {
            // RGBA, possibly 16-bit.
            let step = if bit_depth == 16 { 8 } else { 4 };
            for (src, px) in raw.chunks_exact(step).zip(out.chunks_exact_mut(4)) {
                if bit_depth == 16 {
                    px.copy_from_slice(&[src[0], src[2], src[4], src[6]]);
                } else {
                    px.copy_from_slice(src);
                }
            }
        }
    }
}

fn expand_gray(raw: &[u8], out: &mut [u8], width: usize, bit_depth: u8) {
    match bit_depth {
        16 => {
            for (x, out_val) in out.iter_mut().enumerate() {
                *out_val = raw[x * 2];
            }
        }
        8 => out.copy_from_slice(&raw[..width]),
        _ => unpack_bits(bit_depth, true, raw, out),
    }
}
