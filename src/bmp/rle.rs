//! RLE4/RLE8/RLE24 BMP pixel engine.
//!
//! The opcode stream is buffered up front (its length comes from the file
//! header's total size minus the pixel data offset). Decoding walks a
//! cursor over byte pairs: an escape prefix selects end-of-line,
//! end-of-file, a cursor delta, or an absolute pixel run; any other prefix
//! is a repeat count. Pixels never written by the stream keep the
//! pre-cleared transparent-black value.

use alloc::vec::Vec;

use enough::Stop;

use crate::color_table::ColorTable;
use crate::error::CodecError;
use crate::info::{ColorType, DecodeOptions, ImageInfo};
use crate::stream::Stream;
use crate::swizzler::write_pixel;

use super::{BmpCodec, RowOrder};

const ESCAPE: u8 = 0;
const EOL: u8 = 0;
const EOF: u8 = 1;
const DELTA: u8 = 2;

/// Read up to `limit` bytes without trusting the header enough to allocate
/// it all at once.
fn read_up_to<S: Stream>(stream: &mut S, limit: usize) -> Vec<u8> {
    const CHUNK: usize = 1 << 16;
    let mut buf = Vec::new();
    while buf.len() < limit {
        let want = CHUNK.min(limit - buf.len());
        let start = buf.len();
        buf.resize(start + want, 0);
        let got = stream.read_fully(&mut buf[start..]);
        buf.truncate(start + got);
        if got < want {
            break;
        }
    }
    buf
}

/// Destination addressing and packing for the RLE opcodes.
///
/// The cursor only moves forward, so no pixel is written twice and
/// `written` doubles as the coverage count.
struct RleSink<'a> {
    table: Option<&'a ColorTable>,
    color: ColorType,
    width: usize,
    height: usize,
    row_bytes: usize,
    row_order: RowOrder,
    written: usize,
    translucent: bool,
}

impl RleSink<'_> {
    fn dst_row(&self, y: usize) -> usize {
        match self.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => self.height - 1 - y,
        }
    }

    /// Set pixel `(x, y)` from a color table index.
    fn set_index_pixel(&mut self, dst: &mut [u8], x: usize, y: usize, index: u8) {
        let [r, g, b, a] = self.table.as_ref().map_or([0, 0, 0, 0xFF], |t| {
            t.get(usize::from(index))
        });
        let bpp = self.color.bytes_per_pixel();
        let offset = self.dst_row(y) * self.row_bytes + x * bpp;
        write_pixel(&mut dst[offset..offset + bpp], self.color, r, g, b, a);
        self.written += 1;
        self.translucent |= a != 0xFF;
    }

    /// Set pixel `(x, y)` from literal RLE24 color bytes (always opaque).
    fn set_rgb_pixel(&mut self, dst: &mut [u8], x: usize, y: usize, r: u8, g: u8, b: u8) {
        let bpp = self.color.bytes_per_pixel();
        let offset = self.dst_row(y) * self.row_bytes + x * bpp;
        write_pixel(&mut dst[offset..offset + bpp], self.color, r, g, b, 0xFF);
        self.written += 1;
    }
}

pub(super) fn decode<S: Stream>(
    codec: &mut BmpCodec<S>,
    dst_info: &ImageInfo,
    dst: &mut [u8],
    dst_row_bytes: usize,
    options: &DecodeOptions,
    stop: &dyn Stop,
) -> Result<(), CodecError> {
    let width = dst_info.width() as usize;
    let height = dst_info.height() as usize;
    let bits_per_pixel = usize::from(codec.bits_per_pixel);

    let buf = read_up_to(&mut codec.stream, codec.rle_bytes);
    if buf.is_empty() {
        return Err(CodecError::InvalidInput(
            "could not read any RLE pixel data".into(),
        ));
    }
    let mut sink = RleSink {
        table: codec.color_table.as_ref(),
        color: dst_info.color_type(),
        width,
        height,
        row_bytes: dst_row_bytes,
        row_order: codec.row_order,
        written: 0,
        translucent: false,
    };

    // Pixels the opcode stream skips must read back as transparent black
    // (or plain black for an opaque 565 destination).
    if !options.zero_initialized {
        let min_row = dst_info.min_row_bytes();
        for y in 0..height {
            dst[y * dst_row_bytes..y * dst_row_bytes + min_row].fill(0);
        }
    }

    let result = run_opcodes(&buf, &mut sink, dst, bits_per_pixel, stop);

    // Skipped pixels stay transparent black, so an incompletely covered
    // image has meaningful alpha; 565 has no alpha byte to report.
    if dst_info.color_type() != ColorType::Rgb565 {
        codec.really_has_alpha |= sink.translucent || sink.written < width * height;
    }
    result
}

fn run_opcodes(
    buf: &[u8],
    sink: &mut RleSink<'_>,
    dst: &mut [u8],
    bits_per_pixel: usize,
    stop: &dyn Stop,
) -> Result<(), CodecError> {
    let total = buf.len();
    let width = sink.width;
    let height = sink.height;

    let mut curr = 0usize;
    let mut x = 0usize;
    let mut y = 0usize;
    let mut ops = 0u32;

    loop {
        ops += 1;
        if ops % 1024 == 0 {
            stop.check()?;
        }

        // Every opcode takes at least two bytes.
        if total - curr < 2 {
            return Err(CodecError::IncompleteInput);
        }
        let flag = buf[curr];
        let task = buf[curr + 1];
        curr += 2;

        // Past the bottom of the image only an EOF opcode is legal.
        if y >= height && !(flag == ESCAPE && task == EOF) {
            return Err(CodecError::IncompleteInput);
        }

        if flag == ESCAPE {
            match task {
                EOL => {
                    x = 0;
                    y += 1;
                }
                EOF => return Ok(()),
                DELTA => {
                    if total - curr < 2 {
                        return Err(CodecError::IncompleteInput);
                    }
                    let dx = usize::from(buf[curr]);
                    let dy = usize::from(buf[curr + 1]);
                    curr += 2;
                    x += dx;
                    y += dy;
                    // Landing exactly on the far edge is legal; past it is
                    // not.
                    if x > width || y > height {
                        return Err(CodecError::IncompleteInput);
                    }
                }
                num_pixels => {
                    // Absolute run: `num_pixels` literal pixels, padded to
                    // a 16-bit boundary.
                    let mut remaining = usize::from(num_pixels);
                    let run_bytes = (remaining * bits_per_pixel).div_ceil(8);
                    if x + remaining > width || total - curr < ((run_bytes + 1) & !1) {
                        return Err(CodecError::IncompleteInput);
                    }
                    match bits_per_pixel {
                        4 => {
                            while remaining > 0 {
                                let val = buf[curr];
                                curr += 1;
                                sink.set_index_pixel(dst, x, y, val >> 4);
                                x += 1;
                                remaining -= 1;
                                if remaining > 0 {
                                    sink.set_index_pixel(dst, x, y, val & 0xF);
                                    x += 1;
                                    remaining -= 1;
                                }
                            }
                        }
                        8 => {
                            while remaining > 0 {
                                sink.set_index_pixel(dst, x, y, buf[curr]);
                                curr += 1;
                                x += 1;
                                remaining -= 1;
                            }
                        }
                        24 => {
                            while remaining > 0 {
                                let (b, g, r) = (buf[curr], buf[curr + 1], buf[curr + 2]);
                                curr += 3;
                                sink.set_rgb_pixel(dst, x, y, r, g, b);
                                x += 1;
                                remaining -= 1;
                            }
                        }
                        _ => {
                            return Err(CodecError::InvalidInput(alloc::format!(
                                "no RLE variant for {bits_per_pixel} bpp"
                            )));
                        }
                    }
                    // Keep the opcode stream 16-bit aligned.
                    if run_bytes % 2 != 0 {
                        curr += 1;
                    }
                }
            }
        } else {
            // A run: `flag` copies of one pixel, clipped to the row edge.
            let end_x = width.min(x + usize::from(flag));

            if bits_per_pixel == 24 {
                // The second opcode byte is the blue channel; two more
                // bytes complete the color.
                if total - curr < 2 {
                    return Err(CodecError::IncompleteInput);
                }
                let b = task;
                let g = buf[curr];
                let r = buf[curr + 1];
                curr += 2;
                while x < end_x {
                    sink.set_rgb_pixel(dst, x, y, r, g, b);
                    x += 1;
                }
            } else {
                // RLE8 repeats one index; RLE4 alternates the high and low
                // nibble, starting high.
                let indices = if bits_per_pixel == 4 {
                    [task >> 4, task & 0xF]
                } else {
                    [task, task]
                };
                let mut which = 0;
                while x < end_x {
                    sink.set_index_pixel(dst, x, y, indices[which]);
                    which ^= 1;
                    x += 1;
                }
            }
        }
    }
}
