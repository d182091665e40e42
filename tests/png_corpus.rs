//! PNG decode corpus: streams assembled chunk by chunk, with stored-mode
//! zlib blocks so every byte of the pipeline is spelled out in the test.

use zenraster::*;

// ── Stream construction helpers ──────────────────────────────────────

fn crc32(parts: &[&[u8]]) -> u32 {
    let mut c = u32::MAX;
    for part in parts {
        for &byte in *part {
            c ^= u32::from(byte);
            for _ in 0..8 {
                c = if c & 1 != 0 {
                    0xEDB8_8320 ^ (c >> 1)
                } else {
                    c >> 1
                };
            }
        }
    }
    c ^ u32::MAX
}

fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

/// Wrap raw bytes in a zlib stream of stored (uncompressed) blocks.
fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];
    let mut chunks = data.chunks(0xFFFF).peekable();
    loop {
        let chunk = chunks.next().unwrap_or(&[]);
        let last = chunks.peek().is_none();
        out.push(u8::from(last));
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        out.extend_from_slice(&(!(chunk.len() as u16)).to_le_bytes());
        out.extend_from_slice(chunk);
        if last {
            break;
        }
    }
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

fn chunk(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = (payload.len() as u32).to_be_bytes().to_vec();
    v.extend_from_slice(ty);
    v.extend_from_slice(payload);
    v.extend_from_slice(&crc32(&[ty, payload]).to_be_bytes());
    v
}

fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
    let mut p = width.to_be_bytes().to_vec();
    p.extend_from_slice(&height.to_be_bytes());
    p.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);
    chunk(b"IHDR", &p)
}

const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn png(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut v = SIGNATURE.to_vec();
    for c in chunks {
        v.extend_from_slice(c);
    }
    v.extend_from_slice(&chunk(b"IEND", &[]));
    v
}

fn rgba(image: &DecodedImage, x: u32, y: u32) -> [u8; 4] {
    let off = y as usize * image.row_bytes + x as usize * 4;
    image.pixels[off..off + 4].try_into().unwrap()
}

// ── Truecolor ────────────────────────────────────────────────────────

#[test]
fn rgba_2x2_opaque_red() {
    let scanlines = [
        0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF, // row 0
        0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF, // row 1
    ];
    let data = png(&[
        ihdr(2, 2, 8, 6, 0),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);

    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    assert_eq!(info.dimensions(), (2, 2));
    assert_eq!(info.alpha_type(), AlphaType::Unpremul);

    let mut dst = vec![0u8; info.compute_byte_size(8)];
    codec
        .get_pixels(&info, &mut dst, 8, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    for px in dst.chunks_exact(4) {
        assert_eq!(px, [255, 0, 0, 255]);
    }
    // Every alpha sample was 0xFF, so the image has no meaningful alpha.
    assert!(!codec.really_has_alpha());
}

#[test]
fn rgb_rows_gain_an_opaque_filler_byte() {
    let scanlines = [0x00, 1, 2, 3];
    // A color-key tRNS on truecolor is skipped, not expanded.
    let data = png(&[
        ihdr(1, 1, 8, 2, 0),
        chunk(b"tRNS", &[0, 1, 0, 2, 0, 3]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(image.info.alpha_type(), AlphaType::Opaque);
    assert_eq!(rgba(&image, 0, 0), [1, 2, 3, 255]);
}

#[test]
fn unpremul_source_converts_to_premul() {
    let scanlines = [0x00, 0xFF, 0x00, 0x00, 0x80];
    let data = png(&[ihdr(1, 1, 8, 6, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);

    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_alpha_type(AlphaType::Premul);
    let mut dst = vec![0u8; 4];
    codec
        .get_pixels(&dst_info, &mut dst, 4, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(dst, [0x80, 0, 0, 0x80]);
    assert!(codec.really_has_alpha());
}

#[test]
fn sixteen_bit_channels_strip_to_the_high_byte() {
    let scanlines = [0x00, 0xAB, 0xCD, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC];
    let data = png(&[ihdr(1, 1, 16, 6, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [0xAB, 0x12, 0x56, 0x9A]);
}

#[test]
fn gray_alpha_expands_to_rgb_preserving_alpha() {
    let scanlines = [0x00, 7, 9];
    let data = png(&[ihdr(1, 1, 8, 4, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(image.info.alpha_type(), AlphaType::Unpremul);
    assert_eq!(rgba(&image, 0, 0), [7, 7, 7, 9]);
}

// ── Filters ──────────────────────────────────────────────────────────

#[test]
fn sub_and_up_filters_reconstruct_rows() {
    let scanlines = [
        0x01, 10, 20, 30, 5, 5, 5, // Sub: (10,20,30), (15,25,35)
        0x02, 1, 1, 1, 2, 2, 2, // Up: (11,21,31), (17,27,37)
    ];
    let data = png(&[ihdr(2, 2, 8, 2, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [10, 20, 30, 255]);
    assert_eq!(rgba(&image, 1, 0), [15, 25, 35, 255]);
    assert_eq!(rgba(&image, 0, 1), [11, 21, 31, 255]);
    assert_eq!(rgba(&image, 1, 1), [17, 27, 37, 255]);
}

#[test]
fn average_filter_uses_floor_of_the_mean() {
    let scanlines = [0x03, 100, 100];
    let data = png(&[ihdr(2, 1, 8, 0, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [100, 100, 100, 255]);
    assert_eq!(rgba(&image, 1, 0), [150, 150, 150, 255]);
}

#[test]
fn paeth_filter_uses_the_above_pixel_at_the_row_start() {
    let scanlines = [0x00, 100, 0x04, 10];
    let data = png(&[ihdr(1, 2, 8, 0, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [100, 100, 100, 255]);
    assert_eq!(rgba(&image, 0, 1), [110, 110, 110, 255]);
}

#[test]
fn unknown_filter_type_is_invalid() {
    let scanlines = [0x09, 1, 2, 3];
    let data = png(&[ihdr(1, 1, 8, 2, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    assert!(matches!(
        decode_png(&data, Unstoppable),
        Err(CodecError::InvalidInput(_))
    ));
}

// ── Grayscale ────────────────────────────────────────────────────────

#[test]
fn one_bit_gray_expands_to_full_range() {
    let scanlines = [0x00, 0b1000_0000];
    let data = png(&[ihdr(2, 1, 1, 0, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [255, 255, 255, 255]);
    assert_eq!(rgba(&image, 1, 0), [0, 0, 0, 255]);
}

#[test]
fn gray_decodes_to_alpha8() {
    let scanlines = [0x00, 0, 0x80, 0xFF];
    let data = png(&[ihdr(3, 1, 8, 0, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);

    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_color_type(ColorType::Alpha8);
    let mut dst = vec![0u8; 3];
    codec
        .get_pixels(&dst_info, &mut dst, 3, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(dst, [0, 0x80, 0xFF]);
}

#[test]
fn alpha8_is_refused_for_non_gray_sources() {
    let scanlines = [0x00, 1, 2, 3];
    let data = png(&[ihdr(1, 1, 8, 2, 0), chunk(b"IDAT", &zlib_stored(&scanlines))]);
    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_color_type(ColorType::Alpha8);
    let mut dst = vec![0u8; 1];
    assert!(matches!(
        codec.get_pixels(&dst_info, &mut dst, 1, &DecodeOptions::default(), &Unstoppable),
        Err(CodecError::InvalidConversion)
    ));
}

// ── Palette ──────────────────────────────────────────────────────────

#[test]
fn plte_with_trns_maps_alpha_per_index() {
    let scanlines = [
        0x00, 0x01, 0x00, // row 0: white, transparent
        0x00, 0x00, 0x01, // row 1: transparent, white
    ];
    let data = png(&[
        ihdr(2, 2, 8, 3, 0),
        chunk(b"PLTE", &[0, 0, 0, 255, 255, 255]),
        chunk(b"tRNS", &[0x00]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);

    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    assert_eq!(info.alpha_type(), AlphaType::Unpremul);
    let mut dst = vec![0u8; info.compute_byte_size(8)];
    codec
        .get_pixels(&info, &mut dst, 8, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(&dst[0..4], &[255, 255, 255, 255]);
    assert_eq!(&dst[4..8], &[0, 0, 0, 0]);
    assert_eq!(&dst[8..12], &[0, 0, 0, 0]);
    assert_eq!(&dst[12..16], &[255, 255, 255, 255]);
    assert!(codec.really_has_alpha());
}

#[test]
fn palette_without_trns_is_opaque() {
    let scanlines = [0x00, 0x00];
    let data = png(&[
        ihdr(1, 1, 8, 3, 0),
        chunk(b"PLTE", &[9, 8, 7]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(image.info.alpha_type(), AlphaType::Opaque);
    assert_eq!(rgba(&image, 0, 0), [9, 8, 7, 255]);
}

#[test]
fn trns_shorter_than_the_palette_leaves_the_tail_opaque() {
    let scanlines = [0x00, 0x00, 0x01];
    let data = png(&[
        ihdr(2, 1, 8, 3, 0),
        chunk(b"PLTE", &[10, 10, 10, 20, 20, 20]),
        chunk(b"tRNS", &[0x80]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [10, 10, 10, 0x80]);
    assert_eq!(rgba(&image, 1, 0), [20, 20, 20, 0xFF]);
}

#[test]
fn index_equal_to_palette_count_uses_the_grown_slot() {
    // Buggy-image workaround: index 2 with a 2-entry palette resolves to a
    // duplicate of the last color.
    let scanlines = [0x00, 0x02];
    let data = png(&[
        ihdr(1, 1, 8, 3, 0),
        chunk(b"PLTE", &[0, 0, 0, 200, 100, 50]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [200, 100, 50, 255]);
}

#[test]
fn premul_destination_premultiplies_palette_entries() {
    let scanlines = [0x00, 0x00];
    let data = png(&[
        ihdr(1, 1, 8, 3, 0),
        chunk(b"PLTE", &[255, 255, 255]),
        chunk(b"tRNS", &[0x80]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_alpha_type(AlphaType::Premul);
    let mut dst = vec![0u8; 4];
    codec
        .get_pixels(&dst_info, &mut dst, 4, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(dst, [0x80, 0x80, 0x80, 0x80]);
}

#[test]
fn two_bit_palette_indices_unpack_without_scaling() {
    // Width 3 at 2 bpp: indices 1, 2, 0 in one byte.
    let scanlines = [0x00, 0b01_10_00_00];
    let data = png(&[
        ihdr(3, 1, 2, 3, 0),
        chunk(b"PLTE", &[1, 1, 1, 2, 2, 2, 3, 3, 3]),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [2, 2, 2, 255]);
    assert_eq!(rgba(&image, 1, 0), [3, 3, 3, 255]);
    assert_eq!(rgba(&image, 2, 0), [1, 1, 1, 255]);
}

// ── Interlacing ──────────────────────────────────────────────────────

#[test]
fn adam7_2x2_assembles_all_passes() {
    // Passes with content for 2x2: pass 1 -> (0,0), pass 6 -> (1,0),
    // pass 7 -> row 1. One filter byte per reduced row.
    let scanlines = [
        0x00, 0xFF, 0x00, 0x00, 0xFF, // pass 1: red
        0x00, 0x00, 0xFF, 0x00, 0xFF, // pass 6: green
        0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // pass 7: blue, white
    ];
    let data = png(&[
        ihdr(2, 2, 8, 6, 1),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    assert_eq!(rgba(&image, 0, 0), [255, 0, 0, 255]);
    assert_eq!(rgba(&image, 1, 0), [0, 255, 0, 255]);
    assert_eq!(rgba(&image, 0, 1), [0, 0, 255, 255]);
    assert_eq!(rgba(&image, 1, 1), [255, 255, 255, 255]);
}

#[test]
fn interlaced_refuses_scanline_decoding() {
    let scanlines = [0x00, 0xFF, 0x00, 0x00, 0xFF];
    let data = png(&[
        ihdr(1, 1, 8, 6, 1),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);
    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    assert!(matches!(
        codec.scanline_decoder(&info),
        Err(CodecError::Unimplemented(_))
    ));
}

// ── IDAT framing ─────────────────────────────────────────────────────

#[test]
fn idat_split_across_chunks_decodes() {
    let scanlines = [
        0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF, //
        0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF,
    ];
    let zlib = zlib_stored(&scanlines);
    let (first, second) = zlib.split_at(7);
    let data = png(&[
        ihdr(2, 2, 8, 6, 0),
        chunk(b"IDAT", first),
        chunk(b"IDAT", second),
    ]);
    let image = decode_png(&data, Unstoppable).unwrap();
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(rgba(&image, x, y), [255, 0, 0, 255]);
        }
    }
}

#[test]
fn truncated_idat_reports_incomplete_input() {
    let scanlines = [
        0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF, //
        0x00, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF,
    ];
    let zlib = zlib_stored(&scanlines);
    let data = png(&[
        ihdr(2, 2, 8, 6, 0),
        chunk(b"IDAT", &zlib[..6]),
    ]);
    assert!(matches!(
        decode_png(&data, Unstoppable),
        Err(CodecError::IncompleteInput)
    ));
}

// ── Header validation ────────────────────────────────────────────────

#[test]
fn bad_signature_is_unrecognized() {
    let mut data = png(&[ihdr(1, 1, 8, 2, 0), chunk(b"IDAT", &zlib_stored(&[0, 1, 2, 3]))]);
    data[1] = b'Q';
    assert!(matches!(
        decode_png(&data, Unstoppable),
        Err(CodecError::UnrecognizedFormat)
    ));
}

#[test]
fn zero_dimensions_are_invalid() {
    let data = png(&[ihdr(0, 1, 8, 2, 0), chunk(b"IDAT", &zlib_stored(&[]))]);
    assert!(matches!(
        decode_png(&data, Unstoppable),
        Err(CodecError::InvalidInput(_))
    ));
}

#[test]
fn dimension_product_guard_rejects_huge_images() {
    let data = png(&[ihdr(32768, 32768, 8, 2, 0), chunk(b"IDAT", &[])]);
    assert!(matches!(
        decode_png(&data, Unstoppable),
        Err(CodecError::DimensionsTooLarge { .. })
    ));
}

#[test]
fn illegal_depth_for_color_type_is_invalid() {
    let data = png(&[ihdr(1, 1, 4, 6, 0), chunk(b"IDAT", &zlib_stored(&[]))]);
    assert!(matches!(
        decode_png(&data, Unstoppable),
        Err(CodecError::InvalidInput(_))
    ));
}

// ── Scanline decoder ─────────────────────────────────────────────────

#[test]
fn scanline_decoder_reads_and_skips_rows() {
    let scanlines = [
        0x00, 10, 10, 10, 0xFF, // row 0
        0x00, 20, 20, 20, 0xFF, // row 1
        0x00, 30, 30, 30, 0x80, // row 2
    ];
    let data = png(&[
        ihdr(1, 3, 8, 6, 0),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);

    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    let mut decoder = codec.scanline_decoder(&info).unwrap();

    let mut row = vec![0u8; 4];
    decoder.get_scanlines(&mut row, 1, 4, &Unstoppable).unwrap();
    assert_eq!(row, [10, 10, 10, 0xFF]);
    assert!(!decoder.really_has_alpha());

    decoder.skip_scanlines(1, &Unstoppable).unwrap();

    decoder.get_scanlines(&mut row, 1, 4, &Unstoppable).unwrap();
    assert_eq!(row, [30, 30, 30, 0x80]);
    assert!(decoder.really_has_alpha());

    decoder.finish();
    assert!(codec.really_has_alpha());
}

#[test]
fn scanline_decoder_rejects_a_stride_smaller_than_a_row() {
    let scanlines = [
        0x00, 1, 2, 3, 0xFF, //
        0x00, 4, 5, 6, 0xFF,
    ];
    let data = png(&[
        ihdr(1, 2, 8, 6, 0),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);

    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    let mut decoder = codec.scanline_decoder(&info).unwrap();
    // Two rows at stride 2 would overlap inside this 6-byte buffer; the
    // call must fail cleanly instead of clobbering row 0.
    let mut dst = vec![0u8; 6];
    assert!(matches!(
        decoder.get_scanlines(&mut dst, 2, 2, &Unstoppable),
        Err(CodecError::InvalidInput(_))
    ));
    assert_eq!(dst, [0; 6]);
}

#[test]
fn scanline_decoder_honors_the_destination_stride() {
    let scanlines = [
        0x00, 1, 2, 3, 0xFF, //
        0x00, 4, 5, 6, 0xFF,
    ];
    let data = png(&[
        ihdr(1, 2, 8, 6, 0),
        chunk(b"IDAT", &zlib_stored(&scanlines)),
    ]);

    let mut codec = PngCodec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    let mut decoder = codec.scanline_decoder(&info).unwrap();
    let mut dst = vec![0u8; 12 + 4];
    decoder.get_scanlines(&mut dst, 2, 12, &Unstoppable).unwrap();
    assert_eq!(&dst[0..4], &[1, 2, 3, 0xFF]);
    assert_eq!(&dst[4..12], &[0; 8]);
    assert_eq!(&dst[12..16], &[4, 5, 6, 0xFF]);
}
