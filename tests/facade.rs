//! Facade-level behavior: format dispatch, decode preconditions, rewind
//! for repeated decodes, strides, and resource limits.

use zenraster::*;

/// Smallest useful BMP: 1x1, 24-bit, one green pixel.
fn tiny_bmp() -> Vec<u8> {
    let mut v = b"BM".to_vec();
    v.extend_from_slice(&58u32.to_le_bytes());
    v.extend_from_slice(&[0; 4]);
    v.extend_from_slice(&54u32.to_le_bytes());
    v.extend_from_slice(&40u32.to_le_bytes());
    v.extend_from_slice(&1i32.to_le_bytes());
    v.extend_from_slice(&1i32.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&24u16.to_le_bytes());
    v.extend_from_slice(&[0; 24]);
    v.extend_from_slice(&[0x00, 0xFF, 0x00, 0x00]); // BGR green + pad
    v
}

#[test]
fn dispatch_selects_the_right_codec() {
    let bmp = tiny_bmp();
    assert!(matches!(
        Codec::from_stream(MemStream::new(&bmp)).unwrap(),
        Codec::Bmp(_)
    ));
    assert!(matches!(
        Codec::from_stream(MemStream::new(b"GIF89a...")),
        Err(CodecError::UnrecognizedFormat)
    ));
    assert!(matches!(
        Codec::from_stream(MemStream::new(&[])),
        Err(CodecError::UnrecognizedFormat)
    ));
}

#[test]
fn dimension_mismatch_is_an_invalid_scale() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let wrong = ImageInfo::new(2, 2, ColorType::Rgba8888, AlphaType::Opaque);
    let mut dst = vec![0u8; 16];
    assert!(matches!(
        codec.get_pixels(&wrong, &mut dst, 8, &DecodeOptions::default(), &Unstoppable),
        Err(CodecError::InvalidScale)
    ));
}

#[test]
fn profile_mismatch_is_an_invalid_conversion() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_profile_id(7);
    let mut dst = vec![0u8; 4];
    assert!(matches!(
        codec.get_pixels(&dst_info, &mut dst, 4, &DecodeOptions::default(), &Unstoppable),
        Err(CodecError::InvalidConversion)
    ));
}

#[test]
fn opaque_source_cannot_claim_alpha() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_alpha_type(AlphaType::Unpremul);
    let mut dst = vec![0u8; 4];
    assert!(matches!(
        codec.get_pixels(&dst_info, &mut dst, 4, &DecodeOptions::default(), &Unstoppable),
        Err(CodecError::InvalidConversion)
    ));
}

#[test]
fn undersized_destination_is_reported() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    let mut dst = vec![0u8; 3];
    assert!(matches!(
        codec.get_pixels(&info, &mut dst, 4, &DecodeOptions::default(), &Unstoppable),
        Err(CodecError::BufferTooSmall { needed: 4, .. })
    ));
}

#[test]
fn stride_smaller_than_a_row_is_invalid() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    let mut dst = vec![0u8; 16];
    assert!(matches!(
        codec.get_pixels(&info, &mut dst, 2, &DecodeOptions::default(), &Unstoppable),
        Err(CodecError::InvalidInput(_))
    ));
}

#[test]
fn bgra_destination_swaps_channel_order() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let dst_info = codec.info().with_color_type(ColorType::Bgra8888);
    let mut dst = vec![0u8; 4];
    codec
        .get_pixels(&dst_info, &mut dst, 4, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(dst, [0, 0xFF, 0, 0xFF]); // B, G, R, A
}

#[test]
fn repeated_get_pixels_rewinds_and_matches() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();

    let mut first = vec![0u8; 4];
    codec
        .get_pixels(&info, &mut first, 4, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    let mut second = vec![0u8; 4];
    codec
        .get_pixels(&info, &mut second, 4, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first, [0, 0xFF, 0, 0xFF]);
}

#[test]
fn larger_stride_leaves_padding_untouched() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    let mut dst = vec![0xEEu8; 12];
    codec
        .get_pixels(&info, &mut dst, 12, &DecodeOptions::default(), &Unstoppable)
        .unwrap();
    assert_eq!(&dst[..4], &[0, 0xFF, 0, 0xFF]);
    assert_eq!(&dst[4..], &[0xEE; 8]);
}

#[test]
fn bmp_has_no_scanline_decoder() {
    let data = tiny_bmp();
    let mut codec = Codec::from_stream(MemStream::new(&data)).unwrap();
    let info = *codec.info();
    assert!(matches!(
        codec.scanline_decoder(&info),
        Err(CodecError::Unimplemented(_))
    ));
}

#[test]
fn one_shot_decode_auto_detects() {
    let image = decode(&tiny_bmp(), Unstoppable).unwrap();
    assert_eq!(image.info.dimensions(), (1, 1));
    assert_eq!(image.pixels, [0, 0xFF, 0, 0xFF]);
    assert_eq!(detect_format(&tiny_bmp()), Some(ImageFormat::Bmp));
}

#[test]
fn limits_bound_dimensions_and_memory() {
    let data = tiny_bmp();
    let limits = Limits {
        max_pixels: Some(0),
        ..Limits::default()
    };
    assert!(matches!(
        decode_with_limits(&data, &limits, Unstoppable),
        Err(CodecError::LimitExceeded(_))
    ));

    let limits = Limits {
        max_memory_bytes: Some(1),
        ..Limits::default()
    };
    assert!(matches!(
        decode_with_limits(&data, &limits, Unstoppable),
        Err(CodecError::LimitExceeded(_))
    ));

    let limits = Limits::default();
    assert!(decode_with_limits(&data, &limits, Unstoppable).is_ok());
}
