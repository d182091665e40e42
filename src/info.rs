/// Image format detected from magic bytes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// BMP (Windows/OS2 bitmap), `"BM"` magic.
    Bmp,
    /// PNG, 8-byte signature.
    Png,
}

/// Destination pixel layout.
///
/// `Rgba8888` and `Bgra8888` are the two canonical 32-bit orders; every
/// decode can target either. `Rgb565` is only legal for BMP RLE decodes
/// with an opaque alpha type, and `Alpha8` only for grayscale PNGs.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorType {
    /// R, G, B, A byte order.
    Rgba8888,
    /// B, G, R, A byte order.
    Bgra8888,
    /// 16-bit 5-6-5, little-endian.
    Rgb565,
    /// Single alpha byte.
    Alpha8,
}

impl ColorType {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888 | Self::Bgra8888 => 4,
            Self::Rgb565 => 2,
            Self::Alpha8 => 1,
        }
    }
}

/// How the alpha channel of the destination is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaType {
    /// Every pixel is fully opaque; the alpha byte is always 0xFF.
    Opaque,
    /// Color channels are premultiplied by alpha.
    Premul,
    /// Color channels are independent of alpha.
    Unpremul,
}

/// Describes an image or a requested destination buffer.
///
/// `profile_id` is an opaque color-profile tag; the decoders never
/// interpret it, they only require source and destination to agree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    width: u32,
    height: u32,
    color_type: ColorType,
    alpha_type: AlphaType,
    profile_id: u32,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, color_type: ColorType, alpha_type: AlphaType) -> Self {
        Self {
            width,
            height,
            color_type,
            alpha_type,
            profile_id: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    pub fn alpha_type(&self) -> AlphaType {
        self.alpha_type
    }

    pub fn profile_id(&self) -> u32 {
        self.profile_id
    }

    pub fn with_color_type(mut self, color_type: ColorType) -> Self {
        self.color_type = color_type;
        self
    }

    pub fn with_alpha_type(mut self, alpha_type: AlphaType) -> Self {
        self.alpha_type = alpha_type;
        self
    }

    pub fn with_profile_id(mut self, profile_id: u32) -> Self {
        self.profile_id = profile_id;
        self
    }

    /// Tightest legal row stride for this layout.
    pub fn min_row_bytes(&self) -> usize {
        self.width as usize * self.color_type.bytes_per_pixel()
    }

    /// Bytes a destination buffer must hold at stride `row_bytes`.
    ///
    /// The final row only needs `min_row_bytes`, not a full stride.
    pub fn compute_byte_size(&self, row_bytes: usize) -> usize {
        if self.height == 0 {
            return 0;
        }
        (self.height as usize - 1) * row_bytes + self.min_row_bytes()
    }
}

/// Options for a `get_pixels` call.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    /// Caller promises the destination is already zero-filled, letting the
    /// RLE engine skip its pre-clear.
    pub zero_initialized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_uses_min_row_bytes_for_last_row() {
        let info = ImageInfo::new(3, 2, ColorType::Rgba8888, AlphaType::Opaque);
        assert_eq!(info.min_row_bytes(), 12);
        assert_eq!(info.compute_byte_size(16), 16 + 12);
        assert_eq!(info.compute_byte_size(12), 24);
    }
}
