use alloc::string::String;
use enough::StopReason;

/// Errors from BMP/ICO and PNG decoding.
///
/// `IncompleteInput` is special: whatever the engine wrote to the
/// destination before the input ran out is left in place, so callers may
/// choose to display the partial image.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("input ended before the pixel data did")]
    IncompleteInput,

    #[error("destination dimensions do not match the image (scaling is not supported)")]
    InvalidScale,

    #[error("cannot convert decoded pixels to the requested color/alpha configuration")]
    InvalidConversion,

    #[error("stream could not be rewound for a repeated decode")]
    CouldNotRewind,

    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for CodecError {
    fn from(r: StopReason) -> Self {
        CodecError::Cancelled(r)
    }
}
