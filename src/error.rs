//! The error type shared by every fallible operation in the crate.

use crate::AboveMaxLen;
use std::io;

/// Everything that can go wrong while quantizing, encoding or decoding an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bit depth was something other than 8 bits per channel.
    #[error("unsupported bit depth {0}, only 8 bits per channel is supported")]
    UnsupportedDepth(u8),

    /// An invalid combination of parameters was supplied.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A palette had more than `MAX_COLORS` entries.
    #[error("palette is {0}")]
    PaletteTooLong(#[from] AboveMaxLen<u16>),

    /// Reading or writing a file failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The input could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// An encoder failed to produce an image.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// A search had no candidates to choose from.
    #[error("no candidates were produced")]
    EmptyResult,
}

/// A [`Result`](std::result::Result) with [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_COLORS;

    #[test]
    fn messages() {
        assert_eq!(
            Error::UnsupportedDepth(16).to_string(),
            "unsupported bit depth 16, only 8 bits per channel is supported"
        );
        assert_eq!(
            Error::from(AboveMaxLen(MAX_COLORS)).to_string(),
            "palette is above the maximum length of 256"
        );
    }
}
