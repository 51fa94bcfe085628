//! Error types for skipsplice-media.

use thiserror::Error;

/// Result type for skipsplice-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for skipsplice-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The text does not start with `#EXTM3U`.
    #[error("Missing #EXTM3U header")]
    MissingHeader,

    /// A tag carried a value that could not be parsed.
    #[error("Invalid {tag} on line {line}: {value:?}")]
    InvalidTag {
        tag: &'static str,
        line: usize,
        value: String,
    },

    /// A URI line appeared without a preceding `#EXTINF`.
    #[error("Segment URI on line {0} has no #EXTINF")]
    MissingExtinf(usize),
}

impl Error {
    pub(crate) fn invalid_tag(tag: &'static str, line: usize, value: impl Into<String>) -> Self {
        Self::InvalidTag {
            tag,
            line,
            value: value.into(),
        }
    }
}
