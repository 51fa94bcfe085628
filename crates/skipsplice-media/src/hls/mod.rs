//! HLS media playlist generation and parsing.
//!
//! Only the subset of RFC 8216 needed for single-rendition byte-range VOD
//! playlists is covered.

mod parse;
mod playlist;

pub use parse::{parse_media_playlist, ParsedPlaylist, ParsedSegment};
pub use playlist::{MediaPlaylist, SegmentEntry};

/// MIME type for HLS media playlists.
pub const CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
