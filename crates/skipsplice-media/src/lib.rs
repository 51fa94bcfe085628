//! skipsplice-media: byte-range HLS playlists.
//!
//! The player never talks to skipsplice for media bytes. Every segment in a
//! synthesized playlist is a byte range of the original remote file, so the
//! player issues range requests straight to the upstream host and simply
//! never asks for the skipped bytes.
//!
//! # Modules
//!
//! - `hls` - media playlist model, rendering, and a parser for reading
//!   rendered playlists back
//! - `splice` - the [`ManifestBuilder`] producing simple-skip, spliced, and
//!   pass-through layouts
//!
//! # Example
//!
//! ```
//! use skipsplice_media::{parse_media_playlist, ManifestBuilder};
//!
//! let builder = ManifestBuilder::default();
//! let text = builder.spliced(
//!     "https://cdn.example.com/ep1.mkv",
//!     Some(1420.0),
//!     30_000_000,
//!     52_000_000,
//!     Some(700_000_000),
//! );
//! let parsed = parse_media_playlist(&text).unwrap();
//! assert_eq!(parsed.discontinuity_count(), 1);
//! ```

pub mod error;
pub mod hls;
pub mod splice;

pub use error::{Error, Result};
pub use hls::{parse_media_playlist, MediaPlaylist, ParsedPlaylist, SegmentEntry, CONTENT_TYPE};
pub use splice::{
    simple, spliced, ManifestBuilder, DEFAULT_INIT_SEGMENT_BYTES, UNKNOWN_LENGTH_SENTINEL,
};
