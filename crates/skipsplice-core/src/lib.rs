//! skipsplice-core: shared types, identifiers, and errors.
//!
//! This crate is the foundational dependency for all other skipsplice
//! crates, providing the unified error type, the composite [`VideoId`]
//! key, and the [`Segment`] model stored in the community document store.
//!
//! # Examples
//!
//! ```
//! use skipsplice_core::{Contributor, VideoId};
//!
//! let id: VideoId = "tt0388629:1:1".parse().unwrap();
//! assert_eq!(id.series_key(), "tt0388629");
//! assert!(Contributor::from("aniskip").is_trusted());
//! ```

pub mod error;
pub mod ids;
pub mod segment;

pub use error::{Error, Result};
pub use ids::VideoId;
pub use segment::{Contributor, Segment, SystemSource};
