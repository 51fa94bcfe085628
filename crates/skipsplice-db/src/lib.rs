//! skipsplice-db: community segment store.
//!
//! Segments are kept as JSON documents, one row per [`VideoId`] key, in
//! SQLite with r2d2 connection pooling. Writes follow document-store
//! semantics: single segments are appended with an atomic array push,
//! reports are atomic field increments, and moderation edits replace the
//! whole array inside one immediate transaction.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `queries` - Document operations
//!
//! # Example
//!
//! ```
//! use skipsplice_core::{Contributor, Segment, VideoId};
//! use skipsplice_db::pool::{get_conn, init_memory_pool};
//! use skipsplice_db::queries::segments;
//!
//! let pool = init_memory_pool().unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let id: VideoId = "tt0388629:1:1".parse().unwrap();
//! let seg = Segment::new(id.clone(), 85.0, 145.0, "Intro", Contributor::from("aniskip"));
//! segments::push(&conn, &id, &seg).unwrap();
//! assert_eq!(segments::find(&conn, &id).unwrap().len(), 1);
//! ```
//!
//! [`VideoId`]: skipsplice_core::VideoId

pub mod migrations;
pub mod pool;
pub mod queries;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
