//! Database query modules.
//!
//! - segments: per-key segment documents (find, push, report, replace, views)

pub mod segments;
