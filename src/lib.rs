//! Skipsplice - intro skip resolution and byte-range HLS splicing
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cache;
pub mod config;
pub mod oracles;
pub mod probe;
pub mod segments;
pub mod server;
pub mod splice;
