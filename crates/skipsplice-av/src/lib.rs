//! # skipsplice-av
//!
//! Byte-offset probing of remote media for the skipsplice engine.
//!
//! This crate provides:
//!
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support that kills the subprocess on expiry.
//! - **Tool discovery** ([`check_tools`], [`require_tool`]) -- locate ffprobe.
//! - **Probe backend** ([`FfprobeProber`]) -- implements [`ByteProber`] by
//!   asking ffprobe to decode small packet windows of a remote URL.
//! - **Outbound guard** ([`UrlGuard`]) -- keeps probes and their redirects
//!   off loopback, private and link-local hosts.

pub mod command;
pub mod guard;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use guard::UrlGuard;
pub use probe::{ByteProber, Chapter, FfprobeProber, ProbeSettings, ResolvedSource};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
