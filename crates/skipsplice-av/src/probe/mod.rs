//! Byte-offset probing of remote media.
//!
//! The [`ByteProber`] trait maps presentation timestamps to byte positions
//! and extracts embedded chapter markers. Every operation is read-only
//! against the remote resource and degrades instead of failing: a probe
//! that cannot answer reports `0`, `None`, or an empty list.

mod ffprobe;
mod packets;

pub use ffprobe::FfprobeProber;
pub use packets::{parse_chapters, parse_duration, parse_packets, select_offset, Packet};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of redirect resolution for a source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Terminal URL after following redirects.
    pub final_url: String,
    /// Declared `Content-Length`, when the host reports one.
    pub content_length: Option<u64>,
    /// Container duration in seconds, when it could be probed.
    pub duration: Option<f64>,
}

impl ResolvedSource {
    /// Degraded result used when nothing could be learned about `url`.
    pub fn unresolved(url: &str) -> Self {
        Self {
            final_url: url.to_string(),
            content_length: None,
            duration: None,
        }
    }
}

/// A chapter marker embedded in the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub start: f64,
    pub end: f64,
    pub title: String,
}

impl Chapter {
    /// Whether the chapter title marks an opening sequence.
    ///
    /// Matches "intro" or "opening" anywhere, or an `op` word token
    /// (`OP`, `OP1`, `op2`), case-insensitively.
    pub fn is_intro(&self) -> bool {
        let title = self.title.to_ascii_lowercase();
        if title.contains("intro") || title.contains("opening") {
            return true;
        }
        title
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| {
                word.strip_prefix("op")
                    .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
            })
    }
}

/// Tunables shared by probe backends.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Path to the ffprobe executable.
    pub ffprobe: PathBuf,
    /// Hard limit per probe subprocess.
    pub timeout: Duration,
    /// Length of each decode window in seconds.
    pub window_secs: f64,
    /// Largest tolerated gap between the requested and first returned timestamp.
    pub drift_tolerance_secs: f64,
    /// Redirect hops followed by [`ByteProber::resolve`].
    pub max_redirects: usize,
    /// Let redirects and probes reach loopback or private addresses.
    pub allow_private_hosts: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            timeout: Duration::from_secs(15),
            window_secs: 10.0,
            drift_tolerance_secs: 20.0,
            max_redirects: 5,
            allow_private_hosts: false,
        }
    }
}

/// Maps timestamps to byte offsets in a remote media file.
///
/// Implementations never return errors: every failure degrades to a value
/// the splice orchestrator's fallback ladder understands.
#[async_trait]
pub trait ByteProber: Send + Sync {
    /// Follow redirects and learn content length and duration.
    ///
    /// A redirect towards an internal host is not followed; the blocked
    /// target comes back as `final_url` with nothing else learned, so the
    /// caller's own URL check rejects it.
    async fn resolve(&self, url: &str) -> ResolvedSource;

    /// Byte offset of the first video packet at or after `t`, or `0` when no
    /// reliable offset could be found.
    async fn find_offset(&self, url: &str, t: f64) -> u64;

    /// Offsets for two timestamps from a single probe, or `None` if either
    /// cannot be resolved.
    async fn find_offsets(&self, url: &str, t1: f64, t2: f64) -> Option<(u64, u64)>;

    /// Embedded chapters; empty when none exist or probing fails.
    async fn find_chapters(&self, url: &str) -> Vec<Chapter>;
}
