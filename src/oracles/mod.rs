//! Timing oracles.
//!
//! A [`TimingOracle`] answers "where is the intro of this episode?" from one
//! external service. Every adapter normalizes its service's response into an
//! [`OracleSegment`] at the boundary; the [`TimingChain`] then walks the
//! community store and the oracles in priority order and yields a single
//! [`Timing`].

mod aniskip;
mod animeskip;
mod arm;
mod cached;
mod chain;
mod community;
mod http;
mod introdb;

pub use aniskip::AniSkipOracle;
pub use animeskip::AnimeSkipOracle;
pub use arm::{AnimeIds, ArmMapper, CatalogEntry, MappingCache};
pub use cached::{CachedOracle, OracleCache};
pub use chain::{Backfill, TimingChain};
pub use community::CommunityLookup;
pub use http::OracleHttp;
pub use introdb::IntroDbOracle;

use async_trait::async_trait;
use serde::Serialize;
use skipsplice_core::{Contributor, Segment, SystemSource, VideoId};

// ---------------------------------------------------------------------------
// Normalized results
// ---------------------------------------------------------------------------

/// External services that can answer timing lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum OracleSource {
    IntroDb,
    AniSkip,
    AnimeSkip,
}

impl OracleSource {
    /// The trusted identity backfilled segments are stored under.
    pub fn system_source(&self) -> SystemSource {
        match self {
            OracleSource::IntroDb => SystemSource::IntroDb,
            OracleSource::AniSkip => SystemSource::AniSkip,
            OracleSource::AnimeSkip => SystemSource::AnimeSkip,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.system_source().as_str()
    }
}

impl From<OracleSource> for &'static str {
    fn from(src: OracleSource) -> Self {
        src.as_str()
    }
}

/// A timing answer from an external oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleSegment {
    pub start: f64,
    pub end: f64,
    pub label: String,
    pub source: OracleSource,
}

impl OracleSegment {
    /// Build a segment from raw service values, dropping nonsense intervals.
    pub fn checked(
        start: f64,
        end: f64,
        label: impl Into<String>,
        source: OracleSource,
    ) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            tracing::debug!(start, end, source = source.as_str(), "Oracle returned an invalid interval");
            return None;
        }
        Some(Self {
            start,
            end,
            label: label.into(),
            source,
        })
    }
}

/// The single skip interval chosen for a video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Timing {
    /// Stored in the community document store.
    Community(Segment),
    /// Fetched from an external oracle.
    Oracle(OracleSegment),
}

impl Timing {
    pub fn start(&self) -> f64 {
        match self {
            Timing::Community(s) => s.start,
            Timing::Oracle(s) => s.start,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            Timing::Community(s) => s.end,
            Timing::Oracle(s) => s.end,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Timing::Community(s) => &s.label,
            Timing::Oracle(s) => &s.label,
        }
    }

    pub fn contributor(&self) -> Contributor {
        match self {
            Timing::Community(s) => s.source.clone(),
            Timing::Oracle(s) => s.source.system_source().into(),
        }
    }

    pub fn is_community(&self) -> bool {
        matches!(self, Timing::Community(_))
    }
}

// ---------------------------------------------------------------------------
// Oracle trait
// ---------------------------------------------------------------------------

/// One external timing service.
///
/// `Ok(None)` means the service answered and has no timing for this video;
/// it is cached like a hit. `Err` is a transient failure and is not cached.
#[async_trait]
pub trait TimingOracle: Send + Sync {
    /// Short, lowercase identifier (e.g. `"aniskip"`).
    fn name(&self) -> &'static str;

    fn source(&self) -> OracleSource;

    /// Returns `true` when the oracle is configured and enabled.
    fn is_available(&self) -> bool;

    async fn lookup(&self, id: &VideoId) -> anyhow::Result<Option<OracleSegment>>;
}
