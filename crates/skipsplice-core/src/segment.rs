//! Skip segment model and contributor identities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::VideoId;

/// Label applied when a submission carries none.
pub const DEFAULT_LABEL: &str = "Intro";

/// System identities whose contributions are auto-verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemSource {
    /// Bulk-imported timings.
    Imported,
    /// Derived from chapter markers embedded in the media file.
    Chapters,
    /// Backfilled from the IntroDB oracle.
    IntroDb,
    /// Backfilled from the AniSkip oracle.
    AniSkip,
    /// Backfilled from the Anime-Skip oracle.
    AnimeSkip,
}

impl SystemSource {
    pub const ALL: [SystemSource; 5] = [
        SystemSource::Imported,
        SystemSource::Chapters,
        SystemSource::IntroDb,
        SystemSource::AniSkip,
        SystemSource::AnimeSkip,
    ];

    /// Identity string persisted in the `source` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemSource::Imported => "imported",
            SystemSource::Chapters => "chapter-bot",
            SystemSource::IntroDb => "introdb",
            SystemSource::AniSkip => "aniskip",
            SystemSource::AnimeSkip => "anime-skip",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|src| src.as_str() == s)
    }
}

impl fmt::Display for SystemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who contributed a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Contributor {
    /// A fixed system identity.
    System(SystemSource),
    /// An end-user identifier (opaque).
    User(String),
}

impl Contributor {
    /// Trusted contributors are auto-verified on submission.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Contributor::System(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Contributor::System(src) => src.as_str(),
            Contributor::User(id) => id,
        }
    }
}

impl From<&str> for Contributor {
    fn from(s: &str) -> Self {
        match SystemSource::parse(s) {
            Some(src) => Contributor::System(src),
            None => Contributor::User(s.to_string()),
        }
    }
}

impl From<SystemSource> for Contributor {
    fn from(src: SystemSource) -> Self {
        Contributor::System(src)
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Contributor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Contributor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Contributor::from(s.as_str()))
    }
}

/// One skip-worthy interval, as stored in the community document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub video_id: VideoId,
    pub start: f64,
    pub end: f64,
    pub label: String,
    pub source: Contributor,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub report_count: u32,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub series_skip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Segment {
    /// Create a new segment; `verified` follows the contributor's trust.
    pub fn new(
        video_id: VideoId,
        start: f64,
        end: f64,
        label: impl Into<String>,
        source: Contributor,
    ) -> Self {
        let verified = source.is_trusted();
        Self {
            video_id,
            start,
            end,
            label: label.into(),
            source,
            verified,
            report_count: 0,
            votes: 0,
            series_skip: false,
            created_at: Some(Utc::now()),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Case-insensitive "intro" label check.
    pub fn is_intro(&self) -> bool {
        self.label.eq_ignore_ascii_case(DEFAULT_LABEL)
    }

    /// Both bounds within one second of `other`'s.
    pub fn is_near_duplicate(&self, start: f64, end: f64) -> bool {
        (self.start - start).abs() < 1.0 && (self.end - end).abs() < 1.0
    }
}
