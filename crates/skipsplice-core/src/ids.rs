//! Composite video identifiers.
//!
//! A [`VideoId`] is `<seriesId>[:<season>:<episode>]`. Without season and
//! episode it addresses a whole series; series-level segments are stored
//! under that key and overlaid onto every episode of the series.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Longest accepted series identifier.
const MAX_SERIES_ID_LEN: usize = 64;

/// Composite key identifying a series or a single episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId {
    series: String,
    episode: Option<(u32, u32)>,
}

impl VideoId {
    /// Build a series-level id.
    pub fn series(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            episode: None,
        }
    }

    /// Build an episode-level id.
    pub fn episode(series: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            series: series.into(),
            episode: Some((season, episode)),
        }
    }

    /// The series part of the key (e.g. `tt0388629`).
    pub fn series_key(&self) -> &str {
        &self.series
    }

    /// Season number, if this is an episode id.
    pub fn season(&self) -> Option<u32> {
        self.episode.map(|(s, _)| s)
    }

    /// Episode number, if this is an episode id.
    pub fn episode_number(&self) -> Option<u32> {
        self.episode.map(|(_, e)| e)
    }

    /// `true` when no season/episode is present.
    pub fn is_series_level(&self) -> bool {
        self.episode.is_none()
    }

    /// The series-level id this episode belongs to.
    pub fn to_series(&self) -> VideoId {
        VideoId::series(self.series.clone())
    }

    /// `true` for IMDb-style ids (`tt` followed by digits).
    pub fn is_imdb(&self) -> bool {
        self.series
            .strip_prefix("tt")
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.episode {
            Some((season, episode)) => write!(f, "{}:{}:{}", self.series, season, episode),
            None => f.write_str(&self.series),
        }
    }
}

impl FromStr for VideoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = s.split(':');
        let series = parts.next().unwrap_or_default();

        if series.is_empty() || series.len() > MAX_SERIES_ID_LEN {
            return Err(Error::validation(format!("invalid video id: {s:?}")));
        }
        if !series
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
        {
            return Err(Error::validation(format!(
                "invalid characters in series id: {series:?}"
            )));
        }

        let rest: Vec<&str> = parts.collect();
        match rest.as_slice() {
            [] => Ok(VideoId::series(series)),
            [season, episode] => {
                let season = season
                    .parse::<u32>()
                    .map_err(|_| Error::validation(format!("invalid season in {s:?}")))?;
                let episode = episode
                    .parse::<u32>()
                    .map_err(|_| Error::validation(format!("invalid episode in {s:?}")))?;
                Ok(VideoId::episode(series, season, episode))
            }
            _ => Err(Error::validation(format!(
                "video id must be <series>[:<season>:<episode>], got {s:?}"
            ))),
        }
    }
}

impl Serialize for VideoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VideoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
