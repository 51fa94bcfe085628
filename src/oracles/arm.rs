//! Show id to anime catalog id mapping (ARM service).

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::OracleHttp;
use crate::cache::TtlCache;
use crate::config::OraclesConfig;

/// Catalog ids for one show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnimeIds {
    pub mal: Option<u64>,
    pub anilist: Option<u64>,
}

/// One catalog entry of a show. Anime catalogs usually list each season
/// as its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Season of the show this entry covers, when the service says so.
    pub season: Option<u32>,
    pub ids: AnimeIds,
}

pub type MappingCache = TtlCache<String, Vec<CatalogEntry>>;

/// Maps IMDb show ids to MyAnimeList / AniList ids.
///
/// Id-to-id mappings do not change, so answers (including "unknown show")
/// are cached without expiry. Failed requests are not cached.
pub struct ArmMapper {
    http: OracleHttp,
    base_url: String,
    cache: Arc<MappingCache>,
}

// ---------------------------------------------------------------------------
// ARM response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArmEntry {
    #[serde(default)]
    myanimelist: Option<u64>,
    #[serde(default)]
    anilist: Option<u64>,
    #[serde(default)]
    season: Option<ArmSeason>,
}

/// `"season": 2` or `"season": {"tvdb": 2, ...}`; anything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArmSeason {
    Number(u32),
    Keyed { tvdb: u32 },
    Other(IgnoredAny),
}

impl ArmSeason {
    fn number(&self) -> Option<u32> {
        match self {
            ArmSeason::Number(n) | ArmSeason::Keyed { tvdb: n } => Some(*n),
            ArmSeason::Other(_) => None,
        }
    }
}

impl ArmMapper {
    pub fn from_config(config: &OraclesConfig, cache: Arc<MappingCache>) -> anyhow::Result<Self> {
        let http = OracleHttp::new(
            "arm",
            Duration::from_secs(config.request_timeout_secs),
            config.requests_per_second,
            HeaderMap::new(),
        )?;
        Ok(Self {
            http,
            base_url: config.arm_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<MappingCache> {
        &self.cache
    }

    /// Catalog ids for `season` of `series`.
    ///
    /// `None` for shows the service does not know, and for seasons that
    /// cannot be told apart from the others.
    pub async fn map(&self, series: &str, season: u32) -> anyhow::Result<Option<AnimeIds>> {
        let entries = self.entries(series).await?;
        let ids = select_season(&entries, season);
        debug!(series, season, entries = entries.len(), ?ids, "Anime id mapping resolved");
        Ok(ids)
    }

    async fn entries(&self, series: &str) -> anyhow::Result<Vec<CatalogEntry>> {
        if let Some(entries) = self.cache.get(&series.to_string()) {
            return Ok(entries);
        }

        let url = format!("{}/api/v2/imdb", self.base_url);
        let raw: Vec<ArmEntry> = self
            .http
            .get_json(&url, &[("id", series.to_string())])
            .await?
            .unwrap_or_default();

        let entries: Vec<CatalogEntry> = raw
            .into_iter()
            .map(|e| CatalogEntry {
                season: e.season.as_ref().and_then(ArmSeason::number),
                ids: AnimeIds {
                    mal: e.myanimelist,
                    anilist: e.anilist,
                },
            })
            .filter(|e| e.ids.mal.is_some() || e.ids.anilist.is_some())
            .collect();

        self.cache.insert(series.to_string(), entries.clone());
        Ok(entries)
    }
}

/// Pick the entry for `season`.
///
/// An entry tagged with the season wins. Otherwise season 1 maps to the
/// first entry, and a later season only to a show with a single entry
/// (long-running shows catalogued as one).
fn select_season(entries: &[CatalogEntry], season: u32) -> Option<AnimeIds> {
    if let Some(tagged) = entries.iter().find(|e| e.season == Some(season)) {
        return Some(tagged.ids);
    }
    match entries {
        [only] if only.season.is_none() => Some(only.ids),
        [first, ..] if season <= 1 && first.season.is_none() => Some(first.ids),
        _ => None,
    }
}
