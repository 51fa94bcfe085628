//! IntroDB: intro/outro timestamps keyed by IMDb id, season and episode.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use skipsplice_core::VideoId;

use super::{OracleHttp, OracleSegment, OracleSource, TimingOracle};
use crate::config::OraclesConfig;

pub struct IntroDbOracle {
    http: OracleHttp,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct SegmentsResponse {
    #[serde(default)]
    intro: Option<Span>,
    #[serde(default)]
    outro: Option<Span>,
}

#[derive(Debug, Deserialize)]
struct Span {
    #[serde(alias = "start")]
    start_sec: f64,
    #[serde(alias = "end")]
    end_sec: f64,
}

impl IntroDbOracle {
    pub fn from_config(config: &OraclesConfig) -> anyhow::Result<Self> {
        let http = OracleHttp::new(
            "introdb",
            Duration::from_secs(config.request_timeout_secs),
            config.requests_per_second,
            HeaderMap::new(),
        )?;
        Ok(Self {
            http,
            base_url: config.introdb_url.trim_end_matches('/').to_string(),
            enabled: config.introdb_enabled,
        })
    }
}

#[async_trait]
impl TimingOracle for IntroDbOracle {
    fn name(&self) -> &'static str {
        "introdb"
    }

    fn source(&self) -> OracleSource {
        OracleSource::IntroDb
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn lookup(&self, id: &VideoId) -> anyhow::Result<Option<OracleSegment>> {
        let (Some(season), Some(episode)) = (id.season(), id.episode_number()) else {
            return Ok(None);
        };
        if !id.is_imdb() {
            return Ok(None);
        }

        let url = format!("{}/segments", self.base_url);
        let query = [
            ("imdb_id", id.series_key().to_string()),
            ("season", season.to_string()),
            ("episode", episode.to_string()),
        ];
        let Some(resp) = self.http.get_json::<SegmentsResponse>(&url, &query).await? else {
            return Ok(None);
        };

        let intro = resp
            .intro
            .and_then(|s| OracleSegment::checked(s.start_sec, s.end_sec, "Intro", OracleSource::IntroDb));
        Ok(intro.or_else(|| {
            resp.outro
                .and_then(|s| OracleSegment::checked(s.start_sec, s.end_sec, "Outro", OracleSource::IntroDb))
        }))
    }
}
