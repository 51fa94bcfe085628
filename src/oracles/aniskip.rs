//! AniSkip: community skip times keyed by MyAnimeList id and episode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use skipsplice_core::VideoId;

use super::{ArmMapper, OracleHttp, OracleSegment, OracleSource, TimingOracle};
use crate::config::OraclesConfig;

pub struct AniSkipOracle {
    http: OracleHttp,
    base_url: String,
    mapper: Arc<ArmMapper>,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct SkipTimesResponse {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    results: Vec<SkipResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkipResult {
    interval: Interval,
    skip_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Interval {
    start_time: f64,
    end_time: f64,
}

impl AniSkipOracle {
    pub fn from_config(config: &OraclesConfig, mapper: Arc<ArmMapper>) -> anyhow::Result<Self> {
        let http = OracleHttp::new(
            "aniskip",
            Duration::from_secs(config.request_timeout_secs),
            config.requests_per_second,
            HeaderMap::new(),
        )?;
        Ok(Self {
            http,
            base_url: config.aniskip_url.trim_end_matches('/').to_string(),
            mapper,
            enabled: config.aniskip_enabled,
        })
    }
}

#[async_trait]
impl TimingOracle for AniSkipOracle {
    fn name(&self) -> &'static str {
        "aniskip"
    }

    fn source(&self) -> OracleSource {
        OracleSource::AniSkip
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
        let Some(mal) = self.mapper.map(id.series_key(), season).await?.and_then(|ids| ids.mal) else {
            return Ok(None);
        };

        let url = format!("{}/v2/skip-times/{mal}/{episode}", self.base_url);
        let query = [
            ("types[]", "op".to_string()),
            ("types[]", "ed".to_string()),
            ("episodeLength", "0".to_string()),
        ];
        let Some(resp) = self.http.get_json::<SkipTimesResponse>(&url, &query).await? else {
            return Ok(None);
        };
        if !resp.found {
            return Ok(None);
        }

        Ok(pick(&resp.results))
    }
}

/// Opening first, then ending.
fn pick(results: &[SkipResult]) -> Option<OracleSegment> {
    [("op", "Intro"), ("ed", "Outro")]
        .into_iter()
        .find_map(|(kind, label)| {
            let r = results.iter().find(|r| r.skip_type == kind)?;
            OracleSegment::checked(
                r.interval.start_time,
                r.interval.end_time,
                label,
                OracleSource::AniSkip,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn oracle(server: &MockServer) -> AniSkipOracle {
        Mock::given(method("GET"))
            .and(path("/api/v2/imdb"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"myanimelist": 21, "anilist": 21}])),
            )
            .mount(server)
            .await;

        let config = OraclesConfig {
            arm_url: server.uri(),
            aniskip_url: server.uri(),
            requests_per_second: 100,
            ..OraclesConfig::default()
        };
        let mapper = ArmMapper::from_config(&config, Arc::new(TtlCache::unbounded_ttl(10))).unwrap();
        AniSkipOracle::from_config(&config, Arc::new(mapper)).unwrap()
    }

    fn id(s: &str) -> VideoId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn opening_is_preferred() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/skip-times/21/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true,
                "results": [
                    {"interval": {"startTime": 1300.5, "endTime": 1390.0}, "skipType": "ed", "skipId": "b", "episodeLength": 1420.0},
                    {"interval": {"startTime": 85.0, "endTime": 145.0}, "skipType": "op", "skipId": "a", "episodeLength": 1420.0}
                ]
            })))
            .mount(&server)
            .await;

        let seg = oracle(&server).await.lookup(&id("tt0388629:1:1")).await.unwrap().unwrap();
        assert_eq!((seg.start, seg.end), (85.0, 145.0));
        assert_eq!(seg.label, "Intro");
        assert_eq!(seg.source, OracleSource::AniSkip);
    }

    #[tokio::test]
    async fn ending_when_no_opening() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/skip-times/21/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true,
                "results": [{"interval": {"startTime": 1300.0, "endTime": 1390.0}, "skipType": "ed"}]
            })))
            .mount(&server)
            .await;

        let seg = oracle(&server).await.lookup(&id("tt0388629:1:2")).await.unwrap().unwrap();
        assert_eq!(seg.label, "Outro");
    }

    #[tokio::test]
    async fn not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/skip-times/21/3"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "found": false, "results": [], "message": "No skip times found", "statusCode": 404
            })))
            .mount(&server)
            .await;

        let oracle = oracle(&server).await;
        assert!(oracle.lookup(&id("tt0388629:1:3")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn series_level_and_non_imdb_ids_are_skipped() {
        let server = MockServer::start().await;
        let oracle = oracle(&server).await;
        assert!(oracle.lookup(&id("tt0388629")).await.unwrap().is_none());
        assert!(oracle.lookup(&id("kitsu-12:1:1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_season_uses_its_own_catalog_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/imdb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"myanimelist": 16498, "anilist": 16498, "season": {"tvdb": 1}},
                {"myanimelist": 25777, "anilist": 20958, "season": {"tvdb": 2}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/skip-times/16498/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true,
                "results": [{"interval": {"startTime": 10.0, "endTime": 100.0}, "skipType": "op"}]
            })))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/skip-times/25777/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true,
                "results": [{"interval": {"startTime": 40.0, "endTime": 130.0}, "skipType": "op"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let seg = oracle_with_mocked_arm(&server).lookup(&id("tt2560140:2:3")).await.unwrap().unwrap();
        assert_eq!((seg.start, seg.end), (40.0, 130.0));
        server.verify().await;
    }

    #[tokio::test]
    async fn ambiguous_later_season_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/imdb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"myanimelist": 16498, "anilist": 16498},
                {"myanimelist": 25777, "anilist": 20958}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/v2/skip-times/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "found": true,
                "results": [{"interval": {"startTime": 10.0, "endTime": 100.0}, "skipType": "op"}]
            })))
            .expect(0)
            .mount(&server)
            .await;

        let oracle = oracle_with_mocked_arm(&server);
        assert!(oracle.lookup(&id("tt2560140:2:3")).await.unwrap().is_none());
        server.verify().await;
    }

    /// Oracle whose ARM answers come from whatever `server` has mounted.
    fn oracle_with_mocked_arm(server: &MockServer) -> AniSkipOracle {
        let config = OraclesConfig {
            arm_url: server.uri(),
            aniskip_url: server.uri(),
            requests_per_second: 100,
            ..OraclesConfig::default()
        };
        let mapper = ArmMapper::from_config(&config, Arc::new(TtlCache::unbounded_ttl(10))).unwrap();
        AniSkipOracle::from_config(&config, Arc::new(mapper)).unwrap()
    }
}
