//! Anime-Skip: GraphQL timestamps keyed by AniList id and episode number.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use skipsplice_core::VideoId;

use super::{ArmMapper, OracleHttp, OracleSegment, OracleSource, TimingOracle};
use crate::config::OraclesConfig;

const SHOWS_QUERY: &str = "query FindShows($service: ExternalService!, $serviceId: String!) {
  findShowsByExternalId(service: $service, serviceId: $serviceId) {
    episodes { number timestamps { at type { name } } }
  }
}";

pub struct AnimeSkipOracle {
    http: OracleHttp,
    endpoint: String,
    mapper: Arc<ArmMapper>,
    enabled: bool,
}

// ---------------------------------------------------------------------------
// GraphQL response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ShowsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowsData {
    #[serde(default)]
    find_shows_by_external_id: Vec<Show>,
}

#[derive(Debug, Deserialize)]
struct Show {
    #[serde(default)]
    episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
struct Episode {
    #[serde(default)]
    number: Option<EpisodeNumber>,
    #[serde(default)]
    timestamps: Vec<Timestamp>,
}

/// Episode numbers are free text in Anime-Skip ("1", "12.5").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpisodeNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

impl EpisodeNumber {
    fn matches(&self, episode: u32) -> bool {
        match self {
            EpisodeNumber::Int(n) => *n == u64::from(episode),
            EpisodeNumber::Float(n) => *n == f64::from(episode),
            EpisodeNumber::Text(s) => s.trim().parse::<u32>().ok() == Some(episode),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Timestamp {
    at: f64,
    #[serde(rename = "type")]
    kind: TimestampType,
}

#[derive(Debug, Deserialize)]
struct TimestampType {
    name: String,
}

impl AnimeSkipOracle {
    pub fn from_config(config: &OraclesConfig, mapper: Arc<ArmMapper>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(client_id) = &config.animeskip_client_id {
            let value = HeaderValue::from_str(client_id)
                .context("animeskip_client_id is not a valid header value")?;
            headers.insert("X-Client-ID", value);
        }

        let http = OracleHttp::new(
            "anime-skip",
            Duration::from_secs(config.request_timeout_secs),
            config.requests_per_second,
            headers,
        )?;
        Ok(Self {
            http,
            endpoint: config.animeskip_url.clone(),
            mapper,
            enabled: config.animeskip_enabled && config.animeskip_client_id.is_some(),
        })
    }
}

#[async_trait]
impl TimingOracle for AnimeSkipOracle {
    fn name(&self) -> &'static str {
        "anime-skip"
    }

    fn source(&self) -> OracleSource {
        OracleSource::AnimeSkip
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
        let Some(anilist) = self
            .mapper
            .map(id.series_key(), season)
            .await?
            .and_then(|ids| ids.anilist)
        else {
            return Ok(None);
        };

        let body = serde_json::json!({
            "query": SHOWS_QUERY,
            "variables": {"service": "ANILIST", "serviceId": anilist.to_string()},
        });
        let Some(resp) = self
            .http
            .post_json::<_, GraphQlResponse>(&self.endpoint, &body)
            .await?
        else {
            return Ok(None);
        };

        let Some(data) = resp.data else {
            let messages: Vec<&str> = resp.errors.iter().map(|e| e.message.as_str()).collect();
            bail!("anime-skip query failed: {}", messages.join("; "));
        };

        Ok(data
            .find_shows_by_external_id
            .iter()
            .flat_map(|show| &show.episodes)
            .find(|ep| ep.number.as_ref().is_some_and(|n| n.matches(episode)))
            .and_then(|ep| pick(&ep.timestamps)))
    }
}

/// A timestamp marks where a section begins; it ends at the next one.
fn pick(timestamps: &[Timestamp]) -> Option<OracleSegment> {
    let mut sorted: Vec<&Timestamp> = timestamps.iter().collect();
    sorted.sort_by(|a, b| a.at.total_cmp(&b.at));

    section(&sorted, |name| name.contains("intro"), "Intro")
        .or_else(|| section(&sorted, |name| name == "credits", "Outro"))
}

fn section(
    sorted: &[&Timestamp],
    is_kind: impl Fn(&str) -> bool,
    label: &str,
) -> Option<OracleSegment> {
    let i = sorted
        .iter()
        .position(|t| is_kind(&t.kind.name.to_ascii_lowercase()))?;
    let next = sorted.get(i + 1)?;
    OracleSegment::checked(sorted[i].at, next.at, label, OracleSource::AnimeSkip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn oracle(server: &MockServer, client_id: Option<&str>) -> AnimeSkipOracle {
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
            animeskip_url: format!("{}/graphql", server.uri()),
            animeskip_client_id: client_id.map(String::from),
            requests_per_second: 100,
            ..OraclesConfig::default()
        };
        let mapper = ArmMapper::from_config(&config, Arc::new(TtlCache::unbounded_ttl(10))).unwrap();
        AnimeSkipOracle::from_config(&config, Arc::new(mapper)).unwrap()
    }

    fn id(s: &str) -> VideoId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn unavailable_without_client_id() {
        let server = MockServer::start().await;
        assert!(!oracle(&server, None).await.is_available());
        assert!(oracle(&server, Some("abc")).await.is_available());
    }

    #[tokio::test]
    async fn intro_ends_at_next_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("X-Client-ID", "abc"))
            .and(body_partial_json(serde_json::json!({"variables": {"serviceId": "21"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"findShowsByExternalId": [{"episodes": [
                    {"number": "2", "timestamps": []},
                    {"number": "1", "timestamps": [
                        {"at": 145.2, "type": {"name": "Canon"}},
                        {"at": 0.0, "type": {"name": "Recap"}},
                        {"at": 85.1, "type": {"name": "Intro"}}
                    ]}
                ]}]}
            })))
            .mount(&server)
            .await;

        let seg = oracle(&server, Some("abc"))
            .await
            .lookup(&id("tt0388629:1:1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!((seg.start, seg.end), (85.1, 145.2));
        assert_eq!(seg.source, OracleSource::AnimeSkip);
    }

    #[tokio::test]
    async fn missing_episode_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"findShowsByExternalId": []}
            })))
            .mount(&server)
            .await;

        let oracle = oracle(&server, Some("abc")).await;
        assert!(oracle.lookup(&id("tt0388629:1:1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn graphql_errors_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{"message": "Invalid client id"}]
            })))
            .mount(&server)
            .await;

        let oracle = oracle(&server, Some("abc")).await;
        assert!(oracle.lookup(&id("tt0388629:1:1")).await.is_err());
    }

    #[test]
    fn credits_fallback() {
        let ts = vec![
            Timestamp { at: 0.0, kind: TimestampType { name: "Canon".into() } },
            Timestamp { at: 1300.0, kind: TimestampType { name: "Credits".into() } },
            Timestamp { at: 1390.0, kind: TimestampType { name: "Preview".into() } },
        ];
        let seg = pick(&ts).unwrap();
        assert_eq!(seg.label, "Outro");
        assert_eq!((seg.start, seg.end), (1300.0, 1390.0));
    }
}
