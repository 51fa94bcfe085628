use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub oracles: OraclesConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer key guarding the moderation API. Unset leaves it open.
    #[serde(default)]
    pub admin_api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the community segment documents
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("skipsplice.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Explicit ffprobe binary; looked up on PATH when unset
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Hard limit per ffprobe invocation
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    /// Packet decode window after each probed timestamp
    #[serde(default = "default_window")]
    pub window_secs: f64,

    /// Largest accepted gap between requested and first decoded timestamp
    #[serde(default = "default_drift")]
    pub drift_tolerance_secs: f64,

    /// Size of the leading manifest segment holding container init data
    #[serde(default = "default_init_segment_bytes")]
    pub init_segment_bytes: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Accept stream URLs on loopback/private networks (local testing only)
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_probe_timeout() -> u64 {
    15
}
fn default_window() -> f64 {
    10.0
}
fn default_drift() -> f64 {
    20.0
}
fn default_init_segment_bytes() -> u64 {
    skipsplice_media::DEFAULT_INIT_SEGMENT_BYTES
}
fn default_max_redirects() -> usize {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: None,
            timeout_secs: default_probe_timeout(),
            window_secs: default_window(),
            drift_tolerance_secs: default_drift(),
            init_segment_bytes: default_init_segment_bytes(),
            max_redirects: default_max_redirects(),
            allow_private_hosts: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_manifest_capacity")]
    pub manifest_capacity: usize,

    /// Manifest lifetime; 0 keeps entries until evicted
    #[serde(default = "default_manifest_ttl")]
    pub manifest_ttl_secs: u64,

    #[serde(default = "default_offset_capacity")]
    pub offset_capacity: usize,

    #[serde(default = "default_offset_ttl")]
    pub offset_ttl_secs: u64,

    #[serde(default = "default_oracle_capacity")]
    pub oracle_capacity: usize,

    /// Lifetime of oracle answers, negative ones included
    #[serde(default = "default_oracle_ttl")]
    pub oracle_ttl_secs: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_manifest_capacity() -> usize {
    1000
}
fn default_manifest_ttl() -> u64 {
    6 * 3600
}
fn default_offset_capacity() -> usize {
    5000
}
fn default_offset_ttl() -> u64 {
    6 * 3600
}
fn default_oracle_capacity() -> usize {
    5000
}
fn default_oracle_ttl() -> u64 {
    600
}
fn default_cleanup_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            manifest_capacity: default_manifest_capacity(),
            manifest_ttl_secs: default_manifest_ttl(),
            offset_capacity: default_offset_capacity(),
            offset_ttl_secs: default_offset_ttl(),
            oracle_capacity: default_oracle_capacity(),
            oracle_ttl_secs: default_oracle_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OraclesConfig {
    #[serde(default = "default_true")]
    pub introdb_enabled: bool,

    #[serde(default = "default_introdb_url")]
    pub introdb_url: String,

    /// Anime id mapping service (IMDb -> MyAnimeList / AniList)
    #[serde(default = "default_arm_url")]
    pub arm_url: String,

    #[serde(default = "default_true")]
    pub aniskip_enabled: bool,

    #[serde(default = "default_aniskip_url")]
    pub aniskip_url: String,

    #[serde(default = "default_true")]
    pub animeskip_enabled: bool,

    #[serde(default = "default_animeskip_url")]
    pub animeskip_url: String,

    /// Client id sent in the `X-Client-ID` header; Anime-Skip is skipped without one
    #[serde(default)]
    pub animeskip_client_id: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Per-oracle request budget
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,
}

fn default_true() -> bool {
    true
}
fn default_introdb_url() -> String {
    "https://api.introdb.app".to_string()
}
fn default_arm_url() -> String {
    "https://arm.haglund.dev".to_string()
}
fn default_aniskip_url() -> String {
    "https://api.aniskip.com".to_string()
}
fn default_animeskip_url() -> String {
    "https://api.anime-skip.com/graphql".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_rate_limit() -> u32 {
    5
}

impl Default for OraclesConfig {
    fn default() -> Self {
        Self {
            introdb_enabled: true,
            introdb_url: default_introdb_url(),
            arm_url: default_arm_url(),
            aniskip_enabled: true,
            aniskip_url: default_aniskip_url(),
            animeskip_enabled: true,
            animeskip_url: default_animeskip_url(),
            animeskip_client_id: None,
            request_timeout_secs: default_request_timeout(),
            requests_per_second: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModerationConfig {
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f64,

    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f64,

    #[serde(default = "default_max_label_len")]
    pub max_label_len: usize,

    /// Segments with at least this many reports are hidden from lookups
    #[serde(default = "default_report_hide_threshold")]
    pub report_hide_threshold: u32,
}

fn default_min_duration() -> f64 {
    5.0
}
fn default_max_duration() -> f64 {
    300.0
}
fn default_max_label_len() -> usize {
    32
}
fn default_report_hide_threshold() -> u32 {
    3
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            max_label_len: default_max_label_len(),
            report_hide_threshold: default_report_hide_threshold(),
        }
    }
}
