mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in validate_config(&config)? {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./skipsplice.toml",
        "~/.config/skipsplice/config.toml",
        "/etc/skipsplice/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration.
///
/// Fatal problems are errors; questionable but usable settings come back as
/// warnings.
pub fn validate_config(config: &Config) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.admin_api_key.as_deref().is_some_and(str::is_empty) {
        anyhow::bail!("server.admin_api_key is set but empty");
    }
    if config.server.admin_api_key.is_none() {
        warnings.push("server.admin_api_key is unset; moderation API is open".to_string());
    }

    let m = &config.moderation;
    if m.min_duration_secs < 0.0 || m.min_duration_secs >= m.max_duration_secs {
        anyhow::bail!(
            "moderation.min_duration_secs ({}) must be >= 0 and below max_duration_secs ({})",
            m.min_duration_secs,
            m.max_duration_secs
        );
    }
    if m.max_label_len == 0 {
        anyhow::bail!("moderation.max_label_len cannot be 0");
    }
    if m.report_hide_threshold == 0 {
        anyhow::bail!("moderation.report_hide_threshold cannot be 0");
    }

    let p = &config.probe;
    if p.timeout_secs == 0 {
        anyhow::bail!("probe.timeout_secs cannot be 0");
    }
    if p.window_secs <= 0.0 {
        anyhow::bail!("probe.window_secs must be positive");
    }
    if p.drift_tolerance_secs < p.window_secs {
        warnings.push(format!(
            "probe.drift_tolerance_secs ({}) is below window_secs ({}); most seeks will be rejected",
            p.drift_tolerance_secs, p.window_secs
        ));
    }
    if p.allow_private_hosts {
        warnings.push("probe.allow_private_hosts is enabled; stream URLs may target internal hosts".to_string());
    }
    if let Some(ref path) = p.ffprobe_path {
        if !path.exists() {
            warnings.push(format!("probe.ffprobe_path does not exist: {:?}", path));
        }
    }

    let c = &config.cache;
    if c.manifest_capacity == 0 || c.offset_capacity == 0 || c.oracle_capacity == 0 {
        anyhow::bail!("cache capacities must be at least 1");
    }
    if c.cleanup_interval_secs == 0 {
        anyhow::bail!("cache.cleanup_interval_secs cannot be 0");
    }

    let o = &config.oracles;
    for (name, url) in [
        ("introdb_url", &o.introdb_url),
        ("arm_url", &o.arm_url),
        ("aniskip_url", &o.aniskip_url),
        ("animeskip_url", &o.animeskip_url),
    ] {
        url::Url::parse(url).with_context(|| format!("oracles.{name} is not a valid URL"))?;
    }
    if o.animeskip_enabled && o.animeskip_client_id.is_none() {
        warnings.push("oracles.animeskip_client_id is unset; Anime-Skip lookups are disabled".to_string());
    }
    if o.requests_per_second == 0 {
        anyhow::bail!("oracles.requests_per_second cannot be 0");
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.contains("admin_api_key")));
        assert_eq!(config.cache.oracle_ttl_secs, 600);
        assert_eq!(config.moderation.report_hide_threshold, 3);
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000
admin_api_key = "secret"

[moderation]
max_duration_secs = 180.0

[oracles]
animeskip_client_id = "abc"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.admin_api_key.as_deref(), Some("secret"));
        assert_eq!(config.moderation.max_duration_secs, 180.0);
        assert_eq!(config.moderation.min_duration_secs, 5.0);
        assert_eq!(config.probe.window_secs, 10.0);
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_inverted_duration_band() {
        let mut config = Config::default();
        config.moderation.min_duration_secs = 400.0;
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("min_duration_secs"));
    }

    #[test]
    fn rejects_bad_oracle_url() {
        let mut config = Config::default();
        config.oracles.aniskip_url = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_file_is_error() {
        let result = load_config(Path::new("/nonexistent/skipsplice.toml"));
        assert!(result.is_err());
    }
}
