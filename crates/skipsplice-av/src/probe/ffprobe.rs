//! ffprobe-backed [`ByteProber`].

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, LOCATION};
use reqwest::redirect::Policy;
use skipsplice_core::{Error, Result};
use tracing::{debug, warn};

use super::packets::{self, split_windows};
use super::{ByteProber, Chapter, ProbeSettings, ResolvedSource};
use crate::{ToolCommand, UrlGuard};

/// Follow at most `max` hops and stop before any hop the guard blocks.
fn redirect_policy(guard: UrlGuard, max: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            attempt.error("too many redirects")
        } else if guard.blocks(attempt.url()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

/// Probes remote media by shelling out to ffprobe.
///
/// ffprobe reads the remote file over HTTP with range requests, so only the
/// container index and the requested packet windows are transferred.
pub struct FfprobeProber {
    settings: ProbeSettings,
    guard: UrlGuard,
    client: reqwest::Client,
}

/// What a HEAD request learned about a source.
enum Head {
    Reached {
        final_url: String,
        content_length: Option<u64>,
    },
    /// The redirect policy refused to follow a hop to this URL.
    Blocked(String),
}

impl FfprobeProber {
    /// Create a prober with the given settings.
    pub fn new(settings: ProbeSettings) -> Result<Self> {
        let guard = UrlGuard::new(settings.allow_private_hosts);
        let client = reqwest::Client::builder()
            .redirect(redirect_policy(guard, settings.max_redirects))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            settings,
            guard,
            client,
        })
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.settings.ffprobe.clone());
        cmd.timeout(self.settings.timeout).args(["-v", "error"]);
        cmd
    }

    /// Arguments decoding only the video packets inside `intervals`.
    fn packet_command(&self, url: &str, intervals: &[f64]) -> ToolCommand {
        let read_intervals = intervals
            .iter()
            .map(|t| format!("{:.3}%+{}", t.max(0.0), self.settings.window_secs))
            .collect::<Vec<_>>()
            .join(",");

        let mut cmd = self.command();
        cmd.args([
            "-select_streams",
            "v:0",
            "-read_intervals",
            read_intervals.as_str(),
            "-show_entries",
            "packet=pos,pts_time",
            "-of",
            "json",
        ])
        .arg(url);
        cmd
    }

    async fn head(&self, url: &str) -> Result<Head> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Error::upstream("media-host", e.to_string()))?;

        // Only a stopped redirect leaves a 3xx here.
        if resp.status().is_redirection() {
            let target = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| resp.url().join(loc).ok())
                .ok_or_else(|| Error::upstream("media-host", "redirect without a usable Location"))?;
            return Ok(Head::Blocked(target.to_string()));
        }

        if !resp.status().is_success() {
            return Err(Error::upstream(
                "media-host",
                format!("HEAD returned {}", resp.status()),
            ));
        }

        let final_url = resp.url().to_string();
        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|len| *len > 0);

        Ok(Head::Reached {
            final_url,
            content_length,
        })
    }

    async fn try_duration(&self, url: &str) -> Result<Option<f64>> {
        let mut cmd = self.command();
        cmd.args(["-show_entries", "format=duration", "-of", "json"])
            .arg(url);
        let output = cmd.execute().await?;
        Ok(packets::parse_duration(&output.stdout))
    }

    async fn try_packets(&self, url: &str, intervals: &[f64]) -> Result<Vec<packets::Packet>> {
        let output = self.packet_command(url, intervals).execute().await?;
        packets::parse_packets(&output.stdout)
    }

    async fn try_chapters(&self, url: &str) -> Result<Vec<Chapter>> {
        let mut cmd = self.command();
        cmd.args(["-show_chapters", "-of", "json"]).arg(url);
        let output = cmd.execute().await?;
        packets::parse_chapters(&output.stdout)
    }
}

#[async_trait]
impl ByteProber for FfprobeProber {
    async fn resolve(&self, url: &str) -> ResolvedSource {
        let (final_url, content_length) = match self.head(url).await {
            Ok(Head::Reached {
                final_url,
                content_length,
            }) => (final_url, content_length),
            Ok(Head::Blocked(target)) => {
                warn!(url, target = %target, "redirect to internal host refused");
                return ResolvedSource::unresolved(&target);
            }
            Err(e) => {
                debug!(url, error = %e, "redirect resolution failed; using original URL");
                (url.to_string(), None)
            }
        };

        // Hostnames can still resolve inward; never hand those to ffprobe.
        if final_url != url {
            if let Err(e) = self.guard.check(&final_url).await {
                warn!(url, target = %final_url, error = %e, "redirect target rejected");
                return ResolvedSource::unresolved(&final_url);
            }
        }

        let duration = match self.try_duration(&final_url).await {
            Ok(d) => d,
            Err(e) => {
                debug!(url = %final_url, error = %e, "duration probe failed");
                None
            }
        };

        ResolvedSource {
            final_url,
            content_length,
            duration,
        }
    }

    async fn find_offset(&self, url: &str, t: f64) -> u64 {
        match self.try_packets(url, &[t]).await {
            Ok(packets) => {
                let offset =
                    packets::select_offset(&packets, t, self.settings.drift_tolerance_secs);
                debug!(url, t, offset, packets = packets.len(), "offset probe finished");
                offset
            }
            Err(e) => {
                warn!(url, t, error = %e, "offset probe failed");
                0
            }
        }
    }

    async fn find_offsets(&self, url: &str, t1: f64, t2: f64) -> Option<(u64, u64)> {
        let packets = match self.try_packets(url, &[t1, t2]).await {
            Ok(p) => p,
            Err(e) => {
                warn!(url, t1, t2, error = %e, "dual offset probe failed");
                return None;
            }
        };

        let (first, second) = split_windows(&packets, t1, t2, self.settings.window_secs);
        let drift = self.settings.drift_tolerance_secs;
        let start = packets::select_offset(first, t1, drift);
        let end = packets::select_offset(second, t2, drift);
        debug!(url, t1, t2, start, end, "dual offset probe finished");

        (start > 0 && end > start).then_some((start, end))
    }

    async fn find_chapters(&self, url: &str) -> Vec<Chapter> {
        self.try_chapters(url).await.unwrap_or_else(|e| {
            debug!(url, error = %e, "chapter probe failed");
            Vec::new()
        })
    }
}
