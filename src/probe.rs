//! Caching decorator for byte probers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skipsplice_av::{require_tool, ByteProber, Chapter, ProbeSettings, ResolvedSource};

use crate::cache::TtlCache;
use crate::config::ProbeConfig;

/// Timestamp key with millisecond resolution.
pub(crate) fn millis(t: f64) -> i64 {
    (t * 1000.0).round() as i64
}

pub type OffsetCache = TtlCache<(String, i64), u64>;
pub type OffsetPairCache = TtlCache<(String, i64, i64), (u64, u64)>;
pub type SourceCache = TtlCache<String, ResolvedSource>;

/// Prober settings for `config`, with ffprobe located on disk.
pub fn probe_settings(config: &ProbeConfig) -> skipsplice_core::Result<ProbeSettings> {
    Ok(ProbeSettings {
        ffprobe: require_tool("ffprobe", config.ffprobe_path.as_deref())?,
        timeout: Duration::from_secs(config.timeout_secs),
        window_secs: config.window_secs,
        drift_tolerance_secs: config.drift_tolerance_secs,
        max_redirects: config.max_redirects,
        allow_private_hosts: config.allow_private_hosts,
    })
}

/// Wraps a [`ByteProber`] and remembers successful offset lookups.
///
/// Failed lookups (`0` / `None`) are never stored so a later request can
/// retry once the upstream host behaves. Resolved sources are stored only
/// when the host reported a length or duration. Chapter probes pass through.
pub struct CachedProber {
    inner: Arc<dyn ByteProber>,
    sources: Arc<SourceCache>,
    offsets: Arc<OffsetCache>,
    offset_pairs: Arc<OffsetPairCache>,
}

impl CachedProber {
    pub fn new(
        inner: Arc<dyn ByteProber>,
        sources: Arc<SourceCache>,
        offsets: Arc<OffsetCache>,
        offset_pairs: Arc<OffsetPairCache>,
    ) -> Self {
        Self {
            inner,
            sources,
            offsets,
            offset_pairs,
        }
    }

    pub fn sources(&self) -> &Arc<SourceCache> {
        &self.sources
    }

    pub fn offsets(&self) -> &Arc<OffsetCache> {
        &self.offsets
    }

    pub fn offset_pairs(&self) -> &Arc<OffsetPairCache> {
        &self.offset_pairs
    }
}

#[async_trait]
impl ByteProber for CachedProber {
    async fn resolve(&self, url: &str) -> ResolvedSource {
        let key = url.to_string();
        if let Some(source) = self.sources.get(&key) {
            return source;
        }

        let source = self.inner.resolve(url).await;
        if source.content_length.is_some() || source.duration.is_some() {
            self.sources.insert(key, source.clone());
        }
        source
    }

    async fn find_offset(&self, url: &str, t: f64) -> u64 {
        let key = (url.to_string(), millis(t));
        if let Some(offset) = self.offsets.get(&key) {
            tracing::trace!(url, t, offset, "offset cache hit");
            return offset;
        }

        let offset = self.inner.find_offset(url, t).await;
        if offset > 0 {
            self.offsets.insert(key, offset);
        }
        offset
    }

    async fn find_offsets(&self, url: &str, t1: f64, t2: f64) -> Option<(u64, u64)> {
        let key = (url.to_string(), millis(t1), millis(t2));
        if let Some(pair) = self.offset_pairs.get(&key) {
            tracing::trace!(url, t1, t2, "offset pair cache hit");
            return Some(pair);
        }

        let pair = self.inner.find_offsets(url, t1, t2).await?;
        self.offset_pairs.insert(key, pair);
        Some(pair)
    }

    async fn find_chapters(&self, url: &str) -> Vec<Chapter> {
        self.inner.find_chapters(url).await
    }
}
