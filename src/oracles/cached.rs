use std::sync::Arc;

use async_trait::async_trait;
use skipsplice_core::VideoId;

use super::{OracleSegment, OracleSource, TimingOracle};
use crate::cache::TtlCache;

pub type OracleCache = TtlCache<VideoId, Option<OracleSegment>>;

/// Remembers every answer of an oracle, "nothing found" included.
///
/// Errors are passed through uncached.
pub struct CachedOracle {
    inner: Arc<dyn TimingOracle>,
    cache: Arc<OracleCache>,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn TimingOracle>, cache: Arc<OracleCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<OracleCache> {
        &self.cache
    }
}

#[async_trait]
impl TimingOracle for CachedOracle {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn source(&self) -> OracleSource {
        self.inner.source()
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    async fn lookup(&self, id: &VideoId) -> anyhow::Result<Option<OracleSegment>> {
        if let Some(hit) = self.cache.get(id) {
            tracing::trace!(oracle = self.name(), video_id = %id, found = hit.is_some(), "oracle cache hit");
            return Ok(hit);
        }

        let answer = self.inner.lookup(id).await?;
        self.cache.insert(id.clone(), answer.clone());
        Ok(answer)
    }
}
