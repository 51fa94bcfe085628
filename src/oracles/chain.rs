use std::sync::Arc;

use skipsplice_core::{SystemSource, VideoId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CommunityLookup, Timing, TimingOracle};
use crate::segments::Moderation;

/// Detached writes of discovered timings into the community store.
///
/// Writes go through the moderation insert path (validation and duplicate
/// guard) under a system identity. They never block the caller; failures
/// are logged.
#[derive(Clone)]
pub struct Backfill {
    moderation: Arc<Moderation>,
}

impl Backfill {
    pub fn new(moderation: Arc<Moderation>) -> Self {
        Self { moderation }
    }

    pub fn submit(
        &self,
        video_id: VideoId,
        start: f64,
        end: f64,
        label: String,
        source: SystemSource,
    ) -> JoinHandle<()> {
        let moderation = self.moderation.clone();
        tokio::task::spawn_blocking(move || {
            match moderation.backfill(&video_id, start, end, &label, source) {
                Ok(Some(_)) => {
                    info!(video_id = %video_id, source = source.as_str(), start, end, "Backfilled segment")
                }
                Ok(None) => debug!(video_id = %video_id, "Backfill skipped, segment already stored"),
                Err(e) => warn!(video_id = %video_id, source = source.as_str(), error = %e, "Backfill failed"),
            }
        })
    }
}

/// Community store first, then external oracles in priority order.
pub struct TimingChain {
    community: CommunityLookup,
    oracles: Vec<Arc<dyn TimingOracle>>,
    backfill: Backfill,
}

impl TimingChain {
    pub fn new(
        community: CommunityLookup,
        oracles: Vec<Arc<dyn TimingOracle>>,
        backfill: Backfill,
    ) -> Self {
        Self {
            community,
            oracles,
            backfill,
        }
    }

    pub fn backfill(&self) -> &Backfill {
        &self.backfill
    }

    /// The first timing any source knows for `id`.
    ///
    /// Failures of individual sources are logged and skipped. An oracle hit
    /// is backfilled into the community store in the background.
    pub async fn resolve(&self, id: &VideoId) -> Option<Timing> {
        match self.community.lookup(id) {
            Ok(Some(segment)) => {
                debug!(video_id = %id, "Timing found in community store");
                return Some(Timing::Community(segment));
            }
            Ok(None) => {}
            Err(e) => warn!(video_id = %id, error = %e, "Community lookup failed"),
        }

        for oracle in &self.oracles {
            if !oracle.is_available() {
                continue;
            }
            match oracle.lookup(id).await {
                Ok(Some(found)) => {
                    info!(
                        video_id = %id,
                        oracle = oracle.name(),
                        start = found.start,
                        end = found.end,
                        "Timing found by oracle"
                    );
                    self.backfill.submit(
                        id.clone(),
                        found.start,
                        found.end,
                        found.label.clone(),
                        found.source.system_source(),
                    );
                    return Some(Timing::Oracle(found));
                }
                Ok(None) => debug!(video_id = %id, oracle = oracle.name(), "No timing"),
                Err(e) => warn!(video_id = %id, oracle = oracle.name(), error = %e, "Oracle lookup failed"),
            }
        }

        None
    }
}
