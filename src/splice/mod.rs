//! Splice orchestration: timing resolution, byte probing, and manifest
//! rendering for one stream request.
//!
//! The orchestrator walks a fixed ladder and always produces a playable
//! manifest:
//!
//! 1. timing from the caller, else from the [`TimingChain`], else from an
//!    intro chapter embedded in the file;
//! 2. **spliced**: both bounds known and both byte offsets found;
//! 3. **single skip**: jump to the end (or start) offset;
//! 4. **pass-through**: the whole file.
//!
//! Results are cached per `(resolved url, start, end)` and concurrent
//! requests for the same key share one computation.

pub use skipsplice_av::UrlGuard;

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use skipsplice_av::{ByteProber, Chapter, ResolvedSource};
use skipsplice_core::{Error, Result, SystemSource, VideoId};
use skipsplice_media::ManifestBuilder;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::oracles::TimingChain;
use crate::probe::millis;

/// Which rung of the ladder produced a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpliceStage {
    Spliced,
    SingleSkip,
    PassThrough,
}

impl SpliceStage {
    /// Value of the `X-Skip-Stage` response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpliceStage::Spliced => "spliced",
            SpliceStage::SingleSkip => "single-skip",
            SpliceStage::PassThrough => "pass-through",
        }
    }
}

impl std::fmt::Display for SpliceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One manifest request.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    pub url: String,
    pub video_id: Option<VideoId>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpliceOutcome {
    pub playlist: String,
    pub stage: SpliceStage,
    /// Served from the manifest cache.
    pub cached: bool,
}

/// `(resolved url, start ms, end ms)`
pub type ManifestKey = (String, Option<i64>, Option<i64>);

#[derive(Debug, Clone)]
pub struct CachedManifest {
    playlist: String,
    stage: SpliceStage,
}

pub type ManifestCache = TtlCache<ManifestKey, CachedManifest>;

impl CachedManifest {
    fn outcome(self, cached: bool) -> SpliceOutcome {
        SpliceOutcome {
            playlist: self.playlist,
            stage: self.stage,
            cached,
        }
    }
}

pub struct SpliceOrchestrator {
    guard: UrlGuard,
    prober: Arc<dyn ByteProber>,
    chain: Arc<TimingChain>,
    builder: ManifestBuilder,
    manifests: Arc<ManifestCache>,
    inflight: DashMap<ManifestKey, Arc<Notify>>,
}

impl SpliceOrchestrator {
    pub fn new(
        guard: UrlGuard,
        prober: Arc<dyn ByteProber>,
        chain: Arc<TimingChain>,
        builder: ManifestBuilder,
        manifests: Arc<ManifestCache>,
    ) -> Self {
        Self {
            guard,
            prober,
            chain,
            builder,
            manifests,
            inflight: DashMap::new(),
        }
    }

    pub fn manifests(&self) -> &Arc<ManifestCache> {
        &self.manifests
    }

    pub fn chain(&self) -> &Arc<TimingChain> {
        &self.chain
    }

    /// Produce the manifest for `req`.
    ///
    /// Only an unsafe or malformed URL, or a redirect towards an unsafe host,
    /// is an error; every probing failure degrades to a lower stage.
    pub async fn manifest(self: &Arc<Self>, req: StreamRequest) -> Result<SpliceOutcome> {
        let url = self.guard.check(&req.url).await?;
        let source = self.prober.resolve(url.as_str()).await;
        if source.final_url != url.as_str() {
            self.guard.check(&source.final_url).await.map_err(|e| {
                warn!(url = %url, target = %source.final_url, "redirect target rejected");
                e
            })?;
        }

        let (start, end) = match (req.start, req.end) {
            (None, None) => match &req.video_id {
                Some(id) => match self.chain.resolve(id).await {
                    Some(timing) => (Some(timing.start()), Some(timing.end())),
                    None => (None, None),
                },
                None => (None, None),
            },
            known => known,
        };
        for t in [start, end].into_iter().flatten() {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::validation(format!("invalid skip timestamp: {t}")));
            }
        }

        let key: ManifestKey = (
            source.final_url.clone(),
            start.map(millis),
            end.map(millis),
        );

        loop {
            if let Some(hit) = self.manifests.get(&key) {
                debug!(url = %key.0, stage = %hit.stage, "Manifest cache hit");
                return Ok(hit.outcome(true));
            }

            match self.inflight.entry(key.clone()) {
                Entry::Occupied(e) => {
                    // Register interest before releasing the map shard so a
                    // leader finishing in between still wakes us.
                    let notify = e.get().clone();
                    let notified = notify.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    drop(e);
                    notified.await;
                    // Uncacheable or failed leader: loop and maybe lead.
                }
                Entry::Vacant(e) => {
                    let notify = Arc::new(Notify::new());
                    e.insert(notify.clone());

                    // A leader may have finished between the cache check and
                    // taking the slot.
                    if let Some(hit) = self.manifests.get(&key) {
                        self.inflight.remove(&key);
                        notify.notify_waiters();
                        return Ok(hit.outcome(true));
                    }

                    let slot = LeaderSlot {
                        owner: Arc::clone(self),
                        key,
                        notify,
                    };
                    let job = Job {
                        source,
                        video_id: req.video_id,
                        start,
                        end,
                    };
                    // Detached so a dropped client neither cancels the probe
                    // nor leaves the inflight entry behind.
                    let task = tokio::spawn(async move {
                        let computed = slot.owner.compute(job).await;
                        if let Some(manifest) = computed.to_cache() {
                            slot.owner.manifests.insert(slot.key.clone(), manifest);
                        }
                        drop(slot);
                        computed.into_outcome()
                    });

                    return task
                        .await
                        .map_err(|e| Error::Internal(format!("splice task failed: {e}")));
                }
            }
        }
    }

    async fn compute(&self, job: Job) -> Computed {
        let Job {
            source,
            video_id,
            mut start,
            mut end,
        } = job;
        let url = source.final_url.as_str();

        if start.is_none() && end.is_none() {
            if let Some(chapter) = self.discover_chapter(url).await {
                start = Some(chapter.start);
                end = Some(chapter.end);
                if let Some(id) = video_id {
                    self.chain.backfill().submit(
                        id,
                        chapter.start,
                        chapter.end,
                        "Intro".to_string(),
                        SystemSource::Chapters,
                    );
                }
            }
        }

        if let (Some(s), Some(e)) = (start, end) {
            if e > s {
                match self.prober.find_offsets(url, s, e).await {
                    Some((start_off, end_off))
                        if ManifestBuilder::can_splice(start_off, end_off, source.content_length) =>
                    {
                        info!(url, start = s, end = e, start_off, end_off, "Spliced manifest");
                        let playlist = self.builder.spliced(
                            url,
                            source.duration,
                            start_off,
                            end_off,
                            source.content_length,
                        );
                        return Computed::stored(playlist, SpliceStage::Spliced);
                    }
                    Some((start_off, end_off)) => {
                        debug!(url, start_off, end_off, length = ?source.content_length, "Offsets do not fit the file");
                    }
                    None => debug!(url, start = s, end = e, "Two-point probe failed"),
                }
            }
        }

        if let Some(target) = end.or(start) {
            if target > 0.0 {
                let offset = self.prober.find_offset(url, target).await;
                if ManifestBuilder::can_skip_to(offset, source.content_length) {
                    info!(url, target, offset, "Single-skip manifest");
                    let playlist =
                        self.builder
                            .simple(url, source.duration, offset, source.content_length);
                    return Computed::stored(playlist, SpliceStage::SingleSkip);
                }
                // The host may answer later; do not pin a pass-through.
                debug!(url, target, "Single-point probe failed, passing through uncached");
                return Computed::transient(self.pass_through(&source), SpliceStage::PassThrough);
            }
        }

        debug!(url, "Pass-through manifest");
        Computed::stored(self.pass_through(&source), SpliceStage::PassThrough)
    }

    async fn discover_chapter(&self, url: &str) -> Option<Chapter> {
        let chapter = self
            .prober
            .find_chapters(url)
            .await
            .into_iter()
            .find(|c| c.is_intro() && c.end > c.start)?;
        info!(url, start = chapter.start, end = chapter.end, title = %chapter.title, "Intro chapter found");
        Some(chapter)
    }

    fn pass_through(&self, source: &ResolvedSource) -> String {
        self.builder
            .simple(&source.final_url, source.duration, 0, source.content_length)
    }
}

/// Held by the task computing a key. Dropping it, on success or unwind,
/// clears the in-flight entry and wakes the followers.
struct LeaderSlot {
    owner: Arc<SpliceOrchestrator>,
    key: ManifestKey,
    notify: Arc<Notify>,
}

impl Drop for LeaderSlot {
    fn drop(&mut self) {
        self.owner.inflight.remove(&self.key);
        self.notify.notify_waiters();
    }
}

struct Job {
    source: ResolvedSource,
    video_id: Option<VideoId>,
    start: Option<f64>,
    end: Option<f64>,
}

struct Computed {
    manifest: CachedManifest,
    cacheable: bool,
}

impl Computed {
    fn stored(playlist: String, stage: SpliceStage) -> Self {
        Self {
            manifest: CachedManifest { playlist, stage },
            cacheable: true,
        }
    }

    fn transient(playlist: String, stage: SpliceStage) -> Self {
        Self {
            manifest: CachedManifest { playlist, stage },
            cacheable: false,
        }
    }

    fn to_cache(&self) -> Option<CachedManifest> {
        self.cacheable.then(|| self.manifest.clone())
    }

    fn into_outcome(self) -> SpliceOutcome {
        self.manifest.outcome(false)
    }
}
