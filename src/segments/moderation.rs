//! Submission validation, trust, reports, and moderator actions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skipsplice_core::segment::DEFAULT_LABEL;
use skipsplice_core::{Contributor, Error, Result, Segment, SystemSource, VideoId};
use skipsplice_db::queries::segments::{self as store, IndexedSegment, SegmentDocument, StoreStats};
use skipsplice_db::{get_conn, DbPool};
use tracing::{debug, info};

use crate::config::ModerationConfig;
use crate::segments::merge;

/// A contribution from the public API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub video_id: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub label: Option<String>,
    /// Contributor identity (user id or trusted system name).
    pub source: String,
    /// Store under the series key so every episode inherits it.
    #[serde(default)]
    pub apply_to_series: bool,
}

/// Moderator decision for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
    Approve,
    Delete,
}

/// Position of a segment inside its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub video_id: VideoId,
    pub index: usize,
}

/// Moderation operations over the community document store.
pub struct Moderation {
    db: DbPool,
    config: ModerationConfig,
}

impl Moderation {
    pub fn new(db: DbPool, config: ModerationConfig) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Validate and store a contribution from the public API.
    ///
    /// Public callers are always plain users: a `source` naming one of the
    /// system identities is rejected, so nothing submitted here skips the
    /// pending queue. Returns `Ok(None)` when a near-identical segment
    /// already exists under the target key.
    pub fn submit(&self, req: SubmitRequest) -> Result<Option<Segment>> {
        let name = req.source.trim();
        if Contributor::from(name.to_ascii_lowercase().as_str()).is_trusted() {
            return Err(Error::validation(format!(
                "source '{name}' is reserved for system contributions"
            )));
        }
        let contributor = Contributor::User(name.to_string());
        self.accept(req, contributor)
    }

    /// Store a contribution from an operator import.
    ///
    /// Unlike [`submit`], `source` may name a system identity, in which case
    /// the segment is stored verified. Only reachable behind the admin key.
    ///
    /// [`submit`]: Moderation::submit
    pub fn import(&self, req: SubmitRequest) -> Result<Option<Segment>> {
        let contributor = Contributor::from(req.source.trim());
        self.accept(req, contributor)
    }

    fn accept(&self, req: SubmitRequest, contributor: Contributor) -> Result<Option<Segment>> {
        let video_id: VideoId = req.video_id.parse()?;
        if contributor.as_str().is_empty() {
            return Err(Error::validation("source must not be empty"));
        }
        let label = self.normalize_label(req.label.as_deref())?;
        self.check_bounds(req.start, req.end)?;

        let mut segment = Segment::new(video_id.clone(), req.start, req.end, label, contributor);
        let key = if req.apply_to_series {
            segment.series_skip = true;
            segment.video_id = video_id.to_series();
            video_id.to_series()
        } else {
            video_id
        };

        self.insert(&key, segment)
    }

    /// Store a segment found by an oracle or by chapter discovery.
    ///
    /// Runs the same validation and duplicate guard as [`submit`]. Chapter
    /// derived segments go in unverified so a moderator reviews them.
    ///
    /// [`submit`]: Moderation::submit
    pub fn backfill(
        &self,
        video_id: &VideoId,
        start: f64,
        end: f64,
        label: &str,
        source: SystemSource,
    ) -> Result<Option<Segment>> {
        let label = self.normalize_label(Some(label))?;
        self.check_bounds(start, end)?;

        let mut segment = Segment::new(video_id.clone(), start, end, label, source.into());
        if source == SystemSource::Chapters {
            segment.verified = false;
        }
        self.insert(video_id, segment)
    }

    fn insert(&self, key: &VideoId, segment: Segment) -> Result<Option<Segment>> {
        let conn = get_conn(&self.db)?;

        let existing = store::find(&conn, key)?;
        if existing
            .iter()
            .any(|s| s.is_near_duplicate(segment.start, segment.end))
        {
            debug!(video_id = %key, start = segment.start, end = segment.end, "Duplicate segment ignored");
            return Ok(None);
        }

        store::push(&conn, key, &segment)?;
        info!(
            video_id = %key,
            start = segment.start,
            end = segment.end,
            source = segment.source.as_str(),
            verified = segment.verified,
            "Segment stored"
        );
        Ok(Some(segment))
    }

    fn normalize_label(&self, label: Option<&str>) -> Result<String> {
        let label = label.map(str::trim).unwrap_or_default();
        if label.is_empty() {
            return Ok(DEFAULT_LABEL.to_string());
        }
        if label.chars().count() > self.config.max_label_len {
            return Err(Error::validation(format!(
                "label longer than {} characters",
                self.config.max_label_len
            )));
        }
        Ok(label.to_string())
    }

    fn check_bounds(&self, start: f64, end: f64) -> Result<()> {
        if !start.is_finite() || !end.is_finite() {
            return Err(Error::validation("start and end must be finite numbers"));
        }
        if start < 0.0 || end <= start {
            return Err(Error::validation(format!(
                "invalid interval {start}..{end}: need 0 <= start < end"
            )));
        }
        let duration = end - start;
        if duration < self.config.min_duration_secs || duration > self.config.max_duration_secs {
            return Err(Error::validation(format!(
                "segment duration {duration:.1}s outside {}..{}s",
                self.config.min_duration_secs, self.config.max_duration_secs
            )));
        }
        Ok(())
    }

    /// Count one report against a segment. `false` if it does not exist.
    pub fn report(&self, video_id: &VideoId, index: usize) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        let reported = store::increment_report(&conn, video_id, index)?;
        if reported {
            info!(video_id = %video_id, index, "Segment reported");
        }
        Ok(reported)
    }

    /// Approve or delete one segment. `false` if it does not exist.
    pub fn resolve(&self, video_id: &VideoId, index: usize, action: ResolveAction) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        let done = store::update(&conn, video_id, |segments| {
            if index >= segments.len() {
                return (false, false);
            }
            apply(segments, &[index], action);
            (true, true)
        })?;
        if done {
            info!(video_id = %video_id, index, ?action, "Segment resolved");
        }
        Ok(done)
    }

    /// Apply one action to many segments, possibly across documents.
    ///
    /// Items are grouped per key and each document is rewritten once, so
    /// indices always refer to the array as the moderator saw it. Returns
    /// how many segments were affected.
    pub fn resolve_bulk(&self, items: &[ItemRef], action: ResolveAction) -> Result<usize> {
        let mut by_key: BTreeMap<&VideoId, Vec<usize>> = BTreeMap::new();
        for item in items {
            by_key.entry(&item.video_id).or_default().push(item.index);
        }

        let conn = get_conn(&self.db)?;
        let mut affected = 0;
        for (key, mut indices) in by_key {
            if !store::exists(&conn, key)? {
                debug!(video_id = %key, "Bulk item for missing document skipped");
                continue;
            }
            indices.sort_unstable_by(|a, b| b.cmp(a));
            indices.dedup();

            affected += store::update(&conn, key, |segments| {
                indices.retain(|&i| i < segments.len());
                if indices.is_empty() {
                    return (false, 0);
                }
                apply(segments, &indices, action);
                (true, indices.len())
            })?;
        }

        info!(items = items.len(), affected, ?action, "Bulk moderation applied");
        Ok(affected)
    }

    /// Segments awaiting approval.
    pub fn pending(&self, limit: usize) -> Result<Vec<IndexedSegment>> {
        let conn = get_conn(&self.db)?;
        store::pending(&conn, limit)
    }

    /// Segments with at least one report.
    pub fn reported(&self, limit: usize) -> Result<Vec<IndexedSegment>> {
        let conn = get_conn(&self.db)?;
        store::reported(&conn, limit)
    }

    /// Merged view of everything that applies to `video_id`, series overlay
    /// included. Heavily reported segments are hidden.
    pub fn segments_for(&self, video_id: &VideoId) -> Result<Vec<Segment>> {
        let conn = get_conn(&self.db)?;
        let threshold = self.config.report_hide_threshold;

        let segments = store::find_with_overlay(&conn, video_id)?
            .into_iter()
            .filter(|s| s.report_count < threshold)
            .map(|mut s| {
                s.video_id = video_id.clone();
                s
            })
            .collect();
        Ok(merge(segments))
    }

    /// Raw documents of a whole series, series-level document included, for
    /// moderating every episode at once. Indices match [`resolve`].
    ///
    /// [`resolve`]: Moderation::resolve
    pub fn series_documents(&self, video_id: &VideoId) -> Result<Vec<SegmentDocument>> {
        let conn = get_conn(&self.db)?;
        store::find_by_series(&conn, &video_id.to_series().to_string())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = get_conn(&self.db)?;
        store::stats(&conn)
    }
}

/// `indices` must be in bounds and sorted descending.
fn apply(segments: &mut Vec<Segment>, indices: &[usize], action: ResolveAction) {
    for &i in indices {
        match action {
            ResolveAction::Approve => {
                segments[i].verified = true;
                segments[i].report_count = 0;
            }
            ResolveAction::Delete => {
                segments.remove(i);
            }
        }
    }
}
