use skipsplice_core::{Contributor, Result, Segment, SystemSource, VideoId};
use skipsplice_db::queries::segments as store;
use skipsplice_db::{get_conn, DbPool};

/// First link of the chain: the local community store.
pub struct CommunityLookup {
    db: DbPool,
    hide_threshold: u32,
}

impl CommunityLookup {
    pub fn new(db: DbPool, hide_threshold: u32) -> Self {
        Self { db, hide_threshold }
    }

    /// Best stored segment for `id`, series overlay included.
    ///
    /// Segments reported `hide_threshold` times or more are ignored. Among
    /// the rest, intro-labelled beats other labels, then verified beats
    /// unverified, then contributions not derived from chapters, then
    /// fewer reports. Episode entries win remaining ties over series ones.
    pub fn lookup(&self, id: &VideoId) -> Result<Option<Segment>> {
        let conn = get_conn(&self.db)?;
        let candidates = store::find_with_overlay(&conn, id)?;

        Ok(candidates
            .into_iter()
            .filter(|s| s.report_count < self.hide_threshold)
            .min_by_key(|s| {
                (
                    !s.is_intro(),
                    !s.verified,
                    s.source == Contributor::System(SystemSource::Chapters),
                    s.report_count,
                )
            }))
    }
}
