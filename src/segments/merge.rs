//! Overlap merging for segment lists.

use skipsplice_core::segment::DEFAULT_LABEL;
use skipsplice_core::Segment;

/// Gap (in whole seconds) still treated as touching.
const MERGE_GAP_SECS: f64 = 1.0;

/// Collapse overlapping or adjacent segments of the same video.
///
/// Bounds are rounded to whole seconds first. The result is sorted by
/// `(video_id, start)` and contains no two segments of one video closer than
/// a second apart. Merging is idempotent.
///
/// When two segments are absorbed into one run:
/// - `end` becomes the larger end;
/// - the label becomes "Intro" if either side was an intro;
/// - `verified` is true if either was verified;
/// - `report_count` keeps the maximum, `votes` are summed.
pub fn merge(mut segments: Vec<Segment>) -> Vec<Segment> {
    for seg in &mut segments {
        seg.start = seg.start.round();
        seg.end = seg.end.round();
    }

    segments.sort_by(|a, b| {
        a.video_id
            .cmp(&b.video_id)
            .then_with(|| a.start.total_cmp(&b.start))
    });

    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for next in segments {
        match merged.last_mut() {
            Some(current)
                if current.video_id == next.video_id
                    && next.start <= current.end + MERGE_GAP_SECS =>
            {
                absorb(current, next);
            }
            _ => merged.push(next),
        }
    }
    merged
}

fn absorb(current: &mut Segment, next: Segment) {
    current.end = current.end.max(next.end);
    if !current.is_intro() && next.is_intro() {
        current.label = DEFAULT_LABEL.to_string();
    }
    current.verified |= next.verified;
    current.report_count = current.report_count.max(next.report_count);
    current.votes += next.votes;
    current.series_skip &= next.series_skip;
}
