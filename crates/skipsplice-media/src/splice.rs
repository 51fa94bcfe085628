//! Splice manifest layouts.
//!
//! All layouts address the same source URL through byte ranges:
//!
//! - **simple**: a leading init segment from byte 0, then everything from
//!   `offset` to the end of the file. A discontinuity separates the two when
//!   bytes were skipped.
//! - **spliced**: `[0, start_offset)`, a discontinuity, then
//!   `[end_offset, total)`.
//! - **pass-through**: `simple` with offset 0; the whole file, contiguous.
//!
//! Segment durations are estimated from byte share of the file and are
//! advisory only.

use crate::hls::{MediaPlaylist, SegmentEntry};

/// Size of the leading segment; large enough for container headers and
/// codec initialization data.
pub const DEFAULT_INIT_SEGMENT_BYTES: u64 = 2 * 1024 * 1024;

/// Length used for the trailing range when the file size is unknown.
pub const UNKNOWN_LENGTH_SENTINEL: u64 = 1_000_000_000_000;

/// Duration assumed when the source duration could not be probed.
const FALLBACK_DURATION_SECS: f64 = 3600.0;

/// Floor for estimated `#EXTINF` values.
const MIN_SEGMENT_SECS: f64 = 0.5;

/// Renders splice manifests.
#[derive(Debug, Clone, Copy)]
pub struct ManifestBuilder {
    init_segment_bytes: u64,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_INIT_SEGMENT_BYTES)
    }
}

impl ManifestBuilder {
    pub fn new(init_segment_bytes: u64) -> Self {
        Self {
            init_segment_bytes: init_segment_bytes.max(1),
        }
    }

    pub fn init_segment_bytes(&self) -> u64 {
        self.init_segment_bytes
    }

    /// Whether cutting `[start_offset, end_offset)` leaves a real splice.
    ///
    /// Both offsets must lie inside the file, in order, with something
    /// played before the cut.
    pub fn can_splice(start_offset: u64, end_offset: u64, total_length: Option<u64>) -> bool {
        let total = Estimate::new(None, total_length).total;
        start_offset > 0 && end_offset > start_offset && end_offset < total
    }

    /// Whether jumping to `offset` actually skips bytes.
    pub fn can_skip_to(offset: u64, total_length: Option<u64>) -> bool {
        offset > 0 && offset < Estimate::new(None, total_length).total
    }

    /// Playlist that skips straight to `offset` after the init segment.
    ///
    /// `offset == 0` (or an offset at or past a known end of file) yields the
    /// pass-through layout.
    pub fn simple(
        &self,
        url: &str,
        duration: Option<f64>,
        offset: u64,
        total_length: Option<u64>,
    ) -> String {
        let est = Estimate::new(duration, total_length);
        let total = est.total;
        let mut playlist = MediaPlaylist::vod();

        let offset = if Self::can_skip_to(offset, total_length) { offset } else { 0 };
        let lead = if offset == 0 {
            self.init_segment_bytes.min(total)
        } else {
            self.init_segment_bytes.min(offset)
        };

        playlist.push(SegmentEntry::range(url, 0, lead, est.secs(lead)));

        // Where the tail resumes; `lead` itself when nothing is skipped.
        let resume = if offset > lead { offset } else { lead };
        if resume < total {
            let tail_len = total - resume;
            let mut tail = SegmentEntry::range(url, resume, tail_len, est.secs(tail_len));
            if resume != lead {
                tail = tail.after_discontinuity();
            }
            playlist.push(tail);
        }

        playlist.render()
    }

    /// Playlist that plays `[0, start_offset)` then jumps to `end_offset`.
    ///
    /// Offsets that do not describe a forward jump inside the file fall back
    /// to the pass-through layout.
    pub fn spliced(
        &self,
        url: &str,
        duration: Option<f64>,
        start_offset: u64,
        end_offset: u64,
        total_length: Option<u64>,
    ) -> String {
        if !Self::can_splice(start_offset, end_offset, total_length) {
            return self.simple(url, duration, 0, total_length);
        }
        let est = Estimate::new(duration, total_length);

        let tail_len = est.total - end_offset;
        let mut playlist = MediaPlaylist::vod();
        playlist.push(SegmentEntry::range(
            url,
            0,
            start_offset,
            est.secs(start_offset),
        ));
        playlist.push(
            SegmentEntry::range(url, end_offset, tail_len, est.secs(tail_len))
                .after_discontinuity(),
        );

        playlist.render()
    }
}

/// Pass-through-capable simple layout with the default init segment size.
pub fn simple(url: &str, duration: Option<f64>, offset: u64, total_length: Option<u64>) -> String {
    ManifestBuilder::default().simple(url, duration, offset, total_length)
}

/// Spliced layout with the default init segment size.
pub fn spliced(
    url: &str,
    duration: Option<f64>,
    start_offset: u64,
    end_offset: u64,
    total_length: Option<u64>,
) -> String {
    ManifestBuilder::default().spliced(url, duration, start_offset, end_offset, total_length)
}

/// Byte-to-seconds conversion for one source file.
struct Estimate {
    total: u64,
    secs_per_byte: f64,
}

impl Estimate {
    fn new(duration: Option<f64>, total_length: Option<u64>) -> Self {
        let total = total_length
            .filter(|t| *t > 0)
            .unwrap_or(UNKNOWN_LENGTH_SENTINEL);
        let duration = duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(FALLBACK_DURATION_SECS);
        Self {
            total,
            secs_per_byte: duration / total as f64,
        }
    }

    fn secs(&self, bytes: u64) -> f64 {
        (bytes as f64 * self.secs_per_byte).max(MIN_SEGMENT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::parse_media_playlist;

    const URL: &str = "https://cdn.example.com/show/ep1.mkv";
    const MIB: u64 = 1024 * 1024;

    #[test]
    fn spliced_has_one_discontinuity_and_fits_file() {
        let total = 700 * MIB;
        let text = spliced(URL, Some(1420.0), 30 * MIB, 52 * MIB, Some(total));
        let p = parse_media_playlist(&text).unwrap();

        assert_eq!(p.discontinuity_count(), 1);
        assert!(p.total_bytes() <= total);
        assert_eq!(p.segments.len(), 2);
        assert_eq!(p.segments[0].byte_range, Some((0, 30 * MIB)));
        assert_eq!(p.segments[1].byte_range, Some((52 * MIB, total - 52 * MIB)));
        assert!(p.segments[1].discontinuity);
        assert!(p.segments.iter().all(|s| s.uri == URL));
        assert!(p.ended);
        assert_eq!(p.playlist_type.as_deref(), Some("VOD"));
    }

    #[test]
    fn splice_ranges_must_fit_the_file() {
        let total = Some(700 * MIB);
        assert!(ManifestBuilder::can_splice(30 * MIB, 52 * MIB, total));
        assert!(!ManifestBuilder::can_splice(30 * MIB, 700 * MIB, total));
        assert!(!ManifestBuilder::can_splice(0, 52 * MIB, total));
        assert!(!ManifestBuilder::can_splice(52 * MIB, 30 * MIB, total));
        assert!(ManifestBuilder::can_splice(30 * MIB, 800 * MIB, None));

        assert!(ManifestBuilder::can_skip_to(52 * MIB, total));
        assert!(!ManifestBuilder::can_skip_to(700 * MIB, total));
        assert!(!ManifestBuilder::can_skip_to(0, total));
    }

    #[test]
    fn spliced_target_duration_covers_segments() {
        let text = spliced(URL, Some(1420.0), 30 * MIB, 52 * MIB, Some(700 * MIB));
        let p = parse_media_playlist(&text).unwrap();
        let target = p.target_duration.unwrap() as f64;
        assert!(p.segments.iter().all(|s| s.duration.round() <= target));
    }

    #[test]
    fn simple_skip_after_init_segment() {
        let total = 500 * MIB;
        let text = simple(URL, Some(1400.0), 20 * MIB, Some(total));
        let p = parse_media_playlist(&text).unwrap();

        assert_eq!(p.segments.len(), 2);
        assert_eq!(p.segments[0].byte_range, Some((0, DEFAULT_INIT_SEGMENT_BYTES)));
        assert!(!p.segments[0].discontinuity);
        assert_eq!(p.segments[1].byte_range, Some((20 * MIB, total - 20 * MIB)));
        assert!(p.segments[1].discontinuity);
        assert!(p.total_bytes() <= total);
    }

    #[test]
    fn pass_through_is_contiguous() {
        let total = 500 * MIB;
        let text = simple(URL, Some(1400.0), 0, Some(total));
        let p = parse_media_playlist(&text).unwrap();

        assert_eq!(p.discontinuity_count(), 0);
        assert_eq!(p.total_bytes(), total);
        assert_eq!(p.segments[1].byte_range, Some((DEFAULT_INIT_SEGMENT_BYTES, total - DEFAULT_INIT_SEGMENT_BYTES)));
    }

    #[test]
    fn offset_inside_init_segment_is_contiguous() {
        let text = simple(URL, Some(100.0), MIB, Some(10 * MIB));
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.discontinuity_count(), 0);
        assert_eq!(p.segments[0].byte_range, Some((0, MIB)));
        assert_eq!(p.segments[1].byte_range, Some((MIB, 9 * MIB)));
    }

    #[test]
    fn tiny_file_is_one_segment() {
        let text = simple(URL, Some(2.0), 0, Some(1000));
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.segments.len(), 1);
        assert_eq!(p.segments[0].byte_range, Some((0, 1000)));
    }

    #[test]
    fn unknown_length_uses_sentinel() {
        let text = spliced(URL, None, 30 * MIB, 52 * MIB, None);
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.discontinuity_count(), 1);
        assert_eq!(
            p.segments[1].byte_range,
            Some((52 * MIB, UNKNOWN_LENGTH_SENTINEL - 52 * MIB))
        );
    }

    #[test]
    fn backwards_splice_falls_back_to_pass_through() {
        let text = spliced(URL, Some(100.0), 52 * MIB, 30 * MIB, Some(700 * MIB));
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.discontinuity_count(), 0);
        assert_eq!(p.total_bytes(), 700 * MIB);
    }

    #[test]
    fn offset_past_end_falls_back_to_pass_through() {
        let text = simple(URL, Some(100.0), 20 * MIB, Some(10 * MIB));
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.discontinuity_count(), 0);
        assert_eq!(p.total_bytes(), 10 * MIB);
    }

    #[test]
    fn durations_are_proportional() {
        let text = spliced(URL, Some(1000.0), 100, 600, Some(1000));
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.segments[0].duration, 100.0);
        assert_eq!(p.segments[1].duration, 400.0);
        assert_eq!(p.target_duration, Some(400));
    }

    #[test]
    fn custom_init_segment_size() {
        let builder = ManifestBuilder::new(4096);
        let text = builder.simple(URL, Some(10.0), 0, Some(10_000));
        let p = parse_media_playlist(&text).unwrap();
        assert_eq!(p.segments[0].byte_range, Some((0, 4096)));
    }
}
