//! HLS media playlist structures.

use std::fmt;

/// Byte-range addressing requires protocol version 4.
const BYTERANGE_VERSION: u32 = 4;

/// Media playlist for a single rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number.
    pub media_sequence: u32,
    /// Segment entries.
    pub segments: Vec<SegmentEntry>,
    /// Whether this is an ended playlist.
    pub ended: bool,
}

impl MediaPlaylist {
    /// Create an empty VOD playlist.
    pub fn vod() -> Self {
        Self {
            target_duration: 1,
            media_sequence: 0,
            segments: Vec::new(),
            ended: true,
        }
    }

    /// Append a segment and widen the target duration to cover it.
    pub fn push(&mut self, segment: SegmentEntry) {
        let ceil = segment.duration.ceil().max(1.0) as u32;
        self.target_duration = self.target_duration.max(ceil);
        self.segments.push(segment);
    }

    /// Render to M3U8 text.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MediaPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:{BYTERANGE_VERSION}")?;
        writeln!(f, "#EXT-X-TARGETDURATION:{}", self.target_duration)?;
        writeln!(f, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence)?;
        writeln!(f, "#EXT-X-PLAYLIST-TYPE:VOD")?;

        for segment in &self.segments {
            if segment.discontinuity {
                writeln!(f, "#EXT-X-DISCONTINUITY")?;
            }
            writeln!(f, "#EXTINF:{:.3},", segment.duration)?;
            if let Some((offset, length)) = segment.byte_range {
                writeln!(f, "#EXT-X-BYTERANGE:{length}@{offset}")?;
            }
            writeln!(f, "{}", segment.uri)?;
        }

        if self.ended {
            writeln!(f, "#EXT-X-ENDLIST")?;
        }

        Ok(())
    }
}

/// A segment entry in the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEntry {
    /// Duration in seconds.
    pub duration: f64,
    /// Segment URI.
    pub uri: String,
    /// Discontinuity before this segment.
    pub discontinuity: bool,
    /// Byte range (offset, length).
    pub byte_range: Option<(u64, u64)>,
}

impl SegmentEntry {
    /// A byte-range slice of `uri`.
    pub fn range(uri: impl Into<String>, offset: u64, length: u64, duration: f64) -> Self {
        Self {
            duration,
            uri: uri.into(),
            discontinuity: false,
            byte_range: Some((offset, length)),
        }
    }

    /// Mark this segment as following a discontinuity.
    pub fn after_discontinuity(mut self) -> Self {
        self.discontinuity = true;
        self
    }
}
