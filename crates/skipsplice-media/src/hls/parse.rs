//! Reader for byte-range media playlists.

use crate::error::{Error, Result};

/// A media playlist read back from M3U8 text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlaylist {
    pub version: Option<u32>,
    pub target_duration: Option<u32>,
    pub playlist_type: Option<String>,
    pub segments: Vec<ParsedSegment>,
    pub ended: bool,
}

/// One segment of a [`ParsedPlaylist`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSegment {
    pub duration: f64,
    pub uri: String,
    /// `(offset, length)`; an omitted offset continues the previous range.
    pub byte_range: Option<(u64, u64)>,
    pub discontinuity: bool,
}

impl ParsedPlaylist {
    /// Number of `#EXT-X-DISCONTINUITY` markers.
    pub fn discontinuity_count(&self) -> usize {
        self.segments.iter().filter(|s| s.discontinuity).count()
    }

    /// Sum of all byte-range lengths.
    pub fn total_bytes(&self) -> u64 {
        self.segments
            .iter()
            .filter_map(|s| s.byte_range)
            .map(|(_, len)| len)
            .sum()
    }

    /// Sum of all `#EXTINF` durations.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

/// Parse a media playlist.
///
/// Unknown tags are ignored. Structural problems (missing header, malformed
/// values, URIs without `#EXTINF`) are errors.
pub fn parse_media_playlist(text: &str) -> Result<ParsedPlaylist> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

    match lines.next() {
        Some((_, "#EXTM3U")) => {}
        _ => return Err(Error::MissingHeader),
    }

    let mut playlist = ParsedPlaylist::default();
    let mut pending_duration: Option<f64> = None;
    let mut pending_range: Option<(u64, u64)> = None;
    let mut pending_discontinuity = false;
    let mut next_offset = 0u64;

    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }

        if let Some(value) = line.strip_prefix("#EXT-X-VERSION:") {
            playlist.version = Some(
                value
                    .parse()
                    .map_err(|_| Error::invalid_tag("EXT-X-VERSION", line_no, value))?,
            );
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration = Some(
                value
                    .parse()
                    .map_err(|_| Error::invalid_tag("EXT-X-TARGETDURATION", line_no, value))?,
            );
        } else if let Some(value) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
            playlist.playlist_type = Some(value.to_string());
        } else if line == "#EXT-X-DISCONTINUITY" {
            pending_discontinuity = true;
        } else if line == "#EXT-X-ENDLIST" {
            playlist.ended = true;
        } else if let Some(value) = line.strip_prefix("#EXTINF:") {
            let duration = value.split(',').next().unwrap_or_default();
            pending_duration = Some(
                duration
                    .parse()
                    .map_err(|_| Error::invalid_tag("EXTINF", line_no, value))?,
            );
        } else if let Some(value) = line.strip_prefix("#EXT-X-BYTERANGE:") {
            let range = parse_byte_range(value, next_offset)
                .ok_or_else(|| Error::invalid_tag("EXT-X-BYTERANGE", line_no, value))?;
            next_offset = range.0 + range.1;
            pending_range = Some(range);
        } else if line.starts_with('#') {
            continue;
        } else {
            let duration = pending_duration
                .take()
                .ok_or(Error::MissingExtinf(line_no))?;
            playlist.segments.push(ParsedSegment {
                duration,
                uri: line.to_string(),
                byte_range: pending_range.take(),
                discontinuity: std::mem::take(&mut pending_discontinuity),
            });
        }
    }

    Ok(playlist)
}

/// `<length>[@<offset>]`
fn parse_byte_range(value: &str, default_offset: u64) -> Option<(u64, u64)> {
    match value.split_once('@') {
        Some((length, offset)) => Some((offset.parse().ok()?, length.parse().ok()?)),
        None => Some((default_offset, value.parse().ok()?)),
    }
}
