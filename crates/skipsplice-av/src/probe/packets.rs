//! ffprobe JSON output parsing and offset selection policy.

use serde::Deserialize;
use skipsplice_core::{Error, Result};

use super::Chapter;

#[derive(Debug, Deserialize)]
struct FfprobePackets {
    #[serde(default)]
    packets: Vec<FfprobePacket>,
}

#[derive(Debug, Deserialize)]
struct FfprobePacket {
    pts_time: Option<String>,
    pos: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeChapters {
    #[serde(default)]
    chapters: Vec<FfprobeChapter>,
}

#[derive(Debug, Deserialize)]
struct FfprobeChapter {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormatOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// A demuxed packet with a known byte position and presentation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet {
    pub pts: f64,
    pub pos: u64,
}

/// Parse `-show_entries packet=pos,pts_time -of json` output.
///
/// Packets missing either field (ffprobe prints `N/A`) are dropped.
pub fn parse_packets(json: &str) -> Result<Vec<Packet>> {
    let output: FfprobePackets = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("invalid ffprobe packet output: {e}")))?;

    Ok(output
        .packets
        .into_iter()
        .filter_map(|p| {
            let pts = p.pts_time?.parse::<f64>().ok()?;
            let pos = p.pos?.parse::<u64>().ok()?;
            Some(Packet { pts, pos })
        })
        .collect())
}

/// Parse `-show_chapters -of json` output.
pub fn parse_chapters(json: &str) -> Result<Vec<Chapter>> {
    let output: FfprobeChapters = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("invalid ffprobe chapter output: {e}")))?;

    Ok(output
        .chapters
        .into_iter()
        .filter_map(|c| {
            let start = c.start_time?.parse::<f64>().ok()?;
            let end = c.end_time?.parse::<f64>().ok()?;
            Some(Chapter {
                start,
                end,
                title: c.tags.title.unwrap_or_default(),
            })
        })
        .collect())
}

/// Parse `-show_entries format=duration -of json` output.
pub fn parse_duration(json: &str) -> Option<f64> {
    let output: FfprobeFormatOutput = serde_json::from_str(json).ok()?;
    output
        .format
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Pick the byte offset for `target` from packets decoded around it.
///
/// Returns `0` ("no reliable offset") when there are no packets or when the
/// first packet lands further than `drift_tolerance` from the target, which
/// means the seek failed. Otherwise the first packet at or after the target
/// wins, falling back to the packet closest to it.
pub fn select_offset(packets: &[Packet], target: f64, drift_tolerance: f64) -> u64 {
    let Some(first) = packets.first() else {
        return 0;
    };

    if (first.pts - target).abs() > drift_tolerance {
        return 0;
    }

    if let Some(p) = packets.iter().find(|p| p.pts >= target) {
        return p.pos;
    }

    packets
        .iter()
        .min_by(|a, b| {
            (a.pts - target)
                .abs()
                .partial_cmp(&(b.pts - target).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|p| p.pos)
        .unwrap_or(0)
}

/// Split packets from a two-interval probe into the first and second window.
///
/// ffprobe emits the intervals in order; the split point is the first
/// packet past the boundary between the two windows.
pub(crate) fn split_windows(
    packets: &[Packet],
    t1: f64,
    t2: f64,
    window: f64,
) -> (&[Packet], &[Packet]) {
    let boundary = if t2 - t1 > window {
        (t1 + window + t2) / 2.0
    } else {
        (t1 + t2) / 2.0
    };
    let split = packets
        .iter()
        .position(|p| p.pts >= boundary)
        .unwrap_or(packets.len());
    packets.split_at(split)
}
