//! Segment document queries.
//!
//! Each row of `skip_documents` holds the JSON array of segments for one
//! [`VideoId`] key. Episode lookups read the episode document and overlay the
//! series-level document.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use skipsplice_core::{Error, Result, Segment, VideoId};

/// All segments stored under one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDocument {
    pub key: VideoId,
    pub segments: Vec<Segment>,
}

/// A segment with its position inside its document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedSegment {
    pub video_id: VideoId,
    pub index: usize,
    pub segment: Segment,
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub documents: u64,
    pub segments: u64,
    pub pending: u64,
    pub reported: u64,
}

fn decode(json: &str) -> Result<Vec<Segment>> {
    serde_json::from_str(json).map_err(Error::database)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::database)
}

fn parse_key(key: &str) -> Result<VideoId> {
    key.parse()
        .map_err(|e| Error::database(format!("corrupt document key {key:?}: {e}")))
}

/// Segments stored under exactly `key`; empty when no document exists.
pub fn find(conn: &Connection, key: &VideoId) -> Result<Vec<Segment>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT segments FROM skip_documents WHERE key = ?1",
            params![key.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::database)?;

    match json {
        Some(json) => decode(&json),
        None => Ok(Vec::new()),
    }
}

/// Every document of a series: the series-level document and all of its
/// episode documents.
pub fn find_by_series(conn: &Connection, series: &str) -> Result<Vec<SegmentDocument>> {
    let pattern = format!("{}:%", escape_like(series));
    let mut stmt = conn
        .prepare(
            "SELECT key, segments FROM skip_documents
             WHERE key = ?1 OR key LIKE ?2 ESCAPE '\\'
             ORDER BY key",
        )
        .map_err(Error::database)?;

    let rows = stmt
        .query_map(params![series, pattern], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(Error::database)?;

    let mut docs = Vec::new();
    for row in rows {
        let (key, json) = row.map_err(Error::database)?;
        docs.push(SegmentDocument {
            key: parse_key(&key)?,
            segments: decode(&json)?,
        });
    }
    Ok(docs)
}

/// Episode segments followed by the series-level overlay.
///
/// For a series-level `key` this is the same as [`find`].
pub fn find_with_overlay(conn: &Connection, key: &VideoId) -> Result<Vec<Segment>> {
    let mut segments = find(conn, key)?;
    if !key.is_series_level() {
        segments.extend(find(conn, &key.to_series())?);
    }
    Ok(segments)
}

/// Append one segment with an atomic array push, creating the document on
/// first write.
pub fn push(conn: &Connection, key: &VideoId, segment: &Segment) -> Result<()> {
    conn.execute(
        "INSERT INTO skip_documents (key, segments) VALUES (?1, json_array(json(?2)))
         ON CONFLICT(key) DO UPDATE SET
             segments = json_insert(segments, '$[#]', json(?2)),
             updated_at = datetime('now')",
        params![key.to_string(), encode(segment)?],
    )
    .map_err(Error::database)?;
    Ok(())
}

/// Atomically increment `reportCount` of the segment at `index`.
///
/// Returns `false` when the document or index does not exist.
pub fn increment_report(conn: &Connection, key: &VideoId, index: usize) -> Result<bool> {
    let affected = conn
        .execute(
            "UPDATE skip_documents SET
                 segments = json_set(
                     segments,
                     '$[' || ?2 || '].reportCount',
                     coalesce(json_extract(segments, '$[' || ?2 || '].reportCount'), 0) + 1
                 ),
                 updated_at = datetime('now')
             WHERE key = ?1 AND ?2 < json_array_length(segments)",
            params![key.to_string(), index as i64],
        )
        .map_err(Error::database)?;
    Ok(affected > 0)
}

/// Replace the whole segment array of `key`. An empty array removes the
/// document.
pub fn replace(conn: &Connection, key: &VideoId, segments: &[Segment]) -> Result<()> {
    if segments.is_empty() {
        conn.execute(
            "DELETE FROM skip_documents WHERE key = ?1",
            params![key.to_string()],
        )
        .map_err(Error::database)?;
        return Ok(());
    }

    conn.execute(
        "INSERT INTO skip_documents (key, segments) VALUES (?1, json(?2))
         ON CONFLICT(key) DO UPDATE SET segments = json(?2), updated_at = datetime('now')",
        params![key.to_string(), encode(segments)?],
    )
    .map_err(Error::database)?;
    Ok(())
}

/// Read-modify-write of one document inside an immediate transaction.
///
/// `edit` receives the current array (empty when absent); the result is
/// written back only when `edit` reports a change.
pub fn update<R>(
    conn: &Connection,
    key: &VideoId,
    edit: impl FnOnce(&mut Vec<Segment>) -> (bool, R),
) -> Result<R> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(Error::database)?;

    let mut segments = find(&tx, key)?;
    let (changed, result) = edit(&mut segments);
    if changed {
        replace(&tx, key, &segments)?;
    }

    tx.commit().map_err(Error::database)?;
    Ok(result)
}

/// Number of documents stored under `key` (0 or 1).
pub fn count(conn: &Connection, key: &VideoId) -> Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM skip_documents WHERE key = ?1",
        params![key.to_string()],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
    .map_err(Error::database)
}

/// Whether any document exists for `key`.
pub fn exists(conn: &Connection, key: &VideoId) -> Result<bool> {
    Ok(count(conn, key)? > 0)
}

/// Segments awaiting moderation (`verified = false`), oldest documents first.
pub fn pending(conn: &Connection, limit: usize) -> Result<Vec<IndexedSegment>> {
    indexed_where(
        conn,
        "json_extract(e.value, '$.verified') IS NOT 1",
        "d.updated_at, d.key, e.key",
        limit,
    )
}

/// Segments with at least one report, most reported first.
pub fn reported(conn: &Connection, limit: usize) -> Result<Vec<IndexedSegment>> {
    indexed_where(
        conn,
        "coalesce(json_extract(e.value, '$.reportCount'), 0) > 0",
        "json_extract(e.value, '$.reportCount') DESC, d.updated_at, d.key, e.key",
        limit,
    )
}

fn indexed_where(
    conn: &Connection,
    filter: &str,
    order: &str,
    limit: usize,
) -> Result<Vec<IndexedSegment>> {
    let sql = format!(
        "SELECT d.key, e.key, e.value FROM skip_documents d, json_each(d.segments) e
         WHERE {filter} ORDER BY {order} LIMIT ?1"
    );

    let mut stmt = conn.prepare(&sql).map_err(Error::database)?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(Error::database)?;

    let mut out = Vec::new();
    for row in rows {
        let (key, index, json) = row.map_err(Error::database)?;
        out.push(IndexedSegment {
            video_id: parse_key(&key)?,
            index: index as usize,
            segment: serde_json::from_str(&json).map_err(Error::database)?,
        });
    }
    Ok(out)
}

/// Aggregate counts for the moderation dashboard.
pub fn stats(conn: &Connection) -> Result<StoreStats> {
    let documents: i64 = conn
        .query_row("SELECT COUNT(*) FROM skip_documents", [], |row| row.get(0))
        .map_err(Error::database)?;

    let (segments, pending, reported): (i64, i64, i64) = conn
        .query_row(
            "SELECT
                 COUNT(*),
                 coalesce(SUM(json_extract(e.value, '$.verified') IS NOT 1), 0),
                 coalesce(SUM(coalesce(json_extract(e.value, '$.reportCount'), 0) > 0), 0)
             FROM skip_documents d, json_each(d.segments) e",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(Error::database)?;

    Ok(StoreStats {
        documents: documents as u64,
        segments: segments as u64,
        pending: pending as u64,
        reported: reported as u64,
    })
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, PooledConnection};
    use skipsplice_core::Contributor;

    fn setup_test_db() -> PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn id(s: &str) -> VideoId {
        s.parse().unwrap()
    }

    fn seg(key: &str, start: f64, end: f64, source: &str) -> Segment {
        Segment::new(id(key), start, end, "Intro", Contributor::from(source))
    }

    #[test]
    fn test_find_missing_is_empty() {
        let conn = setup_test_db();
        assert!(find(&conn, &id("tt1:1:1")).unwrap().is_empty());
        assert_eq!(count(&conn, &id("tt1:1:1")).unwrap(), 0);
    }

    #[test]
    fn test_push_appends() {
        let conn = setup_test_db();
        let key = id("tt1:1:1");

        push(&conn, &key, &seg("tt1:1:1", 10.0, 90.0, "u1")).unwrap();
        push(&conn, &key, &seg("tt1:1:1", 1200.0, 1290.0, "u2")).unwrap();

        let segments = find(&conn, &key).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 10.0);
        assert_eq!(segments[1].source, Contributor::from("u2"));
        assert!(exists(&conn, &key).unwrap());
    }

    #[test]
    fn test_increment_report() {
        let conn = setup_test_db();
        let key = id("tt1:1:1");
        push(&conn, &key, &seg("tt1:1:1", 10.0, 90.0, "u1")).unwrap();
        push(&conn, &key, &seg("tt1:1:1", 100.0, 190.0, "u1")).unwrap();

        assert!(increment_report(&conn, &key, 1).unwrap());
        assert!(increment_report(&conn, &key, 1).unwrap());
        assert!(!increment_report(&conn, &key, 2).unwrap());
        assert!(!increment_report(&conn, &id("tt2"), 0).unwrap());

        let segments = find(&conn, &key).unwrap();
        assert_eq!(segments[0].report_count, 0);
        assert_eq!(segments[1].report_count, 2);
    }

    #[test]
    fn test_replace_and_delete() {
        let conn = setup_test_db();
        let key = id("tt1");
        push(&conn, &key, &seg("tt1", 10.0, 90.0, "u1")).unwrap();

        let replacement = vec![seg("tt1", 5.0, 65.0, "imported")];
        replace(&conn, &key, &replacement).unwrap();
        assert_eq!(find(&conn, &key).unwrap(), replacement);

        replace(&conn, &key, &[]).unwrap();
        assert!(!exists(&conn, &key).unwrap());
    }

    #[test]
    fn test_update_only_writes_on_change() {
        let conn = setup_test_db();
        let key = id("tt1:1:1");
        push(&conn, &key, &seg("tt1:1:1", 10.0, 90.0, "u1")).unwrap();

        let len = update(&conn, &key, |segments| (false, segments.len())).unwrap();
        assert_eq!(len, 1);

        update(&conn, &key, |segments| {
            segments[0].verified = true;
            (true, ())
        })
        .unwrap();
        assert!(find(&conn, &key).unwrap()[0].verified);
    }

    #[test]
    fn test_series_overlay() {
        let conn = setup_test_db();
        push(&conn, &id("tt1:1:1"), &seg("tt1:1:1", 10.0, 90.0, "u1")).unwrap();
        push(&conn, &id("tt1"), &seg("tt1", 0.0, 60.0, "u2")).unwrap();
        push(&conn, &id("tt10:1:1"), &seg("tt10:1:1", 0.0, 60.0, "u3")).unwrap();

        let overlay = find_with_overlay(&conn, &id("tt1:1:1")).unwrap();
        assert_eq!(overlay.len(), 2);
        assert_eq!(overlay[1].source, Contributor::from("u2"));

        let other = find_with_overlay(&conn, &id("tt1:1:2")).unwrap();
        assert_eq!(other.len(), 1);

        let docs = find_by_series(&conn, "tt1").unwrap();
        let keys: Vec<String> = docs.iter().map(|d| d.key.to_string()).collect();
        assert_eq!(keys, ["tt1", "tt1:1:1"]);
    }

    #[test]
    fn test_series_prefix_escapes_wildcards() {
        let conn = setup_test_db();
        push(&conn, &id("a_b:1:1"), &seg("a_b:1:1", 0.0, 60.0, "u")).unwrap();
        push(&conn, &id("axb:1:1"), &seg("axb:1:1", 0.0, 60.0, "u")).unwrap();

        let docs = find_by_series(&conn, "a_b").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key.to_string(), "a_b:1:1");
    }

    #[test]
    fn test_pending_and_reported_views() {
        let conn = setup_test_db();
        let key = id("tt1:1:1");
        push(&conn, &key, &seg("tt1:1:1", 10.0, 90.0, "aniskip")).unwrap();
        push(&conn, &key, &seg("tt1:1:1", 100.0, 190.0, "u1")).unwrap();
        increment_report(&conn, &key, 0).unwrap();

        let pending = pending(&conn, 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].index, 1);
        assert_eq!(pending[0].video_id, key);

        let reported = reported(&conn, 10).unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].index, 0);
        assert_eq!(reported[0].segment.report_count, 1);

        assert!(super::pending(&conn, 0).unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let conn = setup_test_db();
        assert_eq!(stats(&conn).unwrap(), StoreStats::default());

        push(&conn, &id("tt1:1:1"), &seg("tt1:1:1", 10.0, 90.0, "introdb")).unwrap();
        push(&conn, &id("tt1:1:1"), &seg("tt1:1:1", 100.0, 190.0, "u1")).unwrap();
        push(&conn, &id("tt2"), &seg("tt2", 0.0, 60.0, "u2")).unwrap();
        increment_report(&conn, &id("tt2"), 0).unwrap();

        assert_eq!(
            stats(&conn).unwrap(),
            StoreStats {
                documents: 2,
                segments: 3,
                pending: 2,
                reported: 1,
            }
        );
    }
}
