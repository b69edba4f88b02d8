//! Database query functions

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::*;

/// Raw column pair of one channel sample (`a`, `b`)
pub type SampleRow = (f64, Option<f64>);

/// Metadata section names
pub const APP_CONFIG: &str = "app_config";
pub const DATA_CONFIG: &str = "data_config";
pub const VIDEO_METADATA: &str = "video_metadata";

/// Insert or replace one key of a file-level metadata section
pub fn set_config_value(conn: &Connection, section: &str, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO file_config (section, key, value) VALUES (?1, ?2, ?3)",
        params![section, key, value],
    )?;
    Ok(())
}

/// Read every key of a file-level metadata section, ordered by key
pub fn get_config_section(conn: &Connection, section: &str) -> Result<Vec<(String, String)>> {
    let mut stmt =
        conn.prepare("SELECT key, value FROM file_config WHERE section = ?1 ORDER BY key")?;
    let rows = stmt
        .query_map(params![section], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace every key of a metadata section
pub fn replace_config_section(
    conn: &Connection,
    section: &str,
    entries: &[(String, String)],
) -> Result<()> {
    conn.execute("DELETE FROM file_config WHERE section = ?1", params![section])?;
    for (key, value) in entries {
        set_config_value(conn, section, key, value)?;
    }
    Ok(())
}

/// Whether the file has been initialized (has a data_config section)
pub fn has_config_section(conn: &Connection, section: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM file_config WHERE section = ?1 LIMIT 1",
            params![section],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Register a new timestamp segment
pub fn insert_segment(conn: &Connection, segment: SegmentId) -> Result<()> {
    conn.execute("INSERT INTO segments (id) VALUES (?1)", params![segment.0])?;
    Ok(())
}

/// Append one timestamp to a segment
pub fn insert_timestamp(
    conn: &Connection,
    segment: SegmentId,
    offset: usize,
    t: Timestamp,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO timestamps (segment_id, offset_index, t) VALUES (?1, ?2, ?3)",
    )?;
    stmt.execute(params![segment.0, offset as i64, t])?;
    Ok(())
}

/// Load every segment's timestamps in offset order
pub fn load_timestamps(conn: &Connection) -> Result<BTreeMap<SegmentId, Vec<Timestamp>>> {
    let mut segments: BTreeMap<SegmentId, Vec<Timestamp>> = BTreeMap::new();

    let mut stmt = conn.prepare("SELECT id FROM segments ORDER BY id")?;
    for id in stmt.query_map([], |row| row.get::<_, i64>(0))? {
        segments.insert(SegmentId(id?), Vec::new());
    }

    let mut stmt =
        conn.prepare("SELECT segment_id, t FROM timestamps ORDER BY segment_id, offset_index")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)))?;
    for row in rows {
        let (segment, t) = row?;
        segments.entry(SegmentId(segment)).or_default().push(t);
    }

    Ok(segments)
}

/// Move every timestamp of `absorbed` onto the end of `into` and drop `absorbed`
pub fn merge_timestamp_segments(
    conn: &Connection,
    into: SegmentId,
    absorbed: SegmentId,
    base_len: usize,
) -> Result<()> {
    conn.execute(
        r#"UPDATE timestamps
           SET segment_id = ?1, offset_index = offset_index + ?2
           WHERE segment_id = ?3"#,
        params![into.0, base_len as i64, absorbed.0],
    )?;
    conn.execute("DELETE FROM segments WHERE id = ?1", params![absorbed.0])?;
    Ok(())
}

/// Create a channel block
pub fn insert_channel(conn: &Connection, id: ChannelId, kind: ChannelKind) -> Result<()> {
    conn.execute(
        "INSERT INTO channels (id, kind) VALUES (?1, ?2)",
        params![id.0, kind.as_str()],
    )?;
    Ok(())
}

/// Delete a channel block together with its config and values
pub fn delete_channel(conn: &Connection, id: ChannelId) -> Result<usize> {
    let removed = conn.execute("DELETE FROM channels WHERE id = ?1", params![id.0])?;
    Ok(removed)
}

/// List channel blocks in id order
pub fn list_channels(conn: &Connection) -> Result<Vec<(ChannelId, ChannelKind)>> {
    let mut stmt = conn.prepare("SELECT id, kind FROM channels ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, kind)| -> Result<(ChannelId, ChannelKind)> {
            Ok((ChannelId(id), kind.parse::<ChannelKind>()?))
        })
        .collect()
}

/// Replace a channel's metadata section
pub fn set_channel_config(
    conn: &Connection,
    id: ChannelId,
    entries: &[(String, String)],
) -> Result<()> {
    conn.execute("DELETE FROM channel_config WHERE channel_id = ?1", params![id.0])?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO channel_config (channel_id, key, value) VALUES (?1, ?2, ?3)",
    )?;
    for (key, value) in entries {
        stmt.execute(params![id.0, key, value])?;
    }
    Ok(())
}

/// Read a channel's metadata section
pub fn get_channel_config(conn: &Connection, id: ChannelId) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM channel_config WHERE channel_id = ?1 ORDER BY key")?;
    let rows = stmt
        .query_map(params![id.0], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Append samples to a channel's segment array starting at `start_offset`.
///
/// Bulk callers wrap this in a transaction.
pub fn insert_channel_values(
    conn: &Connection,
    id: ChannelId,
    segment: SegmentId,
    start_offset: usize,
    values: &[SampleRow],
) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare_cached(
        r#"INSERT INTO channel_values (channel_id, segment_id, offset_index, a, b)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )?;
    for (i, (a, b)) in values.iter().enumerate() {
        stmt.execute(params![id.0, segment.0, (start_offset + i) as i64, a, b])?;
    }
    Ok(())
}

/// Overwrite one sample in place
pub fn update_channel_value(
    conn: &Connection,
    id: ChannelId,
    segment: SegmentId,
    offset: usize,
    value: SampleRow,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        r#"INSERT OR REPLACE INTO channel_values (channel_id, segment_id, offset_index, a, b)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )?;
    stmt.execute(params![id.0, segment.0, offset as i64, value.0, value.1])?;
    Ok(())
}

/// Load a channel's arrays, keyed by segment, in offset order
pub fn load_channel_values(
    conn: &Connection,
    id: ChannelId,
) -> Result<BTreeMap<SegmentId, Vec<SampleRow>>> {
    let mut stmt = conn.prepare(
        r#"SELECT segment_id, offset_index, a, b FROM channel_values
           WHERE channel_id = ?1
           ORDER BY segment_id, offset_index"#,
    )?;
    let rows = stmt.query_map(params![id.0], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, Option<f64>>(3)?,
        ))
    })?;

    let mut arrays: BTreeMap<SegmentId, Vec<SampleRow>> = BTreeMap::new();
    for row in rows {
        let (segment, offset, a, b) = row?;
        let array = arrays.entry(SegmentId(segment)).or_default();
        if offset as usize != array.len() {
            return Err(crate::error::StoreError::Integrity(format!(
                "channel {} segment {} has a gap at offset {}",
                id.0, segment, array.len()
            )));
        }
        array.push((a, b));
    }
    Ok(arrays)
}

/// Move a channel's `absorbed` array onto the end of its `into` array
pub fn merge_channel_segments(
    conn: &Connection,
    id: ChannelId,
    into: SegmentId,
    absorbed: SegmentId,
    base_len: usize,
) -> Result<()> {
    conn.execute(
        r#"UPDATE channel_values
           SET segment_id = ?1, offset_index = offset_index + ?2
           WHERE channel_id = ?3 AND segment_id = ?4"#,
        params![into.0, base_len as i64, id.0, absorbed.0],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        migrations::run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_timestamp_segment_merge() {
        let conn = conn();
        insert_segment(&conn, SegmentId(0)).unwrap();
        insert_segment(&conn, SegmentId(1)).unwrap();
        insert_timestamp(&conn, SegmentId(0), 0, 0.0).unwrap();
        insert_timestamp(&conn, SegmentId(0), 1, 0.5).unwrap();
        insert_timestamp(&conn, SegmentId(1), 0, 2.0).unwrap();

        merge_timestamp_segments(&conn, SegmentId(0), SegmentId(1), 2).unwrap();

        let segments = load_timestamps(&conn).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[&SegmentId(0)], vec![0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let conn = conn();
        insert_segment(&conn, SegmentId(0)).unwrap();
        insert_timestamp(&conn, SegmentId(0), 0, 1.0).unwrap();
        assert!(insert_timestamp(&conn, SegmentId(0), 1, 1.0).is_err());
    }

    #[test]
    fn test_channel_delete_cascades() {
        let conn = conn();
        insert_segment(&conn, SegmentId(0)).unwrap();
        insert_channel(&conn, ChannelId(3), ChannelKind::Pos).unwrap();
        set_channel_config(&conn, ChannelId(3), &[("name".into(), "nose\n".into())]).unwrap();
        insert_channel_values(&conn, ChannelId(3), SegmentId(0), 0, &[(1.0, Some(2.0))]).unwrap();

        assert_eq!(load_channel_values(&conn, ChannelId(3)).unwrap()[&SegmentId(0)].len(), 1);
        assert_eq!(delete_channel(&conn, ChannelId(3)).unwrap(), 1);
        assert!(get_channel_config(&conn, ChannelId(3)).unwrap().is_empty());
        assert!(load_channel_values(&conn, ChannelId(3)).unwrap().is_empty());
    }
}
