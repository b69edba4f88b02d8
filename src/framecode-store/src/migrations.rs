//! Database migrations

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending migrations
pub fn run_all(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "file schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < SCHEMA_VERSION {
        info!("running migrations from v{} to v{}", current_version, SCHEMA_VERSION);

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initial schema (v1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("applying migration v1: initial schema");

    conn.execute_batch(r#"
        -- Key/value metadata sections (app_config, data_config, video_metadata)
        CREATE TABLE IF NOT EXISTS file_config (
            section TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (section, key)
        );

        -- One row per timestamp segment
        CREATE TABLE IF NOT EXISTS segments (
            id INTEGER PRIMARY KEY
        );

        -- Timestamp arrays, dense offsets within each segment
        CREATE TABLE IF NOT EXISTS timestamps (
            segment_id INTEGER NOT NULL,
            offset_index INTEGER NOT NULL,
            t REAL NOT NULL,
            PRIMARY KEY (segment_id, offset_index),
            FOREIGN KEY (segment_id) REFERENCES segments(id)
        );

        -- Channel blocks
        CREATE TABLE IF NOT EXISTS channels (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL
        );

        -- Channel metadata sections
        CREATE TABLE IF NOT EXISTS channel_config (
            channel_id INTEGER NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (channel_id, key),
            FOREIGN KEY (channel_id) REFERENCES channels(id) ON DELETE CASCADE
        );

        -- Per-channel, per-segment value arrays
        CREATE TABLE IF NOT EXISTS channel_values (
            channel_id INTEGER NOT NULL,
            segment_id INTEGER NOT NULL,
            offset_index INTEGER NOT NULL,
            a REAL NOT NULL,
            b REAL,
            PRIMARY KEY (channel_id, segment_id, offset_index),
            FOREIGN KEY (channel_id) REFERENCES channels(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_timestamps_t ON timestamps(t);
    "#)?;

    Ok(())
}
