//! framecode-store - Timestamp-indexed channel storage
//!
//! Maps a stream of video frame timestamps, possibly interrupted by seeks,
//! onto per-channel value arrays and persists them in a SQLite container.

mod channel;
mod data_file;
mod error;
mod migrations;
mod names;
mod queries;
mod schema;
mod timestamps;

pub use channel::{Appended, Channel, ChannelData, SampleValue, TemporalArrays};
pub use data_file::DataFile;
pub use error::{Result, StoreError};
pub use migrations::SCHEMA_VERSION;
pub use names::fix_name;
pub use queries::SampleRow;
pub use schema::*;
pub use timestamps::{Resolved, Slot, TimestampIndex};

use rusqlite::{Connection, DatabaseName, OpenFlags};
use std::path::Path;
use tracing::{debug, info};

/// Database connection wrapper with initialization
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a read-write container, upgrading its schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening data file at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let mut db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an existing container without upgrading it
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening data file read-only at {:?}", path);

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let version = migrations::get_schema_version(&conn)?;
        if version != SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "file schema v{} needs an upgrade to v{}; open it read-write first",
                version, SCHEMA_VERSION
            )));
        }

        Ok(Self { conn })
    }

    /// Open an in-memory container (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("opening in-memory data file");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let mut db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Write a consistent snapshot of the container to `path`
    pub fn backup_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        debug!("backing up data file to {:?}", path);
        self.conn.backup(DatabaseName::Main, path, None)?;
        Ok(())
    }

    fn run_migrations(&mut self) -> Result<()> {
        migrations::run_all(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.connection().is_autocommit());
        assert_eq!(
            migrations::get_schema_version(db.connection()).unwrap(),
            SCHEMA_VERSION
        );
    }
}
