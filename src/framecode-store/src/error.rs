//! Storage error types

use thiserror::Error;

use crate::schema::{ChannelId, ChannelKind, SegmentId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration error: {0}")]
    Migration(String),

    /// Caller protocol violation (out-of-order append, array length mismatch, ...).
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("cannot merge segment {absorbed} into segment {into}: the primary segment is never merged away")]
    UnsupportedMerge { into: SegmentId, absorbed: SegmentId },

    #[error("timestamp not found: {0}")]
    TimestampNotFound(f64),

    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("segment not found: {0}")]
    SegmentNotFound(SegmentId),

    #[error("channel {id} is a {found} channel, expected {expected}")]
    WrongChannelKind {
        id: ChannelId,
        expected: ChannelKind,
        found: ChannelKind,
    },

    #[error("channel {id} is a {found} channel and holds no per-frame values")]
    NotTemporal { id: ChannelId, found: ChannelKind },

    #[error("a channel named {0:?} already exists")]
    DuplicateName(String),

    #[error("file is opened read-only")]
    ReadOnly,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Integrity violations are fatal for the current recording action.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Integrity(_) | StoreError::UnsupportedMerge { .. }
        )
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
