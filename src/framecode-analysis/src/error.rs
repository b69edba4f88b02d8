//! Analysis error types

use std::path::PathBuf;
use thiserror::Error;

use framecode_store::{ChannelKind, StoreError};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spec parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no {kind} channel named {name:?}")]
    UnknownChannel { kind: ChannelKind, name: String },

    #[error("an event channel named {0:?} already exists")]
    DuplicateChannel(String),

    #[error("channel {name:?} has {found} samples but the file has {expected} timestamps")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("statistic {statistic} requires the {argument:?} argument")]
    MissingArgument {
        statistic: &'static str,
        argument: &'static str,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("zone channel {0:?} has no shape")]
    MissingShape(String),

    #[error("derived channels form a cycle: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("refusing to overwrite {}", .0.display())]
    OutputExists(PathBuf),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
