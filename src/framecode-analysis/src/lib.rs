//! framecode-analysis - Read-only analysis of framecode data files
//!
//! Loads a file into dense per-channel arrays, decodes event channels into
//! active intervals, computes summary statistics and exports them as CSV.

mod derived;
mod error;
mod export;
mod file;
mod intervals;
mod spec;
mod stats;

pub use derived::{DerivedChannelSpec, DerivedMethod};
pub use error::{AnalysisError, Result};
pub use export::{write_raw_csv, write_summary_csv, FileSummary};
pub use file::{EventSeries, FileAnalysis, PosSeries, ZoneInfo};
pub use intervals::{active_intervals, Bounds, Interval};
pub use spec::{AnalysisSpec, ChannelStats, StatisticSpec};
pub use stats::{StatArgs, StatValue, Statistic};
