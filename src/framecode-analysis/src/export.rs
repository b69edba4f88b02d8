//! CSV export of raw per-frame data and accumulated statistics

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::file::FileAnalysis;
use crate::spec::ChannelStats;

/// Create `path` for writing, refusing to replace an existing file
fn create_new(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => AnalysisError::OutputExists(path.to_path_buf()),
            _ => AnalysisError::Io(e),
        })
}

/// Property/value rows describing the file
fn metadata_rows(analysis: &FileAnalysis) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = analysis
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if analysis.missed_timestamps {
        rows.push((
            "missed_timestamps".into(),
            "not all video frames were watched".into(),
        ));
        for t in &analysis.missing_timestamp_values {
            rows.push(("missing_timestamp".into(), t.to_string()));
        }
    }
    rows
}

/// Property/value rows describing one zone
fn zone_rows(analysis: &FileAnalysis, index: usize) -> Result<Vec<(String, String)>> {
    let zone = &analysis.zone_channels()[index];
    let mut rows = vec![("name".to_string(), zone.name().to_string())];
    if let Some(color) = zone.config.color {
        rows.push(("color".into(), serde_json::to_string(&color)?));
    }
    if let Some(shape) = &zone.config.shape {
        rows.push(("shape".into(), serde_json::to_string(shape)?));
        rows.push(("area".into(), shape.area().to_string()));
        let c = shape.centroid();
        rows.push(("centroid".into(), format!("({}, {})", c.x, c.y)));
    }
    Ok(rows)
}

/// Write one file's dense data as CSV.
///
/// Columns: `metadata`, `value`, `timestamp`, one `event:<name>` per event
/// channel, `pos:<name>:x` and `pos:<name>:y` per position channel and a
/// `zone:<name>:property` / `zone:<name>:value` pair per zone.
pub fn write_raw_csv(analysis: &FileAnalysis, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(create_new(path)?);

    let mut header = vec![
        "metadata".to_string(),
        "value".to_string(),
        "timestamp".to_string(),
    ];
    for event in analysis.event_channels() {
        header.push(format!("event:{}", event.name()));
    }
    for pos in analysis.pos_channels() {
        header.push(format!("pos:{}:x", pos.name()));
        header.push(format!("pos:{}:y", pos.name()));
    }
    for zone in analysis.zone_channels() {
        header.push(format!("zone:{}:property", zone.name()));
        header.push(format!("zone:{}:value", zone.name()));
    }
    writer.write_record(&header)?;

    let metadata = metadata_rows(analysis);
    let zones = (0..analysis.zone_channels().len())
        .map(|i| zone_rows(analysis, i))
        .collect::<Result<Vec<_>>>()?;
    let n_rows = zones
        .iter()
        .map(Vec::len)
        .chain([analysis.timestamps.len(), metadata.len()])
        .max()
        .unwrap_or(0);

    let pair = |rows: &[(String, String)], i: usize| -> (String, String) {
        rows.get(i).cloned().unwrap_or_default()
    };

    for i in 0..n_rows {
        let mut record = Vec::with_capacity(header.len());
        let (key, value) = pair(&metadata, i);
        record.push(key);
        record.push(value);

        match analysis.timestamps.get(i) {
            Some(t) => {
                record.push(t.to_string());
                for event in analysis.event_channels() {
                    record.push(u8::from(event.data[i]).to_string());
                }
                for pos in analysis.pos_channels() {
                    record.push(pos.data[i].x.to_string());
                    record.push(pos.data[i].y.to_string());
                }
            }
            None => {
                let blanks = 1 + analysis.event_channels().len() + 2 * analysis.pos_channels().len();
                record.extend(std::iter::repeat(String::new()).take(blanks));
            }
        }

        for rows in &zones {
            let (key, value) = pair(rows, i);
            record.push(key);
            record.push(value);
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!("wrote raw data of {} to {:?}", analysis.display_name(), path);
    Ok(())
}

/// One summary row source: a file's statistics, or the error that stopped it
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file: String,
    pub missed_timestamps: Option<bool>,
    pub result: std::result::Result<Vec<ChannelStats>, String>,
}

/// Write the accumulated statistics of a batch as CSV, one row per channel per file.
///
/// Files that failed contribute a single row carrying the error text.
pub fn write_summary_csv(
    path: impl AsRef<Path>,
    labels: &[String],
    files: &[FileSummary],
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(create_new(path)?);

    let mut header: Vec<String> = ["file", "missed timestamps", "channel_kind", "channel"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(labels.iter().cloned());
    header.push("error".into());
    writer.write_record(&header)?;

    let mut rows = 0usize;
    for summary in files {
        let missed = summary
            .missed_timestamps
            .map(|m| m.to_string())
            .unwrap_or_default();
        match &summary.result {
            Ok(channels) => {
                for stats in channels {
                    let mut record = vec![
                        summary.file.clone(),
                        missed.clone(),
                        stats.kind.to_string(),
                        stats.channel.clone(),
                    ];
                    for label in labels {
                        record.push(
                            stats
                                .values
                                .get(label)
                                .map(|v| v.to_string())
                                .unwrap_or_default(),
                        );
                    }
                    record.push(String::new());
                    writer.write_record(&record)?;
                    rows += 1;
                }
            }
            Err(error) => {
                let mut record = vec![summary.file.clone(), missed, String::new(), String::new()];
                record.extend(labels.iter().map(|_| String::new()));
                record.push(error.clone());
                writer.write_record(&record)?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    info!("wrote {} summary rows to {:?}", rows, path);
    Ok(())
}
