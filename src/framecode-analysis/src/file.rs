//! Dense, read-only view of a finished data file

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use framecode_store::{
    Channel, ChannelConfig, ChannelId, ChannelKind, DataFile, Position, SampleValue, SegmentId,
    Shape, TemporalArrays, Timestamp,
};

use crate::error::{AnalysisError, Result};
use crate::intervals::{Bounds, Interval};

/// An event channel as one dense boolean array
#[derive(Debug)]
pub struct EventSeries {
    /// `None` for channels derived during analysis
    pub id: Option<ChannelId>,
    pub config: ChannelConfig,
    pub data: Vec<bool>,
    pub(crate) intervals: RefCell<HashMap<Bounds, Vec<Interval>>>,
}

impl EventSeries {
    pub fn new(id: Option<ChannelId>, config: ChannelConfig, data: Vec<bool>) -> Self {
        Self {
            id,
            config,
            data,
            intervals: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_derived(&self) -> bool {
        self.id.is_none()
    }
}

/// A position channel as one dense array of samples
#[derive(Debug, Clone)]
pub struct PosSeries {
    pub id: ChannelId,
    pub config: ChannelConfig,
    pub data: Vec<Position>,
}

impl PosSeries {
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

#[derive(Debug, Clone)]
pub struct ZoneInfo {
    pub id: ChannelId,
    pub config: ChannelConfig,
}

impl ZoneInfo {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn shape(&self) -> Result<&Shape> {
        self.config
            .shape
            .as_ref()
            .ok_or_else(|| AnalysisError::MissingShape(self.config.name.clone()))
    }
}

/// All channels of one file, concatenated across segments in time order
#[derive(Debug)]
pub struct FileAnalysis {
    pub source: Option<PathBuf>,
    pub(crate) timestamps: Vec<Timestamp>,
    /// Not every frame of the video was seen
    pub missed_timestamps: bool,
    /// Timestamps bordering the frames that were never seen
    pub missing_timestamp_values: Vec<Timestamp>,
    /// File-level properties (flags, versions, video metadata) as display strings
    pub metadata: BTreeMap<String, String>,
    pub pixels_per_meter: f64,
    pub(crate) events: Vec<EventSeries>,
    pub(crate) pos: Vec<PosSeries>,
    pub(crate) zones: Vec<ZoneInfo>,
}

impl FileAnalysis {
    /// Open `path` read-only and load every channel
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = DataFile::open_read_only(path)?;
        let mut analysis = Self::from_data_file(&file)?;
        analysis.source = Some(path.to_path_buf());
        info!(
            "loaded {:?}: {} timestamps, {} event, {} pos, {} zone channels",
            path,
            analysis.timestamps.len(),
            analysis.events.len(),
            analysis.pos.len(),
            analysis.zones.len()
        );
        Ok(analysis)
    }

    pub fn from_data_file(file: &DataFile) -> Result<Self> {
        let index = file.index();
        let order = index.ordered_segments();
        let lengths: Vec<(SegmentId, usize)> = order
            .iter()
            .map(|&s| (s, index.segment_len(s).unwrap_or(0)))
            .collect();

        let mut timestamps = Vec::with_capacity(index.len());
        for &segment in &order {
            timestamps.extend_from_slice(index.segment(segment).unwrap_or_default());
        }

        let missed_timestamps = !file.saw_all_timestamps();
        let missing_timestamp_values = if missed_timestamps {
            missing_values(
                &order
                    .iter()
                    .filter_map(|&s| index.segment(s))
                    .collect::<Vec<_>>(),
                file.saw_first_timestamp(),
                file.saw_last_timestamp(),
            )
        } else {
            Vec::new()
        };
        if order.len() > 1 {
            debug!("concatenated {} segments in first-timestamp order", order.len());
        }

        let mut events = Vec::new();
        let mut pos = Vec::new();
        let mut zones = Vec::new();
        for channel in file.channels() {
            match channel.kind() {
                ChannelKind::Event => events.push(EventSeries::new(
                    Some(channel.id),
                    channel.config.clone(),
                    dense(channel, channel.events(), &lengths),
                )),
                ChannelKind::Pos => pos.push(PosSeries {
                    id: channel.id,
                    config: channel.config.clone(),
                    data: dense(channel, channel.positions(), &lengths),
                }),
                ChannelKind::Zone => zones.push(ZoneInfo {
                    id: channel.id,
                    config: channel.config.clone(),
                }),
            }
        }

        let state = file.state();
        let mut metadata = BTreeMap::new();
        for (key, value) in file.video_metadata() {
            metadata.insert(key.clone(), yaml_display(value));
        }
        metadata.insert("saw_all_timestamps".into(), state.saw_all_timestamps.to_string());
        metadata.insert("format_version".into(), state.format_version.clone());
        metadata.insert("created_at".into(), state.created_at.clone());
        metadata.insert("pixels_per_meter".into(), state.pixels_per_meter.to_string());

        Ok(Self {
            source: None,
            timestamps,
            missed_timestamps,
            missing_timestamp_values,
            metadata,
            pixels_per_meter: state.pixels_per_meter,
            events,
            pos,
            zones,
        })
    }

    /// Display name of the source, for export tables
    pub fn display_name(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    /// Every timestamp of the file in time order
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn event_channels(&self) -> &[EventSeries] {
        &self.events
    }

    pub fn pos_channels(&self) -> &[PosSeries] {
        &self.pos
    }

    pub fn zone_channels(&self) -> &[ZoneInfo] {
        &self.zones
    }

    /// Channel names of one kind, in channel id order (derived channels last)
    pub fn channel_names(&self, kind: ChannelKind) -> Vec<String> {
        match kind {
            ChannelKind::Event => self.events.iter().map(|c| c.name().to_string()).collect(),
            ChannelKind::Pos => self.pos.iter().map(|c| c.name().to_string()).collect(),
            ChannelKind::Zone => self.zones.iter().map(|c| c.name().to_string()).collect(),
        }
    }

    pub fn event_channel(&self, name: &str) -> Result<&EventSeries> {
        self.events
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| unknown(ChannelKind::Event, name))
    }

    pub fn pos_channel(&self, name: &str) -> Result<&PosSeries> {
        self.pos
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| unknown(ChannelKind::Pos, name))
    }

    pub fn zone_channel(&self, name: &str) -> Result<&ZoneInfo> {
        self.zones
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| unknown(ChannelKind::Zone, name))
    }

    /// Register a computed event channel so it can be analysed like any other
    pub fn add_event_channel(&mut self, name: &str, data: Vec<bool>) -> Result<()> {
        if self.events.iter().any(|c| c.name() == name) {
            return Err(AnalysisError::DuplicateChannel(name.to_string()));
        }
        if data.len() != self.timestamps.len() {
            return Err(AnalysisError::LengthMismatch {
                name: name.to_string(),
                expected: self.timestamps.len(),
                found: data.len(),
            });
        }
        debug!("added derived event channel {:?}", name);
        self.events
            .push(EventSeries::new(None, ChannelConfig::named(name), data));
        Ok(())
    }
}

pub(crate) fn unknown(kind: ChannelKind, name: &str) -> AnalysisError {
    AnalysisError::UnknownChannel {
        kind,
        name: name.to_string(),
    }
}

/// Concatenate a channel's arrays in segment order, padding short arrays
fn dense<V: SampleValue>(
    channel: &Channel,
    arrays: Option<&TemporalArrays<V>>,
    lengths: &[(SegmentId, usize)],
) -> Vec<V> {
    let mut out = Vec::with_capacity(lengths.iter().map(|(_, n)| n).sum());
    for &(segment, len) in lengths {
        let values = arrays.and_then(|a| a.segment(segment)).unwrap_or_default();
        if values.len() > len {
            debug!(
                "channel {} holds {} samples for segment {} of length {}",
                channel.id,
                values.len(),
                segment,
                len
            );
        }
        out.extend(values.iter().take(len).copied());
        out.resize(out.len() + len.saturating_sub(values.len()), V::UNSET);
    }
    out
}

/// The last timestamp of every segment but the final one, plus the outer
/// ends when the first or last frame was never delivered
fn missing_values(segments: &[&[Timestamp]], saw_first: bool, saw_last: bool) -> Vec<Timestamp> {
    let segments: Vec<&[Timestamp]> = segments.iter().copied().filter(|s| !s.is_empty()).collect();
    let mut missing: Vec<Timestamp> = segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .filter_map(|s| s.last().copied())
        .collect();
    if !saw_first {
        if let Some(&first) = segments.first().and_then(|s| s.first()) {
            missing.insert(0, first);
        }
    }
    if !saw_last {
        if let Some(&last) = segments.last().and_then(|s| s.last()) {
            missing.push(last);
        }
    }
    missing
}

fn yaml_display(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecode_store::Value;

    #[test]
    fn test_segments_concatenate_by_first_timestamp() {
        let mut file = DataFile::create_in_memory().unwrap();
        let event = file
            .create_channel(ChannelKind::Event, ChannelConfig::named("sniff"))
            .unwrap();
        for t in [3.0, 4.0] {
            file.add_timestamp(t).unwrap();
        }
        file.set_value(event, 4.0, Value::Event(true)).unwrap();
        file.notify_interrupted().unwrap();
        for t in [0.0, 1.0] {
            file.add_timestamp(t).unwrap();
        }
        file.set_value(event, 0.0, Value::Event(true)).unwrap();

        let analysis = FileAnalysis::from_data_file(&file).unwrap();
        assert_eq!(analysis.timestamps, vec![0.0, 1.0, 3.0, 4.0]);
        assert_eq!(
            analysis.event_channel("sniff").unwrap().data,
            vec![true, false, false, true]
        );
        assert!(analysis.missed_timestamps);
        // boundary between the runs, plus both ends since neither was flagged
        assert_eq!(analysis.missing_timestamp_values, vec![0.0, 1.0, 4.0]);
    }

    #[test]
    fn test_complete_file_has_no_missing_values() {
        let mut file = DataFile::create_in_memory().unwrap();
        file.notify_saw_first().unwrap();
        for t in [0.0, 1.0, 2.0] {
            file.add_timestamp(t).unwrap();
        }
        file.notify_saw_last().unwrap();

        let analysis = FileAnalysis::from_data_file(&file).unwrap();
        assert!(!analysis.missed_timestamps);
        assert!(analysis.missing_timestamp_values.is_empty());
        assert_eq!(analysis.metadata["saw_all_timestamps"], "true");
    }

    #[test]
    fn test_add_event_channel_validation() {
        let mut file = DataFile::create_in_memory().unwrap();
        file.create_channel(ChannelKind::Event, ChannelConfig::named("a"))
            .unwrap();
        file.add_timestamp(0.0).unwrap();

        let mut analysis = FileAnalysis::from_data_file(&file).unwrap();
        assert!(matches!(
            analysis.add_event_channel("a", vec![true]),
            Err(AnalysisError::DuplicateChannel(_))
        ));
        assert!(matches!(
            analysis.add_event_channel("b", vec![true, false]),
            Err(AnalysisError::LengthMismatch { .. })
        ));
        analysis.add_event_channel("b", vec![true]).unwrap();
        assert!(analysis.event_channel("b").unwrap().is_derived());
        assert_eq!(analysis.channel_names(ChannelKind::Event), vec!["a", "b"]);
    }
}
