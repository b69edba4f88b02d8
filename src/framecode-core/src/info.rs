//! File overview for `framecode info`

use anyhow::{Context, Result};
use framecode_store::{ChannelSummary, DataFile, FileState, SegmentInfo};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub state: FileState,
    pub timestamps: usize,
    pub segments: Vec<SegmentInfo>,
    pub channels: Vec<ChannelSummary>,
    pub video_metadata: BTreeMap<String, serde_yaml::Value>,
}

impl FileInfo {
    pub fn from_file(path: &Path, file: &DataFile) -> Self {
        Self {
            path: path.display().to_string(),
            state: file.state().clone(),
            timestamps: file.index().len(),
            segments: file.segment_infos(),
            channels: file.channel_summaries(),
            video_metadata: file.video_metadata().clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = DataFile::open_read_only(path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        Ok(Self::from_file(path, &file))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize file info")
    }

    /// Plain text rendering
    pub fn render(&self) -> String {
        let mut out = String::new();
        let flag = |b: bool| if b { "yes" } else { "no" };
        let _ = writeln!(out, "file: {}", self.path);
        let _ = writeln!(out, "format version: {}", self.state.format_version);
        let _ = writeln!(out, "created at: {}", self.state.created_at);
        let _ = writeln!(
            out,
            "saw first: {}, saw last: {}, saw all: {}",
            flag(self.state.saw_first_timestamp),
            flag(self.state.saw_last_timestamp),
            flag(self.state.saw_all_timestamps)
        );
        if self.state.pixels_per_meter > 0.0 {
            let _ = writeln!(out, "pixels per meter: {}", self.state.pixels_per_meter);
        }
        let _ = writeln!(out, "timestamps: {}", self.timestamps);

        let _ = writeln!(out, "\nsegments ({}):", self.segments.len());
        for segment in &self.segments {
            match (segment.first, segment.last) {
                (Some(first), Some(last)) => {
                    let _ = writeln!(
                        out,
                        "  [{}] {} frame(s), {:.3}s - {:.3}s",
                        segment.id, segment.len, first, last
                    );
                }
                _ => {
                    let _ = writeln!(out, "  [{}] empty", segment.id);
                }
            }
        }

        let _ = writeln!(out, "\nchannels ({}):", self.channels.len());
        for channel in &self.channels {
            let _ = writeln!(
                out,
                "  [{}] {:5} {} ({} coded)",
                channel.id, channel.kind, channel.name, channel.coded_frames
            );
        }

        if !self.video_metadata.is_empty() {
            let _ = writeln!(out, "\nvideo metadata:");
            for (key, value) in &self.video_metadata {
                let value = serde_yaml::to_string(value).unwrap_or_default();
                let _ = writeln!(out, "  {}: {}", key, value.trim_end());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecode_store::{ChannelConfig, ChannelKind, Value};

    #[test]
    fn test_render_and_json() {
        let mut file = DataFile::create_in_memory().unwrap();
        let id = file
            .create_channel(ChannelKind::Event, ChannelConfig::named("rear"))
            .unwrap();
        file.add_timestamp(0.0).unwrap();
        file.add_timestamp(0.5).unwrap();
        file.set_value(id, 0.5, Value::Event(true)).unwrap();

        let info = FileInfo::from_file(Path::new("mem.fcd"), &file);
        let text = info.render();
        assert!(text.contains("timestamps: 2"));
        assert!(text.contains("rear (1 coded)"));
        assert!(text.contains("saw all: no"));

        let json: serde_json::Value = serde_json::from_str(&info.to_json().unwrap()).unwrap();
        assert_eq!(json["timestamps"], 2);
        assert_eq!(json["channels"][0]["name"], "rear");
    }
}
