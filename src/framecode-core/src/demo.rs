//! Synthetic annotation session
//!
//! Drives a data file through the live recording path the way a person
//! scoring a video would: watch from the start, skip ahead to the end, then
//! go back and fill the gap. Filling the gap merges the two watched ranges.

use anyhow::{Context, Result};
use framecode_store::{
    ChannelConfig, ChannelId, ChannelKind, DataFile, Position, SegmentId, Shape, Value,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const FPS: f64 = 30.0;
const ARENA_CENTER: [f64; 2] = [320.0, 240.0];
const ARENA_RADIUS: f64 = 200.0;

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub frames: usize,
    /// Frame at which playback first jumps ahead
    pub seek_at: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            frames: 300,
            seek_at: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub frames: usize,
    pub segments_before_merge: usize,
    pub segments_after_merge: usize,
    pub saw_all_timestamps: bool,
}

struct Channels {
    moving: ChannelId,
    nose: ChannelId,
}

fn timestamp(frame: usize) -> f64 {
    frame as f64 / FPS
}

/// Annotate one frame like a scorer would
fn score_frame(file: &mut DataFile, channels: &Channels, frame: usize) -> Result<SegmentId> {
    let t = timestamp(frame);
    let segment = file.add_timestamp(t)?;

    file.set_value(channels.moving, t, Value::Event((frame / 15) % 2 == 0))?;

    // every tenth frame the nose is hidden and stays uncoded
    if frame % 10 != 9 {
        let angle = t * std::f64::consts::PI / 2.0;
        let r = ARENA_RADIUS * 0.5 * (1.0 + (t / 3.0).sin()) * 0.9;
        let nose = Position::new(
            ARENA_CENTER[0] + r * angle.cos(),
            ARENA_CENTER[1] + r * angle.sin(),
        );
        file.set_value(channels.nose, t, Value::Pos(nose))?;
    }
    Ok(segment)
}

fn play(file: &mut DataFile, channels: &Channels, frames: std::ops::Range<usize>) -> Result<()> {
    debug!("playing frames {}..{}", frames.start, frames.end);
    for frame in frames {
        score_frame(file, channels, frame)?;
    }
    Ok(())
}

/// Record a synthetic session into a new file at `path`
pub fn run_demo(path: &Path, options: &DemoOptions) -> Result<DemoReport> {
    let DemoOptions { frames, seek_at } = *options;
    if seek_at == 0 || frames < seek_at + 2 {
        anyhow::bail!(
            "seek frame {} must leave at least two frames after it (of {})",
            seek_at,
            frames
        );
    }
    let jump = seek_at + (frames - seek_at) / 2;

    let mut file =
        DataFile::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    info!("recording {} synthetic frames into {:?}", frames, path);

    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), "synthetic".into());
    metadata.insert("frame_count".to_string(), (frames as u64).into());
    metadata.insert("fps".to_string(), FPS.into());
    file.set_video_metadata(metadata)?;

    let channels = Channels {
        moving: file.create_channel(ChannelKind::Event, ChannelConfig::named("moving"))?,
        nose: file.create_channel(ChannelKind::Pos, ChannelConfig::named("nose"))?,
    };
    file.create_channel(
        ChannelKind::Zone,
        ChannelConfig::named("arena").with_shape(Shape::Circle {
            center: ARENA_CENTER,
            radius: ARENA_RADIUS,
        }),
    )?;

    file.notify_saw_first()?;
    play(&mut file, &channels, 0..seek_at)?;

    info!("seeking from frame {} to {}", seek_at, jump);
    file.notify_interrupted()?;
    play(&mut file, &channels, jump..frames)?;
    file.notify_saw_last()?;
    let segments_before_merge = file.index().segment_count();

    // back to the last watched frame, then through the gap
    info!("seeking back to frame {}", seek_at - 1);
    play(&mut file, &channels, seek_at - 1..jump + 1)?;
    file.notify_interrupted()?;

    let report = DemoReport {
        frames: file.index().len(),
        segments_before_merge,
        segments_after_merge: file.index().segment_count(),
        saw_all_timestamps: file.saw_all_timestamps(),
    };
    info!(
        "recorded {} frames in {} segment(s), saw all: {}",
        report.frames, report.segments_after_merge, report.saw_all_timestamps
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_demo_merges_into_one_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.fcd");
        let report = run_demo(
            &path,
            &DemoOptions {
                frames: 40,
                seek_at: 10,
            },
        )
        .unwrap();
        assert_eq!(
            report,
            DemoReport {
                frames: 40,
                segments_before_merge: 2,
                segments_after_merge: 1,
                saw_all_timestamps: true,
            }
        );

        let file = DataFile::open_read_only(&path).unwrap();
        assert!(file.saw_all_timestamps());
        let nose = file.channel_by_name("nose").unwrap().id;
        assert_eq!(
            file.get_value(nose, timestamp(9)).unwrap(),
            Value::Pos(Position::NOT_CODED)
        );
        let moving = file.channel_by_name("moving").unwrap().id;
        assert_eq!(
            file.get_value(moving, timestamp(20)).unwrap(),
            Value::Event(false)
        );
        assert_eq!(
            file.get_value(moving, timestamp(30)).unwrap(),
            Value::Event(true)
        );
    }

    #[test]
    fn test_demo_rejects_bad_seek() {
        let dir = TempDir::new().unwrap();
        let options = DemoOptions {
            frames: 10,
            seek_at: 9,
        };
        assert!(run_demo(&dir.path().join("x.fcd"), &options).is_err());
        assert!(!dir.path().join("x.fcd").exists());
    }
}
