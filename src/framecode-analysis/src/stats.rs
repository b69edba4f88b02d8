//! Summary statistics over event, position and zone channels

use serde::{Deserialize, Serialize};
use std::fmt;

use framecode_store::{ChannelKind, Position, Shape, Timestamp};

use crate::error::{AnalysisError, Result};
use crate::file::{EventSeries, FileAnalysis, PosSeries, ZoneInfo};
use crate::intervals::{active_intervals, Bounds, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    ActiveDuration,
    DelayToFirst,
    ScoredDuration,
    EventCount,
    MeanCenterDistance,
    DistanceTraveled,
    MeanSpeed,
    Centroid,
    Area,
}

impl Statistic {
    pub const ALL: [Statistic; 9] = [
        Statistic::ActiveDuration,
        Statistic::DelayToFirst,
        Statistic::ScoredDuration,
        Statistic::EventCount,
        Statistic::MeanCenterDistance,
        Statistic::DistanceTraveled,
        Statistic::MeanSpeed,
        Statistic::Centroid,
        Statistic::Area,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::ActiveDuration => "active_duration",
            Statistic::DelayToFirst => "delay_to_first",
            Statistic::ScoredDuration => "scored_duration",
            Statistic::EventCount => "event_count",
            Statistic::MeanCenterDistance => "mean_center_distance",
            Statistic::DistanceTraveled => "distance_traveled",
            Statistic::MeanSpeed => "mean_speed",
            Statistic::Centroid => "centroid",
            Statistic::Area => "area",
        }
    }

    /// Kind of channel the statistic is computed over
    pub fn channel_kind(&self) -> ChannelKind {
        match self {
            Statistic::ActiveDuration
            | Statistic::DelayToFirst
            | Statistic::ScoredDuration
            | Statistic::EventCount => ChannelKind::Event,
            Statistic::MeanCenterDistance | Statistic::DistanceTraveled | Statistic::MeanSpeed => {
                ChannelKind::Pos
            }
            Statistic::Centroid | Statistic::Area => ChannelKind::Zone,
        }
    }

    pub fn is_temporal(&self) -> bool {
        self.channel_kind().is_temporal()
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword arguments of a statistic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatArgs {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    /// Zone channel whose centroid `mean_center_distance` measures against
    pub zone: Option<String>,
}

impl StatArgs {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Count(usize),
    Point(Position),
}

impl StatValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Number(v) => Some(*v),
            StatValue::Count(n) => Some(*n as f64),
            StatValue::Point(_) => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(v) => write!(f, "{}", v),
            StatValue::Count(n) => write!(f, "{}", n),
            StatValue::Point(p) => write!(f, "({}, {})", p.x, p.y),
        }
    }
}

impl EventSeries {
    /// True runs within `bounds`, memoized per bound pair. `timestamps` must be
    /// the owning file's timeline.
    pub(crate) fn active_intervals(&self, timestamps: &[Timestamp], bounds: Bounds) -> Vec<Interval> {
        if let Some(cached) = self.intervals.borrow().get(&bounds) {
            return cached.clone();
        }
        let window = bounds.window(timestamps);
        let intervals = active_intervals(&timestamps[window.clone()], &self.data[window]);
        self.intervals.borrow_mut().insert(bounds, intervals.clone());
        intervals
    }

    pub(crate) fn active_duration(&self, timestamps: &[Timestamp], bounds: Bounds) -> f64 {
        self.active_intervals(timestamps, bounds)
            .iter()
            .map(Interval::duration)
            .sum()
    }

    /// Start of the first run, or -1 when the channel is never active
    pub(crate) fn delay_to_first(&self, timestamps: &[Timestamp], bounds: Bounds) -> f64 {
        self.active_intervals(timestamps, bounds)
            .first()
            .map_or(-1.0, |i| i.start)
    }

    /// Span between the first and last timestamp inside the window
    pub(crate) fn scored_duration(&self, timestamps: &[Timestamp], bounds: Bounds) -> f64 {
        let window = &timestamps[bounds.window(timestamps)];
        match (window.first(), window.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    pub(crate) fn event_count(&self, timestamps: &[Timestamp], bounds: Bounds) -> usize {
        self.active_intervals(timestamps, bounds).len()
    }
}

impl PosSeries {
    /// Coded samples inside the window, with their timestamps
    fn coded<'a>(
        &'a self,
        timestamps: &'a [Timestamp],
        bounds: Bounds,
    ) -> impl Iterator<Item = (Timestamp, Position)> + 'a {
        let window = bounds.window(timestamps);
        timestamps[window.clone()]
            .iter()
            .copied()
            .zip(self.data[window].iter().copied())
            .filter(|(_, p)| p.is_coded())
    }

    /// Mean distance of coded samples to `shape`'s centroid, or -1 when nothing is coded
    pub fn mean_center_distance(&self, timestamps: &[Timestamp], bounds: Bounds, shape: &Shape) -> f64 {
        let center = shape.centroid();
        let (sum, n) = self
            .coded(timestamps, bounds)
            .fold((0.0, 0usize), |(sum, n), (_, p)| (sum + p.distance_to(&center), n + 1));
        if n == 0 {
            -1.0
        } else {
            sum / n as f64
        }
    }

    /// Path length over consecutive coded samples
    pub fn distance_traveled(&self, timestamps: &[Timestamp], bounds: Bounds) -> f64 {
        let mut total = 0.0;
        let mut previous: Option<Position> = None;
        for (_, p) in self.coded(timestamps, bounds) {
            if let Some(prev) = previous {
                total += prev.distance_to(&p);
            }
            previous = Some(p);
        }
        total
    }

    /// Distance traveled over the time between the first and last coded sample
    pub fn mean_speed(&self, timestamps: &[Timestamp], bounds: Bounds) -> f64 {
        let mut coded = self.coded(timestamps, bounds);
        let first = match coded.next() {
            Some((t, _)) => t,
            None => return 0.0,
        };
        let last = coded.last().map_or(first, |(t, _)| t);
        let elapsed = last - first;
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.distance_traveled(timestamps, bounds) / elapsed
    }
}

impl ZoneInfo {
    pub fn centroid(&self) -> Result<Position> {
        Ok(self.shape()?.centroid())
    }

    pub fn area(&self) -> Result<f64> {
        Ok(self.shape()?.area())
    }
}

impl FileAnalysis {
    /// Compute one statistic of the named channel
    pub fn compute_statistic(
        &self,
        channel: &str,
        statistic: Statistic,
        args: &StatArgs,
    ) -> Result<StatValue> {
        let ts = &self.timestamps;
        let bounds = args.bounds();
        let value = match statistic {
            Statistic::ActiveDuration => {
                StatValue::Number(self.event_channel(channel)?.active_duration(ts, bounds))
            }
            Statistic::DelayToFirst => {
                StatValue::Number(self.event_channel(channel)?.delay_to_first(ts, bounds))
            }
            Statistic::ScoredDuration => {
                StatValue::Number(self.event_channel(channel)?.scored_duration(ts, bounds))
            }
            Statistic::EventCount => {
                StatValue::Count(self.event_channel(channel)?.event_count(ts, bounds))
            }
            Statistic::MeanCenterDistance => {
                let zone = args.zone.as_deref().ok_or(AnalysisError::MissingArgument {
                    statistic: statistic.as_str(),
                    argument: "zone",
                })?;
                let shape = self.zone_channel(zone)?.shape()?;
                StatValue::Number(
                    self.pos_channel(channel)?
                        .mean_center_distance(ts, bounds, shape),
                )
            }
            Statistic::DistanceTraveled => {
                StatValue::Number(self.pos_channel(channel)?.distance_traveled(ts, bounds))
            }
            Statistic::MeanSpeed => {
                StatValue::Number(self.pos_channel(channel)?.mean_speed(ts, bounds))
            }
            Statistic::Centroid => StatValue::Point(self.zone_channel(channel)?.centroid()?),
            Statistic::Area => StatValue::Number(self.zone_channel(channel)?.area()?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use framecode_store::{ChannelConfig, ChannelId};

    const TS: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

    fn series(data: Vec<bool>) -> EventSeries {
        EventSeries::new(Some(ChannelId(0)), ChannelConfig::named("e"), data)
    }

    #[test]
    fn test_event_statistics() {
        let e = series(vec![false, true, true, false, true]);
        assert_eq!(
            e.active_intervals(&TS, Bounds::ALL),
            vec![
                Interval { start: 1.0, end: 2.0 },
                Interval { start: 4.0, end: 4.0 }
            ]
        );
        assert_relative_eq!(e.active_duration(&TS, Bounds::ALL), 1.0);
        assert_eq!(e.event_count(&TS, Bounds::ALL), 2);
        assert_relative_eq!(e.delay_to_first(&TS, Bounds::ALL), 1.0);
        assert_relative_eq!(e.scored_duration(&TS, Bounds::ALL), 4.0);
    }

    #[test]
    fn test_all_false_channel() {
        let e = series(vec![false; 5]);
        assert_relative_eq!(e.active_duration(&TS, Bounds::ALL), 0.0);
        assert_relative_eq!(e.delay_to_first(&TS, Bounds::ALL), -1.0);
        assert_eq!(e.event_count(&TS, Bounds::ALL), 0);
    }

    #[test]
    fn test_bounded_statistics_are_memoized_per_window() {
        let e = series(vec![true, true, false, true, true]);
        let window = Bounds::new(Some(1.0), Some(3.0));
        assert_eq!(
            e.active_intervals(&TS, window),
            vec![
                Interval { start: 1.0, end: 1.0 },
                Interval { start: 3.0, end: 3.0 }
            ]
        );
        assert_relative_eq!(e.scored_duration(&TS, window), 2.0);
        assert_eq!(e.event_count(&TS, Bounds::ALL), 2);
        assert_eq!(e.intervals.borrow().len(), 2);
    }

    #[test]
    fn test_repeated_statistics_match_file_timeline() {
        let mut file = framecode_store::DataFile::create_in_memory().unwrap();
        let id = file
            .create_channel(
                framecode_store::ChannelKind::Event,
                ChannelConfig::named("climb"),
            )
            .unwrap();
        for t in [0.0, 0.5, 1.0, 1.5, 2.0] {
            file.add_timestamp(t).unwrap();
        }
        for t in [0.5, 1.0, 2.0] {
            file.set_value(id, t, framecode_store::Value::Event(true))
                .unwrap();
        }
        let analysis = FileAnalysis::from_data_file(&file).unwrap();
        assert_eq!(analysis.timestamps(), &[0.0, 0.5, 1.0, 1.5, 2.0]);

        let late = StatArgs {
            start: Some(1.0),
            ..Default::default()
        };
        for _ in 0..2 {
            assert_eq!(
                analysis
                    .compute_statistic("climb", Statistic::ActiveDuration, &StatArgs::default())
                    .unwrap(),
                StatValue::Number(0.5)
            );
            assert_eq!(
                analysis
                    .compute_statistic("climb", Statistic::DelayToFirst, &late)
                    .unwrap(),
                StatValue::Number(1.0)
            );
            assert_eq!(
                analysis
                    .compute_statistic("climb", Statistic::EventCount, &late)
                    .unwrap(),
                StatValue::Count(2)
            );
        }
    }

    #[test]
    fn test_position_statistics() {
        let pos = PosSeries {
            id: ChannelId(1),
            config: ChannelConfig::named("nose"),
            data: vec![
                Position::new(0.0, 0.0),
                Position::NOT_CODED,
                Position::new(3.0, 4.0),
                Position::new(3.0, 0.0),
                Position::NOT_CODED,
            ],
        };
        assert_relative_eq!(pos.distance_traveled(&TS, Bounds::ALL), 9.0);
        assert_relative_eq!(pos.mean_speed(&TS, Bounds::ALL), 3.0);

        let square = Shape::Polygon {
            points: vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]],
        };
        assert_relative_eq!(
            pos.mean_center_distance(&TS, Bounds::ALL, &square),
            (0.0 + 5.0 + 3.0) / 3.0
        );
        assert_relative_eq!(
            pos.mean_center_distance(&TS, Bounds::new(Some(4.0), None), &square),
            -1.0
        );
        assert_relative_eq!(pos.mean_speed(&TS, Bounds::new(Some(2.0), Some(2.0))), 0.0);
    }

    #[test]
    fn test_statistic_kinds() {
        for statistic in Statistic::ALL {
            let kind = statistic.channel_kind();
            assert_eq!(statistic.is_temporal(), kind != ChannelKind::Zone);
        }
        let parsed: Statistic = serde_yaml::from_str("mean_speed").unwrap();
        assert_eq!(parsed, Statistic::MeanSpeed);
    }
}
