//! Run-length decoding of boolean channels into active intervals

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use framecode_store::Timestamp;

/// Optional time window; `None` leaves that side open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub start: Option<OrderedFloat<f64>>,
    pub end: Option<OrderedFloat<f64>>,
}

impl Bounds {
    pub const ALL: Bounds = Bounds {
        start: None,
        end: None,
    };

    pub fn new(start: Option<f64>, end: Option<f64>) -> Self {
        Self {
            start: start.map(OrderedFloat),
            end: end.map(OrderedFloat),
        }
    }

    /// Index range of the sorted `timestamps` that fall inside the window (inclusive ends)
    pub fn window(&self, timestamps: &[Timestamp]) -> Range<usize> {
        let s = match self.start {
            Some(OrderedFloat(start)) => timestamps.partition_point(|&t| t < start),
            None => 0,
        };
        let e = match self.end {
            Some(OrderedFloat(end)) => timestamps.partition_point(|&t| t <= end),
            None => timestamps.len(),
        };
        s..e.max(s)
    }
}

/// A maximal run where an event channel is true, from its first to its last true sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Interval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Decode `data` into its true runs. `timestamps` and `data` are parallel.
pub fn active_intervals(timestamps: &[Timestamp], data: &[bool]) -> Vec<Interval> {
    let mut intervals = Vec::new();
    let mut run: Option<Interval> = None;

    for (&t, &active) in timestamps.iter().zip(data) {
        if active {
            match run.as_mut() {
                Some(current) => current.end = t,
                None => run = Some(Interval { start: t, end: t }),
            }
        } else if let Some(done) = run.take() {
            intervals.push(done);
        }
    }
    intervals.extend(run);
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

    #[test]
    fn test_runs_end_at_last_true_sample() {
        let intervals = active_intervals(&TS, &[false, true, true, false, true]);
        assert_eq!(
            intervals,
            vec![
                Interval { start: 1.0, end: 2.0 },
                Interval { start: 4.0, end: 4.0 }
            ]
        );
        let total: f64 = intervals.iter().map(Interval::duration).sum();
        assert_eq!(total, 1.0);
    }

    #[test]
    fn test_run_from_first_sample() {
        let intervals = active_intervals(&TS, &[true, true, false, false, false]);
        assert_eq!(intervals, vec![Interval { start: 0.0, end: 1.0 }]);
    }

    #[test]
    fn test_all_false_and_empty() {
        assert!(active_intervals(&TS, &[false; 5]).is_empty());
        assert!(active_intervals(&[], &[]).is_empty());
    }

    #[test]
    fn test_window() {
        assert_eq!(Bounds::ALL.window(&TS), 0..5);
        assert_eq!(Bounds::new(Some(1.0), Some(3.0)).window(&TS), 1..4);
        assert_eq!(Bounds::new(Some(0.5), None).window(&TS), 1..5);
        assert_eq!(Bounds::new(None, Some(-1.0)).window(&TS), 0..0);
        assert_eq!(Bounds::new(Some(3.5), Some(1.0)).window(&TS), 4..4);
    }
}
