//! Timestamp index: maps every frame timestamp to a (segment, offset) slot
//!
//! Timestamps arrive one frame at a time. Each uninterrupted playback run
//! appends to one segment; a seek interrupts the run and the next unknown
//! timestamp opens a new segment. When a run reaches a timestamp already
//! stored in another segment, that segment is merged onto the running one.

use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::schema::{SegmentId, SegmentInfo, Timestamp};

/// Physical location of a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub segment: SegmentId,
    pub offset: usize,
}

/// What `resolve_or_add` did to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// The timestamp was already indexed; its segment is now active
    Existing { segment: SegmentId },
    /// The timestamp lives in `absorbed`, which was appended onto the active `into`
    Merged {
        into: SegmentId,
        absorbed: SegmentId,
        /// Length of `into` before the merge
        base_len: usize,
        /// Length of `absorbed` at the time of the merge
        absorbed_len: usize,
    },
    /// The timestamp was new and appended at `offset`
    Appended {
        segment: SegmentId,
        offset: usize,
        /// `segment` was allocated for this timestamp
        created: bool,
    },
}

impl Resolved {
    /// The active segment after resolution
    pub fn segment(&self) -> SegmentId {
        match *self {
            Resolved::Existing { segment } => segment,
            Resolved::Merged { into, .. } => into,
            Resolved::Appended { segment, .. } => segment,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimestampIndex {
    segments: BTreeMap<SegmentId, Vec<Timestamp>>,
    slots: HashMap<OrderedFloat<Timestamp>, Slot>,
    active: Option<SegmentId>,
    next_segment: i64,
}

impl Default for TimestampIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampIndex {
    /// Empty index holding only the (empty) primary segment
    pub fn new() -> Self {
        let mut segments = BTreeMap::new();
        segments.insert(SegmentId::PRIMARY, Vec::new());
        Self {
            segments,
            slots: HashMap::new(),
            active: None,
            next_segment: 1,
        }
    }

    /// Rebuild the index from persisted segments
    pub fn from_segments(
        segments: BTreeMap<SegmentId, Vec<Timestamp>>,
        next_segment: i64,
    ) -> Result<Self> {
        if !segments.contains_key(&SegmentId::PRIMARY) {
            return Err(StoreError::Integrity("primary segment is missing".into()));
        }

        let mut slots = HashMap::with_capacity(segments.values().map(Vec::len).sum());
        for (&segment, timestamps) in &segments {
            if segment.0 >= next_segment {
                return Err(StoreError::Integrity(format!(
                    "segment {} is not below the segment counter {}",
                    segment, next_segment
                )));
            }
            for (offset, &t) in timestamps.iter().enumerate() {
                if offset > 0 && t <= timestamps[offset - 1] {
                    return Err(StoreError::Integrity(format!(
                        "segment {} is not strictly increasing at offset {}",
                        segment, offset
                    )));
                }
                if slots.insert(OrderedFloat(t), Slot { segment, offset }).is_some() {
                    return Err(StoreError::Integrity(format!(
                        "timestamp {} is stored in more than one slot",
                        t
                    )));
                }
            }
        }

        Ok(Self {
            segments,
            slots,
            active: None,
            next_segment,
        })
    }

    /// Resolve a delivered frame timestamp, appending or merging as needed
    pub fn resolve_or_add(&mut self, t: Timestamp) -> Result<Resolved> {
        if t.is_nan() {
            return Err(StoreError::Integrity("timestamp is NaN".into()));
        }

        if let Some(slot) = self.lookup(t) {
            let resolved = match self.active {
                Some(active) if active != slot.segment => self.merge(active, slot.segment)?,
                _ => Resolved::Existing {
                    segment: slot.segment,
                },
            };
            self.active = Some(resolved.segment());
            return Ok(resolved);
        }

        let (segment, created) = match self.active {
            Some(segment) => (segment, false),
            None if !self.has_content() => (SegmentId::PRIMARY, false),
            None => (self.allocate_segment(), true),
        };
        self.active = Some(segment);

        let offset = self.append(segment, t)?;
        Ok(Resolved::Appended {
            segment,
            offset,
            created,
        })
    }

    /// Forget the active segment; returns it so callers can settle its arrays
    pub fn interrupt(&mut self) -> Option<SegmentId> {
        self.active.take()
    }

    pub fn lookup(&self, t: Timestamp) -> Option<Slot> {
        self.slots.get(&OrderedFloat(t)).copied()
    }

    pub fn active(&self) -> Option<SegmentId> {
        self.active
    }

    /// Next id that a new segment will receive
    pub fn segment_counter(&self) -> i64 {
        self.next_segment
    }

    pub fn has_content(&self) -> bool {
        self.segments
            .get(&SegmentId::PRIMARY)
            .is_some_and(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, segment: SegmentId) -> Option<&[Timestamp]> {
        self.segments.get(&segment).map(Vec::as_slice)
    }

    pub fn segment_len(&self, segment: SegmentId) -> Option<usize> {
        self.segments.get(&segment).map(Vec::len)
    }

    pub fn segment_ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.segments.keys().copied()
    }

    /// Segment lengths in id order
    pub fn segment_lengths(&self) -> Vec<(SegmentId, usize)> {
        self.segments.iter().map(|(&id, ts)| (id, ts.len())).collect()
    }

    /// Non-empty segments ordered by their first timestamp
    pub fn ordered_segments(&self) -> Vec<SegmentId> {
        let mut ordered: Vec<(Timestamp, SegmentId)> = self
            .segments
            .iter()
            .filter_map(|(&id, ts)| ts.first().map(|&first| (first, id)))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
        ordered.into_iter().map(|(_, id)| id).collect()
    }

    pub fn segment_infos(&self) -> Vec<SegmentInfo> {
        self.segments
            .iter()
            .map(|(&id, ts)| SegmentInfo {
                id,
                len: ts.len(),
                first: ts.first().copied(),
                last: ts.last().copied(),
            })
            .collect()
    }

    /// Every known timestamp with its slot, in segment then offset order
    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, Slot)> + '_ {
        self.segments.iter().flat_map(|(&segment, ts)| {
            ts.iter()
                .enumerate()
                .map(move |(offset, &t)| (t, Slot { segment, offset }))
        })
    }

    /// Allocate a fresh, empty segment with the next counter value
    pub(crate) fn allocate_segment(&mut self) -> SegmentId {
        let segment = SegmentId(self.next_segment);
        self.next_segment += 1;
        self.segments.insert(segment, Vec::new());
        debug!("allocated timestamp segment {}", segment);
        segment
    }

    /// Append a new timestamp to the end of `segment`
    pub(crate) fn append(&mut self, segment: SegmentId, t: Timestamp) -> Result<usize> {
        if self.slots.contains_key(&OrderedFloat(t)) {
            return Err(StoreError::Integrity(format!(
                "timestamp {} is already indexed",
                t
            )));
        }
        let timestamps = self
            .segments
            .get_mut(&segment)
            .ok_or(StoreError::SegmentNotFound(segment))?;
        if let Some(&last) = timestamps.last() {
            if t <= last {
                return Err(StoreError::Integrity(format!(
                    "timestamp {} appended after {} in segment {}",
                    t, last, segment
                )));
            }
        }

        let offset = timestamps.len();
        timestamps.push(t);
        self.slots.insert(OrderedFloat(t), Slot { segment, offset });
        Ok(offset)
    }

    /// Append `absorbed` onto `into` and drop it; the primary segment is never absorbed
    fn merge(&mut self, into: SegmentId, absorbed: SegmentId) -> Result<Resolved> {
        if into == absorbed {
            return Err(StoreError::Integrity(format!(
                "segment {} cannot be merged into itself",
                into
            )));
        }
        if absorbed.is_primary() {
            return Err(StoreError::UnsupportedMerge { into, absorbed });
        }

        let base_len = self
            .segment_len(into)
            .ok_or(StoreError::SegmentNotFound(into))?;
        let moved = self
            .segments
            .get(&absorbed)
            .ok_or(StoreError::SegmentNotFound(absorbed))?;

        if let (Some(&last), Some(&first)) = (self.segments[&into].last(), moved.first()) {
            if first <= last {
                return Err(StoreError::Integrity(format!(
                    "segment {} starts at {} which does not follow segment {} ending at {}",
                    absorbed, first, into, last
                )));
            }
        }

        let moved = self.segments.remove(&absorbed).unwrap_or_default();
        let absorbed_len = moved.len();
        for (i, &t) in moved.iter().enumerate() {
            self.slots.insert(
                OrderedFloat(t),
                Slot {
                    segment: into,
                    offset: base_len + i,
                },
            );
        }
        if let Some(target) = self.segments.get_mut(&into) {
            target.extend(moved);
        }

        debug!(
            "merged timestamp segment {} ({} frames) into {} at offset {}",
            absorbed, absorbed_len, into, base_len
        );
        Ok(Resolved::Merged {
            into,
            absorbed,
            base_len,
            absorbed_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_timestamps_go_to_primary() {
        let mut index = TimestampIndex::new();
        for (i, t) in [0.0, 0.1, 0.2].into_iter().enumerate() {
            let resolved = index.resolve_or_add(t).unwrap();
            assert_eq!(
                resolved,
                Resolved::Appended {
                    segment: SegmentId::PRIMARY,
                    offset: i,
                    created: false
                }
            );
        }
        assert_eq!(index.len(), 3);
        assert_eq!(index.segment_count(), 1);
    }

    #[test]
    fn test_seek_opens_new_segment() {
        let mut index = TimestampIndex::new();
        index.resolve_or_add(0.0).unwrap();
        index.resolve_or_add(1.0).unwrap();
        assert_eq!(index.interrupt(), Some(SegmentId::PRIMARY));

        let resolved = index.resolve_or_add(5.0).unwrap();
        assert_eq!(
            resolved,
            Resolved::Appended {
                segment: SegmentId(1),
                offset: 0,
                created: true
            }
        );
        assert_eq!(index.segment_counter(), 2);
        assert_eq!(
            index.lookup(5.0),
            Some(Slot {
                segment: SegmentId(1),
                offset: 0
            })
        );
    }

    #[test]
    fn test_reaching_known_segment_merges_it() {
        let mut index = TimestampIndex::new();
        for t in [0.0, 1.0, 2.0] {
            index.resolve_or_add(t).unwrap();
        }
        index.interrupt();
        for t in [5.0, 6.0] {
            index.resolve_or_add(t).unwrap();
        }
        index.interrupt();

        // seek back to the start and play through
        assert_eq!(
            index.resolve_or_add(0.0).unwrap(),
            Resolved::Existing {
                segment: SegmentId::PRIMARY
            }
        );
        index.resolve_or_add(1.0).unwrap();
        index.resolve_or_add(2.0).unwrap();
        index.resolve_or_add(3.0).unwrap();
        let resolved = index.resolve_or_add(5.0).unwrap();
        assert_eq!(
            resolved,
            Resolved::Merged {
                into: SegmentId::PRIMARY,
                absorbed: SegmentId(1),
                base_len: 4,
                absorbed_len: 2
            }
        );
        assert_eq!(index.segment_count(), 1);
        assert_eq!(
            index.segment(SegmentId::PRIMARY).unwrap(),
            &[0.0, 1.0, 2.0, 3.0, 5.0, 6.0]
        );
        assert_eq!(
            index.lookup(6.0),
            Some(Slot {
                segment: SegmentId::PRIMARY,
                offset: 5
            })
        );
    }

    #[test]
    fn test_primary_segment_is_never_absorbed() {
        let mut index = TimestampIndex::new();
        index.resolve_or_add(10.0).unwrap();
        index.interrupt();
        // a later seek lands before the primary segment's first frame
        index.resolve_or_add(2.0).unwrap();
        let err = index.resolve_or_add(10.0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedMerge {
                into: SegmentId(1),
                absorbed: SegmentId(0)
            }
        ));
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_out_of_order_append_is_fatal() {
        let mut index = TimestampIndex::new();
        index.resolve_or_add(1.0).unwrap();
        index.resolve_or_add(2.0).unwrap();
        let err = index.resolve_or_add(1.5).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[test]
    fn test_ordered_segments_by_first_timestamp() {
        let mut index = TimestampIndex::new();
        index.resolve_or_add(4.0).unwrap();
        index.interrupt();
        index.resolve_or_add(8.0).unwrap();
        index.interrupt();
        index.resolve_or_add(1.0).unwrap();
        assert_eq!(
            index.ordered_segments(),
            vec![SegmentId(2), SegmentId(0), SegmentId(1)]
        );
    }

    #[test]
    fn test_from_segments_rejects_duplicates() {
        let mut segments = BTreeMap::new();
        segments.insert(SegmentId(0), vec![0.0, 1.0]);
        segments.insert(SegmentId(1), vec![1.0]);
        assert!(matches!(
            TimestampIndex::from_segments(segments, 2),
            Err(StoreError::Integrity(_))
        ));
    }
}
