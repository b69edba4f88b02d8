//! Per-channel value arrays, one per timestamp segment

use std::collections::BTreeMap;

use crate::error::{Result, StoreError};
use crate::queries::SampleRow;
use crate::schema::{ChannelConfig, ChannelId, ChannelKind, Position, SegmentId, Shape, Value};

/// A value type storable in a temporal channel
pub trait SampleValue: Copy + PartialEq + std::fmt::Debug {
    /// Default value used for padding frames nobody coded
    const UNSET: Self;

    fn is_set(&self) -> bool;

    fn to_row(&self) -> SampleRow;

    fn from_row(row: SampleRow) -> Self;
}

impl SampleValue for bool {
    const UNSET: Self = false;

    fn is_set(&self) -> bool {
        *self
    }

    fn to_row(&self) -> SampleRow {
        (if *self { 1.0 } else { 0.0 }, None)
    }

    fn from_row(row: SampleRow) -> Self {
        row.0 != 0.0
    }
}

impl SampleValue for Position {
    const UNSET: Self = Position::NOT_CODED;

    fn is_set(&self) -> bool {
        self.is_coded()
    }

    fn to_row(&self) -> SampleRow {
        (self.x, Some(self.y))
    }

    fn from_row(row: SampleRow) -> Self {
        Position::new(row.0, row.1.unwrap_or(-1.0))
    }
}

/// Write-ahead description of what an array operation appended, so the
/// caller can persist exactly those rows
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub segment: SegmentId,
    pub start_offset: usize,
    pub rows: Vec<SampleRow>,
}

/// Segment arrays of one temporal channel
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalArrays<V: SampleValue> {
    segments: BTreeMap<SegmentId, Vec<V>>,
}

impl<V: SampleValue> Default for TemporalArrays<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SampleValue> TemporalArrays<V> {
    pub fn new() -> Self {
        Self {
            segments: BTreeMap::new(),
        }
    }

    pub fn from_rows(rows: BTreeMap<SegmentId, Vec<SampleRow>>) -> Self {
        let segments = rows
            .into_iter()
            .map(|(segment, rows)| (segment, rows.into_iter().map(V::from_row).collect()))
            .collect();
        Self { segments }
    }

    pub fn from_segments(segments: BTreeMap<SegmentId, Vec<V>>) -> Self {
        Self { segments }
    }

    /// Start an empty array for `segment`; existing arrays are left alone
    pub fn create_segment(&mut self, segment: SegmentId) {
        self.segments.entry(segment).or_default();
    }

    pub fn has_segment(&self, segment: SegmentId) -> bool {
        self.segments.contains_key(&segment)
    }

    pub fn segment(&self, segment: SegmentId) -> Option<&[V]> {
        self.segments.get(&segment).map(Vec::as_slice)
    }

    pub fn segment_len(&self, segment: SegmentId) -> usize {
        self.segments.get(&segment).map_or(0, Vec::len)
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &[V])> + '_ {
        self.segments.iter().map(|(&id, values)| (id, values.as_slice()))
    }

    /// Value at `offset`, or the unset sentinel for frames not yet padded
    pub fn get(&self, segment: SegmentId, offset: usize) -> V {
        self.segments
            .get(&segment)
            .and_then(|values| values.get(offset))
            .copied()
            .unwrap_or(V::UNSET)
    }

    /// Write `value` at `offset`, padding the gap with the unset value.
    ///
    /// Returns the padding rows that had to be appended before `offset`.
    pub fn set(&mut self, segment: SegmentId, offset: usize, value: V) -> Option<Appended> {
        let values = self.segments.entry(segment).or_default();
        let mut padded = None;
        if offset >= values.len() {
            let start_offset = values.len();
            values.resize(offset + 1, V::UNSET);
            if offset > start_offset {
                padded = Some(Appended {
                    segment,
                    start_offset,
                    rows: vec![V::UNSET.to_row(); offset - start_offset],
                });
            }
        }
        values[offset] = value;
        padded
    }

    /// Extend `segment` with unset values until it holds `target` samples
    pub fn pad_to(&mut self, segment: SegmentId, target: usize) -> Result<Option<Appended>> {
        let values = self.segments.entry(segment).or_default();
        let len = values.len();
        if target < len {
            return Err(StoreError::Integrity(format!(
                "cannot pad segment {} of length {} down to {}",
                segment, len, target
            )));
        }
        if target == len {
            return Ok(None);
        }
        values.resize(target, V::UNSET);
        Ok(Some(Appended {
            segment,
            start_offset: len,
            rows: vec![V::UNSET.to_row(); target - len],
        }))
    }

    /// Append the `absorbed` array onto `into` and drop it
    pub fn merge(&mut self, into: SegmentId, absorbed: SegmentId) -> Result<()> {
        if absorbed.is_primary() || into == absorbed {
            return Err(StoreError::UnsupportedMerge { into, absorbed });
        }
        let moved = self.segments.remove(&absorbed).unwrap_or_default();
        self.segments.entry(into).or_default().extend(moved);
        Ok(())
    }
}

/// Kind-specific payload of a channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Event(TemporalArrays<bool>),
    Pos(TemporalArrays<Position>),
    /// Zones carry only static geometry, kept in the channel config
    Zone,
}

impl ChannelData {
    pub fn empty(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Event => ChannelData::Event(TemporalArrays::new()),
            ChannelKind::Pos => ChannelData::Pos(TemporalArrays::new()),
            ChannelKind::Zone => ChannelData::Zone,
        }
    }

    pub fn from_rows(kind: ChannelKind, rows: BTreeMap<SegmentId, Vec<SampleRow>>) -> Self {
        match kind {
            ChannelKind::Event => ChannelData::Event(TemporalArrays::from_rows(rows)),
            ChannelKind::Pos => ChannelData::Pos(TemporalArrays::from_rows(rows)),
            ChannelKind::Zone => ChannelData::Zone,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelData::Event(_) => ChannelKind::Event,
            ChannelData::Pos(_) => ChannelKind::Pos,
            ChannelData::Zone => ChannelKind::Zone,
        }
    }
}

/// One channel: identity, configuration and its arrays
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub config: ChannelConfig,
    pub data: ChannelData,
}

impl Channel {
    pub fn new(id: ChannelId, kind: ChannelKind, config: ChannelConfig) -> Self {
        Self {
            id,
            config,
            data: ChannelData::empty(kind),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.data.kind()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.config.shape.as_ref()
    }

    pub fn events(&self) -> Option<&TemporalArrays<bool>> {
        match &self.data {
            ChannelData::Event(arrays) => Some(arrays),
            _ => None,
        }
    }

    pub fn positions(&self) -> Option<&TemporalArrays<Position>> {
        match &self.data {
            ChannelData::Pos(arrays) => Some(arrays),
            _ => None,
        }
    }

    pub fn create_segment(&mut self, segment: SegmentId) {
        match &mut self.data {
            ChannelData::Event(arrays) => arrays.create_segment(segment),
            ChannelData::Pos(arrays) => arrays.create_segment(segment),
            ChannelData::Zone => {}
        }
    }

    pub fn segment_len(&self, segment: SegmentId) -> usize {
        match &self.data {
            ChannelData::Event(arrays) => arrays.segment_len(segment),
            ChannelData::Pos(arrays) => arrays.segment_len(segment),
            ChannelData::Zone => 0,
        }
    }

    pub fn pad_to(&mut self, segment: SegmentId, target: usize) -> Result<Option<Appended>> {
        match &mut self.data {
            ChannelData::Event(arrays) => arrays.pad_to(segment, target),
            ChannelData::Pos(arrays) => arrays.pad_to(segment, target),
            ChannelData::Zone => Ok(None),
        }
    }

    pub fn merge(&mut self, into: SegmentId, absorbed: SegmentId) -> Result<()> {
        match &mut self.data {
            ChannelData::Event(arrays) => arrays.merge(into, absorbed),
            ChannelData::Pos(arrays) => arrays.merge(into, absorbed),
            ChannelData::Zone => Ok(()),
        }
    }

    /// Write a value at `(segment, offset)`; returns whether the frame is now set
    /// and the padding that preceded it
    pub fn set(
        &mut self,
        segment: SegmentId,
        offset: usize,
        value: Value,
    ) -> Result<(bool, Option<Appended>)> {
        let found = self.kind();
        match (&mut self.data, value) {
            (ChannelData::Event(arrays), Value::Event(v)) => {
                Ok((v.is_set(), arrays.set(segment, offset, v)))
            }
            (ChannelData::Pos(arrays), Value::Pos(p)) => {
                Ok((p.is_set(), arrays.set(segment, offset, p)))
            }
            _ => Err(StoreError::WrongChannelKind {
                id: self.id,
                expected: value.kind(),
                found,
            }),
        }
    }

    pub fn get(&self, segment: SegmentId, offset: usize) -> Result<Value> {
        match &self.data {
            ChannelData::Event(arrays) => Ok(Value::Event(arrays.get(segment, offset))),
            ChannelData::Pos(arrays) => Ok(Value::Pos(arrays.get(segment, offset))),
            ChannelData::Zone => Err(StoreError::NotTemporal {
                id: self.id,
                found: ChannelKind::Zone,
            }),
        }
    }

    pub fn is_set_at(&self, segment: SegmentId, offset: usize) -> bool {
        match &self.data {
            ChannelData::Event(arrays) => arrays.get(segment, offset).is_set(),
            ChannelData::Pos(arrays) => arrays.get(segment, offset).is_set(),
            ChannelData::Zone => false,
        }
    }

    /// Raw rows of one segment, for persistence
    pub fn segment_rows(&self, segment: SegmentId) -> Vec<SampleRow> {
        match &self.data {
            ChannelData::Event(arrays) => rows_of(arrays, segment),
            ChannelData::Pos(arrays) => rows_of(arrays, segment),
            ChannelData::Zone => Vec::new(),
        }
    }

    /// Number of frames that differ from the unset value
    pub fn coded_frames(&self) -> usize {
        fn count<V: SampleValue>(arrays: &TemporalArrays<V>) -> usize {
            arrays
                .segments()
                .map(|(_, values)| values.iter().filter(|v| v.is_set()).count())
                .sum()
        }
        match &self.data {
            ChannelData::Event(arrays) => count(arrays),
            ChannelData::Pos(arrays) => count(arrays),
            ChannelData::Zone => 0,
        }
    }
}

fn rows_of<V: SampleValue>(arrays: &TemporalArrays<V>, segment: SegmentId) -> Vec<SampleRow> {
    arrays
        .segment(segment)
        .map(|values| values.iter().map(SampleValue::to_row).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_is_idempotent() {
        let mut arrays = TemporalArrays::<bool>::new();
        arrays.create_segment(SegmentId(0));
        arrays.set(SegmentId(0), 0, true);

        let appended = arrays.pad_to(SegmentId(0), 4).unwrap().unwrap();
        assert_eq!(appended.start_offset, 1);
        assert_eq!(appended.rows.len(), 3);
        let once = arrays.clone();

        assert!(arrays.pad_to(SegmentId(0), 4).unwrap().is_none());
        assert_eq!(arrays, once);
        assert_eq!(arrays.segment(SegmentId(0)).unwrap(), &[true, false, false, false]);
    }

    #[test]
    fn test_pad_never_truncates() {
        let mut arrays = TemporalArrays::<Position>::new();
        arrays.pad_to(SegmentId(0), 3).unwrap();
        assert!(matches!(
            arrays.pad_to(SegmentId(0), 2),
            Err(StoreError::Integrity(_))
        ));
        assert_eq!(arrays.segment_len(SegmentId(0)), 3);
    }

    #[test]
    fn test_set_beyond_end_pads_gap() {
        let mut arrays = TemporalArrays::<Position>::new();
        let padded = arrays
            .set(SegmentId(0), 2, Position::new(5.0, 6.0))
            .unwrap();
        assert_eq!(padded.start_offset, 0);
        assert_eq!(padded.rows, vec![(-1.0, Some(-1.0)); 2]);
        assert_eq!(arrays.get(SegmentId(0), 0), Position::NOT_CODED);
        assert_eq!(arrays.get(SegmentId(0), 2), Position::new(5.0, 6.0));
        assert_eq!(arrays.get(SegmentId(0), 9), Position::NOT_CODED);
    }

    #[test]
    fn test_merge_appends_and_keeps_primary() {
        let mut arrays = TemporalArrays::<bool>::new();
        for (i, v) in [true, false, true].into_iter().enumerate() {
            arrays.set(SegmentId(0), i, v);
        }
        arrays.set(SegmentId(1), 0, false);
        arrays.set(SegmentId(1), 1, true);

        arrays.merge(SegmentId(0), SegmentId(1)).unwrap();
        assert_eq!(
            arrays.segment(SegmentId(0)).unwrap(),
            &[true, false, true, false, true]
        );
        assert!(!arrays.has_segment(SegmentId(1)));

        arrays.set(SegmentId(2), 0, true);
        assert!(matches!(
            arrays.merge(SegmentId(2), SegmentId(0)),
            Err(StoreError::UnsupportedMerge { .. })
        ));
    }

    #[test]
    fn test_channel_rejects_wrong_value_kind() {
        let mut channel = Channel::new(ChannelId(0), ChannelKind::Event, ChannelConfig::named("a"));
        let err = channel
            .set(SegmentId(0), 0, Value::Pos(Position::new(1.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, StoreError::WrongChannelKind { .. }));

        let (modified, _) = channel.set(SegmentId(0), 0, Value::Event(true)).unwrap();
        assert!(modified);
        assert_eq!(channel.coded_frames(), 1);
        assert_eq!(channel.segment_rows(SegmentId(0)), vec![(1.0, None)]);
    }

    #[test]
    fn test_zone_has_no_frame_values() {
        let zone = Channel::new(ChannelId(4), ChannelKind::Zone, ChannelConfig::named("arena"));
        let err = zone.get(SegmentId(0), 0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotTemporal {
                id: ChannelId(4),
                found: ChannelKind::Zone
            }
        ));
        assert_eq!(
            err.to_string(),
            "channel 4 is a zone channel and holds no per-frame values"
        );
    }
}
