//! Data file controller
//!
//! Owns one open container: the timestamp index, every channel and the
//! file-level metadata. All mutations are applied in memory and written
//! through to SQLite before the call returns.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::channel::{Appended, Channel, ChannelData, SampleValue, TemporalArrays};
use crate::error::{Result, StoreError};
use crate::names::fix_name;
use crate::queries::{self, APP_CONFIG, DATA_CONFIG, VIDEO_METADATA};
use crate::schema::*;
use crate::timestamps::{Resolved, TimestampIndex};
use crate::Database;

pub struct DataFile {
    db: Database,
    index: TimestampIndex,
    channels: BTreeMap<ChannelId, Channel>,
    state: FileState,
    video_metadata: BTreeMap<String, serde_yaml::Value>,
    read_only: bool,
}

impl DataFile {
    /// Create and initialize a new file; fails if `path` already exists
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        Self::init_new(Database::open(path)?)
    }

    pub fn create_in_memory() -> Result<Self> {
        Self::init_new(Database::open_in_memory()?)
    }

    /// Open an existing file read-write, upgrading its schema if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        let mut file = Self::load(Database::open(path)?, false)?;
        file.settle_all_segments()?;
        Ok(file)
    }

    /// Open an existing file for reading only
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::NotFound(path.display().to_string()));
        }
        Self::load(Database::open_read_only(path)?, true)
    }

    fn init_new(db: Database) -> Result<Self> {
        let state = FileState::new();
        in_transaction(&db, |conn| {
            queries::insert_segment(conn, SegmentId::PRIMARY)?;
            persist_state(conn, &state)?;
            queries::replace_config_section(conn, VIDEO_METADATA, &[])?;
            Ok(())
        })?;
        info!("initialized new data file (format {})", state.format_version);

        Ok(Self {
            db,
            index: TimestampIndex::new(),
            channels: BTreeMap::new(),
            state,
            video_metadata: BTreeMap::new(),
            read_only: false,
        })
    }

    fn load(db: Database, read_only: bool) -> Result<Self> {
        let conn = db.connection();
        if !queries::has_config_section(conn, DATA_CONFIG)? {
            return Err(StoreError::InvalidData(
                "file has no data_config section; it was never initialized".into(),
            ));
        }

        let state: FileState = from_entries(queries::get_config_section(conn, DATA_CONFIG)?)?;
        let video_metadata = from_entries(queries::get_config_section(conn, VIDEO_METADATA)?)?;
        let index =
            TimestampIndex::from_segments(queries::load_timestamps(conn)?, state.segment_counter)?;

        let mut channels = BTreeMap::new();
        for (id, kind) in queries::list_channels(conn)? {
            let config: ChannelConfig = from_entries(queries::get_channel_config(conn, id)?)?;
            let rows = if kind.is_temporal() {
                queries::load_channel_values(conn, id)?
            } else {
                BTreeMap::new()
            };
            let mut channel = Channel {
                id,
                config,
                data: ChannelData::from_rows(kind, rows),
            };
            for segment in index.segment_ids() {
                channel.create_segment(segment);
            }
            channels.insert(id, channel);
        }

        info!(
            "loaded data file: {} timestamps in {} segments, {} channels",
            index.len(),
            index.segment_count(),
            channels.len()
        );

        Ok(Self {
            db,
            index,
            channels,
            state,
            video_metadata,
            read_only,
        })
    }

    /// Write a consistent copy of the file to `path`
    pub fn save_copy(&self, path: impl AsRef<Path>) -> Result<()> {
        self.db.backup_to(path)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn has_content(&self) -> bool {
        self.index.has_content()
    }

    pub fn index(&self) -> &TimestampIndex {
        &self.index
    }

    pub fn state(&self) -> &FileState {
        &self.state
    }

    pub fn saw_all_timestamps(&self) -> bool {
        self.state.saw_all_timestamps
    }

    pub fn saw_first_timestamp(&self) -> bool {
        self.state.saw_first_timestamp
    }

    pub fn saw_last_timestamp(&self) -> bool {
        self.state.saw_last_timestamp
    }

    pub fn segment_infos(&self) -> Vec<SegmentInfo> {
        self.index.segment_infos()
    }

    // ---- recording ----

    /// Register a delivered frame timestamp and return the active segment
    pub fn add_timestamp(&mut self, t: Timestamp) -> Result<SegmentId> {
        if self.state.saw_all_timestamps {
            return Ok(SegmentId::PRIMARY);
        }
        self.ensure_writable()?;

        let resolved = self.index.resolve_or_add(t)?;
        match resolved {
            Resolved::Existing { segment } => Ok(segment),
            Resolved::Appended {
                segment,
                offset,
                created,
            } => {
                if created {
                    for channel in self.channels.values_mut() {
                        channel.create_segment(segment);
                    }
                    self.state.segment_counter = self.index.segment_counter();
                }
                let state = &self.state;
                in_transaction(&self.db, |conn| {
                    if created {
                        queries::insert_segment(conn, segment)?;
                        persist_state(conn, state)?;
                    }
                    queries::insert_timestamp(conn, segment, offset, t)
                })?;
                Ok(segment)
            }
            Resolved::Merged {
                into,
                absorbed,
                base_len,
                absorbed_len,
            } => {
                let (ids, pending) = self.merge_channels(into, absorbed, base_len, absorbed_len)?;
                self.refresh_saw_all();
                let state = &self.state;
                in_transaction(&self.db, |conn| {
                    persist_appended(conn, &pending)?;
                    for &id in &ids {
                        queries::merge_channel_segments(conn, id, into, absorbed, base_len)?;
                    }
                    queries::merge_timestamp_segments(conn, into, absorbed, base_len)?;
                    persist_state(conn, state)
                })?;
                debug!(
                    "merged segment {} into {} for {} channels",
                    absorbed,
                    into,
                    ids.len()
                );
                Ok(into)
            }
        }
    }

    /// Playback sought away; settle the active segment's arrays
    pub fn notify_interrupted(&mut self) -> Result<()> {
        if self.state.saw_all_timestamps {
            return Ok(());
        }
        if let Some(segment) = self.index.interrupt() {
            self.settle_segment(segment)?;
        }
        Ok(())
    }

    pub fn notify_saw_first(&mut self) -> Result<()> {
        if self.state.saw_all_timestamps || self.state.saw_first_timestamp {
            return Ok(());
        }
        self.ensure_writable()?;
        self.state.saw_first_timestamp = true;
        self.refresh_saw_all();
        self.persist_state()
    }

    /// The final frame of the video was delivered; settles and closes the active segment
    pub fn notify_saw_last(&mut self) -> Result<()> {
        if self.state.saw_all_timestamps {
            return Ok(());
        }
        self.ensure_writable()?;
        if let Some(segment) = self.index.interrupt() {
            self.settle_segment(segment)?;
        }
        self.state.saw_last_timestamp = true;
        self.refresh_saw_all();
        self.persist_state()
    }

    fn refresh_saw_all(&mut self) {
        let saw_all = self.state.saw_first_timestamp
            && self.state.saw_last_timestamp
            && self.index.segment_count() == 1;
        if saw_all && !self.state.saw_all_timestamps {
            info!("all {} timestamps of the video have been seen", self.index.len());
        }
        self.state.saw_all_timestamps = saw_all;
    }

    /// Temporal channel ids, events before positions
    fn temporal_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<(ChannelKind, ChannelId)> = self
            .channels
            .values()
            .filter(|c| c.kind().is_temporal())
            .map(|c| (c.kind(), c.id))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Pad every temporal channel's array for `segment` up to its timestamp count
    fn settle_segment(&mut self, segment: SegmentId) -> Result<()> {
        let len = match self.index.segment_len(segment) {
            Some(len) if len > 0 => len,
            _ => return Ok(()),
        };
        self.ensure_writable()?;

        let mut pending = Vec::new();
        for id in self.temporal_ids() {
            if let Some(channel) = self.channels.get_mut(&id) {
                if let Some(appended) = channel.pad_to(segment, len)? {
                    pending.push((id, appended));
                }
            }
        }
        if !pending.is_empty() {
            debug!("padded {} channel arrays of segment {} to {}", pending.len(), segment, len);
        }
        in_transaction(&self.db, |conn| persist_appended(conn, &pending))
    }

    fn settle_all_segments(&mut self) -> Result<()> {
        let segments: Vec<SegmentId> = self.index.segment_ids().collect();
        for segment in segments {
            self.settle_segment(segment)?;
        }
        Ok(())
    }

    /// Merge channel arrays in memory; returns the temporal channels and the
    /// padding rows still to be written with the rest of the merge
    fn merge_channels(
        &mut self,
        into: SegmentId,
        absorbed: SegmentId,
        base_len: usize,
        absorbed_len: usize,
    ) -> Result<(Vec<ChannelId>, Vec<(ChannelId, Appended)>)> {
        let mut pending = Vec::new();
        let ids = self.temporal_ids();
        for &id in &ids {
            if let Some(channel) = self.channels.get_mut(&id) {
                if let Some(appended) = channel.pad_to(into, base_len)? {
                    pending.push((id, appended));
                }
                if let Some(appended) = channel.pad_to(absorbed, absorbed_len)? {
                    pending.push((id, appended));
                }
                channel.merge(into, absorbed)?;
            }
        }
        Ok((ids, pending))
    }

    // ---- channels ----

    /// Create a channel; an empty name gets `<kind>_channel_<id>`
    pub fn create_channel(&mut self, kind: ChannelKind, mut config: ChannelConfig) -> Result<ChannelId> {
        self.ensure_writable()?;

        let id = ChannelId(self.state.channel_count);
        if config.name.is_empty() {
            config.name = fix_name(&format!("{}_channel_{}", kind, id), self.names());
        }
        self.check_name_free(&config.name, None)?;

        let mut channel = Channel::new(id, kind, config);
        for (segment, len) in self.index.segment_lengths() {
            channel.create_segment(segment);
            channel.pad_to(segment, len)?;
        }

        self.state.channel_count += 1;
        let state = &self.state;
        in_transaction(&self.db, |conn| {
            insert_channel_record(conn, &channel)?;
            persist_state(conn, state)
        })?;

        info!("created {} channel {} ({:?})", kind, id, channel.name());
        self.channels.insert(id, channel);
        Ok(id)
    }

    /// Remove a channel and its arrays; its id is never handed out again
    pub fn delete_channel(&mut self, id: ChannelId) -> Result<()> {
        self.ensure_writable()?;
        let channel = self
            .channels
            .remove(&id)
            .ok_or(StoreError::ChannelNotFound(id))?;
        queries::delete_channel(self.db.connection(), id)?;
        info!("deleted {} channel {} ({:?})", channel.kind(), id, channel.name());
        Ok(())
    }

    /// Copy a channel's config and arrays into a new channel with a unique name
    pub fn duplicate_channel(&mut self, id: ChannelId) -> Result<ChannelId> {
        self.ensure_writable()?;
        let source = self.channel(id)?;
        let mut config = source.config.clone();
        config.name = fix_name(&config.name, self.names());
        let data = source.data.clone();

        let new_id = ChannelId(self.state.channel_count);
        let channel = Channel {
            id: new_id,
            config,
            data,
        };

        self.state.channel_count += 1;
        let state = &self.state;
        in_transaction(&self.db, |conn| {
            insert_channel_record(conn, &channel)?;
            persist_state(conn, state)
        })?;

        info!("duplicated channel {} as {} ({:?})", id, new_id, channel.name());
        self.channels.insert(new_id, channel);
        Ok(new_id)
    }

    pub fn channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channels.get(&id).ok_or(StoreError::ChannelNotFound(id))
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&Channel> {
        self.channels.values().find(|c| c.name() == name)
    }

    /// Live channels in id order
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.values()
    }

    pub fn channels_of_kind(&self, kind: ChannelKind) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.values().filter(move |c| c.kind() == kind)
    }

    pub fn channel_summaries(&self) -> Vec<ChannelSummary> {
        self.channels
            .values()
            .map(|c| ChannelSummary {
                id: c.id,
                kind: c.kind(),
                name: c.name().to_string(),
                coded_frames: c.coded_frames(),
            })
            .collect()
    }

    fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.channels.values().map(|c| c.name())
    }

    fn check_name_free(&self, name: &str, except: Option<ChannelId>) -> Result<()> {
        let taken = self
            .channels
            .values()
            .any(|c| Some(c.id) != except && c.name() == name);
        if taken {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    pub fn channel_config(&self, id: ChannelId) -> Result<&ChannelConfig> {
        Ok(&self.channel(id)?.config)
    }

    /// Replace a channel's config; the name must stay unique
    pub fn set_channel_config(&mut self, id: ChannelId, config: ChannelConfig) -> Result<()> {
        self.ensure_writable()?;
        self.channel(id)?;
        self.check_name_free(&config.name, Some(id))?;

        let entries = to_entries(&config)?;
        in_transaction(&self.db, |conn| queries::set_channel_config(conn, id, &entries))?;
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.config = config;
        }
        Ok(())
    }

    pub fn set_zone_shape(&mut self, id: ChannelId, shape: Shape) -> Result<()> {
        let channel = self.channel(id)?;
        if channel.kind() != ChannelKind::Zone {
            return Err(StoreError::WrongChannelKind {
                id,
                expected: ChannelKind::Zone,
                found: channel.kind(),
            });
        }
        let config = channel.config.clone().with_shape(shape);
        self.set_channel_config(id, config)
    }

    pub fn zone_shape(&self, id: ChannelId) -> Result<Option<&Shape>> {
        Ok(self.channel(id)?.shape())
    }

    // ---- values ----

    /// Write a channel value at a known timestamp; returns whether the frame is now coded
    pub fn set_value(&mut self, id: ChannelId, t: Timestamp, value: Value) -> Result<bool> {
        self.ensure_writable()?;
        let slot = self.index.lookup(t).ok_or(StoreError::TimestampNotFound(t))?;
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or(StoreError::ChannelNotFound(id))?;
        let (modified, padded) = channel.set(slot.segment, slot.offset, value)?;

        let row = match value {
            Value::Event(v) => v.to_row(),
            Value::Pos(p) => p.to_row(),
        };
        in_transaction(&self.db, |conn| {
            if let Some(appended) = &padded {
                queries::insert_channel_values(
                    conn,
                    id,
                    appended.segment,
                    appended.start_offset,
                    &appended.rows,
                )?;
            }
            queries::update_channel_value(conn, id, slot.segment, slot.offset, row)
        })?;
        Ok(modified)
    }

    pub fn get_value(&self, id: ChannelId, t: Timestamp) -> Result<Value> {
        let slot = self.index.lookup(t).ok_or(StoreError::TimestampNotFound(t))?;
        self.channel(id)?.get(slot.segment, slot.offset)
    }

    /// For every known timestamp, whether the channel is coded there; sorted by time
    pub fn get_modified_state(&self, id: ChannelId) -> Result<Vec<(Timestamp, bool)>> {
        let channel = self.channel(id)?;
        if !channel.kind().is_temporal() {
            return Err(StoreError::NotTemporal {
                id,
                found: channel.kind(),
            });
        }
        let mut state: Vec<(Timestamp, bool)> = self
            .index
            .iter()
            .map(|(t, slot)| (t, channel.is_set_at(slot.segment, slot.offset)))
            .collect();
        state.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(state)
    }

    // ---- file metadata ----

    pub fn video_metadata(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.video_metadata
    }

    pub fn set_video_metadata(&mut self, metadata: BTreeMap<String, serde_yaml::Value>) -> Result<()> {
        self.ensure_writable()?;
        let entries = to_entries(&metadata)?;
        in_transaction(&self.db, |conn| {
            queries::replace_config_section(conn, VIDEO_METADATA, &entries)
        })?;
        self.video_metadata = metadata;
        Ok(())
    }

    /// Store opaque application settings alongside the data
    pub fn write_app_config(&mut self, config: &BTreeMap<String, serde_yaml::Value>) -> Result<()> {
        self.ensure_writable()?;
        let entries = to_entries(config)?;
        in_transaction(&self.db, |conn| {
            queries::replace_config_section(conn, APP_CONFIG, &entries)
        })
    }

    pub fn read_app_config(&self) -> Result<BTreeMap<String, serde_yaml::Value>> {
        from_entries(queries::get_config_section(self.db.connection(), APP_CONFIG)?)
    }

    pub fn set_pixels_per_meter(&mut self, pixels_per_meter: f64) -> Result<()> {
        self.ensure_writable()?;
        if !(pixels_per_meter >= 0.0) {
            return Err(StoreError::InvalidData(format!(
                "pixels per meter must be non-negative, got {}",
                pixels_per_meter
            )));
        }
        self.state.pixels_per_meter = pixels_per_meter;
        self.persist_state()
    }

    /// Populate a fresh file from in-memory arrays in one transaction
    pub fn import_arrays(&mut self, arrays: FileArrays) -> Result<()> {
        self.ensure_writable()?;
        if self.has_content() || !self.channels.is_empty() {
            return Err(StoreError::InvalidData(
                "arrays can only be imported into an empty file".into(),
            ));
        }

        let mut timestamps = arrays.timestamps;
        if timestamps.is_empty() {
            timestamps.push(Vec::new());
        }
        let lengths: Vec<usize> = timestamps.iter().map(Vec::len).collect();
        let segments: BTreeMap<SegmentId, Vec<Timestamp>> = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, ts)| (SegmentId(i as i64), ts))
            .collect();
        let index = TimestampIndex::from_segments(segments, lengths.len() as i64)
            .map_err(|e| StoreError::InvalidData(format!("timestamps: {}", e)))?;

        let mut channels = Vec::new();
        let mut next_id = self.state.channel_count;
        let mut names: Vec<String> = Vec::new();

        let mut push = |config: ChannelConfig, data: ChannelData| -> Result<()> {
            if config.name.is_empty() || names.contains(&config.name) {
                return Err(StoreError::DuplicateName(config.name));
            }
            names.push(config.name.clone());
            channels.push(Channel {
                id: ChannelId(next_id),
                config,
                data,
            });
            next_id += 1;
            Ok(())
        };

        for (config, values) in arrays.event_channels {
            check_lengths(&config.name, &lengths, &values)?;
            push(config, ChannelData::Event(segment_arrays(values)))?;
        }
        for (config, values) in arrays.pos_channels {
            check_lengths(&config.name, &lengths, &values)?;
            push(config, ChannelData::Pos(segment_arrays(values)))?;
        }
        for config in arrays.zone_channels {
            push(config, ChannelData::Zone)?;
        }

        self.state.channel_count = next_id;
        self.state.segment_counter = index.segment_counter();
        if arrays.saw_all_timestamps {
            self.state.saw_first_timestamp = true;
            self.state.saw_last_timestamp = true;
        }
        self.index = index;
        self.refresh_saw_all();
        if arrays.saw_all_timestamps && !self.state.saw_all_timestamps {
            warn!("imported timestamps span several segments; saw_all_timestamps stays false");
        }

        let entries = to_entries(&arrays.video_metadata)?;
        let index = &self.index;
        let state = &self.state;
        in_transaction(&self.db, |conn| {
            for segment in index.segment_ids() {
                if !segment.is_primary() {
                    queries::insert_segment(conn, segment)?;
                }
                let timestamps = index.segment(segment).unwrap_or_default();
                for (offset, &t) in timestamps.iter().enumerate() {
                    queries::insert_timestamp(conn, segment, offset, t)?;
                }
            }
            for channel in &channels {
                insert_channel_record(conn, channel)?;
            }
            queries::replace_config_section(conn, VIDEO_METADATA, &entries)?;
            persist_state(conn, state)
        })?;

        info!(
            "imported {} timestamps and {} channels",
            self.index.len(),
            channels.len()
        );
        self.video_metadata = arrays.video_metadata;
        self.channels = channels.into_iter().map(|c| (c.id, c)).collect();
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn persist_state(&self) -> Result<()> {
        in_transaction(&self.db, |conn| persist_state(conn, &self.state))
    }
}

fn in_transaction<T>(db: &Database, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    let tx = db.connection().unchecked_transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

fn persist_state(conn: &Connection, state: &FileState) -> Result<()> {
    for (key, value) in to_entries(state)? {
        queries::set_config_value(conn, DATA_CONFIG, &key, &value)?;
    }
    Ok(())
}

fn persist_appended(conn: &Connection, pending: &[(ChannelId, Appended)]) -> Result<()> {
    for (id, appended) in pending {
        queries::insert_channel_values(
            conn,
            *id,
            appended.segment,
            appended.start_offset,
            &appended.rows,
        )?;
    }
    Ok(())
}

fn insert_channel_record(conn: &Connection, channel: &Channel) -> Result<()> {
    queries::insert_channel(conn, channel.id, channel.kind())?;
    queries::set_channel_config(conn, channel.id, &to_entries(&channel.config)?)?;
    let segments: Vec<SegmentId> = match &channel.data {
        ChannelData::Event(arrays) => arrays.segments().map(|(s, _)| s).collect(),
        ChannelData::Pos(arrays) => arrays.segments().map(|(s, _)| s).collect(),
        ChannelData::Zone => Vec::new(),
    };
    for segment in segments {
        queries::insert_channel_values(conn, channel.id, segment, 0, &channel.segment_rows(segment))?;
    }
    Ok(())
}

fn check_lengths<V>(name: &str, lengths: &[usize], arrays: &[Vec<V>]) -> Result<()> {
    let matches = arrays.len() == lengths.len()
        && arrays.iter().zip(lengths).all(|(a, &len)| a.len() == len);
    if !matches {
        return Err(StoreError::InvalidData(format!(
            "arrays of channel {:?} do not match the timestamp segments",
            name
        )));
    }
    Ok(())
}

fn segment_arrays<V: SampleValue>(arrays: Vec<Vec<V>>) -> TemporalArrays<V> {
    TemporalArrays::from_segments(
        arrays
            .into_iter()
            .enumerate()
            .map(|(i, values)| (SegmentId(i as i64), values))
            .collect(),
    )
}

/// Serialize a struct or map into per-key YAML entries
fn to_entries<T: Serialize>(value: &T) -> Result<Vec<(String, String)>> {
    match serde_yaml::to_value(value)? {
        serde_yaml::Value::Mapping(map) => map
            .into_iter()
            .map(|(key, value)| -> Result<(String, String)> {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    other => serde_yaml::to_string(&other)?.trim_end().to_string(),
                };
                Ok((key, serde_yaml::to_string(&value)?))
            })
            .collect(),
        serde_yaml::Value::Null => Ok(Vec::new()),
        _ => Err(StoreError::InvalidData(
            "metadata must serialize to a mapping".into(),
        )),
    }
}

fn from_entries<T: DeserializeOwned>(entries: Vec<(String, String)>) -> Result<T> {
    let mut map = serde_yaml::Mapping::new();
    for (key, value) in entries {
        map.insert(
            serde_yaml::Value::String(key),
            serde_yaml::from_str(&value)?,
        );
    }
    Ok(serde_yaml::from_value(serde_yaml::Value::Mapping(map))?)
}
