//! Event channels computed from other channels

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::file::FileAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedMethod {
    /// Position coded and every listed event active
    EventFromPos,
    /// Position coded and inside at least one listed zone
    PosInAnyZone,
    /// Source event and every listed event active
    CombineEventsAnd,
    /// Source event or any listed event active
    CombineEventsOr,
}

impl DerivedMethod {
    pub fn source_is_pos(&self) -> bool {
        matches!(self, DerivedMethod::EventFromPos | DerivedMethod::PosInAnyZone)
    }
}

/// Declaration of one derived event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedChannelSpec {
    pub name: String,
    pub method: DerivedMethod,
    /// Position channel for the pos methods, event channel otherwise
    pub source: String,
    #[serde(default)]
    pub event_channels: Vec<String>,
    #[serde(default)]
    pub zone_channels: Vec<String>,
}

impl DerivedChannelSpec {
    /// Event channels this declaration reads
    pub fn event_inputs(&self) -> impl Iterator<Item = &str> + '_ {
        let source = (!self.method.source_is_pos()).then_some(self.source.as_str());
        source
            .into_iter()
            .chain(self.event_channels.iter().map(String::as_str))
    }
}

impl FileAnalysis {
    pub fn event_from_pos(&self, pos: &str, events: &[String]) -> Result<Vec<bool>> {
        let pos = self.pos_channel(pos)?;
        let mut out: Vec<bool> = pos.data.iter().map(|p| p.is_coded()).collect();
        for name in events {
            and_into(&mut out, &self.event_channel(name)?.data);
        }
        Ok(out)
    }

    pub fn pos_in_any_zone(&self, pos: &str, zones: &[String]) -> Result<Vec<bool>> {
        if zones.is_empty() {
            return Err(AnalysisError::InvalidArgument(
                "pos_in_any_zone needs at least one zone channel".into(),
            ));
        }
        let pos = self.pos_channel(pos)?;
        let shapes = zones
            .iter()
            .map(|z| self.zone_channel(z)?.shape())
            .collect::<Result<Vec<_>>>()?;
        Ok(pos
            .data
            .iter()
            .map(|p| p.is_coded() && shapes.iter().any(|s| s.contains(p)))
            .collect())
    }

    pub fn combine_events_and(&self, event: &str, others: &[String]) -> Result<Vec<bool>> {
        let mut out = self.event_channel(event)?.data.clone();
        for name in others {
            and_into(&mut out, &self.event_channel(name)?.data);
        }
        Ok(out)
    }

    pub fn combine_events_or(&self, event: &str, others: &[String]) -> Result<Vec<bool>> {
        let mut out = self.event_channel(event)?.data.clone();
        for name in others {
            for (o, &v) in out.iter_mut().zip(&self.event_channel(name)?.data) {
                *o |= v;
            }
        }
        Ok(out)
    }

    /// Compute a declared channel and register it as an event channel
    pub fn add_derived_channel(&mut self, spec: &DerivedChannelSpec) -> Result<()> {
        let data = match spec.method {
            DerivedMethod::EventFromPos => self.event_from_pos(&spec.source, &spec.event_channels)?,
            DerivedMethod::PosInAnyZone => self.pos_in_any_zone(&spec.source, &spec.zone_channels)?,
            DerivedMethod::CombineEventsAnd => {
                self.combine_events_and(&spec.source, &spec.event_channels)?
            }
            DerivedMethod::CombineEventsOr => {
                self.combine_events_or(&spec.source, &spec.event_channels)?
            }
        };
        self.add_event_channel(&spec.name, data)?;
        info!("derived event channel {:?} ({:?} of {:?})", spec.name, spec.method, spec.source);
        Ok(())
    }
}

fn and_into(out: &mut [bool], other: &[bool]) {
    for (o, &v) in out.iter_mut().zip(other) {
        *o &= v;
    }
}
