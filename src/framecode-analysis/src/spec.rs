//! Declarative batch analysis: derived channels plus statistics to compute

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

use framecode_store::ChannelKind;

use crate::derived::DerivedChannelSpec;
use crate::error::{AnalysisError, Result};
use crate::file::FileAnalysis;
use crate::stats::{StatArgs, StatValue, Statistic};

/// One statistic applied to a set of channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticSpec {
    pub statistic: Statistic,
    /// Channels of the statistic's kind; empty means all of them
    #[serde(default)]
    pub channels: Vec<String>,
    /// Column header; defaults to the statistic name plus its arguments
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub args: StatArgs,
}

impl StatisticSpec {
    pub fn new(statistic: Statistic) -> Self {
        Self {
            statistic,
            channels: Vec::new(),
            label: None,
            args: StatArgs::default(),
        }
    }

    pub fn label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let mut label = self.statistic.as_str().to_string();
        if let Some(zone) = &self.args.zone {
            label.push(':');
            label.push_str(zone);
        }
        if self.args.start.is_some() || self.args.end.is_some() {
            let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
            label.push_str(&format!("[{}-{}]", fmt(self.args.start), fmt(self.args.end)));
        }
        label
    }

    fn validate(&self) -> Result<()> {
        if self.statistic == Statistic::MeanCenterDistance && self.args.zone.is_none() {
            return Err(AnalysisError::MissingArgument {
                statistic: self.statistic.as_str(),
                argument: "zone",
            });
        }
        if let (Some(start), Some(end)) = (self.args.start, self.args.end) {
            if start > end {
                return Err(AnalysisError::InvalidArgument(format!(
                    "{}: start {} is after end {}",
                    self.label(),
                    start,
                    end
                )));
            }
        }
        Ok(())
    }
}

/// Statistics of one channel of one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStats {
    pub kind: ChannelKind,
    pub channel: String,
    pub values: BTreeMap<String, StatValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSpec {
    pub derived_channels: Vec<DerivedChannelSpec>,
    pub computations: Vec<StatisticSpec>,
}

impl AnalysisSpec {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let spec: AnalysisSpec = serde_yaml::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Every statistic in the default configuration
    pub fn all_statistics() -> Self {
        Self {
            derived_channels: Vec::new(),
            computations: Statistic::ALL
                .into_iter()
                .filter(|s| *s != Statistic::MeanCenterDistance)
                .map(StatisticSpec::new)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.derived_channels.is_empty() && self.computations.is_empty()
    }

    /// Check arguments and derived channel ordering without touching a file
    pub fn validate(&self) -> Result<()> {
        for computation in &self.computations {
            computation.validate()?;
        }
        self.derived_order()?;
        Ok(())
    }

    /// Column labels in computation order, duplicates removed
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for computation in &self.computations {
            let label = computation.label();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    /// Derived channel declarations sorted so every channel follows the
    /// derived channels it reads
    pub fn derived_order(&self) -> Result<Vec<&DerivedChannelSpec>> {
        let by_name: HashMap<&str, usize> = self
            .derived_channels
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();
        if by_name.len() != self.derived_channels.len() {
            let mut seen = Vec::new();
            for d in &self.derived_channels {
                if seen.contains(&d.name.as_str()) {
                    return Err(AnalysisError::DuplicateChannel(d.name.clone()));
                }
                seen.push(d.name.as_str());
            }
        }

        let n = self.derived_channels.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, d) in self.derived_channels.iter().enumerate() {
            for input in d.event_inputs() {
                if let Some(&j) = by_name.get(input) {
                    if j == i {
                        return Err(AnalysisError::DependencyCycle(vec![d.name.clone()]));
                    }
                    indegree[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(&self.derived_channels[i]);
            for &k in &dependents[i] {
                indegree[k] -= 1;
                if indegree[k] == 0 {
                    ready.push_back(k);
                }
            }
        }

        if order.len() != n {
            let stuck = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.derived_channels[i].name.clone())
                .collect();
            return Err(AnalysisError::DependencyCycle(stuck));
        }
        Ok(order)
    }

    /// Materialize all derived channels, then compute every statistic.
    ///
    /// Returns one entry per channel that received at least one value,
    /// ordered by kind then channel order.
    pub fn apply(&self, analysis: &mut FileAnalysis) -> Result<Vec<ChannelStats>> {
        for derived in self.derived_order()? {
            analysis.add_derived_channel(derived)?;
        }

        let mut table: Vec<ChannelStats> = Vec::new();
        for kind in [ChannelKind::Event, ChannelKind::Pos, ChannelKind::Zone] {
            for name in analysis.channel_names(kind) {
                table.push(ChannelStats {
                    kind,
                    channel: name,
                    values: BTreeMap::new(),
                });
            }
        }

        for computation in &self.computations {
            computation.validate()?;
            let kind = computation.statistic.channel_kind();
            let label = computation.label();
            let channels = if computation.channels.is_empty() {
                analysis.channel_names(kind)
            } else {
                computation.channels.clone()
            };

            for name in channels {
                let value = analysis.compute_statistic(&name, computation.statistic, &computation.args)?;
                debug!("{} {:?}: {} = {}", kind, name, label, value);
                if let Some(row) = table
                    .iter_mut()
                    .find(|r| r.kind == kind && r.channel == name)
                {
                    row.values.insert(label.clone(), value);
                }
            }
        }

        table.retain(|r| !r.values.is_empty());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::DerivedMethod;
    use framecode_store::{ChannelConfig, DataFile, Value};

    fn derived(name: &str, source: &str, others: &[&str]) -> DerivedChannelSpec {
        DerivedChannelSpec {
            name: name.into(),
            method: DerivedMethod::CombineEventsOr,
            source: source.into(),
            event_channels: others.iter().map(|s| s.to_string()).collect(),
            zone_channels: vec![],
        }
    }

    fn analysis() -> FileAnalysis {
        let mut file = DataFile::create_in_memory().unwrap();
        let c1 = file
            .create_channel(ChannelKind::Event, ChannelConfig::named("c1"))
            .unwrap();
        let c0 = file
            .create_channel(ChannelKind::Event, ChannelConfig::named("c0"))
            .unwrap();
        for t in [0.0, 1.0, 2.0, 3.0, 4.0] {
            file.add_timestamp(t).unwrap();
        }
        file.set_value(c1, 1.0, Value::Event(true)).unwrap();
        file.set_value(c0, 3.0, Value::Event(true)).unwrap();
        file.notify_interrupted().unwrap();
        FileAnalysis::from_data_file(&file).unwrap()
    }

    #[test]
    fn test_derived_channels_in_dependency_order() {
        // c3 is declared before the c2 it depends on
        let spec = AnalysisSpec {
            derived_channels: vec![derived("c3", "c2", &["c0"]), derived("c2", "c1", &[])],
            computations: vec![StatisticSpec::new(Statistic::EventCount)],
        };
        let order: Vec<&str> = spec
            .derived_order()
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(order, vec!["c2", "c3"]);

        let mut batch = analysis();
        spec.apply(&mut batch).unwrap();

        let mut stepwise = analysis();
        stepwise
            .add_derived_channel(&derived("c2", "c1", &[]))
            .unwrap();
        stepwise
            .add_derived_channel(&derived("c3", "c2", &["c0"]))
            .unwrap();

        for name in ["c2", "c3"] {
            assert_eq!(
                batch.event_channel(name).unwrap().data,
                stepwise.event_channel(name).unwrap().data
            );
        }
        assert_eq!(
            batch.event_channel("c3").unwrap().data,
            vec![false, true, false, true, false]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let spec = AnalysisSpec {
            derived_channels: vec![derived("x", "y", &[]), derived("y", "x", &[])],
            computations: vec![],
        };
        match spec.validate() {
            Err(AnalysisError::DependencyCycle(names)) => assert_eq!(names.len(), 2),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_zone_argument() {
        let text = r#"
computations:
  - statistic: mean_center_distance
    channels: [nose]
"#;
        assert!(matches!(
            AnalysisSpec::from_yaml_str(text),
            Err(AnalysisError::MissingArgument { argument: "zone", .. })
        ));
    }

    #[test]
    fn test_apply_builds_rows_per_channel() {
        let text = r#"
derived_channels:
  - name: either
    method: combine_events_or
    source: c1
    event_channels: [c0]
computations:
  - statistic: event_count
  - statistic: active_duration
    channels: [either]
    start: 0.5
    label: early_activity
"#;
        let spec = AnalysisSpec::from_yaml_str(text).unwrap();
        assert_eq!(spec.labels(), vec!["event_count", "early_activity"]);

        let mut analysis = analysis();
        let rows = spec.apply(&mut analysis).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(names, vec!["c1", "c0", "either"]);
        assert_eq!(rows[2].values["event_count"], StatValue::Count(2));
        assert_eq!(rows[2].values["early_activity"], StatValue::Number(0.0));
        assert!(!rows[0].values.contains_key("early_activity"));
    }

    #[test]
    fn test_unknown_channel_in_computation() {
        let spec = AnalysisSpec {
            derived_channels: vec![],
            computations: vec![StatisticSpec {
                channels: vec!["ghost".into()],
                ..StatisticSpec::new(Statistic::EventCount)
            }],
        };
        let mut analysis = analysis();
        assert!(matches!(
            spec.apply(&mut analysis),
            Err(AnalysisError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn test_default_labels() {
        let mut spec = StatisticSpec::new(Statistic::MeanCenterDistance);
        spec.args.zone = Some("arena".into());
        spec.args.start = Some(1.0);
        assert_eq!(spec.label(), "mean_center_distance:arena[1-]");
    }
}
