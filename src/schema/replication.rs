use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::core::{MapperError, Result};

/// Recognized replication strategy classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyClass {
    Simple,
    NetworkTopology,
    OldNetworkTopology,
}

impl StrategyClass {
    pub fn name(self) -> &'static str {
        match self {
            Self::Simple => "SimpleStrategy",
            Self::NetworkTopology => "NetworkTopologyStrategy",
            Self::OldNetworkTopology => "OldNetworkTopologyStrategy",
        }
    }

    /// Fully qualified class name as stored in the cluster's metadata.
    pub fn qualified(self) -> &'static str {
        match self {
            Self::Simple => "org.apache.cassandra.locator.SimpleStrategy",
            Self::NetworkTopology => "org.apache.cassandra.locator.NetworkTopologyStrategy",
            Self::OldNetworkTopology => "org.apache.cassandra.locator.OldNetworkTopologyStrategy",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let short = name.rsplit('.').next().unwrap_or(name);
        match short {
            "SimpleStrategy" => Ok(Self::Simple),
            "NetworkTopologyStrategy" => Ok(Self::NetworkTopology),
            "OldNetworkTopologyStrategy" => Ok(Self::OldNetworkTopology),
            _ => Err(MapperError::InvalidArgument(format!(
                "unrecognized replication strategy class '{}'",
                name
            ))),
        }
    }
}

/// Desired replication: strategy class plus options (replication factors).
#[derive(Debug, Clone)]
pub struct Replication {
    class: StrategyClass,
    options: BTreeMap<String, Json>,
}

impl Replication {
    pub fn new(class: StrategyClass, options: BTreeMap<String, Json>) -> Self {
        Self { class, options }
    }

    pub fn simple(replication_factor: u32) -> Self {
        let mut options = BTreeMap::new();
        options.insert(
            "replication_factor".to_string(),
            Json::from(replication_factor),
        );
        Self {
            class: StrategyClass::Simple,
            options,
        }
    }

    pub fn network_topology<I, S>(datacenters: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let options = datacenters
            .into_iter()
            .map(|(dc, factor)| (dc.into(), Json::from(factor)))
            .collect();
        Self {
            class: StrategyClass::NetworkTopology,
            options,
        }
    }

    pub fn class(&self) -> StrategyClass {
        self.class
    }

    /// CQL map literal, e.g.
    /// `{'class': 'SimpleStrategy', 'replication_factor': 3}`.
    pub fn to_cql(&self) -> String {
        let mut parts = vec![format!("'class': '{}'", self.class.name())];
        for (key, value) in &self.options {
            let rendered = match value {
                Json::String(s) => format!("'{}'", s),
                other => other.to_string(),
            };
            parts.push(format!("'{}': {}", key, rendered));
        }
        format!("{{{}}}", parts.join(", "))
    }

    /// Compares against the live metadata row: a qualified class name and
    /// JSON-encoded option strings. Both sides are normalized to canonical
    /// scalar strings before comparison, so a live `"3"` matches a desired
    /// numeric 3. Only desired keys are checked; the cluster may report
    /// additional bookkeeping options.
    pub fn matches_live(&self, live_class: &str, live_options_json: &str) -> bool {
        if live_class != self.class.qualified() && live_class != self.class.name() {
            return false;
        }
        let live: BTreeMap<String, Json> = match serde_json::from_str(live_options_json) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };
        self.options.iter().all(|(key, desired)| {
            live.get(key)
                .is_some_and(|found| scalar_string(found) == scalar_string(desired))
        })
    }
}

fn scalar_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
