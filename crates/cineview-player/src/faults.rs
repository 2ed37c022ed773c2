//! Fault observability
//!
//! Every fault the controller handles, fatal or not, is recorded here so a
//! session's failure history can be inspected after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// Fault families mirror the two escalation paths of the controller:
/// the network layer it owns and the decoder it listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultFamily {
    /// Manifest or segment fetch failure
    Network,
    /// Decode pipeline error reported by the decoder sink
    Media,
}

impl std::fmt::Display for FaultFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultFamily::Network => write!(f, "network"),
            FaultFamily::Media => write!(f, "media"),
        }
    }
}

/// Per-family fault counters used for backoff and escalation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultCounters {
    pub network: u32,
    pub media: u32,
}

impl FaultCounters {
    pub fn bump(&mut self, family: FaultFamily) -> u32 {
        let counter = match family {
            FaultFamily::Network => &mut self.network,
            FaultFamily::Media => &mut self.media,
        };
        *counter += 1;
        *counter
    }

    pub fn get(&self, family: FaultFamily) -> u32 {
        match family {
            FaultFamily::Network => self.network,
            FaultFamily::Media => self.media,
        }
    }
}

/// One recorded fault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRecord {
    pub family: FaultFamily,
    pub detail: String,
    pub at: DateTime<Utc>,
    /// Counter snapshot taken after this fault was counted
    pub counters: FaultCounters,
}

/// Bounded in-memory fault history owned by a playback session
#[derive(Debug)]
pub struct FaultLog {
    entries: VecDeque<FaultRecord>,
    capacity: usize,
    counters: FaultCounters,
}

impl FaultLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            counters: FaultCounters::default(),
        }
    }

    /// Count and record a fault, returning the updated per-family count
    pub fn record(&mut self, family: FaultFamily, detail: impl Into<String>) -> u32 {
        let detail = detail.into();
        let count = self.counters.bump(family);

        warn!(%family, count, detail = %detail, "Playback fault recorded");

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(FaultRecord {
            family,
            detail,
            at: Utc::now(),
            counters: self.counters,
        });

        count
    }

    pub fn counters(&self) -> FaultCounters {
        self.counters
    }

    pub fn records(&self) -> impl Iterator<Item = &FaultRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// History as JSON for telemetry export
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.entries.iter().collect::<Vec<_>>())
            .unwrap_or(serde_json::Value::Null)
    }
}
