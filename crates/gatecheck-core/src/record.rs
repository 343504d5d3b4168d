use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded decision status document.
///
/// Only the fields the contracts inspect are modelled; everything else in the
/// source document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub overall_decision: String,

    #[serde(alias = "qg_04_result")]
    pub primary_gate_result: String,

    pub recommendation_signal: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,

    #[serde(default)]
    pub evidence_items: Vec<EvidenceItem>,

    #[serde(default)]
    pub downstream_consumers: Vec<String>,

    #[serde(default)]
    pub unresolved_blockers: Vec<Blocker>,

    #[serde(default)]
    pub downstream_handoffs: Vec<Handoff>,
}

impl DecisionRecord {
    /// Blocker ids in document order.
    pub fn blocker_ids(&self) -> Vec<&str> {
        self.unresolved_blockers
            .iter()
            .map(|b| b.blocker_id.as_str())
            .collect()
    }

    /// First handoff whose `consumer_seed` matches.
    pub fn handoff(&self, consumer_seed: &str) -> Option<&Handoff> {
        self.downstream_handoffs
            .iter()
            .find(|h| h.consumer_seed == consumer_seed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStatus {
    Pass,
    Fail,
}

impl EvidenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceStatus::Pass => "pass",
            EvidenceStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub evidence_id: String,
    pub status: EvidenceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub blocker_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_utc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    pub consumer_seed: String,
    pub required_inputs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_state: Option<String>,
}
