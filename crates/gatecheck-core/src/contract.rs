use chrono::{DateTime, Utc};

use crate::errors::UsageError;
use crate::mode::Mode;
use crate::record::EvidenceStatus;

/// Suite name prefixed to every verdict line of the quality-gate modes.
pub const QUALITY_GATE_SUITE: &str = "quality-gate-baseline";

pub const QUALITY_GATE_SCRIPT: &str = "scripts/generate_quality_gate_decision.py";
pub const DEFAULT_GENERATED_AT: &str = "2026-02-23T22:00:00Z";
pub const CONTRACT_ID_V2: &str = "V013-CONF-02-QUALITY-GATE-v2";

const DECISION_MD: &str = "v011_quality_gate_decision.md";
const DECISION_STATUS: &str = "v011_quality_gate_decision.status.json";

/// How the generator collaborator is invoked for a mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSpec {
    /// Script path relative to the project root.
    pub script: String,
    /// Flag carrying the fixed generation timestamp.
    pub generated_at_flag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Text,
    Status,
}

/// A produced artifact and the checked-in reference it must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenArtifact {
    pub check_name: String,
    /// Generator flag that names the output path.
    pub output_flag: String,
    /// File name inside the run's artifact directory.
    pub file_name: String,
    /// Reference path relative to the project root.
    pub reference: String,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionExpectation {
    pub overall_decision: String,
    pub primary_gate_result: String,
    pub recommendation_signal: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffExpectation {
    pub consumer_seed: String,
    pub required_inputs: Vec<String>,
}

/// Exact expectations for one mode. `None` means the revision does not
/// constrain that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSpec {
    pub mode: Mode,
    pub suite: String,
    pub generator: GeneratorSpec,
    pub goldens: Vec<GoldenArtifact>,
    pub contract_id: Option<String>,
    pub decision: DecisionExpectation,
    pub evidence: Option<Vec<(String, EvidenceStatus)>>,
    pub downstream_consumers: Option<Vec<String>>,
    pub blocker_ids: Option<Vec<String>>,
    pub handoffs: Vec<HandoffExpectation>,
}

impl ContractSpec {
    /// The golden entry whose produced artifact is the structured status document.
    pub fn status_artifact(&self) -> Option<&GoldenArtifact> {
        self.goldens.iter().find(|g| g.kind == ArtifactKind::Status)
    }
}

/// Pure mapping from mode to its contract.
pub fn select(mode: Mode) -> ContractSpec {
    match mode {
        Mode::M09 => baseline(mode),
        Mode::M10 => ContractSpec {
            contract_id: Some(CONTRACT_ID_V2.to_string()),
            evidence: Some(vec![
                ("EV-06".to_string(), EvidenceStatus::Pass),
                ("EV-07".to_string(), EvidenceStatus::Pass),
                ("EV-08".to_string(), EvidenceStatus::Fail),
            ]),
            downstream_consumers: Some(strings(&["V013-CONF-03", "V013-REL-01"])),
            blocker_ids: Some(strings(&["BLK-189-01", "BLK-189-02", "BLK-189-03"])),
            handoffs: vec![
                HandoffExpectation {
                    consumer_seed: "V013-CONF-03".to_string(),
                    required_inputs: strings(&["EV-07", "EV-08"]),
                },
                HandoffExpectation {
                    consumer_seed: "V013-REL-01".to_string(),
                    required_inputs: strings(&["EV-07", "EV-08", "BLK-189 posture"]),
                },
            ],
            ..baseline(mode)
        },
    }
}

fn baseline(mode: Mode) -> ContractSpec {
    ContractSpec {
        mode,
        suite: QUALITY_GATE_SUITE.to_string(),
        generator: GeneratorSpec {
            script: QUALITY_GATE_SCRIPT.to_string(),
            generated_at_flag: "--generated-at".to_string(),
        },
        goldens: vec![
            GoldenArtifact {
                check_name: "md_match".to_string(),
                output_flag: "--output-md".to_string(),
                file_name: DECISION_MD.to_string(),
                reference: format!("reports/releases/{DECISION_MD}"),
                kind: ArtifactKind::Text,
            },
            GoldenArtifact {
                check_name: "status_match".to_string(),
                output_flag: "--output-status".to_string(),
                file_name: DECISION_STATUS.to_string(),
                reference: format!("reports/releases/{DECISION_STATUS}"),
                kind: ArtifactKind::Status,
            },
        ],
        contract_id: None,
        decision: DecisionExpectation {
            overall_decision: "hold".to_string(),
            primary_gate_result: "fail".to_string(),
            recommendation_signal: "no-go".to_string(),
        },
        evidence: None,
        downstream_consumers: None,
        blocker_ids: None,
        handoffs: Vec::new(),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Validate a generation timestamp as RFC 3339 UTC.
pub fn parse_generated_at(value: &str) -> Result<DateTime<Utc>, UsageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| UsageError::InvalidGeneratedAt {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
