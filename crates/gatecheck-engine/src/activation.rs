use std::collections::HashSet;

use gatecheck_core::errors::ActivationError;
use serde::Serialize;
use serde_json::{Map, Value};

pub const OPEN_BLOCKERS_TRIGGER_ID: &str = "T5-OPEN-BLOCKERS";
pub const ACTIVATION_SEED_CONTRACT_ID: &str = "activation-seed-contract/v0.15";
pub const ACTIVATION_SUITE: &str = "activation-triggers";

/// Fixed evaluation order with each trigger's condition text.
pub const TRIGGER_ORDER: [(&str, &str); 4] = [
    ("T1-ISSUES", "open issues > 0"),
    ("T2-MILESTONES", "open milestones > 0"),
    ("T3-ACTIONABLE-ROWS", "actionable catalog rows > 0"),
    (OPEN_BLOCKERS_TRIGGER_ID, "open blockers > 0"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerCounts {
    pub issues: u64,
    pub milestones: u64,
    pub actionable_rows: u64,
    pub open_blockers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerResult {
    pub id: String,
    pub condition: String,
    pub count: u64,
    pub fired: bool,
}

/// One row per trigger, in `TRIGGER_ORDER`.
pub fn evaluate_triggers(counts: &TriggerCounts) -> Vec<TriggerResult> {
    let values = [
        counts.issues,
        counts.milestones,
        counts.actionable_rows,
        counts.open_blockers,
    ];
    TRIGGER_ORDER
        .iter()
        .zip(values)
        .map(|(&(id, condition), count)| TriggerResult {
            id: id.to_string(),
            condition: condition.to_string(),
            count,
            fired: count > 0,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlaySource {
    DefaultFalse,
    CliFlag,
    OverlayJson,
}

impl OverlaySource {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlaySource::DefaultFalse => "default-false",
            OverlaySource::CliFlag => "cli-flag",
            OverlaySource::OverlayJson => "overlay-json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct T4Overlay {
    pub new_scope_publish: bool,
    pub source: OverlaySource,
}

impl T4Overlay {
    pub fn default_false() -> Self {
        Self {
            new_scope_publish: false,
            source: OverlaySource::DefaultFalse,
        }
    }

    pub fn cli_flag() -> Self {
        Self {
            new_scope_publish: true,
            source: OverlaySource::CliFlag,
        }
    }
}

/// The CLI flag wins over an overlay document; with neither the overlay is off.
pub fn resolve_t4_overlay(
    flag_enabled: bool,
    overlay: Option<&Value>,
) -> Result<T4Overlay, ActivationError> {
    if flag_enabled {
        return Ok(T4Overlay::cli_flag());
    }
    match overlay {
        Some(value) => parse_t4_overlay(value),
        None => Ok(T4Overlay::default_false()),
    }
}

/// Accepts a bare boolean or an object carrying `t4_new_scope_publish`
/// and/or the legacy `T4_NEW_SCOPE_PUBLISH`.
pub fn parse_t4_overlay(value: &Value) -> Result<T4Overlay, ActivationError> {
    let new_scope_publish = match value {
        Value::Bool(flag) => *flag,
        Value::Object(map) => {
            let lower = map.get("t4_new_scope_publish");
            let upper = map.get("T4_NEW_SCOPE_PUBLISH");
            match (lower, upper) {
                (None, None) => return Err(ActivationError::OverlayShape),
                (Some(lower), None) => overlay_bool(lower, "t4_new_scope_publish")?,
                (None, Some(upper)) => overlay_bool(upper, "T4_NEW_SCOPE_PUBLISH")?,
                (Some(lower), Some(upper)) => {
                    let lower = overlay_bool(lower, "t4_new_scope_publish")?;
                    let upper = overlay_bool(upper, "T4_NEW_SCOPE_PUBLISH")?;
                    if lower != upper {
                        return Err(ActivationError::OverlayAliasMismatch);
                    }
                    lower
                }
            }
        }
        _ => return Err(ActivationError::OverlayShape),
    };
    Ok(T4Overlay {
        new_scope_publish,
        source: OverlaySource::OverlayJson,
    })
}

fn overlay_bool(value: &Value, key: &str) -> Result<bool, ActivationError> {
    value.as_bool().ok_or_else(|| ActivationError::InvalidField {
        context: format!("T4 governance overlay field '{key}'"),
        expected: "a boolean".to_string(),
    })
}

/// Validate an open-blockers snapshot and return its row count.
pub fn parse_open_blockers_count(payload: &Value) -> Result<u64, ActivationError> {
    match payload {
        Value::Array(rows) => validate_rows(rows, "entries"),
        Value::Object(map) => parse_snapshot_object(map),
        _ => Err(ActivationError::SnapshotShape),
    }
}

fn parse_snapshot_object(map: &Map<String, Value>) -> Result<u64, ActivationError> {
    let rows = map
        .get("open_blockers")
        .ok_or(ActivationError::MissingBlockerRows)?;

    match (map.get("generated_at_utc"), map.get("source")) {
        (None, None) => {}
        (Some(generated_at), Some(source)) => {
            let stamp = generated_at.as_str().unwrap_or_default();
            if chrono::DateTime::parse_from_rfc3339(stamp).is_err() || !stamp.ends_with('Z') {
                return Err(invalid(
                    "open blockers snapshot field 'generated_at_utc'",
                    "an RFC 3339 UTC timestamp",
                ));
            }
            canonical_string(source, "open blockers snapshot field 'source'")?;
        }
        _ => {
            return Err(invalid(
                "open blockers snapshot 'generated_at_utc'",
                "paired with 'source'",
            ))
        }
    }

    let rows = rows.as_array().ok_or_else(|| {
        invalid("open blockers snapshot field 'open_blockers'", "an array")
    })?;
    let discovered = validate_rows(rows, "open_blockers")?;

    let declared = match (map.get("open_blocker_count"), map.get("count")) {
        (None, None) => return Err(ActivationError::MissingCount),
        (Some(current), None) => {
            non_negative(current, "open blockers snapshot field 'open_blocker_count'")?
        }
        (None, Some(legacy)) => non_negative(legacy, "open blockers snapshot field 'count'")?,
        (Some(current), Some(legacy)) => {
            let current = non_negative(current, "open blockers snapshot field 'open_blocker_count'")?;
            let legacy = non_negative(legacy, "open blockers snapshot field 'count'")?;
            if current != legacy {
                return Err(ActivationError::CountAliasMismatch);
            }
            current
        }
    };

    if declared != discovered {
        return Err(ActivationError::CountMismatch {
            declared,
            discovered,
        });
    }
    Ok(declared)
}

type RowKey = (String, String, u64);

fn validate_rows(rows: &[Value], label: &str) -> Result<u64, ActivationError> {
    let mut seen: HashSet<RowKey> = HashSet::new();
    let mut keys: Vec<RowKey> = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let context = format!("open blockers snapshot field '{label}[{index}]'");
        let row = row
            .as_object()
            .ok_or_else(|| invalid(&context, "an object"))?;

        let blocker_id = canonical_string(
            row.get("blocker_id").unwrap_or(&Value::Null),
            &format!("open blockers snapshot field '{label}[{index}].blocker_id'"),
        )?;
        let source_path = relative_posix_path(
            row.get("source_path").unwrap_or(&Value::Null),
            &format!("open blockers snapshot field '{label}[{index}].source_path'"),
        )?;
        let line_number = match (row.get("line_number"), row.get("line")) {
            (Some(current), Some(legacy)) => {
                let current = positive(
                    current,
                    &format!("open blockers snapshot field '{label}[{index}].line_number'"),
                )?;
                let legacy = positive(
                    legacy,
                    &format!("open blockers snapshot field '{label}[{index}].line'"),
                )?;
                if current != legacy {
                    return Err(ActivationError::LineAliasMismatch {
                        index,
                        line_number: current,
                        line: legacy,
                    });
                }
                current
            }
            (current, legacy) => positive(
                current.or(legacy).unwrap_or(&Value::Null),
                &format!(
                    "open blockers snapshot field '{label}[{index}].line_number' (or legacy 'line')"
                ),
            )?,
        };

        let key = (blocker_id, source_path, line_number);
        if !seen.insert(key.clone()) {
            return Err(ActivationError::DuplicateRow {
                blocker_id: key.0,
                source_path: key.1,
                line_number: key.2,
            });
        }
        keys.push(key);
    }

    let sorted = keys
        .windows(2)
        .all(|pair| sort_key(&pair[0]) <= sort_key(&pair[1]));
    if !sorted {
        return Err(ActivationError::Unsorted);
    }
    Ok(keys.len() as u64)
}

fn sort_key(key: &RowKey) -> (String, &str, u64, String, &str) {
    let (blocker_id, source_path, line) = key;
    (
        casefold(source_path),
        source_path.as_str(),
        *line,
        casefold(blocker_id),
        blocker_id.as_str(),
    )
}

/// Unicode full case folding for ordering. On top of `char::to_lowercase`,
/// `ß` and the Latin ligatures expand and Greek symbol variants map onto
/// their letters. Cherokee folds to its uppercase block. Greek letters with
/// iota subscript keep their lowercase form.
fn casefold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'ß' | '\u{1E9E}' => out.push_str("ss"),
            '\u{0149}' => out.push_str("\u{02BC}n"),
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            '\u{017F}' => out.push('s'),
            '\u{00B5}' => out.push('\u{03BC}'),
            '\u{03C2}' => out.push('\u{03C3}'),
            '\u{03D0}' => out.push('\u{03B2}'),
            '\u{03D1}' => out.push('\u{03B8}'),
            '\u{03D5}' => out.push('\u{03C6}'),
            '\u{03D6}' => out.push('\u{03C0}'),
            '\u{03F0}' => out.push('\u{03BA}'),
            '\u{03F1}' => out.push('\u{03C1}'),
            '\u{03F5}' => out.push('\u{03B5}'),
            '\u{0345}' | '\u{1FBE}' => out.push('\u{03B9}'),
            '\u{1E9B}' => out.push('\u{1E61}'),
            '\u{13A0}'..='\u{13F5}' => out.push(c),
            '\u{13F8}'..='\u{13FD}' => out.extend(char::from_u32(c as u32 - 8)),
            '\u{AB70}'..='\u{ABBF}' => out.extend(char::from_u32(c as u32 - 0x97D0)),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

fn invalid(context: &str, expected: &str) -> ActivationError {
    ActivationError::InvalidField {
        context: context.to_string(),
        expected: expected.to_string(),
    }
}

fn canonical_string(value: &Value, context: &str) -> Result<String, ActivationError> {
    let text = value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid(context, "a non-empty string"))?;
    if text != text.trim() {
        return Err(invalid(context, "free of leading/trailing whitespace"));
    }
    Ok(text.to_string())
}

fn relative_posix_path(value: &Value, context: &str) -> Result<String, ActivationError> {
    let path = canonical_string(value, context)?;
    if path.contains('\\') {
        return Err(invalid(context, "a path using '/' separators"));
    }
    let bytes = path.as_bytes();
    let drive_prefix =
        bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/';
    if path.starts_with('/') || drive_prefix {
        return Err(invalid(context, "a relative path"));
    }
    if path.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(invalid(context, "a normalized path"));
    }
    Ok(path)
}

fn positive(value: &Value, context: &str) -> Result<u64, ActivationError> {
    value
        .as_u64()
        .filter(|n| *n > 0)
        .ok_or_else(|| invalid(context, "a positive integer"))
}

fn non_negative(value: &Value, context: &str) -> Result<u64, ActivationError> {
    value
        .as_u64()
        .ok_or_else(|| invalid(context, "a non-negative integer"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueState {
    Idle,
    DispatchOpen,
}

impl QueueState {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueState::Idle => "idle",
            QueueState::DispatchOpen => "dispatch-open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationInputs {
    pub open_blockers_json: Option<String>,
    pub t4_governance_overlay_json: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenBlockersSummary {
    pub count: u64,
    pub trigger_id: String,
    pub trigger_fired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub mode: String,
    pub contract_id: String,
    pub fail_closed: bool,
    pub inputs: ActivationInputs,
    pub trigger_order: Vec<String>,
    pub triggers: Vec<TriggerResult>,
    pub active_trigger_ids: Vec<String>,
    pub activation_required: bool,
    pub open_blockers: OpenBlockersSummary,
    pub t4_governance_overlay: T4Overlay,
    pub gate_open: bool,
    pub queue_state: QueueState,
    pub exit_code: i32,
}

pub fn build_report(
    contract_id: &str,
    counts: &TriggerCounts,
    overlay: T4Overlay,
    inputs: ActivationInputs,
) -> ActivationReport {
    let triggers = evaluate_triggers(counts);
    let active_trigger_ids: Vec<String> = triggers
        .iter()
        .filter(|t| t.fired)
        .map(|t| t.id.clone())
        .collect();
    let activation_required = !active_trigger_ids.is_empty();
    let gate_open = activation_required || overlay.new_scope_publish;

    ActivationReport {
        mode: "offline-deterministic".to_string(),
        contract_id: contract_id.to_string(),
        fail_closed: true,
        inputs,
        trigger_order: TRIGGER_ORDER.iter().map(|(id, _)| id.to_string()).collect(),
        triggers,
        active_trigger_ids,
        activation_required,
        open_blockers: OpenBlockersSummary {
            count: counts.open_blockers,
            trigger_id: OPEN_BLOCKERS_TRIGGER_ID.to_string(),
            trigger_fired: counts.open_blockers > 0,
        },
        t4_governance_overlay: overlay,
        gate_open,
        queue_state: if gate_open {
            QueueState::DispatchOpen
        } else {
            QueueState::Idle
        },
        exit_code: i32::from(gate_open),
    }
}

pub fn render_json(report: &ActivationReport) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string_pretty(report)? + "\n")
}

pub fn render_markdown(report: &ActivationReport) -> String {
    let code_list = |items: &[String]| {
        items
            .iter()
            .map(|i| format!("`{i}`"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let input_cell = |input: &Option<String>| match input {
        Some(path) => format!("`{path}`"),
        None => "_none_".to_string(),
    };

    let mut lines = vec![
        "# Activation Trigger Check".to_string(),
        String::new(),
        format!("- Mode: `{}`", report.mode),
        format!("- Contract ID: `{}`", report.contract_id),
        format!("- Fail closed: `{}`", report.fail_closed),
        format!(
            "- Open blockers JSON: {}",
            input_cell(&report.inputs.open_blockers_json)
        ),
        format!(
            "- T4 governance overlay JSON: {}",
            input_cell(&report.inputs.t4_governance_overlay_json)
        ),
        format!("- Trigger order: {}", code_list(&report.trigger_order)),
        format!("- Open blockers count: `{}`", report.open_blockers.count),
        format!(
            "- Open blockers trigger fired: `{}`",
            report.open_blockers.trigger_fired
        ),
        format!("- Activation required: `{}`", report.activation_required),
        format!(
            "- T4 new scope publish: `{}`",
            report.t4_governance_overlay.new_scope_publish
        ),
        format!("- T4 source: `{}`", report.t4_governance_overlay.source.as_str()),
        format!("- Gate open: `{}`", report.gate_open),
        format!("- Queue state: `{}`", report.queue_state.as_str()),
        format!("- Exit code: `{}`", report.exit_code),
        String::new(),
        "## Trigger Results".to_string(),
        String::new(),
        "| Trigger ID | Fired | Count | Condition |".to_string(),
        "| --- | --- | --- | --- |".to_string(),
    ];
    for trigger in &report.triggers {
        lines.push(format!(
            "| `{}` | `{}` | {} | {} |",
            trigger.id, trigger.fired, trigger.count, trigger.condition
        ));
    }
    lines.push(String::new());
    if report.active_trigger_ids.is_empty() {
        lines.push("- Active triggers: _none_".to_string());
    } else {
        lines.push(format!(
            "- Active triggers: {}",
            code_list(&report.active_trigger_ids)
        ));
    }
    lines.join("\n") + "\n"
}
