use std::path::Path;

use jsonschema::Validator;
use serde_json::Value;

use crate::errors::DecodeError;
use crate::record::DecisionRecord;

const STATUS_SCHEMA: &str = include_str!("../schema/decision-status.schema.json");

/// Compile the embedded status-document schema.
pub fn status_validator() -> Result<Validator, DecodeError> {
    let schema: Value = serde_json::from_str(STATUS_SCHEMA)
        .map_err(|e| DecodeError::EmbeddedSchema(e.to_string()))?;
    Validator::new(&schema).map_err(|e| DecodeError::EmbeddedSchema(e.to_string()))
}

/// Collect every schema violation in `data`, each prefixed with its JSON pointer.
pub fn schema_violations(data: &Value) -> Result<Vec<String>, DecodeError> {
    let validator = status_validator()?;
    Ok(validator
        .iter_errors(data)
        .map(|error| {
            let path = error.instance_path.to_string();
            let loc = if path.is_empty() {
                "(root)".to_string()
            } else {
                path
            };
            format!("{loc}: {error}")
        })
        .collect())
}

/// Decode an already-parsed status value.
pub fn decode_value(data: Value) -> Result<DecisionRecord, DecodeError> {
    let violations = schema_violations(&data)?;
    if !violations.is_empty() {
        return Err(DecodeError::SchemaViolations(violations));
    }
    serde_json::from_value(data).map_err(DecodeError::Shape)
}

/// Decode raw status text.
pub fn decode_status(text: &str) -> Result<DecisionRecord, DecodeError> {
    let data: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    decode_value(data)
}

/// Read and decode a status document from disk.
pub fn decode_status_file(path: &Path) -> Result<DecisionRecord, DecodeError> {
    let text = std::fs::read_to_string(path).map_err(|source| DecodeError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    decode_status(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EvidenceStatus;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "overall_decision": "hold",
            "primary_gate_result": "fail",
            "recommendation_signal": "no-go"
        })
    }

    #[test]
    fn embedded_schema_compiles() {
        assert!(status_validator().is_ok());
    }

    #[test]
    fn decodes_minimal_document() {
        let record = decode_value(minimal()).unwrap();
        assert_eq!(record.overall_decision, "hold");
        assert_eq!(record.primary_gate_result, "fail");
        assert_eq!(record.recommendation_signal, "no-go");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut data = minimal();
        data["seed_id"] = json!("V013-CONF-02");
        data["acceptance_rollup"] = json!([{ "acceptance_id": "AC-1" }]);
        data["evidence_items"] = json!([
            { "evidence_id": "EV-06", "status": "pass", "summary": "ledger", "blocking_refs": [] }
        ]);
        let record = decode_value(data).unwrap();
        assert_eq!(record.evidence_items[0].status, EvidenceStatus::Pass);
    }

    #[test]
    fn malformed_json_is_invalid_json() {
        let err = decode_status("{\"overall_decision\": \"hold\",").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)), "{err}");
    }

    #[test]
    fn missing_required_field_is_schema_violation() {
        let err = decode_value(json!({
            "overall_decision": "hold",
            "primary_gate_result": "fail"
        }))
        .unwrap_err();
        match err {
            DecodeError::SchemaViolations(v) => {
                assert!(v.iter().any(|m| m.contains("recommendation_signal")), "{v:?}");
            }
            other => panic!("expected schema violations, got {other}"),
        }
    }

    #[test]
    fn gate_result_requires_exactly_one_spelling() {
        let mut neither = minimal();
        neither.as_object_mut().unwrap().remove("primary_gate_result");
        assert!(matches!(
            decode_value(neither),
            Err(DecodeError::SchemaViolations(_))
        ));

        let mut both = minimal();
        both["qg_04_result"] = json!("fail");
        assert!(matches!(
            decode_value(both),
            Err(DecodeError::SchemaViolations(_))
        ));
    }

    #[test]
    fn every_violation_is_reported_with_pointer() {
        let mut data = minimal();
        data["evidence_items"] = json!([
            { "evidence_id": "EV-06", "status": "maybe" },
            { "status": "pass" }
        ]);
        data["downstream_consumers"] = json!("V013-CONF-03");
        let err = decode_value(data).unwrap_err();
        let DecodeError::SchemaViolations(v) = err else {
            panic!("expected schema violations");
        };
        assert!(v.len() >= 3, "{v:?}");
        assert!(v.iter().any(|m| m.starts_with("/evidence_items/0/status")));
        assert!(v.iter().any(|m| m.starts_with("/evidence_items/1")));
        assert!(v.iter().any(|m| m.starts_with("/downstream_consumers")));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = decode_status("[1, 2, 3]").unwrap_err();
        let DecodeError::SchemaViolations(v) = err else {
            panic!("expected schema violations");
        };
        assert!(v[0].starts_with("(root)"), "{v:?}");
    }

    #[test]
    fn duplicate_evidence_ids_decode() {
        let mut data = minimal();
        data["evidence_items"] = json!([
            { "evidence_id": "EV-06", "status": "pass" },
            { "evidence_id": "EV-06", "status": "fail" }
        ]);
        let record = decode_value(data).unwrap();
        assert_eq!(record.evidence_items.len(), 2);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = decode_status_file(Path::new("/nonexistent/status.json")).unwrap_err();
        assert!(matches!(err, DecodeError::Unreadable { .. }));
    }
}
