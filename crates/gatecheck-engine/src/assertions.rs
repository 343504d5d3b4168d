use gatecheck_core::contract::ContractSpec;
use gatecheck_core::record::DecisionRecord;
use gatecheck_core::result::CheckOutcome;

const ABSENT: &str = "<absent>";
const EMPTY: &str = "<empty>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    ContractId,
    OverallDecision,
    PrimaryGateResult,
    RecommendationSignal,
}

impl ScalarField {
    pub fn name(self) -> &'static str {
        match self {
            ScalarField::ContractId => "contract_id",
            ScalarField::OverallDecision => "overall_decision",
            ScalarField::PrimaryGateResult => "primary_gate_result",
            ScalarField::RecommendationSignal => "recommendation_signal",
        }
    }

    fn read(self, record: &DecisionRecord) -> Option<&str> {
        match self {
            ScalarField::ContractId => record.contract_id.as_deref(),
            ScalarField::OverallDecision => Some(&record.overall_decision),
            ScalarField::PrimaryGateResult => Some(&record.primary_gate_result),
            ScalarField::RecommendationSignal => Some(&record.recommendation_signal),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceField {
    DownstreamConsumers,
    /// `blocker_id` of each entry in `unresolved_blockers`.
    BlockerIds,
}

impl SequenceField {
    pub fn name(self) -> &'static str {
        match self {
            SequenceField::DownstreamConsumers => "downstream_consumers",
            SequenceField::BlockerIds => "unresolved_blockers",
        }
    }

    fn read(self, record: &DecisionRecord) -> Vec<&str> {
        match self {
            SequenceField::DownstreamConsumers => record
                .downstream_consumers
                .iter()
                .map(String::as_str)
                .collect(),
            SequenceField::BlockerIds => record.blocker_ids(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyedField {
    /// `evidence_id` -> `status` over `evidence_items`.
    EvidenceStatusById,
}

impl KeyedField {
    pub fn name(self) -> &'static str {
        match self {
            KeyedField::EvidenceStatusById => "evidence_items",
        }
    }

    fn entries(self, record: &DecisionRecord) -> Vec<(&str, &str)> {
        match self {
            KeyedField::EvidenceStatusById => record
                .evidence_items
                .iter()
                .map(|item| (item.evidence_id.as_str(), item.status.as_str()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupField {
    /// `required_inputs` of the `downstream_handoffs` entry keyed by `consumer_seed`.
    HandoffRequiredInputs,
}

impl LookupField {
    pub fn key_name(self) -> &'static str {
        match self {
            LookupField::HandoffRequiredInputs => "consumer_seed",
        }
    }

    fn lookup<'a>(self, record: &'a DecisionRecord, key: &str) -> Option<Vec<&'a str>> {
        match self {
            LookupField::HandoffRequiredInputs => record
                .handoff(key)
                .map(|h| h.required_inputs.iter().map(String::as_str).collect()),
        }
    }
}

/// A typed predicate over a decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    ScalarEq {
        field: ScalarField,
        expected: String,
    },
    SequenceEq {
        field: SequenceField,
        expected: Vec<String>,
    },
    /// Expected keys are unique; the observed side collapses last-write-wins.
    KeyedMapEq {
        field: KeyedField,
        expected: Vec<(String, String)>,
    },
    LookupSequenceEq {
        field: LookupField,
        key: String,
        expected: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub name: String,
    pub predicate: Predicate,
}

impl Assertion {
    pub fn evaluate(&self, record: &DecisionRecord) -> CheckOutcome {
        let verdict = match &self.predicate {
            Predicate::ScalarEq { field, expected } => scalar_eq(field.read(record), expected),
            Predicate::SequenceEq { field, expected } => sequence_eq(&field.read(record), expected),
            Predicate::KeyedMapEq { field, expected } => {
                keyed_map_eq(&field.entries(record), expected)
            }
            Predicate::LookupSequenceEq {
                field,
                key,
                expected,
            } => match field.lookup(record, key) {
                None => Err(format!("lookup miss {}={key}", field.key_name())),
                Some(observed) => {
                    sequence_eq(&observed, expected).map_err(|d| format!("value mismatch {d}"))
                }
            },
        };
        match verdict {
            Ok(fact) => CheckOutcome::pass(&self.name, fact),
            Err(detail) => CheckOutcome::fail(&self.name, detail),
        }
    }
}

/// Ordered predicates for one contract. Evaluation never short-circuits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionSet {
    assertions: Vec<Assertion>,
}

impl AssertionSet {
    pub fn new(assertions: Vec<Assertion>) -> Self {
        Self { assertions }
    }

    /// Build the predicate list a contract declares, in reporting order.
    pub fn for_contract(spec: &ContractSpec) -> Self {
        let mut assertions = Vec::new();

        if let Some(contract_id) = &spec.contract_id {
            assertions.push(scalar(ScalarField::ContractId, contract_id));
        }
        assertions.push(scalar(
            ScalarField::OverallDecision,
            &spec.decision.overall_decision,
        ));
        assertions.push(scalar(
            ScalarField::PrimaryGateResult,
            &spec.decision.primary_gate_result,
        ));
        assertions.push(scalar(
            ScalarField::RecommendationSignal,
            &spec.decision.recommendation_signal,
        ));

        if let Some(evidence) = &spec.evidence {
            let field = KeyedField::EvidenceStatusById;
            assertions.push(Assertion {
                name: field.name().to_string(),
                predicate: Predicate::KeyedMapEq {
                    field,
                    expected: evidence
                        .iter()
                        .map(|(id, status)| (id.clone(), status.to_string()))
                        .collect(),
                },
            });
        }
        if let Some(consumers) = &spec.downstream_consumers {
            assertions.push(sequence(SequenceField::DownstreamConsumers, consumers));
        }
        if let Some(blockers) = &spec.blocker_ids {
            assertions.push(sequence(SequenceField::BlockerIds, blockers));
        }
        for handoff in &spec.handoffs {
            assertions.push(Assertion {
                name: format!("handoff[{}]", handoff.consumer_seed),
                predicate: Predicate::LookupSequenceEq {
                    field: LookupField::HandoffRequiredInputs,
                    key: handoff.consumer_seed.clone(),
                    expected: handoff.required_inputs.clone(),
                },
            });
        }

        Self { assertions }
    }

    pub fn evaluate(&self, record: &DecisionRecord) -> Vec<CheckOutcome> {
        self.assertions
            .iter()
            .map(|assertion| {
                let outcome = assertion.evaluate(record);
                tracing::debug!(
                    check = %outcome.check_name,
                    passed = outcome.passed,
                    detail = %outcome.detail,
                    "assertion evaluated"
                );
                outcome
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.assertions.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }
}

fn scalar(field: ScalarField, expected: &str) -> Assertion {
    Assertion {
        name: field.name().to_string(),
        predicate: Predicate::ScalarEq {
            field,
            expected: expected.to_string(),
        },
    }
}

fn sequence(field: SequenceField, expected: &[String]) -> Assertion {
    Assertion {
        name: field.name().to_string(),
        predicate: Predicate::SequenceEq {
            field,
            expected: expected.to_vec(),
        },
    }
}

fn scalar_eq(observed: Option<&str>, expected: &str) -> Result<String, String> {
    match observed {
        Some(value) if value == expected => Ok(escape(value)),
        Some(value) => Err(format!(
            "expected={} observed={}",
            escape(expected),
            escape(value)
        )),
        None => Err(format!("expected={} observed={ABSENT}", escape(expected))),
    }
}

fn sequence_eq<S: AsRef<str>>(observed: &[&str], expected: &[S]) -> Result<String, String> {
    let first_diff = observed
        .iter()
        .zip(expected)
        .position(|(o, e)| *o != e.as_ref())
        .or_else(|| (observed.len() != expected.len()).then(|| observed.len().min(expected.len())));
    match first_diff {
        None => Ok(join(observed)),
        Some(index) => Err(format!(
            "expected={} observed={} first_diff_index={index}",
            join(expected),
            join(observed)
        )),
    }
}

fn keyed_map_eq(entries: &[(&str, &str)], expected: &[(String, String)]) -> Result<String, String> {
    let mut observed: Vec<(&str, &str)> = Vec::with_capacity(entries.len());
    let mut duplicates: Vec<&str> = Vec::new();
    for &(key, value) in entries {
        match observed.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                slot.1 = value;
                if !duplicates.contains(&key) {
                    duplicates.push(key);
                }
            }
            None => observed.push((key, value)),
        }
    }

    let mut issues = Vec::new();
    if observed.len() != expected.len() {
        issues.push(format!(
            "size expected={} observed={}",
            expected.len(),
            observed.len()
        ));
    }
    let missing: Vec<&str> = expected
        .iter()
        .filter(|(k, _)| !observed.iter().any(|(o, _)| *o == k.as_str()))
        .map(|(k, _)| k.as_str())
        .collect();
    if !missing.is_empty() {
        issues.push(format!("missing={}", join(&missing)));
    }
    let extra: Vec<&str> = observed
        .iter()
        .filter(|(o, _)| !expected.iter().any(|(k, _)| k.as_str() == *o))
        .map(|(o, _)| *o)
        .collect();
    if !extra.is_empty() {
        issues.push(format!("extra={}", join(&extra)));
    }
    for (key, want) in expected {
        if let Some((_, got)) = observed.iter().find(|(o, _)| *o == key.as_str()) {
            if *got != want.as_str() {
                issues.push(format!(
                    "{} expected={} observed={}",
                    escape(key),
                    escape(want),
                    escape(got)
                ));
            }
        }
    }
    if !duplicates.is_empty() {
        issues.push(format!("duplicates={}", join(&duplicates)));
    }

    if issues.is_empty() {
        let facts: Vec<String> = expected.iter().map(|(k, v)| format!("{k}:{v}")).collect();
        Ok(join(&facts))
    } else {
        Err(issues.join("; "))
    }
}

fn join<S: AsRef<str>>(values: &[S]) -> String {
    if values.is_empty() {
        return EMPTY.to_string();
    }
    values
        .iter()
        .map(|v| escape(v.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Backslash-escapes every character that could end or split a verdict
/// entry, so document text cannot forge one.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ',' | '|' | ';' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.extend(c.escape_unicode()),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::render_verdict;
    use gatecheck_core::contract::select;
    use gatecheck_core::mode::Mode;
    use gatecheck_core::record::{Blocker, EvidenceItem, EvidenceStatus, Handoff};
    use gatecheck_core::result::VerificationResult;

    fn evidence(id: &str, status: EvidenceStatus) -> EvidenceItem {
        EvidenceItem {
            evidence_id: id.into(),
            status,
        }
    }

    fn blocker(id: &str) -> Blocker {
        Blocker {
            blocker_id: id.into(),
            status: Some("OPEN".into()),
            owner: None,
            due_date_utc: None,
            due_path: None,
        }
    }

    fn handoff(seed: &str, inputs: &[&str]) -> Handoff {
        Handoff {
            consumer_seed: seed.into(),
            required_inputs: inputs.iter().map(|s| s.to_string()).collect(),
            handoff_state: None,
        }
    }

    fn conforming_record() -> DecisionRecord {
        DecisionRecord {
            overall_decision: "hold".into(),
            primary_gate_result: "fail".into(),
            recommendation_signal: "no-go".into(),
            contract_id: Some("V013-CONF-02-QUALITY-GATE-v2".into()),
            evidence_items: vec![
                evidence("EV-06", EvidenceStatus::Pass),
                evidence("EV-07", EvidenceStatus::Pass),
                evidence("EV-08", EvidenceStatus::Fail),
            ],
            downstream_consumers: vec!["V013-CONF-03".into(), "V013-REL-01".into()],
            unresolved_blockers: vec![
                blocker("BLK-189-01"),
                blocker("BLK-189-02"),
                blocker("BLK-189-03"),
            ],
            downstream_handoffs: vec![
                handoff("V013-CONF-03", &["EV-07", "EV-08"]),
                handoff("V013-REL-01", &["EV-07", "EV-08", "BLK-189 posture"]),
            ],
        }
    }

    fn outcome<'a>(outcomes: &'a [CheckOutcome], name: &str) -> &'a CheckOutcome {
        outcomes
            .iter()
            .find(|o| o.check_name == name)
            .unwrap_or_else(|| panic!("no check named {name}"))
    }

    #[test]
    fn m10_declares_checks_in_stable_order() {
        let set = AssertionSet::for_contract(&select(Mode::M10));
        assert_eq!(
            set.names(),
            vec![
                "contract_id",
                "overall_decision",
                "primary_gate_result",
                "recommendation_signal",
                "evidence_items",
                "downstream_consumers",
                "unresolved_blockers",
                "handoff[V013-CONF-03]",
                "handoff[V013-REL-01]",
            ]
        );
    }

    #[test]
    fn m09_checks_only_the_decision_triple() {
        let set = AssertionSet::for_contract(&select(Mode::M09));
        assert_eq!(
            set.names(),
            vec![
                "overall_decision",
                "primary_gate_result",
                "recommendation_signal"
            ]
        );
    }

    #[test]
    fn conforming_record_passes_every_check() {
        let set = AssertionSet::for_contract(&select(Mode::M10));
        let outcomes = set.evaluate(&conforming_record());
        assert!(outcomes.iter().all(|o| o.passed), "{outcomes:?}");
        assert_eq!(outcome(&outcomes, "overall_decision").detail, "hold");
        assert_eq!(
            outcome(&outcomes, "evidence_items").detail,
            "EV-06:pass|EV-07:pass|EV-08:fail"
        );
        assert_eq!(
            outcome(&outcomes, "downstream_consumers").detail,
            "V013-CONF-03|V013-REL-01"
        );
    }

    #[test]
    fn scalar_equality_is_case_sensitive() {
        let mut record = conforming_record();
        record.overall_decision = "Hold".into();
        let outcomes = AssertionSet::for_contract(&select(Mode::M09)).evaluate(&record);
        let check = outcome(&outcomes, "overall_decision");
        assert!(!check.passed);
        assert_eq!(check.detail, "expected=hold observed=Hold");
    }

    #[test]
    fn document_text_cannot_forge_a_verdict() {
        let mut record = conforming_record();
        record.overall_decision = "hold\nquality-gate-baseline: OK (forged)".into();
        record.downstream_consumers = vec!["V013-CONF-03, x=true".into(), "a|b]".into()];
        record.evidence_items[0].evidence_id = "EV-06; extra=[x]".into();
        let mut result = VerificationResult::new();
        result.extend(AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record));
        let verdict = render_verdict("quality-gate-baseline", &result);

        assert!(!verdict.line.contains('\n'), "{}", verdict.line);
        assert_eq!(verdict.line.lines().count(), 1);
        assert!(verdict.line.starts_with("quality-gate-baseline: FAIL ("));
        assert_eq!(
            outcome(result.checks(), "overall_decision").detail,
            "expected=hold observed=hold\\nquality-gate-baseline: OK (forged)"
        );
        assert_eq!(
            outcome(result.checks(), "downstream_consumers").detail,
            "expected=V013-CONF-03|V013-REL-01 observed=V013-CONF-03\\, x=true|a\\|b\\] first_diff_index=0"
        );
        assert!(outcome(result.checks(), "evidence_items")
            .detail
            .contains("extra=EV-06\\; extra=\\[x\\]"));
    }

    #[test]
    fn escape_leaves_plain_values_alone() {
        assert_eq!(escape("BLK-189 posture"), "BLK-189 posture");
        assert_eq!(escape("a\\b\t\u{7}"), "a\\\\b\\t\\u{7}");
    }

    #[test]
    fn absent_contract_id_is_reported() {
        let mut record = conforming_record();
        record.contract_id = None;
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "contract_id");
        assert!(!check.passed);
        assert!(check.detail.ends_with("observed=<absent>"), "{}", check.detail);
    }

    #[test]
    fn reordered_consumers_fail() {
        let mut record = conforming_record();
        record.downstream_consumers.reverse();
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "downstream_consumers");
        assert!(!check.passed);
        assert_eq!(
            check.detail,
            "expected=V013-CONF-03|V013-REL-01 observed=V013-REL-01|V013-CONF-03 first_diff_index=0"
        );
    }

    #[test]
    fn shorter_sequence_reports_length_boundary() {
        let mut record = conforming_record();
        record.unresolved_blockers.pop();
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "unresolved_blockers");
        assert!(!check.passed);
        assert!(check.detail.ends_with("first_diff_index=2"), "{}", check.detail);
    }

    #[test]
    fn missing_evidence_reports_size_and_key() {
        let mut record = conforming_record();
        record.evidence_items.pop();
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "evidence_items");
        assert!(!check.passed);
        assert_eq!(check.detail, "size expected=3 observed=2; missing=EV-08");
    }

    #[test]
    fn extra_evidence_key_fails() {
        let mut record = conforming_record();
        record
            .evidence_items
            .push(evidence("EV-09", EvidenceStatus::Pass));
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "evidence_items");
        assert_eq!(check.detail, "size expected=3 observed=4; extra=EV-09");
    }

    #[test]
    fn wrong_evidence_status_fails() {
        let mut record = conforming_record();
        record.evidence_items[2].status = EvidenceStatus::Pass;
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "evidence_items");
        assert_eq!(check.detail, "EV-08 expected=fail observed=pass");
    }

    #[test]
    fn duplicate_evidence_ids_collapse_into_size_mismatch() {
        let mut record = conforming_record();
        record.evidence_items[2] = evidence("EV-07", EvidenceStatus::Pass);
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "evidence_items");
        assert!(!check.passed);
        assert_eq!(
            check.detail,
            "size expected=3 observed=2; missing=EV-08; duplicates=EV-07"
        );
    }

    #[test]
    fn duplicate_ids_fail_even_when_size_matches() {
        let mut record = conforming_record();
        record
            .evidence_items
            .push(evidence("EV-06", EvidenceStatus::Pass));
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "evidence_items");
        assert!(!check.passed);
        assert_eq!(check.detail, "duplicates=EV-06");
    }

    #[test]
    fn duplicate_ids_are_last_write_wins() {
        let mut record = conforming_record();
        record
            .evidence_items
            .push(evidence("EV-06", EvidenceStatus::Fail));
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let check = outcome(&outcomes, "evidence_items");
        assert_eq!(
            check.detail,
            "EV-06 expected=pass observed=fail; duplicates=EV-06"
        );
    }

    #[test]
    fn handoff_lookup_miss_is_distinct_from_mismatch() {
        let mut record = conforming_record();
        record.downstream_handoffs.remove(1);
        record.downstream_handoffs[0].required_inputs = vec!["EV-08".into(), "EV-07".into()];
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        let conf = outcome(&outcomes, "handoff[V013-CONF-03]");
        let rel = outcome(&outcomes, "handoff[V013-REL-01]");
        assert!(conf.detail.starts_with("value mismatch "), "{}", conf.detail);
        assert_eq!(rel.detail, "lookup miss consumer_seed=V013-REL-01");
    }

    #[test]
    fn handoff_lookup_ignores_position() {
        let mut record = conforming_record();
        record.downstream_handoffs.reverse();
        let outcomes = AssertionSet::for_contract(&select(Mode::M10)).evaluate(&record);
        assert!(outcome(&outcomes, "handoff[V013-CONF-03]").passed);
        assert!(outcome(&outcomes, "handoff[V013-REL-01]").passed);
    }

    #[test]
    fn every_violation_is_evaluated() {
        let mut record = conforming_record();
        record.overall_decision = "approve".into();
        record.recommendation_signal = "go".into();
        record.evidence_items.clear();
        record.downstream_consumers.reverse();
        record.downstream_handoffs.clear();
        let set = AssertionSet::for_contract(&select(Mode::M10));
        let outcomes = set.evaluate(&record);
        assert_eq!(outcomes.len(), set.len());
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.check_name.as_str())
            .collect();
        assert_eq!(
            failed,
            vec![
                "overall_decision",
                "recommendation_signal",
                "evidence_items",
                "downstream_consumers",
                "handoff[V013-CONF-03]",
                "handoff[V013-REL-01]",
            ]
        );
    }

    #[test]
    fn empty_sequences_render_as_empty_marker() {
        let set = AssertionSet::new(vec![Assertion {
            name: "downstream_consumers".into(),
            predicate: Predicate::SequenceEq {
                field: SequenceField::DownstreamConsumers,
                expected: vec![],
            },
        }]);
        let mut record = conforming_record();
        record.downstream_consumers.clear();
        let outcomes = set.evaluate(&record);
        assert_eq!(outcomes[0], CheckOutcome::pass("downstream_consumers", "<empty>"));
    }
}
