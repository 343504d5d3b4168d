use serde::{Deserialize, Serialize};

/// One evaluated check.
///
/// For a passing check `detail` is the verified fact (e.g. `hold`); for a
/// failing check it is the observed-vs-expected diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check_name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(check_name: impl Into<String>, fact: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            passed: true,
            detail: fact.into(),
        }
    }

    pub fn fail(check_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Ordered outcomes of every check in a run, in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationResult {
    checks: Vec<CheckOutcome>,
}

impl VerificationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: CheckOutcome) {
        self.checks.push(outcome);
    }

    pub fn extend(&mut self, outcomes: impl IntoIterator<Item = CheckOutcome>) {
        self.checks.extend(outcomes);
    }

    /// True iff every check passed. An empty result is vacuously passing.
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn checks(&self) -> &[CheckOutcome] {
        &self.checks
    }

    pub fn get(&self, check_name: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.check_name == check_name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
