use gatecheck_core::result::{CheckOutcome, VerificationResult};
use serde::Serialize;

/// Final single-line verdict and which stream it belongs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub line: String,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        if self.passed {
            0
        } else {
            1
        }
    }
}

/// Structured report for `gatecheck verify --json`.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub suite: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    pub generated_at: String,
    pub pass: bool,
    pub checks: VerificationResult,
}

/// Render the aggregate result as one greppable line.
///
/// On success every check contributes `name=fact`. On failure every check is
/// listed in declared order, failing ones as `name=false[detail]`.
pub fn render_verdict(suite: &str, result: &VerificationResult) -> Verdict {
    if result.all_passed() {
        let facts: Vec<String> = result
            .checks()
            .iter()
            .map(|c| format!("{}={}", c.check_name, c.detail))
            .collect();
        let payload = if facts.is_empty() {
            "checks=0".to_string()
        } else {
            facts.join(", ")
        };
        return Verdict {
            passed: true,
            line: format!("{suite}: OK ({})", single_line(&payload)),
        };
    }

    let entries: Vec<String> = result.checks().iter().map(failure_entry).collect();
    Verdict {
        passed: false,
        line: fail_line(suite, &entries.join(", ")),
    }
}

/// `<suite>: FAIL (<payload>)`, used for aborts as well as assertion failures.
pub fn fail_line(suite: &str, payload: &str) -> String {
    format!("{suite}: FAIL ({})", single_line(payload))
}

/// Line breaks that reach the verdict from paths or error text are escaped.
fn single_line(payload: &str) -> String {
    payload.replace('\n', "\\n").replace('\r', "\\r")
}

fn failure_entry(check: &CheckOutcome) -> String {
    if check.passed {
        format!("{}=true", check.check_name)
    } else {
        format!("{}=false[{}]", check.check_name, check.detail)
    }
}
