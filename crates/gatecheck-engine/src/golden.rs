use std::path::{Path, PathBuf};

use gatecheck_core::result::CheckOutcome;
use sha2::{Digest, Sha256};

/// Result of comparing a produced artifact against its golden reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldenOutcome {
    Match,
    Mismatch {
        /// 1-based line of the first difference after normalization.
        first_diff_line: usize,
        produced_digest: String,
        golden_digest: String,
    },
    Unreadable {
        path: PathBuf,
        error: String,
    },
}

impl GoldenOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, GoldenOutcome::Match)
    }

    pub fn into_check(self, check_name: &str) -> CheckOutcome {
        match self {
            GoldenOutcome::Match => CheckOutcome::pass(check_name, "true"),
            GoldenOutcome::Mismatch {
                first_diff_line,
                produced_digest,
                golden_digest,
            } => CheckOutcome::fail(
                check_name,
                format!(
                    "mismatch first_diff_line={first_diff_line} produced={produced_digest} golden={golden_digest}"
                ),
            ),
            GoldenOutcome::Unreadable { path, error } => CheckOutcome::fail(
                check_name,
                format!(
                    "artifact missing or unreadable path={} error={error}",
                    path.display()
                ),
            ),
        }
    }
}

/// Rewrite every `\r\n` as `\n`. Lone `\r` and trailing whitespace are kept.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Compare two texts after line-ending normalization.
pub fn compare_text(produced: &str, golden: &str) -> GoldenOutcome {
    let produced = normalize_line_endings(produced);
    let golden = normalize_line_endings(golden);
    if produced == golden {
        return GoldenOutcome::Match;
    }
    GoldenOutcome::Mismatch {
        first_diff_line: first_diff_line(&produced, &golden),
        produced_digest: digest(&produced),
        golden_digest: digest(&golden),
    }
}

/// Read both files and compare. Unreadable takes precedence over mismatch.
pub fn compare_files(produced: &Path, golden: &Path) -> GoldenOutcome {
    let produced_text = match read(produced) {
        Ok(text) => text,
        Err(outcome) => return outcome,
    };
    let golden_text = match read(golden) {
        Ok(text) => text,
        Err(outcome) => return outcome,
    };
    compare_text(&produced_text, &golden_text)
}

fn read(path: &Path) -> Result<String, GoldenOutcome> {
    std::fs::read_to_string(path).map_err(|e| GoldenOutcome::Unreadable {
        path: path.to_path_buf(),
        error: e.kind().to_string(),
    })
}

fn first_diff_line(a: &str, b: &str) -> usize {
    let mut a_lines = a.split('\n');
    let mut b_lines = b.split('\n');
    let mut line = 1;
    loop {
        match (a_lines.next(), b_lines.next()) {
            (Some(x), Some(y)) if x == y => line += 1,
            _ => return line,
        }
    }
}

fn digest(text: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(text.as_bytes()))
}
