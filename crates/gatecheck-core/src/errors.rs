use std::path::PathBuf;
use std::time::Duration;

/// Structured status document could not be turned into a [`DecisionRecord`].
///
/// [`DecisionRecord`]: crate::record::DecisionRecord
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("schema violations: {}", .0.join("; "))]
    SchemaViolations(Vec<String>),
    #[error("typed decode failed: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("embedded status schema is invalid: {0}")]
    EmbeddedSchema(String),
}

/// Bad or missing invocation arguments. Raised before any generator runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("missing mode")]
    MissingMode,
    #[error("unknown mode '{0}'")]
    UnknownMode(String),
    #[error("invalid generated_at '{value}': {reason}")]
    InvalidGeneratedAt { value: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot remove stale artifact {}: {source}", .path.display())]
    StaleArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("generator did not exit within {0:?}")]
    Timeout(Duration),
    #[error("wait failed: {0}")]
    Wait(#[source] std::io::Error),
}

/// Malformed activation-trigger input (open-blocker snapshot or T4 overlay).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("open blockers snapshot must be an array of rows or an object with 'open_blockers'")]
    SnapshotShape,
    #[error("open blockers snapshot object must include 'open_blockers' array")]
    MissingBlockerRows,
    #[error("{context} must be {expected}")]
    InvalidField { context: String, expected: String },
    #[error("open blockers row {index} line alias mismatch: line_number={line_number} line={line}")]
    LineAliasMismatch {
        index: usize,
        line_number: u64,
        line: u64,
    },
    #[error("open blockers snapshot contains duplicate row ({blocker_id}, {source_path}, {line_number})")]
    DuplicateRow {
        blocker_id: String,
        source_path: String,
        line_number: u64,
    },
    #[error("open blockers rows must be sorted by source_path, then line number, then blocker_id")]
    Unsorted,
    #[error("open blockers snapshot fields 'open_blocker_count' and 'count' must match")]
    CountAliasMismatch,
    #[error("open blockers snapshot object must include 'open_blocker_count' (or legacy 'count')")]
    MissingCount,
    #[error("open blockers count mismatch: declared={declared} discovered={discovered}")]
    CountMismatch { declared: u64, discovered: u64 },
    #[error("T4 governance overlay must be a boolean or an object with boolean 't4_new_scope_publish'")]
    OverlayShape,
    #[error("T4 governance overlay fields 't4_new_scope_publish' and 'T4_NEW_SCOPE_PUBLISH' must match")]
    OverlayAliasMismatch,
}
