use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use gatecheck_core::contract::{self, ContractSpec, DEFAULT_GENERATED_AT, QUALITY_GATE_SUITE};
use gatecheck_core::decode::decode_status_file;
use gatecheck_core::errors::{GeneratorError, UsageError};
use gatecheck_core::mode::Mode;
use gatecheck_core::record::DecisionRecord;
use gatecheck_core::result::VerificationResult;

use crate::assertions::AssertionSet;
use crate::generator::{GenerateRequest, Generator};
use crate::golden::compare_files;
use crate::report::{fail_line, render_verdict, VerificationReport};

pub const DEFAULT_OUTPUT_ROOT: &str = "tmp/quality_gate_automation";

/// Everything a run needs from its surroundings. Nothing is read from
/// ambient process state, so a process may drive any number of runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Project root; goldens and the generator script are resolved against it.
    pub root: PathBuf,
    /// Artifact root, relative to `root` unless absolute.
    pub output_root: PathBuf,
    pub generated_at: String,
}

impl RunContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            generated_at: DEFAULT_GENERATED_AT.to_string(),
        }
    }

    /// `<root>/<output_root>/<mode>`.
    pub fn artifact_dir(&self, mode: Mode) -> PathBuf {
        self.root.join(&self.output_root).join(mode.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    InvokeGenerator,
    Decode,
    Assert,
    Report,
    Abort,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::InvokeGenerator => "INVOKE_GENERATOR",
            RunState::Decode => "DECODE",
            RunState::Assert => "ASSERT",
            RunState::Report => "REPORT",
            RunState::Abort => "ABORT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Usage,
    GeneratorSetup,
    GeneratorLaunch,
    GeneratorTimeout,
    /// Non-zero exit; `None` when terminated by a signal.
    GeneratorExit(Option<i32>),
    Decode,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// `Report` or `Abort`.
    pub terminal: RunState,
    pub abort: Option<AbortReason>,
    pub exit_code: i32,
    /// The single verdict line.
    pub line: String,
    pub report: Option<VerificationReport>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    fn abort(suite: &str, reason: AbortReason, exit_code: i32, payload: &str) -> Self {
        tracing::info!(state = %RunState::Abort, ?reason, exit_code, "run aborted");
        Self {
            terminal: RunState::Abort,
            abort: Some(reason),
            exit_code,
            line: fail_line(suite, payload),
            report: None,
        }
    }
}

/// Usage line printed for a bad or missing mode.
pub fn usage_payload() -> String {
    format!("usage: gatecheck verify {}", Mode::choices())
}

/// Drive one run: select, invoke, decode, assert, report.
pub fn run(ctx: &RunContext, mode_token: Option<&str>, generator: &dyn Generator) -> RunOutcome {
    let mode = match Mode::from_token(mode_token) {
        Ok(mode) => mode,
        Err(err) => return usage_abort(&err),
    };
    if let Err(err) = contract::parse_generated_at(&ctx.generated_at) {
        return usage_abort(&err);
    }
    let spec = contract::select(mode);
    let suite = spec.suite.as_str();
    let artifact_dir = ctx.artifact_dir(mode);

    tracing::info!(state = %RunState::InvokeGenerator, %mode, "entering state");
    if let Err(outcome) = invoke_generator(ctx, &spec, &artifact_dir, generator) {
        return outcome;
    }

    tracing::info!(state = %RunState::Decode, "entering state");
    let record = match spec.status_artifact() {
        Some(status) => match decode_status_file(&artifact_dir.join(&status.file_name)) {
            Ok(record) => Some(record),
            Err(err) => {
                return RunOutcome::abort(
                    suite,
                    AbortReason::Decode,
                    1,
                    &format!("decode_error={err}"),
                );
            }
        },
        None => None,
    };

    tracing::info!(state = %RunState::Assert, "entering state");
    let result = assert_contract(ctx, &spec, &artifact_dir, record.as_ref());

    tracing::info!(state = %RunState::Report, checks = result.len(), "entering state");
    let verdict = render_verdict(suite, &result);
    let report = VerificationReport {
        suite: spec.suite.clone(),
        mode: mode.to_string(),
        contract_id: spec.contract_id.clone(),
        generated_at: ctx.generated_at.clone(),
        pass: verdict.passed,
        checks: result,
    };
    RunOutcome {
        terminal: RunState::Report,
        abort: None,
        exit_code: verdict.exit_code(),
        line: verdict.line,
        report: Some(report),
    }
}

/// Golden checks first, then the contract's assertion set.
pub fn assert_contract(
    ctx: &RunContext,
    spec: &ContractSpec,
    artifact_dir: &Path,
    record: Option<&DecisionRecord>,
) -> VerificationResult {
    let mut result = VerificationResult::new();
    for golden in &spec.goldens {
        let outcome = compare_files(
            &artifact_dir.join(&golden.file_name),
            &ctx.root.join(&golden.reference),
        );
        tracing::debug!(check = %golden.check_name, matched = outcome.is_match(), "golden compared");
        result.push(outcome.into_check(&golden.check_name));
    }
    if let Some(record) = record {
        result.extend(AssertionSet::for_contract(spec).evaluate(record));
    }
    result
}

/// Arguments passed to the generator for a contract.
pub fn generator_request(
    ctx: &RunContext,
    spec: &ContractSpec,
    artifact_dir: &Path,
) -> GenerateRequest {
    let mut args: Vec<OsString> = Vec::new();
    for golden in &spec.goldens {
        args.push(golden.output_flag.clone().into());
        args.push(artifact_dir.join(&golden.file_name).into_os_string());
    }
    args.push(spec.generator.generated_at_flag.clone().into());
    args.push(ctx.generated_at.clone().into());
    GenerateRequest {
        work_dir: ctx.root.clone(),
        script: PathBuf::from(&spec.generator.script),
        args,
    }
}

fn invoke_generator(
    ctx: &RunContext,
    spec: &ContractSpec,
    artifact_dir: &Path,
    generator: &dyn Generator,
) -> Result<(), RunOutcome> {
    let suite = spec.suite.as_str();
    std::fs::create_dir_all(artifact_dir).map_err(|source| {
        let err = GeneratorError::OutputDir {
            path: artifact_dir.to_path_buf(),
            source,
        };
        RunOutcome::abort(
            suite,
            AbortReason::GeneratorSetup,
            1,
            &format!("generator_setup={err}"),
        )
    })?;
    remove_stale_artifacts(spec, artifact_dir).map_err(|err| {
        RunOutcome::abort(
            suite,
            AbortReason::GeneratorSetup,
            1,
            &format!("generator_setup={err}"),
        )
    })?;

    let request = generator_request(ctx, spec, artifact_dir);
    match generator.generate(&request) {
        Ok(exit) if exit.is_success() => Ok(()),
        Ok(exit) => {
            let payload = match exit.code {
                Some(code) => format!("generator_exit={code}"),
                None => "generator_exit=signal".to_string(),
            };
            Err(RunOutcome::abort(
                suite,
                AbortReason::GeneratorExit(exit.code),
                exit.code.unwrap_or(1),
                &payload,
            ))
        }
        Err(GeneratorError::Timeout(limit)) => Err(RunOutcome::abort(
            suite,
            AbortReason::GeneratorTimeout,
            1,
            &format!("generator_timeout={limit:?}"),
        )),
        Err(err) => Err(RunOutcome::abort(
            suite,
            AbortReason::GeneratorLaunch,
            1,
            &format!("generator_launch={err}"),
        )),
    }
}

/// A run only ever judges what its own generator wrote.
fn remove_stale_artifacts(spec: &ContractSpec, artifact_dir: &Path) -> Result<(), GeneratorError> {
    for golden in &spec.goldens {
        let path = artifact_dir.join(&golden.file_name);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed previous artifact"),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(GeneratorError::StaleArtifact { path, source }),
        }
    }
    Ok(())
}

fn usage_abort(err: &UsageError) -> RunOutcome {
    tracing::warn!(%err, "usage error");
    let payload = match err {
        UsageError::InvalidGeneratedAt { .. } => format!("usage: {err}"),
        _ => usage_payload(),
    };
    RunOutcome::abort(QUALITY_GATE_SUITE, AbortReason::Usage, 1, &payload)
}
