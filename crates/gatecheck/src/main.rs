#![forbid(unsafe_code)]

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gatecheck_core::contract::{self, QUALITY_GATE_SUITE};
use gatecheck_core::mode::Mode;
use gatecheck_engine::activation::{self, ActivationInputs, TriggerCounts, ACTIVATION_SUITE};
use gatecheck_engine::assertions::AssertionSet;
use gatecheck_engine::driver;
use gatecheck_engine::generator::CommandGenerator;
use gatecheck_engine::report::fail_line;
use tracing_subscriber::EnvFilter;

use crate::config::{Overrides, PYTHON_ENV};

#[derive(Parser)]
#[command(
    name = "gatecheck",
    version,
    about = "Contract verification for generated CI decision artifacts."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Regenerate decision artifacts and verify them against a contract mode.
    Verify {
        /// Contract mode: m09 or m10.
        mode: Option<String>,

        /// Project root holding goldens and generator scripts.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Config file (default: <root>/.gatecheck/config.json).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Interpreter used to launch the generator.
        #[arg(long)]
        python: Option<String>,

        /// Fixed generation timestamp (RFC 3339).
        #[arg(long)]
        generated_at: Option<String>,

        /// Kill the generator after this many seconds.
        #[arg(long)]
        timeout_seconds: Option<u64>,

        /// Print the structured report to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate activation triggers from offline counts and snapshots.
    Triggers {
        /// Open issue count.
        #[arg(long, default_value_t = 0)]
        issues: u64,

        /// Open milestone count.
        #[arg(long, default_value_t = 0)]
        milestones: u64,

        /// Actionable catalog row count.
        #[arg(long, default_value_t = 0)]
        actionable_rows: u64,

        /// Open blocker count.
        #[arg(long, conflicts_with = "open_blockers_json")]
        open_blockers: Option<u64>,

        /// Open blockers snapshot JSON.
        #[arg(long)]
        open_blockers_json: Option<PathBuf>,

        /// Force the T4 new-scope-publish overlay on.
        #[arg(long)]
        t4_new_scope_publish: bool,

        /// T4 governance overlay JSON (boolean or object).
        #[arg(long)]
        t4_overlay_json: Option<PathBuf>,

        /// Contract id reported in the output.
        #[arg(long, default_value = activation::ACTIVATION_SEED_CONTRACT_ID)]
        contract_id: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
    },

    /// List contract modes and their checks.
    Modes {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.cmd {
        Cmd::Verify {
            mode,
            root,
            config,
            python,
            generated_at,
            timeout_seconds,
            json,
        } => cmd_verify(
            mode.as_deref(),
            &root,
            config.as_deref(),
            Overrides {
                python,
                generated_at,
                timeout_seconds,
            },
            json,
        ),

        Cmd::Triggers {
            issues,
            milestones,
            actionable_rows,
            open_blockers,
            open_blockers_json,
            t4_new_scope_publish,
            t4_overlay_json,
            contract_id,
            format,
        } => {
            let counts = TriggerCounts {
                issues,
                milestones,
                actionable_rows,
                open_blockers: open_blockers.unwrap_or(0),
            };
            cmd_triggers(
                counts,
                open_blockers_json.as_deref(),
                t4_new_scope_publish,
                t4_overlay_json.as_deref(),
                &contract_id,
                format,
            )
        }

        Cmd::Modes { json } => cmd_modes(json),
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn cmd_verify(
    mode: Option<&str>,
    root: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
    json_out: bool,
) -> i32 {
    let settings = match config::load_file_config(root, config_path) {
        Ok(file) => config::resolve(file, std::env::var(PYTHON_ENV).ok(), &overrides),
        Err(err) => {
            eprintln!("{}", fail_line(QUALITY_GATE_SUITE, &format!("config: {err:#}")));
            return 1;
        }
    };
    tracing::debug!(?settings, "resolved settings");

    let generator = CommandGenerator::new(&settings.python).with_timeout(settings.timeout);
    let outcome = driver::run(&settings.run_context(root), mode, &generator);

    if json_out {
        if let Some(report) = &outcome.report {
            match serde_json::to_string_pretty(report) {
                Ok(text) => println!("{text}"),
                Err(err) => {
                    eprintln!("{}", fail_line(QUALITY_GATE_SUITE, &format!("report: {err}")));
                    return 1;
                }
            }
        }
        eprintln!("{}", outcome.line);
    } else if outcome.passed() {
        println!("{}", outcome.line);
    } else {
        eprintln!("{}", outcome.line);
    }
    outcome.exit_code
}

fn cmd_triggers(
    counts: TriggerCounts,
    open_blockers_json: Option<&Path>,
    t4_flag: bool,
    t4_overlay_json: Option<&Path>,
    contract_id: &str,
    format: Format,
) -> i32 {
    match evaluate_triggers(
        counts,
        open_blockers_json,
        t4_flag,
        t4_overlay_json,
        contract_id,
        format,
    ) {
        Ok((text, exit_code)) => {
            print!("{text}");
            exit_code
        }
        Err(err) => {
            eprintln!("{}", fail_line(ACTIVATION_SUITE, &format!("{err:#}")));
            1
        }
    }
}

fn evaluate_triggers(
    mut counts: TriggerCounts,
    open_blockers_json: Option<&Path>,
    t4_flag: bool,
    t4_overlay_json: Option<&Path>,
    contract_id: &str,
    format: Format,
) -> Result<(String, i32)> {
    if let Some(path) = open_blockers_json {
        let snapshot = read_json(path, "open blockers snapshot")?;
        counts.open_blockers = activation::parse_open_blockers_count(&snapshot)
            .with_context(|| format!("in {}", path.display()))?;
    }

    let overlay_doc = t4_overlay_json
        .filter(|_| !t4_flag)
        .map(|path| read_json(path, "T4 governance overlay"))
        .transpose()?;
    let overlay = activation::resolve_t4_overlay(t4_flag, overlay_doc.as_ref())?;

    let inputs = ActivationInputs {
        open_blockers_json: open_blockers_json.map(|p| p.display().to_string()),
        t4_governance_overlay_json: t4_overlay_json
            .filter(|_| !t4_flag)
            .map(|p| p.display().to_string()),
    };
    let report = activation::build_report(contract_id, &counts, overlay, inputs);
    tracing::info!(
        active = ?report.active_trigger_ids,
        queue_state = report.queue_state.as_str(),
        "triggers evaluated"
    );

    let text = match format {
        Format::Json => activation::render_json(&report)?,
        Format::Markdown => activation::render_markdown(&report),
    };
    Ok((text, report.exit_code))
}

fn read_json(path: &Path, label: &str) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("{label} {} cannot be read", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{label} {}: invalid JSON", path.display()))
}

fn cmd_modes(json_out: bool) -> i32 {
    let rows: Vec<serde_json::Value> = Mode::ALL
        .iter()
        .map(|&mode| {
            let spec = contract::select(mode);
            let mut checks: Vec<String> = spec.goldens.iter().map(|g| g.check_name.clone()).collect();
            checks.extend(
                AssertionSet::for_contract(&spec)
                    .names()
                    .into_iter()
                    .map(str::to_string),
            );
            serde_json::json!({
                "mode": mode.as_str(),
                "suite": spec.suite,
                "contract_id": spec.contract_id,
                "checks": checks,
            })
        })
        .collect();

    if json_out {
        match serde_json::to_string_pretty(&rows) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("{err}");
                return 1;
            }
        }
    } else {
        for row in &rows {
            println!(
                "{}  {}  contract_id={}  checks={}",
                row["mode"].as_str().unwrap_or_default(),
                row["suite"].as_str().unwrap_or_default(),
                row["contract_id"].as_str().unwrap_or("-"),
                row["checks"].as_array().map(Vec::len).unwrap_or(0)
            );
        }
    }
    0
}
