use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dash_cli::{init_tracing, load_config, patch_spec, run_demo, validate_spec};
use serde_json::Value;

fn cli() -> Command {
    Command::new("dashforge")
        .version(dash_cli::VERSION)
        .about("Dashboard generation and deployment pipelines")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML pipeline configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Default log filter when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a spec document and apply the deploy gate")
                .arg(Arg::new("spec").required(true).help("Spec JSON file, or - for stdin")),
        )
        .subcommand(
            Command::new("patch")
                .about("Apply a list of patch operations to a spec")
                .arg(Arg::new("spec").required(true).help("Spec JSON file, or - for stdin"))
                .arg(
                    Arg::new("ops")
                        .long("ops")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file holding the operation list"),
                )
                .arg(
                    Arg::new("tokens")
                        .long("tokens")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file holding the design tokens"),
                ),
        )
        .subcommand(Command::new("demo").about("Run backfill, generation and deployment on sample telemetry"))
}

fn read_json(source: &str) -> anyhow::Result<Value> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {source}"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("parsing {source}"))
}

fn read_json_path(path: &Path) -> anyhow::Result<Value> {
    read_json(&path.to_string_lossy())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("validate", args)) => {
            let source = args.get_one::<String>("spec").context("spec path")?;
            let result = validate_spec(&read_json(source)?);
            print_json(&result)?;
            let passed = result.passes_gate(config.validation_gate_threshold);
            tracing::info!(score = result.score, threshold = config.validation_gate_threshold, passed, "spec validated");
            Ok(if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Some(("patch", args)) => {
            let source = args.get_one::<String>("spec").context("spec path")?;
            let ops = args.get_one::<PathBuf>("ops").context("ops path")?;
            let tokens = args.get_one::<PathBuf>("tokens").map(|p| read_json_path(p)).transpose()?;
            let report = patch_spec(read_json(source)?, read_json_path(ops)?, tokens)?;
            print_json(&report)?;
            Ok(if report.errors.is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Some(("demo", _)) => {
            let report = run_demo(config).await?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    let level = matches.get_one::<String>("log-level").map_or("info", String::as_str);
    if let Err(e) = init_tracing(level, matches.get_flag("log-json")) {
        eprintln!("failed to initialize logging: {e}");
    }

    match run(&matches).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
