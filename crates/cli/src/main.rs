mod config;
mod serve;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use trace_eval::{AttributionEngine, AttributionPolicy, CaseReport};
use trace_storage::CaseRecord;
use tracing_subscriber::EnvFilter;

use crate::config::ServeOverrides;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// TRACE responsibility attribution and audit explanation engine.
#[derive(Parser)]
#[command(
    name = "trace",
    version,
    about = "TRACE responsibility attribution and audit explanation engine"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API over directories of case files
    Serve {
        /// Port to listen on (default 8000)
        #[arg(long)]
        port: Option<u16>,
        /// TOML service configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// SLA rule table to use instead of the builtin one
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Reject breaches that match no SLA rule
        #[arg(long)]
        strict: bool,
        /// Directories of case JSON files to load
        #[arg(required = true)]
        cases: Vec<PathBuf>,
    },

    /// Attribute every day of a case file to a responsible actor
    Attribute {
        /// Path to the case JSON file
        case_file: PathBuf,
        /// SLA rule table to use instead of the builtin one
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Reject breaches that match no SLA rule
        #[arg(long)]
        strict: bool,
    },

    /// Explain who is responsible for the delay on a case file
    Explain {
        /// Path to the case JSON file
        case_file: PathBuf,
        /// SLA rule table to use instead of the builtin one
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Reject breaches that match no SLA rule
        #[arg(long)]
        strict: bool,
    },

    /// Print the SLA rule table
    Rules {
        /// SLA rule table to print instead of the builtin one
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            config,
            rules,
            strict,
            cases,
        } => {
            init_tracing("info");
            let overrides = ServeOverrides {
                port,
                rules_path: rules,
                strict,
            };
            let resolved = match crate::config::resolve(config.as_deref(), overrides) {
                Ok(c) => c,
                Err(e) => {
                    report_error(&e.to_string(), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    let msg = format!("failed to create tokio runtime: {}", e);
                    report_error(&msg, cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(resolved, cases)) {
                let msg = format!("server error: {}", e);
                report_error(&msg, cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::Attribute {
            case_file,
            rules,
            strict,
        } => {
            init_tracing("warn");
            let report = run_case(&case_file, rules.as_deref(), strict, cli.output, cli.quiet);
            if !cli.quiet {
                print_attribution(&report, cli.output);
            }
        }
        Commands::Explain {
            case_file,
            rules,
            strict,
        } => {
            init_tracing("warn");
            let report = run_case(&case_file, rules.as_deref(), strict, cli.output, cli.quiet);
            if !cli.quiet {
                print_explanation(&report, cli.output);
            }
        }
        Commands::Rules { rules } => {
            init_tracing("warn");
            cmd_rules(rules.as_deref(), cli.output, cli.quiet);
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` or `default_level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_engine(
    rules_path: Option<&Path>,
    strict: bool,
    output: OutputFormat,
    quiet: bool,
) -> AttributionEngine {
    let rules = match serve::load_rules(rules_path) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    AttributionEngine::new(Arc::new(rules)).with_policy(AttributionPolicy {
        reject_unclassified_breaches: strict,
    })
}

/// Read, normalize, attribute and explain one case file; exits on failure.
fn run_case(
    case_file: &Path,
    rules_path: Option<&Path>,
    strict: bool,
    output: OutputFormat,
    quiet: bool,
) -> CaseReport {
    let engine = build_engine(rules_path, strict, output, quiet);

    let source = match std::fs::read_to_string(case_file) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", case_file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let record: CaseRecord = match serde_json::from_str(&source) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("error parsing case file '{}': {}", case_file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    match trace_eval::explain_case(&record, &engine) {
        Ok(report) => report,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}

fn print_attribution(report: &CaseReport, output: OutputFormat) {
    let attribution = &report.attribution;
    match output {
        OutputFormat::Json => print_json(attribution),
        OutputFormat::Text => {
            println!(
                "Case {} ({}): {} days, rules {}",
                attribution.case_id,
                report.case.status,
                attribution.total_days,
                attribution.rule_version
            );
            for actor in trace_eval::Actor::PRIORITY {
                println!(
                    "  {:<9} {:>4} days, {} on breach days",
                    actor.as_str(),
                    attribution.breakdown.get(actor),
                    attribution.breaches_attributed_to(actor)
                );
            }
            if !attribution.unclassified_breaches.is_empty() {
                println!(
                    "Unclassified breaches on days: {}",
                    join_days(&attribution.unclassified_breaches)
                );
            }
            if !attribution.evidence_gaps.is_empty() {
                println!(
                    "Evidence missing on days: {}",
                    join_days(&attribution.evidence_gaps)
                );
            }
            println!("Input digest: {}", attribution.input_digest);
        }
    }
}

fn print_explanation(report: &CaseReport, output: OutputFormat) {
    let explanation = &report.explanation;
    match output {
        OutputFormat::Json => print_json(explanation),
        OutputFormat::Text => {
            println!("{}", explanation.text);
        }
    }
}

fn join_days(days: &[u32]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_rules(rules_path: Option<&Path>, output: OutputFormat, quiet: bool) {
    let table = match serve::load_rules(rules_path) {
        Ok(t) => t,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => match table.to_json() {
            Ok(json) => print_json(&json),
            Err(e) => {
                report_error(&format!("error: {}", e), output, false);
                process::exit(1);
            }
        },
        OutputFormat::Text => {
            println!("SLA rules {} ({} rules)", table.version(), table.len());
            for rule in table.rules() {
                println!(
                    "  {:<9} {:<24} {:>3} days",
                    rule.actor.as_str(),
                    rule.action_type,
                    rule.max_days
                );
            }
        }
    }
}

/// Print an error to stderr in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
