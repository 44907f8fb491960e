mod common;
mod logic;
mod remote;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use cryptotrace_engine::{Catalog, SyncConfig};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::scenario::{all_scenarios, get_scenario, list_scenarios};
use common::{parse_seeds, split_csv};
use logic::{LogicTester, ScenarioResult, bundled_catalog};
use remote::HttpProgressApi;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TestMode {
    /// Scripted learner journeys against the engine (fast, offline)
    Logic,
    /// Probe a learner's progress on the hosted API
    Remote,
    /// Run both logic journeys and the remote probe
    Both,
}

#[derive(Debug, Parser)]
#[command(name = "cryptotrace-tester", version = "0.1.0")]
#[command(about = "Automated QA for CryptoTrace - learner journeys and remote progress probes")]
struct Args {
    /// Test mode: logic (offline), remote (hosted API), or both
    #[arg(long, value_enum, default_value_t = TestMode::Logic)]
    mode: TestMode,

    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    // Remote-specific options
    /// Progress API base URL (defaults to the production API)
    #[arg(long)]
    api_url: Option<String>,

    /// Learner email to probe - remote mode only
    #[arg(long)]
    email: Option<String>,

    /// Allow the probe to save the loaded record back to the server
    #[arg(long)]
    write: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = parse_seeds(&args.seeds)?;
    let catalog = bundled_catalog()?;

    let mut all_results = run_logic_scenarios(&args, &scenarios, &catalog, &seeds);
    all_results.extend(run_remote_probe(&args).await?);

    write_reports(&args, &all_results, start_time)?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:20} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🔍 CryptoTrace Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        scenarios.retain(|s| !s.eq_ignore_ascii_case("all"));
        for scenario in all_scenarios() {
            if !scenarios.iter().any(|s| s == scenario.key) {
                scenarios.push(scenario.key.to_string());
            }
        }
    }
    scenarios
}

fn sync_config(args: &Args) -> SyncConfig {
    args.api_url
        .as_ref()
        .map_or_else(SyncConfig::default, |url| SyncConfig {
            api_base_url: url.clone(),
            ..SyncConfig::default()
        })
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    catalog: &Catalog,
    seeds: &[u64],
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    if !matches!(args.mode, TestMode::Logic | TestMode::Both) {
        return results;
    }

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(args.verbose);

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(logic_tester.run_scenario(&scenario, catalog, seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

async fn run_remote_probe(args: &Args) -> Result<Vec<ScenarioResult>> {
    if !matches!(args.mode, TestMode::Remote | TestMode::Both) {
        return Ok(Vec::new());
    }

    println!("{}", "🌐 Probing Remote Progress API".bright_blue().bold());
    println!("{}", "-".repeat(30).blue());

    let email = args
        .email
        .as_deref()
        .context("--email is required for remote mode")?;
    let config = sync_config(args);
    println!("Target: {}", config.api_base_url);
    let api = HttpProgressApi::new(config).context("building HTTP client")?;
    remote::run_probe(&api, email, args.write).await
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# CryptoTrace Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    if args.report != "json" {
        let duration = start_time.elapsed();
        writeln!(&mut output_target)?;
        writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            mode: TestMode::Logic,
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            verbose: false,
            output: None,
            api_url: None,
            email: None,
            write: false,
        }
    }

    fn temp_file(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "cryptotrace-main-{label}-{}",
            std::process::id()
        ))
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        let failures = if passed {
            Vec::new()
        } else {
            vec!["Iteration 1 (seed 1): boom".to_string()]
        };
        ScenarioResult::from_outcomes("Sample", 1, failures, vec![Duration::from_millis(2)])
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("smoke,all");
        assert_eq!(expanded[0], "smoke");
        assert_eq!(expanded.len(), all_scenarios().len());
        assert!(expanded.contains(&"shuffled".to_string()));
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios("reconcile, smoke");
        assert_eq!(expanded, vec!["reconcile", "smoke"]);
    }

    #[test]
    fn sync_config_prefers_api_url_flag() {
        assert_eq!(sync_config(&base_args()), SyncConfig::default());
        let args = Args {
            api_url: Some("http://127.0.0.1:9".to_string()),
            ..base_args()
        };
        assert_eq!(sync_config(&args).api_base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn run_logic_scenarios_skips_when_not_enabled() {
        let catalog = bundled_catalog().unwrap();
        let args = Args {
            mode: TestMode::Remote,
            ..base_args()
        };
        let results = run_logic_scenarios(&args, &["smoke".to_string()], &catalog, &[1]);
        assert!(results.is_empty());
    }

    #[test]
    fn run_logic_scenarios_ignores_unknown_names() {
        let catalog = bundled_catalog().unwrap();
        let scenarios = vec!["smoke".to_string(), "nope".to_string()];
        let results = run_logic_scenarios(&base_args(), &scenarios, &catalog, &[1, 2]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn run_remote_probe_skips_when_not_enabled() {
        let results = tokio_test::block_on(run_remote_probe(&base_args())).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn run_remote_probe_requires_email() {
        let args = Args {
            mode: TestMode::Remote,
            ..base_args()
        };
        let err = tokio_test::block_on(run_remote_probe(&args)).unwrap_err();
        assert!(err.to_string().contains("--email"));
    }

    #[test]
    fn write_reports_emits_json_output() {
        let temp = temp_file("report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_file("empty.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("_No scenarios executed._"));
        assert!(content.contains("Total time"));
    }

    #[test]
    fn write_reports_console_lists_failures() {
        let temp = temp_file("console.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(
            &args,
            &[sample_result(true), sample_result(false)],
            Instant::now(),
        )
        .unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("boom"));
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = temp_file("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("course-strictness"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
    }
}
