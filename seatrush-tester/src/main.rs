mod common;
mod logic;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use seatrush_game::Difficulty;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::scenario::{get_scenario, list_scenarios};
use common::split_csv;
use logic::{
    GameTester, LogicTester, PlayabilityAggregate, PlayabilityRecord, aggregate_playability,
    resolve_seed_inputs, run_playability_analysis, validate_playability_targets,
};

#[derive(Debug, Parser)]
#[command(name = "seatrush-tester", version = "0.1.0")]
#[command(about = "Automated logic and playability testing for the Seat Rush engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; decimal, 0x-hex or `a..b` ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Difficulties to run every scenario on (comma-separated)
    #[arg(long, default_value = "easy,normal,rush")]
    difficulties: String,

    /// Run extended acceptance sweeps (forces ≥100 iterations for playability analysis)
    #[arg(long)]
    acceptance: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let playability_iterations = compute_playability_iterations(&args);
    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let difficulties = parse_difficulties(&args.difficulties)?;
    let game_tester = GameTester::new(args.verbose);

    let all_results = run_logic_scenarios(&args, &scenarios, &seeds, &difficulties);

    let (playability_records, playability_aggregates) = gather_playability(
        &args,
        &game_tester,
        &seeds,
        &difficulties,
        playability_iterations,
    )?;

    write_reports(
        &args,
        &all_results,
        playability_records.as_deref(),
        playability_aggregates.as_deref(),
        start_time,
    )?;

    if let Some(aggregates) = playability_aggregates.as_ref() {
        let record_slice = playability_records.as_deref().unwrap_or(&[]);
        validate_playability_targets(aggregates, record_slice)?;
    }

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
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 Seat Rush Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn compute_playability_iterations(args: &Args) -> usize {
    if args.acceptance {
        if args.iterations < 100 {
            println!(
                "🔁 Acceptance mode enabled: increasing playability iterations from {} to 100",
                args.iterations
            );
        } else {
            println!(
                "🔁 Acceptance mode enabled: using {} playability iterations",
                args.iterations
            );
        }
        args.iterations.max(100)
    } else {
        args.iterations
    }
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        scenarios.extend(list_scenarios().into_iter().map(|(key, _)| key.to_string()));
    }
    scenarios
}

fn parse_difficulties(raw: &str) -> Result<Vec<Difficulty>> {
    let mut difficulties = Vec::new();
    for tag in split_csv(raw) {
        let difficulty: Difficulty = tag
            .parse()
            .with_context(|| format!("invalid --difficulties entry '{tag}'"))?;
        if !difficulties.contains(&difficulty) {
            difficulties.push(difficulty);
        }
    }
    anyhow::ensure!(!difficulties.is_empty(), "no difficulties selected");
    Ok(difficulties)
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
    difficulties: &[Difficulty],
) -> Vec<logic::ScenarioResult> {
    let mut results: Vec<logic::ScenarioResult> = Vec::new();

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(args.verbose);

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            for &difficulty in difficulties {
                let logic_scenario = scenario.for_difficulty(difficulty);
                results.extend(logic_tester.run_scenario(
                    &logic_scenario,
                    seeds,
                    args.iterations,
                ));
            }
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

type PlayabilitySummary = (
    Option<Vec<PlayabilityRecord>>,
    Option<Vec<PlayabilityAggregate>>,
);

fn gather_playability(
    args: &Args,
    game_tester: &GameTester,
    seeds: &[u64],
    difficulties: &[Difficulty],
    playability_iterations: usize,
) -> Result<PlayabilitySummary> {
    if !matches!(args.report.as_str(), "console" | "csv") {
        return Ok((None, None));
    }
    let records =
        run_playability_analysis(game_tester, seeds, playability_iterations, difficulties)?;
    let aggregates = aggregate_playability(&records);
    Ok((Some(records), Some(aggregates)))
}

fn write_reports(
    args: &Args,
    results: &[logic::ScenarioResult],
    playability_records: Option<&[PlayabilityRecord]>,
    playability_aggregates: Option<&[PlayabilityAggregate]>,
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Seat Rush Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        "csv" => {
            if let Some(records) = playability_records {
                logic::reports::generate_csv_report(&mut output_target, records)?;
            } else {
                writeln!(&mut output_target, "[]")?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else if let Some(aggregates) = playability_aggregates {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    aggregates,
                    duration,
                )?;
            } else {
                writeln!(&mut output_target, "Playability data unavailable.")?;
            }
        }
    }

    if args.report != "json" && args.report != "csv" {
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
