use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use suspensor::config::{Config, ConfigError};
use suspensor::reveal::SlotView;
use suspensor::scenario::{Scenario, ScenarioReport};
use suspensor::transition::{BusyPhase, TransitionScheduler, TransitionStatus};
use suspensor::{ManualClock, ReadyState};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let matches = Command::new("suspensor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Replay suspension, transition and reveal timelines")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Replay a scenario of delayed lookups and print its reveal timeline")
                .arg(
                    Arg::new("scenario")
                        .value_name("SCENARIO")
                        .help("Path to a scenario TOML file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .required(true),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("transition")
                .about("Print the busy-indicator timeline for work finishing at a given time")
                .arg(
                    Arg::new("complete-at")
                        .long("complete-at")
                        .value_name("MS")
                        .help("When the work completes, in milliseconds after the start")
                        .value_parser(clap::value_parser!(u64))
                        .required(true),
                )
                .arg(ms_arg("timeout", "Override timeout_ms"))
                .arg(ms_arg("busy-delay", "Override busy_delay_ms"))
                .arg(ms_arg("busy-min", "Override busy_min_duration_ms"))
                .arg(json_arg()),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Load settings from a TOML file instead of the environment")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Reduce log output")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .get_matches();

    init_logging(&matches)?;
    dotenvy::dotenv().ok();

    let config = load_configuration(&matches)?;

    match matches.subcommand() {
        Some(("simulate", sub_matches)) => run_simulate(sub_matches, &config).await,
        Some(("transition", sub_matches)) => run_transition(sub_matches, config),
        _ => Ok(()),
    }
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print machine-readable JSON")
        .action(clap::ArgAction::SetTrue)
}

fn ms_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("MS")
        .help(help)
        .value_parser(clap::value_parser!(u64))
}

fn init_logging(matches: &ArgMatches) -> Result<(), ConfigError> {
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("suspensor={default_level}")))
        .map_err(|e| ConfigError::InvalidConfig(format!("log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(verbose)
                .with_line_number(verbose)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    Ok(())
}

fn load_configuration(matches: &ArgMatches) -> Result<Config, ConfigError> {
    if let Some(path) = matches.get_one::<PathBuf>("config") {
        return Config::from_file(path);
    }

    match Config::from_env() {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Ignoring environment config, using defaults: {}", e);
            Ok(Config::default())
        }
    }
}

async fn run_simulate(matches: &ArgMatches, config: &Config) -> CliResult<()> {
    let path = matches
        .get_one::<PathBuf>("scenario")
        .ok_or_else(|| ConfigError::InvalidConfig("scenario path".to_string()))?;

    let scenario = Scenario::from_file(path).map_err(|e| {
        error!("Failed to load {}: {}", path.display(), e);
        e
    })?;
    let report = scenario.run(config).await?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &ScenarioReport) {
    println!(
        "{} {} order, delay {}ms, min busy {}ms, timeout {}ms",
        "Scenario".bold(),
        report.order,
        report.transition.busy_delay_ms,
        report.transition.busy_min_duration_ms,
        report.transition.timeout_ms
    );

    for entry in &report.timeline {
        let revealed = if entry.revealed.is_empty() {
            String::new()
        } else {
            format!("  revealed {}", entry.revealed.join(", ").green())
        };
        println!(
            "{:>7}  {}{}",
            format!("{}ms", entry.at_ms).dimmed(),
            phase_label(entry.phase, entry.is_busy, entry.timed_out),
            revealed
        );
    }

    println!();
    for slot in &report.final_plan.slots {
        let view = match slot.view {
            SlotView::Content => "content".green(),
            SlotView::Failed => "failed".red(),
            SlotView::Fallback => "fallback".yellow(),
        };
        match slot.render_fallback(&|descriptor: &str| descriptor.dimmed()) {
            Some(placeholder) => println!("  {:<16} {} ({})", slot.label, view, placeholder),
            None => println!("  {:<16} {}", slot.label, view),
        }
        if let Some(nested) = &slot.nested {
            for child in &nested.slots {
                println!("    {:<14} {:?}", child.label, child.view);
            }
        }
    }

    println!(
        "\n{} {} entries, {} hits, {} misses, finished after {}ms",
        "Cache".bold(),
        report.cache.total_entries,
        report.cache.cache_hits,
        report.cache.cache_misses,
        report.total_ms
    );
}

fn run_transition(matches: &ArgMatches, config: Config) -> CliResult<()> {
    let mut thresholds = config.transition;
    if let Some(&timeout_ms) = matches.get_one::<u64>("timeout") {
        thresholds.timeout_ms = timeout_ms;
    }
    if let Some(&busy_delay_ms) = matches.get_one::<u64>("busy-delay") {
        thresholds.busy_delay_ms = busy_delay_ms;
    }
    if let Some(&busy_min_ms) = matches.get_one::<u64>("busy-min") {
        thresholds.busy_min_duration_ms = busy_min_ms;
    }
    thresholds.validate()?;

    let complete_at = matches
        .get_one::<u64>("complete-at")
        .copied()
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::InvalidConfig("complete-at".to_string()))?;

    let clock = ManualClock::new();
    let scheduler = TransitionScheduler::with_clock(thresholds, clock.clone());
    let handle = scheduler.start_transition(|| ReadyState::Pending);

    let mut rows: Vec<TransitionStatus> = Vec::new();
    let mut completed = false;

    loop {
        let now = clock.elapsed();
        if !completed && now >= complete_at {
            handle.complete();
            completed = true;
        }

        let status = scheduler.status();
        rows.push(status);
        if completed && status.phase == BusyPhase::Idle {
            break;
        }

        let mut step = scheduler.next_change();
        if !completed {
            let until_complete = complete_at.saturating_sub(now);
            step = Some(step.map_or(until_complete, |change| change.min(until_complete)));
        }

        match step {
            Some(step) if !step.is_zero() => clock.advance(step),
            _ => break,
        }
    }

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{} delay {}ms, min busy {}ms, timeout {}ms, work completes at {}ms",
        "Transition".bold(),
        thresholds.busy_delay_ms,
        thresholds.busy_min_duration_ms,
        thresholds.timeout_ms,
        complete_at.as_millis()
    );
    for status in &rows {
        println!(
            "{:>7}  {}",
            format!("{}ms", status.elapsed_ms).dimmed(),
            phase_label(status.phase, status.is_busy, status.timed_out)
        );
    }

    Ok(())
}

fn phase_label(phase: BusyPhase, is_busy: bool, timed_out: bool) -> colored::ColoredString {
    if timed_out {
        return "timed out".red().bold();
    }

    let label = phase.to_string();
    match (phase, is_busy) {
        (_, true) => label.yellow(),
        (BusyPhase::Idle, false) => label.green(),
        _ => label.normal(),
    }
}
