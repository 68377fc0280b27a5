use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use contracts::{SiteConfig, SiteSnapshot};
use sim_core::{load_config, profile, Site, CONFIG_ENV_VAR};
use tracing::info;

/// Construction-site telemetry simulator.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML site config (falls back to SITE_SIM_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the configured run id
    #[arg(long, global = true)]
    run_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the tick loop and print one snapshot per tick
    Run(RunArgs),
    /// Advance a number of ticks and print the final snapshot as pretty JSON
    Snapshot {
        #[arg(long, default_value_t = 1)]
        ticks: u64,
    },
    /// Print the registered machine profiles
    Profiles,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Ticks to simulate; realtime runs without a limit until ctrl-c
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the configured tick rate
    #[arg(long)]
    hz: Option<f64>,

    /// Pace ticks against the wall clock instead of running flat out
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Raise the escalation trigger at this tick
    #[arg(long)]
    escalate_at: Option<u64>,

    /// Drop the escalation trigger at this tick
    #[arg(long)]
    release_at: Option<u64>,

    /// Escalation trigger is held while this file exists
    #[arg(long)]
    trigger_file: Option<PathBuf>,

    /// Print a one-line summary per tick instead of JSON
    #[arg(long, default_value_t = false)]
    summary: bool,
}

const DEFAULT_BATCH_TICKS: u64 = 60;

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn resolve_config(cli: &Cli) -> Result<SiteConfig> {
    let path = cli.config.clone().or_else(|| {
        std::env::var(CONFIG_ENV_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    });
    let mut config = match path {
        Some(path) => load_config(&path)
            .with_context(|| format!("loading site config from {}", path.display()))?,
        None => SiteConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(run_id) = &cli.run_id {
        config.run_id = run_id.clone();
    }
    Ok(config)
}

struct TriggerSchedule<'a> {
    escalate_at: Option<u64>,
    release_at: Option<u64>,
    trigger_file: Option<&'a Path>,
}

impl TriggerSchedule<'_> {
    fn level(&self, tick: u64) -> bool {
        let scheduled = match (self.escalate_at, self.release_at) {
            (Some(start), Some(end)) => tick >= start && tick < end,
            (Some(start), None) => tick >= start,
            _ => false,
        };
        scheduled || self.trigger_file.is_some_and(Path::exists)
    }
}

fn emit(snapshot: &SiteSnapshot, summary: bool) -> Result<()> {
    if summary {
        println!("{snapshot}");
        for notification in &snapshot.notifications {
            println!(
                "  CRITICAL {} factor={:.2} after {:.0}s",
                notification.worker_id, notification.factor, notification.elapsed_seconds
            );
        }
    } else {
        println!("{}", serde_json::to_string(snapshot)?);
    }
    Ok(())
}

async fn run(mut config: SiteConfig, args: RunArgs) -> Result<()> {
    if let Some(hz) = args.hz {
        config.tick_hz = hz;
    }
    let tick_seconds = config.tick_seconds();
    let mut site = Site::new(config)?;
    let schedule = TriggerSchedule {
        escalate_at: args.escalate_at,
        release_at: args.release_at,
        trigger_file: args.trigger_file.as_deref(),
    };
    let limit = match (args.ticks, args.realtime) {
        (Some(ticks), _) => Some(ticks),
        (None, true) => None,
        (None, false) => Some(DEFAULT_BATCH_TICKS),
    };

    info!(
        run_id = %site.config().run_id,
        seed = site.config().seed,
        tick_hz = site.config().tick_hz,
        realtime = args.realtime,
        "simulation starting"
    );

    if args.realtime {
        let mut interval = tokio::time::interval(Duration::from_secs_f64(tick_seconds));
        loop {
            if limit.is_some_and(|limit| site.tick() >= limit) {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    site.set_escalation_trigger(schedule.level(site.tick()));
                    let snapshot = site.step(epoch_seconds());
                    emit(&snapshot, args.summary)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(tick = site.tick(), "interrupted");
                    break;
                }
            }
        }
    } else {
        let start = epoch_seconds();
        let limit = limit.unwrap_or(DEFAULT_BATCH_TICKS);
        while site.tick() < limit {
            site.set_escalation_trigger(schedule.level(site.tick()));
            let now = start + site.tick() as f64 * tick_seconds;
            let snapshot = site.step(now);
            emit(&snapshot, args.summary)?;
        }
    }

    info!(
        ticks = site.tick(),
        activations = site.escalation().activations(),
        "simulation finished"
    );
    Ok(())
}

fn snapshot(config: SiteConfig, ticks: u64) -> Result<()> {
    let tick_seconds = config.tick_seconds();
    let mut site = Site::new(config)?;
    let start = epoch_seconds();
    let mut latest = site.snapshot();
    for tick in 0..ticks {
        latest = site.step(start + tick as f64 * tick_seconds);
    }
    println!("{}", serde_json::to_string_pretty(&latest)?);
    Ok(())
}

fn print_profiles() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&profile::PROFILES)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::Snapshot { ticks } => snapshot(config, ticks),
        Command::Profiles => print_profiles(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_window_is_half_open() {
        let schedule = TriggerSchedule {
            escalate_at: Some(10),
            release_at: Some(20),
            trigger_file: None,
        };
        assert!(!schedule.level(9));
        assert!(schedule.level(10));
        assert!(schedule.level(19));
        assert!(!schedule.level(20));
    }

    #[test]
    fn missing_trigger_file_reads_low() {
        let schedule = TriggerSchedule {
            escalate_at: None,
            release_at: Some(5),
            trigger_file: Some(Path::new("/nonexistent/escalate.flag")),
        };
        assert!(!schedule.level(0));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::parse_from([
            "site-sim",
            "--seed",
            "9",
            "run",
            "--ticks",
            "30",
            "--escalate-at",
            "5",
            "--summary",
        ]);
        assert_eq!(cli.seed, Some(9));
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.ticks, Some(30));
                assert_eq!(args.escalate_at, Some(5));
                assert!(args.summary);
                assert!(!args.realtime);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
