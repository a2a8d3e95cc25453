//! Headless runner for the town simulation.
//!
//! Loads the sample village and either plays a scripted morning or reads
//! commands from stdin:
//!
//! ```bash
//! cargo run -p townsim -- --start 07:55 --turns 24
//! cargo run -p townsim -- --interactive
//! ```
//!
//! Dialogue comes from Claude when `ANTHROPIC_API_KEY` is set, and from
//! plain fallback lines otherwise.

mod headless;

use anyhow::{bail, Context};
use std::sync::Arc;
use townsim_core::testing::StaticContent;
use townsim_core::{
    ClaudeEnricher, ClockTime, Enricher, OfflineEnricher, SimulationConfig, SimulationSession,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line options.
#[derive(Debug)]
struct Options {
    start: ClockTime,
    turns: usize,
    offline: bool,
    interactive: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            start: ClockTime::new(7, 55).unwrap_or_default(),
            turns: 24,
            offline: false,
            interactive: false,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("townsim=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let options = parse_options(&args)?;

    let enricher: Arc<dyn Enricher> = if options.offline {
        Arc::new(OfflineEnricher)
    } else {
        match ClaudeEnricher::from_env() {
            Ok(claude) => {
                info!(model = claude.model(), "dialogue enriched by Claude");
                Arc::new(claude)
            }
            Err(e) => {
                warn!(error = %e, "running without enrichment");
                Arc::new(OfflineEnricher)
            }
        }
    };

    let mut session = SimulationSession::new(
        SimulationConfig::new(),
        enricher,
        Arc::new(StaticContent::village()),
    )
    .with_clock(options.start);

    let summary = session.start(None).await?;
    println!("=== {} ===", summary.title);
    println!(
        "{} locations, {} residents, {} with timetables",
        summary.locations, summary.actors, summary.scheduled_actors
    );
    println!();

    if options.interactive {
        headless::run_interactive(&mut session).await
    } else {
        headless::run_scripted(&mut session, options.turns).await
    }
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--offline" => options.offline = true,
            "--interactive" | "-i" => options.interactive = true,
            "--start" => {
                let value = iter.next().context("--start needs a time like 07:55")?;
                options.start = value
                    .parse()
                    .with_context(|| format!("invalid start time {value:?}"))?;
            }
            "--turns" => {
                let value = iter.next().context("--turns needs a number")?;
                options.turns = value
                    .parse()
                    .with_context(|| format!("invalid turn count {value:?}"))?;
            }
            other => bail!("unknown argument {other:?} (try --help)"),
        }
    }
    Ok(options)
}

fn print_help() {
    println!("townsim - a tick-driven village simulation");
    println!();
    println!("USAGE:");
    println!("    townsim [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --start <HH:MM>    Starting time (default: 07:55)");
    println!("    --turns <N>        Turns to play in scripted mode (default: 24)");
    println!("    --offline          Never call Claude, even with an API key");
    println!("    -i, --interactive  Read commands from stdin");
    println!("    -h, --help         Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    ANTHROPIC_API_KEY  Enables Claude-written dialogue");
    println!("    RUST_LOG           Log filter (default: townsim=info)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("townsim")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_defaults() {
        let options = parse_options(&args(&[])).unwrap();
        assert_eq!(options.start.to_string(), "07:55");
        assert_eq!(options.turns, 24);
        assert!(!options.offline);
    }

    #[test]
    fn test_parse_flags() {
        let options =
            parse_options(&args(&["--offline", "--start", "18:30", "--turns", "3", "-i"])).unwrap();
        assert!(options.offline);
        assert!(options.interactive);
        assert_eq!(options.start.to_string(), "18:30");
        assert_eq!(options.turns, 3);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_options(&args(&["--start", "25:00"])).is_err());
        assert!(parse_options(&args(&["--turns"])).is_err());
        assert!(parse_options(&args(&["--fly"])).is_err());
    }
}
