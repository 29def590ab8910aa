//! Binary Options Engine - Main Entry Point
//!
//! Replays historical bars through the decision core, or drives the live
//! engine against the paper gateway.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use binary_options_engine::config::{load_config, SymbolConfig};
use binary_options_engine::{AppConfig, BacktestEngine, Bar, PaperGateway, TradingEngine};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ENGINE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); defaults to `settings.log_level`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a bar file and print the report as JSON
    Backtest {
        /// JSON object mapping symbol to an array of bars
        #[arg(long)]
        bars: PathBuf,
    },
    /// Step the live engine through a bar file on the paper gateway
    Paper {
        /// JSON object mapping symbol to an array of bars
        #[arg(long)]
        bars: PathBuf,

        /// Bars treated as elapsed history before the first iteration
        #[arg(long)]
        warmup: Option<usize>,

        /// Feed bars on a timer and run the engine loop until ctrl-c
        #[arg(long)]
        realtime: bool,

        /// Milliseconds between bars in realtime mode
        #[arg(long, default_value_t = 1000)]
        step_ms: u64,
    },
}

fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

fn read_bars(path: &Path) -> Result<BTreeMap<String, Vec<Bar>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading bar file {}", path.display()))?;
    let bars = serde_json::from_str(&raw)
        .with_context(|| format!("parsing bar file {}", path.display()))?;
    Ok(bars)
}

fn run_backtest(config: AppConfig, bars: &Path) -> Result<()> {
    let data = read_bars(bars)?;
    let engine = BacktestEngine::new(config)?;
    let report = engine.run_on_bars(data)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Paper run options
struct PaperOptions {
    warmup: Option<usize>,
    realtime: bool,
    step: Duration,
}

async fn run_paper(mut config: AppConfig, bars: &Path, options: PaperOptions) -> Result<()> {
    let data = read_bars(bars)?;
    let warmup = options
        .warmup
        .unwrap_or_else(|| config.strategy.history_len());

    // Trade exactly the symbols present in the file, keeping configured settings
    config.symbols = data
        .keys()
        .map(|symbol| {
            config
                .symbol(symbol)
                .cloned()
                .unwrap_or_else(|| SymbolConfig::new(symbol))
        })
        .collect();

    let gateway = Arc::new(PaperGateway::new(config.backtest.initial_balance));
    for (symbol, series) in &data {
        gateway.load_bars(symbol, series.clone(), warmup).await;
    }

    let symbols: Vec<String> = data.keys().cloned().collect();
    let mut engine = TradingEngine::new(config, gateway.clone())?;
    engine.initialize().await?;

    if options.realtime {
        let feed = gateway.clone();
        let step = options.step;
        let feeder = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(step);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if feed.advance().await == 0 {
                    break;
                }
            }
        });

        engine
            .run(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
                    _ = feeder => info!("Bar feed exhausted"),
                }
            })
            .await?;
    } else {
        let mut iterations = 0usize;
        while gateway.advance().await > 0 {
            engine.drain_events().await?;

            let mut now = None;
            for symbol in &symbols {
                if let Ok(ts) = gateway.current_time(symbol).await {
                    now = now.max(Some(ts));
                }
            }
            let Some(now) = now else { break };

            if let Err(e) = engine.run_iteration(now).await {
                warn!(error = %e, "Iteration abandoned");
            }
            iterations += 1;
        }
        engine.drain_events().await?;
        engine.performance().log_summary();
        info!("Paper run finished after {} iterations", iterations);
    }

    info!("{} positions still open", engine.open_positions().len());
    println!(
        "{}",
        serde_json::to_string_pretty(&engine.performance().metrics())?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&log_level, args.json_logs)?;

    info!("Starting binary options engine");
    if let Some(path) = &args.config {
        info!("Configuration file: {}", path);
    }

    match args.command {
        Command::Backtest { bars } => run_backtest(config, &bars)?,
        Command::Paper {
            bars,
            warmup,
            realtime,
            step_ms,
        } => {
            let options = PaperOptions {
                warmup,
                realtime,
                step: Duration::from_millis(step_ms.max(1)),
            };
            run_paper(config, &bars, options).await?
        }
    }

    Ok(())
}
