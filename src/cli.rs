//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_data_adapter::CsvDataAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_alert_adapter::LogAlertAdapter;
use crate::adapters::replay_adapter::ReplayFeed;
use crate::domain::candle::{validate_series, Candle};
use crate::domain::engine::{Engine, SimConfig};
use crate::domain::error::PerpsimError;
use crate::domain::execution::{BacktestFill, PaperFill};
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataFeed;
use crate::ports::report_port::ReportPort;
use crate::strategies;

#[derive(Parser, Debug)]
#[command(name = "perpsim", about = "Perpetual futures backtest and forward-test engine")]
pub struct Cli {
    /// Maximum log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over stored candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy name, overriding [strategy] name from the config
        #[arg(short, long)]
        strategy: Option<String>,
        /// First candle to load (RFC 3339); defaults to the start of stored data
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// End of the window, exclusive (RFC 3339); defaults to the end of stored data
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Directory for trades.csv, equity.csv, rejections.csv and summary.txt
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay stored candles as a paper-traded live feed
    Forward {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy name, overriding [strategy] name from the config
        #[arg(short, long)]
        strategy: Option<String>,
    },
    /// Check a config file without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored candle range for the configured symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        /// Restrict to one timeframe (1m, 5m, 15m, 1h, 4h, 1d, 1w)
        #[arg(short, long)]
        timeframe: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            start,
            end,
            output,
        } => run_backtest(&config, strategy.as_deref(), start, end, output.as_ref()),
        Command::Forward { config, strategy } => run_forward(&config, strategy.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, timeframe } => run_info(&config, timeframe.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn build_sim_config(config: &dyn ConfigPort) -> Result<SimConfig, PerpsimError> {
    let symbol = config.require_string("data", "symbol")?;
    let initial_balance = config.get_double("run", "initial_balance", 10_000.0);
    if !initial_balance.is_finite() || initial_balance <= 0.0 {
        return Err(PerpsimError::ConfigInvalid {
            section: "run".into(),
            key: "initial_balance".into(),
            reason: "must be a positive number".into(),
        });
    }
    Ok(SimConfig {
        symbol,
        initial_balance,
        risk_free_rate: config.get_double("run", "risk_free_rate", 0.0),
    })
}

fn resolve_strategy_name(
    name_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, PerpsimError> {
    match name_override {
        Some(name) => Ok(name.to_string()),
        None => config.require_string("strategy", "name"),
    }
}

fn open_data_feed(config: &dyn ConfigPort, symbol: &str) -> Result<CsvDataAdapter, PerpsimError> {
    let dir = config.require_string("data", "dir")?;
    Ok(CsvDataAdapter::new(PathBuf::from(dir), symbol))
}

/// Loads the full stored base-timeframe series, clipped to an optional
/// `[start, end)` window. With no overrides the window covers every
/// stored candle. A gap or duplicate in the stored series fails here,
/// before the run starts.
fn load_base_candles(
    feed: &CsvDataAdapter,
    symbol: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<Candle>, PerpsimError> {
    let (first, last, _count) = feed
        .data_range(symbol, Timeframe::BASE)?
        .ok_or_else(|| PerpsimError::NoData {
            symbol: symbol.to_string(),
            timeframe: Timeframe::BASE,
        })?;

    let start = start.unwrap_or(first);
    // The stored range is inclusive of `last`; the query is half-open.
    let end = end.unwrap_or(last + Timeframe::BASE.duration());
    if end <= start {
        return Err(PerpsimError::Data {
            reason: format!("empty window: start {start} is not before end {end}"),
        });
    }

    let candles = feed.candles(symbol, Timeframe::BASE, start, end)?;
    validate_series(&candles, Timeframe::BASE)?;
    Ok(candles)
}

#[cfg(feature = "sqlite")]
fn add_state_sink(engine: &mut Engine, config: &dyn ConfigPort) -> Result<(), PerpsimError> {
    use crate::adapters::sqlite_state_adapter::SqliteStateAdapter;

    if config.get_bool("sqlite", "enabled", false) {
        let sink = SqliteStateAdapter::from_config(config)?;
        engine.add_sink(Box::new(sink));
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn add_state_sink(_engine: &mut Engine, config: &dyn ConfigPort) -> Result<(), PerpsimError> {
    if config.get_bool("sqlite", "enabled", false) {
        eprintln!("warning: sqlite persistence requested but this build lacks the sqlite feature");
    }
    Ok(())
}

fn run_backtest(
    config_path: &PathBuf,
    strategy_override: Option<&str>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let sim = match build_sim_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 2: Build strategy
    let name = match resolve_strategy_name(strategy_override, &config) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let strategy = match strategies::build(&name, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Loading strategy: {name}");

    // Stage 3: Fetch candles
    let feed = match open_data_feed(&config, &sim.symbol) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let candles = match load_base_candles(&feed, &sim.symbol, start, end) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Running backtest: {} candles on {}",
        candles.len(),
        sim.symbol
    );

    // Stage 4: Run engine
    let mut engine = Engine::new(sim, strategy, Box::new(BacktestFill));
    engine.add_sink(Box::new(LogAlertAdapter));
    if let Err(e) = add_state_sink(&mut engine, &config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let report = match engine.run_backtest(&candles, &feed) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 5: Print summary and write reports
    eprintln!("\n{}", report.summary());

    let output = output_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("reports"));
    match CsvReportAdapter.write(&report, &output) {
        Ok(()) => {
            eprintln!("\nReports written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_forward(config_path: &PathBuf, strategy_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let sim = match build_sim_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let name = match resolve_strategy_name(strategy_override, &config) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let strategy = match strategies::build(&name, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Loading strategy: {name}");

    let store = match open_data_feed(&config, &sim.symbol) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let candles = match load_base_candles(&store, &sim.symbol, None, None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Replaying {} candles on {} as a live feed",
        candles.len(),
        sim.symbol
    );

    let mut feed = ReplayFeed::new(candles);
    let mut engine = Engine::new(sim, strategy, Box::new(PaperFill));
    engine.add_sink(Box::new(LogAlertAdapter));
    if let Err(e) = add_state_sink(&mut engine, &config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let report = match engine.run_forward(&mut feed) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\n{}", report.summary());
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let sim = match build_sim_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("  symbol:   {}", sim.symbol);
    eprintln!("  balance:  ${:.2}", sim.initial_balance);

    let name = match resolve_strategy_name(None, &config) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let strategy = match strategies::build(&name, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let timeframes: Vec<String> = strategy
        .timeframes()
        .iter()
        .map(|tf| tf.to_string())
        .collect();
    eprintln!("  strategy: {} ({})", name, timeframes.join(", "));

    let feed = match open_data_feed(&config, &sim.symbol) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    match feed.data_range(&sim.symbol, Timeframe::BASE) {
        Ok(Some((first, last, count))) => {
            eprintln!("  data:     {count} candles, {first} to {last}");
        }
        Ok(None) => {
            let e = PerpsimError::NoData {
                symbol: sim.symbol.clone(),
                timeframe: Timeframe::BASE,
            };
            eprintln!("error: {e}");
            return (&e).into();
        }
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    if config.get_bool("sqlite", "enabled", false) {
        if let Err(e) = config.require_string("sqlite", "path") {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("  sqlite:   enabled");
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf, timeframe: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let symbol = match config.require_string("data", "symbol") {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let feed = match open_data_feed(&config, &symbol) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let timeframes: Vec<Timeframe> = match timeframe {
        Some(label) => match label.parse::<Timeframe>() {
            Ok(tf) => vec![tf],
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
        None => Timeframe::ALL.to_vec(),
    };

    for tf in &timeframes {
        match feed.data_range(&symbol, *tf) {
            Ok(Some((first, last, count))) => {
                println!("{symbol} {tf}: {count} candles, {first} to {last}");
            }
            Ok(None) => eprintln!("{symbol} {tf}: no data"),
            Err(e) => eprintln!("{symbol} {tf}: {e}"),
        }
    }
    ExitCode::SUCCESS
}
