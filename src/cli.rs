//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_signal_writer::CsvSignalWriter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_ledger::PaperLedger;
use crate::domain::config_validation::{
    configured_engine, validate_data_config, validate_engine_config, DATA_SECTION, DEFAULT_INITIAL_VALUE,
    ENGINE_SECTION,
};
use crate::domain::engine::{build_engine, EngineKind};
use crate::domain::error::AlphaLabError;
use crate::domain::estimator::{estimate, EstimatorKind};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::replay::{replay, ReplayResult};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::signal_port::SignalSink;

#[derive(Parser, Debug)]
#[command(name = "alphalab", about = "Signal estimators and engines over historical bars")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay bars through an engine and write its signals as CSV
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides `[engine] name`
        #[arg(short, long)]
        engine: Option<String>,
        /// Signal CSV path; stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute one estimator over a symbol's history
    Estimate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        /// entropy, hurst or vpin
        #[arg(long)]
        estimator: String,
    },
    /// Validate the data and engine sections of a configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        /// Defaults to every symbol of the configured engine
        #[arg(long)]
        code: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze {
            config,
            engine,
            output,
        } => run_analyze(&config, engine.as_deref(), output.as_deref()),
        Command::Estimate {
            config,
            code,
            estimator,
        } => run_estimate(&config, &code, &estimator),
        Command::Validate { config, engine } => run_validate(&config, engine.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, code } => run_info(&config, code.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, AlphaLabError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Engine from `--engine`, falling back to `[engine] name`.
pub fn resolve_engine(engine_override: Option<&str>, config: &dyn ConfigPort) -> Result<EngineKind, AlphaLabError> {
    match engine_override {
        Some(name) => name.parse(),
        None => configured_engine(config)?.ok_or_else(|| AlphaLabError::missing(ENGINE_SECTION, "name")),
    }
}

fn parse_bound(config: &dyn ConfigPort, key: &str) -> Option<NaiveDate> {
    config
        .get_string(DATA_SECTION, key)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Data adapter and optional date bounds from a validated `[data]` section.
pub fn data_source(config: &dyn ConfigPort) -> Result<(CsvAdapter, Option<NaiveDate>, Option<NaiveDate>), AlphaLabError> {
    validate_data_config(config)?;
    let path = config
        .get_string(DATA_SECTION, "path")
        .ok_or_else(|| AlphaLabError::missing(DATA_SECTION, "path"))?;
    let exchange = config
        .get_string(DATA_SECTION, "exchange")
        .ok_or_else(|| AlphaLabError::missing(DATA_SECTION, "exchange"))?;
    Ok((
        CsvAdapter::new(PathBuf::from(path.trim()), exchange.trim()),
        parse_bound(config, "start_date"),
        parse_bound(config, "end_date"),
    ))
}

/// Bars for each symbol. Symbols without data are skipped with a warning;
/// fails only when none have data.
pub fn load_bars(
    data: &dyn DataPort,
    symbols: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<BTreeMap<String, Vec<OhlcvBar>>, AlphaLabError> {
    let mut loaded = BTreeMap::new();
    for symbol in symbols {
        match data.fetch_bars(symbol, start, end) {
            Ok(bars) if bars.is_empty() => {
                warn!(symbol = %symbol, "no bars in range");
                eprintln!("warning: skipping {} (no bars in range)", symbol);
            }
            Ok(bars) => {
                loaded.insert(symbol.clone(), bars);
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol");
                eprintln!("warning: skipping {} ({})", symbol, e);
            }
        }
    }
    if loaded.is_empty() {
        return Err(AlphaLabError::NoData {
            code: symbols.join(","),
        });
    }
    Ok(loaded)
}

fn write_signals<S: SignalSink>(sink: &mut S, engine: &str, result: &ReplayResult) -> Result<(), AlphaLabError> {
    sink.write(engine, &result.signals)?;
    sink.finish()
}

fn run_analyze(config_path: &Path, engine_override: Option<&str>, output: Option<&Path>) -> Result<(), AlphaLabError> {
    let config = load_config(config_path)?;
    let (data, start, end) = data_source(&config)?;
    let kind = resolve_engine(engine_override, &config)?;
    validate_engine_config(kind, &config)?;

    let mut engine = build_engine(kind, &config);
    let symbols = engine.symbols();
    eprintln!("Loading bars for {} symbols: {}", symbols.len(), symbols.join(", "));
    let bars = load_bars(&data, &symbols, start, end)?;
    let bar_count: usize = bars.values().map(Vec::len).sum();

    eprintln!("Running {}: {} symbols, {} bars", kind, bars.len(), bar_count);
    let initial_value = config.get_double(DATA_SECTION, "initial_value", DEFAULT_INITIAL_VALUE);
    let mut ledger = PaperLedger::with_initial_value(initial_value);
    let result = replay(engine.as_mut(), &bars, &mut ledger);

    match output {
        Some(path) => {
            let mut writer = CsvSignalWriter::create(path)?;
            write_signals(&mut writer, engine.name(), &result)?;
            eprintln!("Signals written to: {}", path.display());
        }
        None => write_signals(&mut CsvSignalWriter::stdout(), engine.name(), &result)?,
    }

    eprintln!("\n=== {} ===", kind);
    eprintln!("Timestamps:       {}", result.slices);
    eprintln!("Trading days:     {}", result.schedules);
    eprintln!("Signals:          {}", result.signals.len());
    for line in engine.summary() {
        eprintln!("  {}", line);
    }
    let holdings: Vec<String> = ledger
        .holdings()
        .map(|(symbol, weight)| format!("{symbol} {weight:.3}"))
        .collect();
    if !holdings.is_empty() {
        eprintln!("Final weights:    {}", holdings.join(", "));
    }
    eprintln!(
        "Final equity:     {:.4} ({:+.2}%)",
        ledger.equity(),
        (ledger.equity() / initial_value - 1.0) * 100.0
    );
    Ok(())
}

fn run_estimate(config_path: &Path, code: &str, estimator: &str) -> Result<(), AlphaLabError> {
    let kind: EstimatorKind = estimator.parse()?;
    let config = load_config(config_path)?;
    let (data, start, end) = data_source(&config)?;
    let code = code.trim().to_uppercase();

    let bars = data.fetch_bars(&code, start, end)?;
    if bars.is_empty() {
        return Err(AlphaLabError::NoData { code });
    }
    let value = estimate(kind, &bars).ok_or_else(|| AlphaLabError::InsufficientData {
        code: code.clone(),
        bars: bars.len(),
        minimum: kind.min_bars(),
    })?;
    println!("{},{},{:.6}", code, kind, value);
    Ok(())
}

fn run_validate(config_path: &Path, engine_override: Option<&str>) -> Result<(), AlphaLabError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    eprintln!("[{}] section is valid", DATA_SECTION);

    let kind = resolve_engine(engine_override, &config)?;
    validate_engine_config(kind, &config)?;
    let engine = build_engine(kind, &config);
    eprintln!("[{}] section is valid", kind.section());
    eprintln!("  Symbols: {}", engine.symbols().join(", "));

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), AlphaLabError> {
    let config = load_config(config_path)?;
    let (data, _, _) = data_source(&config)?;
    let symbols = data.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(config_path: &Path, code: Option<&str>) -> Result<(), AlphaLabError> {
    let config = load_config(config_path)?;
    let (data, _, _) = data_source(&config)?;
    let codes = match code {
        Some(c) => vec![c.trim().to_uppercase()],
        None => build_engine(resolve_engine(None, &config)?, &config).symbols(),
    };

    for c in &codes {
        match data.get_data_range(c) {
            Ok(Some((first, last, count))) => println!("{}: {} bars, {} to {}", c, count, first, last),
            Ok(None) => eprintln!("{}: no data found", c),
            Err(e) => eprintln!("error querying {}: {}", c, e),
        }
    }
    Ok(())
}
