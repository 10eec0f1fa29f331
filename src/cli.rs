//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::{PaperBroker, PaperSettings};
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::agent::{AgentConfig, LifecycleController, Scheduler};
use crate::domain::config_validation::validate_paper_config;
use crate::domain::error::TraderError;
use crate::domain::optimizer::optimize_k;
use crate::domain::signal::Side;
use crate::domain::universe::{Coverage, check_coverage};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::TradeStorePort;

#[derive(Parser, Debug)]
#[command(name = "daytrader", about = "Intraday equity trading agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the agent against the paper broker
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many completed sessions
        #[arg(long)]
        days: Option<usize>,
    },
    /// Create the SQLite schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import <SYMBOL>.csv bar files into the store as daily bars
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Show the breakout k grid search over stored history
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List recorded trades, newest first
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Validate the configuration and stored history coverage
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config, days } => run_agent(&config, days),
        Command::InitDb { config } => run_init_db(&config),
        Command::Import {
            config,
            dir,
            symbol,
        } => run_import(&config, dir, symbol.as_deref()),
        Command::Optimize { config, symbol } => run_optimize(&config, symbol.as_deref()),
        Command::Trades {
            config,
            symbol,
            limit,
        } => run_trades(&config, symbol.as_deref(), limit),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: TraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Config file, then the SQLite store with its schema in place.
fn open_store(config_path: &PathBuf) -> Result<(FileConfigAdapter, SqliteAdapter), ExitCode> {
    let config = load_config(config_path)?;
    let store = SqliteAdapter::from_config(&config).map_err(fail)?;
    store.initialize_schema().map_err(fail)?;
    Ok((config, store))
}

fn symbols_or_override(
    symbol: Option<&str>,
    config: &FileConfigAdapter,
) -> Result<Vec<String>, ExitCode> {
    match symbol {
        Some(s) => Ok(vec![s.trim().to_uppercase()]),
        None => AgentConfig::from_config(config)
            .map(|agent| agent.symbols)
            .map_err(fail),
    }
}

fn run_agent(config_path: &PathBuf, days: Option<usize>) -> ExitCode {
    // Stage 1: config
    eprintln!("Loading config from {}", config_path.display());
    let (config, store) = match open_store(config_path) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    let agent_config = match AgentConfig::from_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Err(e) = validate_paper_config(&config) {
        return fail(e);
    }
    let paper = match PaperSettings::from_config(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    // Stage 2: paper broker seeded from stored history
    let broker = PaperBroker::new(paper);
    for symbol in &agent_config.symbols {
        match store.query_recent_history(symbol, agent_config.history_lookback_days + 1) {
            Ok(series) if !series.is_empty() => broker.seed_history(series),
            Ok(_) => eprintln!("warning: no stored history for {symbol}; import bars first"),
            Err(e) => return fail(e),
        }
    }

    eprintln!(
        "Trading {} symbol(s): {}",
        agent_config.symbols.len(),
        agent_config.symbols.join(", ")
    );

    // Stage 3: drive the day cycle
    let mut scheduler = Scheduler::new(agent_config.schedule.clone(), agent_config.tick_interval);
    let mut controller =
        LifecycleController::new(Arc::new(broker), Arc::new(store), agent_config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return fail(TraderError::Io(e)),
    };

    let result = runtime.block_on(async {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        };
        scheduler.run(&mut controller, days, shutdown).await
    });

    match result {
        Ok(()) => {
            eprintln!(
                "Agent stopped in phase {} after {} session(s)",
                controller.phase(),
                scheduler.sessions_completed()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    match open_store(config_path) {
        Ok(_) => {
            eprintln!("Database schema initialized");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_import(config_path: &PathBuf, dir: PathBuf, symbol: Option<&str>) -> ExitCode {
    let (_config, store) = match open_store(config_path) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    let csv = CsvAdapter::new(dir);

    let symbols = match symbol {
        Some(s) => vec![s.trim().to_uppercase()],
        None => match csv.list_symbols() {
            Ok(s) => s,
            Err(e) => return fail(e),
        },
    };

    if symbols.is_empty() {
        eprintln!("No CSV files found");
        return ExitCode::from(5);
    }

    let mut total = 0;
    for symbol in &symbols {
        let daily = match csv.load_series(symbol) {
            Ok(series) => series.to_daily(),
            Err(e) => return fail(e),
        };
        match store.store_bars(&daily) {
            Ok(n) => {
                println!("{}: {} daily bars", symbol, n);
                total += n;
            }
            Err(e) => return fail(e),
        }
    }

    eprintln!("Imported {} bars for {} symbol(s)", total, symbols.len());
    ExitCode::SUCCESS
}

fn run_optimize(config_path: &PathBuf, symbol: Option<&str>) -> ExitCode {
    let (config, store) = match open_store(config_path) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    let symbols = match symbols_or_override(symbol, &config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let lookback = config.get_int("agent", "history_lookback_days", 30).max(1) as usize;

    for symbol in &symbols {
        let history = match store.query_recent_history(symbol, lookback) {
            Ok(h) => h.to_daily(),
            Err(e) => return fail(e),
        };
        match optimize_k(&history) {
            Ok(result) => {
                println!("{} ({} days)", symbol, history.len());
                for candidate in &result.candidates {
                    let marker = if candidate.k == result.best_k { "*" } else { " " };
                    println!(
                        "  {} k={:.1} aggregate={:.4} breakouts={}",
                        marker, candidate.k, candidate.aggregate_return, candidate.breakout_days
                    );
                }
            }
            Err(e) => eprintln!("{}: {}", symbol, e),
        }
    }
    ExitCode::SUCCESS
}

fn run_trades(config_path: &PathBuf, symbol: Option<&str>, limit: usize) -> ExitCode {
    let (_config, store) = match open_store(config_path) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let symbol = symbol.map(|s| s.trim().to_uppercase());
    let records = match store.list_trade_records(symbol.as_deref(), limit) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    if records.is_empty() {
        eprintln!("No trades recorded");
        return ExitCode::SUCCESS;
    }

    let mut bought = 0.0;
    let mut sold = 0.0;
    for r in &records {
        match r.side {
            Side::Buy => bought += r.notional(),
            Side::Sell => sold += r.notional(),
        }
        println!(
            "{} {:<6} {:<4} {:>6} @ {:>10.2} = {:>12.2}  {:<14} {:<28} {}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.symbol,
            r.side,
            r.quantity,
            r.price,
            r.notional(),
            r.strategy_name,
            r.reason,
            r.order_id
        );
    }
    eprintln!(
        "{} trade(s), bought {:.2}, sold {:.2}",
        records.len(),
        bought,
        sold
    );
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let agent_config = match AgentConfig::from_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Err(e) = validate_paper_config(&config) {
        return fail(e);
    }
    eprintln!("  symbols: {}", agent_config.symbols.join(", "));
    match agent_config.allocation_per_symbol {
        Some(a) => eprintln!("  allocation: {:.2} per symbol", a),
        None => eprintln!(
            "  allocation: {:.0}% of equity split evenly",
            agent_config.allocation_factor * 100.0
        ),
    }

    if config.get_string("sqlite", "path").is_none() {
        eprintln!("\nNo [sqlite] path configured; skipping history coverage.");
        eprintln!("\nConfiguration is valid.");
        return ExitCode::SUCCESS;
    }

    let store = match SqliteAdapter::from_config(&config).and_then(|s| {
        s.initialize_schema()?;
        Ok(s)
    }) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let report = match check_coverage(
        &store,
        agent_config.symbols.clone(),
        agent_config.history_lookback_days,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    eprintln!("\nHistory coverage:");
    for (symbol, coverage) in &report.coverage {
        match coverage {
            Coverage::Ready { bars } => eprintln!("  {symbol}: {bars} days"),
            Coverage::Partial { bars } => {
                eprintln!("  {symbol}: {bars} days (some strategies will stay un-armed)")
            }
            Coverage::Missing => eprintln!("  {symbol}: no history"),
        }
    }
    eprintln!(
        "\n{}/{} symbol(s) ready. Configuration is valid.",
        report.ready_count(),
        report.universe.count()
    );
    ExitCode::SUCCESS
}
