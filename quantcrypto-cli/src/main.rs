//! QuantCrypto CLI: backtest runs, parameter sweeps, and data-quality audits.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config (synthetic data without one)
//! - `sweep`: EMA-crossover fast/slow grid on one series, ranked by a metric
//! - `quality`: audit a CSV file for gaps, duplicates, bad candles and spikes
//!
//! Logs go to stderr. `RUST_LOG` overrides the level; `--verbose` sets debug.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quantcrypto_core::domain::Timeframe;
use quantcrypto_core::quality::audit;
use quantcrypto_runner::export::{export_sweep_csv, generate_sweep_report};
use quantcrypto_runner::{
    load_series, read_csv_file, run_on_series, save_artifacts, BacktestConfig, BacktestResult,
    EmaGrid, ParamSweep, RankMetric,
};

#[derive(Parser)]
#[command(
    name = "quantcrypto",
    version,
    about = "QuantCrypto: bar-by-bar crypto strategy backtester"
)]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Data-source overrides shared by `run` and `sweep`.
#[derive(clap::Args)]
struct DataArgs {
    /// Path to a TOML config file. All tables are optional.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV price file (overrides `data.path`).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Symbol label (overrides `data.symbol`).
    #[arg(long)]
    symbol: Option<String>,

    /// Bar interval, e.g. 1h, 4h, 1d (overrides `data.timeframe`).
    #[arg(long)]
    timeframe: Option<Timeframe>,

    /// Stop-loss as a fraction of entry price (overrides `exits.stop_loss`).
    #[arg(long)]
    stop_loss: Option<f64>,

    /// Take-profit as a fraction of entry price (overrides `exits.take_profit`).
    #[arg(long)]
    take_profit: Option<f64>,

    /// Trailing stop as a fraction of the best close (overrides `exits.trailing_stop`).
    #[arg(long)]
    trailing_stop: Option<f64>,
}

impl DataArgs {
    fn resolve(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => BacktestConfig::default(),
        };
        if let Some(path) = &self.data {
            config.data.path = Some(path.clone());
        }
        if let Some(symbol) = &self.symbol {
            config.data.symbol = symbol.clone();
        }
        if let Some(timeframe) = self.timeframe {
            config.data.timeframe = timeframe;
        }
        config.exits.stop_loss = self.stop_loss.or(config.exits.stop_loss);
        config.exits.take_profit = self.take_profit.or(config.exits.take_profit);
        config.exits.trailing_stop = self.trailing_stop.or(config.exits.trailing_stop);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest and save its artifacts.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for manifest, CSVs and report.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Sweep EMA-crossover periods over one series.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Fast periods, comma-separated.
        #[arg(long, value_delimiter = ',', default_values_t = vec![5usize, 10, 15, 20])]
        fast: Vec<usize>,

        /// Slow periods, comma-separated.
        #[arg(long, value_delimiter = ',', default_values_t = vec![20usize, 30, 40, 50, 60])]
        slow: Vec<usize>,

        /// Ranking metric: sharpe, sortino, total_return, calmar, profit_factor, max_drawdown.
        #[arg(long, default_value = "sharpe")]
        rank: RankMetric,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write the full ranked table as CSV.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Run grid points one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Audit a CSV price file.
    Quality {
        /// CSV price file.
        path: PathBuf,

        /// Expected bar interval.
        #[arg(long, default_value = "1d")]
        timeframe: Timeframe,

        /// Exit non-zero when the file has duplicates, ordering or candle errors.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            output_dir,
            no_save,
        } => run_cmd(&data, &output_dir, no_save),
        Commands::Sweep {
            data,
            fast,
            slow,
            rank,
            top,
            output,
            sequential,
        } => sweep_cmd(&data, fast, slow, rank, top, output.as_deref(), sequential),
        Commands::Quality {
            path,
            timeframe,
            strict,
        } => quality_cmd(&path, timeframe, strict),
    }
}

fn run_cmd(data: &DataArgs, output_dir: &Path, no_save: bool) -> Result<()> {
    let config = data.resolve()?;
    let series = load_series(&config.data).context("failed to load price data")?;
    let result = run_on_series(&series, &config)?;

    print_summary(&result);

    if !no_save {
        let run_dir = save_artifacts(&result, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn sweep_cmd(
    data: &DataArgs,
    fast: Vec<usize>,
    slow: Vec<usize>,
    rank: RankMetric,
    top: usize,
    output: Option<&Path>,
    sequential: bool,
) -> Result<()> {
    let config = data.resolve()?;
    let grid = EmaGrid {
        fast,
        slow,
        ..EmaGrid::default()
    };
    if grid.size() == 0 {
        bail!("grid is empty: every fast period must be below some slow period");
    }

    let series = load_series(&config.data).context("failed to load price data")?;
    let results = ParamSweep::new(config)
        .with_parallelism(!sequential)
        .run(&series, &grid)?;
    info!(runs = results.len(), "sweep complete");

    println!("{}", generate_sweep_report(&results, rank, top));

    if let Some(path) = output {
        let csv = export_sweep_csv(&results, rank)?;
        std::fs::write(path, csv)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep table saved to: {}", path.display());
    }
    Ok(())
}

fn quality_cmd(path: &Path, timeframe: Timeframe, strict: bool) -> Result<()> {
    let bars =
        read_csv_file(path).with_context(|| format!("failed to read {}", path.display()))?;
    let report = audit(&bars, timeframe);

    println!("{}", report.summary());
    for gap in report.gaps.iter().take(10) {
        println!(
            "  gap after bar {}: {} -> {} ({} missing)",
            gap.index, gap.from, gap.to, gap.missing_bars
        );
    }
    for flagged in report.invalid_candles.iter().take(10) {
        println!(
            "  invalid bar {} at {}: {}",
            flagged.index, flagged.timestamp, flagged.detail
        );
    }

    if strict && report.blocks_backtest() {
        bail!("{} is not usable for backtesting as-is", path.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {} ({})", result.symbol, result.timeframe);
    println!("Strategy:       {}", result.strategy_label());
    println!("Period:         {} to {}", result.start, result.end);
    println!("Bars:           {}", result.output.bar_count());
    println!("Trades:         {}", m.trade_count);
    println!("Run ID:         {}", &result.run_id[..result.run_id.len().min(12)]);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Exposure:       {:.1}%", m.exposure * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Total Fees:     {:.2}", m.total_fees);
    if !result.output.skipped_fills.is_empty() {
        println!("Skipped Fills:  {}", result.output.skipped_fills.len());
    }
    if result.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    if !result.data_quality.is_clean() {
        println!(
            "WARNING: data quality score {:.1}/100",
            result.data_quality.score
        );
    }
    println!();
}
