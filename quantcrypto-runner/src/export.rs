//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade log and equity curve for external analysis tools
//! - **Markdown**: human-readable single-run reports and sweep tables
//!
//! All persisted artifacts include a `schema_version` field. Versions newer
//! than this build understands are rejected on load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use quantcrypto_core::domain::{EquitySnapshot, PositionSide, TradeRecord};
use quantcrypto_core::execution::SkipReason;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::{RankMetric, SweepResults};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const REPORT_FILE: &str = "report.md";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn side_label(side: PositionSide) -> &'static str {
    match side {
        PositionSide::Long => "long",
        PositionSide::Short => "short",
        PositionSide::Flat => "flat",
    }
}

/// Export the trade log as CSV, one row per closed round trip.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "quantity",
        "gross_pnl",
        "fees",
        "pnl",
        "return_pct",
        "holding_bars",
        "holding_seconds",
        "mae",
        "mfe",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            side_label(t.side),
            &t.entry_fill.bar_index.to_string(),
            &t.entry_fill.timestamp.to_rfc3339(),
            &format!("{:.8}", t.average_entry_price),
            &t.exit_fill.bar_index.to_string(),
            &t.exit_fill.timestamp.to_rfc3339(),
            &format!("{:.8}", t.exit_fill.price),
            &format!("{:.8}", t.quantity),
            &format!("{:.4}", t.gross_pnl),
            &format!("{:.4}", t.fees),
            &format!("{:.4}", t.pnl),
            &format!("{:.6}", t.return_pct()),
            &t.holding_period.to_string(),
            &t.holding_seconds.to_string(),
            &format!("{:.4}", t.mae),
            &format!("{:.4}", t.mfe),
            t.exit_reason.as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the equity curve as CSV, one row per bar.
pub fn export_equity_csv(curve: &[EquitySnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bar_index",
        "timestamp",
        "cash",
        "position_quantity",
        "position_value",
        "unrealized_pnl",
        "equity",
        "drawdown",
    ])?;
    for s in curve {
        wtr.write_record([
            &s.bar_index.to_string(),
            &s.timestamp.to_rfc3339(),
            &format!("{:.4}", s.cash),
            &format!("{:.8}", s.position_quantity),
            &format!("{:.4}", s.position_value),
            &format!("{:.4}", s.unrealized_pnl),
            &format!("{:.4}", s.total_equity),
            &format!("{:.6}", s.drawdown_from_peak),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per sweep point, in the given ranking order.
pub fn export_sweep_csv(results: &SweepResults, metric: RankMetric) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let keys: Vec<String> = results
        .all()
        .first()
        .map(|r| r.metrics_map().into_keys().collect())
        .unwrap_or_default();

    let mut header = vec!["rank".to_string(), "strategy".to_string(), "run_id".to_string()];
    header.extend(keys.iter().cloned());
    wtr.write_record(&header)?;

    for (rank, r) in results.ranked_by(metric).into_iter().enumerate() {
        let map = r.metrics_map();
        let mut row = vec![(rank + 1).to_string(), r.strategy_label(), r.run_id.clone()];
        row.extend(keys.iter().map(|k| format!("{:.6}", map[k])));
        wtr.write_record(&row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{run_id prefix}/` under `output_dir` containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `trades.csv`: trade log
/// - `equity.csv`: bar-by-bar equity curve
/// - `report.md`: Markdown report
///
/// The directory name depends only on the run inputs, so re-running the same
/// config overwrites the same directory. Returns the directory path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id = &result.run_id[..result.run_id.len().min(12)];
    let run_dir = output_dir.join(format!("{}_{}", result.symbol, short_id));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, contents: String| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    };
    write(MANIFEST_FILE, export_json(result)?)?;
    write(TRADES_FILE, export_trades_csv(&result.output.trades)?)?;
    write(EQUITY_FILE, export_equity_csv(&result.output.equity_curve)?)?;
    write(REPORT_FILE, generate_report(result))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
        .with_context(|| format!("invalid manifest {}", manifest_path.display()))
}

// ─── Markdown reports ───────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn skip_kind(reason: &SkipReason) -> &'static str {
    match reason {
        SkipReason::LimitNotReached { .. } => "limit not reached",
        SkipReason::InsufficientFunds { .. } => "insufficient funds",
        SkipReason::ShortingDisabled { .. } => "shorting disabled",
        SkipReason::NothingToClose => "nothing to close",
        SkipReason::NoEquity { .. } => "no equity",
    }
}

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(4096);
    let out = &result.output;
    let m = &result.metrics;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!("| Timeframe | {} |\n", result.timeframe));
    md.push_str(&format!("| Strategy | `{}` |\n", result.strategy_label()));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start.format("%Y-%m-%d %H:%M"),
        result.end.format("%Y-%m-%d %H:%M")
    ));
    md.push_str(&format!("| Bars | {} |\n", out.bar_count()));
    md.push_str(&format!("| Initial Cash | {:.2} |\n", out.initial_cash));
    md.push_str(&format!(
        "| Costs | {} bps slippage, {} fee |\n",
        result.config.engine.slippage_bps,
        pct(result.config.engine.fee_pct)
    ));
    md.push_str(&format!("| Run ID | `{}` |\n", result.run_id));
    md.push_str(&format!(
        "| Series Hash | `{}` |\n",
        out.fingerprint.series_hash.short()
    ));
    if result.synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Equity | {:.2} |\n", m.final_equity));
    md.push_str(&format!("| Net Profit | {:.2} |\n", m.net_profit));
    md.push_str(&format!("| Total Return | {} |\n", pct(m.total_return)));
    md.push_str(&format!("| CAGR | {} |\n", pct(m.cagr)));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Calmar | {:.3} |\n", m.calmar));
    md.push_str(&format!("| Max Drawdown | {} |\n", pct(m.max_drawdown)));
    md.push_str(&format!(
        "| Annual Volatility | {} |\n",
        pct(m.annual_volatility)
    ));
    md.push_str(&format!("| Exposure | {} |\n", pct(m.exposure)));
    md.push('\n');

    md.push_str("## Trades\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Expectancy | {:.2} |\n", m.expectancy));
    md.push_str(&format!("| Avg Win | {:.2} |\n", m.avg_win));
    md.push_str(&format!("| Avg Loss | {:.2} |\n", m.avg_loss));
    md.push_str(&format!(
        "| Max Consecutive Wins | {} |\n",
        m.max_consecutive_wins
    ));
    md.push_str(&format!(
        "| Max Consecutive Losses | {} |\n",
        m.max_consecutive_losses
    ));
    md.push_str(&format!(
        "| Avg Holding (bars) | {:.1} |\n",
        m.avg_holding_bars
    ));
    md.push_str(&format!("| Total Fees | {:.2} |\n", m.total_fees));
    let mut exits: BTreeMap<&str, usize> = BTreeMap::new();
    for trade in &out.trades {
        *exits.entry(trade.exit_reason.as_str()).or_default() += 1;
    }
    for (reason, count) in &exits {
        md.push_str(&format!("| Exits ({reason}) | {count} |\n"));
    }
    if !out.final_position.is_flat() {
        md.push_str(&format!(
            "| Open at End | {} {:.6} @ {:.2} |\n",
            side_label(out.final_position.side()),
            out.final_position.quantity.abs(),
            out.final_position.average_entry_price
        ));
    }
    md.push('\n');

    md.push_str("## Execution\n\n");
    md.push_str(&format!("- Fills: {}\n", out.fills.len()));
    md.push_str(&format!("- Slippage cost: {:.2}\n", out.total_slippage));
    md.push_str(&format!("- Skipped fills: {}\n", out.skipped_fills.len()));
    let mut skips: BTreeMap<&str, usize> = BTreeMap::new();
    for skip in &out.skipped_fills {
        *skips.entry(skip_kind(&skip.reason)).or_default() += 1;
    }
    for (kind, count) in &skips {
        md.push_str(&format!("  - {kind}: {count}\n"));
    }
    if out.discarded_intents > 0 {
        md.push_str(&format!(
            "- Intents discarded after the last bar: {}\n",
            out.discarded_intents
        ));
    }
    md.push('\n');

    md.push_str("## Data Quality\n\n");
    md.push_str("```text\n");
    md.push_str(&result.data_quality.summary());
    md.push_str("\n```\n");

    md
}

/// Markdown table of the top `n` sweep points.
pub fn generate_sweep_report(results: &SweepResults, metric: RankMetric, n: usize) -> String {
    let mut md = String::with_capacity(2048);
    md.push_str(&format!("# Parameter Sweep (ranked by {metric})\n\n"));
    md.push_str(&format!("{} runs\n\n", results.len()));
    md.push_str("| # | Strategy | Return | Sharpe | Sortino | Max DD | Trades | Win Rate |\n");
    md.push_str("| ---: | --- | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for (rank, r) in results.top_n(metric, n).into_iter().enumerate() {
        let m = &r.metrics;
        md.push_str(&format!(
            "| {} | `{}` | {} | {:.3} | {:.3} | {} | {} | {:.1}% |\n",
            rank + 1,
            r.strategy_label(),
            pct(m.total_return),
            m.sharpe,
            m.sortino,
            pct(m.max_drawdown),
            m.trade_count,
            m.win_rate * 100.0
        ));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BacktestConfig, StrategyConfig, SyntheticConfig};
    use crate::runner::run_backtest;

    fn sample_result() -> BacktestResult {
        let mut config = BacktestConfig {
            strategy: StrategyConfig::EmaCrossover {
                fast: 3,
                slow: 8,
                fraction: 0.9,
                allow_short: false,
            },
            ..BacktestConfig::default()
        };
        config.engine = config.engine.with_costs(2.0, 0.001);
        config.data.synthetic = SyntheticConfig {
            bars: 120,
            ..SyntheticConfig::default()
        };
        run_backtest(&config).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn newer_schema_rejected() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn missing_schema_version_defaults_to_current() {
        let result = sample_result();
        let mut value = serde_json::to_value(&result).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back = import_json(&value.to_string()).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn trades_csv_has_header_and_one_row_per_trade() {
        let result = sample_result();
        let csv = export_trades_csv(&result.output.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("side,entry_bar,entry_time"));
        assert!(lines[0].ends_with(",exit_reason"));
        assert_eq!(lines.len(), result.output.trades.len() + 1);
    }

    #[test]
    fn protective_exits_show_in_csv_and_report() {
        let mut config = BacktestConfig {
            strategy: StrategyConfig::BuyAndHold { fraction: 0.5 },
            ..BacktestConfig::default()
        };
        config.exits.trailing_stop = Some(0.01);
        config.data.synthetic = SyntheticConfig {
            bars: 120,
            ..SyntheticConfig::default()
        };
        let result = run_backtest(&config).unwrap();
        assert_eq!(result.output.trades.len(), 1);

        let csv = export_trades_csv(&result.output.trades).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",trailing_stop"));
        let report = generate_report(&result);
        assert!(report.contains("| Exits (trailing_stop) | 1 |"));
        assert!(report.contains("buy_and_hold+trail1%"));
    }

    #[test]
    fn equity_csv_one_row_per_bar() {
        let result = sample_result();
        let csv = export_equity_csv(&result.output.equity_curve).unwrap();
        assert_eq!(csv.lines().count(), 121);
        assert!(csv.lines().nth(1).unwrap().starts_with("0,"));
    }

    #[test]
    fn report_contains_sections() {
        let report = generate_report(&sample_result());
        for section in [
            "# Backtest Report",
            "## Metadata",
            "## Performance Summary",
            "## Trades",
            "## Execution",
            "## Data Quality",
            "**SYNTHETIC**",
            "ema_crossover(3/8)",
        ] {
            assert!(report.contains(section), "missing {section}");
        }
    }

    #[test]
    fn artifacts_roundtrip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();
        let run_dir = save_artifacts(&result, dir.path()).unwrap();

        for file in [MANIFEST_FILE, TRADES_FILE, EQUITY_FILE, REPORT_FILE] {
            assert!(run_dir.join(file).exists(), "{file} not written");
        }
        assert_eq!(load_artifacts(&run_dir).unwrap(), result);

        // Same inputs land in the same directory
        assert_eq!(save_artifacts(&result, dir.path()).unwrap(), run_dir);
    }

    #[test]
    fn load_artifacts_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_artifacts(dir.path()).is_err());
    }
}
