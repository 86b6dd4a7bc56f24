//! Result export: JSON and CSV artifacts for a backtest report.
//!
//! - **JSON**: the full report with schema versioning
//! - **CSV**: trade tape and daily position history for external tools
//!
//! Persisted reports carry a `schema_version`; versions newer than this build
//! understands are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use quantlab_core::domain::{DailyPosition, Trade};

use crate::runner::{BacktestReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a `BacktestReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt_price(v: Option<f64>) -> String {
    v.map(|p| format!("{p:.6}")).unwrap_or_default()
}

/// Columns: entry_date, exit_date, side, entry_price, exit_price, size,
/// commission, stop_price, pnl. Open-trade fields are left empty.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_date",
        "exit_date",
        "side",
        "entry_price",
        "exit_price",
        "size",
        "commission",
        "stop_price",
        "pnl",
    ])?;

    for t in trades {
        wtr.write_record([
            t.entry_date.to_string(),
            t.exit_date.map(|d| d.to_string()).unwrap_or_default(),
            t.side.to_string(),
            format!("{:.6}", t.entry_price),
            opt_price(t.exit_price),
            t.size.to_string(),
            format!("{:.2}", t.commission),
            opt_price(t.stop_price),
            t.pnl.map(|p| format!("{p:.2}")).unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, position_size, cash, equity, drawdown.
pub fn export_daily_positions_csv(positions: &[DailyPosition]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "position_size", "cash", "equity", "drawdown"])?;
    for p in positions {
        wtr.write_record([
            p.date.to_string(),
            p.position_size.to_string(),
            format!("{:.2}", p.cash),
            format!("{:.2}", p.equity),
            format!("{:.6}", p.drawdown),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn run_dir_name(run_id: &str) -> String {
    format!("backtest_{run_id}")
}

/// Save the artifact set for one run.
///
/// Creates `backtest_{run_id}/` under `output_dir` containing:
/// - `backtest_{run_id}.json`: the full report
/// - `trades.csv`
/// - `daily_positions.csv`
///
/// Returns the created directory. Saving the same run again overwrites it.
pub fn save_artifacts(output_dir: &Path, report: &BacktestReport) -> Result<PathBuf> {
    let name = run_dir_name(&report.run_id);
    let run_dir = output_dir.join(&name);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json_path = run_dir.join(format!("{name}.json"));
    std::fs::write(&json_path, export_json(report)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    let trades_path = run_dir.join("trades.csv");
    std::fs::write(&trades_path, export_trades_csv(&report.trades)?)
        .with_context(|| format!("failed to write {}", trades_path.display()))?;

    let positions_path = run_dir.join("daily_positions.csv");
    std::fs::write(
        &positions_path,
        export_daily_positions_csv(&report.daily_positions)?,
    )
    .with_context(|| format!("failed to write {}", positions_path.display()))?;

    info!(run_id = %report.run_id, dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load the report from a directory written by [`save_artifacts`].
pub fn load_artifacts(run_dir: &Path) -> Result<BacktestReport> {
    let Some(name) = run_dir.file_name().and_then(|n| n.to_str()) else {
        bail!("not an artifact directory: {}", run_dir.display());
    };
    let json_path = run_dir.join(format!("{name}.json"));
    let json = std::fs::read_to_string(&json_path)
        .with_context(|| format!("failed to read {}", json_path.display()))?;
    import_json(&json)
}
