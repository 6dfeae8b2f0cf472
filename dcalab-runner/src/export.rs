//! Artifact export: JSON manifest, CSV series and a Markdown summary.
//!
//! - **JSON**: full round-trip of the `DcaReport` with schema versioning
//! - **CSV**: portfolio series and per-asset series for plotting tools
//! - **Markdown**: human-readable run summary
//!
//! The manifest carries a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dcalab_core::SimulationResult;

use crate::runner::{DcaReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &DcaReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize DcaReport to JSON")
}

/// Deserialize a `DcaReport`, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<DcaReport> {
    let report: DcaReport =
        serde_json::from_str(json).context("failed to deserialize DcaReport from JSON")?;
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

/// Columns: date, portfolio_value, invested
pub fn export_portfolio_csv(result: &SimulationResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "portfolio_value", "invested"])?;
    for ((date, value), invested) in result
        .portfolio_value
        .iter()
        .zip(result.invested.values())
    {
        wtr.write_record([
            &date.to_string(),
            &format!("{value:.2}"),
            &format!("{invested:.2}"),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Long format, one row per (date, asset). Columns: date, asset, value, return
pub fn export_assets_csv(result: &SimulationResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "asset", "value", "return"])?;
    for ((date, values), returns) in result
        .per_asset_value
        .iter()
        .zip(result.per_asset_return.values())
    {
        for (asset, value) in values {
            let ret = returns.get(asset).copied().unwrap_or(0.0);
            wtr.write_record([
                &date.to_string(),
                asset,
                &format!("{value:.2}"),
                &format!("{ret:.6}"),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(report: &DcaReport) -> String {
    let s = &report.summary;
    let sim = &report.config.simulation;
    let mut md = String::with_capacity(1024);

    md.push_str("# DCA Backtest Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", id_prefix(&report.run_id, 12)));
    if let (Some(start), Some(end)) = (s.start_date, s.end_date) {
        md.push_str(&format!("| Period | {start} to {end} |\n"));
    }
    md.push_str(&format!("| Trading Days | {} |\n", s.trading_days));
    md.push_str(&format!("| Initial Capital | {:.2} |\n", sim.initial_capital));
    md.push_str(&format!(
        "| Contribution | {:.2} ({}) |\n",
        sim.recurring_contribution,
        sim.schedule.label()
    ));
    md.push_str(&format!("| Contributions Made | {} |\n", s.contribution_count));
    md.push_str(&format!("| Dataset Hash | {} |\n", report.dataset_hash));
    if report.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    if !report.omitted.is_empty() {
        md.push_str(&format!("| Omitted (no data) | {} |\n", report.omitted.join(", ")));
    }
    md.push('\n');

    md.push_str("## Result\n\n");
    md.push_str("| Invested | Final Value | Profit | Return |\n");
    md.push_str("| ---: | ---: | ---: | ---: |\n");
    md.push_str(&format!(
        "| {:.2} | {:.2} | {:.2} | {:.2}% |\n\n",
        s.total_invested,
        s.final_value,
        s.profit,
        s.total_return * 100.0
    ));

    md.push_str("## Assets\n\n");
    md.push_str("| Asset | Weight | Units | Invested | Value | Return |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: | ---: |\n");
    for a in &s.assets {
        md.push_str(&format!(
            "| {} | {:.1}% | {:.6} | {:.2} | {:.2} | {:.2}% |\n",
            a.asset,
            a.weight * 100.0,
            a.units,
            a.invested,
            a.final_value,
            a.total_return * 100.0
        ));
    }

    md
}

/// First `n` characters of a run id. Imported manifests may carry any text.
fn id_prefix(run_id: &str, n: usize) -> String {
    run_id.chars().take(n).collect()
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one run.
///
/// Creates `dca_{run_id prefix}_{timestamp}/` under `output_dir` containing
/// `manifest.json`, `portfolio.csv`, `assets.csv` and `report.md`.
/// Returns the created directory.
pub fn save_artifacts(report: &DcaReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "dca_{}_{}",
        id_prefix(&report.run_id, 8)
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect::<String>(),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(report)?)?;
    std::fs::write(
        run_dir.join("portfolio.csv"),
        export_portfolio_csv(&report.result)?,
    )?;
    std::fs::write(run_dir.join("assets.csv"), export_assets_csv(&report.result)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(report))?;

    Ok(run_dir)
}

/// Load a `DcaReport` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<DcaReport> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}
