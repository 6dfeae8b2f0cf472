//! DcaLab CLI: download, run, asset and cache commands.
//!
//! Commands:
//! - `download`: fetch daily closes from Yahoo Finance and cache them as Parquet
//! - `run`: execute a DCA backtest from a TOML config or command-line allocation
//! - `init`: write a starter config file
//! - `assets`: list known tickers and their display names
//! - `cache status`: report cached symbols and date ranges

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use dcalab_core::catalog::AssetCatalog;
use dcalab_core::data::{
    download_symbols, CircuitBreaker, CsvProvider, DownloadProgress, ParquetCache, PriceField,
    PriceProvider, StdoutProgress, YahooProvider,
};
use dcalab_core::ContributionSchedule;
use dcalab_runner::{run_dca, save_artifacts, DcaConfig, DcaReport, LoadOptions};

#[derive(Parser)]
#[command(name = "dcalab", about = "DcaLab CLI: dollar-cost averaging backtests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily closes from Yahoo Finance and cache as Parquet.
    Download {
        /// Symbols to download (e.g., BTC-USD XMR-USD SOL-USD).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 2021-01-01.
        #[arg(long)]
        start: Option<String>,

        /// End date, exclusive (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Run a DCA backtest.
    ///
    /// Without --config or --assets, runs the default BTC/XMR/SOL basket.
    Run {
        /// Path to a TOML config file.
        #[arg(long, conflicts_with = "assets")]
        config: Option<PathBuf>,

        /// Allocation in percent, e.g. "BTC-USD=35,XMR-USD=35,SOL-USD=30".
        #[arg(long)]
        assets: Option<String>,

        /// Start date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        start: Option<String>,

        /// End date, exclusive (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        end: Option<String>,

        /// Initial lump sum. Overrides the config.
        #[arg(long)]
        initial: Option<f64>,

        /// Recurring contribution per scheduled date. Overrides the config.
        #[arg(long)]
        contribution: Option<f64>,

        /// Contribution schedule. Overrides the config.
        #[arg(long, value_enum)]
        schedule: Option<ScheduleArg>,

        /// Price column to trade on. Overrides the config.
        #[arg(long, value_enum)]
        price_field: Option<PriceFieldArg>,

        /// Rescale weights by their sum instead of requiring 100%.
        #[arg(long, default_value_t = false)]
        normalize: bool,

        /// Read prices from `{SYMBOL}.csv` files in this directory instead of Yahoo.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Offline mode: no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic data as fallback.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-fetch even if the cache covers the window.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Asset catalog TOML for display names.
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Write the default config to a TOML file.
    Init {
        /// Destination path.
        #[arg(default_value = "dca.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// List known assets.
    Assets {
        /// Asset catalog TOML. Defaults to the built-in crypto catalog.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, date ranges and row counts.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScheduleArg {
    Monthly,
    Never,
}

impl From<ScheduleArg> for ContributionSchedule {
    fn from(arg: ScheduleArg) -> Self {
        match arg {
            ScheduleArg::Monthly => ContributionSchedule::Monthly,
            ScheduleArg::Never => ContributionSchedule::Never,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PriceFieldArg {
    Close,
    AdjClose,
}

impl From<PriceFieldArg> for PriceField {
    fn from(arg: PriceFieldArg) -> Self {
        match arg {
            PriceFieldArg::Close => PriceField::Close,
            PriceFieldArg::AdjClose => PriceField::AdjClose,
        }
    }
}

/// Run-level overrides applied on top of the loaded config.
struct Overrides {
    start: Option<String>,
    end: Option<String>,
    initial: Option<f64>,
    contribution: Option<f64>,
    schedule: Option<ScheduleArg>,
    price_field: Option<PriceFieldArg>,
    normalize: bool,
}

/// Input and output locations for a run.
struct Sources {
    csv_dir: Option<PathBuf>,
    cache_dir: PathBuf,
    output_dir: PathBuf,
    catalog: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            symbols,
            start,
            end,
            force,
            cache_dir,
        } => run_download(symbols, start, end, force, cache_dir),
        Commands::Run {
            config,
            assets,
            start,
            end,
            initial,
            contribution,
            schedule,
            price_field,
            normalize,
            csv_dir,
            offline,
            synthetic,
            force,
            catalog,
            cache_dir,
            output_dir,
        } => {
            let overrides = Overrides {
                start,
                end,
                initial,
                contribution,
                schedule,
                price_field,
                normalize,
            };
            let sources = Sources {
                csv_dir,
                cache_dir,
                output_dir,
                catalog,
            };
            let opts = LoadOptions {
                offline,
                synthetic,
                force,
            };
            run_backtest_cmd(config, assets, overrides, sources, opts)
        }
        Commands::Init { path, force } => run_init(&path, force),
        Commands::Assets { catalog } => run_assets(catalog.as_deref()),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_download(
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let start_date = match start.as_deref() {
        Some(s) => parse_date(s)?,
        None => DcaConfig::default_crypto().simulation.start,
    };
    let end_date = match end.as_deref() {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };
    if start_date >= end_date {
        bail!("start date {start_date} must be before end date {end_date}");
    }

    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(circuit_breaker)?;
    let cache = ParquetCache::new(cache_dir);

    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    let summary = download_symbols(
        &provider,
        &cache,
        &sym_refs,
        start_date,
        end_date,
        force,
        &StdoutProgress,
    );

    for sym in &summary.empty {
        println!("No data in window: {sym}");
    }
    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    assets: Option<String>,
    overrides: Overrides,
    sources: Sources,
    opts: LoadOptions,
) -> Result<()> {
    let mut config = match (config_path, assets) {
        (Some(path), _) => DcaConfig::from_file(&path)?,
        (None, Some(alloc)) => {
            let mut config = DcaConfig::default_crypto();
            config.allocation = parse_allocation(&alloc)?;
            config
        }
        (None, None) => DcaConfig::default_crypto(),
    };
    apply_overrides(&mut config, overrides)?;

    let catalog = load_catalog(sources.catalog.as_deref())?;
    let cache = ParquetCache::new(&sources.cache_dir);

    let yahoo;
    let csv;
    let provider: Option<&dyn PriceProvider> = match &sources.csv_dir {
        Some(dir) => {
            csv = CsvProvider::new(dir);
            Some(&csv)
        }
        None if opts.offline => None,
        None => {
            yahoo = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
            Some(&yahoo)
        }
    };
    info!(
        run_id = %config.run_id(),
        assets = ?config.assets(),
        offline = opts.offline,
        "starting DCA run"
    );
    let progress = StdoutProgress;
    let progress_ref = provider.map(|_| &progress as &dyn DownloadProgress);

    let report = run_dca(&config, &cache, provider, progress_ref, &opts)?;

    print_summary(&report, &catalog);

    let run_dir = save_artifacts(&report, &sources.output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

/// Parse `"BTC-USD=35,XMR-USD=35,SOL-USD=30"` into percent weights.
fn parse_allocation(input: &str) -> Result<BTreeMap<String, f64>> {
    let mut allocation = BTreeMap::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (ticker, pct) = part
            .split_once('=')
            .ok_or_else(|| anyhow!("expected TICKER=PERCENT, got '{part}'"))?;
        let pct: f64 = pct
            .trim()
            .parse()
            .with_context(|| format!("invalid percentage for {ticker}: '{pct}'"))?;
        if allocation.insert(ticker.trim().to_string(), pct).is_some() {
            bail!("asset '{}' listed twice", ticker.trim());
        }
    }
    if allocation.is_empty() {
        bail!("--assets is empty");
    }
    Ok(allocation)
}

fn apply_overrides(config: &mut DcaConfig, o: Overrides) -> Result<()> {
    let sim = &mut config.simulation;
    if let Some(s) = o.start.as_deref() {
        sim.start = parse_date(s)?;
    }
    if let Some(s) = o.end.as_deref() {
        sim.end = parse_date(s)?;
    }
    if let Some(v) = o.initial {
        sim.initial_capital = v;
    }
    if let Some(v) = o.contribution {
        sim.recurring_contribution = v;
    }
    if let Some(s) = o.schedule {
        sim.schedule = s.into();
    }
    if let Some(f) = o.price_field {
        sim.price_field = f.into();
    }
    if o.normalize {
        sim.normalize_weights = true;
    }
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<AssetCatalog> {
    match path {
        Some(p) => AssetCatalog::from_file(p).map_err(|e| anyhow!(e)),
        None => Ok(AssetCatalog::default_crypto()),
    }
}

fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let toml = DcaConfig::default_crypto().to_toml()?;
    std::fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_assets(catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;
    if catalog.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }
    println!("{:<12} Name", "Ticker");
    println!("{}", "-".repeat(30));
    for ticker in catalog.tickers() {
        println!("{:<12} {}", ticker, catalog.display_name(ticker));
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let symbols = cache.symbols();
    if symbols.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    let total_size: u64 = symbols
        .iter()
        .map(|s| dir_size(&cache_dir.join(format!("symbol={s}"))))
        .sum();

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", symbols.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<10} {:<25} {:>8}", "Symbol", "Date Range", "Rows");
    println!("{}", "-".repeat(45));
    for status in cache.status(&sym_refs) {
        let range = match (status.start_date, status.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "(no meta)".into(),
        };
        let rows = status
            .row_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!("{:<10} {:<25} {:>8}", status.symbol, range, rows);
    }

    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_summary(report: &DcaReport, catalog: &AssetCatalog) {
    let s = &report.summary;
    let sim = &report.config.simulation;
    println!();
    println!("=== DCA Backtest ===");
    if let (Some(start), Some(end)) = (s.start_date, s.end_date) {
        println!("Period:         {start} to {end}");
    }
    println!("Trading Days:   {}", s.trading_days);
    println!(
        "Schedule:       {} x {:.2} ({} contributions)",
        sim.schedule.label(),
        sim.recurring_contribution,
        s.contribution_count
    );
    println!();
    println!("--- Result ---");
    println!("Invested:       {:.2}", s.total_invested);
    println!("Final Value:    {:.2}", s.final_value);
    println!("Profit:         {:.2}", s.profit);
    println!("Total Return:   {:.2}%", s.total_return * 100.0);
    println!();
    println!("--- Assets ---");
    for a in &s.assets {
        println!(
            "{:<12} {:>6.1}%  value {:>14.2}  return {:>8.2}%",
            catalog.display_name(&a.asset),
            a.weight * 100.0,
            a.final_value,
            a.total_return * 100.0
        );
    }
    if !report.omitted.is_empty() {
        println!();
        println!("Omitted (no data): {}", report.omitted.join(", "));
    }
    if report.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
