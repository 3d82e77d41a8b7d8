//! Albany CLI binary.
//!
//! Provides the command-line interface for ingestion, allocation editing and
//! the portfolio analyses.

use albany::analysis;
use albany::analytics::rebalance::{BALANCE_TOLERANCE, unbalanced_portfolios};
use albany::analytics::{AssetAllocation, FactorKey, Month, MonthRange, ReturnTables, RollingCorrelation};
use albany::data::{DataError, YahooQuoteProvider};
use albany::ingest::{
    IngestReport, ingest_all, ingest_macroeconomic_data, ingest_ticker_data,
    rebalance_asset_weights, update_portfolio_and_weights,
};
use albany::output::{
    AllocationView, AttributionReport, ExportFormat, Exporter, PricePivot, Report, ReportBuilder,
    ReportError, correlation_summary_table,
};
use albany::{AlbanyConfig, SqliteStore};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "albany")]
#[command(about = "Albany: portfolio returns and macroeconomic factor attribution", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Aligned text tables
    Text,
    /// JSON report envelope
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Recreate the database from scratch
    Init,

    /// Fetch prices and indicators, then maintain portfolios
    Ingest {
        /// Tickers to fetch (defaults to the configured list)
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,

        /// Only fetch market prices
        #[arg(long, conflicts_with = "macro_only")]
        prices_only: bool,

        /// Only load the indicator archive
        #[arg(long)]
        macro_only: bool,
    },

    /// Show row counts and unbalanced portfolios
    Status,

    /// Show the allocation table
    Allocations {
        /// Only this portfolio
        #[arg(long)]
        portfolio: Option<String>,

        /// Write the table to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Set the weight of an asset in a portfolio (does not rebalance)
    Allocate {
        /// Portfolio id
        portfolio: String,
        /// Asset ticker
        asset: String,
        /// Non-negative weight
        weight: f64,
    },

    /// Remove an asset from a portfolio (does not rebalance)
    Unallocate {
        /// Portfolio id
        portfolio: String,
        /// Asset ticker
        asset: String,
    },

    /// Normalize weights so each portfolio sums to one
    Rebalance,

    /// Monthly prices, one column per asset
    Prices {
        /// Only this asset
        #[arg(long)]
        asset: Option<String>,

        /// Write the pivot to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Weighted and portfolio returns
    Returns {
        /// Portfolio id (defaults to the configured portfolio)
        #[arg(long)]
        portfolio: Option<String>,

        /// Show the per-asset weighted table
        #[arg(long)]
        weighted: bool,

        /// Write the table to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write a JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored factor series
    Factors,

    /// Rolling correlation between portfolio returns and a factor
    Correlate {
        /// Factor (indicator) id
        #[arg(required_unless_present = "all")]
        factor: Option<String>,

        /// Region (country) id
        #[arg(required_unless_present = "all")]
        region: Option<String>,

        /// Summarize against every stored factor
        #[arg(long, conflicts_with_all = ["factor", "region"])]
        all: bool,

        /// Portfolio id (defaults to the configured portfolio)
        #[arg(long)]
        portfolio: Option<String>,

        /// Trailing window in months (defaults to the configured window)
        #[arg(long)]
        window: Option<usize>,

        /// Write the series to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Attribute portfolio returns to macro factors
    Attribute {
        /// Portfolio id (defaults to the configured portfolio)
        #[arg(long)]
        portfolio: Option<String>,

        /// First month of the window (YYYY-MM)
        #[arg(long, requires = "end")]
        start: Option<Month>,

        /// Last month of the window (YYYY-MM)
        #[arg(long, requires = "start")]
        end: Option<Month>,

        /// Factors listed per direction
        #[arg(long)]
        top: Option<usize>,

        /// Print Markdown instead of a table
        #[arg(long)]
        markdown: bool,

        /// Write the coefficients to a .csv or .json file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write a JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("albany=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = AlbanyConfig::load_or_default(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    config.validate()?;

    match cli.command {
        Commands::Init => {
            SqliteStore::create(&config.database)?;
            println!("Created database at {}", config.database.display());
        }
        Commands::Ingest {
            tickers,
            prices_only,
            macro_only,
        } => {
            if !tickers.is_empty() {
                config.tickers = tickers;
            }
            ingest(&config, prices_only, macro_only).await?;
        }
        Commands::Status => status(&config)?,
        Commands::Allocations { portfolio, export } => {
            allocations(&config, portfolio.as_deref(), export.as_deref())?;
        }
        Commands::Allocate {
            portfolio,
            asset,
            weight,
        } => {
            let store = open_store(&config)?;
            let flagged = analysis::set_allocation(&store, &portfolio, &asset, weight)?;
            println!("Set {asset} in {portfolio} to {weight}");
            print_unbalanced(&flagged);
        }
        Commands::Unallocate { portfolio, asset } => {
            let store = open_store(&config)?;
            let flagged = analysis::remove_allocation(&store, &portfolio, &asset)?;
            println!("Removed {asset} from {portfolio}");
            print_unbalanced(&flagged);
        }
        Commands::Rebalance => {
            let store = open_store(&config)?;
            let rebalanced = rebalance_asset_weights(&store)?;
            let view = AllocationView::new(&rebalanced.allocations, BALANCE_TOLERANCE);
            println!("{}", view.to_ascii_table());
            for portfolio in &rebalanced.degenerate {
                println!("Warning: {portfolio} has zero total weight; weights left at zero");
            }
        }
        Commands::Prices { asset, export } => {
            let store = open_store(&config)?;
            let pivot = PricePivot::from_observations(&analysis::asset_prices(&store, asset.as_deref())?);
            match export {
                Some(path) => export_to(&pivot, &path)?,
                None => println!("{}", pivot.to_ascii_table()),
            }
        }
        Commands::Returns {
            portfolio,
            weighted,
            export,
            report,
            format,
        } => {
            let portfolio = portfolio.unwrap_or_else(|| config.portfolio_id.clone());
            let outputs = Outputs {
                export: export.as_deref(),
                report: report.as_deref(),
                format,
            };
            returns(&config, &portfolio, weighted, outputs)?;
        }
        Commands::Factors => factors(&config)?,
        Commands::Correlate {
            factor,
            region,
            all,
            portfolio,
            window,
            export,
            format,
        } => {
            let portfolio = portfolio.unwrap_or_else(|| config.portfolio_id.clone());
            let window = window.unwrap_or(config.correlation_window);
            let store = open_store(&config)?;
            if all {
                let results = analysis::correlate_all_factors(&store, &portfolio, window)?;
                match format {
                    OutputFormat::Text => println!("{}", correlation_summary_table(&portfolio, &results)),
                    OutputFormat::Json => {
                        let summary: Vec<_> = results
                            .iter()
                            .map(|(key, rolling)| serde_json::json!({ "factor": key, "summary": rolling.summary }))
                            .collect();
                        print_report("correlation", &portfolio, None, &summary)?;
                    }
                }
            } else if let (Some(factor), Some(region)) = (factor, region) {
                let key = FactorKey::new(factor, region);
                let rolling = analysis::factor_correlation(&store, &portfolio, &key, window)?;
                if let Some(path) = export {
                    export_to(&rolling, &path)?;
                }
                match format {
                    OutputFormat::Text => print_correlation(&portfolio, &key, &rolling),
                    OutputFormat::Json => print_report("correlation", &key.to_string(), None, &rolling)?,
                }
            }
        }
        Commands::Attribute {
            portfolio,
            start,
            end,
            top,
            markdown,
            export,
            report,
            format,
        } => {
            let portfolio = portfolio.unwrap_or_else(|| config.portfolio_id.clone());
            let window = match (start, end) {
                (Some(start), Some(end)) => MonthRange::new(start, end)?,
                _ => config.attribution_window,
            };
            let outputs = Outputs {
                export: export.as_deref(),
                report: report.as_deref(),
                format,
            };
            attribute(&config, &portfolio, window, top, markdown, outputs)?;
        }
    }

    Ok(())
}

fn open_store(config: &AlbanyConfig) -> Result<SqliteStore, Box<dyn Error>> {
    if let Some(parent) = config.database.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteStore::open(&config.database)?)
}

fn export_to<E: Exporter + ?Sized>(data: &E, path: &Path) -> Result<(), Box<dyn Error>> {
    let format = ExportFormat::from_path(path)?;
    data.export_to_file(path, format)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Where an analysis writes besides the terminal.
#[derive(Debug, Clone, Copy)]
struct Outputs<'a> {
    export: Option<&'a Path>,
    report: Option<&'a Path>,
    format: OutputFormat,
}

impl Outputs<'_> {
    /// Write the JSON report to the report file and print it when the
    /// format is JSON.
    fn emit_report<T: serde::Serialize + ?Sized>(
        &self,
        kind: &str,
        subject: &str,
        window: Option<MonthRange>,
        contents: &T,
    ) -> Result<(), Box<dyn Error>> {
        if self.report.is_none() && self.format == OutputFormat::Text {
            return Ok(());
        }
        let report = build_report(kind, subject, window, contents)?;
        if let Some(path) = self.report {
            report.write_to(path)?;
            println!("Wrote {}", path.display());
        }
        if self.format == OutputFormat::Json {
            println!("{}", report.to_json()?);
        }
        Ok(())
    }
}

fn build_report<T: serde::Serialize + ?Sized>(
    kind: &str,
    subject: &str,
    window: Option<MonthRange>,
    contents: &T,
) -> Result<Report, ReportError> {
    let mut builder = ReportBuilder::new().kind(kind).subject(subject);
    if let Some(window) = window {
        builder = builder.window(window);
    }
    builder.contents(contents)?.build()
}

fn print_report<T: serde::Serialize + ?Sized>(
    kind: &str,
    subject: &str,
    window: Option<MonthRange>,
    contents: &T,
) -> Result<(), Box<dyn Error>> {
    println!("{}", build_report(kind, subject, window, contents)?.to_json()?);
    Ok(())
}

fn print_unbalanced(flagged: &[(String, f64)]) {
    for (portfolio, sum) in flagged {
        println!("Unbalanced: {portfolio} weights sum to {sum:.4}; run `albany rebalance`");
    }
}

async fn ingest(config: &AlbanyConfig, prices_only: bool, macro_only: bool) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let provider = YahooQuoteProvider::with_rate_limit(Duration::from_millis(config.rate_limit_ms))?;

    let pb = ProgressBar::new(config.tickers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Fetching prices...");
    let on_ticker = |ticker: &str| {
        pb.inc(1);
        pb.set_message(ticker.to_string());
    };

    let report = if macro_only {
        pb.finish_and_clear();
        let mut report = ingest_macroeconomic_data(&store, config)?;
        report.portfolio = Some(update_portfolio_and_weights(&store, config)?);
        report
    } else if prices_only {
        let mut report = ingest_ticker_data(&store, &provider, config, on_ticker).await?;
        pb.finish_and_clear();
        report.portfolio = Some(update_portfolio_and_weights(&store, config)?);
        report
    } else {
        let report = ingest_all(&store, &provider, config, on_ticker).await?;
        pb.finish_and_clear();
        report
    };

    info!(database = %config.database.display(), "ingestion finished");
    print_ingest_report(&report);
    Ok(())
}

fn print_ingest_report(report: &IngestReport) {
    println!("\nIngestion Summary");
    println!("{}", "=".repeat(60));
    println!("{:<30} {:>12}", "Tickers fetched", report.tickers_fetched.len());
    println!("{:<30} {:>12}", "Tickers already stored", report.tickers_skipped.len());
    println!("{:<30} {:>12}", "Monthly prices added", report.price_rows);
    println!("{:<30} {:>12}", "Factors added", report.factors_added);
    println!("{:<30} {:>12}", "Regions", report.regions);
    println!("{:<30} {:>12}", "Factor observations added", report.factor_rows);
    println!("{:<30} {:>12}", "Series not interpolated", report.series_skipped.len());
    if let Some(update) = &report.portfolio {
        if update.created_default {
            println!("{:<30} {:>12}", "Default portfolio created", "yes");
        }
        for id in &update.registered {
            println!("{:<30} {:>12}", "Portfolio registered", id);
        }
        for id in &update.degenerate {
            println!("{:<30} {:>12}", "Zero-weight portfolio", id);
        }
    }
    println!("{}", "=".repeat(60));
    for failure in &report.failures {
        println!("Failed: {}", DataError::from(failure.clone()));
    }
}

fn status(config: &AlbanyConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let stats = store.stats()?;
    let allocations = store.read_table::<AssetAllocation>()?;

    println!("\nDatabase: {}", config.database.display());
    println!("{}", "=".repeat(60));
    for (label, count) in [
        ("Assets", stats.assets),
        ("Portfolios", stats.portfolios),
        ("Allocations", stats.allocations),
        ("Monthly prices", stats.prices),
        ("Factors", stats.factors),
        ("Regions", stats.regions),
        ("Factor observations", stats.factor_observations),
    ] {
        println!("{label:<30} {count:>12}");
    }
    println!("{}", "=".repeat(60));
    print_unbalanced(&unbalanced_portfolios(&allocations, BALANCE_TOLERANCE));
    Ok(())
}

fn allocations(config: &AlbanyConfig, portfolio: Option<&str>, export: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let mut rows = store.read_table::<AssetAllocation>()?;
    if let Some(portfolio) = portfolio {
        rows.retain(|a| a.portfolio_id == portfolio);
    }
    match export {
        Some(path) => export_to(rows.as_slice(), path)?,
        None => println!("{}", AllocationView::new(&rows, BALANCE_TOLERANCE).to_ascii_table()),
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, scale: f64, suffix: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}{suffix}", v * scale))
}

fn returns(
    config: &AlbanyConfig,
    portfolio: &str,
    weighted: bool,
    outputs: Outputs<'_>,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let tables: ReturnTables = analysis::portfolio_returns(&store, portfolio)?;

    if let Some(path) = outputs.export {
        if weighted {
            export_to(tables.weighted.as_slice(), path)?;
        } else {
            export_to(tables.portfolio.as_slice(), path)?;
        }
    }

    outputs.emit_report("returns", portfolio, None, &tables)?;
    match outputs.format {
        OutputFormat::Json => {}
        OutputFormat::Text if weighted => {
            println!("\nWeighted Returns: {portfolio}");
            println!("{}", "=".repeat(80));
            println!(
                "{:<12} {:<10} {:>8} {:>14} {:>14} {:>14}",
                "Asset", "Date", "Weight", "Weighted Px", "Pct Return", "W. Pct Ret"
            );
            println!("{}", "-".repeat(80));
            for r in &tables.weighted {
                println!(
                    "{:<12} {:<10} {:>8.4} {:>14} {:>14} {:>14}",
                    r.asset_id,
                    r.date.to_string(),
                    r.asset_weight,
                    fmt_opt(r.weighted_price, 1.0, ""),
                    fmt_opt(r.pct_return, 100.0, "%"),
                    fmt_opt(r.weighted_pct_return, 100.0, "%"),
                );
            }
            println!("{}", "=".repeat(80));
        }
        OutputFormat::Text => {
            println!("\nPortfolio Returns: {portfolio}");
            println!("{}", "=".repeat(60));
            println!("{:<10} {:>14} {:>14} {:>14}", "Date", "Price", "Pct Return", "Log Return");
            println!("{}", "-".repeat(60));
            for r in &tables.portfolio {
                println!(
                    "{:<10} {:>14} {:>14} {:>14}",
                    r.date.to_string(),
                    fmt_opt(r.price, 1.0, ""),
                    fmt_opt(r.pct_return, 100.0, "%"),
                    fmt_opt(r.log_return, 100.0, "%"),
                );
            }
            println!("{}", "=".repeat(60));
        }
    }
    Ok(())
}

fn factors(config: &AlbanyConfig) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let names = analysis::factor_names(&store)?;
    let keys = store.factor_keys()?;

    println!("\nStored Factor Series ({})", keys.len());
    println!("{}", "=".repeat(80));
    println!("{:<24} {:<8} {}", "Factor", "Region", "Name");
    println!("{}", "-".repeat(80));
    for key in &keys {
        let name = names.get(&key.factor_id).map_or("", String::as_str);
        println!("{:<24} {:<8} {}", key.factor_id, key.region_id, name);
    }
    println!("{}", "=".repeat(80));
    Ok(())
}

fn print_correlation(portfolio: &str, key: &FactorKey, rolling: &RollingCorrelation) {
    println!("\nRolling Correlation: {portfolio} vs {key} ({}-month window)", rolling.window);
    println!("{}", "=".repeat(40));
    println!("{:<10} {:>14}", "Date", "Correlation");
    println!("{}", "-".repeat(40));
    for point in &rolling.points {
        let value = point
            .correlation
            .map_or_else(|| "-".to_string(), |c| format!("{c:.4}"));
        println!("{:<10} {:>14}", point.date.to_string(), value);
    }
    println!("{}", "=".repeat(40));
    let summary = &rolling.summary;
    println!(
        "Mean: {}  Std Dev: {}  Observations: {}",
        summary.mean.map_or_else(|| "-".to_string(), |m| format!("{m:.4}")),
        summary.std_dev.map_or_else(|| "-".to_string(), |s| format!("{s:.4}")),
        summary.observations
    );
}

fn attribute(
    config: &AlbanyConfig,
    portfolio: &str,
    window: MonthRange,
    top: Option<usize>,
    markdown: bool,
    outputs: Outputs<'_>,
) -> Result<(), Box<dyn Error>> {
    let store = open_store(config)?;
    let attribution = analysis::factor_attribution(&store, config, portfolio, window)?;

    if let Some(path) = outputs.export {
        export_to(&attribution, path)?;
    }

    let mut report = AttributionReport::new(portfolio, attribution)
        .with_factor_names(analysis::factor_names(&store)?);
    if let Some(n) = top {
        report = report.with_top(n);
    }

    outputs.emit_report("attribution", portfolio, Some(window), &report.attribution)?;
    match outputs.format {
        OutputFormat::Json => {}
        OutputFormat::Text if markdown => println!("{}", report.to_markdown()),
        OutputFormat::Text => println!("{}", report.to_ascii_table()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_attribute_arguments() {
        let cli = Cli::try_parse_from([
            "albany",
            "--database",
            "scratch.db",
            "attribute",
            "--start",
            "2010-01",
            "--end",
            "2012-12",
            "--report",
            "attribution.json",
        ])
        .unwrap();

        assert_eq!(cli.database, Some(PathBuf::from("scratch.db")));
        match cli.command {
            Commands::Attribute {
                start, end, report, format, ..
            } => {
                assert_eq!(start.unwrap().to_string(), "2010-01");
                assert_eq!(end.unwrap().to_string(), "2012-12");
                assert_eq!(report, Some(PathBuf::from("attribution.json")));
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[rstest]
    #[case(&["albany", "attribute", "--start", "2010-01"])]
    #[case(&["albany", "attribute", "--start", "2010-13", "--end", "2012-12"])]
    #[case(&["albany", "correlate", "GDP"])]
    #[case(&["albany", "correlate", "GDP", "USA", "--all"])]
    fn test_rejected_arguments(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_report_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("returns.json");
        let outputs = Outputs {
            export: None,
            report: Some(path.as_path()),
            format: OutputFormat::Text,
        };
        let window = MonthRange::years(2010, 2012);
        outputs
            .emit_report("returns", "PF_01", Some(window), &vec![1.0, 2.0])
            .unwrap();

        let written: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.kind, "returns");
        assert_eq!(written.subject, "PF_01");
        assert_eq!(written.window.as_deref(), Some(window.to_string().as_str()));
        assert_eq!(written.contents, serde_json::json!([1.0, 2.0]));
    }

    #[test]
    fn test_text_output_skips_report() {
        let outputs = Outputs {
            export: None,
            report: None,
            format: OutputFormat::Text,
        };
        assert!(outputs.emit_report("returns", "PF_01", None, &()).is_ok());
    }
}
