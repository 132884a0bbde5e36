//! rvscreen CLI: screen, fetch, and universe commands.
//!
//! Commands:
//! - `screen`: fetch the universe, rank it, and print (or export) the result table
//! - `fetch`: fetch only, and report which symbols succeeded
//! - `universe`: validate a universe file and list its tickers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rvscreen_core::data::{
    CircuitBreaker, FixtureProvider, FundamentalsProvider, StderrProgress, Universe, YahooProvider,
};
use rvscreen_core::{AllocationMode, ScoreOrder};
use rvscreen_runner::export::{render_markdown, save_csv, save_json};
use rvscreen_runner::{
    fetch_universe, run_screen, FetchCache, FetchOptions, ScreenConfig, ScreenResult,
};

#[derive(Parser)]
#[command(
    name = "rvscreen",
    about = "Robust value screen: rank a stock universe by valuation and size an equal-weight portfolio"
)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the fundamentals come from, and how to fetch them.
#[derive(clap::Args)]
struct SourceArgs {
    /// Universe CSV with a `Ticker` column.
    #[arg(long, default_value = "sp_500_stocks.csv")]
    universe: PathBuf,

    /// TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read fundamentals from a JSON fixture file instead of Yahoo Finance.
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Concurrent fetch tasks (overrides config).
    #[arg(long)]
    pool_size: Option<usize>,

    /// Per-symbol fetch timeout in seconds (overrides config).
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Hide per-symbol fetch progress on stderr.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the universe and recommend share counts.
    Screen {
        #[command(flatten)]
        source: SourceArgs,

        /// Portfolio value to allocate. Repeat to size several portfolios from one fetch.
        /// Omit for a preview of the full ranking.
        #[arg(long)]
        capital: Vec<f64>,

        /// Number of names to hold (overrides config).
        #[arg(long)]
        top_n: Option<usize>,

        /// Sort lowest score first.
        #[arg(long, default_value_t = false)]
        lowest_first: bool,

        /// Write the result table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the full result as JSON.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write a Markdown report.
        #[arg(long)]
        markdown: Option<PathBuf>,
    },
    /// Fetch fundamentals only and report successes and failures.
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// Exit non-zero if any symbol failed.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Validate a universe file and list its tickers.
    Universe {
        /// Universe CSV with a `Ticker` column.
        #[arg(default_value = "sp_500_stocks.csv")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Screen {
            source,
            capital,
            top_n,
            lowest_first,
            csv,
            json,
            markdown,
        } => run_screen_cmd(
            &source,
            &capital,
            top_n,
            lowest_first,
            Outputs {
                csv,
                json,
                markdown,
            },
        ),
        Commands::Fetch { source, strict } => run_fetch_cmd(&source, strict),
        Commands::Universe { path } => run_universe_cmd(&path),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn load_config(source: &SourceArgs) -> Result<ScreenConfig> {
    let mut config = match &source.config {
        Some(path) => ScreenConfig::from_file(path)?,
        None => ScreenConfig::default(),
    };
    if let Some(n) = source.pool_size {
        config.fetch.pool_size = n;
    }
    if let Some(secs) = source.timeout_secs {
        config.fetch.task_timeout_secs = secs;
    }
    Ok(config)
}

fn build_provider(source: &SourceArgs, config: &ScreenConfig) -> Result<Arc<dyn FundamentalsProvider>> {
    if let Some(path) = &source.fixtures {
        let fixtures = FixtureProvider::from_file(path)?;
        tracing::info!(path = %path.display(), symbols = fixtures.len(), "using fixture provider");
        return Ok(Arc::new(fixtures));
    }
    let breaker = Arc::new(CircuitBreaker::new(
        config.fetch.breaker_cooldown(),
        config.fetch.breaker_threshold,
    ));
    Ok(Arc::new(YahooProvider::new(breaker, config.fetch.task_timeout())?))
}

fn load_universe(path: &Path) -> Result<Universe> {
    let universe = Universe::from_file(path)
        .with_context(|| format!("failed to load universe from {}", path.display()))?;
    tracing::info!(path = %path.display(), tickers = universe.ticker_count(), "universe loaded");
    Ok(universe)
}

struct Outputs {
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
    markdown: Option<PathBuf>,
}

fn run_screen_cmd(
    source: &SourceArgs,
    capitals: &[f64],
    top_n: Option<usize>,
    lowest_first: bool,
    outputs: Outputs,
) -> Result<()> {
    let mut config = load_config(source)?;
    if let Some(n) = top_n {
        config.portfolio.top_n = n;
    }
    if lowest_first {
        config.portfolio.order = ScoreOrder::LowestFirst;
    }
    config.validate()?;

    let universe = load_universe(&source.universe)?;
    let provider = build_provider(source, &config)?;
    let cache = FetchCache::from_config(&config.cache);
    let progress = StderrProgress;
    let progress_ref: Option<&dyn rvscreen_core::data::FetchProgress> =
        if source.quiet { None } else { Some(&progress) };

    // No capital means a single preview run.
    let runs: Vec<Option<f64>> = if capitals.is_empty() {
        vec![None]
    } else {
        capitals.iter().copied().map(Some).collect()
    };
    let several = runs.len() > 1;

    for capital in runs {
        let result = run_screen(
            &universe,
            Arc::clone(&provider),
            &config,
            capital,
            &cache,
            progress_ref,
        )?;
        print_result(&result);

        let suffix = capital.filter(|_| several);
        if let Some(path) = &outputs.csv {
            match save_csv(&result.rows, &per_run_path(path, suffix))? {
                Some(written) => println!("CSV written to: {}", written.display()),
                None => println!("Nothing to export, CSV not written"),
            }
        }
        if let Some(path) = &outputs.json {
            let path = per_run_path(path, suffix);
            save_json(&result, &path)?;
            println!("JSON written to: {}", path.display());
        }
        if let Some(path) = &outputs.markdown {
            let path = per_run_path(path, suffix);
            std::fs::write(&path, render_markdown(&result))
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to: {}", path.display());
        }
    }

    Ok(())
}

/// `out.csv` becomes `out_25000.csv` when several capital amounts share one flag.
fn per_run_path(path: &Path, capital: Option<f64>) -> PathBuf {
    let Some(capital) = capital else {
        return path.to_path_buf();
    };
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("rvscreen");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{capital}.{ext}"),
        None => format!("{stem}_{capital}"),
    };
    path.with_file_name(name)
}

fn run_fetch_cmd(source: &SourceArgs, strict: bool) -> Result<()> {
    let config = load_config(source)?;
    config.validate()?;
    let universe = load_universe(&source.universe)?;
    let provider = build_provider(source, &config)?;
    let progress = StderrProgress;
    let progress_ref: Option<&dyn rvscreen_core::data::FetchProgress> =
        if source.quiet { None } else { Some(&progress) };

    let report = fetch_universe(&universe, provider, &FetchOptions::from(&config.fetch), progress_ref)?;

    println!();
    println!("=== Fetch Summary ===");
    println!("Provider:    {}", report.provider);
    println!("Requested:   {}", report.requested);
    println!("Succeeded:   {}", report.succeeded());
    println!("Failed:      {}", report.failed());
    println!("Elapsed:     {:.1}s", report.elapsed.as_secs_f64());
    for (symbol, err) in &report.failures {
        println!("  {symbol}: {err}");
    }

    if strict && !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_universe_cmd(path: &Path) -> Result<()> {
    let universe = load_universe(path)?;
    println!("{} tickers in {}", universe.ticker_count(), path.display());
    for chunk in universe.tickers().chunks(10) {
        println!("  {}", chunk.join(" "));
    }
    Ok(())
}

fn print_result(result: &ScreenResult) {
    println!();
    match result.mode {
        AllocationMode::Preview => println!("=== Robust Value Ranking (preview) ==="),
        AllocationMode::EqualWeight {
            capital,
            position_size,
        } => {
            println!("=== Robust Value Portfolio ===");
            println!("Capital:       ${capital:.2}");
            println!("Position size: ${position_size:.2}");
            println!("Invested:      ${:.2}", result.invested);
        }
    }
    println!(
        "Universe:      {} ({} fetched, {} failed, {} ranked){}",
        result.universe_size,
        result.fetched,
        result.failed_symbols.len(),
        result.rank_summary.ranked_rows,
        if result.cache_hit { " [cached]" } else { "" }
    );
    println!();
    println!(
        "{:<4} {:<8} {:>10} {:>8} {:>8} {:>8} {:>8} {:>10} {:>8} {:>8}",
        "#", "Ticker", "Price", "Shares", "PE%", "PB%", "PS%", "EV/EBITDA%", "EV/GP%", "Score"
    );
    for (i, row) in result.rows.iter().enumerate() {
        let s = &row.scored;
        let price = s.price.map(|p| format!("{p:.2}")).unwrap_or_else(|| "-".into());
        let shares = row
            .shares_to_buy
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<4} {:<8} {:>10} {:>8} {:>8.3} {:>8.3} {:>8.3} {:>10.3} {:>8.3} {:>8.4}",
            i + 1,
            s.symbol,
            price,
            shares,
            s.percentiles.pe,
            s.percentiles.price_to_book,
            s.percentiles.price_to_sales,
            s.percentiles.ev_to_ebitda,
            s.percentiles.ev_to_gross_profit,
            s.score
        );
    }
}
