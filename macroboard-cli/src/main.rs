//! Macroboard CLI: refresh, view, export and an interactive loop.
//!
//! Commands:
//! - `show`: fetch everything and print the dashboard for one period
//! - `export`: write the selected view as CSV, Parquet or JSON
//! - `catalog`: list the configured tickers
//! - `interactive`: keep one snapshot and switch periods without refetching

mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use macroboard_core::{
    Dashboard, DashboardConfig, ExportFormat, Period, ProviderKind, Selection, Severity, Snapshot,
};

#[derive(Parser)]
#[command(
    name = "macroboard",
    version,
    about = "Macroboard: global macro and Korean market dashboard in the terminal"
)]
struct Cli {
    /// TOML config file (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all providers and print the dashboard.
    Show {
        /// 1m, 3m, 6m, ytd, 1y, 3y, 10y or all.
        #[arg(long, default_value = "all")]
        period: Period,

        /// Comma-separated series for the z-score comparison. Defaults to all.
        #[arg(long, value_delimiter = ',')]
        compare: Option<Vec<String>>,

        /// Rows of raw data to print after the charts.
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
    /// Write the selected view to a file.
    Export {
        /// Output file.
        #[arg(long, short)]
        output: PathBuf,

        /// csv, parquet or json. Guessed from the extension when omitted.
        #[arg(long)]
        format: Option<ExportFormat>,

        #[arg(long, default_value = "all")]
        period: Period,

        #[arg(long, value_delimiter = ',')]
        compare: Option<Vec<String>>,
    },
    /// List the configured tickers.
    Catalog {
        /// Print as TOML, ready to paste into a config file.
        #[arg(long, default_value_t = false)]
        toml: bool,
    },
    /// Fetch once, then read commands from stdin.
    Interactive {
        #[arg(long, default_value = "all")]
        period: Period,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = DashboardConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(
        history_start = %config.history_start,
        cache_ttl_secs = config.cache_ttl_secs,
        fred_key = config.fred_api_key.is_some(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Show {
            period,
            compare,
            tail,
        } => run_show(&config, selection(period, compare), tail),
        Commands::Export {
            output,
            format,
            period,
            compare,
        } => run_export(&config, &output, format, selection(period, compare)),
        Commands::Catalog { toml } => run_catalog(&config, toml),
        Commands::Interactive { period } => run_interactive(&config, period),
    }
}

fn selection(period: Period, compare: Option<Vec<String>>) -> Selection {
    let sel = Selection::new(period);
    match compare {
        Some(cols) => sel.with_compare(cols),
        None => sel,
    }
}

fn refresh(dashboard: &mut Dashboard) -> Result<Snapshot> {
    dashboard.refresh().context(
        "no data could be loaded; check the network connection, tickers and FRED_API_KEY",
    )
}

fn run_show(config: &DashboardConfig, sel: Selection, tail: usize) -> Result<()> {
    let mut dashboard = Dashboard::from_config(config)?;
    let snapshot = refresh(&mut dashboard)?;
    print_view(&snapshot, &sel, tail)
}

fn print_view(snapshot: &Snapshot, sel: &Selection, tail: usize) -> Result<()> {
    let view = Dashboard::view(snapshot, sel).context("cannot build the selected view")?;

    println!("{}", render::render_snapshot_header(snapshot));
    let refresh_notes = render::render_diagnostics(&snapshot.diagnostics, Severity::Warning);
    if !refresh_notes.is_empty() {
        print!("{refresh_notes}");
    }
    println!();
    print!("{}", render::render_view(&view));
    if tail > 0 && !view.is_empty() {
        println!();
        print!("{}", render::render_tail(&view, tail));
    }
    Ok(())
}

fn run_export(
    config: &DashboardConfig,
    output: &Path,
    format: Option<ExportFormat>,
    sel: Selection,
) -> Result<()> {
    let format = match format.or_else(|| ExportFormat::from_path(output)) {
        Some(f) => f,
        None => bail!(
            "cannot tell the format of '{}'; pass --format csv|parquet|json",
            output.display()
        ),
    };

    let mut dashboard = Dashboard::from_config(config)?;
    let snapshot = refresh(&mut dashboard)?;
    let view = Dashboard::view(&snapshot, &sel).context("cannot build the selected view")?;

    macroboard_core::export::export_view(&view, output, format)
        .with_context(|| format!("failed to export to {}", output.display()))?;
    println!(
        "Exported {} rows x {} series ({}) to {}",
        view.prices.len(),
        view.prices.width(),
        format,
        output.display()
    );
    Ok(())
}

fn run_catalog(config: &DashboardConfig, as_toml: bool) -> Result<()> {
    let catalog = config.catalog()?;
    if as_toml {
        print!("{}", catalog.to_toml()?);
        return Ok(());
    }
    for kind in ProviderKind::ALL {
        let tickers = catalog.for_provider(kind);
        if tickers.is_empty() {
            continue;
        }
        println!("{kind}:");
        for t in tickers {
            println!("  {:<22} {}", t.name, t.symbol);
        }
    }
    println!("{} series", catalog.len());
    Ok(())
}

const INTERACTIVE_HELP: &str = "\
commands:
  <period>          1m 3m 6m ytd 1y 3y 10y all
  compare A,B,...   z-score only these series
  compare           z-score every series
  refresh           fetch again (served from cache while fresh)
  clear             drop cached responses, then refresh
  help              this text
  quit              exit";

fn run_interactive(config: &DashboardConfig, period: Period) -> Result<()> {
    let mut dashboard = Dashboard::from_config(config)?;
    let mut snapshot = refresh(&mut dashboard)?;
    let mut sel = Selection::new(period);

    print_view(&snapshot, &sel, 0)?;
    println!("\n{INTERACTIVE_HELP}");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("macroboard> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        let (cmd, arg) = input.split_once(' ').unwrap_or((input, ""));

        match cmd {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "help" | "?" => {
                println!("{INTERACTIVE_HELP}");
                continue;
            }
            "refresh" | "clear" => {
                if cmd == "clear" {
                    dashboard.clear_cache();
                }
                match dashboard.refresh() {
                    Ok(s) => snapshot = s,
                    Err(e) => {
                        eprintln!("refresh failed, keeping the previous data: {e}");
                        continue;
                    }
                }
            }
            "compare" => {
                let cols: Vec<String> = arg
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                sel.compare = (!cols.is_empty()).then_some(cols);
            }
            token => match token.parse::<Period>() {
                Ok(p) => sel.period = p,
                Err(e) => {
                    eprintln!("{e}");
                    continue;
                }
            },
        }

        if let Err(e) = print_view(&snapshot, &sel, 0) {
            eprintln!("{e:#}");
        }
    }
    Ok(())
}
