//! Command line front end for the `harvester` library.
//!
//! ```text
//! harvester [-v...] [--config PATH] [--log-dir DIR] run [--total N | --fetch-all] [--no-pdfs]
//! harvester [--config PATH] query
//! harvester [--config PATH] check
//! ```
//!
//! Logs go to stderr (and optionally to a file under `--log-dir`); progress and summaries go to
//! stdout. The process exits with a non-zero status when the configuration is rejected, an
//! output location is unusable, or pagination halted on an error. In the last case everything
//! accepted before the error has already been written.

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use clap::{builder::ArgAction, Parser, Subcommand};
use console::{style, Emoji};
use errors::HarvesterCliError;
use harvester::{
  config::HarvestConfig,
  harvest::{HarvestSummary, Harvester},
  query::build_query,
};
use tracing::{debug, trace};
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod errors;

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "");
static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✨ ", "");
static FAILURE: Emoji<'_, '_> = Emoji("✖ ", "");

#[derive(Parser)]
#[command(author, version, about = "Discover arXiv papers by topic and download them")]
struct Cli {
  /// Verbose mode (-v, -vv, -vvv)
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Configuration file (YAML, or JSON with a `.json` extension)
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// Also write logs to files in this directory
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch metadata and PDFs as configured
  Run {
    /// Collect this many accepted papers, overriding the configuration
    #[arg(long, conflicts_with = "fetch_all")]
    total:     Option<usize>,
    /// Collect every matching paper, overriding the configuration
    #[arg(long)]
    fetch_all: bool,
    /// Only write metadata
    #[arg(long)]
    no_pdfs:   bool,
  },
  /// Print the search query sent to arXiv without contacting it
  Query,
  /// Validate the configuration and prepare the output locations
  Check,
}

/// Setup logging with the specified verbosity level
fn setup_logging(verbosity: u8, log_dir: Option<&Path>) -> Result<(), HarvesterCliError> {
  let filter = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_target(true);

  let file_layer = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)?;
      let file_appender = rolling::RollingFileAppender::builder()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("harvester")
        .filename_suffix("log")
        .build(dir)?;

      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(file_appender)
          .with_ansi(false)
          .with_thread_ids(true)
          .with_target(true)
          .with_file(true)
          .with_line_number(true),
      )
    },
    None => None,
  };

  tracing_subscriber::registry().with(filter).with(stderr_layer).with(file_layer).init();
  Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  if let Err(e) = setup_logging(cli.verbose, cli.log_dir.as_deref()) {
    eprintln!("{} Could not set up logging: {e}", style(FAILURE).red());
    return ExitCode::FAILURE;
  }

  match run(cli).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("{} {}", style(FAILURE).red(), style(e).red());
      ExitCode::FAILURE
    },
  }
}

async fn run(cli: Cli) -> Result<(), HarvesterCliError> {
  let config_path = cli.config.unwrap_or_else(|| {
    let default_path = HarvestConfig::default_path();
    debug!("No --config given, using {}", default_path.display());
    default_path
  });
  trace!("Loading configuration from: {}", config_path.display());
  let mut config = HarvestConfig::load(&config_path)?;

  match cli.command {
    Commands::Query => {
      let query = build_query(&config.criteria()?)?;
      println!("{query}");
      Ok(())
    },

    Commands::Check => {
      let plan = config.plan()?;
      let sink = plan.targets.prepare(plan.download_pdfs)?;
      debug!("Opened metadata file: {}", sink.path().display());

      println!(
        "{} Configuration is valid: {}",
        style(SUCCESS).green(),
        style(config_path.display()).yellow()
      );
      println!("   {} {}", style("Query:").green().bold(), style(&plan.query).white());
      println!("   {} {}", style("Fetching:").green().bold(), style(plan.policy).white());
      if let Some(range) = plan.criteria.date_range {
        println!("   {} {}", style("Last updated:").green().bold(), style(range).white());
      }
      if !plan.criteria.title_expressions.is_empty() {
        println!(
          "   {} {} ({})",
          style("Title must contain:").green().bold(),
          style(plan.criteria.title_expressions.join(", ")).white(),
          style(plan.criteria.title_match).cyan()
        );
      }
      println!(
        "   {} {}",
        style("Metadata:").green().bold(),
        style(plan.targets.metadata_path.display()).yellow()
      );
      if plan.download_pdfs {
        println!(
          "   {} {}",
          style("PDFs:").green().bold(),
          style(plan.targets.pdf_directory.display()).yellow()
        );
      } else {
        println!("   {} {}", style("PDFs:").green().bold(), style("disabled").dim());
      }
      println!(
        "   {} {} attempt(s) per page",
        style("Retries:").green().bold(),
        style(plan.retry.max_attempts).white()
      );
      Ok(())
    },

    Commands::Run { total, fetch_all, no_pdfs } => {
      config.override_limit(total, fetch_all);
      if no_pdfs {
        config.download_pdfs = false;
      }

      let plan = config.plan()?;
      let mut sink = plan.targets.prepare(plan.download_pdfs)?;
      let client = config.client()?;

      println!("{} Searching arXiv for: {}", style(LOOKING_GLASS).cyan(), style(&plan.query).yellow());
      println!("{} Fetching {}", style(ROCKET).cyan(), style(plan.policy).white());

      let summary = Harvester::new(plan).run(&client, &client, &mut sink).await?;
      print_summary(&summary, sink.path());

      match summary.fetch_error {
        Some(error) => {
          println!(
            "{} Pagination stopped early; the papers accepted so far were kept",
            style(WARNING).yellow()
          );
          Err(error.into())
        },
        None => Ok(()),
      }
    },
  }
}

/// Prints the counts of a finished run.
fn print_summary(summary: &HarvestSummary, metadata_path: &Path) {
  println!("\n{} Harvest finished", style(SUCCESS).green());
  println!("   {} {}", style("Pages fetched:").green().bold(), style(summary.pages_fetched).white());
  println!("   {} {}", style("Records seen:").green().bold(), style(summary.records_seen).white());
  println!(
    "   {} {}",
    style("Records accepted:").green().bold(),
    style(summary.records_accepted).white()
  );
  println!(
    "{} Metadata appended to: {}",
    style(SAVE).green(),
    style(metadata_path.display()).yellow()
  );

  println!("{} PDFs downloaded: {}", style(PAPER).green(), style(summary.pdfs_downloaded).white());
  println!("{} PDFs skipped: {}", style(BOOKS).cyan(), style(summary.pdfs_skipped).white());
  println!("{} PDFs failed: {}", style(WARNING).yellow(), style(summary.pdfs_failed).red());
  if summary.pdfs_missing > 0 {
    println!(
      "{} Papers without a PDF link: {}",
      style(WARNING).yellow(),
      style(summary.pdfs_missing).white()
    );
  }
}
