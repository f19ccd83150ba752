//! `srcreg`: maintenance tools for the source registry.
//!
//! # Usage
//!
//! ```
//! srcreg bootstrap --dictionary legacy/dictionary.xml --bib legacy/sources.bib
//! srcreg build
//! srcreg validate --check-generated --strict
//! srcreg reconcile --out metadata/sources/reconciliation_report.md
//! ```
//!
//! Every command exits non-zero when anything is left unresolved.

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use settings::{Settings, override_path};
use srcreg_core::store::{Document, Storage};
use srcreg_store::FileStorage;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "srcreg", about = "Source registry maintenance tools")]
struct Args {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "srcreg.toml", value_name = "FILE")]
  config: PathBuf,

  /// Repository root; relative document paths resolve against it.
  #[arg(long, env = "SRCREG_ROOT")]
  root: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create the registry from the legacy dictionary and bibliography.
  Bootstrap {
    /// Legacy dictionary workbook (defaults to the configured sheet).
    #[arg(long)]
    dictionary: Option<PathBuf>,
    /// Legacy bibliography (defaults to the configured bibliography).
    #[arg(long)]
    bib:        Option<PathBuf>,
    /// Overwrite an existing registry.
    #[arg(long)]
    force:      bool,
    /// Recorded as creator of every imported record.
    #[arg(long, default_value = "bootstrap")]
    actor:      String,
  },
  /// Regenerate the dictionary sheet and bibliography from the registry.
  Build,
  /// Check the registry, aliases, change log and generated artifacts.
  Validate {
    #[arg(long)]
    schema:          Option<PathBuf>,
    #[arg(long)]
    aliases:         Option<PathBuf>,
    #[arg(long)]
    change_log:      Option<PathBuf>,
    /// Regenerate in memory and compare with the committed artifacts.
    #[arg(long)]
    check_generated: bool,
    #[arg(long)]
    sheet:           Option<PathBuf>,
    #[arg(long)]
    bib:             Option<PathBuf>,
    /// Treat warnings as failures.
    #[arg(long)]
    strict:          bool,
  },
  /// Write the registry vs. bibliography reconciliation report.
  Reconcile {
    #[arg(long)]
    bib: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let mut paths = Settings::load(&args.config)?.with_root(args.root).paths;

  match args.command {
    Command::Bootstrap {
      dictionary,
      bib,
      force,
      actor,
    } => {
      let storage = Arc::new(FileStorage::new(paths));
      let Some(sheet) =
        commands::read_input(&*storage, Document::Sheet, dictionary.as_deref()).await?
      else {
        bail!("legacy dictionary not found at {}", storage.locate(Document::Sheet));
      };
      let bib =
        commands::read_input(&*storage, Document::Bibliography, bib.as_deref()).await?;
      let n =
        commands::bootstrap(storage, &sheet, bib.as_deref(), &actor, force).await?;
      println!("Bootstrapped {n} record(s).");
    }

    Command::Build => {
      let storage = Arc::new(FileStorage::new(paths));
      for location in commands::build(storage).await? {
        println!("Wrote {location}");
      }
    }

    Command::Validate {
      schema,
      aliases,
      change_log,
      check_generated,
      sheet,
      bib,
      strict,
    } => {
      override_path(&mut paths.schema, schema);
      override_path(&mut paths.aliases, aliases);
      override_path(&mut paths.change_log, change_log);
      override_path(&mut paths.sheet, sheet);
      override_path(&mut paths.bibliography, bib);
      let storage = Arc::new(FileStorage::new(paths));
      let found = commands::validate(storage, check_generated).await?;

      for warning in found.warnings.iter().take(commands::WARNING_LIMIT) {
        println!("WARN  {warning}");
      }
      if found.warnings.len() > commands::WARNING_LIMIT {
        println!(
          "WARN  ... and {} more",
          found.warnings.len() - commands::WARNING_LIMIT
        );
      }
      for error in &found.errors {
        println!("ERROR {error}");
      }
      if found.failed(strict) {
        bail!(
          "validation failed: {} error(s), {} warning(s)",
          found.errors.len(),
          found.warnings.len()
        );
      }
      println!("Registry is valid.");
    }

    Command::Reconcile { bib, out } => {
      override_path(&mut paths.report, out);
      let storage = Arc::new(FileStorage::new(paths));
      let text =
        commands::read_input(&*storage, Document::Bibliography, bib.as_deref()).await?;
      let report = commands::reconcile(Arc::clone(&storage), text.as_deref()).await?;
      println!(
        "{} record(s), {} source/citekey mismatch(es), {} orphan bib entr(ies).",
        report.total,
        report.divergent.len(),
        report.orphans.len()
      );
      println!("Wrote {}", storage.locate(Document::Report));
    }
  }

  Ok(())
}
