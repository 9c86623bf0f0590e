//! Booking and listing resource allocations stored in SQLite.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use emitsim_cli::output::{render_reservation, render_snapshot, OutputFormat};
use emitsim_lib::{AllocationConfig, AllocationTable, SqliteAllocationStore};

/// Arguments for the book command.
#[derive(Args, Debug, Clone)]
pub struct BookArgs {
    /// SQLite database; defaults to `allocation.database` from the configuration.
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Allocation table name.
    #[arg(long, default_value = "default")]
    pub table: String,
    /// Resource to book, created on first use.
    #[arg(long)]
    pub resource: String,
    /// Start of the interval (RFC 3339).
    #[arg(long)]
    pub from: DateTime<Utc>,
    /// End of the interval (RFC 3339).
    #[arg(long)]
    pub to: DateTime<Utc>,
    /// Reservation label, such as a flight or mission identifier.
    #[arg(long)]
    pub label: Option<String>,
    /// Move the booking to the first free slot instead of failing.
    #[arg(long)]
    pub first_available: bool,
}

/// Arguments for the allocations command.
#[derive(Args, Debug, Clone)]
pub struct AllocationsArgs {
    /// SQLite database; defaults to `allocation.database` from the configuration.
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Allocation table name.
    #[arg(long, default_value = "default")]
    pub table: String,
    /// Show observed intervals instead of estimated ones.
    #[arg(long)]
    pub actual: bool,
}

fn open_table(
    db: Option<&PathBuf>,
    name: &str,
    config: &AllocationConfig,
) -> Result<(AllocationTable, SqliteAllocationStore)> {
    let Some(path) = db.or(config.database.as_ref()) else {
        bail!("no allocation database given; pass --db or set allocation.database");
    };
    let store = SqliteAllocationStore::open(path)
        .with_context(|| format!("failed to open allocation database {}", path.display()))?;
    let table = AllocationTable::new(name).with_epsilon(config.epsilon());
    table
        .load(&store)
        .with_context(|| format!("failed to load allocation table {name}"))?;
    Ok((table, store))
}

/// Handle the book subcommand.
pub fn handle_book_command(args: &BookArgs, config: &AllocationConfig, format: OutputFormat) -> Result<()> {
    let (table, store) = open_table(args.db.as_ref(), &args.table, config)?;
    if !table.contains(&args.resource) {
        table.add_resource(args.resource.clone());
    }

    let label = args.label.as_deref();
    let reservation = if args.first_available {
        table.book_first_available(&args.resource, args.from, args.to, label)?
    } else {
        match table.try_book(&args.resource, args.from, args.to, label)? {
            Some(reservation) => reservation,
            None => {
                let free = table.first_available(&args.resource, args.from, args.to)?;
                bail!(
                    "{} is busy between {} and {}; first free slot starts at {} (use --first-available)",
                    args.resource,
                    args.from.to_rfc3339(),
                    args.to.to_rfc3339(),
                    free.start.to_rfc3339()
                );
            }
        }
    };

    table
        .save(&store)
        .with_context(|| format!("failed to save allocation table {}", args.table))?;

    let mut stdout = io::stdout().lock();
    render_reservation(&mut stdout, &args.resource, &reservation, format)
}

/// Handle the allocations subcommand.
pub fn handle_allocations_command(
    args: &AllocationsArgs,
    config: &AllocationConfig,
    format: OutputFormat,
) -> Result<()> {
    let (table, _store) = open_table(args.db.as_ref(), &args.table, config)?;
    let snapshot = if args.actual {
        table.snapshot_actual()
    } else {
        table.snapshot()
    };

    let mut stdout = io::stdout().lock();
    render_snapshot(&mut stdout, &args.table, &snapshot, format)
}
