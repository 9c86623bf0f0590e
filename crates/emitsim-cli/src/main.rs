mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use emitsim_cli::output::OutputFormat;
use emitsim_lib::{init_logging, LoggingConfig, SimConfig};

use commands::allocation::{handle_allocations_command, handle_book_command, AllocationsArgs, BookArgs};
use commands::broadcast::{handle_broadcast_command, handle_enqueue_command, BroadcastArgs, EnqueueArgs};
use commands::route::{handle_route_command, RouteArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "Airport traffic simulator scheduling tools")]
struct Cli {
    /// JSON configuration file; `EMITSIM_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find a route between two vertices of a graph document.
    Route(RouteArgs),
    /// Book a time interval on a resource.
    Book(BookArgs),
    /// Show the reservations of an allocation table.
    Allocations(AllocationsArgs),
    /// Schedule messages on a broadcast queue.
    Enqueue(EnqueueArgs),
    /// Replay a queue to stdout at its virtual time.
    Broadcast(BroadcastArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LoggingConfig::from_env().with_service("emitsim-cli"));
    let cli = Cli::parse();
    let config = SimConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Route(args) => handle_route_command(&args, &config.routing, cli.format),
        Command::Book(args) => handle_book_command(&args, &config.allocation, cli.format),
        Command::Allocations(args) => handle_allocations_command(&args, &config.allocation, cli.format),
        Command::Enqueue(args) => handle_enqueue_command(&args).await,
        Command::Broadcast(args) => handle_broadcast_command(&args, &config.broadcast, cli.format).await,
    }
}
