//! Route command handler for finding paths through a graph document.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use emitsim_cli::output::{render_route, OutputFormat};
use emitsim_lib::{
    load_graph_from_path, plan_route, BoundingBox, ImportMode, RouteOptions, RouteRequest,
    RoutingConfig, WidthCode,
};

/// Arguments for the route command.
#[derive(Args, Debug, Clone)]
pub struct RouteArgs {
    /// Graph document (JSON) to route through.
    #[arg(long)]
    pub graph: PathBuf,
    /// Starting vertex identifier.
    #[arg(long)]
    pub from: String,
    /// Destination vertex identifier.
    #[arg(long)]
    pub to: String,
    /// Never step onto runway edges.
    #[arg(long)]
    pub taxiway_only: bool,
    /// Narrowest taxiway width code accepted (A to F).
    #[arg(long)]
    pub min_width: Option<WidthCode>,
    /// Restrict the search to `min_lon,min_lat,max_lon,max_lat`.
    #[arg(long, value_parser = parse_bbox)]
    pub bbox: Option<BoundingBox>,
    /// Skip edges with unknown endpoints instead of failing the import.
    #[arg(long)]
    pub lenient: bool,
}

impl RouteArgs {
    fn options(&self) -> RouteOptions {
        let mut options = RouteOptions {
            taxiway_only: self.taxiway_only,
            ..RouteOptions::default()
        };
        if let Some(code) = self.min_width {
            options = options.with_min_width(code);
        }
        if let Some(bbox) = self.bbox {
            options = options.with_bbox(bbox);
        }
        options
    }
}

fn parse_bbox(raw: &str) -> std::result::Result<BoundingBox, String> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid coordinate in '{raw}': {err}"))?;
    match values.as_slice() {
        &[min_lon, min_lat, max_lon, max_lat] => Ok(BoundingBox::new(min_lon, min_lat, max_lon, max_lat)),
        _ => Err(format!("expected min_lon,min_lat,max_lon,max_lat, got '{raw}'")),
    }
}

/// Handle the route subcommand.
///
/// A missing route is reported on stdout and is not a failure; unknown
/// vertices are.
pub fn handle_route_command(args: &RouteArgs, config: &RoutingConfig, format: OutputFormat) -> Result<()> {
    let mode = if args.lenient {
        ImportMode::Lenient
    } else {
        ImportMode::Strict
    };
    let (graph, report) = load_graph_from_path(&args.graph, mode)
        .with_context(|| format!("failed to load graph from {}", args.graph.display()))?;
    tracing::debug!(
        vertices = report.vertices,
        edges = report.edges,
        skipped = report.skipped.len(),
        "graph loaded"
    );

    let request = RouteRequest::new(&args.from, &args.to)
        .with_options(args.options())
        .with_config(config.clone());
    let plan = plan_route(&graph, &request)?;

    let mut stdout = io::stdout().lock();
    render_route(&mut stdout, &args.from, &args.to, plan.as_ref(), format)
}
