//! Output formatting for command results.
//!
//! Every renderer writes to a caller-supplied writer so commands can target
//! stdout while tests capture into a buffer.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use emitsim_lib::{BroadcastStats, Reservation, RoutePlan, Snapshot};
use serde::Serialize;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Render a planned route, or the absence of one.
pub fn render_route(
    out: &mut dyn Write,
    from: &str,
    to: &str,
    plan: Option<&RoutePlan>,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, &plan);
    }

    let Some(plan) = plan else {
        writeln!(out, "no route found from {from} to {to}")?;
        return Ok(());
    };
    writeln!(
        out,
        "Route from {} to {} ({}, {} hops, weight {:.3}):",
        plan.start,
        plan.goal,
        plan.algorithm,
        plan.hop_count(),
        plan.total_weight
    )?;
    for step in &plan.steps {
        writeln!(out, "- {step}")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct Booking<'a> {
    resource: &'a str,
    key: String,
    #[serde(flatten)]
    reservation: &'a Reservation,
}

/// Render a reservation just made on `resource`.
pub fn render_reservation(
    out: &mut dyn Write,
    resource: &str,
    reservation: &Reservation,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(
            out,
            &Booking {
                resource,
                key: reservation.key(),
                reservation,
            },
        ),
        OutputFormat::Text => {
            writeln!(
                out,
                "Booked {} on {}: {} to {}",
                reservation.key(),
                resource,
                reservation.scheduled.start.to_rfc3339(),
                reservation.scheduled.end.to_rfc3339()
            )?;
            Ok(())
        }
    }
}

/// Render a table snapshot.
pub fn render_snapshot(out: &mut dyn Write, table: &str, snapshot: &Snapshot, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, snapshot);
    }

    if snapshot.is_empty() {
        writeln!(out, "{table}: no allocations")?;
        return Ok(());
    }
    for (resource, entries) in snapshot {
        writeln!(out, "{resource}:")?;
        for entry in entries {
            writeln!(
                out,
                "  {} {} {}",
                entry.start.to_rfc3339(),
                entry.end.to_rfc3339(),
                entry.label
            )?;
        }
    }
    Ok(())
}

/// Render the final statistics of a broadcaster run.
pub fn render_stats(out: &mut dyn Write, stats: &BroadcastStats, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, stats);
    }
    writeln!(
        out,
        "{}: sent {}, dropped {}, trimmed {}, queue time {}",
        stats.queue,
        stats.total_sent,
        stats.dropped,
        stats.trimmed,
        stats
            .queue_datetime()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| format!("{:.3}", stats.queue_time))
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use emitsim_lib::{AllocationEntry, RouteAlgorithm, TimeSlot};

    fn plan() -> RoutePlan {
        RoutePlan {
            algorithm: RouteAlgorithm::AStar,
            start: "A".into(),
            goal: "C".into(),
            steps: vec!["A".into(), "B".into(), "C".into()],
            total_weight: 2.5,
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn route_text_lists_steps() {
        let plan = plan();
        let text = render(|out| render_route(out, "A", "C", Some(&plan), OutputFormat::Text));
        assert!(text.starts_with("Route from A to C (a-star, 2 hops, weight 2.500):"));
        assert!(text.contains("- B\n"));
    }

    #[test]
    fn missing_route_is_reported() {
        let text = render(|out| render_route(out, "A", "Z", None, OutputFormat::Text));
        assert_eq!(text, "no route found from A to Z\n");
        let json = render(|out| render_route(out, "A", "Z", None, OutputFormat::Json));
        assert_eq!(json.trim(), "null");
    }

    #[test]
    fn booking_json_carries_key_and_resource() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let slot = TimeSlot::new(start, start + chrono::Duration::minutes(5)).unwrap();
        let reservation = Reservation::new(slot, Some("AF1".into()));
        let json = render(|out| render_reservation(out, "RW16L", &reservation, OutputFormat::Json));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["resource"], "RW16L");
        assert_eq!(value["key"], "AF1");
    }

    #[test]
    fn snapshot_text_groups_by_resource() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "RW16L".into(),
            vec![AllocationEntry {
                start,
                end: start + chrono::Duration::minutes(5),
                label: "AF1".into(),
            }],
        );
        let text = render(|out| render_snapshot(out, "runways", &snapshot, OutputFormat::Text));
        assert!(text.starts_with("RW16L:\n  2024-05-01T10:00:00+00:00"));
        assert!(text.trim_end().ends_with("AF1"));
    }
}
