use chrono::{DateTime, Utc};
use thiserror::Error;

/// Convenient result alias for the simulator core.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// Only structural and infrastructure failures are errors. "No route" and
/// "no free slot" are ordinary outcomes and are returned as `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// An edge referenced a vertex that has not been added to the graph.
    #[error("edge {edge} references unknown vertex {vertex}")]
    EdgeEndpointNotFound { edge: String, vertex: String },

    /// A `taxiway_X` usage tag carried a width code outside A-F.
    #[error("invalid taxiway width code in tag '{tag}' (expected taxiway_A to taxiway_F)")]
    InvalidWidthCode { tag: String },

    /// A vertex identifier could not be found in the graph.
    #[error("unknown vertex: {id}{}", format_suggestions(.suggestions))]
    UnknownVertex {
        id: String,
        suggestions: Vec<String>,
    },

    /// A resource name is not registered in the allocation table.
    #[error("unknown resource {name} in allocation table {table}")]
    UnknownResource { table: String, name: String },

    /// A time interval ends before it starts.
    #[error("invalid interval: end {end} is before start {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Attempted to create a queue using a reserved name.
    #[error("queue name '{name}' is reserved")]
    ReservedQueueName { name: String },

    /// Broadcast speed multipliers must be strictly positive and finite.
    #[error("broadcast speed must be a positive number, got {speed}")]
    InvalidSpeed { speed: f64 },

    /// Raised when configuration values fail validation.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// A persisted record could not be decoded.
    #[error("corrupt record {key}: {message}")]
    CorruptRecord { key: String, message: String },

    /// The queue substrate kept failing after all retries.
    #[error("queue {queue}: substrate unavailable after {attempts} attempts: {message}")]
    SubstrateUnavailable {
        queue: String,
        attempts: u32,
        message: String,
    },

    /// A broadcaster task panicked or was aborted.
    #[error("{task} task failed: {message}")]
    TaskFailed { task: &'static str, message: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON encoding and decoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for timestamp parsing errors.
    #[error(transparent)]
    Timestamp(#[from] chrono::ParseError),
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else if suggestions.len() == 1 {
        format!(". Did you mean '{}'?", suggestions[0])
    } else {
        format!(
            ". Did you mean one of: {}?",
            suggestions
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
