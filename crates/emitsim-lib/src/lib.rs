//! Scheduling core of the airport traffic simulator.
//!
//! This crate holds the pieces the emit pipeline builds on: a geographic
//! graph of airways and airport surface networks with route finding, time
//! interval bookings against shared resources such as runways and ramps,
//! and a broadcaster that replays scheduled messages at a compressed
//! virtual time. Consumers (the CLI, simulations) should only depend on the
//! items exported here.
//!

#![deny(warnings)]

pub mod allocation;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod geo;
pub mod graph;
pub mod loader;
pub mod logging;
pub mod path;
pub mod routing;

pub use allocation::{
    AllocationEntry, AllocationStore, AllocationTable, MemoryAllocationStore, Reservation,
    ReservationStatus, Resource, Snapshot, SqliteAllocationStore, TimeSlot,
};
pub use broadcast::{
    BroadcastStats, Broadcaster, BroadcasterHandle, BroadcasterState, ChannelSink, ControlNotice,
    Enqueuer, MemoryQueueBackend, MessageSink, QueueBackend, QueueClock, QueueDefinition,
    QueueEntry, SqliteQueueBackend, WriterSink,
};
pub use config::{AllocationConfig, BroadcastConfig, RetryConfig, RoutingConfig, SimConfig};
pub use error::{Error, Result};
pub use geo::{BoundingBox, Point};
pub use graph::{Edge, Graph, RouteOptions, Vertex, VertexId, VertexKind, WidthCode};
pub use loader::{load_graph, load_graph_from_path, GraphDocument, ImportMode, ImportReport};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use path::{find_route_a_star, find_route_dijkstra, find_route_scan_dijkstra, AStarCache};
pub use routing::{plan_route, Route, RouteAlgorithm, RoutePlan, RouteRequest};
