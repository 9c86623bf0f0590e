//! Route planning strategies implementing the Strategy pattern.
//!
//! Each tier of the fallback chain used by [`Route::find`](super::Route::find)
//! is a [`RoutePlanner`]: a full-graph Dijkstra, an A* over dense matrices of
//! the bounding-box candidates, and a legacy scan Dijkstra tried in both
//! directions.

use crate::graph::{Graph, RouteOptions, VertexId};
use crate::path::{
    find_route_a_star, find_route_dijkstra, find_route_scan_dijkstra, path_weight, AStarCache,
};

use super::RouteAlgorithm;

/// Inputs shared by every planner for one query.
pub struct SearchContext<'a> {
    pub graph: &'a Graph,
    pub start: &'a str,
    pub goal: &'a str,
    pub options: &'a RouteOptions,
    /// Vertices the bounded planners may visit, in key order.
    pub candidates: &'a [VertexId],
    pub cache: &'a mut AStarCache,
}

/// Trait for route planning strategies.
pub trait RoutePlanner: Send + Sync {
    /// The algorithm identifier for this planner.
    fn algorithm(&self) -> RouteAlgorithm;

    /// Execute the pathfinding algorithm.
    ///
    /// Returns `Some(path)` if a route is found, `None` otherwise.
    fn find_path(&self, search: &mut SearchContext<'_>) -> Option<Vec<VertexId>>;
}

/// Dijkstra's algorithm over the whole graph.
#[derive(Debug, Clone, Default)]
pub struct DijkstraPlanner;

impl RoutePlanner for DijkstraPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::Dijkstra
    }

    fn find_path(&self, search: &mut SearchContext<'_>) -> Option<Vec<VertexId>> {
        find_route_dijkstra(search.graph, search.start, search.goal, search.options)
    }
}

/// A* over the dense matrices of the candidate set.
#[derive(Debug, Clone, Default)]
pub struct AStarPlanner;

impl RoutePlanner for AStarPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::AStar
    }

    fn find_path(&self, search: &mut SearchContext<'_>) -> Option<Vec<VertexId>> {
        search
            .cache
            .ensure(search.graph, search.candidates, search.options);
        find_route_a_star(search.graph, search.cache, search.start, search.goal)
    }
}

/// Scan Dijkstra tried from both ends.
///
/// Only paths with at least `min_vertices` vertices are accepted; anything
/// shorter is not a meaningful route for this tier.
#[derive(Debug, Clone)]
pub struct LegacyDijkstraPlanner {
    min_vertices: usize,
}

impl LegacyDijkstraPlanner {
    pub fn new(min_vertices: usize) -> Self {
        Self { min_vertices }
    }
}

impl Default for LegacyDijkstraPlanner {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RoutePlanner for LegacyDijkstraPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::LegacyDijkstra
    }

    fn find_path(&self, search: &mut SearchContext<'_>) -> Option<Vec<VertexId>> {
        let forward = find_route_scan_dijkstra(
            search.graph,
            search.candidates,
            search.start,
            search.goal,
            search.options,
        );
        if let Some(path) = forward.filter(|path| path.len() >= self.min_vertices) {
            return Some(path);
        }

        let mut backward = find_route_scan_dijkstra(
            search.graph,
            search.candidates,
            search.goal,
            search.start,
            search.options,
        )?;
        backward.reverse();

        if backward.len() < self.min_vertices {
            return None;
        }
        // The reversed path must also be drivable in the forward direction.
        path_weight(search.graph, &backward, search.options)?;
        Some(backward)
    }
}

/// Planners tried in order by [`Route::find`](super::Route::find).
pub fn fallback_chain(enable_legacy: bool, min_vertices: usize) -> Vec<Box<dyn RoutePlanner>> {
    let mut chain: Vec<Box<dyn RoutePlanner>> =
        vec![Box::new(DijkstraPlanner), Box::new(AStarPlanner)];
    if enable_legacy {
        chain.push(Box::new(LegacyDijkstraPlanner::new(min_vertices)));
    }
    chain
}
