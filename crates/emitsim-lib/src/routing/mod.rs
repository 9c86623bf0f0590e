//! Route planning over airway and airport surface networks.
//!
//! This module provides:
//! - [`Route`] - A query between two vertices resolved by a fallback chain
//! - [`RouteAlgorithm`] - Identifies which tier produced a path
//! - [`RouteRequest`] / [`RoutePlan`] - Owned request/result pair for callers
//!   that identify endpoints by name
//! - [`plan_route`] - Entry point validating endpoints before searching
//!
//! # Strategy Pattern
//!
//! Each tier of the fallback chain is a [`RoutePlanner`]. [`Route::find`]
//! tries them in order and keeps the first path found.

mod planner;

pub use planner::{
    fallback_chain, AStarPlanner, DijkstraPlanner, LegacyDijkstraPlanner, RoutePlanner,
    SearchContext,
};

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::error::Result;
use crate::geo::{BoundingBox, Point};
use crate::graph::{Edge, Graph, RouteOptions, Vertex, VertexId};
use crate::path::{path_weight, AStarCache};

/// Supported routing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteAlgorithm {
    /// Heap-based Dijkstra over the whole graph.
    Dijkstra,
    /// A* over dense matrices of the bounding-box candidates.
    AStar,
    /// Scan Dijkstra over the candidates, tried in both directions.
    LegacyDijkstra,
    /// Straight leg between the endpoints, no graph search.
    Direct,
}

impl fmt::Display for RouteAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RouteAlgorithm::Dijkstra => "dijkstra",
            RouteAlgorithm::AStar => "a-star",
            RouteAlgorithm::LegacyDijkstra => "legacy-dijkstra",
            RouteAlgorithm::Direct => "direct",
        };
        f.write_str(value)
    }
}

/// A route query between two vertices of a graph.
///
/// The query owns an [`AStarCache`] which can be moved from one query to the
/// next with [`Route::with_cache`] and [`Route::into_cache`]; the cache
/// rebuilds itself whenever the graph version changes.
pub struct Route<'g> {
    graph: &'g Graph,
    src: VertexId,
    dst: VertexId,
    options: RouteOptions,
    config: RoutingConfig,
    cache: AStarCache,
    path: Option<Vec<VertexId>>,
    algorithm: Option<RouteAlgorithm>,
}

impl<'g> Route<'g> {
    pub fn new(
        graph: &'g Graph,
        src: impl Into<VertexId>,
        dst: impl Into<VertexId>,
        options: RouteOptions,
    ) -> Self {
        Self {
            graph,
            src: src.into(),
            dst: dst.into(),
            options,
            config: RoutingConfig::default(),
            cache: AStarCache::new(),
            path: None,
            algorithm: None,
        }
    }

    pub fn with_config(mut self, config: RoutingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cache(mut self, cache: AStarCache) -> Self {
        self.cache = cache;
        self
    }

    /// Release the A* cache for reuse by a later query.
    pub fn into_cache(self) -> AStarCache {
        self.cache
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    /// Vertices the bounded tiers may visit.
    ///
    /// With a bounding-box option the candidates are the vertices inside it;
    /// otherwise they are the vertices inside the rectangle spanning both
    /// endpoints extended by the configured margin. Both endpoints are
    /// always included.
    pub fn candidates(&self) -> Vec<VertexId> {
        let bbox = match (&self.options.bbox, self.endpoint_box()) {
            (Some(bbox), _) => Some(*bbox),
            (None, computed) => computed,
        };

        let mut ids: BTreeSet<VertexId> = match bbox {
            Some(bbox) => self.graph.vertex_ids_in_bbox(&bbox, false).into_iter().collect(),
            None => self.graph.vertices(false).map(|v| v.id.clone()).collect(),
        };
        for endpoint in [&self.src, &self.dst] {
            if self.graph.contains(endpoint) {
                ids.insert(endpoint.clone());
            }
        }
        ids.into_iter().collect()
    }

    fn endpoint_box(&self) -> Option<BoundingBox> {
        let src = self.graph.vertex(&self.src)?;
        let dst = self.graph.vertex(&self.dst)?;
        Some(BoundingBox::around(
            &src.point,
            &dst.point,
            self.config.bbox_margin_km,
        ))
    }

    /// Run the fallback chain and return the path, if any.
    ///
    /// Not finding a route is an ordinary outcome and yields `None`.
    pub fn find(&mut self) -> Option<&[VertexId]> {
        self.path = None;
        self.algorithm = None;

        if !self.graph.contains(&self.src) || !self.graph.contains(&self.dst) {
            warn!(src = %self.src, dst = %self.dst, "route endpoint not in graph");
            return None;
        }

        let candidates = self.candidates();
        let chain = fallback_chain(
            self.config.enable_legacy_dijkstra,
            self.config.min_meaningful_path,
        );

        for planner in chain {
            let mut search = SearchContext {
                graph: self.graph,
                start: &self.src,
                goal: &self.dst,
                options: &self.options,
                candidates: &candidates,
                cache: &mut self.cache,
            };
            match planner.find_path(&mut search) {
                Some(path) => {
                    debug!(
                        algorithm = %planner.algorithm(),
                        src = %self.src,
                        dst = %self.dst,
                        vertices = path.len(),
                        "route found"
                    );
                    self.algorithm = Some(planner.algorithm());
                    self.path = Some(path);
                    break;
                }
                None => debug!(algorithm = %planner.algorithm(), "no route, trying next planner"),
            }
        }

        self.path.as_deref()
    }

    /// Replace the path with a straight leg between the endpoints.
    pub fn direct(&mut self) -> &[VertexId] {
        warn!(src = %self.src, dst = %self.dst, "direct route created");
        self.algorithm = Some(RouteAlgorithm::Direct);
        self.path.insert(vec![self.src.clone(), self.dst.clone()])
    }

    pub fn is_direct(&self) -> bool {
        self.algorithm == Some(RouteAlgorithm::Direct)
    }

    /// Whether a usable route is available: a searched path of at least two
    /// vertices, or a direct leg.
    pub fn found(&self) -> bool {
        self.is_direct() || self.path.as_ref().is_some_and(|path| path.len() >= 2)
    }

    /// Tier that produced the current path.
    pub fn algorithm(&self) -> Option<RouteAlgorithm> {
        self.algorithm
    }

    pub fn path(&self) -> Option<&[VertexId]> {
        self.path.as_deref()
    }

    /// Vertices along the path, in order.
    pub fn vertices(&self) -> Vec<&'g Vertex> {
        let graph = self.graph;
        self.path
            .iter()
            .flatten()
            .filter_map(|id| graph.vertex(id))
            .collect()
    }

    /// Edges along the path, in order. A direct leg has no edges.
    pub fn edges(&self) -> Vec<&'g Edge> {
        let graph = self.graph;
        if self.is_direct() {
            return Vec::new();
        }
        self.path
            .iter()
            .flat_map(|path| path.windows(2))
            .filter_map(|pair| graph.edge(&pair[0], &pair[1]))
            .collect()
    }

    /// Points along the path, expanding edge polylines in travel direction.
    pub fn points(&self) -> Vec<Point> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let mut points = Vec::new();
        if let Some(first) = path.first().and_then(|id| self.graph.vertex(id)) {
            points.push(first.point);
        }

        for pair in path.windows(2) {
            if !self.is_direct() {
                if let Some(edge) = self.graph.edge(&pair[0], &pair[1]) {
                    if edge.start == pair[0] {
                        points.extend(edge.polyline.iter().copied());
                    } else {
                        points.extend(edge.polyline.iter().rev().copied());
                    }
                }
            }
            if let Some(next) = self.graph.vertex(&pair[1]) {
                points.push(next.point);
            }
        }
        points
    }

    /// Sum of edge weights along the path.
    ///
    /// A direct leg is weighted by its great-circle length.
    pub fn total_weight(&self) -> Option<f64> {
        let path = self.path.as_ref()?;
        if self.is_direct() {
            let src = self.graph.vertex(&self.src)?;
            let dst = self.graph.vertex(&self.dst)?;
            return Some(src.point.distance_km(&dst.point));
        }
        path_weight(self.graph, path, &RouteOptions::default())
    }
}

impl fmt::Display for Route<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) if self.found() => f.write_str(&path.join("-")),
            _ => Ok(()),
        }
    }
}

/// High-level route planning request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub start: String,
    pub goal: String,
    pub options: RouteOptions,
    pub config: RoutingConfig,
}

impl RouteRequest {
    pub fn new(start: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            goal: goal.into(),
            options: RouteOptions::default(),
            config: RoutingConfig::default(),
        }
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_config(mut self, config: RoutingConfig) -> Self {
        self.config = config;
        self
    }
}

/// Planned route returned by the library.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub algorithm: RouteAlgorithm,
    pub start: VertexId,
    pub goal: VertexId,
    pub steps: Vec<VertexId>,
    pub total_weight: f64,
}

impl RoutePlan {
    /// Number of hops in the route.
    pub fn hop_count(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

/// Compute a route for a request.
///
/// Unknown endpoints are an error (with spelling suggestions); an absent
/// route between known endpoints is `Ok(None)`.
pub fn plan_route(graph: &Graph, request: &RouteRequest) -> Result<Option<RoutePlan>> {
    graph.require_vertex(&request.start)?;
    graph.require_vertex(&request.goal)?;

    let mut route = Route::new(
        graph,
        request.start.clone(),
        request.goal.clone(),
        request.options.clone(),
    )
    .with_config(request.config.clone());

    if route.find().is_none() {
        return Ok(None);
    }

    let (Some(algorithm), Some(steps)) = (route.algorithm(), route.path()) else {
        return Ok(None);
    };
    Ok(Some(RoutePlan {
        algorithm,
        start: request.start.clone(),
        goal: request.goal.clone(),
        steps: steps.to_vec(),
        total_weight: route.total_weight().unwrap_or(0.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn abc_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_vertex(Vertex::new("A", Point::new(0.0, 0.0)));
        graph.add_vertex(Vertex::new("B", Point::new(1.0, 0.0)));
        graph.add_vertex(Vertex::new("C", Point::new(2.0, 0.0)));
        graph.add_edge(Edge::new("A", "B", 1.0, false)).unwrap();
        graph
            .add_edge(Edge::new("B", "C", 1.0, false).with_polyline(vec![Point::new(1.5, 0.1)]))
            .unwrap();
        graph
    }

    #[test]
    fn route_display_and_accessors() {
        let graph = abc_graph();
        let mut route = Route::new(&graph, "A", "C", RouteOptions::default());
        assert_eq!(route.find().map(|p| p.to_vec()), Some(vec!["A".into(), "B".into(), "C".into()]));
        assert_eq!(route.algorithm(), Some(RouteAlgorithm::Dijkstra));
        assert_eq!(route.to_string(), "A-B-C");
        assert_eq!(route.edges().len(), 2);
        assert_eq!(route.vertices().len(), 3);
        assert_eq!(route.points().len(), 4);
        assert_eq!(route.total_weight(), Some(2.0));
    }

    #[test]
    fn reverse_traversal_reverses_polyline() {
        let graph = abc_graph();
        let mut route = Route::new(&graph, "C", "A", RouteOptions::default());
        route.find();
        let points = route.points();
        assert_eq!(points[0], Point::new(2.0, 0.0));
        assert_eq!(points[1], Point::new(1.5, 0.1));
    }

    #[test]
    fn unknown_endpoints_yield_none() {
        let graph = abc_graph();
        let mut route = Route::new(&graph, "A", "Z", RouteOptions::default());
        assert!(route.find().is_none());
        assert!(!route.found());
        assert_eq!(route.to_string(), "");
    }

    #[test]
    fn direct_route_is_found_without_edges() {
        let mut graph = abc_graph();
        graph.add_vertex(Vertex::new("ISLAND", Point::new(3.0, 0.0)));
        let mut route = Route::new(&graph, "A", "ISLAND", RouteOptions::default());
        assert!(route.find().is_none());
        route.direct();
        assert!(route.found());
        assert!(route.is_direct());
        assert!(route.edges().is_empty());
        assert!(route.total_weight().unwrap() > 300.0);
    }

    #[test]
    fn cache_survives_between_queries() {
        let graph = abc_graph();
        let options = RouteOptions::default();
        let route = Route::new(&graph, "A", "C", options.clone());
        let candidates = route.candidates();
        let mut cache = route.into_cache();
        cache.ensure(&graph, &candidates, &options);

        let route = Route::new(&graph, "A", "C", options.clone()).with_cache(cache);
        assert_eq!(route.candidates(), candidates);
        let cache = route.into_cache();
        assert!(cache.is_valid_for(&graph, &candidates, &options));
    }

    #[test]
    fn plan_route_rejects_unknown_names() {
        let graph = abc_graph();
        let err = plan_route(&graph, &RouteRequest::new("A", "D")).unwrap_err();
        assert!(matches!(err, Error::UnknownVertex { .. }));
    }

    #[test]
    fn plan_route_reports_weight() {
        let graph = abc_graph();
        let plan = plan_route(&graph, &RouteRequest::new("A", "C")).unwrap().unwrap();
        assert_eq!(plan.hop_count(), 2);
        assert_eq!(plan.total_weight, 2.0);
        assert_eq!(plan.algorithm, RouteAlgorithm::Dijkstra);
    }

    #[test]
    fn algorithm_display() {
        assert_eq!(RouteAlgorithm::AStar.to_string(), "a-star");
        assert_eq!(RouteAlgorithm::LegacyDijkstra.to_string(), "legacy-dijkstra");
    }
}
