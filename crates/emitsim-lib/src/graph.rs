use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geo::{BoundingBox, Point};

/// Identifier of a vertex, unique within a graph.
pub type VertexId = String;

/// Usage tag carried by runway edges.
pub const RUNWAY_TAG: &str = "runway";

/// Usage tag carried by taxiway edges.
pub const TAXIWAY_TAG: &str = "taxiway";

/// Projections closer than this to an edge endpoint snap onto the vertex.
const SNAP_KM: f64 = 1e-6;

/// Taxiway capacity class, from the narrowest (`A`) to the widest (`F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WidthCode {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl WidthCode {
    /// Code assumed for edges that do not declare one.
    pub const WORST_CASE: WidthCode = WidthCode::F;

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(WidthCode::A),
            'B' => Some(WidthCode::B),
            'C' => Some(WidthCode::C),
            'D' => Some(WidthCode::D),
            'E' => Some(WidthCode::E),
            'F' => Some(WidthCode::F),
            _ => None,
        }
    }

    /// Extract the width code from a `taxiway_X` usage tag.
    ///
    /// Returns `Ok(None)` for tags that are not width tags and an error for a
    /// `taxiway_X` tag whose letter is outside A-F.
    pub fn parse_tag(tag: &str) -> Result<Option<Self>> {
        let lower = tag.to_ascii_lowercase();
        let Some(suffix) = lower.strip_prefix("taxiway_") else {
            return Ok(None);
        };
        let mut chars = suffix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => WidthCode::from_char(c)
                .map(Some)
                .ok_or_else(|| Error::InvalidWidthCode {
                    tag: tag.to_string(),
                }),
            _ => Err(Error::InvalidWidthCode {
                tag: tag.to_string(),
            }),
        }
    }
}

impl fmt::Display for WidthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            WidthCode::A => "A",
            WidthCode::B => "B",
            WidthCode::C => "C",
            WidthCode::D => "D",
            WidthCode::E => "E",
            WidthCode::F => "F",
        };
        f.write_str(value)
    }
}

impl FromStr for WidthCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => WidthCode::from_char(c),
            _ => None,
        }
        .ok_or_else(|| Error::InvalidWidthCode {
            tag: s.to_string(),
        })
    }
}

/// Vertical band in which a vertex or edge may be used, in feet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    pub floor_ft: f64,
    pub ceiling_ft: f64,
}

/// What a vertex represents in the navigation or surface network.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    #[default]
    Generic,
    Navaid {
        navaid_type: String,
    },
    Fix,
    Airport {
        icao: String,
    },
    Taxiway,
    Runway {
        designator: String,
    },
}

/// Node of the routing graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub point: Point,
    pub kind: VertexKind,
    pub name: Option<String>,
    pub usage: BTreeSet<String>,
    pub restriction: Option<Restriction>,
    adjacent: BTreeMap<VertexId, f64>,
    connected: bool,
}

impl Vertex {
    pub fn new(id: impl Into<VertexId>, point: Point) -> Self {
        Self {
            id: id.into(),
            point,
            kind: VertexKind::Generic,
            name: None,
            usage: BTreeSet::new(),
            restriction: None,
            adjacent: BTreeMap::new(),
            connected: false,
        }
    }

    pub fn with_kind(mut self, kind: VertexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_usage<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.usage.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = Some(restriction);
        self
    }

    /// Outgoing neighbours and the weight of the edge reaching them.
    pub fn adjacent(&self) -> &BTreeMap<VertexId, f64> {
        &self.adjacent
    }

    /// Whether at least one edge touches this vertex.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of outgoing neighbours.
    pub fn degree(&self) -> usize {
        self.adjacent.len()
    }

    fn add_neighbour(&mut self, neighbour: &str, weight: f64) {
        self.adjacent
            .entry(neighbour.to_string())
            .and_modify(|existing| *existing = existing.min(weight))
            .or_insert(weight);
    }
}

/// Connection between two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub start: VertexId,
    pub end: VertexId,
    pub weight: f64,
    pub directed: bool,
    pub name: Option<String>,
    pub usage: BTreeSet<String>,
    pub width_code: Option<WidthCode>,
    pub restriction: Option<Restriction>,
    /// Intermediate points when the edge is not a straight line.
    pub polyline: Vec<Point>,
}

impl Edge {
    pub fn new(start: impl Into<VertexId>, end: impl Into<VertexId>, weight: f64, directed: bool) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            weight,
            directed,
            name: None,
            usage: BTreeSet::new(),
            width_code: None,
            restriction: None,
            polyline: Vec::new(),
        }
    }

    /// Attach usage tags, deriving the canonical usage and the width code.
    ///
    /// `taxiway_C` adds both `taxiway_C` and `taxiway` and sets width code C.
    /// A malformed width tag is rejected instead of being ignored.
    pub fn with_usage<I, S>(mut self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref();
            if let Some(code) = WidthCode::parse_tag(tag)? {
                self.width_code = Some(code);
            }
            let lower = tag.to_ascii_lowercase();
            if lower.starts_with(TAXIWAY_TAG) {
                self.usage.insert(TAXIWAY_TAG.to_string());
            }
            if lower.starts_with(RUNWAY_TAG) {
                self.usage.insert(RUNWAY_TAG.to_string());
            }
            self.usage.insert(tag.to_string());
        }
        Ok(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_polyline(mut self, points: Vec<Point>) -> Self {
        self.polyline = points;
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = Some(restriction);
        self
    }

    pub fn is_runway(&self) -> bool {
        self.usage.contains(RUNWAY_TAG)
    }

    /// Width code, or the worst-case code when the edge declares none.
    pub fn width_code_or_worst(&self) -> WidthCode {
        self.width_code.unwrap_or(WidthCode::WORST_CASE)
    }

    /// Human-readable key, `start-end`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Option bag shared by route queries and neighbour filtering.
///
/// Every filter is conjunctive; an unset option disables its filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOptions {
    /// Neighbours must lie inside this rectangle.
    pub bbox: Option<BoundingBox>,
    /// Reject edges tagged as runway.
    pub taxiway_only: bool,
    /// Reject edges narrower than this width code.
    pub min_width: Option<WidthCode>,
}

impl RouteOptions {
    pub fn taxiway_only() -> Self {
        Self {
            taxiway_only: true,
            ..Self::default()
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_min_width(mut self, code: WidthCode) -> Self {
        self.min_width = Some(code);
        self
    }

    /// Whether the edge may be used to step onto `target`.
    pub fn allows(&self, edge: &Edge, target: &Vertex) -> bool {
        if self.taxiway_only && edge.is_runway() {
            return false;
        }

        if let Some(minimum) = self.min_width {
            if edge.width_code_or_worst() < minimum {
                return false;
            }
        }

        if let Some(bbox) = &self.bbox {
            if !bbox.contains(&target.point) {
                return false;
            }
        }

        true
    }
}

/// Closest vertex to a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestVertex {
    pub id: VertexId,
    pub distance_km: f64,
    pub degree: usize,
}

/// Closest location on any edge to a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestEdgePoint {
    pub point: Point,
    pub distance_km: f64,
    /// Index of the edge in [`Graph::edges`].
    pub edge: usize,
    /// Set when the closest location is one of the edge endpoints.
    pub vertex: Option<VertexId>,
    /// Degree of the edge's start and end vertices.
    pub degrees: (usize, usize),
}

/// Routing graph over an airway or airport surface network.
///
/// Vertices are iterated in key order, which keeps every algorithm built on
/// top of the graph deterministic.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: Vec<Edge>,
    /// Directed lookup `(from, to)` to the lightest edge usable in that direction.
    edge_index: HashMap<(VertexId, VertexId), usize>,
    version: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutation counter, bumped by every vertex or edge insertion.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Insert a vertex, returning the one it replaced.
    ///
    /// A replacement keeps the adjacency already recorded for that identity
    /// so that existing edges stay consistent.
    pub fn add_vertex(&mut self, mut vertex: Vertex) -> Option<Vertex> {
        self.version += 1;
        let previous = self.vertices.remove(&vertex.id);
        if let Some(previous) = &previous {
            warn!(vertex = %vertex.id, "duplicate vertex, overwriting");
            vertex.adjacent = previous.adjacent.clone();
            vertex.connected = previous.connected;
        }
        self.vertices.insert(vertex.id.clone(), vertex);
        previous
    }

    /// Insert an edge between two existing vertices.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        for endpoint in [&edge.start, &edge.end] {
            if !self.vertices.contains_key(endpoint) {
                return Err(Error::EdgeEndpointNotFound {
                    edge: edge.key(),
                    vertex: endpoint.clone(),
                });
            }
        }

        self.version += 1;
        let index = self.edges.len();
        self.index_direction(&edge.start, &edge.end, index, edge.weight);
        if !edge.directed {
            self.index_direction(&edge.end, &edge.start, index, edge.weight);
        }

        if let Some(start) = self.vertices.get_mut(&edge.start) {
            start.add_neighbour(&edge.end, edge.weight);
            start.connected = true;
        }
        if let Some(end) = self.vertices.get_mut(&edge.end) {
            if !edge.directed {
                end.add_neighbour(&edge.start, edge.weight);
            }
            end.connected = true;
        }

        self.edges.push(edge);
        Ok(())
    }

    fn index_direction(&mut self, from: &str, to: &str, index: usize, weight: f64) {
        let key = (from.to_string(), to.to_string());
        match self.edge_index.get(&key) {
            Some(&existing) if self.edges[existing].weight <= weight => {}
            _ => {
                self.edge_index.insert(key, index);
            }
        }
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    /// Iterate vertices in key order, optionally skipping isolated ones.
    pub fn vertices(&self, connected_only: bool) -> impl Iterator<Item = &Vertex> {
        self.vertices
            .values()
            .filter(move |vertex| !connected_only || vertex.connected)
    }

    /// Identifiers of the vertices located inside `bbox`, in key order.
    pub fn vertex_ids_in_bbox(&self, bbox: &BoundingBox, connected_only: bool) -> Vec<VertexId> {
        let ids: Vec<VertexId> = self
            .vertices(connected_only)
            .filter(|vertex| bbox.contains(&vertex.point))
            .map(|vertex| vertex.id.clone())
            .collect();
        debug!(from = self.vertices.len(), to = ids.len(), "box bounded vertex set");
        ids
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edge usable to travel from `src` to `dst`.
    ///
    /// Directed edges only match in their own direction; undirected edges
    /// match both ways. When several edges qualify the lightest one wins.
    pub fn edge(&self, src: &str, dst: &str) -> Option<&Edge> {
        self.edge_index
            .get(&(src.to_string(), dst.to_string()))
            .map(|&index| &self.edges[index])
    }

    /// Neighbours of `id` reachable through an edge accepted by `options`.
    pub fn connections(&self, id: &str, options: &RouteOptions) -> Vec<(&Vertex, &Edge)> {
        let Some(vertex) = self.vertices.get(id) else {
            return Vec::new();
        };

        vertex
            .adjacent
            .keys()
            .filter_map(|neighbour| {
                let edge = self.edge(id, neighbour)?;
                let target = self.vertices.get(neighbour)?;
                options.allows(edge, target).then_some((target, edge))
            })
            .collect()
    }

    /// Closest vertex to `point` by great-circle distance.
    ///
    /// With `connected_only`, vertices without outgoing edges are skipped so
    /// that a route endpoint is never snapped onto an unreachable vertex.
    pub fn nearest_vertex(&self, point: &Point, connected_only: bool) -> Option<NearestVertex> {
        self.vertices
            .values()
            .filter(|vertex| !connected_only || !vertex.adjacent.is_empty())
            .map(|vertex| (vertex, point.distance_km(&vertex.point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(vertex, distance_km)| NearestVertex {
                id: vertex.id.clone(),
                distance_km,
                degree: vertex.degree(),
            })
    }

    /// Closest location on any edge to `point`.
    ///
    /// With `connected_only`, edges whose endpoints both lack outgoing edges
    /// are skipped.
    pub fn nearest_point_on_edge(&self, point: &Point, connected_only: bool) -> Option<NearestEdgePoint> {
        let mut best: Option<NearestEdgePoint> = None;

        for (index, edge) in self.edges.iter().enumerate() {
            let (Some(start), Some(end)) = (self.vertices.get(&edge.start), self.vertices.get(&edge.end)) else {
                continue;
            };
            let degrees = (start.degree(), end.degree());
            if connected_only && degrees == (0, 0) {
                continue;
            }

            let mut shape = Vec::with_capacity(edge.polyline.len() + 2);
            shape.push(start.point);
            shape.extend(edge.polyline.iter().copied());
            shape.push(end.point);

            for pair in shape.windows(2) {
                let (projected, distance_km) = point.nearest_on_segment(&pair[0], &pair[1]);
                if best.as_ref().is_some_and(|b| b.distance_km <= distance_km) {
                    continue;
                }
                best = Some(NearestEdgePoint {
                    point: projected,
                    distance_km,
                    edge: index,
                    vertex: None,
                    degrees,
                });
            }
        }

        if let Some(found) = best.as_mut() {
            let edge = &self.edges[found.edge];
            for id in [&edge.start, &edge.end] {
                if let Some(vertex) = self.vertices.get(id) {
                    if vertex.point.distance_km(&found.point) < SNAP_KM {
                        found.vertex = Some(id.clone());
                        found.point = vertex.point;
                        break;
                    }
                }
            }
        }

        best
    }

    /// Up to `limit` vertex identifiers closest in spelling to `id`.
    pub fn similar_ids(&self, id: &str, limit: usize) -> Vec<String> {
        let mut scored: Vec<(f64, &VertexId)> = self
            .vertices
            .keys()
            .map(|candidate| (strsim::jaro_winkler(id, candidate), candidate))
            .filter(|(score, _)| *score >= 0.8)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, candidate)| candidate.clone())
            .collect()
    }

    /// Resolve an identifier or fail with fuzzy suggestions.
    pub fn require_vertex(&self, id: &str) -> Result<&Vertex> {
        self.vertices.get(id).ok_or_else(|| Error::UnknownVertex {
            id: id.to_string(),
            suggestions: self.similar_ids(id, 3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(id: &str, lon: f64, lat: f64) -> Vertex {
        Vertex::new(id, Point::new(lon, lat))
    }

    fn line_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_vertex(vertex("A", 0.0, 0.0));
        graph.add_vertex(vertex("B", 0.01, 0.0));
        graph.add_vertex(vertex("C", 0.02, 0.0));
        graph.add_edge(Edge::new("A", "B", 1.0, false)).unwrap();
        graph.add_edge(Edge::new("B", "C", 1.0, true)).unwrap();
        graph
    }

    #[test]
    fn width_code_tags_parse() {
        assert_eq!(WidthCode::parse_tag("taxiway_C").unwrap(), Some(WidthCode::C));
        assert_eq!(WidthCode::parse_tag("TAXIWAY_e").unwrap(), Some(WidthCode::E));
        assert_eq!(WidthCode::parse_tag("taxiway").unwrap(), None);
        assert_eq!(WidthCode::parse_tag("runway").unwrap(), None);
        assert!(matches!(
            WidthCode::parse_tag("taxiway_Z"),
            Err(Error::InvalidWidthCode { .. })
        ));
        assert!(WidthCode::parse_tag("taxiway_CD").is_err());
    }

    #[test]
    fn edge_usage_derives_canonical_tags() {
        let edge = Edge::new("A", "B", 1.0, false)
            .with_usage(["taxiway_D"])
            .unwrap();
        assert!(edge.usage.contains(TAXIWAY_TAG));
        assert_eq!(edge.width_code, Some(WidthCode::D));
        assert!(!edge.is_runway());

        let runway = Edge::new("A", "B", 1.0, false).with_usage(["runway"]).unwrap();
        assert!(runway.is_runway());
        assert_eq!(runway.width_code_or_worst(), WidthCode::F);
    }

    #[test]
    fn edge_with_unknown_endpoint_is_rejected() {
        let mut graph = line_graph();
        let version = graph.version();
        let err = graph.add_edge(Edge::new("A", "Z", 1.0, false)).unwrap_err();
        assert!(matches!(err, Error::EdgeEndpointNotFound { ref vertex, .. } if vertex == "Z"));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.version(), version, "rejected edges do not mutate");
    }

    #[test]
    fn undirected_edges_mirror_adjacency() {
        let graph = line_graph();
        assert!(graph.vertex("B").unwrap().adjacent().contains_key("A"));
        assert!(!graph.vertex("C").unwrap().adjacent().contains_key("B"));
        assert!(graph.vertex("C").unwrap().is_connected());
        assert!(graph.edge("B", "A").is_some());
        assert!(graph.edge("C", "B").is_none());
    }

    #[test]
    fn duplicate_vertex_keeps_adjacency() {
        let mut graph = line_graph();
        let replaced = graph.add_vertex(vertex("B", 0.011, 0.0).with_name("Bravo"));
        assert!(replaced.is_some());
        let b = graph.vertex("B").unwrap();
        assert_eq!(b.name.as_deref(), Some("Bravo"));
        assert_eq!(b.degree(), 2);
    }

    #[test]
    fn mutations_bump_version() {
        let mut graph = Graph::new();
        assert_eq!(graph.version(), 0);
        graph.add_vertex(vertex("A", 0.0, 0.0));
        graph.add_vertex(vertex("B", 0.0, 0.0));
        graph.add_edge(Edge::new("A", "B", 1.0, false)).unwrap();
        assert_eq!(graph.version(), 3);
    }

    #[test]
    fn connections_apply_all_filters() {
        let mut graph = Graph::new();
        graph.add_vertex(vertex("S", 0.0, 0.0));
        graph.add_vertex(vertex("RWY", 0.01, 0.0));
        graph.add_vertex(vertex("NARROW", 0.0, 0.01));
        graph.add_vertex(vertex("WIDE", -0.01, 0.0));
        graph.add_vertex(vertex("FAR", 1.0, 1.0));
        graph
            .add_edge(Edge::new("S", "RWY", 1.0, false).with_usage(["runway"]).unwrap())
            .unwrap();
        graph
            .add_edge(Edge::new("S", "NARROW", 1.0, false).with_usage(["taxiway_B"]).unwrap())
            .unwrap();
        graph
            .add_edge(Edge::new("S", "WIDE", 1.0, false).with_usage(["taxiway_E"]).unwrap())
            .unwrap();
        graph.add_edge(Edge::new("S", "FAR", 1.0, false)).unwrap();

        let ids = |options: &RouteOptions| -> Vec<String> {
            graph
                .connections("S", options)
                .into_iter()
                .map(|(v, _)| v.id.clone())
                .collect()
        };

        assert_eq!(ids(&RouteOptions::default()), vec!["FAR", "NARROW", "RWY", "WIDE"]);
        assert_eq!(ids(&RouteOptions::taxiway_only()), vec!["FAR", "NARROW", "WIDE"]);
        assert_eq!(
            ids(&RouteOptions::default().with_min_width(WidthCode::C)),
            vec!["FAR", "RWY", "WIDE"]
        );
        assert_eq!(
            ids(&RouteOptions::taxiway_only()
                .with_min_width(WidthCode::C)
                .with_bbox(BoundingBox::new(-0.1, -0.1, 0.1, 0.1))),
            vec!["WIDE"]
        );
    }

    #[test]
    fn nearest_vertex_can_skip_isolated_vertices() {
        let mut graph = line_graph();
        graph.add_vertex(vertex("ISOLATED", 0.03, 0.0));
        let query = Point::new(0.031, 0.0);

        assert_eq!(graph.nearest_vertex(&query, false).unwrap().id, "ISOLATED");
        let connected = graph.nearest_vertex(&query, true).unwrap();
        assert_eq!(connected.id, "B");
        assert_eq!(connected.degree, 2);
    }

    #[test]
    fn nearest_point_on_edge_projects_and_snaps() {
        let graph = line_graph();

        let on_edge = graph
            .nearest_point_on_edge(&Point::new(0.005, 0.001), false)
            .unwrap();
        assert_eq!(graph.edges()[on_edge.edge].key(), "A-B");
        assert!(on_edge.vertex.is_none());
        assert!((on_edge.point.lon - 0.005).abs() < 1e-9);
        assert_eq!(on_edge.degrees, (1, 2));

        let at_end = graph
            .nearest_point_on_edge(&Point::new(0.03, 0.0), false)
            .unwrap();
        assert_eq!(at_end.vertex.as_deref(), Some("C"));
    }

    #[test]
    fn unknown_vertex_suggests_close_names() {
        let mut graph = Graph::new();
        graph.add_vertex(vertex("TWY_A1", 0.0, 0.0));
        graph.add_vertex(vertex("TWY_A2", 0.0, 0.0));
        graph.add_vertex(vertex("RWY_07L", 0.0, 0.0));

        let err = graph.require_vertex("TWY_A3").unwrap_err();
        match err {
            Error::UnknownVertex { suggestions, .. } => {
                assert_eq!(suggestions, vec!["TWY_A1", "TWY_A2"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
