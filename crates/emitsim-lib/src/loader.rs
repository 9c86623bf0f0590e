//! JSON graph documents and bulk import into a [`Graph`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::geo::Point;
use crate::graph::{Edge, Graph, Restriction, Vertex, VertexKind};

/// How structural errors are handled during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Abort on the first structural error.
    #[default]
    Strict,
    /// Skip offending edges and record them in the report.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    #[serde(default)]
    pub kind: VertexKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usage: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<Restriction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub start: String,
    pub end: String,
    /// Great-circle length of the edge when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub directed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usage: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polyline: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<Restriction>,
}

/// Serialized form of a graph as produced by airway and taxiway loaders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub vertices: Vec<VertexRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// An edge left out of a lenient import.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEdge {
    pub edge: String,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub vertices: usize,
    pub edges: usize,
    pub skipped: Vec<SkippedEdge>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

fn build_vertex(record: &VertexRecord) -> Vertex {
    let mut point = Point::new(record.lon, record.lat);
    if let Some(alt) = record.alt {
        point = point.with_alt(alt);
    }
    let mut vertex = Vertex::new(record.id.clone(), point)
        .with_kind(record.kind.clone())
        .with_usage(record.usage.iter().cloned());
    if let Some(name) = &record.name {
        vertex = vertex.with_name(name.clone());
    }
    if let Some(restriction) = record.restriction {
        vertex = vertex.with_restriction(restriction);
    }
    vertex
}

fn build_edge(graph: &Graph, record: &EdgeRecord) -> Result<Edge> {
    let weight = match record.weight {
        Some(weight) => weight,
        None => {
            let start = graph.vertex(&record.start).ok_or_else(|| Error::EdgeEndpointNotFound {
                edge: format!("{}-{}", record.start, record.end),
                vertex: record.start.clone(),
            })?;
            let end = graph.vertex(&record.end).ok_or_else(|| Error::EdgeEndpointNotFound {
                edge: format!("{}-{}", record.start, record.end),
                vertex: record.end.clone(),
            })?;
            start.point.distance_km(&end.point)
        }
    };

    let mut edge = Edge::new(record.start.clone(), record.end.clone(), weight, record.directed)
        .with_usage(&record.usage)?
        .with_polyline(record.polyline.clone());
    if let Some(name) = &record.name {
        edge = edge.with_name(name.clone());
    }
    if let Some(restriction) = record.restriction {
        edge = edge.with_restriction(restriction);
    }
    Ok(edge)
}

/// Populate `graph` from a document.
///
/// Vertices are inserted first so that edge order in the document does not
/// matter.
pub fn import_document(graph: &mut Graph, doc: &GraphDocument, mode: ImportMode) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for record in &doc.vertices {
        graph.add_vertex(build_vertex(record));
        report.vertices += 1;
    }

    for record in &doc.edges {
        let outcome = build_edge(graph, record).and_then(|edge| graph.add_edge(edge));
        match (outcome, mode) {
            (Ok(()), _) => report.edges += 1,
            (Err(err), ImportMode::Strict) => return Err(err),
            (Err(err), ImportMode::Lenient) => {
                let key = format!("{}-{}", record.start, record.end);
                warn!(edge = %key, error = %err, "skipping edge");
                report.skipped.push(SkippedEdge {
                    edge: key,
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        vertices = report.vertices,
        edges = report.edges,
        skipped = report.skipped.len(),
        "graph imported"
    );
    Ok(report)
}

/// Build a new graph from a document.
pub fn load_graph(doc: &GraphDocument, mode: ImportMode) -> Result<(Graph, ImportReport)> {
    let mut graph = Graph::new();
    let report = import_document(&mut graph, doc, mode)?;
    Ok((graph, report))
}

/// Read a JSON graph document from disk and build a graph from it.
pub fn load_graph_from_path(path: &Path, mode: ImportMode) -> Result<(Graph, ImportReport)> {
    let content = std::fs::read_to_string(path)?;
    let doc: GraphDocument = serde_json::from_str(&content)?;
    load_graph(&doc, mode)
}
