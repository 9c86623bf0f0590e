#![allow(dead_code)]

use std::path::PathBuf;

use emitsim_lib::{load_graph_from_path, Edge, Graph, ImportMode, Point, Vertex};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

pub fn surface_graph() -> Graph {
    let (graph, report) = load_graph_from_path(&fixtures_dir().join("surface.json"), ImportMode::Strict)
        .expect("surface fixture loads");
    assert!(report.is_clean());
    graph
}

pub fn grid_id(row: usize, col: usize) -> String {
    format!("r{row}c{col}")
}

/// Square grid about 1.1 km apart with a few missing links. Edge weights
/// are the geodesic length stretched by a small factor, so the straight
/// line remains an admissible estimate.
pub fn grid_graph(size: usize) -> Graph {
    let mut graph = Graph::new();
    for row in 0..size {
        for col in 0..size {
            let point = Point::new(10.0 + col as f64 * 0.01, 45.0 + row as f64 * 0.01);
            graph.add_vertex(Vertex::new(grid_id(row, col), point));
        }
    }

    let mut link = |graph: &mut Graph, a: (usize, usize), b: (usize, usize)| {
        let from = graph.vertex(&grid_id(a.0, a.1)).expect("vertex").point;
        let to = graph.vertex(&grid_id(b.0, b.1)).expect("vertex").point;
        let stretch = 1.0 + ((a.0 * 7 + a.1 * 3) % 5) as f64 * 0.1;
        let weight = from.distance_km(&to) * stretch;
        graph
            .add_edge(Edge::new(grid_id(a.0, a.1), grid_id(b.0, b.1), weight, false))
            .expect("grid edge");
    };

    for row in 0..size {
        for col in 0..size {
            if col + 1 < size {
                link(&mut graph, (row, col), (row, col + 1));
            }
            if row + 1 < size && (row * 3 + col * 5) % 7 != 0 {
                link(&mut graph, (row, col), (row + 1, col));
            }
        }
    }
    graph
}
