use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::graph::{Graph, RouteOptions, VertexId};

/// Run Dijkstra's algorithm over the whole graph, using edge weight only.
///
/// Returns `None` when `goal` cannot be reached through edges accepted by
/// `options`.
pub fn find_route_dijkstra(
    graph: &Graph,
    start: &str,
    goal: &str,
    options: &RouteOptions,
) -> Option<Vec<VertexId>> {
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start.to_string()]);
    }

    let mut distances: HashMap<VertexId, f64> = HashMap::new();
    let mut parents: HashMap<VertexId, Option<VertexId>> = HashMap::new();
    let mut queue = BinaryHeap::new();

    distances.insert(start.to_string(), 0.0);
    parents.insert(start.to_string(), None);
    queue.push(QueueEntry::new(start.to_string(), 0.0));

    while let Some(entry) = queue.pop() {
        let current_distance = match distances.get(&entry.node) {
            Some(distance) if *distance < entry.cost.0 => continue,
            Some(distance) => *distance,
            None => continue,
        };

        if entry.node == goal {
            return Some(reconstruct_path(&parents, start, goal));
        }

        for (next, edge) in graph.connections(&entry.node, options) {
            let next_cost = current_distance + edge.weight;
            if next_cost < *distances.get(&next.id).unwrap_or(&f64::INFINITY) {
                distances.insert(next.id.clone(), next_cost);
                parents.insert(next.id.clone(), Some(entry.node.clone()));
                queue.push(QueueEntry::new(next.id.clone(), next_cost));
            }
        }
    }

    None
}

/// Dense adjacency and heuristic matrices over a candidate vertex set.
///
/// The cache remembers the graph version, the candidate list and the options
/// it was built for; [`AStarCache::ensure`] rebuilds it whenever any of them
/// changes, so a stale matrix is never searched.
#[derive(Debug, Clone, Default)]
pub struct AStarCache {
    version: Option<u64>,
    options: RouteOptions,
    ids: Vec<VertexId>,
    index: HashMap<VertexId, usize>,
    weights: Vec<f64>,
    heuristic: Vec<Option<f64>>,
    rebuilds: u64,
}

impl AStarCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices covered by the matrices.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// How many times the matrices were rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Whether the cache matches the current graph state and query.
    pub fn is_valid_for(&self, graph: &Graph, candidates: &[VertexId], options: &RouteOptions) -> bool {
        self.version == Some(graph.version()) && self.options == *options && self.ids == candidates
    }

    /// Rebuild the matrices unless they already match `graph`, `candidates` and `options`.
    pub fn ensure(&mut self, graph: &Graph, candidates: &[VertexId], options: &RouteOptions) {
        if self.is_valid_for(graph, candidates, options) {
            return;
        }

        let n = candidates.len();
        self.ids = candidates.to_vec();
        self.index = self
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        self.weights = vec![f64::INFINITY; n * n];
        self.heuristic = vec![None; n * n];

        for (i, id) in self.ids.iter().enumerate() {
            for (next, edge) in graph.connections(id, options) {
                if let Some(&j) = self.index.get(&next.id) {
                    let slot = &mut self.weights[i * n + j];
                    *slot = slot.min(edge.weight);
                }
            }
        }

        for i in 0..n {
            self.weights[i * n + i] = 0.0;
        }

        self.version = Some(graph.version());
        self.options = options.clone();
        self.rebuilds += 1;
        debug!(vertices = n, version = graph.version(), "rebuilt A* matrices");
    }

    fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[i * self.ids.len() + j]
    }

    /// Straight-line distance between two candidates, cached both ways.
    fn heuristic(&mut self, graph: &Graph, i: usize, j: usize) -> f64 {
        let n = self.ids.len();
        if let Some(value) = self.heuristic[i * n + j] {
            return value;
        }

        let value = match (graph.vertex(&self.ids[i]), graph.vertex(&self.ids[j])) {
            (Some(a), Some(b)) => a.point.distance_km(&b.point),
            _ => 0.0,
        };
        self.heuristic[i * n + j] = Some(value);
        self.heuristic[j * n + i] = Some(value);
        value
    }
}

/// Run A* over the dense matrices held by `cache`.
///
/// The cache must have been prepared with [`AStarCache::ensure`] for the
/// same graph. Ties on priority are broken by insertion order, which makes
/// the result deterministic. Dead ends are closed and the search carries on
/// with the remaining open nodes.
pub fn find_route_a_star(
    graph: &Graph,
    cache: &mut AStarCache,
    start: &str,
    goal: &str,
) -> Option<Vec<VertexId>> {
    let (&s, &g) = (cache.index.get(start)?, cache.index.get(goal)?);
    if s == g {
        return Some(vec![start.to_string()]);
    }

    let n = cache.len();
    let mut g_score = vec![f64::INFINITY; n];
    let mut parents: Vec<Option<usize>> = vec![None; n];
    let mut closed = vec![false; n];
    let mut queue = BinaryHeap::new();
    let mut seq = 0u64;

    g_score[s] = 0.0;
    let estimate = cache.heuristic(graph, s, g);
    queue.push(AStarEntry::new(s, 0.0, estimate, seq));

    while let Some(entry) = queue.pop() {
        let current = entry.node;
        if closed[current] || entry.cost.0 > g_score[current] {
            continue;
        }

        if current == g {
            let mut path = vec![cache.ids[g].clone()];
            let mut cursor = parents[g];
            while let Some(node) = cursor {
                path.push(cache.ids[node].clone());
                cursor = parents[node];
            }
            path.reverse();
            return Some(path);
        }

        closed[current] = true;

        for next in 0..n {
            if next == current {
                continue;
            }
            let weight = cache.weight(current, next);
            if !weight.is_finite() {
                continue;
            }

            let tentative = g_score[current] + weight;
            if tentative < g_score[next] {
                g_score[next] = tentative;
                parents[next] = Some(current);
                // A shorter path reopens a closed node.
                closed[next] = false;
                seq += 1;
                let estimate = cache.heuristic(graph, next, g);
                queue.push(AStarEntry::new(next, tentative, estimate, seq));
            }
        }
    }

    None
}

/// Plain O(n²) Dijkstra scanning the candidate list for the closest open node.
///
/// Only edges between candidates are followed. Ties go to the first
/// candidate in list order.
pub fn find_route_scan_dijkstra(
    graph: &Graph,
    candidates: &[VertexId],
    start: &str,
    goal: &str,
    options: &RouteOptions,
) -> Option<Vec<VertexId>> {
    let index: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let (&s, &g) = (index.get(start)?, index.get(goal)?);
    if s == g {
        return Some(vec![start.to_string()]);
    }

    let n = candidates.len();
    let mut distance = vec![f64::INFINITY; n];
    let mut parents: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    distance[s] = 0.0;

    loop {
        let mut current = None;
        for i in 0..n {
            if visited[i] || !distance[i].is_finite() {
                continue;
            }
            match current {
                Some(c) if distance[c] <= distance[i] => {}
                _ => current = Some(i),
            }
        }

        let Some(u) = current else {
            return None;
        };
        if u == g {
            break;
        }
        visited[u] = true;

        for (next, edge) in graph.connections(&candidates[u], options) {
            let Some(&v) = index.get(next.id.as_str()) else {
                continue;
            };
            if visited[v] {
                continue;
            }
            let alternative = distance[u] + edge.weight;
            if alternative < distance[v] {
                distance[v] = alternative;
                parents[v] = Some(u);
            }
        }
    }

    let mut path = vec![candidates[g].clone()];
    let mut cursor = parents[g];
    while let Some(node) = cursor {
        path.push(candidates[node].clone());
        cursor = parents[node];
    }
    path.reverse();
    Some(path)
}

/// Sum of edge weights along `path`, or `None` if a hop has no usable edge.
pub fn path_weight(graph: &Graph, path: &[VertexId], options: &RouteOptions) -> Option<f64> {
    let mut total = 0.0;
    for pair in path.windows(2) {
        let edge = graph.edge(&pair[0], &pair[1])?;
        let target = graph.vertex(&pair[1])?;
        if !options.allows(edge, target) {
            return None;
        }
        total += edge.weight;
    }
    Some(total)
}

fn reconstruct_path(
    parents: &HashMap<VertexId, Option<VertexId>>,
    start: &str,
    goal: &str,
) -> Vec<VertexId> {
    let mut path = Vec::new();
    let mut current = Some(goal.to_string());
    while let Some(node) = current {
        let done = node == start;
        current = parents.get(&node).cloned().flatten();
        path.push(node);
        if done {
            break;
        }
    }
    path.reverse();
    path
}

#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct FloatOrd(pub(crate) f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    node: VertexId,
    cost: FloatOrd,
}

impl QueueEntry {
    fn new(node: VertexId, cost: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct AStarEntry {
    node: usize,
    cost: FloatOrd,
    estimate: FloatOrd,
    seq: u64,
}

impl AStarEntry {
    fn new(node: usize, cost: f64, heuristic: f64, seq: u64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
            estimate: FloatOrd(cost + heuristic),
            seq,
        }
    }
}

impl Ord for AStarEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for AStarEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;
    use crate::graph::{Edge, Vertex};

    fn ids(names: &[&str]) -> Vec<VertexId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// S has a cheap dead-end branch towards D and a longer branch to G.
    fn dead_end_graph() -> Graph {
        let mut graph = Graph::new();
        for (id, lon) in [("S", 0.0), ("D", 0.001), ("M", 0.002), ("G", 0.003)] {
            graph.add_vertex(Vertex::new(id, Point::new(lon, 0.0)));
        }
        graph.add_edge(Edge::new("S", "D", 0.1, true)).unwrap();
        graph.add_edge(Edge::new("S", "M", 0.3, true)).unwrap();
        graph.add_edge(Edge::new("M", "G", 0.3, true)).unwrap();
        graph
    }

    #[test]
    fn dijkstra_prefers_lighter_detour() {
        let mut graph = Graph::new();
        for id in ["A", "B", "C"] {
            graph.add_vertex(Vertex::new(id, Point::new(0.0, 0.0)));
        }
        graph.add_edge(Edge::new("A", "C", 5.0, false)).unwrap();
        graph.add_edge(Edge::new("A", "B", 1.0, false)).unwrap();
        graph.add_edge(Edge::new("B", "C", 1.0, false)).unwrap();

        let route = find_route_dijkstra(&graph, "A", "C", &RouteOptions::default()).unwrap();
        assert_eq!(route, ids(&["A", "B", "C"]));
        assert_eq!(path_weight(&graph, &route, &RouteOptions::default()), Some(2.0));
    }

    #[test]
    fn dijkstra_respects_edge_direction() {
        let graph = dead_end_graph();
        assert!(find_route_dijkstra(&graph, "G", "S", &RouteOptions::default()).is_none());
    }

    #[test]
    fn a_star_continues_past_dead_ends() {
        let graph = dead_end_graph();
        let candidates = ids(&["D", "G", "M", "S"]);
        let mut cache = AStarCache::new();
        cache.ensure(&graph, &candidates, &RouteOptions::default());

        let route = find_route_a_star(&graph, &mut cache, "S", "G").unwrap();
        assert_eq!(route, ids(&["S", "M", "G"]));
    }

    #[test]
    fn a_star_reports_unreachable_goal() {
        let graph = dead_end_graph();
        let candidates = ids(&["D", "G", "M", "S"]);
        let mut cache = AStarCache::new();
        cache.ensure(&graph, &candidates, &RouteOptions::default());
        assert!(find_route_a_star(&graph, &mut cache, "G", "S").is_none());
        assert!(find_route_a_star(&graph, &mut cache, "S", "UNKNOWN").is_none());
    }

    #[test]
    fn cache_rebuilds_only_when_inputs_change() {
        let mut graph = dead_end_graph();
        let candidates = ids(&["D", "G", "M", "S"]);
        let options = RouteOptions::default();
        let mut cache = AStarCache::new();

        cache.ensure(&graph, &candidates, &options);
        cache.ensure(&graph, &candidates, &options);
        assert_eq!(cache.rebuilds(), 1);

        graph.add_vertex(Vertex::new("X", Point::new(0.0, 0.0)));
        assert!(!cache.is_valid_for(&graph, &candidates, &options));
        cache.ensure(&graph, &candidates, &options);
        assert_eq!(cache.rebuilds(), 2);

        cache.ensure(&graph, &candidates, &RouteOptions::taxiway_only());
        assert_eq!(cache.rebuilds(), 3);
    }

    #[test]
    fn cache_picks_up_new_edges_after_rebuild() {
        let mut graph = dead_end_graph();
        let candidates = ids(&["D", "G", "M", "S"]);
        let mut cache = AStarCache::new();
        cache.ensure(&graph, &candidates, &RouteOptions::default());

        graph.add_edge(Edge::new("D", "G", 0.1, true)).unwrap();
        cache.ensure(&graph, &candidates, &RouteOptions::default());
        let route = find_route_a_star(&graph, &mut cache, "S", "G").unwrap();
        assert_eq!(route, ids(&["S", "D", "G"]));
    }

    #[test]
    fn scan_dijkstra_stays_within_candidates() {
        let graph = dead_end_graph();
        let all = ids(&["D", "G", "M", "S"]);
        let route = find_route_scan_dijkstra(&graph, &all, "S", "G", &RouteOptions::default());
        assert_eq!(route, Some(ids(&["S", "M", "G"])));

        let without_m = ids(&["D", "G", "S"]);
        assert!(
            find_route_scan_dijkstra(&graph, &without_m, "S", "G", &RouteOptions::default())
                .is_none()
        );
    }

    #[test]
    fn path_weight_rejects_missing_hops() {
        let graph = dead_end_graph();
        let options = RouteOptions::default();
        assert_eq!(path_weight(&graph, &ids(&["S"]), &options), Some(0.0));
        assert!(path_weight(&graph, &ids(&["S", "G"]), &options).is_none());
    }
}
