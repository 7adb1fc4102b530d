//! Min-cost max-flow by successive shortest paths.
//!
//! Shortest augmenting paths come from Dijkstra over reduced costs. Node
//! potentials keep reduced costs non-negative on the residual graph, which
//! holds from the start because every edge cost must be non-negative.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use thiserror::Error;

/// Why a flow problem could not be solved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("node {node} out of range for {nodes} nodes")]
    NodeOutOfRange { node: usize, nodes: usize },
    #[error("edge {from} -> {to} has negative capacity {capacity} or cost {cost}")]
    InvalidEdge {
        from: usize,
        to: usize,
        capacity: i64,
        cost: i64,
    },
    #[error("no convergence after {0} augmentations")]
    IterationLimit(usize),
}

/// Handle of an edge added with [`FlowNetwork::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);

/// Total flow pushed and its cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSummary {
    pub flow: i64,
    pub cost: i64,
}

/// Directed network with integral capacities and costs.
///
/// Edges are stored in forward/backward pairs: edge `e` has its residual
/// twin at `e ^ 1`.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    out_edges: Vec<Vec<usize>>,
    edge_to: Vec<usize>,
    residual: Vec<i64>,
    capacity: Vec<i64>,
    cost: Vec<i64>,
}

impl FlowNetwork {
    pub fn new(nodes: usize) -> Self {
        Self {
            out_edges: vec![Vec::new(); nodes],
            ..Self::default()
        }
    }

    pub fn node_count(&self) -> usize {
        self.out_edges.len()
    }

    pub fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        capacity: i64,
        cost: i64,
    ) -> Result<EdgeId, FlowError> {
        let nodes = self.node_count();
        for node in [from, to] {
            if node >= nodes {
                return Err(FlowError::NodeOutOfRange { node, nodes });
            }
        }
        if capacity < 0 || cost < 0 {
            return Err(FlowError::InvalidEdge {
                from,
                to,
                capacity,
                cost,
            });
        }

        let id = self.edge_to.len();
        for (head, cap, c) in [(to, capacity, cost), (from, 0, -cost)] {
            self.edge_to.push(head);
            self.residual.push(cap);
            self.capacity.push(cap);
            self.cost.push(c);
        }
        self.out_edges[from].push(id);
        self.out_edges[to].push(id + 1);
        Ok(EdgeId(id))
    }

    /// Flow currently carried by `edge`.
    pub fn flow(&self, edge: EdgeId) -> i64 {
        self.capacity[edge.0] - self.residual[edge.0]
    }

    /// Push as much flow as possible from `source` to `sink` at minimum cost.
    ///
    /// Each augmentation carries at least one unit, so `max_augmentations`
    /// only trips on a network whose capacities exceed it.
    pub fn min_cost_max_flow(
        &mut self,
        source: usize,
        sink: usize,
        max_augmentations: usize,
    ) -> Result<FlowSummary, FlowError> {
        let nodes = self.node_count();
        for node in [source, sink] {
            if node >= nodes {
                return Err(FlowError::NodeOutOfRange { node, nodes });
            }
        }
        let mut summary = FlowSummary::default();
        if source == sink {
            return Ok(summary);
        }

        let mut potential = vec![0_i64; nodes];
        for _ in 0..max_augmentations {
            let Some((dist, prev_edge)) = self.shortest_path(source, sink, &potential) else {
                return Ok(summary);
            };
            for (p, d) in potential.iter_mut().zip(&dist) {
                if *d < i64::MAX {
                    *p += d;
                }
            }

            // Bottleneck along the path, walked back from the sink.
            let mut push = i64::MAX;
            let mut node = sink;
            while node != source {
                let edge = prev_edge[node];
                push = push.min(self.residual[edge]);
                node = self.edge_to[edge ^ 1];
            }

            let mut node = sink;
            while node != source {
                let edge = prev_edge[node];
                self.residual[edge] -= push;
                self.residual[edge ^ 1] += push;
                summary.cost += push * self.cost[edge];
                node = self.edge_to[edge ^ 1];
            }
            summary.flow += push;
        }

        // Converged exactly on the last allowed augmentation?
        if self.shortest_path(source, sink, &potential).is_none() {
            Ok(summary)
        } else {
            Err(FlowError::IterationLimit(max_augmentations))
        }
    }

    /// Dijkstra over reduced costs. Returns distances and the edge that
    /// reached each node, or `None` when the sink is unreachable.
    fn shortest_path(
        &self,
        source: usize,
        sink: usize,
        potential: &[i64],
    ) -> Option<(Vec<i64>, Vec<usize>)> {
        let n = self.node_count();
        let mut dist = vec![i64::MAX; n];
        let mut prev_edge = vec![usize::MAX; n];
        dist[source] = 0;

        // Min-heap: (cost, node). Node index breaks ties deterministically.
        let mut heap: BinaryHeap<Reverse<(i64, usize)>> = BinaryHeap::new();
        heap.push(Reverse((0, source)));

        while let Some(Reverse((d, node))) = heap.pop() {
            // Skip stale heap entries.
            if d > dist[node] {
                continue;
            }
            for &edge in &self.out_edges[node] {
                if self.residual[edge] <= 0 {
                    continue;
                }
                let next = self.edge_to[edge];
                let reduced = self.cost[edge] + potential[node] - potential[next];
                let candidate = d.saturating_add(reduced);
                if candidate < dist[next] {
                    dist[next] = candidate;
                    prev_edge[next] = edge;
                    heap.push(Reverse((candidate, next)));
                }
            }
        }

        (dist[sink] < i64::MAX).then_some((dist, prev_edge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_cheaper_parallel_route_first() {
        // 0 -> 1 -> 3 costs 2, 0 -> 2 -> 3 costs 10; each path carries 1.
        let mut net = FlowNetwork::new(4);
        let cheap = net.add_edge(0, 1, 1, 1).unwrap();
        net.add_edge(1, 3, 1, 1).unwrap();
        let dear = net.add_edge(0, 2, 5, 5).unwrap();
        net.add_edge(2, 3, 5, 5).unwrap();

        let summary = net.min_cost_max_flow(0, 3, 100).unwrap();
        assert_eq!(summary, FlowSummary { flow: 6, cost: 2 + 5 * 10 });
        assert_eq!(net.flow(cheap), 1);
        assert_eq!(net.flow(dear), 5);
    }

    #[test]
    fn reroutes_through_residual_edges() {
        // Classic case where the first shortest path must be partly undone.
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, 1, 1).unwrap();
        net.add_edge(0, 2, 1, 5).unwrap();
        net.add_edge(1, 2, 1, 1).unwrap();
        net.add_edge(1, 3, 1, 5).unwrap();
        net.add_edge(2, 3, 1, 1).unwrap();
        let summary = net.min_cost_max_flow(0, 3, 100).unwrap();
        assert_eq!(summary.flow, 2);
        assert_eq!(summary.cost, 12);
    }

    #[test]
    fn rejects_bad_edges_and_nodes() {
        let mut net = FlowNetwork::new(2);
        assert!(matches!(
            net.add_edge(0, 5, 1, 1),
            Err(FlowError::NodeOutOfRange { node: 5, nodes: 2 })
        ));
        assert!(matches!(
            net.add_edge(0, 1, -1, 1),
            Err(FlowError::InvalidEdge { .. })
        ));
        assert!(net.min_cost_max_flow(0, 9, 10).is_err());
    }

    #[test]
    fn iteration_guard_trips() {
        let mut net = FlowNetwork::new(3);
        net.add_edge(0, 1, 1, 0).unwrap();
        net.add_edge(0, 2, 1, 1).unwrap();
        net.add_edge(1, 2, 1, 0).unwrap();
        net.add_edge(2, 1, 5, 0).unwrap();
        // Two unit paths to node 1; only one augmentation allowed.
        assert_eq!(
            net.min_cost_max_flow(0, 1, 1),
            Err(FlowError::IterationLimit(1))
        );
    }

    #[test]
    fn disconnected_sink_carries_nothing() {
        let mut net = FlowNetwork::new(3);
        net.add_edge(0, 1, 4, 1).unwrap();
        assert_eq!(net.min_cost_max_flow(0, 2, 10).unwrap(), FlowSummary::default());
    }
}
