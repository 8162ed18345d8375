use super::{MinCutBackend, MinCutGraph, TerminalSide};
use crate::error::SolverError;
use std::collections::VecDeque;

/// Residual capacity below which an edge counts as saturated
const CAPACITY_EPS: f64 = 1e-9;

const SOURCE: usize = 0;
const SINK: usize = 1;
const UNREACHED: usize = usize::MAX;

/// Default backend: Dinic's blocking-flow max-flow
#[derive(Debug, Clone, Copy, Default)]
pub struct DinicBackend;

impl MinCutBackend for DinicBackend {
    fn create_graph(
        &self,
        node_bound: usize,
        edge_bound: usize,
    ) -> Result<Box<dyn MinCutGraph>, SolverError> {
        Ok(Box::new(DinicGraph::with_capacity(node_bound, edge_bound)?))
    }

    fn name(&self) -> &str {
        "dinic"
    }
}

#[derive(Debug, Clone, Copy)]
struct ResidualEdge {
    to: usize,
    capacity: f64,
}

/// Residual network; the background terminal is the source, the foreground terminal the sink
///
/// Edges are stored in forward/reverse pairs so that `e ^ 1` is the
/// partner of edge `e`. Terminal weights are normalized per node by moving
/// their common part into `flow_offset`, which leaves the cut unchanged.
#[derive(Debug, Clone)]
pub struct DinicGraph {
    adjacency: Vec<Vec<usize>>,
    edges: Vec<ResidualEdge>,
    flow_offset: f64,
    background_side: Option<Vec<bool>>,
}

impl DinicGraph {
    pub fn with_capacity(node_bound: usize, edge_bound: usize) -> Result<Self, SolverError> {
        let mut adjacency = Vec::new();
        adjacency
            .try_reserve(node_bound + 2)
            .map_err(|_| SolverError::Allocation(node_bound + 2))?;
        adjacency.push(Vec::new());
        adjacency.push(Vec::new());

        let mut edges = Vec::new();
        edges
            .try_reserve(edge_bound.saturating_mul(2))
            .map_err(|_| SolverError::Allocation(edge_bound.saturating_mul(2)))?;

        Ok(Self {
            adjacency,
            edges,
            flow_offset: 0.0,
            background_side: None,
        })
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len() - 2
    }

    fn vertex(&self, node: usize) -> Result<usize, SolverError> {
        if node >= self.node_count() {
            return Err(SolverError::NodeOutOfRange {
                node,
                count: self.node_count(),
            });
        }
        Ok(node + 2)
    }

    fn ensure_open(&self) -> Result<(), SolverError> {
        if self.background_side.is_some() {
            return Err(SolverError::AlreadySolved);
        }
        Ok(())
    }

    fn push_pair(&mut self, from: usize, to: usize, forward: f64, backward: f64) {
        let e = self.edges.len();
        self.edges.push(ResidualEdge {
            to,
            capacity: forward,
        });
        self.edges.push(ResidualEdge {
            to: from,
            capacity: backward,
        });
        self.adjacency[from].push(e);
        self.adjacency[to].push(e + 1);
    }

    /// Level graph by BFS over unsaturated edges; false once the sink is unreachable
    fn build_levels(&self, level: &mut [usize]) -> bool {
        level.fill(UNREACHED);
        level[SOURCE] = 0;
        let mut queue = VecDeque::from([SOURCE]);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adjacency[v] {
                let edge = self.edges[e];
                if edge.capacity > CAPACITY_EPS && level[edge.to] == UNREACHED {
                    level[edge.to] = level[v] + 1;
                    queue.push_back(edge.to);
                }
            }
        }
        level[SINK] != UNREACHED
    }

    /// Push one augmenting path through the level graph, iteratively.
    fn augment(&mut self, level: &mut [usize], cursor: &mut [usize], path: &mut Vec<usize>) -> f64 {
        path.clear();
        let mut v = SOURCE;
        loop {
            if v == SINK {
                let bottleneck = path
                    .iter()
                    .map(|&e| self.edges[e].capacity)
                    .fold(f64::INFINITY, f64::min);
                for &e in path.iter() {
                    self.edges[e].capacity -= bottleneck;
                    self.edges[e ^ 1].capacity += bottleneck;
                }
                return bottleneck;
            }

            let mut advanced = false;
            while cursor[v] < self.adjacency[v].len() {
                let e = self.adjacency[v][cursor[v]];
                let edge = self.edges[e];
                if edge.capacity > CAPACITY_EPS
                    && level[edge.to] != UNREACHED
                    && level[edge.to] == level[v] + 1
                {
                    path.push(e);
                    v = edge.to;
                    advanced = true;
                    break;
                }
                cursor[v] += 1;
            }
            if advanced {
                continue;
            }

            // Dead end: prune it from this phase and step back.
            level[v] = UNREACHED;
            match path.pop() {
                Some(e) => {
                    v = self.edges[e ^ 1].to;
                    cursor[v] += 1;
                }
                None => return 0.0,
            }
        }
    }
}

impl MinCutGraph for DinicGraph {
    fn add_node(&mut self) -> usize {
        self.adjacency.push(Vec::new());
        self.adjacency.len() - 3
    }

    fn set_terminal_weights(
        &mut self,
        node: usize,
        to_background: f64,
        to_foreground: f64,
    ) -> Result<(), SolverError> {
        self.ensure_open()?;
        let v = self.vertex(node)?;
        for weight in [to_background, to_foreground] {
            if !weight.is_finite() {
                return Err(SolverError::InvalidCapacity(weight));
            }
        }

        let common = to_background.min(to_foreground);
        self.flow_offset += common;
        let (source_cap, sink_cap) = (to_background - common, to_foreground - common);
        if source_cap > 0.0 {
            self.push_pair(SOURCE, v, source_cap, 0.0);
        }
        if sink_cap > 0.0 {
            self.push_pair(v, SINK, sink_cap, 0.0);
        }
        Ok(())
    }

    fn add_edge(
        &mut self,
        a: usize,
        b: usize,
        weight: f64,
        reverse_weight: f64,
    ) -> Result<(), SolverError> {
        self.ensure_open()?;
        let (va, vb) = (self.vertex(a)?, self.vertex(b)?);
        for w in [weight, reverse_weight] {
            if !w.is_finite() || w < 0.0 {
                return Err(SolverError::InvalidCapacity(w));
            }
        }
        self.push_pair(va, vb, weight, reverse_weight);
        Ok(())
    }

    fn solve(&mut self) -> Result<f64, SolverError> {
        self.ensure_open()?;

        let vertex_count = self.adjacency.len();
        let mut level = vec![UNREACHED; vertex_count];
        let mut cursor = vec![0usize; vertex_count];
        let mut path = Vec::new();
        let mut flow = 0.0;
        let mut phases = 0usize;

        while self.build_levels(&mut level) {
            phases += 1;
            cursor.fill(0);
            loop {
                let pushed = self.augment(&mut level, &mut cursor, &mut path);
                if pushed <= 0.0 {
                    break;
                }
                flow += pushed;
            }
        }

        // Whatever the source still reaches after the last phase is its side of the cut.
        self.build_levels(&mut level);
        self.background_side = Some(level.iter().map(|&l| l != UNREACHED).collect());

        tracing::trace!(phases, flow, offset = self.flow_offset, "dinic finished");
        Ok(flow + self.flow_offset)
    }

    fn side_of(&self, node: usize) -> Result<TerminalSide, SolverError> {
        let v = self.vertex(node)?;
        let reached = self
            .background_side
            .as_ref()
            .ok_or(SolverError::NotSolved)?;
        Ok(if reached[v] {
            TerminalSide::Background
        } else {
            TerminalSide::Foreground
        })
    }
}
