mod dinic;

pub use dinic::{DinicBackend, DinicGraph};

use crate::energy::EnergyGraph;
use crate::error::SolverError;

/// Which terminal a node stayed connected to after the cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalSide {
    Background,
    Foreground,
}

/// Flow network with a background (source) and foreground (sink) terminal
pub trait MinCutGraph {
    /// Add a node and return its id; ids are dense and start at 0
    fn add_node(&mut self) -> usize;

    /// Set the capacities linking `node` to the two terminals
    fn set_terminal_weights(
        &mut self,
        node: usize,
        to_background: f64,
        to_foreground: f64,
    ) -> Result<(), SolverError>;

    /// Add an edge with capacity `weight` from `a` to `b` and `reverse_weight` back
    fn add_edge(
        &mut self,
        a: usize,
        b: usize,
        weight: f64,
        reverse_weight: f64,
    ) -> Result<(), SolverError>;

    /// Compute the maximum flow; the minimum cut is then available through [`side_of`](Self::side_of)
    fn solve(&mut self) -> Result<f64, SolverError>;

    fn side_of(&self, node: usize) -> Result<TerminalSide, SolverError>;
}

/// Factory for min-cut graphs
///
/// Lets the segmentation session run on any max-flow implementation.
pub trait MinCutBackend: Send + Sync {
    fn create_graph(
        &self,
        node_bound: usize,
        edge_bound: usize,
    ) -> Result<Box<dyn MinCutGraph>, SolverError>;

    fn name(&self) -> &str;
}

/// Terminal side of every pixel plus the flow value of one solve
#[derive(Debug, Clone)]
pub struct CutResult {
    pub flow: f64,
    pub sides: Vec<TerminalSide>,
}

impl CutResult {
    pub fn foreground_count(&self) -> usize {
        self.sides
            .iter()
            .filter(|&&side| side == TerminalSide::Foreground)
            .count()
    }
}

/// Feed an energy graph to a backend, solve it, and read back every node's side
pub fn solve_energy(
    backend: &dyn MinCutBackend,
    energy: &EnergyGraph,
) -> Result<CutResult, SolverError> {
    let _span = tracing::debug_span!("min_cut", backend = backend.name()).entered();

    let node_count = energy.node_count();
    let mut graph = backend.create_graph(node_count, energy.edge_count())?;
    for _ in 0..node_count {
        graph.add_node();
    }
    for (node, weights) in energy.terminals.iter().enumerate() {
        graph.set_terminal_weights(node, weights.to_background, weights.to_foreground)?;
    }
    for edge in &energy.edges {
        graph.add_edge(edge.a, edge.b, edge.weight, edge.weight)?;
    }

    let flow = graph.solve()?;
    let sides = (0..node_count)
        .map(|node| graph.side_of(node))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(flow, nodes = node_count, "min cut solved");
    Ok(CutResult { flow, sides })
}
