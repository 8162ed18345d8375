use crate::segmentation::PixelClass;
use thiserror::Error;

/// Errors raised by the segmentation session and its collaborators
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("no bounding rectangle has been committed")]
    NotInitialized,

    #[error("a bounding rectangle is already committed; reset the session first")]
    RectAlreadyCommitted,

    #[error("rectangle {x},{y} {width}x{height} does not cover any pixel of the image")]
    InvalidRect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("pixel ({x}, {y}) is outside the {width}x{height} image")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("the {0} pixel population is empty")]
    EmptyPopulation(PixelClass),

    #[error("a mixture model needs at least one component, got {0}")]
    InvalidComponentCount(usize),

    #[error("assignment has {actual} entries for {expected} colors")]
    AssignmentLength { expected: usize, actual: usize },

    #[error("component {component} does not exist (mixture has {count})")]
    ComponentOutOfRange { component: usize, count: usize },

    #[error("min-cut solver failed: {0}")]
    Solver(#[from] SolverError),
}

/// Failures reported by a min-cut backend
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("node {node} is out of range (graph has {count} nodes)")]
    NodeOutOfRange { node: usize, count: usize },

    #[error("invalid edge capacity {0}")]
    InvalidCapacity(f64),

    #[error("failed to allocate graph storage for {0} elements")]
    Allocation(usize),

    #[error("the graph has already been solved")]
    AlreadySolved,

    #[error("the graph has not been solved yet")]
    NotSolved,
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
