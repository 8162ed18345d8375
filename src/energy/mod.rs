//! Unary and pairwise costs of the segmentation energy.
//!
//! Both the contrast estimate and the graph edges walk the same forward
//! neighbor table, so every undirected pixel pair is visited exactly once.

use crate::gmm::{pixel_color, Color, GaussianMixture};
use crate::segmentation::{GrabCutConfig, Matte, MatteLabel};
use image::RgbImage;
use rayon::prelude::*;
use std::f64::consts::FRAC_1_SQRT_2;

/// Forward neighbor offset with its geometric compensation factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub dx: i32,
    pub dy: i32,
    /// Reciprocal of the step length
    pub factor: f64,
}

/// Right, down-left, down and down-right
pub const NEIGHBORS: [Neighbor; 4] = [
    Neighbor {
        dx: 1,
        dy: 0,
        factor: 1.0,
    },
    Neighbor {
        dx: -1,
        dy: 1,
        factor: FRAC_1_SQRT_2,
    },
    Neighbor {
        dx: 0,
        dy: 1,
        factor: 1.0,
    },
    Neighbor {
        dx: 1,
        dy: 1,
        factor: FRAC_1_SQRT_2,
    },
];

impl Neighbor {
    fn of(&self, x: u32, y: u32, width: u32, height: u32) -> Option<(u32, u32)> {
        let nx = x as i64 + self.dx as i64;
        let ny = y as i64 + self.dy as i64;
        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
            return None;
        }
        Some((nx as u32, ny as u32))
    }
}

fn color_distance_sq(image: &RgbImage, a: (u32, u32), b: (u32, u32)) -> f64 {
    let diff = pixel_color(image.get_pixel(a.0, a.1)) - pixel_color(image.get_pixel(b.0, b.1));
    diff.norm_squared()
}

/// Contrast scale `1 / (2 * mean squared neighbor color distance)`.
///
/// A flat image (mean distance within `f64::EPSILON` of zero) or one without
/// neighbor pairs yields 0, which turns every pairwise weight into
/// `gamma * factor`.
pub fn contrast_beta(image: &RgbImage) -> f64 {
    let (width, height) = image.dimensions();
    // Row sums are combined sequentially, in row order.
    let rows: Vec<(f64, usize)> = (0..height)
        .into_par_iter()
        .map(|y| {
            let mut total = 0.0;
            let mut pairs = 0usize;
            for x in 0..width {
                for neighbor in &NEIGHBORS {
                    if let Some(other) = neighbor.of(x, y, width, height) {
                        total += color_distance_sq(image, (x, y), other);
                        pairs += 1;
                    }
                }
            }
            (total, pairs)
        })
        .collect();
    let (total, pairs) = rows
        .iter()
        .fold((0.0, 0usize), |acc, row| (acc.0 + row.0, acc.1 + row.1));

    if pairs == 0 {
        return 0.0;
    }
    let mean = total / pairs as f64;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    1.0 / (2.0 * mean)
}

/// Smoothness cost between two neighbors
pub fn pairwise_weight(gamma: f64, beta: f64, factor: f64, distance_sq: f64) -> f64 {
    gamma * factor * (-beta * distance_sq).exp()
}

/// Capacities from one pixel node to the two terminals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalWeights {
    /// Paid when the pixel ends up on the foreground side
    pub to_background: f64,
    /// Paid when the pixel ends up on the background side
    pub to_foreground: f64,
}

/// Symmetric smoothness edge between two pixel nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseEdge {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

/// One iteration's energy, indexed by row-major pixel index
#[derive(Debug, Clone)]
pub struct EnergyGraph {
    pub beta: f64,
    pub terminals: Vec<TerminalWeights>,
    pub edges: Vec<PairwiseEdge>,
}

impl EnergyGraph {
    pub fn node_count(&self) -> usize {
        self.terminals.len()
    }

    /// Pairwise edges plus the two terminal edges of every node
    pub fn edge_count(&self) -> usize {
        self.edges.len() + 2 * self.terminals.len()
    }
}

/// Cost of assigning `label`'s pixel to each terminal.
///
/// Cutting a probable pixel away from a terminal costs the negative
/// log-likelihood under the opposite class's model.
pub fn unary_weights(
    label: MatteLabel,
    color: &Color,
    background: &GaussianMixture,
    foreground: &GaussianMixture,
    hard_weight: f64,
) -> TerminalWeights {
    match label {
        MatteLabel::DefiniteBackground => TerminalWeights {
            to_background: hard_weight,
            to_foreground: 0.0,
        },
        MatteLabel::DefiniteForeground => TerminalWeights {
            to_background: 0.0,
            to_foreground: hard_weight,
        },
        MatteLabel::ProbableBackground | MatteLabel::ProbableForeground => TerminalWeights {
            to_background: neg_log(foreground.model_likelihood(color)),
            to_foreground: neg_log(background.model_likelihood(color)),
        },
    }
}

fn neg_log(density: f64) -> f64 {
    -density.max(f64::MIN_POSITIVE).ln()
}

/// Build the energy graph for the current matte and class models
pub fn build_energy(
    image: &RgbImage,
    matte: &Matte,
    background: &GaussianMixture,
    foreground: &GaussianMixture,
    config: &GrabCutConfig,
) -> EnergyGraph {
    let _span = tracing::debug_span!("build_energy").entered();

    let (width, height) = image.dimensions();
    let beta = contrast_beta(image);
    let hard_weight = config.hard_weight();
    let gamma = config.gamma;

    let terminals: Vec<TerminalWeights> = matte
        .as_slice()
        .par_iter()
        .zip(image.as_raw().par_chunks_exact(3))
        .map(|(&label, rgb)| {
            let color = Color::new(rgb[0] as f64, rgb[1] as f64, rgb[2] as f64);
            unary_weights(label, &color, background, foreground, hard_weight)
        })
        .collect();

    let edges: Vec<PairwiseEdge> = (0..height)
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row = Vec::with_capacity(width as usize * NEIGHBORS.len());
            for x in 0..width {
                let a = (y * width + x) as usize;
                for neighbor in &NEIGHBORS {
                    if let Some((nx, ny)) = neighbor.of(x, y, width, height) {
                        let distance_sq = color_distance_sq(image, (x, y), (nx, ny));
                        row.push(PairwiseEdge {
                            a,
                            b: (ny * width + nx) as usize,
                            weight: pairwise_weight(gamma, beta, neighbor.factor, distance_sq),
                        });
                    }
                }
            }
            row
        })
        .collect();

    tracing::debug!(
        beta,
        nodes = terminals.len(),
        pairwise_edges = edges.len(),
        "built energy graph"
    );

    EnergyGraph {
        beta,
        terminals,
        edges,
    }
}
