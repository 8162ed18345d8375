mod component;

pub use component::Component;

use crate::error::{Result, SegmentationError};
use crate::segmentation::PixelClass;
use component::{mean_covariance, principal_axis};
use image::Rgb;
use nalgebra::Vector3;
use rayon::prelude::*;

/// RGB color as a 3-vector of channel intensities
pub type Color = Vector3<f64>;

/// Determinant floor for covariances, also the weight below which a component is ignored
pub const COVARIANCE_EPS: f64 = 1e-6;

/// Diagonal increment applied while a covariance determinant is below the floor
pub const SINGULAR_FIX: f64 = 0.01;

pub fn pixel_color(pixel: &Rgb<u8>) -> Color {
    Color::new(pixel[0] as f64, pixel[1] as f64, pixel[2] as f64)
}

/// Gaussian mixture over the colors of one pixel class
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    class: PixelClass,
    components: Vec<Component>,
}

impl GaussianMixture {
    pub fn new(class: PixelClass, component_count: usize) -> Result<Self> {
        if component_count == 0 {
            return Err(SegmentationError::InvalidComponentCount(component_count));
        }
        Ok(Self {
            class,
            components: vec![Component::unused(); component_count],
        })
    }

    pub fn class(&self) -> PixelClass {
        self.class
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.components.iter().map(|c| c.weight).sum()
    }

    /// Build all components by repeated principal-axis splitting.
    ///
    /// Everything starts in component 0. Each step picks the created
    /// component with the largest top eigenvalue and moves the members whose
    /// projection on that eigenvector exceeds the projected mean into the next
    /// unused slot. Returns the component index of every color.
    pub fn initialize_components(&mut self, colors: &[Color]) -> Result<Vec<usize>> {
        let _span = tracing::debug_span!("gmm_init", class = %self.class).entered();

        if colors.is_empty() {
            return Err(SegmentationError::EmptyPopulation(self.class));
        }

        let k_count = self.components.len();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); k_count];
        let mut means = vec![Color::zeros(); k_count];
        let mut covariances = vec![nalgebra::Matrix3::zeros(); k_count];
        let mut eigen_values = vec![0.0f64; k_count];
        let mut eigen_vectors = vec![Color::zeros(); k_count];

        members[0] = (0..colors.len()).collect();
        let (mean, cov) = mean_covariance(colors, members[0].iter().copied());
        means[0] = mean;
        covariances[0] = cov;
        (eigen_values[0], eigen_vectors[0]) = principal_axis(&cov);

        for fresh in 1..k_count {
            let mut target = 0;
            for candidate in 1..fresh {
                if eigen_values[candidate] > eigen_values[target] {
                    target = candidate;
                }
            }

            let axis = eigen_vectors[target];
            let threshold = axis.dot(&means[target]);
            let split = std::mem::take(&mut members[target]);
            for idx in split {
                if axis.dot(&colors[idx]) <= threshold {
                    members[target].push(idx);
                } else {
                    members[fresh].push(idx);
                }
            }

            for slot in [target, fresh] {
                let (mean, cov) = mean_covariance(colors, members[slot].iter().copied());
                means[slot] = mean;
                covariances[slot] = cov;
                (eigen_values[slot], eigen_vectors[slot]) = principal_axis(&cov);
            }
            tracing::trace!(
                target_component = target,
                fresh_component = fresh,
                kept = members[target].len(),
                moved = members[fresh].len(),
                "split component"
            );
        }

        let n = colors.len() as f64;
        let mut assignment = vec![0usize; colors.len()];
        for (k, component_members) in members.iter().enumerate() {
            for &idx in component_members {
                assignment[idx] = k;
            }
            self.components[k] = Component::from_moments(
                component_members.len() as f64 / n,
                means[k],
                covariances[k],
            );
        }

        tracing::debug!(
            class = %self.class,
            pixels = colors.len(),
            weights = ?self.weights(),
            "initialized mixture"
        );
        Ok(assignment)
    }

    /// Unweighted Gaussian density of `color` under component `k`.
    ///
    /// Components with a negligible weight report 0; `None` when `k` is not a
    /// component of this mixture.
    pub fn component_likelihood(&self, color: &Color, k: usize) -> Option<f64> {
        self.components.get(k).map(|component| density(component, color))
    }

    /// Component with the highest density; the earliest index wins ties
    pub fn best_component(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (k, component) in self.components.iter().enumerate() {
            let value = density(component, color);
            if value > best_value {
                best = k;
                best_value = value;
            }
        }
        best
    }

    /// Mixture density: weighted sum of the component densities
    pub fn model_likelihood(&self, color: &Color) -> f64 {
        self.components
            .iter()
            .map(|component| component.weight * density(component, color))
            .sum()
    }

    /// Hard E-step: best component for every color, evaluated in parallel
    pub fn assign(&self, colors: &[Color]) -> Vec<usize> {
        colors
            .par_iter()
            .map(|color| self.best_component(color))
            .collect()
    }

    /// M-step: refit every component that received members.
    ///
    /// Components with no members keep their previous parameters; weights
    /// are then renormalized so they sum to one.
    pub fn reestimate(&mut self, colors: &[Color], assignment: &[usize]) -> Result<()> {
        let _span = tracing::debug_span!("gmm_learn", class = %self.class).entered();

        if colors.is_empty() {
            return Err(SegmentationError::EmptyPopulation(self.class));
        }

        if assignment.len() != colors.len() {
            return Err(SegmentationError::AssignmentLength {
                expected: colors.len(),
                actual: assignment.len(),
            });
        }
        let count = self.components.len();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (idx, &k) in assignment.iter().enumerate() {
            members
                .get_mut(k)
                .ok_or(SegmentationError::ComponentOutOfRange {
                    component: k,
                    count,
                })?
                .push(idx);
        }

        let n = colors.len() as f64;
        for (k, component_members) in members.iter().enumerate() {
            if component_members.is_empty() {
                tracing::debug!(class = %self.class, component = k, "component starved, keeping parameters");
                continue;
            }
            let (mean, cov) = mean_covariance(colors, component_members.iter().copied());
            self.components[k] =
                Component::from_moments(component_members.len() as f64 / n, mean, cov);
        }

        let total = self.total_weight();
        if total > 0.0 {
            for component in &mut self.components {
                component.weight /= total;
            }
        }

        tracing::debug!(class = %self.class, weights = ?self.weights(), "re-estimated mixture");
        Ok(())
    }

    fn weights(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.weight).collect()
    }
}

fn density(component: &Component, color: &Color) -> f64 {
    if component.weight < COVARIANCE_EPS {
        return 0.0;
    }
    (-0.5 * component.mahalanobis_sq(color)).exp() / component.determinant
}
