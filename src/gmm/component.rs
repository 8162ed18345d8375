use super::{Color, COVARIANCE_EPS, SINGULAR_FIX};
use nalgebra::{Matrix3, SymmetricEigen};

/// One Gaussian of a color mixture
///
/// `covariance` is stored after diagonal loading, so `determinant` and
/// `inverse` always describe it and `determinant >= COVARIANCE_EPS`.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub(crate) weight: f64,
    pub(crate) mean: Color,
    pub(crate) covariance: Matrix3<f64>,
    pub(crate) determinant: f64,
    pub(crate) inverse: Matrix3<f64>,
}

impl Component {
    /// Zero-weight placeholder with a loaded zero covariance
    pub(crate) fn unused() -> Self {
        Self::from_moments(0.0, Color::zeros(), Matrix3::zeros())
    }

    pub(crate) fn from_moments(weight: f64, mean: Color, covariance: Matrix3<f64>) -> Self {
        let (covariance, determinant, inverse) = regularize(covariance);
        Self {
            weight,
            mean,
            covariance,
            determinant,
            inverse,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn mean(&self) -> &Color {
        &self.mean
    }

    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.covariance
    }

    pub fn determinant(&self) -> f64 {
        self.determinant
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Squared Mahalanobis distance of `color` to this component
    pub fn mahalanobis_sq(&self, color: &Color) -> f64 {
        let diff = color - self.mean;
        diff.dot(&(self.inverse * diff))
    }
}

/// Mean and unbiased covariance of the selected colors.
///
/// An empty selection gives a zero mean; fewer than two members give a
/// zero covariance.
pub(crate) fn mean_covariance<I>(colors: &[Color], members: I) -> (Color, Matrix3<f64>)
where
    I: IntoIterator<Item = usize> + Clone,
{
    let mut sum = Color::zeros();
    let mut n = 0usize;
    for idx in members.clone() {
        sum += colors[idx];
        n += 1;
    }
    if n == 0 {
        return (Color::zeros(), Matrix3::zeros());
    }
    let mean = sum / n as f64;
    if n <= 1 {
        return (mean, Matrix3::zeros());
    }

    let mut cov = Matrix3::zeros();
    for idx in members {
        let diff = colors[idx] - mean;
        cov += diff * diff.transpose();
    }
    (mean, cov / (n - 1) as f64)
}

/// Largest eigenvalue of a covariance and its eigenvector.
///
/// Ties keep the lower eigen index.
pub(crate) fn principal_axis(covariance: &Matrix3<f64>) -> (f64, Color) {
    let eig = SymmetricEigen::new(*covariance);
    let mut best = 0;
    for i in 1..3 {
        if eig.eigenvalues[i] > eig.eigenvalues[best] {
            best = i;
        }
    }
    (eig.eigenvalues[best], eig.eigenvectors.column(best).into_owned())
}

/// Load the diagonal until the determinant clears `COVARIANCE_EPS`, then invert.
pub(crate) fn regularize(mut covariance: Matrix3<f64>) -> (Matrix3<f64>, f64, Matrix3<f64>) {
    let mut det = covariance.determinant();
    while det < COVARIANCE_EPS {
        for i in 0..3 {
            covariance[(i, i)] += SINGULAR_FIX;
        }
        det = covariance.determinant();
    }
    let inverse = adjugate(&covariance) / det;
    (covariance, det, inverse)
}

fn adjugate(a: &Matrix3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        a[(1, 1)] * a[(2, 2)] - a[(1, 2)] * a[(2, 1)],
        -(a[(0, 1)] * a[(2, 2)] - a[(0, 2)] * a[(2, 1)]),
        a[(0, 1)] * a[(1, 2)] - a[(0, 2)] * a[(1, 1)],
        -(a[(1, 0)] * a[(2, 2)] - a[(1, 2)] * a[(2, 0)]),
        a[(0, 0)] * a[(2, 2)] - a[(0, 2)] * a[(2, 0)],
        -(a[(0, 0)] * a[(1, 2)] - a[(0, 2)] * a[(1, 0)]),
        a[(1, 0)] * a[(2, 1)] - a[(1, 1)] * a[(2, 0)],
        -(a[(0, 0)] * a[(2, 1)] - a[(0, 1)] * a[(2, 0)]),
        a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regularize_lifts_singular_covariance() {
        let (cov, det, inv) = regularize(Matrix3::zeros());
        assert!(det >= COVARIANCE_EPS);
        assert!((cov[(0, 1)]).abs() < 1e-15);
        assert!(cov[(0, 0)] > 0.0);
        let identity = cov * inv;
        assert!((identity - Matrix3::identity()).norm() < 1e-9);
    }

    #[test]
    fn regularize_keeps_well_conditioned_covariance() {
        let input = Matrix3::new(4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0);
        let (cov, det, inv) = regularize(input);
        assert_eq!(cov, input);
        assert!((det - input.determinant()).abs() < 1e-12);
        assert!((cov * inv - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn mean_covariance_is_unbiased() {
        let colors = vec![Color::new(0.0, 0.0, 0.0), Color::new(2.0, 4.0, 0.0)];
        let (mean, cov) = mean_covariance(&colors, 0..2);
        assert_eq!(mean, Color::new(1.0, 2.0, 0.0));
        assert!((cov[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((cov[(1, 1)] - 8.0).abs() < 1e-12);
        assert!((cov[(0, 1)] - 4.0).abs() < 1e-12);
        assert_eq!(cov[(2, 2)], 0.0);
    }

    #[test]
    fn mean_covariance_of_single_member_is_zero() {
        let colors = vec![Color::new(5.0, 6.0, 7.0)];
        let (mean, cov) = mean_covariance(&colors, std::iter::once(0));
        assert_eq!(mean, colors[0]);
        assert_eq!(cov, Matrix3::zeros());
    }

    #[test]
    fn principal_axis_follows_dominant_spread() {
        let cov = Matrix3::new(1.0, 0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0, 4.0);
        let (value, axis) = principal_axis(&cov);
        assert!((value - 9.0).abs() < 1e-9);
        assert!((axis[1].abs() - 1.0).abs() < 1e-9);
    }
}
