//! Named quadrature rules for path construction
//!
//! A rule maps a step count to parallel arrays of step sizes and
//! interpolation fractions (alphas) on `[0, 1]`. The alphas lay out the
//! straight-line path between baseline and input; the step sizes describe
//! the rule's own integration weights. Rules are pluggable by name.

use crate::error::{AttributionError, Result};

/// Quadrature rule for straight-line path layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Left Riemann sum: alphas `i/n`, uniform weights `1/n`
    RiemannLeft,
    /// Right Riemann sum: alphas `(i+1)/n`, uniform weights `1/n`
    RiemannRight,
    /// Midpoint rule: alphas `(i+0.5)/n`, uniform weights `1/n`
    RiemannMiddle,
    /// Trapezoid rule: alphas `i/(n-1)`, halved end weights
    RiemannTrapezoid,
    /// Gauss-Legendre nodes and weights mapped to `[0, 1]`
    GaussLegendre,
}

impl Method {
    /// Look up a rule by name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "riemann_left" => Ok(Method::RiemannLeft),
            "riemann_right" => Ok(Method::RiemannRight),
            "riemann_middle" => Ok(Method::RiemannMiddle),
            "riemann_trapezoid" => Ok(Method::RiemannTrapezoid),
            "gausslegendre" => Ok(Method::GaussLegendre),
            other => Err(AttributionError::Config(format!(
                "unknown quadrature method: {other}"
            ))),
        }
    }

    /// Canonical name of the rule
    pub fn name(&self) -> &'static str {
        match self {
            Method::RiemannLeft => "riemann_left",
            Method::RiemannRight => "riemann_right",
            Method::RiemannMiddle => "riemann_middle",
            Method::RiemannTrapezoid => "riemann_trapezoid",
            Method::GaussLegendre => "gausslegendre",
        }
    }

    /// Parallel `(step_sizes, alphas)` arrays of length `n`
    pub fn step_sizes_and_alphas(&self, n: usize) -> (Vec<f32>, Vec<f32>) {
        match self {
            Method::RiemannLeft => {
                let steps = vec![1.0 / n as f32; n];
                let alphas = (0..n).map(|i| i as f32 / n as f32).collect();
                (steps, alphas)
            }
            Method::RiemannRight => {
                let steps = vec![1.0 / n as f32; n];
                let alphas = (0..n).map(|i| (i + 1) as f32 / n as f32).collect();
                (steps, alphas)
            }
            Method::RiemannMiddle => {
                let steps = vec![1.0 / n as f32; n];
                let alphas = (0..n).map(|i| (i as f32 + 0.5) / n as f32).collect();
                (steps, alphas)
            }
            Method::RiemannTrapezoid => {
                if n == 1 {
                    return (vec![1.0], vec![0.0]);
                }
                let h = 1.0 / (n - 1) as f32;
                let mut steps = vec![h; n];
                steps[0] = h / 2.0;
                steps[n - 1] = h / 2.0;
                let alphas = (0..n).map(|i| i as f32 * h).collect();
                (steps, alphas)
            }
            Method::GaussLegendre => gauss_legendre(n),
        }
    }
}

/// Gauss-Legendre nodes/weights on `[-1, 1]`, mapped to `[0, 1]`
///
/// Nodes are found by Newton iteration on the three-term Legendre
/// recurrence, seeded with the Chebyshev approximation to the k-th root.
/// Computed in f64 and narrowed at the end; the symmetric half is mirrored.
fn gauss_legendre(n: usize) -> (Vec<f32>, Vec<f32>) {
    let mut nodes = vec![0.0f64; n];
    let mut weights = vec![0.0f64; n];
    let m = n.div_ceil(2);

    for i in 0..m {
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut pp = 0.0;
        for _ in 0..100 {
            // Legendre polynomial P_n(z) and its derivative at z
            let mut p1 = 1.0;
            let mut p2 = 0.0;
            for j in 0..n {
                let p3 = p2;
                p2 = p1;
                p1 = ((2 * j + 1) as f64 * z * p2 - j as f64 * p3) / (j + 1) as f64;
            }
            pp = n as f64 * (z * p1 - p2) / (z * z - 1.0);
            let z1 = z;
            z = z1 - p1 / pp;
            if (z - z1).abs() < 1e-14 {
                break;
            }
        }
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        let w = 2.0 / ((1.0 - z * z) * pp * pp);
        weights[i] = w;
        weights[n - 1 - i] = w;
    }

    // Affine map [-1, 1] -> [0, 1] halves the weights
    let alphas = nodes.iter().map(|&x| (0.5 * (x + 1.0)) as f32).collect();
    let steps = weights.iter().map(|&w| (0.5 * w) as f32).collect();
    (steps, alphas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_from_name() {
        assert_eq!(Method::from_name("riemann_left").unwrap(), Method::RiemannLeft);
        assert_eq!(Method::from_name("gausslegendre").unwrap(), Method::GaussLegendre);
        assert!(Method::from_name("simpson").is_err());
    }

    #[test]
    fn test_name_round_trip() {
        for method in [
            Method::RiemannLeft,
            Method::RiemannRight,
            Method::RiemannMiddle,
            Method::RiemannTrapezoid,
            Method::GaussLegendre,
        ] {
            assert_eq!(Method::from_name(method.name()).unwrap(), method);
        }
    }

    #[test]
    fn test_lengths_match() {
        for method in [
            Method::RiemannLeft,
            Method::RiemannRight,
            Method::RiemannMiddle,
            Method::RiemannTrapezoid,
            Method::GaussLegendre,
        ] {
            for n in [1, 2, 5, 50] {
                let (steps, alphas) = method.step_sizes_and_alphas(n);
                assert_eq!(steps.len(), n, "{} steps for n={n}", method.name());
                assert_eq!(alphas.len(), n, "{} alphas for n={n}", method.name());
            }
        }
    }

    #[test]
    fn test_alphas_sorted_in_unit_interval() {
        for method in [
            Method::RiemannLeft,
            Method::RiemannRight,
            Method::RiemannMiddle,
            Method::RiemannTrapezoid,
            Method::GaussLegendre,
        ] {
            let (_, alphas) = method.step_sizes_and_alphas(20);
            for window in alphas.windows(2) {
                assert!(window[0] < window[1], "{} alphas not increasing", method.name());
            }
            assert!(alphas[0] >= 0.0 && alphas[19] <= 1.0);
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        for method in [
            Method::RiemannLeft,
            Method::RiemannRight,
            Method::RiemannMiddle,
            Method::RiemannTrapezoid,
            Method::GaussLegendre,
        ] {
            let (steps, _) = method.step_sizes_and_alphas(30);
            let total: f32 = steps.iter().sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_gauss_legendre_two_points() {
        // Two-point rule: nodes at 1/2 +- 1/(2*sqrt(3)), equal weights
        let (steps, alphas) = Method::GaussLegendre.step_sizes_and_alphas(2);
        let offset = 0.5 / 3.0f32.sqrt();
        assert_abs_diff_eq!(alphas[0], 0.5 - offset, epsilon = 1e-6);
        assert_abs_diff_eq!(alphas[1], 0.5 + offset, epsilon = 1e-6);
        assert_abs_diff_eq!(steps[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(steps[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_gauss_legendre_integrates_cubic_exactly() {
        // n-point Gauss-Legendre is exact for polynomials of degree 2n-1
        let (steps, alphas) = Method::GaussLegendre.step_sizes_and_alphas(2);
        let integral: f32 = steps
            .iter()
            .zip(&alphas)
            .map(|(w, a)| w * a.powi(3))
            .sum();
        assert_abs_diff_eq!(integral, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_trapezoid_single_point() {
        let (steps, alphas) = Method::RiemannTrapezoid.step_sizes_and_alphas(1);
        assert_eq!(steps, vec![1.0]);
        assert_eq!(alphas, vec![0.0]);
    }
}
