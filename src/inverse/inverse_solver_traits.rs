use crate::errors::{Error, Result};
use crate::inverse::InverseMethod;
use log::warn;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Full solution path of one solve.
/// Column `i` of `ans` is the model after `i + 1` directions, column `i` of `p` is direction `i`.
#[derive(Debug, Clone)]
pub struct SolveResult {
    method: InverseMethod,
    ans: Array2<f64>,
    p: Array2<f64>,
}

impl SolveResult {
    pub(crate) fn new(method: InverseMethod, ans: Array2<f64>, p: Array2<f64>) -> Self {
        let result: SolveResult = SolveResult { method, ans, p };
        if !result.is_finite() {
            warn!("{} solution path contains NaN or infinite values", method);
        }
        return result;
    }

    pub fn method(&self) -> InverseMethod {
        return self.method;
    }

    pub fn ans(&self) -> ArrayView2<'_, f64> {
        return self.ans.view();
    }

    pub fn p(&self) -> ArrayView2<'_, f64> {
        return self.p.view();
    }

    /// Model after `n_directions` directions; zero directions is the starting model
    pub fn answer(&self, n_directions: usize) -> Result<Array1<f64>> {
        if n_directions > self.ans.ncols() {
            return Err(Error::InvalidArgument {
                reason: format!("{} directions requested, the path has {}", n_directions, self.ans.ncols()),
            });
        }
        if n_directions == 0 {
            return Ok(Array1::zeros(self.ans.nrows()));
        }
        return Ok(self.ans.column(n_directions - 1).to_owned());
    }

    pub fn n_parameters(&self) -> usize {
        return self.ans.nrows();
    }

    pub fn is_finite(&self) -> bool {
        return self.ans.iter().all(|value: &f64| value.is_finite()) && self.p.iter().all(|value: &f64| value.is_finite());
    }
}

/// Common interface of the conjugate gradient family
pub trait InverseSolverTraits {
    fn inverse_method(&self) -> InverseMethod;

    fn n_parameters(&self) -> usize;

    /// `Q·v` for the normal matrix `Q` the directions are conjugate with respect to
    fn apply_normal_matrix(&self, v: &Array1<f64>) -> Array1<f64>;

    /// Run all `n_parameters` iterations. No early exit and no convergence check
    fn solve(&self) -> Result<SolveResult>;

    /// Approximate posterior covariance from the first `n_directions` directions:
    /// `Σ σ_d² / (pᵢᵗ·Q·pᵢ) · pᵢ·pᵢᵗ`
    fn compute_covariance(&self, result: &SolveResult, sigma_d: f64, n_directions: usize) -> Result<Array2<f64>> {
        let n_params: usize = self.n_parameters();
        if result.n_parameters() != n_params {
            return Err(Error::dimension_mismatch("compute_covariance solution", n_params, result.n_parameters()));
        }
        if n_directions > n_params {
            return Err(Error::InvalidArgument {
                reason: format!("{} directions requested, only {} exist", n_directions, n_params),
            });
        }

        let sigma_d2: f64 = sigma_d * sigma_d;
        let mut covariance: Array2<f64> = Array2::zeros((n_params, n_params));
        for i_direction in 0..n_directions {
            let p: ArrayView1<f64> = result.p.column(i_direction);
            let p_owned: Array1<f64> = p.to_owned();
            let p_q_p: f64 = p_owned.dot(&self.apply_normal_matrix(&p_owned));
            let scale: f64 = sigma_d2 / p_q_p;
            for i in 0..n_params {
                for j in 0..n_params {
                    covariance[[i, j]] += scale * p[i] * p[j];
                }
            }
        }
        return Ok(covariance);
    }
}

/// Conjugate gradient recurrence shared by the linear solvers.
///
/// `r₀ = −Atd`, `z = M(r)`, `p₀ = −z₀`, `aᵢ = −(rᵢ·pᵢ)/(pᵢᵗQpᵢ)`, `rᵢ₊₁ = rᵢ + aᵢQpᵢ`,
/// `β = (rᵢ₊₁·zᵢ₊₁)/(rᵢ·zᵢ)`, `pᵢ₊₁ = −zᵢ₊₁ + βpᵢ`.
/// A direction that is exactly zero means the residual vanished; it takes a zero step instead of 0/0.
/// Any other degeneracy is left to propagate as NaN or infinity.
///
/// # Returns
/// * `(ans, p)`, both `n × n`
pub(crate) fn conjugate_gradient_path<Q, M>(atd: &Array1<f64>, apply_q: Q, precondition: M) -> (Array2<f64>, Array2<f64>)
where
    Q: Fn(&Array1<f64>) -> Array1<f64>,
    M: Fn(&Array1<f64>) -> Array1<f64>,
{
    let n_params: usize = atd.len();
    let mut ans: Array2<f64> = Array2::zeros((n_params, n_params));
    let mut p: Array2<f64> = Array2::zeros((n_params, n_params));

    let mut m: Array1<f64> = Array1::zeros(n_params);
    let mut r: Array1<f64> = -atd;
    let mut z: Array1<f64> = precondition(&r);
    let mut r_z: f64 = r.dot(&z);
    let mut direction: Array1<f64> = -&z;

    for i_iter in 0..n_params {
        let q_p: Array1<f64> = apply_q(&direction);
        let step: f64 = if direction.iter().all(|value: &f64| *value == 0.0) {
            0.0
        } else {
            -r.dot(&direction) / direction.dot(&q_p)
        };
        m.scaled_add(step, &direction);
        ans.column_mut(i_iter).assign(&m);
        p.column_mut(i_iter).assign(&direction);

        if i_iter + 1 == n_params {
            break;
        }
        r.scaled_add(step, &q_p);
        z = precondition(&r);
        let r_z_new: f64 = r.dot(&z);
        let beta: f64 = if r_z == 0.0 { 0.0 } else { r_z_new / r_z };
        direction = &direction * beta - &z;
        r_z = r_z_new;
    }

    return (ans, p);
}

#[cfg(test)]
pub(crate) fn random_spd(n: usize, seed: u64) -> Array2<f64> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng: StdRng = StdRng::seed_from_u64(seed);
    let b: Array2<f64> = Array2::from_shape_fn((n, n), |_| rng.random_range(-1.0..1.0));
    let spd: Array2<f64> = b.t().dot(&b) + Array2::<f64>::eye(n) * (n as f64);
    return spd;
}

#[cfg(test)]
pub(crate) fn quadratic_objective(ata: &Array2<f64>, atd: &Array1<f64>, m: &Array1<f64>) -> f64 {
    return 0.5 * m.dot(&ata.dot(m)) - atd.dot(m);
}

#[test]
fn test_solve_result_accessors() {
    // Lazy loading of packages which are not used anywhere else in the code
    use ndarray::array;

    let result: SolveResult = SolveResult::new(InverseMethod::ConjugateGradient, array![[1.0, 2.0], [3.0, 4.0]], Array2::eye(2));
    assert!(result.is_finite());
    assert_eq!(result.answer(0).unwrap(), array![0.0, 0.0]);
    assert_eq!(result.answer(2).unwrap(), array![2.0, 4.0]);
    assert!(matches!(result.answer(3), Err(Error::InvalidArgument { .. })));

    let broken: SolveResult = SolveResult::new(InverseMethod::ConjugateGradient, array![[f64::NAN, 0.0], [0.0, 0.0]], Array2::eye(2));
    assert!(!broken.is_finite());
}
