use crate::errors::{Error, Result};
use crate::inverse::{InverseMethod, InverseSolverTraits, SolveResult};
use crate::observation_equation::{compute_atv, operate};
use log::{debug, info};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::time::Instant;

/// Line search grid: `α = ALPHA_MIN + i·ALPHA_STEP` for `i < (ALPHA_MAX − ALPHA_MIN)/ALPHA_STEP`
const ALPHA_MIN: f64 = 1e-2;
const ALPHA_MAX: f64 = 1e2;
const ALPHA_STEP: f64 = 1e-2;
/// Search direction is the negative gradient scaled by this
const GRADIENT_SCALE: f64 = 1e-4;

/// Descent on the waveform correlation misfit `1 − (u·s)/(‖u‖‖s‖)` with `s = s₀ + A·m`,
/// `u` the observed and `s₀` the synthetic data vector.
/// Each step scans the fixed α grid and keeps the lowest cost; ties go to the smallest α.
pub struct NonlinearConjugateGradient<'a> {
    ata: &'a Array2<f64>,
    a: &'a Array2<f64>,
    s0: &'a Array1<f64>,
    u: &'a Array1<f64>,
}

impl<'a> NonlinearConjugateGradient<'a> {
    pub fn new(ata: &'a Array2<f64>, a: &'a Array2<f64>, s0: &'a Array1<f64>, u: &'a Array1<f64>) -> Result<Self> {
        let n_params: usize = a.ncols();
        if ata.nrows() != n_params || ata.ncols() != n_params {
            return Err(Error::dimension_mismatch("NonlinearConjugateGradient AtA", n_params, ata.nrows().max(ata.ncols())));
        }
        if s0.len() != a.nrows() {
            return Err(Error::dimension_mismatch("NonlinearConjugateGradient synthetic", a.nrows(), s0.len()));
        }
        if u.len() != a.nrows() {
            return Err(Error::dimension_mismatch("NonlinearConjugateGradient observed", a.nrows(), u.len()));
        }
        return Ok(NonlinearConjugateGradient { ata, a, s0, u });
    }

    /// `1 − (u·s)/(‖u‖‖s‖)` for a given synthetic `s`
    fn cost_of_synthetic(&self, s: &Array1<f64>) -> f64 {
        return 1.0 - self.u.dot(s) / (self.u.dot(self.u).sqrt() * s.dot(s).sqrt());
    }

    pub fn cost(&self, m: &Array1<f64>) -> f64 {
        let s: Array1<f64> = self.s0 + &operate(self.a, m);
        return self.cost_of_synthetic(&s);
    }

    /// `−[Aᵗu − (u·s)/(s·s)·(AtA·m + Aᵗs₀)] / (‖u‖‖s‖)`
    pub fn gradient(&self, m: &Array1<f64>, at_u: &Array1<f64>, at_s0: &Array1<f64>) -> Array1<f64> {
        let s: Array1<f64> = self.s0 + &operate(self.a, m);
        let u_s: f64 = self.u.dot(&s);
        let s_s: f64 = s.dot(&s);
        let at_s: Array1<f64> = self.ata.dot(m) + at_s0;
        let norm: f64 = self.u.dot(self.u).sqrt() * s_s.sqrt();
        return -(at_u - &(at_s * (u_s / s_s))) / norm;
    }

    /// Lowest-cost point `x + α·dx` over the α grid, or NaN everywhere if no cost is below `f64::MAX`
    fn line_search(&self, x: &Array1<f64>, dx: &Array1<f64>) -> Array1<f64> {
        let n_alpha: usize = ((ALPHA_MAX - ALPHA_MIN) / ALPHA_STEP) as usize;
        let a_x: Array1<f64> = self.s0 + &operate(self.a, x);
        let a_dx: Array1<f64> = operate(self.a, dx);

        let best: Option<(usize, f64)> = (0..n_alpha)
            .into_par_iter()
            .map(|i_alpha: usize| {
                let alpha: f64 = i_alpha as f64 * ALPHA_STEP + ALPHA_MIN;
                let s: Array1<f64> = &a_x + &(&a_dx * alpha);
                return (i_alpha, self.cost_of_synthetic(&s));
            })
            .filter(|(_, cost): &(usize, f64)| *cost < f64::MAX)
            .reduce_with(|best: (usize, f64), other: (usize, f64)| {
                if other.1 < best.1 || (other.1 == best.1 && other.0 < best.0) {
                    return other;
                }
                return best;
            });

        return match best {
            Some((i_alpha, cost)) => {
                let alpha: f64 = i_alpha as f64 * ALPHA_STEP + ALPHA_MIN;
                debug!("line search: alpha = {}, cost = {}", alpha, cost);
                x + &(dx * alpha)
            }
            None => Array1::from_elem(x.len(), f64::NAN),
        };
    }
}

impl<'a> InverseSolverTraits for NonlinearConjugateGradient<'a> {
    fn inverse_method(&self) -> InverseMethod {
        return InverseMethod::NonlinearConjugateGradient;
    }

    fn n_parameters(&self) -> usize {
        return self.a.ncols();
    }

    fn apply_normal_matrix(&self, v: &Array1<f64>) -> Array1<f64> {
        return self.ata.dot(v);
    }

    /// Column `i` of `p` holds the search direction used for step `i`
    fn solve(&self) -> Result<SolveResult> {
        let time_start: Instant = Instant::now();
        let n_params: usize = self.n_parameters();
        let at_u: Array1<f64> = compute_atv(self.a, self.u);
        let at_s0: Array1<f64> = compute_atv(self.a, self.s0);

        let mut ans: Array2<f64> = Array2::zeros((n_params, n_params));
        let mut p: Array2<f64> = Array2::zeros((n_params, n_params));
        let mut x: Array1<f64> = Array1::zeros(n_params);
        info!("{} initial cost = {}", self.inverse_method(), self.cost(&x));
        for i_iter in 0..n_params {
            let dx: Array1<f64> = self.gradient(&x, &at_u, &at_s0) * -GRADIENT_SCALE;
            x = self.line_search(&x, &dx);
            ans.column_mut(i_iter).assign(&x);
            p.column_mut(i_iter).assign(&dx);
        }

        info!(
            "{} solved {} parameters, final cost = {}, time elapsed: {:?}",
            self.inverse_method(),
            n_params,
            self.cost(&x),
            time_start.elapsed()
        );
        return Ok(SolveResult::new(self.inverse_method(), ans, p));
    }
}

#[test]
fn test_gradient_matches_finite_difference() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::{ObservationEquation, random_equation};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let equation: ObservationEquation = random_equation(3, 25, 3, 17);
    let a: &Array2<f64> = equation.a().unwrap();
    let obs: Array1<f64> = equation.dvector().unwrap().get_obs();
    let syn: Array1<f64> = equation.dvector().unwrap().get_syn();
    let solver: NonlinearConjugateGradient = NonlinearConjugateGradient::new(equation.ata(), a, &syn, &obs).unwrap();

    let at_u: Array1<f64> = compute_atv(a, &obs);
    let at_s0: Array1<f64> = compute_atv(a, &syn);
    let m: Array1<f64> = array![0.05, -0.02, 0.1];
    let gradient: Array1<f64> = solver.gradient(&m, &at_u, &at_s0);

    let h: f64 = 1e-6;
    for i in 0..3 {
        let mut m_plus: Array1<f64> = m.clone();
        m_plus[i] += h;
        let mut m_minus: Array1<f64> = m.clone();
        m_minus[i] -= h;
        let numerical: f64 = (solver.cost(&m_plus) - solver.cost(&m_minus)) / (2.0 * h);
        assert_abs_diff_eq!(gradient[i], numerical, epsilon = 1e-6);
    }
}

#[test]
fn test_nonlinear_cg_reduces_cost() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::{ObservationEquation, random_equation};

    let equation: ObservationEquation = random_equation(3, 25, 4, 31);
    let a: &Array2<f64> = equation.a().unwrap();
    let obs: Array1<f64> = equation.dvector().unwrap().get_obs();
    let syn: Array1<f64> = equation.dvector().unwrap().get_syn();
    let solver: NonlinearConjugateGradient = NonlinearConjugateGradient::new(equation.ata(), a, &syn, &obs).unwrap();
    let result: SolveResult = solver.solve().unwrap();

    assert_eq!(result.ans().dim(), (4, 4));
    assert!(result.is_finite());
    let mut previous: f64 = solver.cost(&Array1::zeros(4));
    for i_column in 1..=4 {
        let cost: f64 = solver.cost(&result.answer(i_column).unwrap());
        assert!(cost <= previous + 1e-12, "cost rose at step {}: {} > {}", i_column, cost, previous);
        previous = cost;
    }

    let short: Array1<f64> = Array1::zeros(3);
    assert!(matches!(NonlinearConjugateGradient::new(equation.ata(), a, &short, &obs), Err(Error::DimensionMismatch { .. })));
}
