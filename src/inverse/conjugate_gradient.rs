use crate::errors::{Error, Result};
use crate::inverse::inverse_solver_traits::conjugate_gradient_path;
use crate::inverse::{InverseMethod, InverseSolverTraits, SolveResult};
use log::info;
use ndarray::{Array1, Array2};
use std::time::Instant;

/// Linear conjugate gradient on `AtA·m = Atd`, minimising `½mᵗ·AtA·m − Atd·m`.
/// With a diagonal preconditioner `M` the residual is scaled as `z = M ⊙ r`.
pub struct ConjugateGradient<'a> {
    ata: &'a Array2<f64>,
    atd: &'a Array1<f64>,
    preconditioner: Option<&'a Array1<f64>>,
}

impl<'a> ConjugateGradient<'a> {
    pub fn new(ata: &'a Array2<f64>, atd: &'a Array1<f64>) -> Result<Self> {
        let n_params: usize = atd.len();
        if ata.nrows() != n_params || ata.ncols() != n_params {
            return Err(Error::dimension_mismatch("ConjugateGradient AtA", n_params, ata.nrows().max(ata.ncols())));
        }
        return Ok(ConjugateGradient {
            ata,
            atd,
            preconditioner: None,
        });
    }

    pub fn with_preconditioner(mut self, preconditioner: &'a Array1<f64>) -> Result<Self> {
        if preconditioner.len() != self.atd.len() {
            return Err(Error::dimension_mismatch("ConjugateGradient preconditioner", self.atd.len(), preconditioner.len()));
        }
        self.preconditioner = Some(preconditioner);
        return Ok(self);
    }
}

impl<'a> InverseSolverTraits for ConjugateGradient<'a> {
    fn inverse_method(&self) -> InverseMethod {
        return match self.preconditioner {
            Some(_) => InverseMethod::PreconditionedConjugateGradient,
            None => InverseMethod::ConjugateGradient,
        };
    }

    fn n_parameters(&self) -> usize {
        return self.atd.len();
    }

    fn apply_normal_matrix(&self, v: &Array1<f64>) -> Array1<f64> {
        return self.ata.dot(v);
    }

    fn solve(&self) -> Result<SolveResult> {
        let time_start: Instant = Instant::now();
        let (ans, p): (Array2<f64>, Array2<f64>) = conjugate_gradient_path(
            self.atd,
            |v: &Array1<f64>| self.apply_normal_matrix(v),
            |r: &Array1<f64>| match self.preconditioner {
                Some(preconditioner) => r * preconditioner,
                None => r.clone(),
            },
        );
        info!("{} solved {} parameters, time elapsed: {:?}", self.inverse_method(), self.n_parameters(), time_start.elapsed());
        return Ok(SolveResult::new(self.inverse_method(), ans, p));
    }
}

#[test]
fn test_cg_converges_on_random_spd() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::inverse_solver_traits::{quadratic_objective, random_spd};
    use approx::assert_abs_diff_eq;

    for (n, seed) in [(3, 1), (8, 2), (20, 3)] {
        let ata: Array2<f64> = random_spd(n, seed);
        let m_true: Array1<f64> = Array1::from_iter((0..n).map(|i: usize| (i as f64 * 0.7).sin()));
        let atd: Array1<f64> = ata.dot(&m_true);

        let solver: ConjugateGradient = ConjugateGradient::new(&ata, &atd).unwrap();
        let result: SolveResult = solver.solve().unwrap();
        assert_eq!(result.ans().dim(), (n, n));
        assert_eq!(result.p().dim(), (n, n));
        assert_abs_diff_eq!(result.answer(n).unwrap(), m_true, epsilon = 1e-6);

        // Objective never increases along the path
        let mut previous: f64 = 0.0;
        for i_column in 0..n {
            let objective: f64 = quadratic_objective(&ata, &atd, &result.ans().column(i_column).to_owned());
            assert!(objective <= previous + 1e-10, "objective rose at column {}: {} > {}", i_column, objective, previous);
            previous = objective;
        }
    }
}

#[test]
fn test_preconditioned_cg() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::inverse_solver_traits::random_spd;
    use approx::assert_abs_diff_eq;

    let n: usize = 10;
    let mut ata: Array2<f64> = random_spd(n, 4);
    // Badly scaled diagonal, fixed by a Jacobi preconditioner
    for i in 0..n {
        let scale: f64 = 1.0 + 10.0 * i as f64;
        ata.row_mut(i).mapv_inplace(|value: f64| value * scale.sqrt());
        ata.column_mut(i).mapv_inplace(|value: f64| value * scale.sqrt());
    }
    let m_true: Array1<f64> = Array1::from_iter((0..n).map(|i: usize| 1.0 - 0.1 * i as f64));
    let atd: Array1<f64> = ata.dot(&m_true);
    let jacobi: Array1<f64> = ata.diag().mapv(|value: f64| 1.0 / value);

    let solver: ConjugateGradient = ConjugateGradient::new(&ata, &atd).unwrap().with_preconditioner(&jacobi).unwrap();
    assert_eq!(solver.inverse_method(), InverseMethod::PreconditionedConjugateGradient);
    let result: SolveResult = solver.solve().unwrap();
    assert_abs_diff_eq!(result.answer(n).unwrap(), m_true, epsilon = 1e-6);

    let short: Array1<f64> = Array1::ones(3);
    assert!(matches!(ConjugateGradient::new(&ata, &atd).unwrap().with_preconditioner(&short), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_cg_covariance() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::inverse_solver_traits::random_spd;
    use approx::assert_abs_diff_eq;

    let n: usize = 6;
    let ata: Array2<f64> = random_spd(n, 9);
    let atd: Array1<f64> = Array1::ones(n);
    let solver: ConjugateGradient = ConjugateGradient::new(&ata, &atd).unwrap();
    let result: SolveResult = solver.solve().unwrap();

    // With all directions, Σ pᵢpᵢᵗ/(pᵢᵗ·AtA·pᵢ) is AtA⁻¹ for AtA-conjugate directions
    let sigma_d: f64 = 2.0;
    let covariance: Array2<f64> = solver.compute_covariance(&result, sigma_d, n).unwrap();
    assert_abs_diff_eq!(covariance.dot(&ata), Array2::<f64>::eye(n) * sigma_d * sigma_d, epsilon = 1e-8);
    assert_abs_diff_eq!(covariance.clone(), covariance.t().to_owned(), epsilon = 1e-12);

    let none: Array2<f64> = solver.compute_covariance(&result, sigma_d, 0).unwrap();
    assert_eq!(none, Array2::<f64>::zeros((n, n)));
    assert!(matches!(solver.compute_covariance(&result, sigma_d, n + 1), Err(Error::InvalidArgument { .. })));
}

#[test]
fn test_two_window_scenario() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::inverse_solver_traits::quadratic_objective;
    use crate::observation_equation::{ObservationEquation, two_window_equation};
    use approx::assert_abs_diff_eq;

    let equation: ObservationEquation = two_window_equation();
    let ata: &Array2<f64> = equation.ata();
    let atd: &Array1<f64> = equation.atd();
    let result: SolveResult = ConjugateGradient::new(ata, atd).unwrap().solve().unwrap();

    // Least squares solution of the 2 x 2 normal equations by Cramer's rule
    let det: f64 = ata[[0, 0]] * ata[[1, 1]] - ata[[0, 1]] * ata[[1, 0]];
    let m0: f64 = (atd[0] * ata[[1, 1]] - ata[[0, 1]] * atd[1]) / det;
    let m1: f64 = (ata[[0, 0]] * atd[1] - atd[0] * ata[[1, 0]]) / det;
    let precision: f64 = 1e-6;
    assert_abs_diff_eq!(result.ans()[[0, 1]], m0, epsilon = precision);
    assert_abs_diff_eq!(result.ans()[[1, 1]], m1, epsilon = precision);
    assert_abs_diff_eq!(m0, 0.25 / 0.29, epsilon = 1e-12);
    assert_abs_diff_eq!(m1, 1.0, epsilon = 1e-12);

    let objective_0: f64 = quadratic_objective(ata, atd, &result.answer(1).unwrap());
    let objective_1: f64 = quadratic_objective(ata, atd, &result.answer(2).unwrap());
    assert!(objective_0 < 0.0);
    // AtA is a multiple of the identity, so the second direction only moves by roundoff
    assert!(objective_1 <= objective_0 + 1e-12 * objective_0.abs(), "{} > {}", objective_1, objective_0);
}

#[test]
fn test_singular_normal_matrix_propagates_non_finite() {
    // Lazy loading of packages which are not used anywhere else in the code
    use ndarray::array;

    let ata: Array2<f64> = Array2::zeros((3, 3));
    let atd: Array1<f64> = array![1.0, -2.0, 0.5];
    let result: SolveResult = ConjugateGradient::new(&ata, &atd).unwrap().solve().unwrap();
    assert_eq!(result.ans().dim(), (3, 3));
    assert!(!result.is_finite());
}

#[test]
fn test_zero_right_hand_side_gives_zero_path() {
    let ata: Array2<f64> = Array2::zeros((4, 4));
    let atd: Array1<f64> = Array1::zeros(4);
    let result: SolveResult = ConjugateGradient::new(&ata, &atd).unwrap().solve().unwrap();
    assert!(result.is_finite());
    assert_eq!(result.ans().to_owned(), Array2::<f64>::zeros((4, 4)));
    assert_eq!(result.p().to_owned(), Array2::<f64>::zeros((4, 4)));
}
