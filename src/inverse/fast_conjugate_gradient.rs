use crate::errors::{Error, Result};
use crate::inverse::inverse_solver_traits::conjugate_gradient_path;
use crate::inverse::{InverseMethod, InverseSolverTraits, SolveResult};
use crate::observation_equation::at_a_p;
use log::info;
use ndarray::{Array1, Array2};
use std::time::Instant;

/// Conjugate gradient working from `A` directly: `AtA·p` is evaluated as `Aᵗ·(A·p)` each iteration.
/// With damping, `λ·c²⊙p` is added to that product for a per-parameter scale `c`.
pub struct FastConjugateGradient<'a> {
    a: &'a Array2<f64>,
    atd: &'a Array1<f64>,
    damping: Option<(f64, &'a Array1<f64>)>,
}

impl<'a> FastConjugateGradient<'a> {
    pub fn new(a: &'a Array2<f64>, atd: &'a Array1<f64>) -> Result<Self> {
        if a.ncols() != atd.len() {
            return Err(Error::dimension_mismatch("FastConjugateGradient A columns", atd.len(), a.ncols()));
        }
        return Ok(FastConjugateGradient { a, atd, damping: None });
    }

    /// # Arguments
    /// * `lambda` - damping coefficient
    /// * `conditioner` - per-parameter scale, one entry per column of `A`
    pub fn with_damping(mut self, lambda: f64, conditioner: &'a Array1<f64>) -> Result<Self> {
        if conditioner.len() != self.atd.len() {
            return Err(Error::dimension_mismatch("FastConjugateGradient conditioner", self.atd.len(), conditioner.len()));
        }
        self.damping = Some((lambda, conditioner));
        return Ok(self);
    }
}

impl<'a> InverseSolverTraits for FastConjugateGradient<'a> {
    fn inverse_method(&self) -> InverseMethod {
        return match self.damping {
            Some(_) => InverseMethod::FastConjugateGradientDamped,
            None => InverseMethod::FastConjugateGradient,
        };
    }

    fn n_parameters(&self) -> usize {
        return self.atd.len();
    }

    fn apply_normal_matrix(&self, v: &Array1<f64>) -> Array1<f64> {
        let mut product: Array1<f64> = at_a_p(self.a, v);
        if let Some((lambda, conditioner)) = self.damping {
            product = product + &(conditioner * conditioner * v) * lambda;
        }
        return product;
    }

    fn solve(&self) -> Result<SolveResult> {
        let time_start: Instant = Instant::now();
        let (ans, p): (Array2<f64>, Array2<f64>) = conjugate_gradient_path(self.atd, |v: &Array1<f64>| self.apply_normal_matrix(v), |r: &Array1<f64>| r.clone());
        info!("{} solved {} parameters, time elapsed: {:?}", self.inverse_method(), self.n_parameters(), time_start.elapsed());
        return Ok(SolveResult::new(self.inverse_method(), ans, p));
    }
}

#[test]
fn test_fast_cg_matches_cg() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::ConjugateGradient;
    use crate::observation_equation::{ObservationEquation, random_equation};
    use approx::assert_abs_diff_eq;

    let equation: ObservationEquation = random_equation(5, 40, 7, 21);
    let a: &Array2<f64> = equation.a().unwrap();
    let atd: &Array1<f64> = equation.atd();

    let fast: SolveResult = FastConjugateGradient::new(a, atd).unwrap().solve().unwrap();
    let standard: SolveResult = ConjugateGradient::new(equation.ata(), atd).unwrap().solve().unwrap();
    assert_eq!(fast.method(), InverseMethod::FastConjugateGradient);
    assert_abs_diff_eq!(fast.ans().to_owned(), standard.ans().to_owned(), epsilon = 1e-8);

    // The final model satisfies the normal equations
    let m: Array1<f64> = fast.answer(7).unwrap();
    assert_abs_diff_eq!(equation.ata().dot(&m), atd.clone(), epsilon = 1e-8);
}

#[test]
fn test_damped_fast_cg() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::ConjugateGradient;
    use crate::observation_equation::{ObservationEquation, random_equation};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let equation: ObservationEquation = random_equation(4, 30, 4, 8);
    let a: &Array2<f64> = equation.a().unwrap();
    let atd: &Array1<f64> = equation.atd();
    let conditioner: Array1<f64> = array![1.0, 2.0, 0.5, 1.5];
    let lambda: f64 = 0.3;

    let damped: FastConjugateGradient = FastConjugateGradient::new(a, atd).unwrap().with_damping(lambda, &conditioner).unwrap();
    assert_eq!(damped.inverse_method(), InverseMethod::FastConjugateGradientDamped);
    let result: SolveResult = damped.solve().unwrap();

    // Same as a dense solve on AtA + λ·diag(c²)
    let mut damped_ata: Array2<f64> = equation.ata().clone();
    for i in 0..4 {
        damped_ata[[i, i]] += lambda * conditioner[i] * conditioner[i];
    }
    let dense: SolveResult = ConjugateGradient::new(&damped_ata, atd).unwrap().solve().unwrap();
    assert_abs_diff_eq!(result.answer(4).unwrap(), dense.answer(4).unwrap(), epsilon = 1e-8);

    let short: Array1<f64> = array![1.0, 2.0];
    assert!(matches!(
        FastConjugateGradient::new(a, atd).unwrap().with_damping(lambda, &short),
        Err(Error::DimensionMismatch { context: _, expected: 4, got: 2 })
    ));
}
