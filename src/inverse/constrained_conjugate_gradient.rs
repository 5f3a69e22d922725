use crate::errors::{Error, Result};
use crate::inverse::inverse_solver_traits::conjugate_gradient_path;
use crate::inverse::{InverseMethod, InverseSolverTraits, SolveResult};
use log::info;
use ndarray::{Array1, Array2, s};
use std::time::Instant;

/// Conjugate gradient with the residual passed through a projector `H` (`z = H·r`),
/// which keeps every update inside the range of `H`
pub struct ConstrainedConjugateGradient<'a> {
    ata: &'a Array2<f64>,
    atd: &'a Array1<f64>,
    h: &'a Array2<f64>,
}

impl<'a> ConstrainedConjugateGradient<'a> {
    pub fn new(ata: &'a Array2<f64>, atd: &'a Array1<f64>, h: &'a Array2<f64>) -> Result<Self> {
        let n_params: usize = atd.len();
        if ata.nrows() != n_params || ata.ncols() != n_params {
            return Err(Error::dimension_mismatch("ConstrainedConjugateGradient AtA", n_params, ata.nrows().max(ata.ncols())));
        }
        if h.nrows() != n_params {
            return Err(Error::dimension_mismatch("ConstrainedConjugateGradient projector rows", n_params, h.nrows()));
        }
        if h.ncols() != n_params {
            return Err(Error::dimension_mismatch("ConstrainedConjugateGradient projector columns", n_params, h.ncols()));
        }
        return Ok(ConstrainedConjugateGradient { ata, atd, h });
    }
}

impl<'a> InverseSolverTraits for ConstrainedConjugateGradient<'a> {
    fn inverse_method(&self) -> InverseMethod {
        return InverseMethod::ConstrainedConjugateGradient;
    }

    fn n_parameters(&self) -> usize {
        return self.atd.len();
    }

    fn apply_normal_matrix(&self, v: &Array1<f64>) -> Array1<f64> {
        return self.ata.dot(v);
    }

    fn solve(&self) -> Result<SolveResult> {
        let time_start: Instant = Instant::now();
        let (ans, p): (Array2<f64>, Array2<f64>) = conjugate_gradient_path(self.atd, |v: &Array1<f64>| self.apply_normal_matrix(v), |r: &Array1<f64>| self.h.dot(r));
        info!("{} solved {} parameters, time elapsed: {:?}", self.inverse_method(), self.n_parameters(), time_start.elapsed());
        return Ok(SolveResult::new(self.inverse_method(), ans, p));
    }
}

/// Block-averaging projector over groups of `n_combine` consecutive parameters.
/// Every full block gets entries `1/n_combine`; a shorter trailing block is averaged over its own length.
pub fn projector_rectangle(n_params: usize, n_combine: usize) -> Result<Array2<f64>> {
    if n_combine == 0 {
        return Err(Error::InvalidArgument {
            reason: "n_combine must be at least 1".to_string(),
        });
    }
    let mut h: Array2<f64> = Array2::zeros((n_params, n_params));
    for start in (0..n_params).step_by(n_combine) {
        let end: usize = (start + n_combine).min(n_params);
        let value: f64 = 1.0 / (end - start) as f64;
        h.slice_mut(s![start..end, start..end]).fill(value);
    }
    return Ok(h);
}

#[test]
fn test_projector_rectangle() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let h: Array2<f64> = projector_rectangle(4, 2).unwrap();
    assert_eq!(h, array![[0.5, 0.5, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0], [0.0, 0.0, 0.5, 0.5], [0.0, 0.0, 0.5, 0.5]]);
    // Idempotent
    assert_abs_diff_eq!(h.dot(&h), h.clone(), epsilon = 1e-15);

    let h: Array2<f64> = projector_rectangle(5, 2).unwrap();
    assert_eq!(h[[4, 4]], 1.0);
    assert_eq!(h.row(4).sum(), 1.0);
    assert_abs_diff_eq!(h.dot(&h), h.clone(), epsilon = 1e-15);

    assert_eq!(projector_rectangle(3, 1).unwrap(), Array2::<f64>::eye(3));
    assert!(matches!(projector_rectangle(3, 0), Err(Error::InvalidArgument { .. })));
}

#[test]
fn test_constrained_cg() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::inverse::ConjugateGradient;
    use crate::inverse::inverse_solver_traits::random_spd;
    use approx::assert_abs_diff_eq;

    let n: usize = 6;
    let ata: Array2<f64> = random_spd(n, 12);
    let atd: Array1<f64> = Array1::from_iter((0..n).map(|i: usize| 1.0 + i as f64));

    // Identity projector reproduces plain CG
    let identity: Array2<f64> = Array2::eye(n);
    let constrained: SolveResult = ConstrainedConjugateGradient::new(&ata, &atd, &identity).unwrap().solve().unwrap();
    let plain: SolveResult = ConjugateGradient::new(&ata, &atd).unwrap().solve().unwrap();
    assert_abs_diff_eq!(constrained.ans().to_owned(), plain.ans().to_owned(), epsilon = 1e-12);

    // Block averaging keeps paired parameters equal along the whole path
    let h: Array2<f64> = projector_rectangle(n, 2).unwrap();
    let solver: ConstrainedConjugateGradient = ConstrainedConjugateGradient::new(&ata, &atd, &h).unwrap();
    let result: SolveResult = solver.solve().unwrap();
    for i_column in 0..n {
        let m: Array1<f64> = result.answer(i_column + 1).unwrap();
        assert!(m.iter().all(|value: &f64| value.is_finite()));
        for block in 0..n / 2 {
            assert_abs_diff_eq!(m[2 * block], m[2 * block + 1], epsilon = 1e-10);
        }
    }

    let wrong: Array2<f64> = Array2::eye(n - 1);
    assert!(matches!(ConstrainedConjugateGradient::new(&ata, &atd, &wrong), Err(Error::DimensionMismatch { .. })));
}
