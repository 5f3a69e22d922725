use crate::dvector::Dvector;
use crate::errors::{Error, Result};
use crate::inverse::{FastConjugateGradient, InverseSolverTraits, SolveResult};
use crate::observation_equation::{ObservationEquation, compute_atv};
use log::info;
use ndarray::{Array1, Array2, s};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Data of one bootstrap realisation: time windows drawn with replacement, their stacked rows of `A`, and `Aᵗd`
#[derive(Debug, Clone)]
pub struct BootstrapSample {
    pub windows: Vec<usize>,
    pub a: Array2<f64>,
    pub atd: Array1<f64>,
}

/// Draw `n_time_window` windows with replacement and stack their rows of `A` and `d`
pub fn bootstrap_sample<R: Rng>(equation: &ObservationEquation, rng: &mut R) -> Result<BootstrapSample> {
    let a: &Array2<f64> = equation.a().ok_or_else(|| Error::MissingSensitivityMatrix {
        operation: "bootstrap_sample".to_string(),
    })?;
    let dvector: &Dvector = equation.dvector().ok_or_else(|| Error::MissingSensitivityMatrix {
        operation: "bootstrap_sample".to_string(),
    })?;
    let n_time_window: usize = dvector.n_time_window();
    let lengths: Vec<usize> = dvector.lengths();
    let start_points: &[usize] = dvector.start_points();

    let windows: Vec<usize> = (0..n_time_window).map(|_| rng.random_range(0..n_time_window)).collect();
    let n_rows: usize = windows.iter().map(|i_window: &usize| lengths[*i_window]).sum();

    let mut a_sample: Array2<f64> = Array2::zeros((n_rows, a.ncols()));
    let mut d_sample: Array1<f64> = Array1::zeros(n_rows);
    let mut row: usize = 0;
    for i_window in windows.iter().cloned() {
        let start: usize = start_points[i_window];
        let length: usize = lengths[i_window];
        a_sample.slice_mut(s![row..row + length, ..]).assign(&a.slice(s![start..start + length, ..]));
        d_sample.slice_mut(s![row..row + length]).assign(&dvector.d_vecs()[i_window]);
        row += length;
    }
    let atd: Array1<f64> = compute_atv(&a_sample, &d_sample);

    return Ok(BootstrapSample { windows, a: a_sample, atd });
}

/// Solve `n_realisations` bootstrap problems with fast CG, in parallel.
/// Realisation `i` uses the seed `seed + i`, so results do not depend on scheduling.
///
/// # Returns
/// * model after `n_directions` directions for each realisation, mapped back to the original parameters
pub fn bootstrap_solutions(equation: &ObservationEquation, n_realisations: usize, n_directions: usize, seed: u64) -> Result<Vec<Array1<f64>>> {
    let time_start: Instant = Instant::now();
    if n_directions > equation.n_parameters() {
        return Err(Error::InvalidArgument {
            reason: format!("{} directions requested for {} parameters", n_directions, equation.n_parameters()),
        });
    }

    let solutions: Vec<Array1<f64>> = (0..n_realisations)
        .into_par_iter()
        .map(|i_realisation: usize| {
            let mut rng: StdRng = StdRng::seed_from_u64(seed.wrapping_add(i_realisation as u64));
            let sample: BootstrapSample = bootstrap_sample(equation, &mut rng)?;
            let result: SolveResult = FastConjugateGradient::new(&sample.a, &sample.atd)?.solve()?;
            let model: Array1<f64> = result.answer(n_directions)?;
            return equation.model_perturbation(&model);
        })
        .collect::<Result<Vec<Array1<f64>>>>()?;

    let duration: Duration = time_start.elapsed();
    info!("Bootstrap: {} realisations, time elapsed: {:?}", n_realisations, duration);
    return Ok(solutions);
}

#[test]
fn test_bootstrap_sample() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::random_equation;
    use approx::assert_abs_diff_eq;

    let equation: ObservationEquation = random_equation(5, 12, 3, 2);
    let mut rng: StdRng = StdRng::seed_from_u64(99);
    let sample: BootstrapSample = bootstrap_sample(&equation, &mut rng).unwrap();

    assert_eq!(sample.windows.len(), 5);
    assert_eq!(sample.a.dim(), (60, 3));
    // Rebuild Atd from whole windows of the original equation
    let a: &Array2<f64> = equation.a().unwrap();
    let d: Array1<f64> = equation.dvector().unwrap().get_d();
    let mut expected: Array1<f64> = Array1::zeros(3);
    for i_window in sample.windows.iter().cloned() {
        let start: usize = 12 * i_window;
        expected = expected + a.slice(s![start..start + 12, ..]).t().dot(&d.slice(s![start..start + 12]));
    }
    assert_abs_diff_eq!(sample.atd, expected, epsilon = 1e-10);
}

#[test]
fn test_bootstrap_solutions_are_reproducible() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::random_equation;

    let equation: ObservationEquation = random_equation(6, 15, 3, 4);
    let first: Vec<Array1<f64>> = bootstrap_solutions(&equation, 8, 3, 123).unwrap();
    let second: Vec<Array1<f64>> = bootstrap_solutions(&equation, 8, 3, 123).unwrap();
    assert_eq!(first.len(), 8);
    assert_eq!(first, second);
    assert!(matches!(bootstrap_solutions(&equation, 2, 4, 1), Err(Error::InvalidArgument { .. })));

    let normal_only: ObservationEquation =
        ObservationEquation::from_normal_equations(equation.parameters(), equation.ata().clone(), equation.atd().clone(), equation.d_norm2(), equation.obs_norm2(), equation.npts()).unwrap();
    let mut rng: StdRng = StdRng::seed_from_u64(1);
    assert!(matches!(bootstrap_sample(&normal_only, &mut rng), Err(Error::MissingSensitivityMatrix { .. })));
}
