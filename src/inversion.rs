use crate::aic::aic_series;
use crate::conditioner::sensitivity_conditioner;
use crate::config::InversionSettings;
use crate::dvector::Dvector;
use crate::errors::{Error, Result};
use crate::inverse::{
    ConjugateGradient, ConstrainedConjugateGradient, FastConjugateGradient, InverseMethod, InverseSolverTraits, NonlinearConjugateGradient, SolveResult,
    projector_rectangle,
};
use crate::model_covariance::ModelCovarianceMatrix;
use crate::observation_equation::ObservationEquation;
use crate::parameters::UnknownParameter;
use crate::regularisation::regularisation_matrix;
use crate::resampling::bootstrap_solutions;
use log::{info, warn};
use ndarray::{Array1, Array2};
use std::time::{Duration, Instant};

/// Everything one solver produced, ready for an external writer
#[derive(Debug, Clone)]
pub struct MethodResult {
    pub solution: SolveResult,
    /// Column `i` is the perturbation of the original parameters after `i + 1` directions
    pub model_path: Array2<f64>,
    /// Entry `k` is the variance after `k` directions; entry 0 is the starting model
    pub variances: Array1<f64>,
    /// One AIC series per configured alpha, as `(alpha, series)`
    pub aic: Vec<(f64, Array1<f64>)>,
}

impl MethodResult {
    pub fn method(&self) -> InverseMethod {
        return self.solution.method();
    }

    /// Number of directions with the lowest AIC for the `i_alpha`-th alpha
    pub fn best_n_directions(&self, i_alpha: usize) -> Option<usize> {
        let (_, series): &(f64, Array1<f64>) = self.aic.get(i_alpha)?;
        return series
            .iter()
            .enumerate()
            .filter(|(_, value): &(usize, &f64)| value.is_finite())
            .min_by(|a: &(usize, &f64), b: &(usize, &f64)| a.1.total_cmp(b.1))
            .map(|(k, _): (usize, &f64)| k);
    }
}

#[derive(Debug, Clone)]
pub struct InversionResult {
    pub parameters: Vec<UnknownParameter>,
    pub initial_variance: f64,
    pub methods: Vec<MethodResult>,
    /// Bootstrap models at the full number of directions of the first method
    pub bootstrap: Vec<Array1<f64>>,
}

/// Condition the equation as configured: regularisation, then sensitivity conditioner, then model covariance
pub fn prepare_equation(equation: &mut ObservationEquation, settings: &InversionSettings) -> Result<()> {
    if !settings.regularisation.is_empty() {
        let penalty: Array2<f64> = regularisation_matrix(equation.parameters(), &equation.diagonal_of_ata(), &settings.regularisation)?;
        equation.add_regularisation(&penalty)?;
    }
    if settings.use_conditioner {
        let conditioner: Array1<f64> = sensitivity_conditioner(equation.parameters(), &equation.diagonal_of_ata())?;
        equation.apply_conditioner(&conditioner)?;
    }
    if settings.use_model_covariance {
        let cm: ModelCovarianceMatrix = ModelCovarianceMatrix::new(equation.parameters(), settings.cm_vertical, settings.cm_horizontal, None)?;
        equation.apply_model_covariance(&cm)?;
    }
    return Ok(());
}

/// Run one solver on a prepared equation
pub fn solve_with(equation: &ObservationEquation, method: InverseMethod, settings: &InversionSettings) -> Result<SolveResult> {
    let n_params: usize = equation.n_parameters();
    let result: SolveResult = match method {
        InverseMethod::ConjugateGradient => ConjugateGradient::new(equation.ata(), equation.atd())?.solve()?,
        InverseMethod::PreconditionedConjugateGradient => {
            // Jacobi; parameters the data do not see are left unscaled
            let jacobi: Array1<f64> = equation.diagonal_of_ata().mapv(|value: f64| if value == 0.0 { 1.0 } else { 1.0 / value });
            ConjugateGradient::new(equation.ata(), equation.atd())?.with_preconditioner(&jacobi)?.solve()?
        }
        InverseMethod::FastConjugateGradient => FastConjugateGradient::new(require_a(equation, method)?, equation.atd())?.solve()?,
        InverseMethod::FastConjugateGradientDamped => {
            let lambda: f64 = settings.damping.ok_or_else(|| Error::InvalidArgument {
                reason: format!("{} needs a damping coefficient", method),
            })?;
            // λ·diag(AtA), Levenberg-Marquardt style
            let scale: Array1<f64> = equation.diagonal_of_ata().mapv(f64::sqrt);
            FastConjugateGradient::new(require_a(equation, method)?, equation.atd())?
                .with_damping(lambda, &scale)?
                .solve()?
        }
        InverseMethod::ConstrainedConjugateGradient => {
            let h: Array2<f64> = projector_rectangle(n_params, settings.n_combine)?;
            ConstrainedConjugateGradient::new(equation.ata(), equation.atd(), &h)?.solve()?
        }
        InverseMethod::NonlinearConjugateGradient => {
            let a: &Array2<f64> = require_a(equation, method)?;
            let dvector: &Dvector = equation.dvector().ok_or_else(|| Error::MissingSensitivityMatrix {
                operation: method.to_string(),
            })?;
            let observed: Array1<f64> = dvector.get_obs();
            let synthetic: Array1<f64> = dvector.get_syn();
            let data_ata: Array2<f64> = equation.data_ata();
            NonlinearConjugateGradient::new(&data_ata, a, &synthetic, &observed)?.solve()?
        }
    };
    return Ok(result);
}

/// Prepare the equation, run every configured solver and collect solution paths, variances and AIC tables
pub fn run_inversion(mut equation: ObservationEquation, settings: &InversionSettings) -> Result<InversionResult> {
    let time_start: Instant = Instant::now();
    settings.validate()?;
    prepare_equation(&mut equation, settings)?;

    let n_params: usize = equation.n_parameters();
    let initial_variance: f64 = equation.variance_of(&Array1::zeros(n_params))?;
    info!("Inversion: {} parameters, {} data points, initial variance = {:.6}", n_params, equation.npts(), initial_variance);

    let mut methods: Vec<MethodResult> = Vec::with_capacity(settings.inverse_methods.len());
    for method in settings.inverse_methods.iter().cloned() {
        let solution: SolveResult = solve_with(&equation, method, settings)?;

        let mut model_path: Array2<f64> = Array2::zeros((n_params, n_params));
        let mut variances: Array1<f64> = Array1::zeros(n_params + 1);
        variances[0] = initial_variance;
        for i_column in 0..n_params {
            let m: Array1<f64> = solution.ans().column(i_column).to_owned();
            variances[i_column + 1] = equation.variance_of(&m)?;
            model_path.column_mut(i_column).assign(&equation.model_perturbation(&m)?);
        }
        let aic: Vec<(f64, Array1<f64>)> = settings
            .alpha
            .iter()
            .map(|alpha: &f64| (*alpha, aic_series(&variances, equation.npts(), *alpha)))
            .collect();

        info!("{}: final variance = {:.6}", method, variances[n_params]);
        methods.push(MethodResult {
            solution,
            model_path,
            variances,
            aic,
        });
    }

    let bootstrap: Vec<Array1<f64>> = if settings.n_bootstrap > 0 {
        if equation.has_penalty() {
            warn!("Bootstrap solves the resampled data without the regularisation or model covariance penalty");
        }
        bootstrap_solutions(&equation, settings.n_bootstrap, n_params, settings.bootstrap_seed)?
    } else {
        Vec::new()
    };

    let duration: Duration = time_start.elapsed();
    info!("Inversion time elapsed: {:?}", duration);

    return Ok(InversionResult {
        parameters: equation.parameters().to_vec(),
        initial_variance,
        methods,
        bootstrap,
    });
}

fn require_a(equation: &ObservationEquation, method: InverseMethod) -> Result<&Array2<f64>> {
    return equation.a().ok_or_else(|| Error::MissingSensitivityMatrix {
        operation: method.to_string(),
    });
}

#[test]
fn test_run_inversion_two_windows() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::two_window_equation;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let _ = env_logger::builder().is_test(true).try_init();
    let settings: InversionSettings = InversionSettings {
        inverse_methods: vec![
            InverseMethod::ConjugateGradient,
            InverseMethod::PreconditionedConjugateGradient,
            InverseMethod::FastConjugateGradient,
            InverseMethod::ConstrainedConjugateGradient,
        ],
        n_combine: 1,
        ..InversionSettings::default()
    };
    let result: InversionResult = run_inversion(two_window_equation(), &settings).unwrap();

    let precision: f64 = 1e-10;
    assert_abs_diff_eq!(result.initial_variance, 2.45 / 7.2, epsilon = precision);
    assert_eq!(result.methods.len(), 4);
    for method_result in result.methods.iter() {
        assert_abs_diff_eq!(method_result.model_path.column(1).to_owned(), array![0.25 / 0.29, 1.0], epsilon = 1e-6);
        assert_eq!(method_result.variances.len(), 3);
        assert!(method_result.variances[2] <= method_result.variances[1] + precision);
        assert!(method_result.variances[1] <= method_result.variances[0] + precision);
        assert_eq!(method_result.aic.len(), 3);
        assert_eq!(method_result.aic[0].1.len(), 3);
    }
    // Least squares variance: ‖d‖² − Atd·m over ‖obs‖²
    let best: f64 = (2.45 - (0.25 * 0.25 / 0.29 + 0.29)) / 7.2;
    assert_abs_diff_eq!(result.methods[0].variances[2], best, epsilon = precision);
    assert!(result.bootstrap.is_empty());
}

#[test]
fn test_run_inversion_with_conditioning() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::random_equation;
    use crate::parameters::PartialType;
    use crate::regularisation::RegularisationFamily;

    let settings: InversionSettings = InversionSettings {
        inverse_methods: vec![InverseMethod::ConjugateGradient, InverseMethod::FastConjugateGradientDamped, InverseMethod::NonlinearConjugateGradient],
        regularisation: vec![RegularisationFamily {
            partial_type: PartialType::ParVs,
            lambda: 0.1,
            gamma: 0.01,
        }],
        damping: Some(0.05),
        use_conditioner: true,
        use_model_covariance: true,
        cm_vertical: 60.0,
        n_bootstrap: 3,
        bootstrap_seed: 5,
        ..InversionSettings::default()
    };
    let result: InversionResult = run_inversion(random_equation(4, 30, 5, 77), &settings).unwrap();

    assert_eq!(result.parameters.len(), 5);
    assert_eq!(result.bootstrap.len(), 3);

    // The penalty that the bootstrap warning reports on is set by preparation
    let mut prepared: ObservationEquation = random_equation(4, 30, 5, 77);
    prepare_equation(&mut prepared, &settings).unwrap();
    assert!(prepared.has_penalty());
    let mut bare: ObservationEquation = random_equation(4, 30, 5, 77);
    prepare_equation(&mut bare, &InversionSettings::default()).unwrap();
    assert!(!bare.has_penalty());
    let cg: &MethodResult = &result.methods[0];
    assert_eq!(cg.method(), InverseMethod::ConjugateGradient);
    assert!(cg.solution.is_finite());
    // Regularised least squares never fits worse than the starting model
    assert!(cg.variances[5] <= result.initial_variance);
    assert!(cg.best_n_directions(0).is_some());
    assert!(result.methods.iter().all(|method_result: &MethodResult| method_result.variances.iter().all(|value: &f64| value.is_finite())));
}

#[test]
fn test_solve_with_needs_sensitivity_matrix() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::observation_equation::random_equation;

    let full: ObservationEquation = random_equation(2, 10, 3, 6);
    let reduced: ObservationEquation =
        ObservationEquation::from_normal_equations(full.parameters(), full.ata().clone(), full.atd().clone(), full.d_norm2(), full.obs_norm2(), full.npts()).unwrap();
    let settings: InversionSettings = InversionSettings::default();
    assert!(solve_with(&reduced, InverseMethod::ConjugateGradient, &settings).is_ok());
    assert!(matches!(
        solve_with(&reduced, InverseMethod::FastConjugateGradient, &settings),
        Err(Error::MissingSensitivityMatrix { .. })
    ));
    assert!(matches!(
        solve_with(&reduced, InverseMethod::NonlinearConjugateGradient, &settings),
        Err(Error::MissingSensitivityMatrix { .. })
    ));
}
