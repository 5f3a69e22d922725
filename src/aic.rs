use ndarray::Array1;

const PI: f64 = std::f64::consts::PI;

/// Akaike information criterion for a Gaussian misfit:
/// `n·(ln 2π + ln variance + 1) + 2k + 2`
///
/// # Arguments
/// * `variance` - normalised residual variance
/// * `n_independent` - number of independent data
/// * `k` - number of model parameters (here, directions used)
pub fn compute_aic(variance: f64, n_independent: f64, k: usize) -> f64 {
    return n_independent * ((2.0 * PI).ln() + variance.ln() + 1.0) + 2.0 * k as f64 + 2.0;
}

/// AIC along a solution path. Entry `k` of `variances` is the variance after `k` directions
/// (entry 0 is the starting model). The data are assumed to have `npts / alpha` independent samples,
/// truncated to an integer.
pub fn aic_series(variances: &Array1<f64>, npts: usize, alpha: f64) -> Array1<f64> {
    let n_independent: f64 = ((npts as f64 / alpha) as usize) as f64;
    return Array1::from_iter(variances.iter().enumerate().map(|(k, variance): (usize, &f64)| compute_aic(*variance, n_independent, k)));
}

#[test]
fn test_aic() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(compute_aic(1.0, 10.0, 0), 10.0 * ((2.0 * PI).ln() + 1.0) + 2.0, epsilon = precision);

    // 1001 / 100 keeps 10 independent samples
    let aic: Array1<f64> = aic_series(&array![1.0, 0.5, 0.49], 1001, 100.0);
    assert_abs_diff_eq!(aic[0], compute_aic(1.0, 10.0, 0), epsilon = precision);
    assert_abs_diff_eq!(aic[1], compute_aic(0.5, 10.0, 1), epsilon = precision);
    // A large drop in variance beats the parameter cost, a tiny one does not
    assert!(aic[1] < aic[0]);
    assert!(aic[2] > aic[1]);
}
