use crate::errors::{Error, Result};
use crate::parameters::{PartialType, UnknownParameter};
use ndarray::Array1;
use std::collections::BTreeMap;

/// Upper bound on the relative boost of a weakly sensitive parameter
const MAX_BOOST: f64 = 2.0;

/// Per-parameter scale that evens out sensitivity within each (type, radius) group.
///
/// In a group, `αᵢ = min(√(max diag / diagᵢ), 2)` and the scale is `√αᵢ / √(Σ αⱼ·diagⱼ)`,
/// so the conditioned diagonal of each group sums to one.
///
/// # Arguments
/// * `parameters` - column order
/// * `diagonal_of_ata` - diagonal of the normal matrix
///
/// # Returns
/// * conditioner `c`, to be used as `m = c ⊙ m'`
pub fn sensitivity_conditioner(parameters: &[UnknownParameter], diagonal_of_ata: &Array1<f64>) -> Result<Array1<f64>> {
    let n_params: usize = parameters.len();
    if diagonal_of_ata.len() != n_params {
        return Err(Error::dimension_mismatch("sensitivity_conditioner diagonal", n_params, diagonal_of_ata.len()));
    }

    // Radius keyed by bit pattern; equal radii are exactly equal values
    let mut groups: BTreeMap<(PartialType, u64), Vec<usize>> = BTreeMap::new();
    for (i_param, parameter) in parameters.iter().enumerate() {
        groups
            .entry((parameter.partial_type(), parameter.location().radius().to_bits()))
            .or_default()
            .push(i_param);
    }

    let mut conditioner: Array1<f64> = Array1::zeros(n_params);
    for indices in groups.values() {
        let max_diagonal: f64 = indices.iter().map(|i: &usize| diagonal_of_ata[*i]).fold(f64::NEG_INFINITY, f64::max);
        let alphas: Vec<f64> = indices.iter().map(|i: &usize| (max_diagonal / diagonal_of_ata[*i]).sqrt().min(MAX_BOOST)).collect();
        let total: f64 = indices.iter().zip(alphas.iter()).map(|(i, alpha): (&usize, &f64)| alpha * diagonal_of_ata[*i]).sum();
        let scale: f64 = 1.0 / total.sqrt();
        for (i_param, alpha) in indices.iter().zip(alphas.iter()) {
            conditioner[*i_param] = alpha.sqrt() * scale;
        }
    }
    return Ok(conditioner);
}

#[test]
fn test_sensitivity_conditioner() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::parameters::Location;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let point = |longitude: f64, radius: f64| Location::Point {
        latitude: 0.0,
        longitude,
        radius,
    };
    let parameters: Vec<UnknownParameter> = vec![
        UnknownParameter::new(PartialType::Mu, point(0.0, 3500.0), 1.0),
        UnknownParameter::new(PartialType::Mu, point(5.0, 3500.0), 1.0),
        UnknownParameter::new(PartialType::Mu, point(10.0, 3500.0), 1.0),
        UnknownParameter::new(PartialType::Mu, point(0.0, 3600.0), 1.0),
    ];
    let diagonal: Array1<f64> = array![16.0, 4.0, 0.25, 9.0];
    let conditioner: Array1<f64> = sensitivity_conditioner(&parameters, &diagonal).unwrap();

    // Group at 3500: alphas 1, 2, min(8, 2) = 2
    let total: f64 = 16.0 + 2.0 * 4.0 + 2.0 * 0.25;
    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(conditioner[0], (1.0 / total).sqrt(), epsilon = precision);
    assert_abs_diff_eq!(conditioner[1], (2.0 / total).sqrt(), epsilon = precision);
    assert_abs_diff_eq!(conditioner[2], (2.0 / total).sqrt(), epsilon = precision);
    // A group of one is scaled to unit diagonal
    assert_abs_diff_eq!(conditioner[3], 1.0 / 3.0, epsilon = precision);

    let conditioned: Array1<f64> = &diagonal * &conditioner * &conditioner;
    assert_abs_diff_eq!(conditioned[0] + conditioned[1] + conditioned[2], 1.0, epsilon = precision);
    assert!(matches!(sensitivity_conditioner(&parameters, &array![1.0]), Err(Error::DimensionMismatch { .. })));
}
