use crate::errors::{Error, Result};
use crate::observation_equation::compute_ata;
use crate::parameters::{PartialType, UnknownParameter};
use log::info;
use ndarray::{Array1, Array2};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

/// Smoothing (`lambda`) and damping (`gamma`) strength for one parameter type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularisationFamily {
    pub partial_type: PartialType,
    pub lambda: f64,
    pub gamma: f64,
}

/// `√(max diag AtA)` over the parameters of one type, or `None` if the type is absent
pub fn family_norm(parameters: &[UnknownParameter], diagonal_of_ata: &Array1<f64>, partial_type: PartialType) -> Result<Option<f64>> {
    let values: Array1<f64> = family_indices(parameters, partial_type).iter().map(|i_param: &usize| diagonal_of_ata[*i_param]).collect();
    if values.is_empty() {
        return Ok(None);
    }
    let max: f64 = *values.max().map_err(|error| Error::InvalidArgument {
        reason: format!("diagonal of AtA for {} has no maximum: {}", partial_type, error),
    })?;
    return Ok(Some(max.sqrt()));
}

/// Second-order radial difference operator over one parameter type.
/// Parameters are ordered by radius; interior rows are `[1, −2, 1]`, the two end rows `[−2, 1]` and `[1, −2]`.
/// Rows of other parameters are zero.
pub fn radial_second_order_operator(parameters: &[UnknownParameter], partial_type: PartialType) -> Array2<f64> {
    let n_params: usize = parameters.len();
    let mut indices: Vec<usize> = family_indices(parameters, partial_type);
    indices.sort_by(|i: &usize, j: &usize| parameters[*i].location().radius().total_cmp(&parameters[*j].location().radius()));

    let mut d2: Array2<f64> = Array2::zeros((n_params, n_params));
    let n_family: usize = indices.len();
    if n_family < 2 {
        return d2;
    }
    for k in 0..n_family {
        let row: usize = indices[k];
        d2[[row, row]] = -2.0;
        if k > 0 {
            d2[[row, indices[k - 1]]] = 1.0;
        }
        if k + 1 < n_family {
            d2[[row, indices[k + 1]]] = 1.0;
        }
    }
    return d2;
}

/// Penalty matrix for all families: `(λ·norm)²·D2ᵗD2 + (γ·norm)²·I` on each family's block.
/// The norm makes `λ` and `γ` relative to how strongly the data constrain that family.
///
/// # Arguments
/// * `parameters` - column order
/// * `diagonal_of_ata` - diagonal of the unregularised normal matrix
/// * `families` - one entry per regularised parameter type; types absent from `parameters` are ignored
pub fn regularisation_matrix(parameters: &[UnknownParameter], diagonal_of_ata: &Array1<f64>, families: &[RegularisationFamily]) -> Result<Array2<f64>> {
    let n_params: usize = parameters.len();
    if diagonal_of_ata.len() != n_params {
        return Err(Error::dimension_mismatch("regularisation_matrix diagonal", n_params, diagonal_of_ata.len()));
    }

    let mut penalty: Array2<f64> = Array2::zeros((n_params, n_params));
    for family in families {
        let norm: f64 = match family_norm(parameters, diagonal_of_ata, family.partial_type)? {
            Some(norm) => norm,
            None => continue,
        };
        info!("Regularisation {}: norm = {:.3e}, lambda = {}, gamma = {}", family.partial_type, norm, family.lambda, family.gamma);

        let smoothing: f64 = (family.lambda * norm).powi(2);
        let d2: Array2<f64> = radial_second_order_operator(parameters, family.partial_type);
        penalty = penalty + compute_ata(&d2) * smoothing;

        let damping: f64 = (family.gamma * norm).powi(2);
        for i_param in family_indices(parameters, family.partial_type) {
            penalty[[i_param, i_param]] += damping;
        }
    }
    return Ok(penalty);
}

fn family_indices(parameters: &[UnknownParameter], partial_type: PartialType) -> Vec<usize> {
    return (0..parameters.len()).filter(|i_param: &usize| parameters[*i_param].partial_type() == partial_type).collect();
}

#[cfg(test)]
fn layered_parameters() -> Vec<UnknownParameter> {
    use crate::parameters::Location;

    // Deliberately not sorted by radius, and interleaved with another type
    return vec![
        UnknownParameter::new(PartialType::ParVs, Location::Radius(5800.0), 1.0),
        UnknownParameter::new(PartialType::ParQ, Location::Radius(5800.0), 1.0),
        UnknownParameter::new(PartialType::ParVs, Location::Radius(5600.0), 1.0),
        UnknownParameter::new(PartialType::ParVs, Location::Radius(5700.0), 1.0),
        UnknownParameter::new(PartialType::ParVs, Location::Radius(5500.0), 1.0),
    ];
}

#[test]
fn test_radial_second_order_operator() {
    // Lazy loading of packages which are not used anywhere else in the code
    use ndarray::array;

    let parameters: Vec<UnknownParameter> = layered_parameters();
    let d2: Array2<f64> = radial_second_order_operator(&parameters, PartialType::ParVs);

    // Radius order: 5500 (4), 5600 (2), 5700 (3), 5800 (0)
    assert_eq!(d2.row(4).to_owned(), array![0.0, 0.0, 1.0, 0.0, -2.0]);
    assert_eq!(d2.row(2).to_owned(), array![0.0, 0.0, -2.0, 1.0, 1.0]);
    assert_eq!(d2.row(3).to_owned(), array![1.0, 0.0, 1.0, -2.0, 0.0]);
    assert_eq!(d2.row(0).to_owned(), array![-2.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(d2.row(1).to_owned(), Array1::<f64>::zeros(5));

    // A linear profile in radius has zero curvature on interior rows
    let linear: Array1<f64> = parameters.iter().map(|parameter: &UnknownParameter| parameter.location().radius() / 100.0).collect();
    let curvature: Array1<f64> = d2.dot(&linear);
    assert_eq!(curvature[2], 0.0);
    assert_eq!(curvature[3], 0.0);

    // Single-parameter family contributes nothing
    assert_eq!(radial_second_order_operator(&parameters, PartialType::ParQ), Array2::<f64>::zeros((5, 5)));
}

#[test]
fn test_regularisation_matrix() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let parameters: Vec<UnknownParameter> = layered_parameters();
    let diagonal: Array1<f64> = array![4.0, 9.0, 1.0, 2.0, 3.0];
    let families: Vec<RegularisationFamily> = vec![
        RegularisationFamily {
            partial_type: PartialType::ParVs,
            lambda: 0.5,
            gamma: 0.0,
        },
        RegularisationFamily {
            partial_type: PartialType::ParQ,
            lambda: 1.0,
            gamma: 0.1,
        },
        RegularisationFamily {
            partial_type: PartialType::Mu,
            lambda: 1.0,
            gamma: 1.0,
        },
    ];
    assert_eq!(family_norm(&parameters, &diagonal, PartialType::ParVs).unwrap(), Some(2.0));
    assert_eq!(family_norm(&parameters, &diagonal, PartialType::Mu).unwrap(), None);

    let penalty: Array2<f64> = regularisation_matrix(&parameters, &diagonal, &families).unwrap();
    let d2: Array2<f64> = radial_second_order_operator(&parameters, PartialType::ParVs);
    let precision: f64 = 1e-12;
    // (0.5 * 2)² = 1 for the smoothing of ParVs
    let mut expected: Array2<f64> = d2.t().dot(&d2);
    // (0.1 * 3)² damping for the single ParQ parameter
    expected[[1, 1]] += 0.09;
    assert_abs_diff_eq!(penalty, expected, epsilon = precision);
    assert_eq!(penalty, penalty.t().to_owned());

    assert!(matches!(regularisation_matrix(&parameters, &array![1.0], &families), Err(Error::DimensionMismatch { .. })));
}
