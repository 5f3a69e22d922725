use crate::errors::{Error, Result};
use crate::parameters::UnknownParameter;
use log::info;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

/// Off-diagonal correlations below this are stored as exactly zero
pub const CM_THRESHOLD: f64 = 0.005;

/// Gaussian spatial correlation between unknown parameters, kept as sparse rows.
///
/// `Cm[i,j] = w_i·w_j·exp(−(Δh/h)²)·exp(−(Δr/v)²)` for `i ≠ j`, with `Δh` the great-circle
/// separation in degrees and `Δr` the radius difference. `Cm[i,i] = w_i²`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCovarianceMatrix {
    n_params: usize,
    pre_weights: Array1<f64>,
    indices: Vec<Vec<usize>>,
    values: Vec<Vec<f64>>,
}

impl ModelCovarianceMatrix {
    /// # Arguments
    /// * `parameters` - the unknowns, in column order
    /// * `vertical_length` - radial correlation length `v`
    /// * `horizontal_length` - horizontal correlation length `h`, in degrees
    /// * `pre_weights` - per-parameter weights `w`, all ones when `None`
    ///
    /// A length `<= 0.0` switches off correlation in that direction: only pairs at zero separation keep a factor of 1.
    pub fn new(parameters: &[UnknownParameter], vertical_length: f64, horizontal_length: f64, pre_weights: Option<Array1<f64>>) -> Result<Self> {
        let n_params: usize = parameters.len();
        let pre_weights: Array1<f64> = pre_weights.unwrap_or_else(|| Array1::ones(n_params));
        if pre_weights.len() != n_params {
            return Err(Error::dimension_mismatch("ModelCovarianceMatrix pre-weights", n_params, pre_weights.len()));
        }

        // Upper triangle only, mirrored below, so the stored matrix is exactly symmetric
        let upper: Vec<Vec<(usize, f64)>> = (0..n_params)
            .into_par_iter()
            .map(|i_param: usize| {
                let mut row: Vec<(usize, f64)> = Vec::new();
                for j_param in i_param + 1..n_params {
                    let horizontal: f64 = parameters[i_param].location().great_circle_distance_deg(&parameters[j_param].location());
                    let radial: f64 = parameters[i_param].location().radial_distance(&parameters[j_param].location());
                    let value: f64 = pre_weights[i_param] * pre_weights[j_param] * gaussian(horizontal, horizontal_length) * gaussian(radial, vertical_length);
                    if value >= CM_THRESHOLD {
                        row.push((j_param, value));
                    }
                }
                return row;
            })
            .collect::<Vec<Vec<(usize, f64)>>>();

        let mut rows: Vec<Vec<(usize, f64)>> = (0..n_params).map(|i_param: usize| vec![(i_param, pre_weights[i_param].powi(2))]).collect();
        for (i_param, row) in upper.iter().enumerate() {
            for (j_param, value) in row.iter().cloned() {
                rows[i_param].push((j_param, value));
                rows[j_param].push((i_param, value));
            }
        }

        let mut indices: Vec<Vec<usize>> = Vec::with_capacity(n_params);
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(n_params);
        for mut row in rows.into_iter() {
            row.sort_by_key(|(j_param, _): &(usize, f64)| *j_param);
            indices.push(row.iter().map(|(j_param, _): &(usize, f64)| *j_param).collect());
            values.push(row.iter().map(|(_, value): &(usize, f64)| *value).collect());
        }

        let cm: ModelCovarianceMatrix = ModelCovarianceMatrix {
            n_params,
            pre_weights,
            indices,
            values,
        };
        info!("Model covariance: {} parameters, {} non-zero entries (h = {}, v = {})", n_params, cm.nnz(), horizontal_length, vertical_length);

        return Ok(cm);
    }

    /// `Cm·M`, touching only the stored entries
    pub fn left_multiply(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>> {
        if matrix.nrows() != self.n_params {
            return Err(Error::dimension_mismatch("ModelCovarianceMatrix::left_multiply", self.n_params, matrix.nrows()));
        }
        let rows: Vec<Array1<f64>> = (0..self.n_params)
            .into_par_iter()
            .map(|i_param: usize| {
                let mut row: Array1<f64> = Array1::zeros(matrix.ncols());
                for (j_param, value) in self.indices[i_param].iter().zip(self.values[i_param].iter()) {
                    row.scaled_add(*value, &matrix.row(*j_param));
                }
                return row;
            })
            .collect::<Vec<Array1<f64>>>();

        let mut product: Array2<f64> = Array2::zeros((self.n_params, matrix.ncols()));
        for (mut target, row) in product.axis_iter_mut(Axis(0)).zip(rows.iter()) {
            target.assign(row);
        }
        return Ok(product);
    }

    /// `Cm·v`
    pub fn operate(&self, vector: &Array1<f64>) -> Result<Array1<f64>> {
        if vector.len() != self.n_params {
            return Err(Error::dimension_mismatch("ModelCovarianceMatrix::operate", self.n_params, vector.len()));
        }
        let product: Array1<f64> = Array1::from_iter((0..self.n_params).map(|i_param: usize| {
            return self.indices[i_param]
                .iter()
                .zip(self.values[i_param].iter())
                .map(|(j_param, value): (&usize, &f64)| value * vector[*j_param])
                .sum::<f64>();
        }));
        return Ok(product);
    }

    /// Dense copy
    pub fn cm(&self) -> Array2<f64> {
        let mut cm: Array2<f64> = Array2::zeros((self.n_params, self.n_params));
        for i_param in 0..self.n_params {
            for (j_param, value) in self.indices[i_param].iter().zip(self.values[i_param].iter()) {
                cm[[i_param, *j_param]] = *value;
            }
        }
        return cm;
    }

    pub fn n_parameters(&self) -> usize {
        return self.n_params;
    }

    pub fn pre_weights(&self) -> &Array1<f64> {
        return &self.pre_weights;
    }

    pub fn nnz(&self) -> usize {
        return self.indices.iter().map(|row: &Vec<usize>| row.len()).sum();
    }
}

/// Pre-weights from a sensitivity value per parameter: `clamp(1/√s, 1/3, 3)`
pub fn pre_weights_from_sensitivity(sensitivity: &Array1<f64>) -> Array1<f64> {
    return sensitivity.mapv(|s: f64| (1.0 / s.sqrt()).clamp(1.0 / 3.0, 3.0));
}

fn gaussian(distance: f64, length: f64) -> f64 {
    if length <= 0.0 {
        return if distance == 0.0 { 1.0 } else { 0.0 };
    }
    return (-(distance / length).powi(2)).exp();
}

#[cfg(test)]
fn grid_parameters() -> Vec<UnknownParameter> {
    use crate::parameters::{Location, PartialType};

    let mut parameters: Vec<UnknownParameter> = Vec::new();
    for radius in [3480.0, 3530.0, 3580.0, 3780.0] {
        for longitude in [0.0, 2.0, 5.0, 20.0] {
            parameters.push(UnknownParameter::new(
                PartialType::Mu,
                Location::Point {
                    latitude: 10.0,
                    longitude,
                    radius,
                },
                1.0,
            ));
        }
    }
    return parameters;
}

#[test]
fn test_cm_symmetric_and_sparse() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;

    let parameters: Vec<UnknownParameter> = grid_parameters();
    let n_params: usize = parameters.len();
    let pre_weights: Array1<f64> = Array1::from_iter((0..n_params).map(|i: usize| 0.5 + 0.1 * i as f64));
    let cm: ModelCovarianceMatrix = ModelCovarianceMatrix::new(&parameters, 60.0, 3.0, Some(pre_weights.clone())).unwrap();
    let dense: Array2<f64> = cm.cm();

    assert_eq!(dense, dense.t().to_owned());
    for i in 0..n_params {
        assert_eq!(dense[[i, i]], pre_weights[i].powi(2));
        for j in 0..n_params {
            if i == j {
                continue;
            }
            let raw: f64 = pre_weights[i]
                * pre_weights[j]
                * gaussian(parameters[i].location().great_circle_distance_deg(&parameters[j].location()), 3.0)
                * gaussian(parameters[i].location().radial_distance(&parameters[j].location()), 60.0);
            if raw < CM_THRESHOLD {
                assert_eq!(dense[[i, j]], 0.0);
            } else {
                assert_abs_diff_eq!(dense[[i, j]], raw, epsilon = 1e-14);
            }
        }
    }
    // 20 degrees and 300 km apart never correlate at these lengths
    assert_eq!(dense[[0, 3]], 0.0);
    assert_eq!(dense[[0, 12]], 0.0);
    assert!(dense[[0, 1]] > 0.0);
    assert!(cm.nnz() < n_params * n_params);
}

#[test]
fn test_cm_products() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let parameters: Vec<UnknownParameter> = grid_parameters();
    let n_params: usize = parameters.len();
    let cm: ModelCovarianceMatrix = ModelCovarianceMatrix::new(&parameters, 100.0, 4.0, None).unwrap();
    let dense: Array2<f64> = cm.cm();

    let mut rng: StdRng = StdRng::seed_from_u64(1);
    let matrix: Array2<f64> = Array2::from_shape_fn((n_params, 3), |_| rng.random_range(-1.0..1.0));
    let vector: Array1<f64> = Array1::from_shape_fn(n_params, |_| rng.random_range(-1.0..1.0));

    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(cm.left_multiply(matrix.view()).unwrap(), dense.dot(&matrix), epsilon = precision);
    assert_abs_diff_eq!(cm.operate(&vector).unwrap(), dense.dot(&vector), epsilon = precision);
    assert!(matches!(cm.operate(&Array1::zeros(3)), Err(Error::DimensionMismatch { .. })));
    assert!(matches!(ModelCovarianceMatrix::new(&parameters, 100.0, 4.0, Some(Array1::ones(2))), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_zero_length_disables_correlation() {
    let parameters: Vec<UnknownParameter> = grid_parameters();
    let cm: ModelCovarianceMatrix = ModelCovarianceMatrix::new(&parameters, 0.0, 0.0, None).unwrap();
    assert_eq!(cm.cm(), Array2::<f64>::eye(parameters.len()));
}

#[test]
fn test_pre_weights_from_sensitivity() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let weights: Array1<f64> = pre_weights_from_sensitivity(&array![1.0, 4.0, 100.0, 0.01, 0.0]);
    assert_abs_diff_eq!(weights, array![1.0, 0.5, 1.0 / 3.0, 3.0, 3.0], epsilon = 1e-12);
}
