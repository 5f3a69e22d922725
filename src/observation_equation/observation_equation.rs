use crate::dvector::Dvector;
use crate::errors::{Error, Result};
use crate::model_covariance::ModelCovarianceMatrix;
use crate::observation_equation::{compute_ata, compute_atv, operate};
use crate::parameters::{PartialType, UnknownParameter};
use crate::waveforms::PartialId;
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayViewMut1, Axis, s};
use rayon::prelude::*;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A change of model variables `m = T·m'` applied to the equation
#[derive(Debug, Clone, PartialEq)]
enum ModelTransform {
    Conditioner(Array1<f64>),
    Covariance(ModelCovarianceMatrix),
}

/// Linear relation `d = A·m` between the weighted data vector and the unknown parameters,
/// together with the normal equations `AᵗA·m = Aᵗd`.
///
/// `AtA` is built from `A` on first use and cached; later calls from any thread share it.
/// Penalty terms added for regularisation are tracked separately so that `variance_of`
/// always measures data misfit only.
#[derive(Debug)]
pub struct ObservationEquation {
    parameters: Vec<UnknownParameter>,
    dvector: Option<Dvector>,
    a: Option<Array2<f64>>,
    ata: OnceLock<Array2<f64>>,
    atd: Array1<f64>,
    penalty: Option<Array2<f64>>,
    d_norm2: f64,
    obs_norm2: f64,
    npts: usize,
    transforms: Vec<ModelTransform>,
}

impl ObservationEquation {
    /// Assemble `A` from sensitivity waveforms.
    ///
    /// # Arguments
    /// * `partials` - one record per (time window, parameter); records matching no window or no parameter are skipped
    /// * `parameters` - column order of `A`
    /// * `dvector` - row layout of `A` and the data vector
    ///
    /// # Returns
    /// * `ObservationEquation`, or `IncompleteData` when any (time window, parameter) combination is missing
    pub fn new(partials: &[PartialId], parameters: &[UnknownParameter], dvector: Dvector) -> Result<Self> {
        let time_start: Instant = Instant::now();
        let n_params: usize = parameters.len();
        let n_time_window: usize = dvector.n_time_window();
        let lengths: Vec<usize> = dvector.lengths();
        let start_points: &[usize] = dvector.start_points();
        for parameter in parameters.iter().filter(|parameter: &&UnknownParameter| !parameter.has_consistent_location()) {
            warn!("parameter {} mixes a 1-D type with a 3-D location or the reverse", parameter);
        }

        // Resolve (window, column) of every record in parallel
        let n_placed: AtomicUsize = AtomicUsize::new(0);
        let placements: Vec<(usize, usize, usize)> = partials
            .par_iter()
            .enumerate()
            .filter_map(|(i_partial, partial): (usize, &PartialId)| {
                let i_param: usize = parameters.iter().position(|parameter: &UnknownParameter| parameter.matches(partial.partial_type, &partial.location))?;
                let i_window: usize = dvector.which_timewindow(&partial.window)?;
                if partial.data.len() != lengths[i_window] {
                    return Some(Err(Error::dimension_mismatch(
                        &format!("partial {} {} of {}", partial.partial_type, partial.location, partial.window),
                        lengths[i_window],
                        partial.data.len(),
                    )));
                }
                n_placed.fetch_add(1, Ordering::Relaxed);
                return Some(Ok((i_window, i_param, i_partial)));
            })
            .collect::<Result<Vec<(usize, usize, usize)>>>()?;

        // Each (window, parameter) cell must be written exactly once
        let mut by_column: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n_params];
        let mut filled: Vec<bool> = vec![false; n_time_window * n_params];
        for (i_window, i_param, i_partial) in placements.iter().cloned() {
            let cell: usize = i_window * n_params + i_param;
            if filled[cell] {
                return Err(Error::Duplicate {
                    kind: "partial".to_string(),
                    record: format!("{} {} of {}", partials[i_partial].partial_type, partials[i_partial].location, partials[i_partial].window),
                });
            }
            filled[cell] = true;
            by_column[i_param].push((i_window, i_partial));
        }
        let n_placed: usize = n_placed.load(Ordering::Relaxed);
        if n_placed != n_time_window * n_params {
            return Err(Error::IncompleteData {
                placed: n_placed,
                expected: n_time_window * n_params,
            });
        }

        // Columns are disjoint, so they can be written in parallel
        let window_weightings: &Array1<f64> = dvector.weightings();
        let mut a: Array2<f64> = Array2::zeros((dvector.npts(), n_params));
        a.axis_iter_mut(Axis(1))
            .into_par_iter()
            .enumerate()
            .for_each(|(i_param, mut column): (usize, ArrayViewMut1<f64>)| {
                let parameter_weighting: f64 = parameters[i_param].weighting();
                for (i_window, i_partial) in by_column[i_param].iter().cloned() {
                    let start: usize = start_points[i_window];
                    let weighted: Array1<f64> = &partials[i_partial].data * window_weightings[i_window] * parameter_weighting;
                    column.slice_mut(s![start..start + lengths[i_window]]).assign(&weighted);
                }
            });

        let d: Array1<f64> = dvector.get_d();
        let obs: Array1<f64> = dvector.get_obs();
        let atd: Array1<f64> = compute_atv(&a, &d);

        let duration: Duration = time_start.elapsed();
        info!("A matrix {} x {} assembled, time elapsed: {:?}", a.nrows(), a.ncols(), duration);

        return Ok(ObservationEquation {
            parameters: parameters.to_vec(),
            dvector: Some(dvector),
            a: Some(a),
            ata: OnceLock::new(),
            atd,
            penalty: None,
            d_norm2: d.dot(&d),
            obs_norm2: obs.dot(&obs),
            npts: d.len(),
            transforms: Vec::new(),
        });
    }

    /// Equation known only through its normal equations, e.g. read back from disk
    ///
    /// # Arguments
    /// * `ata`, `atd` - normal matrix and right-hand side
    /// * `d_norm2`, `obs_norm2` - `‖d‖²` and `‖obs‖²` of the data behind them
    /// * `npts` - length of that data vector
    pub fn from_normal_equations(parameters: &[UnknownParameter], ata: Array2<f64>, atd: Array1<f64>, d_norm2: f64, obs_norm2: f64, npts: usize) -> Result<Self> {
        let n_params: usize = parameters.len();
        check_square(&ata, n_params, "ObservationEquation::from_normal_equations AtA")?;
        check_length(&atd, n_params, "ObservationEquation::from_normal_equations Atd")?;
        return Ok(ObservationEquation {
            parameters: parameters.to_vec(),
            dvector: None,
            a: None,
            ata: OnceLock::from(ata),
            atd,
            penalty: None,
            d_norm2,
            obs_norm2,
            npts,
            transforms: Vec::new(),
        });
    }

    /// `AᵗA` plus any penalty added by regularisation
    pub fn ata(&self) -> &Array2<f64> {
        return self.ata.get_or_init(|| {
            let time_start: Instant = Instant::now();
            let ata: Array2<f64> = match &self.a {
                Some(a) => compute_ata(a),
                None => Array2::zeros((self.n_parameters(), self.n_parameters())),
            };
            info!("AtA {} x {} computed, time elapsed: {:?}", ata.nrows(), ata.ncols(), time_start.elapsed());
            return ata;
        });
    }

    /// `AᵗA` without regularisation penalties
    pub fn data_ata(&self) -> Array2<f64> {
        return match &self.penalty {
            Some(penalty) => self.ata() - penalty,
            None => self.ata().clone(),
        };
    }

    pub fn atd(&self) -> &Array1<f64> {
        return &self.atd;
    }

    pub fn a(&self) -> Option<&Array2<f64>> {
        return self.a.as_ref();
    }

    pub fn dvector(&self) -> Option<&Dvector> {
        return self.dvector.as_ref();
    }

    pub fn parameters(&self) -> &[UnknownParameter] {
        return &self.parameters;
    }

    pub fn n_parameters(&self) -> usize {
        return self.parameters.len();
    }

    /// `‖d‖²`
    pub fn d_norm2(&self) -> f64 {
        return self.d_norm2;
    }

    /// `‖obs‖²`
    pub fn obs_norm2(&self) -> f64 {
        return self.obs_norm2;
    }

    /// True once regularisation or a model covariance prior has added terms to `AtA`
    pub fn has_penalty(&self) -> bool {
        return self.penalty.is_some();
    }

    /// Number of data samples behind the equation
    pub fn npts(&self) -> usize {
        return self.npts;
    }

    /// Normalised residual `‖d − A·m‖² / ‖obs‖²`, evaluated from the normal equations as
    /// `(‖d‖² − 2·Atd·m + mᵗ·AtA·m) / ‖obs‖²` with penalty terms removed
    pub fn variance_of(&self, m: &Array1<f64>) -> Result<f64> {
        check_length(m, self.n_parameters(), "ObservationEquation::variance_of")?;
        let mut misfit: f64 = self.d_norm2 - 2.0 * self.atd.dot(m) + m.dot(&self.ata().dot(m));
        if let Some(penalty) = &self.penalty {
            misfit -= m.dot(&penalty.dot(m));
        }
        return Ok(misfit / self.obs_norm2);
    }

    /// `A·m`
    pub fn operate(&self, m: &Array1<f64>) -> Result<Array1<f64>> {
        let a: &Array2<f64> = self.require_a("ObservationEquation::operate")?;
        check_length(m, self.n_parameters(), "ObservationEquation::operate")?;
        return Ok(operate(a, m));
    }

    /// `Aᵗ·v` for an arbitrary data-space vector
    pub fn compute_atd(&self, v: &Array1<f64>) -> Result<Array1<f64>> {
        let a: &Array2<f64> = self.require_a("ObservationEquation::compute_atd")?;
        check_length(v, a.nrows(), "ObservationEquation::compute_atd")?;
        return Ok(compute_atv(a, v));
    }

    pub fn diagonal_of_ata(&self) -> Array1<f64> {
        return self.ata().diag().to_owned();
    }

    /// Add a penalty matrix `D` to `AtA` (Tikhonov style)
    pub fn add_regularisation(&mut self, d: &Array2<f64>) -> Result<()> {
        let n_params: usize = self.n_parameters();
        check_square(d, n_params, "ObservationEquation::add_regularisation")?;
        let ata: Array2<f64> = self.take_ata() + d;
        self.ata = OnceLock::from(ata);
        self.penalty = Some(match self.penalty.take() {
            Some(penalty) => penalty + d,
            None => d.clone(),
        });
        return Ok(());
    }

    /// Joint equation of two datasets over the same parameters, e.g. two frequency bands.
    /// `AtA`, `Atd`, `‖d‖²` and `‖obs‖²` are summed with the given weights; the sensitivity matrix is not kept.
    pub fn combine(&self, other: &ObservationEquation, weight_self: f64, weight_other: f64) -> Result<ObservationEquation> {
        if other.n_parameters() != self.n_parameters() {
            return Err(Error::dimension_mismatch("ObservationEquation::combine parameters", self.n_parameters(), other.n_parameters()));
        }
        if let Some(i_param) = (0..self.n_parameters()).find(|i: &usize| !self.parameters[*i].same_identity(&other.parameters[*i])) {
            return Err(Error::InvalidArgument {
                reason: format!(
                    "parameter {} differs between equations: {} vs {}",
                    i_param, self.parameters[i_param], other.parameters[i_param]
                ),
            });
        }

        // Both equations must be in the same model variables
        if self.transforms != other.transforms {
            return Err(Error::InvalidArgument {
                reason: "equations to combine carry different conditioner or model covariance transforms".to_string(),
            });
        }

        let ata: Array2<f64> = self.ata() * weight_self + other.ata() * weight_other;
        let atd: Array1<f64> = &self.atd * weight_self + &other.atd * weight_other;
        let penalty: Option<Array2<f64>> = match (&self.penalty, &other.penalty) {
            (None, None) => None,
            (Some(p), None) => Some(p * weight_self),
            (None, Some(q)) => Some(q * weight_other),
            (Some(p), Some(q)) => Some(p * weight_self + q * weight_other),
        };

        return Ok(ObservationEquation {
            parameters: self.parameters.clone(),
            dvector: None,
            a: None,
            ata: OnceLock::from(ata),
            atd,
            penalty,
            d_norm2: self.d_norm2 * weight_self + other.d_norm2 * weight_other,
            obs_norm2: self.obs_norm2 * weight_self + other.obs_norm2 * weight_other,
            npts: self.npts + other.npts,
            transforms: self.transforms.clone(),
        });
    }

    /// Rescale the unknowns as `m = c ⊙ m'`: columns of `A`, `Atd` entries and `AtA` entries are scaled accordingly
    pub fn apply_conditioner(&mut self, conditioner: &Array1<f64>) -> Result<()> {
        let n_params: usize = self.n_parameters();
        check_length(conditioner, n_params, "ObservationEquation::apply_conditioner")?;

        if let Some(a) = self.a.as_mut() {
            a.axis_iter_mut(Axis(1))
                .into_par_iter()
                .enumerate()
                .for_each(|(i_param, mut column): (usize, ArrayViewMut1<f64>)| column *= conditioner[i_param]);
        }
        if let Some(mut ata) = self.ata.take() {
            scale_symmetric(&mut ata, conditioner);
            self.ata = OnceLock::from(ata);
        }
        if let Some(penalty) = self.penalty.as_mut() {
            scale_symmetric(penalty, conditioner);
        }
        self.atd = &self.atd * conditioner;
        self.transforms.push(ModelTransform::Conditioner(conditioner.clone()));

        return Ok(());
    }

    /// Solve for `m'` with `m = Cm·m'` and a unit prior on `m'`:
    /// `AtA' = Cm·AtA·Cm + I`, `Atd' = Cm·Atd`.
    /// Use `model_perturbation` to map a solution back to the original parameters.
    pub fn apply_model_covariance(&mut self, cm: &ModelCovarianceMatrix) -> Result<()> {
        let n_params: usize = self.n_parameters();
        if cm.n_parameters() != n_params {
            return Err(Error::dimension_mismatch("ObservationEquation::apply_model_covariance", n_params, cm.n_parameters()));
        }

        let ata: Array2<f64> = self.take_ata();
        // Cm·AtA·Cm = Cm·(Cm·AtA)ᵗ for symmetric Cm and AtA
        let cm_ata: Array2<f64> = cm.left_multiply(ata.view())?;
        let mut transformed: Array2<f64> = cm.left_multiply(cm_ata.t())?;
        transformed.diag_mut().mapv_inplace(|value: f64| value + 1.0);
        self.ata = OnceLock::from(transformed);

        let identity: Array2<f64> = Array2::eye(n_params);
        self.penalty = Some(match self.penalty.take() {
            Some(penalty) => {
                let cm_penalty: Array2<f64> = cm.left_multiply(penalty.view())?;
                cm.left_multiply(cm_penalty.t())? + identity
            }
            None => identity,
        });

        if let Some(a) = self.a.take() {
            // A·Cm = (Cm·Aᵗ)ᵗ
            let a_cm: Array2<f64> = cm.left_multiply(a.t())?.reversed_axes();
            self.a = Some(a_cm);
        }
        self.atd = cm.operate(&self.atd)?;
        self.transforms.push(ModelTransform::Covariance(cm.clone()));

        return Ok(());
    }

    /// Map a solution of the transformed equation back to a perturbation of the original parameters
    pub fn model_perturbation(&self, m: &Array1<f64>) -> Result<Array1<f64>> {
        check_length(m, self.n_parameters(), "ObservationEquation::model_perturbation")?;
        let mut perturbation: Array1<f64> = m.clone();
        for transform in self.transforms.iter().rev() {
            perturbation = match transform {
                ModelTransform::Conditioner(conditioner) => &perturbation * conditioner,
                ModelTransform::Covariance(cm) => cm.operate(&perturbation)?,
            };
        }
        return Ok(perturbation);
    }

    /// Replace the data by the synthetic response of a known model: `Atd = AtA·m`
    pub fn set_atd_for_checkerboard(&mut self, m: &Array1<f64>) -> Result<()> {
        check_length(m, self.n_parameters(), "ObservationEquation::set_atd_for_checkerboard")?;
        let mut data_ata_m: Array1<f64> = self.ata().dot(m);
        if let Some(penalty) = &self.penalty {
            data_ata_m = data_ata_m - penalty.dot(m);
        }
        self.d_norm2 = m.dot(&data_ata_m);
        self.atd = data_ata_m;
        return Ok(());
    }

    /// Remove every parameter of one type from the problem by zeroing its column, row and right-hand side
    pub fn set_type_to_zero(&mut self, partial_type: PartialType) {
        let indices: Vec<usize> = self
            .parameters
            .iter()
            .enumerate()
            .filter(|(_, parameter): &(usize, &UnknownParameter)| parameter.partial_type() == partial_type)
            .map(|(i_param, _): (usize, &UnknownParameter)| i_param)
            .collect();

        let mut ata: Array2<f64> = self.take_ata();
        for i_param in indices.iter().cloned() {
            if let Some(a) = self.a.as_mut() {
                a.column_mut(i_param).fill(0.0);
            }
            ata.row_mut(i_param).fill(0.0);
            ata.column_mut(i_param).fill(0.0);
            if let Some(penalty) = self.penalty.as_mut() {
                penalty.row_mut(i_param).fill(0.0);
                penalty.column_mut(i_param).fill(0.0);
            }
            self.atd[i_param] = 0.0;
        }
        self.ata = OnceLock::from(ata);
    }

    fn require_a(&self, operation: &str) -> Result<&Array2<f64>> {
        return self.a.as_ref().ok_or_else(|| Error::MissingSensitivityMatrix {
            operation: operation.to_string(),
        });
    }

    /// Move the cached `AtA` out, computing it first if needed
    fn take_ata(&mut self) -> Array2<f64> {
        let n_params: usize = self.n_parameters();
        self.ata();
        return self.ata.take().unwrap_or_else(|| Array2::zeros((n_params, n_params)));
    }
}

fn scale_symmetric(matrix: &mut Array2<f64>, scale: &Array1<f64>) {
    for ((i, j), value) in matrix.indexed_iter_mut() {
        *value *= scale[i] * scale[j];
    }
}

fn check_length(vector: &Array1<f64>, expected: usize, context: &str) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::dimension_mismatch(context, expected, vector.len()));
    }
    return Ok(());
}

fn check_square(matrix: &Array2<f64>, expected: usize, context: &str) -> Result<()> {
    if matrix.nrows() != expected {
        return Err(Error::dimension_mismatch(context, expected, matrix.nrows()));
    }
    if matrix.ncols() != expected {
        return Err(Error::dimension_mismatch(context, expected, matrix.ncols()));
    }
    return Ok(());
}

#[cfg(test)]
pub(crate) fn two_window_equation() -> ObservationEquation {
    use crate::dvector::{DvectorOptions, two_window_records};
    use crate::parameters::Location;
    use crate::waveforms::BasicId;
    use ndarray::array;

    let records: Vec<BasicId> = two_window_records();
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();
    let parameters: Vec<UnknownParameter> = vec![
        UnknownParameter::new(PartialType::ParVs, Location::Radius(6000.0), 1.0),
        UnknownParameter::new(PartialType::ParVs, Location::Radius(5900.0), 1.0),
    ];
    let window_0: &BasicId = &records[0];
    let window_1: &BasicId = &records[2];
    let partials: Vec<PartialId> = vec![
        PartialId::new(PartialType::ParVs, Location::Radius(6000.0), window_0, array![1.0, 0.0, 0.0, 0.0, 0.0]),
        PartialId::new(PartialType::ParVs, Location::Radius(5900.0), window_0, array![0.0, 1.0, 0.0, 0.0, 0.0]),
        PartialId::new(PartialType::ParVs, Location::Radius(6000.0), window_1, array![0.0, 0.0, 1.0, 0.0, 0.0]),
        PartialId::new(PartialType::ParVs, Location::Radius(5900.0), window_1, array![0.0, 0.0, 0.0, 1.0, 0.0]),
    ];
    return ObservationEquation::new(&partials, &parameters, dvector).unwrap();
}

#[cfg(test)]
pub(crate) fn random_equation(n_windows: usize, window_length: usize, n_params: usize, seed: u64) -> ObservationEquation {
    use crate::dvector::DvectorOptions;
    use crate::parameters::Location;
    use crate::waveforms::{BasicId, Component, WaveformType};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng: StdRng = StdRng::seed_from_u64(seed);
    let mut records: Vec<BasicId> = Vec::new();
    for i_window in 0..n_windows {
        let obs: Array1<f64> = Array1::from_iter((0..window_length).map(|_| rng.random_range(-1.0..1.0)));
        let syn: Array1<f64> = Array1::from_iter((0..window_length).map(|_| rng.random_range(-1.0..1.0)));
        let station: String = format!("ST{}", i_window);
        let observed: BasicId = BasicId::new(WaveformType::Observed, &station, "EV1", Component::Z, 1.0, 0.0, window_length, 10.0, 100.0).with_data(obs);
        let mut synthetic: BasicId = observed.clone().with_data(syn);
        synthetic.waveform_type = WaveformType::Synthetic;
        records.push(observed);
        records.push(synthetic);
    }
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();

    let parameters: Vec<UnknownParameter> = (0..n_params)
        .map(|i_param: usize| UnknownParameter::new(PartialType::ParVs, Location::Radius(6371.0 - 50.0 * i_param as f64), 1.0 + 0.1 * i_param as f64))
        .collect();
    let mut partials: Vec<PartialId> = Vec::new();
    for i_window in 0..n_windows {
        for parameter in parameters.iter() {
            let data: Array1<f64> = Array1::from_iter((0..window_length).map(|_| rng.random_range(-1.0..1.0)));
            partials.push(PartialId::new(parameter.partial_type(), parameter.location(), &records[2 * i_window], data));
        }
    }
    return ObservationEquation::new(&partials, &parameters, dvector).unwrap();
}

#[test]
fn test_two_window_assembly() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let _ = env_logger::builder().is_test(true).try_init();
    let equation: ObservationEquation = two_window_equation();

    let a: &Array2<f64> = equation.a().unwrap();
    assert_eq!(a.dim(), (10, 2));
    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(a[[0, 0]], 0.2, epsilon = precision);
    assert_abs_diff_eq!(a[[1, 1]], 0.2, epsilon = precision);
    assert_abs_diff_eq!(a[[7, 0]], 0.5, epsilon = precision);
    assert_abs_diff_eq!(a[[8, 1]], 0.5, epsilon = precision);
    assert_abs_diff_eq!(a.sum(), 1.4, epsilon = precision);

    assert_abs_diff_eq!(equation.ata().clone(), array![[0.29, 0.0], [0.0, 0.29]], epsilon = precision);
    assert_abs_diff_eq!(equation.atd().clone(), array![0.25, 0.29], epsilon = precision);
    assert_abs_diff_eq!(equation.diagonal_of_ata(), array![0.29, 0.29], epsilon = precision);
}

#[test]
fn test_variance_of_matches_residual() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let equation: ObservationEquation = random_equation(4, 30, 6, 7);
    let dvector: &Dvector = equation.dvector().unwrap();
    let obs: Array1<f64> = dvector.get_obs();
    let syn: Array1<f64> = dvector.get_syn();

    let mut rng: StdRng = StdRng::seed_from_u64(11);
    for _ in 0..5 {
        let m: Array1<f64> = Array1::from_iter((0..6).map(|_| rng.random_range(-2.0..2.0)));
        let residual: Array1<f64> = &obs - &(&syn + &equation.operate(&m).unwrap());
        let expected: f64 = residual.dot(&residual) / obs.dot(&obs);
        assert_relative_eq!(equation.variance_of(&m).unwrap(), expected, max_relative = 1e-9);
    }

    // m = 0 gives the data variance
    assert_relative_eq!(equation.variance_of(&Array1::zeros(6)).unwrap(), dvector.variance(), max_relative = 1e-12);
    assert!(matches!(equation.variance_of(&Array1::zeros(5)), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_incomplete_and_duplicate_partials() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::dvector::{DvectorOptions, two_window_records};
    use crate::parameters::Location;
    use crate::waveforms::BasicId;
    use ndarray::array;

    let records: Vec<BasicId> = two_window_records();
    let parameters: Vec<UnknownParameter> = vec![
        UnknownParameter::new(PartialType::ParVs, Location::Radius(6000.0), 1.0),
        UnknownParameter::new(PartialType::ParVs, Location::Radius(5900.0), 1.0),
    ];
    let complete: Vec<PartialId> = vec![
        PartialId::new(PartialType::ParVs, Location::Radius(6000.0), &records[0], array![1.0, 0.0, 0.0, 0.0, 0.0]),
        PartialId::new(PartialType::ParVs, Location::Radius(5900.0), &records[0], array![0.0, 1.0, 0.0, 0.0, 0.0]),
        PartialId::new(PartialType::ParVs, Location::Radius(6000.0), &records[2], array![0.0, 0.0, 1.0, 0.0, 0.0]),
        PartialId::new(PartialType::ParVs, Location::Radius(5900.0), &records[2], array![0.0, 0.0, 0.0, 1.0, 0.0]),
    ];

    // Each single missing combination is detected
    for i_missing in 0..complete.len() {
        let mut partials: Vec<PartialId> = complete.clone();
        partials.remove(i_missing);
        let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();
        let result: Result<ObservationEquation> = ObservationEquation::new(&partials, &parameters, dvector);
        assert!(matches!(result, Err(Error::IncompleteData { placed: 3, expected: 4 })));
    }

    // Records for unknown parameters are skipped silently
    let mut partials: Vec<PartialId> = complete.clone();
    partials.push(PartialId::new(PartialType::ParVp, Location::Radius(6000.0), &records[0], array![1.0, 1.0, 1.0, 1.0, 1.0]));
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();
    let equation: ObservationEquation = ObservationEquation::new(&partials, &parameters, dvector).unwrap();
    assert!(equation.diagonal_of_ata().iter().all(|value: &f64| *value >= 0.0));

    let mut partials: Vec<PartialId> = complete.clone();
    partials.push(complete[0].clone());
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();
    assert!(matches!(ObservationEquation::new(&partials, &parameters, dvector), Err(Error::Duplicate { .. })));

    let mut partials: Vec<PartialId> = complete.clone();
    partials[1].data = array![0.0, 1.0, 0.0];
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();
    assert!(matches!(ObservationEquation::new(&partials, &parameters, dvector), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_regularisation_and_combine() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let mut equation: ObservationEquation = random_equation(3, 20, 4, 3);
    assert!(!equation.has_penalty());
    let m: Array1<f64> = array![0.1, -0.3, 0.2, 0.05];
    let variance_before: f64 = equation.variance_of(&m).unwrap();
    let ata_before: Array2<f64> = equation.ata().clone();

    let penalty: Array2<f64> = Array2::eye(4) * 0.5;
    equation.add_regularisation(&penalty).unwrap();
    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(equation.ata().clone(), &ata_before + &penalty, epsilon = precision);
    assert_abs_diff_eq!(equation.data_ata(), ata_before.clone(), epsilon = precision);
    assert!(equation.has_penalty());
    // The penalty changes the solve, not the data misfit
    assert_abs_diff_eq!(equation.variance_of(&m).unwrap(), variance_before, epsilon = precision);
    assert!(matches!(equation.add_regularisation(&Array2::eye(3)), Err(Error::DimensionMismatch { .. })));

    // Joint misfit of two datasets is the ratio of their summed norms
    let other: ObservationEquation = random_equation(2, 25, 4, 9);
    let joint: ObservationEquation = equation.combine(&other, 1.0, 2.0).unwrap();
    let misfit_self: f64 = equation.variance_of(&m).unwrap() * equation.obs_norm2();
    let misfit_other: f64 = other.variance_of(&m).unwrap() * other.obs_norm2();
    let expected: f64 = (misfit_self + 2.0 * misfit_other) / (equation.obs_norm2() + 2.0 * other.obs_norm2());
    assert_abs_diff_eq!(joint.variance_of(&m).unwrap(), expected, epsilon = 1e-10);
    assert_abs_diff_eq!(joint.atd().clone(), equation.atd() + &(other.atd() * 2.0), epsilon = precision);
    assert!(matches!(joint.operate(&m), Err(Error::MissingSensitivityMatrix { .. })));

    let fewer: ObservationEquation = random_equation(2, 25, 3, 9);
    assert!(matches!(equation.combine(&fewer, 1.0, 1.0), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_combine_requires_same_model_variables() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let conditioner: Array1<f64> = array![2.0, 0.5, 1.0];
    let mut conditioned: ObservationEquation = random_equation(3, 20, 3, 5);
    conditioned.apply_conditioner(&conditioner).unwrap();
    let plain: ObservationEquation = random_equation(2, 20, 3, 6);

    assert!(matches!(conditioned.combine(&plain, 1.0, 1.0), Err(Error::InvalidArgument { .. })));
    assert!(matches!(plain.combine(&conditioned, 1.0, 1.0), Err(Error::InvalidArgument { .. })));

    // Same transform on both sides combines and maps back through it
    let mut other: ObservationEquation = random_equation(2, 20, 3, 6);
    other.apply_conditioner(&conditioner).unwrap();
    let joint: ObservationEquation = conditioned.combine(&other, 1.0, 1.0).unwrap();
    assert_abs_diff_eq!(joint.model_perturbation(&array![1.0, 1.0, 1.0]).unwrap(), conditioner.clone(), epsilon = 1e-15);
}

#[test]
fn test_conditioner_and_checkerboard() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let mut equation: ObservationEquation = random_equation(3, 20, 3, 5);
    let ata: Array2<f64> = equation.ata().clone();
    let atd: Array1<f64> = equation.atd().clone();
    let conditioner: Array1<f64> = array![2.0, 0.5, 1.0];
    equation.apply_conditioner(&conditioner).unwrap();

    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(equation.ata()[[0, 1]], ata[[0, 1]] * 2.0 * 0.5, epsilon = precision);
    assert_abs_diff_eq!(equation.ata()[[0, 0]], ata[[0, 0]] * 4.0, epsilon = precision);
    assert_abs_diff_eq!(equation.atd().clone(), &atd * &conditioner, epsilon = precision);
    assert_abs_diff_eq!(equation.model_perturbation(&array![1.0, 1.0, 1.0]).unwrap(), conditioner.clone(), epsilon = precision);
    // The scaled columns of A reproduce the scaled AtA
    let a: &Array2<f64> = equation.a().unwrap();
    assert_abs_diff_eq!(a.t().dot(a), equation.ata().clone(), epsilon = 1e-10);

    let checker: Array1<f64> = array![1.0, -1.0, 1.0];
    equation.set_atd_for_checkerboard(&checker).unwrap();
    assert_abs_diff_eq!(equation.atd().clone(), equation.ata().dot(&checker), epsilon = precision);
    // The checkerboard model explains its own data
    assert_abs_diff_eq!(equation.variance_of(&checker).unwrap() * equation.obs_norm2(), 0.0, epsilon = 1e-10);

    equation.set_type_to_zero(PartialType::ParVs);
    assert_abs_diff_eq!(equation.ata().clone(), Array2::<f64>::zeros((3, 3)), epsilon = precision);
    assert_abs_diff_eq!(equation.atd().clone(), Array1::<f64>::zeros(3), epsilon = precision);
}

#[test]
fn test_from_normal_equations() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;

    let full: ObservationEquation = random_equation(3, 20, 4, 41);
    let reduced: ObservationEquation =
        ObservationEquation::from_normal_equations(full.parameters(), full.ata().clone(), full.atd().clone(), full.d_norm2(), full.obs_norm2(), full.npts()).unwrap();
    let m: Array1<f64> = Array1::from_elem(4, 0.1);
    assert_abs_diff_eq!(reduced.variance_of(&m).unwrap(), full.variance_of(&m).unwrap(), epsilon = 1e-14);
    assert_eq!(reduced.npts(), 60);
    assert!(reduced.a().is_none());
    assert!(matches!(reduced.compute_atd(&Array1::zeros(60)), Err(Error::MissingSensitivityMatrix { .. })));

    let bad: Result<ObservationEquation> = ObservationEquation::from_normal_equations(full.parameters(), Array2::zeros((3, 3)), full.atd().clone(), 1.0, 1.0, 60);
    assert!(matches!(bad, Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_model_covariance_change_of_variables() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let original: ObservationEquation = random_equation(4, 20, 4, 13);
    let mut transformed: ObservationEquation = random_equation(4, 20, 4, 13);
    let cm: ModelCovarianceMatrix = ModelCovarianceMatrix::new(original.parameters(), 80.0, 0.0, Some(array![1.0, 0.8, 1.2, 1.0])).unwrap();
    transformed.apply_model_covariance(&cm).unwrap();

    let dense: Array2<f64> = cm.cm();
    let precision: f64 = 1e-10;
    let expected_ata: Array2<f64> = dense.dot(original.ata()).dot(&dense) + Array2::<f64>::eye(4);
    assert_abs_diff_eq!(transformed.ata().clone(), expected_ata, epsilon = precision);
    assert_abs_diff_eq!(transformed.atd().clone(), dense.dot(original.atd()), epsilon = precision);

    // The unit prior does not count as misfit, and the model maps back through Cm
    let m_prime: Array1<f64> = array![0.2, -0.1, 0.05, 0.3];
    let m: Array1<f64> = transformed.model_perturbation(&m_prime).unwrap();
    assert_abs_diff_eq!(m.clone(), dense.dot(&m_prime), epsilon = precision);
    assert_abs_diff_eq!(transformed.variance_of(&m_prime).unwrap(), original.variance_of(&m).unwrap(), epsilon = precision);
    assert_abs_diff_eq!(transformed.operate(&m_prime).unwrap(), original.operate(&m).unwrap(), epsilon = precision);
}
