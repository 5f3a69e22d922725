use crate::dvector::Weighting;
use crate::errors::{Error, Result};
use crate::waveforms::{BasicId, DEFAULT_START_TIME_TOLERANCE, WaveformType};
use log::{info, warn};
use ndarray::{Array1, s};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Keeps an observed record when it returns true. Synthetic records are never filtered
pub type ObservedChooser = Arc<dyn Fn(&BasicId) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct DvectorOptions {
    pub chooser: Option<ObservedChooser>,
    pub weighting: Weighting,
    pub start_time_tolerance: f64,
}

impl Default for DvectorOptions {
    fn default() -> Self {
        return DvectorOptions {
            chooser: None,
            weighting: Weighting::default(),
            start_time_tolerance: DEFAULT_START_TIME_TOLERANCE,
        };
    }
}

/// Ratio `‖v‖² / ‖obs‖²` of some residual vectors, grouped three ways
#[derive(Debug, Clone)]
pub struct VarianceBreakdown {
    pub per_window: Array1<f64>,
    pub per_event: BTreeMap<String, f64>,
    pub per_station: BTreeMap<String, f64>,
    pub total: f64,
}

/// Paired and weighted observed/synthetic time windows.
/// All per-window arrays are parallel: index `i` is the same window everywhere.
#[derive(Debug, Clone)]
pub struct Dvector {
    obs_ids: Vec<BasicId>,
    syn_ids: Vec<BasicId>,
    obs_vecs: Vec<Array1<f64>>,
    syn_vecs: Vec<Array1<f64>>,
    d_vecs: Vec<Array1<f64>>,
    weightings: Array1<f64>,
    start_points: Vec<usize>,
    npts: usize,
    variance: f64,
    obs_norm: f64,
    d_norm: f64,
    event_variance: BTreeMap<String, f64>,
    station_variance: BTreeMap<String, f64>,
    start_time_tolerance: f64,
}

impl Dvector {
    /// Pair, weight and concatenate the supplied records.
    ///
    /// # Arguments
    /// * `ids` - observed and synthetic records, all carrying data
    /// * `options` - observed-record chooser, weighting and pairing tolerance
    ///
    /// # Returns
    /// * `Dvector` holding only the observed records that found a synthetic partner, in input order
    pub fn new(ids: &[BasicId], options: DvectorOptions) -> Result<Self> {
        if let Some(missing) = ids.iter().find(|id: &&BasicId| !id.contains_data()) {
            return Err(Error::DataIntegrity { record: missing.to_string() });
        }
        options.weighting.validate()?;
        let tolerance: f64 = options.start_time_tolerance;

        let observed: Vec<&BasicId> = ids
            .iter()
            .filter(|id: &&BasicId| id.waveform_type == WaveformType::Observed)
            .filter(|id: &&BasicId| match &options.chooser {
                Some(chooser) => chooser(*id),
                None => true,
            })
            .collect();
        let synthetic: Vec<&BasicId> = ids.iter().filter(|id: &&BasicId| id.waveform_type == WaveformType::Synthetic).collect();

        // Two kept observed records must never describe the same window
        let duplicate_observed: Option<usize> = (0..observed.len()).into_par_iter().find_first(|i: &usize| {
            return observed[i + 1..].iter().any(|other: &&BasicId| observed[*i].is_pair(other, tolerance));
        });
        if let Some(i) = duplicate_observed {
            return Err(Error::Duplicate {
                kind: "observed".to_string(),
                record: observed[i].to_string(),
            });
        }

        // Same rule for synthetic records
        let duplicate_synthetic: Option<usize> = (0..synthetic.len()).into_par_iter().find_first(|i: &usize| {
            return synthetic[i + 1..].iter().any(|other: &&BasicId| synthetic[*i].is_pair(other, tolerance));
        });
        if let Some(i) = duplicate_synthetic {
            return Err(Error::Duplicate {
                kind: "synthetic".to_string(),
                record: synthetic[i].to_string(),
            });
        }

        // Synthetic partner of every kept observed record
        let partners: Vec<Vec<usize>> = observed
            .par_iter()
            .map(|obs: &&BasicId| {
                let matching: Vec<usize> = (0..synthetic.len()).filter(|j: &usize| obs.is_pair(synthetic[*j], tolerance)).collect();
                return matching;
            })
            .collect();

        let mut obs_ids: Vec<BasicId> = Vec::with_capacity(observed.len());
        let mut syn_ids: Vec<BasicId> = Vec::with_capacity(observed.len());
        let mut claimed: Vec<bool> = vec![false; synthetic.len()];
        for (i_obs, matching) in partners.iter().enumerate() {
            match matching.len() {
                0 => continue,
                1 => {
                    // A synthetic record belongs to at most one window
                    if claimed[matching[0]] {
                        return Err(Error::Duplicate {
                            kind: "synthetic".to_string(),
                            record: synthetic[matching[0]].to_string(),
                        });
                    }
                    claimed[matching[0]] = true;
                    obs_ids.push(observed[i_obs].clone());
                    syn_ids.push(synthetic[matching[0]].clone());
                }
                _ => {
                    return Err(Error::Duplicate {
                        kind: "synthetic".to_string(),
                        record: synthetic[matching[1]].to_string(),
                    });
                }
            }
        }

        if obs_ids.is_empty() {
            return Err(Error::Pairing {
                record: format!("none of {} observed records has a synthetic partner", observed.len()),
            });
        }
        if obs_ids.len() != observed.len() || obs_ids.len() != synthetic.len() {
            warn!(
                "Dvector: {} observed and {} synthetic records, only {} pairs are used",
                observed.len(),
                synthetic.len(),
                obs_ids.len()
            );
        }

        // Weighted per-window vectors
        let n_time_window: usize = obs_ids.len();
        let mut obs_vecs: Vec<Array1<f64>> = Vec::with_capacity(n_time_window);
        let mut syn_vecs: Vec<Array1<f64>> = Vec::with_capacity(n_time_window);
        let mut d_vecs: Vec<Array1<f64>> = Vec::with_capacity(n_time_window);
        let mut weightings: Array1<f64> = Array1::zeros(n_time_window);
        let mut start_points: Vec<usize> = Vec::with_capacity(n_time_window);
        let mut npts: usize = 0;
        for i_window in 0..n_time_window {
            let obs_raw: &Array1<f64> = obs_ids[i_window].data.as_ref().ok_or_else(|| Error::DataIntegrity {
                record: obs_ids[i_window].to_string(),
            })?;
            let syn_raw: &Array1<f64> = syn_ids[i_window].data.as_ref().ok_or_else(|| Error::DataIntegrity {
                record: syn_ids[i_window].to_string(),
            })?;
            if obs_raw.len() != syn_raw.len() {
                return Err(Error::dimension_mismatch(
                    &format!("synthetic samples of {}", obs_ids[i_window]),
                    obs_raw.len(),
                    syn_raw.len(),
                ));
            }

            let weight: f64 = options.weighting.weight(&obs_ids[i_window], &syn_ids[i_window], obs_raw, syn_raw)?;
            let obs_vec: Array1<f64> = obs_raw * weight;
            let syn_vec: Array1<f64> = syn_raw * weight;
            let d_vec: Array1<f64> = &obs_vec - &syn_vec;

            weightings[i_window] = weight;
            start_points.push(npts);
            npts += obs_vec.len();
            obs_vecs.push(obs_vec);
            syn_vecs.push(syn_vec);
            d_vecs.push(d_vec);
        }

        // Global and grouped variance
        let obs2: Vec<f64> = obs_vecs.iter().map(|v: &Array1<f64>| v.dot(v)).collect();
        let d2: Vec<f64> = d_vecs.iter().map(|v: &Array1<f64>| v.dot(v)).collect();
        let obs2_sum: f64 = obs2.iter().sum();
        let d2_sum: f64 = d2.iter().sum();
        let event_variance: BTreeMap<String, f64> = grouped_ratio(&obs_ids, &d2, &obs2, |id: &BasicId| id.event_id.clone());
        let station_variance: BTreeMap<String, f64> = grouped_ratio(&obs_ids, &d2, &obs2, |id: &BasicId| id.station.clone());

        let dvector: Dvector = Dvector {
            obs_ids,
            syn_ids,
            obs_vecs,
            syn_vecs,
            d_vecs,
            weightings,
            start_points,
            npts,
            variance: d2_sum / obs2_sum,
            obs_norm: obs2_sum.sqrt(),
            d_norm: d2_sum.sqrt(),
            event_variance,
            station_variance,
            start_time_tolerance: tolerance,
        };
        info!(
            "Dvector: {} time windows, {} points, variance = {:.6}",
            dvector.n_time_window(),
            dvector.npts,
            dvector.variance
        );

        return Ok(dvector);
    }

    /// Concatenate per-window vectors at the window start points
    pub fn combine(&self, vectors: &[Array1<f64>]) -> Result<Array1<f64>> {
        if vectors.len() != self.n_time_window() {
            return Err(Error::dimension_mismatch("Dvector::combine window count", self.n_time_window(), vectors.len()));
        }
        let mut combined: Array1<f64> = Array1::zeros(self.npts);
        for (i_window, vector) in vectors.iter().enumerate() {
            let length: usize = self.obs_vecs[i_window].len();
            if vector.len() != length {
                return Err(Error::dimension_mismatch(&format!("Dvector::combine window {}", i_window), length, vector.len()));
            }
            let start: usize = self.start_points[i_window];
            combined.slice_mut(s![start..start + length]).assign(vector);
        }
        return Ok(combined);
    }

    /// Split a concatenated vector back into windows; exact inverse of `combine`
    pub fn separate(&self, vector: &Array1<f64>) -> Result<Vec<Array1<f64>>> {
        if vector.len() != self.npts {
            return Err(Error::dimension_mismatch("Dvector::separate length", self.npts, vector.len()));
        }
        let separated: Vec<Array1<f64>> = (0..self.n_time_window())
            .map(|i_window: usize| {
                let start: usize = self.start_points[i_window];
                let length: usize = self.obs_vecs[i_window].len();
                return vector.slice(s![start..start + length]).to_owned();
            })
            .collect();
        return Ok(separated);
    }

    /// Index of the window paired with `id`, if any
    pub fn which_timewindow(&self, id: &BasicId) -> Option<usize> {
        return self.obs_ids.iter().position(|obs: &BasicId| obs.is_pair(id, self.start_time_tolerance));
    }

    pub fn get_d(&self) -> Array1<f64> {
        return concatenate(&self.d_vecs, self.npts);
    }

    pub fn get_obs(&self) -> Array1<f64> {
        return concatenate(&self.obs_vecs, self.npts);
    }

    pub fn get_syn(&self) -> Array1<f64> {
        return concatenate(&self.syn_vecs, self.npts);
    }

    /// Data vector with every window outside `event_id` set to zero
    pub fn mask_for_event(&self, event_id: &str) -> Array1<f64> {
        let masked: Vec<Array1<f64>> = self
            .obs_ids
            .iter()
            .zip(self.d_vecs.iter())
            .map(|(id, d_vec): (&BasicId, &Array1<f64>)| {
                if id.event_id == event_id {
                    return d_vec.clone();
                }
                return Array1::zeros(d_vec.len());
            })
            .collect();
        return concatenate(&masked, self.npts);
    }

    /// `‖v_i‖² / ‖obs_i‖²` per window, event and station for residual vectors `v`
    pub fn variance_breakdown(&self, vectors: &[Array1<f64>]) -> Result<VarianceBreakdown> {
        // Check shapes the same way as combine
        self.combine(vectors)?;

        let obs2: Vec<f64> = self.obs_vecs.iter().map(|v: &Array1<f64>| v.dot(v)).collect();
        let v2: Vec<f64> = vectors.iter().map(|v: &Array1<f64>| v.dot(v)).collect();
        let per_window: Array1<f64> = Array1::from_iter(v2.iter().zip(obs2.iter()).map(|(v, o): (&f64, &f64)| v / o));
        let total: f64 = v2.iter().sum::<f64>() / obs2.iter().sum::<f64>();

        return Ok(VarianceBreakdown {
            per_window,
            per_event: grouped_ratio(&self.obs_ids, &v2, &obs2, |id: &BasicId| id.event_id.clone()),
            per_station: grouped_ratio(&self.obs_ids, &v2, &obs2, |id: &BasicId| id.station.clone()),
            total,
        });
    }

    pub fn n_time_window(&self) -> usize {
        return self.obs_ids.len();
    }

    pub fn npts(&self) -> usize {
        return self.npts;
    }

    pub fn lengths(&self) -> Vec<usize> {
        return self.obs_vecs.iter().map(|v: &Array1<f64>| v.len()).collect();
    }

    pub fn start_points(&self) -> &[usize] {
        return &self.start_points;
    }

    pub fn weightings(&self) -> &Array1<f64> {
        return &self.weightings;
    }

    pub fn obs_ids(&self) -> &[BasicId] {
        return &self.obs_ids;
    }

    pub fn syn_ids(&self) -> &[BasicId] {
        return &self.syn_ids;
    }

    pub fn obs_vecs(&self) -> &[Array1<f64>] {
        return &self.obs_vecs;
    }

    pub fn syn_vecs(&self) -> &[Array1<f64>] {
        return &self.syn_vecs;
    }

    pub fn d_vecs(&self) -> &[Array1<f64>] {
        return &self.d_vecs;
    }

    /// `Σ‖d‖² / Σ‖obs‖²`
    pub fn variance(&self) -> f64 {
        return self.variance;
    }

    pub fn obs_norm(&self) -> f64 {
        return self.obs_norm;
    }

    pub fn d_norm(&self) -> f64 {
        return self.d_norm;
    }

    pub fn event_variance(&self) -> &BTreeMap<String, f64> {
        return &self.event_variance;
    }

    pub fn station_variance(&self) -> &BTreeMap<String, f64> {
        return &self.station_variance;
    }

    pub fn used_events(&self) -> BTreeSet<String> {
        return self.obs_ids.iter().map(|id: &BasicId| id.event_id.clone()).collect();
    }

    pub fn used_stations(&self) -> BTreeSet<String> {
        return self.obs_ids.iter().map(|id: &BasicId| id.station.clone()).collect();
    }

    pub fn start_time_tolerance(&self) -> f64 {
        return self.start_time_tolerance;
    }
}

fn concatenate(vectors: &[Array1<f64>], npts: usize) -> Array1<f64> {
    let mut combined: Vec<f64> = Vec::with_capacity(npts);
    for vector in vectors {
        combined.extend(vector.iter());
    }
    return Array1::from(combined);
}

fn grouped_ratio<F>(ids: &[BasicId], numerator: &[f64], denominator: &[f64], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&BasicId) -> String,
{
    let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for (i_window, id) in ids.iter().enumerate() {
        let entry: &mut (f64, f64) = sums.entry(key(id)).or_insert((0.0, 0.0));
        entry.0 += numerator[i_window];
        entry.1 += denominator[i_window];
    }
    return sums.into_iter().map(|(group, (num, den))| (group, num / den)).collect();
}

#[cfg(test)]
pub(crate) fn two_window_records() -> Vec<BasicId> {
    use crate::waveforms::Component;
    use ndarray::array;

    let obs_0: BasicId = BasicId::new(WaveformType::Observed, "ST1", "EV1", Component::T, 1.0, 100.0, 5, 10.0, 100.0).with_data(array![1.0, 2.0, 3.0, 4.0, 5.0]);
    let obs_1: BasicId = BasicId::new(WaveformType::Observed, "ST2", "EV1", Component::T, 1.0, 200.0, 5, 10.0, 100.0).with_data(array![2.0, 2.0, 2.0, 2.0, 2.0]);
    let mut syn_0: BasicId = obs_0.clone().with_data(array![1.0, 1.0, 1.0, 1.0, 1.0]);
    syn_0.waveform_type = WaveformType::Synthetic;
    syn_0.start_time = 105.0;
    let mut syn_1: BasicId = obs_1.clone().with_data(array![1.0, 1.0, 1.0, 1.0, 1.0]);
    syn_1.waveform_type = WaveformType::Synthetic;
    // Synthetic records deliberately in a different order from the observed ones
    return vec![obs_0, syn_1, obs_1, syn_0];
}

#[test]
fn test_dvector_pairing_and_weighting() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let _ = env_logger::builder().is_test(true).try_init();
    let dvector: Dvector = Dvector::new(&two_window_records(), DvectorOptions::default()).unwrap();

    assert_eq!(dvector.n_time_window(), 2);
    assert_eq!(dvector.npts(), 10);
    assert_eq!(dvector.lengths().iter().sum::<usize>(), dvector.npts());
    assert_eq!(dvector.start_points(), &[0, 5]);
    assert_eq!(dvector.obs_ids()[0].station, "ST1");
    assert_eq!(dvector.syn_ids()[0].station, "ST1");

    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(dvector.weightings().clone(), array![0.2, 0.5], epsilon = precision);
    assert_abs_diff_eq!(dvector.get_d(), array![0.0, 0.2, 0.4, 0.6, 0.8, 0.5, 0.5, 0.5, 0.5, 0.5], epsilon = precision);
    assert_abs_diff_eq!(dvector.get_obs() - dvector.get_syn(), dvector.get_d(), epsilon = precision);

    // variance = (1.2 + 1.25) / (2.2 + 5.0)
    assert_abs_diff_eq!(dvector.variance(), 2.45 / 7.2, epsilon = precision);
    assert_abs_diff_eq!(dvector.obs_norm(), 7.2_f64.sqrt(), epsilon = precision);
    assert_abs_diff_eq!(dvector.d_norm(), 2.45_f64.sqrt(), epsilon = precision);
    assert_abs_diff_eq!(dvector.event_variance()["EV1"], dvector.variance(), epsilon = precision);
    assert_abs_diff_eq!(dvector.station_variance()["ST1"], 1.2 / 2.2, epsilon = precision);
    assert_abs_diff_eq!(dvector.station_variance()["ST2"], 0.25, epsilon = precision);
    assert_eq!(dvector.used_stations().len(), 2);
    assert_eq!(dvector.used_events().len(), 1);
}

#[test]
fn test_dvector_unmatched_and_filtered() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::waveforms::Component;
    use ndarray::array;

    let mut records: Vec<BasicId> = two_window_records();
    // Observed record without a synthetic partner is dropped with a warning
    records.push(BasicId::new(WaveformType::Observed, "ST3", "EV2", Component::Z, 1.0, 0.0, 3, 10.0, 100.0).with_data(array![1.0, 2.0, 3.0]));
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();
    assert_eq!(dvector.n_time_window(), 2);

    // The chooser only applies to observed records
    let options: DvectorOptions = DvectorOptions {
        chooser: Some(Arc::new(|id: &BasicId| id.station == "ST2")),
        ..DvectorOptions::default()
    };
    let dvector: Dvector = Dvector::new(&records, options).unwrap();
    assert_eq!(dvector.n_time_window(), 1);
    assert_eq!(dvector.npts(), 5);
    assert_eq!(dvector.obs_ids()[0].station, "ST2");

    let nothing: DvectorOptions = DvectorOptions {
        chooser: Some(Arc::new(|_id: &BasicId| false)),
        ..DvectorOptions::default()
    };
    assert!(matches!(Dvector::new(&records, nothing), Err(Error::Pairing { .. })));
}

#[test]
fn test_dvector_rejects_bad_input() {
    let mut records: Vec<BasicId> = two_window_records();
    let mut no_data: BasicId = records[0].clone();
    no_data.data = None;
    records.push(no_data);
    assert!(matches!(Dvector::new(&records, DvectorOptions::default()), Err(Error::DataIntegrity { .. })));

    // Same observed window twice, start times inside the tolerance
    let mut records: Vec<BasicId> = two_window_records();
    let mut shifted: BasicId = records[0].clone();
    shifted.start_time += 3.0;
    records.push(shifted);
    assert!(matches!(Dvector::new(&records, DvectorOptions::default()), Err(Error::Duplicate { .. })));

    // Two synthetic candidates for one observed window
    let mut records: Vec<BasicId> = two_window_records();
    let mut extra_synthetic: BasicId = records[3].clone();
    extra_synthetic.start_time -= 2.0;
    records.push(extra_synthetic);
    assert!(matches!(Dvector::new(&records, DvectorOptions::default()), Err(Error::Duplicate { .. })));
}

#[test]
fn test_dvector_rejects_duplicate_synthetic() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::waveforms::Component;
    use ndarray::array;

    let record = |waveform_type: WaveformType, start_time: f64| -> BasicId {
        return BasicId::new(waveform_type, "ST1", "EV1", Component::T, 1.0, start_time, 3, 10.0, 100.0).with_data(array![1.0, 2.0, 3.0]);
    };

    // Two synthetic records pair with each other, only one of them pairs with the observed record
    let records: Vec<BasicId> = vec![record(WaveformType::Observed, 125.0), record(WaveformType::Synthetic, 100.0), record(WaveformType::Synthetic, 115.0)];
    assert!(matches!(
        Dvector::new(&records, DvectorOptions::default()),
        Err(Error::Duplicate { kind, .. }) if kind == "synthetic"
    ));

    // One synthetic record would serve two observed windows 30 apart
    let records: Vec<BasicId> = vec![record(WaveformType::Observed, 100.0), record(WaveformType::Observed, 130.0), record(WaveformType::Synthetic, 115.0)];
    assert!(matches!(
        Dvector::new(&records, DvectorOptions::default()),
        Err(Error::Duplicate { kind, .. }) if kind == "synthetic"
    ));
}

#[test]
fn test_combine_and_separate() {
    // Lazy loading of packages which are not used anywhere else in the code
    use ndarray::array;

    let dvector: Dvector = Dvector::new(&two_window_records(), DvectorOptions::default()).unwrap();
    let vectors: Vec<Array1<f64>> = vec![array![1.0, 2.0, 3.0, 4.0, 5.0], array![-1.0, -2.0, -3.0, -4.0, -5.0]];
    let combined: Array1<f64> = dvector.combine(&vectors).unwrap();
    assert_eq!(combined, array![1.0, 2.0, 3.0, 4.0, 5.0, -1.0, -2.0, -3.0, -4.0, -5.0]);
    assert_eq!(dvector.separate(&combined).unwrap(), vectors);
    assert_eq!(dvector.separate(&dvector.get_d()).unwrap(), dvector.d_vecs().to_vec());

    let too_few: Vec<Array1<f64>> = vec![array![1.0, 2.0, 3.0, 4.0, 5.0]];
    assert!(matches!(dvector.combine(&too_few), Err(Error::DimensionMismatch { .. })));
    let wrong_length: Vec<Array1<f64>> = vec![array![1.0, 2.0, 3.0, 4.0, 5.0], array![1.0]];
    assert!(matches!(dvector.combine(&wrong_length), Err(Error::DimensionMismatch { .. })));
    assert!(matches!(dvector.separate(&Array1::zeros(9)), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn test_window_lookup_and_masks() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let records: Vec<BasicId> = two_window_records();
    let dvector: Dvector = Dvector::new(&records, DvectorOptions::default()).unwrap();

    // Synthetic headers resolve to the window of their observed partner
    assert_eq!(dvector.which_timewindow(&records[3]), Some(0));
    assert_eq!(dvector.which_timewindow(&records[1]), Some(1));
    let mut elsewhere: BasicId = records[0].clone();
    elsewhere.station = "XXX".to_string();
    assert_eq!(dvector.which_timewindow(&elsewhere), None);

    assert_abs_diff_eq!(dvector.mask_for_event("EV1"), dvector.get_d(), epsilon = 1e-15);
    assert_abs_diff_eq!(dvector.mask_for_event("EV9"), Array1::<f64>::zeros(10), epsilon = 1e-15);

    let breakdown: VarianceBreakdown = dvector.variance_breakdown(dvector.d_vecs()).unwrap();
    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(breakdown.total, dvector.variance(), epsilon = precision);
    assert_abs_diff_eq!(breakdown.per_window, array![1.2 / 2.2, 0.25], epsilon = precision);
    assert_abs_diff_eq!(breakdown.per_station["ST2"], 0.25, epsilon = precision);
}
