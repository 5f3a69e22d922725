use crate::errors::{Error, Result};
use crate::waveforms::BasicId;
use ndarray::Array1;
use std::fmt;
use std::sync::Arc;

/// Maps a time window to a class index into `Weighting::ByClass::weights`
pub type WindowClassifier = Arc<dyn Fn(&BasicId) -> usize + Send + Sync>;

/// User supplied weight of an (observed, synthetic) pair
pub type WeightingFunction = Arc<dyn Fn(&BasicId, &BasicId) -> f64 + Send + Sync>;

/// How each time window is scaled before it enters the data vector.
/// Observed and synthetic samples of a window are always scaled by the same factor.
#[derive(Clone, Default)]
pub enum Weighting {
    /// `1 / max(|min(obs)|, |max(obs)|)`
    #[default]
    Reciprocal,
    /// `2 / |max(obs) - min(obs)|`
    ReciprocalPeakToPeak,
    /// Reciprocal weight multiplied by `(1 + cc) / 2`, where `cc` is the normalised
    /// zero-lag correlation between observed and synthetic
    ReciprocalCorrelation,
    Identity,
    /// Fixed weight per window class, e.g. lower mantle vs upper mantle phases
    ByClass { classifier: WindowClassifier, weights: Vec<f64> },
    User(WeightingFunction),
}

impl Weighting {
    /// Class weights must be non-negative and not all zero
    pub fn validate(&self) -> Result<()> {
        if let Weighting::ByClass { weights, .. } = self {
            if weights.is_empty() {
                return Err(Error::InvalidWeighting {
                    reason: "no class weights supplied".to_string(),
                });
            }
            if let Some(negative) = weights.iter().find(|weight: &&f64| **weight < 0.0) {
                return Err(Error::InvalidWeighting {
                    reason: format!("negative class weight {}", negative),
                });
            }
            if weights.iter().all(|weight: &f64| *weight == 0.0) {
                return Err(Error::InvalidWeighting {
                    reason: "all class weights are zero".to_string(),
                });
            }
        }
        return Ok(());
    }

    /// Weight for one paired window.
    /// A zero-amplitude observed window gives an infinite weight; this is not guarded.
    ///
    /// # Arguments
    /// * `obs_id`, `syn_id` - the paired headers
    /// * `obs`, `syn` - unweighted samples
    pub fn weight(&self, obs_id: &BasicId, syn_id: &BasicId, obs: &Array1<f64>, syn: &Array1<f64>) -> Result<f64> {
        let weight: f64 = match self {
            Weighting::Reciprocal => reciprocal(obs),
            Weighting::ReciprocalPeakToPeak => {
                let (min, max): (f64, f64) = min_max(obs);
                2.0 / (max - min).abs()
            }
            Weighting::ReciprocalCorrelation => {
                let cc: f64 = obs.dot(syn) / (obs.dot(obs).sqrt() * syn.dot(syn).sqrt());
                reciprocal(obs) * 0.5 * (1.0 + cc)
            }
            Weighting::Identity => 1.0,
            Weighting::ByClass { classifier, weights } => {
                let class: usize = classifier(obs_id);
                match weights.get(class) {
                    Some(weight) => *weight,
                    None => {
                        return Err(Error::InvalidWeighting {
                            reason: format!("class {} out of range for {} weights ({})", class, weights.len(), obs_id),
                        });
                    }
                }
            }
            Weighting::User(function) => function(obs_id, syn_id),
        };
        return Ok(weight);
    }
}

impl fmt::Debug for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Weighting::Reciprocal => write!(f, "Reciprocal"),
            Weighting::ReciprocalPeakToPeak => write!(f, "ReciprocalPeakToPeak"),
            Weighting::ReciprocalCorrelation => write!(f, "ReciprocalCorrelation"),
            Weighting::Identity => write!(f, "Identity"),
            Weighting::ByClass { weights, .. } => write!(f, "ByClass({:?})", weights),
            Weighting::User(_) => write!(f, "User"),
        };
    }
}

fn min_max(values: &Array1<f64>) -> (f64, f64) {
    let min: f64 = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max: f64 = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    return (min, max);
}

fn reciprocal(obs: &Array1<f64>) -> f64 {
    let (min, max): (f64, f64) = min_max(obs);
    return 1.0 / min.abs().max(max.abs());
}

#[test]
fn test_weighting_values() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::waveforms::{Component, WaveformType};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    let obs_id: BasicId = BasicId::new(WaveformType::Observed, "ST1", "EV1", Component::T, 1.0, 0.0, 4, 10.0, 100.0);
    let syn_id: BasicId = BasicId::new(WaveformType::Synthetic, "ST1", "EV1", Component::T, 1.0, 0.0, 4, 10.0, 100.0);
    let obs: Array1<f64> = array![1.0, -4.0, 2.0, 0.0];
    let syn: Array1<f64> = array![1.0, -4.0, 2.0, 0.0];

    let precision: f64 = 1e-12;
    assert_abs_diff_eq!(Weighting::Reciprocal.weight(&obs_id, &syn_id, &obs, &syn).unwrap(), 0.25, epsilon = precision);
    assert_abs_diff_eq!(Weighting::ReciprocalPeakToPeak.weight(&obs_id, &syn_id, &obs, &syn).unwrap(), 2.0 / 6.0, epsilon = precision);
    // Identical waveforms have cc = 1, so the correlation factor is 1
    assert_abs_diff_eq!(Weighting::ReciprocalCorrelation.weight(&obs_id, &syn_id, &obs, &syn).unwrap(), 0.25, epsilon = precision);
    assert_abs_diff_eq!(Weighting::Identity.weight(&obs_id, &syn_id, &obs, &syn).unwrap(), 1.0, epsilon = precision);

    let user: Weighting = Weighting::User(Arc::new(|obs_id: &BasicId, _syn_id: &BasicId| obs_id.sampling_hz * 3.0));
    assert_abs_diff_eq!(user.weight(&obs_id, &syn_id, &obs, &syn).unwrap(), 3.0, epsilon = precision);
}

#[test]
fn test_class_weights() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::waveforms::{Component, WaveformType};
    use ndarray::array;

    let classifier: WindowClassifier = Arc::new(|id: &BasicId| -> usize {
        if id.phases.iter().any(|phase: &String| phase.contains("ScS")) {
            return 0;
        }
        return 1;
    });

    let lower_mantle: BasicId = BasicId::new(WaveformType::Observed, "ST1", "EV1", Component::T, 1.0, 0.0, 2, 10.0, 100.0).with_phases(&["ScS", "S"]);
    let upper_mantle: BasicId = BasicId::new(WaveformType::Observed, "ST2", "EV1", Component::T, 1.0, 0.0, 2, 10.0, 100.0).with_phases(&["S"]);
    let samples: Array1<f64> = array![1.0, 1.0];

    let weighting: Weighting = Weighting::ByClass {
        classifier: classifier.clone(),
        weights: vec![2.0, 0.5],
    };
    assert!(weighting.validate().is_ok());
    assert_eq!(weighting.weight(&lower_mantle, &lower_mantle, &samples, &samples).unwrap(), 2.0);
    assert_eq!(weighting.weight(&upper_mantle, &upper_mantle, &samples, &samples).unwrap(), 0.5);

    let negative: Weighting = Weighting::ByClass {
        classifier: classifier.clone(),
        weights: vec![1.0, -1.0],
    };
    assert!(matches!(negative.validate(), Err(Error::InvalidWeighting { .. })));

    let all_zero: Weighting = Weighting::ByClass {
        classifier: classifier.clone(),
        weights: vec![0.0, 0.0],
    };
    assert!(matches!(all_zero.validate(), Err(Error::InvalidWeighting { .. })));

    let too_few: Weighting = Weighting::ByClass {
        classifier,
        weights: vec![1.0],
    };
    assert!(matches!(too_few.weight(&upper_mantle, &upper_mantle, &samples, &samples), Err(Error::InvalidWeighting { .. })));
}
