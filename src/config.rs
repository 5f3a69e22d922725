use crate::dvector::DvectorOptions;
use crate::errors::{Error, Result};
use crate::inverse::InverseMethod;
use crate::regularisation::RegularisationFamily;
use crate::waveforms::DEFAULT_START_TIME_TOLERANCE;
use serde::{Deserialize, Serialize};

/// Final values of every setting the inversion consumes. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InversionSettings {
    /// Solvers to run, each producing its own solution path
    pub inverse_methods: Vec<InverseMethod>,
    /// AIC divisors: the data are taken to hold `npts / alpha` independent samples
    pub alpha: Vec<f64>,
    /// Pairing tolerance on start times
    pub start_time_tolerance: f64,
    pub use_model_covariance: bool,
    /// Horizontal correlation length in degrees
    pub cm_horizontal: f64,
    /// Vertical correlation length
    pub cm_vertical: f64,
    pub regularisation: Vec<RegularisationFamily>,
    /// λ for damped fast CG
    pub damping: Option<f64>,
    /// Block size of the projector used by constrained CG
    pub n_combine: usize,
    pub use_conditioner: bool,
    /// Bootstrap realisations; 0 disables resampling
    pub n_bootstrap: usize,
    pub bootstrap_seed: u64,
}

impl Default for InversionSettings {
    fn default() -> Self {
        return InversionSettings {
            inverse_methods: vec![InverseMethod::ConjugateGradient],
            alpha: vec![1.0, 100.0, 1000.0],
            start_time_tolerance: DEFAULT_START_TIME_TOLERANCE,
            use_model_covariance: false,
            cm_horizontal: 0.0,
            cm_vertical: 0.0,
            regularisation: Vec::new(),
            damping: None,
            n_combine: 2,
            use_conditioner: false,
            n_bootstrap: 0,
            bootstrap_seed: 0,
        };
    }
}

impl InversionSettings {
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: InversionSettings = serde_json::from_str(text)?;
        settings.validate()?;
        return Ok(settings);
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(alpha) = self.alpha.iter().find(|alpha: &&f64| !(**alpha > 0.0)) {
            return Err(Error::InvalidArgument {
                reason: format!("AIC alpha must be positive, got {}", alpha),
            });
        }
        if self.n_combine == 0 {
            return Err(Error::InvalidArgument {
                reason: "n_combine must be at least 1".to_string(),
            });
        }
        if !(self.start_time_tolerance > 0.0) {
            return Err(Error::InvalidArgument {
                reason: format!("start_time_tolerance must be positive, got {}", self.start_time_tolerance),
            });
        }
        if self.inverse_methods.contains(&InverseMethod::FastConjugateGradientDamped) && self.damping.is_none() {
            return Err(Error::InvalidArgument {
                reason: "FastConjugateGradientDamped needs a damping coefficient".to_string(),
            });
        }
        return Ok(());
    }

    /// Options for building the data vector with the default weighting and this pairing tolerance
    pub fn dvector_options(&self) -> DvectorOptions {
        return DvectorOptions {
            start_time_tolerance: self.start_time_tolerance,
            ..DvectorOptions::default()
        };
    }
}

#[test]
fn test_settings_from_json() {
    // Lazy loading of packages which are not used anywhere else in the code
    use crate::parameters::PartialType;

    let text: &str = r#"{
        "inverse_methods": ["ConjugateGradient", "FastConjugateGradientDamped"],
        "alpha": [1.0, 50.0],
        "damping": 0.01,
        "regularisation": [{"partial_type": "ParVs", "lambda": 0.3, "gamma": 0.05}]
    }"#;
    let settings: InversionSettings = InversionSettings::from_json(text).unwrap();
    assert_eq!(settings.inverse_methods, vec![InverseMethod::ConjugateGradient, InverseMethod::FastConjugateGradientDamped]);
    assert_eq!(settings.alpha, vec![1.0, 50.0]);
    assert_eq!(settings.damping, Some(0.01));
    assert_eq!(settings.regularisation[0].partial_type, PartialType::ParVs);
    // Defaults fill the rest
    assert_eq!(settings.n_combine, 2);
    assert_eq!(settings.start_time_tolerance, DEFAULT_START_TIME_TOLERANCE);
    assert_eq!(settings.dvector_options().start_time_tolerance, DEFAULT_START_TIME_TOLERANCE);

    assert_eq!(InversionSettings::from_json("{}").unwrap(), InversionSettings::default());
}

#[test]
fn test_settings_rejected() {
    assert!(matches!(InversionSettings::from_json(r#"{"alpha": [0.0]}"#), Err(Error::InvalidArgument { .. })));
    assert!(matches!(InversionSettings::from_json(r#"{"n_combine": 0}"#), Err(Error::InvalidArgument { .. })));
    assert!(matches!(
        InversionSettings::from_json(r#"{"inverse_methods": ["FastConjugateGradientDamped"]}"#),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(matches!(InversionSettings::from_json(r#"{"inverse_methods": ["Simplex"]}"#), Err(Error::Config(_))));
    assert!(matches!(InversionSettings::from_json("not json"), Err(Error::Config(_))));
}
