//! Linear inversion of seismic waveforms for Earth structure.
//!
//! Observed and synthetic time windows are paired and weighted into a data vector ([`Dvector`]),
//! sensitivity waveforms are assembled into the matrix `A` ([`ObservationEquation`]),
//! and the conjugate gradient family ([`inverse`]) returns the full solution path so the number of
//! directions can be chosen afterwards by AIC.

// Private modules
mod aic;
mod conditioner;
mod config;
mod dvector;
mod errors;
mod inversion;
mod model_covariance;
mod observation_equation;
mod parameters;
mod regularisation;
mod resampling;
mod waveforms;

// Solvers are public as a module, like the variants they hold
pub mod inverse;

// Public flattened exports
pub use aic::{aic_series, compute_aic};
pub use conditioner::sensitivity_conditioner;
pub use config::InversionSettings;
pub use dvector::{Dvector, DvectorOptions, ObservedChooser, VarianceBreakdown, Weighting, WeightingFunction, WindowClassifier};
pub use errors::{Error, Result};
pub use inversion::{InversionResult, MethodResult, prepare_equation, run_inversion, solve_with};
pub use model_covariance::{CM_THRESHOLD, ModelCovarianceMatrix, pre_weights_from_sensitivity};
pub use observation_equation::{ObservationEquation, at_a_p, compute_ata, compute_atv, operate};
pub use parameters::{Location, PartialType, UnknownParameter};
pub use regularisation::{RegularisationFamily, family_norm, radial_second_order_operator, regularisation_matrix};
pub use resampling::{BootstrapSample, bootstrap_sample, bootstrap_solutions};
pub use waveforms::{BasicId, Component, DEFAULT_START_TIME_TOLERANCE, PartialId, WaveformType};
