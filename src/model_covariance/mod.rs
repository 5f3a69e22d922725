// Load modules
mod model_covariance_matrix;

// Expose functions to public
pub use model_covariance_matrix::{CM_THRESHOLD, ModelCovarianceMatrix, pre_weights_from_sensitivity};
