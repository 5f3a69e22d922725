// Load modules
mod dvector;
mod weighting;

// Expose functions to public
pub use dvector::{Dvector, DvectorOptions, ObservedChooser, VarianceBreakdown};
pub use weighting::{Weighting, WeightingFunction, WindowClassifier};

#[cfg(test)]
pub(crate) use dvector::two_window_records;
