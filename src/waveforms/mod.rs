// Load modules
mod basic_id;
mod partial_id;

// Expose functions to public
pub use basic_id::{BasicId, Component, DEFAULT_START_TIME_TOLERANCE, WaveformType};
pub use partial_id::PartialId;
