use crate::parameters::{Location, PartialType};
use crate::waveforms::BasicId;
use ndarray::Array1;

/// Sensitivity waveform of one time window with respect to one parameter
#[derive(Debug, Clone)]
pub struct PartialId {
    pub partial_type: PartialType,
    pub location: Location,
    /// Header of the time window this kernel belongs to
    pub window: BasicId,
    pub data: Array1<f64>,
}

impl PartialId {
    pub fn new(partial_type: PartialType, location: Location, window: &BasicId, data: Array1<f64>) -> Self {
        let mut window: BasicId = window.clone();
        window.data = None;
        return PartialId {
            partial_type,
            location,
            window,
            data,
        };
    }
}
