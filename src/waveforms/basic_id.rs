use ndarray::Array1;
use std::fmt;

/// Observed and synthetic start times closer than this are treated as the same window.
/// Same units as `start_time` (seconds for all supplied data).
pub const DEFAULT_START_TIME_TOLERANCE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveformType {
    Observed,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Z,
    R,
    T,
}

/// Header of one time window of one waveform, plus its samples when loaded
#[derive(Debug, Clone)]
pub struct BasicId {
    pub waveform_type: WaveformType,
    pub station: String,
    pub event_id: String,
    pub component: Component,
    pub sampling_hz: f64,
    pub start_time: f64,
    pub min_period: f64,
    pub max_period: f64,
    pub phases: Vec<String>,
    pub npts: usize,
    pub data: Option<Array1<f64>>,
}

impl BasicId {
    pub fn new(
        waveform_type: WaveformType,
        station: &str,
        event_id: &str,
        component: Component,
        sampling_hz: f64,
        start_time: f64,
        npts: usize,
        min_period: f64,
        max_period: f64,
    ) -> Self {
        return BasicId {
            waveform_type,
            station: station.to_string(),
            event_id: event_id.to_string(),
            component,
            sampling_hz,
            start_time,
            min_period,
            max_period,
            phases: Vec::new(),
            npts,
            data: None,
        };
    }

    pub fn with_phases(mut self, phases: &[&str]) -> Self {
        self.phases = phases.iter().map(|phase: &&str| phase.to_string()).collect();
        return self;
    }

    pub fn with_data(mut self, data: Array1<f64>) -> Self {
        self.npts = data.len();
        self.data = Some(data);
        return self;
    }

    pub fn contains_data(&self) -> bool {
        return self.data.is_some();
    }

    /// Same station, event, component, sampling, length and frequency band,
    /// with start times within `start_time_tolerance`. The waveform type is not compared
    pub fn is_pair(&self, other: &BasicId, start_time_tolerance: f64) -> bool {
        return self.station == other.station
            && self.event_id == other.event_id
            && self.component == other.component
            && self.npts == other.npts
            && self.sampling_hz == other.sampling_hz
            && (self.start_time - other.start_time).abs() < start_time_tolerance
            && self.min_period == other.min_period
            && self.max_period == other.max_period;
    }
}

impl fmt::Display for BasicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(
            f,
            "{:?} {} {} {:?} {} {} {} {} {}",
            self.waveform_type,
            self.station,
            self.event_id,
            self.component,
            self.sampling_hz,
            self.start_time,
            self.npts,
            self.min_period,
            self.max_period
        );
    }
}

#[test]
fn test_is_pair() {
    let observed: BasicId = BasicId::new(WaveformType::Observed, "FUR", "200503211243A", Component::T, 20.0, 310.0, 400, 12.5, 200.0);
    let mut synthetic: BasicId = observed.clone();
    synthetic.waveform_type = WaveformType::Synthetic;
    synthetic.start_time = 325.0;
    assert!(observed.is_pair(&synthetic, DEFAULT_START_TIME_TOLERANCE));

    // Start times exactly at the tolerance do not pair
    synthetic.start_time = 330.0;
    assert!(!observed.is_pair(&synthetic, DEFAULT_START_TIME_TOLERANCE));
    assert!(observed.is_pair(&synthetic, 25.0));

    let mut other_band: BasicId = observed.clone();
    other_band.max_period = 100.0;
    assert!(!observed.is_pair(&other_band, DEFAULT_START_TIME_TOLERANCE));

    let mut other_component: BasicId = observed.clone();
    other_component.component = Component::R;
    assert!(!observed.is_pair(&other_component, DEFAULT_START_TIME_TOLERANCE));

    let mut other_length: BasicId = observed.clone();
    other_length.npts = 401;
    assert!(!observed.is_pair(&other_length, DEFAULT_START_TIME_TOLERANCE));
}
