use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("waveform record has no data: {record}")]
    DataIntegrity { record: String },

    #[error("no unique synthetic match for observed record: {record}")]
    Pairing { record: String },

    #[error("duplicate {kind} record under the pairing rule: {record}")]
    Duplicate { kind: String, record: String },

    #[error("incomplete partial coverage: placed {placed} of {expected} (time window, parameter) combinations")]
    IncompleteData { placed: usize, expected: usize },

    #[error("dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch { context: String, expected: usize, got: usize },

    #[error("invalid weighting: {reason}")]
    InvalidWeighting { reason: String },

    #[error("{operation} needs the sensitivity matrix, but this equation only holds normal equations")]
    MissingSensitivityMatrix { operation: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("could not read inversion settings: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn dimension_mismatch(context: &str, expected: usize, got: usize) -> Self {
        return Error::DimensionMismatch {
            context: context.to_string(),
            expected,
            got,
        };
    }
}
