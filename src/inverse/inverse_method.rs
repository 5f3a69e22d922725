use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InverseMethod {
    ConjugateGradient,
    PreconditionedConjugateGradient,
    FastConjugateGradient,
    FastConjugateGradientDamped,
    ConstrainedConjugateGradient,
    NonlinearConjugateGradient,
}

impl InverseMethod {
    /// Short name used for output directories and log lines
    pub fn simple_name(&self) -> &'static str {
        return match self {
            InverseMethod::ConjugateGradient => "CG",
            InverseMethod::PreconditionedConjugateGradient => "PCG",
            InverseMethod::FastConjugateGradient => "FCG",
            InverseMethod::FastConjugateGradientDamped => "FCGD",
            InverseMethod::ConstrainedConjugateGradient => "CCG",
            InverseMethod::NonlinearConjugateGradient => "NCG",
        };
    }
}

impl fmt::Display for InverseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.simple_name());
    }
}
