use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of elastic or anelastic parameter a sensitivity kernel is taken with respect to.
/// The `Par*` variants belong to radially symmetric (1-D) models, the rest to 3-D models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartialType {
    // 1-D
    Par0,
    ParA,
    ParC,
    ParF,
    ParL,
    ParN,
    ParQ,
    Par1,
    Par2,
    ParVs,
    ParVp,
    ParG,
    ParM,
    // 3-D
    A,
    C,
    F,
    L,
    N,
    Q,
    Mu,
    Lambda,
    Kappa,
    Lambda2Mu,
    Vs,
}

impl PartialType {
    pub fn is_1d(&self) -> bool {
        return matches!(
            self,
            PartialType::Par0
                | PartialType::ParA
                | PartialType::ParC
                | PartialType::ParF
                | PartialType::ParL
                | PartialType::ParN
                | PartialType::ParQ
                | PartialType::Par1
                | PartialType::Par2
                | PartialType::ParVs
                | PartialType::ParVp
                | PartialType::ParG
                | PartialType::ParM
        );
    }
}

impl fmt::Display for PartialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{:?}", self);
    }
}

#[test]
fn test_partial_type_dimension() {
    assert!(PartialType::ParL.is_1d());
    assert!(PartialType::ParVs.is_1d());
    assert!(!PartialType::Mu.is_1d());
    assert!(!PartialType::Vs.is_1d());
}
