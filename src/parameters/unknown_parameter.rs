use crate::parameters::{Location, PartialType};
use std::fmt;

/// One model degree of freedom.
/// Its position in the parameter list is its column in the sensitivity matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnknownParameter {
    partial_type: PartialType,
    location: Location,
    weighting: f64,
}

impl UnknownParameter {
    /// # Arguments
    /// * `partial_type` - which elastic parameter is perturbed
    /// * `location` - shell radius or 3-D point
    /// * `weighting` - multiplies every sensitivity sample of this column (often the shell thickness or cell volume)
    pub fn new(partial_type: PartialType, location: Location, weighting: f64) -> Self {
        return UnknownParameter {
            partial_type,
            location,
            weighting,
        };
    }

    pub fn partial_type(&self) -> PartialType {
        return self.partial_type;
    }

    pub fn location(&self) -> Location {
        return self.location;
    }

    pub fn weighting(&self) -> f64 {
        return self.weighting;
    }

    /// Column lookup rule for sensitivity records.
    /// Shells compare by radius, points compare by the full location; the weighting is ignored
    pub fn matches(&self, partial_type: PartialType, location: &Location) -> bool {
        return self.partial_type == partial_type && self.location == *location;
    }

    /// 1-D types live on shells and 3-D types at points
    pub fn has_consistent_location(&self) -> bool {
        return self.partial_type.is_1d() == matches!(self.location, Location::Radius(_));
    }

    /// Same parameter identity (type and location)
    pub fn same_identity(&self, other: &UnknownParameter) -> bool {
        return self.matches(other.partial_type, &other.location);
    }
}

impl fmt::Display for UnknownParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{} {} {}", self.partial_type, self.location, self.weighting);
    }
}

#[test]
fn test_matches_by_type_and_location() {
    let shell: UnknownParameter = UnknownParameter::new(PartialType::ParVs, Location::Radius(5701.0), 50.0);
    assert!(shell.matches(PartialType::ParVs, &Location::Radius(5701.0)));
    assert!(!shell.matches(PartialType::ParVp, &Location::Radius(5701.0)));
    assert!(!shell.matches(PartialType::ParVs, &Location::Radius(5751.0)));

    let cell: UnknownParameter = UnknownParameter::new(
        PartialType::Mu,
        Location::Point {
            latitude: 10.0,
            longitude: 20.0,
            radius: 3505.0,
        },
        1.0,
    );
    assert!(cell.matches(
        PartialType::Mu,
        &Location::Point {
            latitude: 10.0,
            longitude: 20.0,
            radius: 3505.0
        }
    ));
    // Same radius, different horizontal position
    assert!(!cell.matches(
        PartialType::Mu,
        &Location::Point {
            latitude: 10.0,
            longitude: 25.0,
            radius: 3505.0
        }
    ));
    // A shell never matches a point
    assert!(!cell.matches(PartialType::Mu, &Location::Radius(3505.0)));

    assert!(shell.has_consistent_location());
    assert!(cell.has_consistent_location());
    assert!(!UnknownParameter::new(PartialType::Mu, Location::Radius(3505.0), 1.0).has_consistent_location());
    assert!(!UnknownParameter::new(
        PartialType::ParVs,
        Location::Point {
            latitude: 0.0,
            longitude: 0.0,
            radius: 5701.0
        },
        1.0
    )
    .has_consistent_location());

    let same_place_other_weight: UnknownParameter = UnknownParameter::new(PartialType::ParVs, Location::Radius(5701.0), 1.0);
    assert!(shell.same_identity(&same_place_other_weight));
}
