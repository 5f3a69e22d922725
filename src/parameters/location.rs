use std::fmt;

/// Where an unknown parameter lives: a spherical shell (1-D) or a point in the Earth (3-D)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    Radius(f64),
    Point { latitude: f64, longitude: f64, radius: f64 },
}

impl Location {
    pub fn radius(&self) -> f64 {
        return match self {
            Location::Radius(radius) => *radius,
            Location::Point { radius, .. } => *radius,
        };
    }

    /// Absolute difference in radius
    pub fn radial_distance(&self, other: &Location) -> f64 {
        return (self.radius() - other.radius()).abs();
    }

    /// Angular separation on the unit sphere in degrees, using the haversine form.
    /// Shells have no horizontal position, so any pair involving a `Radius` gives 0.0
    pub fn great_circle_distance_deg(&self, other: &Location) -> f64 {
        let (lat1, lon1, lat2, lon2): (f64, f64, f64, f64) = match (self, other) {
            (
                Location::Point {
                    latitude: lat1,
                    longitude: lon1,
                    ..
                },
                Location::Point {
                    latitude: lat2,
                    longitude: lon2,
                    ..
                },
            ) => (lat1.to_radians(), lon1.to_radians(), lat2.to_radians(), lon2.to_radians()),
            _ => return 0.0,
        };

        let half_d_lat: f64 = 0.5 * (lat2 - lat1);
        let half_d_lon: f64 = 0.5 * (lon2 - lon1);
        let h: f64 = half_d_lat.sin().powi(2) + lat1.cos() * lat2.cos() * half_d_lon.sin().powi(2);
        let angle: f64 = 2.0 * h.sqrt().min(1.0).asin();

        return angle.to_degrees();
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Location::Radius(radius) => write!(f, "{}", radius),
            Location::Point {
                latitude,
                longitude,
                radius,
            } => write!(f, "{} {} {}", latitude, longitude, radius),
        };
    }
}

#[test]
fn test_great_circle_distance() {
    // Lazy loading of packages which are not used anywhere else in the code
    use approx::assert_abs_diff_eq;

    let a: Location = Location::Point {
        latitude: 0.0,
        longitude: 0.0,
        radius: 6371.0,
    };
    let b: Location = Location::Point {
        latitude: 0.0,
        longitude: 90.0,
        radius: 5971.0,
    };
    let pole: Location = Location::Point {
        latitude: 90.0,
        longitude: 45.0,
        radius: 6371.0,
    };

    let precision: f64 = 1e-10;
    assert_abs_diff_eq!(a.great_circle_distance_deg(&b), 90.0, epsilon = precision);
    assert_abs_diff_eq!(a.great_circle_distance_deg(&pole), 90.0, epsilon = precision);
    assert_abs_diff_eq!(a.great_circle_distance_deg(&a), 0.0, epsilon = precision);
    assert_abs_diff_eq!(a.radial_distance(&b), 400.0, epsilon = precision);

    // Shells have no horizontal separation
    let shell: Location = Location::Radius(3480.0);
    assert_abs_diff_eq!(shell.great_circle_distance_deg(&a), 0.0, epsilon = precision);
    assert_abs_diff_eq!(shell.radial_distance(&a), 2891.0, epsilon = precision);
}
