//! Browser geolocation results.

use std::fmt;
use thiserror::Error;

/// A `GeolocationPositionError`, by its `code`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location access was denied. Enable it in your browser settings to see nearby services.")]
    PermissionDenied,
    #[error("Your location is unavailable right now.")]
    PositionUnavailable,
    #[error("Finding your location took too long. Please try again.")]
    Timeout,
    #[error("Could not determine your location.")]
    Unknown,
}

impl GeolocationError {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GeolocationError::PermissionDenied,
            2 => GeolocationError::PositionUnavailable,
            3 => GeolocationError::Timeout,
            _ => GeolocationError::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, GeolocationError::PermissionDenied)]
    #[case(2, GeolocationError::PositionUnavailable)]
    #[case(3, GeolocationError::Timeout)]
    #[case(0, GeolocationError::Unknown)]
    #[case(42, GeolocationError::Unknown)]
    fn codes_map_to_errors(#[case] code: u16, #[case] expected: GeolocationError) {
        assert_eq!(GeolocationError::from_code(code), expected);
    }

    #[test]
    fn coordinates_read_lat_then_lng() {
        let grace_bay = Coordinates {
            latitude: 21.79,
            longitude: -72.1844,
        };
        assert_eq!(grace_bay.to_string(), "21.790000, -72.184400");
    }
}
