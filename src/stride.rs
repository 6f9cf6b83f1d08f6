use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Share of body height covered by one walking step
pub const STRIDE_LENGTH_RATIO: f64 = 0.43;

pub const MIN_HEIGHT_CM: u32 = 50;
pub const MAX_HEIGHT_CM: u32 = 250;
pub const DEFAULT_HEIGHT_CM: u32 = 170;

/// Estimated length of a single step in meters for a person of the given height.
///
/// Total for any positive height; range checks belong to [`HeightCm::new`].
pub fn stride_length_meters(height_cm: u32) -> f64 {
    (height_cm as f64 * STRIDE_LENGTH_RATIO) / 100.0
}

/// Distance covered by `steps` steps, in meters
pub fn distance_meters(steps: u64, height_cm: u32) -> f64 {
    steps as f64 * stride_length_meters(height_cm)
}

pub fn distance_km(steps: u64, height_cm: u32) -> f64 {
    distance_meters(steps, height_cm) / 1000.0
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Height must be between {MIN_HEIGHT_CM} and {MAX_HEIGHT_CM} cm")]
pub struct InvalidHeight(pub u32);

/// A user height that has passed range validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HeightCm(u32);

impl HeightCm {
    pub fn new(cm: u32) -> Result<Self, InvalidHeight> {
        if (MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&cm) {
            Ok(Self(cm))
        } else {
            Err(InvalidHeight(cm))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn stride_length_meters(self) -> f64 {
        stride_length_meters(self.0)
    }

    pub fn distance_meters(self, steps: u64) -> f64 {
        distance_meters(steps, self.0)
    }
}

impl Default for HeightCm {
    fn default() -> Self {
        Self(DEFAULT_HEIGHT_CM)
    }
}

impl TryFrom<u32> for HeightCm {
    type Error = InvalidHeight;

    fn try_from(cm: u32) -> Result<Self, Self::Error> {
        Self::new(cm)
    }
}

impl From<HeightCm> for u32 {
    fn from(h: HeightCm) -> Self {
        h.0
    }
}

impl fmt::Display for HeightCm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cm", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_length() {
        assert!((stride_length_meters(175) - 0.7525).abs() < 1e-9);
        assert!((stride_length_meters(100) - 0.43).abs() < 1e-9);
    }

    #[test]
    fn test_stride_monotonic_over_valid_range() {
        let mut previous = stride_length_meters(MIN_HEIGHT_CM);
        for h in (MIN_HEIGHT_CM + 1)..=MAX_HEIGHT_CM {
            let current = stride_length_meters(h);
            assert!(current > previous, "stride must grow at {h} cm");
            previous = current;
        }
    }

    #[test]
    fn test_distance_is_steps_times_stride() {
        for &(steps, h) in &[(0u64, 50u32), (1, 170), (5432, 175), (100_000, 250)] {
            let expected = steps as f64 * stride_length_meters(h);
            assert!((distance_meters(steps, h) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_distance_for_known_walk() {
        assert!((distance_meters(5432, 175) - 4087.58).abs() < 1e-6);
        assert!((distance_km(5432, 175) - 4.08758).abs() < 1e-9);
    }

    #[test]
    fn test_model_does_not_reject_out_of_range() {
        assert!((stride_length_meters(300) - 1.29).abs() < 1e-9);
    }

    #[test]
    fn test_height_bounds() {
        assert!(HeightCm::new(50).is_ok());
        assert!(HeightCm::new(250).is_ok());
        assert_eq!(HeightCm::new(49), Err(InvalidHeight(49)));
        assert_eq!(HeightCm::new(251), Err(InvalidHeight(251)));
        assert_eq!(
            InvalidHeight(12).to_string(),
            "Height must be between 50 and 250 cm"
        );
    }

    #[test]
    fn test_height_serde_validates() {
        let h: HeightCm = serde_json::from_str("180").unwrap();
        assert_eq!(h.get(), 180);
        assert!(serde_json::from_str::<HeightCm>("20").is_err());
    }
}
