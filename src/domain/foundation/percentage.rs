//! Percentage value object (0-100 scale).
//!
//! Used for both stage progress and evaluator confidence.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A whole number between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const HUNDRED: Self = Self(100);

    /// Creates a new Percentage, clamping to valid range.
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    /// Creates a Percentage, returning error if out of range.
    pub fn try_new(value: u8) -> Result<Self, ValidationError> {
        if value > 100 {
            return Err(ValidationError::out_of_range(
                "percentage",
                0,
                100,
                value as i32,
            ));
        }
        Ok(Self(value))
    }

    /// Share of `part` in `whole`, rounded half away from zero.
    ///
    /// A zero `whole` yields zero; a `part` above `whole` clamps to 100.
    pub fn of_ratio(part: usize, whole: usize) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        let pct = (part as f64 / whole as f64 * 100.0).round();
        Self(pct.clamp(0.0, 100.0) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_full(&self) -> bool {
        self.0 == 100
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<u8> for Percentage {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_100() {
        assert_eq!(Percentage::new(100).value(), 100);
        assert_eq!(Percentage::new(101).value(), 100);
        assert_eq!(Percentage::new(255).value(), 100);
    }

    #[test]
    fn try_new_rejects_over_100() {
        match Percentage::try_new(101) {
            Err(ValidationError::OutOfRange { field, actual, .. }) => {
                assert_eq!(field, "percentage");
                assert_eq!(actual, 101);
            }
            other => panic!("Expected OutOfRange error, got {:?}", other),
        }
    }

    #[test]
    fn of_ratio_rounds_to_nearest_whole() {
        assert_eq!(Percentage::of_ratio(1, 3).value(), 33);
        assert_eq!(Percentage::of_ratio(2, 3).value(), 67);
        assert_eq!(Percentage::of_ratio(1, 8).value(), 13);
        assert_eq!(Percentage::of_ratio(3, 3), Percentage::HUNDRED);
    }

    #[test]
    fn of_ratio_handles_degenerate_inputs() {
        assert_eq!(Percentage::of_ratio(0, 0), Percentage::ZERO);
        assert_eq!(Percentage::of_ratio(5, 3), Percentage::HUNDRED);
    }

    #[test]
    fn displays_with_percent_sign() {
        assert_eq!(Percentage::new(75).to_string(), "75%");
    }

    #[test]
    fn deserialization_rejects_out_of_range() {
        let ok: Percentage = serde_json::from_str("75").unwrap();
        assert_eq!(ok.value(), 75);
        assert!(serde_json::from_str::<Percentage>("150").is_err());
    }
}
