//! Confidence score module

use std::fmt;

/// A confidence score in `[0.0, 1.0]`
///
/// Scores coming from collaborators are untrusted: [`Confidence::clamped`]
/// normalizes them at the boundary, [`Confidence::new`] rejects them.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Confidence(f64);

impl Confidence {
    /// Zero confidence, used for failed or absent stages
    pub const ZERO: Confidence = Confidence(0.0);

    /// Full confidence
    pub const FULL: Confidence = Confidence(1.0);

    /// Create a confidence score, rejecting values outside `[0, 1]` and NaN
    ///
    /// # Examples
    ///
    /// ```
    /// use paperclerk_domain::Confidence;
    ///
    /// assert!(Confidence::new(0.92).is_ok());
    /// assert!(Confidence::new(1.2).is_err());
    /// ```
    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(format!("confidence {} out of range [0.0, 1.0]", value));
        }
        Ok(Self(value))
    }

    /// Create a confidence score, clamping into `[0, 1]` (NaN becomes zero)
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Get the raw value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether this score meets (is at or above) the given threshold
    pub fn meets(&self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
