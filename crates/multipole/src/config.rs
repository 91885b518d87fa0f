//! FMM parameters.

use serde::{Deserialize, Serialize};

use crate::error::FmmError;

/// Parameters shared by the upward pass and operator assembly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FmmConfig {
    /// Points per edge of the expansion surface grid
    pub order: usize,
    /// Equivalent surface scale, relative to a node's half-width
    pub inner_r: f64,
    /// Check surface scale, relative to a node's half-width
    pub outer_r: f64,
    /// Multipole acceptance criterion: two nodes interact through
    /// multipoles when `|c_obs - c_src| > mac * (R_obs + R_src)`
    pub mac: f64,
    /// Singular values below `pinv_tolerance * sigma_max` are dropped from
    /// the check-to-equivalent pseudo-inverse
    pub pinv_tolerance: f64,
}

impl Default for FmmConfig {
    fn default() -> Self {
        Self {
            order: 5,
            inner_r: 1.05,
            outer_r: 2.95,
            mac: 3.0,
            pinv_tolerance: 1e-10,
        }
    }
}

impl FmmConfig {
    /// Default config with a different surface order.
    #[must_use]
    pub fn with_order(order: usize) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    /// Reject parameters the method cannot work with.
    ///
    /// Requires `order >= 2`, `0 < inner_r < outer_r <= mac`, and a
    /// tolerance in `[0, 1)`. With `mac >= outer_r` every point of an
    /// accepted observation node lies outside the source node's check surface.
    ///
    /// # Errors
    ///
    /// [`FmmError::InvalidConfig`] naming the offending parameter.
    pub fn validate(&self) -> Result<(), FmmError> {
        if self.order < 2 {
            return Err(FmmError::InvalidConfig(format!(
                "order must be at least 2, got {}",
                self.order
            )));
        }
        if self.inner_r.is_nan()
            || self.outer_r.is_nan()
            || self.inner_r <= 0.0
            || self.inner_r >= self.outer_r
        {
            return Err(FmmError::InvalidConfig(format!(
                "need 0 < inner_r < outer_r, got inner_r = {}, outer_r = {}",
                self.inner_r, self.outer_r
            )));
        }
        if self.mac.is_nan() || self.mac < self.outer_r {
            return Err(FmmError::InvalidConfig(format!(
                "mac = {} must not be smaller than outer_r = {}",
                self.mac, self.outer_r
            )));
        }
        if !(0.0..1.0).contains(&self.pinv_tolerance) {
            return Err(FmmError::InvalidConfig(format!(
                "pinv_tolerance must lie in [0, 1), got {}",
                self.pinv_tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FmmConfig::default().validate().is_ok());
        assert!(FmmConfig::with_order(2).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(FmmConfig::with_order(1).validate().is_err());

        let swapped = FmmConfig {
            inner_r: 3.0,
            outer_r: 1.5,
            ..Default::default()
        };
        assert!(matches!(swapped.validate(), Err(FmmError::InvalidConfig(_))));

        let loose = FmmConfig {
            mac: 1.0,
            ..Default::default()
        };
        assert!(loose.validate().is_err());

        let nan = FmmConfig {
            inner_r: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = FmmConfig::with_order(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: FmmConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
