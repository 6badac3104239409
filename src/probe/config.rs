//! Z-probe driver configuration (spec.md §3 data model).

use crate::constants::{PROBE_PRIMING_MAX, PROBE_SMOOTHING_MAX, PROBE_SMOOTHING_MIN};
use crate::error::{CalibrationError, Result};
use crate::geometry::Point3D;

/// Configuration for the probe-driver adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeConfig {
    /// Number of taps averaged per probe (1..=10).
    pub smoothing: u32,
    /// Number of taps discarded before measuring (0..=20).
    pub priming: u32,
    pub acceleration: f64,
    pub offset: Point3D,
    pub fast_feedrate: f64,
    pub slow_feedrate: f64,
    pub debounce_count: u32,
    pub decelerate_on_trigger: bool,
}

impl ProbeConfig {
    pub fn new(
        smoothing: u32,
        priming: u32,
        acceleration: f64,
        offset: Point3D,
        fast_feedrate: f64,
        slow_feedrate: f64,
        debounce_count: u32,
        decelerate_on_trigger: bool,
    ) -> Result<Self> {
        if !(PROBE_SMOOTHING_MIN..=PROBE_SMOOTHING_MAX).contains(&smoothing) {
            return Err(CalibrationError::ConfigInvalid(format!(
                "smoothing={smoothing} out of range [{PROBE_SMOOTHING_MIN}, {PROBE_SMOOTHING_MAX}]"
            )));
        }
        if priming > PROBE_PRIMING_MAX {
            return Err(CalibrationError::ConfigInvalid(format!(
                "priming={priming} exceeds maximum {PROBE_PRIMING_MAX}"
            )));
        }
        Ok(Self {
            smoothing,
            priming,
            acceleration,
            offset,
            fast_feedrate,
            slow_feedrate,
            debounce_count,
            decelerate_on_trigger,
        })
    }

    /// True if the probe has a nonzero X/Y offset -- depth-map probing
    /// with an offset probe is rejected by spec.md §6 (G31 A).
    pub fn has_xy_offset(&self) -> bool {
        self.offset.x != 0.0 || self.offset.y != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_out_of_range_is_rejected() {
        let result = ProbeConfig::new(0, 0, 1000.0, Point3D::default(), 5.0, 1.0, 20, false);
        assert!(result.is_err());
    }

    #[test]
    fn nonzero_xy_offset_is_detected() {
        let cfg = ProbeConfig::new(3, 2, 1000.0, Point3D::new(1.0, 0.0, 0.0), 5.0, 1.0, 20, false).unwrap();
        assert!(cfg.has_xy_offset());
    }
}
