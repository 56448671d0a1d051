//! # Calibration Module
//!
//! Converts raw pointer displacement counts into centimeters.
//!
//! ## Conversion
//!
//! Optical mice report motion in counts; a mouse rated at `dpi` counts per inch
//! moves `scale / dpi` centimeters per count. The formula used is:
//!
//! `position_cm = raw * scale / dpi`
//!
//! with `scale` fixed at [`CM_SCALE`].
//!
//! ## Usage
//!
//! ```
//! use range_fusion::calibration::CalibrationProfile;
//!
//! let profile = CalibrationProfile::lookup("dell").unwrap();
//! assert_eq!(profile.to_centimeters(400), 1.0);
//! ```

use crate::error::{FusionError, Result};

/// Fixed scale constant applied to every profile.
pub const CM_SCALE: f64 = 2.5;

/// Static conversion constants for one pointer device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProfile {
    /// Registry key (e.g. `"dell"`).
    name: &'static str,
    /// Default device file for this pointer.
    path: &'static str,
    /// Counts per inch reported by the sensor.
    dpi: f64,
    /// Scale constant, see [`CM_SCALE`].
    scale: f64,
}

/// Known pointer devices, keyed by name.
const REGISTRY: &[CalibrationProfile] = &[
    CalibrationProfile {
        name: "dell",
        path: "/dev/input/by-id/usb-PixArt_USB_Optical_Mouse-mouse",
        dpi: 1000.0,
        scale: CM_SCALE,
    },
    CalibrationProfile {
        name: "zebronics",
        path: "/dev/input/by-id/usb-15d9_USB_OPTICAL_MOUSE-mouse",
        dpi: 800.0,
        scale: CM_SCALE,
    },
];

impl CalibrationProfile {
    /// Creates a profile that is not part of the registry.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name used in log output
    /// * `path` - Pointer device file
    /// * `dpi` - Counts per inch
    #[must_use]
    pub const fn new(name: &'static str, path: &'static str, dpi: f64) -> Self {
        Self {
            name,
            path,
            dpi,
            scale: CM_SCALE,
        }
    }

    /// Looks up a registered profile by key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProfile` if no profile is registered under `name`.
    pub fn lookup(name: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|profile| profile.name == name)
            .copied()
            .ok_or_else(|| FusionError::UnknownProfile(name.to_string()))
    }

    /// Returns the keys of all registered profiles.
    pub fn registered() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|profile| profile.name)
    }

    /// Returns the registry key.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the default device file.
    #[must_use]
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Returns the sensor DPI.
    #[must_use]
    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// Distance in centimeters covered by one raw count.
    #[must_use]
    pub fn resolution(&self) -> f64 {
        self.scale / self.dpi
    }

    /// Converts an accumulated raw count to centimeters.
    ///
    /// Multiplies before dividing so that whole-centimeter positions come out exact.
    #[must_use]
    pub fn to_centimeters(&self, raw: i64) -> f64 {
        raw as f64 * self.scale / self.dpi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_registered_profiles() {
        let dell = CalibrationProfile::lookup("dell").unwrap();
        assert_eq!(dell.dpi(), 1000.0);
        assert!(dell.path().ends_with("PixArt_USB_Optical_Mouse-mouse"));

        let zebronics = CalibrationProfile::lookup("zebronics").unwrap();
        assert_eq!(zebronics.dpi(), 800.0);
        assert_eq!(zebronics.name(), "zebronics");
    }

    #[test]
    fn test_lookup_unknown_profile() {
        match CalibrationProfile::lookup("logitech") {
            Err(FusionError::UnknownProfile(name)) => assert_eq!(name, "logitech"),
            other => panic!("Expected UnknownProfile, got: {:?}", other),
        }
    }

    #[test]
    fn test_registered_keys() {
        let keys: Vec<_> = CalibrationProfile::registered().collect();
        assert_eq!(keys, vec!["dell", "zebronics"]);
    }

    #[test]
    fn test_resolution() {
        let profile = CalibrationProfile::new("test", "/dev/null", 1000.0);
        assert!((profile.resolution() - 0.0025).abs() < 1e-12);
    }

    #[test]
    fn test_to_centimeters_whole_value() {
        let profile = CalibrationProfile::new("test", "/dev/null", 1000.0);
        assert_eq!(profile.to_centimeters(400), 1.0);
        assert_eq!(profile.to_centimeters(-400), -1.0);
        assert_eq!(profile.to_centimeters(0), 0.0);
    }

    #[test]
    fn test_to_centimeters_is_linear() {
        let profile = CalibrationProfile::lookup("zebronics").unwrap();
        let one = profile.to_centimeters(1);
        let many = profile.to_centimeters(320);
        assert!((many - one * 320.0).abs() < 1e-9);
        assert_eq!(many, 1.0);
    }
}
