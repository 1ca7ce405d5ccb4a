// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD clock configuration
//!
//! The only tunable is the prescaler divisor, which fixes SWCLK at the
//! reference tick rate divided by the divisor.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::SwdError;
use crate::prescaler::validate_divisor;

/// Default divisor - SWCLK at half the reference tick rate.
pub const DEFAULT_DIVISOR: u32 = 2;

/// Largest supported divisor.
pub const MAX_DIVISOR: u32 = 1 << 16;

// Largest acceptable SWCLK error, in parts per million
const MAX_ERROR_PPM: u64 = 10_000;

/// Engine clock configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClockConfig {
    /// Reference ticks per SWCLK period.  Even, and at least 2.
    pub divisor: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_DIVISOR,
        }
    }
}

impl ClockConfig {
    /// Creates a configuration with the given divisor.
    ///
    /// Returns:
    /// - `Ok(ClockConfig)` if the divisor is valid.
    /// - `Err(SwdError::InvalidDivisor)` if it is odd, less than 2, or
    ///   larger than [`MAX_DIVISOR`].
    pub fn new(divisor: u32) -> Result<Self, SwdError> {
        let config = Self { divisor };
        config.validate()?;
        Ok(config)
    }

    /// Checks the divisor.  Useful after deserializing a configuration.
    pub fn validate(&self) -> Result<(), SwdError> {
        validate_divisor(self.divisor)?;
        if self.divisor > MAX_DIVISOR {
            return Err(SwdError::InvalidDivisor(self.divisor));
        }
        Ok(())
    }

    /// Picks the divisor giving the closest SWCLK to `target_hz`.
    ///
    /// Arguments:
    /// - `reference_hz`: the rate [`crate::Engine::tick()`] is called at.
    /// - `target_hz`: the desired SWCLK frequency.
    ///
    /// Returns:
    /// - `Ok(ClockConfig)` if a divisor gets within 1% of `target_hz`.
    /// - `Err(SwdError::FrequencyTooHigh)` if even the smallest divisor is too
    ///   slow.
    /// - `Err(SwdError::FrequencyTooLow)` if the largest divisor is too fast.
    /// - `Err(SwdError::FrequencyAccuracy)` if the nearest divisor is more
    ///   than 1% out.
    pub fn from_frequency(reference_hz: u32, target_hz: u32) -> Result<Self, SwdError> {
        if target_hz == 0 {
            return Err(SwdError::FrequencyTooLow);
        }
        let reference = reference_hz as u64;
        let target = target_hz as u64;

        // Round to the nearest even divisor
        let divisor = 2 * ((reference + target) / (2 * target));
        if divisor < DEFAULT_DIVISOR as u64 {
            return Err(SwdError::FrequencyTooHigh);
        }
        if divisor > MAX_DIVISOR as u64 {
            return Err(SwdError::FrequencyTooLow);
        }

        let actual = target * divisor;
        let error_ppm = reference.abs_diff(actual) * 1_000_000 / actual;
        if error_ppm > MAX_ERROR_PPM {
            debug!(
                "Note:  SWCLK {target_hz}Hz from {reference_hz}Hz needs divisor {divisor}, {error_ppm}ppm out"
            );
            return Err(SwdError::FrequencyAccuracy);
        }

        Ok(Self {
            divisor: divisor as u32,
        })
    }

    /// The SWCLK frequency this configuration produces.
    pub fn swclk_hz(&self, reference_hz: u32) -> u32 {
        reference_hz.checked_div(self.divisor).unwrap_or(0)
    }
}
