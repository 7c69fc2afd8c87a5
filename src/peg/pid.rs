//! Discrete PID controller over decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::config::PidConfig;
use crate::error::Result;
use crate::utils::math::{dec_add, dec_div, dec_mul, dec_sub};

/// Persisted controller memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidState {
    /// Accumulated `Σ e·dt`, clamped to the integral limit
    pub integral: Decimal,
    /// Error seen on the previous step
    pub last_error: Decimal,
}

/// Breakdown of one controller step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidOutput {
    /// `Kp · e`
    pub proportional: Decimal,
    /// `Ki · ∫e`
    pub integral: Decimal,
    /// `Kd · Δe/Δt`
    pub derivative: Decimal,
    /// Sum of the three terms
    pub output: Decimal,
}

/// Stateless PID law; memory lives in [`PidState`]
#[derive(Debug, Clone)]
pub struct PidController {
    config: PidConfig,
}

impl PidController {
    /// Create a controller with the given gains and limits
    pub fn new(config: PidConfig) -> Self {
        Self { config }
    }

    /// Advance the controller by one observation.
    ///
    /// A `dt_secs` of zero is treated as one second.
    pub fn step(&self, state: &mut PidState, error: Decimal, dt_secs: u64) -> Result<PidOutput> {
        let dt = Decimal::from(dt_secs.max(1));
        let limit = self.config.integral_limit;

        let integral = dec_add(state.integral, dec_mul(error, dt)?)?;
        let integral = integral.max(-limit).min(limit);
        let derivative = dec_div(dec_sub(error, state.last_error)?, dt)?;

        let p = dec_mul(self.config.kp, error)?;
        let i = dec_mul(self.config.ki, integral)?;
        let d = dec_mul(self.config.kd, derivative)?;
        let output = dec_add(dec_add(p, i)?, d)?;

        state.integral = integral;
        state.last_error = error;

        Ok(PidOutput {
            proportional: p,
            integral: i,
            derivative: d,
            output,
        })
    }

    /// Whether `output` falls inside the dead band
    pub fn in_dead_band(&self, output: Decimal) -> bool {
        output.abs() <= self.config.output_dead_band
    }

    /// Controller configuration
    pub fn config(&self) -> &PidConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_first_step() {
        let pid = PidController::new(PidConfig::default());
        let mut state = PidState::default();

        // e = 0.01, dt = 1: P = 0.001, I = 0.05 * 0.01, D = 0.02 * 0.01
        let out = pid.step(&mut state, d("0.01"), 0).unwrap();
        assert_eq!(out.proportional, d("0.001"));
        assert_eq!(out.integral, d("0.0005"));
        assert_eq!(out.derivative, d("0.0002"));
        assert_eq!(out.output, d("0.0017"));
        assert_eq!(state.integral, d("0.01"));
        assert_eq!(state.last_error, d("0.01"));
    }

    #[test]
    fn test_integral_clamped() {
        let config = PidConfig {
            integral_limit: d("1"),
            ..Default::default()
        };
        let pid = PidController::new(config);
        let mut state = PidState::default();

        pid.step(&mut state, d("0.01"), 3600).unwrap();
        assert_eq!(state.integral, d("1"));

        pid.step(&mut state, d("-0.02"), 3600).unwrap();
        assert_eq!(state.integral, d("-1"));
    }

    #[test]
    fn test_negative_error_gives_negative_output() {
        let pid = PidController::new(PidConfig::default());
        let mut state = PidState::default();
        let out = pid.step(&mut state, d("-0.01"), 1).unwrap();
        assert!(out.output < Decimal::ZERO);
    }

    #[test]
    fn test_dead_band() {
        let config = PidConfig {
            output_dead_band: d("0.001"),
            ..Default::default()
        };
        let pid = PidController::new(config);
        assert!(pid.in_dead_band(d("-0.001")));
        assert!(!pid.in_dead_band(d("0.0011")));
        assert!(PidController::new(PidConfig::default()).in_dead_band(Decimal::ZERO));
    }
}
