//! Parameter metadata for the sequential detectors
//!
//! Every detector knob is a positive bar count (an offset or a length). The
//! metadata here lets callers:
//! - Build parameter grids for sweeps
//! - Document defaults next to their sensible ranges
//! - Construct detectors from loosely-typed maps
//!
//! # Example
//!
//! ```rust
//! use seqscan::params::ParameterizedDetector;
//! use seqscan::prelude::*;
//!
//! for param in SetupDetector::param_meta() {
//!     println!("{}: default {} in {:?}", param.name, param.default, param.range);
//! }
//! ```

use std::collections::HashMap;

use crate::{Period, Result, SequentialError};

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "setup_length")
  pub name: &'static str,
  /// Default value
  pub default: usize,
  /// Range for sweeps: (min, max, step)
  pub range: (usize, usize, usize),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn new(
    name: &'static str,
    default: usize,
    range: (usize, usize, usize),
    description: &'static str,
  ) -> Self {
    Self { name, default, range, description }
  }

  /// All values from min to max inclusive
  pub fn generate_grid(&self) -> Vec<usize> {
    let (min, max, step) = self.range;
    (min..=max).step_by(step.max(1)).collect()
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: usize) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(SequentialError::OutOfRange {
        field: self.name,
        value: value as f64,
        min: min as f64,
        max: max as f64,
      });
    }
    Ok(())
  }
}

/// Detectors that can be built from named parameters
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, usize>) -> Result<Self>;

  fn detector_name() -> &'static str;
}

/// Look up `meta.name` in params (default fallback) and check it against `meta.range`
pub fn get_period(params: &HashMap<&str, usize>, meta: &ParamMeta) -> Result<Period> {
  let value = params.get(meta.name).copied().unwrap_or(meta.default);
  meta.validate(value)?;
  Period::new(value)
}

/// Check each `(meta, value)` pair against its declared range
pub fn validate_periods<'a>(pairs: impl IntoIterator<Item = (&'a ParamMeta, Period)>) -> Result<()> {
  for (meta, value) in pairs {
    meta.validate(value.get())?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::new("test", 9, (7, 11, 2), "Test");
    assert_eq!(meta.generate_grid(), vec![7, 9, 11]);
  }

  #[test]
  fn test_validate() {
    let meta = ParamMeta::new("test", 9, (3, 15, 1), "Test");

    assert!(meta.validate(3).is_ok());
    assert!(meta.validate(15).is_ok());
    assert!(meta.validate(2).is_err());
    assert!(meta.validate(16).is_err());
  }

  #[test]
  fn test_get_period_helper() {
    let meta = ParamMeta::new("key1", 14, (10, 20, 2), "Test");
    let mut params = HashMap::new();

    assert_eq!(get_period(&params, &meta).unwrap().get(), 14);

    params.insert("key1", 20);
    assert_eq!(get_period(&params, &meta).unwrap().get(), 20);

    params.insert("key1", 21);
    assert!(matches!(
      get_period(&params, &meta),
      Err(SequentialError::OutOfRange { field: "key1", .. })
    ));
  }

  #[test]
  fn test_validate_periods() {
    let meta = ParamMeta::new("key1", 14, (10, 20, 2), "Test");
    assert!(validate_periods([(&meta, Period::new_const(12))]).is_ok());
    assert!(validate_periods([(&meta, Period::new_const(9))]).is_err());
  }

  #[test]
  fn test_defaults_within_ranges() {
    use crate::detectors::{CountdownDetector, SetupDetector};

    for meta in SetupDetector::param_meta().iter().chain(CountdownDetector::param_meta()) {
      assert!(meta.validate(meta.default).is_ok(), "{} default out of range", meta.name);
    }
  }
}
