//! Sequential pattern detectors
//!
//! - **Setup**: consecutive closes below the close 4 bars back (9 in a row).
//! - **Countdown**: running tally of closes below the close 2 bars back,
//!   started after the most recent Setup (signal at 13).

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod countdown;
pub mod setup;

pub use countdown::*;
pub use setup::*;

impl_with_defaults!(SetupDetector, CountdownDetector);
