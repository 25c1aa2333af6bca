//! Chart pattern detectors
//!
//! Each detector inspects a whole series (plus its precomputed
//! [`SeriesContext`](crate::SeriesContext)) and reports at most one candidate.
//!
//! # Pattern Families
//!
//! - **Extrema-based**: Head & Shoulders, Double Top/Bottom, Triple Top/Bottom
//! - **Trend-line**: Triangle (symmetric/ascending/descending), Wedge (rising/falling), Flag (bull/bear)

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod double;
pub mod flag;
pub mod head_and_shoulders;
pub mod triangle;
pub mod triple;
pub mod wedge;

// Re-export all detectors for convenience
pub use double::*;
pub use flag::*;
pub use head_and_shoulders::*;
pub use helpers::*;
pub use triangle::*;
pub use triple::*;
pub use wedge::*;
