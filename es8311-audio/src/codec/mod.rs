//! ES8311 codec driver.
//!
//! [`Es8311`] is the handle returned to callers; the bring-up ordering lives
//! in the `sequence` module and the raw register map in [`registers`].

pub mod registers;
mod es8311;
mod sequence;

pub use es8311::{Es8311, TRACE_DEPTH};
pub use sequence::{ConfigStep, Phase};
