//! Utils Module - Helper Functions & Shared Utilities

pub mod locale;
pub mod stats;

pub use locale::*;
pub use stats::*;
