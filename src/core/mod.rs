//! Core Module - Inventory & Pricing Rules
//!
//! Pure functions with no database access. Services load rows, these decide.

pub mod availability;
pub mod pricing;

pub use availability::*;
pub use pricing::*;
