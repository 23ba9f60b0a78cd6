//! # Strata Configuration Module
//!
//! This module centralizes all configuration constants for the storage engine.
//! Constants are grouped by their functional area and interdependencies are
//! documented and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! Several constants in the column engine are coupled: the LOB chunk header
//! size bounds the minimum usable block data area, and the master column
//! record cap must fit inside one block's data area or a record could never
//! be written. Co-locating these values and asserting the relationships at
//! compile time prevents mismatch bugs.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
