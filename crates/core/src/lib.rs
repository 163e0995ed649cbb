//! shiftline-core: Shiftline domain model and restaurant configuration.
//!
//! Provides the typed representation of a restaurant's operating day:
//! wall-clock values, the ordered period catalog, task templates, the
//! business-day identity, and the JSON configuration document that ties
//! them together.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`TimeOfDay`] -- an `HH:MM` wall-clock value
//! - [`Period`], [`PeriodKind`], [`PeriodCatalog`] -- the operating-day schedule
//! - [`TaskTemplate`], [`TaskSet`], [`Role`], [`UploadKind`] -- the checklist
//! - [`BusinessDay`] -- explicit day identity keyed at the reset hour
//! - [`RestaurantConfig`] -- the loaded + validated configuration document
//! - [`ConfigError`] -- configuration error type

pub mod catalog;
pub mod config;
pub mod day;
pub mod error;
pub mod task;
pub mod timeofday;

// ── Convenience re-exports: key types ────────────────────────────────

pub use catalog::{Period, PeriodCatalog, PeriodKind};
pub use config::RestaurantConfig;
pub use day::BusinessDay;
pub use error::ConfigError;
pub use task::{Role, TaskSet, TaskTemplate, UploadKind};
pub use timeofday::TimeOfDay;
