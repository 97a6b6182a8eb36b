//! Configuration module.
//!
//! Two kinds of configuration live here:
//! - `model` - the tenant's runtime configuration (purposes, notice text, banner style)
//! - `validation` - fail-closed checks applied before a configuration is adopted
//! - `settings` - the loader's own settings, derived from the embedding script tag

pub mod model;
pub mod settings;
pub mod validation;

pub use model::*;
pub use settings::*;
pub use validation::*;
