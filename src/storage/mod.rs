//! Storage module.
//!
//! Client-side persistence of the consent record, language preference and
//! anonymous identity.
//! Note: the actual cookie / local storage access is done by the host
//! binding behind `KeyValueStore`.

pub mod consent;
pub mod store;

pub use consent::*;
pub use store::*;
