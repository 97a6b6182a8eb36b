//! Host DOM binding.
//!
//! The runtime never touches a browser API directly:
//! - `document` - the `Document` trait a host binding implements
//! - `memory` - an in-memory tree document for non-browser hosts and tests

pub mod document;
pub mod memory;

pub use document::*;
pub use memory::*;
