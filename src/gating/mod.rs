//! Consent gating module.
//!
//! Everything between "a page wants to load a tracker" and "the tracker loads":
//! - `resource` - pending resources and the markup conventions they come from
//! - `scanner` - one-shot scan of pre-marked markup
//! - `guard` - interception of dynamically created scripts
//! - `evaluator` - allow/block verdict for a purpose tag
//! - `decision` - purpose-decision maps for accept-all, reject-all and custom saves
//! - `state` - the per-session consent state shared by the pieces above
//! - `replay` - at-most-once activation of consented resources

pub mod decision;
pub mod evaluator;
pub mod guard;
pub mod replay;
pub mod resource;
pub mod scanner;
pub mod state;

pub use decision::*;
pub use evaluator::*;
pub use guard::*;
pub use replay::*;
pub use resource::*;
pub use scanner::*;
pub use state::*;
