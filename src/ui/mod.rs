//! Presentation layer contract.
//!
//! Markup and styling belong to the host's templates; this module only
//! decides what is shown and which intents come back:
//! - `view` - view models built from configuration, language and decisions
//! - `renderer` - the templating boundary and the intent vocabulary
//! - `rights` - the multi-step "exercise your rights" form

pub mod renderer;
pub mod rights;
pub mod view;

pub use renderer::*;
pub use rights::*;
pub use view::*;
