//! # skillforge-model
//!
//! The model-invocation collaborator surface.
//!
//! The core is agnostic to which backend produces review text; everything it
//! needs is the [`ReviewModule`] trait. Two implementations live here:
//!
//! - [`CommandModule`] - shells out to an agent CLI in non-interactive mode
//! - [`CachedModule`] - wraps any module with a content-addressed output
//!   cache, so bootstrap-then-evaluate flows reuse identical outputs

mod cache;
mod command;
mod output;
mod traits;

pub use cache::CachedModule;
pub use command::CommandModule;
pub use output::ModelOutput;
pub use traits::{InvocationError, ModuleConfig, ReviewModule};
