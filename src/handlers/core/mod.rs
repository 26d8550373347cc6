//! Core handler infrastructure: the per-command context, the handler trait,
//! the registry that dispatches to handlers, and the module catalog that
//! populates it.

pub mod context;
pub mod modules;
pub mod registry;
pub mod traits;

pub use context::Context;
pub use modules::{ModuleError, ModuleId, ModuleManager};
pub use registry::{CommandUsage, Registry};
pub use traits::Handler;
