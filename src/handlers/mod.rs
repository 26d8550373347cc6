//! IRC command handlers.
//!
//! Handlers are grouped into the modules of [`ModuleId`]; the
//! [`Registry`] maps command names to the handlers of loaded modules and
//! dispatches parsed lines to them.

mod admin;
mod bans;
mod channel;
mod connection;
pub mod core;
mod helpers;
mod messaging;
mod mode;
mod oper;
mod server_query;
mod user_query;

pub use self::core::{
    CommandUsage, Context, Handler, ModuleError, ModuleId, ModuleManager, Registry,
};
pub use crate::error::{HandlerError, HandlerResult};
pub use helpers::{comma_list, from_user, is_channel_target, truncate};
pub use mode::{ModeChange, Sign, parse_mode_string};
