//! MODE command handler.
//!
//! - User modes: `MODE nick [+/-modes]`
//! - Channel modes: `MODE channel [+/-modes [args...]]`

mod channel;
mod parse;
mod user;

pub use parse::{ModeChange, Sign, parse_mode_string, render_changes};

use async_trait::async_trait;
use lantern_proto::Message;

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, is_channel_target};

pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let modes = msg.arg(1);
        if is_channel_target(target) {
            let args: Vec<&str> = msg.params.iter().skip(2).map(String::as_str).collect();
            channel::handle_channel_mode(ctx, target, modes, &args)
        } else {
            user::handle_user_mode(ctx, target, modes)
        }
    }
}
