//! USER command handler.

use async_trait::async_trait;
use lantern_proto::Message;

use super::welcome::try_complete_registration;
use crate::handlers::{Context, Handler, HandlerError, HandlerResult, truncate};

pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        // USER <ident> <mode> <unused> :<realname>
        if ctx.session.state.has_user() {
            return Err(HandlerError::AlreadyRegistered);
        }
        if msg.params.len() < 4 || msg.params[0].is_empty() {
            return Err(HandlerError::NeedMoreParams);
        }

        let limits = ctx.server.config().limits.clone();
        let ident = truncate(&msg.params[0], limits.identlen);
        let realname = truncate(&msg.params[3], limits.gecoslen);
        ctx.server.directory.set_user_info(ctx.uid, ident, realname);

        ctx.session.state = ctx.session.state.after_user();
        try_complete_registration(ctx)
    }
}
