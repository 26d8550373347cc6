//! QUIT command handler.

use async_trait::async_trait;
use lantern_proto::Message;

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, truncate};

pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let quitlen = ctx.server.config().limits.quitlen;
        let reason = msg
            .arg(0)
            .filter(|r| !r.is_empty())
            .map(|r| truncate(r, quitlen).to_string());
        Err(HandlerError::Quit(reason))
    }
}
