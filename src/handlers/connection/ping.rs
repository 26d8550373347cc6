//! PING and PONG handlers.

use async_trait::async_trait;
use lantern_proto::{Message, Response};

use crate::handlers::{Context, Handler, HandlerResult};

pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(token) = msg.arg(0) else {
            ctx.reply(Response::ERR_NOORIGIN, Vec::new());
            return Ok(());
        };
        let server = ctx.server_name().to_string();
        ctx.send(Message::new("PONG", vec![server.clone(), token.to_string()]).with_prefix(server));
        Ok(())
    }
}

pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.arg(0).is_none() {
            ctx.reply(Response::ERR_NOORIGIN, Vec::new());
            return Ok(());
        }
        ctx.session.record_pong();
        Ok(())
    }
}
