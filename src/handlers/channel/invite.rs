use async_trait::async_trait;
use lantern_proto::{Message, Response};

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, from_user};

/// `INVITE <nick> <channel>`
pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (Some(target), Some(name)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let user = ctx.user()?;
        let invited = ctx.server.directory.invite(ctx.uid, target, name)?;
        let channel_name = ctx
            .server
            .directory
            .find_channel(name)
            .map(|c| c.name)
            .unwrap_or_else(|| name.to_string());

        ctx.reply(
            Response::RPL_INVITING,
            vec![invited.nick.clone(), channel_name.clone()],
        );
        if let Some(away) = &invited.away {
            ctx.reply(Response::RPL_AWAY, vec![invited.nick.clone(), away.clone()]);
        }
        invited.send(from_user(&user, "INVITE", vec![invited.nick.clone(), channel_name]));
        Ok(())
    }
}
