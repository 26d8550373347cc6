use async_trait::async_trait;
use lantern_proto::Message;
use tracing::debug;

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, comma_list, from_user, truncate};

/// `PART <channel>{,<channel>} [:reason]`
pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let targets = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let user = ctx.user()?;
        let quitlen = ctx.server.config().limits.quitlen;
        let reason = msg.arg(1).map(|r| truncate(r, quitlen).to_string());

        for name in comma_list(targets) {
            match ctx.server.directory.part(ctx.uid, name) {
                Ok(leave) => {
                    let mut params = vec![leave.channel_name.clone()];
                    params.extend(reason.clone());
                    let part = from_user(&user, "PART", params);
                    for recipient in &leave.recipients {
                        recipient.send(part.clone());
                    }
                    debug!(
                        uid = %ctx.uid,
                        channel = %leave.channel_name,
                        destroyed = leave.destroyed,
                        "Left channel"
                    );
                }
                Err(e) => ctx.send(e.to_irc_reply(ctx.server_name(), &user.nick)),
            }
        }
        Ok(())
    }
}
