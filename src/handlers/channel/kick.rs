use async_trait::async_trait;
use lantern_proto::Message;
use tracing::info;

use crate::error::ChannelError;
use crate::handlers::{Context, Handler, HandlerError, HandlerResult, comma_list, from_user, truncate};

/// `KICK <channel> <nick>{,<nick>} [:reason]`
///
/// The reason defaults to the kicker's nick and is clipped to KICKLEN.
pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (Some(name), Some(targets)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let user = ctx.user()?;
        let kicklen = ctx.server.config().limits.kicklen;
        let reason = truncate(msg.arg(2).unwrap_or(&user.nick), kicklen).to_string();

        for target in comma_list(targets) {
            match ctx.server.directory.kick(ctx.uid, name, target) {
                Ok(outcome) => {
                    let kick = from_user(
                        &user,
                        "KICK",
                        vec![
                            outcome.leave.channel_name.clone(),
                            outcome.target.nick.clone(),
                            reason.clone(),
                        ],
                    );
                    for recipient in &outcome.leave.recipients {
                        recipient.send(kick.clone());
                    }
                    info!(
                        kicker = %user.nick,
                        target = %outcome.target.nick,
                        channel = %outcome.leave.channel_name,
                        "User kicked"
                    );
                }
                Err(e) => {
                    ctx.send(e.to_irc_reply(ctx.server_name(), &user.nick));
                    // A missing channel or missing privileges fails every target the same way.
                    if !matches!(
                        e,
                        ChannelError::NoSuchNick(_) | ChannelError::UserNotInChannel(..)
                    ) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
