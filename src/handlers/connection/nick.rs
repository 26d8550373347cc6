//! NICK command handler.

use async_trait::async_trait;
use lantern_proto::Message;
use tracing::{debug, info};

use super::welcome::try_complete_registration;
use crate::handlers::{Context, Handler, HandlerError, HandlerResult};
use crate::state::{NickError, is_valid_nick};

pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        // NICK <nickname>
        let nick = msg
            .arg(0)
            .filter(|n| !n.is_empty())
            .ok_or(HandlerError::NoNicknameGiven)?;

        let nicklen = ctx.server.config().limits.nicklen;
        if !is_valid_nick(nick, nicklen) {
            return Err(HandlerError::ErroneousNickname(nick.to_string()));
        }

        if !ctx.server.directory.is_operator(ctx.uid)
            && let Some(qline) = ctx.server.moderation.qlines.find_match(nick)
        {
            return Err(HandlerError::NickReserved {
                nick: nick.to_string(),
                reason: qline.reason,
            });
        }

        let change = ctx
            .server
            .directory
            .claim_nick(ctx.uid, nick)
            .map_err(|e| match e {
                NickError::InUse(n) => HandlerError::NicknameInUse(n),
                NickError::UnknownUser => HandlerError::Internal(e.to_string()),
            })?;

        if ctx.session.is_registered() {
            if change.changed {
                let announce =
                    Message::new("NICK", vec![nick.to_string()]).with_prefix(&change.old_mask);
                for peer in &change.peers {
                    peer.send(announce.clone());
                }
                ctx.send(announce);
                info!(uid = %ctx.uid, old = %change.old_mask, new = %nick, "Nick changed");
            }
            return Ok(());
        }

        debug!(uid = %ctx.uid, nick = %nick, "Nick set");
        ctx.session.state = ctx.session.state.after_nick();
        try_complete_registration(ctx)
    }
}
