//! PRIVMSG and NOTICE.
//!
//! Both route to channels and users the same way. NOTICE never generates
//! an error reply and never triggers `RPL_AWAY`.

use async_trait::async_trait;
use chrono::Utc;
use lantern_proto::{Message, Response};
use tracing::trace;

use crate::handlers::{
    Context, Handler, HandlerError, HandlerResult, comma_list, from_user, is_channel_target,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Privmsg,
    Notice,
}

impl Kind {
    fn command(self) -> &'static str {
        match self {
            Kind::Privmsg => "PRIVMSG",
            Kind::Notice => "NOTICE",
        }
    }

    fn quiet(self) -> bool {
        self == Kind::Notice
    }
}

fn route(ctx: &mut Context<'_>, msg: &Message, kind: Kind) -> HandlerResult {
    let Some(targets) = msg.arg(0).filter(|t| !t.is_empty()) else {
        return if kind.quiet() {
            Ok(())
        } else {
            Err(HandlerError::NoRecipient)
        };
    };
    let Some(text) = msg.arg(1).filter(|t| !t.is_empty()) else {
        return if kind.quiet() {
            Ok(())
        } else {
            Err(HandlerError::NoTextToSend)
        };
    };

    let sender = ctx.user()?;
    if kind == Kind::Privmsg {
        ctx.server
            .directory
            .update_user(ctx.uid, |u| u.last_activity = Utc::now());
    }

    for target in comma_list(targets) {
        if is_channel_target(target) {
            match ctx.server.directory.can_send(ctx.uid, target) {
                Ok(channel) => {
                    let out = from_user(
                        &sender,
                        kind.command(),
                        vec![channel.name.clone(), text.to_string()],
                    );
                    let delivered = ctx.server.directory.broadcast(&channel.name, |member| {
                        (member.uid != sender.uid).then(|| out.clone())
                    });
                    trace!(channel = %channel.name, delivered, "Channel message routed");
                }
                Err(e) if !kind.quiet() => {
                    ctx.send(e.to_irc_reply(ctx.server_name(), &sender.nick));
                }
                Err(_) => {}
            }
            continue;
        }

        let Some(recipient) = ctx.server.directory.find_user_by_nick(target) else {
            if !kind.quiet() {
                ctx.reply(Response::ERR_NOSUCHNICK, vec![target.to_string()]);
            }
            continue;
        };
        recipient.send(from_user(
            &sender,
            kind.command(),
            vec![recipient.nick.clone(), text.to_string()],
        ));
        if !kind.quiet()
            && let Some(away) = &recipient.away
        {
            ctx.reply(Response::RPL_AWAY, vec![recipient.nick.clone(), away.clone()]);
        }
    }
    Ok(())
}

pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        route(ctx, msg, Kind::Privmsg)
    }
}

pub struct NoticeHandler;

#[async_trait]
impl Handler for NoticeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        route(ctx, msg, Kind::Notice)
    }
}
