//! Server query handlers: MOTD and STATS.

use async_trait::async_trait;
use chrono::Utc;
use lantern_proto::{Message, Response};

use crate::handlers::{Context, Handler, HandlerError, HandlerResult};
use crate::security::ModerationKind;

/// Send the MOTD (375/372/376) or `ERR_NOMOTD`.
pub(crate) fn send_motd(ctx: &Context<'_>) {
    let Some(lines) = ctx.server.motd() else {
        ctx.reply(Response::ERR_NOMOTD, Vec::new());
        return;
    };
    ctx.reply(
        Response::RPL_MOTDSTART,
        vec![format!("- {} Message of the Day -", ctx.server_name())],
    );
    for line in lines {
        ctx.reply(Response::RPL_MOTD, vec![format!("- {line}")]);
    }
    ctx.reply(Response::RPL_ENDOFMOTD, Vec::new());
}

pub struct MotdHandler;

#[async_trait]
impl Handler for MotdHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_motd(ctx);
        Ok(())
    }
}

/// `STATS <letter>`: m (command usage), k/q/z (moderation lists), u (uptime).
///
/// Moderation lists are operator-only.
pub struct StatsHandler;

#[async_trait]
impl Handler for StatsHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let letter = msg
            .arg(0)
            .and_then(|a| a.chars().next())
            .ok_or(HandlerError::NeedMoreParams)?;

        match letter {
            'm' | 'M' => {
                for usage in ctx.server.registry.command_stats() {
                    if usage.invocations == 0 {
                        continue;
                    }
                    ctx.reply(
                        Response::RPL_STATSCOMMANDS,
                        vec![
                            usage.name,
                            usage.invocations.to_string(),
                            usage.bytes.to_string(),
                        ],
                    );
                }
            }
            'k' | 'K' | 'q' | 'Q' | 'z' | 'Z' => {
                ctx.require_oper()?;
                let kind = match letter.to_ascii_lowercase() {
                    'k' => ModerationKind::KLine,
                    'q' => ModerationKind::QLine,
                    _ => ModerationKind::ZLine,
                };
                let numeric = match kind {
                    ModerationKind::KLine => Response::RPL_STATSKLINE,
                    ModerationKind::QLine => Response::RPL_STATSQLINE,
                    ModerationKind::ZLine => Response::RPL_STATSZLINE,
                };
                for record in ctx.server.moderation.store(kind).list() {
                    ctx.reply(
                        numeric,
                        vec![
                            kind.letter().to_ascii_uppercase().to_string(),
                            record.target,
                            record.duration_hours.to_string(),
                            record.creator,
                            record.reason,
                        ],
                    );
                }
            }
            'u' | 'U' => {
                let secs = (Utc::now() - ctx.server.started_at).num_seconds().max(0);
                ctx.reply(
                    Response::RPL_STATSUPTIME,
                    vec![format!(
                        "Server Up {} days {}:{:02}:{:02}",
                        secs / 86_400,
                        (secs % 86_400) / 3600,
                        (secs % 3600) / 60,
                        secs % 60
                    )],
                );
            }
            _ => {}
        }

        ctx.reply(Response::RPL_ENDOFSTATS, vec![letter.to_string()]);
        Ok(())
    }
}
