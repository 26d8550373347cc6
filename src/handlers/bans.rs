//! K/Q/Z-line management.
//!
//! `KLINE <ident@host> <hours> [:reason]`, `QLINE <nick> <hours> [:reason]`,
//! `ZLINE <ip> <hours> [:reason]` and the matching `UN*LINE <target>`.
//! Results go back as server notices; other operators get a `+s` notice.
//! New K- and Z-lines disconnect matching users who are not operators.

use async_trait::async_trait;
use lantern_proto::Message;
use tracing::info;

use crate::handlers::{Context, Handler, HandlerError, HandlerResult};
use crate::security::{ModerationKind, ModerationStore, parse_duration};
use crate::state::Server;

fn duration_text(hours: u32) -> String {
    match hours {
        0 => "permanent".to_string(),
        1 => "1 hour".to_string(),
        n => format!("{n} hours"),
    }
}

/// Close every non-operator connection the new record matches.
fn enforce(server: &Server, kind: ModerationKind, store: &ModerationStore, reason: &str) -> usize {
    let victims = server.directory.users_where(|u| {
        !u.modes.oper
            && match kind {
                ModerationKind::KLine => store.matches(&format!("{}@{}", u.ident, u.host)),
                ModerationKind::ZLine => store.matches(&u.ip.to_string()),
                ModerationKind::QLine => false,
            }
    });
    for victim in &victims {
        victim.close(format!("{}: {}", kind.name(), reason));
    }
    victims.len()
}

pub struct XlineHandler {
    kind: ModerationKind,
}

impl XlineHandler {
    pub fn new(kind: ModerationKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Handler for XlineHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let oper = ctx.require_oper()?;
        let (Some(target), Some(hours)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let reason = msg.arg(2).filter(|r| !r.is_empty()).unwrap_or("No reason given");
        let kind = self.kind;

        let hours = match parse_duration(hours) {
            Ok(hours) => hours,
            Err(e) => {
                ctx.notice(format!("*** Cannot add {}: {e}", kind.name()));
                return Ok(());
            }
        };

        let store = ctx.server.moderation.store(kind);
        match store.add(target, hours, &oper.nick, reason) {
            Ok(record) => {
                let summary = format!(
                    "{} for {} ({}): {}",
                    kind.name(),
                    record.target,
                    duration_text(record.duration_hours),
                    record.reason
                );
                ctx.notice(format!("*** Added {summary}"));
                ctx.server
                    .notify_opers(&format!("{} added {summary}", oper.nick));
                let removed = enforce(ctx.server, kind, store, reason);
                info!(
                    kind = kind.name(),
                    target = %record.target,
                    hours = record.duration_hours,
                    creator = %oper.nick,
                    disconnected = removed,
                    "Moderation record added"
                );
            }
            Err(e) => ctx.notice(format!("*** Cannot add {}: {e}", kind.name())),
        }
        Ok(())
    }
}

pub struct UnXlineHandler {
    kind: ModerationKind,
}

impl UnXlineHandler {
    pub fn new(kind: ModerationKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Handler for UnXlineHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let oper = ctx.require_oper()?;
        let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let kind = self.kind;

        match ctx.server.moderation.store(kind).remove(target) {
            Ok(true) => {
                ctx.notice(format!("*** Removed {} for {target}", kind.name()));
                ctx.server.notify_opers(&format!(
                    "{} removed {} for {target}",
                    oper.nick,
                    kind.name()
                ));
                info!(kind = kind.name(), %target, oper = %oper.nick, "Moderation record removed");
            }
            Ok(false) => ctx.notice(format!("*** No {} for {target}", kind.name())),
            Err(e) => ctx.notice(format!("*** Cannot remove {}: {e}", kind.name())),
        }
        Ok(())
    }
}
