//! Operator commands: OPER, KILL, DIE, RESTART and REHASH.

use async_trait::async_trait;
use lantern_proto::{Message, Response};
use tracing::{info, warn};

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, from_user};
use crate::security::password::verify_secret;
use crate::state::{RehashDomain, ShutdownKind};

/// Why an OPER attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperFailure {
    UnknownName,
    HostMismatch,
    TlsRequired,
    BadPassword,
}

impl OperFailure {
    fn describe(self) -> &'static str {
        match self {
            Self::UnknownName => "unknown oper name",
            Self::HostMismatch => "host mismatch",
            Self::TlsRequired => "TLS required",
            Self::BadPassword => "bad password",
        }
    }

    fn numeric(self) -> Response {
        match self {
            Self::HostMismatch | Self::TlsRequired => Response::ERR_NOOPERHOST,
            Self::UnknownName | Self::BadPassword => Response::ERR_PASSWDMISMATCH,
        }
    }
}

/// `OPER <name> <password>`
///
/// Every attempt produces exactly one server notice, sent once the outcome
/// is known.
pub struct OperHandler;

#[async_trait]
impl Handler for OperHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (Some(name), Some(password)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let user = ctx.user()?;
        let config = ctx.server.config();

        let verdict = match config.oper_block(name) {
            None => Err(OperFailure::UnknownName),
            Some(block) if !block.allows_host(&user.real_mask()) => Err(OperFailure::HostMismatch),
            Some(block) if block.require_tls && !ctx.session.tls => Err(OperFailure::TlsRequired),
            Some(block) if !block.verify_password(password) => Err(OperFailure::BadPassword),
            Some(block) => Ok(block),
        };

        let block = match verdict {
            Ok(block) => block,
            Err(failure) => {
                ctx.session.failed_oper_attempts += 1;
                ctx.reply(failure.numeric(), vec![]);
                ctx.server.notify_opers(&format!(
                    "Failed OPER attempt by {} ({}) using name {}: {}",
                    user.nick,
                    user.real_mask(),
                    name,
                    failure.describe()
                ));
                warn!(
                    nick = %user.nick,
                    oper_name = %name,
                    reason = failure.describe(),
                    attempts = ctx.session.failed_oper_attempts,
                    "OPER failed"
                );
                return Ok(());
            }
        };

        let admin = block.admin;
        ctx.server.directory.update_user(ctx.uid, |u| {
            u.modes.oper = true;
            u.modes.admin = admin;
            u.modes.server_notices = true;
        });
        let modes = if admin { "+aos" } else { "+os" };
        ctx.send(from_user(&user, "MODE", vec![user.nick.clone(), modes.to_string()]));
        ctx.reply(Response::RPL_YOUREOPER, vec![]);
        ctx.server.notify_opers(&format!(
            "{} ({}) is now an operator{}",
            user.nick,
            user.real_mask(),
            if admin { " with admin rights" } else { "" }
        ));
        info!(nick = %user.nick, oper_name = %name, admin, "OPER succeeded");
        Ok(())
    }
}

/// `KILL <nick> [:reason]`
pub struct KillHandler;

#[async_trait]
impl Handler for KillHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let oper = ctx.require_oper()?;
        let victim = ctx
            .server
            .directory
            .find_user_by_nick(target)
            .ok_or_else(|| HandlerError::NoSuchNick(target.to_string()))?;
        let reason = msg.arg(1).unwrap_or("No reason given");

        victim.send(from_user(
            &oper,
            "KILL",
            vec![victim.nick.clone(), reason.to_string()],
        ));
        victim.close(format!("Killed ({} ({}))", oper.nick, reason));
        ctx.server.notify_opers(&format!(
            "Received KILL message for {} from {}: {}",
            victim.nick, oper.nick, reason
        ));
        info!(oper = %oper.nick, target = %victim.nick, %reason, "KILL");
        Ok(())
    }
}

/// Shared body of DIE and RESTART: operator status plus the admin secret.
fn server_control(ctx: &Context<'_>, msg: &Message, kind: ShutdownKind) -> HandlerResult {
    let secret = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let oper = ctx.require_oper()?;
    let config = ctx.server.config();
    // Without a configured secret both commands are disabled.
    let Some(hash) = config.server.admin_secret.as_deref() else {
        return Err(HandlerError::NoPrivileges);
    };
    if !verify_secret(secret, hash) {
        ctx.server.notify_opers(&format!(
            "{} attempted {:?} with a bad secret",
            oper.nick, kind
        ));
        return Err(HandlerError::PasswdMismatch);
    }
    let reason = match kind {
        ShutdownKind::Die => format!("shutting down by request of {}", oper.nick),
        ShutdownKind::Restart => format!("restarting by request of {}", oper.nick),
    };
    ctx.server.shutdown(kind, &reason);
    Ok(())
}

/// `DIE <secret>`
pub struct DieHandler;

#[async_trait]
impl Handler for DieHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        server_control(ctx, msg, ShutdownKind::Die)
    }
}

/// `RESTART <secret>`
pub struct RestartHandler;

#[async_trait]
impl Handler for RestartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        server_control(ctx, msg, ShutdownKind::Restart)
    }
}

/// `REHASH [options|opers|motd|modules|bans]`
pub struct RehashHandler;

#[async_trait]
impl Handler for RehashHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let oper = ctx.require_oper()?;
        let domains = match msg.arg(0) {
            None => RehashDomain::ALL.to_vec(),
            Some(name) => match RehashDomain::from_name(name) {
                Some(domain) => vec![domain],
                None => {
                    ctx.notice(format!("*** Unknown rehash domain {name}"));
                    return Ok(());
                }
            },
        };

        let file = ctx
            .server
            .config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<built-in>".to_string());
        ctx.reply(Response::RPL_REHASHING, vec![file]);

        let report = ctx.server.rehash(&domains);
        for error in &report.errors {
            ctx.notice(format!("*** Rehash error: {error}"));
        }
        ctx.server.notify_opers(&format!(
            "{} is rehashing: reloaded [{}]{}",
            oper.nick,
            report.reloaded.join(", "),
            if report.errors.is_empty() {
                String::new()
            } else {
                format!(", {} error(s)", report.errors.len())
            }
        ));
        Ok(())
    }
}
