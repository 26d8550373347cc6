//! Module control: MODLOAD, MODUNLOAD, MODRELOAD and MODLIST.
//!
//! All four are operator-only. Failures come back as server notices and
//! leave the loaded set untouched.

use async_trait::async_trait;
use lantern_proto::{Message, Response};
use tracing::info;

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, ModuleError, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Load,
    Unload,
    Reload,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Load => "loaded",
            Action::Unload => "unloaded",
            Action::Reload => "reloaded",
        }
    }
}

fn module_command(ctx: &mut Context<'_>, msg: &Message, action: Action) -> HandlerResult {
    let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
    let oper = ctx.require_oper()?;
    let server = ctx.server;

    let result = ModuleId::from_name(name)
        .ok_or_else(|| ModuleError::Unknown(name.to_string()))
        .and_then(|id| {
            match action {
                Action::Load => server.modules.load(server, id),
                Action::Unload => server.modules.unload(server, id),
                Action::Reload => server.modules.reload(server, id),
            }
            .map(|()| id)
        });

    match result {
        Ok(id) => {
            ctx.notice(format!("*** Module {} {}", id.name(), action.verb()));
            server.notify_opers(&format!(
                "{} {} module {}",
                oper.nick,
                action.verb(),
                id.name()
            ));
            info!(oper = %oper.nick, module = id.name(), action = action.verb(), "Module command");
        }
        Err(e) => ctx.notice(format!("*** Module error: {e}")),
    }
    Ok(())
}

/// `MODLOAD <module>`
pub struct ModLoadHandler;

#[async_trait]
impl Handler for ModLoadHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        module_command(ctx, msg, Action::Load)
    }
}

/// `MODUNLOAD <module>`
pub struct ModUnloadHandler;

#[async_trait]
impl Handler for ModUnloadHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        module_command(ctx, msg, Action::Unload)
    }
}

/// `MODRELOAD <module>`
pub struct ModReloadHandler;

#[async_trait]
impl Handler for ModReloadHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        module_command(ctx, msg, Action::Reload)
    }
}

/// `MODLIST`: one 702 per loaded module, then 703.
pub struct ModListHandler;

#[async_trait]
impl Handler for ModListHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        ctx.require_oper()?;
        for id in ctx.server.modules.loaded() {
            ctx.reply(
                Response::RPL_MODLIST,
                vec![id.name().to_string(), id.description().to_string()],
            );
        }
        ctx.reply(Response::RPL_ENDOFMODLIST, vec![]);
        Ok(())
    }
}
