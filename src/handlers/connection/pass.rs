//! PASS command handler.

use async_trait::async_trait;
use lantern_proto::Message;
use tracing::debug;

use crate::handlers::{Context, Handler, HandlerError, HandlerResult};
use crate::security::password::verify_secret;
use crate::state::{PassState, RegistrationState};

/// Records whether the connection password matched. The verdict is acted on
/// when registration completes. Only accepted before NICK and USER.
pub struct PassHandler;

#[async_trait]
impl Handler for PassHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if ctx.session.state != RegistrationState::Unregistered {
            return Err(HandlerError::AlreadyRegistered);
        }
        let password = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;

        ctx.session.pass = match &ctx.server.config().server.password {
            Some(hash) if verify_secret(password, hash) => PassState::Accepted,
            Some(_) => PassState::Rejected,
            None => PassState::Accepted,
        };
        debug!(uid = %ctx.uid, pass = ?ctx.session.pass, "PASS received");
        Ok(())
    }
}
