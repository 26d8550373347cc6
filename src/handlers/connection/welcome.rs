//! Registration completion and the welcome burst.

use lantern_proto::Response;
use tracing::info;

use crate::handlers::server_query::send_motd;
use crate::handlers::{Context, HandlerError, HandlerResult};
use crate::state::{PassState, RegistrationState};

pub const VERSION: &str = concat!("lanternd-", env!("CARGO_PKG_VERSION"));
const USER_MODES: &str = "aioprswS";
const CHANNEL_MODES: &str = "biklmnopstvP";

/// Complete registration if NICK and USER are both in and nothing holds it
/// back. Sends 001-005 and the MOTD exactly once.
///
/// When a server password is configured and the client did not present a
/// matching PASS, replies `ERR_PASSWDMISMATCH` and closes the connection.
/// A K-line on `ident@host` closes it with `ERR_YOUREBANNEDCREEP`.
pub fn try_complete_registration(ctx: &mut Context<'_>) -> HandlerResult {
    let state = ctx.session.state;
    if state == RegistrationState::Registered || !state.has_nick() || !state.has_user() {
        return Ok(());
    }
    if ctx.session.cap_negotiating {
        ctx.session.state = RegistrationState::BothSet;
        return Ok(());
    }

    let config = ctx.server.config();
    if config.server.password.is_some() && ctx.session.pass != PassState::Accepted {
        ctx.reply(Response::ERR_PASSWDMISMATCH, Vec::new());
        return Err(HandlerError::Disconnect("Bad password".into()));
    }

    // Admission only knew the address; now the ident is in as well.
    let candidate = ctx.user()?;
    if let Some(ban) = ctx
        .server
        .moderation
        .klines
        .find_match(&format!("{}@{}", candidate.ident, candidate.host))
    {
        ctx.reply(
            Response::ERR_YOUREBANNEDCREEP,
            vec![format!("You are banned from this server: {}", ban.reason)],
        );
        return Err(HandlerError::Disconnect(format!("K-line: {}", ban.reason)));
    }

    ctx.session.state = RegistrationState::Registered;
    ctx.server.directory.mark_registered(ctx.uid);
    let user = ctx.user()?;
    let server = ctx.server_name().to_string();
    let limits = &config.limits;

    ctx.reply(
        Response::RPL_WELCOME,
        vec![format!(
            "Welcome to the {} Internet Relay Network {}",
            config.server.network,
            user.mask()
        )],
    );
    ctx.reply(
        Response::RPL_YOURHOST,
        vec![format!("Your host is {server}, running version {VERSION}")],
    );
    ctx.reply(
        Response::RPL_CREATED,
        vec![format!(
            "This server was created {}",
            ctx.server.started_at.format("%a %b %d %Y at %H:%M:%S UTC")
        )],
    );
    ctx.reply(
        Response::RPL_MYINFO,
        vec![
            server.clone(),
            VERSION.to_string(),
            USER_MODES.to_string(),
            CHANNEL_MODES.to_string(),
        ],
    );

    let mut isupport = vec![
        format!("NETWORK={}", config.server.network),
        "CASEMAPPING=rfc1459".to_string(),
        "CHANTYPES=#&".to_string(),
        "PREFIX=(ov)@+".to_string(),
        "CHANMODES=b,k,l,imnpstP".to_string(),
        format!("CHANLIMIT=#&:{}", limits.max_channels),
        format!("NICKLEN={}", limits.nicklen),
        "CHANNELLEN=50".to_string(),
        format!("TOPICLEN={}", limits.topiclen),
        format!("KICKLEN={}", limits.kicklen),
        format!("AWAYLEN={}", limits.awaylen),
    ];
    isupport.push("are supported by this server".to_string());
    ctx.reply(Response::RPL_ISUPPORT, isupport);

    send_motd(ctx);

    info!(
        uid = %ctx.uid,
        nick = %user.nick,
        ident = %user.ident,
        host = %user.host,
        tls = ctx.session.tls,
        "Client registered"
    );
    Ok(())
}
