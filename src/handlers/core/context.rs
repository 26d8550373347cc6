//! Command handler context.
//!
//! A `Context` is built by the connection loop for every dispatched line.
//! It borrows the connection's session and outbound queue and the shared
//! server.

use lantern_proto::{Message, Response, reply};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::state::{Outbound, OutboundTx, Server, Session, User};

pub struct Context<'a> {
    /// The user's unique ID.
    pub uid: &'a str,
    pub server: &'a Arc<Server>,
    /// Connection-local state.
    pub session: &'a mut Session,
    /// This client's outbound queue.
    pub sender: &'a OutboundTx,
    pub remote_addr: SocketAddr,
}

impl<'a> Context<'a> {
    pub fn new(
        uid: &'a str,
        server: &'a Arc<Server>,
        session: &'a mut Session,
        sender: &'a OutboundTx,
        remote_addr: SocketAddr,
    ) -> Self {
        Self {
            uid,
            server,
            session,
            sender,
            remote_addr,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server.name
    }

    /// Current nick, or `*` before one is accepted.
    pub fn nick(&self) -> String {
        self.server
            .directory
            .with_user(self.uid, |u| u.nick.clone())
            .unwrap_or_else(|| "*".to_string())
    }

    /// Snapshot of this connection's user record.
    pub fn user(&self) -> Result<User, HandlerError> {
        self.server
            .directory
            .user(self.uid)
            .ok_or_else(|| HandlerError::Internal(format!("user {} missing", self.uid)))
    }

    pub fn send(&self, msg: Message) {
        let _ = self.sender.send(Outbound::Line(msg));
    }

    /// Send a numeric. The caller's nick is prepended to `args`.
    pub fn reply(&self, response: Response, args: Vec<String>) {
        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(self.nick());
        params.extend(args);
        self.send(reply(self.server_name(), response, params));
    }

    /// `:server NOTICE <nick> :<text>`.
    pub fn notice(&self, text: impl Into<String>) {
        self.send(self.server.notice(&self.nick(), text));
    }

    /// The user record, if the user holds `+o`.
    pub fn require_oper(&self) -> Result<User, HandlerError> {
        let user = self.user()?;
        if user.modes.oper {
            Ok(user)
        } else {
            Err(HandlerError::NoPrivileges)
        }
    }

    /// The user record, if the user holds `+a`.
    pub fn require_admin(&self) -> Result<User, HandlerError> {
        let user = self.require_oper()?;
        if user.modes.admin {
            Ok(user)
        } else {
            Err(HandlerError::NoPrivileges)
        }
    }
}
