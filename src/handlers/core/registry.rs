//! Command handler registry and dispatch.
//!
//! The handler map sits behind a `parking_lot::RwLock`: dispatch takes the
//! read side just long enough to clone the handler's `Arc`, so a module can
//! be unloaded while one of its commands is still running. Usage counters
//! live in a separate `DashMap` keyed by command name and outlive the
//! handler they count, which keeps `STATS m` stable across reloads.

use dashmap::DashMap;
use futures_util::FutureExt;
use lantern_proto::{Message, Response};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Instrument, Level, debug, error, span};

use super::context::Context;
use super::traits::Handler;
use crate::error::{HandlerError, HandlerResult};

#[derive(Debug, Default)]
struct CommandStats {
    invocations: AtomicU64,
    bytes: AtomicU64,
}

/// One row of `STATS m`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUsage {
    pub name: String,
    pub invocations: u64,
    pub bytes: u64,
}

/// Registry of command handlers.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    stats: DashMap<String, Arc<CommandStats>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the handler for `name`. Counters of an existing name
    /// are kept.
    pub fn register(&self, name: &str, handler: Arc<dyn Handler>) {
        let name = name.to_ascii_uppercase();
        self.stats.entry(name.clone()).or_default();
        self.handlers.write().insert(name, handler);
    }

    /// Remove the handler for `name`. Returns whether one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.handlers
            .write()
            .remove(&name.to_ascii_uppercase())
            .is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .read()
            .get(&name.to_ascii_uppercase())
            .cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers
            .read()
            .contains_key(&name.to_ascii_uppercase())
    }

    pub fn record_usage(&self, name: &str, byte_count: usize) {
        let stats = self
            .stats
            .entry(name.to_ascii_uppercase())
            .or_default()
            .clone();
        stats.invocations.fetch_add(1, Ordering::Relaxed);
        stats.bytes.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Usage for every name ever registered, sorted by name.
    pub fn command_stats(&self) -> Vec<CommandUsage> {
        let mut rows: Vec<CommandUsage> = self
            .stats
            .iter()
            .map(|entry| CommandUsage {
                name: entry.key().clone(),
                invocations: entry.value().invocations.load(Ordering::Relaxed),
                bytes: entry.value().bytes.load(Ordering::Relaxed),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Dispatch one parsed line.
    ///
    /// Handler errors become numeric replies here. Only `Quit` and
    /// `Disconnect` propagate, telling the connection loop to close. A
    /// panicking handler is logged and reported to the sender; the
    /// connection keeps running.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.command.as_str();
        let Some(handler) = self.lookup(name) else {
            ctx.reply(Response::ERR_UNKNOWNCOMMAND, vec![name.to_string()]);
            return Ok(());
        };

        self.record_usage(name, msg.payload_len());

        if handler.requires_registration() && !ctx.session.is_registered() {
            ctx.reply(Response::ERR_NOTREGISTERED, Vec::new());
            return Ok(());
        }

        let channel = msg
            .arg(0)
            .filter(|a| a.starts_with('#') || a.starts_with('&'));
        let irc_span = span!(
            Level::DEBUG,
            "irc.command",
            command = %name,
            uid = %ctx.uid,
            channel = channel,
            remote_addr = %ctx.remote_addr,
        );

        let outcome = AssertUnwindSafe(handler.handle(ctx, msg))
            .catch_unwind()
            .instrument(irc_span)
            .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ (HandlerError::Quit(_) | HandlerError::Disconnect(_)))) => Err(e),
            Ok(Err(e)) => {
                debug!(command = %name, error = %e, code = e.error_code(), "Command error");
                if let Some(reply) = e.to_irc_reply(ctx.server_name(), &ctx.nick(), name) {
                    ctx.send(reply);
                }
                Ok(())
            }
            Err(panic) => {
                error!(
                    command = %name,
                    uid = %ctx.uid,
                    panic = %panic_message(panic.as_ref()),
                    "Command handler panicked"
                );
                ctx.notice(format!("*** Internal error while processing {name}"));
                Ok(())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Nop;

    #[async_trait]
    impl Handler for Nop {
        async fn handle(&self, _ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
            Ok(())
        }
    }

    fn usage(registry: &Registry, name: &str) -> CommandUsage {
        registry
            .command_stats()
            .into_iter()
            .find(|u| u.name == name)
            .unwrap()
    }

    #[test]
    fn register_is_idempotent_and_keeps_counters() {
        let registry = Registry::new();
        registry.register("hello", Arc::new(Nop));
        registry.record_usage("HELLO", 10);
        registry.record_usage("hello", 5);

        registry.register("HELLO", Arc::new(Nop));
        registry.register("Hello", Arc::new(Nop));
        assert!(registry.lookup("hello").is_some());
        assert_eq!(
            usage(&registry, "HELLO"),
            CommandUsage {
                name: "HELLO".into(),
                invocations: 2,
                bytes: 15
            }
        );
    }

    #[test]
    fn unregister_removes_lookup_but_not_stats() {
        let registry = Registry::new();
        registry.register("X", Arc::new(Nop));
        registry.record_usage("X", 1);
        assert!(registry.unregister("x"));
        assert!(!registry.unregister("x"));
        assert!(registry.lookup("X").is_none());
        assert_eq!(usage(&registry, "X").invocations, 1);
    }

    #[test]
    fn new_names_start_at_zero() {
        let registry = Registry::new();
        registry.register("FRESH", Arc::new(Nop));
        assert_eq!(usage(&registry, "FRESH").invocations, 0);
    }

    #[test]
    fn panic_payloads_render() {
        let payload: Box<dyn Any + Send> = Box::new("BOOM");
        assert_eq!(panic_message(payload.as_ref()), "BOOM");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
