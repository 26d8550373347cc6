//! The closed set of command modules.
//!
//! Each module owns a fixed table of command handlers plus optional
//! load/unload hooks. Loading registers the table; unloading removes it.
//! `core` is loaded first and can never be unloaded.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::traits::Handler;
use crate::handlers::{
    admin::{ModListHandler, ModLoadHandler, ModReloadHandler, ModUnloadHandler},
    bans::{UnXlineHandler, XlineHandler},
    channel::{
        FjoinHandler, IjoinHandler, InviteHandler, JoinHandler, KickHandler, NamesHandler,
        PartHandler, TopicHandler,
    },
    connection::{
        CapHandler, NickHandler, PassHandler, PingHandler, PongHandler, QuitHandler, UserHandler,
    },
    messaging::{NoticeHandler, PrivmsgHandler},
    mode::ModeHandler,
    oper::{DieHandler, KillHandler, OperHandler, RehashHandler, RestartHandler},
    server_query::{MotdHandler, StatsHandler},
    user_query::{AwayHandler, WhoisHandler, WhowasHandler},
};
use crate::security::ModerationKind;
use crate::state::Server;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("unknown module {0}")]
    Unknown(String),
    #[error("module {0} is already loaded")]
    AlreadyLoaded(&'static str),
    #[error("module {0} is not loaded")]
    NotLoaded(&'static str),
    #[error("module {0} is permanent")]
    Permanent(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleId {
    Core,
    Channels,
    Messaging,
    Queries,
    Whowas,
    Operator,
    Moderation,
}

type HandlerTable = Vec<(&'static str, Arc<dyn Handler>)>;

fn entry(name: &'static str, handler: impl Handler + 'static) -> (&'static str, Arc<dyn Handler>) {
    (name, Arc::new(handler))
}

impl ModuleId {
    pub const ALL: [ModuleId; 7] = [
        Self::Core,
        Self::Channels,
        Self::Messaging,
        Self::Queries,
        Self::Whowas,
        Self::Operator,
        Self::Moderation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Channels => "channels",
            Self::Messaging => "messaging",
            Self::Queries => "queries",
            Self::Whowas => "whowas",
            Self::Operator => "operator",
            Self::Moderation => "moderation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub fn is_permanent(self) -> bool {
        self == Self::Core
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Core => "registration, keepalive and module control",
            Self::Channels => "channel membership, topics and modes",
            Self::Messaging => "PRIVMSG and NOTICE",
            Self::Queries => "WHOIS, AWAY, MOTD and STATS",
            Self::Whowas => "history of departed users",
            Self::Operator => "operator login and server control",
            Self::Moderation => "K/Q/Z-line management",
        }
    }

    fn handlers(self) -> HandlerTable {
        match self {
            Self::Core => vec![
                entry("NICK", NickHandler),
                entry("USER", UserHandler),
                entry("PASS", PassHandler),
                entry("CAP", CapHandler),
                entry("PING", PingHandler),
                entry("PONG", PongHandler),
                entry("QUIT", QuitHandler),
                entry("MODLOAD", ModLoadHandler),
                entry("MODUNLOAD", ModUnloadHandler),
                entry("MODRELOAD", ModReloadHandler),
                entry("MODLIST", ModListHandler),
            ],
            Self::Channels => vec![
                entry("JOIN", JoinHandler),
                entry("IJOIN", IjoinHandler),
                entry("FJOIN", FjoinHandler),
                entry("PART", PartHandler),
                entry("KICK", KickHandler),
                entry("TOPIC", TopicHandler),
                entry("NAMES", NamesHandler),
                entry("INVITE", InviteHandler),
                entry("MODE", ModeHandler),
            ],
            Self::Messaging => vec![
                entry("PRIVMSG", PrivmsgHandler),
                entry("NOTICE", NoticeHandler),
            ],
            Self::Queries => vec![
                entry("WHOIS", WhoisHandler),
                entry("AWAY", AwayHandler),
                entry("MOTD", MotdHandler),
                entry("STATS", StatsHandler),
            ],
            Self::Whowas => vec![entry("WHOWAS", WhowasHandler)],
            Self::Operator => vec![
                entry("OPER", OperHandler),
                entry("KILL", KillHandler),
                entry("DIE", DieHandler),
                entry("RESTART", RestartHandler),
                entry("REHASH", RehashHandler),
            ],
            Self::Moderation => {
                let mut table: HandlerTable = Vec::new();
                for kind in ModerationKind::ALL {
                    let (add, remove) = match kind {
                        ModerationKind::KLine => ("KLINE", "UNKLINE"),
                        ModerationKind::QLine => ("QLINE", "UNQLINE"),
                        ModerationKind::ZLine => ("ZLINE", "UNZLINE"),
                    };
                    table.push(entry(add, XlineHandler::new(kind)));
                    table.push(entry(remove, UnXlineHandler::new(kind)));
                }
                table
            }
        }
    }

    /// Command names this module registers.
    pub fn commands(self) -> Vec<&'static str> {
        self.handlers().into_iter().map(|(name, _)| name).collect()
    }

    fn on_load(self, server: &Server) {
        if self == Self::Whowas {
            server.whowas.set_enabled(true);
        }
    }

    fn on_unload(self, server: &Server) {
        if self == Self::Whowas {
            server.whowas.set_enabled(false);
        }
    }
}

/// Tracks which modules are loaded. Operations are serialized.
#[derive(Debug, Default)]
pub struct ModuleManager {
    loaded: Mutex<BTreeSet<ModuleId>>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, server: &Server, id: ModuleId) -> Result<(), ModuleError> {
        let mut loaded = self.loaded.lock();
        if loaded.contains(&id) {
            return Err(ModuleError::AlreadyLoaded(id.name()));
        }
        install(server, id);
        loaded.insert(id);
        info!(module = id.name(), "Module loaded");
        Ok(())
    }

    pub fn unload(&self, server: &Server, id: ModuleId) -> Result<(), ModuleError> {
        if id.is_permanent() {
            return Err(ModuleError::Permanent(id.name()));
        }
        let mut loaded = self.loaded.lock();
        if !loaded.remove(&id) {
            return Err(ModuleError::NotLoaded(id.name()));
        }
        uninstall(server, id);
        info!(module = id.name(), "Module unloaded");
        Ok(())
    }

    /// Teardown then init. Usage counters survive.
    pub fn reload(&self, server: &Server, id: ModuleId) -> Result<(), ModuleError> {
        let loaded = self.loaded.lock();
        if !loaded.contains(&id) {
            return Err(ModuleError::NotLoaded(id.name()));
        }
        uninstall(server, id);
        install(server, id);
        info!(module = id.name(), "Module reloaded");
        Ok(())
    }

    pub fn is_loaded(&self, id: ModuleId) -> bool {
        self.loaded.lock().contains(&id)
    }

    pub fn loaded(&self) -> Vec<ModuleId> {
        self.loaded.lock().iter().copied().collect()
    }

    /// Make the loaded set match `names` (plus `core`). Unknown names are
    /// reported and skipped.
    pub fn sync_with(&self, server: &Server, names: &[String]) -> Vec<ModuleError> {
        let mut errors = Vec::new();
        let mut wanted = BTreeSet::from([ModuleId::Core]);
        for name in names {
            match ModuleId::from_name(name) {
                Some(id) => {
                    wanted.insert(id);
                }
                None => errors.push(ModuleError::Unknown(name.clone())),
            }
        }
        for id in ModuleId::ALL {
            let result = match (self.is_loaded(id), wanted.contains(&id)) {
                (false, true) => self.load(server, id),
                (true, false) => self.unload(server, id),
                _ => Ok(()),
            };
            if let Err(e) = result {
                errors.push(e);
            }
        }
        errors
    }
}

fn install(server: &Server, id: ModuleId) {
    for (name, handler) in id.handlers() {
        server.registry.register(name, handler);
    }
    id.on_load(server);
}

fn uninstall(server: &Server, id: ModuleId) {
    id.on_unload(server);
    for name in id.commands() {
        server.registry.unregister(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn server() -> Arc<Server> {
        Server::new(Config::parse("[server]\nname = \"irc.lantern.test\"").unwrap(), None).unwrap()
    }

    #[test]
    fn names_round_trip_and_commands_are_disjoint() {
        let mut seen = BTreeSet::new();
        for id in ModuleId::ALL {
            assert_eq!(ModuleId::from_name(id.name()), Some(id));
            for cmd in id.commands() {
                assert!(seen.insert(cmd), "{cmd} registered twice");
            }
        }
        assert_eq!(ModuleId::from_name("CHANNELS"), Some(ModuleId::Channels));
        assert!(ModuleId::from_name("python").is_none());
    }

    #[test]
    fn unload_and_load_toggle_commands() {
        let server = server();
        server.modules.unload(&server, ModuleId::Messaging).unwrap();
        assert!(server.registry.lookup("PRIVMSG").is_none());
        assert_eq!(
            server.modules.unload(&server, ModuleId::Messaging),
            Err(ModuleError::NotLoaded("messaging"))
        );
        server.modules.load(&server, ModuleId::Messaging).unwrap();
        assert!(server.registry.lookup("PRIVMSG").is_some());
        assert_eq!(
            server.modules.load(&server, ModuleId::Messaging),
            Err(ModuleError::AlreadyLoaded("messaging"))
        );
    }

    #[test]
    fn core_is_permanent() {
        let server = server();
        assert_eq!(
            server.modules.unload(&server, ModuleId::Core),
            Err(ModuleError::Permanent("core"))
        );
        assert!(server.registry.lookup("NICK").is_some());
    }

    #[test]
    fn whowas_hooks_toggle_capture() {
        let server = server();
        assert!(server.whowas.is_enabled());
        server.modules.unload(&server, ModuleId::Whowas).unwrap();
        assert!(!server.whowas.is_enabled());
        server.modules.reload(&server, ModuleId::Queries).unwrap();
        assert!(server.registry.lookup("WHOIS").is_some());
    }

    #[test]
    fn sync_with_unloads_missing_modules() {
        let server = server();
        let errors = server
            .modules
            .sync_with(&server, &["channels".to_string(), "bogus".to_string()]);
        assert_eq!(errors, vec![ModuleError::Unknown("bogus".into())]);
        assert_eq!(
            server.modules.loaded(),
            vec![ModuleId::Core, ModuleId::Channels]
        );
    }
}
