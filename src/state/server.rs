//! The `Server` value shared by every connection.
//!
//! Built once at startup and passed around as `Arc<Server>`. It owns the
//! directory, the command registry and module set, the moderation stores,
//! WHOWAS history and the current configuration snapshot.

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use lantern_proto::Message;
use parking_lot::RwLock;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::directory::Directory;
use super::uid::{Uid, UidGenerator};
use super::user::User;
use super::whowas::WhowasHistory;
use crate::config::{Config, ModerationConfig};
use crate::handlers::{ModuleError, ModuleId, ModuleManager, Registry};
use crate::security::cloaking::cloak_ip;
use crate::security::{
    JsonLinesFile, Moderation, ModerationKind, ModerationStore, PersistError,
};

/// How the process should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    Die,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shutdown {
    pub kind: ShutdownKind,
    pub reason: String,
}

/// Configuration domains REHASH can reload independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehashDomain {
    Options,
    Opers,
    Motd,
    Modules,
    Bans,
}

impl RehashDomain {
    pub const ALL: [RehashDomain; 5] = [
        Self::Options,
        Self::Opers,
        Self::Motd,
        Self::Modules,
        Self::Bans,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Options => "options",
            Self::Opers => "opers",
            Self::Motd => "motd",
            Self::Modules => "modules",
            Self::Bans => "bans",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }
}

/// What a REHASH did. Failed domains keep their previous state.
#[derive(Debug, Default)]
pub struct RehashReport {
    pub reloaded: Vec<&'static str>,
    pub errors: Vec<String>,
}

pub struct Server {
    /// Fixed for the life of the process; REHASH never renames the server.
    pub name: String,
    config: RwLock<Arc<Config>>,
    config_path: Option<PathBuf>,
    motd: RwLock<Option<Vec<String>>>,
    pub directory: Directory,
    pub registry: Registry,
    pub modules: ModuleManager,
    pub moderation: Moderation,
    pub whowas: WhowasHistory,
    uids: UidGenerator,
    pub started_at: DateTime<Utc>,
    shutdown: watch::Sender<Option<Shutdown>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("users", &self.directory.user_count())
            .field("channels", &self.directory.channel_count())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Build the server and load the configured modules.
    ///
    /// A moderation file that exists but cannot be parsed is fatal here.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> anyhow::Result<Arc<Self>> {
        let moderation =
            open_moderation(&config.moderation).context("failed to load moderation lists")?;
        let motd = match config.motd.load_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "MOTD file unreadable, continuing without MOTD");
                None
            }
        };
        let (shutdown, _) = watch::channel(None);

        let server = Arc::new(Self {
            name: config.server.name.clone(),
            uids: UidGenerator::new(config.server.sid.clone()),
            whowas: WhowasHistory::new(config.limits.whowas_size),
            config: RwLock::new(Arc::new(config)),
            config_path,
            motd: RwLock::new(motd),
            directory: Directory::new(),
            registry: Registry::new(),
            modules: ModuleManager::new(),
            moderation,
            started_at: Utc::now(),
            shutdown,
        });

        server.modules.load(&server, ModuleId::Core)?;
        let autoload = server.config().modules.autoload.clone();
        for name in &autoload {
            let id = ModuleId::from_name(name).ok_or_else(|| ModuleError::Unknown(name.clone()))?;
            if id != ModuleId::Core {
                server.modules.load(&server, id)?;
            }
        }
        info!(
            server = %server.name,
            modules = ?server.modules.loaded().iter().map(|m| m.name()).collect::<Vec<_>>(),
            "Server state initialized"
        );
        Ok(server)
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config.read().clone()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn motd(&self) -> Option<Vec<String>> {
        self.motd.read().clone()
    }

    pub fn next_uid(&self) -> Uid {
        self.uids.next()
    }

    /// Host shown to other users for a client connecting from `ip`.
    pub fn visible_host(&self, ip: IpAddr) -> String {
        match &self.config().server.cloak_secret {
            Some(secret) => cloak_ip(&ip, secret),
            None => ip.to_string(),
        }
    }

    /// `:server NOTICE <nick> :<text>`.
    pub fn notice(&self, nick: &str, text: impl Into<String>) -> Message {
        Message::new("NOTICE", vec![nick.to_string(), text.into()]).with_prefix(&self.name)
    }

    /// Send a server notice to every operator with `+s`.
    pub fn notify_opers(&self, text: &str) {
        let recipients = self
            .directory
            .users_where(|u| u.modes.oper && u.modes.server_notices);
        for oper in recipients {
            oper.send(self.notice(&oper.nick, format!("*** Notice -- {text}")));
        }
    }

    /// Remove a user from the directory, tell their channel peers, and keep a
    /// WHOWAS snapshot. Returns the departed user, if they were still present.
    pub fn disconnect(&self, uid: &str, reason: &str) -> Option<User> {
        let departure = self.directory.remove_user_globally(uid)?;
        if departure.user.registered {
            let quit = Message::new("QUIT", vec![reason.to_string()])
                .with_prefix(departure.user.mask());
            for peer in &departure.peers {
                peer.send(quit.clone());
            }
            self.whowas.record(&departure.user);
        }
        for name in &departure.destroyed {
            tracing::debug!(channel = %name, "Channel destroyed");
        }
        Some(departure.user)
    }

    /// Reload the named domains from disk.
    pub fn rehash(self: &Arc<Self>, domains: &[RehashDomain]) -> RehashReport {
        let mut report = RehashReport::default();
        let wants_file = domains.iter().any(|d| *d != RehashDomain::Bans);

        let fresh = if wants_file {
            match &self.config_path {
                Some(path) => match Config::load(path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        report.errors.push(format!("config: {e}"));
                        None
                    }
                },
                None => {
                    report.errors.push("config: no configuration file".into());
                    None
                }
            }
        } else {
            None
        };

        if let Some(fresh) = fresh {
            let mut next = (*self.config()).clone();
            for domain in domains {
                match domain {
                    RehashDomain::Options => {
                        // Identity stays fixed.
                        let server = next.server.clone();
                        next.limits = fresh.limits.clone();
                        next.keepalive = fresh.keepalive.clone();
                        next.logging = fresh.logging.clone();
                        next.server = crate::config::ServerConfig {
                            name: server.name,
                            sid: server.sid,
                            ..fresh.server.clone()
                        };
                        report.reloaded.push(domain.name());
                    }
                    RehashDomain::Opers => {
                        next.oper = fresh.oper.clone();
                        report.reloaded.push(domain.name());
                    }
                    RehashDomain::Motd => match fresh.motd.load_lines() {
                        Ok(lines) => {
                            next.motd = fresh.motd.clone();
                            *self.motd.write() = lines;
                            report.reloaded.push(domain.name());
                        }
                        Err(e) => report.errors.push(format!("motd: {e}")),
                    },
                    RehashDomain::Modules => {
                        next.modules = fresh.modules.clone();
                        let errors = self.modules.sync_with(self, &next.modules.autoload);
                        if errors.is_empty() {
                            report.reloaded.push(domain.name());
                        }
                        report
                            .errors
                            .extend(errors.into_iter().map(|e| format!("modules: {e}")));
                    }
                    RehashDomain::Bans => {}
                }
            }
            *self.config.write() = Arc::new(next);
        }

        if domains.contains(&RehashDomain::Bans) {
            let mut ok = true;
            for kind in ModerationKind::ALL {
                if let Err(e) = self.moderation.store(kind).reload() {
                    ok = false;
                    report.errors.push(format!("{}: {e}", kind.name()));
                }
            }
            if ok {
                report.reloaded.push(RehashDomain::Bans.name());
            }
        }

        info!(reloaded = ?report.reloaded, errors = report.errors.len(), "Rehash complete");
        report
    }

    /// Notify every client and ask all tasks to stop.
    pub fn shutdown(&self, kind: ShutdownKind, reason: &str) {
        let users = self.directory.users_where(|_| true);
        for user in &users {
            user.send(self.notice(&user.nick, format!("*** Server {reason}")));
        }
        info!(?kind, %reason, users = users.len(), "Shutdown requested");
        self.shutdown.send_replace(Some(Shutdown {
            kind,
            reason: reason.to_string(),
        }));
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<Option<Shutdown>> {
        self.shutdown.subscribe()
    }
}

fn open_store(
    kind: ModerationKind,
    path: Option<&PathBuf>,
) -> Result<ModerationStore, PersistError> {
    match path {
        Some(path) => ModerationStore::with_persist(kind, Arc::new(JsonLinesFile::new(path, kind))),
        None => Ok(ModerationStore::new(kind)),
    }
}

fn open_moderation(config: &ModerationConfig) -> Result<Moderation, PersistError> {
    Ok(Moderation {
        klines: open_store(ModerationKind::KLine, config.kline_file.as_ref())?,
        qlines: open_store(ModerationKind::QLine, config.qline_file.as_ref())?,
        zlines: open_store(ModerationKind::ZLine, config.zline_file.as_ref())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(extra: &str) -> Config {
        Config::parse(&format!("[server]\nname = \"irc.lantern.test\"\n{extra}")).unwrap()
    }

    #[test]
    fn loads_all_modules_by_default() {
        let server = Server::new(config(""), None).unwrap();
        assert_eq!(server.modules.loaded().len(), ModuleId::ALL.len());
        assert!(server.registry.lookup("PRIVMSG").is_some());
        assert!(server.whowas.is_enabled());
    }

    #[test]
    fn autoload_subset() {
        let server = Server::new(config("[modules]\nautoload = [\"channels\"]"), None).unwrap();
        assert!(server.registry.lookup("NICK").is_some());
        assert!(server.registry.lookup("JOIN").is_some());
        assert!(server.registry.lookup("PRIVMSG").is_none());
        assert!(!server.whowas.is_enabled());
    }

    #[test]
    fn corrupt_moderation_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("klines.jsonl");
        std::fs::write(&path, "{broken\n").unwrap();
        let cfg = config(&format!("[moderation]\nkline_file = {:?}", path.display().to_string()));
        assert!(Server::new(cfg, None).is_err());
    }

    #[test]
    fn rehash_motd_and_failed_reload_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanternd.toml");
        let write = |body: &str| {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(body.as_bytes()).unwrap();
        };
        write("[server]\nname = \"irc.lantern.test\"\n[motd]\nlines = [\"one\"]\n");
        let server = Server::new(Config::load(&path).unwrap(), Some(path.clone())).unwrap();
        assert_eq!(server.motd(), Some(vec!["one".to_string()]));

        write("[server]\nname = \"irc.lantern.test\"\n[motd]\nlines = [\"two\"]\n");
        let report = server.rehash(&[RehashDomain::Motd]);
        assert_eq!(report.reloaded, vec!["motd"]);
        assert_eq!(server.motd(), Some(vec!["two".to_string()]));

        write("not toml [");
        let report = server.rehash(&RehashDomain::ALL);
        assert!(!report.errors.is_empty());
        assert_eq!(server.motd(), Some(vec!["two".to_string()]));
    }

    #[test]
    fn rehash_domain_names() {
        assert_eq!(RehashDomain::from_name("OPERS"), Some(RehashDomain::Opers));
        assert_eq!(RehashDomain::from_name("bans"), Some(RehashDomain::Bans));
        assert!(RehashDomain::from_name("links").is_none());
    }
}
