//! Test server management.
//!
//! Runs a full `Server` + `Gateway` inside the test runtime on
//! `127.0.0.1:0`. The configuration file and moderation lists live in a
//! temporary directory that is removed when the server is dropped.

use lanternd::config::Config;
use lanternd::network::Gateway;
use lanternd::state::Server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Plaintext behind every secret in the test configuration.
pub const OPER_PASSWORD: &str = "test";

/// `sha256:` hash of [`OPER_PASSWORD`].
const TEST_HASH: &str = "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

/// A running in-process server.
pub struct TestServer {
    pub server: Arc<Server>,
    addr: SocketAddr,
    dir: TempDir,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Start a server with the default test configuration.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with("").await
    }

    /// Start a server with extra keys appended to the `[server]` table.
    pub async fn start_with(server_extra: &str) -> anyhow::Result<Self> {
        Self::start_with_sections(server_extra, "", "").await
    }

    /// Start a server with extra `[server]` and `[limits]` keys plus whole
    /// extra tables (for example `[keepalive]`) at the end of the file.
    pub async fn start_with_sections(
        server_extra: &str,
        limits_extra: &str,
        tables: &str,
    ) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("lanternd.toml");
        let moderation = |name: &str| dir.path().join(name).display().to_string();

        let text = format!(
            r#"[server]
name = "irc.lantern.test"
network = "TestNet"
sid = "00T"
admin_secret = "{TEST_HASH}"
{server_extra}

[listen]
address = "127.0.0.1:0"

[limits]
message_rate = 1000
message_burst = 1000
{limits_extra}

[moderation]
kline_file = {kline:?}
qline_file = {qline:?}
zline_file = {zline:?}

[[oper]]
name = "root"
password = "{TEST_HASH}"
admin = true

[[oper]]
name = "helper"
password = "{TEST_HASH}"
hostmask = "*@192.0.2.*"

{tables}
"#,
            kline = moderation("klines.jsonl"),
            qline = moderation("qlines.jsonl"),
            zline = moderation("zlines.jsonl"),
        );
        std::fs::write(&config_path, text)?;

        let config = Config::load(&config_path)?;
        let server = Server::new(config, Some(config_path))?;
        let gateway = Gateway::bind(Arc::clone(&server)).await?;
        let addr = gateway.local_addr()?;
        let task = tokio::spawn(gateway.run());

        Ok(Self {
            server,
            addr,
            dir,
            task,
        })
    }

    /// Get the server address for client connections.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Path of a file inside the server's temporary directory.
    #[allow(dead_code)]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Whether the accept loop has exited.
    #[allow(dead_code)]
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
