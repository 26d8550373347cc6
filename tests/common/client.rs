//! Test IRC client.
//!
//! Provides an IRC client for integration testing that can send raw lines
//! and assert on received responses.

use lantern_proto::Message;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test IRC client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    nick: String,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(address: SocketAddr, nick: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            nick: nick.to_string(),
        })
    }

    /// Connect and register in one step.
    #[allow(dead_code)]
    pub async fn registered(address: SocketAddr, nick: &str) -> anyhow::Result<Self> {
        let mut client = Self::connect(address, nick).await?;
        client.register().await?;
        Ok(client)
    }

    #[allow(dead_code)]
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Send a raw IRC line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Send bytes exactly as given, with no line ending added.
    #[allow(dead_code)]
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single message from the server.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a message with a timeout. EOF is an error.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Message::parse(line.trim_end()).ok_or_else(|| anyhow::anyhow!("unparseable line {line:?}"))
    }

    /// Receive messages until the predicate matches; the match is the last element.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = predicate(&msg);
            messages.push(msg);
            if done {
                return Ok(messages);
            }
        }
    }

    /// Receive until a message with the given command (or numeric) arrives.
    #[allow(dead_code)]
    pub async fn expect(&mut self, command: &str) -> anyhow::Result<Message> {
        let mut messages = self.recv_until(|m| m.command == command).await?;
        messages
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no {command} received"))
    }

    /// Collect everything that arrives within a short quiet period.
    #[allow(dead_code)]
    pub async fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.recv_timeout(Duration::from_millis(150)).await {
            messages.push(msg);
        }
        messages
    }

    /// Read until the server closes the connection, returning what came first.
    #[allow(dead_code)]
    pub async fn read_to_close(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        loop {
            let mut line = String::new();
            match timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await {
                Ok(Ok(n)) if n > 0 => {
                    if let Some(msg) = Message::parse(line.trim_end()) {
                        messages.push(msg);
                    }
                }
                _ => return messages,
            }
        }
    }

    /// Register with the server (NICK + USER) and wait for the end of the
    /// welcome burst (`376` or `422`).
    pub async fn register(&mut self) -> anyhow::Result<()> {
        let nick = self.nick.clone();
        self.send_raw(&format!("NICK {nick}")).await?;
        self.send_raw(&format!("USER {nick} 0 * :Test User {nick}")).await?;

        let messages = self
            .recv_until(|m| matches!(m.command.as_str(), "376" | "422" | "ERROR" | "433"))
            .await?;
        if messages.iter().any(|m| m.command == "001") {
            Ok(())
        } else {
            anyhow::bail!("registration failed: {messages:?}")
        }
    }

    /// Join a channel and wait for the end of NAMES.
    #[allow(dead_code)]
    pub async fn join(&mut self, channel: &str) -> anyhow::Result<Vec<Message>> {
        self.send_raw(&format!("JOIN {channel}")).await?;
        self.recv_until(|m| m.command == "366").await
    }

    #[allow(dead_code)]
    pub async fn privmsg(&mut self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("PRIVMSG {target} :{text}")).await
    }

    /// Become an operator through the `root` block.
    #[allow(dead_code)]
    pub async fn oper(&mut self) -> anyhow::Result<()> {
        self.send_raw(&format!("OPER root {}", super::OPER_PASSWORD))
            .await?;
        self.expect("381").await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn quit(&mut self, reason: Option<&str>) -> anyhow::Result<()> {
        match reason {
            Some(reason) => self.send_raw(&format!("QUIT :{reason}")).await,
            None => self.send_raw("QUIT").await,
        }
    }
}
