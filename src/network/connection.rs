//! Connection - one client, one task.
//!
//! ```text
//!   FramedRead<LineCodec> ──▶ Registry::dispatch ──▶ outbound queue
//!            ▲                                           │
//!            └──────────── tokio::select! ◀──────────────┘
//!                 (+ PING timer, registration deadline, shutdown)
//! ```
//!
//! Lines from one client are dispatched strictly in arrival order. Replies
//! and messages from other users arrive through the outbound queue and are
//! written by this task only.

use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lantern_proto::{LineCodec, Message, Response, reply};
use nonzero_ext::nonzero;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, warn};

use crate::handlers::{Context, HandlerError};
use crate::state::{Outbound, Server, Session, User};

/// Rate-limited lines tolerated before the client is dropped.
const MAX_FLOOD_VIOLATIONS: u8 = 3;

/// Why the main loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Closing {
    /// Text for the `ERROR :Closing Link` line.
    error: String,
    /// QUIT text shown to peers.
    quit: String,
}

impl Closing {
    fn same(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            error: reason.clone(),
            quit: reason,
        }
    }
}

fn message_limiter(rate: u32, burst: u32) -> DefaultDirectRateLimiter {
    let rate = NonZeroU32::new(rate).unwrap_or(nonzero!(10u32));
    let burst = NonZeroU32::new(burst).unwrap_or(nonzero!(20u32));
    RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))
}

/// A client connection over any byte stream (plain TCP, TLS, or an
/// in-memory duplex in tests).
pub struct Connection<S> {
    uid: String,
    addr: SocketAddr,
    server: Arc<Server>,
    stream: S,
    tls: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(server: Arc<Server>, stream: S, addr: SocketAddr, tls: bool) -> Self {
        Self {
            uid: server.next_uid(),
            addr,
            server,
            stream,
            tls,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Admission check, then the read/write loop until the client leaves.
    #[instrument(skip(self), fields(uid = %self.uid, addr = %self.addr, tls = self.tls), name = "connection")]
    pub async fn run(self) -> anyhow::Result<()> {
        let Connection {
            uid,
            addr,
            server,
            mut stream,
            tls,
        } = self;
        let ip = addr.ip();
        let host = ip.to_string();
        let config = server.config();

        if let Some(ban) = server.moderation.check_admission("*", &host, &ip) {
            warn!(target = %ban.target, reason = %ban.reason, "Connection refused by moderation list");
            let mut writer = FramedWrite::new(&mut stream, LineCodec::new());
            writer
                .send(reply(
                    &server.name,
                    Response::ERR_YOUREBANNEDCREEP,
                    vec![
                        "*".to_string(),
                        format!("You are banned from this server: {}", ban.reason),
                    ],
                ))
                .await?;
            writer
                .send(closing_link(&host, "Banned"))
                .await?;
            return Ok(());
        }

        info!("Client connected");
        let (reader, writer) = tokio::io::split(stream);
        let mut reader = FramedRead::new(reader, LineCodec::with_ceiling(config.limits.line_ceiling));
        let mut writer = FramedWrite::new(writer, LineCodec::new());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let visible_host = server.visible_host(ip);
        server
            .directory
            .add_user(User::new(uid.clone(), ip, visible_host, tls, tx.clone()));

        let mut session = Session::new(tls);
        let limiter = message_limiter(config.limits.message_rate, config.limits.message_burst);
        let mut flood_violations: u8 = 0;

        let ping_every = Duration::from_secs(config.keepalive.ping_interval.max(1));
        let mut ping = interval_at(Instant::now() + ping_every, ping_every);
        let registration_deadline =
            tokio::time::sleep(Duration::from_secs(config.keepalive.registration_timeout));
        tokio::pin!(registration_deadline);
        let mut shutdown = server.subscribe_shutdown();

        let closing = loop {
            tokio::select! {
                line = reader.next() => {
                    let raw = match line {
                        Some(Ok(raw)) => raw,
                        Some(Err(e)) => {
                            warn!(error = %e, "Protocol error");
                            break Closing::same(e.close_reason());
                        }
                        None => break Closing::same("Connection closed"),
                    };
                    session.lines_in += 1;
                    session.bytes_in += raw.len() as u64 + 2;
                    // Any traffic proves the client is alive.
                    session.record_pong();

                    let Some(msg) = Message::parse(&raw) else {
                        continue;
                    };

                    if limiter.check().is_err() {
                        flood_violations += 1;
                        warn!(violations = flood_violations, "Rate limit exceeded");
                        if flood_violations >= MAX_FLOOD_VIOLATIONS {
                            break Closing::same("Excess Flood");
                        }
                        let nick = server
                            .directory
                            .with_user(&uid, |u| u.nick.clone())
                            .unwrap_or_else(|| "*".to_string());
                        let _ = tx.send(Outbound::Line(server.notice(
                            &nick,
                            format!(
                                "*** You are sending too fast; message dropped ({flood_violations}/{MAX_FLOOD_VIOLATIONS})"
                            ),
                        )));
                        continue;
                    }
                    flood_violations = 0;

                    let mut ctx = Context::new(&uid, &server, &mut session, &tx, addr);
                    match server.registry.dispatch(&mut ctx, &msg).await {
                        Ok(()) => {}
                        Err(HandlerError::Quit(reason)) => {
                            let quit = match reason {
                                Some(text) if !text.is_empty() => format!("Quit: {text}"),
                                _ => "Client Quit".to_string(),
                            };
                            break Closing { error: quit.clone(), quit };
                        }
                        Err(HandlerError::Disconnect(reason)) => break Closing::same(reason),
                        Err(e) => debug!(error = %e, "Unhandled dispatch error"),
                    }
                }

                outbound = rx.recv() => match outbound {
                    Some(Outbound::Line(msg)) => {
                        session.bytes_out += msg.payload_len() as u64 + 2;
                        if let Err(e) = writer.send(msg).await {
                            debug!(error = %e, "Write failed");
                            break Closing::same("Write error");
                        }
                    }
                    Some(Outbound::Close(reason)) => break Closing::same(reason),
                    None => break Closing::same("Connection closed"),
                },

                _ = ping.tick() => {
                    if session.awaiting_pong {
                        session.strikes += 1;
                        if ping_timed_out(session.strikes, config.keepalive.max_strikes) {
                            let idle = ping_every.as_secs() * u64::from(session.strikes);
                            break Closing::same(format!("Ping timeout: {idle} seconds"));
                        }
                    }
                    session.awaiting_pong = true;
                    let ping = Message::new("PING", vec![server.name.clone()]);
                    if writer.send(ping).await.is_err() {
                        break Closing::same("Write error");
                    }
                }

                _ = &mut registration_deadline, if !session.is_registered() => {
                    break Closing::same("Registration timeout");
                }

                changed = shutdown.changed() => {
                    let reason = match (changed, shutdown.borrow().clone()) {
                        (Ok(()), Some(stop)) => stop.reason,
                        _ => "Server shutting down".to_string(),
                    };
                    break Closing::same(reason);
                }
            }
        };

        // Flush anything already queued (including replies to the command
        // that ended the loop), then say goodbye.
        while let Ok(Outbound::Line(msg)) = rx.try_recv() {
            if writer.feed(msg).await.is_err() {
                break;
            }
        }
        let _ = writer.send(closing_link(&host, &closing.error)).await;
        // Leave the directory before the client can observe EOF.
        server.disconnect(&uid, &closing.quit);
        let _ = writer.get_mut().shutdown().await;

        info!(
            reason = %closing.quit,
            lines_in = session.lines_in,
            bytes_in = session.bytes_in,
            bytes_out = session.bytes_out,
            "Client disconnected"
        );
        Ok(())
    }
}

/// Missed pongs are tolerated up to `max_strikes`; one more closes the link.
fn ping_timed_out(strikes: u32, max_strikes: u32) -> bool {
    strikes > max_strikes
}

fn closing_link(host: &str, reason: &str) -> Message {
    Message::new("ERROR", vec![format!("Closing Link: {host} ({reason})")])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_link_format() {
        assert_eq!(
            closing_link("10.0.0.1", "Ping timeout: 180 seconds").to_string(),
            "ERROR :Closing Link: 10.0.0.1 (Ping timeout: 180 seconds)"
        );
    }

    #[test]
    fn ping_timeout_needs_more_than_max_strikes() {
        assert!(!ping_timed_out(1, 1));
        assert!(ping_timed_out(2, 1));
        assert!(!ping_timed_out(2, 2));
        assert!(ping_timed_out(1, 0));
    }

    #[test]
    fn limiter_allows_the_burst_then_refuses() {
        let limiter = message_limiter(1, 3);
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }
}
