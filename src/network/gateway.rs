//! Gateway - TCP/TLS listeners that accept incoming connections.
//!
//! Each accepted socket gets its own [`Connection`] task. The gateway stops
//! accepting once the server signals shutdown.

use rustls_pemfile::{certs, pkcs8_private_keys};
use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{error, info, instrument, warn};

use crate::config::TlsConfig;
use crate::network::Connection;
use crate::state::Server;

pub struct Gateway {
    plaintext_listener: TcpListener,
    tls_listener: Option<(TcpListener, TlsAcceptor)>,
    server: Arc<Server>,
}

impl Gateway {
    /// Bind the plaintext listener and, when configured, the TLS listener.
    pub async fn bind(server: Arc<Server>) -> anyhow::Result<Self> {
        let config = server.config();
        let addr = config.listen.address;
        let plaintext_listener = TcpListener::bind(addr).await?;
        info!(address = %plaintext_listener.local_addr()?, "Plaintext listener bound");

        let tls_listener = match &config.tls {
            Some(tls_cfg) => {
                let acceptor = Self::load_tls(tls_cfg)?;
                let listener = TcpListener::bind(tls_cfg.address).await?;
                info!(address = %tls_cfg.address, "TLS listener bound");
                Some((listener, acceptor))
            }
            None => None,
        };

        Ok(Self {
            plaintext_listener,
            tls_listener,
            server,
        })
    }

    /// Address of the plaintext listener (useful when bound to port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.plaintext_listener.local_addr()
    }

    /// Load the certificate chain and PKCS#8 key into a TLS acceptor.
    fn load_tls(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
        let cert_file = std::fs::read(&config.cert_path)?;
        let cert_reader = &mut BufReader::new(Cursor::new(cert_file));
        let certs: Vec<CertificateDer> = certs(cert_reader).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            anyhow::bail!("No certificates found in {}", config.cert_path);
        }

        let key_file = std::fs::read(&config.key_path)?;
        let key_reader = &mut BufReader::new(Cursor::new(key_file));
        let mut keys: Vec<PrivateKeyDer> = pkcs8_private_keys(key_reader)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PrivateKeyDer::from)
            .collect();
        if keys.is_empty() {
            anyhow::bail!("No private keys found in {}", config.key_path);
        }
        let key = keys.remove(0);

        let tls_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }

    /// Accept connections until the server shuts down.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown = self.server.subscribe_shutdown();

        if let Some((tls_listener, acceptor)) = self.tls_listener {
            let server = Arc::clone(&self.server);
            let mut tls_shutdown = server.subscribe_shutdown();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        accepted = tls_listener.accept() => match accepted {
                            Ok((stream, addr)) => spawn_tls(&server, &acceptor, stream, addr),
                            Err(e) => error!(error = %e, "Failed to accept TLS connection"),
                        },
                        _ = tls_shutdown.changed() => break,
                    }
                }
                info!("TLS listener stopped");
            });
        }

        loop {
            tokio::select! {
                accepted = self.plaintext_listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!(%addr, "Plaintext connection accepted");
                        let connection = Connection::new(Arc::clone(&self.server), stream, addr, false);
                        tokio::spawn(async move {
                            let uid = connection.uid().to_string();
                            if let Err(e) = connection.run().await {
                                error!(%uid, %addr, error = %e, "Plaintext connection error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "Failed to accept plaintext connection"),
                },
                _ = shutdown.changed() => break,
            }
        }
        info!("Plaintext listener stopped");
        Ok(())
    }
}

fn spawn_tls(server: &Arc<Server>, acceptor: &TlsAcceptor, stream: TcpStream, addr: SocketAddr) {
    let server = Arc::clone(server);
    let acceptor = acceptor.clone();
    tokio::spawn(async move {
        match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                info!(%addr, "TLS connection accepted");
                let connection = Connection::new(server, tls_stream, addr, true);
                let uid = connection.uid().to_string();
                if let Err(e) = connection.run().await {
                    error!(%uid, %addr, error = %e, "TLS connection error");
                }
            }
            Err(e) => warn!(%addr, error = %e, "TLS handshake failed"),
        }
    });
}
