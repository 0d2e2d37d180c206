use std::io;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::registry::RegistryHandle;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
}

pub async fn listen(address: &str, port: u16) -> Result<TcpListener, TransportError> {
    let addr = format!("{address}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })
}

pub async fn dial(address: &str, port: u16) -> Result<TcpStream, TransportError> {
    let addr = format!("{address}:{port}");
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
    if let Err(err) = stream.set_nodelay(true) {
        log::debug!("Could not set TCP_NODELAY on {addr}: {err}");
    }
    Ok(stream)
}

/// Hands every accepted socket to the registry until shutdown.
pub async fn accept_loop(listener: TcpListener, registry: RegistryHandle, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    log::info!("Accepted connection from {addr}");
                    if let Err(err) = stream.set_nodelay(true) {
                        log::debug!("Could not set TCP_NODELAY on {addr}: {err}");
                    }
                    if !registry.connect(stream, None).await {
                        break;
                    }
                }
                Err(err) => log::warn!("Accept failed: {err}"),
            },
        }
    }
    log::debug!("Listener stopped");
}
