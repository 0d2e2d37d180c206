use std::collections::HashMap;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::{NO_SLOT, Slot};
use crate::protocol::{Operation, Typology, codec};

use super::peer::{InboundRecord, PeerNode};
use super::transport;

const CONNECTION_QUEUE: usize = 16;
const INBOUND_QUEUE: usize = 100;

/// Requests the orchestrator makes of the registry.
#[derive(Debug)]
pub enum RegistryRequest {
    /// Queue `Operation` on the peer at `Operation.slot`.
    Send(Operation),
    /// Open a connection, then queue `then` on it.
    Dial {
        address: String,
        port: u16,
        then: Option<Operation>,
    },
}

/// A socket waiting for a slot.
#[derive(Debug)]
pub struct NewConnection {
    pub stream: TcpStream,
    pub then: Option<Operation>,
}

/// Cloneable entry point into a running [`ConnectionRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    requests: mpsc::UnboundedSender<RegistryRequest>,
    connections: mpsc::Sender<NewConnection>,
}

impl RegistryHandle {
    /// Never blocks. Dropped silently once the registry has stopped.
    pub fn send(&self, operation: Operation) {
        let _ = self.requests.send(RegistryRequest::Send(operation));
    }

    pub fn dial(&self, address: impl Into<String>, port: u16, then: Option<Operation>) {
        let _ = self.requests.send(RegistryRequest::Dial {
            address: address.into(),
            port,
            then,
        });
    }

    /// Hands an established socket over. Returns `false` once the registry
    /// has stopped accepting connections.
    pub async fn connect(&self, stream: TcpStream, then: Option<Operation>) -> bool {
        self.connections
            .send(NewConnection { stream, then })
            .await
            .is_ok()
    }

    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<RegistryRequest>) {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (connections, _) = mpsc::channel(1);
        (
            Self {
                requests,
                connections,
            },
            requests_rx,
        )
    }
}

struct PeerHandle {
    outbound: mpsc::UnboundedSender<Operation>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the slot table. Only this loop creates or destroys peer nodes.
pub struct ConnectionRegistry {
    peers: HashMap<Slot, PeerHandle>,
    requests: mpsc::UnboundedReceiver<RegistryRequest>,
    connections_tx: mpsc::Sender<NewConnection>,
    connections: mpsc::Receiver<NewConnection>,
    terminated_tx: mpsc::UnboundedSender<Slot>,
    terminated: mpsc::UnboundedReceiver<Slot>,
    inbound_tx: mpsc::Sender<InboundRecord>,
    inbound: mpsc::Receiver<InboundRecord>,
    execute: mpsc::Sender<Operation>,
    shutdown: CancellationToken,
}

impl ConnectionRegistry {
    /// `execute` is the orchestrator's queue of remote operations.
    pub fn new(
        execute: mpsc::Sender<Operation>,
        shutdown: CancellationToken,
    ) -> (Self, RegistryHandle) {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (connections_tx, connections) = mpsc::channel(CONNECTION_QUEUE);
        let (terminated_tx, terminated) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::channel(INBOUND_QUEUE);

        let handle = RegistryHandle {
            requests: requests_tx,
            connections: connections_tx.clone(),
        };
        let registry = Self {
            peers: HashMap::new(),
            requests,
            connections_tx,
            connections,
            terminated_tx,
            terminated,
            inbound_tx,
            inbound,
            execute,
            shutdown,
        };
        (registry, handle)
    }

    pub async fn run(mut self) {
        log::info!("Connection registry started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(connection) = self.connections.recv() => self.start_peer(connection),
                Some(slot) = self.terminated.recv() => self.handle_terminated(slot).await,
                Some(request) = self.requests.recv() => self.handle_request(request),
                Some(record) = self.inbound.recv() => self.handle_record(record).await,
            }
        }
        self.stop().await;
    }

    fn free_slot(&self) -> Option<Slot> {
        (1..=Slot::MAX).find(|slot| !self.peers.contains_key(slot))
    }

    fn start_peer(&mut self, connection: NewConnection) {
        let Some(slot) = self.free_slot() else {
            log::warn!("All slots in use; closing new connection");
            return;
        };

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();
        let node = PeerNode::new(
            slot,
            connection.stream,
            outbound_rx,
            self.inbound_tx.clone(),
            self.terminated_tx.clone(),
            cancel.clone(),
        );
        let task = tokio::spawn(node.run());

        if let Some(operation) = connection.then {
            let _ = outbound.send(operation.to_slot(slot));
        }
        self.peers.insert(
            slot,
            PeerHandle {
                outbound,
                cancel,
                task,
            },
        );
        log::info!("Peer started on slot {slot} ({} live)", self.peers.len());
    }

    async fn handle_terminated(&mut self, slot: Slot) {
        if self.peers.remove(&slot).is_none() {
            return;
        }
        log::info!("Slot {slot} released ({} live)", self.peers.len());
        self.forward(Operation::quit(slot)).await;
    }

    fn handle_request(&mut self, request: RegistryRequest) {
        match request {
            RegistryRequest::Send(operation) => self.route(operation),
            RegistryRequest::Dial {
                address,
                port,
                then,
            } => self.spawn_dial(address, port, then),
        }
    }

    fn route(&self, operation: Operation) {
        let slot = operation.slot;
        match self.peers.get(&slot) {
            Some(peer) if slot != NO_SLOT => {
                if peer.outbound.send(operation).is_err() {
                    log::debug!("Peer on slot {slot} is shutting down; dropping operation");
                }
            }
            _ => log::debug!(
                "No peer on slot {slot}; dropping {}",
                operation.typology
            ),
        }
    }

    fn spawn_dial(&self, address: String, port: u16, then: Option<Operation>) {
        let connections = self.connections_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let stream = tokio::select! {
                _ = shutdown.cancelled() => return,
                dialed = transport::dial(&address, port) => match dialed {
                    Ok(stream) => stream,
                    Err(err) => {
                        log::error!("{err}");
                        return;
                    }
                },
            };
            log::info!("Connected to {address}:{port}");
            let _ = connections.send(NewConnection { stream, then }).await;
        });
    }

    async fn handle_record(&mut self, record: InboundRecord) {
        match codec::decode(&record.bytes) {
            Ok(operation) if operation.typology == Typology::Quit => {
                log::warn!(
                    "Ignoring Quit sent by the peer on slot {}; slot stays open",
                    record.slot
                );
            }
            Ok(mut operation) => {
                operation.slot = record.slot;
                log::debug!(
                    "Received {} for `{}` from slot {}",
                    operation.typology,
                    operation.targeted_chat,
                    record.slot
                );
                self.forward(operation).await;
            }
            Err(err) => {
                log::warn!("Dropping frame from slot {}: {err}", record.slot);
                log::debug!("Frame bytes: {}", hex::encode(&record.bytes));
            }
        }
    }

    async fn forward(&self, operation: Operation) {
        let typology = operation.typology;
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                log::debug!("Shutting down; {typology} discarded");
            }
            sent = self.execute.send(operation) => if sent.is_err() {
                log::debug!("Orchestrator stopped; operation discarded");
            },
        }
    }

    /// Cancels every peer and waits for all of them to finish.
    async fn stop(&mut self) {
        log::info!("Stopping {} peers", self.peers.len());
        // Peers still waiting on a full queue get an error instead of a slot.
        self.inbound.close();
        let peers: Vec<PeerHandle> = self.peers.drain().map(|(_, peer)| peer).collect();
        for peer in &peers {
            peer.cancel.cancel();
        }
        for peer in peers {
            if let Err(err) = peer.task.await {
                log::warn!("Peer task failed: {err}");
            }
        }
        log::info!("Connection registry stopped");
    }
}
