use std::io;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::{ChatEvent, Command, NodeInfos};
use crate::config::AppConfig;
use crate::network::{ConnectionRegistry, TransportError, transport};
use crate::protocol::codec::MAX_FIELD_LEN;
use crate::replication::Orchestrator;

const EXECUTE_QUEUE: usize = 100;
const COMMAND_QUEUE: usize = 100;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Listener has no local address: {0}")]
    LocalAddr(#[source] io::Error),
    #[error("{field} is {len} bytes, limit is 255")]
    FieldTooLong { field: &'static str, len: usize },
}

/// A running chat node: listener, registry and orchestrator tasks.
pub struct MeshNode {
    local: NodeInfos,
    commands: mpsc::Sender<Command>,
    events: Option<mpsc::UnboundedReceiver<ChatEvent>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MeshNode {
    /// Binds the listening socket and spawns every task. Failing to bind is
    /// the only fatal startup error.
    pub async fn start(config: &AppConfig, shutdown: CancellationToken) -> Result<Self, NodeError> {
        for (field, value) in [("name", &config.name), ("address", &config.address)] {
            if value.len() > MAX_FIELD_LEN {
                return Err(NodeError::FieldTooLong {
                    field,
                    len: value.len(),
                });
            }
        }

        let listener = transport::listen(&config.address, config.port).await?;
        let port = listener.local_addr().map_err(NodeError::LocalAddr)?.port();
        let local = NodeInfos::new(config.address.clone(), port, config.name.clone());
        log::info!(
            "Node {} ({}) listening on {}:{port}",
            local.name,
            local.id,
            local.address
        );

        let (execute_tx, execute_rx) = mpsc::channel(EXECUTE_QUEUE);
        let (commands, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let (events_tx, events) = mpsc::unbounded_channel();

        let (registry, handle) = ConnectionRegistry::new(execute_tx, shutdown.clone());
        let orchestrator =
            Orchestrator::new(local.clone(), handle.clone(), events_tx, shutdown.clone());

        let tasks = vec![
            tokio::spawn(registry.run()),
            tokio::spawn(orchestrator.run(execute_rx, commands_rx)),
            tokio::spawn(transport::accept_loop(listener, handle, shutdown.clone())),
        ];

        Ok(Self {
            local,
            commands,
            events: Some(events),
            shutdown,
            tasks,
        })
    }

    pub fn local(&self) -> &NodeInfos {
        &self.local
    }

    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// The event stream can only be handed out once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChatEvent>> {
        self.events.take()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits for every task to observe shutdown and exit.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(err) = task.await {
                log::error!("Node task failed: {err}");
            }
        }
        log::info!("Node {} stopped", self.local.name);
    }
}
