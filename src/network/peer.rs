use std::pin::pin;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use crate::common::{NO_SLOT, Slot};
use crate::protocol::{Operation, codec};

use super::record::{record_codec, records};

/// One record read from the connection on `slot`, not yet decoded.
#[derive(Debug)]
pub struct InboundRecord {
    pub slot: Slot,
    pub bytes: Bytes,
}

/// Owns one live connection for as long as it stays usable.
pub struct PeerNode<S> {
    slot: Slot,
    stream: S,
    outbound: mpsc::UnboundedReceiver<Operation>,
    inbound: mpsc::Sender<InboundRecord>,
    terminated: mpsc::UnboundedSender<Slot>,
    cancel: CancellationToken,
}

impl<S> PeerNode<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(
        slot: Slot,
        stream: S,
        outbound: mpsc::UnboundedReceiver<Operation>,
        inbound: mpsc::Sender<InboundRecord>,
        terminated: mpsc::UnboundedSender<Slot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slot,
            stream,
            outbound,
            inbound,
            terminated,
            cancel,
        }
    }

    /// Pumps records in both directions until the connection fails, the
    /// registry goes away, or the node is cancelled. Reports its slot to the
    /// registry exactly once on the way out.
    pub async fn run(mut self) {
        let slot = self.slot;
        let (reader, writer) = tokio::io::split(self.stream);
        let mut incoming = pin!(records(reader, self.cancel.clone()));
        let mut sink = FramedWrite::new(writer, record_codec());

        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break "cancelled",
                record = incoming.next() => match record {
                    Some(bytes) => {
                        let record = InboundRecord { slot, bytes: bytes.freeze() };
                        // A full inbound queue must not outlive cancellation.
                        tokio::select! {
                            _ = self.cancel.cancelled() => break "cancelled",
                            sent = self.inbound.send(record) => if sent.is_err() {
                                break "registry stopped";
                            },
                        }
                    }
                    None => break "connection closed",
                },
                operation = self.outbound.recv() => match operation {
                    Some(operation) => {
                        if let Err(err) = write_operation(&mut sink, slot, operation).await {
                            log::warn!("Write to slot {slot} failed: {err}");
                            break "write failed";
                        }
                    }
                    None => break "outbound queue closed",
                },
            }
        };

        log::info!("Peer on slot {slot} stopped ({reason})");
        let _ = self.terminated.send(slot);
    }
}

async fn write_operation<W>(
    sink: &mut FramedWrite<WriteHalf<W>, LengthDelimitedCodec>,
    slot: Slot,
    operation: Operation,
) -> std::io::Result<()>
where
    W: AsyncWrite,
{
    // The remote side never learns how we number our connections.
    let operation = Operation {
        slot: NO_SLOT,
        ..operation
    };
    match codec::encode(&operation) {
        Ok(frame) => sink.send(frame).await,
        Err(err) => {
            log::warn!(
                "Dropping {} for slot {slot}: {err}",
                operation.typology
            );
            Ok(())
        }
    }
}
