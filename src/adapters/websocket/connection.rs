//! Connection handle shared between the hub and the pump loops.
//!
//! A `Connection` owns nothing but its identity and the sending half
//! of a bounded outbound queue. The receiving half is drained by the
//! connection's write loop; the hub holds shared handles for routing
//! and drops them at unregistration.
//!
//! # Backpressure
//!
//! Pushes are non-blocking: when a client's queue is full, the new
//! frame for that one connection is dropped and the sender moves on.
//! A slow or dead client can therefore never stall a broadcast or any
//! other recipient.

use tokio::sync::mpsc;

use crate::domain::foundation::{CompanyId, ConnectionId, ConnectionIdentity, UserId};

/// Frames travelling through a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A serialized envelope to write as a text frame.
    Message(String),

    /// Instruction to send a close frame and shut the write loop down.
    Close,
}

/// One authenticated WebSocket connection.
///
/// The identity triple is bound at upgrade time and immutable for the
/// connection's lifetime, which equals the underlying transport's.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: ConnectionIdentity,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl Connection {
    /// Creates a connection and the receiving half of its outbound
    /// queue.
    ///
    /// The receiver goes to the write loop; everything else holds the
    /// connection itself.
    pub fn new(
        identity: ConnectionIdentity,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        (
            Self {
                id: ConnectionId::new(),
                identity,
                outbound: tx,
            },
            rx,
        )
    }

    /// The server-generated connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The verified identity bound at upgrade time.
    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// The connected user.
    pub fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }

    /// The connection's broadcast scope, when the token carried one.
    pub fn company_id(&self) -> Option<&CompanyId> {
        self.identity.company_id.as_ref()
    }

    /// Queues a serialized frame without blocking.
    ///
    /// Returns `false` when the frame was dropped because the queue is
    /// full or the write loop already exited.
    pub fn push(&self, frame: String) -> bool {
        self.outbound
            .try_send(OutboundFrame::Message(frame))
            .is_ok()
    }

    /// Asks the write loop to emit a close frame and exit.
    ///
    /// Best-effort: if the queue is full the transport teardown still
    /// happens through the pump supervisor.
    pub fn request_close(&self) {
        let _ = self.outbound.try_send(OutboundFrame::Close);
    }
}
