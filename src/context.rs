use crate::network::ProtocolId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execution context passed as the implicit first argument of every API call.
///
/// Never transmitted over the wire: the network manager creates one per
/// inbound request and the request handler stamps it with the protocol being
/// served. Clones share the same cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    peer: Option<SocketAddr>,
    protocol: Option<ProtocolId>,
    cancelled: Arc<AtomicBool>,
}

impl CallContext {
    /// Context not tied to any inbound request (startup wiring, local calls).
    pub fn background() -> Self {
        Self::default()
    }

    /// Context for a request received from `peer`.
    pub fn from_peer(peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            ..Self::default()
        }
    }

    /// Derive a context for serving `protocol`, sharing cancellation with `self`.
    pub fn with_protocol(&self, protocol: ProtocolId) -> Self {
        Self {
            peer: self.peer,
            protocol: Some(protocol),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn protocol(&self) -> Option<&ProtocolId> {
        self.protocol.as_ref()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
