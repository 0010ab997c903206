mod local;

pub use local::{LocalNetwork, LocalPeer, LocalTransport};

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

pub type TransportFut<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Connection-oriented, message-framed transport between network managers.
pub trait Transport: Send + Sync {
    fn local_addr(&self) -> Result<SocketAddr>;
    fn close(&self);
    fn is_closed(&self) -> bool;
    fn connect(&self, addr: SocketAddr) -> TransportFut<'_, Arc<dyn Peer>>;
    fn accept(&self) -> TransportFut<'_, (SocketAddr, Arc<dyn Peer>)>;
}

/// One end of an established connection.
pub trait Peer: Send + Sync {
    fn send(&self, data: Bytes) -> TransportFut<'_, ()>;
    /// Next message, or `None` once the other end is gone.
    fn recv(&self) -> TransportFut<'_, Option<Bytes>>;
    fn is_closed(&self) -> bool;
}
