use crate::error::{Result, ShardwireError};
use crate::transport::{Peer, Transport, TransportFut};
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

const EPHEMERAL_PORT_START: u16 = 49152;

type Incoming = (SocketAddr, Arc<LocalPeer>);

/// In-process network connecting [`LocalTransport`]s by address.
#[derive(Clone)]
pub struct LocalNetwork {
    inner: Arc<Mutex<LocalNetworkInner>>,
}

struct LocalNetworkInner {
    listeners: HashMap<SocketAddr, mpsc::UnboundedSender<Incoming>>,
    next_port: u16,
}

impl LocalNetworkInner {
    fn allocate(&mut self, template: SocketAddr) -> Result<SocketAddr> {
        for _ in 0..=u16::MAX {
            let port = self.next_port;
            self.next_port = if port == u16::MAX {
                EPHEMERAL_PORT_START
            } else {
                port + 1
            };
            let candidate = SocketAddr::new(template.ip(), port);
            if !self.listeners.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ShardwireError::Transport("No free local ports".to_string()))
    }
}

impl Default for LocalNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LocalNetworkInner {
                listeners: HashMap::new(),
                next_port: EPHEMERAL_PORT_START,
            })),
        }
    }

    /// Listen on `addr`. Port 0 picks a free port.
    pub fn bind(&self, addr: SocketAddr) -> Result<Arc<LocalTransport>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let addr = if addr.port() == 0 {
            inner.allocate(addr)?
        } else {
            addr
        };
        if inner.listeners.contains_key(&addr) {
            return Err(ShardwireError::Transport(format!(
                "Address {} already in use",
                addr
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.listeners.insert(addr, tx);
        tracing::info!("Local transport listening on {}", addr);

        Ok(Arc::new(LocalTransport {
            addr,
            network: self.clone(),
            incoming: AsyncMutex::new(rx),
            closed: AtomicBool::new(false),
        }))
    }

    fn dial(&self, from: SocketAddr, to: SocketAddr) -> Result<Arc<LocalPeer>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let listener = inner
            .listeners
            .get(&to)
            .ok_or_else(|| ShardwireError::Transport(format!("Connection refused by {}", to)))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let local = Arc::new(LocalPeer::new(out_tx, in_rx));
        let remote = Arc::new(LocalPeer::new(in_tx, out_rx));

        listener
            .send((from, remote))
            .map_err(|_| ShardwireError::Transport(format!("{} is not accepting", to)))?;
        Ok(local)
    }

    fn unbind(&self, addr: SocketAddr) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.listeners.remove(&addr);
    }
}

/// Listening endpoint on a [`LocalNetwork`].
pub struct LocalTransport {
    addr: SocketAddr,
    network: LocalNetwork,
    incoming: AsyncMutex<mpsc::UnboundedReceiver<Incoming>>,
    closed: AtomicBool,
}

impl Transport for LocalTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.network.unbind(self.addr);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn connect(&self, addr: SocketAddr) -> TransportFut<'_, Arc<dyn Peer>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(ShardwireError::Transport("Transport closed".to_string()));
            }
            let peer = self.network.dial(self.addr, addr)?;
            Ok(peer as Arc<dyn Peer>)
        })
    }

    fn accept(&self) -> TransportFut<'_, (SocketAddr, Arc<dyn Peer>)> {
        Box::pin(async move {
            let mut incoming = self.incoming.lock().await;
            match incoming.recv().await {
                Some((addr, peer)) => Ok((addr, peer as Arc<dyn Peer>)),
                None => Err(ShardwireError::Transport("Endpoint closed".to_string())),
            }
        })
    }
}

/// One end of an in-process connection.
pub struct LocalPeer {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl LocalPeer {
    fn new(tx: mpsc::UnboundedSender<Bytes>, rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self {
            tx,
            rx: AsyncMutex::new(rx),
        }
    }
}

impl Peer for LocalPeer {
    fn send(&self, data: Bytes) -> TransportFut<'_, ()> {
        Box::pin(async move {
            self.tx
                .send(data)
                .map_err(|_| ShardwireError::Transport("Peer connection closed".to_string()))
        })
    }

    fn recv(&self) -> TransportFut<'_, Option<Bytes>> {
        Box::pin(async move {
            let mut rx = self.rx.lock().await;
            Ok(rx.recv().await)
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_port() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let network = LocalNetwork::new();
        let t1 = network.bind(any_port()).unwrap();
        let t2 = network.bind(any_port()).unwrap();
        let addr2 = t2.local_addr().unwrap();
        assert_ne!(t1.local_addr().unwrap(), addr2);

        let accept = tokio::spawn(async move { t2.accept().await.unwrap() });
        let client = t1.connect(addr2).await.unwrap();
        let (from, server) = accept.await.unwrap();
        assert_eq!(from, t1.local_addr().unwrap());

        client.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(server.recv().await.unwrap().unwrap().as_ref(), b"ping");
        server.send(Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(client.recv().await.unwrap().unwrap().as_ref(), b"pong");
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let network = LocalNetwork::new();
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let _t = network.bind(addr).unwrap();
        assert!(network.bind(addr).is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_after_close() {
        let network = LocalNetwork::new();
        let t1 = network.bind(any_port()).unwrap();
        let t2 = network.bind(any_port()).unwrap();
        let addr2 = t2.local_addr().unwrap();
        t2.close();
        assert!(t2.is_closed());
        assert!(t1.connect(addr2).await.is_err());
        assert!(t2.accept().await.is_err());
    }

    #[tokio::test]
    async fn test_peer_closed_when_other_end_dropped() {
        let network = LocalNetwork::new();
        let t1 = network.bind(any_port()).unwrap();
        let t2 = network.bind(any_port()).unwrap();
        let client = t1.connect(t2.local_addr().unwrap()).await.unwrap();
        let (_, server) = t2.accept().await.unwrap();
        drop(server);
        assert!(client.is_closed());
        assert!(client.recv().await.unwrap().is_none());
    }
}
