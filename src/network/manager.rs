use super::{MessageId, ProtocolId, ResponsePayload, RpcMessage, RpcRequest, RpcResponse};
use crate::context::CallContext;
use crate::error::{Result, ShardwireError};
use crate::handler::RequestHandler;
use crate::protocol::{deserialize, serialize};
use crate::transport::{Peer, Transport};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// What to do when a protocol id being installed already has a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the whole batch and leave the table untouched.
    #[default]
    Reject,
    /// Overwrite existing handlers; the last registration wins.
    Replace,
}

/// Routes inbound requests to handlers by protocol id and sends outbound
/// requests to peers.
pub struct NetworkManager {
    transport: Arc<dyn Transport>,
    handlers: RwLock<HashMap<ProtocolId, RequestHandler>>,
    next_id: AtomicU64,
    pending_requests: Mutex<HashMap<MessageId, oneshot::Sender<ResponsePayload>>>,
    connections: Mutex<HashMap<SocketAddr, Arc<dyn Peer>>>,
}

impl NetworkManager {
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            pending_requests: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Set the handler for `protocol`, replacing any existing one.
    pub async fn set_request_handler(&self, protocol: ProtocolId, handler: RequestHandler) {
        let mut handlers = self.handlers.write().await;
        if handlers.insert(protocol.clone(), handler).is_some() {
            tracing::debug!("Replaced request handler for {}", protocol);
        }
    }

    /// Install a batch of handlers atomically.
    ///
    /// Under [`DuplicatePolicy::Reject`] nothing is installed if any protocol
    /// id of the batch is already taken.
    pub async fn install_handlers(
        &self,
        batch: BTreeMap<ProtocolId, RequestHandler>,
        policy: DuplicatePolicy,
    ) -> Result<usize> {
        let mut handlers = self.handlers.write().await;
        if policy == DuplicatePolicy::Reject {
            if let Some(taken) = batch.keys().find(|id| handlers.contains_key(*id)) {
                return Err(ShardwireError::DuplicateProtocol(taken.clone()));
            }
        }

        let count = batch.len();
        for (protocol, handler) in batch {
            if handlers.insert(protocol.clone(), handler).is_some() {
                tracing::debug!("Replaced request handler for {}", protocol);
            }
        }
        Ok(count)
    }

    pub async fn remove_request_handler(&self, protocol: &ProtocolId) -> bool {
        self.handlers.write().await.remove(protocol).is_some()
    }

    pub async fn has_handler(&self, protocol: &ProtocolId) -> bool {
        self.handlers.read().await.contains_key(protocol)
    }

    /// Registered protocol ids, sorted.
    pub async fn protocols(&self) -> Vec<ProtocolId> {
        let handlers = self.handlers.read().await;
        let mut protocols: Vec<_> = handlers.keys().cloned().collect();
        protocols.sort();
        protocols
    }

    /// Run the handler registered for `protocol` on `payload`.
    pub async fn handle_request(
        &self,
        ctx: CallContext,
        protocol: &ProtocolId,
        payload: Bytes,
    ) -> Result<Bytes> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers
                .get(protocol)
                .cloned()
                .ok_or_else(|| ShardwireError::NoHandler(protocol.clone()))?
        };
        handler(ctx.with_protocol(protocol.clone()), payload).await
    }

    /// Spawn the accept loop serving inbound connections.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match manager.transport.accept().await {
                    Ok((addr, peer)) => {
                        tracing::debug!("Accepted connection from {}", addr);
                        tokio::spawn(Arc::clone(&manager).serve_peer(addr, peer));
                    }
                    Err(e) => {
                        if !manager.transport.is_closed() {
                            tracing::error!("Accept loop stopped: {}", e);
                        }
                        break;
                    }
                }
            }
        })
    }

    /// Send a request to `addr` and wait for the response payload.
    pub async fn request(
        self: &Arc<Self>,
        addr: SocketAddr,
        protocol: ProtocolId,
        payload: Bytes,
        timeout_duration: Duration,
    ) -> Result<Bytes> {
        let peer = self.connect(addr).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, tx);

        let data = serialize(&RpcMessage::new_request(id, protocol, payload))?;
        if let Err(e) = peer.send(data).await {
            self.pending_requests.lock().await.remove(&id);
            return Err(e);
        }

        match timeout(timeout_duration, rx).await {
            Ok(Ok(ResponsePayload::Data(bytes))) => Ok(bytes),
            Ok(Ok(ResponsePayload::NoHandler { protocol })) => {
                Err(ShardwireError::NoHandler(protocol))
            }
            Ok(Ok(ResponsePayload::Error { message })) => Err(ShardwireError::Rpc(message)),
            Ok(Err(_)) => Err(ShardwireError::Rpc("Response channel closed".to_string())),
            Err(_) => {
                self.pending_requests.lock().await.remove(&id);
                Err(ShardwireError::Timeout)
            }
        }
    }

    /// Stop accepting connections.
    pub fn close(&self) {
        self.transport.close();
    }

    async fn connect(self: &Arc<Self>, addr: SocketAddr) -> Result<Arc<dyn Peer>> {
        {
            let connections = self.connections.lock().await;
            if let Some(peer) = connections.get(&addr) {
                if !peer.is_closed() {
                    return Ok(Arc::clone(peer));
                }
                tracing::debug!("Connection to {} is closed, reconnecting", addr);
            }
        }

        // The table is unlocked while dialing.
        let peer = self.transport.connect(addr).await?;

        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(&addr) {
            if !existing.is_closed() {
                tracing::debug!("Reusing connection to {} dialed concurrently", addr);
                return Ok(Arc::clone(existing));
            }
        }
        connections.insert(addr, Arc::clone(&peer));
        drop(connections);
        tokio::spawn(Arc::clone(self).serve_peer(addr, Arc::clone(&peer)));
        tracing::debug!("Connected to {}", addr);
        Ok(peer)
    }

    async fn serve_peer(self: Arc<Self>, addr: SocketAddr, peer: Arc<dyn Peer>) {
        loop {
            let data = match peer.recv().await {
                Ok(Some(data)) => data,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Receive from {} failed: {}", addr, e);
                    break;
                }
            };

            match deserialize::<RpcMessage>(&data) {
                Ok(RpcMessage::Request(req)) => {
                    let manager = Arc::clone(&self);
                    let peer = Arc::clone(&peer);
                    tokio::spawn(async move { manager.dispatch(addr, req, peer).await });
                }
                Ok(RpcMessage::Response(resp)) => self.complete(resp).await,
                Err(e) => tracing::warn!("Dropping undecodable message from {}: {}", addr, e),
            }
        }
        tracing::debug!("Connection from {} closed", addr);
    }

    async fn dispatch(&self, addr: SocketAddr, req: RpcRequest, peer: Arc<dyn Peer>) {
        let ctx = CallContext::from_peer(addr);
        let payload = match self.handle_request(ctx, &req.protocol, req.payload).await {
            Ok(bytes) => ResponsePayload::Data(bytes),
            Err(ShardwireError::NoHandler(protocol)) => {
                tracing::debug!("No handler for {} requested by {}", protocol, addr);
                ResponsePayload::NoHandler { protocol }
            }
            Err(e) => {
                tracing::error!("Handler for {} failed: {}", req.protocol, e);
                ResponsePayload::Error {
                    message: e.to_string(),
                }
            }
        };

        let response = RpcMessage::new_response(req.id, payload);
        match serialize(&response) {
            Ok(data) => {
                if let Err(e) = peer.send(data).await {
                    tracing::error!("Failed to send response to {}: {}", addr, e);
                }
            }
            Err(e) => tracing::error!("Failed to encode response for {}: {}", addr, e),
        }
    }

    async fn complete(&self, resp: RpcResponse) {
        let tx = self.pending_requests.lock().await.remove(&resp.id);
        match tx {
            Some(tx) => {
                let _ = tx.send(resp.payload);
            }
            None => tracing::debug!("Dropping late response {}", resp.id),
        }
    }
}
