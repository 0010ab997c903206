use crate::api::API_NAME;
use crate::codec::MethodCodec;
use crate::config::Config;
use crate::error::Result;
use crate::network::{NetworkManager, ProtocolId};
use crate::protocol::RpcMethod;
use crate::types::ShardId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Calls the shard API served by a remote network manager.
///
/// ```ignore
/// let client = RawApiClient::new(manager, server_addr, ShardId(1));
/// let balance = client.call::<GetBalance>((address, BlockReference::Latest)).await?;
/// ```
#[derive(Clone)]
pub struct RawApiClient {
    manager: Arc<NetworkManager>,
    peer: SocketAddr,
    shard_id: ShardId,
    api_name: String,
    timeout: Duration,
}

impl RawApiClient {
    pub fn new(manager: Arc<NetworkManager>, peer: SocketAddr, shard_id: ShardId) -> Self {
        Self {
            manager,
            peer,
            shard_id,
            api_name: API_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(manager: Arc<NetworkManager>, peer: SocketAddr, config: &Config) -> Self {
        Self {
            manager,
            peer,
            shard_id: config.shard_id,
            api_name: config.api_name.clone(),
            timeout: config.request_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn protocol_id<M: RpcMethod>(&self) -> ProtocolId {
        ProtocolId::for_method(self.shard_id, &self.api_name, M::NAME)
    }

    /// Invoke method `M` remotely. Failures reported by the remote API come
    /// back as [`ShardwireError::Api`](crate::error::ShardwireError::Api).
    pub async fn call<M: RpcMethod>(&self, args: M::Args) -> Result<M::Output> {
        let codec = MethodCodec::<M>::new();
        let request = codec.pack_request(args)?;
        let response = self
            .manager
            .request(self.peer, self.protocol_id::<M>(), request, self.timeout)
            .await?;
        Ok(codec.unpack_response(&response)??)
    }
}
