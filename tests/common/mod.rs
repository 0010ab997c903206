#![allow(dead_code)]

use shardwire::types::{Address, ShardId, Value};
use shardwire::{
    CallContext, Capability, InMemoryShard, LocalNetwork, NetworkManager, RawApiClient,
    Registrar, ShardApiHandle,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const ALICE: Address = Address([0xa1; 20]);
pub const BOB: Address = Address([0xb0; 20]);
pub const TOKEN: Address = Address([0x70; 20]);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Shard with a funded account and a token balance.
pub async fn seeded_shard(shard_id: ShardId) -> Arc<InMemoryShard> {
    let shard = Arc::new(InMemoryShard::new(shard_id, 4));
    shard.set_balance(ALICE, Value(1_000)).await;
    shard.set_token_balance(ALICE, TOKEN, Value(7)).await;
    shard
}

/// Two started managers on one local network.
pub struct Pair {
    pub server: Arc<NetworkManager>,
    pub client: Arc<NetworkManager>,
}

impl Pair {
    pub fn new() -> Self {
        let network = LocalNetwork::new();
        let server = NetworkManager::new(network.bind(any_port()).unwrap());
        let client = NetworkManager::new(network.bind(any_port()).unwrap());
        server.start();
        client.start();
        Self { server, client }
    }

    pub fn api(&self, shard_id: ShardId) -> RawApiClient {
        RawApiClient::new(
            Arc::clone(&self.client),
            self.server.local_addr().unwrap(),
            shard_id,
        )
    }

    pub async fn serve(&self, shard_id: ShardId, capability: Capability, api: ShardApiHandle) {
        Registrar::new(shard_id)
            .register(
                &CallContext::background(),
                capability,
                &api,
                &self.server,
                &tracing::Span::none(),
            )
            .await
            .unwrap();
    }
}
