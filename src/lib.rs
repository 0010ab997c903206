pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod memory;
pub mod network;
pub mod protocol;
pub mod registrar;
pub mod transport;
pub mod types;

// Re-export main types
pub use api::{
    ApiError, ApiResult, Capability, ShardApi, ShardApiHandle, ShardApiRo, API_METHODS, API_NAME,
};
pub use client::RawApiClient;
pub use codec::{match_methods, CodecTable, MethodCodec};
pub use config::Config;
pub use context::CallContext;
pub use error::{Result, ShardwireError};
pub use handler::{make_request_handler, RequestHandler};
pub use memory::InMemoryShard;
pub use network::{DuplicatePolicy, NetworkManager, ProtocolId};
pub use registrar::{
    get_raw_api_request_handlers, set_raw_api_request_handlers, Registrar, RegistrarConfig,
};
pub use transport::{LocalNetwork, Transport};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShardId;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_on_fresh_manager() {
        let network = LocalNetwork::new();
        let manager = NetworkManager::new(network.bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let api = ShardApiHandle::read_only(Arc::new(InMemoryShard::new(ShardId(1), 2)));

        set_raw_api_request_handlers(
            &CallContext::background(),
            ShardId(1),
            Capability::ReadOnly,
            api,
            &manager,
            &tracing::Span::none(),
        )
        .await
        .unwrap();
        assert_eq!(manager.protocols().await.len(), API_METHODS.len() - 1);
    }
}
