//! Registration of the shard API on a network manager.
//!
//! Every method exposed under the requested capability becomes one request
//! handler, installed under `/shard/<id>/<api>/<method>`.

use crate::api::{Capability, ShardApi, ShardApiHandle, ShardApiRo, API_METHODS, API_NAME};
use crate::codec::{match_methods, CodecTable, CodecTableBuilder};
use crate::config::Config;
use crate::context::CallContext;
use crate::error::{Result, ShardwireError};
use crate::handler::RequestHandler;
use crate::network::{DuplicatePolicy, NetworkManager, ProtocolId};
use crate::protocol::{
    mirror_methods, Call, GasPrice, GetBalance, GetBlockHeader, GetBlockTransactionCount,
    GetCode, GetContract, GetFullBlockData, GetInTransaction, GetInTransactionReceipt,
    GetNumShards, GetShardIdList, GetTokens, GetTransactionCount, SendTransaction,
};
use crate::types::ShardId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

/// Handlers keyed by protocol id, in protocol id order.
pub type RequestHandlers = BTreeMap<ProtocolId, RequestHandler>;

/// Bind every read-only method of [`ShardApiRo`].
pub fn read_only_codecs<A>(builder: CodecTableBuilder<A>) -> CodecTableBuilder<A>
where
    A: ShardApiRo + ?Sized + 'static,
{
    builder
        .method::<GetBlockHeader, _>(|api, ctx, block| {
            Box::pin(async move { api.get_block_header(&ctx, block).await })
        })
        .method::<GetFullBlockData, _>(|api, ctx, block| {
            Box::pin(async move { api.get_full_block_data(&ctx, block).await })
        })
        .method::<GetBlockTransactionCount, _>(|api, ctx, block| {
            Box::pin(async move { api.get_block_transaction_count(&ctx, block).await })
        })
        .method::<GetInTransaction, _>(|api, ctx, lookup| {
            Box::pin(async move { api.get_in_transaction(&ctx, lookup).await })
        })
        .method::<GetInTransactionReceipt, _>(|api, ctx, hash| {
            Box::pin(async move { api.get_in_transaction_receipt(&ctx, hash).await })
        })
        .method::<GetBalance, _>(|api, ctx, (address, block)| {
            Box::pin(async move { api.get_balance(&ctx, address, block).await })
        })
        .method::<GetCode, _>(|api, ctx, (address, block)| {
            Box::pin(async move { api.get_code(&ctx, address, block).await })
        })
        .method::<GetTokens, _>(|api, ctx, (address, block)| {
            Box::pin(async move { api.get_tokens(&ctx, address, block).await })
        })
        .method::<GetTransactionCount, _>(|api, ctx, (address, block)| {
            Box::pin(async move { api.get_transaction_count(&ctx, address, block).await })
        })
        .method::<GetContract, _>(|api, ctx, (address, block)| {
            Box::pin(async move { api.get_contract(&ctx, address, block).await })
        })
        .method::<Call, _>(|api, ctx, (args, block)| {
            Box::pin(async move { api.call(&ctx, args, block).await })
        })
        .method::<GasPrice, _>(|api, ctx, ()| {
            Box::pin(async move { api.gas_price(&ctx).await })
        })
        .method::<GetShardIdList, _>(|api, ctx, ()| {
            Box::pin(async move { api.get_shard_id_list(&ctx).await })
        })
        .method::<GetNumShards, _>(|api, ctx, ()| {
            Box::pin(async move { api.get_num_shards(&ctx).await })
        })
}

/// Bind every method of [`ShardApi`].
pub fn full_codecs<A>(builder: CodecTableBuilder<A>) -> CodecTableBuilder<A>
where
    A: ShardApi + ?Sized + 'static,
{
    read_only_codecs(builder).method::<SendTransaction, _>(|api, ctx, transaction| {
        Box::pin(async move { api.send_transaction(&ctx, transaction).await })
    })
}

fn bind_handlers<A: ?Sized>(
    table: &CodecTable<A>,
    api: &Arc<A>,
    shard_id: ShardId,
    api_name: &str,
) -> RequestHandlers {
    table
        .iter()
        .map(|entry| {
            let protocol = ProtocolId::for_method(shard_id, api_name, entry.name());
            (protocol, entry.bind(Arc::clone(api)))
        })
        .collect()
}

/// Build the request handlers serving `api` under `capability`.
///
/// Nothing is installed; the returned map is keyed by protocol id.
pub fn get_raw_api_request_handlers(
    shard_id: ShardId,
    api_name: &str,
    capability: Capability,
    api: &ShardApiHandle,
) -> Result<RequestHandlers> {
    if !api.capability().includes(capability) {
        return Err(ShardwireError::CapabilityMismatch {
            requested: capability,
            actual: api.capability(),
        });
    }

    let matched = match_methods(capability, API_METHODS, &mirror_methods())?;
    let handlers = match api {
        ShardApiHandle::ReadOnly(api) => {
            let builder = CodecTable::<dyn ShardApiRo>::builder(capability);
            let table = read_only_codecs(builder).build(&matched)?;
            bind_handlers(&table, api, shard_id, api_name)
        }
        ShardApiHandle::Full(api) => {
            let builder = CodecTable::<dyn ShardApi>::builder(capability);
            let table = full_codecs(builder).build(&matched)?;
            bind_handlers(&table, api, shard_id, api_name)
        }
    };
    Ok(handlers)
}

/// Create and install the request handlers serving `api` on `manager`.
///
/// Failures are logged on `span` and returned; on failure no handler is
/// installed.
pub async fn set_raw_api_request_handlers(
    ctx: &CallContext,
    shard_id: ShardId,
    capability: Capability,
    api: ShardApiHandle,
    manager: &NetworkManager,
    span: &tracing::Span,
) -> Result<()> {
    Registrar::new(shard_id)
        .register(ctx, capability, &api, manager, span)
        .await
        .map(|_| ())
}

/// Settings shared by every registration a [`Registrar`] performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    /// API family token used in protocol ids
    pub api_name: String,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            api_name: API_NAME.to_string(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl From<&Config> for RegistrarConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_name: config.api_name.clone(),
            duplicate_policy: config.duplicate_policy,
        }
    }
}

/// Installs the shard API of one shard on network managers.
#[derive(Debug, Clone)]
pub struct Registrar {
    shard_id: ShardId,
    config: RegistrarConfig,
}

impl Registrar {
    pub fn new(shard_id: ShardId) -> Self {
        Self::with_config(shard_id, RegistrarConfig::default())
    }

    pub fn with_config(shard_id: ShardId, config: RegistrarConfig) -> Self {
        Self { shard_id, config }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_config(config.shard_id, RegistrarConfig::from(config))
    }

    pub fn with_api_name(mut self, api_name: impl Into<String>) -> Self {
        self.config.api_name = api_name.into();
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicate_policy = policy;
        self
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    pub fn handlers(
        &self,
        capability: Capability,
        api: &ShardApiHandle,
    ) -> Result<RequestHandlers> {
        get_raw_api_request_handlers(self.shard_id, &self.config.api_name, capability, api)
    }

    /// Install the handlers for `api` and return their protocol ids.
    pub async fn register(
        &self,
        ctx: &CallContext,
        capability: Capability,
        api: &ShardApiHandle,
        manager: &NetworkManager,
        span: &tracing::Span,
    ) -> Result<Vec<ProtocolId>> {
        async {
            if ctx.is_cancelled() {
                return Err(ShardwireError::Cancelled);
            }

            let handlers = self.handlers(capability, api).map_err(|e| {
                tracing::error!("Failed to create request handlers: {}", e);
                e
            })?;
            let protocols: Vec<ProtocolId> = handlers.keys().cloned().collect();

            if ctx.is_cancelled() {
                return Err(ShardwireError::Cancelled);
            }

            manager
                .install_handlers(handlers, self.config.duplicate_policy)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to install request handlers: {}", e);
                    e
                })?;

            tracing::info!(
                "Registered {} {} handlers for shard {} ({})",
                protocols.len(),
                self.config.api_name,
                self.shard_id,
                capability
            );
            Ok(protocols)
        }
        .instrument(span.clone())
        .await
    }
}
