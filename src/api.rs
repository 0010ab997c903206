//! Shard service API surface.
//!
//! [`ShardApiRo`] is the read-only method set, [`ShardApi`] adds the mutating
//! methods. [`API_METHODS`] is the single table of exported method names, each
//! tagged with the capability level that exposes it.

use crate::context::CallContext;
use crate::types::{
    Address, BlockReference, CallArgs, CallResult, Code, Hash, RawBlock, RawContract,
    RawFullBlock, ReceiptInfo, ShardId, TokenBalances, TransactionInfo, TransactionLookup, Value,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Access grant selecting which API methods are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReadOnly,
    Full,
}

impl Capability {
    /// Whether a method tagged `method` is exposed under this capability.
    pub fn includes(self, method: Capability) -> bool {
        match self {
            Capability::Full => true,
            Capability::ReadOnly => method == Capability::ReadOnly,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ReadOnly => write!(f, "read-only"),
            Capability::Full => write!(f, "full"),
        }
    }
}

/// Per-request failure reported to the calling peer inside the response payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub type ApiFut<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Read-only shard API.
///
/// Implementations are invoked concurrently by the network manager and must
/// honour cancellation signalled through the [`CallContext`].
pub trait ShardApiRo: Send + Sync {
    fn get_block_header<'a>(
        &'a self,
        ctx: &'a CallContext,
        block: BlockReference,
    ) -> ApiFut<'a, RawBlock>;

    fn get_full_block_data<'a>(
        &'a self,
        ctx: &'a CallContext,
        block: BlockReference,
    ) -> ApiFut<'a, RawFullBlock>;

    fn get_block_transaction_count<'a>(
        &'a self,
        ctx: &'a CallContext,
        block: BlockReference,
    ) -> ApiFut<'a, u64>;

    fn get_in_transaction<'a>(
        &'a self,
        ctx: &'a CallContext,
        lookup: TransactionLookup,
    ) -> ApiFut<'a, TransactionInfo>;

    fn get_in_transaction_receipt<'a>(
        &'a self,
        ctx: &'a CallContext,
        hash: Hash,
    ) -> ApiFut<'a, ReceiptInfo>;

    fn get_balance<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, Value>;

    fn get_code<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, Code>;

    fn get_tokens<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, TokenBalances>;

    fn get_transaction_count<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, u64>;

    fn get_contract<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, RawContract>;

    fn call<'a>(
        &'a self,
        ctx: &'a CallContext,
        args: CallArgs,
        block: BlockReference,
    ) -> ApiFut<'a, CallResult>;

    fn gas_price<'a>(&'a self, ctx: &'a CallContext) -> ApiFut<'a, Value>;

    fn get_shard_id_list<'a>(&'a self, ctx: &'a CallContext) -> ApiFut<'a, Vec<ShardId>>;

    fn get_num_shards<'a>(&'a self, ctx: &'a CallContext) -> ApiFut<'a, u64>;
}

/// Full shard API: the read-only surface plus mutating methods.
pub trait ShardApi: ShardApiRo {
    /// Submit a raw external transaction, returning its hash.
    fn send_transaction<'a>(
        &'a self,
        ctx: &'a CallContext,
        transaction: Bytes,
    ) -> ApiFut<'a, Hash>;
}

/// An exported API method and the capability level that exposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiMethod {
    pub name: &'static str,
    pub capability: Capability,
}

impl ApiMethod {
    const fn read(name: &'static str) -> Self {
        Self {
            name,
            capability: Capability::ReadOnly,
        }
    }

    const fn write(name: &'static str) -> Self {
        Self {
            name,
            capability: Capability::Full,
        }
    }
}

/// Token identifying this API family in protocol ids.
pub const API_NAME: &str = "rawapi";

/// Every exported method of [`ShardApi`], in declaration order.
pub const API_METHODS: &[ApiMethod] = &[
    ApiMethod::read("GetBlockHeader"),
    ApiMethod::read("GetFullBlockData"),
    ApiMethod::read("GetBlockTransactionCount"),
    ApiMethod::read("GetInTransaction"),
    ApiMethod::read("GetInTransactionReceipt"),
    ApiMethod::read("GetBalance"),
    ApiMethod::read("GetCode"),
    ApiMethod::read("GetTokens"),
    ApiMethod::read("GetTransactionCount"),
    ApiMethod::read("GetContract"),
    ApiMethod::read("Call"),
    ApiMethod::read("GasPrice"),
    ApiMethod::read("GetShardIdList"),
    ApiMethod::read("GetNumShards"),
    ApiMethod::write("SendTransaction"),
];

/// Methods of `surface` exposed under `capability`.
pub fn api_surface(
    surface: &'static [ApiMethod],
    capability: Capability,
) -> impl Iterator<Item = &'static ApiMethod> {
    surface
        .iter()
        .filter(move |method| capability.includes(method.capability))
}

/// A live API implementation together with the capability it implements.
#[derive(Clone)]
pub enum ShardApiHandle {
    ReadOnly(Arc<dyn ShardApiRo>),
    Full(Arc<dyn ShardApi>),
}

impl ShardApiHandle {
    pub fn read_only<A: ShardApiRo + 'static>(api: Arc<A>) -> Self {
        ShardApiHandle::ReadOnly(api)
    }

    pub fn full<A: ShardApi + 'static>(api: Arc<A>) -> Self {
        ShardApiHandle::Full(api)
    }

    /// Capability the wrapped implementation satisfies.
    pub fn capability(&self) -> Capability {
        match self {
            ShardApiHandle::ReadOnly(_) => Capability::ReadOnly,
            ShardApiHandle::Full(_) => Capability::Full,
        }
    }
}

impl fmt::Debug for ShardApiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShardApiHandle")
            .field(&self.capability())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_full_includes_read_only() {
        assert!(Capability::Full.includes(Capability::ReadOnly));
        assert!(Capability::Full.includes(Capability::Full));
        assert!(Capability::ReadOnly.includes(Capability::ReadOnly));
        assert!(!Capability::ReadOnly.includes(Capability::Full));
    }

    #[test]
    fn test_api_method_names_unique() {
        let names: HashSet<_> = API_METHODS.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), API_METHODS.len());
    }

    #[test]
    fn test_read_only_surface_excludes_send_transaction() {
        let ro: Vec<_> = api_surface(API_METHODS, Capability::ReadOnly)
            .map(|m| m.name)
            .collect();
        assert!(ro.contains(&"GetBalance"));
        assert!(!ro.contains(&"SendTransaction"));

        let full: Vec<_> = api_surface(API_METHODS, Capability::Full)
            .map(|m| m.name)
            .collect();
        assert_eq!(full.len(), API_METHODS.len());
        assert!(full.contains(&"SendTransaction"));
    }
}
