use super::{pb, MethodDescriptor, RpcMethod};
use crate::api::Capability;
use crate::types::{
    Address, BlockReference, CallArgs, CallResult, Code, Hash, RawBlock, RawContract,
    RawFullBlock, ReceiptInfo, ShardId, TokenBalances, TransactionInfo, TransactionLookup, Value,
};
use bytes::Bytes;

macro_rules! mirror {
    (
        $(#[$doc:meta])*
        $name:ident,
        $cap:ident,
        $args:ty => $output:ty,
        $request:ty => $response:ty
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl RpcMethod for $name {
            const NAME: &'static str = stringify!($name);
            const CAPABILITY: Capability = Capability::$cap;
            type Args = $args;
            type Output = $output;
            type Request = $request;
            type Response = $response;
        }
    };
}

mirror!(
    GetBlockHeader,
    ReadOnly,
    BlockReference => RawBlock,
    pb::BlockRequest => pb::RawBlock
);
mirror!(
    GetFullBlockData,
    ReadOnly,
    BlockReference => RawFullBlock,
    pb::BlockRequest => pb::RawFullBlock
);
mirror!(
    GetBlockTransactionCount,
    ReadOnly,
    BlockReference => u64,
    pb::BlockRequest => pb::Uint64
);
mirror!(
    GetInTransaction,
    ReadOnly,
    TransactionLookup => TransactionInfo,
    pb::TransactionRequest => pb::TransactionInfo
);
mirror!(
    GetInTransactionReceipt,
    ReadOnly,
    Hash => ReceiptInfo,
    pb::HashRequest => pb::ReceiptInfo
);
mirror!(
    GetBalance,
    ReadOnly,
    (Address, BlockReference) => Value,
    pb::AccountRequest => pb::Uint128
);
mirror!(
    GetCode,
    ReadOnly,
    (Address, BlockReference) => Code,
    pb::AccountRequest => pb::Code
);
mirror!(
    GetTokens,
    ReadOnly,
    (Address, BlockReference) => TokenBalances,
    pb::AccountRequest => pb::TokenBalances
);
mirror!(
    GetTransactionCount,
    ReadOnly,
    (Address, BlockReference) => u64,
    pb::AccountRequest => pb::Uint64
);
mirror!(
    GetContract,
    ReadOnly,
    (Address, BlockReference) => RawContract,
    pb::AccountRequest => pb::RawContract
);
mirror!(
    Call,
    ReadOnly,
    (CallArgs, BlockReference) => CallResult,
    pb::CallRequest => pb::CallResult
);
mirror!(
    GasPrice,
    ReadOnly,
    () => Value,
    pb::Empty => pb::Uint128
);
mirror!(
    GetShardIdList,
    ReadOnly,
    () => Vec<ShardId>,
    pb::Empty => pb::ShardIdList
);
mirror!(
    GetNumShards,
    ReadOnly,
    () => u64,
    pb::Empty => pb::Uint64
);
mirror!(
    /// Mutating: only exposed under full capability.
    SendTransaction,
    Full,
    Bytes => Hash,
    pb::SendTransactionRequest => pb::Hash
);

/// Descriptors of every mirror method.
pub fn mirror_methods() -> Vec<MethodDescriptor> {
    vec![
        MethodDescriptor::of::<GetBlockHeader>(),
        MethodDescriptor::of::<GetFullBlockData>(),
        MethodDescriptor::of::<GetBlockTransactionCount>(),
        MethodDescriptor::of::<GetInTransaction>(),
        MethodDescriptor::of::<GetInTransactionReceipt>(),
        MethodDescriptor::of::<GetBalance>(),
        MethodDescriptor::of::<GetCode>(),
        MethodDescriptor::of::<GetTokens>(),
        MethodDescriptor::of::<GetTransactionCount>(),
        MethodDescriptor::of::<GetContract>(),
        MethodDescriptor::of::<Call>(),
        MethodDescriptor::of::<GasPrice>(),
        MethodDescriptor::of::<GetShardIdList>(),
        MethodDescriptor::of::<GetNumShards>(),
        MethodDescriptor::of::<SendTransaction>(),
    ]
}
