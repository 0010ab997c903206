//! Wire shapes of the raw shard API.
//!
//! Every shape uses primitive fields and byte vectors only. Native values are
//! converted with `From` (native → wire) and `TryFrom` (wire → native, with
//! length and tag validation).

use super::DecodeError;
use crate::api::ApiError;
use crate::types;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Response envelope. `Error` is the dedicated failure path: a failed call is
/// still a well-formed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response<T> {
    Data(T),
    Error(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    MalformedRequest,
    NotFound,
    InvalidArgument,
    Unavailable,
    Cancelled,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&ApiError> for Error {
    fn from(err: &ApiError) -> Self {
        let (code, message) = match err {
            ApiError::MalformedRequest(m) => (ErrorCode::MalformedRequest, m.clone()),
            ApiError::NotFound(m) => (ErrorCode::NotFound, m.clone()),
            ApiError::InvalidArgument(m) => (ErrorCode::InvalidArgument, m.clone()),
            ApiError::Unavailable(m) => (ErrorCode::Unavailable, m.clone()),
            ApiError::Cancelled => (ErrorCode::Cancelled, String::new()),
            ApiError::Internal(m) => (ErrorCode::Internal, m.clone()),
        };
        Error { code, message }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.code {
            ErrorCode::MalformedRequest => ApiError::MalformedRequest(err.message),
            ErrorCode::NotFound => ApiError::NotFound(err.message),
            ErrorCode::InvalidArgument => ApiError::InvalidArgument(err.message),
            ErrorCode::Unavailable => ApiError::Unavailable(err.message),
            ErrorCode::Cancelled => ApiError::Cancelled,
            ErrorCode::Internal => ApiError::Internal(err.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hash {
    pub bytes: Vec<u8>,
}

impl From<types::Hash> for Hash {
    fn from(hash: types::Hash) -> Self {
        Hash {
            bytes: hash.0.to_vec(),
        }
    }
}

impl TryFrom<Hash> for types::Hash {
    type Error = DecodeError;

    fn try_from(hash: Hash) -> Result<Self, DecodeError> {
        types::Hash::from_slice(&hash.bytes).ok_or(DecodeError::InvalidLength {
            kind: "hash",
            expected: types::HASH_LEN,
            actual: hash.bytes.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub bytes: Vec<u8>,
}

impl From<types::Address> for Address {
    fn from(address: types::Address) -> Self {
        Address {
            bytes: address.0.to_vec(),
        }
    }
}

impl TryFrom<Address> for types::Address {
    type Error = DecodeError;

    fn try_from(address: Address) -> Result<Self, DecodeError> {
        types::Address::from_slice(&address.bytes).ok_or(DecodeError::InvalidLength {
            kind: "address",
            expected: types::ADDRESS_LEN,
            actual: address.bytes.len(),
        })
    }
}

/// 128-bit amount split into high and low 64-bit halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uint128 {
    pub hi: u64,
    pub lo: u64,
}

impl Uint128 {
    fn to_value(self) -> types::Value {
        types::Value(((self.hi as u128) << 64) | self.lo as u128)
    }
}

impl From<types::Value> for Uint128 {
    fn from(value: types::Value) -> Self {
        Uint128 {
            hi: (value.0 >> 64) as u64,
            lo: value.0 as u64,
        }
    }
}

impl TryFrom<Uint128> for types::Value {
    type Error = DecodeError;

    fn try_from(value: Uint128) -> Result<Self, DecodeError> {
        Ok(value.to_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uint64 {
    pub value: u64,
}

impl From<u64> for Uint64 {
    fn from(value: u64) -> Self {
        Uint64 { value }
    }
}

impl TryFrom<Uint64> for u64 {
    type Error = DecodeError;

    fn try_from(value: Uint64) -> Result<Self, DecodeError> {
        Ok(value.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty;

impl From<()> for Empty {
    fn from(_: ()) -> Self {
        Empty
    }
}

impl TryFrom<Empty> for () {
    type Error = DecodeError;

    fn try_from(_: Empty) -> Result<Self, DecodeError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

const LATEST: &str = "latest";
const EARLIEST: &str = "earliest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReference {
    Named(String),
    Number(u64),
    Hash(Hash),
}

impl From<types::BlockReference> for BlockReference {
    fn from(reference: types::BlockReference) -> Self {
        match reference {
            types::BlockReference::Latest => BlockReference::Named(LATEST.to_string()),
            types::BlockReference::Earliest => BlockReference::Named(EARLIEST.to_string()),
            types::BlockReference::Number(n) => BlockReference::Number(n),
            types::BlockReference::Hash(h) => BlockReference::Hash(h.into()),
        }
    }
}

impl TryFrom<BlockReference> for types::BlockReference {
    type Error = DecodeError;

    fn try_from(reference: BlockReference) -> Result<Self, DecodeError> {
        match reference {
            BlockReference::Named(tag) => match tag.as_str() {
                LATEST => Ok(types::BlockReference::Latest),
                EARLIEST => Ok(types::BlockReference::Earliest),
                _ => Err(DecodeError::UnknownBlockTag(tag)),
            },
            BlockReference::Number(n) => Ok(types::BlockReference::Number(n)),
            BlockReference::Hash(h) => Ok(types::BlockReference::Hash(h.try_into()?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub reference: BlockReference,
}

impl From<types::BlockReference> for BlockRequest {
    fn from(reference: types::BlockReference) -> Self {
        BlockRequest {
            reference: reference.into(),
        }
    }
}

impl TryFrom<BlockRequest> for types::BlockReference {
    type Error = DecodeError;

    fn try_from(request: BlockRequest) -> Result<Self, DecodeError> {
        request.reference.try_into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub address: Address,
    pub reference: BlockReference,
}

impl From<(types::Address, types::BlockReference)> for AccountRequest {
    fn from((address, reference): (types::Address, types::BlockReference)) -> Self {
        AccountRequest {
            address: address.into(),
            reference: reference.into(),
        }
    }
}

impl TryFrom<AccountRequest> for (types::Address, types::BlockReference) {
    type Error = DecodeError;

    fn try_from(request: AccountRequest) -> Result<Self, DecodeError> {
        Ok((request.address.try_into()?, request.reference.try_into()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionRequest {
    ByHash(Hash),
    ByBlockIndex { reference: BlockReference, index: u64 },
}

impl From<types::TransactionLookup> for TransactionRequest {
    fn from(lookup: types::TransactionLookup) -> Self {
        match lookup {
            types::TransactionLookup::ByHash(h) => TransactionRequest::ByHash(h.into()),
            types::TransactionLookup::ByBlockIndex { block, index } => {
                TransactionRequest::ByBlockIndex {
                    reference: block.into(),
                    index,
                }
            }
        }
    }
}

impl TryFrom<TransactionRequest> for types::TransactionLookup {
    type Error = DecodeError;

    fn try_from(request: TransactionRequest) -> Result<Self, DecodeError> {
        match request {
            TransactionRequest::ByHash(h) => Ok(types::TransactionLookup::ByHash(h.try_into()?)),
            TransactionRequest::ByBlockIndex { reference, index } => {
                Ok(types::TransactionLookup::ByBlockIndex {
                    block: reference.try_into()?,
                    index,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRequest {
    pub hash: Hash,
}

impl From<types::Hash> for HashRequest {
    fn from(hash: types::Hash) -> Self {
        HashRequest { hash: hash.into() }
    }
}

impl TryFrom<HashRequest> for types::Hash {
    type Error = DecodeError;

    fn try_from(request: HashRequest) -> Result<Self, DecodeError> {
        request.hash.try_into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: Uint128,
    pub fee_credit: Uint128,
    pub seqno: u64,
    pub data: Vec<u8>,
    pub reference: BlockReference,
}

impl From<(types::CallArgs, types::BlockReference)> for CallRequest {
    fn from((args, reference): (types::CallArgs, types::BlockReference)) -> Self {
        CallRequest {
            from: args.from.map(Address::from),
            to: args.to.into(),
            value: args.value.into(),
            fee_credit: args.fee_credit.into(),
            seqno: args.seqno,
            data: args.data.to_vec(),
            reference: reference.into(),
        }
    }
}

impl TryFrom<CallRequest> for (types::CallArgs, types::BlockReference) {
    type Error = DecodeError;

    fn try_from(request: CallRequest) -> Result<Self, DecodeError> {
        let from = match request.from {
            Some(address) => Some(types::Address::try_from(address)?),
            None => None,
        };
        let args = types::CallArgs {
            from,
            to: request.to.try_into()?,
            value: request.value.to_value(),
            fee_credit: request.fee_credit.to_value(),
            seqno: request.seqno,
            data: Bytes::from(request.data),
        };
        Ok((args, request.reference.try_into()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransactionRequest {
    pub transaction: Vec<u8>,
}

impl From<Bytes> for SendTransactionRequest {
    fn from(transaction: Bytes) -> Self {
        SendTransactionRequest {
            transaction: transaction.to_vec(),
        }
    }
}

impl TryFrom<SendTransactionRequest> for Bytes {
    type Error = DecodeError;

    fn try_from(request: SendTransactionRequest) -> Result<Self, DecodeError> {
        Ok(Bytes::from(request.transaction))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

fn to_vecs(items: Vec<Bytes>) -> Vec<Vec<u8>> {
    items.into_iter().map(|b| b.to_vec()).collect()
}

fn to_bytes(items: Vec<Vec<u8>>) -> Vec<Bytes> {
    items.into_iter().map(Bytes::from).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub encoded: Vec<u8>,
}

impl From<types::RawBlock> for RawBlock {
    fn from(block: types::RawBlock) -> Self {
        RawBlock {
            encoded: block.encoded.to_vec(),
        }
    }
}

impl TryFrom<RawBlock> for types::RawBlock {
    type Error = DecodeError;

    fn try_from(block: RawBlock) -> Result<Self, DecodeError> {
        Ok(types::RawBlock {
            encoded: Bytes::from(block.encoded),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionError {
    pub hash: Hash,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFullBlock {
    pub block: Vec<u8>,
    pub in_transactions: Vec<Vec<u8>>,
    pub out_transactions: Vec<Vec<u8>>,
    pub receipts: Vec<Vec<u8>>,
    pub errors: Vec<TransactionError>,
    pub child_blocks: Vec<Hash>,
}

impl From<types::RawFullBlock> for RawFullBlock {
    fn from(block: types::RawFullBlock) -> Self {
        RawFullBlock {
            block: block.block.to_vec(),
            in_transactions: to_vecs(block.in_transactions),
            out_transactions: to_vecs(block.out_transactions),
            receipts: to_vecs(block.receipts),
            errors: block
                .errors
                .into_iter()
                .map(|(hash, message)| TransactionError {
                    hash: hash.into(),
                    message,
                })
                .collect(),
            child_blocks: block.child_blocks.into_iter().map(Hash::from).collect(),
        }
    }
}

impl TryFrom<RawFullBlock> for types::RawFullBlock {
    type Error = DecodeError;

    fn try_from(block: RawFullBlock) -> Result<Self, DecodeError> {
        let errors = block
            .errors
            .into_iter()
            .map(|e| -> Result<(types::Hash, String), DecodeError> {
                Ok((types::Hash::try_from(e.hash)?, e.message))
            })
            .collect::<Result<_, _>>()?;
        let child_blocks = block
            .child_blocks
            .into_iter()
            .map(types::Hash::try_from)
            .collect::<Result<_, _>>()?;
        Ok(types::RawFullBlock {
            block: Bytes::from(block.block),
            in_transactions: to_bytes(block.in_transactions),
            out_transactions: to_bytes(block.out_transactions),
            receipts: to_bytes(block.receipts),
            errors,
            child_blocks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub transaction: Vec<u8>,
    pub index: u64,
    pub block_hash: Hash,
    pub block_number: u64,
}

impl From<types::TransactionInfo> for TransactionInfo {
    fn from(info: types::TransactionInfo) -> Self {
        TransactionInfo {
            transaction: info.transaction.to_vec(),
            index: info.index,
            block_hash: info.block_hash.into(),
            block_number: info.block_number,
        }
    }
}

impl TryFrom<TransactionInfo> for types::TransactionInfo {
    type Error = DecodeError;

    fn try_from(info: TransactionInfo) -> Result<Self, DecodeError> {
        Ok(types::TransactionInfo {
            transaction: Bytes::from(info.transaction),
            index: info.index,
            block_hash: info.block_hash.try_into()?,
            block_number: info.block_number,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptInfo {
    pub receipt: Vec<u8>,
    pub index: u64,
    pub block_hash: Hash,
    pub block_number: u64,
    pub included_in_main: bool,
    pub error_message: Option<String>,
    pub gas_price: Uint128,
    pub temporary: bool,
}

impl From<types::ReceiptInfo> for ReceiptInfo {
    fn from(info: types::ReceiptInfo) -> Self {
        ReceiptInfo {
            receipt: info.receipt.to_vec(),
            index: info.index,
            block_hash: info.block_hash.into(),
            block_number: info.block_number,
            included_in_main: info.included_in_main,
            error_message: info.error_message,
            gas_price: info.gas_price.into(),
            temporary: info.temporary,
        }
    }
}

impl TryFrom<ReceiptInfo> for types::ReceiptInfo {
    type Error = DecodeError;

    fn try_from(info: ReceiptInfo) -> Result<Self, DecodeError> {
        Ok(types::ReceiptInfo {
            receipt: Bytes::from(info.receipt),
            index: info.index,
            block_hash: info.block_hash.try_into()?,
            block_number: info.block_number,
            included_in_main: info.included_in_main,
            error_message: info.error_message,
            gas_price: info.gas_price.to_value(),
            temporary: info.temporary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub code: Vec<u8>,
}

impl From<types::Code> for Code {
    fn from(code: types::Code) -> Self {
        Code {
            code: code.0.to_vec(),
        }
    }
}

impl TryFrom<Code> for types::Code {
    type Error = DecodeError;

    fn try_from(code: Code) -> Result<Self, DecodeError> {
        Ok(types::Code(Bytes::from(code.code)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: Address,
    pub balance: Uint128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalances {
    pub entries: Vec<TokenBalance>,
}

fn tokens_to_wire(tokens: types::TokenBalances) -> Vec<TokenBalance> {
    tokens
        .into_iter()
        .map(|(token, balance)| TokenBalance {
            token: token.into(),
            balance: balance.into(),
        })
        .collect()
}

fn tokens_from_wire(entries: Vec<TokenBalance>) -> Result<types::TokenBalances, DecodeError> {
    entries
        .into_iter()
        .map(|e| -> Result<(types::Address, types::Value), DecodeError> {
            Ok((types::Address::try_from(e.token)?, e.balance.to_value()))
        })
        .collect()
}

impl From<types::TokenBalances> for TokenBalances {
    fn from(tokens: types::TokenBalances) -> Self {
        TokenBalances {
            entries: tokens_to_wire(tokens),
        }
    }
}

impl TryFrom<TokenBalances> for types::TokenBalances {
    type Error = DecodeError;

    fn try_from(tokens: TokenBalances) -> Result<Self, DecodeError> {
        tokens_from_wire(tokens.entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub key: Hash,
    pub value: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContract {
    pub contract: Vec<u8>,
    pub code: Vec<u8>,
    pub proof: Vec<u8>,
    pub storage: Vec<StorageEntry>,
    pub tokens: Vec<TokenBalance>,
}

impl From<types::RawContract> for RawContract {
    fn from(contract: types::RawContract) -> Self {
        RawContract {
            contract: contract.contract.to_vec(),
            code: contract.code.to_vec(),
            proof: contract.proof.to_vec(),
            storage: contract
                .storage
                .into_iter()
                .map(|(key, value)| StorageEntry {
                    key: key.into(),
                    value: value.into(),
                })
                .collect(),
            tokens: tokens_to_wire(contract.tokens),
        }
    }
}

impl TryFrom<RawContract> for types::RawContract {
    type Error = DecodeError;

    fn try_from(contract: RawContract) -> Result<Self, DecodeError> {
        let storage = contract
            .storage
            .into_iter()
            .map(|e| -> Result<(types::Hash, types::Hash), DecodeError> {
                Ok((types::Hash::try_from(e.key)?, types::Hash::try_from(e.value)?))
            })
            .collect::<Result<_, _>>()?;
        Ok(types::RawContract {
            contract: Bytes::from(contract.contract),
            code: Bytes::from(contract.code),
            proof: Bytes::from(contract.proof),
            storage,
            tokens: tokens_from_wire(contract.tokens)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    pub data: Vec<u8>,
    pub coins_used: Uint128,
    pub out_transactions: Vec<Vec<u8>>,
    pub error: Option<String>,
}

impl From<types::CallResult> for CallResult {
    fn from(result: types::CallResult) -> Self {
        CallResult {
            data: result.data.to_vec(),
            coins_used: result.coins_used.into(),
            out_transactions: to_vecs(result.out_transactions),
            error: result.error,
        }
    }
}

impl TryFrom<CallResult> for types::CallResult {
    type Error = DecodeError;

    fn try_from(result: CallResult) -> Result<Self, DecodeError> {
        Ok(types::CallResult {
            data: Bytes::from(result.data),
            coins_used: result.coins_used.to_value(),
            out_transactions: to_bytes(result.out_transactions),
            error: result.error,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardIdList {
    pub ids: Vec<u32>,
}

impl From<Vec<types::ShardId>> for ShardIdList {
    fn from(ids: Vec<types::ShardId>) -> Self {
        ShardIdList {
            ids: ids.into_iter().map(|id| id.0).collect(),
        }
    }
}

impl TryFrom<ShardIdList> for Vec<types::ShardId> {
    type Error = DecodeError;

    fn try_from(list: ShardIdList) -> Result<Self, DecodeError> {
        Ok(list.ids.into_iter().map(types::ShardId).collect())
    }
}
