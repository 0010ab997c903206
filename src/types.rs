//! Native shard types used by the API surface.
//!
//! These never cross the wire directly; `protocol::pb` holds their wire shapes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Numeric identifier of a shard, rendered in decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub u32);

impl ShardId {
    pub const MAIN: ShardId = ShardId(0);
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ShardId {
    fn from(id: u32) -> Self {
        ShardId(id)
    }
}

pub const HASH_LEN: usize = 32;
pub const ADDRESS_LEN: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; HASH_LEN]>::try_from(bytes).ok().map(Hash)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; ADDRESS_LEN]>::try_from(bytes).ok().map(Address)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("0x")?;
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

/// Coin amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Value(pub u128);

impl Value {
    pub const ZERO: Value = Value(0);

    pub fn checked_add(self, other: Value) -> Option<Value> {
        self.0.checked_add(other.0).map(Value)
    }

    pub fn checked_sub(self, other: Value) -> Option<Value> {
        self.0.checked_sub(other.0).map(Value)
    }
}

/// Token balances of an account, keyed by token id (the minting contract).
pub type TokenBalances = BTreeMap<Address, Value>;

/// Selects the block a query is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockReference {
    #[default]
    Latest,
    Earliest,
    Number(u64),
    Hash(Hash),
}

/// Locates an incoming transaction either by its hash or by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionLookup {
    ByHash(Hash),
    ByBlockIndex { block: BlockReference, index: u64 },
}

/// Encoded block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub encoded: Bytes,
}

/// Block header together with its transactions, receipts and child blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFullBlock {
    pub block: Bytes,
    pub in_transactions: Vec<Bytes>,
    pub out_transactions: Vec<Bytes>,
    pub receipts: Vec<Bytes>,
    pub errors: BTreeMap<Hash, String>,
    pub child_blocks: Vec<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub transaction: Bytes,
    pub index: u64,
    pub block_hash: Hash,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub receipt: Bytes,
    pub index: u64,
    pub block_hash: Hash,
    pub block_number: u64,
    pub included_in_main: bool,
    pub error_message: Option<String>,
    pub gas_price: Value,
    pub temporary: bool,
}

/// Contract code deployed at an address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Code(pub Bytes);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawContract {
    pub contract: Bytes,
    pub code: Bytes,
    pub proof: Bytes,
    pub storage: BTreeMap<Hash, Hash>,
    pub tokens: TokenBalances,
}

/// Arguments of a read-only message execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallArgs {
    pub from: Option<Address>,
    pub to: Address,
    pub value: Value,
    pub fee_credit: Value,
    pub seqno: u64,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallResult {
    pub data: Bytes,
    pub coins_used: Value,
    pub out_transactions: Vec<Bytes>,
    pub error: Option<String>,
}
