//! In-memory shard implementing the full API.
//!
//! Account state is not versioned: any block reference that resolves reads
//! the current state. Submitted transactions wait in a pool until
//! [`InMemoryShard::seal_block`] includes them in a new block.

use crate::api::{ApiError, ApiFut, ApiResult, ShardApi, ShardApiRo};
use crate::context::CallContext;
use crate::types::{
    Address, BlockReference, CallArgs, CallResult, Code, Hash, RawBlock, RawContract,
    RawFullBlock, ReceiptInfo, ShardId, TokenBalances, TransactionInfo, TransactionLookup, Value,
};
use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

const DEFAULT_GAS_PRICE: Value = Value(10);

fn digest(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

fn check(ctx: &CallContext) -> ApiResult<()> {
    if ctx.is_cancelled() {
        Err(ApiError::Cancelled)
    } else {
        Ok(())
    }
}

#[derive(Default)]
struct Account {
    balance: Value,
    seqno: u64,
    code: Bytes,
    tokens: TokenBalances,
    storage: BTreeMap<Hash, Hash>,
}

impl Account {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(24);
        buf.put_u128(self.balance.0);
        buf.put_u64(self.seqno);
        buf.freeze()
    }
}

struct StoredBlock {
    number: u64,
    hash: Hash,
    header: Bytes,
    transactions: Vec<Bytes>,
    receipts: Vec<Bytes>,
}

struct ShardState {
    accounts: HashMap<Address, Account>,
    blocks: Vec<StoredBlock>,
    /// Transaction hash → (block number, index in block)
    included: HashMap<Hash, (u64, u64)>,
    pool: Vec<Bytes>,
    pending: HashSet<Hash>,
}

impl ShardState {
    fn new(shard_id: ShardId) -> Self {
        let mut state = Self {
            accounts: HashMap::new(),
            blocks: Vec::new(),
            included: HashMap::new(),
            pool: Vec::new(),
            pending: HashSet::new(),
        };
        state.seal(shard_id);
        state
    }

    fn seal(&mut self, shard_id: ShardId) -> Hash {
        let number = self.blocks.len() as u64;
        let parent = self.blocks.last().map(|b| b.hash).unwrap_or_default();
        let transactions = std::mem::take(&mut self.pool);
        self.pending.clear();

        let tx_hashes: Vec<Hash> = transactions.iter().map(|tx| digest(&[&tx[..]])).collect();
        let tx_root = digest(&tx_hashes.iter().map(Hash::as_bytes).collect::<Vec<_>>());

        let mut header = BytesMut::with_capacity(76);
        header.put_u64(number);
        header.put_slice(parent.as_bytes());
        header.put_u32(shard_id.0);
        header.put_slice(tx_root.as_bytes());
        let header = header.freeze();
        let hash = digest(&[&header[..]]);

        let mut receipts = Vec::with_capacity(tx_hashes.len());
        for (index, tx_hash) in tx_hashes.iter().enumerate() {
            let mut receipt = BytesMut::with_capacity(33);
            receipt.put_slice(tx_hash.as_bytes());
            receipt.put_u8(1);
            receipts.push(receipt.freeze());
            self.included.insert(*tx_hash, (number, index as u64));
        }

        self.blocks.push(StoredBlock {
            number,
            hash,
            header,
            transactions,
            receipts,
        });
        hash
    }

    fn resolve(&self, reference: BlockReference) -> ApiResult<&StoredBlock> {
        let found = match reference {
            BlockReference::Latest => self.blocks.last(),
            BlockReference::Earliest => self.blocks.first(),
            BlockReference::Number(number) => usize::try_from(number)
                .ok()
                .and_then(|n| self.blocks.get(n)),
            BlockReference::Hash(hash) => self.blocks.iter().find(|b| b.hash == hash),
        };
        found.ok_or_else(|| ApiError::NotFound(format!("block {:?}", reference)))
    }

    fn locate(&self, hash: &Hash) -> ApiResult<(&StoredBlock, usize)> {
        match self.included.get(hash) {
            Some(&(number, index)) => {
                let block = self.resolve(BlockReference::Number(number))?;
                Ok((block, index as usize))
            }
            None if self.pending.contains(hash) => Err(ApiError::NotFound(format!(
                "transaction {} is not yet included",
                hash
            ))),
            None => Err(ApiError::NotFound(format!("transaction {}", hash))),
        }
    }
}

/// Single-node shard keeping blocks and accounts in memory.
pub struct InMemoryShard {
    shard_id: ShardId,
    num_shards: u32,
    gas_price: Value,
    state: RwLock<ShardState>,
}

impl InMemoryShard {
    /// Create shard `shard_id` of a network with `num_shards` shards
    /// (main shard included), starting from a sealed genesis block.
    pub fn new(shard_id: ShardId, num_shards: u32) -> Self {
        Self {
            shard_id,
            num_shards,
            gas_price: DEFAULT_GAS_PRICE,
            state: RwLock::new(ShardState::new(shard_id)),
        }
    }

    pub fn with_gas_price(mut self, gas_price: Value) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub async fn set_balance(&self, address: Address, balance: Value) {
        let mut state = self.state.write().await;
        state.accounts.entry(address).or_default().balance = balance;
    }

    pub async fn deploy_code(&self, address: Address, code: Bytes) {
        let mut state = self.state.write().await;
        state.accounts.entry(address).or_default().code = code;
    }

    pub async fn set_token_balance(&self, address: Address, token: Address, amount: Value) {
        let mut state = self.state.write().await;
        state
            .accounts
            .entry(address)
            .or_default()
            .tokens
            .insert(token, amount);
    }

    pub async fn set_storage(&self, address: Address, key: Hash, value: Hash) {
        let mut state = self.state.write().await;
        state
            .accounts
            .entry(address)
            .or_default()
            .storage
            .insert(key, value);
    }

    /// Include every pooled transaction in a new block and return its hash.
    pub async fn seal_block(&self) -> Hash {
        let mut state = self.state.write().await;
        let hash = state.seal(self.shard_id);
        tracing::debug!("Shard {} sealed block {}", self.shard_id, hash);
        hash
    }

    /// Number of submitted transactions not yet in a block.
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pool.len()
    }

    async fn read_account<T>(
        &self,
        ctx: &CallContext,
        address: Address,
        block: BlockReference,
        read: impl FnOnce(Option<&Account>) -> ApiResult<T>,
    ) -> ApiResult<T> {
        check(ctx)?;
        let state = self.state.read().await;
        state.resolve(block)?;
        read(state.accounts.get(&address))
    }
}

impl ShardApiRo for InMemoryShard {
    fn get_block_header<'a>(
        &'a self,
        ctx: &'a CallContext,
        block: BlockReference,
    ) -> ApiFut<'a, RawBlock> {
        Box::pin(async move {
            check(ctx)?;
            let state = self.state.read().await;
            let block = state.resolve(block)?;
            Ok(RawBlock {
                encoded: block.header.clone(),
            })
        })
    }

    fn get_full_block_data<'a>(
        &'a self,
        ctx: &'a CallContext,
        block: BlockReference,
    ) -> ApiFut<'a, RawFullBlock> {
        Box::pin(async move {
            check(ctx)?;
            let state = self.state.read().await;
            let block = state.resolve(block)?;
            Ok(RawFullBlock {
                block: block.header.clone(),
                in_transactions: block.transactions.clone(),
                receipts: block.receipts.clone(),
                ..RawFullBlock::default()
            })
        })
    }

    fn get_block_transaction_count<'a>(
        &'a self,
        ctx: &'a CallContext,
        block: BlockReference,
    ) -> ApiFut<'a, u64> {
        Box::pin(async move {
            check(ctx)?;
            let state = self.state.read().await;
            Ok(state.resolve(block)?.transactions.len() as u64)
        })
    }

    fn get_in_transaction<'a>(
        &'a self,
        ctx: &'a CallContext,
        lookup: TransactionLookup,
    ) -> ApiFut<'a, TransactionInfo> {
        Box::pin(async move {
            check(ctx)?;
            let state = self.state.read().await;
            let (block, index) = match lookup {
                TransactionLookup::ByHash(hash) => state.locate(&hash)?,
                TransactionLookup::ByBlockIndex { block, index } => {
                    let block = state.resolve(block)?;
                    let index = usize::try_from(index).map_err(|_| {
                        ApiError::NotFound(format!(
                            "transaction {} in block {}",
                            index, block.number
                        ))
                    })?;
                    (block, index)
                }
            };
            let transaction = block.transactions.get(index).ok_or_else(|| {
                ApiError::NotFound(format!("transaction {} in block {}", index, block.number))
            })?;
            Ok(TransactionInfo {
                transaction: transaction.clone(),
                index: index as u64,
                block_hash: block.hash,
                block_number: block.number,
            })
        })
    }

    fn get_in_transaction_receipt<'a>(
        &'a self,
        ctx: &'a CallContext,
        hash: Hash,
    ) -> ApiFut<'a, ReceiptInfo> {
        Box::pin(async move {
            check(ctx)?;
            let state = self.state.read().await;
            let (block, index) = state.locate(&hash)?;
            let receipt = block
                .receipts
                .get(index)
                .ok_or_else(|| ApiError::Internal(format!("receipt of {} missing", hash)))?;
            Ok(ReceiptInfo {
                receipt: receipt.clone(),
                index: index as u64,
                block_hash: block.hash,
                block_number: block.number,
                included_in_main: self.shard_id == ShardId::MAIN,
                error_message: None,
                gas_price: self.gas_price,
                temporary: false,
            })
        })
    }

    fn get_balance<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, Value> {
        Box::pin(self.read_account(ctx, address, block, |account| {
            Ok(account.map(|a| a.balance).unwrap_or(Value::ZERO))
        }))
    }

    fn get_code<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, Code> {
        Box::pin(self.read_account(ctx, address, block, |account| {
            Ok(Code(account.map(|a| a.code.clone()).unwrap_or_default()))
        }))
    }

    fn get_tokens<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, TokenBalances> {
        Box::pin(self.read_account(ctx, address, block, |account| {
            Ok(account.map(|a| a.tokens.clone()).unwrap_or_default())
        }))
    }

    fn get_transaction_count<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, u64> {
        Box::pin(self.read_account(ctx, address, block, |account| {
            Ok(account.map(|a| a.seqno).unwrap_or(0))
        }))
    }

    fn get_contract<'a>(
        &'a self,
        ctx: &'a CallContext,
        address: Address,
        block: BlockReference,
    ) -> ApiFut<'a, RawContract> {
        Box::pin(self.read_account(ctx, address, block, move |account| {
            let account =
                account.ok_or_else(|| ApiError::NotFound(format!("account {}", address)))?;
            Ok(RawContract {
                contract: account.encode(),
                code: account.code.clone(),
                proof: Bytes::new(),
                storage: account.storage.clone(),
                tokens: account.tokens.clone(),
            })
        }))
    }

    fn call<'a>(
        &'a self,
        ctx: &'a CallContext,
        args: CallArgs,
        block: BlockReference,
    ) -> ApiFut<'a, CallResult> {
        Box::pin(async move {
            check(ctx)?;
            let state = self.state.read().await;
            state.resolve(block)?;

            let target = state
                .accounts
                .get(&args.to)
                .ok_or_else(|| ApiError::NotFound(format!("account {}", args.to)))?;

            if let Some(from) = args.from {
                let available = state
                    .accounts
                    .get(&from)
                    .map(|a| a.balance)
                    .unwrap_or(Value::ZERO);
                if available < args.value {
                    return Ok(CallResult {
                        error: Some(format!("insufficient balance in {}", from)),
                        ..CallResult::default()
                    });
                }
            }

            if target.code.is_empty() {
                return Ok(CallResult {
                    error: Some(format!("no code at {}", args.to)),
                    ..CallResult::default()
                });
            }

            let coins_used = Value(self.gas_price.0.saturating_mul(args.data.len() as u128));
            Ok(CallResult {
                data: args.data,
                coins_used,
                out_transactions: Vec::new(),
                error: None,
            })
        })
    }

    fn gas_price<'a>(&'a self, ctx: &'a CallContext) -> ApiFut<'a, Value> {
        Box::pin(async move {
            check(ctx)?;
            Ok(self.gas_price)
        })
    }

    fn get_shard_id_list<'a>(&'a self, ctx: &'a CallContext) -> ApiFut<'a, Vec<ShardId>> {
        Box::pin(async move {
            check(ctx)?;
            Ok((1..self.num_shards).map(ShardId).collect())
        })
    }

    fn get_num_shards<'a>(&'a self, ctx: &'a CallContext) -> ApiFut<'a, u64> {
        Box::pin(async move {
            check(ctx)?;
            Ok(u64::from(self.num_shards))
        })
    }
}

impl ShardApi for InMemoryShard {
    fn send_transaction<'a>(
        &'a self,
        ctx: &'a CallContext,
        transaction: Bytes,
    ) -> ApiFut<'a, Hash> {
        Box::pin(async move {
            check(ctx)?;
            if transaction.is_empty() {
                return Err(ApiError::InvalidArgument("empty transaction".to_string()));
            }
            let hash = digest(&[&transaction[..]]);
            let mut state = self.state.write().await;
            if state.included.contains_key(&hash) || !state.pending.insert(hash) {
                return Err(ApiError::InvalidArgument(format!(
                    "transaction {} already known",
                    hash
                )));
            }
            state.pool.push(transaction);
            tracing::trace!("Shard {} accepted transaction {}", self.shard_id, hash);
            Ok(hash)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard() -> InMemoryShard {
        InMemoryShard::new(ShardId(2), 4)
    }

    #[tokio::test]
    async fn test_genesis_block() {
        let shard = shard();
        let ctx = CallContext::background();
        let latest = shard
            .get_block_header(&ctx, BlockReference::Latest)
            .await
            .unwrap();
        let earliest = shard
            .get_block_header(&ctx, BlockReference::Earliest)
            .await
            .unwrap();
        assert_eq!(latest, earliest);
        assert_eq!(
            shard
                .get_block_transaction_count(&ctx, BlockReference::Number(0))
                .await
                .unwrap(),
            0
        );
        assert!(matches!(
            shard.get_block_header(&ctx, BlockReference::Number(1)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_and_seal() {
        let shard = shard();
        let ctx = CallContext::background();
        let tx = Bytes::from_static(b"transfer 10");

        let hash = shard.send_transaction(&ctx, tx.clone()).await.unwrap();
        assert_eq!(shard.pending_count().await, 1);
        assert!(matches!(
            shard.get_in_transaction_receipt(&ctx, hash).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            shard.send_transaction(&ctx, tx.clone()).await,
            Err(ApiError::InvalidArgument(_))
        ));

        let block_hash = shard.seal_block().await;
        assert_eq!(shard.pending_count().await, 0);

        let info = shard
            .get_in_transaction(&ctx, TransactionLookup::ByHash(hash))
            .await
            .unwrap();
        assert_eq!(info.transaction, tx);
        assert_eq!(info.block_number, 1);
        assert_eq!(info.block_hash, block_hash);

        let by_index = shard
            .get_in_transaction(
                &ctx,
                TransactionLookup::ByBlockIndex {
                    block: BlockReference::Hash(block_hash),
                    index: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(by_index, info);

        let receipt = shard.get_in_transaction_receipt(&ctx, hash).await.unwrap();
        assert_eq!(receipt.index, 0);
        assert!(!receipt.included_in_main);
        assert_eq!(&receipt.receipt[..32], hash.as_bytes());

        assert!(matches!(
            shard.send_transaction(&ctx, tx).await,
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_index_not_found() {
        let shard = shard();
        let ctx = CallContext::background();
        shard
            .send_transaction(&ctx, Bytes::from_static(b"only tx"))
            .await
            .unwrap();
        let block_hash = shard.seal_block().await;

        for index in [1, 1 << 32, u64::MAX] {
            let result = shard
                .get_in_transaction(
                    &ctx,
                    TransactionLookup::ByBlockIndex {
                        block: BlockReference::Hash(block_hash),
                        index,
                    },
                )
                .await;
            assert!(matches!(result, Err(ApiError::NotFound(_))), "index {}", index);
        }
    }

    #[tokio::test]
    async fn test_empty_transaction_rejected() {
        let shard = shard();
        let err = shard
            .send_transaction(&CallContext::background(), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_account_reads() {
        let shard = shard();
        let ctx = CallContext::background();
        let alice = Address([1; 20]);
        let token = Address([9; 20]);

        assert_eq!(
            shard
                .get_balance(&ctx, alice, BlockReference::Latest)
                .await
                .unwrap(),
            Value::ZERO
        );
        assert!(matches!(
            shard.get_contract(&ctx, alice, BlockReference::Latest).await,
            Err(ApiError::NotFound(_))
        ));

        shard.set_balance(alice, Value(500)).await;
        shard.set_token_balance(alice, token, Value(3)).await;
        shard
            .set_storage(alice, Hash([1; 32]), Hash([2; 32]))
            .await;

        assert_eq!(
            shard
                .get_balance(&ctx, alice, BlockReference::Latest)
                .await
                .unwrap(),
            Value(500)
        );
        let tokens = shard
            .get_tokens(&ctx, alice, BlockReference::Latest)
            .await
            .unwrap();
        assert_eq!(tokens.get(&token), Some(&Value(3)));

        let contract = shard
            .get_contract(&ctx, alice, BlockReference::Earliest)
            .await
            .unwrap();
        assert_eq!(contract.storage.get(&Hash([1; 32])), Some(&Hash([2; 32])));
        assert_eq!(contract.contract.len(), 24);
    }

    #[tokio::test]
    async fn test_call() {
        let shard = shard();
        let ctx = CallContext::background();
        let contract = Address([5; 20]);
        let caller = Address([6; 20]);
        shard
            .deploy_code(contract, Bytes::from_static(b"\x60\x00"))
            .await;

        let args = CallArgs {
            from: Some(caller),
            to: contract,
            data: Bytes::from_static(b"abc"),
            ..CallArgs::default()
        };
        let result = shard
            .call(&ctx, args.clone(), BlockReference::Latest)
            .await
            .unwrap();
        assert_eq!(result.data, args.data);
        assert_eq!(result.coins_used, Value(30));
        assert!(result.error.is_none());

        let broke = CallArgs {
            value: Value(1),
            ..args
        };
        let result = shard
            .call(&ctx, broke, BlockReference::Latest)
            .await
            .unwrap();
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let shard = shard();
        let ctx = CallContext::background();
        ctx.cancel();
        assert_eq!(shard.gas_price(&ctx).await, Err(ApiError::Cancelled));
    }

    #[tokio::test]
    async fn test_shard_list_excludes_main() {
        let shard = shard();
        let ctx = CallContext::background();
        assert_eq!(
            shard.get_shard_id_list(&ctx).await.unwrap(),
            vec![ShardId(1), ShardId(2), ShardId(3)]
        );
        assert_eq!(shard.get_num_shards(&ctx).await.unwrap(), 4);
    }
}
