mod common;

use common::{init_tracing, seeded_shard, Pair};
use shardwire::types::ShardId;
use shardwire::{
    get_raw_api_request_handlers, set_raw_api_request_handlers, CallContext, Capability,
    DuplicatePolicy, InMemoryShard, ProtocolId, Registrar, ShardApiHandle, ShardwireError,
    API_METHODS,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn ids(protocols: &[ProtocolId]) -> BTreeSet<String> {
    protocols.iter().map(|p| p.to_string()).collect()
}

fn expected_ids(shard: u32, capability: Capability) -> BTreeSet<String> {
    API_METHODS
        .iter()
        .filter(|m| capability.includes(m.capability))
        .map(|m| format!("/shard/{}/rawapi/{}", shard, m.name))
        .collect()
}

#[tokio::test]
async fn test_read_only_registration_on_shard_3() {
    init_tracing();
    let pair = Pair::new();
    let shard = seeded_shard(ShardId(3)).await;

    set_raw_api_request_handlers(
        &CallContext::background(),
        ShardId(3),
        Capability::ReadOnly,
        ShardApiHandle::read_only(shard),
        &pair.server,
        &tracing::Span::none(),
    )
    .await
    .unwrap();

    let installed = pair.server.protocols().await;
    assert_eq!(ids(&installed), expected_ids(3, Capability::ReadOnly));
    assert!(
        pair.server
            .has_handler(&ProtocolId::new("/shard/3/rawapi/GetBalance"))
            .await
    );
    assert!(
        !pair
            .server
            .has_handler(&ProtocolId::new("/shard/3/rawapi/SendTransaction"))
            .await
    );
}

#[tokio::test]
async fn test_full_registration_includes_send_transaction() {
    init_tracing();
    let pair = Pair::new();
    let shard = seeded_shard(ShardId(2)).await;

    let protocols = Registrar::new(ShardId(2))
        .register(
            &CallContext::background(),
            Capability::Full,
            &ShardApiHandle::full(shard),
            &pair.server,
            &tracing::Span::none(),
        )
        .await
        .unwrap();

    assert_eq!(protocols.len(), API_METHODS.len());
    assert_eq!(ids(&protocols), expected_ids(2, Capability::Full));
    assert_eq!(ids(&pair.server.protocols().await), ids(&protocols));
}

#[tokio::test]
async fn test_capability_mismatch_installs_nothing() {
    init_tracing();
    let pair = Pair::new();
    let shard = seeded_shard(ShardId(1)).await;

    let err = set_raw_api_request_handlers(
        &CallContext::background(),
        ShardId(1),
        Capability::Full,
        ShardApiHandle::read_only(shard),
        &pair.server,
        &tracing::Span::none(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ShardwireError::CapabilityMismatch { .. }));
    assert!(err.is_construction_error());
    assert!(pair.server.protocols().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_rejected_by_default() {
    init_tracing();
    let pair = Pair::new();
    let shard = seeded_shard(ShardId(5)).await;
    let api = ShardApiHandle::full(shard);

    pair.serve(ShardId(5), Capability::ReadOnly, api.clone()).await;
    let before = pair.server.protocols().await;

    let err = Registrar::new(ShardId(5))
        .register(
            &CallContext::background(),
            Capability::Full,
            &api,
            &pair.server,
            &tracing::Span::none(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShardwireError::DuplicateProtocol(_)));
    // Nothing from the rejected batch was installed, not even SendTransaction.
    assert_eq!(pair.server.protocols().await, before);
}

#[tokio::test]
async fn test_duplicate_registration_replaced_when_configured() {
    init_tracing();
    let pair = Pair::new();
    let first = seeded_shard(ShardId(5)).await;
    let second = Arc::new(InMemoryShard::new(ShardId(5), 4));

    pair.serve(ShardId(5), Capability::ReadOnly, ShardApiHandle::full(first))
        .await;

    let protocols = Registrar::new(ShardId(5))
        .with_duplicate_policy(DuplicatePolicy::Replace)
        .register(
            &CallContext::background(),
            Capability::Full,
            &ShardApiHandle::full(Arc::clone(&second)),
            &pair.server,
            &tracing::Span::none(),
        )
        .await
        .unwrap();
    assert_eq!(protocols.len(), API_METHODS.len());

    // Last registration wins: balances now come from the empty shard.
    let balance = pair
        .api(ShardId(5))
        .call::<shardwire::protocol::GetBalance>((
            common::ALICE,
            shardwire::types::BlockReference::Latest,
        ))
        .await
        .unwrap();
    assert_eq!(balance, shardwire::types::Value::ZERO);
}

#[tokio::test]
async fn test_distinct_shards_coexist() {
    init_tracing();
    let pair = Pair::new();
    for id in [1, 2] {
        let shard = seeded_shard(ShardId(id)).await;
        pair.serve(ShardId(id), Capability::ReadOnly, ShardApiHandle::read_only(shard))
            .await;
    }
    let mut expected = expected_ids(1, Capability::ReadOnly);
    expected.extend(expected_ids(2, Capability::ReadOnly));
    assert_eq!(ids(&pair.server.protocols().await), expected);
}

#[tokio::test]
async fn test_cancelled_registration() {
    init_tracing();
    let pair = Pair::new();
    let shard = seeded_shard(ShardId(1)).await;
    let ctx = CallContext::background();
    ctx.cancel();

    let err = set_raw_api_request_handlers(
        &ctx,
        ShardId(1),
        Capability::ReadOnly,
        ShardApiHandle::read_only(shard),
        &pair.server,
        &tracing::Span::none(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ShardwireError::Cancelled));
    assert!(pair.server.protocols().await.is_empty());
}

#[tokio::test]
async fn test_handler_construction_is_deterministic() {
    let api = ShardApiHandle::full(Arc::new(InMemoryShard::new(ShardId(9), 2)));
    let first: Vec<_> = get_raw_api_request_handlers(ShardId(9), "rawapi", Capability::Full, &api)
        .unwrap()
        .into_keys()
        .collect();
    let second: Vec<_> = get_raw_api_request_handlers(ShardId(9), "rawapi", Capability::Full, &api)
        .unwrap()
        .into_keys()
        .collect();
    assert_eq!(first, second);
    assert_eq!(ids(&first), expected_ids(9, Capability::Full));
}

#[tokio::test]
async fn test_every_protocol_id_parses_back() {
    let api = ShardApiHandle::read_only(Arc::new(InMemoryShard::new(ShardId(4), 8)));
    let handlers =
        get_raw_api_request_handlers(ShardId(4), "rawapi", Capability::ReadOnly, &api).unwrap();
    for id in handlers.keys() {
        let (shard, api_name, method) = id.components().unwrap();
        assert_eq!(shard, ShardId(4));
        assert_eq!(api_name, "rawapi");
        assert!(API_METHODS.iter().any(|m| m.name == method));
    }
}
