use shardwire::protocol::{GasPrice, GetBalance, GetInTransactionReceipt, SendTransaction};
use shardwire::types::{Address, BlockReference, ShardId, Value};
use shardwire::{
    CallContext, Capability, Config, InMemoryShard, LocalNetwork, NetworkManager, RawApiClient,
    Registrar, ShardApiHandle,
};
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Args {
    shard_id: u32,
    full: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut shard_id = 1;
    let mut full = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--shard" => {
                let value = args.next().ok_or("--shard requires a value")?;
                shard_id = value
                    .parse()
                    .map_err(|_| format!("invalid shard id: {}", value))?;
            }
            "--full" => full = true,
            "-h" | "--help" => {
                return Err("usage: shardwire_demo [--shard <id>] [--full]".to_string());
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(Args { shard_id, full })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = Config {
        shard_id: ShardId(args.shard_id),
        capability: if args.full {
            Capability::Full
        } else {
            Capability::ReadOnly
        },
        ..Config::default()
    };

    let network = LocalNetwork::new();
    let server = NetworkManager::new(network.bind("127.0.0.1:0".parse()?)?);
    let client = NetworkManager::new(network.bind("127.0.0.1:0".parse()?)?);
    server.start();
    client.start();

    let shard = Arc::new(InMemoryShard::new(config.shard_id, 4));
    let alice = Address([0xa1; 20]);
    shard.set_balance(alice, Value(1_000_000)).await;

    let span = tracing::info_span!("rawapi", shard = %config.shard_id);
    let protocols = Registrar::from_config(&config)
        .register(
            &CallContext::background(),
            config.capability,
            &ShardApiHandle::full(Arc::clone(&shard)),
            &server,
            &span,
        )
        .await?;
    for protocol in &protocols {
        tracing::info!("serving {}", protocol);
    }

    let api = RawApiClient::from_config(client, server.local_addr()?, &config);
    let balance = api
        .call::<GetBalance>((alice, BlockReference::Latest))
        .await?;
    let gas_price = api.call::<GasPrice>(()).await?;
    tracing::info!("balance of {} is {:?}, gas price {:?}", alice, balance, gas_price);

    match api
        .call::<SendTransaction>(bytes::Bytes::from_static(b"demo transfer"))
        .await
    {
        Ok(hash) => {
            shard.seal_block().await;
            let receipt = api.call::<GetInTransactionReceipt>(hash).await?;
            tracing::info!(
                "transaction {} included in block {}",
                hash,
                receipt.block_number
            );
        }
        Err(e) => tracing::warn!("send_transaction unavailable: {}", e),
    }

    Ok(())
}
