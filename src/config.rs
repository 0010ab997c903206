use crate::api::{Capability, API_NAME};
use crate::network::DuplicatePolicy;
use crate::types::ShardId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for exposing a shard API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shard whose API is served
    pub shard_id: ShardId,

    /// API family token used in protocol ids
    pub api_name: String,

    /// Which methods are exposed
    pub capability: Capability,

    /// Behaviour when a protocol id is already registered
    pub duplicate_policy: DuplicatePolicy,

    /// Timeout for outgoing requests in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_id: ShardId(1),
            api_name: API_NAME.to_string(),
            capability: Capability::ReadOnly,
            duplicate_policy: DuplicatePolicy::Reject,
            request_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_name, "rawapi");
        assert_eq!(config.capability, Capability::ReadOnly);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = Config {
            shard_id: ShardId(4),
            capability: Capability::Full,
            duplicate_policy: DuplicatePolicy::Replace,
            ..Config::default()
        };
        let bytes = bincode::serialize(&config).unwrap();
        let decoded: Config = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, config);
    }
}
