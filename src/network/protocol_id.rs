use crate::types::ShardId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing key of one registered request handler, `/shard/<id>/<api>/<method>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(String);

impl ProtocolId {
    pub fn new(id: impl Into<String>) -> Self {
        ProtocolId(id.into())
    }

    /// Protocol id of `method` of the `api_name` API on shard `shard_id`.
    pub fn for_method(shard_id: ShardId, api_name: &str, method: &str) -> Self {
        ProtocolId(format!("/shard/{}/{}/{}", shard_id, api_name, method))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a method protocol id into shard, API name and method name.
    pub fn components(&self) -> Option<(ShardId, &str, &str)> {
        let rest = self.0.strip_prefix("/shard/")?;
        let mut parts = rest.splitn(3, '/');
        let text = parts.next()?;
        let shard = ShardId(text.parse::<u32>().ok()?);
        // Only the decimal form `for_method` renders: no sign, no leading zeros.
        if shard.to_string() != text {
            return None;
        }
        let api = parts.next()?;
        let method = parts.next()?;
        if api.is_empty() || method.is_empty() || method.contains('/') {
            return None;
        }
        Some((shard, api, method))
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProtocolId {
    fn from(id: &str) -> Self {
        ProtocolId::new(id)
    }
}
