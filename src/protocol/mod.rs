//! Protocol mirror of the shard API.
//!
//! Each API method has a marker type implementing [`RpcMethod`] that ties its
//! wire name and capability to the native argument/result types and to the
//! wire request/response shapes in [`pb`]. The conversions between the two
//! are checked by the compiler, so a mismatched mirror does not build.

mod methods;
pub mod pb;

pub use methods::*;

use crate::api::Capability;
use crate::error::Result;
use bincode::Options;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::type_name;
use thiserror::Error;

/// Serialize a wire shape to bytes
pub fn serialize<T: Serialize>(msg: &T) -> Result<Bytes> {
    let data = bincode::serialize(msg)?;
    Ok(Bytes::from(data))
}

/// Largest payload a single decode may allocate for.
pub const MAX_DECODE_SIZE: u64 = 16 * 1024 * 1024;

/// Decode a wire shape that must span all of `data`.
///
/// Same fixed-width layout as [`serialize`], but trailing bytes and
/// oversized length prefixes are errors.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> bincode::Result<T> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(MAX_DECODE_SIZE)
        .deserialize(data)
}

/// Deserialize a wire shape from bytes
pub fn deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    let msg = decode(data)?;
    Ok(msg)
}

/// Failure to turn request or response bytes into native values.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] bincode::Error),

    #[error("invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown block tag {0:?}")]
    UnknownBlockTag(String),
}

/// Mirror of one API method.
///
/// `Args` is the ordered native argument list (a tuple for several
/// arguments), excluding the call context. `Output` is the native success
/// value; failures travel through the `pb::Response::Error` envelope.
pub trait RpcMethod: Send + Sync + 'static {
    /// Exported method name, used verbatim in protocol ids.
    const NAME: &'static str;
    const CAPABILITY: Capability;

    type Args: Send + 'static;
    type Output: Send + 'static;

    type Request: Serialize
        + DeserializeOwned
        + From<Self::Args>
        + TryInto<Self::Args, Error = DecodeError>;

    type Response: Serialize
        + DeserializeOwned
        + From<Self::Output>
        + TryInto<Self::Output, Error = DecodeError>;
}

/// Static description of a mirror method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub capability: Capability,
    pub args: &'static str,
    pub output: &'static str,
    pub request: &'static str,
    pub response: &'static str,
}

impl MethodDescriptor {
    pub fn of<M: RpcMethod>() -> Self {
        Self {
            name: M::NAME,
            capability: M::CAPABILITY,
            args: type_name::<M::Args>(),
            output: type_name::<M::Output>(),
            request: type_name::<M::Request>(),
            response: type_name::<M::Response>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::API_METHODS;

    #[test]
    fn test_mirror_covers_api_surface() {
        let mirror = mirror_methods();
        assert_eq!(mirror.len(), API_METHODS.len());
        for method in API_METHODS {
            let found = mirror
                .iter()
                .find(|d| d.name == method.name)
                .unwrap_or_else(|| panic!("no mirror for {}", method.name));
            assert_eq!(found.capability, method.capability, "{}", method.name);
        }
    }

    #[test]
    fn test_descriptor_records_types() {
        let d = MethodDescriptor::of::<GetBalance>();
        assert_eq!(d.name, "GetBalance");
        assert_eq!(d.capability, Capability::ReadOnly);
        assert!(d.request.ends_with("AccountRequest"));
        assert!(d.output.ends_with("Value"));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = serialize(&pb::Uint64 { value: 42 }).unwrap().to_vec();
        assert_eq!(decode::<pb::Uint64>(&bytes).unwrap().value, 42);
        bytes.push(0);
        assert!(decode::<pb::Uint64>(&bytes).is_err());
        assert!(decode::<pb::Empty>(&[0xff]).is_err());
        assert!(decode::<pb::Empty>(&[]).is_ok());
    }

    #[test]
    fn test_decode_rejects_oversized_length() {
        // A string claiming u64::MAX bytes.
        let bytes = [0xff; 8];
        assert!(decode::<String>(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_truncated_fails() {
        let bytes = serialize(&pb::Uint64 { value: 42 }).unwrap();
        assert!(deserialize::<pb::Uint64>(&bytes[..4]).is_err());
        assert_eq!(deserialize::<pb::Uint64>(&bytes).unwrap().value, 42);
    }
}
