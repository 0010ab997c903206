use crate::api::{ApiError, Capability};
use crate::network::ProtocolId;
use crate::protocol::DecodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardwireError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Remote call failed: {0}")]
    Api(#[from] ApiError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("No handler registered for {0}")]
    NoHandler(ProtocolId),

    #[error("Request timeout")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("API implementation provides {actual} capability, {requested} was requested")]
    CapabilityMismatch {
        requested: Capability,
        actual: Capability,
    },

    #[error("No mirror method found for API method {0}")]
    MissingMirror(String),

    #[error("Method {method} is {api} in the API surface but {mirror} in the mirror")]
    CapabilityConflict {
        method: String,
        api: Capability,
        mirror: Capability,
    },

    #[error("Method {0} is declared more than once")]
    DuplicateMethod(String),

    #[error("Appropriate codec is not found for method {0}")]
    MissingCodec(String),

    #[error("Codec registered for method {0} which is not part of the selected API surface")]
    UnexpectedMethod(String),

    #[error("Codec for method {0} does not match its mirror description")]
    CodecMismatch(String),

    #[error("Handler already registered for {0}")]
    DuplicateProtocol(ProtocolId),
}

pub type Result<T> = std::result::Result<T, ShardwireError>;

impl ShardwireError {
    /// Whether the error was raised while building handlers, before anything
    /// became reachable through the network manager.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            ShardwireError::CapabilityMismatch { .. }
                | ShardwireError::MissingMirror(_)
                | ShardwireError::CapabilityConflict { .. }
                | ShardwireError::DuplicateMethod(_)
                | ShardwireError::MissingCodec(_)
                | ShardwireError::UnexpectedMethod(_)
                | ShardwireError::CodecMismatch(_)
                | ShardwireError::DuplicateProtocol(_)
        )
    }
}
