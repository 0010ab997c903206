//! Protocol-routed request/response networking.
//!
//! The [`NetworkManager`] owns a [`Transport`](crate::transport::Transport),
//! keeps the protocol id → [`RequestHandler`](crate::handler::RequestHandler)
//! table and correlates outgoing requests with their responses.

mod manager;
mod message;
mod protocol_id;

pub use manager::{DuplicatePolicy, NetworkManager};
pub use message::{MessageId, ResponsePayload, RpcMessage, RpcRequest, RpcResponse};
pub use protocol_id::ProtocolId;
