use super::ProtocolId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Unique identifier for request/response correlation
pub type MessageId = u64;

/// Envelope exchanged between network managers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcMessage {
    /// Request routed by protocol id
    Request(RpcRequest),
    /// Response to a request
    Response(RpcResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: MessageId,
    pub protocol: ProtocolId,
    pub payload: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: MessageId,
    pub payload: ResponsePayload,
}

/// Response payload types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Bytes produced by the protocol's handler
    Data(Bytes),
    /// No handler is registered for the requested protocol id
    NoHandler { protocol: ProtocolId },
    /// The handler itself failed
    Error { message: String },
}

impl RpcMessage {
    pub fn new_request(id: MessageId, protocol: ProtocolId, payload: Bytes) -> Self {
        RpcMessage::Request(RpcRequest {
            id,
            protocol,
            payload,
        })
    }

    pub fn new_response(id: MessageId, payload: ResponsePayload) -> Self {
        RpcMessage::Response(RpcResponse { id, payload })
    }

    pub fn message_id(&self) -> MessageId {
        match self {
            RpcMessage::Request(req) => req.id,
            RpcMessage::Response(resp) => resp.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{deserialize, serialize};

    #[test]
    fn test_envelope_serialization() {
        let msg = RpcMessage::new_request(
            9,
            ProtocolId::new("/shard/1/rawapi/GasPrice"),
            Bytes::from_static(b"\x00"),
        );
        let bytes = serialize(&msg).unwrap();
        match deserialize::<RpcMessage>(&bytes).unwrap() {
            RpcMessage::Request(req) => {
                assert_eq!(req.id, 9);
                assert_eq!(req.protocol.as_str(), "/shard/1/rawapi/GasPrice");
                assert_eq!(req.payload.as_ref(), b"\x00");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_message_id() {
        let msg = RpcMessage::new_response(
            4,
            ResponsePayload::Error {
                message: "boom".into(),
            },
        );
        assert_eq!(msg.message_id(), 4);
    }
}
