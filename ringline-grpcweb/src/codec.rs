//! Message serialization collaborator.
//!
//! The transport is codec-agnostic: a [`MessageCodec`] turns request values
//! into payload bytes and response payloads back into values.

/// A response payload could not be deserialized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decode error: {0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Serializes requests and deserializes responses for one method.
pub trait MessageCodec {
    type Request;
    type Response;

    fn serialize(&self, request: &Self::Request) -> Vec<u8>;

    fn deserialize(&self, payload: &[u8]) -> Result<Self::Response, DecodeError>;
}

/// Passes raw payload bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl MessageCodec for BytesCodec {
    type Request = Vec<u8>;
    type Response = Vec<u8>;

    fn serialize(&self, request: &Vec<u8>) -> Vec<u8> {
        request.clone()
    }

    fn deserialize(&self, payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(payload.to_vec())
    }
}
