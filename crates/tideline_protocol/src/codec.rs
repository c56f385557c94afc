//! CBOR encoding for protocol payloads.
//!
//! Every payload type derives serde's `Serialize`/`Deserialize`; the blanket
//! implementations below give them `encode_cbor`/`decode_cbor`.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for CBOR encoding.
pub trait CborEncode {
    /// Encodes self to CBOR bytes.
    fn encode_cbor(&self) -> ProtocolResult<Vec<u8>>;
}

/// Trait for CBOR decoding.
pub trait CborDecode: Sized {
    /// Decodes self from CBOR bytes.
    fn decode_cbor(bytes: &[u8]) -> ProtocolResult<Self>;
}

impl<T: Serialize> CborEncode for T {
    fn encode_cbor(&self) -> ProtocolResult<Vec<u8>> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(self, &mut buffer)
            .map_err(|e| ProtocolError::encode(e.to_string()))?;
        Ok(buffer)
    }
}

impl<T: DeserializeOwned> CborDecode for T {
    fn decode_cbor(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::decode(e.to_string()))
    }
}
