//! Structural codec used to prove values survive a trip through their
//! serialized form.
//!
//! The format is CBOR (via ciborium). Bytes never leave the process; only the
//! success or failure of the round trip matters.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Failure to move a value through its serialized form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CodecError {
    /// The value refused to serialize (e.g. a field whose `Serialize` impl
    /// errors).
    #[error("encode failed: {0}")]
    Encode(String),

    /// The serialized bytes could not be read back as the same type.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The value was mutably borrowed, so it could not be read.
    #[error("value is mutably borrowed")]
    Borrowed,
}

/// Serialize `value` to CBOR.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Deserialize a `T` from CBOR bytes.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
