use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Encode(String),
    Decode(String),
    /// The text wrapper around the archive was not valid.
    Text(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(msg) => write!(f, "encode failed: {msg}"),
            CodecError::Decode(msg) => write!(f, "decode failed: {msg}"),
            CodecError::Text(msg) => write!(f, "bad archive text: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

pub fn encode<T>(value: &T) -> Result<Vec<u8>, CodecError>
where
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
{
    rkyv::to_bytes::<Error>(value)
        .map(|bytes| bytes.into_vec())
        .map_err(|err| CodecError::Encode(err.to_string()))
}

/// Validates and deserializes an archive. Input of any alignment is accepted.
pub fn decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: Archive,
    T::Archived:
        for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
{
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<T, Error>(&aligned).map_err(|err| CodecError::Decode(err.to_string()))
}

/// Archive wrapped in standard base64, for string-only stores.
pub fn encode_text<T>(value: &T) -> Result<String, CodecError>
where
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
{
    encode(value).map(|bytes| STANDARD.encode(bytes))
}

pub fn decode_text<T>(text: &str) -> Result<T, CodecError>
where
    T: Archive,
    T::Archived:
        for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
{
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|err| CodecError::Text(err.to_string()))?;
    decode(&bytes)
}
