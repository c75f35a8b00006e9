//! Base64 serialization/deserialization for raw output payloads.
//!
//! Output item data is binary (`bytes::Bytes`) in memory but crosses the
//! host/webview boundary as a base64 string inside JSON.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serialize a byte payload as a base64-encoded string.
///
/// Used with `#[serde(serialize_with = "serialize_payload")]`
pub fn serialize_payload<S>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    BASE64_STANDARD.encode(data).serialize(serializer)
}

/// Deserialize a base64-encoded string into a byte payload.
///
/// Handles both `null` and a missing field gracefully, returning an empty
/// payload in those cases.
///
/// Used with `#[serde(default, deserialize_with = "deserialize_payload")]`
pub fn deserialize_payload<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    match encoded {
        Some(s) => BASE64_STANDARD
            .decode(s)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom),
        None => Ok(Bytes::new()),
    }
}
