//! JSON byte encoding for every off-chain document.
//!
//! Only well-formedness is checked here. `decode(encode(x)) == x` holds for all
//! payloads, extension fields included; byte-identical output across calls is
//! not promised. An extension field that shadows a known one would break that,
//! so `encode` refuses any object, at any depth, that repeats a key.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::AgentMetadata;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("extension field shadows a known field: {0}")]
    DuplicateField(String),
    #[error("payload does not decode back to itself: {0}")]
    NotRoundTrip(String),
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(payload).map_err(CodecError::Encode)?;
    serde_json::from_slice::<UniqueKeys>(&bytes)
        .map_err(|e| CodecError::DuplicateField(e.to_string()))?;
    Ok(bytes)
}

/// `encode` for typed documents. The bytes must decode to a value equal to
/// `payload`; an extension key naming an unset known field fails here.
pub fn encode_document<T>(payload: &T) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + DeserializeOwned + PartialEq,
{
    let bytes = encode(payload)?;
    match decode::<T>(&bytes) {
        Ok(back) if back == *payload => Ok(bytes),
        Ok(_) => Err(CodecError::NotRoundTrip(
            "a field moved between the schema and its extensions".to_string(),
        )),
        Err(e) => Err(CodecError::NotRoundTrip(e.to_string())),
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

pub fn encode_metadata(metadata: &AgentMetadata) -> Result<Vec<u8>, CodecError> {
    encode_document(metadata)
}

pub fn decode_metadata(bytes: &[u8]) -> Result<AgentMetadata, CodecError> {
    decode(bytes)
}

/// Any JSON value whose objects never repeat a key.
struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_unit<E: de::Error>(self) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<UniqueKeys, A::Error> {
        let mut seen = BTreeSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format!("duplicate field `{key}`")));
            }
            map.next_value::<UniqueKeys>()?;
        }
        Ok(UniqueKeys)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::model::{Endpoint, Registration};

    #[test]
    fn extension_fields_survive_round_trip() {
        let raw = json!({
            "type": "https://eips.ethereum.org/EIPS/eip-8004#registration-v1",
            "name": "Bot",
            "description": "x",
            "endpoints": [{"name": "A2A", "endpoint": "https://bot/a2a", "version": "0.3"}],
            "registrations": [{"agentId": 4, "agentRegistry": "sui:0xabc", "chainHint": "testnet"}],
            "supportedTrust": ["reputation"],
            "x-pricing": {"currency": "SUI", "perCall": 0.25},
            "tags": ["search", "日本語"]
        });
        let bytes = serde_json::to_vec(&raw).unwrap();

        let meta = decode_metadata(&bytes).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Bot"));
        assert_eq!(meta.extensions["x-pricing"]["currency"], "SUI");
        assert_eq!(
            meta.registrations.as_ref().unwrap()[0].extensions["chainHint"],
            "testnet"
        );

        let again = decode_metadata(&encode_metadata(&meta).unwrap()).unwrap();
        assert_eq!(again, meta);

        let as_value: serde_json::Value =
            serde_json::from_slice(&encode_metadata(&meta).unwrap()).unwrap();
        assert_eq!(as_value, raw);
    }

    #[test]
    fn sparse_document_stays_sparse() {
        let meta = decode_metadata(br#"{"name":"only"}"#).unwrap();
        assert_eq!(meta.description, None);
        let value: serde_json::Value =
            serde_json::from_slice(&encode_metadata(&meta).unwrap()).unwrap();
        assert_eq!(value, json!({"name": "only"}));
    }

    #[test]
    fn typed_round_trip() {
        let meta = AgentMetadata {
            name: Some("Bot".to_string()),
            endpoints: Some(vec![Endpoint {
                name: "MCP".to_string(),
                endpoint: "https://bot/mcp".to_string(),
                version: "1".to_string(),
                extensions: BTreeMap::new(),
            }]),
            registrations: Some(vec![Registration {
                agent_id: Some(9),
                agent_registry: Some("sui:0x1".to_string()),
                extensions: BTreeMap::new(),
            }]),
            ..Default::default()
        };
        assert_eq!(decode_metadata(&encode_metadata(&meta).unwrap()).unwrap(), meta);
    }

    #[test]
    fn nested_extension_fields_survive_round_trip() {
        let raw = json!({
            "endpoints": [
                {"name": "A2A", "endpoint": "https://a", "version": "1", "capabilities": ["x"]},
                {"name": "ENS", "endpoint": "bot.eth"}
            ],
            "registrations": [{"agentRegistry": "sui:0xabc"}]
        });

        let meta = decode_metadata(&serde_json::to_vec(&raw).unwrap()).unwrap();
        let endpoints = meta.endpoints.as_ref().unwrap();
        assert_eq!(endpoints[0].extensions["capabilities"], json!(["x"]));
        assert_eq!(endpoints[1].version, "");
        assert_eq!(meta.registrations.as_ref().unwrap()[0].agent_id, None);

        let again: serde_json::Value =
            serde_json::from_slice(&encode_metadata(&meta).unwrap()).unwrap();
        assert_eq!(again, raw);
    }

    #[test]
    fn shadowing_extension_is_rejected() {
        let mut meta = AgentMetadata {
            name: Some("Bot".to_string()),
            ..Default::default()
        };
        meta.extensions.insert("name".to_string(), json!("Other"));
        assert!(matches!(
            encode_metadata(&meta),
            Err(CodecError::DuplicateField(msg)) if msg.contains("`name`")
        ));

        let mut endpoint = Endpoint {
            name: "MCP".to_string(),
            endpoint: "https://bot/mcp".to_string(),
            version: "1".to_string(),
            ..Default::default()
        };
        endpoint.extensions.insert("endpoint".to_string(), json!("https://elsewhere"));
        let meta = AgentMetadata {
            endpoints: Some(vec![endpoint]),
            ..Default::default()
        };
        assert!(matches!(encode_metadata(&meta), Err(CodecError::DuplicateField(_))));

        let mut meta = AgentMetadata::default();
        meta.extensions.insert("description".to_string(), json!("hidden"));
        assert!(matches!(encode_metadata(&meta), Err(CodecError::NotRoundTrip(_))));

        meta.extensions.clear();
        meta.extensions.insert("x-description".to_string(), json!("fine"));
        assert!(encode_metadata(&meta).is_ok());
    }

    #[test]
    fn malformed_bytes_fail_decode() {
        assert!(matches!(decode_metadata(b"{not json"), Err(CodecError::Decode(_))));
        assert!(matches!(decode_metadata(b"[1,2]"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn unencodable_payload_fails_encode() {
        let mut bad: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        bad.insert((1, 2), 3);
        assert!(matches!(encode(&bad), Err(CodecError::Encode(_))));
    }
}
