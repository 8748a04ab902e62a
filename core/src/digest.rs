use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// SHA-256 digest of an off-chain payload, captured at write time and stored
/// next to its pointer on-chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest the exact bytes that are sent to the content store.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, no prefix. Doubles as the canonical request key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse 64 hex chars, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(trimmed).map_err(|e| format!("Invalid digest hex: {e}"))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|v: Vec<u8>| format!("Digest must be 32 bytes, got {}", v.len()))?;
        Ok(Self(bytes))
    }

    /// Accepts the shapes a ledger returns a `vector<u8>` in: a hex string or
    /// an array of byte values.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::from_hex(s).ok(),
            serde_json::Value::Array(items) => {
                let raw: Option<Vec<u8>> = items
                    .iter()
                    .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                    .collect();
                let bytes: [u8; 32] = raw?.try_into().ok()?;
                Some(Self(bytes))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let d = ContentDigest::of(b"abc");
        assert_eq!(
            d.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_parse_accepts_prefix() {
        let d = ContentDigest::of(b"payload");
        let with_prefix = format!("0x{}", d.to_hex());
        assert_eq!(ContentDigest::from_hex(&with_prefix).unwrap(), d);
    }

    #[test]
    fn hex_parse_rejects_short_input() {
        assert!(ContentDigest::from_hex("abcd").is_err());
    }

    #[test]
    fn json_byte_array_shape() {
        let d = ContentDigest::of(b"x");
        let arr = serde_json::Value::Array(
            d.as_bytes().iter().map(|b| serde_json::json!(b)).collect(),
        );
        assert_eq!(ContentDigest::from_json(&arr), Some(d));
        assert_eq!(ContentDigest::from_json(&serde_json::json!(d.to_hex())), Some(d));
        assert_eq!(ContentDigest::from_json(&serde_json::json!(7)), None);
    }
}
