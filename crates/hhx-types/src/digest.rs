use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content digest of a tracked file.
///
/// A 32-byte BLAKE3 output, produced by a domain-separated content hasher
/// (`hhx_crypto::ContentHasher`). Identical content under the same domain
/// always produces the same digest, so comparing digests is how the index
/// decides whether a file changed since it was last synced. It is serialized
/// as a 64-character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Length of the hex representation.
    pub const HEX_LEN: usize = 64;

    /// Create a `Digest` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Digest {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8 * 7;
        }
        Digest::from_hash(bytes)
    }

    #[test]
    fn hex_is_fixed_length() {
        let d = sample();
        assert_eq!(d.to_hex().len(), Digest::HEX_LEN);
        assert_eq!(d.short_hex().len(), 8);
        assert_eq!(format!("{d}"), d.to_hex());
    }

    #[test]
    fn short_hex_is_prefix() {
        let d = sample();
        assert_eq!(d.short_hex(), "00070e15");
        assert!(d.to_hex().starts_with(&d.short_hex()));
        assert_eq!(format!("{d:?}"), "Digest(00070e15)");
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(matches!(Digest::from_hex("zz"), Err(TypeError::InvalidHex(_))));
        assert_eq!(
            Digest::from_hex("abcd"),
            Err(TypeError::InvalidLength { expected: 32, actual: 2 })
        );
    }

    #[test]
    fn serializes_as_hex_string() {
        let d = sample();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn deserialize_rejects_short_hex() {
        let result: Result<Digest, _> = serde_json::from_str("\"abcd\"");
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn hex_parse_inverts_to_hex(bytes in proptest::array::uniform32(any::<u8>())) {
            let d = Digest::from_hash(bytes);
            prop_assert_eq!(d.to_hex().parse::<Digest>().unwrap(), d);
        }
    }
}
