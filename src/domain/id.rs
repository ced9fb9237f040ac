use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

const ID_BYTES: usize = 12;
const ID_LEN: usize = ID_BYTES * 2;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Identifier shared by users, posts, comments, stories and graph edges:
/// exactly 24 hex digits, stored lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_BYTES]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id {0:?}: expected 24 hexadecimal characters")]
pub struct InvalidObjectId(pub String);

impl ObjectId {
    /// Timestamp (4 bytes, big-endian seconds), 5 random bytes, 3-byte counter.
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        let seconds = OffsetDateTime::now_utc().unix_timestamp() as u32;
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        rand::thread_rng().fill_bytes(&mut bytes[4..9]);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidObjectId> {
        if raw.len() != ID_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidObjectId(raw.to_string()));
        }
        let mut bytes = [0u8; ID_BYTES];
        hex::decode_to_slice(raw, &mut bytes).map_err(|_| InvalidObjectId(raw.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
