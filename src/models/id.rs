// src/models/id.rs

use std::{
    fmt,
    str::FromStr,
    sync::{
        LazyLock,
        atomic::{AtomicU32, Ordering},
    },
};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

use crate::error::AppError;

static OBJECT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("object id pattern compiles"));

/// Per-process random bytes (bytes 4..9 of every generated id).
static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(|| {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
});

static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    AtomicU32::new(u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]))
});

/// 12-byte document identifier, rendered as 24 lowercase hex characters.
///
/// Layout: 4-byte big-endian unix timestamp, 5 process-unique bytes, 3-byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidObjectId(pub String);

impl fmt::Display for InvalidObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid object id", self.0)
    }
}

impl std::error::Error for InvalidObjectId {}

impl ObjectId {
    pub fn new() -> Self {
        let timestamp = chrono::Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Whether `value` has the shape of an object id.
    pub fn is_valid(value: &str) -> bool {
        OBJECT_ID_PATTERN.is_match(value)
    }

    pub fn parse(value: &str) -> Result<Self, InvalidObjectId> {
        if !Self::is_valid(value) {
            return Err(InvalidObjectId(value.to_string()));
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &value[i * 2..i * 2 + 2];
            *byte =
                u8::from_str_radix(pair, 16).map_err(|_| InvalidObjectId(value.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Parses a request-supplied identifier, failing with 400 `Invalid <label>`.
    pub fn from_param(value: &str, label: &str) -> Result<Self, AppError> {
        Self::parse(value).map_err(|_| AppError::BadRequest(format!("Invalid {}", label)))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
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

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::String(id.to_hex())
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
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_24_hex_chars_in_either_case() {
        assert!(ObjectId::is_valid("65a1f0c2e4b0a1b2c3d4e5f6"));
        assert!(ObjectId::is_valid("65A1F0C2E4B0A1B2C3D4E5F6"));
    }

    #[test]
    fn rejects_other_shapes() {
        for raw in [
            "",
            "abc",
            "65a1f0c2e4b0a1b2c3d4e5f",
            "65a1f0c2e4b0a1b2c3d4e5f60",
            "65a1f0c2e4b0a1b2c3d4e5fg",
            " 65a1f0c2e4b0a1b2c3d4e5f6",
            "not-an-object-id-at-all!",
        ] {
            assert!(!ObjectId::is_valid(raw), "{raw:?} should be rejected");
            assert!(ObjectId::parse(raw).is_err());
        }
    }

    #[test]
    fn parse_normalizes_to_lowercase() {
        let id = ObjectId::parse("65A1F0C2E4B0A1B2C3D4E5F6").unwrap();
        assert_eq!(id.to_string(), "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(id, ObjectId::parse("65a1f0c2e4b0a1b2c3d4e5f6").unwrap());
    }

    #[test]
    fn generated_ids_are_unique_and_valid() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert!(ObjectId::is_valid(&a.to_hex()));
        assert!(a.timestamp() > 0);
    }

    #[test]
    fn from_param_maps_to_bad_request() {
        let err = ObjectId::from_param("xyz", "video ID").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Invalid video ID"));
    }

    #[test]
    fn serde_round_trips_as_string() {
        let id = ObjectId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, Value::String(id.to_hex()));
        let back: ObjectId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
