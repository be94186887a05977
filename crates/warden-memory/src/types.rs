use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic chunk ids. Changing it invalidates every
/// persisted index.
const CHUNK_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9d3b_5e07_8a61_c4f2_0b9d_7e35);

/// Field separator for the chunk key; cannot appear in a well-formed path.
const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("access label is empty")]
    Empty,
    #[error("access label {0:?} contains control characters")]
    ControlCharacter(String),
}

/// Access-control tag carried by every chunk.
///
/// Matching is exact and case-sensitive. [`AccessLabel::general`] is the
/// reserved label visible to every role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessLabel(String);

impl AccessLabel {
    pub const GENERAL: &'static str = "general";

    /// # Errors
    ///
    /// Returns [`LabelError`] if the trimmed label is empty or contains
    /// control characters.
    pub fn new(label: impl AsRef<str>) -> Result<Self, LabelError> {
        let trimmed = label.as_ref().trim();
        if trimmed.is_empty() {
            return Err(LabelError::Empty);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(LabelError::ControlCharacter(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn general() -> Self {
        Self(Self::GENERAL.to_owned())
    }

    #[must_use]
    pub fn is_general(&self) -> bool {
        self.0 == Self::GENERAL
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccessLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccessLabel {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccessLabel> for String {
    fn from(label: AccessLabel) -> Self {
        label.0
    }
}

/// Stable identity of a chunk, derived from its document and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(Uuid);

impl ChunkId {
    /// Deterministic id for chunk `sequence_index` of `source_id`.
    ///
    /// Re-chunking an unchanged document yields the same ids, so upserts
    /// overwrite instead of duplicating.
    #[must_use]
    pub fn derive(source_id: &str, sequence_index: usize) -> Self {
        let key = format!("{source_id}{KEY_SEPARATOR}{sequence_index}");
        Self(Uuid::new_v5(&CHUNK_NAMESPACE, key.as_bytes()))
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ChunkId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ChunkId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Conversation key. Usually the resolved username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_trimmed() {
        let label = AccessLabel::new("  finance ").unwrap();
        assert_eq!(label.as_str(), "finance");
    }

    #[test]
    fn label_rejects_empty_and_control() {
        assert_eq!(AccessLabel::new("   "), Err(LabelError::Empty));
        assert!(matches!(
            AccessLabel::new("hr\u{0}"),
            Err(LabelError::ControlCharacter(_))
        ));
    }

    #[test]
    fn general_label() {
        assert!(AccessLabel::general().is_general());
        assert!(AccessLabel::new("general").unwrap().is_general());
        assert!(!AccessLabel::new("General").unwrap().is_general());
    }

    #[test]
    fn label_serde_validates() {
        let ok: AccessLabel = serde_json::from_str("\"hr\"").unwrap();
        assert_eq!(ok.as_str(), "hr");
        assert!(serde_json::from_str::<AccessLabel>("\"\"").is_err());
    }

    #[test]
    fn chunk_id_is_deterministic() {
        assert_eq!(
            ChunkId::derive("handbook.md", 3),
            ChunkId::derive("handbook.md", 3)
        );
    }

    #[test]
    fn chunk_id_distinguishes_fields() {
        assert_ne!(ChunkId::derive("a.md", 0), ChunkId::derive("a.md", 1));
        assert_ne!(ChunkId::derive("a.md", 0), ChunkId::derive("b.md", 0));
        // Plain concatenation would collide here.
        assert_ne!(ChunkId::derive("doc1", 12), ChunkId::derive("doc11", 2));
    }

    #[test]
    fn chunk_id_round_trips_through_string() {
        let id = ChunkId::derive("x", 0);
        let parsed: ChunkId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn chunk_id_serializes_as_uuid_string() {
        let id = ChunkId::derive("hr/handbook.md", 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ChunkId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
