//! Chunk metadata stored as point payload.

use std::collections::HashMap;

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{PointId, PointStruct, Value, point_id};

use crate::types::{AccessLabel, ChunkId};
use crate::vector_store::{IndexEntry, IndexedVector, VectorStoreError};

pub(super) const LABEL: &str = "access_label";
pub(super) const SOURCE: &str = "source_id";
const SEQUENCE: &str = "sequence_index";
const TEXT: &str = "text";

type Payload = HashMap<String, Value>;

fn corrupt(detail: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Serialization(detail.to_string())
}

/// Point id is the chunk's UUID, so re-upserting a chunk overwrites it.
pub(super) fn to_point(entry: IndexedVector) -> Result<PointStruct, VectorStoreError> {
    let sequence = i64::try_from(entry.sequence_index).map_err(corrupt)?;
    let payload = Payload::from([
        (LABEL.to_owned(), Value::from(String::from(entry.access_label))),
        (SOURCE.to_owned(), Value::from(entry.source_id)),
        (SEQUENCE.to_owned(), Value::from(sequence)),
        (TEXT.to_owned(), Value::from(entry.text)),
    ]);
    Ok(PointStruct::new(
        entry.chunk_id.to_string(),
        entry.embedding,
        payload,
    ))
}

pub(super) fn to_entry(
    id: Option<PointId>,
    payload: &Payload,
) -> Result<IndexEntry, VectorStoreError> {
    let chunk_id: ChunkId = match id.and_then(|p| p.point_id_options) {
        Some(point_id::PointIdOptions::Uuid(uuid)) => uuid
            .parse()
            .map_err(|e| corrupt(format!("point id {uuid:?}: {e}")))?,
        other => return Err(corrupt(format!("point id {other:?} is not a uuid"))),
    };
    let sequence_index = match kind(payload, SEQUENCE) {
        Some(Kind::IntegerValue(n)) => usize::try_from(*n).map_err(corrupt)?,
        _ => return Err(corrupt(format!("payload field {SEQUENCE} is not an integer"))),
    };
    Ok(IndexEntry {
        chunk_id,
        source_id: string(payload, SOURCE)?,
        sequence_index,
        text: string(payload, TEXT)?,
        access_label: AccessLabel::new(string(payload, LABEL)?).map_err(corrupt)?,
    })
}

fn kind<'a>(payload: &'a Payload, field: &str) -> Option<&'a Kind> {
    payload.get(field).and_then(|v| v.kind.as_ref())
}

fn string(payload: &Payload, field: &str) -> Result<String, VectorStoreError> {
    match kind(payload, field) {
        Some(Kind::StringValue(s)) => Ok(s.clone()),
        _ => Err(corrupt(format!("payload field {field} is not a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IndexedVector {
        IndexedVector {
            chunk_id: ChunkId::derive("handbook.md", 2),
            source_id: "handbook.md".into(),
            sequence_index: 2,
            embedding: vec![0.0, 1.0],
            text: "vacation".into(),
            access_label: AccessLabel::new("hr").unwrap(),
        }
    }

    #[test]
    fn point_keeps_chunk_metadata() {
        let point = to_point(sample()).unwrap();
        let entry = to_entry(point.id, &point.payload).unwrap();
        assert_eq!(entry.chunk_id, ChunkId::derive("handbook.md", 2));
        assert_eq!(entry.source_id, "handbook.md");
        assert_eq!(entry.sequence_index, 2);
        assert_eq!(entry.access_label.as_str(), "hr");
    }

    #[test]
    fn missing_field_is_corrupt() {
        let mut point = to_point(sample()).unwrap();
        point.payload.remove(TEXT);
        let err = to_entry(point.id, &point.payload).unwrap_err();
        assert!(matches!(err, VectorStoreError::Serialization(m) if m.contains("text")));
    }

    #[test]
    fn numeric_point_id_is_rejected() {
        let point = to_point(sample()).unwrap();
        let err = to_entry(Some(PointId::from(7_u64)), &point.payload).unwrap_err();
        assert!(matches!(err, VectorStoreError::Serialization(_)));
    }
}
