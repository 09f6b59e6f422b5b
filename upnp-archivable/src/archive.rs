use std::collections::HashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use crate::error::ArchiveError;
use crate::record::Archivable;

/// A present field whose encoded form does not match the requested type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TypeMismatch {
    pub reason: String,
}

/// Write side of a named-field archiver
pub trait ArchiveEncoder {
    /// Write any serializable value under `field`, replacing a previous value
    fn encode_value<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<(), ArchiveError>;

    fn encode_string(&mut self, field: &'static str, value: &str) -> Result<(), ArchiveError> {
        self.encode_value(field, value)
    }

    /// Absent and empty maps must stay distinguishable, so `None` is written
    /// as an explicit value rather than by leaving the field out.
    fn encode_string_map(
        &mut self,
        field: &'static str,
        value: Option<&HashMap<String, String>>,
    ) -> Result<(), ArchiveError> {
        self.encode_value(field, &value)
    }

    /// Optional payload of any type. A present value is wrapped in a
    /// one-element array so that a payload which itself encodes as `null`
    /// stays distinguishable from an absent one.
    fn encode_optional<T: Serialize>(
        &mut self,
        field: &'static str,
        value: Option<&T>,
    ) -> Result<(), ArchiveError> {
        self.encode_value(field, &value.map(|v| [v]))
    }
}

/// Read side of a named-field archiver
pub trait ArchiveDecoder {
    /// `Ok(None)` when the field is not in the archive at all
    fn decode_value<T: DeserializeOwned>(&self, field: &'static str) -> Result<Option<T>, TypeMismatch>;

    fn decode_string(&self, field: &'static str) -> Result<Option<String>, TypeMismatch> {
        self.decode_value(field)
    }

    /// A missing field and an explicit null both read as `None`
    fn decode_string_map(
        &self,
        field: &'static str,
    ) -> Result<Option<HashMap<String, String>>, TypeMismatch> {
        Ok(self.decode_value::<Option<HashMap<String, String>>>(field)?.flatten())
    }

    /// Counterpart of [`ArchiveEncoder::encode_optional`]. A missing field and
    /// an explicit null read as `None`; anything but a one-element array is a
    /// mismatch.
    fn decode_optional<T: DeserializeOwned>(&self, field: &'static str) -> Result<Option<T>, TypeMismatch> {
        Ok(self
            .decode_value::<Option<(T,)>>(field)?
            .flatten()
            .map(|(value,)| value))
    }
}

/// In-memory keyed archive persisted as a JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedArchive {
    fields: Map<String, Value>,
}

impl KeyedArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let fields: Map<String, Value> =
            serde_json::from_slice(bytes).map_err(|e| ArchiveError::Format(e.to_string()))?;
        Ok(Self { fields })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        Value::Object(self.fields.clone()).to_string().into_bytes()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> bool {
        self.fields.remove(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl ArchiveEncoder for KeyedArchive {
    fn encode_value<T: Serialize + ?Sized>(
        &mut self,
        field: &'static str,
        value: &T,
    ) -> Result<(), ArchiveError> {
        let encoded = serde_json::to_value(value).map_err(|e| ArchiveError::Encode {
            field,
            reason: e.to_string(),
        })?;
        self.fields.insert(field.to_string(), encoded);
        Ok(())
    }
}

impl ArchiveDecoder for KeyedArchive {
    fn decode_value<T: DeserializeOwned>(&self, field: &'static str) -> Result<Option<T>, TypeMismatch> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| TypeMismatch { reason: e.to_string() }),
        }
    }
}

/// Encode a record shape into archive bytes
pub fn archive<R: Archivable>(record: &R) -> Result<Vec<u8>, ArchiveError> {
    let mut archive = KeyedArchive::new();
    record.encode_with(&mut archive)?;
    Ok(archive.to_bytes())
}

/// Decode archive bytes with the shape they were encoded with
pub fn unarchive<R: Archivable>(bytes: &[u8]) -> Result<R, ArchiveError> {
    let archive = KeyedArchive::from_bytes(bytes)?;
    R::decode_from(&archive)
}
