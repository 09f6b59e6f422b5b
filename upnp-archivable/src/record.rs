use std::collections::HashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::archive::{ArchiveDecoder, ArchiveEncoder};
use crate::error::{ArchiveError, FieldFault};
use crate::protocol::{FIELD_CUSTOM_METADATA, FIELD_DESCRIPTION_URL, FIELD_USN};
use crate::usn::Usn;

/// Free-form annex data for a custom device or service type
pub type Metadata = HashMap<String, String>;

/// A shape that can be written to and read back from a keyed archiver.
///
/// The caller picks the shape at both ends; nothing in the archive says which
/// shape wrote it.
pub trait Archivable: Sized {
    fn encode_with<E: ArchiveEncoder>(&self, encoder: &mut E) -> Result<(), ArchiveError>;

    fn decode_from<D: ArchiveDecoder>(decoder: &D) -> Result<Self, ArchiveError>;
}

/// Reference to a device or service: its USN and description document URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    usn: Usn,
    description_url: String,
}

impl Record {
    pub fn new(usn: impl Into<Usn>, description_url: impl Into<String>) -> Self {
        Self {
            usn: usn.into(),
            description_url: description_url.into(),
        }
    }

    pub fn usn(&self) -> &Usn {
        &self.usn
    }

    pub fn description_url(&self) -> &str {
        &self.description_url
    }

    pub fn into_parts(self) -> (Usn, String) {
        (self.usn, self.description_url)
    }
}

impl Archivable for Record {
    fn encode_with<E: ArchiveEncoder>(&self, encoder: &mut E) -> Result<(), ArchiveError> {
        encoder.encode_string(FIELD_USN, self.usn.as_str())?;
        encoder.encode_string(FIELD_DESCRIPTION_URL, &self.description_url)?;
        Ok(())
    }

    fn decode_from<D: ArchiveDecoder>(decoder: &D) -> Result<Self, ArchiveError> {
        let usn = required_string(decoder, FIELD_USN)?;
        if usn.is_empty() {
            return Err(malformed(FIELD_USN, FieldFault::Empty));
        }
        let description_url = required_string(decoder, FIELD_DESCRIPTION_URL)?;

        Ok(Self {
            usn: Usn::from(usn),
            description_url,
        })
    }
}

fn required_string<D: ArchiveDecoder>(decoder: &D, field: &'static str) -> Result<String, ArchiveError> {
    match decoder.decode_string(field) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(malformed(field, FieldFault::Missing)),
        Err(mismatch) => Err(malformed(field, FieldFault::WrongType(mismatch.reason))),
    }
}

fn malformed(field: &'static str, fault: FieldFault) -> ArchiveError {
    tracing::warn!("Rejecting archived record: `{}` {}", field, fault);
    ArchiveError::MalformedRecord { field, fault }
}

/// Record with an optional string-to-string annex.
///
/// `None` means no annex was supplied; `Some` of an empty map means one was
/// supplied with nothing in it. Both survive an archive round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringAnnex {
    record: Record,
    custom_metadata: Option<Metadata>,
}

impl StringAnnex {
    pub fn new(
        usn: impl Into<Usn>,
        description_url: impl Into<String>,
        custom_metadata: Option<Metadata>,
    ) -> Self {
        Self {
            record: Record::new(usn, description_url),
            custom_metadata,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn usn(&self) -> &Usn {
        self.record.usn()
    }

    pub fn description_url(&self) -> &str {
        self.record.description_url()
    }

    pub fn custom_metadata(&self) -> Option<&Metadata> {
        self.custom_metadata.as_ref()
    }

    pub fn into_parts(self) -> (Record, Option<Metadata>) {
        (self.record, self.custom_metadata)
    }
}

impl Archivable for StringAnnex {
    fn encode_with<E: ArchiveEncoder>(&self, encoder: &mut E) -> Result<(), ArchiveError> {
        self.record.encode_with(encoder)?;
        encoder.encode_string_map(FIELD_CUSTOM_METADATA, self.custom_metadata.as_ref())?;
        tracing::debug!("Encoded string annex for {}", self.record.usn);
        Ok(())
    }

    fn decode_from<D: ArchiveDecoder>(decoder: &D) -> Result<Self, ArchiveError> {
        let record = Record::decode_from(decoder)?;
        let custom_metadata = decoder
            .decode_string_map(FIELD_CUSTOM_METADATA)
            .map_err(|mismatch| annex_mismatch(&record, mismatch.reason))?;
        tracing::debug!("Decoded string annex for {}", record.usn);

        Ok(Self {
            record,
            custom_metadata,
        })
    }
}

/// Record with an optional caller-defined payload.
///
/// The payload shares its archive field with [`StringAnnex`] but is written
/// wrapped, so a present payload that encodes as `null` still reads back as
/// present. Decoding with a different `T` than the one used to encode is
/// caught only when the two encoded forms are incompatible; callers must keep
/// track of `T` themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedAnnex<T> {
    record: Record,
    custom_metadata: Option<T>,
}

impl<T> TypedAnnex<T> {
    pub fn new(usn: impl Into<Usn>, description_url: impl Into<String>, custom_metadata: Option<T>) -> Self {
        Self {
            record: Record::new(usn, description_url),
            custom_metadata,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn usn(&self) -> &Usn {
        self.record.usn()
    }

    pub fn description_url(&self) -> &str {
        self.record.description_url()
    }

    pub fn custom_metadata(&self) -> Option<&T> {
        self.custom_metadata.as_ref()
    }

    pub fn into_parts(self) -> (Record, Option<T>) {
        (self.record, self.custom_metadata)
    }
}

impl<T: Serialize + DeserializeOwned> Archivable for TypedAnnex<T> {
    fn encode_with<E: ArchiveEncoder>(&self, encoder: &mut E) -> Result<(), ArchiveError> {
        self.record.encode_with(encoder)?;
        encoder.encode_optional(FIELD_CUSTOM_METADATA, self.custom_metadata.as_ref())?;
        tracing::debug!(
            "Encoded typed annex for {} ({})",
            self.record.usn,
            std::any::type_name::<T>()
        );
        Ok(())
    }

    fn decode_from<D: ArchiveDecoder>(decoder: &D) -> Result<Self, ArchiveError> {
        let record = Record::decode_from(decoder)?;
        let custom_metadata = decoder
            .decode_optional::<T>(FIELD_CUSTOM_METADATA)
            .map_err(|mismatch| annex_mismatch(&record, mismatch.reason))?;
        tracing::debug!(
            "Decoded typed annex for {} ({})",
            record.usn,
            std::any::type_name::<T>()
        );

        Ok(Self {
            record,
            custom_metadata,
        })
    }
}

fn annex_mismatch(record: &Record, reason: String) -> ArchiveError {
    tracing::warn!("Rejecting annex of {}: {}", record.usn, reason);
    ArchiveError::MalformedAnnex {
        field: FIELD_CUSTOM_METADATA,
        reason,
    }
}
