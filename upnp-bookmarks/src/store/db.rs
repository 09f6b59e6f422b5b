use std::path::Path;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use upnp_archivable::{archive, unarchive, Record, StringAnnex, TypedAnnex, Usn};
use crate::store::hash;

/// Which record shape wrote a stored archive. The archive itself does not
/// say, so the store keeps it in its own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Record,
    StringAnnex,
    TypedAnnex,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Record => "record",
            Shape::StringAnnex => "string_annex",
            Shape::TypedAnnex => "typed_annex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "record" => Some(Shape::Record),
            "string_annex" => Some(Shape::StringAnnex),
            "typed_annex" => Some(Shape::TypedAnnex),
            _ => None,
        }
    }
}

/// Summary row of a stored bookmark, without decoding its archive
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub usn: Usn,
    pub location: String,
    pub shape: Shape,
    /// Caller's name for the payload type of a typed annex
    pub payload_tag: Option<String>,
    pub digest: String,
    pub saved_at: DateTime<Utc>,
}

struct StoredArchive {
    shape: Shape,
    payload_tag: Option<String>,
    archive: Vec<u8>,
}

pub struct BookmarkDb {
    conn: Connection,
}

impl BookmarkDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                usn          TEXT PRIMARY KEY,
                device_uuid  TEXT NOT NULL,
                location     TEXT NOT NULL,
                shape        TEXT NOT NULL,
                payload_tag  TEXT,
                archive      BLOB NOT NULL,
                digest       TEXT NOT NULL,
                saved_at     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_device_uuid ON bookmarks(device_uuid);
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Save a plain record. Returns true if the stored data changed.
    pub fn save_record(&self, record: &Record) -> Result<bool> {
        let bytes = archive(record).context("Failed to archive record")?;
        self.upsert(record, Shape::Record, None, &bytes)
    }

    /// Save a record with a string annex. Returns true if the stored data changed.
    pub fn save_annex(&self, annex: &StringAnnex) -> Result<bool> {
        let bytes = archive(annex).context("Failed to archive string annex")?;
        self.upsert(annex.record(), Shape::StringAnnex, None, &bytes)
    }

    /// Save a record with a typed annex under `payload_tag`, which must be
    /// passed again to load it. Returns true if the stored data changed.
    pub fn save_typed<T: Serialize + DeserializeOwned>(
        &self,
        annex: &TypedAnnex<T>,
        payload_tag: &str,
    ) -> Result<bool> {
        let bytes = archive(annex).context("Failed to archive typed annex")?;
        self.upsert(annex.record(), Shape::TypedAnnex, Some(payload_tag), &bytes)
    }

    fn upsert(&self, record: &Record, shape: Shape, payload_tag: Option<&str>, bytes: &[u8]) -> Result<bool> {
        let digest = hash::archive_digest(shape, payload_tag, bytes);

        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT digest FROM bookmarks WHERE usn = ?1",
                params![record.usn().as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query existing bookmark")?;

        let changed = existing.as_deref() != Some(digest.as_str());

        self.conn.execute(
            r#"
            INSERT INTO bookmarks (
                usn, device_uuid, location, shape, payload_tag, archive, digest, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(usn) DO UPDATE SET
                device_uuid = excluded.device_uuid,
                location = excluded.location,
                shape = excluded.shape,
                payload_tag = excluded.payload_tag,
                archive = excluded.archive,
                digest = excluded.digest,
                saved_at = excluded.saved_at
            "#,
            params![
                record.usn().as_str(),
                record.usn().uuid(),
                record.description_url(),
                shape.as_str(),
                payload_tag,
                bytes,
                &digest,
                timestamp(Utc::now()),
            ],
        )
        .context("Failed to upsert bookmark")?;

        tracing::debug!("Saved {} as {} (changed: {})", record.usn(), shape.as_str(), changed);
        Ok(changed)
    }

    /// Load any stored shape as a plain record
    pub fn load_record(&self, usn: &str) -> Result<Option<Record>> {
        let Some(stored) = self.stored_archive(usn)? else {
            return Ok(None);
        };

        let record: Record = unarchive(&stored.archive)
            .with_context(|| format!("Failed to decode bookmark {}", usn))?;
        Ok(Some(record))
    }

    /// Load a string annex. A plain record loads with no annex; a typed
    /// annex is refused since its payload is not a string map.
    pub fn load_annex(&self, usn: &str) -> Result<Option<StringAnnex>> {
        let Some(stored) = self.stored_archive(usn)? else {
            return Ok(None);
        };

        if stored.shape == Shape::TypedAnnex {
            bail!(
                "Bookmark {} holds a typed annex ({}), not a string annex",
                usn,
                stored.payload_tag.as_deref().unwrap_or("untagged")
            );
        }

        let annex: StringAnnex = unarchive(&stored.archive)
            .with_context(|| format!("Failed to decode bookmark {}", usn))?;
        Ok(Some(annex))
    }

    /// Load a typed annex saved under the same `payload_tag`.
    /// A plain record loads with no payload.
    pub fn load_typed<T: Serialize + DeserializeOwned>(
        &self,
        usn: &str,
        payload_tag: &str,
    ) -> Result<Option<TypedAnnex<T>>> {
        let Some(stored) = self.stored_archive(usn)? else {
            return Ok(None);
        };

        match stored.shape {
            Shape::Record => {}
            Shape::StringAnnex => bail!("Bookmark {} holds a string annex, not a typed annex", usn),
            Shape::TypedAnnex => {
                if stored.payload_tag.as_deref() != Some(payload_tag) {
                    bail!(
                        "Bookmark {} was saved with payload {}, not {}",
                        usn,
                        stored.payload_tag.as_deref().unwrap_or("untagged"),
                        payload_tag
                    );
                }
            }
        }

        let annex: TypedAnnex<T> = unarchive(&stored.archive)
            .with_context(|| format!("Failed to decode bookmark {}", usn))?;
        Ok(Some(annex))
    }

    /// Get a single bookmark summary by USN
    pub fn get(&self, usn: &str) -> Result<Option<Bookmark>> {
        let result = self
            .conn
            .query_row(
                "SELECT usn, location, shape, payload_tag, digest, saved_at
                 FROM bookmarks WHERE usn = ?1",
                params![usn],
                |row| Self::row_to_bookmark(row),
            )
            .optional()
            .context("Failed to query bookmark")?;

        Ok(result)
    }

    /// Get all bookmarks ordered by USN
    pub fn list(&self) -> Result<Vec<Bookmark>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT usn, location, shape, payload_tag, digest, saved_at
                 FROM bookmarks ORDER BY usn"
            )
            .context("Failed to prepare query")?;

        let bookmarks = stmt
            .query_map([], |row| Self::row_to_bookmark(row))
            .context("Failed to query bookmarks")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect bookmarks")?;

        Ok(bookmarks)
    }

    /// Get the bookmarks of one device (its root and all its services)
    pub fn list_device(&self, device_uuid: &str) -> Result<Vec<Bookmark>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT usn, location, shape, payload_tag, digest, saved_at
                 FROM bookmarks WHERE device_uuid = ?1 ORDER BY usn"
            )
            .context("Failed to prepare query")?;

        let bookmarks = stmt
            .query_map([device_uuid], |row| Self::row_to_bookmark(row))
            .context("Failed to query bookmarks by device")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect bookmarks")?;

        Ok(bookmarks)
    }

    /// Remove a bookmark. Returns true if one existed.
    pub fn forget(&self, usn: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM bookmarks WHERE usn = ?1", params![usn])
            .context("Failed to delete bookmark")?;
        Ok(count > 0)
    }

    /// Remove bookmarks not saved within the last `older_than_secs`.
    /// An age reaching before the earliest representable time removes nothing.
    pub fn prune(&self, older_than_secs: u64) -> Result<u64> {
        let cutoff = i64::try_from(older_than_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|age| Utc::now().checked_sub_signed(age));

        let Some(cutoff) = cutoff else {
            tracing::debug!("Prune age of {}s predates any bookmark, nothing to do", older_than_secs);
            return Ok(0);
        };

        let count = self
            .conn
            .execute(
                "DELETE FROM bookmarks WHERE saved_at < ?1",
                params![timestamp(cutoff)],
            )
            .context("Failed to prune old bookmarks")?;

        Ok(count as u64)
    }

    fn stored_archive(&self, usn: &str) -> Result<Option<StoredArchive>> {
        self.conn
            .query_row(
                "SELECT shape, payload_tag, archive FROM bookmarks WHERE usn = ?1",
                params![usn],
                |row| {
                    let shape: String = row.get(0)?;
                    Ok(StoredArchive {
                        shape: parse_shape(0, &shape)?,
                        payload_tag: row.get(1)?,
                        archive: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query bookmark archive")
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> Result<Bookmark, rusqlite::Error> {
        let usn: String = row.get(0)?;
        let shape_str: String = row.get(2)?;
        let saved_at_str: String = row.get(5)?;

        let saved_at = DateTime::parse_from_rfc3339(&saved_at_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?
            .with_timezone(&Utc);

        Ok(Bookmark {
            usn: Usn::from(usn),
            location: row.get(1)?,
            shape: parse_shape(2, &shape_str)?,
            payload_tag: row.get(3)?,
            digest: row.get(4)?,
            saved_at,
        })
    }
}

fn parse_shape(column: usize, value: &str) -> Result<Shape, rusqlite::Error> {
    Shape::parse(value).ok_or_else(|| rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unknown bookmark shape: {}", value).into(),
    ))
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use upnp_archivable::{DiscoveredObject, Metadata, UPnPObject};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct RoomInfo {
        room: String,
        floor: i32,
    }

    fn media_server() -> DiscoveredObject {
        DiscoveredObject::new(
            "uuid:abc::urn:schemas-upnp-org:device:MediaServer:1",
            "http://10.0.0.5:1234/desc.xml",
        )
    }

    fn kitchen() -> Metadata {
        Metadata::from([("room".to_string(), "kitchen".to_string())])
    }

    #[test]
    fn test_save_and_load_record() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let record = media_server().archivable();

        let changed = db.save_record(&record).unwrap();
        assert!(changed, "First save should report change");

        let restored = db.load_record(record.usn().as_str()).unwrap().unwrap();
        assert_eq!(restored, record);
        assert!(db.load_record("uuid:missing").unwrap().is_none());
    }

    #[test]
    fn test_save_detects_changes() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let record = media_server().archivable();

        db.save_record(&record).unwrap();
        assert!(!db.save_record(&record).unwrap(), "Identical save should not report change");

        let moved = Record::new(record.usn().clone(), "http://10.0.0.6:1234/desc.xml");
        assert!(db.save_record(&moved).unwrap(), "Moved device should report change");

        let annex = media_server().archivable_annex(None);
        assert!(db.save_annex(&annex).unwrap(), "Shape change should report change");
    }

    #[test]
    fn test_annex_states_survive_store() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let usn = media_server().usn.clone();

        db.save_annex(&media_server().archivable_annex(Some(kitchen()))).unwrap();
        let restored = db.load_annex(usn.as_str()).unwrap().unwrap();
        assert_eq!(restored.custom_metadata(), Some(&kitchen()));

        db.save_annex(&media_server().archivable_annex(None)).unwrap();
        let restored = db.load_annex(usn.as_str()).unwrap().unwrap();
        assert_eq!(restored.custom_metadata(), None);

        db.save_annex(&media_server().archivable_annex(Some(Metadata::new()))).unwrap();
        let restored = db.load_annex(usn.as_str()).unwrap().unwrap();
        assert_eq!(restored.custom_metadata(), Some(&Metadata::new()));
    }

    #[test]
    fn test_any_shape_loads_as_record() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let annex = media_server().archivable_annex(Some(kitchen()));
        db.save_annex(&annex).unwrap();

        let record = db.load_record(annex.usn().as_str()).unwrap().unwrap();
        assert_eq!(&record, annex.record());
    }

    #[test]
    fn test_record_loads_as_empty_annex() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let record = media_server().archivable();
        db.save_record(&record).unwrap();

        let annex = db.load_annex(record.usn().as_str()).unwrap().unwrap();
        assert_eq!(annex.custom_metadata(), None);

        let typed = db.load_typed::<RoomInfo>(record.usn().as_str(), "room@1").unwrap().unwrap();
        assert_eq!(typed.custom_metadata(), None);
    }

    #[test]
    fn test_typed_annex_requires_matching_tag() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let info = RoomInfo {
            room: "study".to_string(),
            floor: 2,
        };
        let annex = media_server().archivable_typed(Some(info.clone()));
        let usn = annex.usn().as_str().to_string();
        db.save_typed(&annex, "room@1").unwrap();

        let restored = db.load_typed::<RoomInfo>(&usn, "room@1").unwrap().unwrap();
        assert_eq!(restored.custom_metadata(), Some(&info));

        assert!(db.load_typed::<RoomInfo>(&usn, "room@2").is_err());
        assert!(db.load_annex(&usn).is_err());

        let bookmark = db.get(&usn).unwrap().unwrap();
        assert_eq!(bookmark.shape, Shape::TypedAnnex);
        assert_eq!(bookmark.payload_tag.as_deref(), Some("room@1"));
    }

    #[test]
    fn test_string_annex_refused_as_typed() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let annex = media_server().archivable_annex(Some(kitchen()));
        db.save_annex(&annex).unwrap();

        assert!(db.load_typed::<Metadata>(annex.usn().as_str(), "room@1").is_err());
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let record = media_server().archivable();
        db.save_record(&record).unwrap();

        db.conn
            .execute(
                "UPDATE bookmarks SET archive = ?1 WHERE usn = ?2",
                params![br#"{"descriptionURL":"http://h/d.xml"}"#.as_slice(), record.usn().as_str()],
            )
            .unwrap();

        let err = db.load_record(record.usn().as_str()).unwrap_err();
        let archive_err = err.downcast_ref::<upnp_archivable::ArchiveError>().unwrap();
        assert!(archive_err.is_malformed_record());
    }

    #[test]
    fn test_list_and_list_device() {
        let db = BookmarkDb::open(":memory:").unwrap();

        db.save_record(&Record::new("uuid:b::upnp:rootdevice", "http://b/d.xml")).unwrap();
        db.save_record(&Record::new(
            "uuid:b::urn:schemas-upnp-org:service:ContentDirectory:1",
            "http://b/d.xml",
        ))
        .unwrap();
        db.save_annex(&StringAnnex::new("uuid:a", "http://a/d.xml", Some(kitchen()))).unwrap();

        let all = db.list().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].usn.as_str(), "uuid:a");
        assert_eq!(all[0].shape, Shape::StringAnnex);

        let device_b = db.list_device("b").unwrap();
        assert_eq!(device_b.len(), 2);
        assert!(device_b.iter().all(|b| b.usn.uuid() == "b"));
    }

    #[test]
    fn test_forget() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let record = media_server().archivable();
        db.save_record(&record).unwrap();

        assert!(db.forget(record.usn().as_str()).unwrap());
        assert!(!db.forget(record.usn().as_str()).unwrap());
        assert!(db.get(record.usn().as_str()).unwrap().is_none());
    }

    #[test]
    fn test_prune_old_bookmarks() {
        let db = BookmarkDb::open(":memory:").unwrap();
        db.save_record(&Record::new("uuid:old", "http://o/d.xml")).unwrap();
        db.save_record(&Record::new("uuid:new", "http://n/d.xml")).unwrap();

        let long_ago = timestamp(Utc::now() - chrono::Duration::days(90));
        db.conn
            .execute(
                "UPDATE bookmarks SET saved_at = ?1 WHERE usn = 'uuid:old'",
                params![long_ago],
            )
            .unwrap();

        assert_eq!(db.prune(3600).unwrap(), 1);
        let remaining = db.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].usn.as_str(), "uuid:new");
    }

    #[test]
    fn test_prune_zero_removes_everything_saved_before_now() {
        let db = BookmarkDb::open(":memory:").unwrap();
        db.save_record(&Record::new("uuid:a", "http://a/d.xml")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(db.prune(0).unwrap(), 1);
        assert!(db.list().unwrap().is_empty());
    }

    #[test]
    fn test_prune_huge_age_keeps_everything() {
        let db = BookmarkDb::open(":memory:").unwrap();
        db.save_record(&Record::new("uuid:a", "http://a/d.xml")).unwrap();

        assert_eq!(db.prune(u64::MAX).unwrap(), 0);
        assert_eq!(db.prune(100_000_000_000_000_000).unwrap(), 0);
        assert_eq!(db.prune(i64::MAX as u64).unwrap(), 0);
        assert_eq!(db.list().unwrap().len(), 1);
    }

    #[test]
    fn test_null_encoding_payload_survives_store() {
        let db = BookmarkDb::open(":memory:").unwrap();
        let annex: TypedAnnex<Option<u32>> = media_server().archivable_typed(Some(None));
        let usn = annex.usn().as_str().to_string();
        db.save_typed(&annex, "volume@1").unwrap();

        let restored = db.load_typed::<Option<u32>>(&usn, "volume@1").unwrap().unwrap();
        assert_eq!(restored.custom_metadata(), Some(&None));
    }
}
