//! Persistence envelope for discovered UPnP devices and services.
//!
//! A live device or service object is converted into one of three record
//! shapes, written into a keyed archiver, and later decoded back with the
//! same shape. The caller looks the live object up again by its USN.
//!
//! - [`Record`]: USN + description URL.
//! - [`StringAnnex`]: a record plus an optional string-to-string map.
//! - [`TypedAnnex`]: a record plus an optional caller-defined payload.
//!
//! ```ignore
//! let record = device.archivable_annex(Some(metadata));
//! let bytes = archive(&record)?;
//! let restored: StringAnnex = unarchive(&bytes)?;
//! ```

pub mod archive;
pub mod device;
pub mod error;
pub mod protocol;
pub mod record;
pub mod types;
pub mod usn;

pub use archive::{archive, unarchive, ArchiveDecoder, ArchiveEncoder, KeyedArchive, TypeMismatch};
pub use device::UPnPObject;
pub use error::{ArchiveError, FieldFault};
pub use record::{Archivable, Metadata, Record, StringAnnex, TypedAnnex};
pub use types::DiscoveredObject;
pub use usn::Usn;
