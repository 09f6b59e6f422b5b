use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::record::{Metadata, Record, StringAnnex, TypedAnnex};
use crate::types::DiscoveredObject;
use crate::usn::Usn;

/// Anything discovery hands out as a device or service.
///
/// Implementors only expose the USN and description URL; the archiving
/// operations are provided and never fail.
pub trait UPnPObject {
    fn usn(&self) -> &Usn;

    fn description_url(&self) -> &str;

    fn archivable(&self) -> Record {
        Record::new(self.usn().clone(), self.description_url())
    }

    /// Record with a string annex for data a custom subtype needs back on restore
    fn archivable_annex(&self, custom_metadata: Option<Metadata>) -> StringAnnex {
        StringAnnex::new(self.usn().clone(), self.description_url(), custom_metadata)
    }

    fn archivable_typed<T: Serialize + DeserializeOwned>(&self, custom_metadata: Option<T>) -> TypedAnnex<T> {
        TypedAnnex::new(self.usn().clone(), self.description_url(), custom_metadata)
    }
}

impl UPnPObject for DiscoveredObject {
    fn usn(&self) -> &Usn {
        &self.usn
    }

    fn description_url(&self) -> &str {
        &self.description_url
    }
}
