use serde::{Deserialize, Serialize};
use crate::usn::Usn;

/// Device or service as reported by discovery, reduced to what restoring it
/// needs: the USN to match it again and the LOCATION to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredObject {
    /// Unique service name, e.g. "uuid:abc::urn:schemas-upnp-org:device:MediaServer:1"
    pub usn: Usn,

    /// LOCATION header: URL of the description document
    pub description_url: String,
}

impl DiscoveredObject {
    pub fn new(usn: impl Into<Usn>, description_url: impl Into<String>) -> Self {
        Self {
            usn: usn.into(),
            description_url: description_url.into(),
        }
    }
}
