use std::fmt;
use serde::{Deserialize, Serialize};
use crate::protocol::{USN_SEPARATOR, UUID_PREFIX};

/// Unique service name as advertised by a device, e.g.
/// "uuid:4d696e69-444c-164e-9d41-b827eb54e3c4::urn:schemas-upnp-org:service:ContentDirectory:1".
///
/// The raw token is kept verbatim; `uuid()` and `urn()` are views into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Usn(String);

impl Usn {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Device uuid without the "uuid:" prefix
    pub fn uuid(&self) -> &str {
        let device = match self.0.split_once(USN_SEPARATOR) {
            Some((device, _)) => device,
            None => &self.0,
        };
        device.strip_prefix(UUID_PREFIX).unwrap_or(device)
    }

    /// Device or service type following the uuid, if the USN carries one
    pub fn urn(&self) -> Option<&str> {
        self.0
            .split_once(USN_SEPARATOR)
            .map(|(_, urn)| urn)
            .filter(|urn| !urn.is_empty())
    }
}

impl fmt::Display for Usn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Usn {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Usn {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl AsRef<str> for Usn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
