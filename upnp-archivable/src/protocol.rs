/// Archive field holding the unique service name
pub const FIELD_USN: &str = "usn";

/// Archive field holding the description document URL
pub const FIELD_DESCRIPTION_URL: &str = "descriptionURL";

/// Archive field holding the optional annex (string map or typed payload).
/// Both annex shapes share this name; the archive carries no shape tag.
pub const FIELD_CUSTOM_METADATA: &str = "customMetadata";

/// Prefix of the device part of a USN
pub const UUID_PREFIX: &str = "uuid:";

/// Separator between the device uuid and the urn in a USN
pub const USN_SEPARATOR: &str = "::";
