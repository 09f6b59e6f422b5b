use serde::Serialize;
use sha2::{Digest, Sha256};
use crate::store::db::{Bookmark, Shape};

/// Digest of one stored archive. Shape and payload tag are part of it, so
/// re-saving the same bytes under another shape counts as a change.
pub fn archive_digest(shape: Shape, payload_tag: Option<&str>, archive: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(shape.as_str().as_bytes());
    hasher.update([0u8]);
    if let Some(tag) = payload_tag {
        hasher.update(tag.as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(archive);
    hex::encode(hasher.finalize())
}

/// Only identity and content count; saved_at changes on every save.
#[derive(Serialize)]
struct FingerprintView<'a> {
    usn: &'a str,
    digest: &'a str,
}

/// SHA-256 fingerprint of a whole bookmark set.
/// Bookmarks are sorted by USN for deterministic output.
pub fn store_fingerprint(bookmarks: &[Bookmark]) -> String {
    let mut indices: Vec<usize> = (0..bookmarks.len()).collect();
    indices.sort_by(|&a, &b| bookmarks[a].usn.cmp(&bookmarks[b].usn));

    let views: Vec<FingerprintView<'_>> = indices
        .iter()
        .map(|&i| FingerprintView {
            usn: bookmarks[i].usn.as_str(),
            digest: &bookmarks[i].digest,
        })
        .collect();

    let json = serde_json::to_string(&views)
        .expect("Failed to serialize bookmarks for fingerprinting");

    hex::encode(Sha256::digest(json.as_bytes()))
}
