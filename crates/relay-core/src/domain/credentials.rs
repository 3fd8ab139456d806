//! Credential set: named opaque blobs the transport rotates over time.
//!
//! The gateway never interprets credential contents.  Each entry maps to one
//! file in the session directory and must round-trip byte-for-byte.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Durable key material for one session, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    files: BTreeMap<String, Vec<u8>>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when no credential has ever been persisted (a fresh pairing is needed).
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Inserts or replaces an entry.  Returns `false` and leaves the set
    /// unchanged when `name` is not a valid credential file name.
    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> bool {
        let name = name.into();
        if !is_valid_file_name(&name) {
            return false;
        }
        self.files.insert(name, contents.into());
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

/// Longest accepted credential name in bytes.  The store writes each file
/// through a `.<name>.tmp` sibling, which must still fit the common 255-byte
/// file-name limit.
pub const MAX_FILE_NAME_LEN: usize = 250;

/// Returns `true` when `name` can be stored as a single file directly inside
/// the session directory.
///
/// Rejects empty names, path separators, dot-prefixed names (the store
/// reserves those for its temporary files) and names over
/// [`MAX_FILE_NAME_LEN`].
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.len() <= MAX_FILE_NAME_LEN
}

// ── Tests ─────────────────────────────────────────────────────────────────────
