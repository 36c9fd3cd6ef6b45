//! Vendor-specific extension side-channel.
//!
//! Every port record carries an opaque, order-preserving key/value list
//! for proprietary fields. The scheduler never interprets these entries;
//! they round-trip unmodified through confirmations and indications.

use serde::{Deserialize, Serialize};

/// A single vendor-specific entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorExtension {
    /// Vendor-chosen tag.
    pub key: String,
    /// Opaque payload.
    pub value: String,
}

/// Order-preserving list of vendor-specific extensions.
///
/// Entries are kept in insertion order so that a vendor protocol relying
/// on positional semantics survives the round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorExtensions {
    entries: Vec<VendorExtension>,
}

impl VendorExtensions {
    /// Creates an empty extension list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(VendorExtension {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Appends an entry in place.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(VendorExtension {
            key: key.into(),
            value: value.into(),
        });
    }

    /// First value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &VendorExtension> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let ext = VendorExtensions::new()
            .with_entry("b", "2")
            .with_entry("a", "1")
            .with_entry("b", "3");

        let keys: Vec<&str> = ext.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "b"]);
        // Lookup returns the first match
        assert_eq!(ext.get("b"), Some("2"));
        assert_eq!(ext.get("missing"), None);
    }

    #[test]
    fn test_empty() {
        let ext = VendorExtensions::new();
        assert!(ext.is_empty());
        assert_eq!(ext.len(), 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let ext = VendorExtensions::new().with_entry("x-vendor-flag", "on");
        let json = serde_json::to_string(&ext).unwrap();
        let back: VendorExtensions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ext);
    }
}
