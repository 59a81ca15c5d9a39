//! In-memory entry metadata and the ordered entry list.
//!
//! The on-disk index is a flat array of records (`layout::EntryRaw` + name);
//! in memory we additionally maintain a name → position map so `read`,
//! `add`'s shadow check, and `remove` are O(1) instead of a linear scan over
//! potentially thousands of entries. The on-disk format is unaffected — this
//! is purely an in-memory redesign; the on-disk format is unaffected.

use std::collections::HashMap;

use crate::codec::CompressionType;

/// One named blob's metadata, exactly as it appears in memory. Maps
/// directly to one on-disk index record (`layout::EntryRaw` + name bytes).
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub compression_type: CompressionType,
}

/// The archive's ordered entry list plus a name → index side table.
///
/// Insertion order is preserved across shadowing (a shadowed entry keeps
/// its original position) and across removal (the remaining entries keep
/// their relative order).
#[derive(Debug, Default)]
pub struct EntryList {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

impl EntryList {
    pub fn new() -> Self {
        Self { entries: Vec::new(), by_name: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Insert a new entry or, if `name` already exists, overwrite the
    /// existing entry's metadata in place — preserving its position in the
    /// ordered list (the shadowing rule).
    pub fn upsert(&mut self, entry: Entry) {
        if let Some(&i) = self.by_name.get(&entry.name) {
            self.entries[i] = entry;
        } else {
            let name = entry.name.clone();
            self.by_name.insert(name, self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Remove the entry named `name`, preserving the relative order of the
    /// remaining entries. Returns `true` if an entry was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(&i) = self.by_name.get(name) else { return false };
        self.entries.remove(i);
        self.by_name.clear();
        for (idx, e) in self.entries.iter().enumerate() {
            self.by_name.insert(e.name.clone(), idx);
        }
        true
    }

    /// Rebuild the name index from scratch. Used after loading entries
    /// straight from disk in insertion order.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (i, e) in entries.iter().enumerate() {
            by_name.insert(e.name.clone(), i);
        }
        Self { entries, by_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, offset: u64) -> Entry {
        Entry {
            name: name.to_string(),
            offset,
            compressed_size: 1,
            uncompressed_size: 1,
            crc32: 0,
            compression_type: CompressionType::None,
        }
    }

    #[test]
    fn upsert_new_appends() {
        let mut list = EntryList::new();
        list.upsert(entry("a", 8));
        list.upsert(entry("b", 16));
        assert_eq!(list.len(), 2);
        assert_eq!(list.find("a").unwrap().offset, 8);
        assert_eq!(list.find("b").unwrap().offset, 16);
    }

    #[test]
    fn upsert_existing_shadows_in_place() {
        let mut list = EntryList::new();
        list.upsert(entry("a", 8));
        list.upsert(entry("b", 16));
        list.upsert(entry("a", 64));
        assert_eq!(list.len(), 2, "shadowing must not grow the entry count");
        let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"], "order is preserved across shadowing");
        assert_eq!(list.find("a").unwrap().offset, 64);
    }

    #[test]
    fn remove_preserves_order_of_survivors() {
        let mut list = EntryList::new();
        list.upsert(entry("a", 8));
        list.upsert(entry("b", 16));
        list.upsert(entry("c", 24));
        assert!(list.remove("b"));
        let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(!list.contains("b"));
        assert!(!list.remove("b"), "removing twice is a no-op");
    }
}
