//! Stable identity keys for list-typed fields
//!
//! A `FieldArray` tracks one key per list entry. Keys survive inserts,
//! removals and moves, so per-entry state (touched, dirty, errors, the
//! concrete sub-field registrations) can follow its entry instead of its
//! index.

use super::field::FieldOptions;
use super::path::FieldPath;
use uuid::Uuid;

/// Sub-field of every entry, e.g. `number` in `phNumbers.{i}.number`
#[derive(Debug, Clone)]
pub struct ItemField {
    pub name: FieldPath,
    pub options: FieldOptions,
}

impl ItemField {
    pub fn new(name: FieldPath, options: FieldOptions) -> Self {
        Self { name, options }
    }
}

/// One rendered entry of a field array
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayEntry {
    pub key: Uuid,
    pub index: usize,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct FieldArray {
    pub name: FieldPath,
    pub item_fields: Vec<ItemField>,
    /// Registry position the entries' sub-fields are inserted at when the list is empty
    pub anchor: usize,
    keys: Vec<Uuid>,
}

impl FieldArray {
    pub fn new(name: FieldPath, item_fields: Vec<ItemField>, len: usize) -> Self {
        Self {
            name,
            item_fields,
            anchor: 0,
            keys: (0..len).map(|_| Uuid::new_v4()).collect(),
        }
    }

    pub fn keys(&self) -> &[Uuid] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn append(&mut self) -> Uuid {
        let key = Uuid::new_v4();
        self.keys.push(key);
        key
    }

    pub fn prepend(&mut self) -> Uuid {
        self.insert(0)
    }

    /// Insert a new key at `index` (clamped to the end)
    pub fn insert(&mut self, index: usize) -> Uuid {
        let key = Uuid::new_v4();
        self.keys.insert(index.min(self.keys.len()), key);
        key
    }

    pub fn remove(&mut self, index: usize) -> Option<Uuid> {
        (index < self.keys.len()).then(|| self.keys.remove(index))
    }

    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= self.keys.len() || b >= self.keys.len() {
            return false;
        }
        self.keys.swap(a, b);
        true
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.keys.len() || to >= self.keys.len() {
            return false;
        }
        let key = self.keys.remove(from);
        self.keys.insert(to, key);
        true
    }

    /// Fresh keys for every entry, used when the whole list is replaced
    pub fn replace(&mut self, len: usize) {
        self.keys = (0..len).map(|_| Uuid::new_v4()).collect();
    }
}

/// For each old index, the index its key now lives at (`None` when removed)
pub fn reindex(old_keys: &[Uuid], new_keys: &[Uuid]) -> Vec<Option<usize>> {
    old_keys
        .iter()
        .map(|key| new_keys.iter().position(|k| k == key))
        .collect()
}
