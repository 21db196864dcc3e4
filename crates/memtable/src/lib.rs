//! # Memtable
//!
//! An in-memory, sorted, mutable write buffer for the SiltKV storage engine.
//!
//! The memtable is the first point of contact for every write operation. It
//! buffers recent `PUT` and `DELETE` operations in a sorted structure
//! (`BTreeMap`) before they are flushed to immutable on-disk SSTables.
//!
//! ## Key properties
//! - **Sorted order**: entries are always in ascending key order (required for SSTable flush).
//! - **Last write wins**: a later insert of the same key overwrites the earlier value in place.
//! - **Tombstone support**: deletes are recorded as [`Value::Tombstone`] markers.
//! - **Approximate size tracking**: tracks the byte size of keys + values so the
//!   embedder can drive flush decisions.
//!
//! ## Example
//! ```rust
//! use memtable::{Memtable, Value};
//!
//! let mut m = Memtable::new();
//! m.insert(b"hello".to_vec(), Value::Data(b"world".to_vec()));
//! assert_eq!(m.get(b"hello"), Some(&Value::Data(b"world".to_vec())));
//!
//! m.insert(b"hello".to_vec(), Value::Tombstone);
//! assert!(m.get(b"hello").unwrap().is_tombstone());
//! ```

use std::collections::BTreeMap;

/// On-disk encoding of a tombstone.
///
/// WAL records and SSTable records store a deletion as an ordinary value
/// whose bytes equal this sentinel, so files stay compatible with the
/// original format. [`Value::from_wire`] maps it back to
/// [`Value::Tombstone`] on decode.
pub const TOMBSTONE_WIRE: &[u8] = b"~~DELETED~";

/// A stored value: live bytes or a deletion marker.
///
/// Tombstones are retained in the memtable and flushed to SSTables so that
/// older values in older tables are correctly shadowed during reads. They
/// are physically dropped only during compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A live value.
    Data(Vec<u8>),
    /// A deletion marker.
    Tombstone,
}

impl Value {
    /// Returns `true` for [`Value::Tombstone`].
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }

    /// Returns the live bytes, or `None` for a tombstone.
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Value::Data(bytes) => Some(bytes),
            Value::Tombstone => None,
        }
    }

    /// The bytes this value serializes to in WAL and SSTable records.
    pub fn wire_bytes(&self) -> &[u8] {
        match self {
            Value::Data(bytes) => bytes,
            Value::Tombstone => TOMBSTONE_WIRE,
        }
    }

    /// Decodes wire bytes back into a value, recognizing the tombstone
    /// sentinel.
    pub fn from_wire(bytes: Vec<u8>) -> Self {
        if bytes == TOMBSTONE_WIRE {
            Value::Tombstone
        } else {
            Value::Data(bytes)
        }
    }
}

/// An ordered, in-memory write buffer backed by a `BTreeMap`.
///
/// The memtable tracks an approximate byte size (keys + live value bytes)
/// so the embedder can decide when to flush to an SSTable. There is no
/// internal threshold; the engine flushes only on demand.
#[derive(Debug, Default)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Value>,
    approx_size: usize,
}

impl Memtable {
    /// Creates a new, empty memtable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key with the given value, overwriting any earlier entry.
    ///
    /// Tombstones are inserted the same way as live values; the read path
    /// interprets them.
    pub fn insert(&mut self, key: Vec<u8>, value: Value) {
        match self.map.get(&key) {
            Some(old) => {
                if let Value::Data(ov) = old {
                    self.approx_size = self.approx_size.saturating_sub(ov.len());
                }
                // Key bytes already counted; do not subtract key length here.
            }
            None => {
                self.approx_size = self.approx_size.saturating_add(key.len());
            }
        }

        if let Value::Data(nv) = &value {
            self.approx_size = self.approx_size.saturating_add(nv.len());
        }

        self.map.insert(key, value);
    }

    /// Returns the stored value for `key`, tombstones included.
    ///
    /// The caller distinguishes "key not found" (`None`) from "key was
    /// deleted" (`Some(Value::Tombstone)`).
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.map.get(key)
    }

    /// Returns `true` if the memtable contains the given key (including tombstones).
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Returns an iterator over all entries in **ascending key order**.
    ///
    /// This includes tombstones. The ordering guarantee is provided by the
    /// underlying `BTreeMap` and is required for correct SSTable flush.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Value)> {
        self.map.iter()
    }

    /// Returns the number of entries (including tombstones).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the memtable contains zero entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the approximate byte size of all keys and live values stored.
    ///
    /// Tracks key bytes + value bytes but does **not** include `BTreeMap`
    /// node overhead.
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    /// Removes all entries and resets `approx_size` to zero.
    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }
}
