//! # SSTable — Sorted String Table
//!
//! Immutable, on-disk storage files for the SiltKV storage engine.
//!
//! When the engine flushes its [`memtable::Memtable`] the contents land in
//! one of these files. SSTables are **write-once, read-many** — once
//! created they are never modified, only replaced during compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ DATA BLOCK (sorted key/value records)         │
//! │                                               │
//! │ key_len (u32) | key | val_len (u32) | val     │
//! │                                               │
//! │ ... repeated for each entry ...               │
//! ├───────────────────────────────────────────────┤
//! │ INDEX BLOCK (sparse, every 3rd data entry)    │
//! │                                               │
//! │ key_len (u32) | key | data_offset (u32)       │
//! │                                               │
//! │ ... repeated for each indexed entry ...       │
//! ├───────────────────────────────────────────────┤
//! │ FILTER BLOCK (membership filter blob)         │
//! │                                               │
//! │ num_hashes (u32) | size_in_bits (u32) | bits  │
//! ├───────────────────────────────────────────────┤
//! │ FOOTER (always last 8 bytes)                  │
//! │                                               │
//! │ index_start (u32) | filter_start (u32)        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian. A deletion is an ordinary record whose
//! value bytes are the tombstone sentinel; tombstones are dropped only
//! when compaction rewrites the table set.

mod format;
mod reader;
mod writer;

pub use format::{FOOTER_BYTES, SPARSE_INDEX_STRIDE};
pub use reader::SSTableReader;
pub use writer::SSTableWriter;
