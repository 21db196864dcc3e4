//! # Engine
//!
//! The orchestration layer of the SiltKV storage engine: a single-node,
//! single-threaded, log-structured key/value store.
//!
//! Writes go to the WAL (durably) and then the memtable; `flush` seals the
//! memtable into an immutable SSTable and records it in the manifest;
//! reads consult the memtable first and then every table newest to
//! oldest; `compact` merges all tables into one, dropping tombstones.
//!
//! ```no_run
//! use engine::Engine;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut db = Engine::open("./data")?;
//! db.put(b"user:101", b"gogal")?;
//! assert_eq!(db.get(b"user:101")?, Some(b"gogal".to_vec()));
//!
//! db.flush()?;
//! db.delete(b"user:101")?;
//! assert_eq!(db.get(b"user:101")?, None);
//! # Ok(())
//! # }
//! ```
//!
//! The engine is not thread-safe; embedders serialize access externally.

mod engine;
mod manifest;

pub use engine::Engine;
pub use manifest::Manifest;

/// The write-ahead log, in the engine's working directory.
pub const WAL_FILE_NAME: &str = "wal.log";

/// The manifest listing live SSTables, newest last.
pub const MANIFEST_FILE_NAME: &str = "MANIFEST";

/// The single compaction output table.
pub const COMPACTED_TABLE_NAME: &str = "L1_merged.sst";
