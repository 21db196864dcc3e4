use anyhow::{bail, Result};
use filter::BloomFilter;
use memtable::Value;
use std::fs::{rename, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::format::{write_footer, SPARSE_INDEX_STRIDE};

/// Writes an ordered (key, value) sequence to disk as an immutable
/// SSTable file.
///
/// The writer is stateless — all work happens inside the single static
/// method [`write`](SSTableWriter::write). The write is crash-safe: data
/// is first written to a temporary file, fsynced, and then atomically
/// renamed to the final path, followed by a directory fsync.
pub struct SSTableWriter {}

impl SSTableWriter {
    /// Writes `entries` to a new SSTable file at `path`.
    ///
    /// `entries` must be in strictly ascending key order (a `BTreeMap` or
    /// [`memtable::Memtable`] iteration satisfies this) and `entry_count`
    /// must be its exact length; the membership filter is sized from it
    /// before the stream is consumed. Values may be tombstones — they are
    /// written like any other value.
    ///
    /// An empty sequence produces a valid, empty table: compaction can
    /// end up with nothing but tombstones to drop.
    ///
    /// # Crash Safety
    ///
    /// Writes to `path.sst.tmp`, calls `sync_all()`, atomically renames,
    /// then fsyncs the parent directory. If the process crashes mid-write
    /// the temp file is left behind and ignored on recovery (it never
    /// enters the manifest).
    ///
    /// # Errors
    ///
    /// Returns an error on any I/O failure, or if a block boundary would
    /// not fit the footer's 32-bit offsets.
    pub fn write<'a, I>(path: &Path, entries: I, entry_count: usize) -> Result<()>
    where
        I: IntoIterator<Item = (&'a Vec<u8>, &'a Value)>,
    {
        let mut bloom = BloomFilter::new(entry_count.max(filter::MIN_CAPACITY));

        // Data block plus the in-memory sparse index: one entry per
        // stride, starting at data entry 0.
        let mut data: Vec<u8> = Vec::new();
        let mut index: Vec<(Vec<u8>, u32)> = Vec::new();

        for (i, (key, value)) in entries.into_iter().enumerate() {
            if i % SPARSE_INDEX_STRIDE == 0 {
                if data.len() > u32::MAX as usize {
                    bail!("data block exceeds 32-bit offset range");
                }
                index.push((key.clone(), data.len() as u32));
            }
            bloom.add(key);

            let wire = value.wire_bytes();
            codec::put_u32(&mut data, key.len() as u32);
            codec::put_bytes(&mut data, key);
            codec::put_u32(&mut data, wire.len() as u32);
            codec::put_bytes(&mut data, wire);
        }

        if data.len() > u32::MAX as usize {
            bail!("data block exceeds 32-bit offset range");
        }
        let index_start = data.len() as u32;

        let mut index_block: Vec<u8> = Vec::new();
        for (key, data_offset) in &index {
            codec::put_u32(&mut index_block, key.len() as u32);
            codec::put_bytes(&mut index_block, key);
            codec::put_u32(&mut index_block, *data_offset);
        }

        let filter_start = u64::from(index_start) + index_block.len() as u64;
        if filter_start > u64::from(u32::MAX) {
            bail!("index block exceeds 32-bit offset range");
        }

        // Create temporary file next to target for atomic rename later.
        let tmp_path = path.with_extension("sst.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_all(&data)?;
        file.write_all(&index_block)?;
        file.write_all(&bloom.to_bytes())?;
        write_footer(&mut file, index_start, filter_start as u32)?;

        file.flush()?;
        file.sync_all()?;

        // Atomically move into place, then make the rename itself durable.
        rename(&tmp_path, path)?;
        if let Some(dir) = path.parent() {
            File::open(dir)?.sync_all()?;
        }

        Ok(())
    }
}
