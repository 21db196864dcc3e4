use anyhow::Result;
use memtable::{Memtable, Value};
use sstable::{SSTableReader, SSTableWriter};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use wal::{WalReader, WalWriter};

use crate::manifest::{next_table_number, Manifest};
use crate::{COMPACTED_TABLE_NAME, MANIFEST_FILE_NAME, WAL_FILE_NAME};

/// One open SSTable: its manifest name plus the in-memory index and
/// filter. Newest tables sit at the tail of the engine's list.
struct Table {
    filename: String,
    reader: SSTableReader,
}

/// The storage engine: memtable + WAL + ordered set of SSTables.
///
/// Single-threaded and non-reentrant; all operations block on I/O. The
/// engine owns the WAL handle for its lifetime and the metadata of every
/// open table; dropping it releases everything.
pub struct Engine {
    dir: PathBuf,
    memtable: Memtable,
    wal: Option<WalWriter>,
    manifest: Manifest,
    tables: Vec<Table>,
    next_table_number: u32,
}

impl Engine {
    /// Opens (or creates) an engine over the given working directory.
    ///
    /// Startup order: replay the WAL into a fresh memtable, open every
    /// table the manifest lists (manifest order, newest last), then open
    /// the WAL for appending.
    ///
    /// A table that fails to open is skipped with a warning. A WAL that
    /// fails to open for appending is also non-fatal: the engine keeps
    /// working from memory alone and durability is lost until the next
    /// successful open.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let wal_path = dir.join(WAL_FILE_NAME);
        let mut memtable = Memtable::new();
        // No WAL file yet means no prior unflushed state.
        if let Ok(reader) = WalReader::open(&wal_path) {
            reader.replay(|key, value| memtable.insert(key, value));
        }

        let manifest = Manifest::new(dir.join(MANIFEST_FILE_NAME));
        let filenames = manifest.load()?;
        let mut tables = Vec::with_capacity(filenames.len());
        for filename in &filenames {
            match SSTableReader::open(dir.join(filename)) {
                Ok(reader) => tables.push(Table {
                    filename: filename.clone(),
                    reader,
                }),
                Err(err) => log::warn!("skipping unreadable table {}: {:#}", filename, err),
            }
        }

        let wal = match WalWriter::create(&wal_path, true) {
            Ok(writer) => Some(writer),
            Err(err) => {
                log::warn!("wal unavailable, writes will not be durable: {}", err);
                None
            }
        };

        let next_table_number = next_table_number(&filenames);
        Ok(Self {
            dir,
            memtable,
            wal,
            manifest,
            tables,
            next_table_number,
        })
    }

    /// Stores `value` under `key`.
    ///
    /// The record is durable in the WAL before the memtable sees it; if
    /// the WAL append fails, the error is surfaced and memory is left
    /// untouched.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(key, Value::Data(value.to_vec()))
    }

    /// Removes `key` by storing a tombstone over it.
    ///
    /// The tombstone shadows every older value until compaction drops
    /// both.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.write(key, Value::Tombstone)
    }

    fn write(&mut self, key: &[u8], value: Value) -> Result<()> {
        if let Some(wal) = &mut self.wal {
            wal.append(key, &value)?;
        }
        self.memtable.insert(key.to_vec(), value);
        Ok(())
    }

    /// Point lookup.
    ///
    /// Consults the memtable, then every table newest to oldest; the
    /// first source that knows the key decides. A tombstone anywhere
    /// along the way means absent — tombstones never leak to callers, and
    /// an empty value is a real value, not absence.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.memtable.get(key) {
            return Ok(value.as_data().map(|data| data.to_vec()));
        }

        for table in self.tables.iter().rev() {
            match table.reader.get(key) {
                Ok(Some(value)) => return Ok(value.as_data().map(|data| data.to_vec())),
                Ok(None) => continue,
                Err(err) => {
                    // Absent from this table; older tables may still know it.
                    log::warn!("table {} unreadable during get: {:#}", table.filename, err);
                    continue;
                }
            }
        }
        Ok(None)
    }

    /// Seals the memtable into a new L0 table.
    ///
    /// The table is fully written and fsynced, then recorded in the
    /// manifest, and only then is the memtable cleared and the WAL
    /// truncated — a crash at any point leaves a recoverable state. An
    /// empty memtable is a no-op.
    pub fn flush(&mut self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let filename = format!("L0_00{}.sst", self.next_table_number);
        let path = self.dir.join(&filename);
        SSTableWriter::write(&path, self.memtable.iter(), self.memtable.len())?;

        self.manifest.append(&filename)?;
        let reader = SSTableReader::open(&path)?;
        self.tables.push(Table { filename, reader });
        self.next_table_number += 1;

        self.memtable.clear();
        if let Some(wal) = &mut self.wal {
            wal.truncate()?;
        }
        Ok(())
    }

    /// Merges every live table into a single one, reclaiming tombstones.
    ///
    /// Tables fold into an ordered map oldest to newest, so the newest
    /// value wins each key. Tombstoned keys are dropped entirely — after
    /// compaction nothing in the file remembers them. The new table is
    /// renamed into place and the manifest rewritten before any old file
    /// is deleted; until that rewrite the old state stays authoritative.
    ///
    /// With no live tables this is a no-op. The memtable is not involved;
    /// flush first if it should participate.
    pub fn compact(&mut self) -> Result<()> {
        if self.tables.is_empty() {
            return Ok(());
        }

        let mut merged: BTreeMap<Vec<u8>, Value> = BTreeMap::new();
        for table in &self.tables {
            for (key, value) in table.reader.entries()? {
                merged.insert(key, value);
            }
        }
        merged.retain(|_, value| !value.is_tombstone());

        let path = self.dir.join(COMPACTED_TABLE_NAME);
        SSTableWriter::write(&path, merged.iter(), merged.len())?;
        self.manifest.replace(&[COMPACTED_TABLE_NAME.to_string()])?;

        for table in &self.tables {
            // A previous compaction output was just replaced by the
            // rename; deleting by name now would hit the new file.
            if table.filename == COMPACTED_TABLE_NAME {
                continue;
            }
            if let Err(err) = fs::remove_file(self.dir.join(&table.filename)) {
                log::warn!("could not delete stale table {}: {}", table.filename, err);
            }
        }

        let reader = SSTableReader::open(&path)?;
        self.tables = vec![Table {
            filename: COMPACTED_TABLE_NAME.to_string(),
            reader,
        }];
        Ok(())
    }

    /// Returns every live (key, value) pair in ascending key order, for
    /// diagnostics. Tombstoned keys are omitted.
    pub fn dump(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut view: BTreeMap<Vec<u8>, Value> = BTreeMap::new();
        for table in &self.tables {
            for (key, value) in table.reader.entries()? {
                view.insert(key, value);
            }
        }
        for (key, value) in self.memtable.iter() {
            view.insert(key.clone(), value.clone());
        }

        Ok(view
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Data(data) => Some((key, data)),
                Value::Tombstone => None,
            })
            .collect())
    }

    /// Approximate bytes buffered in the memtable, for embedders driving
    /// their own flush policy.
    pub fn memtable_size(&self) -> usize {
        self.memtable.approx_size()
    }

    /// Number of live on-disk tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}
