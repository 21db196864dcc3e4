//! # WAL — Write-Ahead Log
//!
//! Durability layer of the SiltKV storage engine. Every `PUT` and `DELETE`
//! is appended here as a framed record *before* it touches the memtable, so
//! a crash loses nothing that was acknowledged to the caller.
//!
//! ## Record format
//!
//! ```text
//! key_len (u32 BE) | key | value_len (u32 BE) | value
//! ```
//!
//! A deletion is an ordinary record whose value bytes are the tombstone
//! sentinel (see [`memtable::TOMBSTONE_WIRE`]). There is no per-record
//! checksum; a torn or corrupt record ends replay at that point and every
//! earlier record is kept.
//!
//! The log is truncated by the engine after a successful flush, once the
//! flushed table is on disk and listed in the manifest.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use memtable::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Appends framed records to the log, durably.
pub struct WalWriter {
    file: File,
    path: PathBuf,
    sync: bool,
}

impl WalWriter {
    /// Opens (or creates) the log at `path` in append mode.
    ///
    /// With `sync` set, every [`append`](WalWriter::append) fsyncs before
    /// returning; without it the record is only flushed to the OS buffer.
    /// The engine always passes `sync = true`.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path, sync })
    }

    /// Appends one record and forces it down to disk.
    ///
    /// The record is encoded in full before any byte is written, so a
    /// failure partway through framing never reaches the file.
    pub fn append(&mut self, key: &[u8], value: &Value) -> Result<(), WalError> {
        let wire = value.wire_bytes();
        let mut buf = Vec::with_capacity(8 + key.len() + wire.len());
        codec::put_u32(&mut buf, key.len() as u32);
        codec::put_bytes(&mut buf, key);
        codec::put_u32(&mut buf, wire.len() as u32);
        codec::put_bytes(&mut buf, wire);

        self.file.write_all(&buf)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Closes the log and reopens it at length zero.
    ///
    /// Called by the engine only after the flushed table is fully written
    /// and the manifest updated; records truncated here are all covered by
    /// that table.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

/// Replays a log front to back.
pub struct WalReader {
    buf: Vec<u8>,
}

impl WalReader {
    /// Reads the whole log at `path` into memory.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the file cannot be opened or read. The
    /// engine treats that as "no prior state" at startup.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let mut buf = Vec::new();
        File::open(path)?.read_to_end(&mut buf)?;
        Ok(Self { buf })
    }

    /// Decodes records in write order, invoking `apply` for each.
    ///
    /// Stops silently at the first record that fails to decode: a trailing
    /// partial record is indistinguishable from a torn tail left by a
    /// crash, and both end the log.
    pub fn replay<F>(&self, mut apply: F)
    where
        F: FnMut(Vec<u8>, Value),
    {
        let mut offset = 0;
        while offset < self.buf.len() {
            match decode_record(&self.buf, &mut offset) {
                Ok((key, value)) => apply(key, value),
                Err(_) => break,
            }
        }
    }
}

fn decode_record(
    buf: &[u8],
    offset: &mut usize,
) -> Result<(Vec<u8>, Value), codec::UnderflowError> {
    let key_len = codec::get_u32(buf, offset)? as usize;
    let key = codec::get_bytes(buf, offset, key_len)?.to_vec();
    let value_len = codec::get_u32(buf, offset)? as usize;
    let value = codec::get_bytes(buf, offset, value_len)?.to_vec();
    Ok((key, Value::from_wire(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn collect(path: &Path) -> Vec<(Vec<u8>, Value)> {
        let reader = WalReader::open(path).unwrap();
        let mut recs = Vec::new();
        reader.replay(|k, v| recs.push((k, v)));
        recs
    }

    // -------------------- Round trip --------------------

    #[test]
    fn write_and_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut w = WalWriter::create(&path, true).unwrap();
            w.append(b"k", &Value::Data(b"v1".to_vec())).unwrap();
            w.append(b"k2", &Value::Data(b"v2".to_vec())).unwrap();
            w.append(b"k", &Value::Tombstone).unwrap();
        }

        assert_eq!(
            collect(&path),
            vec![
                (b"k".to_vec(), Value::Data(b"v1".to_vec())),
                (b"k2".to_vec(), Value::Data(b"v2".to_vec())),
                (b"k".to_vec(), Value::Tombstone),
            ]
        );
    }

    #[test]
    fn record_framing_is_big_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = WalWriter::create(&path, false).unwrap();
        w.append(b"ab", &Value::Data(b"xyz".to_vec())).unwrap();
        drop(w);

        let raw = fs::read(&path).unwrap();
        assert_eq!(
            raw,
            [
                0, 0, 0, 2, b'a', b'b', // key_len, key
                0, 0, 0, 3, b'x', b'y', b'z', // value_len, value
            ]
        );
    }

    #[test]
    fn binary_keys_and_empty_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let key = vec![0x00, 0xFF, 0x10];
        let mut w = WalWriter::create(&path, false).unwrap();
        w.append(&key, &Value::Data(Vec::new())).unwrap();
        drop(w);

        assert_eq!(collect(&path), vec![(key, Value::Data(Vec::new()))]);
    }

    #[test]
    fn empty_log_replays_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        drop(WalWriter::create(&path, false).unwrap());
        assert!(collect(&path).is_empty());
    }

    #[test]
    fn open_missing_log_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(WalReader::open(dir.path().join("absent.log")).is_err());
    }

    // -------------------- Torn tail --------------------

    #[test]
    fn torn_tail_keeps_earlier_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut w = WalWriter::create(&path, false).unwrap();
            w.append(b"a", &Value::Data(b"1".to_vec())).unwrap();
            w.append(b"b", &Value::Data(b"2".to_vec())).unwrap();
        }

        // Simulate a crash mid-append: a length prefix with no payload.
        let mut raw = fs::read(&path).unwrap();
        raw.extend_from_slice(&[0, 0, 0, 9, b'p', b'a']);
        fs::write(&path, &raw).unwrap();

        assert_eq!(
            collect(&path),
            vec![
                (b"a".to_vec(), Value::Data(b"1".to_vec())),
                (b"b".to_vec(), Value::Data(b"2".to_vec())),
            ]
        );
    }

    #[test]
    fn corrupt_middle_ends_replay_there() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        // One good record, then garbage claiming a huge key, then another
        // good record. Replay must stop at the garbage.
        let mut w = WalWriter::create(&path, false).unwrap();
        w.append(b"good", &Value::Data(b"1".to_vec())).unwrap();
        drop(w);

        let mut raw = fs::read(&path).unwrap();
        raw.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3]);
        fs::write(&path, &raw).unwrap();

        {
            let mut w = WalWriter::create(&path, false).unwrap();
            w.append(b"after", &Value::Data(b"2".to_vec())).unwrap();
        }

        assert_eq!(
            collect(&path),
            vec![(b"good".to_vec(), Value::Data(b"1".to_vec()))]
        );
    }

    // -------------------- Truncate --------------------

    #[test]
    fn truncate_empties_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(b"k", &Value::Data(b"v".to_vec())).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0);

        w.truncate().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert!(collect(&path).is_empty());
    }

    #[test]
    fn append_after_truncate_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(b"old", &Value::Data(b"1".to_vec())).unwrap();
        w.truncate().unwrap();
        w.append(b"new", &Value::Data(b"2".to_vec())).unwrap();
        drop(w);

        assert_eq!(
            collect(&path),
            vec![(b"new".to_vec(), Value::Data(b"2".to_vec()))]
        );
    }

    // -------------------- Tombstone wire form --------------------

    #[test]
    fn tombstone_is_stored_as_sentinel_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = WalWriter::create(&path, false).unwrap();
        w.append(b"k", &Value::Tombstone).unwrap();
        drop(w);

        let raw = fs::read(&path).unwrap();
        let sentinel = memtable::TOMBSTONE_WIRE;
        assert_eq!(&raw[raw.len() - sentinel.len()..], sentinel);
    }
}
