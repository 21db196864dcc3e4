use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, ReadBytesExt};
use filter::BloomFilter;
use memtable::Value;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::format::{read_footer, FOOTER_BYTES};

/// Reads an SSTable file for point lookups.
///
/// On [`open`](SSTableReader::open) the footer, the sparse index, and the
/// membership filter are parsed entirely into memory; the data block stays
/// on disk and is read on demand. A lookup consults the filter, binary
/// searches the index for the scan window, then linear-scans at most one
/// stride's worth of framed records.
///
/// The data file is **not** kept open between lookups — each
/// [`get`](SSTableReader::get) call opens the file, scans its window, and
/// drops the handle. This keeps ownership simple and avoids holding
/// long-lived file descriptors per table.
pub struct SSTableReader {
    /// Path to the `.sst` file on disk.
    path: PathBuf,
    /// Sparse index: (key, data-block byte offset), ascending, one entry
    /// per stride of data entries.
    index: Vec<(Vec<u8>, u32)>,
    /// Membership filter over every key in the data block.
    filter: BloomFilter,
    /// Byte length of the data block; scans never cross it.
    index_start: u32,
}

impl SSTableReader {
    /// Opens an SSTable file and loads its index and filter into memory.
    ///
    /// # Validation
    ///
    /// - The file must be at least 8 bytes (footer size).
    /// - `index_start <= filter_start <= filesize - 8`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is too small, the footer offsets are
    /// inconsistent, the blocks fail to parse, or any I/O operation fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut f = File::open(&path_buf)?;
        let filesize = f.metadata()?.len();

        if filesize < FOOTER_BYTES {
            bail!("sstable file too small");
        }

        let (index_start, filter_start) = read_footer(&mut f)?;
        if index_start > filter_start || u64::from(filter_start) > filesize - FOOTER_BYTES {
            bail!(
                "invalid footer offsets: index_start={} filter_start={} filesize={}",
                index_start,
                filter_start,
                filesize
            );
        }

        // Index block: [index_start, filter_start)
        f.seek(SeekFrom::Start(u64::from(index_start)))?;
        let mut index_block = vec![0u8; (filter_start - index_start) as usize];
        f.read_exact(&mut index_block)?;

        let mut index = Vec::new();
        let mut offset = 0;
        while offset < index_block.len() {
            let key_len = codec::get_u32(&index_block, &mut offset)? as usize;
            let key = codec::get_bytes(&index_block, &mut offset, key_len)?.to_vec();
            let data_offset = codec::get_u32(&index_block, &mut offset)?;
            index.push((key, data_offset));
        }

        // Filter block: [filter_start, filesize - 8)
        let mut filter_block = vec![0u8; (filesize - FOOTER_BYTES - u64::from(filter_start)) as usize];
        f.seek(SeekFrom::Start(u64::from(filter_start)))?;
        f.read_exact(&mut filter_block)?;
        let filter = BloomFilter::from_bytes(&filter_block)
            .context("sstable filter block failed to parse")?;

        Ok(Self {
            path: path_buf,
            index,
            filter,
            index_start,
        })
    }

    /// Point lookup for a single key.
    ///
    /// Returns `Ok(Some(value))` if the key exists in this table (the
    /// value may be a tombstone — the engine interprets it) and `Ok(None)`
    /// if it does not. A malformed record inside the scan window also
    /// yields `Ok(None)`: the key is simply absent from this table and the
    /// engine falls through to older ones.
    ///
    /// # Errors
    ///
    /// Returns an error only if the data file cannot be opened.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        if !self.filter.possibly_contains(key) {
            return Ok(None);
        }

        // Greatest index entry whose key <= target bounds the scan window.
        let pos = self.index.partition_point(|(k, _)| k.as_slice() <= key);
        if pos == 0 {
            return Ok(None);
        }
        let scan_start = self.index[pos - 1].1;

        self.scan_window(scan_start, key)
    }

    /// Returns `false` if the filter rules this key out without touching
    /// the data block.
    pub fn possibly_contains(&self, key: &[u8]) -> bool {
        self.filter.possibly_contains(key)
    }

    /// The in-memory sparse index, ascending by key.
    pub fn index(&self) -> &[(Vec<u8>, u32)] {
        &self.index
    }

    /// Reads the entire data block in key order.
    ///
    /// Used by compaction and diagnostics. Decoding stops at the first
    /// malformed record; everything before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the data block cannot be read.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Value)>> {
        let mut f = File::open(&self.path)?;
        let mut data = vec![0u8; self.index_start as usize];
        f.read_exact(&mut data)?;

        let mut out = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            match decode_data_record(&data, &mut offset) {
                Ok(entry) => out.push(entry),
                Err(_) => break,
            }
        }
        Ok(out)
    }

    /// Linear-scans framed records in `[scan_start, index_start)` for an
    /// exact key match. Stops early on a strictly greater key (the block
    /// is sorted) and treats any decode problem as absence.
    fn scan_window(&self, scan_start: u32, target: &[u8]) -> Result<Option<Value>> {
        let mut f = BufReader::new(File::open(&self.path)?);
        f.seek(SeekFrom::Start(u64::from(scan_start)))?;
        let mut f = f.take(u64::from(self.index_start - scan_start));

        loop {
            let key_len = match f.read_u32::<BigEndian>() {
                Ok(n) => u64::from(n),
                Err(_) => return Ok(None), // end of data block or torn record
            };
            if key_len > f.limit() {
                return Ok(None);
            }
            let mut key = vec![0u8; key_len as usize];
            if f.read_exact(&mut key).is_err() {
                return Ok(None);
            }

            match key.as_slice().cmp(target) {
                Ordering::Greater => return Ok(None),
                Ordering::Equal => {
                    let value_len = match f.read_u32::<BigEndian>() {
                        Ok(n) => u64::from(n),
                        Err(_) => return Ok(None),
                    };
                    if value_len > f.limit() {
                        return Ok(None);
                    }
                    let mut value = vec![0u8; value_len as usize];
                    if f.read_exact(&mut value).is_err() {
                        return Ok(None);
                    }
                    return Ok(Some(Value::from_wire(value)));
                }
                Ordering::Less => {
                    let value_len = match f.read_u32::<BigEndian>() {
                        Ok(n) => u64::from(n),
                        Err(_) => return Ok(None),
                    };
                    if value_len > f.limit() {
                        return Ok(None);
                    }
                    let mut skipped = vec![0u8; value_len as usize];
                    if f.read_exact(&mut skipped).is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }
}

fn decode_data_record(
    buf: &[u8],
    offset: &mut usize,
) -> Result<(Vec<u8>, Value), codec::UnderflowError> {
    let key_len = codec::get_u32(buf, offset)? as usize;
    let key = codec::get_bytes(buf, offset, key_len)?.to_vec();
    let value_len = codec::get_u32(buf, offset)? as usize;
    let value = codec::get_bytes(buf, offset, value_len)?.to_vec();
    Ok((key, Value::from_wire(value)))
}
