//! SSTable binary format constants and footer read/write helpers.
//!
//! The footer is always the **last 8 bytes** of an SSTable file:
//!
//! ```text
//! [index_start: u32 BE][filter_start: u32 BE]
//! ```
//!
//! `index_start` equals the data block's byte length; `filter_start`
//! equals data + index length. Both offsets are from the start of the
//! file.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Seek, SeekFrom, Write};

/// One sparse index entry is emitted per this many data entries,
/// starting with the first.
pub const SPARSE_INDEX_STRIDE: usize = 3;

/// Size of the footer in bytes: 4 (`index_start`) + 4 (`filter_start`).
pub const FOOTER_BYTES: u64 = 4 + 4;

/// Returns the byte offset where the footer starts: `filesize - 8`.
///
/// Uses [`u64::saturating_sub`] so files smaller than 8 bytes return 0
/// rather than underflowing.
pub fn footer_pos(filesize: u64) -> u64 {
    filesize.saturating_sub(FOOTER_BYTES)
}

/// Writes the SSTable footer (`index_start` + `filter_start`) to `w`.
pub fn write_footer<W: Write>(w: &mut W, index_start: u32, filter_start: u32) -> IoResult<()> {
    w.write_u32::<BigEndian>(index_start)?;
    w.write_u32::<BigEndian>(filter_start)?;
    Ok(())
}

/// Reads the SSTable footer from `r`, returning `(index_start, filter_start)`.
///
/// The reader is seeked to the end to determine file size, then to the
/// footer position. After this call the cursor is at the end of the file.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> IoResult<(u32, u32)> {
    let filesize = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(footer_pos(filesize)))?;
    let index_start = r.read_u32::<BigEndian>()?;
    let filter_start = r.read_u32::<BigEndian>()?;
    Ok((index_start, filter_start))
}
