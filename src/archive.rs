//! Stored (uncompressed) ZIP archive encoder.
//!
//! Builds a single archive from named byte buffers without a compression
//! library. Every entry is written with method 0 ("stored"), so the
//! compressed and uncompressed sizes are both the raw length. Photos are
//! already compressed and the CSV/JSON metadata is small, so deflate would
//! buy little.
//!
//! # Layout
//!
//! ```text
//! [local header 1][name 1][data 1] ... [local header n][name n][data n]
//! [central record 1][name 1] ... [central record n][name n]
//! [end of central directory]
//! ```
//!
//! Offsets and checksums are only computed in [`ArchiveBuilder::finish`],
//! which is the only way to obtain the output buffer.
//!
//! # Limits
//!
//! No ZIP64 extension records are written. Entries over 4 GiB, names over
//! 65535 bytes, more than 65535 entries, or offsets past 4 GiB make
//! [`finish`](ArchiveBuilder::finish) fail with an [`ArchiveError`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::ArchiveError;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4b50;

/// Version 2.0, MS-DOS attribute compatibility.
const VERSION: u16 = 20;
const METHOD_STORED: u16 = 0;
/// General purpose bit 11: file name is UTF-8.
const FLAG_UTF8_NAME: u16 = 1 << 11;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_RECORD_LEN: usize = 22;

/// One named file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path-like name (`images/Artist - Title/1.jpg`).
    pub name: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Accumulates entries and encodes them in insertion order.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    entries: Vec<ArchiveEntry>,
    modified: NaiveDateTime,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    /// Empty builder; entries are stamped with the MS-DOS epoch (1980-01-01).
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            modified: dos_epoch(),
        }
    }

    /// Set the modification time written for every entry.
    pub fn modified_at(mut self, modified: NaiveDateTime) -> Self {
        self.modified = modified;
        self
    }

    /// Append an entry. Its position in the output follows insertion order.
    pub fn add(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.push(ArchiveEntry::new(name, data));
        self
    }

    pub fn push(&mut self, entry: ArchiveEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode all entries into one archive buffer.
    pub fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        if self.entries.len() > u16::MAX as usize {
            return Err(ArchiveError::TooManyEntries {
                count: self.entries.len(),
            });
        }

        let (dos_time, dos_date) = dos_timestamp(&self.modified);

        let mut out = Vec::with_capacity(self.encoded_len());
        let mut central = Vec::new();

        for entry in &self.entries {
            let name = entry.name.as_bytes();
            let name_len =
                u16::try_from(name.len()).map_err(|_| ArchiveError::NameTooLong { len: name.len() })?;
            let size = u32::try_from(entry.data.len()).map_err(|_| ArchiveError::EntryTooLarge {
                name: entry.name.clone(),
                size: entry.data.len() as u64,
            })?;
            let offset = u32::try_from(out.len()).map_err(|_| ArchiveError::ArchiveTooLarge)?;
            let crc = crc32(&entry.data);
            let flags = if entry.name.is_ascii() { 0 } else { FLAG_UTF8_NAME };

            put_u32(&mut out, LOCAL_HEADER_SIGNATURE);
            put_u16(&mut out, VERSION);
            put_u16(&mut out, flags);
            put_u16(&mut out, METHOD_STORED);
            put_u16(&mut out, dos_time);
            put_u16(&mut out, dos_date);
            put_u32(&mut out, crc);
            put_u32(&mut out, size);
            put_u32(&mut out, size);
            put_u16(&mut out, name_len);
            put_u16(&mut out, 0); // extra field length
            out.extend_from_slice(name);
            out.extend_from_slice(&entry.data);

            put_u32(&mut central, CENTRAL_HEADER_SIGNATURE);
            put_u16(&mut central, VERSION); // made by
            put_u16(&mut central, VERSION); // needed to extract
            put_u16(&mut central, flags);
            put_u16(&mut central, METHOD_STORED);
            put_u16(&mut central, dos_time);
            put_u16(&mut central, dos_date);
            put_u32(&mut central, crc);
            put_u32(&mut central, size);
            put_u32(&mut central, size);
            put_u16(&mut central, name_len);
            put_u16(&mut central, 0); // extra field length
            put_u16(&mut central, 0); // comment length
            put_u16(&mut central, 0); // disk number start
            put_u16(&mut central, 0); // internal attributes
            put_u32(&mut central, 0); // external attributes
            put_u32(&mut central, offset);
            central.extend_from_slice(name);
        }

        let central_offset = u32::try_from(out.len()).map_err(|_| ArchiveError::ArchiveTooLarge)?;
        let central_size =
            u32::try_from(central.len()).map_err(|_| ArchiveError::ArchiveTooLarge)?;
        central_offset
            .checked_add(central_size)
            .ok_or(ArchiveError::ArchiveTooLarge)?;
        let count = self.entries.len() as u16;

        out.extend_from_slice(&central);

        put_u32(&mut out, END_OF_CENTRAL_DIR_SIGNATURE);
        put_u16(&mut out, 0); // this disk
        put_u16(&mut out, 0); // disk holding the central directory
        put_u16(&mut out, count); // entries on this disk
        put_u16(&mut out, count); // entries in total
        put_u32(&mut out, central_size);
        put_u32(&mut out, central_offset);
        put_u16(&mut out, 0); // comment length

        Ok(out)
    }

    fn encoded_len(&self) -> usize {
        self.entries
            .iter()
            .map(|e| LOCAL_HEADER_LEN + CENTRAL_HEADER_LEN + 2 * e.name.len() + e.data.len())
            .sum::<usize>()
            + END_RECORD_LEN
    }
}

/// Encode `entries` in order into a single stored ZIP archive.
pub fn build_archive(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>, ArchiveError> {
    let mut builder = ArchiveBuilder::new();
    for entry in entries {
        builder.push(entry);
    }
    builder.finish()
}

const CRC32_TABLE: [u32; 256] = crc32_table();

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`), as checked by
/// every ZIP reader.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

fn dos_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Pack a timestamp into MS-DOS `(time, date)` fields, clamped to 1980..=2107.
fn dos_timestamp(ts: &NaiveDateTime) -> (u16, u16) {
    let ts = if ts.year() < 1980 { dos_epoch() } else { *ts };
    let year = (ts.year() - 1980).min(127) as u16;
    let date = (year << 9) | ((ts.month() as u16) << 5) | ts.day() as u16;
    let time =
        ((ts.hour() as u16) << 11) | ((ts.minute() as u16) << 5) | (ts.second() as u16 / 2);
    (time, date)
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}
