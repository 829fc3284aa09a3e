//! The EXTINFO section codec.
//!
//! Each entry's metadata is a run of tagged records, each a four-byte header
//! followed by a payload:
//! ```text
//! +--------+------+----+---------------+
//! | value  | size | id | payload ...   |
//! | u16 le | u8   | u8 | `size` bytes  |
//! +--------+------+----+---------------+
//! ```
//! Records always appear in the order date, version, description, null, and
//! only those implied by the entry's [`Flags`] are present.
//!
//! [`Flags`]: ../entry/struct.Flags.html

use thiserror::Error;

use crate::entry::Entry;
use crate::entry::Flags;
use crate::int::align4;
use crate::int::Date;
use crate::int::Reader;

/// The length of a record header.
pub const HEADER_LEN: usize = 4;

/// Record id for a date.
pub const ID_DATE: u8 = 1;
/// Record id for a version.
pub const ID_VERSION: u8 = 2;
/// Record id for a description.
pub const ID_DESCRIPTION: u8 = 3;
/// Record id for the null record.
pub const ID_NULL: u8 = 0x7f;

/// Metadata decoded from an entry's records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
  /// Which records were present.
  pub flags: Flags,
  /// The date, if `flags` contains `DATE`.
  pub date: Date,
  /// The version, if `flags` contains `VERSION`.
  pub version: u16,
  /// The description, if `flags` contains `DESCRIPTION`.
  pub description: Vec<u8>,
}

impl Metadata {
  /// Applies this metadata to `entry`.
  pub fn apply<'img>(self, mut entry: Entry<'img>) -> Entry<'img> {
    if self.flags.contains(Flags::DATE) {
      entry = entry.with_date(self.date);
    }
    if self.flags.contains(Flags::VERSION) {
      entry = entry.with_version(self.version);
    }
    if self.flags.contains(Flags::DESCRIPTION) {
      entry = entry.with_description(self.description);
    }
    if self.flags.contains(Flags::NULL) {
      entry = entry.with_null();
    }
    entry
  }
}

/// Errors from decoding a run of records.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
  /// A record header or payload runs past the available bytes.
  #[error("metadata record runs past the end of its entry")]
  Truncated,
  /// A record has an id that isn't one of the four known ones.
  #[error("unknown metadata record id {0:#04x}")]
  UnknownTag(u8),
}

fn description_len(description: &[u8]) -> usize {
  align4(description.len() + 1)
}

/// Computes how many bytes `entry`'s records take up, without encoding them.
pub fn encoded_size(entry: &Entry) -> usize {
  let mut size = 0;
  if entry.date().is_some() {
    size += HEADER_LEN + 4;
  }
  if entry.version().is_some() {
    size += HEADER_LEN;
  }
  if let Some(description) = entry.description() {
    size += HEADER_LEN + description_len(description);
  }
  if entry.flags().contains(Flags::NULL) {
    size += HEADER_LEN + 4;
  }
  size
}

fn header(out: &mut Vec<u8>, value: u16, size: usize, id: u8) {
  debug_assert!(size <= u8::MAX as usize);
  out.extend_from_slice(&value.to_le_bytes());
  out.push(size as u8);
  out.push(id);
}

/// Appends `entry`'s records to `out`, returning how many bytes were written.
///
/// The return value always equals `encoded_size(entry)`.
pub fn encode(entry: &Entry, out: &mut Vec<u8>) -> usize {
  let start = out.len();
  if let Some(date) = entry.date() {
    header(out, 0, 4, ID_DATE);
    out.extend_from_slice(&date.to_le_bytes());
  }
  if let Some(version) = entry.version() {
    header(out, version, 0, ID_VERSION);
  }
  if let Some(description) = entry.description() {
    let len = description_len(description);
    header(out, 0, len, ID_DESCRIPTION);
    out.extend_from_slice(description);
    out.resize(out.len() + len - description.len(), 0);
  }
  if entry.flags().contains(Flags::NULL) {
    header(out, 0, 4, ID_NULL);
    out.extend_from_slice(&[0; 4]);
  }

  let written = out.len() - start;
  debug_assert_eq!(written, encoded_size(entry));
  written
}

/// Decodes records from the front of `bytes` until exactly `declared` bytes
/// have been consumed.
pub fn decode(bytes: &[u8], declared: usize) -> Result<Metadata, DecodeError> {
  let bytes = bytes.get(..declared).ok_or(DecodeError::Truncated)?;
  let mut r = Reader::new(bytes);
  let mut meta = Metadata::default();

  while r.remaining() != 0 {
    let value = r.u16_le().ok_or(DecodeError::Truncated)?;
    let size = r.u8().ok_or(DecodeError::Truncated)? as usize;
    let id = r.u8().ok_or(DecodeError::Truncated)?;
    let payload = r.take(size).ok_or(DecodeError::Truncated)?;

    match id {
      ID_DATE => {
        let raw = Reader::new(payload).u32_le().ok_or(DecodeError::Truncated)?;
        meta.date = Date::from_u32(raw);
        meta.flags |= Flags::DATE;
      }
      ID_VERSION => {
        meta.version = value;
        meta.flags |= Flags::VERSION;
      }
      ID_DESCRIPTION => {
        let len = payload.iter().position(|&b| b == 0).unwrap_or(size);
        meta.description = payload[..len].to_vec();
        meta.flags |= Flags::DESCRIPTION;
      }
      ID_NULL => meta.flags |= Flags::NULL,
      id => return Err(DecodeError::UnknownTag(id)),
    }
  }

  Ok(meta)
}
