//! Reading ROM images.
//!
//! A ROM image is three sections laid end to end:
//! ```text
//! +----------------+  0
//! | ROMDIR         |  16 * (entries + 1)
//! +----------------+  romdir_size
//! | EXTINFO        |  sum of every record's extinfo_size
//! +----------------+  align16(romdir_size + extinfo_size)
//! | payload 3      |  each payload starts on a 16-byte boundary
//! | payload 4      |
//! | ...            |
//! +----------------+
//! ```
//! The three reserved entries have no payload.

use std::borrow::Cow;
use std::convert::TryFrom;

use log::debug;
use thiserror::Error;

use crate::entry::Entry;
use crate::extinfo;
use crate::int::align16;
use crate::romdir;
use crate::romdir::Record;

/// The bytes every image starts with: the name of the `RESET` record.
pub const MAGIC: &[u8] = b"RESET";

/// The smallest possible image: three reserved records.
pub const MIN_LEN: usize = 3 * romdir::RECORD_LEN;

/// An error describing a malformed image, or an impossible edit to one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
  /// The buffer does not look like a ROM image at all.
  #[error("not a valid PlayStation 2 ROM image")]
  NotAnImage,
  /// The buffer ended before the ROMDIR sentinel.
  #[error("ROMDIR section ended prematurely")]
  TruncatedDirectory,
  /// The buffer ended in the middle of an entry's EXTINFO records.
  #[error("EXTINFO section ended prematurely in entry {entry}")]
  TruncatedMetadata {
    /// The entry whose records were cut short.
    entry: String,
  },
  /// An EXTINFO record had an unknown id.
  #[error("invalid EXTINFO id {id:#04x} for entry {entry}")]
  UnknownMetadataTag {
    /// The entry the record belongs to.
    entry: String,
    /// The offending id.
    id: u8,
  },
  /// An entry's payload lies past the end of the image.
  #[error("entry {entry} runs past the end of the image")]
  SectionOverrun {
    /// The entry whose payload is out of bounds.
    entry: String,
  },
  /// A name passed to an edit does not exist in the image.
  #[error("entry {name} not found in ROM image")]
  EntryNotFound {
    /// The name that was looked for.
    name: String,
  },
  /// An entry name does not fit in a ROMDIR record.
  #[error("invalid ROM entry {name}: name too long")]
  NameTooLong {
    /// The offending name.
    name: String,
  },
  /// An entry name is already taken.
  #[error("entry {name} already exists in ROM image")]
  DuplicateEntry {
    /// The offending name.
    name: String,
  },
  /// An edit tried to remove one of the reserved entries.
  #[error("entry {name} is reserved and cannot be removed")]
  ReservedEntry {
    /// The reserved entry's name.
    name: String,
  },
}

/// The sizes of the three sections of an image.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Layout {
  /// The length of ROMDIR, sentinel included.
  pub romdir_size: usize,
  /// The length of EXTINFO, not counting the padding after it.
  pub extinfo_size: usize,
  /// The length of the payload section, not counting any trailing padding.
  pub irx_size: usize,
}

impl Layout {
  /// Returns the offset of the EXTINFO section.
  pub fn extinfo_offset(&self) -> usize {
    self.romdir_size
  }

  /// Returns the offset of the payload section.
  pub fn irx_offset(&self) -> usize {
    align16(self.romdir_size + self.extinfo_size)
  }

  /// Returns the length of an image with this layout.
  pub fn total(&self) -> usize {
    self.irx_offset() + self.irx_size
  }
}

/// A parsed ROM image.
///
/// Entry payloads are borrowed from the buffer the image was parsed from.
#[derive(Clone, Debug)]
pub struct Image<'img> {
  layout: Layout,
  records: Vec<Record>,
  entries: Vec<Entry<'img>>,
}

impl<'img> Image<'img> {
  /// Returns the section layout of this image.
  pub fn layout(&self) -> Layout {
    self.layout
  }

  /// Returns the directory records, not including the sentinel.
  pub fn records(&self) -> &[Record] {
    &self.records
  }

  /// Returns every entry, reserved ones included.
  pub fn entries(&self) -> &[Entry<'img>] {
    &self.entries
  }

  /// Returns the entries that carry a payload.
  pub fn user_entries(&self) -> &[Entry<'img>] {
    &self.entries[romdir::RESERVED..]
  }

  /// Finds the index of the entry called `name`.
  pub fn find(&self, name: &str) -> Option<usize> {
    self.entries.iter().position(|e| e.name() == name)
  }

  /// Returns the size recorded in the directory for entry `index`.
  ///
  /// For user entries this is the payload length; for reserved ones it's the
  /// length of the section they describe.
  pub fn size_of(&self, index: usize) -> usize {
    self.records[index].size.max(0) as usize
  }
}

/// Parses a ROM image.
pub fn parse(bytes: &[u8]) -> Result<Image<'_>, Error> {
  if bytes.len() < MIN_LEN || !bytes.starts_with(MAGIC) {
    return Err(Error::NotAnImage);
  }

  let mut records = romdir::parse(bytes)?;
  let romdir_size = records.len() * romdir::RECORD_LEN;
  records.pop();
  if records.len() < romdir::RESERVED {
    return Err(Error::NotAnImage);
  }

  let extinfo_size = records[romdir::EXTINFO].size.max(0) as usize;
  let irx_offset = align16(romdir_size + extinfo_size);
  let layout = Layout {
    romdir_size,
    extinfo_size,
    irx_size: bytes.len().saturating_sub(irx_offset),
  };
  debug!("image: {} entries, {:?}", records.len(), layout);

  let mut entries = Vec::with_capacity(records.len());
  let mut extinfo_cursor = romdir_size;
  let mut irx_cursor = irx_offset;
  for (i, record) in records.iter().enumerate() {
    let name = record.name();
    let declared = record.extinfo_size as usize;
    let meta = bytes
      .get(extinfo_cursor..)
      .ok_or_else(|| Error::SectionOverrun {
        entry: name.clone(),
      })
      .and_then(|rest| {
        extinfo::decode(rest, declared).map_err(|e| match e {
          extinfo::DecodeError::Truncated => Error::TruncatedMetadata {
            entry: name.clone(),
          },
          extinfo::DecodeError::UnknownTag(id) => Error::UnknownMetadataTag {
            entry: name.clone(),
            id,
          },
        })
      })?;
    extinfo_cursor += declared;

    let payload: &[u8] = if i < romdir::RESERVED {
      &[]
    } else {
      let size = usize::try_from(record.size).map_err(|_| {
        Error::SectionOverrun {
          entry: name.clone(),
        }
      })?;
      let payload = irx_cursor
        .checked_add(size)
        .and_then(|end| bytes.get(irx_cursor..end))
        .ok_or_else(|| Error::SectionOverrun {
          entry: name.clone(),
        })?;
      irx_cursor = align16(irx_cursor + size);
      payload
    };

    entries.push(meta.apply(Entry::new(name, Cow::Borrowed(payload))));
  }

  Ok(Image {
    layout,
    records,
    entries,
  })
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::int::Date;

  /// Lays out an image by hand, independently of the assembler.
  fn handmade() -> Vec<u8> {
    let mut image = Vec::new();
    romdir::encode(
      &[
        Record::new("RESET", 8, 0),
        Record::new("ROMDIR", 8, 80),
        Record::new("EXTINFO", 8, 28),
        Record::new("A", 4, 5),
        Record::sentinel(),
      ],
      &mut image,
    );
    image.extend_from_slice(&[0, 0, 4, 1, 0x07, 0x03, 0x24, 0x20]);
    image.extend_from_slice(&[0, 0, 4, 3, b'x', b'y', 0, 0]);
    image.extend_from_slice(&[0, 0, 4, 0x7f, 0, 0, 0, 0]);
    image.extend_from_slice(&[0x01, 0x02, 0, 2]);
    image.resize(112, 0);
    image.extend_from_slice(b"hello");
    image
  }

  #[test]
  fn parses_handmade_image() {
    let bytes = handmade();
    let image = parse(&bytes).unwrap();
    assert_eq!(
      image.layout(),
      Layout {
        romdir_size: 80,
        extinfo_size: 28,
        irx_size: 5,
      }
    );
    assert_eq!(image.entries().len(), 4);

    let names = image.entries().iter().map(Entry::name).collect::<Vec<_>>();
    assert_eq!(names, ["RESET", "ROMDIR", "EXTINFO", "A"]);
    assert_eq!(image.entries()[0].date(), Some(Date::from_ymd(2024, 3, 7)));
    assert_eq!(image.entries()[1].description(), Some(&b"xy"[..]));
    assert_eq!(image.size_of(1), 80);

    let a = &image.user_entries()[0];
    assert_eq!(a.version(), Some(0x0201));
    assert_eq!(a.payload(), b"hello");
    assert_eq!(image.find("A"), Some(3));
    assert_eq!(image.find("B"), None);
  }

  #[test]
  fn rejects_non_images() {
    assert_eq!(parse(b"RESET").unwrap_err(), Error::NotAnImage);
    let mut bytes = handmade();
    bytes[0] = b'r';
    assert_eq!(parse(&bytes).unwrap_err(), Error::NotAnImage);

    // Only two records before the sentinel.
    let mut bytes = Vec::new();
    romdir::encode(
      &[
        Record::new("RESET", 0, 0),
        Record::new("ROMDIR", 0, 48),
        Record::sentinel(),
      ],
      &mut bytes,
    );
    assert_eq!(parse(&bytes).unwrap_err(), Error::NotAnImage);
  }

  #[test]
  fn payload_overrun() {
    let bytes = handmade();
    assert_eq!(
      parse(&bytes[..bytes.len() - 1]).unwrap_err(),
      Error::SectionOverrun {
        entry: "A".to_string()
      }
    );
  }

  #[test]
  fn bad_metadata() {
    let mut bytes = handmade();
    bytes[80 + 8 + 3] = 0x55;
    assert_eq!(
      parse(&bytes).unwrap_err(),
      Error::UnknownMetadataTag {
        entry: "ROMDIR".to_string(),
        id: 0x55,
      }
    );

    let bytes = handmade();
    assert_eq!(
      parse(&bytes[..84]).unwrap_err(),
      Error::TruncatedMetadata {
        entry: "RESET".to_string()
      }
    );
  }
}
