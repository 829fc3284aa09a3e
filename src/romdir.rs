//! The ROMDIR section: the image's table of contents.
//!
//! ROMDIR is an array of fixed-size records, one per entry, terminated by a
//! record with an empty name:
//! ```text
//! +--------------------+--------------+---------+
//! | name               | extinfo_size | size    |
//! | 10 bytes, NUL-term | u16 le       | i32 le  |
//! +--------------------+--------------+---------+
//! ```
//! The first three records are always `RESET`, `ROMDIR` and `EXTINFO`. The
//! sizes of the latter two are the lengths of their respective sections.

use log::trace;

use crate::entry::Entry;
use crate::extinfo;
use crate::image::Error;
use crate::int::Reader;

/// The length of a single directory record.
pub const RECORD_LEN: usize = 16;

/// The length of the name field of a record.
pub const NAME_LEN: usize = 10;

/// Index of the `RESET` record.
pub const RESET: usize = 0;
/// Index of the `ROMDIR` record.
pub const ROMDIR: usize = 1;
/// Index of the `EXTINFO` record.
pub const EXTINFO: usize = 2;
/// The number of reserved records at the start of every directory.
pub const RESERVED: usize = 3;

/// Reserved entry names, in directory order.
pub const RESERVED_NAMES: [&str; RESERVED] = ["RESET", "ROMDIR", "EXTINFO"];

/// A single ROMDIR record.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Record {
  /// The entry's name, NUL-padded.
  pub name: [u8; NAME_LEN],
  /// The length of the entry's records in the EXTINFO section.
  pub extinfo_size: u16,
  /// The length of the entry's payload, or of the section it names for
  /// reserved records.
  pub size: i32,
}

impl Record {
  /// Creates a record for the entry called `name`.
  ///
  /// Names longer than `NAME_LEN - 1` bytes are cut short; callers are
  /// expected to have checked them already.
  pub fn new(name: &str, extinfo_size: u16, size: i32) -> Self {
    let mut record = Record {
      name: [0; NAME_LEN],
      extinfo_size,
      size,
    };
    let len = name.len().min(NAME_LEN - 1);
    record.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    record
  }

  /// Creates the terminating record.
  pub fn sentinel() -> Self {
    Self::default()
  }

  /// Returns whether this is the terminating record.
  pub fn is_sentinel(&self) -> bool {
    self.name[0] == 0
  }

  /// Returns this record's name, up to the first NUL.
  pub fn name(&self) -> String {
    let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    String::from_utf8_lossy(&self.name[..len]).into_owned()
  }

  /// Reads a record from `r`.
  pub fn read(r: &mut Reader) -> Option<Self> {
    Some(Record {
      name: r.array()?,
      extinfo_size: r.u16_le()?,
      size: r.i32_le()?,
    })
  }

  /// Converts this record into its on-disk bytes.
  pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
    let mut bytes = [0; RECORD_LEN];
    bytes[..NAME_LEN].copy_from_slice(&self.name);
    bytes[NAME_LEN..12].copy_from_slice(&self.extinfo_size.to_le_bytes());
    bytes[12..].copy_from_slice(&self.size.to_le_bytes());
    bytes
  }

  /// Overwrites the record at `index` within the directory at the start of
  /// `image`.
  pub fn store(&self, image: &mut [u8], index: usize) {
    let start = index * RECORD_LEN;
    image[start..start + RECORD_LEN].copy_from_slice(&self.to_bytes());
  }
}

/// Builds the directory for `entries`, the three reserved entries included.
///
/// The returned records end with the sentinel.
pub fn build(entries: &[Entry]) -> Vec<Record> {
  let mut records = Vec::with_capacity(entries.len() + 1);
  let mut extinfo_total = 0;
  for (i, entry) in entries.iter().enumerate() {
    let extinfo_size = extinfo::encoded_size(entry);
    extinfo_total += extinfo_size;
    let size = if i < RESERVED { 0 } else { entry.len() as i32 };
    records.push(Record::new(entry.name(), extinfo_size as u16, size));
  }
  records.push(Record::sentinel());

  if records.len() > EXTINFO {
    records[RESET].size = 0;
    records[ROMDIR].size = (records.len() * RECORD_LEN) as i32;
    records[EXTINFO].size = extinfo_total as i32;
  }
  records
}

/// Encodes `records` into `out`.
pub fn encode(records: &[Record], out: &mut Vec<u8>) {
  for record in records {
    out.extend_from_slice(&record.to_bytes());
  }
}

/// Parses the directory at the start of `image`, sentinel included.
pub fn parse(image: &[u8]) -> Result<Vec<Record>, Error> {
  let mut r = Reader::new(image);
  let mut records = Vec::new();
  loop {
    let record = Record::read(&mut r).ok_or(Error::TruncatedDirectory)?;
    trace!(
      "romdir: {:?} extinfo={} size={}",
      record.name(),
      record.extinfo_size,
      record.size
    );
    records.push(record);
    if record.is_sentinel() {
      return Ok(records);
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn record_layout() {
    let record = Record::new("SIO2MAN", 0x14, 0x1234);
    assert_eq!(
      record.to_bytes(),
      [
        b'S', b'I', b'O', b'2', b'M', b'A', b'N', 0, 0, 0, //
        0x14, 0, 0x34, 0x12, 0, 0,
      ]
    );
    assert_eq!(record.name(), "SIO2MAN");
    assert_eq!(Record::read(&mut Reader::new(&record.to_bytes())), Some(record));
  }

  #[test]
  fn reserved_sizes() {
    let entries = [
      Entry::new("RESET", Vec::<u8>::new()).with_date(Default::default()),
      Entry::new("ROMDIR", Vec::<u8>::new()).with_description("abc"),
      Entry::new("EXTINFO", Vec::<u8>::new()).with_null(),
      Entry::new("A", vec![0u8; 300]).with_version(1),
    ];
    let records = build(&entries);
    assert_eq!(records.len(), 5);
    assert!(records[4].is_sentinel());
    assert_eq!(records[RESET].size, 0);
    assert_eq!(records[ROMDIR].size, 80);
    assert_eq!(records[EXTINFO].size, 8 + 8 + 8 + 4);
    assert_eq!(records[3].size, 300);
    assert_eq!(records[3].extinfo_size, 4);
  }

  #[test]
  fn parse_stops_at_sentinel() {
    let mut bytes = Vec::new();
    encode(
      &[Record::new("RESET", 8, 0), Record::sentinel()],
      &mut bytes,
    );
    bytes.extend_from_slice(&[0xff; 32]);
    let records = parse(&bytes).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name(), "RESET");

    assert_eq!(parse(&bytes[..16]), Err(Error::TruncatedDirectory));
    assert_eq!(parse(&[0xff; 40]), Err(Error::TruncatedDirectory));
  }
}
