//! ROM image entries.
//!
//! An [`Entry`] is the logical unit stored in an image: a named payload plus
//! the optional date, version and description carried in the EXTINFO
//! section. Entries built from module files own their payload; entries
//! parsed out of an image borrow it from the image buffer.
//!
//! [`Entry`]: struct.Entry.html

use std::borrow::Cow;

use bitflags::bitflags;

use crate::int::Date;

/// The longest name an entry may have, in bytes.
///
/// Names are stored NUL-terminated in a 10-byte field.
pub const NAME_MAX: usize = 9;

/// The longest description an entry may carry, in bytes.
///
/// A description is stored NUL-terminated and padded to four bytes, and its
/// record length must fit in a `u8`, so 251 bytes plus the terminator is the
/// most that can be represented.
pub const DESCRIPTION_MAX: usize = 251;

bitflags! {
  /// Which pieces of metadata an `Entry` carries.
  #[derive(Default)]
  pub struct Flags: u8 {
    /// The entry has a date record.
    const DATE = 0x1;
    /// The entry has a version record.
    const VERSION = 0x2;
    /// The entry has a description record.
    const DESCRIPTION = 0x4;
    /// The entry carries the null record; only used by `EXTINFO`.
    const NULL = 0x8;
  }
}

/// An entry's binary contents.
///
/// Payloads parsed from an image are views into the image buffer and cannot
/// outlive it.
pub type Payload<'img> = Cow<'img, [u8]>;

/// A single ROM image entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<'img> {
  name: String,
  flags: Flags,
  date: Date,
  version: u16,
  description: Vec<u8>,
  payload: Payload<'img>,
}

impl<'img> Entry<'img> {
  /// Creates a new entry with no metadata.
  ///
  /// The name is not validated here; see [`check_name`].
  ///
  /// [`check_name`]: fn.check_name.html
  pub fn new(name: impl Into<String>, payload: impl Into<Payload<'img>>) -> Self {
    Entry {
      name: name.into(),
      flags: Flags::empty(),
      date: Date::default(),
      version: 0,
      description: Vec::new(),
      payload: payload.into(),
    }
  }

  /// Attaches a date record.
  pub fn with_date(mut self, date: Date) -> Self {
    self.flags |= Flags::DATE;
    self.date = date;
    self
  }

  /// Attaches a version record.
  pub fn with_version(mut self, version: u16) -> Self {
    self.flags |= Flags::VERSION;
    self.version = version;
    self
  }

  /// Attaches a description record, truncating it to [`DESCRIPTION_MAX`]
  /// bytes.
  ///
  /// Descriptions are opaque bytes; they are usually ASCII, but modules are
  /// free to use other encodings, such as Shift-JIS.
  ///
  /// [`DESCRIPTION_MAX`]: constant.DESCRIPTION_MAX.html
  pub fn with_description(mut self, description: impl Into<Vec<u8>>) -> Self {
    let mut description = description.into();
    description.truncate(DESCRIPTION_MAX);
    self.flags |= Flags::DESCRIPTION;
    self.description = description;
    self
  }

  /// Attaches the null record.
  pub fn with_null(mut self) -> Self {
    self.flags |= Flags::NULL;
    self
  }

  /// Returns this entry's name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns which metadata records this entry carries.
  pub fn flags(&self) -> Flags {
    self.flags
  }

  /// Returns this entry's date, if it has one.
  pub fn date(&self) -> Option<Date> {
    self.flags.contains(Flags::DATE).then(|| self.date)
  }

  /// Returns this entry's version, if it has one.
  pub fn version(&self) -> Option<u16> {
    self.flags.contains(Flags::VERSION).then(|| self.version)
  }

  /// Returns this entry's description, if it has one.
  pub fn description(&self) -> Option<&[u8]> {
    if self.flags.contains(Flags::DESCRIPTION) {
      Some(&self.description)
    } else {
      None
    }
  }

  /// Returns this entry's payload.
  pub fn payload(&self) -> &[u8] {
    &self.payload
  }

  /// Returns the length of this entry's payload.
  pub fn len(&self) -> usize {
    self.payload.len()
  }

  /// Returns whether this entry's payload is empty.
  pub fn is_empty(&self) -> bool {
    self.payload.is_empty()
  }
}

/// Checks that `name` fits in a directory record.
pub fn check_name(name: &str) -> bool {
  !name.is_empty() && name.len() <= NAME_MAX && !name.contains('\0')
}
