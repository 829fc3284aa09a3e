//! Integer helpers used by the image codecs.
//!
//! ROM images are built out of little-endian fields laid out on 4- and
//! 16-byte boundaries, with dates stored in an odd decimal-as-hex encoding.
//! This module provides the alignment helpers, the [`Date`] type and a
//! bounds-checked [`Reader`] for pulling fields out of a byte buffer.
//!
//! [`Date`]: struct.Date.html
//! [`Reader`]: struct.Reader.html

use std::fmt;

use chrono::Datelike;

/// Rounds `n` up to the next multiple of 4.
#[inline]
pub const fn align4(n: usize) -> usize {
  (n + 0x3) & !0x3
}

/// Rounds `n` up to the next multiple of 16.
#[inline]
pub const fn align16(n: usize) -> usize {
  (n + 0xf) & !0xf
}

/// A calendar date, encoded as `0xYYYYMMDD`.
///
/// The digits of the hex representation are the decimal digits of the date,
/// so the 7th of March 2024 is stored as `0x20240307`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Date(u32);

impl Date {
  /// Wraps a raw, already-encoded date.
  #[inline]
  pub const fn from_u32(raw: u32) -> Self {
    Date(raw)
  }

  /// Encodes the given year, month and day.
  ///
  /// ```
  /// # use ps2romimg::int::Date;
  /// assert_eq!(Date::from_ymd(2024, 3, 7).to_u32(), 0x2024_0307);
  /// ```
  pub fn from_ymd(year: u32, month: u32, day: u32) -> Self {
    Date(bcd(year % 10000) << 16 | bcd(month % 100) << 8 | bcd(day % 100))
  }

  /// Encodes the date part of any `chrono` date or datetime.
  pub fn from_datelike(date: &impl Datelike) -> Self {
    Self::from_ymd(date.year().max(0) as u32, date.month(), date.day())
  }

  /// Returns the raw encoded value.
  #[inline]
  pub const fn to_u32(self) -> u32 {
    self.0
  }

  /// Converts this date into its little-endian on-disk bytes.
  #[inline]
  pub fn to_le_bytes(self) -> [u8; 4] {
    self.0.to_le_bytes()
  }
}

/// Packs the decimal digits of `n` into nybbles.
fn bcd(mut n: u32) -> u32 {
  let mut packed = 0;
  let mut shift = 0;
  while n != 0 {
    packed |= (n % 10) << shift;
    n /= 10;
    shift += 4;
  }
  packed
}

macro_rules! impl_fmt_date {
  ($($trait:ident),*) => {
    $(impl fmt::$trait for Date {
      fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::$trait::fmt(&self.0, f)
      }
    })*
  }
}
impl_fmt_date!(LowerHex, UpperHex);

/// A cursor over a byte buffer where every read is bounds-checked.
///
/// Reads return `None` instead of panicking when the buffer is too short;
/// callers turn that into whatever error fits what they were decoding.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
  buf: &'a [u8],
  pos: usize,
}

impl<'a> Reader<'a> {
  /// Creates a new `Reader` at the start of `buf`.
  pub fn new(buf: &'a [u8]) -> Self {
    Self { buf, pos: 0 }
  }

  /// Creates a new `Reader` positioned at `pos`, if `pos` is in bounds.
  pub fn at(buf: &'a [u8], pos: usize) -> Option<Self> {
    if pos > buf.len() {
      return None;
    }
    Some(Self { buf, pos })
  }

  /// Returns the current position within the buffer.
  #[inline]
  pub fn pos(&self) -> usize {
    self.pos
  }

  /// Returns the number of bytes left to read.
  #[inline]
  pub fn remaining(&self) -> usize {
    self.buf.len() - self.pos
  }

  /// Reads the next `n` bytes.
  pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
    let end = self.pos.checked_add(n)?;
    let bytes = self.buf.get(self.pos..end)?;
    self.pos = end;
    Some(bytes)
  }

  /// Reads exactly `N` bytes into an array.
  pub fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
    let mut array = [0; N];
    array.copy_from_slice(self.take(N)?);
    Some(array)
  }

  /// Skips over `n` bytes.
  pub fn skip(&mut self, n: usize) -> Option<()> {
    self.take(n).map(|_| ())
  }

  /// Reads a single byte.
  pub fn u8(&mut self) -> Option<u8> {
    self.array::<1>().map(|[b]| b)
  }

  /// Reads a little-endian `u16`.
  pub fn u16_le(&mut self) -> Option<u16> {
    self.array().map(u16::from_le_bytes)
  }

  /// Reads a big-endian `u16`.
  pub fn u16_be(&mut self) -> Option<u16> {
    self.array().map(u16::from_be_bytes)
  }

  /// Reads a little-endian `u32`.
  pub fn u32_le(&mut self) -> Option<u32> {
    self.array().map(u32::from_le_bytes)
  }

  /// Reads a little-endian `i32`.
  pub fn i32_le(&mut self) -> Option<i32> {
    self.array().map(i32::from_le_bytes)
  }

  /// Reads a NUL-terminated string of at most `max` bytes, not counting the
  /// terminator. The terminator is consumed.
  ///
  /// Returns `None` if no NUL is found within `max + 1` bytes, or before the
  /// end of the buffer.
  pub fn c_str(&mut self, max: usize) -> Option<&'a [u8]> {
    let rest = &self.buf[self.pos..];
    let window = &rest[..rest.len().min(max + 1)];
    let len = window.iter().position(|&b| b == 0)?;
    self.pos += len + 1;
    Some(&rest[..len])
  }
}
