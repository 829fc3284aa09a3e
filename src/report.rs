//! Human-readable reports about images.
//!
//! Listings look like this:
//! ```text
//! NAME      DATE     VER SIZE DESCRIPTION
//! ---------------------------------------
//! RESET     20050601 -      0 -
//! ROMDIR    -        -     80 20050601-090503,dummyconf,rom.img,...
//! EXTINFO   -        -     48 -
//! ndrv.irx  20050531 102  300 net driver
//! ```
//! Column widths are computed up front from the entries being reported on,
//! and passed around as [`Columns`].
//!
//! [`Columns`]: struct.Columns.html

use std::io;

use serde::Deserialize;
use serde::Serialize;

use crate::entry::Entry;
use crate::error::Kind;
use crate::image::Image;

/// Widths of the variable-width report columns.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Columns {
  /// The width of entry names in action messages.
  pub name: usize,
  /// The width of the size column in listings.
  pub size: usize,
}

impl Columns {
  /// The narrowest a column gets, which is the width of its header.
  pub const MIN: usize = 4;

  /// Computes the widths needed to fit every `(name, size)` pair.
  pub fn fit<'a>(rows: impl IntoIterator<Item = (&'a str, usize)>) -> Self {
    let mut cols = Columns {
      name: Self::MIN,
      size: Self::MIN,
    };
    for (name, size) in rows {
      cols.name = cols.name.max(name.len());
      cols.size = cols.size.max(size.to_string().len());
    }
    cols
  }

  /// Computes the widths needed to report on `entries`, using their payload
  /// lengths as sizes.
  pub fn of_entries(entries: &[Entry]) -> Self {
    Self::fit(entries.iter().map(|e| (e.name(), e.len())))
  }

  /// Computes the widths needed to list every entry of `image`.
  pub fn of_image(image: &Image) -> Self {
    Self::fit(
      image
        .entries()
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name(), image.size_of(i))),
    )
  }
}

impl Default for Columns {
  fn default() -> Self {
    Self::fit(None)
  }
}

/// Writes the listing header and its underline.
pub fn dump_header(cols: Columns, mut w: impl io::Write) -> io::Result<()> {
  let header = format!(
    "NAME      DATE     VER {:>width$} DESCRIPTION",
    "SIZE",
    width = cols.size
  );
  writeln!(w, "{}", header)?;
  writeln!(w, "{}", "-".repeat(header.len()))
}

/// Writes a single listing row for `entry`, which the directory says is
/// `size` bytes long.
pub fn dump_entry(
  cols: Columns,
  entry: &Entry,
  size: usize,
  mut w: impl io::Write,
) -> io::Result<()> {
  write!(w, "{:<9} ", entry.name())?;
  match entry.date() {
    Some(date) => write!(w, "{:<8X} ", date)?,
    None => write!(w, "-        ")?,
  }
  match entry.version() {
    Some(version) => write!(w, "{:<3X} ", version)?,
    None => write!(w, "-   ")?,
  }
  write!(w, "{:>width$} ", size, width = cols.size)?;
  match entry.description() {
    Some(description) => {
      writeln!(w, "{}", String::from_utf8_lossy(description))
    }
    None => writeln!(w, "-"),
  }
}

/// Writes a full listing of `image`.
pub fn dump_image(image: &Image, mut w: impl io::Write) -> io::Result<()> {
  let cols = Columns::of_image(image);
  dump_header(cols, &mut w)?;
  for (i, entry) in image.entries().iter().enumerate() {
    dump_entry(cols, entry, image.size_of(i), &mut w)?;
  }
  Ok(())
}

/// Writes a verbose progress message, such as `Adding a.irx (17 bytes)`.
pub fn dump_action(
  cols: Columns,
  verb: &str,
  name: &str,
  size: usize,
  mut w: impl io::Write,
) -> io::Result<()> {
  writeln!(
    w,
    "{} {:<width$} ({} bytes)",
    verb,
    name,
    size,
    width = cols.name
  )
}

/// A machine-readable listing of an image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
  /// Every entry in the image, in directory order.
  pub entries: Vec<ListedEntry>,
}

/// A single entry in a [`Listing`].
///
/// [`Listing`]: struct.Listing.html
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedEntry {
  /// The entry's name.
  pub name: String,
  /// The entry's date, as it would appear in a listing.
  #[serde(default)]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
  /// The entry's version.
  #[serde(default)]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<u16>,
  /// The size the directory records for the entry.
  pub size: usize,
  /// The entry's description. Bytes that are not UTF-8 are replaced with
  /// U+FFFD.
  #[serde(default)]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl Listing {
  /// Builds a listing of every entry of `image`.
  pub fn of_image(image: &Image) -> Self {
    let entries = image
      .entries()
      .iter()
      .enumerate()
      .map(|(i, e)| ListedEntry {
        name: e.name().to_string(),
        date: e.date().map(|d| format!("{:X}", d)),
        version: e.version(),
        size: image.size_of(i),
        description: e
          .description()
          .map(|d| String::from_utf8_lossy(d).into_owned()),
      })
      .collect();
    Listing { entries }
  }

  /// Writes this listing as JSON5.
  pub fn dump(&self, mut w: impl io::Write) -> Result<(), Kind> {
    let text = json5::to_string(self)?;
    writeln!(w, "{}", text)?;
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::image;
  use crate::int::Date;
  use crate::mkimg::assemble;
  use crate::mkimg::test::build_info;

  fn dump_to_string(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
    let mut out = Vec::new();
    f(&mut out).unwrap();
    String::from_utf8(out).unwrap()
  }

  #[test]
  fn header() {
    let text = dump_to_string(|w| dump_header(Columns::default(), w));
    assert_eq!(
      text,
      "NAME      DATE     VER SIZE DESCRIPTION\n\
       ---------------------------------------\n"
    );

    let cols = Columns { name: 4, size: 6 };
    let text = dump_to_string(|w| dump_header(cols, w));
    assert!(text.starts_with("NAME      DATE     VER   SIZE DESCRIPTION\n"));
  }

  #[test]
  fn rows() {
    let cols = Columns { name: 4, size: 5 };
    let entry = Entry::new("ndrv.irx", vec![0u8; 300])
      .with_date(Date::from_ymd(2005, 5, 31))
      .with_version(0x0102)
      .with_description("net driver");
    let text = dump_to_string(|w| dump_entry(cols, &entry, 300, w));
    assert_eq!(text, "ndrv.irx  20050531 102   300 net driver\n");

    let entry = Entry::new("EXTINFO", Vec::<u8>::new()).with_null();
    let text = dump_to_string(|w| dump_entry(cols, &entry, 48, w));
    assert_eq!(text, "EXTINFO   -        -      48 -\n");

    let entry = Entry::new("jp.irx", vec![0u8; 4]).with_description([0x83u8]);
    let text = dump_to_string(|w| dump_entry(cols, &entry, 4, w));
    assert_eq!(text, "jp.irx    -        -       4 \u{fffd}\n");
  }

  #[test]
  fn widths() {
    let cols = Columns::fit(vec![("a", 3), ("SIO2MAN", 123456)]);
    assert_eq!(cols, Columns { name: 7, size: 6 });
    assert_eq!(Columns::default(), Columns { name: 4, size: 4 });

    let text = dump_to_string(|w| dump_action(cols, "Adding", "a", 3, w));
    assert_eq!(text, "Adding a       (3 bytes)\n");
  }

  #[test]
  fn image_listing() {
    let bytes = assemble(&[], &build_info()).unwrap();
    let image = image::parse(&bytes).unwrap();
    let text = dump_to_string(|w| dump_image(&image, w));
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[2], "RESET     20050601 -      0 -");
    assert!(lines[3].starts_with("ROMDIR    -        -     64 20050601-090503"));

    let listing = Listing::of_image(&image);
    assert_eq!(listing.entries.len(), 3);
    assert_eq!(listing.entries[0].date.as_deref(), Some("20050601"));
    assert_eq!(listing.entries[1].size, 64);

    let mut out = Vec::new();
    listing.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with('{'));
    assert!(text.contains("RESET"));
    assert!(text.contains("20050601"));
  }
}
