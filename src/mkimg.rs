//! Building ROM images from scratch.
//!
//! A fresh image is made of the three reserved entries followed by one entry
//! per module:
//! - `RESET` carries the creation date.
//! - `ROMDIR` carries a description of who built the image, and where.
//! - `EXTINFO` carries a single null record.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::DateTime;
use chrono::Local;
use chrono::NaiveDateTime;
use chrono::Timelike;
use log::debug;
use log::warn;

use crate::entry;
use crate::entry::Entry;
use crate::error::Kind;
use crate::extinfo;
use crate::image::Error;
use crate::int::align16;
use crate::int::Date;
use crate::irx;
use crate::romdir;

/// Everything about the build environment that ends up in the reserved
/// entries.
#[derive(Clone, Debug)]
pub struct BuildInfo {
  /// The local time the image is being built at.
  pub time: NaiveDateTime,
  /// The file name of the image being built, without directories.
  pub image_name: String,
  /// The user building the image.
  pub user: String,
  /// The host the image is being built on.
  pub host: String,
  /// The directory the image is being built from.
  pub cwd: PathBuf,
  /// The user's home directory, stripped off the front of `cwd`.
  pub home: Option<PathBuf>,
}

impl BuildInfo {
  /// Gathers build information from the process environment.
  pub fn from_env(image: &Path) -> io::Result<Self> {
    let user = env::var("USER")
      .or_else(|_| env::var("USERNAME"))
      .unwrap_or_else(|_| {
        warn!("neither USER nor USERNAME is set");
        "unknown".to_string()
      });

    Ok(BuildInfo {
      time: Local::now().naive_local(),
      image_name: base_name(image),
      user,
      host: hostname(),
      cwd: env::current_dir()?,
      home: env::var_os("HOME").map(PathBuf::from),
    })
  }

  /// Returns the creation date.
  pub fn date(&self) -> Date {
    Date::from_datelike(&self.time)
  }

  /// Generates the description carried by the `ROMDIR` entry:
  /// `<date>-HHMMSS,dummyconf,<image>,<user>@<host><cwd>`.
  pub fn romdir_description(&self) -> String {
    let cwd = self
      .home
      .as_ref()
      .and_then(|home| self.cwd.strip_prefix(home).ok())
      .map(|rest| {
        if rest.as_os_str().is_empty() {
          String::new()
        } else {
          format!("/{}", rest.display())
        }
      })
      .unwrap_or_else(|| self.cwd.display().to_string());

    format!(
      "{:x}-{:02}{:02}{:02},dummyconf,{},{}@{}{}",
      self.date(),
      self.time.hour(),
      self.time.minute(),
      self.time.second(),
      self.image_name,
      self.user,
      self.host,
      cwd,
    )
  }

  /// Builds the three reserved entries.
  pub fn reserved_entries(&self) -> [Entry<'static>; romdir::RESERVED] {
    let [reset, dir, info] = romdir::RESERVED_NAMES;
    [
      Entry::new(reset, Vec::<u8>::new()).with_date(self.date()),
      Entry::new(dir, Vec::<u8>::new())
        .with_description(self.romdir_description()),
      Entry::new(info, Vec::<u8>::new()).with_null(),
    ]
  }
}

fn hostname() -> String {
  fs::read_to_string("/proc/sys/kernel/hostname")
    .map(|s| s.trim().to_string())
    .ok()
    .filter(|s| !s.is_empty())
    .or_else(|| env::var("HOSTNAME").ok())
    .unwrap_or_else(|| {
      warn!("could not determine host name");
      "localhost".to_string()
    })
}

/// Returns the last component of `path`, as the entry name it would become.
pub fn base_name(path: &Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Builds an entry for the module at `path`, given its contents and
/// modification time.
pub fn module_entry(
  path: &Path,
  bytes: Vec<u8>,
  modified: SystemTime,
) -> Result<Entry<'static>, Kind> {
  let name = base_name(path);
  if !entry::check_name(&name) {
    return Err(Error::NameTooLong { name }.into());
  }

  let info = irx::inspect(&bytes)?;
  let date = Date::from_datelike(&DateTime::<Local>::from(modified));
  debug!(
    "module {}: version {:#06x}, {} bytes, {:?}",
    name,
    info.version,
    bytes.len(),
    String::from_utf8_lossy(&info.description)
  );

  Ok(
    Entry::new(name, bytes)
      .with_date(date)
      .with_version(info.version)
      .with_description(info.description),
  )
}

/// Checks that every name is valid and none repeats.
pub(crate) fn check_names<'a>(
  names: impl IntoIterator<Item = &'a str>,
) -> Result<(), Error> {
  let mut seen = HashSet::new();
  for name in names {
    if !entry::check_name(name) {
      return Err(Error::NameTooLong {
        name: name.to_string(),
      });
    }
    if !seen.insert(name) {
      return Err(Error::DuplicateEntry {
        name: name.to_string(),
      });
    }
  }
  Ok(())
}

/// Assembles a new image out of `modules`.
///
/// The reserved entries are synthesized from `info`.
pub fn assemble(modules: &[Entry], info: &BuildInfo) -> Result<Vec<u8>, Error> {
  check_names(
    romdir::RESERVED_NAMES
      .iter()
      .copied()
      .chain(modules.iter().map(Entry::name)),
  )?;

  let mut entries: Vec<Entry> = info.reserved_entries().to_vec();
  entries.extend(modules.iter().cloned());

  let records = romdir::build(&entries);
  let mut image = Vec::new();
  romdir::encode(&records, &mut image);
  for entry in &entries {
    extinfo::encode(entry, &mut image);
  }
  debug!(
    "assemble: romdir={} extinfo={}",
    records.len() * romdir::RECORD_LEN,
    image.len() - records.len() * romdir::RECORD_LEN
  );

  for module in modules {
    image.resize(align16(image.len()), 0);
    image.extend_from_slice(module.payload());
  }
  Ok(image)
}
