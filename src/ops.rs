//! File-level operations, as exposed on the command line.
//!
//! Every operation reads the whole image into memory, works on it there, and
//! (for the editing operations) writes the whole result back over the
//! original file. Nothing is written unless the edit succeeded.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use log::warn;

use crate::edit;
use crate::entry::Entry;
use crate::error::Action;
use crate::error::Error;
use crate::error::ResultExt;
use crate::image;
use crate::mkimg;
use crate::mkimg::BuildInfo;
use crate::report;
use crate::report::Columns;
use crate::report::Listing;
use crate::romdir;

/// Reads the module at `path` and turns it into an entry.
pub fn load_module(path: &Path) -> Result<Entry<'static>, Error> {
  let bytes = fs::read(path).during(Action::Inspecting, path)?;
  let modified = fs::metadata(path)
    .and_then(|meta| meta.modified())
    .during(Action::Inspecting, path)?;
  mkimg::module_entry(path, bytes, modified).during(Action::Inspecting, path)
}

/// Where the operations send their output, and how much of it.
pub struct Session<W> {
  out: W,
  verbose: bool,
}

impl<W: io::Write> Session<W> {
  /// Creates a new `Session` writing to `out`.
  ///
  /// Listings are always written; progress messages only if `verbose` is set.
  pub fn new(out: W, verbose: bool) -> Self {
    Session { out, verbose }
  }

  /// Consumes this `Session`, returning its output sink.
  pub fn into_inner(self) -> W {
    self.out
  }

  fn action(
    &mut self,
    cols: Columns,
    verb: &str,
    name: &str,
    size: usize,
  ) -> io::Result<()> {
    if self.verbose {
      report::dump_action(cols, verb, name, size, &mut self.out)?;
    }
    Ok(())
  }

  /// Lists the contents of the image at `path`, as a table or as JSON5.
  pub fn list(&mut self, path: &Path, json: bool) -> Result<(), Error> {
    let bytes = fs::read(path).during(Action::Listing, path)?;
    let image = image::parse(&bytes).during(Action::Listing, path)?;
    if json {
      Listing::of_image(&image)
        .dump(&mut self.out)
        .during(Action::Listing, path)
    } else {
      report::dump_image(&image, &mut self.out).during(Action::Listing, path)
    }
  }

  /// Copies the payloads of the entries called `names` out of the image at
  /// `path`, into files of the same name under `dest`.
  ///
  /// With no names, every user entry is extracted.
  pub fn extract(
    &mut self,
    path: &Path,
    names: &[String],
    dest: &Path,
  ) -> Result<(), Error> {
    let bytes = fs::read(path).during(Action::Extracting, path)?;
    let image = image::parse(&bytes).during(Action::Extracting, path)?;

    let entries = if names.is_empty() {
      image.user_entries().iter().collect::<Vec<_>>()
    } else {
      names
        .iter()
        .map(|name| {
          image
            .user_entries()
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| image::Error::EntryNotFound { name: name.clone() })
            .during(Action::Extracting, path)
        })
        .collect::<Result<Vec<_>, _>>()?
    };

    let cols = Columns::fit(entries.iter().map(|e| (e.name(), e.len())));
    for entry in entries {
      let file_name = Path::new(entry.name()).file_name();
      if file_name.map_or(true, |f| f != entry.name()) {
        warn!("not extracting {:?}: not a plain file name", entry.name());
        continue;
      }

      self.action(cols, "Extracting", entry.name(), entry.len())?;
      let target = dest.join(entry.name());
      fs::write(&target, entry.payload()).during(Action::Extracting, &target)?;
    }
    Ok(())
  }

  /// Builds a new image at `path` out of the modules at `modules`.
  pub fn create(
    &mut self,
    path: &Path,
    modules: &[PathBuf],
    info: &BuildInfo,
  ) -> Result<(), Error> {
    if modules.is_empty() {
      return Err(Error::usage("no modules to put in the image"));
    }

    let names = modules
      .iter()
      .map(|m| mkimg::base_name(m))
      .collect::<Vec<_>>();
    mkimg::check_names(
      romdir::RESERVED_NAMES
        .iter()
        .copied()
        .chain(names.iter().map(String::as_str)),
    )
    .during(Action::Creating, path)?;

    let entries = modules
      .iter()
      .map(|m| load_module(m))
      .collect::<Result<Vec<_>, _>>()?;
    let bytes =
      mkimg::assemble(&entries, info).during(Action::Creating, path)?;

    if self.verbose {
      writeln!(
        self.out,
        "Creating ROM image {} with the following entries:",
        path.display()
      )?;
      let image = image::parse(&bytes).during(Action::Creating, path)?;
      report::dump_image(&image, &mut self.out)?;
    }

    info!("writing {} bytes to {}", bytes.len(), path.display());
    fs::write(path, &bytes).during(Action::Creating, path)
  }

  /// Adds the modules at `modules` to the end of the image at `path`.
  pub fn append(
    &mut self,
    path: &Path,
    modules: &[PathBuf],
  ) -> Result<(), Error> {
    if modules.is_empty() {
      return Ok(());
    }

    let names = modules
      .iter()
      .map(|m| mkimg::base_name(m))
      .collect::<Vec<_>>();
    mkimg::check_names(names.iter().map(String::as_str))
      .during(Action::Appending, path)?;

    let entries = modules
      .iter()
      .map(|m| load_module(m))
      .collect::<Result<Vec<_>, _>>()?;
    let bytes = fs::read(path).during(Action::Appending, path)?;
    let bytes = edit::append(bytes, &entries).during(Action::Appending, path)?;

    let cols = Columns::of_entries(&entries);
    for entry in &entries {
      self.action(cols, "Adding", entry.name(), entry.len())?;
    }

    info!("writing {} bytes to {}", bytes.len(), path.display());
    fs::write(path, &bytes).during(Action::Appending, path)
  }

  /// Removes the entries called `names` from the image at `path`.
  pub fn delete(&mut self, path: &Path, names: &[String]) -> Result<(), Error> {
    if names.is_empty() {
      return Ok(());
    }

    let bytes = fs::read(path).during(Action::Deleting, path)?;
    let doomed = {
      let image = image::parse(&bytes).during(Action::Deleting, path)?;
      names
        .iter()
        .filter_map(|name| {
          image
            .find(name)
            .map(|i| (name.as_str(), image.size_of(i)))
        })
        .collect::<Vec<_>>()
    };
    let bytes = edit::delete(bytes, names).during(Action::Deleting, path)?;

    let cols = Columns::fit(doomed.iter().copied());
    for (name, size) in doomed {
      self.action(cols, "Deleting", name, size)?;
    }

    info!("writing {} bytes to {}", bytes.len(), path.display());
    fs::write(path, &bytes).during(Action::Deleting, path)
  }
}
