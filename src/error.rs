//! Error printing facilities.
//!
//! The core modules each fail with their own small error enum. The file-level
//! operations gather those into a [`Kind`] and attach the [`Action`] that was
//! being performed and the [`Cause`] it was performed on, so that `main` can
//! print a single, specific diagnostic.
//!
//! [`Kind`]: enum.Kind.html
//! [`Action`]: enum.Action.html
//! [`Cause`]: enum.Cause.html

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::image;
use crate::irx;

/// What went wrong.
#[derive(Debug, Error)]
pub enum Kind {
  /// Reading or writing a file failed.
  #[error("{0}")]
  Io(#[from] io::Error),
  /// An image was malformed, or an edit to it was impossible.
  #[error("{0}")]
  Image(#[from] image::Error),
  /// A module could not be inspected.
  #[error("{0}")]
  Module(#[from] irx::Error),
  /// A listing could not be serialized.
  #[error("{0}")]
  Json(#[from] json5::Error),
  /// The command line asked for something that makes no sense.
  #[error("{0}")]
  Usage(String),
}

/// The input an error is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cause {
  /// A file on disk.
  File(PathBuf),
}

impl From<&Path> for Cause {
  fn from(path: &Path) -> Self {
    Cause::File(path.to_path_buf())
  }
}

impl From<&PathBuf> for Cause {
  fn from(path: &PathBuf) -> Self {
    Cause::File(path.clone())
  }
}

impl fmt::Display for Cause {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::File(path) => write!(f, "{}", path.display()),
    }
  }
}

/// An action that ps2romimg performs, which an error may be associated with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
  /// Reading a module to learn its version and description.
  Inspecting,
  /// Printing an image's contents.
  Listing,
  /// Copying entries out of an image.
  Extracting,
  /// Building a new image.
  Creating,
  /// Adding entries to an image.
  Appending,
  /// Removing entries from an image.
  Deleting,
}

impl Action {
  fn describe(self) -> &'static str {
    match self {
      Self::Inspecting => "inspecting",
      Self::Listing => "listing",
      Self::Extracting => "extracting",
      Self::Creating => "creating",
      Self::Appending => "appending to",
      Self::Deleting => "deleting from",
    }
  }
}

/// An error, along with where it happened.
///
/// The `Display` implementation is always a single line.
#[derive(Debug)]
pub struct Error {
  kind: Kind,
  context: Option<(Action, Cause)>,
}

impl Error {
  /// Creates an error with no context attached.
  pub fn new(kind: impl Into<Kind>) -> Self {
    Error {
      kind: kind.into(),
      context: None,
    }
  }

  /// Creates a usage error.
  pub fn usage(message: impl Into<String>) -> Self {
    Self::new(Kind::Usage(message.into()))
  }

  /// Returns what went wrong.
  pub fn kind(&self) -> &Kind {
    &self.kind
  }

  /// Returns the action and input this error is associated with, if any.
  pub fn context(&self) -> Option<&(Action, Cause)> {
    self.context.as_ref()
  }

  /// Dumps this error as user-displayable text into `sink`.
  pub fn dump_to(&self, mut sink: impl io::Write) -> io::Result<()> {
    writeln!(sink, "ps2romimg: error: {}", self)
  }

  /// Calls `dump_to()` on `stderr`, then exits the process with `code`.
  pub fn dump_and_die(self, code: i32) -> ! {
    // If stderr is gone there is nobody left to tell.
    let _ = self.dump_to(io::stderr());
    std::process::exit(code)
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.kind)?;
    if let Some((action, cause)) = &self.context {
      write!(f, " (while {} {})", action.describe(), cause)?;
    }
    Ok(())
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&self.kind)
  }
}

macro_rules! impl_from_kind {
  ($($ty:ty),*) => {
    $(impl From<$ty> for Error {
      fn from(e: $ty) -> Self {
        Self::new(e)
      }
    })*
  }
}
impl_from_kind!(Kind, io::Error, image::Error, irx::Error, json5::Error);

/// Extension methods for attaching context to a `Result`.
pub trait ResultExt<T> {
  /// Attaches `action` and `cause` to the error, if there is one.
  ///
  /// Context that is already present is kept, since it is more specific.
  fn during(self, action: Action, cause: impl Into<Cause>) -> Result<T, Error>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
  fn during(self, action: Action, cause: impl Into<Cause>) -> Result<T, Error> {
    self.map_err(|e| {
      let mut e = e.into();
      if e.context.is_none() {
        e.context = Some((action, cause.into()));
      }
      e
    })
  }
}
