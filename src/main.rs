//! ps2romimg, a tool for building and editing PlayStation 2 IOP ROM images.

#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::io;
use std::path::PathBuf;

use structopt::clap::ArgGroup;
use structopt::StructOpt;

use ps2romimg::error::Action;
use ps2romimg::error::Error;
use ps2romimg::error::ResultExt;
use ps2romimg::mkimg::BuildInfo;
use ps2romimg::ops::Session;

/// Build, list and edit PlayStation 2 ROM images.
#[derive(Debug, StructOpt)]
#[structopt(
  name = "ps2romimg",
  group = ArgGroup::with_name("mode").required(true)
)]
struct Opts {
  /// List the contents of the image.
  #[structopt(short = "t", long, group = "mode")]
  list: bool,
  /// Extract the named entries, or every entry if none are named.
  #[structopt(short = "x", long, group = "mode")]
  extract: bool,
  /// Create a new image out of the given modules.
  #[structopt(short = "c", long, group = "mode")]
  create: bool,
  /// Append the given modules to the image.
  #[structopt(short = "a", long, group = "mode")]
  append: bool,
  /// Delete the named entries from the image.
  #[structopt(short = "d", long, group = "mode")]
  delete: bool,

  /// The ROM image to operate on.
  #[structopt(short = "f", long, parse(from_os_str))]
  file: PathBuf,
  /// Print what is being done.
  #[structopt(short = "v", long)]
  verbose: bool,
  /// List as JSON5 rather than as a table.
  #[structopt(long, requires = "list")]
  json: bool,
  /// Directory to extract entries into.
  #[structopt(
    short = "C",
    long,
    parse(from_os_str),
    default_value = "."
  )]
  directory: PathBuf,

  /// Modules to add, or entry names to extract or delete.
  #[structopt(name = "ENTRY", parse(from_os_str))]
  entries: Vec<PathBuf>,
}

impl Opts {
  fn entry_names(&self) -> Vec<String> {
    self
      .entries
      .iter()
      .map(|e| e.to_string_lossy().into_owned())
      .collect()
  }
}

fn run(opts: &Opts) -> Result<(), Error> {
  let stdout = io::stdout();
  let mut session = Session::new(stdout.lock(), opts.verbose);

  if opts.list {
    if !opts.entries.is_empty() {
      return Err(Error::usage("--list does not take any entries"));
    }
    session.list(&opts.file, opts.json)
  } else if opts.extract {
    session.extract(&opts.file, &opts.entry_names(), &opts.directory)
  } else if opts.create {
    if opts.entries.is_empty() {
      return Err(Error::usage("--create needs at least one module"));
    }
    let info =
      BuildInfo::from_env(&opts.file).during(Action::Creating, &opts.file)?;
    session.create(&opts.file, &opts.entries, &info)
  } else if opts.append {
    session.append(&opts.file, &opts.entries)
  } else {
    session.delete(&opts.file, &opts.entry_names())
  }
}

fn main() {
  env_logger::init();
  let opts = Opts::from_args();
  log::debug!("{:?}", opts);

  if let Err(e) = run(&opts) {
    e.dump_and_die(1)
  }
}
