//! IRX module inspection.
//!
//! An IRX is a 32-bit little-endian ELF object. Alongside its code, it
//! carries a `.iopmod` section describing the module:
//! ```text
//! offset  size  field
//!      0     4  magic word
//!      4     4  start address
//!      8     4  value of the GP register
//!     12     4  size of .text
//!     16     4  size of .data
//!     20     4  size of .bss
//!     24     2  version, big-endian
//!     26     -  NUL-terminated description
//! ```
//! Only the version and description are of interest when building an image.

use log::debug;
use object::read::elf::ElfFile32;
use object::Endianness;
use object::Object;
use object::ObjectSection;
use thiserror::Error;

use crate::int::Reader;

/// The ELF identification magic.
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// The name of the section holding a module's version and description.
pub const IOPMOD_SECTION: &str = ".iopmod";

const EHDR_LEN: usize = 0x34;

const IOPMOD_VERSION: usize = 24;
const IOPMOD_DESCRIPTION: usize = 26;
const DESCRIPTION_MAX: usize = 255;

/// Errors produced while inspecting a module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  /// The file does not start with the ELF magic.
  #[error("not an ELF module")]
  NotElf,
  /// A header or section table points past the end of the file.
  #[error("module is truncated")]
  TruncatedModule,
  /// No section is named `.iopmod`.
  #[error(".iopmod section not found")]
  MissingIntrospectionSection,
  /// The description in `.iopmod` is not NUL-terminated within 255 bytes.
  #[error(".iopmod description is malformed")]
  MalformedDescription,
}

/// What a module says about itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
  /// The module's version, as stored in `.iopmod`.
  pub version: u16,
  /// The module's description, exactly as stored in `.iopmod`.
  ///
  /// Descriptions are not necessarily UTF-8; Japanese modules often carry
  /// Shift-JIS text.
  pub description: Vec<u8>,
}

/// Reads the version and description out of a module's `.iopmod` section.
pub fn inspect(module: &[u8]) -> Result<ModuleInfo, Error> {
  if module.len() < EHDR_LEN {
    return Err(Error::TruncatedModule);
  }
  if &module[..4] != ELF_MAGIC {
    return Err(Error::NotElf);
  }

  let elf = ElfFile32::<Endianness>::parse(module).map_err(|e| {
    debug!("module: {}", e);
    Error::TruncatedModule
  })?;
  let section = elf
    .section_by_name(IOPMOD_SECTION)
    .ok_or(Error::MissingIntrospectionSection)?;
  debug!(
    "module: .iopmod is section {} at {:#x}",
    section.index().0,
    section.file_range().map_or(0, |(offset, _)| offset)
  );

  let data = section.data().map_err(|e| {
    debug!("module: {}", e);
    Error::TruncatedModule
  })?;
  read_iopmod(data)
}

fn read_iopmod(iopmod: &[u8]) -> Result<ModuleInfo, Error> {
  let mut r = Reader::new(iopmod);
  r.skip(IOPMOD_VERSION).ok_or(Error::TruncatedModule)?;
  let version = r.u16_be().ok_or(Error::TruncatedModule)?;
  debug_assert_eq!(r.pos(), IOPMOD_DESCRIPTION);

  let description = r
    .c_str(DESCRIPTION_MAX)
    .ok_or(Error::MalformedDescription)?;
  Ok(ModuleInfo {
    version,
    description: description.to_vec(),
  })
}

/// Builds a minimal IRX-shaped ELF for tests.
#[cfg(test)]
pub(crate) fn test_module(
  version: u16,
  description: impl AsRef<[u8]>,
  code_len: usize,
) -> Vec<u8> {
  const SHDR_LEN: usize = 0x28;
  const SHT_PROGBITS: u32 = 1;
  const SHT_STRTAB: u32 = 3;

  let mut module = vec![0u8; EHDR_LEN];
  module[..4].copy_from_slice(ELF_MAGIC);
  module[4] = 1; // ELFCLASS32
  module[5] = 1; // ELFDATA2LSB
  module[6] = 1; // EV_CURRENT

  module.extend((0..code_len).map(|i| i as u8));

  let iopmod = module.len();
  module.extend_from_slice(&[0x41; IOPMOD_VERSION]);
  module.extend_from_slice(&version.to_be_bytes());
  module.extend_from_slice(description.as_ref());
  module.push(0);
  let iopmod_len = module.len() - iopmod;

  let strtab = module.len();
  module.extend_from_slice(b"\0.text\0.iopmod\0.shstrtab\0");
  let strtab_len = module.len() - strtab;
  while module.len() % 4 != 0 {
    module.push(0);
  }

  let shoff = module.len();
  let mut section = |name: u32, kind: u32, offset: usize, len: usize| {
    let mut shdr = [0u8; SHDR_LEN];
    shdr[0..4].copy_from_slice(&name.to_le_bytes());
    shdr[4..8].copy_from_slice(&kind.to_le_bytes());
    shdr[16..20].copy_from_slice(&(offset as u32).to_le_bytes());
    shdr[20..24].copy_from_slice(&(len as u32).to_le_bytes());
    module.extend_from_slice(&shdr);
  };
  section(0, 0, 0, 0);
  section(1, SHT_PROGBITS, EHDR_LEN, code_len);
  section(7, SHT_PROGBITS, iopmod, iopmod_len);
  section(15, SHT_STRTAB, strtab, strtab_len);

  let mut field = |offset: usize, bytes: &[u8]| {
    module[offset..offset + bytes.len()].copy_from_slice(bytes);
  };
  field(0x20, &(shoff as u32).to_le_bytes());
  field(0x28, &(EHDR_LEN as u16).to_le_bytes());
  field(0x2e, &(SHDR_LEN as u16).to_le_bytes());
  field(0x30, &4u16.to_le_bytes());
  field(0x32, &3u16.to_le_bytes());
  module
}

#[cfg(test)]
mod test {
  use super::*;

  /// Offset of the `.iopmod` section header's `sh_size` field.
  fn iopmod_size_field(module: &[u8]) -> usize {
    let mut shoff = [0u8; 4];
    shoff.copy_from_slice(&module[0x20..0x24]);
    u32::from_le_bytes(shoff) as usize + 2 * 0x28 + 20
  }

  #[test]
  fn reads_iopmod() {
    let module = test_module(0x0102, "net driver", 300);
    assert_eq!(
      inspect(&module),
      Ok(ModuleInfo {
        version: 0x0102,
        description: b"net driver".to_vec(),
      })
    );
  }

  #[test]
  fn descriptions_are_bytes() {
    // "ア" in Shift-JIS, which is not valid UTF-8.
    let module = test_module(0x0101, [0x83u8, 0x41], 16);
    assert_eq!(inspect(&module).unwrap().description, vec![0x83, 0x41]);
  }

  #[test]
  fn missing_iopmod() {
    let mut module = test_module(0x0101, "x", 16);
    // Rename `.iopmod` to `.iopmoe`.
    let name = IOPMOD_SECTION.as_bytes();
    let at = module
      .windows(name.len())
      .rposition(|w| w == name)
      .unwrap();
    module[at + 6] = b'e';
    assert_eq!(inspect(&module), Err(Error::MissingIntrospectionSection));
  }

  #[test]
  fn truncated_tables() {
    let module = test_module(0x0101, "x", 16);
    assert_eq!(
      inspect(&module[..module.len() - 1]),
      Err(Error::TruncatedModule)
    );
    assert_eq!(inspect(&module[..20]), Err(Error::TruncatedModule));

    let mut bad = module.clone();
    bad[0x30..0x32].copy_from_slice(&0x100u16.to_le_bytes());
    assert_eq!(inspect(&bad), Err(Error::TruncatedModule));
  }

  #[test]
  fn truncated_iopmod() {
    let module = test_module(0x0101, "x", 16);

    // The section claims to run past the end of the file.
    let mut bad = module.clone();
    let at = iopmod_size_field(&bad);
    bad[at..at + 4].copy_from_slice(&0x10000u32.to_le_bytes());
    assert_eq!(inspect(&bad), Err(Error::TruncatedModule));

    // The section is too short to hold a version.
    let mut bad = module;
    let at = iopmod_size_field(&bad);
    bad[at..at + 4].copy_from_slice(&25u32.to_le_bytes());
    assert_eq!(inspect(&bad), Err(Error::TruncatedModule));
  }

  #[test]
  fn not_elf() {
    let mut module = test_module(0x0101, "x", 16);
    module[0] = 0;
    assert_eq!(inspect(&module), Err(Error::NotElf));
  }

  #[test]
  fn unterminated_description() {
    let long = "d".repeat(300);
    let module = test_module(0x0101, &long, 16);
    assert_eq!(inspect(&module), Err(Error::MalformedDescription));

    let longest = "d".repeat(255);
    let module = test_module(0x0101, &longest, 16);
    assert_eq!(inspect(&module).unwrap().description, longest.as_bytes());

    // The terminator must fall inside the section.
    let mut module = test_module(0x0101, "abc", 16);
    let at = iopmod_size_field(&module);
    module[at..at + 4].copy_from_slice(&29u32.to_le_bytes());
    assert_eq!(inspect(&module), Err(Error::MalformedDescription));
  }
}
