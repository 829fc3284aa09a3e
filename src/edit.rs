//! In-place edits to existing ROM images.
//!
//! Both edits work on the whole image buffer and shuffle its three sections
//! around without re-encoding what is already there. Appending grows every
//! section, so data is moved right starting from the payload section, which
//! is furthest from the start. Deleting compacts each section in a single
//! pass over the directory, then slides the metadata and payload sections
//! left to close the gaps.

use log::debug;
use log::trace;

use crate::entry::Entry;
use crate::extinfo;
use crate::image;
use crate::image::Error;
use crate::image::Layout;
use crate::int::align16;
use crate::int::align4;
use crate::mkimg::check_names;
use crate::romdir;
use crate::romdir::Record;

/// Rewrites the size of reserved record `index`.
fn set_reserved_size(
  bytes: &mut [u8],
  records: &[Record],
  index: usize,
  size: usize,
) {
  let mut record = records[index];
  record.size = size as i32;
  record.store(bytes, index);
}

/// Appends `modules` to the image in `bytes`, after its last entry.
///
/// Nothing is changed if any module's name is invalid or already present in
/// the image.
pub fn append(mut bytes: Vec<u8>, modules: &[Entry]) -> Result<Vec<u8>, Error> {
  if modules.is_empty() {
    return Ok(bytes);
  }

  let (old, records) = {
    let image = image::parse(&bytes)?;
    check_names(modules.iter().map(Entry::name))?;
    if let Some(dup) = modules.iter().find(|m| image.find(m.name()).is_some())
    {
      return Err(Error::DuplicateEntry {
        name: dup.name().to_string(),
      });
    }
    (image.layout(), image.records().to_vec())
  };

  let mut new = old;
  for module in modules {
    new.romdir_size += romdir::RECORD_LEN;
    new.extinfo_size =
      align4(new.extinfo_size) + extinfo::encoded_size(module);
    new.irx_size = align16(new.irx_size) + module.len();
  }
  debug!("append: {:?} -> {:?}", old, new);
  bytes.resize(new.total(), 0);

  // Payloads first, since they move the furthest.
  let (from, to) = (old.irx_offset(), new.irx_offset());
  bytes.copy_within(from..from + old.irx_size, to);
  let mut irx = old.irx_size;
  for module in modules {
    let start = align16(irx);
    bytes[to + irx..to + start].fill(0);
    bytes[to + start..to + start + module.len()]
      .copy_from_slice(module.payload());
    trace!("append: {} payload at {:#x}", module.name(), to + start);
    irx = start + module.len();
  }

  let (from, to) = (old.extinfo_offset(), new.extinfo_offset());
  bytes.copy_within(from..from + old.extinfo_size, to);
  let mut ext = old.extinfo_size;
  let mut encoded = Vec::new();
  for module in modules {
    let start = align4(ext);
    encoded.clear();
    let len = extinfo::encode(module, &mut encoded);
    bytes[to + ext..to + start].fill(0);
    bytes[to + start..to + start + len].copy_from_slice(&encoded);
    ext = start + len;
  }
  bytes[to + ext..new.irx_offset()].fill(0);

  // The first new record lands on top of the old sentinel.
  let mut index = records.len();
  for module in modules {
    let size = extinfo::encoded_size(module) as u16;
    Record::new(module.name(), size, module.len() as i32)
      .store(&mut bytes, index);
    index += 1;
  }
  Record::sentinel().store(&mut bytes, index);
  set_reserved_size(&mut bytes, &records, romdir::ROMDIR, new.romdir_size);
  set_reserved_size(&mut bytes, &records, romdir::EXTINFO, new.extinfo_size);

  Ok(bytes)
}

/// Removes the entries called `names` from the image in `bytes`.
///
/// Every name must refer to a distinct user entry; nothing is changed
/// otherwise.
pub fn delete<S: AsRef<str>>(
  mut bytes: Vec<u8>,
  names: &[S],
) -> Result<Vec<u8>, Error> {
  if names.is_empty() {
    return Ok(bytes);
  }

  let (old, records, doomed) = {
    let image = image::parse(&bytes)?;
    let mut doomed = vec![false; image.records().len()];
    for name in names {
      let name = name.as_ref();
      match image.find(name) {
        Some(i) if i < romdir::RESERVED => {
          return Err(Error::ReservedEntry {
            name: name.to_string(),
          })
        }
        Some(i) if !doomed[i] => doomed[i] = true,
        _ => {
          return Err(Error::EntryNotFound {
            name: name.to_string(),
          })
        }
      }
    }
    (image.layout(), image.records().to_vec(), doomed)
  };

  // Compact each section in place, keeping its current start.
  let ext_base = old.extinfo_offset();
  let irx_base = old.irx_offset();
  let mut new = Layout::default();
  let (mut ext_src, mut irx_src) = (0, 0);
  for (i, (record, &doomed)) in records.iter().zip(&doomed).enumerate() {
    let ext_len = record.extinfo_size as usize;
    let irx_len = if i < romdir::RESERVED {
      0
    } else {
      irx_src = align16(irx_src);
      record.size as usize
    };

    if doomed {
      trace!("delete: dropping {}", record.name());
    } else {
      record.store(&mut bytes, new.romdir_size / romdir::RECORD_LEN);
      new.romdir_size += romdir::RECORD_LEN;

      let from = ext_base + ext_src;
      bytes.copy_within(from..from + ext_len, ext_base + new.extinfo_size);
      new.extinfo_size += ext_len;

      if i >= romdir::RESERVED {
        let start = align16(new.irx_size);
        bytes[irx_base + new.irx_size..irx_base + start].fill(0);
        let from = irx_base + irx_src;
        bytes.copy_within(from..from + irx_len, irx_base + start);
        new.irx_size = start + irx_len;
      }
    }

    ext_src += ext_len;
    irx_src += irx_len;
  }

  Record::sentinel().store(&mut bytes, new.romdir_size / romdir::RECORD_LEN);
  new.romdir_size += romdir::RECORD_LEN;
  debug!("delete: {:?} -> {:?}", old, new);

  set_reserved_size(&mut bytes, &records, romdir::ROMDIR, new.romdir_size);
  set_reserved_size(&mut bytes, &records, romdir::EXTINFO, new.extinfo_size);

  // Slide the compacted sections down behind the shrunken directory.
  let to = new.extinfo_offset();
  bytes.copy_within(ext_base..ext_base + new.extinfo_size, to);
  bytes[to + new.extinfo_size..new.irx_offset()].fill(0);
  bytes.copy_within(irx_base..irx_base + new.irx_size, new.irx_offset());
  bytes.truncate(new.total());

  Ok(bytes)
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::mkimg::assemble;
  use crate::mkimg::test::build_info;
  use crate::mkimg::test::module;

  fn modules() -> Vec<Entry<'static>> {
    vec![
      module("a.irx", 0x0101, "first", 17),
      module("b.irx", 0x0203, "second module", 300),
      module("c.irx", 0x0999, "", 33),
    ]
  }

  fn names(bytes: &[u8]) -> Vec<String> {
    image::parse(bytes)
      .unwrap()
      .user_entries()
      .iter()
      .map(|e| e.name().to_string())
      .collect()
  }

  #[test]
  fn append_matches_assemble() {
    let all = modules();
    let info = build_info();
    let base = assemble(&all[..1], &info).unwrap();

    let bytes = append(base, &all[1..]).unwrap();
    assert_eq!(bytes, assemble(&all, &info).unwrap());

    let image = image::parse(&bytes).unwrap();
    assert_eq!(image.user_entries(), &all[..]);
    assert_eq!(image.layout().irx_offset() % 16, 0);
    assert_eq!(image.layout().extinfo_offset() % 16, 0);
  }

  #[test]
  fn append_to_empty_image() {
    let all = modules();
    let info = build_info();
    let empty = assemble(&[], &info).unwrap();
    assert!(image::parse(&empty).unwrap().user_entries().is_empty());

    let bytes = append(empty, &all).unwrap();
    assert_eq!(bytes, assemble(&all, &info).unwrap());
  }

  #[test]
  fn append_one_at_a_time() {
    let all = modules();
    let info = build_info();
    let mut bytes = assemble(&all[..1], &info).unwrap();
    for m in &all[1..] {
      bytes = append(bytes, std::slice::from_ref(m)).unwrap();
    }
    assert_eq!(names(&bytes), ["a.irx", "b.irx", "c.irx"]);
    assert_eq!(bytes, assemble(&all, &info).unwrap());
  }

  #[test]
  fn append_rejects_bad_names() {
    let all = modules();
    let base = assemble(&all, &build_info()).unwrap();

    assert_eq!(
      append(base.clone(), &all[1..2]),
      Err(Error::DuplicateEntry {
        name: "b.irx".to_string()
      })
    );

    let reset = Entry::new("RESET", vec![0u8; 4]);
    assert_eq!(
      append(base.clone(), &[reset]),
      Err(Error::DuplicateEntry {
        name: "RESET".to_string()
      })
    );

    let long = Entry::new("driver.irx", vec![0u8; 4]);
    assert_eq!(
      append(base.clone(), &[long]),
      Err(Error::NameTooLong {
        name: "driver.irx".to_string()
      })
    );

    assert_eq!(append(base.clone(), &[]), Ok(base));
    assert_eq!(
      append(b"not an image at all, clearly".to_vec(), &all),
      Err(Error::NotAnImage)
    );
  }

  #[test]
  fn delete_middle() {
    let all = modules();
    let info = build_info();
    let bytes = assemble(&all, &info).unwrap();
    let old = image::parse(&bytes).unwrap().layout();

    let bytes = delete(bytes, &["b.irx"]).unwrap();
    assert_eq!(names(&bytes), ["a.irx", "c.irx"]);
    let kept = [all[0].clone(), all[2].clone()];
    assert_eq!(bytes, assemble(&kept, &info).unwrap());

    let new = image::parse(&bytes).unwrap().layout();
    assert_eq!(new.romdir_size, old.romdir_size - 16);
    assert_eq!(
      new.extinfo_size,
      old.extinfo_size - extinfo::encoded_size(&all[1])
    );
    assert_eq!(new.irx_offset() % 16, 0);
  }

  #[test]
  fn delete_first_and_last() {
    let all = modules();
    let info = build_info();
    let bytes = assemble(&all, &info).unwrap();

    let bytes = delete(bytes, &["c.irx", "a.irx"]).unwrap();
    assert_eq!(bytes, assemble(&all[1..2], &info).unwrap());

    let image = image::parse(&bytes).unwrap();
    assert_eq!(image.user_entries(), &all[1..2]);
  }

  #[test]
  fn delete_everything() {
    let all = modules();
    let bytes = assemble(&all, &build_info()).unwrap();
    let bytes = delete(bytes, &["a.irx", "b.irx", "c.irx"]).unwrap();

    let image = image::parse(&bytes).unwrap();
    assert!(image.user_entries().is_empty());
    assert_eq!(image.layout().romdir_size, 4 * 16);
    assert_eq!(bytes.len(), image.layout().irx_offset());
  }

  #[test]
  fn delete_rejects_bad_names() {
    let all = modules();
    let bytes = assemble(&all, &build_info()).unwrap();

    assert_eq!(
      delete(bytes.clone(), &["zzz.irx"]),
      Err(Error::EntryNotFound {
        name: "zzz.irx".to_string()
      })
    );
    assert_eq!(
      delete(bytes.clone(), &["b.irx", "b.irx"]),
      Err(Error::EntryNotFound {
        name: "b.irx".to_string()
      })
    );
    assert_eq!(
      delete(bytes.clone(), &["ROMDIR"]),
      Err(Error::ReservedEntry {
        name: "ROMDIR".to_string()
      })
    );

    let none: &[&str] = &[];
    assert_eq!(delete(bytes.clone(), none), Ok(bytes));
  }

  #[test]
  fn delete_then_append() {
    let all = modules();
    let info = build_info();
    let bytes = assemble(&all, &info).unwrap();

    let bytes = delete(bytes, &["a.irx"]).unwrap();
    let bytes = append(bytes, &all[..1]).unwrap();
    assert_eq!(names(&bytes), ["b.irx", "c.irx", "a.irx"]);

    let reordered = [all[1].clone(), all[2].clone(), all[0].clone()];
    assert_eq!(bytes, assemble(&reordered, &info).unwrap());
  }
}
