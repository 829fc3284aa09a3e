//! ps2romimg, a tool for building and editing PlayStation 2 IOP ROM images.
//!
//! An image is a directory of named entries (`romdir`), a table of metadata
//! records describing them (`extinfo`), and the entries' payloads, which are
//! usually IRX modules (`irx`). Images can be parsed (`image`), built from
//! scratch (`mkimg`) and edited in place (`edit`); `ops` ties those together
//! with the filesystem.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod edit;
pub mod entry;
pub mod error;
pub mod extinfo;
pub mod image;
pub mod int;
pub mod irx;
pub mod mkimg;
pub mod ops;
pub mod report;
pub mod romdir;
