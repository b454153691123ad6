use std::{io, path, result};
use thiserror::Error;
use crate::defs::GroupKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("short read of {what} at offset {offset}: got {actual} of {expected} bytes")]
  ShortRead { what: &'static str, offset: u64, expected: usize, actual: usize },

  #[error("short write of {what} at offset {offset}: wrote {actual} of {expected} bytes")]
  ShortWrite { what: &'static str, offset: u64, expected: usize, actual: usize },

  #[error("bad superblock magic 0x{found:x}, expected 0x{expected:x}")]
  BadMagic { found: u32, expected: u32 },

  #[error("unsupported format version {found}, expected {expected}")]
  BadVersion { found: u32, expected: u32 },

  /// The backing store's length disagrees with the geometry recorded in the
  /// superblock.
  #[error("store is {actual} bytes but the superblock describes {expected} bytes")]
  SizeMismatch { expected: u64, actual: u64 },

  #[error("corrupt store: {0}")]
  Corrupt(String),

  #[error("invalid geometry: {0}")]
  InvalidGeometry(String),

  #[error("no space left for a new {0} group")]
  NoSpace(GroupKind),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("{} already exists", .0.display())]
  Exists(path::PathBuf),

  #[error("inode {0} is reserved")]
  Reserved(u64),

  /// The handle has been unmounted and no longer accepts changes.
  #[error("filesystem is not mounted")]
  NotMounted,
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
  /// POSIX error number reported to the request adapter.
  pub fn errno(&self) -> i32 {
    match *self {
      Error::Io(_) => libc::EIO,
      Error::ShortRead { .. } => libc::EIO,
      Error::ShortWrite { .. } => libc::EIO,
      Error::BadMagic { .. } => libc::EINVAL,
      Error::BadVersion { .. } => libc::EINVAL,
      Error::SizeMismatch { .. } => libc::EINVAL,
      Error::Corrupt(_) => libc::EINVAL,
      Error::InvalidGeometry(_) => libc::EINVAL,
      Error::NoSpace(_) => libc::ENOSPC,
      Error::NotFound(_) => libc::ENOENT,
      Error::Exists(_) => libc::EEXIST,
      Error::Reserved(_) => libc::EPERM,
      Error::NotMounted => libc::EIO,
    }
  }

  /// Validation failures reject a store at mount time.
  pub fn is_validation(&self) -> bool {
    match *self {
      Error::BadMagic { .. } | Error::BadVersion { .. } |
        Error::SizeMismatch { .. } | Error::Corrupt(_) => true,
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn io_failures_map_to_eio() {
    let err = Error::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
    assert_eq!(err.errno(), libc::EIO);
    let short = Error::ShortWrite { what: "inode", offset: 0, expected: 256, actual: 3 };
    assert_eq!(short.errno(), libc::EIO);
    assert!(!short.is_validation());
  }

  #[test]
  fn validation_failures_map_to_einval() {
    let err = Error::SizeMismatch { expected: 10, actual: 9 };
    assert_eq!(err.errno(), libc::EINVAL);
    assert!(err.is_validation());
    assert!(Error::BadMagic { found: 1, expected: 2 }.is_validation());
  }

  #[test]
  fn refused_changes_are_not_validation_failures() {
    assert_eq!(Error::Reserved(0).errno(), libc::EPERM);
    assert_eq!(Error::NotMounted.errno(), libc::EIO);
    assert!(!Error::NotMounted.is_validation());
    assert_eq!(format!("{}", Error::Reserved(0)), "inode 0 is reserved");
  }

  #[test]
  fn exhaustion_maps_to_enospc() {
    assert_eq!(Error::NoSpace(GroupKind::Inode).errno(), libc::ENOSPC);
    assert_eq!(format!("{}", Error::NoSpace(GroupKind::Data)),
      "no space left for a new data group");
  }
}
