use std::{fs, io, path};
use crate::prelude::*;
use crate::alloc::alloc_inode;
use crate::fs::{MountOptions, open_fs, sync_fs};
use crate::superblock::write_superblock;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MkfsOptions {
  /// Payload bytes of every inode group.
  pub inode_group_size: u32,
  /// Payload bytes of every data group.
  pub data_group_size: u32,
}

impl Default for MkfsOptions {
  fn default() -> MkfsOptions {
    MkfsOptions {
      inode_group_size: DEFAULT_INODE_GROUP_SIZE,
      data_group_size: DEFAULT_DATA_GROUP_SIZE,
    }
  }
}

impl MkfsOptions {
  pub fn validate(&self) -> Result<()> {
    check_group_size(GroupKind::Inode, self.inode_group_size,
      MIN_INODE_GROUP_SIZE, MAX_INODE_GROUP_SIZE)?;
    check_group_size(GroupKind::Data, self.data_group_size,
      MIN_DATA_GROUP_SIZE, MAX_DATA_GROUP_SIZE)
  }
}

fn check_group_size(kind: GroupKind, size: u32, min: u32, max: u32) -> Result<()> {
  if size < min || size > max {
    return Err(Error::InvalidGeometry(format!(
      "{} group size {} is outside [{}, {}]", kind, size, min, max)));
  }
  if size as u64 % kind.unit_size() != 0 {
    return Err(Error::InvalidGeometry(format!(
      "{} group size {} is not a multiple of {}", kind, size, kind.unit_size())));
  }
  Ok(())
}

/// Creates a new store at `path`. The path must not exist; on failure the
/// partially written file is removed.
pub fn make_fs<P: AsRef<path::Path>>(path: P, options: &MkfsOptions) -> Result<()> {
  options.validate()?;
  let path = path.as_ref();
  let volume = match FileVolume::create(path) {
    Ok(volume) => volume,
    Err(ref err) if err.kind() == io::ErrorKind::AlreadyExists =>
      return Err(Error::Exists(path.to_path_buf())),
    Err(err) => return Err(err.into()),
  };

  let label = path.display().to_string();
  if let Err(err) = format_volume(Box::new(volume), options, &label) {
    tracing::error!(store = %label, "cannot create store: {}", err);
    if let Err(rm_err) = fs::remove_file(path) {
      tracing::warn!(store = %label, "cannot remove partial store: {}", rm_err);
    }
    return Err(err);
  }
  Ok(())
}

/// Writes an empty filesystem to `volume`: the superblock and a first inode
/// group holding the root directory inode.
pub fn format_volume(volume: Box<dyn Volume>, options: &MkfsOptions, label: &str) -> Result<()> {
  options.validate()?;
  volume.set_size(SUPERBLOCK_SIZE)?;
  let superblock = Superblock::new(options.inode_group_size, options.data_group_size);
  write_superblock(&*volume, &superblock)?;

  let fs = open_fs(volume, MountOptions::default(),
    tracing::info_span!("mkfs", store = label))?;
  {
    let mut root = alloc_inode(&fs)?;
    if root.ino != ROOT_INO {
      return Err(Error::Corrupt(format!("root inode allocated as {}", root.ino)));
    }
    let now = now_secs();
    root.node.uid = ROOT_UID;
    root.node.gid = ROOT_GID;
    root.node.mode = ROOT_MODE;
    root.node.nlink = 1;
    root.node.btime = now;
    root.node.atime = now;
    root.node.ctime = now;
    root.node.mtime = now;
  }
  sync_fs(&fs)?;

  tracing::info!(store = label, inode_group_size = options.inode_group_size,
    data_group_size = options.data_group_size, "store created");
  Ok(())
}
