#![allow(dead_code)]
use std::io;
use std::sync::Arc;
use parking_lot::Mutex;
use kfs::{Filesystem, MkfsOptions, MountOptions, Volume};

/// Smallest geometry: 4096 inodes per inode group, 256 blocks per data group.
pub const SMALL: MkfsOptions = MkfsOptions {
  inode_group_size: 1 << 20,
  data_group_size: 1 << 20,
};

#[derive(Debug, Default)]
pub struct Faults {
  /// Writes at or past this offset fail.
  pub fail_writes_from: Option<u64>,
  /// Writes store only half of the buffer.
  pub short_writes: bool,
  pub fail_grow: bool,
  pub fail_shrink: bool,
}

/// In-memory store whose clones share the same bytes, so a test can keep a
/// handle after giving one to a filesystem.
#[derive(Clone, Default)]
pub struct MemVolume {
  data: Arc<Mutex<Vec<u8>>>,
  pub faults: Arc<Mutex<Faults>>,
  pub writes: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl MemVolume {
  pub fn new() -> MemVolume {
    MemVolume::default()
  }

  pub fn bytes(&self, offset: u64, len: usize) -> Vec<u8> {
    let data = self.data.lock();
    data[offset as usize..offset as usize + len].to_vec()
  }

  pub fn len(&self) -> u64 {
    self.data.lock().len() as u64
  }

  pub fn truncate(&self, len: u64) {
    self.data.lock().truncate(len as usize);
  }

  pub fn poke(&self, offset: u64, bytes: &[u8]) {
    let mut data = self.data.lock();
    data[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
  }
}

impl Volume for MemVolume {
  fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
    let data = self.data.lock();
    let start = (offset as usize).min(data.len());
    let end = (start + buffer.len()).min(data.len());
    buffer[..end - start].copy_from_slice(&data[start..end]);
    Ok(end - start)
  }

  fn write_at(&self, offset: u64, buffer: &[u8]) -> io::Result<usize> {
    let faults = self.faults.lock();
    if faults.fail_writes_from.map_or(false, |from| offset >= from) {
      return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
    }
    let len = if faults.short_writes { buffer.len() / 2 } else { buffer.len() };
    let mut data = self.data.lock();
    let end = offset as usize + len;
    if data.len() < end {
      data.resize(end, 0);
    }
    data[offset as usize..end].copy_from_slice(&buffer[..len]);
    self.writes.lock().push((offset, len));
    Ok(len)
  }

  fn size(&self) -> io::Result<u64> {
    Ok(self.data.lock().len() as u64)
  }

  fn set_size(&self, size: u64) -> io::Result<()> {
    let faults = self.faults.lock();
    let mut data = self.data.lock();
    if size > data.len() as u64 && faults.fail_grow {
      return Err(io::Error::new(io::ErrorKind::Other, "injected extend failure"));
    }
    if size < data.len() as u64 && faults.fail_shrink {
      return Err(io::Error::new(io::ErrorKind::Other, "injected truncate failure"));
    }
    data.resize(size as usize, 0);
    Ok(())
  }
}

pub fn format(options: &MkfsOptions) -> MemVolume {
  let volume = MemVolume::new();
  kfs::format_volume(Box::new(volume.clone()), options, "mem").unwrap();
  volume
}

pub fn mount(volume: &MemVolume) -> Filesystem {
  kfs::mount_fs(Box::new(volume.clone()), MountOptions::default(), "mem").unwrap()
}
