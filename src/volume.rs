use std::{fs, io, path};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use crate::error::{Error, Result};

/// Random-access backing store of a filesystem.
///
/// Reads and writes take `&self` so that groups and inodes can be flushed
/// concurrently; implementations must be positional (no shared cursor).
pub trait Volume: Send + Sync {
  /// Reads as many bytes as possible into `buffer`, stopping early only at
  /// the end of the store. Returns the number of bytes read.
  fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize>;

  /// Writes as many bytes of `buffer` as the store accepts. Returns the
  /// number of bytes written.
  fn write_at(&self, offset: u64, buffer: &[u8]) -> io::Result<usize>;

  fn size(&self) -> io::Result<u64>;
  fn set_size(&self, size: u64) -> io::Result<()>;
}

pub struct FileVolume(pub fs::File);

impl FileVolume {
  /// Opens an existing store for reading and writing. Symbolic links are not
  /// followed.
  pub fn open<P: AsRef<path::Path>>(path: P) -> io::Result<FileVolume> {
    let file = fs::OpenOptions::new()
      .read(true).write(true)
      .custom_flags(libc::O_NOFOLLOW)
      .open(path)?;
    Ok(FileVolume(file))
  }

  /// Creates a new store, failing if the path already exists.
  pub fn create<P: AsRef<path::Path>>(path: P) -> io::Result<FileVolume> {
    let file = fs::OpenOptions::new()
      .read(true).write(true)
      .create_new(true)
      .mode(0o644)
      .open(path)?;
    Ok(FileVolume(file))
  }
}

impl Volume for FileVolume {
  fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
    let mut total_read = 0;
    while total_read < buffer.len() {
      match self.0.read_at(&mut buffer[total_read..], offset + total_read as u64) {
        Ok(0) => break,
        Ok(n) => total_read += n,
        Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) => return Err(err),
      }
    }
    Ok(total_read)
  }

  fn write_at(&self, offset: u64, buffer: &[u8]) -> io::Result<usize> {
    let mut total_written = 0;
    while total_written < buffer.len() {
      match self.0.write_at(&buffer[total_written..], offset + total_written as u64) {
        Ok(0) => break,
        Ok(n) => total_written += n,
        Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) => return Err(err),
      }
    }
    Ok(total_written)
  }

  fn size(&self) -> io::Result<u64> {
    Ok(self.0.metadata()?.len())
  }

  fn set_size(&self, size: u64) -> io::Result<()> {
    self.0.set_len(size)
  }
}

/// Reads exactly `buffer.len()` bytes or fails with `ShortRead`.
pub fn read_exact_at(volume: &dyn Volume, offset: u64, buffer: &mut [u8],
  what: &'static str) -> Result<()>
{
  let actual = volume.read_at(offset, buffer)?;
  if actual != buffer.len() {
    tracing::error!(what, offset, expected = buffer.len(), actual, "short read");
    return Err(Error::ShortRead {
      what: what, offset: offset, expected: buffer.len(), actual: actual });
  }
  Ok(())
}

/// Writes exactly `buffer.len()` bytes or fails with `ShortWrite`.
pub fn write_exact_at(volume: &dyn Volume, offset: u64, buffer: &[u8],
  what: &'static str) -> Result<()>
{
  let actual = volume.write_at(offset, buffer)?;
  if actual != buffer.len() {
    tracing::error!(what, offset, expected = buffer.len(), actual, "short write");
    return Err(Error::ShortWrite {
      what: what, offset: offset, expected: buffer.len(), actual: actual });
  }
  Ok(())
}

pub fn make_buffer(size: u64) -> Vec<u8> {
  vec![0; size as usize]
}
