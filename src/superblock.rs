use crate::prelude::*;

/// Group geometry, fixed when the store is created and never changed by
/// growth.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
  pub ibg_size: u64,
  pub dbg_size: u64,
}

impl Layout {
  pub fn from_superblock(superblock: &Superblock) -> Result<Layout> {
    let layout = Layout {
      ibg_size: superblock.ibg_size as u64,
      dbg_size: superblock.dbg_size as u64,
    };
    for &kind in [GroupKind::Inode, GroupKind::Data].iter() {
      let units = layout.units_per_group(kind);
      if units == 0 || units > BITMAP_BITS ||
        layout.payload_size(kind) % kind.unit_size() != 0
      {
        return Err(Error::Corrupt(format!(
          "{} group payload of {} bytes cannot be addressed by a group bitmap",
          kind, layout.payload_size(kind))));
      }
    }
    Ok(layout)
  }

  pub fn inode_units_per_group(&self) -> u64 {
    self.ibg_size / INODE_SIZE
  }

  pub fn data_units_per_group(&self) -> u64 {
    self.dbg_size / BLOCK_SIZE
  }

  pub fn units_per_group(&self, kind: GroupKind) -> u64 {
    match kind {
      GroupKind::Inode => self.inode_units_per_group(),
      GroupKind::Data => self.data_units_per_group(),
    }
  }

  pub fn payload_size(&self, kind: GroupKind) -> u64 {
    match kind {
      GroupKind::Inode => self.ibg_size,
      GroupKind::Data => self.dbg_size,
    }
  }

  /// Bytes occupied by one group of `kind`: descriptor, bitmap and payload.
  pub fn group_span(&self, kind: GroupKind) -> u64 {
    GROUP_META_SIZE + self.payload_size(kind)
  }

  /// Size of a store with the given group counts, or `None` when the counts
  /// cannot describe any addressable store.
  pub fn expected_size(&self, ibg_num: u64, dbg_num: u64) -> Option<u64> {
    let inode_bytes = self.group_span(GroupKind::Inode).checked_mul(ibg_num)?;
    let data_bytes = self.group_span(GroupKind::Data).checked_mul(dbg_num)?;
    SUPERBLOCK_SIZE.checked_add(inode_bytes)?.checked_add(data_bytes)
  }

  /// Byte offset of the record of `ino` in the inode group starting at
  /// `group_offset`.
  pub fn inode_offset(&self, group_offset: u64, ino: u64) -> u64 {
    group_offset + GROUP_META_SIZE + (ino % self.inode_units_per_group()) * INODE_SIZE
  }
}

/// Reads and validates the superblock, returning it together with the size of
/// the store.
pub fn read_superblock(volume: &dyn Volume) -> Result<(Superblock, u64)> {
  let mut buffer = make_buffer(SUPERBLOCK_SIZE);
  read_exact_at(volume, 0, &mut buffer[..], "superblock")?;
  let superblock = decode_superblock(&buffer[..])?;
  let layout = Layout::from_superblock(&superblock)?;

  let filesize = volume.size()?;
  let expected = layout.expected_size(superblock.ibg_num, superblock.dbg_num)
    .ok_or_else(|| Error::Corrupt(format!(
      "superblock records {} inode and {} data groups, more than any store can hold",
      superblock.ibg_num, superblock.dbg_num)))?;
  if filesize != expected {
    tracing::error!(filesize, expected, "store size does not match the superblock");
    return Err(Error::SizeMismatch { expected: expected, actual: filesize });
  }
  Ok((superblock, filesize))
}

pub fn write_superblock(volume: &dyn Volume, superblock: &Superblock) -> Result<()> {
  let mut buffer = make_buffer(SUPERBLOCK_SIZE);
  encode_superblock(superblock, &mut buffer[..]);
  write_exact_at(volume, 0, &buffer[..], "superblock")
}

/// Writes the superblock back if it is dirty. The dirty flag is restored when
/// the write fails, so that a later sync retries.
pub fn sync_superblock(fs: &Filesystem) -> Result<()> {
  if !fs.take_dirty() {
    return Ok(());
  }

  let superblock = *fs.superblock.read();
  match write_superblock(&*fs.volume, &superblock) {
    Ok(()) => {
      fs.set_synctime(now());
      tracing::debug!(iused = superblock.iused, bused = superblock.bused,
        "superblock synced");
      Ok(())
    },
    Err(err) => {
      fs.mark_dirty();
      Err(err)
    },
  }
}

pub fn inc_iused(fs: &Filesystem) {
  fs.superblock.write().iused += 1;
  fs.mark_dirty();
}

pub fn dec_iused(fs: &Filesystem) {
  {
    let mut superblock = fs.superblock.write();
    superblock.iused = superblock.iused.saturating_sub(1);
  }
  fs.mark_dirty();
}

pub fn inc_bused(fs: &Filesystem) {
  fs.superblock.write().bused += 1;
  fs.mark_dirty();
}

pub fn dec_bused(fs: &Filesystem) {
  {
    let mut superblock = fs.superblock.write();
    superblock.bused = superblock.bused.saturating_sub(1);
  }
  fs.mark_dirty();
}
