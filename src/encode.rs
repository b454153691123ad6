use time::Timespec;
use crate::defs::*;

pub fn encode_superblock(superblock: &Superblock, bytes: &mut [u8]) {
  assert!(bytes.len() >= Superblock::ENCODED_LEN);
  encode_u32(superblock.magic, &mut bytes[0..]);
  encode_u32(superblock.version, &mut bytes[4..]);
  encode_u32(superblock.dbg_size, &mut bytes[8..]);
  encode_u32(superblock.ibg_size, &mut bytes[12..]);
  encode_u64(superblock.bused, &mut bytes[16..]);
  encode_u64(superblock.iused, &mut bytes[24..]);
  encode_u64(superblock.dbg_num, &mut bytes[32..]);
  encode_u64(superblock.ibg_num, &mut bytes[40..]);
  encode_u64(superblock.mount_times, &mut bytes[48..]);
  encode_u64(superblock.umount_times, &mut bytes[56..]);
  encode_timespec(superblock.mount_time, &mut bytes[64..]);
  encode_timespec(superblock.umount_time, &mut bytes[80..]);
}

pub fn encode_group_desc(desc: &GroupDesc, bytes: &mut [u8]) {
  assert!(bytes.len() >= GroupDesc::ENCODED_LEN);
  encode_u32(desc.kind.code(), &mut bytes[0..]);
  encode_u32(desc.used, &mut bytes[4..]);
}

/// Encodes the node into a whole inode slot, zeroing the padding between the
/// timestamps and the block pointers.
pub fn encode_node(node: &Node, bytes: &mut [u8]) {
  assert!(bytes.len() >= INODE_SIZE as usize);
  encode_u64(node.size, &mut bytes[0..]);
  encode_u32(node.uid, &mut bytes[8..]);
  encode_u32(node.gid, &mut bytes[12..]);
  encode_u32(node.mode, &mut bytes[16..]);
  encode_u32(node.nlink, &mut bytes[20..]);
  encode_u32(node.atime, &mut bytes[24..]);
  encode_u32(node.ctime, &mut bytes[28..]);
  encode_u32(node.mtime, &mut bytes[32..]);
  encode_u32(node.btime, &mut bytes[36..]);
  for byte in bytes[40..128].iter_mut() {
    *byte = 0;
  }
  for i in 0..DIRECT_BLOCKS {
    encode_u64(node.direct[i], &mut bytes[128 + 8*i..]);
  }
  encode_u64(node.indirect, &mut bytes[248..]);
}

fn encode_timespec(value: Timespec, bytes: &mut [u8]) {
  encode_u64(value.sec as u64, &mut bytes[0..]);
  encode_u64(value.nsec as i64 as u64, &mut bytes[8..]);
}

pub fn encode_u32(value: u32, bytes: &mut [u8]) {
  bytes[0] = (value & 0xff) as u8;
  bytes[1] = ((value >> 8) & 0xff) as u8;
  bytes[2] = ((value >> 16) & 0xff) as u8;
  bytes[3] = ((value >> 24) & 0xff) as u8;
}

pub fn encode_u64(value: u64, bytes: &mut [u8]) {
  encode_u32((value & 0xffffffff) as u32, &mut bytes[0..]);
  encode_u32((value >> 32) as u32, &mut bytes[4..]);
}
