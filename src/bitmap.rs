//! Allocation bitmaps. Bit `i` lives in byte `i / 8` at position `i % 8`,
//! so the on-disk image is independent of the host word order.

/// Finds the lowest clear bit, sets it and returns its index.
pub fn find_and_claim(bitmap: &mut [u8]) -> Option<u64> {
  let mut chunk_start = 0;
  for chunk in bitmap.chunks(8) {
    if chunk.len() == 8 && chunk.iter().all(|&b| b == 0xff) {
      chunk_start += 8;
      continue;
    }
    break;
  }

  for byte_idx in chunk_start..bitmap.len() {
    let byte = bitmap[byte_idx];
    if byte != 0xff {
      let bit = (!byte).trailing_zeros() as usize;
      bitmap[byte_idx] |= 1 << bit;
      return Some((byte_idx * 8 + bit) as u64);
    }
  }
  None
}

pub fn test_bit(bitmap: &[u8], idx: u64) -> bool {
  let (byte, mask) = locate(idx);
  bitmap[byte] & mask != 0
}

pub fn set_bit(bitmap: &mut [u8], idx: u64) {
  let (byte, mask) = locate(idx);
  bitmap[byte] |= mask;
}

/// Clears the bit, returning whether it was set before.
pub fn clear_bit(bitmap: &mut [u8], idx: u64) -> bool {
  let (byte, mask) = locate(idx);
  let was_set = bitmap[byte] & mask != 0;
  bitmap[byte] &= !mask;
  was_set
}

pub fn count_set(bitmap: &[u8]) -> u64 {
  bitmap.iter().map(|b| b.count_ones() as u64).sum()
}

fn locate(idx: u64) -> (usize, u8) {
  ((idx / 8) as usize, 1 << (idx % 8))
}
