use super::*;

/// A cursor that pulls DEFLATE bits out of a byte slice.
///
/// Bits come out of each byte starting from the lowest bit. The source slice
/// is only borrowed, never copied.
#[derive(Clone)]
pub struct BitSource<'b> {
  bytes: &'b [u8],
  byte_pos: usize,
  bit_offset: u32,
}

impl core::fmt::Debug for BitSource<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    let current = match self.bytes.get(self.byte_pos) {
      Some(byte) => format!("{byte:08b}"),
      None => String::from("<end>"),
    };
    f.debug_struct("BitSource")
      .field("byte_pos", &self.byte_pos)
      .field("bit_offset", &self.bit_offset)
      .field("current", &current)
      .field("len", &self.bytes.len())
      .finish()
  }
}

impl<'b> BitSource<'b> {
  /// Starts at the first bit of `bytes`.
  #[inline]
  #[must_use]
  pub const fn new(bytes: &'b [u8]) -> Self {
    Self { bytes, byte_pos: 0, bit_offset: 0 }
  }

  /// The byte the cursor is currently within.
  ///
  /// Right after [`align_to_byte`](Self::align_to_byte) this is the next
  /// unread byte.
  #[inline]
  #[must_use]
  pub const fn byte_position(&self) -> usize {
    self.byte_pos
  }

  /// Reads a single bit.
  #[inline]
  pub fn next_one_bit(&mut self) -> PngResult<u32> {
    let byte = *self.bytes.get(self.byte_pos).ok_or(PngError::UnexpectedEndOfStream)?;
    let bit = (u32::from(byte) >> self.bit_offset) & 1;
    self.bit_offset += 1;
    if self.bit_offset == 8 {
      self.bit_offset = 0;
      self.byte_pos += 1;
    }
    Ok(bit)
  }

  /// Reads `count` bits, the first bit read becomes the lowest bit of the
  /// output.
  ///
  /// This is how DEFLATE packs every value other than a huffman code.
  pub fn next_bits_lsb(&mut self, count: u32) -> PngResult<u32> {
    debug_assert!(count <= 16);
    let mut out = 0_u32;
    for i in 0..count {
      out |= self.next_one_bit()? << i;
    }
    Ok(out)
  }

  /// Skips to the start of the next byte, unless already at a byte boundary.
  #[inline]
  pub fn align_to_byte(&mut self) {
    if self.bit_offset != 0 {
      self.bit_offset = 0;
      self.byte_pos += 1;
    }
  }

  /// Takes `count` whole bytes directly from the source.
  ///
  /// The cursor is byte aligned first.
  pub fn take_aligned_bytes(&mut self, count: usize) -> PngResult<&'b [u8]> {
    self.align_to_byte();
    let end = self.byte_pos.checked_add(count).ok_or(PngError::UnexpectedEndOfStream)?;
    let out = self.bytes.get(self.byte_pos..end).ok_or(PngError::UnexpectedEndOfStream)?;
    self.byte_pos = end;
    Ok(out)
  }

  /// The "this is the last block" flag of a block header.
  #[inline]
  pub fn get_bfinal(&mut self) -> PngResult<bool> {
    Ok(self.next_one_bit()? != 0)
  }

  /// The two bit block type of a block header.
  #[inline]
  pub fn get_btype(&mut self) -> PngResult<u32> {
    self.next_bits_lsb(2)
  }
}

#[test]
fn test_bits_come_out_lsb_first() {
  let mut bits = BitSource::new(&[0b1010_0110, 0b0000_0001]);
  let firsts: Vec<u32> = (0..8).map(|_| bits.next_one_bit().unwrap()).collect();
  assert_eq!(firsts, [0, 1, 1, 0, 0, 1, 0, 1]);
  assert_eq!(bits.byte_position(), 1);
  assert_eq!(bits.next_one_bit(), Ok(1));
  assert_eq!(bits.next_bits_lsb(7), Ok(0));
  assert_eq!(bits.next_one_bit(), Err(PngError::UnexpectedEndOfStream));
}

#[test]
fn test_next_bits_lsb_spans_bytes() {
  // low nibble first: 0b1101, then 0b0011 spans into the next byte.
  let mut bits = BitSource::new(&[0b0011_1101, 0b1111_0000]);
  assert_eq!(bits.next_bits_lsb(4), Ok(0b1101));
  assert_eq!(bits.next_bits_lsb(8), Ok(0b0000_0011));
  assert_eq!(bits.next_bits_lsb(4), Ok(0b1111));
  assert_eq!(bits.next_bits_lsb(1), Err(PngError::UnexpectedEndOfStream));
}

#[test]
fn test_align_to_byte() {
  let mut bits = BitSource::new(&[0xFF, 0xAB, 0xCD]);
  bits.align_to_byte();
  assert_eq!(bits.byte_position(), 0);
  bits.next_bits_lsb(3).unwrap();
  bits.align_to_byte();
  assert_eq!(bits.byte_position(), 1);
  assert_eq!(bits.take_aligned_bytes(2), Ok(&[0xAB, 0xCD][..]));
  assert_eq!(bits.take_aligned_bytes(1), Err(PngError::UnexpectedEndOfStream));
  assert_eq!(bits.take_aligned_bytes(0), Ok(&[][..]));
}

#[test]
fn test_block_header_bits() {
  // bfinal = 1, btype = 0b10
  let mut bits = BitSource::new(&[0b0000_0101]);
  assert_eq!(bits.get_bfinal(), Ok(true));
  assert_eq!(bits.get_btype(), Ok(2));
}
