use super::*;

/// A fully decoded element of a compressed block: a literal byte, the end of
/// the block, or a `(length, distance)` back reference.
///
/// Packed into one `usize`: values below 256 are literals, 256 is the end of
/// the block, and anything above holds the distance in the high bits with the
/// length in the low 9 bits.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct HuffSymbol(usize);

impl core::fmt::Debug for HuffSymbol {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    if let Some(lit) = self.get_literal() {
      write!(f, "Literal({lit})")
    } else if self.is_end_of_block() {
      write!(f, "EndOfBlock")
    } else {
      let (len, dist) = self.get_back_ref();
      write!(f, "BackRef {{ len: {len}, dist: {dist} }}")
    }
  }
}

impl HuffSymbol {
  const END_OF_BLOCK: usize = 256;
  const LEN_BITS: u32 = 9;
  const LEN_MASK: usize = (1 << Self::LEN_BITS) - 1;

  #[inline]
  pub const fn literal(lit: u8) -> Self {
    HuffSymbol(lit as usize)
  }
  #[inline]
  pub const fn get_literal(self) -> Option<u8> {
    if self.0 < Self::END_OF_BLOCK {
      Some(self.0 as u8)
    } else {
      None
    }
  }

  #[inline]
  pub const fn end_of_block() -> Self {
    HuffSymbol(Self::END_OF_BLOCK)
  }
  #[inline]
  pub const fn is_end_of_block(self) -> bool {
    self.0 == Self::END_OF_BLOCK
  }

  /// `len` is 3 to 258, `dist` is 1 to 32768.
  #[inline]
  pub fn back_ref(len: usize, dist: usize) -> Self {
    debug_assert!((3..=258).contains(&len));
    debug_assert!((1..=32_768).contains(&dist));
    HuffSymbol(dist << Self::LEN_BITS | len)
  }
  #[inline]
  pub const fn get_back_ref(self) -> (usize, usize) {
    (self.0 & Self::LEN_MASK, self.0 >> Self::LEN_BITS)
  }
}

#[test]
fn test_result_of_huff_symbol_is_two_words() {
  use core::mem::size_of;
  // passed back in registers rather than through memory
  assert_eq!(size_of::<PngResult<HuffSymbol>>(), size_of::<[usize; 2]>());
}

#[test]
fn test_huff_symbol_kinds() {
  assert_eq!(HuffSymbol::literal(b'A').get_literal(), Some(b'A'));
  assert!(!HuffSymbol::literal(0).is_end_of_block());
  assert!(HuffSymbol::end_of_block().is_end_of_block());
  assert_eq!(HuffSymbol::end_of_block().get_literal(), None);
  let br = HuffSymbol::back_ref(258, 32_768);
  assert_eq!(br.get_literal(), None);
  assert!(!br.is_end_of_block());
  assert_eq!(br.get_back_ref(), (258, 32_768));
  // the smallest back reference still can't look like a literal.
  let br = HuffSymbol::back_ref(3, 1);
  assert_eq!(br.get_literal(), None);
  assert!(!br.is_end_of_block());
  assert_eq!(br.get_back_ref(), (3, 1));
}
