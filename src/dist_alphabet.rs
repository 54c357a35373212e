use super::*;

/// Base distance of each distance symbol.
pub(crate) const DST_BASE: [u16; 30] = [
  1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537, 2049,
  3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits that follow each distance symbol.
pub(crate) const DST_EXTRA: [u8; 30] =
  [0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13];

/// The distance code of a compressed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistAlphabet {
  tree: HuffTree,
}
impl DistAlphabet {
  /// Builds the alphabet from a code length per symbol.
  ///
  /// A block with only literals never reads a distance, so its distance code
  /// is allowed to be empty. That gives a single leaf of symbol 0 which reads
  /// no bits. Every distance still follows a length symbol, and those always
  /// take at least one bit to decode.
  pub fn from_code_lengths(code_lengths: &[u8]) -> PngResult<Self> {
    let tree = if code_lengths.iter().all(|&len| len == 0) {
      HuffTree::Leaf(0)
    } else {
      HuffTree::from_code_lengths(code_lengths)?
    };
    Ok(Self { tree })
  }

  /// The decoding tree.
  #[inline]
  #[must_use]
  pub fn tree(&self) -> &HuffTree {
    &self.tree
  }

  /// Decodes a distance symbol plus its extra bits into a distance.
  pub(crate) fn pull_distance(&self, bi: &mut BitSource<'_>) -> PngResult<usize> {
    let sym = usize::from(self.tree.decode(bi)?);
    let (base, extra_bits) = match (DST_BASE.get(sym), DST_EXTRA.get(sym)) {
      (Some(base), Some(extra_bits)) => (*base, *extra_bits),
      // 30 and 31 can be coded but never appear in valid data.
      _ => return Err(PngError::InvalidHuffmanCode),
    };
    let extra = bi.next_bits_lsb(u32::from(extra_bits))? as usize;
    Ok(usize::from(base) + extra)
  }
}

#[test]
fn test_dist_tables_line_up() {
  for i in 0..29 {
    assert_eq!(u32::from(DST_BASE[i]) + (1 << DST_EXTRA[i]), u32::from(DST_BASE[i + 1]));
  }
  assert_eq!(u32::from(DST_BASE[29]) + (1 << DST_EXTRA[29]) - 1, 32_768);
}

#[test]
fn test_pull_distance_reads_extra_bits() {
  // a flat 5-bit code, like the fixed distance code.
  let dist = DistAlphabet::from_code_lengths(&[5; 32]).unwrap();
  // symbol 4 is `00100`, sent high bit first, then 1 extra bit of `1`.
  // bit sequence: 0 0 1 0 0 1
  let mut bits = BitSource::new(&[0b0010_0100]);
  assert_eq!(dist.pull_distance(&mut bits), Ok(6));
  // symbol 31 is `11111`.
  let mut bits = BitSource::new(&[0b0001_1111]);
  assert_eq!(dist.pull_distance(&mut bits), Err(PngError::InvalidHuffmanCode));
}

#[test]
fn test_unused_distance_code() {
  let dist = DistAlphabet::from_code_lengths(&[0; 30]).unwrap();
  assert_eq!(dist.tree(), &HuffTree::Leaf(0));
  assert_eq!(dist.pull_distance(&mut BitSource::new(&[])), Ok(1));
}
