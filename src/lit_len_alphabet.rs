use super::*;

/// Base match length of each length symbol, starting from symbol 257.
pub(crate) const LEN_BASE: [u16; 29] = [
  3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
  163, 195, 227, 258,
];

/// Extra bits that follow each length symbol, starting from symbol 257.
pub(crate) const LEN_EXTRA: [u8; 29] =
  [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0];

/// The literal/length code of a compressed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LitLenAlphabet {
  tree: HuffTree,
}
impl LitLenAlphabet {
  /// Builds the alphabet from a code length per symbol.
  ///
  /// ## Failure
  /// * [`BadCodeLengths`](PngError::BadCodeLengths) if the end of block symbol
  ///   (256) has no code, since then the block could never end.
  pub fn from_code_lengths(code_lengths: &[u8]) -> PngResult<Self> {
    if code_lengths.get(256).copied().unwrap_or(0) == 0 {
      return Err(PngError::BadCodeLengths);
    }
    Ok(Self { tree: HuffTree::from_code_lengths(code_lengths)? })
  }

  /// The decoding tree.
  #[inline]
  #[must_use]
  pub fn tree(&self) -> &HuffTree {
    &self.tree
  }

  /// Decodes the next literal, end of block, or back reference.
  ///
  /// A length symbol is immediately followed by its distance, so that's read
  /// out with `dist` as part of the same call.
  pub(crate) fn pull_and_match(
    &self, bi: &mut BitSource<'_>, dist: &DistAlphabet,
  ) -> PngResult<HuffSymbol> {
    match self.tree.decode(bi)? {
      lit @ 0..=255 => Ok(HuffSymbol::literal(lit as u8)),
      256 => Ok(HuffSymbol::end_of_block()),
      sym @ 257..=285 => {
        let i = usize::from(sym - 257);
        let extra = bi.next_bits_lsb(u32::from(LEN_EXTRA[i]))? as usize;
        let len = usize::from(LEN_BASE[i]) + extra;
        let distance = dist.pull_distance(bi)?;
        Ok(HuffSymbol::back_ref(len, distance))
      }
      _ => Err(PngError::InvalidHuffmanCode),
    }
  }
}

#[test]
fn test_len_tables_line_up() {
  // each base picks up where the previous symbol's extra bits leave off.
  // Symbol 284 tops out at 258, which also has its own symbol (285).
  for i in 0..27 {
    assert_eq!(LEN_BASE[i] + (1 << LEN_EXTRA[i]), LEN_BASE[i + 1], "symbol {}", 257 + i);
  }
  assert_eq!(LEN_BASE[27] + (1 << LEN_EXTRA[27]) - 1, 258);
}

#[test]
fn test_end_of_block_must_have_a_code() {
  assert_eq!(LitLenAlphabet::from_code_lengths(&[1, 1]), Err(PngError::BadCodeLengths));
  let mut lengths = [0_u8; 257];
  lengths[0] = 1;
  assert_eq!(LitLenAlphabet::from_code_lengths(&lengths), Err(PngError::BadCodeLengths));
  lengths[256] = 1;
  assert!(LitLenAlphabet::from_code_lengths(&lengths).is_ok());
}
