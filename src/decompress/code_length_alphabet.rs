use super::*;

/// The order that the code length code's own lengths are sent in.
pub(crate) const CODE_LENGTH_ORDER: [usize; 19] =
  [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

/// The code that a dynamic block uses to send its other two codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CodeLengthAlphabet {
  tree: HuffTree,
}
impl CodeLengthAlphabet {
  const COUNT: usize = 19;

  /// Reads `hclen` 3-bit lengths and builds the code from them.
  pub fn read_from(bi: &mut BitSource<'_>, hclen: usize) -> PngResult<Self> {
    debug_assert!(hclen <= Self::COUNT);
    let mut code_lengths = [0_u8; Self::COUNT];
    for &symbol in CODE_LENGTH_ORDER.iter().take(hclen) {
      code_lengths[symbol] = bi.next_bits_lsb(3)? as u8;
    }
    Ok(Self { tree: HuffTree::from_code_lengths(&code_lengths)? })
  }

  /// Fills every entry of `lengths` by decoding the run length encoded
  /// lengths that follow the code length code.
  pub fn fill_a_tree(&self, lengths: &mut [u8], bi: &mut BitSource<'_>) -> PngResult<()> {
    let mut code_lengths_acquired = 0_usize;
    while code_lengths_acquired < lengths.len() {
      let (value, repeat_count) = match self.tree.decode(bi)? {
        len @ 0..=15 => (len as u8, 1),
        16 => {
          // repeat the previous length
          let previous = match code_lengths_acquired.checked_sub(1) {
            Some(i) => lengths[i],
            None => return Err(PngError::BadCodeLengths),
          };
          (previous, 3 + bi.next_bits_lsb(2)? as usize)
        }
        // short run of zeros
        17 => (0, 3 + bi.next_bits_lsb(3)? as usize),
        // long run of zeros
        18 => (0, 11 + bi.next_bits_lsb(7)? as usize),
        _ => return Err(PngError::InvalidHuffmanCode),
      };
      let run = lengths
        .get_mut(code_lengths_acquired..code_lengths_acquired + repeat_count)
        .ok_or(PngError::BadCodeLengths)?;
      run.fill(value);
      code_lengths_acquired += repeat_count;
    }
    Ok(())
  }
}

#[test]
fn test_fill_a_tree_runs() {
  // Every code length symbol gets 5 bits, so symbol `s` is just `s` sent
  // high bit first.
  let alphabet = CodeLengthAlphabet { tree: HuffTree::from_code_lengths(&[5; 19]).unwrap() };
  let mut writer = TestBitWriter::default();
  writer.push_code(7, 5); // literal 7
  writer.push_code(16, 5); // previous, 3 + 1
  writer.push_lsb(1, 2);
  writer.push_code(17, 5); // zeros, 3 + 2
  writer.push_lsb(2, 3);
  writer.push_code(18, 5); // zeros, 11 + 0
  writer.push_lsb(0, 7);
  writer.push_code(2, 5); // literal 2
  let bytes = writer.finish();

  let mut lengths = [0xFF_u8; 1 + 4 + 5 + 11 + 1];
  alphabet.fill_a_tree(&mut lengths, &mut BitSource::new(&bytes)).unwrap();
  let mut expected = vec![7, 7, 7, 7, 7];
  expected.extend([0; 16]);
  expected.push(2);
  assert_eq!(&lengths[..], &expected[..]);
}

#[test]
fn test_fill_a_tree_rejects_bad_runs() {
  let alphabet = CodeLengthAlphabet { tree: HuffTree::from_code_lengths(&[5; 19]).unwrap() };

  // repeat with nothing before it.
  let mut writer = TestBitWriter::default();
  writer.push_code(16, 5);
  writer.push_lsb(0, 2);
  let bytes = writer.finish();
  let mut lengths = [0_u8; 8];
  assert_eq!(
    alphabet.fill_a_tree(&mut lengths, &mut BitSource::new(&bytes)),
    Err(PngError::BadCodeLengths)
  );

  // a zero run longer than what's left.
  let mut writer = TestBitWriter::default();
  writer.push_code(18, 5);
  writer.push_lsb(0, 7);
  let bytes = writer.finish();
  let mut lengths = [0_u8; 8];
  assert_eq!(
    alphabet.fill_a_tree(&mut lengths, &mut BitSource::new(&bytes)),
    Err(PngError::BadCodeLengths)
  );
}
