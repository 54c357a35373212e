use super::*;

/// A prefix code decoding tree.
///
/// Every node is owned by exactly one parent. Walking from the root, each
/// bit read picks the child to step into, until a leaf gives the symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HuffTree {
  /// A decoded symbol.
  Leaf(u16),
  /// A branch keyed on the next bit, `[zero, one]`.
  ///
  /// A `None` child is a bit pattern that isn't part of the code.
  Internal([Option<Box<HuffTree>>; 2]),
}

impl HuffTree {
  #[inline]
  fn branch() -> Self {
    HuffTree::Internal([None, None])
  }

  /// Builds the canonical code tree for `code_lengths[symbol]`.
  ///
  /// A length of 0 means the symbol is absent.
  ///
  /// ## Failure
  /// * [`BadCodeLengths`](PngError::BadCodeLengths) if every length is 0, or
  ///   the lengths don't form a prefix code.
  pub fn from_code_lengths(code_lengths: &[u8]) -> PngResult<Self> {
    let mut entries = TreeEntry::from_code_lengths(code_lengths);
    if entries.iter().all(|te| te.bit_count == 0) {
      return Err(PngError::BadCodeLengths);
    }
    TreeEntry::fill_in_the_codes(&mut entries)?;
    let mut root = HuffTree::branch();
    for (symbol, te) in entries.iter().enumerate() {
      if te.bit_count != 0 {
        root.insert_code(u32::from(te.bit_pattern), u32::from(te.bit_count), symbol as u16)?;
      }
    }
    Ok(root)
  }

  /// Places `symbol` at the end of the path given by the low `remaining` bits
  /// of `code`, highest bit first.
  fn insert_code(&mut self, code: u32, remaining: u32, symbol: u16) -> PngResult<()> {
    match self {
      HuffTree::Leaf(_) => Err(PngError::BadCodeLengths),
      HuffTree::Internal(children) => {
        let bit = ((code >> (remaining - 1)) & 1) as usize;
        let slot = &mut children[bit];
        if remaining == 1 {
          if slot.is_some() {
            return Err(PngError::BadCodeLengths);
          }
          *slot = Some(Box::new(HuffTree::Leaf(symbol)));
          Ok(())
        } else {
          slot.get_or_insert_with(|| Box::new(HuffTree::branch())).insert_code(code, remaining - 1, symbol)
        }
      }
    }
  }

  /// Reads bits until a symbol is found.
  pub fn decode(&self, bits: &mut BitSource<'_>) -> PngResult<u16> {
    let mut node = self;
    loop {
      match node {
        HuffTree::Leaf(symbol) => return Ok(*symbol),
        HuffTree::Internal(children) => {
          let bit = bits.next_one_bit()? as usize;
          node = children[bit].as_deref().ok_or(PngError::InvalidHuffmanCode)?;
        }
      }
    }
  }
}

#[cfg(test)]
fn collect_codes(tree: &HuffTree, prefix: Vec<u8>, out: &mut Vec<(u16, Vec<u8>)>) {
  match tree {
    HuffTree::Leaf(symbol) => out.push((*symbol, prefix)),
    HuffTree::Internal(children) => {
      for (bit, child) in children.iter().enumerate() {
        if let Some(child) = child {
          let mut longer = prefix.clone();
          longer.push(bit as u8);
          collect_codes(child, longer, out);
        }
      }
    }
  }
}

#[test]
fn test_tree_codes_are_prefix_free_and_reachable() {
  let length_sets: [&[u8]; 4] = [
    &[2, 1, 3, 3],
    &[3, 3, 3, 3, 3, 2, 4, 4],
    &[0, 4, 0, 4, 3, 3, 2, 2, 0, 5, 5],
    &FIXED_LIT_LEN_CODE_LENGTHS,
  ];
  for lengths in length_sets {
    let tree = HuffTree::from_code_lengths(lengths).unwrap();
    let mut codes = Vec::new();
    collect_codes(&tree, Vec::new(), &mut codes);
    // every used symbol shows up exactly once, at its own length.
    let used = lengths.iter().filter(|&&l| l != 0).count();
    assert_eq!(codes.len(), used);
    for (symbol, code) in codes.iter() {
      assert_eq!(code.len(), usize::from(lengths[usize::from(*symbol)]));
    }
    for (i, (_, a)) in codes.iter().enumerate() {
      for (j, (_, b)) in codes.iter().enumerate() {
        if i != j {
          assert!(!b.starts_with(a), "{a:?} is a prefix of {b:?}");
        }
      }
    }
  }
}

#[test]
fn test_decode_rfc_example() {
  // A=10, B=0, C=110, D=111. DEFLATE stores huffman codes first bit in the
  // lowest bit, so "B A D C" is the bit sequence 0 10 111 110.
  let tree = HuffTree::from_code_lengths(&[2, 1, 3, 3]).unwrap();
  let mut bits = BitSource::new(&[0b1111_1010, 0b0000_0000]);
  let decoded: Vec<u16> = (0..4).map(|_| tree.decode(&mut bits).unwrap()).collect();
  assert_eq!(decoded, [1, 0, 3, 2]);
}

#[test]
fn test_empty_alphabet_is_rejected() {
  assert_eq!(HuffTree::from_code_lengths(&[0; 30]), Err(PngError::BadCodeLengths));
  assert_eq!(HuffTree::from_code_lengths(&[]), Err(PngError::BadCodeLengths));
}

#[test]
fn test_missing_child_is_invalid_code() {
  // a lone 1-bit code only has the `0` path.
  let tree = HuffTree::from_code_lengths(&[0, 1]).unwrap();
  assert_eq!(tree.decode(&mut BitSource::new(&[0b0])), Ok(1));
  assert_eq!(tree.decode(&mut BitSource::new(&[0b1])), Err(PngError::InvalidHuffmanCode));
}
