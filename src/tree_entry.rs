use super::*;

/// One symbol's entry in a canonical prefix code.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeEntry {
  /// The code bits, the first bit read is the highest of the `bit_count` bits.
  pub bit_pattern: u16,
  /// How many bits the code is, 0 means the symbol isn't in the code.
  pub bit_count: u16,
}
impl core::fmt::Debug for TreeEntry {
  fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
    if f.alternate() {
      write!(
        f,
        "TreeEntry {{ bit_pattern: {}, bit_count: {}, }}",
        self.bit_pattern, self.bit_count
      )
    } else if self.bit_count == 0 {
      write!(f, "TE {{ - }}")
    } else {
      let temp = format!("{:016b}", self.bit_pattern);
      write!(f, "TE {{ \"{}\" }}", &temp[(16 - self.bit_count.min(16)) as usize..])
    }
  }
}

impl TreeEntry {
  /// Makes entries with the given bit counts and no patterns yet.
  #[must_use]
  pub fn from_code_lengths(code_lengths: &[u8]) -> Vec<TreeEntry> {
    code_lengths.iter().map(|&len| TreeEntry { bit_pattern: 0, bit_count: u16::from(len) }).collect()
  }

  /// Given a list of filled in `bit_counts`, computes the `bit_patterns`.
  ///
  /// Codes are assigned in symbol order within each length, as RFC 1951
  /// section 3.2.2 describes.
  ///
  /// * `bit_count` must be 15 or less.
  /// * `bit_count` 0 means that the TreeEntry doesn't participate in
  ///   `bit_pattern` generation at all.
  ///
  /// ## Failure
  /// * If any `bit_count` is over 15.
  /// * If the lengths are over-subscribed (there's not enough codes of some
  ///   length to go around).
  pub fn fill_in_the_codes(tree: &mut [TreeEntry]) -> PngResult<()> {
    let max_bits = usize::from(tree.iter().map(|te| te.bit_count).max().unwrap_or(0));
    if max_bits > 15 {
      return Err(PngError::BadCodeLengths);
    }

    // how many codes there are of each length
    let mut bl_count = [0_u32; 16];
    for te in tree.iter() {
      bl_count[usize::from(te.bit_count)] += 1;
    }

    // the first code of each length. u32, since bad lengths can push these
    // past 16 bits before the check below catches it.
    let mut next_code = [0_u32; 16];
    let mut code = 0_u32;
    bl_count[0] = 0;
    for len in 1..=max_bits {
      code = (code + bl_count[len - 1]) << 1;
      next_code[len] = code;
    }

    // symbols of equal length take consecutive codes, in symbol order.
    for te in tree.iter_mut().filter(|te| te.bit_count != 0) {
      let len = usize::from(te.bit_count);
      let pattern = next_code[len];
      if pattern >= (1 << len) {
        // more codes of this length than fit in `len` bits
        return Err(PngError::BadCodeLengths);
      }
      te.bit_pattern = pattern as u16;
      next_code[len] += 1;
    }

    Ok(())
  }
}

#[test]
fn test_fill_in_the_codes() {
  // the small example in the RFC.
  let mut small = TreeEntry::from_code_lengths(&[2, 1, 3, 3]);
  TreeEntry::fill_in_the_codes(&mut small).unwrap();
  let patterns: Vec<u16> = small.iter().map(|te| te.bit_pattern).collect();
  assert_eq!(patterns, [0b10, 0b0, 0b110, 0b111]);

  // the bigger example in the RFC.
  let mut test_tree = TreeEntry::from_code_lengths(&[3, 3, 3, 3, 3, 2, 4, 4]);
  TreeEntry::fill_in_the_codes(&mut test_tree).unwrap();
  let patterns: Vec<u16> = test_tree.iter().map(|te| te.bit_pattern).collect();
  assert_eq!(patterns, [0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111]);

  // the fixed literal/length code, first and last code of each range.
  let mut v = TreeEntry::from_code_lengths(&FIXED_LIT_LEN_CODE_LENGTHS);
  TreeEntry::fill_in_the_codes(&mut v).unwrap();
  let ranges = [
    (0, 0b0011_0000, 143, 0b1011_1111),
    (144, 0b1_1001_0000, 255, 0b1_1111_1111),
    (256, 0b000_0000, 279, 0b001_0111),
    (280, 0b1100_0000, 287, 0b1100_0111),
  ];
  for (first, first_code, last, last_code) in ranges {
    assert_eq!(v[first].bit_pattern, first_code, "symbol {first}");
    assert_eq!(v[last].bit_pattern, last_code, "symbol {last}");
  }
}

#[test]
fn test_fill_in_the_codes_rejects_bad_lengths() {
  // three 1-bit codes can't exist.
  let mut tree = TreeEntry::from_code_lengths(&[1, 1, 1]);
  assert_eq!(TreeEntry::fill_in_the_codes(&mut tree), Err(PngError::BadCodeLengths));

  let mut tree = TreeEntry::from_code_lengths(&[16, 1]);
  assert_eq!(TreeEntry::fill_in_the_codes(&mut tree), Err(PngError::BadCodeLengths));

  // an empty code is fine, nothing gets a pattern.
  let mut tree = TreeEntry::from_code_lengths(&[0, 0, 0]);
  assert_eq!(TreeEntry::fill_in_the_codes(&mut tree), Ok(()));
}
