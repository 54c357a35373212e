//! DEFLATE (RFC 1951) and zlib (RFC 1950) decompression.
//!
//! A DEFLATE stream is a series of blocks. Each block is stored (plain
//! bytes), or compressed with the fixed codes the RFC defines, or compressed
//! with "dynamic" codes that are sent at the start of the block. Compressed
//! blocks hold literal bytes and `(length, distance)` back references into
//! the output produced so far.

use super::*;

use std::sync::OnceLock;

mod code_length_alphabet;
use code_length_alphabet::*;

const fn make_fixed_lit_len_code_lengths() -> [u8; 288] {
  let mut out = [0_u8; 288];
  let mut i = 0;
  while i < 288 {
    out[i] = match i {
      0..=143 => 8,
      144..=255 => 9,
      256..=279 => 7,
      _ => 8,
    };
    i += 1;
  }
  out
}

/// Code lengths of the literal/length code used by fixed huffman blocks.
pub const FIXED_LIT_LEN_CODE_LENGTHS: [u8; 288] = make_fixed_lit_len_code_lengths();

/// Code lengths of the distance code used by fixed huffman blocks.
pub const FIXED_DIST_CODE_LENGTHS: [u8; 32] = [5; 32];

/// The two codes used by every fixed huffman block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedTrees {
  /// literal/length code
  pub lit_len: LitLenAlphabet,
  /// distance code
  pub dist: DistAlphabet,
}

/// Gets the fixed huffman codes.
///
/// They're built on first use and then shared, read only, by every decode in
/// the process.
pub fn fixed_trees() -> &'static FixedTrees {
  static FIXED: OnceLock<FixedTrees> = OnceLock::new();
  FIXED.get_or_init(|| FixedTrees {
    lit_len: LitLenAlphabet::from_code_lengths(&FIXED_LIT_LEN_CODE_LENGTHS)
      .expect("the fixed literal/length code is complete"),
    dist: DistAlphabet::from_code_lengths(&FIXED_DIST_CODE_LENGTHS)
      .expect("the fixed distance code is complete"),
  })
}

/// Makes room for `count` more bytes of output, or errors if that would go
/// over `limit`.
#[inline]
fn reserve_output(out: &mut Vec<u8>, count: usize, limit: usize) -> PngResult<()> {
  match out.len().checked_add(count) {
    Some(total) if total <= limit => out.try_reserve(count).map_err(|_| PngError::AllocationFailed),
    _ => Err(PngError::ExcessImageData),
  }
}

fn inflate_stored_block(bi: &mut BitSource<'_>, out: &mut Vec<u8>, limit: usize) -> PngResult<()> {
  bi.align_to_byte();
  let len = bi.next_bits_lsb(16)? as usize;
  let nlen = bi.next_bits_lsb(16)?;
  if nlen != !(len as u32) & 0xFFFF {
    // permissive, only noted
    log::trace!("stored block NLEN {nlen:#06X} does not complement LEN {len:#06X}");
  }
  log::trace!("stored block of {len} bytes");
  let bytes = bi.take_aligned_bytes(len)?;
  reserve_output(out, bytes.len(), limit)?;
  out.extend_from_slice(bytes);
  Ok(())
}

fn inflate_huffman_block(
  bi: &mut BitSource<'_>, out: &mut Vec<u8>, limit: usize, lit_len: &LitLenAlphabet,
  dist: &DistAlphabet,
) -> PngResult<()> {
  loop {
    let symbol = lit_len.pull_and_match(bi, dist)?;
    if let Some(lit) = symbol.get_literal() {
      reserve_output(out, 1, limit)?;
      out.push(lit);
    } else if symbol.is_end_of_block() {
      return Ok(());
    } else {
      let (len, distance) = symbol.get_back_ref();
      let start = out.len().checked_sub(distance).ok_or(PngError::InvalidBackReference)?;
      reserve_output(out, len, limit)?;
      // Byte at a time: when `distance < len` the copy reads bytes that this
      // same copy just wrote.
      for i in start..start + len {
        let byte = out[i];
        out.push(byte);
      }
    }
  }
}

/// Reads the header of a dynamic block, giving the block's two codes.
fn read_dynamic_trees(bi: &mut BitSource<'_>) -> PngResult<(LitLenAlphabet, DistAlphabet)> {
  let hlit = bi.next_bits_lsb(5)? as usize + 257;
  let hdist = bi.next_bits_lsb(5)? as usize + 1;
  let hclen = bi.next_bits_lsb(4)? as usize + 4;
  log::trace!("dynamic block: hlit {hlit}, hdist {hdist}, hclen {hclen}");
  let code_length_alphabet = CodeLengthAlphabet::read_from(bi, hclen)?;
  let mut lengths = vec![0_u8; hlit + hdist];
  code_length_alphabet.fill_a_tree(&mut lengths, bi)?;
  let (lit_len_lengths, dist_lengths) = lengths.split_at(hlit);
  Ok((
    LitLenAlphabet::from_code_lengths(lit_len_lengths)?,
    DistAlphabet::from_code_lengths(dist_lengths)?,
  ))
}

/// Decompresses DEFLATE blocks from `bi` until the final block ends.
///
/// Afterwards `bi` is positioned just past the final block, which is where a
/// zlib trailer would start (after aligning to a byte).
pub fn inflate_bits(bi: &mut BitSource<'_>, limit: usize) -> PngResult<Vec<u8>> {
  let mut out = Vec::new();
  loop {
    let bfinal = bi.get_bfinal()?;
    match bi.get_btype()? {
      0 => inflate_stored_block(bi, &mut out, limit)?,
      1 => {
        log::trace!("fixed huffman block");
        let fixed = fixed_trees();
        inflate_huffman_block(bi, &mut out, limit, &fixed.lit_len, &fixed.dist)?
      }
      2 => {
        let (lit_len, dist) = read_dynamic_trees(bi)?;
        inflate_huffman_block(bi, &mut out, limit, &lit_len, &dist)?
      }
      _ => return Err(PngError::InvalidBlockType),
    }
    if bfinal {
      return Ok(out);
    }
  }
}

/// Decompresses a raw DEFLATE stream.
#[inline]
pub fn inflate(deflate: &[u8]) -> PngResult<Vec<u8>> {
  inflate_with_limit(deflate, usize::MAX)
}

/// Decompresses a raw DEFLATE stream, failing with
/// [`ExcessImageData`](PngError::ExcessImageData) if the output would be more
/// than `limit` bytes.
#[inline]
pub fn inflate_with_limit(deflate: &[u8], limit: usize) -> PngResult<Vec<u8>> {
  inflate_bits(&mut BitSource::new(deflate), limit)
}

/// Decompresses a zlib stream (such as the joined `IDAT` data of a PNG).
///
/// * The two byte header is skipped, along with the dictionary id if the
///   header's `FDICT` flag is set. Preset dictionaries aren't supported, the
///   data is decoded as if there were none.
/// * The Adler32 trailer is read if present but never checked.
pub fn zlib_decompress(zlib: &[u8], limit: usize) -> PngResult<Vec<u8>> {
  let (cmf, flg, rest) = match zlib {
    [cmf, flg, rest @ ..] => (*cmf, *flg, rest),
    _ => return Err(PngError::UnexpectedEndOfStream),
  };
  if cmf & 0x0F != 8 || (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
    log::debug!("unusual zlib header {cmf:#04X} {flg:#04X}, decoding anyway");
  }
  let deflate = if flg & 0b0010_0000 != 0 {
    log::debug!("zlib preset dictionary flagged, decoding without it");
    rest.get(4..).ok_or(PngError::UnexpectedEndOfStream)?
  } else {
    rest
  };
  let mut bi = BitSource::new(deflate);
  let out = inflate_bits(&mut bi, limit)?;
  match bi.take_aligned_bytes(4) {
    Ok(adler) => log::trace!("adler32 {adler:02X?} (not checked)"),
    Err(_) => log::trace!("zlib stream has no adler32 trailer"),
  }
  Ok(out)
}

/// Packs bits the way a DEFLATE encoder does, for building test streams.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct TestBitWriter {
  bytes: Vec<u8>,
  bit_count: usize,
}
#[cfg(test)]
impl TestBitWriter {
  /// Pushes the low `count` bits of `value`, lowest first.
  pub fn push_lsb(&mut self, value: u32, count: u32) {
    for i in 0..count {
      self.push_bit((value >> i) & 1);
    }
  }
  /// Pushes a huffman code, highest bit first.
  pub fn push_code(&mut self, code: u32, count: u32) {
    for i in (0..count).rev() {
      self.push_bit((code >> i) & 1);
    }
  }
  fn push_bit(&mut self, bit: u32) {
    if self.bit_count % 8 == 0 {
      self.bytes.push(0);
    }
    if bit != 0 {
      *self.bytes.last_mut().unwrap() |= 1 << (self.bit_count % 8);
    }
    self.bit_count += 1;
  }
  /// Pads the final partial byte with zeros.
  pub fn finish(self) -> Vec<u8> {
    self.bytes
  }
}

#[test]
fn test_fixed_block_literals() {
  // "ABC" then end of block, all fixed codes.
  assert_eq!(inflate(&[0x73, 0x74, 0x72, 0x06, 0x00]).unwrap(), b"ABC");
}

#[test]
fn test_fixed_block_overlapping_back_reference() {
  // "AB", then length 4 at distance 2.
  assert_eq!(inflate(&[0x73, 0x74, 0x02, 0x41, 0x00]).unwrap(), b"ABABAB");
}

#[test]
fn test_writer_matches_hand_packed_stream() {
  let mut writer = TestBitWriter::default();
  writer.push_lsb(1, 1);
  writer.push_lsb(1, 2);
  writer.push_code(0x30 + u32::from(b'A'), 8);
  writer.push_code(0x30 + u32::from(b'B'), 8);
  writer.push_code(2, 7); // symbol 258, length 4
  writer.push_code(1, 5); // distance 2
  writer.push_code(0, 7);
  assert_eq!(writer.finish(), [0x73, 0x74, 0x02, 0x41, 0x00]);
}

#[test]
fn test_stored_blocks() {
  for n in [0_usize, 1, 7, 300, 65_535] {
    let data: Vec<u8> = (0..n).map(|i| (i * 7 + 3) as u8).collect();
    let mut stream = vec![0b001];
    stream.extend((n as u16).to_le_bytes());
    stream.extend((!(n as u16)).to_le_bytes());
    stream.extend(&data);
    assert_eq!(inflate(&stream).unwrap(), data, "n: {n}");
  }
}

#[test]
fn test_stored_block_after_fixed_block() {
  // a non-final fixed block holding "A", then a final stored block holding
  // "BC". The stored block starts mid-byte and has to skip to a boundary.
  let mut writer = TestBitWriter::default();
  writer.push_lsb(0, 1);
  writer.push_lsb(1, 2);
  writer.push_code(0x30 + u32::from(b'A'), 8);
  writer.push_code(0, 7);
  writer.push_lsb(1, 1);
  writer.push_lsb(0, 2);
  let mut stream = writer.finish();
  stream.extend([2, 0, 0xFD, 0xFF, b'B', b'C']);
  assert_eq!(inflate(&stream).unwrap(), b"ABC");
}

#[test]
fn test_dynamic_block() {
  // A hand built dynamic block. The literal/length code gives 2 bits each to
  // 'a', 'b', 256 and 257, the distance code is one 1-bit code for symbol 0.
  let mut writer = TestBitWriter::default();
  writer.push_lsb(1, 1); // final
  writer.push_lsb(2, 2); // dynamic
  writer.push_lsb(1, 5); // hlit = 257 + 1
  writer.push_lsb(0, 5); // hdist = 1 + 0
  writer.push_lsb(15, 4); // hclen = 4 + 15
  // code length code: symbols 0, 1, 2 and 18 get 2 bits each.
  // lengths in CODE_LENGTH_ORDER: 16 17 18 0 8 7 9 6 10 5 11 4 12 3 13 2 14 1 15
  for symbol in CODE_LENGTH_ORDER {
    let len = match symbol {
      0 | 1 | 2 | 18 => 2,
      _ => 0,
    };
    writer.push_lsb(len, 3);
  }
  // canonical codes for the code length code: 0=00, 1=01, 2=10, 18=11
  let cl_code = |w: &mut TestBitWriter, symbol: u32| {
    let code = match symbol {
      0 => 0b00,
      1 => 0b01,
      2 => 0b10,
      _ => 0b11,
    };
    w.push_code(code, 2);
  };
  // 97 zeros: 18 with 86 extra gives 97
  cl_code(&mut writer, 18);
  writer.push_lsb(86, 7);
  cl_code(&mut writer, 2); // 'a'
  cl_code(&mut writer, 2); // 'b'
  // 157 zeros up to 256: 18 with 127 is 138, then 18 with 8 is 19
  cl_code(&mut writer, 18);
  writer.push_lsb(127, 7);
  cl_code(&mut writer, 18);
  writer.push_lsb(8, 7);
  cl_code(&mut writer, 2); // 256
  cl_code(&mut writer, 2); // 257
  cl_code(&mut writer, 1); // distance symbol 0
  // lit/len codes: 'a'=00, 'b'=01, 256=10, 257=11. distance 0 = `0`.
  writer.push_code(0b00, 2);
  writer.push_code(0b01, 2);
  writer.push_code(0b11, 2); // length 3
  writer.push_code(0b0, 1); // distance 1
  writer.push_code(0b00, 2);
  writer.push_code(0b10, 2);
  assert_eq!(inflate(&writer.finish()).unwrap(), b"abbbba");
}

#[test]
fn test_empty_code_length_code() {
  // a final dynamic block where every code length code length is 0.
  assert_eq!(inflate(&[0b101, 0, 0, 0]), Err(PngError::BadCodeLengths));
  assert_eq!(zlib_decompress(&[0x78, 0x9C, 0b101, 0, 0, 0], usize::MAX), Err(PngError::BadCodeLengths));
}

#[test]
fn test_reserve_output_failure() {
  let mut out = Vec::new();
  assert_eq!(reserve_output(&mut out, 10, 9), Err(PngError::ExcessImageData));
  assert_eq!(reserve_output(&mut out, usize::MAX, usize::MAX), Err(PngError::AllocationFailed));
  assert_eq!(reserve_output(&mut out, 10, 10), Ok(()));
  assert!(out.capacity() >= 10);
}

#[test]
fn test_reserved_block_type() {
  // final, type 3
  assert_eq!(inflate(&[0b111]), Err(PngError::InvalidBlockType));
}

#[test]
fn test_truncated_stream() {
  assert_eq!(inflate(&[]), Err(PngError::UnexpectedEndOfStream));
  // "ABC" without the end of block.
  assert_eq!(inflate(&[0x73, 0x74, 0x72, 0x06]), Err(PngError::UnexpectedEndOfStream));
  // stored block claiming more bytes than exist.
  assert_eq!(inflate(&[0b001, 5, 0, 0xFA, 0xFF, 1, 2]), Err(PngError::UnexpectedEndOfStream));
}

#[test]
fn test_back_reference_before_start() {
  // length 3 at distance 1 with no output yet.
  let mut writer = TestBitWriter::default();
  writer.push_lsb(1, 1);
  writer.push_lsb(1, 2);
  writer.push_code(1, 7); // symbol 257
  writer.push_code(0, 5); // distance 1
  writer.push_code(0, 7);
  assert_eq!(inflate(&writer.finish()), Err(PngError::InvalidBackReference));
}

#[test]
fn test_output_limit() {
  let stream = [0x73, 0x74, 0x02, 0x41, 0x00];
  assert_eq!(inflate_with_limit(&stream, 6).unwrap(), b"ABABAB");
  assert_eq!(inflate_with_limit(&stream, 5), Err(PngError::ExcessImageData));
}

#[test]
fn test_zlib_wrapper() {
  // zlib header, "ABC" fixed block, adler32
  let zlib = [0x78, 0x9C, 0x73, 0x74, 0x72, 0x06, 0x00, 0x01, 0x8D, 0x00, 0xC7];
  assert_eq!(zlib_decompress(&zlib, usize::MAX).unwrap(), b"ABC");
  // the trailer isn't required
  assert_eq!(zlib_decompress(&zlib[..7], usize::MAX).unwrap(), b"ABC");
  // a wrong trailer isn't checked
  let mut bad_adler = zlib;
  bad_adler[10] ^= 0xFF;
  assert_eq!(zlib_decompress(&bad_adler, usize::MAX).unwrap(), b"ABC");
  // FDICT skips four more bytes
  let fdict = [0x78, 0xBB, 0, 0, 0, 1, 0x73, 0x74, 0x72, 0x06, 0x00];
  assert_eq!(zlib_decompress(&fdict, usize::MAX).unwrap(), b"ABC");
  assert_eq!(zlib_decompress(&[0x78], usize::MAX), Err(PngError::UnexpectedEndOfStream));
}

#[test]
fn test_fixed_trees_are_shared() {
  assert!(core::ptr::eq(fixed_trees(), fixed_trees()));
}
