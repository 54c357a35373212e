#![forbid(unsafe_code)]

//! Module for walking the chunks of PNG data.
//!
//! * [Portable Network Graphics Specification (Second Edition)][png-spec]
//!
//! [png-spec]: https://www.w3.org/TR/2003/REC-PNG-20031110/
//!
//! A PNG is an 8 byte signature followed by a series of chunks. Each chunk is
//! a big-endian `u32` length, a 4 byte type tag, that many bytes of data, and
//! a CRC. Only three chunk types matter to this crate:
//! * `IHDR` holds the image dimensions and pixel format.
//! * `IDAT` chunks hold the compressed image data. There can be more than one,
//!   and all of them together (in file order) form a single zlib stream.
//! * `IEND` marks the end of the image, anything after it is ignored.
//!
//! Everything else (including the CRC of each chunk) is skipped.

use core::fmt::{Debug, Write};

use super::*;

/// The first eight bytes of a PNG datastream should match these bytes.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
struct PngRawChunkType([u8; 4]);
#[allow(nonstandard_style)]
impl PngRawChunkType {
  pub const IHDR: Self = Self(*b"IHDR");
  pub const IDAT: Self = Self(*b"IDAT");
  pub const IEND: Self = Self(*b"IEND");
}
impl Debug for PngRawChunkType {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    for ch in self.0.iter().copied().map(|u| u as char) {
      f.write_char(ch)?;
    }
    Ok(())
  }
}

/// An unparsed chunk from a PNG.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PngRawChunk<'b> {
  type_: PngRawChunkType,
  data: &'b [u8],
  declared_crc: u32,
}
impl Debug for PngRawChunk<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PngRawChunk")
      .field("type_", &self.type_)
      .field("data", &(&self.data[..self.data.len().min(12)], self.data.len()))
      .field("declared_crc", &self.declared_crc)
      .finish()
  }
}
impl<'b> PngRawChunk<'b> {
  /// The four byte type tag.
  #[inline]
  #[must_use]
  pub const fn chunk_type(&self) -> [u8; 4] {
    self.type_.0
  }
  /// The chunk's data bytes.
  #[inline]
  #[must_use]
  pub const fn data(&self) -> &'b [u8] {
    self.data
  }
}

/// An iterator that produces successive raw chunks from PNG bytes.
///
/// This never panics, even on random data. If a chunk would run past the end
/// of the data the iterator just stops.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PngRawChunkIter<'b>(&'b [u8]);
impl<'b> PngRawChunkIter<'b> {
  /// Pass the full PNG bytes, it will remove the PNG signature automatically.
  ///
  /// The signature isn't checked, use [`is_png_header_correct`] for that.
  pub const fn new(bytes: &'b [u8]) -> Self {
    match bytes {
      [_, _, _, _, _, _, _, _, rest @ ..] => Self(rest),
      _ => Self(&[]),
    }
  }
}
impl<'b> Iterator for PngRawChunkIter<'b> {
  type Item = PngRawChunk<'b>;
  fn next(&mut self) -> Option<Self::Item> {
    let (len_bytes, rest) = split_off_array::<4>(self.0)?;
    let (type_bytes, rest) = split_off_array::<4>(rest)?;
    let chunk_len = u32::from_be_bytes(len_bytes) as usize;
    if rest.len() < chunk_len {
      self.0 = &[];
      return None;
    }
    let (data, rest) = rest.split_at(chunk_len);
    let Some((crc_bytes, rest)) = split_off_array::<4>(rest) else {
      self.0 = &[];
      return None;
    };
    self.0 = rest;
    Some(PngRawChunk {
      type_: PngRawChunkType(type_bytes),
      data,
      declared_crc: u32::from_be_bytes(crc_bytes),
    })
  }
}

#[inline]
fn split_off_array<const N: usize>(bytes: &[u8]) -> Option<([u8; N], &[u8])> {
  if bytes.len() >= N {
    let (head, tail) = bytes.split_at(N);
    Some((head.try_into().ok()?, tail))
  } else {
    None
  }
}

/// A parsed PNG chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(nonstandard_style)]
pub enum PngChunk<'b> {
  /// Image Header
  IHDR(IHDR),
  /// Image Data, still compressed.
  IDAT(&'b [u8]),
  /// Image End
  IEND,
}
impl<'b> TryFrom<PngRawChunk<'b>> for PngChunk<'b> {
  type Error = PngRawChunk<'b>;
  /// Ancillary chunks (and malformed headers) give back the raw chunk as the
  /// error.
  fn try_from(raw: PngRawChunk<'b>) -> Result<Self, Self::Error> {
    Ok(match raw.type_ {
      PngRawChunkType::IHDR => {
        // this can fail, so use `return` to avoid the outer Ok()
        return IHDR::try_from(raw.data).map(PngChunk::IHDR).map_err(|_| raw);
      }
      PngRawChunkType::IDAT => PngChunk::IDAT(raw.data),
      PngRawChunkType::IEND => PngChunk::IEND,
      _ => return Err(raw),
    })
  }
}

/// The types of color that PNG supports.
///
/// Only [`RGB`](PngColorType::RGB) and [`RGBA`](PngColorType::RGBA) can be
/// decoded by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PngColorType {
  /// Greyscale
  Y = 0,
  /// Red, Green, Blue
  RGB = 2,
  /// Index into a palette.
  Index = 3,
  /// Greyscale + Alpha
  YA = 4,
  /// Red, Green, Blue, Alpha
  RGBA = 6,
}
impl PngColorType {
  /// The number of channels in this type of color.
  pub const fn channel_count(self) -> usize {
    match self {
      Self::Y => 1,
      Self::RGB => 3,
      Self::Index => 1,
      Self::YA => 2,
      Self::RGBA => 4,
    }
  }
}
impl TryFrom<u8> for PngColorType {
  type Error = ();
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0 => PngColorType::Y,
      2 => PngColorType::RGB,
      3 => PngColorType::Index,
      4 => PngColorType::YA,
      6 => PngColorType::RGBA,
      _ => return Err(()),
    })
  }
}

/// Image Header
///
/// The fields are kept as they appear in the data, even when this crate can't
/// decode an image of that kind. [`check_supported`](IHDR::check_supported)
/// says if decoding can go ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IHDR {
  /// width in pixels
  pub width: u32,
  /// height in pixels
  pub height: u32,
  /// bits per channel
  pub bit_depth: u8,
  /// the color type code, see [`PngColorType`]
  pub color_type: u8,
  /// if the image data is stored interlaced.
  pub is_interlaced: bool,
}
impl TryFrom<&[u8]> for IHDR {
  type Error = ();
  fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
    match value {
      [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, _compression_method, _filter_method, interlace_method] => {
        Ok(Self {
          width: u32::from_be_bytes([*w0, *w1, *w2, *w3]),
          height: u32::from_be_bytes([*h0, *h1, *h2, *h3]),
          bit_depth: *bit_depth,
          color_type: *color_type,
          is_interlaced: *interlace_method != 0,
        })
      }
      _ => Err(()),
    }
  }
}
impl IHDR {
  /// Checks that this crate can decode the image, giving the color type.
  ///
  /// Failures here are all "soft": the header itself was fine.
  pub fn check_supported(&self, config: &DecodeConfig) -> PngResult<PngColorType> {
    if self.width == 0 || self.height == 0 {
      return Err(PngError::EmptyImage);
    }
    if self.width > config.max_dimension || self.height > config.max_dimension {
      return Err(PngError::ImageTooLarge);
    }
    if self.bit_depth != 8 {
      return Err(PngError::UnsupportedBitDepth);
    }
    let color_type = match PngColorType::try_from(self.color_type) {
      Ok(c @ (PngColorType::RGB | PngColorType::RGBA)) => c,
      _ => return Err(PngError::UnsupportedColorType),
    };
    if self.is_interlaced {
      return Err(PngError::Interlaced);
    }
    Ok(color_type)
  }

  /// Bytes per pixel, which is also the distance filters look back within a
  /// line.
  ///
  /// Only meaningful for supported (8-bit) headers.
  pub fn bytes_per_pixel(&self) -> PngResult<usize> {
    match PngColorType::try_from(self.color_type) {
      Ok(c @ (PngColorType::RGB | PngColorType::RGBA)) => Ok(c.channel_count()),
      _ => Err(PngError::UnsupportedColorType),
    }
  }

  /// Each line of decompressed data is a filter byte plus the pixel bytes.
  pub fn bytes_per_filterline(&self) -> PngResult<usize> {
    let bpp = self.bytes_per_pixel()?;
    Ok((self.width as usize).saturating_mul(bpp).saturating_add(1))
  }

  /// Gets the number of bytes the zlib stream must decompress to.
  pub fn get_zlib_decompression_requirement(&self) -> PngResult<usize> {
    Ok(self.bytes_per_filterline()?.saturating_mul(self.height as usize))
  }
}

/// Checks if the PNG's initial 8 bytes are correct.
///
/// * If this is the case, the rest of the bytes are very likely PNG data.
/// * If this is *not* the case, the rest of the bytes are very likely *not* PNG
///   data.
pub const fn is_png_header_correct(bytes: &[u8]) -> bool {
  matches!(bytes, [137, 80, 78, 71, 13, 10, 26, 10, ..])
}

/// Iterates the parsed chunks up to (not including) `IEND`.
fn chunks_until_end(bytes: &[u8]) -> impl Iterator<Item = PngChunk<'_>> {
  PngRawChunkIter::new(bytes)
    .filter_map(|raw_chunk| PngChunk::try_from(raw_chunk).ok())
    .take_while(|chunk| !matches!(chunk, PngChunk::IEND))
}

/// Gets the [IHDR] out of the PNG bytes.
pub fn png_get_header(bytes: &[u8]) -> PngResult<IHDR> {
  if !is_png_header_correct(bytes) {
    return Err(PngError::NotAPng);
  }
  chunks_until_end(bytes)
    .find_map(|chunk| match chunk {
      PngChunk::IHDR(ihdr) => Some(ihdr),
      _ => None,
    })
    .ok_or(PngError::MissingHeader)
}

#[inline]
fn append_idat(idat: &mut Vec<u8>, data: &[u8]) -> PngResult<()> {
  idat.try_reserve(data.len()).map_err(|_| PngError::AllocationFailed)?;
  idat.extend_from_slice(data);
  Ok(())
}

/// Joins all the [IDAT](PngChunk::IDAT) data in the PNG bytes, in file order.
pub fn png_get_idat(bytes: &[u8]) -> PngResult<Vec<u8>> {
  let mut idat = Vec::new();
  for chunk in chunks_until_end(bytes) {
    if let PngChunk::IDAT(data) = chunk {
      append_idat(&mut idat, data)?;
    }
  }
  Ok(idat)
}

/// The parts of a PNG that decoding needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPng {
  /// The first image header found.
  pub header: IHDR,
  /// All image data chunks joined together.
  pub idat: Vec<u8>,
}

/// Makes a single pass over the chunks, collecting the header and the image
/// data.
///
/// ## Failure
/// * [`NotAPng`](PngError::NotAPng) if the signature is wrong.
/// * [`MissingHeader`](PngError::MissingHeader) if there's no valid `IHDR`
///   before `IEND` (or the end of the data).
pub fn scan_png(bytes: &[u8]) -> PngResult<ScannedPng> {
  if !is_png_header_correct(bytes) {
    return Err(PngError::NotAPng);
  }
  let mut header = None;
  let mut idat = Vec::new();
  let mut idat_count = 0_usize;
  for chunk in chunks_until_end(bytes) {
    match chunk {
      PngChunk::IHDR(ihdr) if header.is_none() => {
        log::debug!("png header: {ihdr:?}");
        header = Some(ihdr);
      }
      PngChunk::IDAT(data) => {
        append_idat(&mut idat, data)?;
        idat_count += 1;
      }
      _ => (),
    }
  }
  let header = header.ok_or(PngError::MissingHeader)?;
  log::debug!("png image data: {idat_count} chunks, {} bytes", idat.len());
  Ok(ScannedPng { header, idat })
}

#[cfg(test)]
pub(crate) fn test_png_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
  out.extend((data.len() as u32).to_be_bytes());
  out.extend(chunk_type);
  out.extend(data);
  // never checked
  out.extend([0; 4]);
}

#[cfg(test)]
pub(crate) fn test_ihdr_data(width: u32, height: u32, bit_depth: u8, color_type: u8) -> Vec<u8> {
  let mut data = Vec::new();
  data.extend(width.to_be_bytes());
  data.extend(height.to_be_bytes());
  data.extend([bit_depth, color_type, 0, 0, 0]);
  data
}

#[test]
fn test_signature_check() {
  let mut bytes = PNG_SIGNATURE.to_vec();
  test_png_chunk(&mut bytes, b"IHDR", &test_ihdr_data(1, 1, 8, 6));
  assert!(is_png_header_correct(&bytes));
  assert!(png_get_header(&bytes).is_ok());
  for i in 0..8 {
    let mut wrong = bytes.clone();
    wrong[i] ^= 0x01;
    assert!(!is_png_header_correct(&wrong));
    assert_eq!(png_get_header(&wrong), Err(PngError::NotAPng));
    assert_eq!(scan_png(&wrong), Err(PngError::NotAPng));
  }
  assert_eq!(scan_png(&PNG_SIGNATURE[..7]), Err(PngError::NotAPng));
}

#[test]
fn test_scan_joins_idat_and_stops_at_iend() {
  let mut bytes = PNG_SIGNATURE.to_vec();
  test_png_chunk(&mut bytes, b"IHDR", &test_ihdr_data(3, 2, 8, 2));
  test_png_chunk(&mut bytes, b"IDAT", &[1, 2, 3]);
  test_png_chunk(&mut bytes, b"tEXt", b"Comment\0hello");
  test_png_chunk(&mut bytes, b"IDAT", &[]);
  test_png_chunk(&mut bytes, b"IDAT", &[4, 5]);
  test_png_chunk(&mut bytes, b"IEND", &[]);
  test_png_chunk(&mut bytes, b"IDAT", &[6, 7]);
  let scanned = scan_png(&bytes).unwrap();
  assert_eq!(
    scanned.header,
    IHDR { width: 3, height: 2, bit_depth: 8, color_type: 2, is_interlaced: false }
  );
  assert_eq!(scanned.idat, [1, 2, 3, 4, 5]);
  assert_eq!(png_get_idat(&bytes), Ok(vec![1, 2, 3, 4, 5]));
}

#[test]
fn test_missing_header() {
  let mut bytes = PNG_SIGNATURE.to_vec();
  test_png_chunk(&mut bytes, b"IDAT", &[1, 2, 3]);
  // a header that's the wrong size doesn't count
  test_png_chunk(&mut bytes, b"IHDR", &[0; 12]);
  test_png_chunk(&mut bytes, b"IEND", &[]);
  test_png_chunk(&mut bytes, b"IHDR", &test_ihdr_data(1, 1, 8, 6));
  assert_eq!(scan_png(&bytes), Err(PngError::MissingHeader));
  assert_eq!(png_get_header(&bytes), Err(PngError::MissingHeader));
}

#[test]
fn test_truncated_chunk_ends_the_walk() {
  let mut bytes = PNG_SIGNATURE.to_vec();
  test_png_chunk(&mut bytes, b"IHDR", &test_ihdr_data(1, 1, 8, 6));
  test_png_chunk(&mut bytes, b"IDAT", &[9; 10]);
  bytes.truncate(bytes.len() - 6);
  let chunks: Vec<PngRawChunk<'_>> = PngRawChunkIter::new(&bytes).collect();
  assert_eq!(chunks.len(), 1);
  assert_eq!(&chunks[0].chunk_type(), b"IHDR");
  assert_eq!(scan_png(&bytes).unwrap().idat, Vec::<u8>::new());
}

#[test]
fn test_check_supported() {
  let config = DecodeConfig::default();
  let check = |w, h, depth, color| {
    IHDR { width: w, height: h, bit_depth: depth, color_type: color, is_interlaced: false }
      .check_supported(&config)
  };
  assert_eq!(check(2, 2, 8, 2), Ok(PngColorType::RGB));
  assert_eq!(check(1024, 1024, 8, 6), Ok(PngColorType::RGBA));
  assert_eq!(check(2000, 2000, 8, 2), Err(PngError::ImageTooLarge));
  assert_eq!(check(1025, 1, 8, 2), Err(PngError::ImageTooLarge));
  assert_eq!(check(0, 5, 8, 2), Err(PngError::EmptyImage));
  assert_eq!(check(4, 4, 16, 2), Err(PngError::UnsupportedBitDepth));
  assert_eq!(check(4, 4, 8, 3), Err(PngError::UnsupportedColorType));
  assert_eq!(check(4, 4, 8, 0), Err(PngError::UnsupportedColorType));
  assert_eq!(check(4, 4, 8, 5), Err(PngError::UnsupportedColorType));
  let interlaced =
    IHDR { width: 4, height: 4, bit_depth: 8, color_type: 6, is_interlaced: true };
  assert_eq!(interlaced.check_supported(&config), Err(PngError::Interlaced));
}

#[test]
fn test_decompression_requirement() {
  let rgb = IHDR { width: 5, height: 3, bit_depth: 8, color_type: 2, is_interlaced: false };
  assert_eq!(rgb.get_zlib_decompression_requirement(), Ok((1 + 5 * 3) * 3));
  let rgba = IHDR { color_type: 6, ..rgb };
  assert_eq!(rgba.get_zlib_decompression_requirement(), Ok((1 + 5 * 4) * 3));
}
