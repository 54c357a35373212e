//! Module for the output pixel format.

use bytemuck::{Pod, Zeroable};

use super::*;

/// Red/Green/Blue/Alpha, u8 per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct RGBA8888 {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
}
impl RGBA8888 {
  /// An opaque pixel.
  #[inline]
  #[must_use]
  pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b, a: 255 }
  }
}
impl From<[u8; 3]> for RGBA8888 {
  #[inline]
  fn from([r, g, b]: [u8; 3]) -> Self {
    Self::opaque(r, g, b)
  }
}
impl From<[u8; 4]> for RGBA8888 {
  #[inline]
  fn from([r, g, b, a]: [u8; 4]) -> Self {
    Self { r, g, b, a }
  }
}

/// Expands reconstructed scanlines into a tightly packed RGBA8 buffer.
///
/// `reconstructed` is the output of [`reconstruct_in_place`], filter bytes
/// still included (they're skipped), and must be exactly the size the header
/// calls for. RGB pixels get an alpha of 255. The output
/// is `width * height * 4` bytes, top row first.
pub fn expand_to_rgba8(reconstructed: &[u8], header: &IHDR) -> PngResult<Vec<u8>> {
  let bpp = header.bytes_per_pixel()?;
  let bytes_per_filterline = header.bytes_per_filterline()?;
  let required = header.get_zlib_decompression_requirement()?;
  check_image_data_len(reconstructed.len(), required)?;

  let pixel_count = (header.width as usize).saturating_mul(header.height as usize);
  let mut out = Vec::new();
  out.try_reserve_exact(pixel_count.saturating_mul(4)).map_err(|_| PngError::AllocationFailed)?;
  for line in reconstructed.chunks_exact(bytes_per_filterline) {
    for channels in line[1..].chunks_exact(bpp) {
      let pixel = match channels {
        &[r, g, b] => RGBA8888::from([r, g, b]),
        &[r, g, b, a] => RGBA8888::from([r, g, b, a]),
        _ => return Err(PngError::UnsupportedColorType),
      };
      out.extend_from_slice(bytemuck::bytes_of(&pixel));
    }
  }
  Ok(out)
}

#[test]
fn test_rgba8888_layout() {
  assert_eq!(core::mem::size_of::<RGBA8888>(), 4);
  let pixel = RGBA8888 { r: 1, g: 2, b: 3, a: 4 };
  assert_eq!(bytemuck::bytes_of(&pixel), &[1, 2, 3, 4]);
}

#[test]
fn test_expand_rgb_adds_alpha() {
  let header = IHDR { width: 2, height: 2, bit_depth: 8, color_type: 2, is_interlaced: false };
  #[rustfmt::skip]
  let lines = [
    0, 1, 2, 3, 4, 5, 6,
    0, 7, 8, 9, 10, 11, 12,
  ];
  let rgba = expand_to_rgba8(&lines, &header).unwrap();
  #[rustfmt::skip]
  assert_eq!(rgba, [
    1, 2, 3, 255, 4, 5, 6, 255,
    7, 8, 9, 255, 10, 11, 12, 255,
  ]);
}

#[test]
fn test_expand_rgba_is_a_copy() {
  let header = IHDR { width: 1, height: 2, bit_depth: 8, color_type: 6, is_interlaced: false };
  let lines = [0, 1, 2, 3, 4, 0, 5, 6, 7, 0];
  let rgba = expand_to_rgba8(&lines, &header).unwrap();
  assert_eq!(rgba, [1, 2, 3, 4, 5, 6, 7, 0]);
  assert_eq!(expand_to_rgba8(&lines[..9], &header), Err(PngError::TruncatedIdat));
  let mut long = lines.to_vec();
  long.push(0);
  assert_eq!(expand_to_rgba8(&long, &header), Err(PngError::ExcessImageData));
}
