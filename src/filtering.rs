//! From the PNG spec:
//!
//! > Filters are applied to **bytes**, not to pixels, regardless of the bit
//! > depth or color type of the image.
//!
//! Since only 8-bit images are decoded, "the byte to the left" is always the
//! same channel of the pixel to the left, `bpp` bytes back.

use super::*;

/// Undoes the scanline filters of the decompressed image data, in place.
///
/// `filtered` is `height` lines of one filter byte then `width * bpp` channel
/// bytes. Afterwards each line holds the true channel bytes and each filter
/// byte is set to 0 (None), so running this again changes nothing.
///
/// ## Failure
/// * [`TruncatedIdat`](PngError::TruncatedIdat) if there's not enough data for
///   every line.
/// * [`ExcessImageData`](PngError::ExcessImageData) if there's data past the
///   final line.
/// * [`IllegalFilterType`](PngError::IllegalFilterType) if a filter byte isn't
///   0 through 4.
pub fn reconstruct_in_place(filtered: &mut [u8], header: &IHDR) -> PngResult<()> {
  let bpp = header.bytes_per_pixel()?;
  let bytes_per_filterline = header.bytes_per_filterline()?;
  let required = header.get_zlib_decompression_requirement()?;
  check_image_data_len(filtered.len(), required)?;

  let mut previous_pixel_line_data: &[u8] = &[];
  for scanline in filtered.chunks_exact_mut(bytes_per_filterline) {
    let Some((filter_byte, pixel_line_data)) = scanline.split_first_mut() else {
      continue;
    };
    let reconstruct: fn(u8, u8, u8, u8) -> u8 = match *filter_byte {
      0 => |fx, _, _, _| fx,
      1 => |fx, ra, _, _| reconstruct_sub(fx, ra),
      2 => |fx, _, rb, _| reconstruct_up(fx, rb),
      3 => |fx, ra, rb, _| reconstruct_average(fx, ra, rb),
      4 => reconstruct_paeth,
      other => {
        log::trace!("illegal filter type: {other}");
        return Err(PngError::IllegalFilterType);
      }
    };
    if *filter_byte != 0 {
      // neighbors off the left or top edge of the image count as 0.
      for i in 0..pixel_line_data.len() {
        let ra = if i >= bpp { pixel_line_data[i - bpp] } else { 0 };
        let rb = previous_pixel_line_data.get(i).copied().unwrap_or(0);
        let rc = if i >= bpp { previous_pixel_line_data.get(i - bpp).copied().unwrap_or(0) } else { 0 };
        pixel_line_data[i] = reconstruct(pixel_line_data[i], ra, rb, rc);
      }
      *filter_byte = 0;
    }
    previous_pixel_line_data = pixel_line_data;
  }
  Ok(())
}

/// The image data must be exactly as long as the header says.
#[inline]
pub(crate) fn check_image_data_len(len: usize, required: usize) -> PngResult<()> {
  match len.cmp(&required) {
    core::cmp::Ordering::Less => Err(PngError::TruncatedIdat),
    core::cmp::Ordering::Equal => Ok(()),
    core::cmp::Ordering::Greater => Err(PngError::ExcessImageData),
  }
}

/// Reconstruct Filter Type 1
///
/// * `fx` filtered X
/// * `ra` reconstructed `a`: the corresponding byte from the pixel to the left
///   of this pixel (0 for the leftmost pixel)
#[inline]
#[must_use]
pub const fn reconstruct_sub(fx: u8, ra: u8) -> u8 {
  fx.wrapping_add(ra)
}

/// Reconstruct Filter Type 2
///
/// * `fx` filtered X
/// * `rb` reconstructed `b`: The byte corresponding to this byte within the
///   previous scanline.
#[inline]
#[must_use]
pub const fn reconstruct_up(fx: u8, rb: u8) -> u8 {
  fx.wrapping_add(rb)
}

/// Reconstruct Filter Type 3
///
/// * `fx` filtered X
/// * `ra` reconstructed `a`
/// * `rb` reconstructed `b`
///
/// The average is taken without overflow, then floored.
#[inline]
#[must_use]
pub const fn reconstruct_average(fx: u8, ra: u8, rb: u8) -> u8 {
  fx.wrapping_add(((ra as u16 + rb as u16) / 2) as u8)
}

/// Reconstruct Filter Type 4
///
/// * `fx` filtered X
/// * `ra` reconstructed `a`
/// * `rb` reconstructed `b`
/// * `rc` reconstructed `c`: the byte corresponding to `ra` within the previous
///   scanline.
#[inline]
#[must_use]
pub const fn reconstruct_paeth(fx: u8, ra: u8, rb: u8, rc: u8) -> u8 {
  fx.wrapping_add(paeth_predictor(ra, rb, rc))
}

/// The Paeth filter function computes a simple linear function of the three
/// neighboring pixels (left `a`, above `b`, upper left `c`).
///
/// The output is the "predictor" of the neighboring pixel closest to the
/// computed value. Ties go to `a`, then `b`, then `c`.
///
/// If any neighboring pixel isn't present because this is the top or left edge
/// of the image just substitute 0 in that postition.
#[must_use]
pub const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
  // Note: "The calculations within the PaethPredictor function shall be
  // performed exactly, without overflow." i32 is wide enough for any u8 input.
  let a = a as i32;
  let b = b as i32;
  let c = c as i32;
  let p = a + b - c;
  let pa = (p - a).abs();
  let pb = (p - b).abs();
  let pc = (p - c).abs();
  if pa <= pb && pa <= pc {
    a as u8
  } else if pb <= pc {
    b as u8
  } else {
    c as u8
  }
}

#[cfg(test)]
fn test_header(width: u32, height: u32, color_type: u8) -> IHDR {
  IHDR { width, height, bit_depth: 8, color_type, is_interlaced: false }
}

#[test]
fn test_paeth_predictor() {
  // all zero on the top left corner
  assert_eq!(paeth_predictor(0, 0, 0), 0);
  // top row: only `a` exists, p = a
  assert_eq!(paeth_predictor(37, 0, 0), 37);
  // left column: only `b` exists, p = b
  assert_eq!(paeth_predictor(0, 37, 0), 37);
  // a tie between all three goes to a
  assert_eq!(paeth_predictor(9, 9, 9), 9);
  // pa = 10, pb = 0, pc = 10
  assert_eq!(paeth_predictor(10, 20, 10), 20);
  // p = 150, pa = 50, pb = 50, pc = 0
  assert_eq!(paeth_predictor(100, 200, 150), 150);
  // p = 0, pa = 100, pb = 100, pc = 200
  assert_eq!(paeth_predictor(100, 100, 200), 100);
  // p = 255 + 255 - 0 = 510 can't overflow
  assert_eq!(paeth_predictor(255, 255, 0), 255);
  // p = 10, pa = 6, pb = 4, pc = 10
  assert_eq!(paeth_predictor(4, 6, 0), 6);
}

#[test]
fn test_average_does_not_overflow() {
  assert_eq!(reconstruct_average(0, 200, 200), 200);
  assert_eq!(reconstruct_average(0, 255, 1), 128);
  assert_eq!(reconstruct_average(1, 3, 0), 2);
  assert_eq!(reconstruct_average(250, 255, 255), 249);
}

#[test]
fn test_sub_then_paeth() {
  let header = test_header(2, 2, 2);
  #[rustfmt::skip]
  let mut data = [
    1, 10, 20, 30, 5, 5, 5,
    4, 1, 1, 1, 1, 1, 1,
  ];
  reconstruct_in_place(&mut data, &header).unwrap();
  #[rustfmt::skip]
  let expected = [
    0, 10, 20, 30, 15, 25, 35,
    0, 11, 21, 31, 16, 26, 36,
  ];
  assert_eq!(data, expected);
}

#[test]
fn test_up_and_average() {
  let header = test_header(2, 3, 6);
  #[rustfmt::skip]
  let mut data = [
    2, 7, 8, 9, 10, 11, 12, 13, 14,
    0, 200, 200, 0, 255, 250, 100, 4, 1,
    3, 0, 0, 0, 0, 0, 0, 0, 0,
  ];
  reconstruct_in_place(&mut data, &header).unwrap();
  #[rustfmt::skip]
  let expected = [
    // up on the first line has nothing above it
    0, 7, 8, 9, 10, 11, 12, 13, 14,
    0, 200, 200, 0, 255, 250, 100, 4, 1,
    // 200/2, 200/2, 0/2, 255/2, then (100+250)/2, (100+100)/2, (0+4)/2, (127+1)/2
    0, 100, 100, 0, 127, 175, 100, 2, 64,
  ];
  assert_eq!(data, expected);

  // the result is already reconstructed, so doing it again is a no-op.
  reconstruct_in_place(&mut data, &header).unwrap();
  assert_eq!(data, expected);
}

#[test]
fn test_bad_filter_data() {
  let header = test_header(1, 2, 2);
  let mut data = [0, 1, 2, 3, 5, 1, 2, 3];
  assert_eq!(reconstruct_in_place(&mut data, &header), Err(PngError::IllegalFilterType));

  let mut data = [0, 1, 2, 3, 0, 1, 2];
  assert_eq!(reconstruct_in_place(&mut data, &header), Err(PngError::TruncatedIdat));

  // extra bytes past the last line are rejected, untouched.
  let mut data = [1, 1, 2, 3, 2, 1, 1, 1, 99];
  assert_eq!(reconstruct_in_place(&mut data, &header), Err(PngError::ExcessImageData));
  assert_eq!(data, [1, 1, 2, 3, 2, 1, 1, 1, 99]);

  let mut data = [1, 1, 2, 3, 2, 1, 1, 1];
  assert_eq!(reconstruct_in_place(&mut data, &header), Ok(()));
  assert_eq!(data, [0, 1, 2, 3, 0, 2, 3, 4]);
}
