#![forbid(unsafe_code)]

//! Provides the decoded image type and the decoding entry points.

use super::*;

/// Converts an `(x,y)` position within a given `width` 2D space into a linear
/// pixel index.
#[inline]
#[must_use]
pub const fn xy_width_to_index(x: u32, y: u32, width: u32) -> usize {
  (y as usize) * (width as usize) + (x as usize)
}

/// Settings for a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodeConfig {
  /// Images wider or taller than this are rejected with
  /// [`ImageTooLarge`](PngError::ImageTooLarge).
  pub max_dimension: u32,
}
impl Default for DecodeConfig {
  #[inline]
  fn default() -> Self {
    Self { max_dimension: 1024 }
  }
}

/// An RGBA8 image, row-major, top row first.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub struct RgbaImage {
  pub width: u32,
  pub height: u32,
  /// `width * height * 4` bytes.
  pub pixels: Vec<u8>,
}
impl RgbaImage {
  /// Views the pixel bytes as pixels.
  #[inline]
  #[must_use]
  pub fn pixels_rgba8888(&self) -> &[RGBA8888] {
    bytemuck::cast_slice(&self.pixels)
  }

  /// Gets the pixel at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get(&self, x: u32, y: u32) -> Option<RGBA8888> {
    if x < self.width && y < self.height {
      let i = xy_width_to_index(x, y, self.width);
      self.pixels_rgba8888().get(i).copied()
    } else {
      None
    }
  }

  /// Decodes PNG bytes, or gives `None` for any failure.
  ///
  /// The failure is logged at the `warn` level.
  #[must_use]
  pub fn try_from_png_bytes(bytes: &[u8]) -> Option<Self> {
    match decode_png(bytes) {
      Ok(image) => Some(image),
      Err(e) => {
        log::warn!("png decode failed: {e}");
        None
      }
    }
  }
}

/// Decodes PNG bytes with the default [`DecodeConfig`].
pub fn decode_png(bytes: &[u8]) -> PngResult<RgbaImage> {
  decode_png_with(bytes, &DecodeConfig::default())
}

/// Decodes PNG bytes into an [`RgbaImage`].
///
/// Either the whole image decodes or an error is returned, there's never a
/// partial image.
pub fn decode_png_with(bytes: &[u8], config: &DecodeConfig) -> PngResult<RgbaImage> {
  let ScannedPng { header, idat } = scan_png(bytes)?;
  header.check_supported(config)?;
  decode_scanned(&header, &idat)
}

fn decode_scanned(header: &IHDR, idat: &[u8]) -> PngResult<RgbaImage> {
  let required = header.get_zlib_decompression_requirement()?;
  let mut filtered = zlib_decompress(idat, required)?;
  check_image_data_len(filtered.len(), required).map_err(|e| {
    log::debug!("image data inflated to {} bytes, {required} needed", filtered.len());
    e
  })?;
  reconstruct_in_place(&mut filtered, header)?;
  let pixels = expand_to_rgba8(&filtered, header)?;
  Ok(RgbaImage { width: header.width, height: header.height, pixels })
}

/// The outcome of decoding a preview image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PngPreview {
  /// The image decoded.
  Decoded(RgbaImage),
  /// The PNG is fine, but it's not a kind of image that's decoded.
  ///
  /// The dimensions still come from the header, so a caller can reserve space
  /// for an image it can't show.
  Unsupported {
    /// width in pixels
    width: u32,
    /// height in pixels
    height: u32,
    /// why the image wasn't decoded, see [`PngError::is_unsupported`]
    reason: PngError,
  },
}

/// Decodes PNG bytes, separating images that can't be decoded from data that's
/// broken.
///
/// Soft failures (unsupported formats, size limits) give
/// [`PngPreview::Unsupported`]. Anything else is an `Err`.
pub fn decode_png_preview(bytes: &[u8], config: &DecodeConfig) -> PngResult<PngPreview> {
  let ScannedPng { header, idat } = scan_png(bytes)?;
  match header.check_supported(config) {
    Ok(_) => decode_scanned(&header, &idat).map(PngPreview::Decoded),
    Err(reason) if reason.is_unsupported() => {
      log::debug!("png preview not decoded: {reason}");
      Ok(PngPreview::Unsupported { width: header.width, height: header.height, reason })
    }
    Err(e) => Err(e),
  }
}

#[cfg(test)]
fn test_png(ihdr: &[u8], idat: &[u8]) -> Vec<u8> {
  let mut bytes = PNG_SIGNATURE.to_vec();
  test_png_chunk(&mut bytes, b"IHDR", ihdr);
  test_png_chunk(&mut bytes, b"IDAT", idat);
  test_png_chunk(&mut bytes, b"IEND", &[]);
  bytes
}

/// Wraps bytes as a zlib stream of a single stored block.
#[cfg(test)]
fn test_stored_zlib(data: &[u8]) -> Vec<u8> {
  let len = data.len() as u16;
  let mut out = vec![0x78, 0x01, 0b001];
  out.extend(len.to_le_bytes());
  out.extend((!len).to_le_bytes());
  out.extend(data);
  // adler32, never checked
  out.extend([0; 4]);
  out
}

#[test]
fn test_not_a_png() {
  assert_eq!(decode_png(b"GIF89a, not a png at all"), Err(PngError::NotAPng));
  assert_eq!(decode_png(&[]), Err(PngError::NotAPng));
  assert_eq!(RgbaImage::try_from_png_bytes(b"\x89PNG"), None);
}

#[test]
fn test_small_rgb_image() {
  #[rustfmt::skip]
  let lines = [
    0, 255, 0, 0, 0, 255, 0,
    0, 0, 0, 255, 9, 8, 7,
  ];
  let png = test_png(&test_ihdr_data(2, 2, 8, 2), &test_stored_zlib(&lines));
  let image = decode_png(&png).unwrap();
  assert_eq!((image.width, image.height), (2, 2));
  #[rustfmt::skip]
  assert_eq!(image.pixels, [
    255, 0, 0, 255, 0, 255, 0, 255,
    0, 0, 255, 255, 9, 8, 7, 255,
  ]);
  assert_eq!(image.get(1, 1), Some(RGBA8888 { r: 9, g: 8, b: 7, a: 255 }));
  assert_eq!(image.get(2, 0), None);
  assert_eq!(image.get(0, 2), None);
  assert_eq!(RgbaImage::try_from_png_bytes(&png), Some(image));
}

#[test]
fn test_single_rgba_pixel() {
  let png = test_png(&test_ihdr_data(1, 1, 8, 6), &test_stored_zlib(&[0, 10, 20, 30, 40]));
  let image = decode_png(&png).unwrap();
  assert_eq!(image.pixels, [10, 20, 30, 40]);
  assert_eq!(image.pixels_rgba8888(), &[RGBA8888 { r: 10, g: 20, b: 30, a: 40 }]);
}

#[test]
fn test_soft_failures() {
  let idat = test_stored_zlib(&[0, 1, 2, 3]);
  let palette = test_png(&test_ihdr_data(1, 1, 8, 3), &idat);
  assert_eq!(decode_png(&palette), Err(PngError::UnsupportedColorType));
  let deep = test_png(&test_ihdr_data(1, 1, 16, 2), &idat);
  assert_eq!(decode_png(&deep), Err(PngError::UnsupportedBitDepth));
  let huge = test_png(&test_ihdr_data(2000, 2000, 8, 2), &idat);
  assert_eq!(decode_png(&huge), Err(PngError::ImageTooLarge));
  assert_eq!(
    decode_png_preview(&huge, &DecodeConfig::default()),
    Ok(PngPreview::Unsupported { width: 2000, height: 2000, reason: PngError::ImageTooLarge })
  );
  // a larger limit lets the same header through to the data, which is short.
  let config = DecodeConfig { max_dimension: 4096 };
  assert_eq!(decode_png_with(&huge, &config), Err(PngError::TruncatedIdat));
  assert_eq!(decode_png_preview(&huge, &config), Err(PngError::TruncatedIdat));
}

#[test]
fn test_image_data_size_mismatch() {
  let ihdr = test_ihdr_data(1, 2, 8, 2);
  let short = test_png(&ihdr, &test_stored_zlib(&[0, 1, 2, 3]));
  assert_eq!(decode_png(&short), Err(PngError::TruncatedIdat));
  let long = test_png(&ihdr, &test_stored_zlib(&[0, 1, 2, 3, 0, 4, 5, 6, 0]));
  assert_eq!(decode_png(&long), Err(PngError::ExcessImageData));
  let exact = test_png(&ihdr, &test_stored_zlib(&[0, 1, 2, 3, 0, 4, 5, 6]));
  assert_eq!(decode_png(&exact).unwrap().pixels, [1, 2, 3, 255, 4, 5, 6, 255]);
}

#[test]
fn test_preview_decodes() {
  let png = test_png(&test_ihdr_data(1, 1, 8, 2), &test_stored_zlib(&[0, 1, 2, 3]));
  let preview = decode_png_preview(&png, &DecodeConfig::default()).unwrap();
  assert_eq!(
    preview,
    PngPreview::Decoded(RgbaImage { width: 1, height: 1, pixels: vec![1, 2, 3, 255] })
  );
}
