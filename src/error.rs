/// An error from the `pngpeek` crate.
///
/// Every stage of decoding reports failure through this type, nothing in the
/// crate panics on bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PngError {
  /// The first eight bytes aren't the PNG signature.
  #[error("data does not start with the PNG signature")]
  NotAPng,

  /// No usable `IHDR` chunk was found.
  #[error("no image header chunk found")]
  MissingHeader,

  /// Only RGB and RGBA images are decoded.
  #[error("unsupported color type")]
  UnsupportedColorType,

  /// Only 8 bits per channel are decoded.
  #[error("unsupported bit depth")]
  UnsupportedBitDepth,

  /// Adam7 interlaced data isn't decoded.
  #[error("interlaced images are not supported")]
  Interlaced,

  /// The declared width and/or height of this image is 0.
  #[error("image width or height is zero")]
  EmptyImage,

  /// The image is wider or taller than the configured limit.
  #[error("image dimensions exceed the decode limit")]
  ImageTooLarge,

  /// The bit stream ended while more bits were required.
  #[error("unexpected end of compressed stream")]
  UnexpectedEndOfStream,

  /// The bits read don't lead to any symbol of the active prefix code.
  #[error("invalid huffman code")]
  InvalidHuffmanCode,

  /// A set of code lengths doesn't describe a usable prefix code.
  #[error("bad huffman code lengths")]
  BadCodeLengths,

  /// The reserved block type 3 was found.
  #[error("invalid deflate block type")]
  InvalidBlockType,

  /// A back reference points before the start of the output.
  #[error("back reference distance exceeds output")]
  InvalidBackReference,

  /// The decompressed data would be larger than the image needs.
  #[error("more image data than the header declares")]
  ExcessImageData,

  /// The decompressed data is smaller than the image needs.
  #[error("image data is truncated")]
  TruncatedIdat,

  /// Memory for the image data couldn't be allocated.
  #[error("allocation failed")]
  AllocationFailed,

  /// A scanline started with a filter type above 4.
  #[error("illegal scanline filter type")]
  IllegalFilterType,
}

impl PngError {
  /// If this error means "valid PNG, just not one we decode".
  ///
  /// These are the cases where the header was read fine and the caller can
  /// still learn the image dimensions.
  #[inline]
  #[must_use]
  pub const fn is_unsupported(self) -> bool {
    matches!(
      self,
      Self::UnsupportedColorType
        | Self::UnsupportedBitDepth
        | Self::Interlaced
        | Self::EmptyImage
        | Self::ImageTooLarge
    )
  }
}

/// Shorthand for results within this crate.
pub type PngResult<T> = Result<T, PngError>;

#[test]
fn test_is_unsupported() {
  assert!(PngError::ImageTooLarge.is_unsupported());
  assert!(PngError::UnsupportedColorType.is_unsupported());
  assert!(!PngError::NotAPng.is_unsupported());
  assert!(!PngError::TruncatedIdat.is_unsupported());
  assert!(!PngError::AllocationFailed.is_unsupported());
}
