use miniz_oxide::deflate::compress_to_vec_zlib;
use pngpeek::*;
use walkdir::WalkDir;

/// Applies a filter type to one line of channel bytes, the way an encoder does.
fn filter_line(filter: u8, line: &[u8], prev: Option<&[u8]>, bpp: usize) -> Vec<u8> {
  let mut out = vec![filter];
  for (i, &x) in line.iter().enumerate() {
    let a = if i >= bpp { line[i - bpp] } else { 0 };
    let b = prev.map_or(0, |p| p[i]);
    let c = if i >= bpp { prev.map_or(0, |p| p[i - bpp]) } else { 0 };
    let predicted = match filter {
      0 => 0,
      1 => a,
      2 => b,
      3 => ((u16::from(a) + u16::from(b)) / 2) as u8,
      4 => paeth_predictor(a, b, c),
      _ => unreachable!(),
    };
    out.push(x.wrapping_sub(predicted));
  }
  out
}

fn push_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
  out.extend((data.len() as u32).to_be_bytes());
  out.extend(chunk_type);
  out.extend(data);
  out.extend([0; 4]);
}

fn ihdr_data(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
  let mut data = Vec::new();
  data.extend(width.to_be_bytes());
  data.extend(height.to_be_bytes());
  data.extend([bit_depth, color_type, 0, 0, interlace]);
  data
}

/// Builds a PNG of `channels` bytes per pixel, line `y` filtered with
/// `filters[y % filters.len()]`, the zlib data split into `idat_size` chunks.
fn build_png(
  width: u32, height: u32, channels: usize, raw: &[u8], filters: &[u8], idat_size: usize,
) -> Vec<u8> {
  let color_type = if channels == 3 { 2 } else { 6 };
  let line_len = width as usize * channels;
  let mut filtered = Vec::new();
  let mut prev = None;
  for (y, line) in raw.chunks_exact(line_len).enumerate() {
    filtered.extend(filter_line(filters[y % filters.len()], line, prev, channels));
    prev = Some(line);
  }
  let zlib = compress_to_vec_zlib(&filtered, 6);

  let mut png = PNG_SIGNATURE.to_vec();
  push_chunk(&mut png, b"IHDR", &ihdr_data(width, height, 8, color_type, 0));
  push_chunk(&mut png, b"tEXt", b"Software\0a test");
  for idat in zlib.chunks(idat_size) {
    push_chunk(&mut png, b"IDAT", idat);
  }
  push_chunk(&mut png, b"IEND", &[]);
  png
}

fn expected_rgba(raw: &[u8], channels: usize) -> Vec<u8> {
  raw
    .chunks_exact(channels)
    .flat_map(|px| [px[0], px[1], px[2], px.get(3).copied().unwrap_or(255)])
    .collect()
}

#[test]
fn test_every_filter_type_decodes() {
  let filter_sets: [&[u8]; 7] = [&[0], &[1], &[2], &[3], &[4], &[0, 1, 2, 3, 4], &[4, 3, 2, 1]];
  for channels in [3, 4] {
    for filters in filter_sets {
      let (width, height) = (13, 9);
      let raw = super::rand_bytes(width as usize * height as usize * channels);
      let png = build_png(width, height, channels, &raw, filters, 64);
      let image = decode_png(&png).unwrap();
      assert_eq!((image.width, image.height), (width, height));
      assert!(image.pixels == expected_rgba(&raw, channels), "{channels} channels, {filters:?}");
    }
  }
}

#[test]
fn test_smooth_gradient_decodes() {
  // smooth data makes the reference encoder use back references.
  let (width, height) = (64_u32, 48_u32);
  let mut raw = Vec::new();
  for y in 0..height {
    for x in 0..width {
      raw.extend([x as u8 * 4, y as u8 * 5, (x + y) as u8, 200]);
    }
  }
  let png = build_png(width, height, 4, &raw, &[4, 1, 2, 3], 1000);
  let image = decode_png(&png).unwrap();
  assert_eq!(image.pixels, raw);
  assert_eq!(image.get(63, 47), Some(RGBA8888 { r: 252, g: 235, b: 110, a: 200 }));
}

#[test]
fn test_scenario_small_rgb() {
  let raw = [1_u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
  let png = build_png(2, 2, 3, &raw, &[0], 8192);
  let image = decode_png(&png).unwrap();
  assert_eq!(image.pixels.len(), 2 * 2 * 4);
  assert_eq!(image.pixels, [1, 2, 3, 255, 4, 5, 6, 255, 7, 8, 9, 255, 10, 11, 12, 255]);
  assert!(image.pixels_rgba8888().iter().all(|p| p.a == 255));
}

#[test]
fn test_max_dimension_boundary() {
  let raw = vec![7_u8; 1024 * 3];
  let png = build_png(1024, 1, 3, &raw, &[0], 8192);
  assert_eq!(decode_png(&png).unwrap().pixels.len(), 1024 * 4);
  let config = DecodeConfig { max_dimension: 1023 };
  assert_eq!(decode_png_with(&png, &config), Err(PngError::ImageTooLarge));
  assert_eq!(
    decode_png_preview(&png, &config),
    Ok(PngPreview::Unsupported { width: 1024, height: 1, reason: PngError::ImageTooLarge })
  );
}

#[test]
fn test_unsupported_headers() {
  let cases = [
    (ihdr_data(2000, 2000, 8, 2, 0), PngError::ImageTooLarge),
    (ihdr_data(4, 4, 8, 3, 0), PngError::UnsupportedColorType),
    (ihdr_data(4, 4, 8, 4, 0), PngError::UnsupportedColorType),
    (ihdr_data(4, 4, 16, 6, 0), PngError::UnsupportedBitDepth),
    (ihdr_data(4, 4, 8, 6, 1), PngError::Interlaced),
    (ihdr_data(0, 4, 8, 6, 0), PngError::EmptyImage),
  ];
  for (ihdr, expected) in cases {
    let mut png = PNG_SIGNATURE.to_vec();
    push_chunk(&mut png, b"IHDR", &ihdr);
    push_chunk(&mut png, b"IEND", &[]);
    assert_eq!(decode_png(&png), Err(expected));
    assert!(expected.is_unsupported());
    let header = png_get_header(&png).unwrap();
    assert_eq!(
      decode_png_preview(&png, &DecodeConfig::default()),
      Ok(PngPreview::Unsupported { width: header.width, height: header.height, reason: expected })
    );
    assert_eq!(RgbaImage::try_from_png_bytes(&png), None);
  }
}

#[test]
fn test_corrupt_image_data() {
  let raw = super::rand_bytes(8 * 8 * 4);
  let png = build_png(8, 8, 4, &raw, &[0], 8192);
  let idat = png_get_idat(&png).unwrap();
  assert!(!idat.is_empty());

  // cutting the image data short
  let mut short = PNG_SIGNATURE.to_vec();
  push_chunk(&mut short, b"IHDR", &ihdr_data(8, 8, 8, 6, 0));
  push_chunk(&mut short, b"IDAT", &idat[..idat.len() / 2]);
  push_chunk(&mut short, b"IEND", &[]);
  assert!(decode_png(&short).is_err());
  assert!(decode_png_preview(&short, &DecodeConfig::default()).is_err());

  // a header that's smaller than the data
  let mut small = PNG_SIGNATURE.to_vec();
  push_chunk(&mut small, b"IHDR", &ihdr_data(8, 4, 8, 6, 0));
  push_chunk(&mut small, b"IDAT", &idat);
  push_chunk(&mut small, b"IEND", &[]);
  assert_eq!(decode_png(&small), Err(PngError::ExcessImageData));

  // no image data at all
  let mut empty = PNG_SIGNATURE.to_vec();
  push_chunk(&mut empty, b"IHDR", &ihdr_data(8, 8, 8, 6, 0));
  push_chunk(&mut empty, b"IEND", &[]);
  assert_eq!(decode_png(&empty), Err(PngError::UnexpectedEndOfStream));
}

#[test]
fn test_PngRawChunkIter_no_panics() {
  // iter ALL files in the test folder, even non-png files shouldn't panic it.
  for entry in WalkDir::new("tests/").into_iter().filter_map(|e| e.ok()) {
    println!("{}", entry.path().display());
    let v = match std::fs::read(entry.path()) {
      Ok(v) => v,
      Err(e) => {
        println!("Error reading file: {e:?}");
        continue;
      }
    };
    for _ in PngRawChunkIter::new(&v) {
      //
    }
    let _ = decode_png(&v);
  }
  // even totally random data should never panic the iterator!
  for _ in 0..10 {
    let v = super::rand_bytes(1024);
    for _ in PngRawChunkIter::new(&v) {
      //
    }
  }
}

#[test]
fn test_decode_no_panics() {
  // a valid start followed by garbage, so the inflater sees the garbage.
  for _ in 0..100 {
    let mut png = PNG_SIGNATURE.to_vec();
    push_chunk(&mut png, b"IHDR", &ihdr_data(16, 16, 8, 6, 0));
    push_chunk(&mut png, b"IDAT", &super::rand_bytes(300));
    push_chunk(&mut png, b"IEND", &[]);
    let _ = decode_png(&png);
  }
}
