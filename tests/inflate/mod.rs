use miniz_oxide::deflate::{compress_to_vec, compress_to_vec_zlib};
use pngpeek::*;

fn sample_inputs() -> Vec<Vec<u8>> {
  let mut inputs = vec![
    Vec::new(),
    b"a".to_vec(),
    b"ABABABABABABABABABABABABABABABAB".to_vec(),
    b"the quick brown fox jumps over the lazy dog, the quick brown dog".repeat(40),
    vec![0; 70_000],
    (0..=255_u8).cycle().take(5000).collect(),
  ];
  // random data mostly can't be compressed, so it goes out in stored blocks.
  inputs.push(super::rand_bytes(100_000));
  // a small alphabet gets dynamic blocks with long back references.
  inputs.push(super::rand_bytes(40_000).into_iter().map(|b| b"acgt"[usize::from(b & 3)]).collect());
  inputs
}

#[test]
fn test_inflate_matches_reference_encoder() {
  for input in sample_inputs() {
    for level in [0, 1, 6, 9] {
      let deflated = compress_to_vec(&input, level);
      let inflated = inflate(&deflated).unwrap();
      assert!(inflated == input, "level {level}, len {}", input.len());
    }
  }
}

#[test]
fn test_zlib_decompress_matches_reference_encoder() {
  for input in sample_inputs() {
    let zlib = compress_to_vec_zlib(&input, 6);
    assert_eq!(zlib_decompress(&zlib, input.len()).unwrap(), input);
    if !input.is_empty() {
      assert_eq!(zlib_decompress(&zlib, input.len() - 1), Err(PngError::ExcessImageData));
    }
  }
}

#[test]
fn test_inflate_truncations_are_errors() {
  let input = b"the quick brown fox jumps over the lazy dog".repeat(20);
  let deflated = compress_to_vec(&input, 9);
  for cut in 0..deflated.len() - 4 {
    // the end of the final block is always missing.
    assert!(inflate(&deflated[..cut]).is_err(), "cut at {cut}");
  }
}

#[test]
fn test_inflate_random_data_no_panics() {
  for _ in 0..200 {
    let v = super::rand_bytes(256);
    let _ = inflate(&v);
  }
}
