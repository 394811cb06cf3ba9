use alloc::vec::Vec;

/// Split `payload` into `parts` chunks of roughly equal size.
///
/// Chunk boundaries may fall anywhere, including inside a multi-byte UTF-8
/// sequence; the parser is byte-oriented and must cope.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn produce_chunks(payload: &[u8], parts: usize) -> Vec<&[u8]> {
    assert!(parts > 0);
    let chunk_size = payload.len().div_ceil(parts).max(1);
    payload.chunks(chunk_size).collect()
}

/// Split `payload` at the given offsets, which are clamped and sorted first.
#[must_use]
pub fn split_at_offsets<'a>(payload: &'a [u8], offsets: &[usize]) -> Vec<&'a [u8]> {
    let mut cuts: Vec<usize> = offsets.iter().map(|&o| o.min(payload.len())).collect();
    cuts.sort_unstable();
    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        chunks.push(&payload[start..cut]);
        start = cut;
    }
    chunks.push(&payload[start..]);
    chunks
}
