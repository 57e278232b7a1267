//! Binary codec for content and title blobs.
//!
//! Token tuples are serialized with bincode (a length-prefixed,
//! deterministic encoding) and deflated with zlib. Reads and writes must
//! use the same codec: the round-trip equality of stored content is a
//! pipeline invariant.

use anyhow::{Context, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// One token of persisted content.
///
/// `word_id` indexes the `words` table; the optional ids index the
/// `punctuations` table and reconstruct the text around the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTuple {
    pub word_id: u32,
    pub punct_before_id: Option<u32>,
    pub punct_after_id: Option<u32>,
    pub spacing_id: Option<u32>,
}

/// Serialize and compress one chunk of token tuples.
///
/// # Errors
/// Fails when serialization or compression fails.
pub fn encode_tuples(tuples: &[TokenTuple]) -> Result<Vec<u8>> {
    let serialized = bincode::serialize(tuples).context("failed to serialize token tuples")?;
    compress(&serialized)
}

/// Decompress and deserialize one chunk of token tuples.
///
/// # Errors
/// Fails when the blob is corrupt or was written by a different codec.
pub fn decode_tuples(blob: &[u8]) -> Result<Vec<TokenTuple>> {
    let raw = decompress(blob)?;
    bincode::deserialize(&raw).context("failed to deserialize token tuples")
}

/// Serialize and compress a title's word-id list.
///
/// # Errors
/// Fails when serialization or compression fails.
pub fn encode_word_ids(word_ids: &[u32]) -> Result<Vec<u8>> {
    let serialized = bincode::serialize(word_ids).context("failed to serialize word ids")?;
    compress(&serialized)
}

/// Decompress and deserialize a title's word-id list.
///
/// # Errors
/// Fails when the blob is corrupt or was written by a different codec.
pub fn decode_word_ids(blob: &[u8]) -> Result<Vec<u32>> {
    let raw = decompress(blob)?;
    bincode::deserialize(&raw).context("failed to deserialize word ids")
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish().context("compression failed")
}

fn decompress(blob: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(blob);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw).context("decompression failed")?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(word_id: u32) -> TokenTuple {
        TokenTuple {
            word_id,
            punct_before_id: None,
            punct_after_id: Some(word_id + 1),
            spacing_id: Some(1),
        }
    }

    #[test]
    fn tuples_roundtrip_exactly() {
        let tuples: Vec<TokenTuple> = (0..1000).map(tuple).collect();
        let blob = encode_tuples(&tuples).unwrap();
        assert_eq!(decode_tuples(&blob).unwrap(), tuples);
    }

    #[test]
    fn compression_shrinks_repetitive_streams() {
        let tuples: Vec<TokenTuple> = (0..10_000).map(|_| tuple(42)).collect();
        let blob = encode_tuples(&tuples).unwrap();
        let raw = bincode::serialize(&tuples).unwrap();
        assert!(blob.len() < raw.len() / 4, "blob {} raw {}", blob.len(), raw.len());
    }

    #[test]
    fn word_ids_roundtrip() {
        let ids = vec![1u32, 5, 9, 9, 2];
        let blob = encode_word_ids(&ids).unwrap();
        assert_eq!(decode_word_ids(&blob).unwrap(), ids);
    }

    #[test]
    fn garbage_blob_is_an_error() {
        assert!(decode_tuples(b"not a zlib stream").is_err());
    }
}
