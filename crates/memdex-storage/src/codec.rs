// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding BLOB encoding: packed little-endian `f32`.

use thiserror::Error;

const F32_WIDTH: usize = std::mem::size_of::<f32>();

#[derive(Debug, Error)]
#[error("embedding blob of {len} bytes is not a multiple of {F32_WIDTH}")]
pub(crate) struct CodecError {
    len: usize,
}

pub(crate) fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * F32_WIDTH);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % F32_WIDTH != 0 {
        return Err(CodecError { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(F32_WIDTH)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Decode a BLOB column, reporting bad lengths as a column conversion failure.
pub(crate) fn decode_column(idx: usize, bytes: &[u8]) -> rusqlite::Result<Vec<f32>> {
    decode(bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
    })
}
