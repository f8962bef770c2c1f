//! Chunk file codec.
//!
//! Header (LE, 24 bytes):
//!   magic[4]   = "MCTC"
//!   version[2] = 1
//!   rsv[2]     = 0
//!   nrows[4]   = rows held by this chunk
//!   raw_len[4] = uncompressed payload length
//!   crc[4]     = crc32(raw row bytes)
//!   rsv[4]     = 0
//!
//! Payload: zstd-compressed row bytes. The crc is computed over the raw
//! bytes, so a payload that decompresses to the wrong thing is caught even
//! when the zstd frame itself is intact.

use byteorder::{ByteOrder, LittleEndian as LE};

use mct_core::errors::{BackingStoreError, McError, Result};

pub const MAGIC_CHUNK: &[u8; 4] = b"MCTC";
pub const CHUNK_VERSION: u16 = 1;
pub const CHUNK_HDR_SIZE: usize = 24;
pub const COMPRESSION_LEVEL: i32 = 3;

const _: () = { assert!(CHUNK_HDR_SIZE == 4 + 2 + 2 + 4 + 4 + 4 + 4); };

pub fn encode_chunk(raw: &[u8], nrows: u32) -> Result<Vec<u8>> {
    if raw.len() > u32::MAX as usize {
        return Err(McError::InvalidArgument(
            "chunk payload exceeds 4 GiB".into(),
        ));
    }
    let comp = zstd::bulk::compress(raw, COMPRESSION_LEVEL)?;
    let mut out = Vec::with_capacity(CHUNK_HDR_SIZE + comp.len());
    out.extend_from_slice(MAGIC_CHUNK);
    out.extend_from_slice(&CHUNK_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&nrows.to_le_bytes());
    out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(raw).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&comp);
    Ok(out)
}

/// Decode one chunk file, returning its row count and raw row bytes.
pub fn decode_chunk(bytes: &[u8], row_len: usize) -> Result<(u32, Vec<u8>)> {
    if bytes.len() < CHUNK_HDR_SIZE || &bytes[0..4] != MAGIC_CHUNK {
        return Err(BackingStoreError::BadHeader.into());
    }
    if LE::read_u16(&bytes[4..]) != CHUNK_VERSION {
        return Err(BackingStoreError::BadHeader.into());
    }
    let nrows = LE::read_u32(&bytes[8..]);
    let raw_len = LE::read_u32(&bytes[12..]) as usize;
    let crc = LE::read_u32(&bytes[16..]);

    let raw = zstd::bulk::decompress(&bytes[CHUNK_HDR_SIZE..], raw_len)
        .map_err(|e| BackingStoreError::Corrupt(format!("chunk decompress: {e}")))?;
    if raw.len() != raw_len {
        return Err(BackingStoreError::Corrupt(format!(
            "chunk holds {} raw bytes, header says {}",
            raw.len(),
            raw_len
        ))
        .into());
    }
    if crc32fast::hash(&raw) != crc {
        return Err(BackingStoreError::Corrupt("chunk crc mismatch".into()).into());
    }
    if raw_len % row_len != 0 || raw_len / row_len != nrows as usize {
        return Err(BackingStoreError::Corrupt(format!(
            "chunk row accounting: {raw_len} bytes vs {nrows} rows of {row_len}"
        ))
        .into());
    }
    Ok((nrows, raw))
}
