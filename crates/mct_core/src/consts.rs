// crates/mct_core/src/consts.rs

/// Capacity of one dictionary string cell, padding included.
pub const STRING_CAP: usize = 64;

/// Reserved table name of the per-namespace string dictionary.
pub const DICTIONARY_TABLE: &str = "string_dictionary";

/// Chunk size for record-style tables (truth family, dictionary).
pub const RECORD_CHUNK_ROWS: u64 = 128;

/// Chunk size for high-volume vector tables (hits).
pub const VECTOR_CHUNK_ROWS: u64 = 1024;

const _: () = { assert!(STRING_CAP <= u16::MAX as usize); };
const _: () = { assert!(RECORD_CHUNK_ROWS > 0 && VECTOR_CHUNK_ROWS > 0); };
