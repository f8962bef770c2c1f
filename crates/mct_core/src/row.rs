//! Fixed-layout row codec and child-range arithmetic.

use byteorder::{ByteOrder, LittleEndian as LE};

use crate::errors::{BackingStoreError, McError, Result};
use crate::schema::RowSchema;

/// A value that encodes to and decodes from one fixed-size table row.
///
/// `encode` must append exactly `schema().row_len` bytes; `decode` is
/// handed exactly that many.
pub trait Row: Sized {
    fn schema() -> &'static RowSchema;
    fn encode(&self, out: &mut Vec<u8>);
    fn decode(buf: &[u8]) -> Result<Self>;
}

/// Guard for `Row::decode` implementations.
pub fn check_len(schema: &RowSchema, buf: &[u8]) -> Result<()> {
    if buf.len() != schema.row_len {
        return Err(BackingStoreError::Corrupt(format!(
            "{} row is {} bytes, expected {}",
            schema.name,
            buf.len(),
            schema.row_len
        ))
        .into());
    }
    Ok(())
}

pub fn i32_at(buf: &[u8], off: usize) -> i32 { LE::read_i32(&buf[off..]) }
pub fn u32_at(buf: &[u8], off: usize) -> u32 { LE::read_u32(&buf[off..]) }
pub fn i64_at(buf: &[u8], off: usize) -> i64 { LE::read_i64(&buf[off..]) }
pub fn u64_at(buf: &[u8], off: usize) -> u64 { LE::read_u64(&buf[off..]) }
pub fn f32_at(buf: &[u8], off: usize) -> f32 { LE::read_f32(&buf[off..]) }
pub fn f64_at(buf: &[u8], off: usize) -> f64 { LE::read_f64(&buf[off..]) }

/// Normalize text for a fixed-capacity cell: cut at the first NUL, then
/// clamp to `cap` bytes on a char boundary.
pub fn clamp_str(s: &str, cap: usize) -> &str {
    let s = match s.find('\0') {
        Some(i) => &s[..i],
        None => s,
    };
    if s.len() <= cap {
        return s;
    }
    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Append `s` as a NUL-padded cell of exactly `cap` bytes.
pub fn put_str(out: &mut Vec<u8>, s: &str, cap: usize) {
    let s = clamp_str(s, cap);
    out.extend_from_slice(s.as_bytes());
    out.resize(out.len() + (cap - s.len()), 0);
}

/// Read a NUL-padded cell of `cap` bytes starting at `off`.
pub fn str_at(buf: &[u8], off: usize, cap: usize) -> Result<String> {
    let cell = &buf[off..off + cap];
    let end = cell.iter().position(|&b| b == 0).unwrap_or(cap);
    match std::str::from_utf8(&cell[..end]) {
        Ok(s) => Ok(s.to_owned()),
        Err(e) => Err(BackingStoreError::Corrupt(format!(
            "string cell is not UTF-8: {e}"
        ))
        .into()),
    }
}

/// Encode a batch of rows into one contiguous buffer.
pub fn encode_rows<R: Row>(rows: &[R]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rows.len() * R::schema().row_len);
    for r in rows {
        r.encode(&mut out);
    }
    out
}

/// Decode a whole-table buffer into rows.
pub fn decode_rows<R: Row>(data: &[u8]) -> Result<Vec<R>> {
    let schema = R::schema();
    if data.len() % schema.row_len != 0 {
        return Err(BackingStoreError::Corrupt(format!(
            "{} table holds {} bytes, not a whole number of {}-byte rows",
            schema.name,
            data.len(),
            schema.row_len
        ))
        .into());
    }
    let n = data.len() / schema.row_len;
    let mut rows = Vec::new();
    rows.try_reserve_exact(n)
        .map_err(|e| McError::Allocation(e.to_string()))?;
    for chunk in data.chunks_exact(schema.row_len) {
        rows.push(R::decode(chunk)?);
    }
    Ok(rows)
}

/// Contiguous block of child rows owned by one parent row, inclusive on
/// both ends, or the `(-1, -1)` sentinel when the parent owns none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: i64,
    pub end: i64,
}

impl RowRange {
    pub const NONE: RowRange = RowRange { start: -1, end: -1 };

    /// Range covering `count` rows starting at `start`; the sentinel when
    /// `count` is zero.
    pub fn from_extent(start: u64, count: u64) -> RowRange {
        if count == 0 {
            return RowRange::NONE;
        }
        RowRange {
            start: start as i64,
            end: (start + count - 1) as i64,
        }
    }

    pub fn is_none(self) -> bool {
        self.start < 0
    }

    /// Number of rows covered.
    pub fn len(self) -> u64 {
        if self.is_none() {
            0
        } else {
            (self.end - self.start + 1) as u64
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Shift a batch-local range by the rows already present in the target
    /// table. The sentinel is never shifted.
    pub fn rebase(self, base: u64) -> RowRange {
        if self.is_none() {
            return RowRange::NONE;
        }
        RowRange {
            start: self.start + base as i64,
            end: self.end + base as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_of_zero_rows_is_the_sentinel() {
        assert_eq!(RowRange::from_extent(17, 0), RowRange::NONE);
        assert!(RowRange::from_extent(17, 0).is_none());
        assert_eq!(RowRange::from_extent(17, 0).len(), 0);
    }

    #[test]
    fn extent_is_inclusive() {
        let r = RowRange::from_extent(3, 4);
        assert_eq!(r, RowRange { start: 3, end: 6 });
        assert_eq!(r.len(), 4);
        assert!(!r.is_empty());
    }

    #[test]
    fn rebase_shifts_by_existing_rows() {
        let r = RowRange::from_extent(0, 3).rebase(100);
        assert_eq!(r, RowRange { start: 100, end: 102 });
    }

    #[test]
    fn rebase_never_touches_the_sentinel() {
        assert_eq!(RowRange::NONE.rebase(100), RowRange::NONE);
    }

    #[test]
    fn clamp_cuts_at_nul_then_cap() {
        assert_eq!(clamp_str("primary\0junk", 64), "primary");
        assert_eq!(clamp_str("abcdef", 4), "abcd");
        assert_eq!(clamp_str("", 4), "");
    }

    #[test]
    fn clamp_respects_char_boundaries() {
        let s = format!("{}é", "a".repeat(63)); // é is 2 bytes, straddles 64
        assert_eq!(clamp_str(&s, 64), "a".repeat(63));
    }

    #[test]
    fn string_cell_roundtrip() {
        let mut buf = Vec::new();
        put_str(&mut buf, "conv", 16);
        assert_eq!(buf.len(), 16);
        assert_eq!(str_at(&buf, 0, 16).unwrap(), "conv");
    }

    #[test]
    fn full_width_cell_has_no_terminator() {
        let mut buf = Vec::new();
        put_str(&mut buf, &"x".repeat(64), 64);
        assert_eq!(buf.len(), 64);
        assert_eq!(str_at(&buf, 0, 64).unwrap(), "x".repeat(64));
    }

    #[test]
    fn non_utf8_cell_is_corrupt() {
        let buf = vec![0xff, 0xfe, 0, 0];
        assert!(str_at(&buf, 0, 4).is_err());
    }
}
