//! Declarative row-layout descriptors.
//!
//! Every table is described by a static [`RowSchema`]: an ordered list of
//! named, typed, offset-addressed cells. Create and open consume the same
//! descriptor, and the descriptor's fingerprint is stamped into table
//! metadata, so a table can never be silently reopened with a drifted
//! layout.

use std::fmt::Write as _;

fn h64(key: &[u8]) -> u64 { xxhash_rust::xxh3::xxh3_64(key) }

/// Cell type of one field in a fixed-size row. All numeric cells are
/// little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Fixed-capacity text cell, NUL-padded, truncated at the first NUL.
    FixedStr(u16),
}

impl FieldKind {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::I64 | FieldKind::U64 | FieldKind::F64 => 8,
            FieldKind::FixedStr(cap) => cap as usize,
        }
    }
}

/// One field of a row layout.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

/// Immutable layout descriptor for one table's rows.
#[derive(Debug)]
pub struct RowSchema {
    pub name: &'static str,
    pub row_len: usize,
    pub fields: &'static [FieldDef],
}

impl RowSchema {
    /// Stable structural fingerprint of the layout. Field names, kinds and
    /// offsets all participate; the table name does not, so two tables may
    /// share a layout.
    pub fn fingerprint(&self) -> u64 {
        let mut desc = String::new();
        for f in self.fields {
            let _ = write!(desc, "{}:{:?}@{};", f.name, f.kind, f.offset);
        }
        h64(desc.as_bytes())
    }

    /// True when the fields tile the row contiguously from offset zero and
    /// cover exactly `row_len` bytes.
    pub fn is_well_formed(&self) -> bool {
        let mut next = 0usize;
        for f in self.fields {
            if f.offset != next || f.name.is_empty() {
                return false;
            }
            next += f.kind.width();
        }
        !self.fields.is_empty() && next == self.row_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PAIR: RowSchema = RowSchema {
        name: "pair",
        row_len: 12,
        fields: &[
            FieldDef { name: "key", offset: 0, kind: FieldKind::U64 },
            FieldDef { name: "val", offset: 8, kind: FieldKind::I32 },
        ],
    };

    #[test]
    fn well_formed_pair() {
        assert!(PAIR.is_well_formed());
    }

    #[test]
    fn gaps_are_rejected() {
        static GAPPED: RowSchema = RowSchema {
            name: "gapped",
            row_len: 16,
            fields: &[
                FieldDef { name: "a", offset: 0, kind: FieldKind::U64 },
                // hole at 8..12
                FieldDef { name: "b", offset: 12, kind: FieldKind::I32 },
            ],
        };
        assert!(!GAPPED.is_well_formed());
    }

    #[test]
    fn fingerprint_tracks_layout_not_name() {
        static PAIR2: RowSchema = RowSchema {
            name: "pair_clone",
            row_len: 12,
            fields: PAIR.fields,
        };
        static SWAPPED: RowSchema = RowSchema {
            name: "pair",
            row_len: 12,
            fields: &[
                FieldDef { name: "val", offset: 0, kind: FieldKind::I32 },
                FieldDef { name: "key", offset: 4, kind: FieldKind::U64 },
            ],
        };
        assert_eq!(PAIR.fingerprint(), PAIR2.fingerprint());
        assert_ne!(PAIR.fingerprint(), SWAPPED.fingerprint());
    }

    #[test]
    fn fixed_str_width_is_capacity() {
        assert_eq!(FieldKind::FixedStr(64).width(), 64);
        assert_eq!(FieldKind::F32.width(), 4);
        assert_eq!(FieldKind::I64.width(), 8);
    }
}
