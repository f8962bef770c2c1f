//! Append-only string dictionary with an in-memory reverse lookup.
//!
//! Backed by one table of fixed-capacity cells (see
//! [`crate::consts::STRING_CAP`]). A string's index is its first-seen
//! position and never changes afterwards; re-interning is a map hit and
//! touches no storage.

use std::collections::HashMap;

use crate::consts::{DICTIONARY_TABLE, RECORD_CHUNK_ROWS, STRING_CAP};
use crate::errors::Result;
use crate::row::{check_len, clamp_str, put_str, str_at, Row};
use crate::schema::{FieldDef, FieldKind, RowSchema};
use crate::table::{Backend, TypedTable};

pub static DICT_SCHEMA: RowSchema = RowSchema {
    name: "dict_entry",
    row_len: STRING_CAP,
    fields: &[FieldDef {
        name: "value",
        offset: 0,
        kind: FieldKind::FixedStr(STRING_CAP as u16),
    }],
};

/// One stored dictionary value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub value: String,
}

impl Row for DictEntry {
    fn schema() -> &'static RowSchema {
        &DICT_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        put_str(out, &self.value, STRING_CAP);
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&DICT_SCHEMA, buf)?;
        Ok(DictEntry { value: str_at(buf, 0, STRING_CAP)? })
    }
}

pub struct StringDictionary {
    table: TypedTable<DictEntry>,
    index: HashMap<String, u64>,
    values: Vec<String>,
}

impl StringDictionary {
    /// Create the dictionary table inside `group`.
    pub fn create(backend: &dyn Backend, group: &str) -> Result<Self> {
        let table = backend.create_table(
            group,
            DICTIONARY_TABLE,
            &DICT_SCHEMA,
            RECORD_CHUNK_ROWS,
        )?;
        Ok(StringDictionary {
            table: TypedTable::new(table),
            index: HashMap::new(),
            values: Vec::new(),
        })
    }

    /// Open an existing dictionary and rebuild the reverse lookup. When the
    /// stored table carries duplicate values the earliest index wins, so
    /// indices handed out before stay resolvable.
    pub fn open(backend: &dyn Backend, group: &str) -> Result<Self> {
        let table: TypedTable<DictEntry> = TypedTable::new(backend.open_table(
            group,
            DICTIONARY_TABLE,
            &DICT_SCHEMA,
        )?);
        let entries = table.read_rows()?;
        let mut index = HashMap::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (i, e) in entries.into_iter().enumerate() {
            index.entry(e.value.clone()).or_insert(i as u64);
            values.push(e.value);
        }
        Ok(StringDictionary { table, index, values })
    }

    /// Intern `text`, returning its stable index. New values are appended
    /// to storage before the in-memory maps learn about them, so a failed
    /// append leaves the dictionary unchanged.
    pub fn get_or_insert(&mut self, text: &str) -> Result<u64> {
        let key = clamp_str(text, STRING_CAP);
        if let Some(&idx) = self.index.get(key) {
            return Ok(idx);
        }
        let entry = DictEntry { value: key.to_string() };
        self.table.append_rows(std::slice::from_ref(&entry))?;
        let idx = self.values.len() as u64;
        self.index.insert(entry.value.clone(), idx);
        self.values.push(entry.value);
        Ok(idx)
    }

    /// Value stored at `index`, if any.
    pub fn resolve(&self, index: u64) -> Option<&str> {
        self.values.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> u64 {
        self.values.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn strings(&self) -> &[String] {
        &self.values
    }
}
