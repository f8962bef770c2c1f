//! JSON metadata for groups and tables.
//!
//! Both records are tiny and rewritten whole; every save goes through a
//! temp file in the same directory plus a rename, so readers only ever see
//! the old or the new contents. `TableMeta::nrows` is the commit point of
//! an append: chunk bytes beyond it are invisible until the metadata says
//! otherwise.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use mct_core::errors::{McError, Result};

pub const GROUP_META: &str = "group.json";
pub const TABLE_META: &str = "table.json";
pub const META_VERSION: u32 = 1;

#[cfg(unix)]
pub(crate) fn fsync_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let dir = path.parent().unwrap_or(Path::new("."));
    let f = fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(dir)?;
    f.sync_all()
}
#[cfg(not(unix))]
pub(crate) fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Publish `bytes` at `path` atomically (temp file, fsync, rename).
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new().prefix(".mct_").tempfile_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    let _ = fsync_dir(path);
    Ok(())
}

fn read_json(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            McError::NotFound(path.display().to_string())
        } else {
            e.into()
        }
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMeta {
    pub version: u32,
    pub created_unix: i64,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl GroupMeta {
    pub fn new() -> Self {
        GroupMeta {
            version: META_VERSION,
            created_unix: OffsetDateTime::now_utc().unix_timestamp(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&read_json(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, serde_json::to_string_pretty(self)?.as_bytes())
    }
}

impl Default for GroupMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub version: u32,
    /// Layout name, informational only; the fingerprint is what gates
    /// opens.
    pub schema_name: String,
    pub schema_fp: u64,
    pub row_len: usize,
    pub chunk_rows: u64,
    /// Committed row count. Chunk contents past this row are leftovers of
    /// an interrupted append and are ignored.
    pub nrows: u64,
    pub created_unix: i64,
}

impl TableMeta {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&read_json(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, serde_json::to_string_pretty(self)?.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_meta_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GROUP_META);

        let mut meta = GroupMeta::new();
        meta.attrs.insert("product".into(), "vector_mc_truth".into());
        meta.save(&path).unwrap();

        let back = GroupMeta::load(&path).unwrap();
        assert_eq!(back.version, META_VERSION);
        assert_eq!(back.attrs.get("product").unwrap(), "vector_mc_truth");
    }

    #[test]
    fn missing_meta_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = GroupMeta::load(&dir.path().join(GROUP_META)).unwrap_err();
        assert!(matches!(err, McError::NotFound(_)));
    }

    #[test]
    fn table_meta_keeps_large_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TABLE_META);

        let meta = TableMeta {
            version: META_VERSION,
            schema_name: "particle".into(),
            schema_fp: u64::MAX - 17,
            row_len: 140,
            chunk_rows: 128,
            nrows: 1 << 40,
            created_unix: 0,
        };
        meta.save(&path).unwrap();
        let back = TableMeta::load(&path).unwrap();
        assert_eq!(back.schema_fp, u64::MAX - 17);
        assert_eq!(back.nrows, 1 << 40);
    }

    #[test]
    fn save_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GROUP_META);
        let mut meta = GroupMeta::new();
        meta.save(&path).unwrap();
        meta.attrs.insert("k".into(), "v1".into());
        meta.save(&path).unwrap();
        meta.attrs.insert("k".into(), "v2".into());
        meta.save(&path).unwrap();
        assert_eq!(GroupMeta::load(&path).unwrap().attrs.get("k").unwrap(), "v2");
    }
}
