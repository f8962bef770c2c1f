//! File-system backend: namespaces as directories, tables as chunked,
//! compressed column files.
//!
//! Layout under the root:
//!
//! ```text
//! <root>/
//!   run7/
//!     group.json
//!     evt0/
//!       group.json
//!       truths/
//!         table.json
//!         c000000.mcc
//!         c000001.mcc
//! ```
//!
//! Groups and tables share the directory level; which one a directory is
//! follows from the metadata file it carries.

mod chunk;
mod meta;
mod table;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use mct_core::errors::{BackingStoreError, McError, Result};
use mct_core::schema::RowSchema;
use mct_core::table::{check_component, check_group_path, Backend, ColumnTable};

use crate::meta::{GroupMeta, GROUP_META};
use crate::table::FsTable;

pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Backend rooted at `root`; the directory is created if missing.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FsBackend { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, path: &str) -> Result<PathBuf> {
        check_group_path(path)?;
        Ok(self.root.join(path))
    }

    fn load_group(&self, path: &str) -> Result<(PathBuf, GroupMeta)> {
        let dir = self.group_dir(path)?;
        let meta = GroupMeta::load(&dir.join(GROUP_META)).map_err(|e| match e {
            McError::NotFound(_) => McError::NotFound(path.to_string()),
            other => other,
        })?;
        Ok((dir, meta))
    }
}

impl Backend for FsBackend {
    fn create_group(&self, path: &str) -> Result<()> {
        let dir = self.group_dir(path)?;
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.load_group(parent)?;
        }
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(
                    BackingStoreError::AlreadyExists(path.to_string()).into()
                );
            }
            Err(e) => return Err(e.into()),
        }
        GroupMeta::new().save(&dir.join(GROUP_META))?;
        debug!(group = path, "created group");
        Ok(())
    }

    fn open_group(&self, path: &str) -> Result<()> {
        self.load_group(path).map(|_| ())
    }

    fn set_attr(&self, group: &str, name: &str, value: &str) -> Result<()> {
        check_component(name)?;
        let (dir, mut meta) = self.load_group(group)?;
        meta.attrs.insert(name.to_string(), value.to_string());
        meta.save(&dir.join(GROUP_META))
    }

    fn get_attr(&self, group: &str, name: &str) -> Result<String> {
        let (_dir, meta) = self.load_group(group)?;
        meta.attrs
            .get(name)
            .cloned()
            .ok_or_else(|| McError::NotFound(format!("{group}:{name}")))
    }

    fn create_table(
        &self,
        group: &str,
        name: &str,
        schema: &'static RowSchema,
        chunk_rows: u64,
    ) -> Result<Box<dyn ColumnTable>> {
        check_component(name)?;
        if chunk_rows == 0 || chunk_rows > u32::MAX as u64 {
            return Err(McError::InvalidArgument(format!(
                "chunk_rows {chunk_rows} out of range"
            )));
        }
        if !schema.is_well_formed() {
            return Err(McError::InvalidArgument(format!(
                "schema '{}' has gaps or a bad row length",
                schema.name
            )));
        }
        let (dir, _meta) = self.load_group(group)?;
        let t = FsTable::create(dir.join(name), schema, chunk_rows)?;
        debug!(group, table = name, schema = schema.name, "created table");
        Ok(Box::new(t))
    }

    fn open_table(
        &self,
        group: &str,
        name: &str,
        schema: &'static RowSchema,
    ) -> Result<Box<dyn ColumnTable>> {
        check_component(name)?;
        let (dir, _meta) = self.load_group(group)?;
        Ok(Box::new(FsTable::open(dir.join(name), schema)?))
    }
}
