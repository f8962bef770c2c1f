//! Append-only table and backing-store contracts.
//!
//! A [`Backend`] owns a namespace tree of groups; groups carry string
//! attributes and hold chunked, typed tables. Table handles are owned
//! values and release their resource on drop, so a store that opens five
//! tables gives all five back by going out of scope.

use std::fmt;
use std::marker::PhantomData;

use crate::errors::{McError, Result};
use crate::row::{decode_rows, encode_rows, Row};
use crate::schema::RowSchema;

/// Handle to one growable table of fixed-size rows.
///
/// `append` either extends the table fully or fails leaving an
/// indeterminate tail that the next open ignores; it never reports success
/// for a partial write.
pub trait ColumnTable {
    fn schema(&self) -> &'static RowSchema;

    /// Committed row count.
    fn nrows(&self) -> u64;

    /// Append a whole number of encoded rows at the tail.
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Read the entire committed contents.
    fn read_all(&self) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn ColumnTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnTable")
            .field("schema", &self.schema().name)
            .field("nrows", &self.nrows())
            .finish()
    }
}

/// Namespace and table factory of a column store.
///
/// Group paths are `/`-separated; a parent group must exist before a child
/// group or table is created under it.
pub trait Backend {
    fn create_group(&self, path: &str) -> Result<()>;
    fn open_group(&self, path: &str) -> Result<()>;

    fn set_attr(&self, group: &str, name: &str, value: &str) -> Result<()>;
    fn get_attr(&self, group: &str, name: &str) -> Result<String>;

    fn create_table(
        &self,
        group: &str,
        name: &str,
        schema: &'static RowSchema,
        chunk_rows: u64,
    ) -> Result<Box<dyn ColumnTable>>;

    fn open_table(
        &self,
        group: &str,
        name: &str,
        schema: &'static RowSchema,
    ) -> Result<Box<dyn ColumnTable>>;
}

/// Reject empty names, path separators and directory-walk components.
pub fn check_component(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(McError::InvalidArgument("name cannot be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(McError::InvalidArgument(format!(
            "name cannot be '{name}'"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(McError::InvalidArgument(format!(
            "name '{name}' contains a reserved character"
        )));
    }
    Ok(())
}

/// Validate a full `/`-separated group path.
pub fn check_group_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(McError::InvalidArgument("group path cannot be empty".into()));
    }
    for part in path.split('/') {
        check_component(part)?;
    }
    Ok(())
}

/// Join a (possibly root) location and a child name into a group path.
pub fn join_group(location: &str, name: &str) -> Result<String> {
    check_component(name)?;
    if location.is_empty() {
        return Ok(name.to_string());
    }
    check_group_path(location)?;
    Ok(format!("{location}/{name}"))
}

/// Typed view over a raw table handle.
pub struct TypedTable<R: Row> {
    inner: Box<dyn ColumnTable>,
    _row: PhantomData<R>,
}

impl<R: Row> TypedTable<R> {
    pub fn new(inner: Box<dyn ColumnTable>) -> Self {
        TypedTable { inner, _row: PhantomData }
    }

    pub fn nrows(&self) -> u64 {
        self.inner.nrows()
    }

    /// Append rows at the tail; an empty slice touches nothing.
    pub fn append_rows(&mut self, rows: &[R]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.inner.append(&encode_rows(rows))
    }

    pub fn read_rows(&self) -> Result<Vec<R>> {
        decode_rows(&self.inner.read_all()?)
    }
}
