//! In-memory backend for unit tests and ephemeral stores.
//!
//! Same contract as the file-system backend, minus durability: groups are
//! map entries, tables are plain byte vectors, chunking is irrelevant.
//! Cloning the backend clones the handle, not the data, so a store and the
//! test driving it can look at the same namespaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::{BackingStoreError, McError, Result};
use crate::schema::RowSchema;
use crate::table::{check_component, check_group_path, Backend, ColumnTable};

#[derive(Default)]
struct MemGroup {
    attrs: HashMap<String, String>,
    tables: HashMap<String, Arc<Mutex<MemTableState>>>,
}

struct MemTableState {
    fingerprint: u64,
    row_len: usize,
    data: Vec<u8>,
}

#[derive(Default, Clone)]
pub struct MemBackend {
    groups: Arc<Mutex<HashMap<String, MemGroup>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemBackend {
    fn create_group(&self, path: &str) -> Result<()> {
        check_group_path(path)?;
        let mut groups = self.groups.lock().expect("backend poisoned");
        if groups.contains_key(path) {
            return Err(BackingStoreError::AlreadyExists(path.into()).into());
        }
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !groups.contains_key(parent) {
                return Err(McError::NotFound(parent.into()));
            }
        }
        groups.insert(path.to_string(), MemGroup::default());
        Ok(())
    }

    fn open_group(&self, path: &str) -> Result<()> {
        check_group_path(path)?;
        let groups = self.groups.lock().expect("backend poisoned");
        if groups.contains_key(path) {
            Ok(())
        } else {
            Err(McError::NotFound(path.into()))
        }
    }

    fn set_attr(&self, group: &str, name: &str, value: &str) -> Result<()> {
        check_group_path(group)?;
        check_component(name)?;
        let mut groups = self.groups.lock().expect("backend poisoned");
        let g = groups
            .get_mut(group)
            .ok_or_else(|| McError::NotFound(group.into()))?;
        g.attrs.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get_attr(&self, group: &str, name: &str) -> Result<String> {
        check_group_path(group)?;
        let groups = self.groups.lock().expect("backend poisoned");
        let g = groups
            .get(group)
            .ok_or_else(|| McError::NotFound(group.into()))?;
        g.attrs
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
        check_group_path(group)?;
        check_component(name)?;
        if chunk_rows == 0 {
            return Err(McError::InvalidArgument(
                "chunk_rows must be positive".into(),
            ));
        }
        if !schema.is_well_formed() {
            return Err(McError::InvalidArgument(format!(
                "schema '{}' has gaps or a bad row length",
                schema.name
            )));
        }
        let mut groups = self.groups.lock().expect("backend poisoned");
        let g = groups
            .get_mut(group)
            .ok_or_else(|| McError::NotFound(group.into()))?;
        if g.tables.contains_key(name) {
            return Err(
                BackingStoreError::AlreadyExists(format!("{group}/{name}")).into()
            );
        }
        let state = Arc::new(Mutex::new(MemTableState {
            fingerprint: schema.fingerprint(),
            row_len: schema.row_len,
            data: Vec::new(),
        }));
        g.tables.insert(name.to_string(), Arc::clone(&state));
        Ok(Box::new(MemTable { schema, state }))
    }

    fn open_table(
        &self,
        group: &str,
        name: &str,
        schema: &'static RowSchema,
    ) -> Result<Box<dyn ColumnTable>> {
        check_group_path(group)?;
        check_component(name)?;
        let groups = self.groups.lock().expect("backend poisoned");
        let g = groups
            .get(group)
            .ok_or_else(|| McError::NotFound(group.into()))?;
        let state = g
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| McError::NotFound(format!("{group}/{name}")))?;
        {
            let st = state.lock().expect("table poisoned");
            if st.fingerprint != schema.fingerprint() || st.row_len != schema.row_len {
                return Err(BackingStoreError::SchemaMismatch(format!(
                    "table {group}/{name} does not match schema '{}'",
                    schema.name
                ))
                .into());
            }
        }
        Ok(Box::new(MemTable { schema, state }))
    }
}

struct MemTable {
    schema: &'static RowSchema,
    state: Arc<Mutex<MemTableState>>,
}

impl ColumnTable for MemTable {
    fn schema(&self) -> &'static RowSchema {
        self.schema
    }

    fn nrows(&self) -> u64 {
        let st = self.state.lock().expect("table poisoned");
        (st.data.len() / st.row_len) as u64
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut st = self.state.lock().expect("table poisoned");
        if data.len() % st.row_len != 0 {
            return Err(McError::InvalidArgument(format!(
                "append of {} bytes is not a whole number of {}-byte rows",
                data.len(),
                st.row_len
            )));
        }
        st.data.extend_from_slice(data);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<u8>> {
        let st = self.state.lock().expect("table poisoned");
        let mut out = Vec::new();
        out.try_reserve_exact(st.data.len())
            .map_err(|e| McError::Allocation(e.to_string()))?;
        out.extend_from_slice(&st.data);
        Ok(out)
    }
}
