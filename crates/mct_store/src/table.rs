//! File-backed column tables.
//!
//! One directory per table: `table.json` plus numbered chunk files
//! (`c000000.mcc`, `c000001.mcc`, ...). Appends rewrite the tail chunk
//! through a temp-file rename, write any further full chunks the same way,
//! then commit by saving the metadata; a crash at any point leaves the
//! previously committed rows readable.

use std::fs::{self, File};
use std::path::PathBuf;

use memmap2::Mmap;
use tracing::{debug, trace};

use mct_core::errors::{BackingStoreError, McError, Result};
use mct_core::schema::RowSchema;
use mct_core::table::ColumnTable;

use crate::chunk::{decode_chunk, encode_chunk};
use crate::meta::{write_atomic, TableMeta, META_VERSION, TABLE_META};

#[derive(Debug)]
pub(crate) struct FsTable {
    dir: PathBuf,
    schema: &'static RowSchema,
    meta: TableMeta,
}

impl FsTable {
    pub(crate) fn create(
        dir: PathBuf,
        schema: &'static RowSchema,
        chunk_rows: u64,
    ) -> Result<Self> {
        if let Err(e) = fs::create_dir(&dir) {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                return Err(BackingStoreError::AlreadyExists(
                    dir.display().to_string(),
                )
                .into());
            }
            return Err(e.into());
        }
        let meta = TableMeta {
            version: META_VERSION,
            schema_name: schema.name.to_string(),
            schema_fp: schema.fingerprint(),
            row_len: schema.row_len,
            chunk_rows,
            nrows: 0,
            created_unix: time::OffsetDateTime::now_utc().unix_timestamp(),
        };
        meta.save(&dir.join(TABLE_META))?;
        debug!(table = %dir.display(), schema = schema.name, "created table");
        Ok(FsTable { dir, schema, meta })
    }

    pub(crate) fn open(dir: PathBuf, schema: &'static RowSchema) -> Result<Self> {
        let meta = TableMeta::load(&dir.join(TABLE_META)).map_err(|e| {
            // a bare directory without table.json is not a table
            match e {
                McError::NotFound(_) => McError::NotFound(dir.display().to_string()),
                other => other,
            }
        })?;
        if meta.schema_fp != schema.fingerprint() || meta.row_len != schema.row_len {
            return Err(BackingStoreError::SchemaMismatch(format!(
                "table {} holds '{}' rows, expected '{}'",
                dir.display(),
                meta.schema_name,
                schema.name
            ))
            .into());
        }
        if meta.chunk_rows == 0 {
            return Err(BackingStoreError::Corrupt(format!(
                "table {} declares zero chunk rows",
                dir.display()
            ))
            .into());
        }
        trace!(table = %dir.display(), nrows = meta.nrows, "opened table");
        Ok(FsTable { dir, schema, meta })
    }

    fn chunk_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("c{index:06}.mcc"))
    }

    fn read_chunk(&self, index: u64) -> Result<(u32, Vec<u8>)> {
        let path = self.chunk_path(index);
        let f = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                McError::from(BackingStoreError::Corrupt(format!(
                    "chunk {} is missing",
                    path.display()
                )))
            } else {
                e.into()
            }
        })?;
        let mmap = unsafe { Mmap::map(&f)? };
        decode_chunk(&mmap, self.schema.row_len)
    }
}

impl ColumnTable for FsTable {
    fn schema(&self) -> &'static RowSchema {
        self.schema
    }

    fn nrows(&self) -> u64 {
        self.meta.nrows
    }

    fn append(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let row_len = self.schema.row_len;
        if data.len() % row_len != 0 {
            return Err(McError::InvalidArgument(format!(
                "append of {} bytes is not a whole number of {}-byte rows",
                data.len(),
                row_len
            )));
        }
        let chunk_rows = self.meta.chunk_rows;
        let add_rows = (data.len() / row_len) as u64;

        let mut chunk_index = self.meta.nrows / chunk_rows;
        let tail_rows = (self.meta.nrows % chunk_rows) as usize;

        // Rebuild the partially filled tail chunk in memory; anything past
        // the committed count in it is a leftover and gets dropped here.
        let mut pending;
        if tail_rows > 0 {
            let (have, mut raw) = self.read_chunk(chunk_index)?;
            if (have as usize) < tail_rows {
                return Err(BackingStoreError::Corrupt(format!(
                    "tail chunk holds {have} rows, metadata says {tail_rows}"
                ))
                .into());
            }
            raw.truncate(tail_rows * row_len);
            pending = raw;
            pending
                .try_reserve_exact(data.len())
                .map_err(|e| McError::Allocation(e.to_string()))?;
            pending.extend_from_slice(data);
        } else {
            pending = data.to_vec();
        }

        let cap = chunk_rows as usize * row_len;
        let mut off = 0;
        while off < pending.len() {
            let take = (pending.len() - off).min(cap);
            let bytes =
                encode_chunk(&pending[off..off + take], (take / row_len) as u32)?;
            write_atomic(&self.chunk_path(chunk_index), &bytes)?;
            chunk_index += 1;
            off += take;
        }

        self.meta.nrows += add_rows;
        self.meta.save(&self.dir.join(TABLE_META))?;
        trace!(table = %self.dir.display(), rows = add_rows, total = self.meta.nrows, "append");
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<u8>> {
        let row_len = self.schema.row_len as u64;
        let total = self
            .meta
            .nrows
            .checked_mul(row_len)
            .filter(|&t| t <= usize::MAX as u64)
            .ok_or_else(|| {
                McError::Allocation("table too large for a whole-table read".into())
            })?;
        let mut out = Vec::new();
        out.try_reserve_exact(total as usize)
            .map_err(|e| McError::Allocation(e.to_string()))?;

        let chunk_rows = self.meta.chunk_rows;
        let mut remaining = self.meta.nrows;
        let mut index = 0u64;
        while remaining > 0 {
            let want = remaining.min(chunk_rows);
            let (have, raw) = self.read_chunk(index)?;
            if (have as u64) < want {
                return Err(BackingStoreError::Corrupt(format!(
                    "chunk {index} holds {have} rows, expected at least {want}"
                ))
                .into());
            }
            // a longer chunk is a torn append tail; take the committed part
            out.extend_from_slice(&raw[..(want * row_len) as usize]);
            remaining -= want;
            index += 1;
        }
        Ok(out)
    }
}
