//! Flat persistence of MC hit collections.
//!
//! Hits are already flat, so the namespace is a single high-volume table;
//! no links, no dictionary. Kept alongside [`crate::truth_store`] because
//! analysis jobs usually carry both products for the same events.

use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use mct_core::consts::VECTOR_CHUNK_ROWS;
use mct_core::errors::{BackingStoreError, Result};
use mct_core::table::{join_group, Backend, TypedTable};

use crate::rows::{HitRow, HIT_SCHEMA};
use crate::truth_store::{TableAppend, LAYOUT_VERSION};

pub const HITS_TABLE: &str = "mchits";

/// `product` attribute value identifying a hit namespace.
pub const PRODUCT_MCHITS: &str = "mc_hit_collection";

/// Handle to one hit-collection namespace.
pub struct HitStore {
    group: String,
    hits: TypedTable<HitRow>,
}

impl fmt::Debug for HitStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitStore")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl HitStore {
    pub fn create(backend: &dyn Backend, location: &str, name: &str) -> Result<Self> {
        let group = join_group(location, name)?;
        backend.create_group(&group)?;
        backend.set_attr(&group, "product", PRODUCT_MCHITS)?;
        backend.set_attr(&group, "layout_version", LAYOUT_VERSION)?;
        let created = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        backend.set_attr(&group, "created", &created)?;

        let hits = TypedTable::new(backend.create_table(
            &group,
            HITS_TABLE,
            &HIT_SCHEMA,
            VECTOR_CHUNK_ROWS,
        )?);
        info!(group = %group, "created hit namespace");
        Ok(HitStore { group, hits })
    }

    pub fn open(backend: &dyn Backend, location: &str, name: &str) -> Result<Self> {
        let group = join_group(location, name)?;
        backend.open_group(&group)?;
        let product = backend.get_attr(&group, "product")?;
        if product != PRODUCT_MCHITS {
            return Err(BackingStoreError::SchemaMismatch(format!(
                "namespace {group} holds '{product}', expected '{PRODUCT_MCHITS}'"
            ))
            .into());
        }
        let hits = TypedTable::new(backend.open_table(&group, HITS_TABLE, &HIT_SCHEMA)?);
        info!(group = %group, hits = hits.nrows(), "opened hit namespace");
        Ok(HitStore { group, hits })
    }

    /// Append `hits` at the tail, returning where they landed.
    pub fn append(&mut self, hits: &[HitRow]) -> Result<TableAppend> {
        let start = self.hits.nrows();
        self.hits.append_rows(hits)?;
        debug!(group = %self.group, rows = hits.len(), "appended hits");
        Ok(TableAppend { start, rows: hits.len() as u64 })
    }

    pub fn nrows(&self) -> u64 {
        self.hits.nrows()
    }

    pub fn read_all(&self) -> Result<Vec<HitRow>> {
        self.hits.read_rows()
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Release the namespace; equivalent to dropping the handle.
    pub fn close(self) {
        debug!(group = %self.group, "closing hit namespace");
    }
}
