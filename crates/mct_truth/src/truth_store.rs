//! Flattened persistence of truth records.
//!
//! One namespace per logical collection, holding five parallel tables plus
//! the string dictionary:
//!
//! ```text
//! <namespace>/
//!   truths               one row per record, links into particles/neutrinos
//!   neutrinos            at most one row per record
//!   particles            links into trajectories/daughters, labels interned
//!   daughters            parent/child track-id edges
//!   trajectories         sampled trajectory points
//!   string_dictionary    process label pool
//! ```
//!
//! Every table is append-only; links are table-absolute once stored, so
//! batches from separate sessions read back as one coherent collection.

use std::fmt;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use mct_core::consts::RECORD_CHUNK_ROWS;
use mct_core::dictionary::StringDictionary;
use mct_core::errors::{BackingStoreError, Result};
use mct_core::table::{join_group, Backend, TypedTable};

use crate::event::McTruth;
use crate::flatten::{assemble_events, flatten_events, FlatTruth};
use crate::rows::{
    DaughterRow, NeutrinoRow, ParticleRow, TrajectoryRow, TruthRow,
    DAUGHTER_SCHEMA, NEUTRINO_SCHEMA, PARTICLE_SCHEMA, TRAJECTORY_SCHEMA,
    TRUTH_SCHEMA,
};

pub const TRUTHS_TABLE: &str = "truths";
pub const NEUTRINOS_TABLE: &str = "neutrinos";
pub const PARTICLES_TABLE: &str = "particles";
pub const DAUGHTERS_TABLE: &str = "daughters";
pub const TRAJECTORIES_TABLE: &str = "trajectories";

/// `product` attribute value identifying a truth namespace.
pub const PRODUCT_VMCTRUTH: &str = "vector_mc_truth";
pub const LAYOUT_VERSION: &str = "1";

/// Absolute placement of one batch's rows in a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableAppend {
    pub start: u64,
    pub rows: u64,
}

/// What a successful `append_batch` committed, per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReceipt {
    pub truths: TableAppend,
    pub neutrinos: TableAppend,
    pub particles: TableAppend,
    pub daughters: TableAppend,
    pub trajectories: TableAppend,
    pub strings_interned: u64,
}

/// Committed row counts across the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSizes {
    pub truths: u64,
    pub neutrinos: u64,
    pub particles: u64,
    pub daughters: u64,
    pub trajectories: u64,
    pub strings: u64,
}

/// Handle to one truth namespace.
///
/// Owns the dictionary and the five table handles; dropping the store (or
/// calling [`TruthStore::close`]) releases them, dictionary first, then the
/// tables in reverse creation order.
pub struct TruthStore {
    group: String,
    dict: StringDictionary,
    trajectories: TypedTable<TrajectoryRow>,
    daughters: TypedTable<DaughterRow>,
    particles: TypedTable<ParticleRow>,
    neutrinos: TypedTable<NeutrinoRow>,
    truths: TypedTable<TruthRow>,
}

impl fmt::Debug for TruthStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TruthStore")
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl TruthStore {
    /// Create namespace `name` under `location` ("" for the root) with
    /// fresh, empty tables.
    pub fn create(backend: &dyn Backend, location: &str, name: &str) -> Result<Self> {
        let group = join_group(location, name)?;
        backend.create_group(&group)?;
        backend.set_attr(&group, "product", PRODUCT_VMCTRUTH)?;
        backend.set_attr(&group, "layout_version", LAYOUT_VERSION)?;
        let created = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        backend.set_attr(&group, "created", &created)?;

        let truths = TypedTable::new(backend.create_table(
            &group,
            TRUTHS_TABLE,
            &TRUTH_SCHEMA,
            RECORD_CHUNK_ROWS,
        )?);
        let neutrinos = TypedTable::new(backend.create_table(
            &group,
            NEUTRINOS_TABLE,
            &NEUTRINO_SCHEMA,
            RECORD_CHUNK_ROWS,
        )?);
        let particles = TypedTable::new(backend.create_table(
            &group,
            PARTICLES_TABLE,
            &PARTICLE_SCHEMA,
            RECORD_CHUNK_ROWS,
        )?);
        let daughters = TypedTable::new(backend.create_table(
            &group,
            DAUGHTERS_TABLE,
            &DAUGHTER_SCHEMA,
            RECORD_CHUNK_ROWS,
        )?);
        let trajectories = TypedTable::new(backend.create_table(
            &group,
            TRAJECTORIES_TABLE,
            &TRAJECTORY_SCHEMA,
            RECORD_CHUNK_ROWS,
        )?);
        let dict = StringDictionary::create(backend, &group)?;

        info!(group = %group, "created truth namespace");
        Ok(TruthStore {
            group,
            dict,
            trajectories,
            daughters,
            particles,
            neutrinos,
            truths,
        })
    }

    /// Open an existing namespace. Every table and the dictionary must be
    /// present with matching layouts.
    pub fn open(backend: &dyn Backend, location: &str, name: &str) -> Result<Self> {
        let group = join_group(location, name)?;
        backend.open_group(&group)?;
        let product = backend.get_attr(&group, "product")?;
        if product != PRODUCT_VMCTRUTH {
            return Err(BackingStoreError::SchemaMismatch(format!(
                "namespace {group} holds '{product}', expected '{PRODUCT_VMCTRUTH}'"
            ))
            .into());
        }

        let truths = TypedTable::new(backend.open_table(
            &group,
            TRUTHS_TABLE,
            &TRUTH_SCHEMA,
        )?);
        let neutrinos = TypedTable::new(backend.open_table(
            &group,
            NEUTRINOS_TABLE,
            &NEUTRINO_SCHEMA,
        )?);
        let particles = TypedTable::new(backend.open_table(
            &group,
            PARTICLES_TABLE,
            &PARTICLE_SCHEMA,
        )?);
        let daughters = TypedTable::new(backend.open_table(
            &group,
            DAUGHTERS_TABLE,
            &DAUGHTER_SCHEMA,
        )?);
        let trajectories = TypedTable::new(backend.open_table(
            &group,
            TRAJECTORIES_TABLE,
            &TRAJECTORY_SCHEMA,
        )?);
        let dict = StringDictionary::open(backend, &group)?;

        info!(group = %group, truths = truths.nrows(), "opened truth namespace");
        Ok(TruthStore {
            group,
            dict,
            trajectories,
            daughters,
            particles,
            neutrinos,
            truths,
        })
    }

    /// Flatten `events` and append them to all five tables, rebasing
    /// batch-local links onto the rows already present.
    ///
    /// Tables are extended child-first (trajectories, daughters, particles,
    /// neutrinos, truths), so a failure part way through never leaves a
    /// stored row pointing at children that were not written. The error is
    /// returned as-is; [`TruthStore::sizes`] then shows how far the batch
    /// got.
    pub fn append_batch(&mut self, events: &[McTruth]) -> Result<BatchReceipt> {
        if events.is_empty() {
            return Ok(BatchReceipt {
                truths: TableAppend { start: self.truths.nrows(), rows: 0 },
                neutrinos: TableAppend { start: self.neutrinos.nrows(), rows: 0 },
                particles: TableAppend { start: self.particles.nrows(), rows: 0 },
                daughters: TableAppend { start: self.daughters.nrows(), rows: 0 },
                trajectories: TableAppend {
                    start: self.trajectories.nrows(),
                    rows: 0,
                },
                strings_interned: 0,
            });
        }

        let strings_before = self.dict.len();
        let mut batch = flatten_events(events, &mut self.dict)?;

        let trajectory_base = self.trajectories.nrows();
        self.trajectories.append_rows(&batch.trajectories)?;

        let daughter_base = self.daughters.nrows();
        self.daughters.append_rows(&batch.daughters)?;

        for p in &mut batch.particles {
            p.trajectories = p.trajectories.rebase(trajectory_base);
            p.daughters = p.daughters.rebase(daughter_base);
        }
        let particle_base = self.particles.nrows();
        self.particles.append_rows(&batch.particles)?;

        let neutrino_base = self.neutrinos.nrows();
        self.neutrinos.append_rows(&batch.neutrinos)?;

        for t in &mut batch.truths {
            t.particles = t.particles.rebase(particle_base);
            if t.neutrino_index >= 0 {
                t.neutrino_index += neutrino_base as i64;
            }
        }
        let truth_base = self.truths.nrows();
        self.truths.append_rows(&batch.truths)?;

        debug!(
            group = %self.group,
            truths = batch.truths.len(),
            particles = batch.particles.len(),
            trajectories = batch.trajectories.len(),
            "appended batch"
        );
        Ok(BatchReceipt {
            truths: TableAppend {
                start: truth_base,
                rows: batch.truths.len() as u64,
            },
            neutrinos: TableAppend {
                start: neutrino_base,
                rows: batch.neutrinos.len() as u64,
            },
            particles: TableAppend {
                start: particle_base,
                rows: batch.particles.len() as u64,
            },
            daughters: TableAppend {
                start: daughter_base,
                rows: batch.daughters.len() as u64,
            },
            trajectories: TableAppend {
                start: trajectory_base,
                rows: batch.trajectories.len() as u64,
            },
            strings_interned: self.dict.len() - strings_before,
        })
    }

    /// Read the entire contents of all five tables.
    pub fn read_all(&self) -> Result<FlatTruth> {
        Ok(FlatTruth {
            truths: self.truths.read_rows()?,
            neutrinos: self.neutrinos.read_rows()?,
            particles: self.particles.read_rows()?,
            daughters: self.daughters.read_rows()?,
            trajectories: self.trajectories.read_rows()?,
        })
    }

    /// Read everything back as nested records.
    pub fn read_events(&self) -> Result<Vec<McTruth>> {
        assemble_events(&self.read_all()?, &self.dict)
    }

    /// Committed row counts. After a failed batch this shows how far the
    /// fixed table order got.
    pub fn sizes(&self) -> TableSizes {
        TableSizes {
            truths: self.truths.nrows(),
            neutrinos: self.neutrinos.nrows(),
            particles: self.particles.nrows(),
            daughters: self.daughters.nrows(),
            trajectories: self.trajectories.nrows(),
            strings: self.dict.len(),
        }
    }

    pub fn dictionary(&self) -> &StringDictionary {
        &self.dict
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Release the namespace. Equivalent to dropping the handle; releases
    /// never fail.
    pub fn close(self) {
        debug!(group = %self.group, "closing truth namespace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{McNeutrino, McParticle, Origin, TrajectoryPoint};
    use mct_core::errors::McError;
    use mct_core::row::RowRange;
    use mct_core::schema::RowSchema;
    use mct_core::table::ColumnTable;
    use mct_core::MemBackend;

    fn reference_event() -> McTruth {
        McTruth {
            origin: Origin::BeamNeutrino,
            neutrino: Some(McNeutrino {
                ccnc: 1,
                mode: 0,
                target: 1000180400,
                w: 1.8,
                ..Default::default()
            }),
            particles: vec![
                McParticle {
                    track_id: 1,
                    pdg_code: 13,
                    status: 1,
                    process: "primary".into(),
                    end_process: "muMinusCaptureAtRest".into(),
                    mass: 0.1057,
                    trajectory: vec![
                        TrajectoryPoint { z: 0.0, e: 2.0, ..Default::default() },
                        TrajectoryPoint { z: 10.0, e: 1.6, ..Default::default() },
                        TrajectoryPoint { z: 20.0, e: 1.1, ..Default::default() },
                    ],
                    daughters: vec![2],
                    ..Default::default()
                },
                McParticle {
                    track_id: 2,
                    pdg_code: 11,
                    mother: 1,
                    process: "muMinusCaptureAtRest".into(),
                    end_process: "eIoni".into(),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn create_append_read_back() {
        let be = MemBackend::new();
        let mut store = TruthStore::create(&be, "", "evt0").unwrap();

        let receipt = store.append_batch(&[reference_event()]).unwrap();
        assert_eq!(receipt.truths, TableAppend { start: 0, rows: 1 });
        assert_eq!(receipt.particles, TableAppend { start: 0, rows: 2 });
        assert_eq!(receipt.trajectories, TableAppend { start: 0, rows: 3 });
        assert_eq!(receipt.strings_interned, 3);

        let flat = store.read_all().unwrap();
        let p0 = flat.particles[0];
        assert_eq!(p0.trajectories, RowRange { start: 0, end: 2 });
        assert_eq!(p0.daughters, RowRange { start: 0, end: 0 });
        assert_eq!(flat.particles[1].trajectories, RowRange::NONE);
        assert_eq!(flat.particles[1].daughters, RowRange::NONE);
        assert_eq!(flat.truths[0].particles, RowRange { start: 0, end: 1 });
        assert_eq!(flat.truths[0].neutrino_index, 0);

        let events = store.read_events().unwrap();
        assert_eq!(events, vec![reference_event()]);
    }

    #[test]
    fn second_batch_is_rebased_onto_the_first() {
        let be = MemBackend::new();
        let mut store = TruthStore::create(&be, "", "evt0").unwrap();
        store.append_batch(&[reference_event()]).unwrap();
        let receipt = store.append_batch(&[reference_event()]).unwrap();

        assert_eq!(receipt.truths, TableAppend { start: 1, rows: 1 });
        assert_eq!(receipt.particles, TableAppend { start: 2, rows: 2 });
        assert_eq!(receipt.strings_interned, 0);

        let flat = store.read_all().unwrap();
        assert_eq!(flat.truths[1].particles, RowRange { start: 2, end: 3 });
        assert_eq!(flat.truths[1].neutrino_index, 1);
        assert_eq!(
            flat.particles[2].trajectories,
            RowRange { start: 3, end: 5 }
        );
        assert_eq!(flat.particles[2].daughters, RowRange { start: 1, end: 1 });

        let events = store.read_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], events[1]);
    }

    #[test]
    fn empty_batch_touches_nothing() {
        let be = MemBackend::new();
        let mut store = TruthStore::create(&be, "", "evt0").unwrap();
        store.append_batch(&[reference_event()]).unwrap();
        let before = store.sizes();

        let receipt = store.append_batch(&[]).unwrap();
        assert_eq!(receipt.truths, TableAppend { start: 1, rows: 0 });
        assert_eq!(receipt.strings_interned, 0);
        assert_eq!(store.sizes(), before);
    }

    #[test]
    fn record_without_neutrino_stores_the_sentinel() {
        let be = MemBackend::new();
        let mut store = TruthStore::create(&be, "", "evt0").unwrap();
        store
            .append_batch(&[McTruth {
                origin: Origin::SingleParticle,
                ..Default::default()
            }])
            .unwrap();

        let flat = store.read_all().unwrap();
        assert_eq!(flat.truths[0].neutrino_index, -1);
        assert!(flat.truths[0].particles.is_none());
        assert!(flat.neutrinos.is_empty());
    }

    #[test]
    fn create_twice_already_exists() {
        let be = MemBackend::new();
        TruthStore::create(&be, "", "evt0").unwrap();
        let err = TruthStore::create(&be, "", "evt0").unwrap_err();
        assert!(matches!(
            err,
            McError::BackingStore(BackingStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn open_missing_is_not_found() {
        let be = MemBackend::new();
        let err = TruthStore::open(&be, "", "absent").unwrap_err();
        assert!(matches!(err, McError::NotFound(_)));
    }

    #[test]
    fn bad_namespace_name_is_invalid_argument() {
        let be = MemBackend::new();
        let err = TruthStore::create(&be, "", "a/b").unwrap_err();
        assert!(matches!(err, McError::InvalidArgument(_)));
    }

    // Backend wrapper that fails every append to one named table, for
    // watching how far a batch gets.
    struct Tripwire {
        inner: MemBackend,
        fail_table: &'static str,
    }

    struct TrippedTable {
        inner: Box<dyn ColumnTable>,
        fail: bool,
    }

    impl ColumnTable for TrippedTable {
        fn schema(&self) -> &'static RowSchema {
            self.inner.schema()
        }
        fn nrows(&self) -> u64 {
            self.inner.nrows()
        }
        fn append(&mut self, data: &[u8]) -> Result<()> {
            if self.fail {
                return Err(BackingStoreError::Io(std::io::Error::other(
                    "injected append failure",
                ))
                .into());
            }
            self.inner.append(data)
        }
        fn read_all(&self) -> Result<Vec<u8>> {
            self.inner.read_all()
        }
    }

    impl Backend for Tripwire {
        fn create_group(&self, path: &str) -> Result<()> {
            self.inner.create_group(path)
        }
        fn open_group(&self, path: &str) -> Result<()> {
            self.inner.open_group(path)
        }
        fn set_attr(&self, group: &str, name: &str, value: &str) -> Result<()> {
            self.inner.set_attr(group, name, value)
        }
        fn get_attr(&self, group: &str, name: &str) -> Result<String> {
            self.inner.get_attr(group, name)
        }
        fn create_table(
            &self,
            group: &str,
            name: &str,
            schema: &'static RowSchema,
            chunk_rows: u64,
        ) -> Result<Box<dyn ColumnTable>> {
            let inner = self.inner.create_table(group, name, schema, chunk_rows)?;
            Ok(Box::new(TrippedTable { inner, fail: name == self.fail_table }))
        }
        fn open_table(
            &self,
            group: &str,
            name: &str,
            schema: &'static RowSchema,
        ) -> Result<Box<dyn ColumnTable>> {
            let inner = self.inner.open_table(group, name, schema)?;
            Ok(Box::new(TrippedTable { inner, fail: name == self.fail_table }))
        }
    }

    #[test]
    fn failed_batch_stops_at_the_broken_table() {
        let be = Tripwire { inner: MemBackend::new(), fail_table: PARTICLES_TABLE };
        let mut store = TruthStore::create(&be, "", "evt0").unwrap();
        store.append_batch(&[reference_event()]).unwrap_err();

        // child tables before particles took the batch, the rest did not
        let sizes = store.sizes();
        assert_eq!(sizes.trajectories, 3);
        assert_eq!(sizes.daughters, 1);
        assert_eq!(sizes.particles, 0);
        assert_eq!(sizes.neutrinos, 0);
        assert_eq!(sizes.truths, 0);

        // the view still reads: no truth rows point at the orphans
        assert!(store.read_events().unwrap().is_empty());
    }
}
