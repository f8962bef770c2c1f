//! Flat row types and their table layouts.
//!
//! One struct per table, one static [`RowSchema`] per struct, kept next to
//! each other so the codec and the descriptor can be eyeballed together.
//! Link cells (`neutrino_index`, the `*_start`/`*_end` pairs) are signed
//! 64-bit so the no-child sentinel `(-1, -1)` and the no-neutrino `-1` fit;
//! everything else matches the producer types.

use mct_core::errors::{BackingStoreError, Result};
use mct_core::row::{
    check_len, f32_at, f64_at, i32_at, i64_at, u32_at, u64_at, Row, RowRange,
};
use mct_core::schema::{FieldDef, FieldKind, RowSchema};

use crate::event::Origin;

pub static TRUTH_SCHEMA: RowSchema = RowSchema {
    name: "truth",
    row_len: 28,
    fields: &[
        FieldDef { name: "origin", offset: 0, kind: FieldKind::I32 },
        FieldDef { name: "neutrino_index", offset: 4, kind: FieldKind::I64 },
        FieldDef { name: "particle_start", offset: 12, kind: FieldKind::I64 },
        FieldDef { name: "particle_end", offset: 20, kind: FieldKind::I64 },
    ],
};

pub static NEUTRINO_SCHEMA: RowSchema = RowSchema {
    name: "neutrino",
    row_len: 56,
    fields: &[
        FieldDef { name: "mode", offset: 0, kind: FieldKind::I32 },
        FieldDef { name: "interaction_type", offset: 4, kind: FieldKind::I32 },
        FieldDef { name: "ccnc", offset: 8, kind: FieldKind::I32 },
        FieldDef { name: "target", offset: 12, kind: FieldKind::I32 },
        FieldDef { name: "hit_nuc", offset: 16, kind: FieldKind::I32 },
        FieldDef { name: "hit_quark", offset: 20, kind: FieldKind::I32 },
        FieldDef { name: "w", offset: 24, kind: FieldKind::F64 },
        FieldDef { name: "x", offset: 32, kind: FieldKind::F64 },
        FieldDef { name: "y", offset: 40, kind: FieldKind::F64 },
        FieldDef { name: "q_sqr", offset: 48, kind: FieldKind::F64 },
    ],
};

pub static PARTICLE_SCHEMA: RowSchema = RowSchema {
    name: "particle",
    row_len: 140,
    fields: &[
        FieldDef { name: "status", offset: 0, kind: FieldKind::I32 },
        FieldDef { name: "track_id", offset: 4, kind: FieldKind::I32 },
        FieldDef { name: "pdg_code", offset: 8, kind: FieldKind::I32 },
        FieldDef { name: "mother", offset: 12, kind: FieldKind::I32 },
        FieldDef { name: "process_index", offset: 16, kind: FieldKind::U64 },
        FieldDef { name: "endprocess_index", offset: 24, kind: FieldKind::U64 },
        FieldDef { name: "mass", offset: 32, kind: FieldKind::F64 },
        FieldDef { name: "polarization_x", offset: 40, kind: FieldKind::F64 },
        FieldDef { name: "polarization_y", offset: 48, kind: FieldKind::F64 },
        FieldDef { name: "polarization_z", offset: 56, kind: FieldKind::F64 },
        FieldDef { name: "weight", offset: 64, kind: FieldKind::F64 },
        FieldDef { name: "gvtx_e", offset: 72, kind: FieldKind::F64 },
        FieldDef { name: "gvtx_x", offset: 80, kind: FieldKind::F64 },
        FieldDef { name: "gvtx_y", offset: 88, kind: FieldKind::F64 },
        FieldDef { name: "gvtx_z", offset: 96, kind: FieldKind::F64 },
        FieldDef { name: "rescatter", offset: 104, kind: FieldKind::I32 },
        FieldDef { name: "trajectory_start", offset: 108, kind: FieldKind::I64 },
        FieldDef { name: "trajectory_end", offset: 116, kind: FieldKind::I64 },
        FieldDef { name: "daughter_start", offset: 124, kind: FieldKind::I64 },
        FieldDef { name: "daughter_end", offset: 132, kind: FieldKind::I64 },
    ],
};

pub static TRAJECTORY_SCHEMA: RowSchema = RowSchema {
    name: "trajectory",
    row_len: 64,
    fields: &[
        FieldDef { name: "x", offset: 0, kind: FieldKind::F64 },
        FieldDef { name: "y", offset: 8, kind: FieldKind::F64 },
        FieldDef { name: "z", offset: 16, kind: FieldKind::F64 },
        FieldDef { name: "t", offset: 24, kind: FieldKind::F64 },
        FieldDef { name: "px", offset: 32, kind: FieldKind::F64 },
        FieldDef { name: "py", offset: 40, kind: FieldKind::F64 },
        FieldDef { name: "pz", offset: 48, kind: FieldKind::F64 },
        FieldDef { name: "e", offset: 56, kind: FieldKind::F64 },
    ],
};

pub static DAUGHTER_SCHEMA: RowSchema = RowSchema {
    name: "daughter",
    row_len: 16,
    fields: &[
        FieldDef { name: "parent_track", offset: 0, kind: FieldKind::U64 },
        FieldDef { name: "child_track", offset: 8, kind: FieldKind::U64 },
    ],
};

pub static HIT_SCHEMA: RowSchema = RowSchema {
    name: "hit",
    row_len: 40,
    fields: &[
        FieldDef { name: "signal_time", offset: 0, kind: FieldKind::F32 },
        FieldDef { name: "signal_width", offset: 4, kind: FieldKind::F32 },
        FieldDef { name: "peak_amp", offset: 8, kind: FieldKind::F32 },
        FieldDef { name: "charge", offset: 12, kind: FieldKind::F32 },
        FieldDef { name: "part_vertex_x", offset: 16, kind: FieldKind::F32 },
        FieldDef { name: "part_vertex_y", offset: 20, kind: FieldKind::F32 },
        FieldDef { name: "part_vertex_z", offset: 24, kind: FieldKind::F32 },
        FieldDef { name: "part_energy", offset: 28, kind: FieldKind::F32 },
        FieldDef { name: "part_track_id", offset: 32, kind: FieldKind::I32 },
        FieldDef { name: "channel", offset: 36, kind: FieldKind::U32 },
    ],
};

/// Every layout this crate persists, dictionary excluded.
pub static SCHEMAS: [&RowSchema; 6] = [
    &TRUTH_SCHEMA,
    &NEUTRINO_SCHEMA,
    &PARTICLE_SCHEMA,
    &DAUGHTER_SCHEMA,
    &TRAJECTORY_SCHEMA,
    &HIT_SCHEMA,
];

/// One `truths` table row. `particles` points into the particle table;
/// `neutrino_index` is `-1` when the record has no neutrino summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruthRow {
    pub origin: Origin,
    pub neutrino_index: i64,
    pub particles: RowRange,
}

impl Row for TruthRow {
    fn schema() -> &'static RowSchema {
        &TRUTH_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.origin.code().to_le_bytes());
        out.extend_from_slice(&self.neutrino_index.to_le_bytes());
        out.extend_from_slice(&self.particles.start.to_le_bytes());
        out.extend_from_slice(&self.particles.end.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&TRUTH_SCHEMA, buf)?;
        let code = i32_at(buf, 0);
        let origin = Origin::from_code(code).ok_or_else(|| {
            BackingStoreError::Corrupt(format!("unknown origin code {code}"))
        })?;
        Ok(TruthRow {
            origin,
            neutrino_index: i64_at(buf, 4),
            particles: RowRange { start: i64_at(buf, 12), end: i64_at(buf, 20) },
        })
    }
}

/// One `neutrinos` table row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NeutrinoRow {
    pub mode: i32,
    pub interaction_type: i32,
    pub ccnc: i32,
    pub target: i32,
    pub hit_nuc: i32,
    pub hit_quark: i32,
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub q_sqr: f64,
}

impl Row for NeutrinoRow {
    fn schema() -> &'static RowSchema {
        &NEUTRINO_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.mode.to_le_bytes());
        out.extend_from_slice(&self.interaction_type.to_le_bytes());
        out.extend_from_slice(&self.ccnc.to_le_bytes());
        out.extend_from_slice(&self.target.to_le_bytes());
        out.extend_from_slice(&self.hit_nuc.to_le_bytes());
        out.extend_from_slice(&self.hit_quark.to_le_bytes());
        out.extend_from_slice(&self.w.to_le_bytes());
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.q_sqr.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&NEUTRINO_SCHEMA, buf)?;
        Ok(NeutrinoRow {
            mode: i32_at(buf, 0),
            interaction_type: i32_at(buf, 4),
            ccnc: i32_at(buf, 8),
            target: i32_at(buf, 12),
            hit_nuc: i32_at(buf, 16),
            hit_quark: i32_at(buf, 20),
            w: f64_at(buf, 24),
            x: f64_at(buf, 32),
            y: f64_at(buf, 40),
            q_sqr: f64_at(buf, 48),
        })
    }
}

/// One `particles` table row. The two string labels live in the namespace
/// dictionary; `trajectories` and `daughters` point into their tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleRow {
    pub status: i32,
    pub track_id: i32,
    pub pdg_code: i32,
    pub mother: i32,
    pub process_index: u64,
    pub endprocess_index: u64,
    pub mass: f64,
    pub polarization_x: f64,
    pub polarization_y: f64,
    pub polarization_z: f64,
    pub weight: f64,
    pub gvtx_e: f64,
    pub gvtx_x: f64,
    pub gvtx_y: f64,
    pub gvtx_z: f64,
    pub rescatter: i32,
    pub trajectories: RowRange,
    pub daughters: RowRange,
}

impl Row for ParticleRow {
    fn schema() -> &'static RowSchema {
        &PARTICLE_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.status.to_le_bytes());
        out.extend_from_slice(&self.track_id.to_le_bytes());
        out.extend_from_slice(&self.pdg_code.to_le_bytes());
        out.extend_from_slice(&self.mother.to_le_bytes());
        out.extend_from_slice(&self.process_index.to_le_bytes());
        out.extend_from_slice(&self.endprocess_index.to_le_bytes());
        out.extend_from_slice(&self.mass.to_le_bytes());
        out.extend_from_slice(&self.polarization_x.to_le_bytes());
        out.extend_from_slice(&self.polarization_y.to_le_bytes());
        out.extend_from_slice(&self.polarization_z.to_le_bytes());
        out.extend_from_slice(&self.weight.to_le_bytes());
        out.extend_from_slice(&self.gvtx_e.to_le_bytes());
        out.extend_from_slice(&self.gvtx_x.to_le_bytes());
        out.extend_from_slice(&self.gvtx_y.to_le_bytes());
        out.extend_from_slice(&self.gvtx_z.to_le_bytes());
        out.extend_from_slice(&self.rescatter.to_le_bytes());
        out.extend_from_slice(&self.trajectories.start.to_le_bytes());
        out.extend_from_slice(&self.trajectories.end.to_le_bytes());
        out.extend_from_slice(&self.daughters.start.to_le_bytes());
        out.extend_from_slice(&self.daughters.end.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&PARTICLE_SCHEMA, buf)?;
        Ok(ParticleRow {
            status: i32_at(buf, 0),
            track_id: i32_at(buf, 4),
            pdg_code: i32_at(buf, 8),
            mother: i32_at(buf, 12),
            process_index: u64_at(buf, 16),
            endprocess_index: u64_at(buf, 24),
            mass: f64_at(buf, 32),
            polarization_x: f64_at(buf, 40),
            polarization_y: f64_at(buf, 48),
            polarization_z: f64_at(buf, 56),
            weight: f64_at(buf, 64),
            gvtx_e: f64_at(buf, 72),
            gvtx_x: f64_at(buf, 80),
            gvtx_y: f64_at(buf, 88),
            gvtx_z: f64_at(buf, 96),
            rescatter: i32_at(buf, 104),
            trajectories: RowRange {
                start: i64_at(buf, 108),
                end: i64_at(buf, 116),
            },
            daughters: RowRange {
                start: i64_at(buf, 124),
                end: i64_at(buf, 132),
            },
        })
    }
}

/// One `trajectories` table row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrajectoryRow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl Row for TrajectoryRow {
    fn schema() -> &'static RowSchema {
        &TRAJECTORY_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.z.to_le_bytes());
        out.extend_from_slice(&self.t.to_le_bytes());
        out.extend_from_slice(&self.px.to_le_bytes());
        out.extend_from_slice(&self.py.to_le_bytes());
        out.extend_from_slice(&self.pz.to_le_bytes());
        out.extend_from_slice(&self.e.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&TRAJECTORY_SCHEMA, buf)?;
        Ok(TrajectoryRow {
            x: f64_at(buf, 0),
            y: f64_at(buf, 8),
            z: f64_at(buf, 16),
            t: f64_at(buf, 24),
            px: f64_at(buf, 32),
            py: f64_at(buf, 40),
            pz: f64_at(buf, 48),
            e: f64_at(buf, 56),
        })
    }
}

/// One `daughters` table row: a parent/child edge in track-id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaughterRow {
    pub parent_track: u64,
    pub child_track: u64,
}

impl Row for DaughterRow {
    fn schema() -> &'static RowSchema {
        &DAUGHTER_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.parent_track.to_le_bytes());
        out.extend_from_slice(&self.child_track.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&DAUGHTER_SCHEMA, buf)?;
        Ok(DaughterRow {
            parent_track: u64_at(buf, 0),
            child_track: u64_at(buf, 8),
        })
    }
}

/// One `mchits` table row: a reconstructed charge deposit on a channel,
/// tagged with the contributing particle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HitRow {
    pub signal_time: f32,
    pub signal_width: f32,
    pub peak_amp: f32,
    pub charge: f32,
    pub part_vertex_x: f32,
    pub part_vertex_y: f32,
    pub part_vertex_z: f32,
    pub part_energy: f32,
    pub part_track_id: i32,
    pub channel: u32,
}

impl Row for HitRow {
    fn schema() -> &'static RowSchema {
        &HIT_SCHEMA
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signal_time.to_le_bytes());
        out.extend_from_slice(&self.signal_width.to_le_bytes());
        out.extend_from_slice(&self.peak_amp.to_le_bytes());
        out.extend_from_slice(&self.charge.to_le_bytes());
        out.extend_from_slice(&self.part_vertex_x.to_le_bytes());
        out.extend_from_slice(&self.part_vertex_y.to_le_bytes());
        out.extend_from_slice(&self.part_vertex_z.to_le_bytes());
        out.extend_from_slice(&self.part_energy.to_le_bytes());
        out.extend_from_slice(&self.part_track_id.to_le_bytes());
        out.extend_from_slice(&self.channel.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(&HIT_SCHEMA, buf)?;
        Ok(HitRow {
            signal_time: f32_at(buf, 0),
            signal_width: f32_at(buf, 4),
            peak_amp: f32_at(buf, 8),
            charge: f32_at(buf, 12),
            part_vertex_x: f32_at(buf, 16),
            part_vertex_y: f32_at(buf, 20),
            part_vertex_z: f32_at(buf, 24),
            part_energy: f32_at(buf, 28),
            part_track_id: i32_at(buf, 32),
            channel: u32_at(buf, 36),
        })
    }
}
