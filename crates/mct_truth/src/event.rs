//! Nested in-memory truth records.
//!
//! This is the tree shape producers and analysis code work with: a truth
//! record owns an optional neutrino summary and a list of particles, each
//! particle owns its trajectory points and daughter track ids. Flattening
//! these trees into parallel tables lives in [`crate::flatten`]; nothing
//! here knows about row offsets or storage.

use serde::{Deserialize, Serialize};

/// How a truth record came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Unknown,
    BeamNeutrino,
    CosmicRay,
    SuperNovaParticle,
    SingleParticle,
}

impl Origin {
    /// Wire code stored in the truth table.
    pub const fn code(self) -> i32 {
        match self {
            Origin::Unknown => 0,
            Origin::BeamNeutrino => 1,
            Origin::CosmicRay => 2,
            Origin::SuperNovaParticle => 3,
            Origin::SingleParticle => 4,
        }
    }

    pub const fn from_code(code: i32) -> Option<Origin> {
        match code {
            0 => Some(Origin::Unknown),
            1 => Some(Origin::BeamNeutrino),
            2 => Some(Origin::CosmicRay),
            3 => Some(Origin::SuperNovaParticle),
            4 => Some(Origin::SingleParticle),
            _ => None,
        }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Origin::Unknown
    }
}

/// Generator-level neutrino summary attached to at most one truth record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct McNeutrino {
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

/// One sampled point of a particle trajectory: position, time and
/// four-momentum.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

/// One simulated particle.
///
/// `process` and `end_process` are free-form generator labels ("primary",
/// "conv", "muIoni", ...); storage interns them through the namespace
/// dictionary. `daughters` holds child track ids, not table positions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct McParticle {
    pub status: i32,
    pub track_id: i32,
    pub pdg_code: i32,
    pub mother: i32,
    pub process: String,
    pub end_process: String,
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
    pub trajectory: Vec<TrajectoryPoint>,
    pub daughters: Vec<i32>,
}

/// One generator truth record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct McTruth {
    pub origin: Origin,
    pub neutrino: Option<McNeutrino>,
    pub particles: Vec<McParticle>,
}
