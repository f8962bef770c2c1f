//! Tree-to-row flattening and its inverse.
//!
//! `flatten_events` turns a batch of nested truth records into five
//! parallel row vectors whose link cells are batch-local (zero-based on
//! this batch). The store rebases those links onto table-absolute offsets
//! at append time; reading the whole namespace back makes absolute indices
//! equal vector positions again, which is what `assemble_events` expects.

use mct_core::dictionary::StringDictionary;
use mct_core::errors::{BackingStoreError, McError, Result};
use mct_core::row::RowRange;

use crate::event::{McNeutrino, McParticle, McTruth, TrajectoryPoint};
use crate::rows::{DaughterRow, NeutrinoRow, ParticleRow, TrajectoryRow, TruthRow};

/// Row vectors of the five truth-family tables, parallel to one another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTruth {
    pub truths: Vec<TruthRow>,
    pub neutrinos: Vec<NeutrinoRow>,
    pub particles: Vec<ParticleRow>,
    pub daughters: Vec<DaughterRow>,
    pub trajectories: Vec<TrajectoryRow>,
}

impl FlatTruth {
    pub fn is_empty(&self) -> bool {
        self.truths.is_empty()
            && self.neutrinos.is_empty()
            && self.particles.is_empty()
            && self.daughters.is_empty()
            && self.trajectories.is_empty()
    }
}

/// Flatten nested records into batch-local rows, interning process labels
/// through `dict` as particles are walked.
///
/// Per particle: trajectory points, then daughter edges, then the particle
/// row pointing at both blocks. Per record: all particles, then the
/// neutrino summary if present, then the truth row. A particle with no
/// trajectory (or no daughters) gets the `(-1, -1)` sentinel; a record
/// with no neutrino gets `neutrino_index = -1`.
pub fn flatten_events(
    events: &[McTruth],
    dict: &mut StringDictionary,
) -> Result<FlatTruth> {
    let mut out = FlatTruth::default();
    for ev in events {
        let particle_start = out.particles.len() as u64;
        for p in &ev.particles {
            let process_index = dict.get_or_insert(&p.process)?;
            let endprocess_index = dict.get_or_insert(&p.end_process)?;

            let traj_start = out.trajectories.len() as u64;
            for tp in &p.trajectory {
                out.trajectories.push(TrajectoryRow {
                    x: tp.x,
                    y: tp.y,
                    z: tp.z,
                    t: tp.t,
                    px: tp.px,
                    py: tp.py,
                    pz: tp.pz,
                    e: tp.e,
                });
            }
            let trajectories =
                RowRange::from_extent(traj_start, p.trajectory.len() as u64);

            let daughter_start = out.daughters.len() as u64;
            for &child in &p.daughters {
                out.daughters.push(DaughterRow {
                    parent_track: p.track_id as u64,
                    child_track: child as u64,
                });
            }
            let daughters =
                RowRange::from_extent(daughter_start, p.daughters.len() as u64);

            out.particles.push(ParticleRow {
                status: p.status,
                track_id: p.track_id,
                pdg_code: p.pdg_code,
                mother: p.mother,
                process_index,
                endprocess_index,
                mass: p.mass,
                polarization_x: p.polarization_x,
                polarization_y: p.polarization_y,
                polarization_z: p.polarization_z,
                weight: p.weight,
                gvtx_e: p.gvtx_e,
                gvtx_x: p.gvtx_x,
                gvtx_y: p.gvtx_y,
                gvtx_z: p.gvtx_z,
                rescatter: p.rescatter,
                trajectories,
                daughters,
            });
        }
        let particles =
            RowRange::from_extent(particle_start, ev.particles.len() as u64);

        let neutrino_index = match &ev.neutrino {
            Some(nu) => {
                out.neutrinos.push(NeutrinoRow {
                    mode: nu.mode,
                    interaction_type: nu.interaction_type,
                    ccnc: nu.ccnc,
                    target: nu.target,
                    hit_nuc: nu.hit_nuc,
                    hit_quark: nu.hit_quark,
                    w: nu.w,
                    x: nu.x,
                    y: nu.y,
                    q_sqr: nu.q_sqr,
                });
                (out.neutrinos.len() - 1) as i64
            }
            None => -1,
        };

        out.truths.push(TruthRow {
            origin: ev.origin,
            neutrino_index,
            particles,
        });
    }
    Ok(out)
}

fn corrupt(msg: String) -> McError {
    BackingStoreError::Corrupt(msg).into()
}

fn slice_range<'a, T>(rows: &'a [T], range: RowRange, what: &str) -> Result<&'a [T]> {
    if range.start == -1 && range.end == -1 {
        return Ok(&[]);
    }
    if range.start < 0 || range.end < range.start {
        return Err(corrupt(format!(
            "{what} ({}, {}) is malformed",
            range.start, range.end
        )));
    }
    rows.get(range.start as usize..=range.end as usize).ok_or_else(|| {
        corrupt(format!(
            "{what} ({}, {}) exceeds {} rows",
            range.start,
            range.end,
            rows.len()
        ))
    })
}

/// Rebuild nested records from whole-table row vectors.
///
/// `rows` must hold entire tables, so that the absolute link cells address
/// vector positions directly. Out-of-bounds links, malformed ranges and
/// dangling dictionary indices all surface as corruption.
pub fn assemble_events(
    rows: &FlatTruth,
    dict: &StringDictionary,
) -> Result<Vec<McTruth>> {
    let mut events = Vec::with_capacity(rows.truths.len());
    for t in &rows.truths {
        let neutrino = if t.neutrino_index < 0 {
            None
        } else {
            let nu = rows
                .neutrinos
                .get(t.neutrino_index as usize)
                .ok_or_else(|| {
                    corrupt(format!(
                        "neutrino index {} exceeds {} rows",
                        t.neutrino_index,
                        rows.neutrinos.len()
                    ))
                })?;
            Some(McNeutrino {
                mode: nu.mode,
                interaction_type: nu.interaction_type,
                ccnc: nu.ccnc,
                target: nu.target,
                hit_nuc: nu.hit_nuc,
                hit_quark: nu.hit_quark,
                w: nu.w,
                x: nu.x,
                y: nu.y,
                q_sqr: nu.q_sqr,
            })
        };

        let particle_rows =
            slice_range(&rows.particles, t.particles, "truth particle range")?;
        let mut particles = Vec::with_capacity(particle_rows.len());
        for p in particle_rows {
            let trajectory = slice_range(
                &rows.trajectories,
                p.trajectories,
                "particle trajectory range",
            )?
            .iter()
            .map(|r| TrajectoryPoint {
                x: r.x,
                y: r.y,
                z: r.z,
                t: r.t,
                px: r.px,
                py: r.py,
                pz: r.pz,
                e: r.e,
            })
            .collect();

            let daughters = slice_range(
                &rows.daughters,
                p.daughters,
                "particle daughter range",
            )?
            .iter()
            .map(|d| d.child_track as i32)
            .collect();

            let process = dict
                .resolve(p.process_index)
                .ok_or_else(|| {
                    corrupt(format!(
                        "process index {} missing from dictionary",
                        p.process_index
                    ))
                })?
                .to_string();
            let end_process = dict
                .resolve(p.endprocess_index)
                .ok_or_else(|| {
                    corrupt(format!(
                        "end process index {} missing from dictionary",
                        p.endprocess_index
                    ))
                })?
                .to_string();

            particles.push(McParticle {
                status: p.status,
                track_id: p.track_id,
                pdg_code: p.pdg_code,
                mother: p.mother,
                process,
                end_process,
                mass: p.mass,
                polarization_x: p.polarization_x,
                polarization_y: p.polarization_y,
                polarization_z: p.polarization_z,
                weight: p.weight,
                gvtx_e: p.gvtx_e,
                gvtx_x: p.gvtx_x,
                gvtx_y: p.gvtx_y,
                gvtx_z: p.gvtx_z,
                rescatter: p.rescatter,
                trajectory,
                daughters,
            });
        }

        events.push(McTruth {
            origin: t.origin,
            neutrino,
            particles,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Origin;
    use mct_core::{Backend, MemBackend};

    fn dict() -> StringDictionary {
        let be = MemBackend::new();
        be.create_group("evt").unwrap();
        StringDictionary::create(&be, "evt").unwrap()
    }

    fn two_particle_event() -> McTruth {
        McTruth {
            origin: Origin::BeamNeutrino,
            neutrino: Some(McNeutrino {
                ccnc: 1,
                mode: 3,
                q_sqr: 1.25,
                ..Default::default()
            }),
            particles: vec![
                McParticle {
                    track_id: 10,
                    pdg_code: 13,
                    process: "primary".into(),
                    end_process: "Decay".into(),
                    trajectory: vec![
                        TrajectoryPoint { x: 0.0, e: 1.0, ..Default::default() },
                        TrajectoryPoint { x: 1.0, e: 0.9, ..Default::default() },
                        TrajectoryPoint { x: 2.0, e: 0.8, ..Default::default() },
                    ],
                    daughters: vec![11],
                    ..Default::default()
                },
                McParticle {
                    track_id: 11,
                    pdg_code: 11,
                    mother: 10,
                    process: "Decay".into(),
                    end_process: "eIoni".into(),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn single_event_links_are_batch_local() {
        let mut dict = dict();
        let flat = flatten_events(&[two_particle_event()], &mut dict).unwrap();

        assert_eq!(flat.truths.len(), 1);
        assert_eq!(flat.neutrinos.len(), 1);
        assert_eq!(flat.particles.len(), 2);
        assert_eq!(flat.daughters.len(), 1);
        assert_eq!(flat.trajectories.len(), 3);

        let p0 = flat.particles[0];
        assert_eq!(p0.trajectories, RowRange { start: 0, end: 2 });
        assert_eq!(p0.daughters, RowRange { start: 0, end: 0 });

        let p1 = flat.particles[1];
        assert_eq!(p1.trajectories, RowRange::NONE);
        assert_eq!(p1.daughters, RowRange::NONE);

        let t = flat.truths[0];
        assert_eq!(t.particles, RowRange { start: 0, end: 1 });
        assert_eq!(t.neutrino_index, 0);

        assert_eq!(flat.daughters[0].parent_track, 10);
        assert_eq!(flat.daughters[0].child_track, 11);
    }

    #[test]
    fn labels_intern_in_walk_order() {
        let mut dict = dict();
        flatten_events(&[two_particle_event()], &mut dict).unwrap();
        // p0: primary, Decay; p1: Decay (hit), eIoni
        assert_eq!(dict.strings(), &["primary", "Decay", "eIoni"]);
    }

    #[test]
    fn no_events_flattens_to_nothing() {
        let mut dict = dict();
        let flat = flatten_events(&[], &mut dict).unwrap();
        assert!(flat.is_empty());
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn second_event_rows_follow_the_first() {
        let mut dict = dict();
        let ev = two_particle_event();
        let flat = flatten_events(&[ev.clone(), ev], &mut dict).unwrap();

        assert_eq!(flat.truths[1].particles, RowRange { start: 2, end: 3 });
        assert_eq!(flat.truths[1].neutrino_index, 1);
        assert_eq!(
            flat.particles[2].trajectories,
            RowRange { start: 3, end: 5 }
        );
        assert_eq!(flat.particles[2].daughters, RowRange { start: 1, end: 1 });
        // labels are shared, nothing new interned for the clone
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn assemble_inverts_flatten() {
        let mut dict = dict();
        let events = vec![
            two_particle_event(),
            McTruth { origin: Origin::CosmicRay, ..Default::default() },
        ];
        let flat = flatten_events(&events, &mut dict).unwrap();
        let back = assemble_events(&flat, &dict).unwrap();
        assert_eq!(back, events);
    }

    #[test]
    fn malformed_range_is_corrupt() {
        let mut dict = dict();
        let mut flat =
            flatten_events(&[two_particle_event()], &mut dict).unwrap();
        flat.truths[0].particles = RowRange { start: 1, end: 0 };
        let err = assemble_events(&flat, &dict).unwrap_err();
        assert!(matches!(
            err,
            McError::BackingStore(BackingStoreError::Corrupt(_))
        ));
    }

    #[test]
    fn out_of_bounds_link_is_corrupt() {
        let mut dict = dict();
        let mut flat =
            flatten_events(&[two_particle_event()], &mut dict).unwrap();
        flat.particles[0].trajectories = RowRange { start: 2, end: 5 };
        assert!(assemble_events(&flat, &dict).is_err());
    }

    #[test]
    fn dangling_dictionary_index_is_corrupt() {
        let mut dict = dict();
        let mut flat =
            flatten_events(&[two_particle_event()], &mut dict).unwrap();
        flat.particles[0].process_index = 99;
        assert!(assemble_events(&flat, &dict).is_err());
    }
}
