pub mod event;
pub mod rows;
pub mod flatten;
pub mod truth_store;
pub mod hit_store;

pub use event::{McNeutrino, McParticle, McTruth, Origin, TrajectoryPoint};
pub use flatten::{assemble_events, flatten_events, FlatTruth};
pub use hit_store::HitStore;
pub use rows::{
    DaughterRow, HitRow, NeutrinoRow, ParticleRow, TrajectoryRow, TruthRow,
};
pub use truth_store::{BatchReceipt, TableAppend, TableSizes, TruthStore};
