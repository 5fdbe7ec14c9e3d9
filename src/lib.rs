// Confined blasts: procedural dust and sparks shaped by the surroundings of a detonation
pub mod blast;
pub mod confined_blast;
pub mod confinement;
pub mod constants;
pub mod context;
pub mod error;
pub mod geometry;
pub mod plugin;
pub mod pool;
pub mod ray_batch;
pub mod ray_directions;
pub mod spatial_grid;
pub mod xorshift;

pub use blast::{Blast, ParticleKind, ParticleSink, ParticleSpawn, ParticleTally};
pub use confined_blast::{ConfinedBlast, ConfinedBlastConfig, Detonation, DetonationReport};
pub use context::{BlastCategory, BlastContext};
pub use plugin::{ConfinedBlastPlugin, ConfinementReport, Detonate, ParticleSpawned};
