// Capabilities at the content boundary
// Pre-authored blast effects are played through `Blast`; single procedural particles go
// through `ParticleSink`. Neither knows anything about confinement.
use bevy::prelude::*;

/// A pre-authored visual emission, fire and forget
pub trait Blast: Send + Sync {
    fn emit(&mut self, position: Vec3, rotation: Quat);
}

impl<T: Blast + ?Sized> Blast for Box<T> {
    fn emit(&mut self, position: Vec3, rotation: Quat) {
        (**self).emit(position, rotation);
    }
}

/// Secondary particles emitted from confinement cells
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    /// Puffs thrown toward nearby surfaces
    Dust,
    /// Embers thrown along the ring in open surroundings
    Spark,
    /// Low, slow puffs rolling out along the ring
    RingDust,
}

/// One procedural particle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleSpawn {
    pub kind: ParticleKind,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Plays a single one-shot particle
pub trait ParticleSink {
    fn play_one_shot(&mut self, kind: ParticleKind, position: Vec3, velocity: Vec3);
}

impl ParticleSink for Vec<ParticleSpawn> {
    fn play_one_shot(&mut self, kind: ParticleKind, position: Vec3, velocity: Vec3) {
        self.push(ParticleSpawn { kind, position, velocity });
    }
}

/// Counts particles per kind without keeping them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParticleTally {
    pub dust: usize,
    pub sparks: usize,
    pub ring_dust: usize,
}

impl ParticleTally {
    pub fn total(&self) -> usize {
        self.dust + self.sparks + self.ring_dust
    }
}

impl ParticleSink for ParticleTally {
    fn play_one_shot(&mut self, kind: ParticleKind, _position: Vec3, _velocity: Vec3) {
        match kind {
            ParticleKind::Dust => self.dust += 1,
            ParticleKind::Spark => self.sparks += 1,
            ParticleKind::RingDust => self.ring_dust += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl Blast for Counter {
        fn emit(&mut self, _position: Vec3, _rotation: Quat) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_boxed_blast_forwards() {
        let mut boxed: Box<Counter> = Box::new(Counter(0));
        boxed.emit(Vec3::ZERO, Quat::IDENTITY);
        boxed.emit(Vec3::ONE, Quat::IDENTITY);
        assert_eq!(boxed.0, 2);
    }

    #[test]
    fn test_tally_counts_per_kind() {
        let mut tally = ParticleTally::default();
        tally.play_one_shot(ParticleKind::Dust, Vec3::ZERO, Vec3::X);
        tally.play_one_shot(ParticleKind::Dust, Vec3::ZERO, Vec3::X);
        tally.play_one_shot(ParticleKind::Spark, Vec3::ZERO, Vec3::Y);
        tally.play_one_shot(ParticleKind::RingDust, Vec3::ZERO, Vec3::Z);
        assert_eq!(tally, ParticleTally { dust: 2, sparks: 1, ring_dust: 1 });
        assert_eq!(tally.total(), 4);
    }

    #[test]
    fn test_vec_sink_records() {
        let mut spawns: Vec<ParticleSpawn> = Vec::new();
        spawns.play_one_shot(ParticleKind::Spark, Vec3::ONE, Vec3::Y * 3.0);
        assert_eq!(spawns, vec![ParticleSpawn { kind: ParticleKind::Spark, position: Vec3::ONE, velocity: Vec3::Y * 3.0 }]);
    }
}
