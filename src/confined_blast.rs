// Confined blast - one detonation category (e.g. "mid-size grenade")
//
// A detonation runs in two phases. `emit` plays the static pre-authored effect and schedules
// the confinement rays; `poll`, called once per frame, waits out the resume delay, reads the
// rays back and throws dust, sparks and ring dust from the sampled cells.
//
// States: Idle -> Scheduling -> Waiting -> Classifying -> Emitting -> Idle
use std::sync::Arc;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::blast::{Blast, ParticleKind, ParticleSink};
use crate::confinement::{Confinement, ConfinementSettings, RayCoverage};
use crate::constants::*;
use crate::ray_batch::{RayCaster, RayFilter};
use crate::xorshift::Xorshift;

/// Puff sequences thrown from the origin toward a set of cells
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DustSettings {
    /// Distance covered per puff; a cell `d` away gets about `d / puff_spacing` puffs
    pub puff_spacing: f32,
    /// Speed for a cell at full radius
    pub speed: f32,
    pub spread_floor: f32,
    pub spread: f32,
    /// Radians
    pub max_deviation: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SparkSettings {
    pub min_per_cell: u32,
    pub max_per_cell: u32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Radians
    pub max_deviation: f32,
    /// Sparks only fly with fewer occupied Confined cells than this
    pub confined_max: usize,
    /// ...and fewer occupied Up cells than this
    pub up_max: usize,
}

/// Per-category tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfinedBlastConfig {
    pub confinement: ConfinementSettings,
    /// Seconds between scheduling the rays and reading them back
    pub resume_delay: f32,
    pub dust_sample_count: usize,
    pub dust_min_cell_count: u32,
    /// Dust is skipped when the Confined grid has more occupied cells than this
    pub dust_confined_ceiling: usize,
    pub dust: DustSettings,
    pub ring_dust: DustSettings,
    pub sparks: SparkSettings,
}

impl Default for ConfinedBlastConfig {
    fn default() -> Self {
        Self {
            confinement: ConfinementSettings {
                radius: BLAST_RADIUS,
                ray_spacing: RAY_SPACING,
                coverage: RayCoverage::Hemisphere,
                filter: RayFilter::new(RAY_LAYER_MASK),
                cell_size: GRID_CELL_SIZE,
                confined_range: CONFINED_RANGE,
            },
            resume_delay: RESUME_DELAY,
            dust_sample_count: DUST_SAMPLE_COUNT,
            dust_min_cell_count: DUST_MIN_CELL_COUNT,
            dust_confined_ceiling: DUST_CONFINED_CEILING,
            dust: DustSettings {
                puff_spacing: DUST_PUFF_SPACING,
                speed: DUST_SPEED,
                spread_floor: DUST_SPREAD_FLOOR,
                spread: DUST_SPREAD,
                max_deviation: DUST_MAX_DEVIATION,
            },
            ring_dust: DustSettings {
                puff_spacing: RING_DUST_PUFF_SPACING,
                speed: RING_DUST_SPEED,
                spread_floor: DUST_SPREAD_FLOOR,
                spread: DUST_SPREAD,
                max_deviation: DUST_MAX_DEVIATION,
            },
            sparks: SparkSettings {
                min_per_cell: SPARK_MIN_PER_CELL,
                max_per_cell: SPARK_MAX_PER_CELL,
                speed_min: SPARK_SPEED_MIN,
                speed_max: SPARK_SPEED_MAX,
                max_deviation: SPARK_MAX_DEVIATION,
                confined_max: SPARK_CONFINED_MAX,
                up_max: SPARK_UP_MAX,
            },
        }
    }
}

impl ConfinedBlastConfig {
    /// Replace values that would break the grids or the puff math with defaults
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        fn positive(value: &mut f32, fallback: f32, what: &str) {
            if !(*value > 0.0 && value.is_finite()) {
                warn!("⚠️ Confined blast {} must be positive, got {}; using {}", what, value, fallback);
                *value = fallback;
            }
        }

        positive(&mut self.confinement.radius, defaults.confinement.radius, "radius");
        positive(&mut self.confinement.ray_spacing, defaults.confinement.ray_spacing, "ray spacing");
        positive(&mut self.confinement.cell_size, defaults.confinement.cell_size, "cell size");
        positive(&mut self.dust.puff_spacing, defaults.dust.puff_spacing, "dust puff spacing");
        positive(&mut self.ring_dust.puff_spacing, defaults.ring_dust.puff_spacing, "ring dust puff spacing");

        if !(self.resume_delay >= 0.0) {
            self.resume_delay = 0.0;
        }
        if self.sparks.max_per_cell < self.sparks.min_per_cell {
            std::mem::swap(&mut self.sparks.max_per_cell, &mut self.sparks.min_per_cell);
        }
        if self.sparks.speed_max < self.sparks.speed_min {
            std::mem::swap(&mut self.sparks.speed_max, &mut self.sparks.speed_min);
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlastPhase {
    Idle,
    Scheduling,
    /// Rays in flight, waiting out the resume delay
    Waiting,
    Classifying,
    Emitting,
}

/// What an `emit` call ended up doing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detonation {
    /// Static effect played and a confinement pass started
    Scheduled,
    /// Only the static effect played (previous pass still running, or the rays were refused)
    StaticOnly,
}

/// Outcome of a finished confinement pass
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DetonationReport {
    pub origin: Vec3,
    pub up_cells: usize,
    pub ring_cells: usize,
    pub confined_cells: usize,
    pub dust_puffs: usize,
    pub sparks: usize,
    pub ring_puffs: usize,
    /// Confined grid over the dust ceiling
    pub dust_skipped: bool,
    /// Surroundings too enclosed for sparks
    pub sparks_skipped: bool,
}

/// Clears the grids and returns to Idle when a pass ends, even by panic
struct PassGuard<'a> {
    confinement: &'a mut Confinement,
    phase: &'a mut BlastPhase,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.confinement.clear();
        *self.phase = BlastPhase::Idle;
    }
}

pub struct ConfinedBlast {
    name: String,
    config: ConfinedBlastConfig,
    confinement: Confinement,
    phase: BlastPhase,
    wait_remaining: f32,
    rng: StdRng,
    completed: u64,
    downgraded: u64,
}

impl ConfinedBlast {
    pub fn new(name: impl Into<String>, caster: Arc<dyn RayCaster>, config: ConfinedBlastConfig, seed: u64) -> Self {
        let config = config.validated();
        Self {
            name: name.into(),
            confinement: Confinement::new(caster, &config.confinement),
            config,
            phase: BlastPhase::Idle,
            wait_remaining: 0.0,
            rng: StdRng::seed_from_u64(seed),
            completed: 0,
            downgraded: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConfinedBlastConfig {
        &self.config
    }

    pub fn phase(&self) -> BlastPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != BlastPhase::Idle
    }

    pub fn confinement(&self) -> &Confinement {
        &self.confinement
    }

    /// Passes that ran to completion
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Detonations that only got the static effect because a pass was still running
    pub fn downgraded(&self) -> u64 {
        self.downgraded
    }

    /// Play the static effect at `origin` and start a confinement pass if none is running
    pub fn emit(&mut self, origin: Vec3, rotation: Quat, static_effect: &mut dyn Blast) -> Detonation {
        static_effect.emit(origin, rotation);

        if self.is_busy() {
            self.downgraded += 1;
            debug!("💨 {} busy ({:?}), static effect only at {:?}", self.name, self.phase, origin);
            return Detonation::StaticOnly;
        }

        self.phase = BlastPhase::Scheduling;
        match self.confinement.schedule(origin, Vec3::Y) {
            Ok(_) => {
                self.phase = BlastPhase::Waiting;
                self.wait_remaining = self.config.resume_delay;
                Detonation::Scheduled
            }
            Err(err) => {
                warn!("⚠️ {} could not schedule confinement rays: {}", self.name, err);
                self.phase = BlastPhase::Idle;
                Detonation::StaticOnly
            }
        }
    }

    /// Advance a waiting pass by `delta` seconds
    ///
    /// Once the resume delay has elapsed the rays are read back (blocking if the background
    /// lane is somehow still busy), classified, and the secondary particles go to `sink`.
    pub fn poll(&mut self, delta: f32, sink: &mut dyn ParticleSink) -> Option<DetonationReport> {
        if self.phase != BlastPhase::Waiting {
            return None;
        }

        self.wait_remaining -= delta;
        if self.wait_remaining > 0.0 {
            return None;
        }

        let mut pass = PassGuard { confinement: &mut self.confinement, phase: &mut self.phase };
        *pass.phase = BlastPhase::Classifying;
        if let Err(err) = pass.confinement.complete() {
            warn!("⚠️ {} lost its confinement rays: {}", self.name, err);
            return None;
        }
        pass.confinement.classify();

        *pass.phase = BlastPhase::Emitting;
        let report = emit_secondary(pass.confinement, &self.config, &mut self.rng, sink);
        drop(pass);

        self.completed += 1;
        debug!(
            "💥 {} at {:?}: cells up={} ring={} confined={}, puffs={} sparks={} ring puffs={}",
            self.name,
            report.origin,
            report.up_cells,
            report.ring_cells,
            report.confined_cells,
            report.dust_puffs,
            report.sparks,
            report.ring_puffs
        );
        Some(report)
    }

    /// Free the ray buffers when the category is discarded
    ///
    /// Blocks on a pass still in flight; its secondary particles are dropped.
    pub fn release(&mut self) {
        self.confinement.release();
        self.phase = BlastPhase::Idle;
    }
}

fn emit_secondary(
    confinement: &Confinement,
    config: &ConfinedBlastConfig,
    rng: &mut StdRng,
    sink: &mut dyn ParticleSink,
) -> DetonationReport {
    let origin = confinement.origin();
    let radius = confinement.radius();
    let (up, ring, confined) = (confinement.up(), confinement.ring(), confinement.confined());

    let mut report = DetonationReport {
        origin,
        up_cells: up.occupied(),
        ring_cells: ring.occupied(),
        confined_cells: confined.occupied(),
        ..default()
    };

    if confined.occupied() > config.dust_confined_ceiling {
        report.dust_skipped = true;
        debug!("🌫️ {} confined cells over the dust ceiling, skipping dust", confined.occupied());
    } else {
        let cells = confined.sample(config.dust_sample_count, config.dust_min_cell_count, rng);
        let targets = cells.iter().map(|&bucket| confined.cell(bucket).position);
        report.dust_puffs = emit_dust(origin, radius, targets, &config.dust, ParticleKind::Dust, rng.gen(), sink);
    }

    // Few confined and few far cells: walls nearby on some sides only
    let sparks = &config.sparks;
    if confined.occupied() < sparks.confined_max && up.occupied() < sparks.up_max {
        let targets = ring.cells().map(|cell| cell.position);
        report.sparks = emit_sparks(origin, radius, targets, sparks, rng.gen(), sink);
    } else {
        report.sparks_skipped = true;
    }

    let targets = ring.cells().map(|cell| cell.position);
    report.ring_puffs = emit_dust(origin, radius, targets, &config.ring_dust, ParticleKind::RingDust, rng.gen(), sink);

    report
}

/// Direction and full-radius fraction from `origin` to `target`; None when they coincide
fn heading(origin: Vec3, target: Vec3, radius: f32) -> Option<(Vec3, f32, f32)> {
    let offset = target - origin;
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return None;
    }
    Some((offset / distance, distance, (distance / radius).clamp(0.0, 1.0)))
}

/// Small rotation of `direction` around an axis fixed by the direction itself
fn deviate(direction: Vec3, axis: Vec3, max_angle: f32, rng: &mut Xorshift) -> Vec3 {
    Quat::from_axis_angle(axis, rng.next_signed() * max_angle) * direction
}

/// Throw a sequence of puffs toward every target, returns the number emitted
///
/// Puff `i` of `n` moves at `speed · lengthScale · sqrt(floor + spread · i / (n-1))`: under
/// drag, covering half the distance takes less than half the speed.
pub fn emit_dust(
    origin: Vec3,
    radius: f32,
    targets: impl Iterator<Item = Vec3>,
    settings: &DustSettings,
    kind: ParticleKind,
    seed: u16,
    sink: &mut dyn ParticleSink,
) -> usize {
    let mut rng = Xorshift::new(seed);
    let mut puffs = 0;

    for target in targets {
        let Some((direction, distance, length_scale)) = heading(origin, target, radius) else {
            continue;
        };

        // Cells closer than about a puff and a half may get no puffs at all
        let sequence = (distance / settings.puff_spacing).round() as i32 - 1 + rng.jitter();
        let sequence_max = (sequence - 1).max(1) as f32;
        let axis = direction.any_orthonormal_vector();

        for position in 0..sequence {
            let spread = (settings.spread_floor + settings.spread * position as f32 / sequence_max).sqrt();
            let speed = settings.speed * length_scale * spread;
            let velocity = deviate(direction, axis, settings.max_deviation, &mut rng) * speed;
            sink.play_one_shot(kind, origin, velocity);
            puffs += 1;
        }
    }

    puffs
}

/// Throw a handful of sparks toward every target, returns the number emitted
pub fn emit_sparks(
    origin: Vec3,
    radius: f32,
    targets: impl Iterator<Item = Vec3>,
    settings: &SparkSettings,
    seed: u16,
    sink: &mut dyn ParticleSink,
) -> usize {
    let mut rng = Xorshift::new(seed);
    let mut sparks = 0;

    for target in targets {
        let Some((direction, _, length_scale)) = heading(origin, target, radius) else {
            continue;
        };

        let count = rng.range_inclusive(settings.min_per_cell, settings.max_per_cell);
        let axis = direction.any_orthonormal_vector();

        for _ in 0..count {
            let speed = settings.speed_min + (settings.speed_max - settings.speed_min) * rng.next_f32();
            let velocity = deviate(direction, axis, settings.max_deviation, &mut rng) * speed * length_scale;
            sink.play_one_shot(ParticleKind::Spark, origin, velocity);
            sparks += 1;
        }
    }

    sparks
}
