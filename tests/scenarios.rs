// End-to-end detonation scenarios through the public API
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use bevy::prelude::*;

use confined_blast::confinement::{Confinement, ConfinementSettings, RayCoverage};
use confined_blast::constants::*;
use confined_blast::geometry::{Aabb, StaticScene};
use confined_blast::pool::BlastPool;
use confined_blast::ray_batch::{RayCaster, RayFilter, RayHit};
use confined_blast::ray_directions::ray_count;
use confined_blast::{
    Blast, BlastContext, ConfinedBlast, ConfinedBlastConfig, Detonation, ParticleKind, ParticleSpawn, ParticleTally,
};

struct Flash {
    plays: Arc<AtomicUsize>,
}

impl Blast for Flash {
    fn emit(&mut self, _position: Vec3, _rotation: Quat) {
        self.plays.fetch_add(1, Ordering::Relaxed);
    }
}

/// Misses everything but counts the rays it was asked to cast
#[derive(Default)]
struct Void {
    casts: AtomicUsize,
}

impl RayCaster for Void {
    fn cast(&self, _: Vec3, _: Vec3, _: f32, _: RayFilter) -> Option<RayHit> {
        self.casts.fetch_add(1, Ordering::Relaxed);
        None
    }
}

fn room() -> StaticScene {
    let (w, h, t) = (4.0, 3.0, 0.5);
    StaticScene::new()
        .with_box(Aabb::new(Vec3::new(-w - t, -t, -w - t), Vec3::new(w + t, 0.0, w + t)))
        .with_box(Aabb::new(Vec3::new(-w - t, 0.0, -w - t), Vec3::new(-w, h, w + t)))
        .with_box(Aabb::new(Vec3::new(w, 0.0, -w - t), Vec3::new(w + t, h, w + t)))
        .with_box(Aabb::new(Vec3::new(-w, 0.0, -w - t), Vec3::new(w, h, -w)))
        .with_box(Aabb::new(Vec3::new(-w, 0.0, w), Vec3::new(w, h, w + t)))
        .with_box(Aabb::new(Vec3::new(-w - t, h, -w - t), Vec3::new(w + t, h + t, w + t)))
}

#[test]
fn all_miss_batch_lands_in_up_grid() {
    let spacing = 0.125_f32.sqrt();
    assert_relative_eq!(spacing, RAY_SPACING, max_relative = 1e-6);
    let expected = ray_count(BLAST_RADIUS, spacing, true);

    let void = Arc::new(Void::default());
    let settings = ConfinementSettings {
        radius: BLAST_RADIUS,
        ray_spacing: spacing,
        coverage: RayCoverage::Hemisphere,
        filter: RayFilter::ALL,
        cell_size: GRID_CELL_SIZE,
        confined_range: CONFINED_RANGE,
    };
    let mut confinement = Confinement::new(void.clone(), &settings);
    assert_eq!(confinement.batch().ray_count(), expected);

    confinement.schedule(Vec3::new(10.0, 1.0, -3.0), Vec3::Y).unwrap();
    confinement.complete().unwrap();
    confinement.classify();

    assert_eq!(void.casts.load(Ordering::Relaxed), expected);
    assert_eq!(confinement.up().total_count(), expected as u64);
    assert!(confinement.ring().total_count() > 0);
    assert!(confinement.ring().total_count() < expected as u64);
    assert!(confinement.confined().is_empty());
    confinement.release();
}

#[test]
fn saturated_pool_reuses_oldest_instance() {
    let plays = Arc::new(AtomicUsize::new(0));
    let mut pool = BlastPool::new(2, 10.0, |_| Flash { plays: plays.clone() });

    pool.emit(Vec3::ZERO, Quat::IDENTITY);
    pool.tick(0.1);
    pool.emit(Vec3::X, Quat::IDENTITY);
    pool.tick(0.1);
    pool.emit(Vec3::Y, Quat::IDENTITY);

    let emitted: Vec<f64> = pool.active().map(|(_, at)| at).collect();
    assert_eq!(emitted.len(), 2);
    assert_relative_eq!(emitted[0], 0.1, epsilon = 1e-9);
    assert_relative_eq!(emitted[1], 0.2, epsilon = 1e-9);
    assert_eq!(pool.free_count(), 0);
    assert_eq!(pool.forced_steals(), 1);
    assert_eq!(plays.load(Ordering::Relaxed), 3);
}

#[test]
fn second_detonation_during_wait_is_static_only() {
    let plays = Arc::new(AtomicUsize::new(0));
    let mut pool = BlastPool::new(STATIC_EFFECT_COPIES, STATIC_EFFECT_LIFETIME, |_| Flash { plays: plays.clone() });
    let mut config = ConfinedBlastConfig::default();
    config.confinement.ray_spacing = 0.5;
    let mut blast = ConfinedBlast::new("grenade", Arc::new(room()), config, 3);

    assert_eq!(blast.emit(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY, &mut pool), Detonation::Scheduled);
    let mut tally = ParticleTally::default();
    assert!(blast.poll(0.016, &mut tally).is_none());
    assert_eq!(blast.emit(Vec3::new(1.0, 0.5, 0.0), Quat::IDENTITY, &mut pool), Detonation::StaticOnly);

    assert_eq!(plays.load(Ordering::Relaxed), 2);
    assert_eq!(pool.active_count(), 2);
    assert_eq!(blast.confinement().passes(), 1);

    assert!(blast.poll(RESUME_DELAY, &mut tally).is_some());
    assert_eq!(blast.confinement().passes(), 1);
    assert_eq!(blast.completed(), 1);
    blast.release();
}

#[test]
fn room_detonation_throws_dust_at_nearby_walls() {
    let mut config = ConfinedBlastConfig::default();
    config.confinement.ray_spacing = 0.4;
    let mut blast = ConfinedBlast::new("grenade", Arc::new(room()), config, 9);
    let mut static_effect = BlastPool::new(1, 1.0, |_| Flash { plays: Arc::new(AtomicUsize::new(0)) });
    let mut spawns: Vec<ParticleSpawn> = Vec::new();

    // Near a wall: plenty of confined hits
    let origin = Vec3::new(3.0, 0.5, 0.0);
    blast.emit(origin, Quat::IDENTITY, &mut static_effect);
    let report = blast.poll(1.0, &mut spawns).unwrap();

    assert!(report.confined_cells > 0);
    assert!(report.dust_puffs > 0);

    let dust = spawns.iter().filter(|s| s.kind == ParticleKind::Dust).count();
    let sparks = spawns.iter().filter(|s| s.kind == ParticleKind::Spark).count();
    assert_eq!(dust, report.dust_puffs);
    assert_eq!(sparks, report.sparks);
    if report.confined_cells >= SPARK_CONFINED_MAX {
        assert_eq!(sparks, 0);
    }

    // Every puff leaves the origin no faster than a full-radius puff
    assert!(spawns
        .iter()
        .filter(|s| s.kind == ParticleKind::Dust)
        .all(|s| s.position == origin && s.velocity.length() <= DUST_SPEED + 1e-3));
    blast.release();
}

#[test]
fn context_runs_categories_frame_by_frame() {
    let mut context = BlastContext::new(Arc::new(room()), 21);
    let plays = Arc::new(AtomicUsize::new(0));
    let mut config = ConfinedBlastConfig::default();
    config.confinement.ray_spacing = 0.5;
    let grenade = context.register_category("grenade", config, 2, 1.0, |_| Box::new(Flash { plays: plays.clone() }));

    context.detonate(grenade, Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY);
    let mut tally = ParticleTally::default();
    let mut reports = Vec::new();
    for _ in 0..120 {
        reports.extend(context.tick(1.0 / 60.0, &mut tally));
    }

    assert_eq!(reports.len(), 1);
    assert_eq!(plays.load(Ordering::Relaxed), 1);
    assert_eq!(tally.total(), reports[0].dust_puffs + reports[0].sparks + reports[0].ring_puffs);
    // Two seconds later the static copy is back in the free list
    assert_eq!(context.pool(grenade).unwrap().active_count(), 0);
    context.release_all();
}
