// Blast context - every pool and confined blast category of a running game
// Categories pair one static effect pool with one `ConfinedBlast`; plain effects only get a pool.
use std::sync::Arc;

use bevy::prelude::*;

use crate::blast::{Blast, ParticleSink};
use crate::confined_blast::{ConfinedBlast, ConfinedBlastConfig, Detonation, DetonationReport};
use crate::pool::{BlastPool, PoolId, PoolScheduler};
use crate::ray_batch::RayCaster;

/// Index of a registered blast category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlastCategory(pub usize);

struct CategoryEntry {
    pool: PoolId,
    blast: ConfinedBlast,
}

#[derive(Resource)]
pub struct BlastContext {
    caster: Arc<dyn RayCaster>,
    scheduler: PoolScheduler<Box<dyn Blast>>,
    categories: Vec<CategoryEntry>,
    seed: u64,
    released: bool,
}

impl BlastContext {
    /// `seed` drives dust sampling; categories derive their own streams from it
    pub fn new(caster: Arc<dyn RayCaster>, seed: u64) -> Self {
        Self {
            caster,
            scheduler: PoolScheduler::new(),
            categories: Vec::new(),
            seed,
            released: false,
        }
    }

    /// Register a blast category: `copies` static effects built by `factory`, plus its confinement pass
    pub fn register_category(
        &mut self,
        name: impl Into<String>,
        config: ConfinedBlastConfig,
        copies: usize,
        lifetime: f64,
        factory: impl FnMut(usize) -> Box<dyn Blast>,
    ) -> BlastCategory {
        let name = name.into();
        let pool = self.scheduler.add(BlastPool::new(copies, lifetime, factory));
        let seed = self.seed.wrapping_add(self.categories.len() as u64);
        let blast = ConfinedBlast::new(name.clone(), self.caster.clone(), config, seed);

        info!(
            "🧨 Blast category '{}': {} rays, {} static copies, {:.1}s lifetime",
            name,
            blast.confinement().batch().ray_count(),
            copies,
            lifetime
        );

        self.categories.push(CategoryEntry { pool, blast });
        BlastCategory(self.categories.len() - 1)
    }

    /// Register a pooled effect with no confinement pass
    pub fn register_effect(&mut self, copies: usize, lifetime: f64, factory: impl FnMut(usize) -> Box<dyn Blast>) -> PoolId {
        self.scheduler.add(BlastPool::new(copies, lifetime, factory))
    }

    pub fn emit_effect(&mut self, pool: PoolId, position: Vec3, rotation: Quat) {
        self.scheduler.emit(pool, position, rotation);
    }

    pub fn category_named(&self, name: &str) -> Option<BlastCategory> {
        self.categories.iter().position(|entry| entry.blast.name() == name).map(BlastCategory)
    }

    pub fn blast(&self, category: BlastCategory) -> Option<&ConfinedBlast> {
        self.categories.get(category.0).map(|entry| &entry.blast)
    }

    pub fn pool(&self, category: BlastCategory) -> Option<&BlastPool<Box<dyn Blast>>> {
        let entry = self.categories.get(category.0)?;
        self.scheduler.get(entry.pool)
    }

    pub fn scheduler(&self) -> &PoolScheduler<Box<dyn Blast>> {
        &self.scheduler
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Detonate a category; None if it was never registered
    pub fn detonate(&mut self, category: BlastCategory, position: Vec3, rotation: Quat) -> Option<Detonation> {
        let Some(entry) = self.categories.get_mut(category.0) else {
            warn!("⚠️ Detonation for unknown blast category {:?}", category);
            return None;
        };
        let pool = self.scheduler.get_mut(entry.pool)?;
        Some(entry.blast.emit(position, rotation, pool))
    }

    /// Advance pools and pending confinement passes by `delta` seconds
    pub fn tick(&mut self, delta: f32, sink: &mut dyn ParticleSink) -> Vec<DetonationReport> {
        self.scheduler.tick(delta as f64);
        self.categories
            .iter_mut()
            .filter_map(|entry| entry.blast.poll(delta, sink))
            .collect()
    }

    /// Release every category's ray buffers, waiting for passes in flight
    pub fn release_all(&mut self) {
        if self.released {
            return;
        }
        for entry in &mut self.categories {
            entry.blast.release();
        }
        self.released = true;
        info!("🧹 Released {} blast categories", self.categories.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blast::ParticleTally;
    use crate::constants::{RESUME_DELAY, STATIC_EFFECT_COPIES, STATIC_EFFECT_LIFETIME};
    use crate::geometry::{Aabb, StaticScene};

    struct Silent;

    impl Blast for Silent {
        fn emit(&mut self, _position: Vec3, _rotation: Quat) {}
    }

    fn context() -> BlastContext {
        let scene = StaticScene::new()
            .with_box(Aabb::new(Vec3::new(-20.0, -1.0, -20.0), Vec3::new(20.0, 0.0, 20.0)))
            .with_box(Aabb::new(Vec3::new(1.5, 0.0, -5.0), Vec3::new(2.0, 4.0, 5.0)));
        BlastContext::new(Arc::new(scene), 7)
    }

    fn small_config() -> ConfinedBlastConfig {
        let mut config = ConfinedBlastConfig::default();
        config.confinement.ray_spacing = 0.6;
        config
    }

    #[test]
    fn test_detonate_fills_pool_and_runs_pass() {
        let mut ctx = context();
        let grenade = ctx.register_category("grenade", small_config(), STATIC_EFFECT_COPIES, STATIC_EFFECT_LIFETIME, |_| Box::new(Silent));
        assert_eq!(ctx.category_named("grenade"), Some(grenade));

        assert_eq!(ctx.detonate(grenade, Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY), Some(Detonation::Scheduled));
        assert_eq!(ctx.pool(grenade).unwrap().active_count(), 1);

        let mut tally = ParticleTally::default();
        assert!(ctx.tick(0.01, &mut tally).is_empty());
        let reports = ctx.tick(RESUME_DELAY, &mut tally);
        assert_eq!(reports.len(), 1);
        assert!(tally.total() > 0);
        assert!(!ctx.blast(grenade).unwrap().is_busy());

        ctx.release_all();
        assert!(ctx.is_released());
    }

    #[test]
    fn test_busy_category_downgrades() {
        let mut ctx = context();
        let grenade = ctx.register_category("grenade", small_config(), 2, 10.0, |_| Box::new(Silent));
        ctx.detonate(grenade, Vec3::Y, Quat::IDENTITY);
        assert_eq!(ctx.detonate(grenade, Vec3::Y, Quat::IDENTITY), Some(Detonation::StaticOnly));
        assert_eq!(ctx.detonate(grenade, Vec3::Y, Quat::IDENTITY), Some(Detonation::StaticOnly));

        // Static effect still plays every time; the third one steals the oldest copy
        assert_eq!(ctx.pool(grenade).unwrap().active_count(), 2);
        assert_eq!(ctx.scheduler().forced_steals(), 1);
        assert_eq!(ctx.blast(grenade).unwrap().confinement().passes(), 1);
        ctx.release_all();
    }

    #[test]
    fn test_unknown_category_is_ignored() {
        let mut ctx = context();
        assert_eq!(ctx.detonate(BlastCategory(3), Vec3::ZERO, Quat::IDENTITY), None);
        assert_eq!(ctx.category_named("missing"), None);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut ctx = context();
        let small = ctx.register_category("small", small_config(), 1, 1.0, |_| Box::new(Silent));
        let large = ctx.register_category("large", small_config(), 1, 1.0, |_| Box::new(Silent));
        let flash = ctx.register_effect(2, 0.5, |_| Box::new(Silent));
        assert_eq!(ctx.category_count(), 2);
        assert_eq!(ctx.scheduler().len(), 3);

        ctx.detonate(small, Vec3::Y, Quat::IDENTITY);
        assert_eq!(ctx.detonate(large, Vec3::Y, Quat::IDENTITY), Some(Detonation::Scheduled));
        ctx.emit_effect(flash, Vec3::Y, Quat::IDENTITY);

        let reports = ctx.tick(1.0, &mut ParticleTally::default());
        assert_eq!(reports.len(), 2);
        ctx.release_all();
        ctx.release_all();
    }
}
