// Blast pools - pre-built effect instances recycled on a fixed lifetime
//
// Instances never get destroyed: they move between the free list and a time-ordered active
// queue. When every copy is still playing the oldest one is taken over, so a burst of
// detonations degrades visually instead of allocating or failing.
use std::collections::VecDeque;

use bevy::prelude::*;

use crate::blast::Blast;

struct ActiveEntry<T> {
    instance: T,
    emitted_at: f64,
}

/// Fixed-capacity pool of `T`, clocked by `tick`
pub struct BlastPool<T: Blast> {
    free: Vec<T>,
    active: VecDeque<ActiveEntry<T>>,
    lifetime: f64,
    /// Seconds since the pool was built
    clock: f64,
    forced_steals: u64,
}

impl<T: Blast> BlastPool<T> {
    /// Pre-build `copy_count` instances with `factory(copy_index)`
    pub fn new(copy_count: usize, lifetime: f64, factory: impl FnMut(usize) -> T) -> Self {
        Self {
            free: (0..copy_count).map(factory).collect(),
            active: VecDeque::with_capacity(copy_count),
            lifetime,
            clock: 0.0,
            forced_steals: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.free.len() + self.active.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Free instances, the next one handed out last
    pub fn free(&self) -> impl Iterator<Item = &T> + '_ {
        self.free.iter()
    }

    /// Active instances oldest first, with the clock time they were emitted at
    pub fn active(&self) -> impl Iterator<Item = (&T, f64)> + '_ {
        self.active.iter().map(|entry| (&entry.instance, entry.emitted_at))
    }

    /// Times the pool was saturated and the oldest active instance was reused
    ///
    /// A steadily climbing count means the pool is undersized for its category.
    pub fn forced_steals(&self) -> u64 {
        self.forced_steals
    }

    /// Advance the clock and expire old entries
    pub fn tick(&mut self, delta: f64) {
        self.clock += delta;
        self.update();
    }

    /// Return every active entry older than the lifetime to the free list
    ///
    /// The queue is in emission order and the lifetime is constant, so the first entry still
    /// alive ends the scan.
    pub fn update(&mut self) {
        while let Some(front) = self.active.front() {
            if self.clock - front.emitted_at <= self.lifetime {
                break;
            }
            if let Some(expired) = self.active.pop_front() {
                self.free.push(expired.instance);
            }
        }
    }
}

impl<T: Blast> Blast for BlastPool<T> {
    fn emit(&mut self, position: Vec3, rotation: Quat) {
        let mut instance = match self.free.pop() {
            Some(instance) => instance,
            None => match self.active.pop_front() {
                Some(oldest) => {
                    self.forced_steals += 1;
                    debug!(
                        "♻️ Blast pool saturated ({} copies), reusing effect emitted {:.2}s ago",
                        self.active.len() + 1,
                        self.clock - oldest.emitted_at
                    );
                    oldest.instance
                }
                // Zero-capacity pool
                None => return,
            },
        };

        instance.emit(position, rotation);
        self.active.push_back(ActiveEntry { instance, emitted_at: self.clock });
    }
}

/// Index of a pool inside a [`PoolScheduler`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolId(pub usize);

/// Owns a set of pools and ticks them once per frame
pub struct PoolScheduler<T: Blast> {
    pools: Vec<BlastPool<T>>,
}

impl<T: Blast> Default for PoolScheduler<T> {
    fn default() -> Self {
        Self { pools: Vec::new() }
    }
}

impl<T: Blast> PoolScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pool: BlastPool<T>) -> PoolId {
        self.pools.push(pool);
        PoolId(self.pools.len() - 1)
    }

    pub fn get(&self, id: PoolId) -> Option<&BlastPool<T>> {
        self.pools.get(id.0)
    }

    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut BlastPool<T>> {
        self.pools.get_mut(id.0)
    }

    /// Emit from the pool behind `id`; unknown ids are ignored with a warning
    pub fn emit(&mut self, id: PoolId, position: Vec3, rotation: Quat) {
        match self.pools.get_mut(id.0) {
            Some(pool) => pool.emit(position, rotation),
            None => warn!("⚠️ Emit on unknown blast pool {:?}", id),
        }
    }

    pub fn tick(&mut self, delta: f64) {
        for pool in &mut self.pools {
            pool.tick(delta);
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn forced_steals(&self) -> u64 {
        self.pools.iter().map(|pool| pool.forced_steals()).sum()
    }
}
