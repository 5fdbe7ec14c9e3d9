// Ray batch - a fixed set of confinement rays cast on the rayon pool
//
// Buffers are allocated once per batch and travel to the background job and back on every
// schedule, so a detonation never allocates ray storage.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use bevy::prelude::*;
use rayon::prelude::*;

use crate::error::{RayBatchError, RayBatchResult};
use crate::ray_directions::{hemisphere_direction, ray_count, sphere_direction};

/// Opaque reference to the surface a ray hit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Which surface layers a ray reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayFilter {
    pub mask: u32,
}

impl RayFilter {
    pub const ALL: Self = Self { mask: u32::MAX };

    pub const fn new(mask: u32) -> Self {
        Self { mask }
    }

    pub fn accepts(&self, layers: u32) -> bool {
        self.mask & layers != 0
    }
}

impl Default for RayFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Nearest surface along a ray
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    pub surface: SurfaceId,
}

/// World geometry as seen by confinement rays
///
/// Implemented by the host over its physics scene. Called from rayon worker threads.
pub trait RayCaster: Send + Sync {
    /// Nearest hit within `max_distance` along the unit `direction`, if any
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, filter: RayFilter) -> Option<RayHit>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
}

impl Default for RayQuery {
    fn default() -> Self {
        Self { origin: Vec3::ZERO, direction: Vec3::Y, max_distance: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RayResult {
    /// Travelled its full distance unobstructed
    #[default]
    Miss,
    Hit(RayHit),
}

impl RayResult {
    pub fn hit(&self) -> Option<&RayHit> {
        match self {
            RayResult::Miss => None,
            RayResult::Hit(hit) => Some(hit),
        }
    }
}

struct RayBuffers {
    queries: Vec<RayQuery>,
    results: Vec<RayResult>,
}

/// Hand-off point between the background job and the batch owner
#[derive(Default)]
struct CompletionSlot {
    buffers: Mutex<Option<RayBuffers>>,
    ready: Condvar,
    /// Stays set after the owner takes the buffers back
    done: AtomicBool,
}

impl CompletionSlot {
    fn fill(&self, buffers: RayBuffers) {
        let mut slot = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(buffers);
        self.done.store(true, Ordering::Release);
        self.ready.notify_all();
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Blocks until the job has handed the buffers back
    fn wait(&self) -> RayBuffers {
        let mut slot = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(buffers) = slot.take() {
                return buffers;
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Completion handle returned by a schedule
#[derive(Clone)]
pub struct RayBatchHandle {
    slot: Arc<CompletionSlot>,
}

impl RayBatchHandle {
    /// True once every ray has been cast; never blocks
    pub fn is_complete(&self) -> bool {
        self.slot.is_done()
    }
}

/// Fixed-size set of rays from one origin, cast asynchronously
pub struct RayBatch {
    caster: Arc<dyn RayCaster>,
    filter: RayFilter,
    radius: f32,
    origin: Vec3,
    ray_count: usize,
    /// None while the rays are in flight or after release
    buffers: Option<RayBuffers>,
    pending: Option<RayBatchHandle>,
    released: bool,
}

impl RayBatch {
    /// Batch sized for `radius` at the given endpoint `spacing`
    ///
    /// `hemisphere` only decides the buffer size; both schedule kinds work on any batch and
    /// always cast `ray_count()` rays.
    pub fn new(caster: Arc<dyn RayCaster>, radius: f32, spacing: f32, hemisphere: bool, filter: RayFilter) -> Self {
        Self::with_ray_count(caster, radius, ray_count(radius, spacing, hemisphere), filter)
    }

    pub fn with_ray_count(caster: Arc<dyn RayCaster>, radius: f32, ray_count: usize, filter: RayFilter) -> Self {
        Self {
            caster,
            filter,
            radius,
            origin: Vec3::ZERO,
            ray_count,
            buffers: Some(RayBuffers {
                queries: vec![RayQuery::default(); ray_count],
                results: vec![RayResult::Miss; ray_count],
            }),
            pending: None,
            released: false,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Cast rays over the whole sphere around `origin`
    pub fn schedule_sphere(&mut self, origin: Vec3) -> RayBatchResult<RayBatchHandle> {
        let total = self.ray_count;
        self.schedule_with(origin, |i| sphere_direction(i, total))
    }

    /// Cast rays over the hemisphere around `origin` facing `up`
    pub fn schedule_hemisphere(&mut self, origin: Vec3, up: Vec3) -> RayBatchResult<RayBatchHandle> {
        let total = self.ray_count;
        self.schedule_with(origin, |i| hemisphere_direction(i, total, up))
    }

    fn schedule_with(&mut self, origin: Vec3, direction: impl Fn(usize) -> Vec3) -> RayBatchResult<RayBatchHandle> {
        if self.released {
            return Err(RayBatchError::Released);
        }
        if self.pending.is_some() {
            return Err(RayBatchError::AlreadyScheduled);
        }
        let Some(mut buffers) = self.buffers.take() else {
            return Err(RayBatchError::AlreadyScheduled);
        };

        self.origin = origin;
        for (i, query) in buffers.queries.iter_mut().enumerate() {
            *query = RayQuery { origin, direction: direction(i), max_distance: self.radius };
        }

        let handle = RayBatchHandle { slot: Arc::new(CompletionSlot::default()) };
        let slot = Arc::clone(&handle.slot);
        let caster = Arc::clone(&self.caster);
        let filter = self.filter;

        rayon::spawn(move || {
            let RayBuffers { queries, results } = &mut buffers;
            queries
                .par_iter()
                .zip(results.par_iter_mut())
                .for_each(|(query, result)| {
                    *result = match caster.cast(query.origin, query.direction, query.max_distance, filter) {
                        Some(hit) => RayResult::Hit(hit),
                        None => RayResult::Miss,
                    };
                });
            slot.fill(buffers);
        });

        self.pending = Some(handle.clone());
        Ok(handle)
    }

    /// Block until the outstanding schedule has finished
    ///
    /// Results are only valid after this returns.
    pub fn complete(&mut self) -> RayBatchResult<()> {
        if self.released {
            return Err(RayBatchError::Released);
        }
        let Some(handle) = self.pending.take() else {
            return Err(RayBatchError::NotScheduled);
        };

        self.buffers = Some(handle.slot.wait());
        Ok(())
    }

    /// Queries of the last completed schedule; empty while rays are in flight
    pub fn queries(&self) -> &[RayQuery] {
        match &self.buffers {
            Some(buffers) => &buffers.queries,
            None => &[],
        }
    }

    /// Results of the last completed schedule, parallel to `queries()`
    pub fn results(&self) -> &[RayResult] {
        match &self.buffers {
            Some(buffers) => &buffers.results,
            None => &[],
        }
    }

    /// Free the ray buffers; the batch is unusable afterwards
    ///
    /// Waits for an outstanding schedule first so the job never outlives its owner's intent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(handle) = self.pending.take() {
            drop(handle.slot.wait());
        }
        self.buffers = None;
        self.released = true;
    }
}

static LEAKED_BATCHES: AtomicUsize = AtomicUsize::new(0);

/// Batches dropped without `release()` since the process started
pub fn leaked_batches() -> usize {
    LEAKED_BATCHES.load(Ordering::Relaxed)
}

impl Drop for RayBatch {
    fn drop(&mut self) {
        if !self.released {
            LEAKED_BATCHES.fetch_add(1, Ordering::Relaxed);
            warn!(
                "⚠️ RayBatch with {} rays dropped without release() (scheduled: {})",
                self.ray_count,
                self.pending.is_some()
            );
        }
    }
}
