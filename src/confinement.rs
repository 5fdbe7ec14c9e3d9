// Confinement - how enclosed a detonation point is.
//
// One ray batch is cast around the origin and every result is sorted into three grids:
//
// - **Up**: results at or beyond 90% of the radius (open space, misses included)
// - **Ring**: results more than 60° away from vertical
// - **Confined**: surface hits closer than the confined range
//
// Up and Ring overlap: a far, near-horizontal miss counts in both, so the total
// cell count across grids is not a partition of the rays.

use std::sync::Arc;

use bevy::prelude::*;

use crate::constants::{RING_MIN_ANGLE_DEG, UP_DISTANCE_FRACTION};
use crate::error::RayBatchResult;
use crate::ray_batch::{RayBatch, RayBatchHandle, RayCaster, RayFilter, RayResult};
use crate::spatial_grid::SpatialGrid;

/// Ray coverage of a confinement pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RayCoverage {
    /// Ground detonations: rays over the hemisphere facing up
    #[default]
    Hemisphere,
    /// Airborne detonations: rays in every direction
    Sphere,
}

/// Shape of one confinement pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfinementSettings {
    pub radius: f32,
    pub ray_spacing: f32,
    pub coverage: RayCoverage,
    pub filter: RayFilter,
    pub cell_size: f32,
    /// Hits closer than this land in the Confined grid
    pub confined_range: f32,
}

pub struct Confinement {
    batch: RayBatch,
    up: SpatialGrid,
    ring: SpatialGrid,
    confined: SpatialGrid,
    coverage: RayCoverage,
    confined_range: f32,
    origin: Vec3,
    passes: u64,
}

impl Confinement {
    pub fn new(caster: Arc<dyn RayCaster>, settings: &ConfinementSettings) -> Self {
        let hemisphere = settings.coverage == RayCoverage::Hemisphere;
        let radius = settings.radius;

        Self {
            batch: RayBatch::new(caster, radius, settings.ray_spacing, hemisphere, settings.filter),
            up: SpatialGrid::for_extent(settings.cell_size, radius),
            ring: SpatialGrid::for_extent(settings.cell_size, radius),
            confined: SpatialGrid::for_extent(settings.cell_size, settings.confined_range.min(radius)),
            coverage: settings.coverage,
            confined_range: settings.confined_range,
            origin: Vec3::ZERO,
            passes: 0,
        }
    }

    /// Start casting rays around `origin`; `up` orients the hemisphere
    pub fn schedule(&mut self, origin: Vec3, up: Vec3) -> RayBatchResult<RayBatchHandle> {
        let handle = match self.coverage {
            RayCoverage::Hemisphere => self.batch.schedule_hemisphere(origin, up)?,
            RayCoverage::Sphere => self.batch.schedule_sphere(origin)?,
        };
        self.origin = origin;
        self.passes += 1;
        Ok(handle)
    }

    /// Block until the rays of the last schedule are in
    pub fn complete(&mut self) -> RayBatchResult<()> {
        self.batch.complete()
    }

    /// Sort the completed ray results into the grids
    pub fn classify(&mut self) {
        let origin = self.origin;
        let radius = self.batch.radius();
        let up_distance = UP_DISTANCE_FRACTION * radius;
        let ring_angle = RING_MIN_ANGLE_DEG.to_radians();

        for (query, result) in self.batch.queries().iter().zip(self.batch.results()) {
            // Misses register as open space at the end of the ray
            let coords = match result {
                RayResult::Hit(hit) => hit.point,
                RayResult::Miss => origin + query.direction * query.max_distance,
            };
            let offset = coords - origin;
            let distance = offset.length();

            if distance >= up_distance {
                self.up.add(origin, coords);
            }
            if distance > f32::EPSILON && offset.angle_between(Vec3::Y) > ring_angle {
                self.ring.add(origin, coords);
            }
            if result.hit().is_some() && distance < self.confined_range {
                self.confined.add(origin, coords);
            }
        }
    }

    /// Empty all three grids; once per detonation after emission
    pub fn clear(&mut self) {
        self.up.clear();
        self.ring.clear();
        self.confined.clear();
    }

    /// Free the ray buffers; called when the owning blast category goes away
    pub fn release(&mut self) {
        self.clear();
        self.batch.release();
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn radius(&self) -> f32 {
        self.batch.radius()
    }

    pub fn batch(&self) -> &RayBatch {
        &self.batch
    }

    pub fn up(&self) -> &SpatialGrid {
        &self.up
    }

    pub fn ring(&self) -> &SpatialGrid {
        &self.ring
    }

    pub fn confined(&self) -> &SpatialGrid {
        &self.confined
    }

    /// Confinement passes scheduled so far
    pub fn passes(&self) -> u64 {
        self.passes
    }
}
