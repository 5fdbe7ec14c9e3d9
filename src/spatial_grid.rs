// Spatial grid for confinement - quantized 3D buckets around a detonation origin
// Each bucket keeps a running centroid, bounds and count of the points added to it,
// plus a sparse list of occupied buckets so clearing and sampling never scan the dense array.
use bevy::prelude::*;
use rand::Rng;

use crate::geometry::Aabb;

/// Point statistics of one bucket
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cell {
    /// Running centroid of the contributing points
    pub position: Vec3,
    /// Encloses every contributing point
    pub bounds: Aabb,
    pub count: u32,
    pub occupied: bool,
}

impl Cell {
    fn first(point: Vec3) -> Self {
        Self {
            position: point,
            bounds: Aabb::from_point(point),
            count: 1,
            occupied: true,
        }
    }

    fn accumulate(&mut self, point: Vec3) {
        // Incremental mean: the n-th point moves the centroid by 1/n of its offset
        let weight = 1.0 / (self.count + 1) as f32;
        self.position = self.position.lerp(point, weight);
        self.bounds.encapsulate(point);
        self.count += 1;
    }
}

/// Dense `(2·radius+1)³` bucket array at a fixed granularity
pub struct SpatialGrid {
    cell_size: f32,
    /// Buckets from the centre to an edge
    radius: i32,
    size: usize,
    cells: Vec<Cell>,
    entries: Vec<UVec3>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32, radius: u32) -> Self {
        let size = 2 * radius as usize + 1;
        Self {
            cell_size,
            radius: radius as i32,
            size,
            cells: vec![Cell::default(); size * size * size],
            entries: Vec::new(),
        }
    }

    /// Grid just big enough to hold points up to `extent` away from the origin
    pub fn for_extent(cell_size: f32, extent: f32) -> Self {
        Self::new(cell_size, (extent / cell_size).ceil().max(0.0) as u32)
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Buckets per axis
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bucket a point falls into, relative to `origin`
    ///
    /// Rounds to the nearest bucket and clamps points outside the grid onto its faces.
    pub fn bucket(&self, origin: Vec3, point: Vec3) -> UVec3 {
        // Clamp before leaving float space so far points cannot overflow the offset
        let radius = self.radius as f32;
        let quantized = ((point - origin) / self.cell_size)
            .round()
            .clamp(Vec3::splat(-radius), Vec3::splat(radius));
        (quantized.as_ivec3() + IVec3::splat(self.radius)).as_uvec3()
    }

    fn index(&self, bucket: UVec3) -> usize {
        bucket.x as usize + bucket.y as usize * self.size + bucket.z as usize * self.size * self.size
    }

    pub fn add(&mut self, origin: Vec3, point: Vec3) {
        let bucket = self.bucket(origin, point);
        let index = self.index(bucket);
        let cell = &mut self.cells[index];

        if cell.occupied {
            cell.accumulate(point);
        } else {
            *cell = Cell::first(point);
            self.entries.push(bucket);
        }
    }

    /// Reset every occupied bucket; cost scales with occupancy, not grid size
    pub fn clear(&mut self) {
        for bucket in std::mem::take(&mut self.entries) {
            let index = self.index(bucket);
            self.cells[index] = Cell::default();
        }
    }

    pub fn cell(&self, bucket: UVec3) -> &Cell {
        &self.cells[self.index(bucket)]
    }

    /// Occupied buckets in insertion order
    pub fn entries(&self) -> &[UVec3] {
        &self.entries
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.entries.iter().map(|&bucket| self.cell(bucket))
    }

    /// Number of occupied buckets
    pub fn occupied(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Points added since the last clear
    pub fn total_count(&self) -> u64 {
        self.cells().map(|cell| cell.count as u64).sum()
    }

    /// Uniform random subset of `count` distinct occupied buckets
    ///
    /// With `min_count > 0` only buckets holding at least that many points are candidates.
    /// Asking for more than there are returns all candidates. Partial Fisher-Yates: only the
    /// first `count` positions are shuffled.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, min_count: u32, rng: &mut R) -> Vec<UVec3> {
        let mut candidates: Vec<UVec3> = if min_count == 0 {
            self.entries.clone()
        } else {
            self.entries
                .iter()
                .copied()
                .filter(|&bucket| self.cell(bucket).count >= min_count)
                .collect()
        };

        let count = count.min(candidates.len());
        let len = candidates.len();
        for i in 0..count {
            let j = rng.gen_range(i..len);
            candidates.swap(i, j);
        }

        candidates.truncate(count);
        candidates
    }
}
