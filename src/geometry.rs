// Geometry helpers - boxes, ray intersection and a small static scene that answers
// confinement rays without a physics engine (tests, demo, headless hosts)
use bevy::prelude::*;

use crate::ray_batch::{RayCaster, RayFilter, RayHit, SurfaceId};

/// Axis-aligned box, inclusive on both corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    /// Zero-size box around a single point
    pub fn from_point(point: Vec3) -> Self {
        Self { min: point, max: point }
    }

    /// Grow the box so it encloses `point`
    pub fn encapsulate(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Ray-sphere intersection test
/// Returns Some((distance, hit_point)) if ray intersects sphere, None otherwise
pub fn ray_sphere_intersection(
    ray_origin: Vec3,
    ray_direction: Vec3,
    sphere_center: Vec3,
    sphere_radius: f32,
) -> Option<(f32, Vec3)> {
    let oc = ray_origin - sphere_center;
    let a = ray_direction.dot(ray_direction);
    let b = 2.0 * oc.dot(ray_direction);
    let c = oc.dot(oc) - sphere_radius * sphere_radius;
    let discriminant = b * b - 4.0 * a * c;

    if discriminant < 0.0 {
        return None;
    }

    // Nearest intersection first (entry point into sphere)
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    if t > 0.0 {
        return Some((t, ray_origin + ray_direction * t));
    }

    // Exit point, in case we're inside the sphere
    let t2 = (-b + discriminant.sqrt()) / (2.0 * a);
    if t2 > 0.0 {
        return Some((t2, ray_origin + ray_direction * t2));
    }

    None
}

/// Ray-box intersection (slab test)
/// Returns Some((distance, hit_point)) for the first surface crossed, None otherwise.
/// A ray starting inside the box reports the exit surface.
pub fn ray_aabb_intersection(ray_origin: Vec3, ray_direction: Vec3, aabb: &Aabb) -> Option<(f32, Vec3)> {
    let inv = ray_direction.recip();
    let t1 = (aabb.min - ray_origin) * inv;
    let t2 = (aabb.max - ray_origin) * inv;

    // NaN (0 * inf) on axis-parallel rays through a slab face is dropped by min/max
    let t_near = t1.min(t2).max_element();
    let t_far = t1.max(t2).min_element();

    if t_far < 0.0 || t_near > t_far {
        return None;
    }

    let t = if t_near > 0.0 { t_near } else { t_far };
    Some((t, ray_origin + ray_direction * t))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Box(Aabb),
    Sphere { center: Vec3, radius: f32 },
}

/// One static collider
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub surface: SurfaceId,
    /// Layer bits matched against RayFilter::mask
    pub layers: u32,
}

/// Brute-force scene of static colliders
///
/// Good enough for a handful of walls; real hosts implement [`RayCaster`] over their
/// physics broadphase instead.
#[derive(Default, Debug, Clone)]
pub struct StaticScene {
    colliders: Vec<Collider>,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_box(&mut self, aabb: Aabb, layers: u32) -> SurfaceId {
        self.add(Shape::Box(aabb), layers)
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, layers: u32) -> SurfaceId {
        self.add(Shape::Sphere { center, radius }, layers)
    }

    pub fn with_box(mut self, aabb: Aabb) -> Self {
        self.add_box(aabb, u32::MAX);
        self
    }

    fn add(&mut self, shape: Shape, layers: u32) -> SurfaceId {
        let surface = SurfaceId(self.colliders.len() as u32);
        self.colliders.push(Collider { shape, surface, layers });
        surface
    }
}

impl RayCaster for StaticScene {
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, filter: RayFilter) -> Option<RayHit> {
        let mut nearest: Option<RayHit> = None;

        for collider in self.colliders.iter().filter(|c| filter.accepts(c.layers)) {
            let hit = match collider.shape {
                Shape::Box(aabb) => ray_aabb_intersection(origin, direction, &aabb),
                Shape::Sphere { center, radius } => ray_sphere_intersection(origin, direction, center, radius),
            };

            let Some((distance, point)) = hit else {
                continue;
            };
            if distance > max_distance {
                continue;
            }
            if nearest.is_some_and(|n| n.distance <= distance) {
                continue;
            }

            nearest = Some(RayHit { point, distance, surface: collider.surface });
        }

        nearest
    }
}
