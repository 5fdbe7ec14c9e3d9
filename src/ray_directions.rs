// Well-distributed ray directions over a sphere or hemisphere.
//
// Directions come from a Fibonacci sphere: heights are spaced linearly from +Y to -Y and
// longitudes advance by the golden angle, which keeps angular density close to uniform
// without clustering at the poles. Everything here is a pure function of its inputs.

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;

/// Golden ratio φ
const GOLDEN_RATIO: f32 = 1.618_034;

/// Direction `index` of a `total`-sample Fibonacci sphere
///
/// Index 0 points straight up (+Y), the last index straight down.
pub fn sphere_direction(index: usize, total: usize) -> Vec3 {
    if total <= 1 {
        return Vec3::Y;
    }

    let i = index as f32;
    let y = 1.0 - 2.0 * i / (total - 1) as f32;
    let ring_radius = (1.0 - y * y).max(0.0).sqrt();
    let theta = TAU * i / (GOLDEN_RATIO * GOLDEN_RATIO);

    Vec3::new(theta.cos() * ring_radius, y, theta.sin() * ring_radius)
}

/// Direction `index` of a `total`-sample hemisphere around `up`
///
/// The upper half of a `2 * total` sphere (every sample with `y >= 0`) rotated so that +Y
/// lands on `up`. With `up == Vec3::Y` the samples are used as they are.
pub fn hemisphere_direction(index: usize, total: usize, up: Vec3) -> Vec3 {
    let direction = sphere_direction(index, total.saturating_mul(2));
    let up = up.normalize_or(Vec3::Y);

    Quat::from_rotation_arc(Vec3::Y, up) * direction
}

/// Rays needed so neighbouring endpoints on a sphere of `radius` sit about `spacing` apart
///
/// `ceil(4π·radius² / spacing²)`, halved (rounding up) for a hemisphere. Never returns zero.
pub fn ray_count(radius: f32, spacing: f32, hemisphere: bool) -> usize {
    let area = 4.0 * PI * radius * radius;
    let sphere = (area / (spacing * spacing)).ceil().max(1.0) as usize;

    if hemisphere {
        sphere.div_ceil(2)
    } else {
        sphere
    }
}
