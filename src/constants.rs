// Default tuning for confined blasts. Everything here can be overridden per category
// through ConfinedBlastConfig; these are the values a mid-size grenade plays with.

// ===== CONFINEMENT RAYS =====

/// Max distance of every confinement ray, also the classification radius
pub const BLAST_RADIUS: f32 = 6.0;
/// Target spacing between neighbouring ray endpoints on the radius sphere (spacing² = 0.125)
pub const RAY_SPACING: f32 = 0.353_553_38;
/// Delay between scheduling the rays and reading their results (seconds)
pub const RESUME_DELAY: f32 = 0.115;
/// Surface layers confinement rays react to (all layers by default)
pub const RAY_LAYER_MASK: u32 = u32::MAX;

// ===== CLASSIFICATION =====

/// Results at or beyond this fraction of the radius land in the Up grid
pub const UP_DISTANCE_FRACTION: f32 = 0.9;
/// Results further than this from vertical land in the Ring grid (degrees)
pub const RING_MIN_ANGLE_DEG: f32 = 60.0;
/// Surface hits closer than this land in the Confined grid
pub const CONFINED_RANGE: f32 = 4.5;
/// Quantization granularity shared by the three grids
pub const GRID_CELL_SIZE: f32 = 1.0;

// ===== DUST =====

/// Confined cells sampled per detonation for dust
pub const DUST_SAMPLE_COUNT: usize = 48;
/// Minimum ray count a confined cell needs before it is sampled
pub const DUST_MIN_CELL_COUNT: u32 = 2;
/// Confined occupancy above which dust is skipped entirely (too chaotic)
pub const DUST_CONFINED_CEILING: usize = 400;
/// Distance covered per dust puff along a cell direction
pub const DUST_PUFF_SPACING: f32 = 0.6;
/// Puff speed for a cell at full radius
pub const DUST_SPEED: f32 = 9.0;
/// Minimum fraction of the speed range the first puff of a sequence gets
pub const DUST_SPREAD_FLOOR: f32 = 0.15;
/// Fraction of the speed range spread across a puff sequence
pub const DUST_SPREAD: f32 = 0.85;
/// Largest angular perturbation applied to a puff direction (radians)
pub const DUST_MAX_DEVIATION: f32 = 0.12;

// ===== SPARKS =====

/// Sparks require fewer occupied Confined cells than this
pub const SPARK_CONFINED_MAX: usize = 40;
/// Sparks require fewer occupied Up cells than this
pub const SPARK_UP_MAX: usize = 120;
/// Spark count per ring cell is SPARK_MIN_PER_CELL..=SPARK_MAX_PER_CELL
pub const SPARK_MIN_PER_CELL: u32 = 3;
pub const SPARK_MAX_PER_CELL: u32 = 7;
/// Spark speed range before length scaling
pub const SPARK_SPEED_MIN: f32 = 6.0;
pub const SPARK_SPEED_MAX: f32 = 14.0;
/// Largest angular perturbation applied to a spark direction (radians)
pub const SPARK_MAX_DEVIATION: f32 = 0.25;

// ===== RING DUST =====

/// Ring dust puffs travel slower than confined dust, they hug the ground
pub const RING_DUST_SPEED: f32 = 5.0;
/// Distance covered per ring dust puff
pub const RING_DUST_PUFF_SPACING: f32 = 1.2;

// ===== POOLS =====

/// Pre-built copies of each static blast effect
pub const STATIC_EFFECT_COPIES: usize = 4;
/// Seconds a pooled effect stays active before returning to the free list
pub const STATIC_EFFECT_LIFETIME: f64 = 10.0;
