// Headless confined blast demo
// Builds a closed room next to an open field, detonates grenades in the middle of the room,
// against a wall and out in the open, and logs what each confinement pass produced.
use std::sync::Arc;
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use confined_blast::constants::{STATIC_EFFECT_COPIES, STATIC_EFFECT_LIFETIME};
use confined_blast::geometry::{Aabb, StaticScene};
use confined_blast::{
    Blast, BlastCategory, BlastContext, ConfinedBlastConfig, ConfinedBlastPlugin, ConfinementReport, Detonate,
    ParticleKind, ParticleSpawned, ParticleTally,
};

const ROOM_HALF_WIDTH: f32 = 6.0;
const ROOM_HEIGHT: f32 = 4.0;
const WALL_THICKNESS: f32 = 0.5;
const OPEN_FIELD_X: f32 = 30.0;
const DETONATION_HEIGHT: f32 = 0.3;
const DEMO_DURATION: f32 = 2.0;

/// Scripted detonations: (time, label, position)
const SCRIPT: [(f32, &str, Vec3); 5] = [
    (0.2, "room centre", Vec3::new(0.0, DETONATION_HEIGHT, 0.0)),
    (0.6, "against wall", Vec3::new(ROOM_HALF_WIDTH - 0.5, DETONATION_HEIGHT, 0.0)),
    (1.0, "open field", Vec3::new(OPEN_FIELD_X, DETONATION_HEIGHT, 0.0)),
    // Same frame as the open field one: static effect only
    (1.0, "open field (second)", Vec3::new(OPEN_FIELD_X + 2.0, DETONATION_HEIGHT, 0.0)),
    (1.4, "room corner", Vec3::new(ROOM_HALF_WIDTH - 0.5, DETONATION_HEIGHT, ROOM_HALF_WIDTH - 0.5)),
];

fn main() {
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))))
        .add_plugins(LogPlugin::default())
        .add_plugins(ConfinedBlastPlugin)
        .insert_resource(build_context())
        .init_resource::<DemoState>()
        .add_systems(Update, (run_script, finish_demo).chain())
        .add_systems(PostUpdate, tally_events)
        .run();
}

/// Stand-in for a pre-authored effect: logs where it played
struct LoggedFlash {
    copy: usize,
}

impl Blast for LoggedFlash {
    fn emit(&mut self, position: Vec3, _rotation: Quat) {
        debug!("✨ Static flash copy {} at {:?}", self.copy, position);
    }
}

#[derive(Resource, Default)]
struct DemoState {
    category: Option<BlastCategory>,
    next: usize,
    tally: ParticleTally,
    passes: usize,
    done: bool,
}

fn build_scene() -> StaticScene {
    let w = ROOM_HALF_WIDTH;
    let t = WALL_THICKNESS;
    let h = ROOM_HEIGHT;

    StaticScene::new()
        // Ground under both the room and the open field
        .with_box(Aabb::new(Vec3::new(-w - 10.0, -1.0, -w - 10.0), Vec3::new(OPEN_FIELD_X + 20.0, 0.0, w + 10.0)))
        .with_box(Aabb::new(Vec3::new(-w - t, 0.0, -w - t), Vec3::new(-w, h, w + t)))
        .with_box(Aabb::new(Vec3::new(w, 0.0, -w - t), Vec3::new(w + t, h, w + t)))
        .with_box(Aabb::new(Vec3::new(-w, 0.0, -w - t), Vec3::new(w, h, -w)))
        .with_box(Aabb::new(Vec3::new(-w, 0.0, w), Vec3::new(w, h, w + t)))
        .with_box(Aabb::new(Vec3::new(-w - t, h, -w - t), Vec3::new(w + t, h + t, w + t)))
}

fn build_context() -> BlastContext {
    let mut context = BlastContext::new(Arc::new(build_scene()), 0x5EED);
    let category = context.register_category(
        "grenade",
        ConfinedBlastConfig::default(),
        STATIC_EFFECT_COPIES,
        STATIC_EFFECT_LIFETIME,
        |copy| Box::new(LoggedFlash { copy }),
    );
    info!("🏠 Demo scene ready, category {:?}", category);
    context
}

fn run_script(
    time: Res<Time>,
    context: Res<BlastContext>,
    mut state: ResMut<DemoState>,
    mut detonations: EventWriter<Detonate>,
) {
    let category = match state.category {
        Some(category) => category,
        None => match context.category_named("grenade") {
            Some(category) => {
                state.category = Some(category);
                category
            }
            None => return,
        },
    };

    let elapsed = time.elapsed_secs();
    while let Some(&(at, label, position)) = SCRIPT.get(state.next) {
        if at > elapsed {
            break;
        }
        info!("💣 Detonating {} at {:?}", label, position);
        detonations.write(Detonate { category, position, rotation: Quat::IDENTITY });
        state.next += 1;
    }
}

fn tally_events(
    mut state: ResMut<DemoState>,
    mut particles: EventReader<ParticleSpawned>,
    mut reports: EventReader<ConfinementReport>,
) {
    for particle in particles.read() {
        match particle.kind {
            ParticleKind::Dust => state.tally.dust += 1,
            ParticleKind::Spark => state.tally.sparks += 1,
            ParticleKind::RingDust => state.tally.ring_dust += 1,
        }
    }

    for ConfinementReport(report) in reports.read() {
        state.passes += 1;
        info!(
            "📊 Pass at {:?}: up={} ring={} confined={} | dust={}{} sparks={}{} ring dust={}",
            report.origin,
            report.up_cells,
            report.ring_cells,
            report.confined_cells,
            report.dust_puffs,
            if report.dust_skipped { " (skipped)" } else { "" },
            report.sparks,
            if report.sparks_skipped { " (skipped)" } else { "" },
            report.ring_puffs
        );
    }
}

fn finish_demo(
    time: Res<Time>,
    context: Res<BlastContext>,
    mut state: ResMut<DemoState>,
    mut exit: EventWriter<AppExit>,
) {
    if state.done || time.elapsed_secs() < DEMO_DURATION {
        return;
    }
    state.done = true;

    let downgraded = state.category.and_then(|c| context.blast(c)).map_or(0, |blast| blast.downgraded());
    info!(
        "🏁 {} passes, {} static-only | particles: dust={} sparks={} ring dust={} total={} | forced steals={}",
        state.passes,
        downgraded,
        state.tally.dust,
        state.tally.sparks,
        state.tally.ring_dust,
        state.tally.total(),
        context.scheduler().forced_steals()
    );
    exit.write(AppExit::Success);
}
