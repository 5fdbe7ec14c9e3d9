// Bevy integration for confined blasts
// Gameplay writes `Detonate`; procedural particles come back out as `ParticleSpawned` for
// whatever renders them. Insert a `BlastContext` resource to enable the systems.
use bevy::prelude::*;

use crate::blast::{ParticleKind, ParticleSink};
use crate::confined_blast::DetonationReport;
use crate::context::{BlastCategory, BlastContext};

pub struct ConfinedBlastPlugin;

impl Plugin for ConfinedBlastPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<Detonate>()
            .add_event::<ParticleSpawned>()
            .add_event::<ConfinementReport>()
            .add_systems(Update, (handle_detonations, tick_blast_context).chain())
            .add_systems(Last, release_on_exit);
    }
}

/// Request to detonate a registered category
#[derive(Event, Clone, Copy, Debug)]
pub struct Detonate {
    pub category: BlastCategory,
    pub position: Vec3,
    pub rotation: Quat,
}

/// One procedural particle to play
#[derive(Event, Clone, Copy, Debug)]
pub struct ParticleSpawned {
    pub kind: ParticleKind,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Sent when a confinement pass finishes
#[derive(Event, Clone, Copy, Debug)]
pub struct ConfinementReport(pub DetonationReport);

impl ParticleSink for EventWriter<'_, ParticleSpawned> {
    fn play_one_shot(&mut self, kind: ParticleKind, position: Vec3, velocity: Vec3) {
        self.write(ParticleSpawned { kind, position, velocity });
    }
}

fn handle_detonations(context: Option<ResMut<BlastContext>>, mut detonations: EventReader<Detonate>) {
    let Some(mut context) = context else {
        detonations.clear();
        return;
    };

    for detonation in detonations.read() {
        context.detonate(detonation.category, detonation.position, detonation.rotation);
    }
}

fn tick_blast_context(
    context: Option<ResMut<BlastContext>>,
    time: Res<Time>,
    mut spawned: EventWriter<ParticleSpawned>,
    mut reports: EventWriter<ConfinementReport>,
) {
    let Some(mut context) = context else {
        return;
    };
    if context.is_released() {
        return;
    }

    for report in context.tick(time.delta_secs(), &mut spawned) {
        reports.write(ConfinementReport(report));
    }
}

fn release_on_exit(mut exits: EventReader<AppExit>, context: Option<ResMut<BlastContext>>) {
    if exits.is_empty() {
        return;
    }
    exits.clear();

    if let Some(mut context) = context {
        context.release_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bevy::time::TimeUpdateStrategy;

    use super::*;
    use crate::blast::Blast;
    use crate::confined_blast::ConfinedBlastConfig;
    use crate::geometry::{Aabb, StaticScene};

    struct Silent;

    impl Blast for Silent {
        fn emit(&mut self, _position: Vec3, _rotation: Quat) {}
    }

    #[derive(Resource, Default)]
    struct Seen {
        particles: usize,
        reports: usize,
    }

    fn count_events(mut seen: ResMut<Seen>, mut particles: EventReader<ParticleSpawned>, mut reports: EventReader<ConfinementReport>) {
        seen.particles += particles.read().count();
        seen.reports += reports.read().count();
    }

    fn app_with_context() -> (App, BlastCategory) {
        let scene = StaticScene::new()
            .with_box(Aabb::new(Vec3::new(-20.0, -1.0, -20.0), Vec3::new(20.0, 0.0, 20.0)))
            .with_box(Aabb::new(Vec3::new(-5.0, 0.0, 1.5), Vec3::new(5.0, 4.0, 2.0)));
        let mut context = BlastContext::new(Arc::new(scene), 11);
        let mut config = ConfinedBlastConfig::default();
        config.confinement.ray_spacing = 0.6;
        let category = context.register_category("grenade", config, 2, 10.0, |_| Box::new(Silent));

        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_plugins(ConfinedBlastPlugin)
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(50)))
            .insert_resource(context)
            .init_resource::<Seen>()
            .add_systems(PostUpdate, count_events);
        (app, category)
    }

    #[test]
    fn test_detonate_event_produces_particles() {
        let (mut app, category) = app_with_context();
        app.world_mut().send_event(Detonate { category, position: Vec3::new(0.0, 0.5, 0.0), rotation: Quat::IDENTITY });

        for _ in 0..10 {
            app.update();
        }

        let seen = app.world().resource::<Seen>();
        assert_eq!(seen.reports, 1);
        assert!(seen.particles > 0);

        let context = app.world().resource::<BlastContext>();
        assert!(!context.blast(category).unwrap().is_busy());
        assert_eq!(context.pool(category).unwrap().active_count(), 1);

        app.world_mut().resource_mut::<BlastContext>().release_all();
    }

    #[test]
    fn test_app_exit_releases_context() {
        let (mut app, _) = app_with_context();
        app.update();
        app.world_mut().send_event(AppExit::Success);
        app.update();
        assert!(app.world().resource::<BlastContext>().is_released());
    }

    #[test]
    fn test_systems_idle_without_context() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(ConfinedBlastPlugin);
        app.world_mut().send_event(Detonate { category: BlastCategory(0), position: Vec3::ZERO, rotation: Quat::IDENTITY });
        app.update();
        app.update();
    }
}
