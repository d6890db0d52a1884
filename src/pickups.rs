use bevy::prelude::*;
use rand::Rng;

use crate::{
    assets::{FallbackColor, GameSprites},
    audio::{PlaySound, SoundEffect},
    combat::hit_test::circle_overlaps,
    config::GameConfig,
    game_state::{GameplaySet, RunEntity},
    map::TileMap,
    movement::{chase_step, BodyRadius},
    player::{clamp_to_bounds, Player},
    render::{layers, SpawnPop},
};

pub struct PickupsPlugin;

impl Plugin for PickupsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (orb_magnet_system, orb_collect_system)
                .chain()
                .in_set(GameplaySet::Resolve),
        );
    }
}

pub const ORB_RADIUS: f32 = 6.0;
const ORB_SCATTER: f32 = 18.0;

/// Experience dropped by a dead enemy.
#[derive(Component, Copy, Clone, Debug)]
pub struct ExperienceOrb {
    pub value: u32,
}

/// Fired once per orb the player touches.
#[derive(Event, Copy, Clone, Debug)]
pub struct OrbCollected {
    pub value: u32,
}

/// Drops `count` orbs around `position`, scattered a little so a big drop
/// reads as a pile instead of one dot.
pub fn spawn_orbs(
    commands: &mut Commands,
    sprites: &GameSprites,
    position: Vec2,
    count: u32,
    rng: &mut impl Rng,
) {
    for _ in 0..count {
        let offset = if count > 1 {
            Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU))
                * rng.gen_range(0.0..ORB_SCATTER)
        } else {
            Vec2::ZERO
        };
        commands.spawn((
            ExperienceOrb { value: 1 },
            Sprite {
                image: sprites.orb.clone(),
                custom_size: Some(Vec2::splat(ORB_RADIUS * 2.0)),
                ..default()
            },
            FallbackColor(Color::srgb(0.3, 0.9, 1.0)),
            Transform::from_translation((position + offset).extend(layers::PICKUPS)),
            SpawnPop::new(0.2),
            RunEntity,
        ));
    }
}

/// Orbs within the magnet range drift toward the player.
fn orb_magnet_system(
    mut orbs: Query<&mut Transform, (With<ExperienceOrb>, Without<Player>)>,
    player: Query<&Transform, With<Player>>,
    config: Res<GameConfig>,
    map: Res<TileMap>,
    time: Res<Time>,
) {
    let Ok(player_transform) = player.single() else {
        return;
    };
    let target = player_transform.translation.truncate();
    let range = config.combat.orb_magnet_tiles * map.tile_size;
    let range_sq = range * range;

    for mut transform in orbs.iter_mut() {
        let position = transform.translation.truncate();
        if position.distance_squared(target) > range_sq {
            continue;
        }
        let next = chase_step(position, target, config.combat.orb_speed, time.delta_secs());
        let next = clamp_to_bounds(next, ORB_RADIUS, map.bounds());
        transform.translation.x = next.x;
        transform.translation.y = next.y;
    }
}

fn orb_collect_system(
    orbs: Query<(Entity, &Transform, &ExperienceOrb)>,
    player: Query<(&Transform, &BodyRadius), With<Player>>,
    mut commands: Commands,
) {
    let Ok((player_transform, player_radius)) = player.single() else {
        return;
    };
    let player_pos = player_transform.translation.truncate();

    for (entity, transform, orb) in orbs.iter() {
        if circle_overlaps(transform.translation.truncate(), ORB_RADIUS, player_pos, player_radius.0) {
            commands.entity(entity).try_despawn();
            commands.trigger(PlaySound(SoundEffect::Pickup));
            commands.trigger(OrbCollected { value: orb.value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Default)]
    struct Collected(u32);

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(GameConfig::default())
            .insert_resource(TileMap::default_arena(32.0))
            .init_resource::<Collected>()
            .add_systems(Update, (orb_magnet_system, orb_collect_system).chain())
            .add_observer(|trigger: On<OrbCollected>, mut collected: ResMut<Collected>| {
                collected.0 += trigger.value;
            });
        app
    }

    #[test]
    fn touching_an_orb_collects_it_once() {
        let mut app = app();
        app.world_mut().spawn((
            Player,
            BodyRadius(14.0),
            Transform::from_xyz(100.0, 100.0, 0.0),
        ));
        let orb = app
            .world_mut()
            .spawn((ExperienceOrb { value: 1 }, Transform::from_xyz(105.0, 100.0, 0.0)))
            .id();

        app.update();
        app.update();

        assert_eq!(app.world().resource::<Collected>().0, 1);
        assert!(app.world().get_entity(orb).is_err());
    }

    #[test]
    fn distant_orbs_stay_put() {
        let mut app = app();
        app.world_mut().spawn((
            Player,
            BodyRadius(14.0),
            Transform::from_xyz(100.0, 100.0, 0.0),
        ));
        let orb = app
            .world_mut()
            .spawn((ExperienceOrb { value: 1 }, Transform::from_xyz(400.0, 100.0, 0.0)))
            .id();

        app.update();

        let position = app.world().get::<Transform>(orb).unwrap().translation;
        assert_eq!(position.x, 400.0);
        assert_eq!(app.world().resource::<Collected>().0, 0);
    }
}
