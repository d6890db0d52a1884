use bevy::prelude::*;

use crate::{
    combat::Staggered,
    enemy::Enemy,
    game_state::GameplaySet,
    health::Dying,
    map::TileMap,
    player::{clamp_to_bounds, Player},
};

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        // unsmush runs after the chase so it gets the "last word" each frame
        app.add_systems(
            Update,
            (chase_player_system, unsmush_system)
                .chain()
                .in_set(GameplaySet::Movement),
        );
    }
}

/// Movement speed in pixels per second.
#[derive(Component, Copy, Clone, Debug, PartialEq)]
pub struct Speed(pub f32);

/// Collision radius. Every body in the arena is a circle.
#[derive(Component, Copy, Clone, Debug, PartialEq)]
pub struct BodyRadius(pub f32);

/// One frame of chase: step from `from` toward `to`, never overshooting.
pub fn chase_step(from: Vec2, to: Vec2, speed: f32, delta: f32) -> Vec2 {
    let diff = to - from;
    let step = speed * delta;
    if diff.length() <= step {
        return to;
    }
    from + diff.normalize_or_zero() * step
}

/// Enemies walk straight at the player. Staggered enemies are frozen until
/// their stagger wears off.
pub fn chase_player_system(
    mut enemies: Query<
        (&mut Transform, &Speed),
        (With<Enemy>, Without<Player>, Without<Staggered>, Without<Dying>),
    >,
    player: Query<&Transform, With<Player>>,
    time: Res<Time>,
) {
    let Ok(player_transform) = player.single() else {
        return;
    };
    let target = player_transform.translation.truncate();
    let delta = time.delta_secs();

    for (mut transform, speed) in enemies.iter_mut() {
        let next = chase_step(transform.translation.truncate(), target, speed.0, delta);
        transform.translation.x = next.x;
        transform.translation.y = next.y;
    }
}

/// How hard two overlapping bodies push apart, in pixels per second at
/// full overlap.
const PUSH_STRENGTH: f32 = 100.0;

/// Pushes enemies apart when their bodies overlap. The closer they are, the
/// stronger the push. This keeps a horde from collapsing into one sprite.
/// A push never moves a body past the edge of the map.
pub fn unsmush_system(
    mut query: Query<(Entity, &mut Transform, &BodyRadius), (With<Enemy>, Without<Dying>)>,
    map: Res<TileMap>,
    time: Res<Time>,
) {
    let bounds = map.bounds();
    // Phase 1: Collect all positions so we can compare without borrow conflicts.
    let bodies: Vec<(Entity, Vec2, f32)> = query
        .iter()
        .map(|(entity, transform, radius)| (entity, transform.translation.truncate(), radius.0))
        .collect();

    // Phase 2: For each pair, calculate push forces.
    // We accumulate forces first, then apply them, otherwise earlier pushes
    // would affect later distance calculations within the same frame.
    let mut pushes: Vec<(Entity, Vec2)> = Vec::new();

    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (entity_a, pos_a, radius_a) = bodies[i];
            let (entity_b, pos_b, radius_b) = bodies[j];

            let min_distance = radius_a + radius_b;
            let diff = pos_a - pos_b;
            let distance = diff.length();

            if distance < min_distance && distance > 0.01 {
                // 0.0 = barely touching, 1.0 = fully overlapping
                let overlap_ratio = 1.0 - (distance / min_distance);
                let force = diff.normalize() * overlap_ratio * PUSH_STRENGTH * time.delta_secs();

                pushes.push((entity_a, force));
                pushes.push((entity_b, -force));
            }
        }
    }

    // Phase 3: Apply all pushes
    for (entity, force) in pushes {
        if let Ok((_, mut transform, radius)) = query.get_mut(entity) {
            let pushed = clamp_to_bounds(transform.translation.truncate() + force, radius.0, bounds);
            transform.translation.x = pushed.x;
            transform.translation.y = pushed.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chase_moves_by_speed_times_delta() {
        let next = chase_step(Vec2::ZERO, Vec2::new(100.0, 0.0), 60.0, 0.5);
        assert!((next - Vec2::new(30.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn chase_never_overshoots() {
        let target = Vec2::new(3.0, 4.0);
        assert_eq!(chase_step(Vec2::ZERO, target, 1000.0, 1.0), target);
    }

    #[test]
    fn chase_on_top_of_target_stays_put() {
        assert_eq!(chase_step(Vec2::ONE, Vec2::ONE, 50.0, 0.1), Vec2::ONE);
    }

    #[test]
    fn crowd_at_the_wall_stays_inside_the_map() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(TileMap::default_arena(32.0))
            .add_systems(Update, unsmush_system);

        // The outer body already pokes past x = 0 and is shoved further left
        let outer = app
            .world_mut()
            .spawn((Enemy, BodyRadius(14.0), Transform::from_xyz(5.0, 300.0, 0.0)))
            .id();
        let inner = app
            .world_mut()
            .spawn((Enemy, BodyRadius(14.0), Transform::from_xyz(12.0, 300.0, 0.0)))
            .id();

        for _ in 0..3 {
            app.update();
        }

        let x = |e: Entity| app.world().get::<Transform>(e).unwrap().translation.x;
        assert!(x(outer) >= 14.0);
        assert!(x(inner) >= 14.0);
    }
}
