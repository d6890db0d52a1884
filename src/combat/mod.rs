//! Player attacks and their resolution against enemies.
//!
//! Every attack is an entity carrying its own `HitSet`. Resolution runs once
//! per frame per attack and skips any enemy already in the set, so a volume
//! that lingers for several frames still damages each enemy only once.

pub mod hit_test;

use std::collections::HashSet;

use bevy::{prelude::*, window::PrimaryWindow};
use rand::Rng;

use crate::{
    assets::{FallbackColor, GameSprites},
    audio::{PlaySound, SoundEffect},
    camera::MainCamera,
    config::GameConfig,
    enemy::{Enemy, EnemyKilled, EnemyKind},
    game_state::{GameplaySet, RunEntity},
    health::{DamageOutcome, DamagedEvent, Dying, Health},
    map::TileMap,
    movement::BodyRadius,
    player::{clamp_to_bounds, Facing, Player, PlayerStats},
    render::layers,
};
use hit_test::{circle_overlaps, in_swing_arc, rect_overlaps_circle, segment_hits_circle, splash_damage};

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, player_attack_input_system.in_set(GameplaySet::Input))
            // Fire, then resolve, then expire. Expiring last means a volume
            // always gets at least one resolution pass.
            .add_systems(
                Update,
                (
                    auto_weapons_system,
                    melee_hit_system,
                    carrot_system,
                    lightning_system,
                    attack_lifetime_system,
                    stagger_system,
                )
                    .chain()
                    .in_set(GameplaySet::Combat),
            );
    }
}

pub const CARROT_RADIUS: f32 = 6.0;

// ── Data types ──────────────────────────────────────────────────────────────

/// Countdown in seconds. Ready at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cooldown {
    remaining: f32,
}

impl Cooldown {
    pub fn tick(&mut self, delta: f32) {
        self.remaining = (self.remaining - delta).max(0.0);
    }

    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn start(&mut self, seconds: f32) {
        self.remaining = seconds.max(0.0);
    }
}

/// The player's weapon cooldowns. All start ready.
#[derive(Component, Debug, Clone, Default)]
pub struct AttackTimers {
    pub swing: Cooldown,
    pub slam: Cooldown,
    pub carrot: Cooldown,
    pub lightning: Cooldown,
}

/// Enemies one attack instance has already damaged.
#[derive(Debug, Clone, Default)]
pub struct HitSet(HashSet<Entity>);

impl HitSet {
    /// Records the hit. False if this entity was already hit.
    pub fn first_hit(&mut self, entity: Entity) -> bool {
        self.0.insert(entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.0.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A snapshot of one live enemy, taken at the start of a resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub entity: Entity,
    pub position: Vec2,
    pub radius: f32,
}

/// Damage one attack deals to one enemy this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    pub entity: Entity,
    pub damage: i32,
    /// Caught in an explosion rather than hit directly
    pub splash: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeleeShape {
    /// Arc in front of the player
    Swing {
        facing: Vec2,
        min_radius: f32,
        arc_radius: f32,
        arc_angle: f32,
    },
    /// Square centred on the player
    Slam { half_extents: Vec2 },
}

impl MeleeShape {
    pub fn hits(&self, origin: Vec2, target: &Target) -> bool {
        match *self {
            MeleeShape::Swing {
                facing,
                min_radius,
                arc_radius,
                arc_angle,
            } => in_swing_arc(origin, facing, target.position, min_radius, arc_radius, arc_angle),
            MeleeShape::Slam { half_extents } => {
                rect_overlaps_circle(origin, half_extents, target.position, target.radius)
            }
        }
    }
}

/// A swing or a slam. Lives for `lifetime` and is resolved every frame.
#[derive(Component, Debug, Clone)]
pub struct MeleeAttack {
    pub shape: MeleeShape,
    pub origin: Vec2,
    pub damage: i32,
    pub critical: bool,
    pub hits: HitSet,
    pub lifetime: Timer,
}

impl MeleeAttack {
    /// One frame of resolution. With `splash_radius` set, every direct hit
    /// also catches the other enemies around it for half damage. Splashed
    /// enemies join the hit set too.
    pub fn resolve(&mut self, targets: &[Target], splash_radius: Option<f32>) -> Vec<Strike> {
        let mut strikes = Vec::new();
        let mut struck_at = Vec::new();

        for target in targets {
            if self.shape.hits(self.origin, target) && self.hits.first_hit(target.entity) {
                strikes.push(Strike {
                    entity: target.entity,
                    damage: self.damage,
                    splash: false,
                });
                struck_at.push(target.position);
            }
        }

        if let Some(radius) = splash_radius {
            let damage = splash_damage(self.damage);
            for center in struck_at {
                for target in targets {
                    if target.position.distance(center) <= radius
                        && self.hits.first_hit(target.entity)
                    {
                        strikes.push(Strike {
                            entity: target.entity,
                            damage,
                            splash: true,
                        });
                    }
                }
            }
        }

        strikes
    }
}

/// Auto-fired ranged attack. Flies straight and is gone after its first hit.
#[derive(Component, Debug, Clone)]
pub struct PiercingCarrot {
    pub velocity: Vec2,
    pub damage: i32,
    pub hits: HitSet,
    pub lifetime: Timer,
}

impl PiercingCarrot {
    pub fn first_strike(&mut self, position: Vec2, targets: &[Target]) -> Option<Strike> {
        let target = targets.iter().find(|target| {
            !self.hits.contains(target.entity)
                && circle_overlaps(position, CARROT_RADIUS, target.position, target.radius)
        })?;
        self.hits.first_hit(target.entity);
        Some(Strike {
            entity: target.entity,
            damage: self.damage,
            splash: false,
        })
    }
}

/// A bolt from the player to an enemy. Resolved once, then left on screen
/// until its lifetime runs out.
#[derive(Component, Debug, Clone)]
pub struct LightningAttack {
    pub from: Vec2,
    pub to: Vec2,
    pub thickness: f32,
    pub damage: i32,
    pub hits: HitSet,
    pub resolved: bool,
    pub lifetime: Timer,
}

impl LightningAttack {
    pub fn resolve(&mut self, targets: &[Target]) -> Vec<Strike> {
        if self.resolved {
            return Vec::new();
        }
        self.resolved = true;

        let mut strikes = Vec::new();
        for target in targets {
            if segment_hits_circle(self.from, self.to, self.thickness, target.position, target.radius)
                && self.hits.first_hit(target.entity)
            {
                strikes.push(Strike {
                    entity: target.entity,
                    damage: self.damage,
                    splash: false,
                });
            }
        }
        strikes
    }
}

/// Knocked-back enemies stop chasing and biting until this runs out.
#[derive(Component, Debug, Clone)]
pub struct Staggered(pub Timer);

// ── Rules ───────────────────────────────────────────────────────────────────

/// A critical swing deals double damage.
pub fn swing_damage(base: i32, critical: bool) -> i32 {
    if critical { base.saturating_mul(2) } else { base }
}

/// One trial per swing. Clamped so a stacked chance can't panic gen_bool.
pub fn roll_critical(chance: f32, rng: &mut impl Rng) -> bool {
    rng.gen_bool(chance.clamp(0.0, 1.0) as f64)
}

/// `count` directions spread evenly around `aim`, `spread` radians apart.
pub fn fan_directions(aim: Vec2, count: u32, spread: f32) -> Vec<Vec2> {
    let aim = aim.normalize_or(Vec2::X);
    let middle = (count.max(1) - 1) as f32 * 0.5;
    (0..count.max(1))
        .map(|i| Vec2::from_angle((i as f32 - middle) * spread).rotate(aim))
        .collect()
}

pub fn nearest_target(origin: Vec2, targets: &[Target], range: f32) -> Option<&Target> {
    targets
        .iter()
        .filter(|target| target.position.distance(origin) <= range)
        .min_by(|a, b| {
            a.position
                .distance_squared(origin)
                .total_cmp(&b.position.distance_squared(origin))
        })
}

/// Where a knocked-back enemy lands: pushed straight away from `from`.
pub fn knockback_position(from: Vec2, position: Vec2, distance: f32) -> Vec2 {
    let away = (position - from).normalize_or_zero();
    position + away * distance
}

/// Apply one strike's damage and announce what happened. Only the killing
/// blow triggers `EnemyKilled`.
pub fn apply_strike(
    commands: &mut Commands,
    entity: Entity,
    health: &mut Health,
    kind: EnemyKind,
    position: Vec2,
    damage: i32,
    critical: bool,
) -> DamageOutcome {
    let outcome = health.take_damage(damage);
    match outcome {
        DamageOutcome::Ignored => {}
        DamageOutcome::Wounded => {
            commands.trigger(DamagedEvent {
                entity,
                amount: damage,
                critical,
            });
        }
        DamageOutcome::Killed => {
            commands.trigger(DamagedEvent {
                entity,
                amount: damage,
                critical,
            });
            commands.entity(entity).try_insert(Dying);
            commands.trigger(EnemyKilled {
                entity,
                kind,
                position,
            });
        }
    }
    outcome
}

type LiveEnemies<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static mut Transform,
        &'static BodyRadius,
        &'static mut Health,
        &'static EnemyKind,
    ),
    (With<Enemy>, Without<Dying>),
>;

/// Enemies alive at the start of the frame. Callers drop an entry as soon as
/// they kill it, so later attacks in the same frame pass through the corpse.
fn snapshot(enemies: &LiveEnemies) -> Vec<Target> {
    enemies
        .iter()
        .map(|(entity, transform, radius, _, _)| Target {
            entity,
            position: transform.translation.truncate(),
            radius: radius.0,
        })
        .collect()
}

// ── Systems ─────────────────────────────────────────────────────────────────

/// Cursor position in world space, if the cursor is over the window.
fn cursor_world_position(
    window: &Query<&Window, With<PrimaryWindow>>,
    camera: &Query<(&Camera, &GlobalTransform), With<MainCamera>>,
) -> Option<Vec2> {
    let cursor = window.single().ok()?.cursor_position()?;
    let (camera, camera_transform) = camera.single().ok()?;
    camera.viewport_to_world_2d(camera_transform, cursor).ok()
}

#[allow(clippy::too_many_arguments)]
fn player_attack_input_system(
    keys: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    window: Query<&Window, With<PrimaryWindow>>,
    camera: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut player: Query<(&Transform, &Facing, &PlayerStats, &mut AttackTimers), With<Player>>,
    config: Res<GameConfig>,
    map: Res<TileMap>,
    time: Res<Time>,
    mut commands: Commands,
) {
    let Ok((transform, facing, stats, mut timers)) = player.single_mut() else {
        return;
    };
    let delta = time.delta_secs();
    timers.swing.tick(delta);
    timers.slam.tick(delta);
    timers.carrot.tick(delta);
    timers.lightning.tick(delta);

    let origin = transform.translation.truncate();
    let aim = cursor_world_position(&window, &camera)
        .map(|cursor| cursor - origin)
        .filter(|offset| offset.length_squared() > 1.0)
        .map_or(facing.0, Vec2::normalize);
    let combat = &config.combat;
    let lifetime = combat.melee_duration_ms as f32 / 1000.0;

    let swing_pressed = keys.pressed(KeyCode::Space) || mouse.pressed(MouseButton::Left);
    if swing_pressed && timers.swing.is_ready() {
        timers.swing.start(stats.attack_cooldown_secs());

        let critical = roll_critical(stats.critical_chance, &mut rand::thread_rng());
        let damage = swing_damage(stats.attack_damage, critical);
        let arc_radius = combat.swing_reach_tiles * map.tile_size * stats.attack_size;
        let shape = MeleeShape::Swing {
            facing: aim,
            min_radius: combat.swing_min_radius,
            arc_radius,
            arc_angle: combat.swing_arc_degrees.to_radians(),
        };

        let color = if critical {
            Color::srgba(1.0, 0.85, 0.3, 0.45)
        } else {
            Color::srgba(1.0, 1.0, 1.0, 0.35)
        };
        commands.spawn((
            MeleeAttack {
                shape,
                origin,
                damage,
                critical,
                hits: HitSet::default(),
                lifetime: Timer::from_seconds(lifetime, TimerMode::Once),
            },
            Sprite::from_color(color, Vec2::new(arc_radius, arc_radius * 1.5)),
            Transform::from_translation((origin + aim * arc_radius * 0.5).extend(layers::EFFECTS))
                .with_rotation(Quat::from_rotation_z(aim.to_angle())),
            RunEntity,
        ));
        commands.trigger(PlaySound(SoundEffect::Swing));
    }

    let slam_pressed = keys.pressed(KeyCode::KeyE) || mouse.pressed(MouseButton::Right);
    if slam_pressed && timers.slam.is_ready() {
        timers
            .slam
            .start(stats.attack_cooldown_secs() * combat.slam_cooldown_factor);

        // Side of two tiles at size 1.0
        let half_extents = Vec2::splat(map.tile_size * stats.attack_size);
        commands.spawn((
            MeleeAttack {
                shape: MeleeShape::Slam { half_extents },
                origin,
                damage: stats.attack_damage,
                critical: false,
                hits: HitSet::default(),
                lifetime: Timer::from_seconds(lifetime, TimerMode::Once),
            },
            Sprite::from_color(Color::srgba(1.0, 0.6, 0.2, 0.3), half_extents * 2.0),
            Transform::from_translation(origin.extend(layers::EFFECTS)),
            RunEntity,
        ));
        commands.trigger(PlaySound(SoundEffect::Slam));
    }
}

/// Carrots and lightning fire on their own once unlocked.
fn auto_weapons_system(
    mut player: Query<
        (&Transform, &Facing, &PlayerStats, &mut AttackTimers),
        (With<Player>, Without<Enemy>),
    >,
    enemies: LiveEnemies,
    config: Res<GameConfig>,
    sprites: Res<GameSprites>,
    mut commands: Commands,
) {
    let Ok((transform, facing, stats, mut timers)) = player.single_mut() else {
        return;
    };
    if !stats.piercing_carrots && !stats.lightning {
        return;
    }
    let origin = transform.translation.truncate();
    let targets = snapshot(&enemies);
    let combat = &config.combat;

    if stats.piercing_carrots && timers.carrot.is_ready() {
        timers.carrot.start(combat.carrot_cooldown_secs);

        // Aim at the closest enemy anywhere, else wherever we last walked
        let aim = nearest_target(origin, &targets, f32::INFINITY)
            .map(|target| target.position - origin)
            .filter(|offset| offset.length_squared() > 1.0)
            .map_or(facing.0, Vec2::normalize);

        for direction in fan_directions(aim, stats.projectile_count, combat.carrot_spread_degrees.to_radians()) {
            commands.spawn((
                PiercingCarrot {
                    velocity: direction * combat.carrot_speed,
                    damage: combat.carrot_damage,
                    hits: HitSet::default(),
                    lifetime: Timer::from_seconds(combat.carrot_lifetime_secs, TimerMode::Once),
                },
                Sprite {
                    image: sprites.carrot.clone(),
                    custom_size: Some(Vec2::new(CARROT_RADIUS * 3.0, CARROT_RADIUS * 1.5)),
                    ..default()
                },
                FallbackColor(Color::srgb(1.0, 0.55, 0.1)),
                Transform::from_translation(origin.extend(layers::EFFECTS))
                    .with_rotation(Quat::from_rotation_z(direction.to_angle())),
                RunEntity,
            ));
        }
        commands.trigger(PlaySound(SoundEffect::Carrot));
    }

    if stats.lightning && timers.lightning.is_ready() {
        // No target in range: stay ready and try again next frame
        if let Some(target) = nearest_target(origin, &targets, combat.lightning_range) {
            timers.lightning.start(combat.lightning_cooldown_secs);

            let to = target.position;
            let length = origin.distance(to);
            commands.spawn((
                LightningAttack {
                    from: origin,
                    to,
                    thickness: combat.lightning_thickness,
                    damage: combat.lightning_damage,
                    hits: HitSet::default(),
                    resolved: false,
                    lifetime: Timer::from_seconds(0.15, TimerMode::Once),
                },
                Sprite::from_color(
                    Color::srgba(0.75, 0.85, 1.0, 0.85),
                    Vec2::new(length, combat.lightning_thickness * 0.6),
                ),
                Transform::from_translation(((origin + to) * 0.5).extend(layers::EFFECTS))
                    .with_rotation(Quat::from_rotation_z((to - origin).to_angle())),
                RunEntity,
            ));
            commands.trigger(PlaySound(SoundEffect::Lightning));
        }
    }
}

fn melee_hit_system(
    mut attacks: Query<&mut MeleeAttack>,
    mut enemies: LiveEnemies,
    player: Query<&PlayerStats, With<Player>>,
    config: Res<GameConfig>,
    map: Res<TileMap>,
    mut commands: Commands,
) {
    if attacks.is_empty() {
        return;
    }
    let Ok(stats) = player.single() else {
        return;
    };
    let mut targets = snapshot(&enemies);
    let splash = stats.explosive_attack.then_some(config.combat.splash_radius);
    let bounds = map.bounds();

    for mut attack in attacks.iter_mut() {
        for strike in attack.resolve(&targets, splash) {
            let Ok((entity, mut transform, radius, mut health, kind)) = enemies.get_mut(strike.entity)
            else {
                continue;
            };
            let position = transform.translation.truncate();
            let critical = attack.critical && !strike.splash;
            let outcome = apply_strike(&mut commands, entity, &mut health, *kind, position, strike.damage, critical);
            if outcome == DamageOutcome::Killed {
                targets.retain(|target| target.entity != entity);
            }

            if stats.knockback && !strike.splash && outcome == DamageOutcome::Wounded {
                let pushed = knockback_position(attack.origin, position, config.combat.knockback_distance);
                let pushed = clamp_to_bounds(pushed, radius.0, bounds);
                transform.translation.x = pushed.x;
                transform.translation.y = pushed.y;
                commands.entity(entity).try_insert(Staggered(Timer::from_seconds(
                    config.combat.stagger_secs,
                    TimerMode::Once,
                )));
            }
        }
    }
}

fn carrot_system(
    mut carrots: Query<(Entity, &mut Transform, &mut PiercingCarrot), Without<Enemy>>,
    mut enemies: LiveEnemies,
    map: Res<TileMap>,
    time: Res<Time>,
    mut commands: Commands,
) {
    if carrots.is_empty() {
        return;
    }
    let mut targets = snapshot(&enemies);
    let bounds = map.bounds();

    for (carrot_entity, mut transform, mut carrot) in carrots.iter_mut() {
        carrot.lifetime.tick(time.delta());
        let position = transform.translation.truncate() + carrot.velocity * time.delta_secs();
        transform.translation.x = position.x;
        transform.translation.y = position.y;

        if carrot.lifetime.is_finished() || !bounds.contains(position) {
            commands.entity(carrot_entity).try_despawn();
            continue;
        }

        if let Some(strike) = carrot.first_strike(position, &targets) {
            if let Ok((entity, enemy_transform, _, mut health, kind)) = enemies.get_mut(strike.entity) {
                let enemy_pos = enemy_transform.translation.truncate();
                let outcome = apply_strike(&mut commands, entity, &mut health, *kind, enemy_pos, strike.damage, false);
                if outcome == DamageOutcome::Killed {
                    targets.retain(|target| target.entity != entity);
                }
            }
            commands.entity(carrot_entity).try_despawn();
        }
    }
}

fn lightning_system(
    mut bolts: Query<&mut LightningAttack>,
    mut enemies: LiveEnemies,
    mut commands: Commands,
) {
    let mut targets = None;
    for mut bolt in bolts.iter_mut().filter(|bolt| !bolt.resolved) {
        let targets = targets.get_or_insert_with(|| snapshot(&enemies));
        for strike in bolt.resolve(targets) {
            if let Ok((entity, transform, _, mut health, kind)) = enemies.get_mut(strike.entity) {
                let position = transform.translation.truncate();
                let outcome = apply_strike(&mut commands, entity, &mut health, *kind, position, strike.damage, false);
                if outcome == DamageOutcome::Killed {
                    targets.retain(|target| target.entity != entity);
                }
            }
        }
    }
}

fn attack_lifetime_system(
    mut melee: Query<(Entity, &mut MeleeAttack)>,
    mut bolts: Query<(Entity, &mut LightningAttack)>,
    time: Res<Time>,
    mut commands: Commands,
) {
    for (entity, mut attack) in melee.iter_mut() {
        attack.lifetime.tick(time.delta());
        if attack.lifetime.is_finished() {
            commands.entity(entity).try_despawn();
        }
    }
    for (entity, mut bolt) in bolts.iter_mut() {
        bolt.lifetime.tick(time.delta());
        if bolt.lifetime.is_finished() {
            commands.entity(entity).try_despawn();
        }
    }
}

fn stagger_system(
    mut staggered: Query<(Entity, &mut Staggered)>,
    time: Res<Time>,
    mut commands: Commands,
) {
    for (entity, mut stagger) in staggered.iter_mut() {
        stagger.0.tick(time.delta());
        if stagger.0.is_finished() {
            commands.entity(entity).try_remove::<Staggered>();
        }
    }
}
