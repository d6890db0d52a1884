use bevy::prelude::*;

use crate::{
    assets::{FallbackColor, GameSprites, MISSING_CHARACTER},
    combat::AttackTimers,
    config::{GameConfig, PlayerConfig},
    game_state::{AppState, GameplaySet, RunEntity},
    health::Health,
    map::TileMap,
    movement::BodyRadius,
    progression::upgrades::UpgradeEffect,
    render::YSort,
};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnExit(AppState::Menu), spawn_player)
            .add_systems(Update, player_movement_system.in_set(GameplaySet::Movement));
    }
}

pub const MIN_ATTACK_COOLDOWN_MS: u32 = 100;
pub const MAX_PROJECTILES: u32 = 4;

#[derive(Component, Copy, Clone, Debug)]
pub struct Player;

/// The last direction the player moved in. Attacks fall back to it when
/// the cursor isn't over the window.
#[derive(Component, Copy, Clone, Debug, PartialEq)]
pub struct Facing(pub Vec2);

/// Everything an upgrade can change. Health is the shared `Health`
/// component; `apply` takes it alongside.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct PlayerStats {
    /// Pixels per second
    pub speed: f32,
    pub attack_damage: i32,
    pub attack_cooldown_ms: u32,
    /// Multiplier on every melee volume
    pub attack_size: f32,
    /// Health restored per kill
    pub vampirism: i32,
    pub critical_chance: f32,
    pub dodge_chance: f32,
    pub explosive_attack: bool,
    pub knockback: bool,
    pub piercing_carrots: bool,
    pub lightning: bool,
    pub projectile_count: u32,
}

impl PlayerStats {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            speed: config.speed,
            attack_damage: config.attack_damage,
            attack_cooldown_ms: config.attack_cooldown_ms.max(MIN_ATTACK_COOLDOWN_MS),
            attack_size: 1.0,
            vampirism: 0,
            critical_chance: 0.0,
            dodge_chance: 0.0,
            explosive_attack: false,
            knockback: false,
            piercing_carrots: false,
            lightning: false,
            projectile_count: 1,
        }
    }

    pub fn attack_cooldown_secs(&self) -> f32 {
        self.attack_cooldown_ms as f32 / 1000.0
    }

    /// The one place upgrades touch the player.
    pub fn apply(&mut self, effect: &UpgradeEffect, health: &mut Health) {
        match *effect {
            UpgradeEffect::MaxHealth(amount) => {
                health.max += amount;
                health.heal(amount);
            }
            UpgradeEffect::Speed(amount) => self.speed += amount,
            UpgradeEffect::AttackDamage(amount) => self.attack_damage += amount,
            UpgradeEffect::AttackCooldown(ms) => {
                self.attack_cooldown_ms = self
                    .attack_cooldown_ms
                    .saturating_sub(ms)
                    .max(MIN_ATTACK_COOLDOWN_MS);
            }
            UpgradeEffect::AttackSize(amount) => self.attack_size += amount,
            UpgradeEffect::Vampirism(amount) => self.vampirism = amount,
            UpgradeEffect::CriticalChance(chance) => {
                self.critical_chance = (self.critical_chance + chance).clamp(0.0, 1.0);
            }
            UpgradeEffect::DodgeChance(chance) => {
                self.dodge_chance = (self.dodge_chance + chance).clamp(0.0, 1.0);
            }
            UpgradeEffect::ExplosiveAttack => self.explosive_attack = true,
            UpgradeEffect::Knockback => self.knockback = true,
            UpgradeEffect::PiercingCarrots => self.piercing_carrots = true,
            UpgradeEffect::Lightning => self.lightning = true,
            UpgradeEffect::ExtraProjectile => {
                self.projectile_count = (self.projectile_count + 1).min(MAX_PROJECTILES);
            }
        }
    }
}

fn spawn_player(
    mut commands: Commands,
    config: Res<GameConfig>,
    sprites: Res<GameSprites>,
    map: Res<TileMap>,
) {
    let radius = config.player.radius;
    commands.spawn((
        Player,
        PlayerStats::from_config(&config.player),
        Health::new(config.player.max_health),
        AttackTimers::default(),
        Facing(Vec2::X),
        BodyRadius(radius),
        Sprite {
            image: sprites.player.clone(),
            custom_size: Some(Vec2::splat(radius * 2.5)),
            ..default()
        },
        FallbackColor(MISSING_CHARACTER),
        Transform::from_translation(map.center().extend(0.0)),
        YSort,
        RunEntity,
    ));
    info!("Run started on a {}x{} map", map.width, map.height);
}

/// WASD or arrow keys
pub fn movement_input(keys: &ButtonInput<KeyCode>) -> Vec2 {
    let mut direction = Vec2::ZERO;
    if keys.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]) {
        direction.y += 1.0;
    }
    if keys.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]) {
        direction.y -= 1.0;
    }
    if keys.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]) {
        direction.x -= 1.0;
    }
    if keys.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]) {
        direction.x += 1.0;
    }
    direction.normalize_or_zero()
}

/// Keeps a body of `radius` entirely inside `bounds`.
pub fn clamp_to_bounds(position: Vec2, radius: f32, bounds: Rect) -> Vec2 {
    let inner = bounds.inflate(-radius);
    if inner.is_empty() {
        return bounds.center();
    }
    position.clamp(inner.min, inner.max)
}

fn player_movement_system(
    mut player: Query<(&mut Transform, &mut Facing, &mut Sprite, &PlayerStats, &BodyRadius), With<Player>>,
    keys: Res<ButtonInput<KeyCode>>,
    map: Res<TileMap>,
    time: Res<Time>,
) {
    let Ok((mut transform, mut facing, mut sprite, stats, radius)) = player.single_mut() else {
        return;
    };

    let direction = movement_input(&keys);
    if direction == Vec2::ZERO {
        return;
    }

    facing.0 = direction;
    if direction.x != 0.0 {
        sprite.flip_x = direction.x < 0.0;
    }

    let next = transform.translation.truncate() + direction * stats.speed * time.delta_secs();
    let next = clamp_to_bounds(next, radius.0, map.bounds());
    transform.translation.x = next.x;
    transform.translation.y = next.y;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> PlayerStats {
        PlayerStats::from_config(&PlayerConfig::default())
    }

    #[test]
    fn base_stats_come_from_config() {
        let stats = stats();
        assert_eq!(stats.attack_damage, 20);
        assert_eq!(stats.attack_cooldown_ms, 500);
        assert_eq!(stats.projectile_count, 1);
        assert!(!stats.explosive_attack);
    }

    #[test]
    fn max_health_upgrade_also_heals() {
        let mut stats = stats();
        let mut health = Health::new(100);
        health.take_damage(40);
        stats.apply(&UpgradeEffect::MaxHealth(25), &mut health);
        assert_eq!(health.max, 125);
        assert_eq!(health.current, 85);
    }

    #[test]
    fn cooldown_is_floored() {
        let mut stats = stats();
        let mut health = Health::new(100);
        stats.apply(&UpgradeEffect::AttackCooldown(300), &mut health);
        assert_eq!(stats.attack_cooldown_ms, 200);
        stats.apply(&UpgradeEffect::AttackCooldown(300), &mut health);
        assert_eq!(stats.attack_cooldown_ms, MIN_ATTACK_COOLDOWN_MS);
    }

    #[test]
    fn chances_are_clamped() {
        let mut stats = stats();
        let mut health = Health::new(100);
        for _ in 0..8 {
            stats.apply(&UpgradeEffect::CriticalChance(0.2), &mut health);
        }
        assert_eq!(stats.critical_chance, 1.0);
    }

    #[test]
    fn flags_are_idempotent_and_projectiles_capped() {
        let mut stats = stats();
        let mut health = Health::new(100);
        stats.apply(&UpgradeEffect::Knockback, &mut health);
        stats.apply(&UpgradeEffect::Knockback, &mut health);
        assert!(stats.knockback);

        for _ in 0..6 {
            stats.apply(&UpgradeEffect::ExtraProjectile, &mut health);
        }
        assert_eq!(stats.projectile_count, MAX_PROJECTILES);
    }

    #[test]
    fn vampirism_sets_rather_than_stacks() {
        let mut stats = stats();
        let mut health = Health::new(100);
        stats.apply(&UpgradeEffect::Vampirism(5), &mut health);
        stats.apply(&UpgradeEffect::Vampirism(5), &mut health);
        assert_eq!(stats.vampirism, 5);
    }

    #[test]
    fn clamp_keeps_the_whole_body_inside() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(clamp_to_bounds(Vec2::new(-20.0, 70.0), 10.0, bounds), Vec2::new(10.0, 40.0));
        assert_eq!(clamp_to_bounds(Vec2::new(50.0, 25.0), 10.0, bounds), Vec2::new(50.0, 25.0));
    }

    #[test]
    fn diagonal_input_is_normalized() {
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(KeyCode::KeyW);
        keys.press(KeyCode::ArrowRight);
        let direction = movement_input(&keys);
        assert!((direction.length() - 1.0).abs() < 1e-5);
        assert!(direction.x > 0.0 && direction.y > 0.0);
    }
}
