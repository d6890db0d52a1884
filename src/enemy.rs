use bevy::prelude::*;
use rand::Rng;

use crate::{
    assets::{FallbackColor, GameSprites},
    audio::{PlaySound, SoundEffect},
    combat::{hit_test::circle_overlaps, Cooldown, Staggered},
    game_state::{GameplaySet, RunEntity},
    health::{DamagedEvent, Dying, Health},
    movement::{BodyRadius, Speed},
    pickups::spawn_orbs,
    player::{Player, PlayerStats},
    progression::UpgradeManager,
    render::{SpawnPop, YSort},
    shaders_lite::Flash,
};

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, contact_damage_system.in_set(GameplaySet::Resolve))
            .add_observer(on_enemy_killed);
    }
}

/// Every kind of enemy in the game. Stats live in the match arms below,
/// so the enum doubles as the enemy data table.
#[derive(Component, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EnemyKind {
    Slime,
    Bat,
    Goblin,
    Golem,
    Wraith,
    /// Boss, spawned once per run
    OgreKing,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 6] = [
        Self::Slime,
        Self::Bat,
        Self::Goblin,
        Self::Golem,
        Self::Wraith,
        Self::OgreKing,
    ];

    pub fn max_health(&self) -> i32 {
        match self {
            Self::Slime => 30,
            Self::Bat => 15,
            Self::Goblin => 50,
            Self::Golem => 150,
            Self::Wraith => 80,
            Self::OgreKing => 1200,
        }
    }

    /// Pixels per second
    pub fn speed(&self) -> f32 {
        match self {
            Self::Slime => 60.0,
            Self::Bat => 120.0,
            Self::Goblin => 85.0,
            Self::Golem => 40.0,
            Self::Wraith => 100.0,
            Self::OgreKing => 55.0,
        }
    }

    pub fn contact_damage(&self) -> i32 {
        match self {
            Self::Slime => 5,
            Self::Bat => 3,
            Self::Goblin => 8,
            Self::Golem => 15,
            Self::Wraith => 12,
            Self::OgreKing => 30,
        }
    }

    /// Seconds between bites while touching the player
    pub fn attack_cooldown(&self) -> f32 {
        match self {
            Self::Slime => 1.0,
            Self::Bat => 0.6,
            Self::Goblin => 1.0,
            Self::Golem => 1.5,
            Self::Wraith => 0.8,
            Self::OgreKing => 1.2,
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Self::Slime => 14.0,
            Self::Bat => 10.0,
            Self::Goblin => 14.0,
            Self::Golem => 22.0,
            Self::Wraith => 16.0,
            Self::OgreKing => 40.0,
        }
    }

    /// Experience orbs dropped on death
    pub fn drop_count(&self) -> u32 {
        match self {
            Self::Slime => 1,
            Self::Bat => 1,
            Self::Goblin => 2,
            Self::Golem => 4,
            Self::Wraith => 3,
            Self::OgreKing => 15,
        }
    }

    pub fn is_boss(&self) -> bool {
        matches!(self, Self::OgreKing)
    }

    /// Placeholder colour used when the sprite can't be loaded
    pub fn fallback_color(&self) -> Color {
        match self {
            Self::Slime => Color::srgb(0.3, 0.9, 0.3),
            Self::Bat => Color::srgb(0.5, 0.3, 0.7),
            Self::Goblin => Color::srgb(0.4, 0.6, 0.2),
            Self::Golem => Color::srgb(0.55, 0.5, 0.45),
            Self::Wraith => Color::srgb(0.7, 0.8, 0.95),
            Self::OgreKing => Color::srgb(1.0, 0.0, 1.0),
        }
    }

    pub fn sprite_path(&self) -> &'static str {
        match self {
            Self::Slime => "sprites/slime.png",
            Self::Bat => "sprites/bat.png",
            Self::Goblin => "sprites/goblin.png",
            Self::Golem => "sprites/golem.png",
            Self::Wraith => "sprites/wraith.png",
            Self::OgreKing => "sprites/ogre_king.png",
        }
    }
}

/// Marker for anything hostile. The kind lives next to it as its own
/// component so queries can ask for either.
#[derive(Component, Copy, Clone, Debug)]
pub struct Enemy;

/// Per-enemy bite timer. Separate from the kind's stats because each enemy
/// ticks its own.
#[derive(Component, Debug, Clone)]
pub struct ContactCooldown(pub Cooldown);

/// Fired on the killing blow. The observer below does the cleanup: despawn,
/// drop orbs, heal a vampiric player.
#[derive(Event)]
pub struct EnemyKilled {
    pub entity: Entity,
    pub kind: EnemyKind,
    pub position: Vec2,
}

pub fn spawn_enemy(
    commands: &mut Commands,
    sprites: &GameSprites,
    kind: EnemyKind,
    position: Vec2,
) -> Entity {
    let diameter = kind.radius() * 2.0;
    commands
        .spawn((
            Enemy,
            kind,
            Health::new(kind.max_health()),
            Speed(kind.speed()),
            BodyRadius(kind.radius()),
            ContactCooldown(Cooldown::default()),
            Sprite {
                image: sprites.enemy(kind),
                custom_size: Some(Vec2::splat(diameter)),
                ..default()
            },
            FallbackColor(kind.fallback_color()),
            Transform::from_translation(position.extend(0.0)),
            YSort,
            SpawnPop::new(0.35),
            RunEntity,
        ))
        .id()
}

/// Enemies touching the player bite on their own cooldown.
/// Dodge is rolled per bite; a dodged bite still starts the cooldown.
fn contact_damage_system(
    mut enemies: Query<
        (&Transform, &BodyRadius, &EnemyKind, &mut ContactCooldown),
        (With<Enemy>, Without<Dying>, Without<Staggered>),
    >,
    mut player: Query<
        (Entity, &Transform, &BodyRadius, &PlayerStats, &mut Health),
        (With<Player>, Without<Enemy>),
    >,
    time: Res<Time>,
    mut commands: Commands,
) {
    let Ok((player_entity, player_transform, player_radius, stats, mut health)) =
        player.single_mut()
    else {
        return;
    };
    let player_pos = player_transform.translation.truncate();
    let mut rng = rand::thread_rng();

    for (transform, radius, kind, mut cooldown) in enemies.iter_mut() {
        cooldown.0.tick(time.delta_secs());
        if !cooldown.0.is_ready() || health.is_dead() {
            continue;
        }

        let touching = circle_overlaps(
            transform.translation.truncate(),
            radius.0,
            player_pos,
            player_radius.0,
        );
        if !touching {
            continue;
        }

        cooldown.0.start(kind.attack_cooldown());

        if rng.gen_bool(stats.dodge_chance.clamp(0.0, 1.0) as f64) {
            commands
                .entity(player_entity)
                .try_insert(Flash(Timer::from_seconds(0.12, TimerMode::Once)));
            commands.trigger(PlaySound(SoundEffect::Dodge));
            continue;
        }

        let damage = kind.contact_damage();
        health.take_damage(damage);
        commands.trigger(DamagedEvent {
            entity: player_entity,
            amount: damage,
            critical: false,
        });
    }
}

fn on_enemy_killed(
    trigger: On<EnemyKilled>,
    mut commands: Commands,
    sprites: Res<GameSprites>,
    mut manager: ResMut<UpgradeManager>,
    mut player: Query<(&PlayerStats, &mut Health), With<Player>>,
) {
    commands.entity(trigger.entity).try_despawn();
    commands.trigger(PlaySound(SoundEffect::EnemyDeath));

    let mut rng = rand::thread_rng();
    spawn_orbs(
        &mut commands,
        &sprites,
        trigger.position,
        trigger.kind.drop_count(),
        &mut rng,
    );

    manager.record_kill();

    if let Ok((stats, mut health)) = player.single_mut() {
        health.heal(stats.vampirism);
    }

    if trigger.kind.is_boss() {
        info!("The {:?} has fallen", trigger.kind);
    }
}
