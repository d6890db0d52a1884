use bevy::prelude::*;

use crate::{
    audio::SoundSettings,
    game_state::{AppState, RunEntity, RunSummary},
    health::Health,
    player::Player,
    progression::{upgrades::UpgradePool, UpgradeManager},
};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Menu), spawn_menu_screen)
            .add_systems(OnExit(AppState::Menu), (despawn_screen::<MenuScreen>, spawn_hud))
            .add_systems(OnEnter(AppState::Paused), spawn_pause_screen)
            .add_systems(OnExit(AppState::Paused), despawn_screen::<PauseScreen>)
            .add_systems(OnExit(AppState::LevelUp), despawn_screen::<UpgradeScreen>)
            .add_systems(OnEnter(AppState::GameOver), spawn_game_over_screen)
            .add_systems(OnExit(AppState::GameOver), despawn_screen::<GameOverScreen>)
            .add_systems(
                Update,
                (
                    update_hud,
                    update_volume_text.run_if(resource_exists::<SoundSettings>),
                    refresh_upgrade_cards.run_if(in_state(AppState::LevelUp)),
                ),
            );
    }
}

const PANEL: Color = Color::srgba(0.05, 0.05, 0.08, 0.85);
const DIM_TEXT: Color = Color::srgb(0.7, 0.7, 0.75);

#[derive(Component)]
struct MenuScreen;

#[derive(Component)]
struct PauseScreen;

#[derive(Component)]
struct GameOverScreen;

#[derive(Component)]
struct UpgradeScreen;

#[derive(Component)]
struct HealthBarFill;

#[derive(Component)]
struct HealthText;

#[derive(Component)]
struct ExperienceBarFill;

#[derive(Component)]
struct LevelText;

#[derive(Component)]
struct VolumeText;

/// A clickable upgrade card. The number is its index in the current offer.
#[derive(Component, Copy, Clone, Debug)]
pub struct UpgradeCard(pub usize);

fn despawn_screen<T: Component>(mut commands: Commands, screens: Query<Entity, With<T>>) {
    for entity in &screens {
        commands.entity(entity).try_despawn();
    }
}

fn full_screen(background: Color) -> (Node, BackgroundColor) {
    (
        Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            position_type: PositionType::Absolute,
            flex_direction: FlexDirection::Column,
            justify_content: JustifyContent::Center,
            align_items: AlignItems::Center,
            row_gap: Val::Px(16.0),
            ..default()
        },
        BackgroundColor(background),
    )
}

fn label(text: impl Into<String>, size: f32, color: Color) -> impl Bundle {
    (
        Text::new(text),
        TextFont {
            font_size: size,
            ..default()
        },
        TextColor(color),
    )
}

fn volume_label(settings: Option<&SoundSettings>) -> String {
    let percent = settings.map_or(0, |s| s.effects_volume_percent);
    format!("Effects volume: {}%  (- / =)", percent)
}

// ── Menu and pause ──────────────────────────────────────────────────────────

fn spawn_menu_screen(mut commands: Commands, settings: Option<Res<SoundSettings>>) {
    commands
        .spawn((MenuScreen, full_screen(Color::srgb(0.06, 0.08, 0.06))))
        .with_children(|parent| {
            parent.spawn(label("CARROT SURVIVORS", 72.0, Color::srgb(1.0, 0.6, 0.2)));
            parent.spawn(label("Press Enter to start", 32.0, Color::WHITE));
            parent.spawn(label(
                "WASD move   Space / LMB swing   E / RMB slam   Esc pause",
                20.0,
                DIM_TEXT,
            ));
            parent.spawn((VolumeText, label(volume_label(settings.as_deref()), 20.0, DIM_TEXT)));
        });
}

fn spawn_pause_screen(mut commands: Commands, settings: Option<Res<SoundSettings>>) {
    commands
        .spawn((PauseScreen, full_screen(Color::srgba(0.0, 0.0, 0.0, 0.6))))
        .with_children(|parent| {
            parent.spawn(label("PAUSED", 72.0, Color::WHITE));
            parent.spawn(label("Esc resume   Q quit to menu", 24.0, DIM_TEXT));
            parent.spawn((VolumeText, label(volume_label(settings.as_deref()), 20.0, DIM_TEXT)));
        });
}

fn update_volume_text(settings: Res<SoundSettings>, mut texts: Query<&mut Text, With<VolumeText>>) {
    if !settings.is_changed() {
        return;
    }
    for mut text in texts.iter_mut() {
        text.0 = volume_label(Some(&settings));
    }
}

// ── HUD ─────────────────────────────────────────────────────────────────────

/// Empty bar track. The fill is spawned as a child and sized in percent.
fn bar_track(width: f32) -> (Node, BackgroundColor) {
    (
        Node {
            width: Val::Px(width),
            height: Val::Px(14.0),
            ..default()
        },
        BackgroundColor(Color::srgb(0.15, 0.15, 0.15)),
    )
}

fn spawn_hud(mut commands: Commands) {
    commands
        .spawn((
            RunEntity,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                top: Val::Px(12.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(6.0),
                padding: UiRect::all(Val::Px(8.0)),
                ..default()
            },
            BackgroundColor(PANEL),
        ))
        .with_children(|hud| {
            hud.spawn((HealthText, label("HP", 18.0, Color::WHITE)));
            hud.spawn(bar_track(220.0)).with_children(|track| {
                track.spawn((
                    HealthBarFill,
                    Node {
                        width: Val::Percent(100.0),
                        height: Val::Percent(100.0),
                        ..default()
                    },
                    BackgroundColor(Color::srgb(0.85, 0.2, 0.2)),
                ));
            });
            hud.spawn((LevelText, label("Level: 1", 18.0, Color::WHITE)));
            hud.spawn(bar_track(220.0)).with_children(|track| {
                track.spawn((
                    ExperienceBarFill,
                    Node {
                        width: Val::Percent(0.0),
                        height: Val::Percent(100.0),
                        ..default()
                    },
                    BackgroundColor(Color::srgb(0.3, 0.8, 1.0)),
                ));
            });
        });
}

fn update_hud(
    player: Query<&Health, With<Player>>,
    manager: Option<Res<UpgradeManager>>,
    mut health_fill: Query<&mut Node, (With<HealthBarFill>, Without<ExperienceBarFill>)>,
    mut xp_fill: Query<&mut Node, (With<ExperienceBarFill>, Without<HealthBarFill>)>,
    mut health_text: Query<&mut Text, (With<HealthText>, Without<LevelText>)>,
    mut level_text: Query<&mut Text, (With<LevelText>, Without<HealthText>)>,
) {
    if let Ok(health) = player.single() {
        if let Ok(mut node) = health_fill.single_mut() {
            node.width = Val::Percent(health.fraction() * 100.0);
        }
        if let Ok(mut text) = health_text.single_mut() {
            text.0 = format!("HP {}/{}", health.current.max(0), health.max);
        }
    }

    let Some(manager) = manager else {
        return;
    };
    if let Ok(mut node) = xp_fill.single_mut() {
        node.width = Val::Percent(manager.progress() * 100.0);
    }
    if let Ok(mut text) = level_text.single_mut() {
        text.0 = format!(
            "Level: {} | XP: {}/{} | Kills: {}",
            manager.level, manager.experience, manager.threshold, manager.kills
        );
    }
}

// ── Upgrade cards ───────────────────────────────────────────────────────────

/// Rebuilds the cards whenever the offer changes. That covers both entering
/// LevelUp and a second offer opening straight after a pick.
fn refresh_upgrade_cards(
    mut commands: Commands,
    manager: Res<UpgradeManager>,
    pool: Res<UpgradePool>,
    screens: Query<Entity, With<UpgradeScreen>>,
) {
    if !manager.is_changed() && !screens.is_empty() {
        return;
    }
    for entity in &screens {
        commands.entity(entity).try_despawn();
    }
    if !manager.is_offering() {
        return;
    }

    commands
        .spawn((UpgradeScreen, full_screen(Color::srgba(0.0, 0.0, 0.0, 0.7))))
        .with_children(|screen| {
            screen.spawn(label(format!("LEVEL {}", manager.level), 56.0, Color::WHITE));
            screen.spawn(label("Choose an upgrade", 24.0, DIM_TEXT));
            screen
                .spawn(Node {
                    flex_direction: FlexDirection::Row,
                    column_gap: Val::Px(20.0),
                    ..default()
                })
                .with_children(|row| {
                    for (index, id) in manager.options().iter().enumerate() {
                        let Some(upgrade) = pool.get(*id) else {
                            continue;
                        };
                        let color = upgrade.rarity.color();
                        row.spawn((
                            UpgradeCard(index),
                            Button,
                            Node {
                                width: Val::Px(220.0),
                                height: Val::Px(260.0),
                                flex_direction: FlexDirection::Column,
                                justify_content: JustifyContent::Center,
                                align_items: AlignItems::Center,
                                row_gap: Val::Px(12.0),
                                padding: UiRect::all(Val::Px(12.0)),
                                border: UiRect::all(Val::Px(3.0)),
                                ..default()
                            },
                            BackgroundColor(PANEL),
                            BorderColor::all(color),
                        ))
                        .with_children(|card| {
                            card.spawn(label(format!("[{}]", index + 1), 20.0, DIM_TEXT));
                            card.spawn(label(upgrade.name, 28.0, color));
                            card.spawn(label(upgrade.rarity.label(), 18.0, color));
                            card.spawn(label(upgrade.description, 18.0, Color::WHITE));
                        });
                    }
                });
        });
}

// ── Game over ───────────────────────────────────────────────────────────────

fn spawn_game_over_screen(mut commands: Commands, summary: Option<Res<RunSummary>>) {
    let details = summary.map_or_else(String::new, |summary| {
        let secs = summary.survived_secs as u32;
        format!(
            "Reached level {}   Kills {}   Upgrades {}   Survived {}:{:02}",
            summary.level,
            summary.kills,
            summary.upgrades_taken,
            secs / 60,
            secs % 60
        )
    });

    commands
        .spawn((GameOverScreen, full_screen(Color::srgba(0.1, 0.0, 0.0, 0.8))))
        .with_children(|parent| {
            parent.spawn(label("GAME OVER", 96.0, Color::srgb(0.9, 0.2, 0.2)));
            parent.spawn(label(details, 24.0, Color::WHITE));
            parent.spawn(label("Press Enter to return to the menu", 24.0, DIM_TEXT));
        });
}
