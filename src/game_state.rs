use bevy::prelude::*;

use crate::{
    audio::{PlaySound, SoundEffect},
    health::Health,
    player::Player,
    progression::UpgradeManager,
};

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<AppState>()
            .init_resource::<RunClock>()
            // Gameplay runs in this order every frame, and only while Playing.
            // Paused, LevelUp and GameOver freeze the world by skipping these sets.
            .configure_sets(
                Update,
                (
                    GameplaySet::Input,
                    GameplaySet::Movement,
                    GameplaySet::Combat,
                    GameplaySet::Resolve,
                )
                    .chain()
                    .run_if(in_state(AppState::Playing)),
            )
            .add_systems(OnEnter(AppState::Menu), cleanup_run)
            .add_systems(OnExit(AppState::Menu), reset_run_clock)
            .add_systems(OnEnter(AppState::GameOver), game_over_sound)
            .add_systems(
                Update,
                (
                    start_run_input.run_if(in_state(AppState::Menu)),
                    pause_input.run_if(in_state(AppState::Playing).or(in_state(AppState::Paused))),
                    quit_to_menu_input.run_if(in_state(AppState::Paused)),
                    game_over_input.run_if(in_state(AppState::GameOver)),
                ),
            )
            .add_systems(
                Update,
                (tick_run_clock, check_player_death)
                    .chain()
                    .in_set(GameplaySet::Resolve),
            );
    }
}

#[derive(States, Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    #[default]
    Menu,
    Playing,
    Paused,
    /// An upgrade offer is on screen
    LevelUp,
    GameOver,
}

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameplaySet {
    Input,
    Movement,
    Combat,
    /// Pickups, contact damage, spawning and death checks
    Resolve,
}

/// Everything tagged with this belongs to the current run and is despawned
/// on the way back to the menu.
#[derive(Component, Copy, Clone, Default)]
pub struct RunEntity;

/// Seconds spent in Playing this run. Pauses and upgrade screens don't count.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct RunClock(pub f32);

/// Snapshot taken at the moment of death, shown on the game over screen.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub level: u32,
    pub kills: u32,
    pub upgrades_taken: usize,
    pub survived_secs: f32,
}

fn cleanup_run(mut commands: Commands, entities: Query<Entity, With<RunEntity>>) {
    let count = entities.iter().count();
    for entity in &entities {
        commands.entity(entity).try_despawn();
    }
    if count > 0 {
        debug!("Cleaned up {} run entities", count);
    }
}

fn reset_run_clock(mut clock: ResMut<RunClock>) {
    clock.0 = 0.0;
}

fn tick_run_clock(mut clock: ResMut<RunClock>, time: Res<Time>) {
    clock.0 += time.delta_secs();
}

fn check_player_death(
    player: Query<&Health, With<Player>>,
    manager: Res<UpgradeManager>,
    clock: Res<RunClock>,
    mut commands: Commands,
    mut next_state: ResMut<NextState<AppState>>,
) {
    let Ok(health) = player.single() else {
        return;
    };
    if !health.is_dead() {
        return;
    }

    let summary = RunSummary {
        level: manager.level,
        kills: manager.kills,
        upgrades_taken: manager.history.len(),
        survived_secs: clock.0,
    };
    info!(
        "Player died at level {} after {:.0}s with {} kills",
        summary.level, summary.survived_secs, summary.kills
    );
    commands.insert_resource(summary);
    next_state.set(AppState::GameOver);
}

fn game_over_sound(mut commands: Commands) {
    commands.trigger(PlaySound(SoundEffect::GameOver));
}

fn start_run_input(keys: Res<ButtonInput<KeyCode>>, mut next_state: ResMut<NextState<AppState>>) {
    if keys.just_pressed(KeyCode::Enter) {
        next_state.set(AppState::Playing);
    }
}

fn pause_input(
    keys: Res<ButtonInput<KeyCode>>,
    state: Res<State<AppState>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if !keys.just_pressed(KeyCode::Escape) {
        return;
    }
    match state.get() {
        AppState::Playing => next_state.set(AppState::Paused),
        AppState::Paused => next_state.set(AppState::Playing),
        _ => {}
    }
}

fn quit_to_menu_input(keys: Res<ButtonInput<KeyCode>>, mut next_state: ResMut<NextState<AppState>>) {
    if keys.just_pressed(KeyCode::KeyQ) {
        info!("Run abandoned");
        next_state.set(AppState::Menu);
    }
}

fn game_over_input(keys: Res<ButtonInput<KeyCode>>, mut next_state: ResMut<NextState<AppState>>) {
    if keys.just_pressed(KeyCode::Enter) {
        next_state.set(AppState::Menu);
    }
}

#[cfg(test)]
mod tests {
    use bevy::state::app::StatesPlugin;

    use super::*;
    use crate::config::ProgressionConfig;

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, StatesPlugin))
            .init_resource::<ButtonInput<KeyCode>>()
            .insert_resource(UpgradeManager::new(&ProgressionConfig::default()))
            .add_plugins(GameStatePlugin);
        app
    }

    fn state(app: &App) -> AppState {
        *app.world().resource::<State<AppState>>().get()
    }

    /// Press a key for one frame, then give the state change a frame to land.
    fn tap(app: &mut App, key: KeyCode) {
        app.world_mut().resource_mut::<ButtonInput<KeyCode>>().press(key);
        app.update();
        app.world_mut().resource_mut::<ButtonInput<KeyCode>>().reset_all();
        app.update();
    }

    fn settle_in(app: &mut App, target: AppState) {
        app.world_mut().resource_mut::<NextState<AppState>>().set(target);
        app.update();
        app.update();
        assert_eq!(state(app), target);
    }

    #[test]
    fn enter_starts_a_run_and_escape_pauses_it() {
        let mut app = app();
        app.update();
        assert_eq!(state(&app), AppState::Menu);

        tap(&mut app, KeyCode::Enter);
        assert_eq!(state(&app), AppState::Playing);

        tap(&mut app, KeyCode::Escape);
        assert_eq!(state(&app), AppState::Paused);

        tap(&mut app, KeyCode::Escape);
        assert_eq!(state(&app), AppState::Playing);
    }

    #[test]
    fn dead_player_ends_the_run_with_a_summary() {
        let mut app = app();
        settle_in(&mut app, AppState::Playing);

        let mut health = Health::new(10);
        health.take_damage(10);
        app.world_mut().spawn((Player, health, RunEntity));

        app.update();
        app.update();

        assert_eq!(state(&app), AppState::GameOver);
        let summary = app.world().resource::<RunSummary>();
        assert_eq!(summary.level, 1);
        assert_eq!(summary.kills, 0);
    }

    #[test]
    fn returning_to_the_menu_clears_the_run() {
        let mut app = app();
        settle_in(&mut app, AppState::GameOver);
        let leftover = app.world_mut().spawn(RunEntity).id();

        tap(&mut app, KeyCode::Enter);

        assert_eq!(state(&app), AppState::Menu);
        assert!(app.world().get_entity(leftover).is_err());
    }
}
