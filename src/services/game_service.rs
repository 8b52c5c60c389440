//! Game lifecycle: creation, closing, cancellation, and the manual selection
//! trigger.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::models::{GameEntity, GamePhase, SelectionAlgorithm};
use crate::error::ServiceError;
use crate::notify::Notification;
use crate::services::{cascade, selection};
use crate::state::SharedState;

/// Parameters for creating a game.
#[derive(Clone, Debug)]
pub struct NewGame {
    pub starts_at: SystemTime,
    pub location: String,
    pub algorithm: SelectionAlgorithm,
    pub cap: u32,
    pub cap_enabled: bool,
    pub random_high_auto: bool,
    /// When set, the notification cascade waits until this instant.
    pub notify_future_at: Option<SystemTime>,
}

/// Validate and persist a new game, then hand it to [`on_game_created`].
pub async fn create_game(
    state: &SharedState,
    new_game: NewGame,
) -> Result<GameEntity, ServiceError> {
    if new_game.location.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "location must not be empty".into(),
        ));
    }
    if new_game.cap_enabled && new_game.cap == 0 {
        return Err(ServiceError::InvalidInput("cap must be at least 1".into()));
    }

    let game = GameEntity {
        id: Uuid::new_v4(),
        starts_at: new_game.starts_at,
        location: new_game.location.trim().to_owned(),
        algorithm: new_game.algorithm,
        cap: new_game.cap,
        cap_enabled: new_game.cap_enabled,
        phase: GamePhase::Created,
        selection_done: false,
        closed: false,
        notified_at: None,
        notify_future_at: new_game.notify_future_at,
        random_high_auto: new_game.random_high_auto,
        created_at: SystemTime::now(),
    };
    state.store().insert_game(game.clone()).await?;
    info!(game_id = %game.id, algorithm = ?game.algorithm, "game created");
    on_game_created(state, game.id).await?;
    Ok(game)
}

/// Entry point invoked right after a game lands in the store. Games without a
/// deferred notification time start their cascade immediately; the rest stay
/// in `created` until the poll loop picks them up.
pub async fn on_game_created(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let Some(game) = state.store().find_game(game_id).await? else {
        return Ok(());
    };
    match game.notify_future_at {
        None => cascade::trigger_immediate(state, &game).await,
        Some(at) => {
            info!(game_id = %game_id, notify_at = ?at, "notifications deferred");
            Ok(())
        }
    }
}

/// Close a game: no further signups or automatic transitions, pending jobs
/// are swept to completed.
pub async fn close_game(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let store = state.store();
    if !store.mark_closed(game_id, GamePhase::Closed).await? {
        return Err(ServiceError::NotFound(format!("game {game_id}")));
    }
    let swept = store.complete_pending_jobs(game_id).await?;
    info!(game_id = %game_id, swept_jobs = swept, "game closed");
    Ok(())
}

/// Cancel a game and tell everyone on the roster.
pub async fn cancel_game(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let store = state.store();
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
    store.mark_closed(game_id, GamePhase::Cancelled).await?;
    let swept = store.complete_pending_jobs(game_id).await?;

    let players: Vec<Uuid> = store
        .signups_for_game(game_id)
        .await?
        .into_iter()
        .map(|signup| signup.player_id)
        .collect();
    if !players.is_empty() {
        state.outbox().publish(Notification::GameCancelled {
            game_id,
            players,
            starts_at: game.starts_at,
            location: game.location.clone(),
        });
    }
    info!(game_id = %game_id, swept_jobs = swept, "game cancelled");
    Ok(())
}

/// Manual selection trigger. Shares the claim with the scheduled job, so
/// whichever caller claims first runs the draw; the loser is told the
/// selection already happened.
pub async fn run_selection_now(
    state: &SharedState,
    game_id: Uuid,
) -> Result<selection::SelectionSummary, ServiceError> {
    let game = state
        .store()
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
    if game.algorithm != SelectionAlgorithm::Random {
        return Err(ServiceError::InvalidState(
            "selection only applies to random games".into(),
        ));
    }
    match selection::run_selection(state, game_id).await? {
        Some(summary) => Ok(summary),
        None => Err(ServiceError::InvalidState(
            "selection already completed".into(),
        )),
    }
}
