//! Notification cascade: the high tier hears first, then standard, then low,
//! with the selection draw scheduled alongside for random games.

use std::collections::HashSet;
use std::time::SystemTime;

use tracing::info;

use crate::dao::game_store::GameStore;
use crate::dao::models::{
    GameEntity, JobKind, PriorityTier, SelectionAlgorithm, SignupEntity, SignupStatus,
};
use crate::error::ServiceError;
use crate::notify::Notification;
use crate::state::SharedState;

/// Schedule the timed remainder of the cascade relative to `start`.
///
/// Jobs are keyed by game and kind, so calling this again (or racing another
/// caller) leaves a single job per kind in place.
pub async fn start_cascade(
    state: &SharedState,
    game: &GameEntity,
    start: SystemTime,
) -> Result<(), ServiceError> {
    let config = state.config();
    let store = state.store();

    let standard_at = start + config.high_priority_delay;
    let low_at = standard_at + config.alternative_delay;
    store
        .schedule_job(game.id, JobKind::NotifyStandard, standard_at)
        .await?;
    store
        .schedule_job(game.id, JobKind::NotifyLow, low_at)
        .await?;
    if game.algorithm == SelectionAlgorithm::Random {
        let selection_at = standard_at + config.random_wait_period;
        store
            .schedule_job(game.id, JobKind::RunSelection, selection_at)
            .await?;
    }

    info!(game_id = %game.id, "notification cascade scheduled");
    Ok(())
}

/// Open the cascade right now: stamp the game, notify the high tier, and
/// schedule the rest.
pub async fn trigger_immediate(state: &SharedState, game: &GameEntity) -> Result<(), ServiceError> {
    if game.closed {
        return Ok(());
    }
    let now = SystemTime::now();
    state.store().begin_notifying(game.id, now).await?;
    notify_tier(state, game, PriorityTier::High).await?;
    start_cascade(state, game, now).await
}

/// Notify every approved player of `tier` who has not already been told that
/// this game's signup is open. Returns the number of players notified.
pub async fn notify_tier(
    state: &SharedState,
    game: &GameEntity,
    tier: PriorityTier,
) -> Result<usize, ServiceError> {
    let store = state.store();
    let already: HashSet<_> = store.players_notified(game.id).await?.into_iter().collect();
    let players: Vec<_> = store
        .players_by_tier(tier)
        .await?
        .into_iter()
        .filter(|player| !already.contains(&player.id))
        .collect();
    if players.is_empty() {
        info!(game_id = %game.id, tier = ?tier, "no players left to notify");
        return Ok(0);
    }

    // Guaranteed spots: the high tier is admitted up front when the game
    // raffles everyone else.
    if tier == PriorityTier::High
        && game.algorithm == SelectionAlgorithm::Random
        && game.random_high_auto
    {
        let now = SystemTime::now();
        for player in &players {
            store
                .insert_signup(SignupEntity {
                    game_id: game.id,
                    player_id: player.id,
                    status: SignupStatus::Pending,
                    owner_added: true,
                    signed_up_at: now,
                })
                .await?;
        }
        info!(
            game_id = %game.id,
            count = players.len(),
            "auto-signed up high-priority players"
        );
    }

    let player_ids: Vec<_> = players.iter().map(|player| player.id).collect();
    store
        .record_signup_notice(game.id, player_ids.clone())
        .await?;
    state.outbox().publish(Notification::SignupOpen {
        game_id: game.id,
        players: player_ids,
        starts_at: game.starts_at,
        location: game.location.clone(),
    });
    info!(
        game_id = %game.id,
        tier = ?tier,
        recipients = players.len(),
        "signup notifications queued"
    );
    Ok(players.len())
}

/// Whether the game still has confirmed spots open.
pub async fn capacity_remaining(
    state: &SharedState,
    game: &GameEntity,
) -> Result<bool, ServiceError> {
    if !game.cap_enabled {
        return Ok(true);
    }
    let confirmed = state.store().count_in(game.id).await?;
    Ok(confirmed < game.cap as usize)
}
