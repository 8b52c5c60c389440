//! Manual signup and drop handling: capacity enforcement, FIFO waitlist
//! promotion, and organizer roster edits.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::models::{SelectionAlgorithm, SignupEntity, SignupStatus};
use crate::error::ServiceError;
use crate::notify::Notification;
use crate::state::SharedState;

/// Handle a player signing up for a game.
///
/// First-come games past selection admit on the spot against the live
/// confirmed count; everything else parks the signup as pending until the
/// draw decides.
pub async fn sign_up(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<SignupEntity, ServiceError> {
    let store = state.store();
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
    if game.closed {
        return Err(ServiceError::InvalidState("game is closed".into()));
    }

    let status = if game.algorithm == SelectionAlgorithm::FirstCome && game.selection_done {
        let confirmed = store.count_in(game_id).await?;
        if !game.cap_enabled || confirmed < game.cap as usize {
            SignupStatus::In
        } else {
            SignupStatus::Waitlist
        }
    } else {
        SignupStatus::Pending
    };

    let signup = SignupEntity {
        game_id,
        player_id,
        status,
        owner_added: false,
        signed_up_at: SystemTime::now(),
    };
    if !store.insert_signup(signup.clone()).await? {
        return Err(ServiceError::InvalidState("already signed up".into()));
    }
    info!(game_id = %game_id, player_id = %player_id, status = ?status, "player signed up");
    Ok(signup)
}

/// Handle a player dropping out.
///
/// A confirmed drop after a first-come selection promotes the earliest
/// waitlisted signup. Organizers hear about the drop only once the signup
/// had stood long enough to matter.
pub async fn drop_out(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.store();
    let removed = store
        .remove_signup(game_id, player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("not signed up".into()))?;
    if removed.status != SignupStatus::In {
        info!(game_id = %game_id, player_id = %player_id, "unconfirmed signup withdrawn");
        return Ok(());
    }

    let Some(game) = store.find_game(game_id).await? else {
        return Ok(());
    };
    if game.algorithm == SelectionAlgorithm::FirstCome && game.selection_done {
        if let Some(promoted) = store.promote_waitlist_head(game_id).await? {
            info!(
                game_id = %game_id,
                player_id = %promoted.player_id,
                "promoted waitlist head"
            );
            state.outbox().publish(Notification::WaitlistPromotion {
                game_id,
                player_id: promoted.player_id,
            });
        }
    }

    let now = SystemTime::now();
    let stood_for = now.duration_since(removed.signed_up_at).unwrap_or_default();
    if stood_for >= state.config().late_drop_notice_after {
        let organizers: Vec<Uuid> = store
            .organizers()
            .await?
            .into_iter()
            .map(|organizer| organizer.id)
            .collect();
        if !organizers.is_empty() {
            state.outbox().publish(Notification::PlayerDropped {
                game_id,
                organizers,
                player_id,
                dropped_at: now,
            });
        }
    }
    Ok(())
}

/// Organizer adds a player straight into the confirmed roster. Adding a
/// player twice is a no-op.
pub async fn add_player(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.store();
    store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
    let inserted = store
        .insert_signup(SignupEntity {
            game_id,
            player_id,
            status: SignupStatus::In,
            owner_added: true,
            signed_up_at: SystemTime::now(),
        })
        .await?;
    if inserted {
        info!(game_id = %game_id, player_id = %player_id, "organizer added player");
    }
    Ok(())
}

/// Organizer removes a player outright. No waitlist promotion happens on
/// this path.
pub async fn remove_player(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.store();
    store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;
    if store.remove_signup(game_id, player_id).await?.is_some() {
        info!(game_id = %game_id, player_id = %player_id, "organizer removed player");
    }
    Ok(())
}
