//! Random selection: partition a game's signups into admitted and waitlisted
//! players, then commit the result exactly once.

use rand::{Rng, rng, seq::SliceRandom};
use tracing::info;
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::models::{GameEntity, PriorityTier, SignupStatus};
use crate::error::ServiceError;
use crate::notify::{Notification, WaitlistNotice};
use crate::state::SharedState;

/// One signup as seen by the selection algorithm.
#[derive(Clone, Debug)]
pub struct SelectionEntry {
    pub player_id: Uuid,
    pub owner_added: bool,
    pub priority: PriorityTier,
}

/// Result of partitioning a roster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// Players given a confirmed spot.
    pub admitted: Vec<Uuid>,
    /// Players queued in their final waitlist order.
    pub waitlisted: Vec<Uuid>,
}

/// Counts reported back to the caller after a committed selection.
#[derive(Clone, Copy, Debug)]
pub struct SelectionSummary {
    pub admitted: usize,
    pub waitlisted: usize,
}

/// Split `entries` into admitted and waitlisted players.
///
/// Owner-added signups are always admitted, even past the cap. When the game
/// reserves seats for the high-priority tier, that tier is admitted whole if
/// it fits in the remaining seats and raffled for them otherwise. Everyone
/// else competes for whatever is left; losers land on the waitlist in
/// shuffled order, after any high-priority overflow.
pub fn partition(
    game: &GameEntity,
    entries: &[SelectionEntry],
    rng: &mut impl Rng,
) -> SelectionOutcome {
    let mut available: i64 = if game.cap_enabled {
        i64::from(game.cap)
    } else {
        i64::MAX
    };
    let mut admitted = Vec::new();
    let mut waitlisted = Vec::new();

    let (owner_added, mut pool): (Vec<&SelectionEntry>, Vec<&SelectionEntry>) =
        entries.iter().partition(|entry| entry.owner_added);
    for entry in owner_added {
        admitted.push(entry.player_id);
        available -= 1;
    }

    if game.random_high_auto {
        let (mut high, rest): (Vec<&SelectionEntry>, Vec<&SelectionEntry>) = pool
            .into_iter()
            .partition(|entry| entry.priority == PriorityTier::High);
        if (high.len() as i64) <= available {
            available -= high.len() as i64;
            admitted.extend(high.iter().map(|entry| entry.player_id));
        } else {
            high.shuffle(rng);
            for (index, entry) in high.iter().enumerate() {
                if (index as i64) < available {
                    admitted.push(entry.player_id);
                } else {
                    waitlisted.push(entry.player_id);
                }
            }
            available = 0;
        }
        pool = rest;
    }

    if available > 0 && !pool.is_empty() {
        pool.shuffle(rng);
        for (index, entry) in pool.iter().enumerate() {
            if (index as i64) < available {
                admitted.push(entry.player_id);
            } else {
                waitlisted.push(entry.player_id);
            }
        }
    } else if !pool.is_empty() {
        pool.shuffle(rng);
        waitlisted.extend(pool.iter().map(|entry| entry.player_id));
    }

    SelectionOutcome {
        admitted,
        waitlisted,
    }
}

// ---------------------------------------------------------------------------

/// Run the selection for a random-algorithm game and commit the outcome.
///
/// The selection flag is claimed before any roster work, so concurrent
/// invocations agree on a single winner; every other caller gets `Ok(None)`
/// and must not publish results.
pub async fn run_selection(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Option<SelectionSummary>, ServiceError> {
    let store = state.store();
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {game_id}")))?;

    if !store.claim_selection(game_id).await? {
        return Ok(None);
    }

    let signups = store.signups_for_game(game_id).await?;
    let mut entries = Vec::with_capacity(signups.len());
    for signup in &signups {
        // Signups without a player row count as standard tier.
        let priority = store
            .find_player(signup.player_id)
            .await?
            .map(|player| player.priority)
            .unwrap_or(PriorityTier::Standard);
        entries.push(SelectionEntry {
            player_id: signup.player_id,
            owner_added: signup.owner_added,
            priority,
        });
    }

    let outcome = partition(&game, &entries, &mut rng());
    let statuses = outcome
        .admitted
        .iter()
        .map(|id| (*id, SignupStatus::In))
        .chain(outcome.waitlisted.iter().map(|id| (*id, SignupStatus::Waitlist)))
        .collect();
    store.commit_selection(game_id, statuses).await?;

    let waitlisted: Vec<WaitlistNotice> = outcome
        .waitlisted
        .iter()
        .enumerate()
        .map(|(index, id)| WaitlistNotice {
            player_id: *id,
            position: index as u32 + 1,
        })
        .collect();
    info!(
        game_id = %game_id,
        admitted = outcome.admitted.len(),
        waitlisted = waitlisted.len(),
        "random selection committed"
    );
    state.outbox().publish(Notification::SelectionResults {
        game_id,
        admitted: outcome.admitted.clone(),
        waitlisted,
    });

    Ok(Some(SelectionSummary {
        admitted: outcome.admitted.len(),
        waitlisted: outcome.waitlisted.len(),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::AppConfig;
    use crate::dao::game_store::memory::MemoryGameStore;
    use crate::dao::models::{
        GamePhase, PlayerEntity, PlayerRole, SelectionAlgorithm, SignupEntity,
    };
    use crate::notify::outbox::NotificationOutbox;
    use crate::notify::testing::{RecordingGateway, wait_until};
    use crate::state::{AppState, SharedState};

    fn capped_game(cap: u32) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            starts_at: UNIX_EPOCH + Duration::from_secs(10_000),
            location: "Riverside Gym".into(),
            algorithm: SelectionAlgorithm::Random,
            cap,
            cap_enabled: true,
            phase: GamePhase::NotifyingStandard,
            selection_done: false,
            closed: false,
            notified_at: None,
            notify_future_at: None,
            random_high_auto: true,
            created_at: UNIX_EPOCH,
        }
    }

    fn entry(owner_added: bool, priority: PriorityTier) -> SelectionEntry {
        SelectionEntry {
            player_id: Uuid::new_v4(),
            owner_added,
            priority,
        }
    }

    fn batch(count: usize, owner_added: bool, priority: PriorityTier) -> Vec<SelectionEntry> {
        (0..count).map(|_| entry(owner_added, priority)).collect()
    }

    fn ids(entries: &[SelectionEntry]) -> HashSet<Uuid> {
        entries.iter().map(|entry| entry.player_id).collect()
    }

    #[test]
    fn owner_added_players_are_admitted_past_the_cap() {
        let game = capped_game(5);
        let owners = batch(6, true, PriorityTier::Standard);
        let high = batch(3, false, PriorityTier::High);
        let mut entries = owners.clone();
        entries.extend(high.clone());

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(1));

        assert_eq!(outcome.admitted.len(), 6);
        assert_eq!(ids(&owners), outcome.admitted.iter().copied().collect());
        assert_eq!(ids(&high), outcome.waitlisted.iter().copied().collect());
    }

    #[test]
    fn high_tier_is_guaranteed_a_spot_when_it_fits() {
        let game = capped_game(10);
        let owners = batch(3, true, PriorityTier::Standard);
        let high = batch(5, false, PriorityTier::High);
        let standard = batch(10, false, PriorityTier::Standard);
        let mut entries = owners.clone();
        entries.extend(high.clone());
        entries.extend(standard.clone());

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(2));
        let admitted: HashSet<Uuid> = outcome.admitted.iter().copied().collect();

        assert_eq!(outcome.admitted.len(), 10);
        assert!(ids(&owners).is_subset(&admitted));
        assert!(ids(&high).is_subset(&admitted));
        assert_eq!(outcome.waitlisted.len(), 8);
        assert!(
            outcome
                .waitlisted
                .iter()
                .all(|id| ids(&standard).contains(id))
        );
    }

    #[test]
    fn admitted_never_exceeds_the_cap_without_owner_overflow() {
        let game = capped_game(4);
        let mut entries = batch(2, false, PriorityTier::High);
        entries.extend(batch(5, false, PriorityTier::Standard));

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(3));

        assert_eq!(outcome.admitted.len(), 4);
        assert_eq!(outcome.waitlisted.len(), 3);
    }

    #[test]
    fn uncapped_game_admits_everyone() {
        let mut game = capped_game(1);
        game.cap_enabled = false;
        let mut entries = batch(4, false, PriorityTier::High);
        entries.extend(batch(9, false, PriorityTier::Standard));

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(4));

        assert_eq!(outcome.admitted.len(), 13);
        assert!(outcome.waitlisted.is_empty());
    }

    #[test]
    fn high_overflow_queues_ahead_of_the_standard_pool() {
        let game = capped_game(2);
        let high = batch(4, false, PriorityTier::High);
        let standard = batch(3, false, PriorityTier::Standard);
        let mut entries = high.clone();
        entries.extend(standard.clone());

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(5));

        assert_eq!(outcome.admitted.len(), 2);
        assert!(outcome.admitted.iter().all(|id| ids(&high).contains(id)));
        assert_eq!(outcome.waitlisted.len(), 5);
        assert!(
            outcome.waitlisted[..2]
                .iter()
                .all(|id| ids(&high).contains(id))
        );
        assert!(
            outcome.waitlisted[2..]
                .iter()
                .all(|id| ids(&standard).contains(id))
        );
    }

    #[test]
    fn owner_overflow_waitlists_the_rest_even_without_high_entries() {
        let game = capped_game(2);
        let owners = batch(3, true, PriorityTier::Standard);
        let standard = batch(2, false, PriorityTier::Standard);
        let mut entries = owners.clone();
        entries.extend(standard.clone());

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(6));

        assert_eq!(outcome.admitted.len(), 3);
        assert_eq!(ids(&standard), outcome.waitlisted.iter().copied().collect());
    }

    #[test]
    fn same_seed_gives_the_same_outcome() {
        let game = capped_game(3);
        let mut entries = batch(2, false, PriorityTier::High);
        entries.extend(batch(6, false, PriorityTier::Standard));

        let first = partition(&game, &entries, &mut StdRng::seed_from_u64(7));
        let second = partition(&game, &entries, &mut StdRng::seed_from_u64(7));

        assert_eq!(first, second);
    }

    #[test]
    fn disabled_reservation_pools_all_tiers_together() {
        let mut game = capped_game(3);
        game.random_high_auto = false;
        let mut entries = batch(2, false, PriorityTier::High);
        entries.extend(batch(4, false, PriorityTier::Standard));

        let outcome = partition(&game, &entries, &mut StdRng::seed_from_u64(8));

        assert_eq!(outcome.admitted.len(), 3);
        assert_eq!(outcome.waitlisted.len(), 3);
    }

    // -----------------------------------------------------------------------

    fn state_with(store: Arc<dyn GameStore>) -> (SharedState, RecordingGateway) {
        let gateway = RecordingGateway::default();
        let (outbox, _worker) = NotificationOutbox::start(64, Arc::new(gateway.clone()));
        (AppState::new(AppConfig::default(), store, outbox), gateway)
    }

    fn approved_player(priority: PriorityTier) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            name: "player".into(),
            priority,
            role: PlayerRole::Player,
            approved: true,
        }
    }

    fn pending_signup(game_id: Uuid, player_id: Uuid, order: u64) -> SignupEntity {
        SignupEntity {
            game_id,
            player_id,
            status: SignupStatus::Pending,
            owner_added: false,
            signed_up_at: UNIX_EPOCH + Duration::from_secs(order),
        }
    }

    #[tokio::test]
    async fn selection_commits_roster_and_publishes_results() {
        let (state, gateway) = state_with(Arc::new(MemoryGameStore::new()));
        let game = capped_game(2);
        let store = state.store();
        store.insert_game(game.clone()).await.unwrap();

        let high = approved_player(PriorityTier::High);
        store.insert_player(high.clone()).await.unwrap();
        store
            .insert_signup(pending_signup(game.id, high.id, 1))
            .await
            .unwrap();
        for order in 2..=3 {
            let standard = approved_player(PriorityTier::Standard);
            store.insert_player(standard.clone()).await.unwrap();
            store
                .insert_signup(pending_signup(game.id, standard.id, order))
                .await
                .unwrap();
        }

        let summary = run_selection(&state, game.id).await.unwrap().unwrap();
        assert_eq!(summary.admitted, 2);
        assert_eq!(summary.waitlisted, 1);

        let updated = store.find_game(game.id).await.unwrap().unwrap();
        assert!(updated.selection_done);
        assert_eq!(updated.phase, GamePhase::Active);
        assert_eq!(store.count_in(game.id).await.unwrap(), 2);

        wait_until(|| !gateway.delivered().is_empty()).await;
        match &gateway.delivered()[0] {
            Notification::SelectionResults {
                game_id,
                admitted,
                waitlisted,
            } => {
                assert_eq!(*game_id, game.id);
                assert!(admitted.contains(&high.id));
                assert_eq!(waitlisted.len(), 1);
                assert_eq!(waitlisted[0].position, 1);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_selection_returns_none() {
        let (state, _gateway) = state_with(Arc::new(MemoryGameStore::new()));
        let game = capped_game(4);
        state.store().insert_game(game.clone()).await.unwrap();

        assert!(run_selection(&state, game.id).await.unwrap().is_some());
        assert!(run_selection(&state, game.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_selections_commit_once() {
        let (state, _gateway) = state_with(Arc::new(MemoryGameStore::new()));
        let game = capped_game(4);
        state.store().insert_game(game.clone()).await.unwrap();

        let (first, second) = tokio::join!(
            run_selection(&state, game.id),
            run_selection(&state, game.id)
        );
        assert!(first.unwrap().is_some() ^ second.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let (state, _gateway) = state_with(Arc::new(MemoryGameStore::new()));

        let err = run_selection(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn signups_without_a_player_row_count_as_standard() {
        let (state, _gateway) = state_with(Arc::new(MemoryGameStore::new()));
        let game = capped_game(1);
        let store = state.store();
        store.insert_game(game.clone()).await.unwrap();

        let high = approved_player(PriorityTier::High);
        store.insert_player(high.clone()).await.unwrap();
        store
            .insert_signup(pending_signup(game.id, high.id, 1))
            .await
            .unwrap();
        let ghost = Uuid::new_v4();
        store
            .insert_signup(pending_signup(game.id, ghost, 2))
            .await
            .unwrap();

        run_selection(&state, game.id).await.unwrap().unwrap();

        let roster = store.signups_for_game(game.id).await.unwrap();
        let status_of = |id: Uuid| {
            roster
                .iter()
                .find(|signup| signup.player_id == id)
                .unwrap()
                .status
        };
        assert_eq!(status_of(high.id), SignupStatus::In);
        assert_eq!(status_of(ghost), SignupStatus::Waitlist);
    }
}
