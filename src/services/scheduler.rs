//! Background job scheduler: a poll loop that drives every timed transition
//! of the game lifecycle, and a slower cleanup loop that purges expired
//! security artifacts. Both loops run until told to stop and survive any
//! single tick going wrong.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::dao::game_store::GameStore;
use crate::dao::models::{
    GamePhase, JobKind, PriorityTier, ScheduledJobEntity, SelectionAlgorithm,
};
use crate::error::ServiceError;
use crate::services::{cascade, selection};
use crate::state::SharedState;

/// Handle to the running background loops.
///
/// Constructed once at process start; every caller that needs to influence
/// scheduling goes through the store, never through this handle, so there is
/// no global scheduler state.
pub struct Scheduler {
    stop: watch::Sender<bool>,
    poll_task: JoinHandle<()>,
    cleanup_task: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn the poll and cleanup loops against the shared state.
    pub fn start(state: SharedState) -> Self {
        let (stop, _) = watch::channel(false);
        info!(
            poll_interval = ?state.config().poll_interval,
            cleanup_interval = ?state.config().cleanup_interval,
            "scheduler started"
        );
        let poll_task = tokio::spawn(run_poll_loop(state.clone(), stop.subscribe()));
        let cleanup_task = tokio::spawn(run_cleanup_loop(state, stop.subscribe()));
        Self {
            stop,
            poll_task,
            cleanup_task,
        }
    }

    /// Signal both loops and wait for them to finish their current pass.
    /// In-flight jobs are not rolled back.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.poll_task.await {
            warn!(error = %err, "poll loop did not shut down cleanly");
        }
        if let Err(err) = self.cleanup_task.await {
            warn!(error = %err, "cleanup loop did not shut down cleanly");
        }
        info!("scheduler stopped");
    }
}

async fn run_poll_loop(state: SharedState, mut stop: watch::Receiver<bool>) {
    loop {
        if let Err(err) = tick(&state).await {
            error!(error = %err, "scheduler tick failed");
        }
        tokio::select! {
            _ = sleep(state.config().poll_interval) => {}
            _ = stop.changed() => return,
        }
    }
}

async fn run_cleanup_loop(state: SharedState, mut stop: watch::Receiver<bool>) {
    loop {
        if let Err(err) = run_cleanup(&state).await {
            error!(error = %err, "cleanup pass failed");
        }
        tokio::select! {
            _ = sleep(state.config().cleanup_interval) => {}
            _ = stop.changed() => return,
        }
    }
}

/// One scheduler pass: open cascades whose deferred start has come due, then
/// run every due job in `scheduled_at` order.
async fn tick(state: &SharedState) -> Result<(), ServiceError> {
    let now = SystemTime::now();
    let store = state.store();

    for game in store.games_awaiting_cascade(now).await? {
        info!(game_id = %game.id, "starting deferred notification cascade");
        if let Err(err) = cascade::trigger_immediate(state, &game).await {
            error!(game_id = %game.id, error = %err, "deferred cascade start failed");
        }
    }

    for job in store.due_jobs(now).await? {
        // A lost claim means another caller or a close sweep got here first.
        if !store.claim_job(job.game_id, job.kind).await? {
            continue;
        }
        match execute_job(state, &job).await {
            Ok(()) => {
                store
                    .complete_job(job.game_id, job.kind, SystemTime::now())
                    .await?;
            }
            Err(err) => {
                warn!(
                    game_id = %job.game_id,
                    kind = ?job.kind,
                    error = %err,
                    "scheduler job failed"
                );
                store
                    .fail_job(job.game_id, job.kind, err.to_string(), SystemTime::now())
                    .await?;
            }
        }
    }
    Ok(())
}

/// Run one claimed job. Closed or deleted games complete the job without any
/// side effects, so stale cascades never fire.
async fn execute_job(state: &SharedState, job: &ScheduledJobEntity) -> Result<(), ServiceError> {
    let store = state.store();
    let game = match store.find_game(job.game_id).await? {
        Some(game) if !game.closed => game,
        _ => {
            info!(
                game_id = %job.game_id,
                kind = ?job.kind,
                "game closed or missing; nothing to do"
            );
            return Ok(());
        }
    };

    match job.kind {
        // Never scheduled by the cascade; the high tier is notified on the
        // immediate path. The arm stays so a hand-inserted job behaves.
        JobKind::NotifyHigh => {
            cascade::notify_tier(state, &game, PriorityTier::High).await?;
        }
        JobKind::NotifyStandard => {
            cascade::notify_tier(state, &game, PriorityTier::Standard).await?;
            store
                .advance_phase(game.id, GamePhase::NotifyingStandard)
                .await?;
        }
        JobKind::NotifyLow => {
            // The low tier only hears about games that still have room. A
            // full game completes the job with the phase left untouched.
            if cascade::capacity_remaining(state, &game).await? {
                cascade::notify_tier(state, &game, PriorityTier::Low).await?;
                store.advance_phase(game.id, GamePhase::NotifyingLow).await?;
            } else {
                info!(game_id = %game.id, "game full; low tier left unnotified");
            }
        }
        JobKind::RunSelection => {
            if game.algorithm == SelectionAlgorithm::Random && !game.selection_done {
                if selection::run_selection(state, game.id).await?.is_none() {
                    info!(game_id = %game.id, "selection already claimed elsewhere");
                }
            } else {
                info!(game_id = %game.id, "selection not applicable; nothing to run");
            }
        }
    }
    Ok(())
}

/// Purge expired revoked tokens and login attempts past their retention
/// window.
async fn run_cleanup(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.store();
    let now = SystemTime::now();
    let tokens = store.purge_expired_tokens(now).await?;
    let cutoff = now
        .checked_sub(state.config().login_attempt_retention)
        .unwrap_or(UNIX_EPOCH);
    let attempts = store.purge_old_login_attempts(cutoff).await?;
    if tokens > 0 || attempts > 0 {
        info!(tokens, attempts, "purged expired security artifacts");
    }
    Ok(())
}
