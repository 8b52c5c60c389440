//! In-memory [`GameStore`] used by the daemon and the test suites. Sharded
//! maps give each conditional mutation the single-statement atomicity the
//! callers' check-and-set guards rely on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::models::{
    GameEntity, GamePhase, JobKind, JobStatus, LoginAttemptEntity, PlayerEntity, PlayerRole,
    PriorityTier, RevokedTokenEntity, ScheduledJobEntity, SelectionAlgorithm, SignupEntity,
    SignupStatus,
};
use crate::dao::storage::StorageResult;

/// Process-local store backed by concurrent maps.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, GameEntity>,
    // Whole roster per game; the map entry lock makes unique insert,
    // promotion, and bulk status commits atomic per game.
    rosters: DashMap<Uuid, Vec<SignupEntity>>,
    jobs: DashMap<(Uuid, JobKind), ScheduledJobEntity>,
    players: DashMap<Uuid, PlayerEntity>,
    signup_notices: DashMap<Uuid, HashSet<Uuid>>,
    revoked_tokens: DashMap<String, SystemTime>,
    login_attempts: DashMap<Uuid, LoginAttemptEntity>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_game(&self, game: GameEntity) {
        self.inner.games.insert(game.id, game);
    }

    fn find_game(&self, id: Uuid) -> Option<GameEntity> {
        self.inner.games.get(&id).map(|game| game.clone())
    }

    fn games_awaiting_cascade(&self, now: SystemTime) -> Vec<GameEntity> {
        self.inner
            .games
            .iter()
            .filter(|game| {
                game.phase == GamePhase::Created
                    && !game.closed
                    && game.notify_future_at.is_some_and(|at| at <= now)
            })
            .map(|game| game.clone())
            .collect()
    }

    fn begin_notifying(&self, id: Uuid, now: SystemTime) -> bool {
        let Some(mut game) = self.inner.games.get_mut(&id) else {
            return false;
        };
        if game.closed || game.phase != GamePhase::Created {
            return false;
        }
        game.phase = GamePhase::NotifyingHigh;
        game.notified_at = Some(now);
        true
    }

    fn advance_phase(&self, id: Uuid, to: GamePhase) -> bool {
        let Some(mut game) = self.inner.games.get_mut(&id) else {
            return false;
        };
        if game.closed {
            return false;
        }
        let (Some(current), Some(target)) = (game.phase.cascade_rank(), to.cascade_rank()) else {
            return false;
        };
        if target <= current {
            return false;
        }
        game.phase = to;
        true
    }

    fn claim_selection(&self, id: Uuid) -> bool {
        let Some(mut game) = self.inner.games.get_mut(&id) else {
            return false;
        };
        if game.closed || game.selection_done || game.algorithm != SelectionAlgorithm::Random {
            return false;
        }
        game.selection_done = true;
        true
    }

    fn mark_closed(&self, id: Uuid, phase: GamePhase) -> bool {
        let Some(mut game) = self.inner.games.get_mut(&id) else {
            return false;
        };
        game.closed = true;
        game.phase = phase;
        true
    }

    fn complete_pending_jobs(&self, game_id: Uuid) -> u64 {
        let mut swept = 0;
        for mut job in self.inner.jobs.iter_mut() {
            if job.game_id == game_id && job.status == JobStatus::Pending {
                job.status = JobStatus::Completed;
                swept += 1;
            }
        }
        swept
    }

    fn insert_signup(&self, signup: SignupEntity) -> bool {
        let mut roster = self.inner.rosters.entry(signup.game_id).or_default();
        if roster.iter().any(|s| s.player_id == signup.player_id) {
            return false;
        }
        roster.push(signup);
        true
    }

    fn find_signup(&self, game_id: Uuid, player_id: Uuid) -> Option<SignupEntity> {
        self.inner
            .rosters
            .get(&game_id)?
            .iter()
            .find(|s| s.player_id == player_id)
            .cloned()
    }

    fn remove_signup(&self, game_id: Uuid, player_id: Uuid) -> Option<SignupEntity> {
        let mut roster = self.inner.rosters.get_mut(&game_id)?;
        let index = roster.iter().position(|s| s.player_id == player_id)?;
        Some(roster.remove(index))
    }

    fn signups_for_game(&self, game_id: Uuid) -> Vec<SignupEntity> {
        let mut signups = self
            .inner
            .rosters
            .get(&game_id)
            .map(|roster| roster.clone())
            .unwrap_or_default();
        signups.sort_by_key(|s| s.signed_up_at);
        signups
    }

    fn count_in(&self, game_id: Uuid) -> usize {
        self.inner
            .rosters
            .get(&game_id)
            .map(|roster| {
                roster
                    .iter()
                    .filter(|s| s.status == SignupStatus::In)
                    .count()
            })
            .unwrap_or(0)
    }

    fn commit_selection(&self, game_id: Uuid, statuses: Vec<(Uuid, SignupStatus)>) {
        if let Some(mut roster) = self.inner.rosters.get_mut(&game_id) {
            for (player_id, status) in &statuses {
                if let Some(signup) = roster.iter_mut().find(|s| s.player_id == *player_id) {
                    signup.status = *status;
                }
            }
        }
        if let Some(mut game) = self.inner.games.get_mut(&game_id) {
            game.selection_done = true;
            game.phase = GamePhase::Active;
        }
    }

    fn promote_waitlist_head(&self, game_id: Uuid) -> Option<SignupEntity> {
        let mut roster = self.inner.rosters.get_mut(&game_id)?;
        let index = roster
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == SignupStatus::Waitlist)
            .min_by_key(|(_, s)| s.signed_up_at)
            .map(|(index, _)| index)?;
        roster[index].status = SignupStatus::In;
        Some(roster[index].clone())
    }

    fn schedule_job(&self, game_id: Uuid, kind: JobKind, scheduled_at: SystemTime) -> bool {
        match self.inner.jobs.entry((game_id, kind)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ScheduledJobEntity::pending(game_id, kind, scheduled_at));
                true
            }
        }
    }

    fn find_job(&self, game_id: Uuid, kind: JobKind) -> Option<ScheduledJobEntity> {
        self.inner.jobs.get(&(game_id, kind)).map(|job| job.clone())
    }

    fn due_jobs(&self, now: SystemTime) -> Vec<ScheduledJobEntity> {
        let mut due: Vec<ScheduledJobEntity> = self
            .inner
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Pending && job.scheduled_at <= now)
            .map(|job| job.clone())
            .collect();
        due.sort_by_key(|job| job.scheduled_at);
        due
    }

    fn claim_job(&self, game_id: Uuid, kind: JobKind) -> bool {
        let Some(mut job) = self.inner.jobs.get_mut(&(game_id, kind)) else {
            return false;
        };
        if job.status != JobStatus::Pending {
            return false;
        }
        job.status = JobStatus::Running;
        true
    }

    fn complete_job(&self, game_id: Uuid, kind: JobKind, executed_at: SystemTime) {
        if let Some(mut job) = self.inner.jobs.get_mut(&(game_id, kind)) {
            job.status = JobStatus::Completed;
            job.executed_at = Some(executed_at);
        }
    }

    fn fail_job(&self, game_id: Uuid, kind: JobKind, message: String, executed_at: SystemTime) {
        if let Some(mut job) = self.inner.jobs.get_mut(&(game_id, kind)) {
            job.status = JobStatus::Failed;
            job.error_message = Some(message);
            job.executed_at = Some(executed_at);
        }
    }

    fn insert_player(&self, player: PlayerEntity) {
        self.inner.players.insert(player.id, player);
    }

    fn find_player(&self, id: Uuid) -> Option<PlayerEntity> {
        self.inner.players.get(&id).map(|player| player.clone())
    }

    fn players_by_tier(&self, tier: PriorityTier) -> Vec<PlayerEntity> {
        self.inner
            .players
            .iter()
            .filter(|player| player.approved && player.priority == tier)
            .map(|player| player.clone())
            .collect()
    }

    fn organizers(&self) -> Vec<PlayerEntity> {
        self.inner
            .players
            .iter()
            .filter(|player| player.approved && player.role == PlayerRole::Organizer)
            .map(|player| player.clone())
            .collect()
    }

    fn record_signup_notice(&self, game_id: Uuid, player_ids: Vec<Uuid>) {
        self.inner
            .signup_notices
            .entry(game_id)
            .or_default()
            .extend(player_ids);
    }

    fn players_notified(&self, game_id: Uuid) -> Vec<Uuid> {
        self.inner
            .signup_notices
            .get(&game_id)
            .map(|notified| notified.iter().copied().collect())
            .unwrap_or_default()
    }

    fn insert_revoked_token(&self, token: RevokedTokenEntity) {
        self.inner
            .revoked_tokens
            .insert(token.token, token.expires_at);
    }

    fn purge_expired_tokens(&self, now: SystemTime) -> u64 {
        // Inserts may land between the len reads; never report more removals
        // than rows.
        let before = self.inner.revoked_tokens.len();
        self.inner.revoked_tokens.retain(|_, expires| *expires > now);
        before.saturating_sub(self.inner.revoked_tokens.len()) as u64
    }

    fn record_login_attempt(&self, attempt: LoginAttemptEntity) {
        self.inner.login_attempts.insert(Uuid::new_v4(), attempt);
    }

    fn purge_old_login_attempts(&self, cutoff: SystemTime) -> u64 {
        let before = self.inner.login_attempts.len();
        self.inner
            .login_attempts
            .retain(|_, attempt| attempt.attempted_at >= cutoff);
        before.saturating_sub(self.inner.login_attempts.len()) as u64
    }
}

impl GameStore for MemoryGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert_game(game)) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_game(id)) })
    }

    fn games_awaiting_cascade(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.games_awaiting_cascade(now)) })
    }

    fn begin_notifying(&self, id: Uuid, now: SystemTime) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.begin_notifying(id, now)) })
    }

    fn advance_phase(&self, id: Uuid, to: GamePhase) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.advance_phase(id, to)) })
    }

    fn claim_selection(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.claim_selection(id)) })
    }

    fn mark_closed(&self, id: Uuid, phase: GamePhase) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.mark_closed(id, phase)) })
    }

    fn complete_pending_jobs(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.complete_pending_jobs(game_id)) })
    }

    fn insert_signup(&self, signup: SignupEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert_signup(signup)) })
    }

    fn find_signup(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SignupEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_signup(game_id, player_id)) })
    }

    fn remove_signup(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SignupEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.remove_signup(game_id, player_id)) })
    }

    fn signups_for_game(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SignupEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.signups_for_game(game_id)) })
    }

    fn count_in(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.count_in(game_id)) })
    }

    fn commit_selection(
        &self,
        game_id: Uuid,
        statuses: Vec<(Uuid, SignupStatus)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.commit_selection(game_id, statuses)) })
    }

    fn promote_waitlist_head(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SignupEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.promote_waitlist_head(game_id)) })
    }

    fn schedule_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
        scheduled_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.schedule_job(game_id, kind, scheduled_at)) })
    }

    fn find_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduledJobEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_job(game_id, kind)) })
    }

    fn due_jobs(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<ScheduledJobEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.due_jobs(now)) })
    }

    fn claim_job(&self, game_id: Uuid, kind: JobKind) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.claim_job(game_id, kind)) })
    }

    fn complete_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
        executed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.complete_job(game_id, kind, executed_at)) })
    }

    fn fail_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
        message: String,
        executed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.fail_job(game_id, kind, message, executed_at)) })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert_player(player)) })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_player(id)) })
    }

    fn players_by_tier(
        &self,
        tier: PriorityTier,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.players_by_tier(tier)) })
    }

    fn organizers(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.organizers()) })
    }

    fn record_signup_notice(
        &self,
        game_id: Uuid,
        player_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.record_signup_notice(game_id, player_ids)) })
    }

    fn players_notified(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.players_notified(game_id)) })
    }

    fn insert_revoked_token(
        &self,
        token: RevokedTokenEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert_revoked_token(token)) })
    }

    fn purge_expired_tokens(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.purge_expired_tokens(now)) })
    }

    fn record_login_attempt(
        &self,
        attempt: LoginAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.record_login_attempt(attempt)) })
    }

    fn purge_old_login_attempts(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.purge_old_login_attempts(cutoff)) })
    }
}
