pub mod memory;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GamePhase, JobKind, LoginAttemptEntity, PlayerEntity, PriorityTier,
    RevokedTokenEntity, ScheduledJobEntity, SignupEntity, SignupStatus,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for games, signups, scheduler jobs,
/// and the roster attributes the core reads.
///
/// Conditional mutations return `true` when they applied, mirroring an
/// affected-row count; callers rely on those booleans for their atomic
/// check-and-set guards.
pub trait GameStore: Send + Sync {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Games still in the created phase whose delayed cascade start has passed.
    fn games_awaiting_cascade(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Move an open, created game into `notifying_high` and stamp
    /// `notified_at`. Applies at most once per game.
    fn begin_notifying(
        &self,
        id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Advance the phase of an open game, only ever forward along the cascade.
    fn advance_phase(&self, id: Uuid, to: GamePhase) -> BoxFuture<'static, StorageResult<bool>>;
    /// Atomically flip `selection_done` from false to true for an open random
    /// game. Exactly one caller wins.
    fn claim_selection(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Close or cancel a game; `phase` must be one of the terminal phases.
    fn mark_closed(&self, id: Uuid, phase: GamePhase) -> BoxFuture<'static, StorageResult<bool>>;
    /// Sweep all still-pending jobs of a game to completed, returning how many
    /// were swept.
    fn complete_pending_jobs(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;

    /// Insert a signup; returns false when the (game, player) pair exists.
    fn insert_signup(&self, signup: SignupEntity) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_signup(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SignupEntity>>>;
    /// Delete a signup, returning the removed row when one existed.
    fn remove_signup(
        &self,
        game_id: Uuid,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SignupEntity>>>;
    /// All signups of a game ordered by `signed_up_at` ascending.
    fn signups_for_game(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SignupEntity>>>;
    fn count_in(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<usize>>;
    /// Persist a selection outcome in one step: set each listed signup status,
    /// then mark the game `selection_done` with phase `active`.
    fn commit_selection(
        &self,
        game_id: Uuid,
        statuses: Vec<(Uuid, SignupStatus)>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Promote the earliest-signed-up waitlisted player to `in`, returning the
    /// promoted signup. At most one signup changes per call.
    fn promote_waitlist_head(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SignupEntity>>>;

    /// Schedule a job; returns false when the (game, kind) pair exists.
    fn schedule_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
        scheduled_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduledJobEntity>>>;
    /// Pending jobs due at `now`, ordered by `scheduled_at` ascending.
    fn due_jobs(
        &self,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<ScheduledJobEntity>>>;
    /// Move a pending job to running. Exactly one caller wins.
    fn claim_job(&self, game_id: Uuid, kind: JobKind) -> BoxFuture<'static, StorageResult<bool>>;
    fn complete_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
        executed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn fail_job(
        &self,
        game_id: Uuid,
        kind: JobKind,
        message: String,
        executed_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Approved players of one priority tier.
    fn players_by_tier(
        &self,
        tier: PriorityTier,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Approved players with the organizer role.
    fn organizers(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;

    /// Record that these players received the signup-open notice for a game.
    fn record_signup_notice(
        &self,
        game_id: Uuid,
        player_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Players already holding a signup-open notice for a game.
    fn players_notified(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;

    fn insert_revoked_token(
        &self,
        token: RevokedTokenEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Drop revoked tokens whose expiry has passed, returning the purge count.
    fn purge_expired_tokens(&self, now: SystemTime) -> BoxFuture<'static, StorageResult<u64>>;
    fn record_login_attempt(
        &self,
        attempt: LoginAttemptEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Drop login attempts older than `cutoff`, returning the purge count.
    fn purge_old_login_attempts(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;
}
