use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Admission policy chosen by the organizer at game creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAlgorithm {
    /// Players are admitted in signup order until the cap is reached.
    FirstCome,
    /// Admission is decided by the randomized selection engine.
    Random,
    /// Reserved policy; behaves like an unselected game in the core.
    Weighted,
}

/// Lifecycle phase of a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Freshly created; no notifications sent yet.
    Created,
    /// High-priority players have been notified.
    NotifyingHigh,
    /// Standard-priority players have been notified.
    NotifyingStandard,
    /// Low-priority players have been notified.
    NotifyingLow,
    /// Open signup window outside the notification waves.
    Signup,
    /// Selection has run; the roster is settled.
    Active,
    /// Closed by an organizer.
    Closed,
    /// Cancelled by an organizer.
    Cancelled,
}

impl GamePhase {
    /// Position of this phase along the notification cascade.
    ///
    /// Terminal phases are not part of the cascade and return `None`; they can
    /// only be reached through an explicit close or cancel.
    pub fn cascade_rank(self) -> Option<u8> {
        match self {
            GamePhase::Created => Some(0),
            GamePhase::NotifyingHigh => Some(1),
            GamePhase::NotifyingStandard => Some(2),
            GamePhase::NotifyingLow => Some(3),
            GamePhase::Signup => Some(4),
            GamePhase::Active => Some(5),
            GamePhase::Closed | GamePhase::Cancelled => None,
        }
    }

    /// Whether the phase is terminal (closed or cancelled).
    pub fn is_terminal(self) -> bool {
        self.cascade_rank().is_none()
    }
}

/// Status of a single player's signup for a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignupStatus {
    /// Waiting for selection to run.
    Pending,
    /// Admitted to the game.
    In,
    /// On the waitlist, promoted in signup order.
    Waitlist,
}

/// Kind of deferred work a scheduler job performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Notify the high-priority tier (immediate path only).
    NotifyHigh,
    /// Notify the standard-priority tier.
    NotifyStandard,
    /// Notify the low-priority tier if capacity remains.
    NotifyLow,
    /// Run the random selection engine.
    RunSelection,
}

/// Execution status of a scheduler job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its scheduled time.
    Pending,
    /// Claimed by the poll loop.
    Running,
    /// Finished, successfully or as a recorded no-op.
    Completed,
    /// Terminally failed; never retried.
    Failed,
}

/// Notification precedence class of a player.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// Notified first; optionally guaranteed admission.
    High,
    /// Notified after the high-priority delay.
    Standard,
    /// Notified last, only while spots remain.
    Low,
}

/// Role of a player within the roster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerRole {
    /// Organizes games and receives drop notices.
    Organizer,
    /// Regular participant.
    Player,
}

/// One scheduled pickup game persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// When the game is played.
    pub starts_at: SystemTime,
    /// Where the game is played.
    pub location: String,
    /// Admission policy for this game.
    pub algorithm: SelectionAlgorithm,
    /// Maximum number of admitted players when the cap is enabled.
    pub cap: u32,
    /// Whether the cap is enforced at all.
    pub cap_enabled: bool,
    /// Current lifecycle phase.
    pub phase: GamePhase,
    /// Set exactly once when the random selection has run.
    pub selection_done: bool,
    /// Frozen for automatic advancement once set.
    pub closed: bool,
    /// When the first notification wave went out.
    pub notified_at: Option<SystemTime>,
    /// Delays the cascade start until this instant when set.
    pub notify_future_at: Option<SystemTime>,
    /// Whether high-priority players get guaranteed admission in random games.
    pub random_high_auto: bool,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
}

/// One player's relationship to one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupEntity {
    /// Game this signup belongs to.
    pub game_id: Uuid,
    /// Player who signed up. Unique per game.
    pub player_id: Uuid,
    /// Current admission status.
    pub status: SignupStatus,
    /// Inserted by an organizer rather than the player; always admitted.
    pub owner_added: bool,
    /// Sole ordering key for FIFO waitlisting and tie-breaking.
    pub signed_up_at: SystemTime,
}

/// One unit of deferred work tied to a game.
///
/// At most one job exists per (game, kind); duplicate scheduling attempts are
/// no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledJobEntity {
    /// Game the job operates on.
    pub game_id: Uuid,
    /// What the job does when due.
    pub kind: JobKind,
    /// When the job becomes due.
    pub scheduled_at: SystemTime,
    /// When the job finished, successfully or not.
    pub executed_at: Option<SystemTime>,
    /// Lifecycle status; transitions pending→running→{completed,failed} once.
    pub status: JobStatus,
    /// Captured error text for failed jobs.
    pub error_message: Option<String>,
}

impl ScheduledJobEntity {
    /// Build a fresh pending job.
    pub fn pending(game_id: Uuid, kind: JobKind, scheduled_at: SystemTime) -> Self {
        Self {
            game_id,
            kind,
            scheduled_at,
            executed_at: None,
            status: JobStatus::Pending,
            error_message: None,
        }
    }
}

/// Roster entry read by the core; owned by the membership collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Display name used in notices.
    pub name: String,
    /// Notification precedence class.
    pub priority: PriorityTier,
    /// Roster role.
    pub role: PlayerRole,
    /// Only approved players are notified or admitted.
    pub approved: bool,
}

/// Revoked auth token awaiting expiry, removed by the cleanup loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevokedTokenEntity {
    /// Opaque token value.
    pub token: String,
    /// Instant after which the entry can be purged.
    pub expires_at: SystemTime,
}

/// One recorded login attempt, purged after the retention window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginAttemptEntity {
    /// Account the attempt targeted.
    pub username: String,
    /// When the attempt happened.
    pub attempted_at: SystemTime,
    /// Whether the attempt succeeded.
    pub succeeded: bool,
}
