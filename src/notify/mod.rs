//! Outbound player notifications. Services publish [`Notification`] values to
//! the [`outbox::NotificationOutbox`]; a gateway behind the
//! [`NotificationGateway`] trait delivers them off the request path.

use std::error::Error;
use std::time::SystemTime;

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;
use uuid::Uuid;

pub mod outbox;

/// Waitlist slot handed to a player after a selection run.
#[derive(Clone, Debug, Serialize)]
pub struct WaitlistNotice {
    pub player_id: Uuid,
    /// 1-based queue position.
    pub position: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Payloads handed to the notification gateway.
pub enum Notification {
    /// Sent to a priority tier when its signup window opens.
    SignupOpen {
        game_id: Uuid,
        players: Vec<Uuid>,
        starts_at: SystemTime,
        location: String,
    },
    /// Sent once per game after the random selection commits.
    SelectionResults {
        game_id: Uuid,
        admitted: Vec<Uuid>,
        waitlisted: Vec<WaitlistNotice>,
    },
    /// Sent to the player promoted off the waitlist.
    WaitlistPromotion { game_id: Uuid, player_id: Uuid },
    /// Sent to organizers when a confirmed player drops late.
    PlayerDropped {
        game_id: Uuid,
        organizers: Vec<Uuid>,
        player_id: Uuid,
        dropped_at: SystemTime,
    },
    /// Sent to every signed-up player when a game is cancelled.
    GameCancelled {
        game_id: Uuid,
        players: Vec<Uuid>,
        starts_at: SystemTime,
        location: String,
    },
}

/// Errors surfaced by a notification gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The downstream channel refused the payload.
    #[error("notification rejected: {0}")]
    Rejected(String),
    /// The downstream channel could not be reached.
    #[error("notification gateway unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Delivery backend for outbound notifications.
pub trait NotificationGateway: Send + Sync {
    /// Deliver a single notification to its recipients.
    fn deliver(&self, notification: Notification) -> BoxFuture<'static, Result<(), GatewayError>>;
}

/// Gateway that records deliveries in the log. Stands in for a push or mail
/// integration in deployments that run without one.
#[derive(Clone, Debug, Default)]
pub struct LogGateway;

impl NotificationGateway for LogGateway {
    fn deliver(&self, notification: Notification) -> BoxFuture<'static, Result<(), GatewayError>> {
        Box::pin(async move {
            match notification {
                Notification::SignupOpen {
                    game_id,
                    players,
                    starts_at,
                    location,
                } => {
                    info!(
                        game_id = %game_id,
                        recipients = players.len(),
                        starts_at = %format_system_time(starts_at),
                        location = %location,
                        "signup window open"
                    );
                }
                Notification::SelectionResults {
                    game_id,
                    admitted,
                    waitlisted,
                } => {
                    info!(
                        game_id = %game_id,
                        admitted = admitted.len(),
                        waitlisted = waitlisted.len(),
                        "selection results published"
                    );
                }
                Notification::WaitlistPromotion { game_id, player_id } => {
                    info!(game_id = %game_id, player_id = %player_id, "promoted from waitlist");
                }
                Notification::PlayerDropped {
                    game_id,
                    organizers,
                    player_id,
                    dropped_at,
                } => {
                    info!(
                        game_id = %game_id,
                        recipients = organizers.len(),
                        player_id = %player_id,
                        dropped_at = %format_system_time(dropped_at),
                        "confirmed player dropped"
                    );
                }
                Notification::GameCancelled {
                    game_id,
                    players,
                    starts_at,
                    location,
                } => {
                    info!(
                        game_id = %game_id,
                        recipients = players.len(),
                        starts_at = %format_system_time(starts_at),
                        location = %location,
                        "game cancelled"
                    );
                }
            }
            Ok(())
        })
    }
}

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Poll `condition` until it holds or the dispatch worker is declared stuck.
    pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("dispatch worker did not catch up");
    }

    /// Gateway that captures everything it is asked to deliver.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingGateway {
        delivered: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingGateway {
        pub(crate) fn delivered(&self) -> Vec<Notification> {
            self.delivered.lock().unwrap().clone()
        }
    }

    impl NotificationGateway for RecordingGateway {
        fn deliver(
            &self,
            notification: Notification,
        ) -> BoxFuture<'static, Result<(), GatewayError>> {
            let delivered = Arc::clone(&self.delivered);
            Box::pin(async move {
                delivered.lock().unwrap().push(notification);
                Ok(())
            })
        }
    }

    /// Gateway that refuses every delivery.
    #[derive(Clone, Default)]
    pub(crate) struct FailingGateway {
        attempts: Arc<Mutex<usize>>,
    }

    impl FailingGateway {
        pub(crate) fn attempts(&self) -> usize {
            *self.attempts.lock().unwrap()
        }
    }

    impl NotificationGateway for FailingGateway {
        fn deliver(&self, _: Notification) -> BoxFuture<'static, Result<(), GatewayError>> {
            let attempts = Arc::clone(&self.attempts);
            Box::pin(async move {
                *attempts.lock().unwrap() += 1;
                Err(GatewayError::Rejected("gateway offline".into()))
            })
        }
    }
}
