/// Notification cascade scheduling and tier fan-out.
pub mod cascade;
/// Game lifecycle operations.
pub mod game_service;
/// Player signup and drop handling.
pub mod roster_service;
/// Background poll and cleanup loops.
pub mod scheduler;
/// Random selection partitioning and commit.
pub mod selection;
