/// Game, roster, and job storage operations.
pub mod game_store;
/// Persisted entity definitions.
pub mod models;
/// Storage abstraction layer and its error surface.
pub mod storage;
