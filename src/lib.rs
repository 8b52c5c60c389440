//! Library crate for courtside-core, exposing the game lifecycle scheduler,
//! the selection engine, and the storage abstraction for binaries and
//! embedding callers.

pub mod config;
pub mod dao;
pub mod error;
pub mod notify;
pub mod services;
pub mod state;
