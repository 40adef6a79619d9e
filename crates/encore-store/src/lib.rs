//! # encore-store
//!
//! SQLite persistence for the Encore song-request service.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for song requests,
//! saved songs, schedule windows and payments. Play-status changes go
//! through a conditional update so that concurrent admins cannot double-play
//! or skip a request.

pub mod database;
pub mod migrations;
pub mod models;
pub mod payments;
pub mod saved_songs;
pub mod schedule;
pub mod song_requests;

mod error;
mod rows;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
