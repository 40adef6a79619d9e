//! # encore-shared
//!
//! Domain types and pure rules for the Encore song-request service.
//!
//! Nothing in this crate performs I/O. The store and server crates build on
//! the types here and delegate every lifecycle, ordering, schedule and
//! validation decision to these functions.

pub mod analytics;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod ordering;
pub mod schedule;
pub mod types;

pub use error::{IllegalTransition, ParseStatusError, TipError, ValidationError};
pub use lifecycle::PlayAction;
pub use models::{NewSongRequest, SavedSong, SongRequest};
pub use schedule::{Schedule, ScheduleStatus, ScheduleWindow};
pub use types::{PaymentStatus, PlayedStatus, RequestId, Tip, UserId};
