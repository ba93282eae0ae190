//! Shared test doubles for the Courier dispatch core.

mod clock;
mod event;
mod repository;

pub use clock::FixedClock;
pub use event::new_event;
pub use repository::{
    ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    RecordingEventRepository,
};
