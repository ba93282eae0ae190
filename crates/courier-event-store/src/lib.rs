//! Courier event store backends.

pub mod in_memory_event_repository;

pub use in_memory_event_repository::InMemoryEventRepository;
