//! Courier Core — shared dispatch abstractions.
//!
//! This crate defines the fundamental traits and types that the router,
//! the handler runtime, and every event store backend depend on. It contains
//! no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
