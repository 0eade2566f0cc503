//! Role-scoped access and aggregation engine.
//!
//! Every function takes the store as an explicit argument and the caller's
//! [`Capabilities`] as an explicit value, so an access decision is always a
//! function of its parameters. Read paths run as a fixed sequence of stages:
//!
//! 1. [`membership::find_lessons`] - lessons where the user is a party
//! 2. [`statuses::join_statuses`] - per-lesson song status rows
//! 3. [`catalog::resolve_songs`] - the visible song records
//! 4. [`merge::merge`] - songs annotated with their status
//!
//! A failing stage aborts the read; an empty stage short-circuits to an
//! empty result.

pub mod catalog;
pub mod membership;
pub mod merge;
pub mod pipeline;
pub mod roles;
pub mod sequencer;
pub mod statuses;
pub mod writes;

pub use roles::{Capabilities, Classification, Identity, LookupPolicy};
