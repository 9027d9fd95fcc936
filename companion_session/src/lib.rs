#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Durable per-section transcripts.
//!
//! `TranscriptStore` keeps the in-memory mapping and writes it through to a
//! `StateStore` on every mutation. Two backends are provided: a directory of
//! files for real use and an in-memory one for ephemeral sessions and tests.

mod store;
mod transcript;

pub use store::{FileStateStore, MemoryStateStore};
pub use transcript::TranscriptStore;
