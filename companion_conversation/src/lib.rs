#![warn(
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

//! Sectioned conversations against the remote assistant service.
//!
//! A [`SessionContext`] holds everything one session mutates: the transcript
//! store, the active section, the in-flight request and the running reveal.
//! [`SessionController`] drives submissions through it and
//! [`RevealPresenter`] animates the newest assistant answer.
//!
//! # Key Features
//! - Optimistic recording of user queries before the service answers
//! - Server-directed redirects into another section
//! - At most one request in flight, enforced by the controller
//! - Cancellable character-by-character reveal, separate from persisted text
//! - Text and PDF exports of any section

mod controller;
mod error;
mod reveal;
mod state;

pub use controller::{SessionController, SubmitHandle, SubmitOutcome};
pub use error::{SessionError, ValidationError};
pub use reveal::{Prefixes, RevealFrame, RevealPresenter};
pub use state::{RevealRef, SessionContext};
