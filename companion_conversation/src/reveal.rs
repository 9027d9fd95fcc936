//! Character-by-character reveal of the newest assistant answer.
//!
//! The transcript always holds the complete message. A reveal only publishes
//! growing prefixes of it on a `watch` channel, one character per tick, so
//! cancelling one never touches persisted content.

use std::iter::FusedIterator;
use std::time::Duration;

use companion_core::StateStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::state::{ActiveReveal, RevealRef, SessionContext, SessionState};

/// Increasingly longer prefixes of a text, one character at a time, ending
/// with the full text. Empty text yields a single empty prefix.
#[derive(Debug, Clone)]
pub struct Prefixes {
    text: String,
    end: usize,
    finished: bool,
}

impl Prefixes {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            end: 0,
            finished: false,
        }
    }
}

impl Iterator for Prefixes {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        if let Some(c) = self.text[self.end..].chars().next() {
            self.end += c.len_utf8();
        }
        if self.end == self.text.len() {
            self.finished = true;
        }
        Some(self.text[..self.end].to_string())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.finished {
            0
        } else {
            self.text[self.end..].chars().count().max(1)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Prefixes {}
impl FusedIterator for Prefixes {}

/// Progress of a reveal as seen by a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    pub target: RevealRef,
    /// Text disclosed so far.
    pub shown: String,
    pub complete: bool,
}

/// Runs at most one reveal per session.
pub struct RevealPresenter<S>
where
    S: Send + Sync,
{
    ctx: SessionContext<S>,
    tick: Duration,
}

impl<S> RevealPresenter<S>
where
    S: StateStore + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(ctx: SessionContext<S>, tick: Duration) -> Self {
        Self { ctx, tick }
    }

    #[must_use]
    pub const fn tick(&self) -> Duration {
        self.tick
    }

    /// Abandon the running reveal, if any.
    pub async fn cancel(&self) -> bool {
        let mut state = self.ctx.lock().await;
        Self::cancel_locked(&mut state)
    }

    /// Start revealing `text` for `target`, interrupting any previous reveal.
    ///
    /// With a zero tick nothing is spawned: the returned channel already
    /// holds the complete frame and no reveal is left running.
    pub(crate) fn start(
        &self,
        state: &mut SessionState<S>,
        target: RevealRef,
        text: String,
    ) -> watch::Receiver<RevealFrame> {
        Self::cancel_locked(state);

        if self.tick.is_zero() {
            debug!(
                "Zero reveal tick, showing {}[{}] at once",
                target.section_id, target.index
            );
            let (_, rx) = watch::channel(RevealFrame {
                target,
                shown: text,
                complete: true,
            });
            return rx;
        }

        state.reveal_generation += 1;
        let generation = state.reveal_generation;
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(RevealFrame {
            target: target.clone(),
            shown: String::new(),
            complete: false,
        });

        debug!(
            "Starting reveal #{generation} of {}[{}] ({} chars)",
            target.section_id,
            target.index,
            text.chars().count()
        );
        let task = tokio::spawn(run(
            self.ctx.clone(),
            generation,
            cancel.clone(),
            tx,
            text,
            self.tick,
        ));

        state.reveal = Some(ActiveReveal {
            target,
            generation,
            cancel,
            task,
            frames: rx.clone(),
        });
        rx
    }

    /// Cancel while the caller already holds the session lock.
    ///
    /// The task is aborted and its token cancelled before the lock is
    /// released, so it cannot publish or touch session state afterwards.
    pub(crate) fn cancel_locked(state: &mut SessionState<S>) -> bool {
        let Some(active) = state.reveal.take() else {
            return false;
        };
        active.cancel.cancel();
        active.task.abort();
        debug!(
            "Cancelled reveal #{} of {}[{}]",
            active.generation, active.target.section_id, active.target.index
        );
        true
    }
}

async fn run<S>(
    ctx: SessionContext<S>,
    generation: u64,
    cancel: CancellationToken,
    tx: watch::Sender<RevealFrame>,
    text: String,
    tick: Duration,
) where
    S: StateStore + Send + Sync + 'static,
{
    let target = tx.borrow().target.clone();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval fires immediately.
    interval.tick().await;

    for shown in Prefixes::new(text.clone()) {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            _ = interval.tick() => {}
        }
        if cancel.is_cancelled() {
            return;
        }
        tx.send_replace(RevealFrame {
            target: target.clone(),
            shown,
            complete: false,
        });
    }

    let mut state = ctx.lock().await;
    if cancel.is_cancelled() {
        return;
    }
    if state
        .reveal
        .as_ref()
        .is_some_and(|r| r.generation == generation)
    {
        state.reveal = None;
    }
    tx.send_replace(RevealFrame {
        target,
        shown: text,
        complete: true,
    });
    debug!("Reveal #{generation} complete");
}
