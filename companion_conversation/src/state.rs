//! Session state shared by the controller and the reveal presenter.

use std::sync::Arc;

use companion_core::{SectionCatalog, StateStore};
use companion_session::TranscriptStore;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::reveal::RevealFrame;

/// Position of a message inside a section's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevealRef {
    pub section_id: String,
    pub index: usize,
}

/// The reveal currently running, if any.
#[derive(Debug)]
pub(crate) struct ActiveReveal {
    pub(crate) target: RevealRef,
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
    pub(crate) frames: watch::Receiver<RevealFrame>,
}

/// Everything one session mutates, updated as a unit under one lock.
pub(crate) struct SessionState<S>
where
    S: Send + Sync,
{
    pub(crate) store: TranscriptStore<S>,
    pub(crate) active_section: Option<String>,
    /// Id of the submission waiting on the service.
    pub(crate) pending: Option<Uuid>,
    pub(crate) reveal: Option<ActiveReveal>,
    pub(crate) reveal_generation: u64,
}

impl<S> SessionState<S>
where
    S: StateStore + Send + Sync,
{
    pub(crate) fn revealing(&self) -> Option<&RevealRef> {
        self.reveal.as_ref().map(|r| &r.target)
    }
}

/// Handle to one session's state. Cloning shares the same session.
pub struct SessionContext<S = Arc<dyn StateStore>>
where
    S: Send + Sync,
{
    catalog: Arc<SectionCatalog>,
    inner: Arc<Mutex<SessionState<S>>>,
}

impl<S> Clone for SessionContext<S>
where
    S: Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SessionContext<S>
where
    S: StateStore + Send + Sync,
{
    /// Rehydrate a session from durable storage.
    ///
    /// Transcripts for sections missing from `catalog` are dropped. The
    /// persisted active section is kept only if the catalog still has it;
    /// otherwise the catalog's default section is used.
    pub async fn load(catalog: Arc<SectionCatalog>, storage: S) -> Self {
        let mut store = TranscriptStore::new(Arc::clone(&catalog), storage);
        store.load().await;

        let active_section = match store.load_active_section().await {
            Some(id) => Some(id),
            None => catalog.default_section().map(|s| s.id.clone()),
        };
        info!("Session loaded, active section: {active_section:?}");

        Self {
            catalog,
            inner: Arc::new(Mutex::new(SessionState {
                store,
                active_section,
                pending: None,
                reveal: None,
                reveal_generation: 0,
            })),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &SectionCatalog {
        &self.catalog
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionState<S>> {
        self.inner.lock().await
    }

    /// Drop the pending marker if it still belongs to `id`.
    pub(crate) async fn release_pending(&self, id: Uuid) {
        let mut state = self.lock().await;
        if state.pending == Some(id) {
            debug!("Releasing abandoned submission {id}");
            state.pending = None;
        }
    }
}
