//! Submission lifecycle for sectioned conversations.
//!
//! A submission runs in two phases. [`SessionController::begin_submit`]
//! validates the query, records it in the section's transcript and marks the
//! session busy. [`SessionController::complete_submit`] takes the service
//! outcome, routes the answer (possibly into another section) and starts the
//! reveal. [`SessionController::submit`] runs both around the service call.

use std::sync::Arc;
use std::time::Duration;

use companion_core::{
    AskError, AskReply, AskRequest, AskService, Message, Section, SectionCatalog, StateStore,
};
use companion_export::{ExportEngine, PaginatedExport, TextExport};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SessionError, ValidationError};
use crate::reveal::{RevealFrame, RevealPresenter};
use crate::state::{RevealRef, SessionContext, SessionState};

/// Receipt for a submission that is waiting on the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitHandle {
    id: Uuid,
    section_id: String,
    query: String,
}

impl SubmitHandle {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Section the query was submitted under.
    #[must_use]
    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    /// The trimmed query text.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn request(&self) -> AskRequest {
        AskRequest {
            prompt: self.query.clone(),
            current_section: self.section_id.clone(),
        }
    }
}

/// Where the assistant answer of a submission ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Answered in the section it was asked in.
    Answered { section_id: String, index: usize },
    /// Moved to another section, which is now active.
    Redirected {
        from: String,
        to: String,
        index: usize,
    },
}

impl SubmitOutcome {
    /// Section holding the assistant answer.
    #[must_use]
    pub fn section_id(&self) -> &str {
        match self {
            Self::Answered { section_id, .. } => section_id,
            Self::Redirected { to, .. } => to,
        }
    }

    #[must_use]
    pub fn answer_ref(&self) -> RevealRef {
        match self {
            Self::Answered { section_id, index } => RevealRef {
                section_id: section_id.clone(),
                index: *index,
            },
            Self::Redirected { to, index, .. } => RevealRef {
                section_id: to.clone(),
                index: *index,
            },
        }
    }
}

/// How a successful reply is filed.
enum Route {
    Same,
    Redirect(String),
}

/// Releases the pending marker if a `submit` future is dropped mid-call.
struct PendingGuard<S>
where
    S: StateStore + Send + Sync + 'static,
{
    ctx: SessionContext<S>,
    id: Option<Uuid>,
}

impl<S> PendingGuard<S>
where
    S: StateStore + Send + Sync + 'static,
{
    fn disarm(&mut self) {
        self.id = None;
    }
}

impl<S> Drop for PendingGuard<S>
where
    S: StateStore + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let ctx = self.ctx.clone();
            runtime.spawn(async move { ctx.release_pending(id).await });
        }
    }
}

/// Drives submissions, section switches, clears and exports for one session.
pub struct SessionController<A = Arc<dyn AskService>, S = Arc<dyn StateStore>>
where
    A: Send + Sync,
    S: Send + Sync,
{
    ctx: SessionContext<S>,
    service: A,
    presenter: RevealPresenter<S>,
    exporter: ExportEngine,
}

impl<A, S> SessionController<A, S>
where
    A: AskService + Send + Sync,
    S: StateStore + Send + Sync + 'static,
{
    pub fn new(
        ctx: SessionContext<S>,
        service: A,
        reveal_tick: Duration,
        exporter: ExportEngine,
    ) -> Self {
        let presenter = RevealPresenter::new(ctx.clone(), reveal_tick);
        Self {
            ctx,
            service,
            presenter,
            exporter,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &SessionContext<S> {
        &self.ctx
    }

    #[must_use]
    pub fn catalog(&self) -> &SectionCatalog {
        self.ctx.catalog()
    }

    fn section(&self, section_id: &str) -> Result<&Section, ValidationError> {
        self.ctx
            .catalog()
            .get(section_id)
            .ok_or_else(|| ValidationError::UnknownSection(section_id.to_string()))
    }

    /// Submit a query and wait for the service to settle it.
    pub async fn submit(
        &self,
        section_id: &str,
        query: &str,
    ) -> Result<SubmitOutcome, SessionError> {
        let handle = self.begin_submit(section_id, query).await?;
        let mut guard = PendingGuard {
            ctx: self.ctx.clone(),
            id: Some(handle.id),
        };

        let outcome = self.service.ask(&handle.request()).await;

        guard.disarm();
        self.complete_submit(handle, outcome).await
    }

    /// Phase one: validate, record the user message, mark the session busy.
    ///
    /// Any running reveal is cancelled. Nothing changes when validation fails.
    pub async fn begin_submit(
        &self,
        section_id: &str,
        query: &str,
    ) -> Result<SubmitHandle, SessionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        self.section(section_id)?;

        let mut state = self.ctx.lock().await;
        if state.pending.is_some() {
            debug!("Rejecting submission to {section_id}: request pending");
            return Err(ValidationError::RequestPending.into());
        }

        RevealPresenter::<S>::cancel_locked(&mut state);
        state
            .store
            .append(section_id, Message::user(query))
            .await
            .ok_or_else(|| ValidationError::UnknownSection(section_id.to_string()))?;

        let handle = SubmitHandle {
            id: Uuid::now_v7(),
            section_id: section_id.to_string(),
            query: query.to_string(),
        };
        state.pending = Some(handle.id);
        info!("Submitted query {} in section {section_id}", handle.id);
        Ok(handle)
    }

    /// Phase two: file the service outcome for `handle`.
    ///
    /// The session is no longer busy afterwards, whatever the outcome. On
    /// failure the user message stays in its transcript without an answer.
    pub async fn complete_submit(
        &self,
        handle: SubmitHandle,
        outcome: Result<AskReply, AskError>,
    ) -> Result<SubmitOutcome, SessionError> {
        let mut state = self.ctx.lock().await;
        if state.pending != Some(handle.id) {
            return Err(ValidationError::StaleHandle.into());
        }
        state.pending = None;

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Query {} failed: {e}", handle.id);
                return Err(e.into());
            }
        };

        let route = self.route(&handle, &reply)?;
        let SubmitHandle {
            section_id, query, ..
        } = handle;
        let answer = reply.response;

        let outcome = match route {
            Route::Same => {
                let len =
                    append(&mut state, &section_id, Message::assistant(answer.clone())).await?;
                SubmitOutcome::Answered {
                    section_id,
                    index: len - 1,
                }
            }
            Route::Redirect(target) => {
                info!("Redirecting query from {section_id} to {target}");
                append(&mut state, &target, Message::user(query)).await?;
                let len = append(&mut state, &target, Message::assistant(answer.clone())).await?;
                state.active_section = Some(target.clone());
                state.store.save_active_section(&target).await;
                SubmitOutcome::Redirected {
                    from: section_id,
                    to: target,
                    index: len - 1,
                }
            }
        };

        self.presenter.start(&mut state, outcome.answer_ref(), answer);
        Ok(outcome)
    }

    /// Decide where a reply goes. The service's choice of section is final,
    /// except that a section this client does not know falls back to the
    /// section the query was asked in.
    fn route(&self, handle: &SubmitHandle, reply: &AskReply) -> Result<Route, SessionError> {
        if !reply.redirect {
            return Ok(Route::Same);
        }
        let Some(target) = reply.section.as_deref() else {
            return Err(SessionError::MalformedResponse(
                "redirect without a target section".to_string(),
            ));
        };
        if target == handle.section_id {
            return Ok(Route::Same);
        }
        if !self.ctx.catalog().contains(target) {
            warn!(
                "Service redirected to unknown section {target:?}; keeping answer in {}",
                handle.section_id
            );
            return Ok(Route::Same);
        }
        Ok(Route::Redirect(target.to_string()))
    }

    /// Make `section_id` the active section. Any running reveal is abandoned.
    pub async fn switch_section(&self, section_id: &str) -> Result<(), SessionError> {
        self.section(section_id)?;
        let mut state = self.ctx.lock().await;
        RevealPresenter::<S>::cancel_locked(&mut state);
        if state.active_section.as_deref() != Some(section_id) {
            info!("Switching to section {section_id}");
            state.active_section = Some(section_id.to_string());
        }
        state.store.save_active_section(section_id).await;
        Ok(())
    }

    /// Empty one section's transcript. Other sections are untouched.
    pub async fn clear(&self, section_id: &str) -> Result<(), SessionError> {
        self.section(section_id)?;
        let mut state = self.ctx.lock().await;
        if state
            .revealing()
            .is_some_and(|r| r.section_id == section_id)
        {
            RevealPresenter::<S>::cancel_locked(&mut state);
        }
        state.store.clear(section_id).await;
        info!("Cleared section {section_id}");
        Ok(())
    }

    /// Persisted messages of a section.
    pub async fn snapshot(&self, section_id: &str) -> Vec<Message> {
        self.ctx.lock().await.store.snapshot(section_id)
    }

    /// Messages of a section as they should be displayed: while the last
    /// message is being revealed it carries only the text shown so far.
    pub async fn view(&self, section_id: &str) -> Vec<Message> {
        let state = self.ctx.lock().await;
        let mut messages = state.store.snapshot(section_id);
        if let Some(active) = &state.reveal {
            let target = &active.target;
            if target.section_id == section_id && target.index + 1 == messages.len() {
                messages[target.index].content = active.frames.borrow().shown.clone();
            }
        }
        messages
    }

    pub async fn active_section(&self) -> Option<String> {
        self.ctx.lock().await.active_section.clone()
    }

    pub async fn is_pending(&self) -> bool {
        self.ctx.lock().await.pending.is_some()
    }

    /// The message currently being revealed.
    pub async fn revealing(&self) -> Option<RevealRef> {
        self.ctx.lock().await.revealing().cloned()
    }

    /// Frames of the running reveal, for presentation layers.
    pub async fn reveal_frames(&self) -> Option<watch::Receiver<RevealFrame>> {
        self.ctx
            .lock()
            .await
            .reveal
            .as_ref()
            .map(|r| r.frames.clone())
    }

    /// Abandon the running reveal without other changes.
    pub async fn cancel_reveal(&self) -> bool {
        self.presenter.cancel().await
    }

    /// Set when the state store failed and the session went memory-only.
    pub async fn persistence_status(&self) -> Option<SessionError> {
        self.ctx
            .lock()
            .await
            .store
            .persistence_degraded()
            .map(|reason| SessionError::Persistence(reason.to_string()))
    }

    pub async fn export_text(&self, section_id: &str) -> Result<TextExport, SessionError> {
        let section = self.section(section_id)?;
        let messages = self.snapshot(section_id).await;
        Ok(self.exporter.export_text(section, &messages))
    }

    pub async fn export_paginated(
        &self,
        section_id: &str,
    ) -> Result<PaginatedExport, SessionError> {
        let section = self.section(section_id)?;
        let messages = self.snapshot(section_id).await;
        Ok(self.exporter.export_paginated(section, &messages))
    }
}

async fn append<S>(
    state: &mut SessionState<S>,
    section_id: &str,
    message: Message,
) -> Result<usize, SessionError>
where
    S: StateStore + Send + Sync,
{
    state
        .store
        .append(section_id, message)
        .await
        .ok_or_else(|| ValidationError::UnknownSection(section_id.to_string()).into())
}
