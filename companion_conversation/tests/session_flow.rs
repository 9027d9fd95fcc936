//! End-to-end tests for the session controller.
//!
//! These tests verify that:
//! - user queries are recorded before the service answers, and survive failures
//! - redirects file the exchange under the target section and switch to it
//! - only one request can be in flight
//! - reveals never alter persisted text and can be interrupted safely
//! - startup drops state for sections that no longer exist

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use companion_conversation::{
    RevealRef, SessionContext, SessionController, SessionError, SubmitOutcome, ValidationError,
};
use companion_core::{
    AskError, AskReply, AskRequest, AskService, Message, Role, SectionCatalog, StateStore,
    TranscriptMap,
};
use companion_export::{ExportEngine, PageLayout};
use companion_session::MemoryStateStore;
use tokio::sync::Notify;

const TICK: Duration = Duration::from_millis(10);

/// `AskService` answering from a script, optionally holding each call until
/// the gate is opened.
#[derive(Default)]
struct ScriptedService {
    replies: Mutex<VecDeque<Result<AskReply, AskError>>>,
    requests: Mutex<Vec<AskRequest>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedService {
    fn new(replies: Vec<Result<AskReply, AskError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    fn gated(replies: Vec<Result<AskReply, AskError>>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
            gate: Some(gate),
        })
    }

    fn requests(&self) -> Vec<AskRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AskService for ScriptedService {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AskError::Transport("no scripted reply".into())))
    }
}

type Controller = SessionController<Arc<ScriptedService>, Arc<MemoryStateStore>>;

async fn controller_ticking(
    backend: Arc<MemoryStateStore>,
    service: Arc<ScriptedService>,
    tick: Duration,
) -> Controller {
    let ctx = SessionContext::load(Arc::new(SectionCatalog::builtin()), backend).await;
    SessionController::new(ctx, service, tick, ExportEngine::utc(PageLayout::default()))
}

async fn controller_with(
    backend: Arc<MemoryStateStore>,
    service: Arc<ScriptedService>,
) -> Controller {
    controller_ticking(backend, service, TICK).await
}

async fn controller(service: Arc<ScriptedService>) -> (Controller, Arc<MemoryStateStore>) {
    let backend = Arc::new(MemoryStateStore::new());
    (controller_with(backend.clone(), service).await, backend)
}

fn roles_and_text(messages: &[Message]) -> Vec<(Role, &str)> {
    messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect()
}

async fn wait_until_idle(controller: &Controller) {
    for _ in 0..100 {
        if !controller.is_pending().await {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("submission was never released");
}

#[tokio::test]
async fn successful_submissions_only_ever_append() {
    let service = ScriptedService::new(vec![
        Ok(AskReply::answer("Eight glasses is a fine rule of thumb.")),
        Ok(AskReply::answer("Seven to nine hours.")),
    ]);
    let (controller, _) = controller(service.clone()).await;

    controller.submit("health", "How much water?").await.unwrap();
    let first = controller.snapshot("health").await;

    let outcome = controller.submit("health", "  How much sleep?  ").await.unwrap();
    let second = controller.snapshot("health").await;

    assert_eq!(
        outcome,
        SubmitOutcome::Answered {
            section_id: "health".into(),
            index: 3
        }
    );
    assert_eq!(second.len(), 4);
    assert_eq!(&second[..2], &first[..]);
    assert_eq!(second[2].content, "How much sleep?");
    assert!(second.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let sent = service.requests();
    assert_eq!(sent[1].prompt, "How much sleep?");
    assert_eq!(sent[1].current_section, "health");
}

#[tokio::test]
async fn failed_call_keeps_the_user_message() {
    let service = ScriptedService::new(vec![Err(AskError::Transport("connection refused".into()))]);
    let (controller, backend) = controller(service).await;

    let err = controller.submit("health", "X").await.unwrap_err();

    assert!(matches!(err, SessionError::Transport(_)));
    assert!(err.is_retryable());
    assert_eq!(err.user_notice(), "Failed to reach the service. Please try again.");
    assert!(!controller.is_pending().await);
    assert!(controller.revealing().await.is_none());

    let health = controller.snapshot("health").await;
    assert_eq!(roles_and_text(&health), vec![(Role::User, "X")]);

    let persisted = backend.read_transcripts().await.unwrap().unwrap();
    assert_eq!(persisted["health"].len(), 1);
}

#[tokio::test]
async fn non_success_status_is_a_transport_failure() {
    let service = ScriptedService::new(vec![Err(AskError::Status {
        status: 500,
        message: "Server error".into(),
    })]);
    let (controller, _) = controller(service).await;

    let err = controller.submit("music", "jazz?").await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(AskError::Status { status: 500, .. })));
    assert_eq!(controller.snapshot("music").await.len(), 1);
}

#[tokio::test]
async fn redirect_files_exchange_under_target_section() {
    let service = ScriptedService::new(vec![Ok(AskReply::redirect("banking", "Y"))]);
    let (controller, backend) = controller(service.clone()).await;
    assert_eq!(controller.active_section().await.as_deref(), Some("general"));

    let outcome = controller.submit("general", "X").await.unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Redirected {
            from: "general".into(),
            to: "banking".into(),
            index: 1
        }
    );
    assert_eq!(
        roles_and_text(&controller.snapshot("banking").await),
        vec![(Role::User, "X"), (Role::Assistant, "Y")]
    );
    assert_eq!(
        roles_and_text(&controller.snapshot("general").await),
        vec![(Role::User, "X")]
    );
    assert_eq!(controller.active_section().await.as_deref(), Some("banking"));
    assert_eq!(
        controller.revealing().await,
        Some(RevealRef {
            section_id: "banking".into(),
            index: 1
        })
    );
    assert_eq!(service.requests()[0].current_section, "general");
    assert_eq!(
        backend.read_active_section().await.unwrap().as_deref(),
        Some("banking")
    );
}

#[tokio::test]
async fn redirect_to_own_section_is_a_plain_answer() {
    let service = ScriptedService::new(vec![Ok(AskReply::redirect("movies", "Try Heat."))]);
    let (controller, _) = controller(service).await;

    let outcome = controller.submit("movies", "best heist film?").await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::Answered { index: 1, .. }));
    assert_eq!(controller.snapshot("movies").await.len(), 2);
}

#[tokio::test]
async fn redirect_to_unknown_section_stays_in_origin() {
    let service =
        ScriptedService::new(vec![Ok(AskReply::redirect("astrology", "Mercury is fine."))]);
    let (controller, _) = controller(service).await;

    let outcome = controller.submit("general", "is mercury retrograde?").await.unwrap();

    assert_eq!(outcome.section_id(), "general");
    assert_eq!(
        roles_and_text(&controller.snapshot("general").await),
        vec![
            (Role::User, "is mercury retrograde?"),
            (Role::Assistant, "Mercury is fine.")
        ]
    );
    assert_eq!(controller.active_section().await.as_deref(), Some("general"));
}

#[tokio::test]
async fn redirect_without_target_is_malformed() {
    let service = ScriptedService::new(vec![Ok(AskReply {
        response: "?".into(),
        redirect: true,
        section: None,
    })]);
    let (controller, _) = controller(service).await;

    let err = controller.submit("music", "hi").await.unwrap_err();

    assert!(matches!(err, SessionError::MalformedResponse(_)));
    assert!(!controller.is_pending().await);
    assert_eq!(controller.snapshot("music").await.len(), 1);
}

#[tokio::test]
async fn empty_query_is_rejected_without_side_effects() {
    let service = ScriptedService::new(vec![]);
    let (controller, backend) = controller(service.clone()).await;

    let err = controller.submit("health", "   \n").await.unwrap_err();

    assert_eq!(err, SessionError::Validation(ValidationError::EmptyQuery));
    assert!(controller.snapshot("health").await.is_empty());
    assert!(service.requests().is_empty());
    assert!(backend.read_transcripts().await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_section_is_rejected() {
    let (controller, _) = controller(ScriptedService::new(vec![])).await;
    let err = controller.submit("cooking", "pasta?").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Validation(ValidationError::UnknownSection("cooking".into()))
    );
}

#[tokio::test]
async fn second_begin_while_pending_is_rejected() {
    let (controller, _) = controller(ScriptedService::new(vec![])).await;

    let handle = controller.begin_submit("movies", "first").await.unwrap();
    let before = controller.snapshot("movies").await;

    let err = controller.begin_submit("movies", "second").await.unwrap_err();
    assert_eq!(err, SessionError::Validation(ValidationError::RequestPending));
    assert_eq!(controller.snapshot("movies").await, before);

    controller
        .complete_submit(handle, Ok(AskReply::answer("ok")))
        .await
        .unwrap();
    assert!(controller.begin_submit("movies", "third").await.is_ok());
}

#[tokio::test]
async fn concurrent_submit_issues_no_second_call() {
    let gate = Arc::new(Notify::new());
    let service = ScriptedService::gated(vec![Ok(AskReply::answer("done"))], gate.clone());
    let (controller, _) = controller(service.clone()).await;
    let controller = Arc::new(controller);

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.submit("health", "first").await }
    });
    while service.requests().is_empty() {
        tokio::task::yield_now().await;
    }

    let err = controller.submit("health", "second").await.unwrap_err();
    assert_eq!(err, SessionError::Validation(ValidationError::RequestPending));
    assert_eq!(
        roles_and_text(&controller.snapshot("health").await),
        vec![(Role::User, "first")]
    );

    gate.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(service.requests().len(), 1);
    assert_eq!(controller.snapshot("health").await.len(), 2);
}

#[tokio::test]
async fn stale_handle_is_rejected() {
    let (controller, _) = controller(ScriptedService::new(vec![])).await;

    let handle = controller.begin_submit("music", "q").await.unwrap();
    controller
        .complete_submit(handle.clone(), Err(AskError::Transport("down".into())))
        .await
        .unwrap_err();

    let err = controller
        .complete_submit(handle, Ok(AskReply::answer("late")))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Validation(ValidationError::StaleHandle));
    assert_eq!(controller.snapshot("music").await.len(), 1);
}

#[tokio::test]
async fn abandoned_submit_releases_pending() {
    let gate = Arc::new(Notify::new());
    let service = ScriptedService::gated(vec![], gate);
    let (controller, _) = controller(service).await;

    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), controller.submit("health", "slow?")).await;
    assert!(timed_out.is_err());

    wait_until_idle(&controller).await;
    assert_eq!(controller.snapshot("health").await.len(), 1);
}

#[tokio::test]
async fn clear_only_touches_one_section() {
    let service = ScriptedService::new(vec![
        Ok(AskReply::answer("a")),
        Ok(AskReply::answer("b")),
    ]);
    let (controller, backend) = controller(service).await;
    controller.submit("movies", "one").await.unwrap();
    controller.submit("music", "two").await.unwrap();

    controller.clear("movies").await.unwrap();

    assert!(controller.snapshot("movies").await.is_empty());
    assert_eq!(controller.snapshot("music").await.len(), 2);
    let persisted = backend.read_transcripts().await.unwrap().unwrap();
    assert_eq!(persisted.get("movies").map(Vec::len), Some(0));
    assert_eq!(persisted["music"].len(), 2);
}

#[tokio::test]
async fn exports_are_idempotent() {
    let service = ScriptedService::new(vec![Ok(AskReply::answer("Kind of Blue."))]);
    let (controller, _) = controller(service).await;
    controller.submit("music", "best jazz album?").await.unwrap();

    let a = controller.export_text("music").await.unwrap();
    let b = controller.export_text("music").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.file_name, "music_chat.txt");
    assert!(a.content.contains("] You: best jazz album?\n\n["));
    assert!(a.content.contains("] Assistant: Kind of Blue."));

    let p1 = controller.export_paginated("music").await.unwrap();
    let p2 = controller.export_paginated("music").await.unwrap();
    assert_eq!(p1.file_name, "music_chat.pdf");
    assert_eq!(p1.to_pdf(), p2.to_pdf());
}

#[tokio::test]
async fn load_drops_unknown_sections_and_active_id() {
    let mut stored = TranscriptMap::new();
    stored.insert("health".into(), vec![Message::user("old question")]);
    stored.insert("astrology".into(), vec![Message::user("stars?")]);
    let backend = Arc::new(MemoryStateStore::with_records(
        Some("astrology".into()),
        Some(stored),
    ));
    let service = ScriptedService::new(vec![Ok(AskReply::answer("fine"))]);

    let controller = controller_with(backend.clone(), service).await;

    assert!(controller.snapshot("astrology").await.is_empty());
    assert_eq!(controller.snapshot("health").await.len(), 1);
    assert_eq!(controller.active_section().await.as_deref(), Some("general"));

    controller.submit("health", "new question").await.unwrap();
    let persisted = backend.read_transcripts().await.unwrap().unwrap();
    assert!(!persisted.contains_key("astrology"));
    assert_eq!(persisted["health"].len(), 3);
}

#[tokio::test]
async fn state_survives_reload() {
    let backend = Arc::new(MemoryStateStore::new());
    let service = ScriptedService::new(vec![Ok(AskReply::redirect("music", "Try lo-fi."))]);
    let controller = controller_with(backend.clone(), service).await;
    controller.submit("general", "study playlist?").await.unwrap();

    let reloaded = controller_with(backend, ScriptedService::new(vec![])).await;

    assert_eq!(reloaded.active_section().await.as_deref(), Some("music"));
    assert_eq!(
        reloaded.snapshot("music").await,
        controller.snapshot("music").await
    );
    assert_eq!(reloaded.snapshot("general").await.len(), 1);
}

#[tokio::test]
async fn unwritable_store_degrades_to_memory_only() {
    let backend = Arc::new(MemoryStateStore::new());
    backend.fail_writes(true);
    let service = ScriptedService::new(vec![Ok(AskReply::answer("still here"))]);
    let controller = controller_with(backend.clone(), service).await;

    assert!(controller.persistence_status().await.is_none());
    controller.submit("banking", "budget?").await.unwrap();

    assert_eq!(controller.snapshot("banking").await.len(), 2);
    assert!(matches!(
        controller.persistence_status().await,
        Some(SessionError::Persistence(_))
    ));
    assert!(backend.read_transcripts().await.unwrap().is_none());
}

#[tokio::test]
async fn switch_section_persists_and_validates() {
    let (controller, backend) = controller(ScriptedService::new(vec![])).await;

    controller.switch_section("movies").await.unwrap();
    assert_eq!(controller.active_section().await.as_deref(), Some("movies"));
    assert_eq!(
        backend.read_active_section().await.unwrap().as_deref(),
        Some("movies")
    );

    assert!(controller.switch_section("cooking").await.is_err());
    assert_eq!(controller.active_section().await.as_deref(), Some("movies"));
}

#[tokio::test(start_paused = true)]
async fn reveal_runs_to_completion_and_clears_ref() {
    let text = "Hello there";
    let service = ScriptedService::new(vec![Ok(AskReply::answer(text))]);
    let (controller, _) = controller(service).await;

    controller.submit("general", "hi").await.unwrap();
    let mut frames = controller.reveal_frames().await.unwrap();

    let shown = controller.view("general").await[1].content.clone();
    assert!(text.starts_with(&shown));
    assert!(shown.len() < text.len());
    assert_eq!(controller.snapshot("general").await[1].content, text);

    frames.wait_for(|f| f.shown.chars().count() >= 3).await.unwrap();
    let partial = controller.view("general").await[1].content.clone();
    assert!(text.starts_with(&partial));

    frames.wait_for(|f| f.complete).await.unwrap();
    assert!(controller.revealing().await.is_none());
    assert_eq!(controller.view("general").await, controller.snapshot("general").await);
}

#[tokio::test(start_paused = true)]
async fn new_submit_interrupts_reveal_without_touching_text() {
    let first = "A rather long first answer about music theory.";
    let service = ScriptedService::new(vec![
        Ok(AskReply::answer(first)),
        Ok(AskReply::answer("Short.")),
    ]);
    let (controller, _) = controller(service).await;

    controller.submit("music", "q1").await.unwrap();
    let mut old_frames = controller.reveal_frames().await.unwrap();
    old_frames.wait_for(|f| !f.shown.is_empty()).await.unwrap();

    controller.submit("music", "q2").await.unwrap();

    assert_eq!(
        controller.revealing().await,
        Some(RevealRef {
            section_id: "music".into(),
            index: 3
        })
    );
    while old_frames.changed().await.is_ok() {
        assert!(!old_frames.borrow().complete);
    }

    let music = controller.snapshot("music").await;
    assert_eq!(music[1].content, first);
    assert_eq!(controller.view("music").await[1].content, first);

    if let Some(mut frames) = controller.reveal_frames().await {
        frames.wait_for(|f| f.complete).await.unwrap();
    }
    assert!(controller.revealing().await.is_none());
    assert_eq!(controller.view("music").await, music);
}

#[tokio::test(start_paused = true)]
async fn clear_and_switch_cancel_the_reveal() {
    let service = ScriptedService::new(vec![
        Ok(AskReply::answer("first answer")),
        Ok(AskReply::answer("second answer")),
    ]);
    let (controller, _) = controller(service).await;

    controller.submit("health", "a").await.unwrap();
    assert!(controller.revealing().await.is_some());
    controller.clear("health").await.unwrap();
    assert!(controller.revealing().await.is_none());
    assert!(controller.view("health").await.is_empty());

    controller.submit("banking", "b").await.unwrap();
    let mut frames = controller.reveal_frames().await.unwrap();
    controller.switch_section("movies").await.unwrap();
    assert!(controller.revealing().await.is_none());
    while frames.changed().await.is_ok() {
        assert!(!frames.borrow().complete);
    }
    assert_eq!(controller.snapshot("banking").await[1].content, "second answer");
}

#[tokio::test]
async fn zero_tick_shows_answer_at_once() {
    let service = ScriptedService::new(vec![
        Ok(AskReply::answer("hello")),
        Ok(AskReply::answer("hello again")),
    ]);
    let backend = Arc::new(MemoryStateStore::new());
    let controller = controller_ticking(backend, service, Duration::ZERO).await;

    controller.submit("general", "hi").await.unwrap();

    assert!(controller.revealing().await.is_none());
    assert!(controller.reveal_frames().await.is_none());
    assert_eq!(
        controller.view("general").await,
        controller.snapshot("general").await
    );

    controller.submit("general", "hi again").await.unwrap();
    assert_eq!(controller.snapshot("general").await[3].content, "hello again");
}
