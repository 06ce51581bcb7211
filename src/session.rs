//! Lifecycle of one collaborator session for a fixed identity pair.
//!
//! All controller methods run on the UI event loop. The only background
//! work is the readiness wait spawned by [`SessionController::begin_init`],
//! which owns nothing and reports back through the app event channel; every
//! session object is constructed and released on the loop itself, so no
//! handle is ever touched from two tasks at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::identity::UserIdentity;
use crate::provider::{ChatProvider, ChatSession, ChatSurface, ConversationId, UserHandle};
use crate::tui::AppEvent;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the collaborator readiness signal, or parked there for
    /// good after a missing application key.
    Uninitialized,
    /// Session and both user handles exist; the chat can be opened.
    Ready,
    /// A chat surface is mounted on top of the ready session.
    Open,
    /// Session released. Terminal; the controller must not be reused.
    TornDown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No application key was available when the collaborator became ready.
    #[error("chat application key is not configured (set CHARLA_APP_KEY, --app-key, or the config file)")]
    ConfigurationMissing,
    /// The chat was opened before the session reached `Ready`.
    #[error("chat is still initializing, try again shortly")]
    NotReady,
}

pub struct SessionController {
    provider: Arc<dyn ChatProvider>,
    app_key: Option<String>,
    me: UserIdentity,
    other: UserIdentity,
    state: ControllerState,
    /// Bumped on every `begin_init`. Readiness events carry the value of the
    /// attempt that spawned them; anything older is stale and ignored.
    generation: u64,
    /// Cancellation flag shared with the in-flight readiness wait.
    cancel: Option<Arc<AtomicBool>>,
    init_task: Option<JoinHandle<()>>,
    me_handle: Option<UserHandle>,
    other_handle: Option<UserHandle>,
    session: Option<Box<dyn ChatSession>>,
    surface: Option<Box<dyn ChatSurface>>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        app_key: Option<String>,
        me: UserIdentity,
        other: UserIdentity,
    ) -> Self {
        Self {
            provider,
            app_key,
            me,
            other,
            state: ControllerState::Uninitialized,
            generation: 0,
            cancel: None,
            init_task: None,
            me_handle: None,
            other_handle: None,
            session: None,
            surface: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn me(&self) -> &UserIdentity {
        &self.me
    }

    pub fn other(&self) -> &UserIdentity {
        &self.other
    }

    /// The mounted chat surface, once `open_chat` has succeeded.
    pub fn surface_mut(&mut self) -> Option<&mut (dyn ChatSurface + 'static)> {
        self.surface.as_deref_mut()
    }

    /// Starts (or restarts) initialization for the current identity pair.
    ///
    /// Any previous session is released first, so at most one session is
    /// ever live. The spawned task does nothing but await the collaborator
    /// readiness signal and post [`AppEvent::CollaboratorReady`] tagged with
    /// this attempt's generation; construction happens later, on the event
    /// loop, in [`on_ready`](Self::on_ready).
    pub fn begin_init(&mut self, events: mpsc::UnboundedSender<AppEvent>) {
        self.release();
        self.generation += 1;
        self.state = ControllerState::Uninitialized;

        let cancelled = Arc::new(AtomicBool::new(false));
        self.cancel = Some(Arc::clone(&cancelled));

        let generation = self.generation;
        let ready = self.provider.ready();
        tracing::debug!(
            generation,
            me = %self.me.id,
            other = %self.other.id,
            "waiting for collaborator readiness"
        );
        self.init_task = Some(tokio::spawn(async move {
            ready.await;
            if cancelled.load(Ordering::SeqCst) {
                tracing::debug!(generation, "readiness arrived after teardown, discarding");
                return;
            }
            let _ = events.send(AppEvent::CollaboratorReady { generation });
        }));
    }

    /// Completes initialization when a readiness event arrives.
    ///
    /// Stale events are discarded without effect: the generation must match
    /// the newest attempt and the controller must still be waiting. A
    /// missing application key aborts the attempt and leaves the controller
    /// in `Uninitialized`, which is an error worth surfacing but not fatal
    /// to the app.
    pub fn on_ready(&mut self, generation: u64) -> Result<(), SessionError> {
        if generation != self.generation || self.state != ControllerState::Uninitialized {
            tracing::debug!(
                event_generation = generation,
                current_generation = self.generation,
                state = ?self.state,
                "ignoring stale readiness event"
            );
            return Ok(());
        }

        let Some(app_key) = self.app_key.as_deref().filter(|key| !key.trim().is_empty()) else {
            tracing::error!("chat application key is missing, session will not start");
            return Err(SessionError::ConfigurationMissing);
        };

        let me_handle = self.provider.user(&self.me);
        let other_handle = self.provider.user(&self.other);
        let session = self.provider.session(app_key, me_handle.clone());

        self.me_handle = Some(me_handle);
        self.other_handle = Some(other_handle);
        self.session = Some(session);
        self.state = ControllerState::Ready;
        tracing::info!(me = %self.me.id, other = %self.other.id, "chat session ready");
        Ok(())
    }

    /// Opens the 1:1 conversation and mounts a fresh chat surface.
    ///
    /// Requires a ready session and a mount region the UI has already laid
    /// out; anything less is the soft [`SessionError::NotReady`]. Invoking
    /// it again re-fetches the same conversation, re-registers both
    /// participants, and replaces the surface, all of which the collaborator
    /// treats as no-ops.
    pub fn open_chat(
        &mut self,
        mount_target_available: bool,
    ) -> Result<ConversationId, SessionError> {
        if !matches!(self.state, ControllerState::Ready | ControllerState::Open) {
            return Err(SessionError::NotReady);
        }
        if !mount_target_available {
            return Err(SessionError::NotReady);
        }
        let (Some(session), Some(me), Some(other)) = (
            self.session.as_mut(),
            self.me_handle.as_ref(),
            self.other_handle.as_ref(),
        ) else {
            return Err(SessionError::NotReady);
        };

        let id = self.provider.one_on_one_id(me, other);
        let conversation = session.get_or_create_conversation(&id);
        session.set_participant(&conversation, me);
        session.set_participant(&conversation, other);

        let mut surface = session.create_chatbox();
        surface.select(&conversation);
        surface.mount();

        tracing::info!(conversation = %id, "conversation opened");
        self.surface = Some(surface);
        self.state = ControllerState::Open;
        Ok(id)
    }

    /// Re-targets the controller at a new identity pair.
    ///
    /// The previous session is released immediately; the caller follows up
    /// with [`begin_init`](Self::begin_init) to bring the new pair up.
    pub fn set_identities(&mut self, me: UserIdentity, other: UserIdentity) {
        self.release();
        self.state = ControllerState::Uninitialized;
        self.me = me;
        self.other = other;
    }

    /// Releases the session and invalidates any in-flight readiness wait.
    /// Terminal and idempotent.
    pub fn teardown(&mut self) {
        self.release();
        self.state = ControllerState::TornDown;
    }

    /// Shared release path for teardown, re-init, and identity swaps: flag
    /// the pending readiness wait as cancelled, destroy the session exactly
    /// once, and drop every held handle.
    fn release(&mut self) {
        if let Some(flag) = self.cancel.take() {
            flag.store(true, Ordering::SeqCst);
        }
        // Dropping the handle detaches the wait; the flag above makes it
        // harmless.
        drop(self.init_task.take());
        if let Some(mut session) = self.session.take() {
            session.destroy();
            tracing::debug!(me = %self.me.id, "chat session released");
        }
        self.me_handle = None;
        self.other_handle = None;
        self.surface = None;
    }

    #[cfg(test)]
    fn take_init_task(&mut self) -> Option<JoinHandle<()>> {
        self.init_task.take()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use pretty_assertions::assert_eq;
    use ratatui::layout::Rect;
    use ratatui::Frame;
    use tokio::sync::watch;

    use super::*;
    use crate::identity;
    use crate::provider::{BoxFuture, ConversationHandle};

    /// Counts every contract call so tests can assert exactly what the
    /// controller asked the collaborator to do.
    #[derive(Default)]
    struct Calls {
        sessions_created: AtomicUsize,
        sessions_destroyed: AtomicUsize,
        conversations_fetched: AtomicUsize,
        participants_set: AtomicUsize,
        chatboxes_created: AtomicUsize,
    }

    struct RecordingProvider {
        ready_tx: watch::Sender<bool>,
        calls: Arc<Calls>,
    }

    impl RecordingProvider {
        fn new() -> Self {
            let (ready_tx, _rx) = watch::channel(false);
            Self {
                ready_tx,
                calls: Arc::new(Calls::default()),
            }
        }

        fn make_ready(&self) {
            self.ready_tx.send_replace(true);
        }

        fn count(&self, counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    impl ChatProvider for RecordingProvider {
        fn ready(&self) -> BoxFuture<'static, ()> {
            let mut rx = self.ready_tx.subscribe();
            Box::pin(async move {
                let _ = rx.wait_for(|ready| *ready).await;
            })
        }

        fn user(&self, identity: &UserIdentity) -> UserHandle {
            UserHandle::from_identity(identity)
        }

        fn session(&self, _app_key: &str, _me: UserHandle) -> Box<dyn ChatSession> {
            self.calls.sessions_created.fetch_add(1, Ordering::SeqCst);
            Box::new(RecordingSession {
                calls: Arc::clone(&self.calls),
            })
        }
    }

    struct RecordingSession {
        calls: Arc<Calls>,
    }

    impl ChatSession for RecordingSession {
        fn get_or_create_conversation(&mut self, id: &ConversationId) -> ConversationHandle {
            self.calls.conversations_fetched.fetch_add(1, Ordering::SeqCst);
            ConversationHandle::new(id.clone())
        }

        fn set_participant(&mut self, _conversation: &ConversationHandle, _user: &UserHandle) {
            self.calls.participants_set.fetch_add(1, Ordering::SeqCst);
        }

        fn create_chatbox(&mut self) -> Box<dyn ChatSurface> {
            self.calls.chatboxes_created.fetch_add(1, Ordering::SeqCst);
            Box::new(RecordingSurface { mounted: false })
        }

        fn destroy(&mut self) {
            self.calls.sessions_destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RecordingSurface {
        mounted: bool,
    }

    impl ChatSurface for RecordingSurface {
        fn select(&mut self, _conversation: &ConversationHandle) {}

        fn mount(&mut self) {
            self.mounted = true;
        }

        fn is_mounted(&self) -> bool {
            self.mounted
        }

        fn render(&mut self, _frame: &mut Frame<'_>, _area: Rect) {}
    }

    fn controller_with(
        provider: &Arc<RecordingProvider>,
        app_key: Option<&str>,
    ) -> SessionController {
        let resolved = identity::resolve(None);
        SessionController::new(
            Arc::clone(provider) as Arc<dyn ChatProvider>,
            app_key.map(str::to_string),
            resolved.me,
            resolved.other,
        )
    }

    /// Flips readiness, joins the wait task, and feeds the resulting event
    /// back into the controller the way the app loop would.
    async fn drive_to_ready(
        controller: &mut SessionController,
        provider: &RecordingProvider,
        rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    ) {
        provider.make_ready();
        controller
            .take_init_task()
            .expect("init task spawned")
            .await
            .expect("readiness wait completes");
        let AppEvent::CollaboratorReady { generation } = rx.try_recv().expect("readiness event")
        else {
            panic!("unexpected event kind");
        };
        controller.on_ready(generation).expect("initialization completes");
    }

    #[tokio::test]
    async fn test_open_chat_before_ready_is_a_soft_failure() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, _rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);

        assert_eq!(controller.open_chat(true), Err(SessionError::NotReady));
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert_eq!(provider.count(&provider.calls.conversations_fetched), 0);
    }

    #[tokio::test]
    async fn test_open_chat_without_mount_region_is_not_ready() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        drive_to_ready(&mut controller, &provider, &mut rx).await;

        assert_eq!(controller.open_chat(false), Err(SessionError::NotReady));
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(provider.count(&provider.calls.conversations_fetched), 0);
    }

    #[tokio::test]
    async fn test_ready_then_open_mounts_a_surface() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        drive_to_ready(&mut controller, &provider, &mut rx).await;
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(provider.count(&provider.calls.sessions_created), 1);

        let conversation = controller.open_chat(true).expect("chat opens");
        assert_eq!(conversation.as_str(), "user1__user2");
        assert_eq!(controller.state(), ControllerState::Open);
        assert_eq!(provider.count(&provider.calls.participants_set), 2);
        assert!(controller
            .surface_mut()
            .is_some_and(|surface| surface.is_mounted()));
    }

    #[tokio::test]
    async fn test_open_chat_twice_refetches_and_reregisters() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        drive_to_ready(&mut controller, &provider, &mut rx).await;

        let first = controller.open_chat(true).expect("first open");
        let second = controller.open_chat(true).expect("second open");

        assert_eq!(first, second);
        assert_eq!(controller.state(), ControllerState::Open);
        assert_eq!(provider.count(&provider.calls.conversations_fetched), 2);
        assert_eq!(provider.count(&provider.calls.participants_set), 4);
        assert_eq!(provider.count(&provider.calls.chatboxes_created), 2);
        assert_eq!(provider.count(&provider.calls.sessions_created), 1);
    }

    #[tokio::test]
    async fn test_teardown_during_readiness_wait_constructs_nothing() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        let wait = controller.take_init_task().expect("init task spawned");

        controller.teardown();
        provider.make_ready();
        wait.await.expect("readiness wait completes");

        assert!(rx.try_recv().is_err(), "no readiness event after teardown");
        assert_eq!(controller.state(), ControllerState::TornDown);
        assert_eq!(provider.count(&provider.calls.sessions_created), 0);
    }

    #[tokio::test]
    async fn test_on_ready_ignores_stale_generations() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, _rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);

        // Generation 0 predates the first attempt.
        controller.on_ready(0).expect("stale event is a no-op");

        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert_eq!(provider.count(&provider.calls.sessions_created), 0);
    }

    #[tokio::test]
    async fn test_missing_app_key_aborts_initialization() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        provider.make_ready();
        controller
            .take_init_task()
            .expect("init task spawned")
            .await
            .expect("readiness wait completes");

        let AppEvent::CollaboratorReady { generation } = rx.try_recv().expect("readiness event")
        else {
            panic!("unexpected event kind");
        };
        assert_eq!(
            controller.on_ready(generation),
            Err(SessionError::ConfigurationMissing)
        );
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert_eq!(provider.count(&provider.calls.sessions_created), 0);
        assert_eq!(controller.open_chat(true), Err(SessionError::NotReady));
    }

    #[tokio::test]
    async fn test_blank_app_key_counts_as_missing() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("   "));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        provider.make_ready();
        controller
            .take_init_task()
            .expect("init task spawned")
            .await
            .expect("readiness wait completes");

        let AppEvent::CollaboratorReady { generation } = rx.try_recv().expect("readiness event")
        else {
            panic!("unexpected event kind");
        };
        assert_eq!(
            controller.on_ready(generation),
            Err(SessionError::ConfigurationMissing)
        );
    }

    #[tokio::test]
    async fn test_teardown_releases_the_session_exactly_once() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx);
        drive_to_ready(&mut controller, &provider, &mut rx).await;
        controller.open_chat(true).expect("chat opens");

        controller.teardown();
        assert_eq!(controller.state(), ControllerState::TornDown);
        assert_eq!(provider.count(&provider.calls.sessions_destroyed), 1);
        assert!(controller.surface_mut().is_none());

        controller.teardown();
        assert_eq!(provider.count(&provider.calls.sessions_destroyed), 1);
        assert_eq!(controller.open_chat(true), Err(SessionError::NotReady));
    }

    #[tokio::test]
    async fn test_identity_swap_releases_previous_session_first() {
        let provider = Arc::new(RecordingProvider::new());
        let mut controller = controller_with(&provider, Some("demo-key"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.begin_init(tx.clone());
        drive_to_ready(&mut controller, &provider, &mut rx).await;
        assert_eq!(provider.count(&provider.calls.sessions_created), 1);

        let resolved = identity::resolve(Some("user2"));
        controller.set_identities(resolved.me, resolved.other);
        assert_eq!(provider.count(&provider.calls.sessions_destroyed), 1);
        assert_eq!(controller.state(), ControllerState::Uninitialized);

        controller.begin_init(tx);
        drive_to_ready(&mut controller, &provider, &mut rx).await;
        assert_eq!(provider.count(&provider.calls.sessions_created), 2);
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(controller.me().id, "user2");

        let conversation = controller.open_chat(true).expect("chat opens");
        assert_eq!(conversation.as_str(), "user1__user2");
    }
}
