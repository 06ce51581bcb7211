//! Embedded stand-in for the hosted messaging service.
//!
//! It honors the collaborator contract (one-shot readiness, idempotent
//! conversation fetch-or-create, mountable surface) without any transport.
//! The surface it hands out renders a static conversation card; message
//! history belongs to the real service and is out of scope here.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ratatui::layout::Rect;
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use tokio::sync::watch;

use crate::identity::UserIdentity;

use super::{
    BoxFuture, ChatProvider, ChatSession, ChatSurface, ConversationHandle, ConversationId,
    UserHandle,
};

/// Simulated service bootstrap time, matching roughly what a hosted SDK
/// takes to come up.
pub const DEFAULT_READY_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Default)]
struct ConversationState {
    /// Participants keyed by user id, so re-registering is a no-op.
    participants: BTreeMap<String, UserHandle>,
}

type ConversationMap = BTreeMap<ConversationId, ConversationState>;
type ConversationStore = Arc<Mutex<ConversationMap>>;

fn lock_store(store: &ConversationStore) -> MutexGuard<'_, ConversationMap> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LocalProvider {
    ready_rx: watch::Receiver<bool>,
    conversations: ConversationStore,
}

impl LocalProvider {
    /// Spawns the simulated bootstrap; [`ChatProvider::ready`] resolves once
    /// `delay` elapses. Needs a running tokio runtime.
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tx.send_replace(true);
            tracing::debug!("demo messaging service is ready");
        });
        Self {
            ready_rx: rx,
            conversations: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    #[cfg(test)]
    fn conversation_count(&self) -> usize {
        lock_store(&self.conversations).len()
    }

    #[cfg(test)]
    fn participant_count(&self, id: &ConversationId) -> usize {
        lock_store(&self.conversations)
            .get(id)
            .map_or(0, |state| state.participants.len())
    }
}

impl ChatProvider for LocalProvider {
    fn ready(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.ready_rx.clone();
        Box::pin(async move {
            // Err only when the bootstrap task is gone, and it never drops
            // the sender before flipping the flag.
            let _ = rx.wait_for(|ready| *ready).await;
        })
    }

    fn user(&self, identity: &UserIdentity) -> UserHandle {
        UserHandle::from_identity(identity)
    }

    fn session(&self, app_key: &str, me: UserHandle) -> Box<dyn ChatSession> {
        tracing::debug!(user = %me.id, "opened chat session");
        Box::new(LocalSession {
            app_key: app_key.to_string(),
            me,
            conversations: Arc::clone(&self.conversations),
            destroyed: false,
        })
    }
}

struct LocalSession {
    app_key: String,
    me: UserHandle,
    conversations: ConversationStore,
    destroyed: bool,
}

impl ChatSession for LocalSession {
    fn get_or_create_conversation(&mut self, id: &ConversationId) -> ConversationHandle {
        lock_store(&self.conversations).entry(id.clone()).or_default();
        ConversationHandle::new(id.clone())
    }

    fn set_participant(&mut self, conversation: &ConversationHandle, user: &UserHandle) {
        let mut store = lock_store(&self.conversations);
        let state = store.entry(conversation.id().clone()).or_default();
        state.participants.insert(user.id.clone(), user.clone());
    }

    fn create_chatbox(&mut self) -> Box<dyn ChatSurface> {
        Box::new(LocalChatbox {
            app_key: self.app_key.clone(),
            me: self.me.clone(),
            conversations: Arc::clone(&self.conversations),
            selected: None,
            mounted: false,
        })
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        tracing::debug!(user = %self.me.id, "released chat session");
    }
}

struct LocalChatbox {
    app_key: String,
    me: UserHandle,
    conversations: ConversationStore,
    selected: Option<ConversationHandle>,
    mounted: bool,
}

impl ChatSurface for LocalChatbox {
    fn select(&mut self, conversation: &ConversationHandle) {
        self.selected = Some(conversation.clone());
    }

    fn mount(&mut self) {
        self.mounted = true;
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn render(&mut self, frame: &mut Frame<'_>, area: Rect) {
        if !self.mounted {
            return;
        }
        let Some(conversation) = &self.selected else {
            return;
        };

        let block = Block::default()
            .title(format!(" {} ", conversation.id().as_str()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut lines = Vec::new();
        let store = lock_store(&self.conversations);
        if let Some(state) = store.get(conversation.id()) {
            for user in state.participants.values() {
                let marker = if user.id == self.me.id { " (you)" } else { "" };
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("• {}{marker}", user.display_name),
                        Style::default().fg(Color::White),
                    ),
                    Span::styled(
                        format!("  {}", user.role.display_name()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]));
            }
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "Messages live in the hosted service; this demo surface only shows the room.",
            Style::default().fg(Color::DarkGray).italic(),
        )));
        lines.push(Line::from(Span::styled(
            format!("app {}", self.app_key),
            Style::default().fg(Color::DarkGray),
        )));

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}
