use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::identity::{self, ResolvedIdentities};
use crate::provider::ChatProvider;
use crate::session::{ControllerState, SessionController, SessionError};
use crate::tui::AppEvent;

/// How a footer notice should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

/// Application state. The identity pair itself lives on the controller;
/// the app keeps only what the chrome needs.
pub struct App {
    pub should_quit: bool,
    /// Window label describing who this instance acts as.
    pub label: String,
    pub controller: SessionController,
    /// Latest footer notice, if any.
    pub notice: Option<Notice>,
    /// Region the chat surface mounts into, updated during render. `None`
    /// until the first frame has laid the screen out.
    pub mount_area: Option<Rect>,
    /// 0-2, drives the ellipsis animation while waiting for readiness.
    pub animation_frame: u8,
    events_tx: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        app_key: Option<String>,
        selector: Option<&str>,
        events_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let ResolvedIdentities { me, other, label } = identity::resolve(selector);
        let controller = SessionController::new(provider, app_key, me, other);

        Self {
            should_quit: false,
            label,
            controller,
            notice: None,
            mount_area: None,
            animation_frame: 0,
            events_tx,
        }
    }

    /// Kicks off (or restarts) collaborator initialization.
    pub fn start_session(&mut self) {
        self.controller.begin_init(self.events_tx.clone());
    }

    /// Completes initialization once the collaborator readiness event lands.
    pub fn on_collaborator_ready(&mut self, generation: u64) {
        match self.controller.on_ready(generation) {
            Ok(()) => {
                // Ok also covers discarded stale events, which must not
                // announce anything.
                if self.controller.state() == ControllerState::Ready {
                    self.set_notice(
                        NoticeKind::Info,
                        "Chat is ready. Press Enter to open the conversation.",
                    );
                }
            }
            Err(err @ SessionError::ConfigurationMissing) => {
                self.set_notice(NoticeKind::Error, err.to_string());
            }
            Err(err) => {
                self.set_notice(NoticeKind::Warning, err.to_string());
            }
        }
    }

    /// The open-chat action behind the Enter key.
    pub fn open_chat(&mut self) {
        let mount_target_available = self.mount_area.is_some();
        match self.controller.open_chat(mount_target_available) {
            Ok(conversation) => {
                self.set_notice(
                    NoticeKind::Info,
                    format!("Conversation {conversation} is live."),
                );
            }
            Err(err) => {
                self.set_notice(NoticeKind::Warning, err.to_string());
            }
        }
    }

    /// Switches the local actor to the other demo identity and restarts the
    /// session for the new pair.
    pub fn swap_user(&mut self) {
        let selector = match self.controller.me().id.as_str() {
            "user2" => None,
            _ => Some("user2"),
        };
        let ResolvedIdentities { me, other, label } = identity::resolve(selector);
        let acting_as = me.display_name.clone();

        self.label = label;
        self.controller.set_identities(me, other);
        self.start_session();
        self.set_notice(NoticeKind::Info, format!("Now acting as {acting_as}."));
    }

    pub fn set_notice(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind,
        });
    }

    /// Advances the waiting animation while the collaborator bootstraps.
    pub fn tick(&mut self) {
        if self.controller.state() == ControllerState::Uninitialized {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Releases the session before the terminal goes away.
    pub fn quit(&mut self) {
        self.controller.teardown();
        self.should_quit = true;
    }
}
