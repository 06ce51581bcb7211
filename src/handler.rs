use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::CollaboratorReady { generation } => app.on_collaborator_ready(generation),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl-C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Enter | KeyCode::Char('o') => app.open_chat(),
        KeyCode::Char('s') => app.swap_user(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use ratatui::layout::Rect;
    use tokio::sync::mpsc;

    use super::*;
    use crate::provider::local::LocalProvider;
    use crate::session::ControllerState;

    fn demo_app(selector: Option<&str>) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(LocalProvider::new(Duration::from_millis(5)));
        let app = App::new(provider, Some("demo-key".to_string()), selector, tx);
        (app, rx)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    #[tokio::test]
    async fn test_q_quits_and_releases_the_session() {
        let (mut app, _rx) = demo_app(None);
        app.start_session();

        press(&mut app, KeyCode::Char('q'));

        assert!(app.should_quit);
        assert_eq!(app.controller.state(), ControllerState::TornDown);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let (mut app, _rx) = demo_app(None);
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_open_before_ready_shows_a_soft_notice() {
        let (mut app, _rx) = demo_app(None);
        app.start_session();
        app.mount_area = Some(Rect::new(0, 0, 40, 10));

        press(&mut app, KeyCode::Enter);

        let notice = app.notice.as_ref().expect("notice shown");
        assert!(notice.text.contains("still initializing"));
        assert_eq!(app.controller.state(), ControllerState::Uninitialized);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_collaborator_ready_event_completes_init() {
        let (mut app, mut rx) = demo_app(None);
        app.start_session();

        let event = rx.recv().await.expect("readiness event");
        handle_event(&mut app, event);

        assert_eq!(app.controller.state(), ControllerState::Ready);
    }

    #[tokio::test]
    async fn test_s_swaps_identity_and_restarts() {
        let (mut app, _rx) = demo_app(None);
        app.start_session();
        assert_eq!(app.controller.me().id, "user1");

        press(&mut app, KeyCode::Char('s'));

        assert_eq!(app.controller.me().id, "user2");
        assert_eq!(app.controller.other().id, "user1");
        assert_eq!(app.controller.state(), ControllerState::Uninitialized);
        assert!(app.label.contains("Creator"));

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.controller.me().id, "user1");
        assert!(app.label.contains("Keeper"));
    }

    #[tokio::test]
    async fn test_tick_only_animates_while_waiting() {
        let (mut app, mut rx) = demo_app(None);
        app.start_session();

        handle_event(&mut app, AppEvent::Tick);
        assert_eq!(app.animation_frame, 1);

        let event = rx.recv().await.expect("readiness event");
        handle_event(&mut app, event);
        handle_event(&mut app, AppEvent::Tick);
        assert_eq!(app.animation_frame, 1);
    }
}
