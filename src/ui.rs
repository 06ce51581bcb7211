use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Notice, NoticeKind};
use crate::identity::Role;
use crate::session::ControllerState;

/// Fixed height of the chat surface region, border included.
const MOUNT_REGION_HEIGHT: u16 = 18;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, intro_area, button_area, mount_area, _, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(4),
        Constraint::Length(1),
        Constraint::Length(MOUNT_REGION_HEIGHT),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_intro(app, frame, intro_area);
    render_button(app, frame, button_area);
    render_mount_region(app, frame, mount_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", app.label),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(
            format!("charla v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn render_intro(app: &App, frame: &mut Frame, area: Rect) {
    let me = app.controller.me();
    let other = app.controller.other();
    let action = match me.role {
        Role::Keeper => format!(
            "Open the chat to create the 1:1 consultation room with {}.",
            other.id
        ),
        Role::Creator => format!(
            "Open the chat to join the 1:1 consultation room with {}.",
            other.id
        ),
    };

    let text = vec![
        Line::raw(""),
        Line::from(vec![
            Span::raw("This window acts as "),
            Span::styled(me.display_name.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("."),
        ]),
        Line::raw(action),
        Line::from(Span::styled(
            "Run a second instance with --user user2 for the other side of the conversation.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), area);
}

fn render_button(app: &App, frame: &mut Frame, area: Rect) {
    let caption = match app.controller.me().role {
        Role::Keeper => "Create consultation room",
        Role::Creator => "Join consultation room",
    };
    let enabled = matches!(
        app.controller.state(),
        ControllerState::Ready | ControllerState::Open
    );
    let style = if enabled {
        Style::default().bg(Color::Blue).fg(Color::White).bold()
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::Gray)
    };
    let button = Line::from(Span::styled(format!(" [Enter] {caption} "), style));
    frame.render_widget(Paragraph::new(button), area);
}

/// Draws the region the chat surface mounts into and records it on the app,
/// so the controller knows whether a mount target exists.
fn render_mount_region(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    app.mount_area = Some(inner);

    match app.controller.state() {
        ControllerState::Open => {
            if let Some(surface) = app.controller.surface_mut() {
                surface.render(frame, inner);
            }
        }
        ControllerState::Uninitialized => {
            let dots = ".".repeat(app.animation_frame as usize + 1);
            let waiting = Paragraph::new(Line::from(Span::styled(
                format!("Connecting to the chat service{dots}"),
                Style::default().fg(Color::DarkGray),
            )));
            frame.render_widget(waiting, inner);
        }
        ControllerState::Ready => {
            let hint = Paragraph::new(Line::from(Span::styled(
                "The chat surface appears here once you open the conversation.",
                Style::default().fg(Color::DarkGray),
            )));
            frame.render_widget(hint, inner);
        }
        ControllerState::TornDown => {}
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let line = match &app.notice {
        Some(notice) => notice_line(notice),
        None => hint_line(),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn notice_line(notice: &Notice) -> Line<'_> {
    let style = match notice.kind {
        NoticeKind::Info => Style::default().fg(Color::Green),
        NoticeKind::Warning => Style::default().fg(Color::Yellow),
        NoticeKind::Error => Style::default().fg(Color::Red).bold(),
    };
    Line::from(Span::styled(notice.text.as_str(), style))
}

fn hint_line() -> Line<'static> {
    let key = Style::default().bg(Color::DarkGray).fg(Color::White);
    Line::from(vec![
        Span::styled(" Enter ", key),
        Span::raw(" open chat  "),
        Span::styled(" s ", key),
        Span::raw(" switch user  "),
        Span::styled(" q ", key),
        Span::raw(" quit"),
    ])
}
