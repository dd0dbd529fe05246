// UI module for rendering the TUI.
// Contains widgets for tabs, the file list, the console, and modal dialogs.

mod list;
mod modal;
mod tabs;

use ratatui::{prelude::*, widgets::*};

use crate::app::{App, Modal, Tab};
use crate::state::{Banner, ConsoleLevel};

/// Main draw function that renders the entire UI.
pub fn draw(frame: &mut Frame, app: &mut App) {
    let banner = match app.active_tab {
        Tab::Files => app.files.banner(),
        Tab::Console => None,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                          // Tab bar
            Constraint::Length(u16::from(banner.is_some())), // Banner
            Constraint::Min(1),                             // Main content
            Constraint::Length(1),                          // Status bar
        ])
        .split(frame.area());

    tabs::draw_tabs(frame, app, chunks[0]);

    if let Some(banner) = banner {
        draw_banner(frame, banner, chunks[1]);
    }

    match app.active_tab {
        Tab::Files => list::render_files_list(frame, &mut app.files, chunks[2]),
        Tab::Console => draw_console_tab(frame, app, chunks[2]),
    }

    draw_status_bar(frame, app, chunks[3]);

    match &app.modal {
        Modal::None => {}
        Modal::Upload { input } => modal::draw_upload_modal(frame, input),
        Modal::ConfirmDelete { file } => modal::draw_confirm_delete_modal(frame, file),
        Modal::Preview { name, preview } => modal::draw_preview_modal(frame, name, preview),
        Modal::Notice(notice) => modal::draw_notice_modal(frame, notice),
    }

    // Drawn last so it sits above any modal.
    if app.show_help {
        draw_help_overlay(frame);
    }
}

fn draw_banner(frame: &mut Frame, banner: Banner, area: Rect) {
    let style = match banner {
        Banner::Offline => Style::default().bg(Color::Red).fg(Color::White),
        Banner::Retrying { .. } => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let text = Paragraph::new(banner.text())
        .alignment(Alignment::Center)
        .style(style.add_modifier(Modifier::BOLD));
    frame.render_widget(text, area);
}

/// Console tab: newest message first, errors highlighted.
fn draw_console_tab(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = format!(" Console ({}) ", app.console.messages.len());
    let block = Block::new().borders(Borders::ALL).title(title);

    if app.console.messages.is_empty() {
        let empty = Paragraph::new("Nothing logged yet")
            .centered()
            .fg(Color::DarkGray)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .console
        .messages
        .iter()
        .rev()
        .map(|msg| {
            let (tag, color) = match msg.level {
                ConsoleLevel::Error => ("ERR ", Color::Red),
                ConsoleLevel::Warn => ("WARN", Color::Yellow),
                ConsoleLevel::Info => ("INFO", Color::Cyan),
            };
            let stamp = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S");

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", stamp), Style::new().fg(Color::DarkGray)),
                Span::styled(tag, Style::new().fg(color).bold()),
                Span::raw(" "),
                Span::raw(msg.message.clone()),
            ]))
        })
        .collect();

    let list_widget = List::new(items)
        .block(block)
        .highlight_style(Style::new().bg(Color::DarkGray))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list_widget, area, &mut app.console.list_state);
}

fn hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::raw(key),
        Span::styled(action, Style::default().fg(Color::DarkGray)),
    ]
}

/// Draw the status bar with keybinding hints and current activity.
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let pairs: &[(&'static str, &'static str)] = match app.active_tab {
        Tab::Files => &[
            (" ↑↓ ", "Navigate"),
            ("  r ", "Refresh"),
            ("  u ", "Upload"),
            ("  x ", "Delete"),
            ("  p ", "Preview"),
            ("  s ", "Save"),
            ("  ? ", "Help"),
            ("  q ", "Quit"),
        ],
        Tab::Console => &[
            (" ↑↓ ", "Scroll"),
            ("  Tab ", "Switch"),
            ("  ? ", "Help"),
            ("  q ", "Quit"),
        ],
    };

    let mut spans: Vec<Span> = pairs
        .iter()
        .flat_map(|&(key, action)| hint(key, action))
        .collect();

    if let Some(activity) = &app.files.activity {
        spans.push(Span::styled(
            format!("  ⏳ {}", activity),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

const SHORTCUTS: [(&str, &str); 9] = [
    ("j/k ↑/↓", "Move through the list"),
    ("r", "Fetch the list from the server"),
    ("u", "Upload a local file"),
    ("x / Del", "Delete the selected file"),
    ("p / Enter", "Preview the selected file"),
    ("s", "Save to the download folder"),
    ("Tab", "Switch between files and console"),
    ("?", "Toggle this help"),
    ("q", "Quit"),
];

fn draw_help_overlay(frame: &mut Frame) {
    let height = SHORTCUTS.len() as u16 + 4;
    let popup = modal::centered(frame.area(), 52, height);
    frame.render_widget(Clear, popup);

    let mut lines: Vec<Line> = SHORTCUTS
        .iter()
        .map(|&(key, action)| {
            Line::from(vec![
                Span::styled(format!("{key:>10}  "), Style::new().fg(Color::Cyan)),
                Span::raw(action),
            ])
        })
        .collect();
    lines.push(Line::default());
    lines.push(modal::key_hints(&[("Esc", "Close")]));

    let block = Block::bordered()
        .border_style(Style::new().fg(Color::Cyan))
        .title(Line::styled(" Keys ", Style::new().fg(Color::Cyan).bold()));
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}
