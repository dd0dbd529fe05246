// Modal UI components.
// Dialogs for upload input, delete confirmation, previews, and notices.

use ratatui::{prelude::*, widgets::*};

use filestash::storage::FileRecord;
use filestash::sync::Notice;
use filestash::transfer::Preview;

use crate::state::LoadingState;

/// Centered rectangle clamped to the frame.
pub(super) fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

pub(super) fn key_hints(pairs: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (key, action) in pairs {
        spans.push(Span::styled(format!(" {}", key), Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(
            format!(" = {} ", action),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn modal_block(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", title))
}

/// Draw the upload path prompt.
pub fn draw_upload_modal(frame: &mut Frame, input: &str) {
    let modal_area = centered(frame.area(), 70, 5);
    frame.render_widget(Clear, modal_area);

    let block = modal_block("Upload File", Color::Cyan);
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let input_line = Line::from(vec![
        Span::styled("Path: ", Style::default().fg(Color::DarkGray)),
        Span::raw(input),
        Span::styled("█", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    let hints = key_hints(&[("Enter", "Upload"), ("Esc", "Cancel")]);
    frame.render_widget(Paragraph::new(hints).alignment(Alignment::Center), chunks[2]);
}

/// Draw the delete confirmation.
pub fn draw_confirm_delete_modal(frame: &mut Frame, file: &FileRecord) {
    let modal_area = centered(frame.area(), 60, 6);
    frame.render_widget(Clear, modal_area);

    let text = vec![
        Line::from("Are you sure you want to delete this file?"),
        Line::from(Span::styled(
            file.name.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        key_hints(&[("y", "Delete"), ("n", "Cancel")]),
    ];

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(modal_block("Delete File", Color::Red));
    frame.render_widget(paragraph, modal_area);
}

/// Draw the preview dialog with the viewer link.
pub fn draw_preview_modal(frame: &mut Frame, name: &str, preview: &LoadingState<Preview>) {
    let modal_area = centered(frame.area(), 90, 12);
    frame.render_widget(Clear, modal_area);

    let mut text = match preview {
        LoadingState::Idle | LoadingState::Loading => vec![Line::from(Span::styled(
            "⏳ Preparing preview...",
            Style::default().fg(Color::Yellow),
        ))],
        LoadingState::Error(e) => vec![Line::from(Span::styled(
            format!("❌ {}", e),
            Style::default().fg(Color::Red),
        ))],
        LoadingState::Loaded(preview) => {
            let mut lines = vec![Line::from(vec![
                Span::styled("Type: ", Style::default().fg(Color::DarkGray)),
                Span::raw(preview.kind.label()),
            ])];
            match &preview.viewer_url {
                Some(url) => {
                    lines.push(Line::from(Span::styled(
                        "Open in a browser:",
                        Style::default().fg(Color::DarkGray),
                    )));
                    lines.push(Line::from(Span::styled(
                        url.as_str(),
                        Style::default().fg(Color::Cyan),
                    )));
                }
                None => {
                    lines.push(Line::from("Preview not available for this file type."));
                    lines.push(Line::from(Span::styled(
                        "Download it instead.",
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
            lines
        }
    };
    text.push(Line::from(""));
    text.push(key_hints(&[("s", "Download"), ("Esc", "Close")]));

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(modal_block(name, Color::Cyan));
    frame.render_widget(paragraph, modal_area);
}

/// Draw a notice alert.
pub fn draw_notice_modal(frame: &mut Frame, notice: &Notice) {
    let modal_area = centered(frame.area(), 60, 7);
    frame.render_widget(Clear, modal_area);

    let color = match notice {
        Notice::Offline => Color::Yellow,
        Notice::RetriesExhausted { .. } | Notice::RemoteRejected(_) => Color::Red,
    };

    let text = vec![
        Line::from(notice.message()),
        Line::from(""),
        key_hints(&[("Enter", "OK")]),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(notice.title(), color));
    frame.render_widget(paragraph, modal_area);
}
