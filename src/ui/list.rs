// File list rendering.
// Styled listing with kind icons, sizes, and loading/empty/error states.

use chrono::{DateTime, Utc};
use ratatui::{prelude::*, widgets::*};

use filestash::preview::FileKind;
use filestash::sync::ListingSource;

use crate::state::{FilesTabState, LoadingState};

/// Coarse age of a timestamp: "3d ago", "2h ago", "5m ago", or "just now".
pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(*dt);
    [
        (age.num_days(), 'd'),
        (age.num_hours(), 'h'),
        (age.num_minutes(), 'm'),
    ]
    .into_iter()
    .find(|&(n, _)| n > 0)
    .map_or_else(|| "just now".to_string(), |(n, unit)| format!("{n}{unit} ago"))
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn source_color(source: ListingSource) -> Color {
    match source {
        ListingSource::Network | ListingSource::Local => Color::Green,
        ListingSource::Cache { fresh: true } => Color::Cyan,
        ListingSource::Cache { fresh: false } => Color::Yellow,
        ListingSource::Pending => Color::DarkGray,
    }
}

/// Centered single message in place of the list.
fn placeholder(frame: &mut Frame, area: Rect, text: String, color: Color) {
    let widget = Paragraph::new(text)
        .centered()
        .fg(color)
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, area);
}

/// Render the user's files.
pub fn render_files_list(frame: &mut Frame, state: &mut FilesTabState, area: Rect) {
    let mut title = vec![Span::raw(" Files ")];
    if let Some(source) = state.source {
        title.push(Span::styled(
            format!("[{}] ", source.label()),
            Style::default().fg(source_color(source)),
        ));
    }
    let block = Block::bordered().title(Line::from(title));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match &state.data {
        LoadingState::Idle => placeholder(
            frame,
            inner,
            "Press r to load files".into(),
            Color::DarkGray,
        ),
        LoadingState::Loading => {
            placeholder(frame, inner, "⏳ Loading files...".into(), Color::Yellow)
        }
        LoadingState::Error(e) => placeholder(frame, inner, format!("❌ {e}"), Color::Red),
        LoadingState::Loaded(files) if files.is_empty() => placeholder(
            frame,
            inner,
            "No files yet. Press u to upload one.".into(),
            Color::DarkGray,
        ),
        LoadingState::Loaded(files) => {
            let items: Vec<ListItem> = files
                .iter()
                .map(|file| {
                    let icon = FileKind::from_name(&file.name).icon();
                    let details = format!(
                        "  {}  {}",
                        format_size(file.size_bytes),
                        format_relative_time(&file.updated_at)
                    );
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("{icon} ")),
                        Span::raw(file.name.as_str()).fg(Color::White),
                        Span::raw(details).fg(Color::DarkGray),
                    ]))
                })
                .collect();

            let list = List::new(items)
                .highlight_style(Style::new().bg(Color::DarkGray).bold())
                .highlight_symbol("> ");
            frame.render_stateful_widget(list, inner, &mut state.list_state);
        }
    }
}
