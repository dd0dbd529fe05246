// Tab bar with the signed-in account, file count, and unread-error badge.

use ratatui::{prelude::*, widgets::*};

use crate::app::{App, Tab};

const TABS: [Tab; 2] = [Tab::Files, Tab::Console];

fn tab_label(app: &App, tab: Tab) -> Line<'static> {
    let unread = app.console.unread;
    let (text, color) = match tab {
        Tab::Files => (
            format!("{} ({})", tab.title(), app.files.files().len()),
            Color::White,
        ),
        Tab::Console if unread > 0 => (format!("{} ({})", tab.title(), unread), Color::Red),
        Tab::Console => (tab.title().to_string(), Color::White),
    };

    let style = if tab == app.active_tab {
        Style::new().fg(Color::Yellow).bold()
    } else {
        Style::new().fg(color)
    };
    Line::styled(text, style)
}

pub fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = TABS.iter().map(|tab| tab_label(app, *tab)).collect();
    let selected = TABS
        .iter()
        .position(|tab| *tab == app.active_tab)
        .unwrap_or_default();

    let header = Block::new()
        .borders(Borders::BOTTOM)
        .border_style(Style::new().fg(Color::DarkGray))
        .title(Line::from(vec![
            Span::styled(" filestash ", Style::new().fg(Color::Cyan).bold()),
            Span::styled(
                format!("{} ", app.user_label),
                Style::new().fg(Color::DarkGray),
            ),
        ]));

    let widget = Tabs::new(titles)
        .block(header)
        .select(selected)
        .highlight_style(Style::new().fg(Color::Yellow))
        .divider(Span::raw(" │ "));

    frame.render_widget(widget, area);
}
