use crate::keybinds::InputMode;
use crate::notice::Notice;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
};

/// Render the top tab bar showing the available tools.
pub fn render_tab_bar(frame: &mut Frame, area: Rect, tools: &[&str], active: Option<usize>) {
    let titles: Vec<Line> = tools
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!("{} {}", i + 1, t)))
        .collect();

    let tabs = Tabs::new(titles)
        .select(active)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED))
        .style(Style::default().add_modifier(Modifier::DIM))
        .divider(Span::raw(" | "));

    frame.render_widget(tabs, area);
}

/// Render the bottom status bar: mode, tool name, filter summary.
/// A live notice replaces the filter summary.
pub fn render_status_bar(
    frame: &mut Frame,
    area: Rect,
    mode: InputMode,
    tool_name: &str,
    info: &str,
    notice: Option<&Notice>,
) {
    let mode_style = Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED);

    let mut spans = vec![
        Span::styled(format!(" {} ", mode.label()), mode_style),
        Span::raw(" "),
        Span::styled(tool_name.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
    ];

    match notice {
        Some(notice) => spans.push(notice_span(notice)),
        None => spans.push(Span::styled(
            info.to_string(),
            Style::default().add_modifier(Modifier::DIM),
        )),
    }

    let bar = Paragraph::new(Line::from(spans));
    frame.render_widget(bar, area);
}

fn notice_span(notice: &Notice) -> Span<'static> {
    let style = if notice.is_error() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green)
    };
    Span::styled(notice.message.clone(), style)
}

/// Render the command-line input at the bottom of the screen.
pub fn render_command_line(frame: &mut Frame, area: Rect, input: &str, cursor: usize) {
    let line = Line::from(vec![
        Span::styled(":", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(input),
    ]);

    frame.render_widget(Paragraph::new(line), area);
    frame.set_cursor_position((area.x + 1 + cursor as u16, area.y));
}

/// Standard layout: tab bar (1 line) + main content + status bar (1 line).
/// Returns (tab_area, content_area, status_area).
pub fn standard_layout(area: Rect) -> (Rect, Rect, Rect) {
    let [tab_area, content_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(area);

    (tab_area, content_area, status_area)
}

/// Bordered block for a panel; focused panels get a blue border.
pub fn panel_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(border)
}

/// Centered one-line hint for empty views ("No data", "Select a theme").
pub fn render_placeholder(frame: &mut Frame, area: Rect, text: &str) {
    let hint = Paragraph::new(Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    )))
    .centered();
    let y = area.y + area.height / 2;
    frame.render_widget(hint, Rect { y, height: 1.min(area.height), ..area });
}
