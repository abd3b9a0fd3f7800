use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::keybinds::{Binding, LEADER};

/// One key shown in the leader menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhichKeyEntry {
    pub key: String,
    pub description: String,
}

impl WhichKeyEntry {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }

    pub fn from_binding(binding: &Binding) -> Self {
        Self::new(binding.label(), binding.action.describe())
    }
}

/// Leader menu shown along the bottom edge after `<Space>`.
#[derive(Debug, Default)]
pub struct WhichKey {
    pub visible: bool,
    pub entries: Vec<WhichKeyEntry>,
    pub title: String,
}

impl WhichKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, title: impl Into<String>, entries: Vec<WhichKeyEntry>) {
        self.visible = true;
        self.title = title.into();
        self.entries = entries;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.entries.clear();
        self.title.clear();
    }

    /// Number of columns that fit `width`, and the width of each.
    fn columns(&self, width: u16) -> (usize, u16) {
        let widest = self
            .entries
            .iter()
            .map(|e| e.key.width() + e.description.width() + 5)
            .max()
            .unwrap_or(1) as u16;
        let inner = width.saturating_sub(2).max(1);
        let count = (inner / widest.max(1)).max(1) as usize;
        (count, inner / count as u16)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if !self.visible || self.entries.is_empty() {
            return;
        }

        let (count, column_width) = self.columns(area.width);
        let rows = self.entries.len().div_ceil(count);
        let height = (rows as u16 + 2).min(area.height);
        let panel = Rect {
            x: area.x,
            y: area.bottom().saturating_sub(height),
            width: area.width,
            height,
        };
        frame.render_widget(Clear, panel);

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        let columns = Layout::horizontal(vec![Constraint::Length(column_width); count]).split(inner);
        // Fill column-major so related keys stay together.
        for (col, chunk) in self.entries.chunks(rows).enumerate() {
            let Some(column_area) = columns.get(col) else {
                break;
            };
            let lines: Vec<Line> = chunk
                .iter()
                .map(|e| {
                    Line::from(vec![
                        Span::styled(
                            format!(" {} ", e.key),
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        ),
                        Span::styled("\u{2192} ", Style::default().fg(Color::DarkGray)),
                        Span::raw(e.description.clone()),
                    ])
                })
                .collect();
            frame.render_widget(Paragraph::new(lines), *column_area);
        }
    }
}

/// The hub's own leader keys, taken from the leader table.
pub fn hub_leader_entries() -> Vec<WhichKeyEntry> {
    let mut entries: Vec<WhichKeyEntry> = LEADER.iter().map(WhichKeyEntry::from_binding).collect();
    entries.push(WhichKeyEntry::new("1-9", "Switch to tool"));
    entries
}
