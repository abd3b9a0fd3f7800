use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Row, Table},
};

use crate::keybinds::{Binding, GLOBAL, LEADER, NAVIGATION};

/// A key and what it does, listed under `section`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub section: String,
    pub key: String,
    pub description: String,
}

impl HelpEntry {
    pub fn new(
        section: impl Into<String>,
        key: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            description: description.into(),
        }
    }

    pub fn from_binding(section: &str, binding: &Binding) -> Self {
        Self::new(section, binding.label(), binding.action.describe())
    }
}

/// Entries for a whole binding table, with an optional key prefix
/// such as `<Space>` for leader keys.
pub fn table_entries(section: &str, prefix: &str, table: &[Binding]) -> Vec<HelpEntry> {
    table
        .iter()
        .map(|b| {
            let mut entry = HelpEntry::from_binding(section, b);
            entry.key.insert_str(0, prefix);
            entry
        })
        .collect()
}

/// Scrollable keybind reference.
#[derive(Debug, Default)]
pub struct HelpPopup {
    pub visible: bool,
    title: String,
    entries: Vec<HelpEntry>,
    scroll: usize,
}

impl HelpPopup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, title: impl Into<String>, entries: Vec<HelpEntry>) {
        self.visible = true;
        self.title = title.into();
        self.entries = entries;
        self.scroll = 0;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.entries.clear();
        self.title.clear();
        self.scroll = 0;
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.rows().len().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    /// Table rows: a header row whenever the section changes, then the keys.
    fn rows(&self) -> Vec<Row<'static>> {
        let mut rows = Vec::new();
        let mut section: Option<&str> = None;
        for entry in &self.entries {
            if section != Some(entry.section.as_str()) {
                if section.is_some() {
                    rows.push(Row::new(vec![Cell::from("")]));
                }
                rows.push(
                    Row::new(vec![Cell::from(entry.section.clone())]).style(
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ),
                );
                section = Some(entry.section.as_str());
            }
            rows.push(Row::new(vec![
                Cell::from(entry.key.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(entry.description.clone()),
            ]));
        }
        rows
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if !self.visible || self.entries.is_empty() {
            return;
        }

        let rows = self.rows();
        let width = area.width.saturating_sub(8).min(64);
        let height = (rows.len() as u16 + 2).min(area.height.saturating_sub(4));
        let [popup] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        let [popup] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(popup);
        frame.render_widget(Clear, popup);

        let visible = height.saturating_sub(2) as usize;
        let scroll = self.scroll.min(rows.len().saturating_sub(visible));
        let table = Table::new(
            rows.into_iter().skip(scroll),
            [Constraint::Length(22), Constraint::Fill(1)],
        )
        .column_spacing(2)
        .block(
            Block::default()
                .title(format!(" {} ", self.title))
                .title_bottom(Line::from(" Esc/q/? close  j/k scroll ").right_aligned())
                .borders(Borders::ALL),
        );
        frame.render_widget(table, popup);
    }
}

/// Keys the hub handles in every view, followed by the `:` commands.
pub fn global_help_entries() -> Vec<HelpEntry> {
    let mut entries = table_entries("Navigation", "", NAVIGATION);
    entries.extend(table_entries("Leader", "<Space>", LEADER));
    entries.push(HelpEntry::new("Leader", "<Space>1-9", "Switch to tool"));
    entries.extend(table_entries("General", "", GLOBAL));
    entries.push(HelpEntry::new("General", "Ctrl-c", "Force quit"));

    let commands = [
        (":tahun <year>", "Set fiscal year"),
        (":opd <code> [name]", "Set organisational unit"),
        (":opd", "Clear organisational unit"),
        (":refresh", "Refetch the current view"),
        (":q / :qa", "Quit"),
    ];
    entries.extend(
        commands
            .iter()
            .map(|(k, d)| HelpEntry::new("Commands", *k, *d)),
    );
    entries
}
