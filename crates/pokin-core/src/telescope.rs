use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::text_input::TextInput;

/// Something the finder can jump to: a tool, a tematik, an OPD tree.
#[derive(Debug, Clone)]
pub struct TelescopeItem {
    pub label: String,
    /// Secondary text, also searched.
    pub description: String,
    /// Routing id handed back on selection (e.g. "tool:OPD", "tematik:12").
    pub id: String,
}

impl TelescopeItem {
    pub fn new(
        label: impl Into<String>,
        description: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
            id: id.into(),
        }
    }

    /// Rank against lowercase `terms`: 0 when the label starts with the
    /// first term, 1 for any other match, None when a term is missing.
    fn rank(&self, terms: &[String]) -> Option<u8> {
        let label = self.label.to_lowercase();
        let description = self.description.to_lowercase();
        if !terms
            .iter()
            .all(|t| label.contains(t.as_str()) || description.contains(t.as_str()))
        {
            return None;
        }
        match terms.first() {
            Some(first) if label.starts_with(first.as_str()) => Some(0),
            _ => Some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelescopeEvent {
    Pending,
    Closed,
    /// Closed with this item id chosen.
    Selected(String),
}

/// Search-as-you-type overlay used for the tool picker, `<Space>f` and the
/// Pemda tematik picker.
#[derive(Debug, Default)]
pub struct Telescope {
    pub visible: bool,
    title: String,
    query: TextInput,
    items: Vec<TelescopeItem>,
    /// Indices into `items`, best match first.
    matches: Vec<usize>,
    list_state: ListState,
}

impl Telescope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, title: impl Into<String>, items: Vec<TelescopeItem>) {
        self.visible = true;
        self.title = title.into();
        self.query.clear();
        self.items = items;
        self.refilter();
    }

    /// Open with the item `id` preselected (e.g. the tematik on screen).
    pub fn open_at(&mut self, title: impl Into<String>, items: Vec<TelescopeItem>, id: &str) {
        self.open(title, items);
        if let Some(pos) = self.matches.iter().position(|&i| self.items[i].id == id) {
            self.list_state.select(Some(pos));
        }
    }

    pub fn close(&mut self) {
        self.visible = false;
        self.query.clear();
        self.items.clear();
        self.matches.clear();
        self.list_state.select(None);
    }

    /// Move the selection by `delta`, wrapping at both ends.
    fn step(&mut self, delta: isize) {
        let len = self.matches.len() as isize;
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        self.list_state
            .select(Some((current + delta).rem_euclid(len) as usize));
    }

    /// Handle a key while visible. Enter on an empty result list is ignored.
    pub fn handle_key(&mut self, key: KeyEvent) -> TelescopeEvent {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.close();
                return TelescopeEvent::Closed;
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_id().map(str::to_string) {
                    self.close();
                    return TelescopeEvent::Selected(id);
                }
            }
            KeyCode::Up | KeyCode::BackTab => self.step(-1),
            KeyCode::Char('p') if ctrl => self.step(-1),
            KeyCode::Down | KeyCode::Tab => self.step(1),
            KeyCode::Char('n') if ctrl => self.step(1),
            KeyCode::Char('u') if ctrl => {
                self.query.clear();
                self.refilter();
            }
            KeyCode::Left => self.query.move_left(),
            KeyCode::Right => self.query.move_right(),
            KeyCode::Backspace => {
                self.query.backspace();
                self.refilter();
            }
            KeyCode::Char(c) if !ctrl => {
                self.query.insert_char(c);
                self.refilter();
            }
            _ => {}
        }
        TelescopeEvent::Pending
    }

    pub fn selected_id(&self) -> Option<&str> {
        let idx = *self.matches.get(self.list_state.selected()?)?;
        Some(&self.items[idx].id)
    }

    /// Recompute matches. The selection returns to the best match.
    fn refilter(&mut self) {
        let terms: Vec<String> = self
            .query
            .value()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let mut ranked: Vec<(u8, usize)> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.rank(&terms).map(|r| (r, i)))
            .collect();
        ranked.sort();
        self.matches = ranked.into_iter().map(|(_, i)| i).collect();
        self.list_state
            .select((!self.matches.is_empty()).then_some(0));
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        if !self.visible {
            return;
        }

        let width = (area.width * 3 / 5).max(40).min(area.width.saturating_sub(4));
        let height = (area.height * 3 / 5).max(10).min(area.height.saturating_sub(4));
        let [popup] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        let [popup] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(popup);
        frame.render_widget(Clear, popup);

        let [input_area, results_area] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(1)]).areas(popup);

        let counter = format!(" {}/{} ", self.matches.len(), self.items.len());
        let input = Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(self.query.value()),
        ]))
        .block(
            Block::default()
                .title(format!(" {} ", self.title))
                .title(Line::from(counter).right_aligned())
                .borders(Borders::ALL),
        );
        frame.render_widget(input, input_area);
        frame.set_cursor_position((
            input_area.x + 3 + self.query.cursor_column() as u16,
            input_area.y + 1,
        ));

        let results_block = Block::default().borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM);
        if self.matches.is_empty() {
            let empty = Paragraph::new(Span::styled(
                "  No matches",
                Style::default().add_modifier(Modifier::DIM),
            ))
            .block(results_block);
            frame.render_widget(empty, results_area);
            return;
        }

        let rows: Vec<ListItem> = self
            .matches
            .iter()
            .map(|&idx| {
                let item = &self.items[idx];
                ListItem::new(Line::from(vec![
                    Span::raw(item.label.clone()),
                    Span::styled(
                        format!("  {}", item.description),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        let list = List::new(rows)
            .block(results_block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, results_area, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn themes() -> Vec<TelescopeItem> {
        vec![
            TelescopeItem::new("Pendidikan Berkualitas", "Tematik 2025", "tematik:1"),
            TelescopeItem::new("Kesehatan Masyarakat", "Tematik 2025", "tematik:2"),
            TelescopeItem::new("Infrastruktur Jalan", "Tematik 2024", "tematik:3"),
        ]
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_query(t: &mut Telescope, query: &str) {
        for c in query.chars() {
            t.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_handle_key_selects() {
        let mut t = Telescope::new();
        t.open("Tematik", themes());
        assert_eq!(t.handle_key(key(KeyCode::Down)), TelescopeEvent::Pending);
        assert_eq!(
            t.handle_key(key(KeyCode::Enter)),
            TelescopeEvent::Selected("tematik:2".to_string())
        );
        assert!(!t.visible);

        t.open("Tematik", themes());
        type_query(&mut t, "z");
        assert_eq!(t.handle_key(key(KeyCode::Enter)), TelescopeEvent::Pending);
        assert_eq!(t.handle_key(key(KeyCode::Esc)), TelescopeEvent::Closed);
    }

    #[test]
    fn test_filter_all_terms() {
        let mut t = Telescope::new();
        t.open("Tematik", themes());
        assert_eq!(t.matches.len(), 3);

        type_query(&mut t, "2025 kes");
        assert_eq!(t.matches, vec![1]);
        assert_eq!(t.selected_id(), Some("tematik:2"));

        type_query(&mut t, "x");
        assert!(t.matches.is_empty());
        assert_eq!(t.selected_id(), None);

        t.handle_key(key(KeyCode::Backspace));
        assert_eq!(t.selected_id(), Some("tematik:2"));
    }

    #[test]
    fn test_label_prefix_ranks_first() {
        let mut t = Telescope::new();
        t.open(
            "Find",
            vec![
                TelescopeItem::new("OPD", "Pohon kinerja OPD", "tool:OPD"),
                TelescopeItem::new("Pemda", "Pohon kinerja Pemda", "tool:Pemda"),
                TelescopeItem::new("Tematik", "Pohon tematik", "tool:Tematik"),
            ],
        );
        type_query(&mut t, "pemda");
        assert_eq!(t.selected_id(), Some("tool:Pemda"));

        // Every item mentions "p"; only Pemda starts with it.
        t.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        type_query(&mut t, "p");
        assert_eq!(t.matches, vec![1, 0, 2]);
    }

    #[test]
    fn test_open_at_and_wrap() {
        let mut t = Telescope::new();
        t.open_at("Tematik", themes(), "tematik:3");
        assert_eq!(t.selected_id(), Some("tematik:3"));

        t.handle_key(key(KeyCode::Down));
        assert_eq!(t.selected_id(), Some("tematik:1"));
        t.handle_key(key(KeyCode::Up));
        assert_eq!(t.selected_id(), Some("tematik:3"));

        t.close();
        assert!(!t.visible);
        assert!(t.items.is_empty());
    }
}
