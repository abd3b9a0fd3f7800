pub mod ui;

use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

use pokin_api::{ApiPayload, ApiRequest, Backend, ThemeSummary, Ticket};
use pokin_core::{
    help_popup::HelpEntry,
    keybinds::{Action, InputMode},
    notice::Notice,
    settings::FilterContext,
    telescope::{Telescope, TelescopeEvent, TelescopeItem},
    tool::Tool,
    which_key::WhichKeyEntry,
};
use pokin_tree::{SessionEvent, TreeSession, TreeSource, TreeView};

const ID_PREFIX: &str = "pemda:";
/// `<Space>s` opens the tematik picker.
const PICK_KEY: char = 's';

/// The Pohon Pemda tool: pick one theme of the fiscal year and work on its
/// whole tree, from the theme down to operational nodes.
pub struct PemdaTool {
    session: TreeSession,
    /// Themes of the current fiscal year, for the picker.
    themes: Vec<ThemeSummary>,
    themes_ticket: Option<Ticket>,
    /// Year the theme list was last requested for.
    themes_year: Option<i32>,
    picker: Telescope,
    /// Open the picker once the theme list arrives.
    pick_when_loaded: bool,
}

impl PemdaTool {
    pub fn new(backend: Box<dyn Backend>, filter: FilterContext) -> Self {
        Self {
            session: TreeSession::new(TreeView::new(filter), backend),
            themes: Vec::new(),
            themes_ticket: None,
            themes_year: None,
            picker: Telescope::new(),
            pick_when_loaded: false,
        }
    }

    /// Id of the theme whose tree is displayed.
    pub fn current_theme(&self) -> Option<i64> {
        match self.session.source() {
            TreeSource::Theme(id) => Some(*id),
            _ => None,
        }
    }

    pub fn themes(&self) -> &[ThemeSummary] {
        &self.themes
    }

    pub fn select_theme(&mut self, id: i64) {
        tracing::info!(theme = id, "selecting theme");
        self.session.set_source(TreeSource::Theme(id));
    }

    fn load_themes(&mut self) {
        let year = self.session.view.filter().fiscal_year;
        self.themes_year = Some(year);
        let ticket = self.session.submit_external(ApiRequest::ListThemes {
            fiscal_year: Some(year),
        });
        self.themes_ticket = Some(ticket);
    }

    fn open_picker(&mut self) {
        if self.themes.is_empty() {
            self.pick_when_loaded = true;
            if self.themes_ticket.is_none() {
                self.load_themes();
            }
            self.session.set_notice(Notice::info("Loading themes\u{2026}"));
            return;
        }

        let year = self.session.view.filter().fiscal_year;
        let items = self.picker_items();
        let current = self
            .current_theme()
            .map(|id| format!("{ID_PREFIX}{id}"))
            .unwrap_or_default();
        self.picker
            .open_at(format!("Tematik {year}"), items, &current);
    }

    fn picker_items(&self) -> Vec<TelescopeItem> {
        self.themes
            .iter()
            .map(|t| {
                let description = t.description.clone().unwrap_or_default();
                TelescopeItem::new(t.title(), description, format!("{ID_PREFIX}{}", t.id))
            })
            .collect()
    }

    fn handle_picker_key(&mut self, key: KeyEvent) {
        if let TelescopeEvent::Selected(id) = self.picker.handle_key(key) {
            self.handle_telescope_selection(&id);
        }
    }

    fn themes_loaded(&mut self, result: Result<ApiPayload, pokin_api::ApiError>) {
        self.themes_ticket = None;
        match result {
            Ok(ApiPayload::Themes(themes)) => {
                tracing::info!(count = themes.len(), "theme list loaded");
                self.themes = themes;
                if self.pick_when_loaded {
                    self.pick_when_loaded = false;
                    if self.themes.is_empty() {
                        let year = self.session.view.filter().fiscal_year;
                        self.session
                            .set_notice(Notice::info(format!("No themes for {year}")));
                    } else {
                        self.open_picker();
                    }
                }
            }
            Ok(other) => tracing::warn!(?other, "unexpected reply to theme list"),
            Err(e) => {
                tracing::warn!(error = %e, "theme list failed");
                self.pick_when_loaded = false;
                self.session
                    .set_notice(Notice::error(format!("Failed to load themes: {e}")));
            }
        }
    }
}

impl Tool for PemdaTool {
    fn name(&self) -> &str {
        "Pemda"
    }

    fn description(&self) -> &str {
        "Pohon kinerja pemda per tematik"
    }

    fn mode(&self) -> InputMode {
        if self.picker.visible {
            InputMode::Insert
        } else {
            self.session.view.mode()
        }
    }

    fn leader_key(&self) -> Option<char> {
        Some('p')
    }

    fn which_key_entries(&self) -> Vec<WhichKeyEntry> {
        vec![WhichKeyEntry::new(PICK_KEY, "Select tematik")]
    }

    fn telescope_items(&self) -> Vec<TelescopeItem> {
        self.picker_items()
    }

    fn help_entries(&self) -> Vec<HelpEntry> {
        let mut entries = vec![
            HelpEntry::new("Pohon Pemda", format!("t / <Space>{PICK_KEY}"), "Pick tematik"),
            HelpEntry::new("Pohon Pemda", ":tematik <id>", "Open tematik by id"),
        ];
        entries.extend(pokin_tree::ui::tree_help_entries("Pohon Pemda"));
        entries
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        if self.picker.visible {
            self.handle_picker_key(key);
            return Action::None;
        }
        match self.session.handle_key(key) {
            Action::Pick => {
                self.open_picker();
                Action::None
            }
            other => other,
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        ui::render(frame, area, self);
    }

    fn handle_leader_action(&mut self, key: char) -> Option<Action> {
        if key == PICK_KEY {
            self.open_picker();
            return Some(Action::None);
        }
        None
    }

    fn handle_command(&mut self, cmd: &str) -> bool {
        let mut parts = cmd.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("refresh"), None) => {
                self.session.refresh();
                self.load_themes();
                true
            }
            (Some("tematik"), Some(arg)) => {
                match arg.parse::<i64>() {
                    Ok(id) => self.select_theme(id),
                    Err(_) => self
                        .session
                        .set_notice(Notice::error(format!("Not a tematik id: {arg}"))),
                }
                true
            }
            (Some("tematik"), None) => {
                self.open_picker();
                true
            }
            _ => false,
        }
    }

    fn handle_telescope_selection(&mut self, id: &str) -> bool {
        let Some(theme) = id.strip_prefix(ID_PREFIX) else {
            return false;
        };
        match theme.parse::<i64>() {
            Ok(id) => {
                self.select_theme(id);
                true
            }
            Err(_) => false,
        }
    }

    fn apply_filter(&mut self, filter: &FilterContext) {
        let year_changed = self.themes_year != Some(filter.fiscal_year);
        self.session.view.set_filter(filter.clone());
        if year_changed {
            tracing::info!(year = filter.fiscal_year, "fiscal year changed, clearing tree");
            self.themes.clear();
            self.picker.close();
            self.session.set_source(TreeSource::None);
            self.load_themes();
        }
    }

    fn tick(&mut self) {
        for event in self.session.tick() {
            match event {
                SessionEvent::External { ticket, result } => {
                    if self.themes_ticket == Some(ticket) {
                        self.themes_loaded(result);
                    }
                }
                SessionEvent::SourceCleared => self.load_themes(),
                SessionEvent::Loaded | SessionEvent::Mutated => {}
            }
        }
    }

    fn notice(&self) -> Option<&Notice> {
        self.session.notice()
    }

    fn reset_key_state(&mut self) {
        self.session.view.reset_key_state();
    }

    fn on_blur(&mut self) {
        self.picker.close();
        self.session.view.reset_key_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};
    use pokin_api::testing::FakeBackend;
    use pokin_api::{NodeStatus, NodeType, PerformanceNode};

    fn filter(year: i32) -> FilterContext {
        FilterContext {
            fiscal_year: year,
            org_unit: None,
        }
    }

    fn theme(id: i64, name: &str) -> ThemeSummary {
        ThemeSummary {
            id,
            name: Some(name.to_string()),
            tema: None,
            description: None,
            fiscal_year: Some(2025),
            status: NodeStatus::Approved,
            region_code: None,
            indicators: Vec::new(),
        }
    }

    fn root(id: i64) -> PerformanceNode {
        PerformanceNode {
            id,
            parent_id: None,
            name: format!("Tema {id}"),
            description: None,
            fiscal_year: 2025,
            node_type: NodeType::Thematic,
            level: 0,
            status: NodeStatus::Approved,
            org_unit_code: None,
            region_code: None,
            indicators: Vec::new(),
            children: Vec::new(),
        }
    }

    fn press(tool: &mut PemdaTool, code: KeyCode) -> Action {
        tool.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn started() -> (PemdaTool, FakeBackend) {
        let fake = FakeBackend::new();
        let mut tool = PemdaTool::new(fake.boxed(), filter(2025));
        tool.apply_filter(&filter(2025));
        (tool, fake)
    }

    #[test]
    fn test_startup_loads_theme_list() {
        let (mut tool, fake) = started();
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2025)
            })
        );
        fake.reply_ok(ApiPayload::Themes(vec![theme(1, "Pendidikan")]));
        tool.tick();
        assert_eq!(tool.themes().len(), 1);
        assert!(!tool.picker.visible);
    }

    #[test]
    fn test_pick_before_list_arrives_opens_later() {
        let (mut tool, fake) = started();
        assert_eq!(press(&mut tool, KeyCode::Char('t')), Action::None);
        assert!(!tool.picker.visible);
        assert_eq!(fake.sent_count(), 1);

        fake.reply_ok(ApiPayload::Themes(vec![
            theme(1, "Pendidikan"),
            theme(2, "Kesehatan"),
        ]));
        tool.tick();
        assert!(tool.picker.visible);
        assert_eq!(tool.mode(), InputMode::Insert);

        press(&mut tool, KeyCode::Down);
        press(&mut tool, KeyCode::Enter);
        assert!(!tool.picker.visible);
        assert_eq!(tool.current_theme(), Some(2));
        assert_eq!(fake.last_sent(), Some(ApiRequest::FetchTree { id: 2 }));
    }

    #[test]
    fn test_tematik_command() {
        let (mut tool, fake) = started();
        assert!(tool.handle_command("tematik 7"));
        assert_eq!(fake.last_sent(), Some(ApiRequest::FetchTree { id: 7 }));

        let before = fake.sent_count();
        assert!(tool.handle_command("tematik abc"));
        assert_eq!(fake.sent_count(), before);
        assert!(tool.notice().unwrap().is_error());

        assert!(!tool.handle_command("unknown"));
    }

    #[test]
    fn test_year_change_clears_and_reloads() {
        let (mut tool, fake) = started();
        fake.reply_ok(ApiPayload::Themes(vec![theme(1, "Pendidikan")]));
        tool.tick();
        tool.select_theme(1);
        fake.reply_ok(ApiPayload::Tree(root(1)));
        tool.tick();
        assert!(!tool.session.view.is_empty());

        // Same year, new OPD: nothing reloads.
        let before = fake.sent_count();
        let mut same_year = filter(2025);
        same_year.org_unit = Some(pokin_core::settings::OrgUnit {
            code: "1.02".to_string(),
            name: String::new(),
        });
        tool.apply_filter(&same_year);
        assert_eq!(fake.sent_count(), before);
        assert_eq!(tool.current_theme(), Some(1));

        tool.apply_filter(&filter(2026));
        assert_eq!(tool.current_theme(), None);
        assert!(tool.session.view.is_empty());
        assert!(tool.themes().is_empty());
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2026)
            })
        );
    }

    #[test]
    fn test_deleting_theme_reloads_list() {
        let (mut tool, fake) = started();
        fake.reply_ok(ApiPayload::Themes(vec![theme(1, "Pendidikan")]));
        tool.tick();
        tool.select_theme(1);
        fake.reply_ok(ApiPayload::Tree(root(1)));
        tool.tick();

        press(&mut tool, KeyCode::Char('d'));
        press(&mut tool, KeyCode::Char('d'));
        press(&mut tool, KeyCode::Char('y'));
        assert_eq!(fake.last_sent(), Some(ApiRequest::DeleteNode { id: 1 }));
        fake.reply_ok(ApiPayload::Done);
        tool.tick();

        assert_eq!(tool.current_theme(), None);
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2025)
            })
        );
    }

    #[test]
    fn test_telescope_selection() {
        let (mut tool, fake) = started();
        fake.reply_ok(ApiPayload::Themes(vec![theme(4, "Ekonomi")]));
        tool.tick();
        let items = tool.telescope_items();
        assert_eq!(items[0].id, "pemda:4");
        assert!(tool.handle_telescope_selection("pemda:4"));
        assert!(!tool.handle_telescope_selection("tool:OPD"));
        assert_eq!(tool.current_theme(), Some(4));
    }

    #[test]
    fn test_hub_keys_bubble() {
        let (mut tool, _fake) = started();
        assert_eq!(press(&mut tool, KeyCode::Char('?')), Action::Help);
        assert_eq!(
            press(&mut tool, KeyCode::Char(':')),
            Action::SetMode(InputMode::Command)
        );
    }
}
