use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

use pokin_api::{Backend, NodeType};
use pokin_core::{
    help_popup::HelpEntry,
    keybinds::{Action, InputMode},
    notice::Notice,
    settings::FilterContext,
    telescope::TelescopeItem,
    tool::Tool,
    which_key::WhichKeyEntry,
};
use pokin_tree::{ChildInfo, RowTarget, TreeSession, TreeSource, TreeView, ui::render_tree_view};

const ID_PREFIX: &str = "tematik:";

/// Flat list of the fiscal year's themes. `a` creates a new theme, `e` edits
/// one in place, `dd` deletes it.
pub struct TematikTool {
    session: TreeSession,
}

impl TematikTool {
    pub fn new(backend: Box<dyn Backend>, filter: FilterContext) -> Self {
        let view = TreeView::new(filter).with_root_add(ChildInfo::root(NodeType::Thematic));
        Self {
            session: TreeSession::new(view, backend),
        }
    }

    fn load(&mut self) {
        let fiscal_year = self.session.view.filter().fiscal_year;
        tracing::info!(year = fiscal_year, "loading themes");
        self.session.set_source(TreeSource::Themes { fiscal_year });
    }
}

impl Tool for TematikTool {
    fn name(&self) -> &str {
        "Tematik"
    }

    fn description(&self) -> &str {
        "Themes of the fiscal year"
    }

    fn mode(&self) -> InputMode {
        self.session.view.mode()
    }

    fn leader_key(&self) -> Option<char> {
        Some('t')
    }

    fn which_key_entries(&self) -> Vec<WhichKeyEntry> {
        Vec::new()
    }

    fn telescope_items(&self) -> Vec<TelescopeItem> {
        self.session
            .view
            .roots()
            .iter()
            .map(|n| {
                TelescopeItem::new(
                    n.name.clone(),
                    format!("Tematik {}", n.fiscal_year),
                    format!("{ID_PREFIX}{}", n.id),
                )
            })
            .collect()
    }

    fn help_entries(&self) -> Vec<HelpEntry> {
        let mut entries = pokin_tree::ui::tree_help_entries("Tematik");
        for entry in entries.iter_mut().filter(|e| e.key == "a") {
            entry.description = "New tematik".to_string();
        }
        entries
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        match self.session.handle_key(key) {
            Action::Pick => Action::None,
            other => other,
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!("Tematik {}", self.session.view.filter().fiscal_year);
        render_tree_view(frame, area, &mut self.session.view, &title, true);
    }

    fn handle_command(&mut self, cmd: &str) -> bool {
        if cmd.trim() == "refresh" {
            self.session.refresh();
            return true;
        }
        false
    }

    fn handle_telescope_selection(&mut self, id: &str) -> bool {
        let Some(node_id) = id
            .strip_prefix(ID_PREFIX)
            .and_then(|s| s.parse::<i64>().ok())
        else {
            return false;
        };
        self.session.view.select(RowTarget::Node(node_id));
        true
    }

    fn apply_filter(&mut self, filter: &FilterContext) {
        let year_changed = self.session.source()
            != &TreeSource::Themes {
                fiscal_year: filter.fiscal_year,
            };
        self.session.view.set_filter(filter.clone());
        if year_changed {
            self.load();
        }
    }

    fn tick(&mut self) {
        // Notices and refreshes are handled by the session.
        self.session.tick();
    }

    fn notice(&self) -> Option<&Notice> {
        self.session.notice()
    }

    fn reset_key_state(&mut self) {
        self.session.view.reset_key_state();
    }

    fn on_blur(&mut self) {
        self.session.view.reset_key_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};
    use pokin_api::testing::FakeBackend;
    use pokin_api::{ApiPayload, ApiRequest, Indicator, NodeStatus, Target, ThemeSummary};
    use pokin_tree::FormKey;

    fn filter(year: i32) -> FilterContext {
        FilterContext {
            fiscal_year: year,
            org_unit: None,
        }
    }

    fn press(tool: &mut TematikTool, code: KeyCode) {
        tool.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(tool: &mut TematikTool, text: &str) {
        for c in text.chars() {
            press(tool, KeyCode::Char(c));
        }
    }

    fn theme(id: i64, name: &str) -> ThemeSummary {
        ThemeSummary {
            id,
            name: Some(name.to_string()),
            tema: None,
            description: Some("Urusan wajib".to_string()),
            fiscal_year: Some(2025),
            status: NodeStatus::Approved,
            region_code: Some("32".to_string()),
            indicators: vec![Indicator {
                id: Some(5),
                text: "Y".to_string(),
                description: None,
                fiscal_year: Some(2025),
                targets: vec![
                    Target {
                        id: Some(50),
                        value: 5.0,
                        unit: "persen".to_string(),
                        fiscal_year: Some(2025),
                    },
                    Target {
                        id: Some(51),
                        value: 7.0,
                        unit: "dok".to_string(),
                        fiscal_year: Some(2025),
                    },
                ],
            }],
        }
    }

    fn loaded() -> (TematikTool, FakeBackend) {
        let fake = FakeBackend::new();
        let mut tool = TematikTool::new(fake.boxed(), filter(2025));
        tool.apply_filter(&filter(2025));
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2025)
            })
        );
        fake.reply_ok(ApiPayload::Themes(vec![
            theme(1, "Pendidikan"),
            theme(2, "Kesehatan"),
        ]));
        tool.tick();
        (tool, fake)
    }

    #[test]
    fn test_lists_themes_flat() {
        let (tool, _fake) = loaded();
        let rows = tool.session.view.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.depth == 0 && !r.has_children));
        assert_eq!(tool.telescope_items()[1].id, "tematik:2");
    }

    #[test]
    fn test_add_creates_root_theme() {
        let (mut tool, fake) = loaded();
        press(&mut tool, KeyCode::Char('a'));
        assert_eq!(tool.mode(), InputMode::Insert);
        assert!(tool.session.view.has_form(FormKey::AddRoot));

        type_str(&mut tool, "Ekonomi");
        press(&mut tool, KeyCode::Tab);
        press(&mut tool, KeyCode::Tab);
        type_str(&mut tool, "PDRB");
        press(&mut tool, KeyCode::Tab);
        press(&mut tool, KeyCode::Tab);
        type_str(&mut tool, "4,5");
        press(&mut tool, KeyCode::Tab);
        type_str(&mut tool, "persen");
        tool.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

        let Some(ApiRequest::CreateNode(payload)) = fake.last_sent() else {
            panic!("expected a create request");
        };
        assert_eq!(payload.parent_id, None);
        assert_eq!(payload.level, 0);
        assert_eq!(payload.node_type, NodeType::Thematic);
        assert_eq!(payload.status, NodeStatus::Draft);
        assert_eq!(payload.fiscal_year, 2025);
        assert_eq!(payload.indicators[0].targets[0].value, 4.5);

        fake.reply_ok(ApiPayload::Done);
        tool.tick();
        assert!(!tool.session.view.has_form(FormKey::AddRoot));
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2025)
            })
        );
    }

    #[test]
    fn test_edit_keeps_first_target_only() {
        let (mut tool, fake) = loaded();
        press(&mut tool, KeyCode::Char('e'));
        let form = tool.session.view.form(FormKey::Edit(1)).unwrap();
        assert_eq!(form.draft.indicators.len(), 1);
        assert_eq!(form.draft.indicators[0].targets.len(), 1);
        assert_eq!(form.draft.indicators[0].targets[0].value.value(), "5");
        assert_eq!(form.draft.indicators[0].targets[0].unit.value(), "persen");

        tool.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        let Some(ApiRequest::UpdateNode { id, payload }) = fake.last_sent() else {
            panic!("expected an update request");
        };
        assert_eq!(id, 1);
        assert_eq!(payload.status, NodeStatus::Update);
        assert_eq!(payload.region_code.as_deref(), Some("32"));
    }

    #[test]
    fn test_year_change_reloads() {
        let (mut tool, fake) = loaded();
        let before = fake.sent_count();
        tool.apply_filter(&filter(2025));
        assert_eq!(fake.sent_count(), before);

        tool.apply_filter(&filter(2026));
        assert!(tool.session.view.is_empty());
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2026)
            })
        );
    }

    #[test]
    fn test_delete_refreshes_list() {
        let (mut tool, fake) = loaded();
        press(&mut tool, KeyCode::Char('j'));
        press(&mut tool, KeyCode::Char('d'));
        press(&mut tool, KeyCode::Char('d'));
        press(&mut tool, KeyCode::Char('y'));
        assert_eq!(fake.last_sent(), Some(ApiRequest::DeleteNode { id: 2 }));

        fake.reply_ok(ApiPayload::Done);
        tool.tick();
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2025)
            })
        );
    }
}
