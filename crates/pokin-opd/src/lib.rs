pub mod ui;

use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

use pokin_api::{ApiError, ApiPayload, ApiRequest, Backend, LevelCount, Ticket};
use pokin_core::{
    help_popup::HelpEntry,
    keybinds::{Action, InputMode},
    notice::Notice,
    settings::FilterContext,
    telescope::TelescopeItem,
    tool::Tool,
    which_key::WhichKeyEntry,
};
use pokin_tree::{RowTarget, SessionEvent, TreeSession, TreeSource, TreeView};

const ID_PREFIX: &str = "opd:";

/// Levels summarised above the tree: strategic, tactical, operational.
pub const SUMMARY_LEVELS: [i32; 3] = [4, 5, 6];

/// The Pohon OPD tool: every strategic root of the selected organisational
/// unit, with pending / approved totals per level.
pub struct OpdTool {
    session: TreeSession,
    counts: Vec<LevelCount>,
    counts_ticket: Option<Ticket>,
    /// Filter last applied; `None` until the hub hands one over.
    applied: Option<FilterContext>,
}

impl OpdTool {
    pub fn new(backend: Box<dyn Backend>, filter: FilterContext) -> Self {
        Self {
            session: TreeSession::new(TreeView::new(filter), backend),
            counts: Vec::new(),
            counts_ticket: None,
            applied: None,
        }
    }

    pub fn has_org_unit(&self) -> bool {
        self.session.view.filter().org_unit.is_some()
    }

    /// Count for `level`, zero when the endpoint did not report it.
    pub fn count_for(&self, level: i32) -> (u32, u32) {
        self.counts
            .iter()
            .find(|c| c.level == level)
            .map(|c| (c.pending, c.approved))
            .unwrap_or((0, 0))
    }

    fn reload(&mut self) {
        let filter = self.session.view.filter().clone();
        let Some(org_code) = filter.org_code().map(str::to_string) else {
            self.session.set_source(TreeSource::None);
            self.counts.clear();
            self.counts_ticket = None;
            return;
        };
        tracing::info!(org = %org_code, year = filter.fiscal_year, "loading opd forest");
        self.session.set_source(TreeSource::Opd {
            org_code,
            fiscal_year: filter.fiscal_year,
        });
    }

    fn load_counts(&mut self) {
        let filter = self.session.view.filter();
        let Some(org_code) = filter.org_code().map(str::to_string) else {
            return;
        };
        let request = ApiRequest::CountByLevel {
            org_code,
            fiscal_year: filter.fiscal_year,
        };
        self.counts_ticket = Some(self.session.submit_external(request));
    }

    fn counts_loaded(&mut self, result: Result<ApiPayload, ApiError>) {
        self.counts_ticket = None;
        match result {
            Ok(ApiPayload::Counts(counts)) => self.counts = counts,
            Ok(other) => tracing::warn!(?other, "unexpected reply to count request"),
            Err(e) => {
                tracing::warn!(error = %e, "count request failed");
                self.session
                    .set_notice(Notice::error(format!("Failed to load counts: {e}")));
            }
        }
    }
}

impl Tool for OpdTool {
    fn name(&self) -> &str {
        "OPD"
    }

    fn description(&self) -> &str {
        "Pohon kinerja of the selected OPD"
    }

    fn mode(&self) -> InputMode {
        self.session.view.mode()
    }

    fn leader_key(&self) -> Option<char> {
        Some('o')
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
                    n.node_type.label(),
                    format!("{ID_PREFIX}{}", n.id),
                )
            })
            .collect()
    }

    fn help_entries(&self) -> Vec<HelpEntry> {
        let mut entries = vec![HelpEntry::new(
            "Pohon OPD",
            ":opd <kode> [nama]",
            "Select the OPD to show",
        )];
        entries.extend(pokin_tree::ui::tree_help_entries("Pohon OPD"));
        entries
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        match self.session.handle_key(key) {
            Action::Pick => Action::None,
            other => other,
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        ui::render(frame, area, self);
    }

    fn handle_command(&mut self, cmd: &str) -> bool {
        if cmd.trim() != "refresh" {
            return false;
        }
        if !self.has_org_unit() {
            self.session
                .set_notice(Notice::info("Select an OPD first with :opd <kode>"));
            return true;
        }
        self.session.refresh();
        true
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
        if self.applied.as_ref() == Some(filter) {
            return;
        }
        self.applied = Some(filter.clone());
        self.session.view.set_filter(filter.clone());
        self.reload();
    }

    fn tick(&mut self) {
        for event in self.session.tick() {
            match event {
                SessionEvent::External { ticket, result } => {
                    if self.counts_ticket == Some(ticket) {
                        self.counts_loaded(result);
                    }
                }
                // Counts follow every tree load, including refreshes after a mutation.
                SessionEvent::Loaded => self.load_counts(),
                SessionEvent::Mutated | SessionEvent::SourceCleared => {}
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
        self.session.view.reset_key_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};
    use pokin_api::testing::FakeBackend;
    use pokin_api::{NodeStatus, NodeType, PerformanceNode};
    use pokin_core::settings::OrgUnit;

    fn filter(org: Option<&str>) -> FilterContext {
        FilterContext {
            fiscal_year: 2025,
            org_unit: org.map(|code| OrgUnit {
                code: code.to_string(),
                name: "Dinas Kesehatan".to_string(),
            }),
        }
    }

    fn strategic(id: i64) -> PerformanceNode {
        PerformanceNode {
            id,
            parent_id: Some(900),
            name: format!("Strategi {id}"),
            description: None,
            fiscal_year: 2025,
            node_type: NodeType::Strategic,
            level: 4,
            status: NodeStatus::Draft,
            org_unit_code: Some("1.02".to_string()),
            region_code: None,
            indicators: Vec::new(),
            children: Vec::new(),
        }
    }

    fn count(level: i32, pending: u32, approved: u32) -> LevelCount {
        LevelCount {
            level,
            node_type: NodeType::from_level(level)
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            pending,
            approved,
        }
    }

    #[test]
    fn test_no_org_unit_sends_nothing() {
        let fake = FakeBackend::new();
        let mut tool = OpdTool::new(fake.boxed(), filter(None));
        tool.apply_filter(&filter(None));
        assert_eq!(fake.sent_count(), 0);
        assert!(!tool.has_org_unit());

        assert!(tool.handle_command("refresh"));
        assert_eq!(fake.sent_count(), 0);
        assert!(tool.notice().is_some());
    }

    #[test]
    fn test_loads_forest_and_counts() {
        let fake = FakeBackend::new();
        let mut tool = OpdTool::new(fake.boxed(), filter(None));
        tool.apply_filter(&filter(Some("1.02")));

        assert_eq!(
            fake.sent(),
            vec![ApiRequest::FetchOpdForest {
                org_code: "1.02".to_string(),
                fiscal_year: 2025
            }]
        );

        fake.reply_ok(ApiPayload::Forest(vec![strategic(10), strategic(11)]));
        tool.tick();
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::CountByLevel {
                org_code: "1.02".to_string(),
                fiscal_year: 2025
            })
        );
        fake.reply_ok(ApiPayload::Counts(vec![count(4, 2, 3), count(6, 0, 5)]));
        tool.tick();

        assert_eq!(tool.session.view.roots().len(), 2);
        assert_eq!(tool.count_for(4), (2, 3));
        assert_eq!(tool.count_for(5), (0, 0));
        assert_eq!(tool.count_for(6), (0, 5));
    }

    #[test]
    fn test_same_filter_is_ignored() {
        let fake = FakeBackend::new();
        let mut tool = OpdTool::new(fake.boxed(), filter(None));
        tool.apply_filter(&filter(Some("1.02")));
        let before = fake.sent_count();
        tool.apply_filter(&filter(Some("1.02")));
        assert_eq!(fake.sent_count(), before);
    }

    #[test]
    fn test_clearing_org_unit_empties_view() {
        let fake = FakeBackend::new();
        let mut tool = OpdTool::new(fake.boxed(), filter(None));
        tool.apply_filter(&filter(Some("1.02")));
        fake.reply_ok(ApiPayload::Forest(vec![strategic(10)]));
        tool.tick();
        fake.reply_ok(ApiPayload::Counts(vec![count(4, 1, 0)]));
        tool.tick();
        assert_eq!(tool.count_for(4), (1, 0));

        tool.apply_filter(&filter(None));
        assert!(tool.session.view.is_empty());
        assert_eq!(tool.count_for(4), (0, 0));
    }

    #[test]
    fn test_refresh_reloads_counts_after_tree() {
        let fake = FakeBackend::new();
        let mut tool = OpdTool::new(fake.boxed(), filter(None));
        tool.apply_filter(&filter(Some("1.02")));
        fake.reply_ok(ApiPayload::Forest(vec![strategic(10)]));
        tool.tick();
        fake.reply_ok(ApiPayload::Counts(Vec::new()));
        tool.tick();
        let before = fake.sent_count();

        let action = tool.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE));
        assert_eq!(action, Action::None);
        assert_eq!(fake.sent_count(), before + 1);

        fake.reply_ok(ApiPayload::Forest(vec![strategic(10)]));
        tool.tick();
        assert_eq!(fake.sent_count(), before + 2);
        assert!(matches!(
            fake.last_sent(),
            Some(ApiRequest::CountByLevel { .. })
        ));
    }

    #[test]
    fn test_add_child_carries_org_code() {
        let fake = FakeBackend::new();
        let mut tool = OpdTool::new(fake.boxed(), filter(None));
        tool.apply_filter(&filter(Some("1.02")));
        fake.reply_ok(ApiPayload::Forest(vec![strategic(10)]));
        tool.tick();
        fake.reply_ok(ApiPayload::Counts(Vec::new()));
        tool.tick();

        tool.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        let form = tool
            .session
            .view
            .form(pokin_tree::FormKey::AddChild(10))
            .unwrap();
        match &form.mode {
            pokin_tree::FormMode::Create {
                org_unit_code,
                child,
                ..
            } => {
                assert_eq!(org_unit_code.as_deref(), Some("1.02"));
                assert_eq!(child.next_type, NodeType::Tactical);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }
}
