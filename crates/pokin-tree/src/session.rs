//! Ties a [`TreeView`] to a [`Backend`]: sends loads and mutations, routes
//! replies back to the view, and keeps refreshes single-flight.

use std::collections::HashMap;

use crossterm::event::KeyEvent;
use pokin_api::{ApiError, ApiPayload, ApiRequest, Backend, PerformanceNode, Ticket};
use pokin_core::keybinds::Action;
use pokin_core::notice::Notice;

use crate::form::{FormId, FormKey};
use crate::validate::validate_forest;
use crate::view::{TreeCallbacks, TreeView};

/// What the view currently displays, and therefore what a refresh fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSource {
    None,
    /// One theme's full tree.
    Theme(i64),
    /// The forest of an organisational unit.
    Opd { org_code: String, fiscal_year: i32 },
    /// All themes of a fiscal year, as a flat list.
    Themes { fiscal_year: i32 },
}

impl TreeSource {
    fn load_request(&self) -> Option<ApiRequest> {
        match self {
            TreeSource::None => None,
            TreeSource::Theme(id) => Some(ApiRequest::FetchTree { id: *id }),
            TreeSource::Opd {
                org_code,
                fiscal_year,
            } => Some(ApiRequest::FetchOpdForest {
                org_code: org_code.clone(),
                fiscal_year: *fiscal_year,
            }),
            TreeSource::Themes { fiscal_year } => Some(ApiRequest::ListThemes {
                fiscal_year: Some(*fiscal_year),
            }),
        }
    }
}

/// Something the owning tool may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Reply to a request the tool sent through [`TreeSession::submit_external`].
    External {
        ticket: Ticket,
        result: Result<ApiPayload, ApiError>,
    },
    /// Fresh data was fetched and is now displayed.
    Loaded,
    /// A create, update or delete succeeded.
    Mutated,
    /// The displayed root was deleted; the view is now empty.
    SourceCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Load { generation: u64 },
    Submit(FormId),
    Delete(i64),
    External,
}

/// Sends requests and tracks what each ticket was for.
struct Dispatcher {
    backend: Box<dyn Backend>,
    pending: HashMap<Ticket, Purpose>,
    source: TreeSource,
    /// Bumped on every source change so stale loads are dropped.
    generation: u64,
    loading: bool,
    refresh_queued: bool,
    notice: Option<Notice>,
}

impl Dispatcher {
    fn send(&mut self, request: ApiRequest, purpose: Purpose) -> Ticket {
        let ticket = self.backend.submit(request);
        self.pending.insert(ticket, purpose);
        ticket
    }

    /// Fetch the current source, or queue one refetch if a load is in flight.
    fn request_refresh(&mut self) {
        if self.loading {
            self.refresh_queued = true;
            return;
        }
        let Some(request) = self.source.load_request() else {
            return;
        };
        tracing::debug!(source = ?self.source, "loading tree");
        self.loading = true;
        let generation = self.generation;
        self.send(request, Purpose::Load { generation });
    }

    fn load_finished(&mut self) {
        self.loading = false;
        if self.refresh_queued {
            self.refresh_queued = false;
            self.request_refresh();
        }
    }
}

impl TreeCallbacks for Dispatcher {
    fn on_refresh(&mut self) {
        self.request_refresh();
    }

    fn on_delete(&mut self, node_id: i64) {
        tracing::info!(node_id, "deleting node");
        self.send(ApiRequest::DeleteNode { id: node_id }, Purpose::Delete(node_id));
    }

    fn on_submit(&mut self, form: FormId, request: ApiRequest) {
        tracing::info!(?form, method = request.method().as_str(), "submitting form");
        self.send(request, Purpose::Submit(form));
    }

    fn on_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }
}

/// A tree view bound to a backend.
pub struct TreeSession {
    pub view: TreeView,
    dispatcher: Dispatcher,
}

impl TreeSession {
    pub fn new(view: TreeView, backend: Box<dyn Backend>) -> Self {
        Self {
            view,
            dispatcher: Dispatcher {
                backend,
                pending: HashMap::new(),
                source: TreeSource::None,
                generation: 0,
                loading: false,
                refresh_queued: false,
                notice: None,
            },
        }
    }

    pub fn source(&self) -> &TreeSource {
        &self.dispatcher.source
    }

    /// Switch to a new source and load it. The view is cleared first.
    pub fn set_source(&mut self, source: TreeSource) {
        let d = &mut self.dispatcher;
        d.source = source;
        d.generation += 1;
        self.view.clear();
        d.request_refresh();
    }

    /// Refetch the current source (single-flight).
    pub fn refresh(&mut self) {
        self.dispatcher.request_refresh();
    }

    pub fn is_loading(&self) -> bool {
        self.dispatcher.loading
    }

    /// Send a request whose reply comes back as [`SessionEvent::External`].
    pub fn submit_external(&mut self, request: ApiRequest) -> Ticket {
        self.dispatcher.send(request, Purpose::External)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        self.view.handle_key(key, &mut self.dispatcher)
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.dispatcher.notice.as_ref()
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.dispatcher.notice = Some(notice);
    }

    /// Drain finished requests and apply them. Called every UI tick.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        if self.dispatcher.notice.as_ref().is_some_and(|n| n.expired()) {
            self.dispatcher.notice = None;
        }

        let mut events = Vec::new();
        while let Some(reply) = self.dispatcher.backend.poll() {
            let Some(purpose) = self.dispatcher.pending.remove(&reply.ticket) else {
                tracing::warn!(ticket = ?reply.ticket, "reply for unknown ticket");
                continue;
            };
            match purpose {
                Purpose::Load { generation } => {
                    if self.apply_load(generation, reply.result) {
                        events.push(SessionEvent::Loaded);
                    }
                }
                Purpose::Submit(form) => {
                    if let Some(event) = self.apply_submit(form, reply.result) {
                        events.push(event);
                    }
                }
                Purpose::Delete(id) => {
                    if let Some(event) = self.apply_delete(id, reply.result) {
                        events.push(event);
                    }
                }
                Purpose::External => events.push(SessionEvent::External {
                    ticket: reply.ticket,
                    result: reply.result,
                }),
            }
        }
        events
    }

    /// Returns true when the reply replaced the displayed data.
    fn apply_load(&mut self, generation: u64, result: Result<ApiPayload, ApiError>) -> bool {
        let mut loaded = false;
        if generation == self.dispatcher.generation {
            match result.map(|payload| self.roots_from(payload)) {
                Ok(Some(roots)) => match validate_forest(&roots) {
                    Ok(()) => {
                        tracing::info!(roots = roots.len(), "tree loaded");
                        self.view.set_roots(roots);
                        loaded = true;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "rejected malformed tree");
                        self.view.clear();
                        self.dispatcher.notice = Some(Notice::error(format!("Malformed tree: {e}")));
                    }
                },
                Ok(None) => {
                    tracing::warn!("load returned an unexpected payload");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "tree load failed");
                    self.dispatcher.notice = Some(failure_notice("Failed to load", &e));
                }
            }
        }
        self.dispatcher.load_finished();
        loaded
    }

    fn roots_from(&self, payload: ApiPayload) -> Option<Vec<PerformanceNode>> {
        match payload {
            ApiPayload::Tree(root) => Some(vec![root]),
            ApiPayload::Forest(roots) => Some(roots),
            ApiPayload::Themes(themes) => {
                let year = self.view.filter().fiscal_year;
                Some(themes.into_iter().map(|t| t.into_node(year)).collect())
            }
            ApiPayload::Counts(_) | ApiPayload::Done => None,
        }
    }

    fn apply_submit(
        &mut self,
        form: FormId,
        result: Result<ApiPayload, ApiError>,
    ) -> Option<SessionEvent> {
        match result {
            Ok(_) => {
                tracing::info!(?form, "form saved");
                let message = match form.key {
                    FormKey::Edit(_) => "Saved",
                    FormKey::AddChild(_) | FormKey::AddRoot => "Created",
                };
                self.dispatcher.notice = Some(Notice::info(message));
                self.view.finish_submit(form, Ok(()), &mut self.dispatcher);
                Some(SessionEvent::Mutated)
            }
            Err(e) => {
                tracing::warn!(?form, error = %e, "form submit failed");
                self.dispatcher.notice = Some(Notice::error(e.to_string()));
                self.view
                    .finish_submit(form, Err(e.to_string()), &mut self.dispatcher);
                None
            }
        }
    }

    fn apply_delete(
        &mut self,
        id: i64,
        result: Result<ApiPayload, ApiError>,
    ) -> Option<SessionEvent> {
        if let Err(e) = result {
            tracing::warn!(node_id = id, error = %e, "delete failed");
            self.dispatcher.notice = Some(failure_notice("Delete failed", &e));
            return None;
        }

        self.dispatcher.notice = Some(Notice::info("Deleted"));
        if self.dispatcher.source == TreeSource::Theme(id) {
            self.dispatcher.source = TreeSource::None;
            self.dispatcher.generation += 1;
            self.view.clear();
            return Some(SessionEvent::SourceCleared);
        }
        self.dispatcher.request_refresh();
        Some(SessionEvent::Mutated)
    }
}

/// Network failures are worth retrying as is; anything the server rejected
/// is not.
fn failure_notice(what: &str, error: &ApiError) -> Notice {
    if error.is_transport() {
        Notice::error(format!("{what}: {error}. Press r to retry"))
    } else {
        Notice::error(format!("{what}: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::tests::{node, sample_tree};
    use crate::view::RowTarget;
    use crossterm::event::{KeyCode, KeyModifiers};
    use pokin_api::ThemeSummary;
    use pokin_api::testing::FakeBackend;
    use pokin_core::settings::FilterContext;

    fn session() -> (TreeSession, FakeBackend) {
        let fake = FakeBackend::new();
        let view = TreeView::new(FilterContext {
            fiscal_year: 2025,
            org_unit: None,
        });
        (TreeSession::new(view, fake.boxed()), fake)
    }

    fn press(s: &mut TreeSession, code: KeyCode) {
        s.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(s: &mut TreeSession, c: char) {
        s.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    fn type_str(s: &mut TreeSession, text: &str) {
        for c in text.chars() {
            press(s, KeyCode::Char(c));
        }
    }

    fn loaded_theme() -> (TreeSession, FakeBackend) {
        let (mut s, fake) = session();
        s.set_source(TreeSource::Theme(1));
        assert_eq!(fake.last_sent(), Some(ApiRequest::FetchTree { id: 1 }));
        fake.reply_ok(ApiPayload::Tree(sample_tree()));
        s.tick();
        (s, fake)
    }

    #[test]
    fn test_load_displays_tree() {
        let (mut s, fake) = loaded_theme();
        assert_eq!(s.view.rows().len(), 1);
        assert!(!s.is_loading());

        s.refresh();
        fake.reply_ok(ApiPayload::Tree(sample_tree()));
        assert_eq!(s.tick(), vec![SessionEvent::Loaded]);
    }

    #[test]
    fn test_refresh_is_single_flight() {
        let (mut s, fake) = loaded_theme();
        let before = fake.sent_count();

        s.refresh();
        s.refresh();
        s.refresh();
        assert_eq!(fake.sent_count(), before + 1);

        fake.reply_ok(ApiPayload::Tree(sample_tree()));
        s.tick();
        // One queued refresh goes out when the first completes.
        assert_eq!(fake.sent_count(), before + 2);

        fake.reply_ok(ApiPayload::Tree(sample_tree()));
        s.tick();
        assert_eq!(fake.sent_count(), before + 2);
        assert!(!s.is_loading());
    }

    #[test]
    fn test_stale_load_is_dropped() {
        let (mut s, fake) = session();
        s.set_source(TreeSource::Theme(1));
        s.set_source(TreeSource::Theme(2));
        assert_eq!(fake.sent_count(), 1);

        let mut other = node(2, None, 0);
        other.name = "Other".to_string();
        fake.reply_ok(ApiPayload::Tree(sample_tree()));
        s.tick();
        assert!(s.view.is_empty());
        assert_eq!(fake.last_sent(), Some(ApiRequest::FetchTree { id: 2 }));

        fake.reply_ok(ApiPayload::Tree(other));
        s.tick();
        assert_eq!(s.view.rows()[0].title, "Other");
    }

    #[test]
    fn test_network_failure_offers_retry() {
        let (mut s, fake) = loaded_theme();
        s.refresh();
        fake.reply_next(Err(ApiError::Transport("connection refused".to_string())));
        assert!(s.tick().is_empty());
        assert!(s.notice().unwrap().message.ends_with("Press r to retry"));
        assert_eq!(s.view.rows().len(), 1);

        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('y'));
        fake.reply_err("Masih memiliki anak");
        s.tick();
        assert!(!s.notice().unwrap().message.contains("retry"));
    }

    #[test]
    fn test_malformed_tree_rejected() {
        let (mut s, fake) = session();
        s.set_source(TreeSource::Theme(1));
        let mut bad = sample_tree();
        bad.children[0].parent_id = Some(99);
        fake.reply_ok(ApiPayload::Tree(bad));
        s.tick();

        assert!(s.view.is_empty());
        let notice = s.notice().unwrap();
        assert!(notice.is_error());
        assert!(notice.message.contains("node 2"));
    }

    #[test]
    fn test_create_round_trip() {
        let (mut s, fake) = loaded_theme();
        press(&mut s, KeyCode::Char('a'));
        type_str(&mut s, "Sub A");
        press(&mut s, KeyCode::Tab);
        press(&mut s, KeyCode::Tab);
        type_str(&mut s, "X");
        press(&mut s, KeyCode::Tab);
        press(&mut s, KeyCode::Tab);
        type_str(&mut s, "10");
        press(&mut s, KeyCode::Tab);
        type_str(&mut s, "%");
        ctrl(&mut s, 's');
        ctrl(&mut s, 's');

        let sent = fake.sent();
        let creates: Vec<_> = sent
            .iter()
            .filter(|r| matches!(r, ApiRequest::CreateNode(_)))
            .collect();
        assert_eq!(creates.len(), 1);
        let before = fake.sent_count();

        fake.reply_ok(ApiPayload::Done);
        let events = s.tick();
        assert_eq!(events, vec![SessionEvent::Mutated]);
        assert_eq!(fake.sent_count(), before + 1);
        assert_eq!(fake.last_sent(), Some(ApiRequest::FetchTree { id: 1 }));
        assert!(!s.view.flags(1).add_child_open);

        // Server now returns the new child with its indicator.
        let mut tree = sample_tree();
        let mut created = node(5, Some(1), 1);
        created.indicators = vec![pokin_api::Indicator {
            id: Some(9),
            text: "X".to_string(),
            description: None,
            fiscal_year: Some(2025),
            targets: vec![pokin_api::Target {
                id: Some(90),
                value: 10.0,
                unit: "%".to_string(),
                fiscal_year: Some(2025),
            }],
        }];
        tree.children.push(created);
        fake.reply_ok(ApiPayload::Tree(tree));
        s.tick();

        let fetched = s.view.node(5).unwrap();
        assert_eq!(fetched.indicators.len(), 1);
        assert_eq!(fetched.indicators[0].targets.len(), 1);
        assert_eq!(fetched.indicators[0].targets[0].value, 10.0);
        assert_eq!(fetched.indicators[0].targets[0].unit, "%");
    }

    #[test]
    fn test_failed_create_keeps_form_and_data() {
        let (mut s, fake) = loaded_theme();
        press(&mut s, KeyCode::Char('a'));
        type_str(&mut s, "Sub A");
        s.view
            .form_mut(FormKey::AddChild(1))
            .unwrap()
            .draft
            .input_mut(crate::form::FieldRef::IndicatorText(0))
            .unwrap()
            .set("X");
        let draft = &mut s.view.form_mut(FormKey::AddChild(1)).unwrap().draft;
        draft
            .input_mut(crate::form::FieldRef::TargetValue(0, 0))
            .unwrap()
            .set("1");
        draft
            .input_mut(crate::form::FieldRef::TargetUnit(0, 0))
            .unwrap()
            .set("dok");
        ctrl(&mut s, 's');
        let before = fake.sent_count();

        fake.reply_err("Nama sudah dipakai");
        assert!(s.tick().is_empty());
        assert_eq!(fake.sent_count(), before);

        let form = s.view.form(FormKey::AddChild(1)).unwrap();
        assert!(!form.busy);
        assert_eq!(form.draft.name.value(), "Sub A");
        assert!(form.error.as_deref().unwrap().contains("Nama sudah dipakai"));
        assert!(s.notice().unwrap().is_error());
    }

    #[test]
    fn test_deleting_displayed_root_clears_view() {
        let (mut s, fake) = loaded_theme();
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('y'));
        assert_eq!(fake.last_sent(), Some(ApiRequest::DeleteNode { id: 1 }));
        let before = fake.sent_count();

        fake.reply_ok(ApiPayload::Done);
        assert_eq!(s.tick(), vec![SessionEvent::SourceCleared]);
        assert_eq!(s.source(), &TreeSource::None);
        assert!(s.view.is_empty());
        assert_eq!(s.view.selected_target(), None);
        assert_eq!(fake.sent_count(), before);
    }

    #[test]
    fn test_deleting_child_refreshes() {
        let (mut s, fake) = loaded_theme();
        s.view.toggle_expanded(1);
        s.view.select(RowTarget::Node(3));
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('y'));
        assert_eq!(fake.last_sent(), Some(ApiRequest::DeleteNode { id: 3 }));

        fake.reply_ok(ApiPayload::Done);
        assert_eq!(s.tick(), vec![SessionEvent::Mutated]);
        assert_eq!(fake.last_sent(), Some(ApiRequest::FetchTree { id: 1 }));
    }

    #[test]
    fn test_failed_delete_keeps_tree() {
        let (mut s, fake) = loaded_theme();
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('y'));
        fake.reply_err("Masih memiliki anak");
        assert!(s.tick().is_empty());
        assert!(!s.view.is_empty());
        assert!(s.notice().unwrap().message.contains("Masih memiliki anak"));
    }

    #[test]
    fn test_themes_source_lists_flat_nodes() {
        let (mut s, fake) = session();
        s.set_source(TreeSource::Themes { fiscal_year: 2025 });
        assert_eq!(
            fake.last_sent(),
            Some(ApiRequest::ListThemes {
                fiscal_year: Some(2025)
            })
        );
        let themes: Vec<ThemeSummary> = serde_json_themes();
        fake.reply_ok(ApiPayload::Themes(themes));
        s.tick();
        assert_eq!(s.view.rows().len(), 2);
        assert_eq!(s.view.rows()[1].title, "Kesehatan");
    }

    fn serde_json_themes() -> Vec<ThemeSummary> {
        vec![
            ThemeSummary {
                id: 1,
                name: Some("Pendidikan".to_string()),
                tema: None,
                description: None,
                fiscal_year: Some(2025),
                status: Default::default(),
                region_code: None,
                indicators: Vec::new(),
            },
            ThemeSummary {
                id: 2,
                name: None,
                tema: Some("Kesehatan".to_string()),
                description: None,
                fiscal_year: None,
                status: Default::default(),
                region_code: None,
                indicators: Vec::new(),
            },
        ]
    }

    #[test]
    fn test_external_replies_pass_through() {
        let (mut s, fake) = session();
        let ticket = s.submit_external(ApiRequest::CountByLevel {
            org_code: "1.02".to_string(),
            fiscal_year: 2025,
        });
        fake.reply_ok(ApiPayload::Counts(Vec::new()));
        assert_eq!(
            s.tick(),
            vec![SessionEvent::External {
                ticket,
                result: Ok(ApiPayload::Counts(Vec::new()))
            }]
        );
    }
}
