//! Tree view state: the fetched roots, per-node UI flags and the open forms.
//!
//! Node data is never mutated here. Rows are recomputed from the roots and
//! the flags by a pure walk ([`flatten`]) whenever either changes.

use std::collections::{HashMap, HashSet};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pokin_api::{ApiRequest, PerformanceNode, find_in};
use pokin_core::keybinds::{Action, InputMode, Key, KeyState, keys_label, process_normal_key};
use pokin_core::notice::Notice;
use pokin_core::settings::FilterContext;

use crate::form::{FieldRef, FormId, FormKey, NodeForm};
use crate::level::{ChildInfo, child_info_for};

/// Hooks the view calls back into. One bundle serves every depth of the tree.
pub trait TreeCallbacks {
    /// Refetch the displayed data.
    fn on_refresh(&mut self);
    /// The user confirmed deletion of `node_id`.
    fn on_delete(&mut self, node_id: i64);
    /// A form passed validation; send `request` on its behalf and hand
    /// `form` back to [`TreeView::finish_submit`] with the outcome.
    fn on_submit(&mut self, form: FormId, request: ApiRequest);
    /// Show a transient message.
    fn on_notice(&mut self, _notice: Notice) {}
}

/// What a key does while a form has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormCommand {
    NextField,
    PrevField,
    Save,
    AddIndicator,
    /// Only create forms take extra targets.
    AddTarget,
    /// Remove the focused target or indikator.
    Remove,
    /// Back to the tree; the form stays open.
    Leave,
}

impl FormCommand {
    pub fn describe(self) -> &'static str {
        match self {
            Self::NextField => "Next field",
            Self::PrevField => "Previous field",
            Self::Save => "Save",
            Self::AddIndicator => "Add indikator",
            Self::AddTarget => "Add target (create form)",
            Self::Remove => "Remove focused target or indikator",
            Self::Leave => "Back to tree, form stays open",
        }
    }

    /// Word for the hint line under a focused form.
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::NextField => Some("next"),
            Self::PrevField => None,
            Self::Save => Some("save"),
            Self::AddIndicator => Some("indikator"),
            Self::AddTarget => Some("target"),
            Self::Remove => Some("remove"),
            Self::Leave => Some("leave"),
        }
    }
}

pub struct FormBinding {
    pub keys: &'static [Key],
    pub command: FormCommand,
}

impl FormBinding {
    pub fn label(&self) -> String {
        keys_label(self.keys)
    }
}

/// Keys a focused form reserves. Anything else edits the focused field.
pub const FORM_KEYS: &[FormBinding] = &[
    FormBinding {
        keys: &[
            Key::Code(KeyCode::Tab),
            Key::Code(KeyCode::Down),
            Key::Code(KeyCode::Enter),
        ],
        command: FormCommand::NextField,
    },
    FormBinding {
        keys: &[Key::Code(KeyCode::BackTab), Key::Code(KeyCode::Up)],
        command: FormCommand::PrevField,
    },
    FormBinding {
        keys: &[Key::Ctrl('s')],
        command: FormCommand::Save,
    },
    FormBinding {
        keys: &[Key::Ctrl('n')],
        command: FormCommand::AddIndicator,
    },
    FormBinding {
        keys: &[Key::Ctrl('t')],
        command: FormCommand::AddTarget,
    },
    FormBinding {
        keys: &[Key::Ctrl('x')],
        command: FormCommand::Remove,
    },
    FormBinding {
        keys: &[Key::Code(KeyCode::Esc)],
        command: FormCommand::Leave,
    },
];

fn form_command(key: &KeyEvent) -> Option<FormCommand> {
    FORM_KEYS
        .iter()
        .find(|b| b.keys.iter().any(|k| k.matches(key)))
        .map(|b| b.command)
}

/// Per-node UI state. All three start false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    pub expanded: bool,
    pub editing: bool,
    pub add_child_open: bool,
}

/// What a visible row stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowTarget {
    Node(i64),
    /// Edit form shown in place of the node.
    Edit(i64),
    /// Create form listed after the node's children.
    AddChild(i64),
    AddRoot,
}

impl RowTarget {
    pub fn form_key(&self) -> Option<FormKey> {
        match *self {
            RowTarget::Node(_) => None,
            RowTarget::Edit(id) => Some(FormKey::Edit(id)),
            RowTarget::AddChild(id) => Some(FormKey::AddChild(id)),
            RowTarget::AddRoot => Some(FormKey::AddRoot),
        }
    }

    /// The node the row belongs to (the parent, for add-child rows).
    pub fn node_id(&self) -> Option<i64> {
        match *self {
            RowTarget::Node(id) | RowTarget::Edit(id) | RowTarget::AddChild(id) => Some(id),
            RowTarget::AddRoot => None,
        }
    }
}

/// One visible line of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub target: RowTarget,
    pub depth: usize,
    /// For each depth 0..depth, whether a vertical guide (│) is drawn:
    /// the ancestor at that depth has more siblings below.
    pub guides: Vec<bool>,
    /// Level used for styling (the new node's level for add-child rows).
    pub level: i32,
    pub title: String,
    pub expanded: bool,
    pub has_children: bool,
}

pub struct TreeView {
    roots: Vec<PerformanceNode>,
    rows: Vec<Row>,
    selected: usize,
    expanded: HashSet<i64>,
    add_forms: HashMap<i64, NodeForm>,
    edit_forms: HashMap<i64, NodeForm>,
    root_form: Option<NodeForm>,
    /// When set, `a` opens a root create form of this kind instead of a child form.
    root_add: Option<ChildInfo>,
    focus: Option<FormKey>,
    confirm_delete: Option<i64>,
    key_state: KeyState,
    filter: FilterContext,
    visible_height: usize,
    next_stamp: u64,
}

impl TreeView {
    pub fn new(filter: FilterContext) -> Self {
        Self {
            roots: Vec::new(),
            rows: Vec::new(),
            selected: 0,
            expanded: HashSet::new(),
            add_forms: HashMap::new(),
            edit_forms: HashMap::new(),
            root_form: None,
            root_add: None,
            focus: None,
            confirm_delete: None,
            key_state: KeyState::default(),
            filter,
            visible_height: 20,
            next_stamp: 1,
        }
    }

    /// A flat list whose `a` key creates new roots of the given kind.
    pub fn with_root_add(mut self, child: ChildInfo) -> Self {
        self.root_add = Some(child);
        self
    }

    // ── Data ─────────────────────────────────────────────────────────

    pub fn roots(&self) -> &[PerformanceNode] {
        &self.roots
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node(&self, id: i64) -> Option<&PerformanceNode> {
        find_in(&self.roots, id)
    }

    /// Replace the displayed data after a fetch. UI state of nodes that no
    /// longer exist is dropped; everything else survives the refresh.
    pub fn set_roots(&mut self, roots: Vec<PerformanceNode>) {
        self.roots = roots;
        let mut ids = HashSet::new();
        collect_ids(&self.roots, &mut ids);

        self.expanded.retain(|id| ids.contains(id));
        self.add_forms.retain(|id, _| ids.contains(id));
        self.edit_forms.retain(|id, _| ids.contains(id));
        if self.confirm_delete.is_some_and(|id| !ids.contains(&id)) {
            self.confirm_delete = None;
        }
        if self.focus.is_some_and(|key| !self.has_form(key)) {
            self.focus = None;
        }
        self.rebuild();
    }

    /// Drop all data and UI state.
    pub fn clear(&mut self) {
        self.roots.clear();
        self.expanded.clear();
        self.add_forms.clear();
        self.edit_forms.clear();
        self.root_form = None;
        self.focus = None;
        self.confirm_delete = None;
        self.key_state.reset();
        self.rows.clear();
        self.selected = 0;
    }

    pub fn filter(&self) -> &FilterContext {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterContext) {
        self.filter = filter;
    }

    // ── Flags ────────────────────────────────────────────────────────

    pub fn flags(&self, id: i64) -> NodeFlags {
        NodeFlags {
            expanded: self.expanded.contains(&id),
            editing: self.edit_forms.contains_key(&id),
            add_child_open: self.add_forms.contains_key(&id),
        }
    }

    /// Flip the expanded flag of `id`. Only the flag changes; expanding never
    /// fetches because the whole tree is already loaded.
    pub fn toggle_expanded(&mut self, id: i64) {
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
        }
        self.rebuild();
    }

    pub fn set_expanded(&mut self, id: i64, expanded: bool) {
        let changed = if expanded {
            self.expanded.insert(id)
        } else {
            self.expanded.remove(&id)
        };
        if changed {
            self.rebuild();
        }
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.selected)
    }

    pub fn selected_target(&self) -> Option<RowTarget> {
        self.selected_row().map(|r| r.target)
    }

    /// The node under the cursor (the parent node on an add-child row).
    pub fn selected_node(&self) -> Option<&PerformanceNode> {
        self.selected_target()
            .and_then(|t| t.node_id())
            .and_then(|id| self.node(id))
    }

    pub fn select(&mut self, target: RowTarget) {
        if let Some(pos) = self.rows.iter().position(|r| r.target == target) {
            self.selected = pos;
        }
    }

    pub fn move_down(&mut self, n: usize) {
        if !self.rows.is_empty() {
            self.selected = (self.selected + n).min(self.rows.len() - 1);
        }
    }

    pub fn move_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn goto_top(&mut self) {
        self.selected = 0;
    }

    pub fn goto_bottom(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }

    /// Remember how many rows fit, for half-page moves.
    pub fn set_visible_height(&mut self, height: usize) {
        self.visible_height = height.max(2);
    }

    /// Expand the selected node (no-op on leaves and form rows).
    pub fn expand_selected(&mut self) {
        if let Some(RowTarget::Node(id)) = self.selected_target() {
            if self.node(id).is_some_and(|n| n.has_children()) {
                self.set_expanded(id, true);
            }
        }
    }

    /// Collapse the selected node, or move to its parent when it is
    /// already collapsed or a leaf.
    pub fn collapse_or_parent(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if let RowTarget::Node(id) = row.target {
            if row.expanded && row.has_children {
                self.set_expanded(id, false);
                return;
            }
        }
        let parent = match row.target {
            RowTarget::AddChild(id) => Some(id),
            RowTarget::Node(id) | RowTarget::Edit(id) => self.node(id).and_then(|n| n.parent_id),
            RowTarget::AddRoot => None,
        };
        if let Some(pid) = parent {
            self.select(RowTarget::Node(pid));
        }
    }

    // ── Forms ────────────────────────────────────────────────────────

    pub fn focus(&self) -> Option<FormKey> {
        self.focus
    }

    pub fn mode(&self) -> InputMode {
        if self.focus.is_some() {
            InputMode::Insert
        } else {
            InputMode::Normal
        }
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.confirm_delete
    }

    pub fn form(&self, key: FormKey) -> Option<&NodeForm> {
        match key {
            FormKey::AddChild(id) => self.add_forms.get(&id),
            FormKey::Edit(id) => self.edit_forms.get(&id),
            FormKey::AddRoot => self.root_form.as_ref(),
        }
    }

    pub fn form_mut(&mut self, key: FormKey) -> Option<&mut NodeForm> {
        match key {
            FormKey::AddChild(id) => self.add_forms.get_mut(&id),
            FormKey::Edit(id) => self.edit_forms.get_mut(&id),
            FormKey::AddRoot => self.root_form.as_mut(),
        }
    }

    pub fn has_form(&self, key: FormKey) -> bool {
        self.form(key).is_some()
    }

    pub fn open_form_count(&self) -> usize {
        self.add_forms.len() + self.edit_forms.len() + usize::from(self.root_form.is_some())
    }

    /// Open (or refocus) the create form under `parent_id`. Returns false if
    /// the node is terminal.
    pub fn open_add_child(&mut self, parent_id: i64) -> bool {
        let Some(parent) = self.node(parent_id) else {
            return false;
        };
        let Some(child) = child_info_for(parent.level) else {
            return false;
        };
        if !self.add_forms.contains_key(&parent_id) {
            let org_code = self
                .filter
                .org_code()
                .map(str::to_string)
                .or_else(|| parent.org_unit_code.clone());
            let form = NodeForm::create(Some(parent_id), child, parent.fiscal_year, org_code);
            let form = self.stamped(form);
            self.add_forms.insert(parent_id, form);
        }
        self.focus_form(FormKey::AddChild(parent_id));
        true
    }

    /// Open (or refocus) the root create form. Returns false if the view
    /// has no root kind configured.
    pub fn open_add_root(&mut self) -> bool {
        let Some(child) = self.root_add else {
            return false;
        };
        if self.root_form.is_none() {
            let org_code = self.filter.org_code().map(str::to_string);
            let form = NodeForm::create(None, child, self.filter.fiscal_year, org_code);
            self.root_form = Some(self.stamped(form));
        }
        self.focus_form(FormKey::AddRoot);
        true
    }

    /// Open (or refocus) the in-place edit form for `id`.
    pub fn open_edit(&mut self, id: i64) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !self.edit_forms.contains_key(&id) {
            let form = NodeForm::edit(node);
            let form = self.stamped(form);
            self.edit_forms.insert(id, form);
        }
        self.focus_form(FormKey::Edit(id));
        true
    }

    fn stamped(&mut self, mut form: NodeForm) -> NodeForm {
        form.stamp = self.next_stamp;
        self.next_stamp += 1;
        form
    }

    /// The current opening of the form under `key`, if it is open.
    pub fn form_id(&self, key: FormKey) -> Option<FormId> {
        self.form(key).map(|form| FormId {
            key,
            stamp: form.stamp,
        })
    }

    /// Close a form and discard its state.
    pub fn close_form(&mut self, key: FormKey) {
        match key {
            FormKey::AddChild(id) => {
                self.add_forms.remove(&id);
            }
            FormKey::Edit(id) => {
                self.edit_forms.remove(&id);
            }
            FormKey::AddRoot => self.root_form = None,
        }
        if self.focus == Some(key) {
            self.focus = None;
        }
        let node_row = match key {
            FormKey::AddChild(id) | FormKey::Edit(id) => Some(RowTarget::Node(id)),
            FormKey::AddRoot => None,
        };
        self.rebuild();
        if let Some(target) = node_row {
            self.select(target);
        }
    }

    fn focus_form(&mut self, key: FormKey) {
        self.focus = Some(key);
        self.key_state.reset();
        self.rebuild();
        let target = match key {
            FormKey::AddChild(id) => RowTarget::AddChild(id),
            FormKey::Edit(id) => RowTarget::Edit(id),
            FormKey::AddRoot => RowTarget::AddRoot,
        };
        self.select(target);
    }

    /// Leave the form; it stays open.
    pub fn unfocus_form(&mut self) {
        self.focus = None;
    }

    /// Validate the form and hand the request to `callbacks`. Ignored while
    /// a previous submit of the same form is in flight.
    pub fn submit_form(&mut self, key: FormKey, callbacks: &mut dyn TreeCallbacks) {
        let Some(form) = self.form_mut(key) else {
            return;
        };
        if form.busy {
            return;
        }
        match form.build_request() {
            Ok(request) => {
                form.busy = true;
                form.error = None;
                let id = FormId {
                    key,
                    stamp: form.stamp,
                };
                callbacks.on_submit(id, request);
            }
            Err(e) => form.error = Some(e.to_string()),
        }
    }

    /// Complete a submit. Success closes the form and refreshes once;
    /// failure keeps the form and its data and shows the message in it.
    /// A form reopened since the submit is left alone either way.
    pub fn finish_submit(
        &mut self,
        id: FormId,
        result: Result<(), String>,
        callbacks: &mut dyn TreeCallbacks,
    ) {
        let same_form = self.form_id(id.key) == Some(id);
        match result {
            Ok(()) => {
                if same_form {
                    self.close_form(id.key);
                }
                callbacks.on_refresh();
            }
            Err(message) => {
                if !same_form {
                    return;
                }
                if let Some(form) = self.form_mut(id.key) {
                    form.busy = false;
                    form.error = Some(message);
                }
            }
        }
    }

    // ── Keys ─────────────────────────────────────────────────────────

    pub fn reset_key_state(&mut self) {
        self.key_state.reset();
        self.confirm_delete = None;
    }

    /// Handle a key. Actions the view does not own are returned for the
    /// caller to bubble; everything else comes back as `Action::None`.
    pub fn handle_key(&mut self, key: KeyEvent, callbacks: &mut dyn TreeCallbacks) -> Action {
        if let Some(form) = self.focus {
            return self.handle_form_key(form, key, callbacks);
        }

        if let Some(id) = self.confirm_delete.take() {
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                callbacks.on_delete(id);
            }
            return Action::None;
        }

        let action = process_normal_key(key, &mut self.key_state);
        match action {
            Action::MoveDown(n) => self.move_down(n),
            Action::MoveUp(n) => self.move_up(n),
            Action::GotoTop => self.goto_top(),
            Action::GotoBottom => self.goto_bottom(),
            Action::HalfPageDown => self.move_down(self.visible_height / 2),
            Action::HalfPageUp => self.move_up(self.visible_height / 2),
            Action::Confirm => match self.selected_target() {
                Some(RowTarget::Node(id)) => {
                    if self.node(id).is_some_and(|n| n.has_children()) {
                        self.toggle_expanded(id);
                    }
                }
                Some(target) => {
                    if let Some(form) = target.form_key() {
                        self.focus_form(form);
                    }
                }
                None => {}
            },
            Action::Expand => self.expand_selected(),
            Action::Collapse => self.collapse_or_parent(),
            Action::Add => self.add_from_selection(callbacks),
            Action::Edit => {
                if let Some(RowTarget::Node(id) | RowTarget::Edit(id)) = self.selected_target() {
                    self.open_edit(id);
                }
            }
            Action::Delete => {
                if let Some(RowTarget::Node(id)) = self.selected_target() {
                    self.confirm_delete = Some(id);
                }
            }
            Action::CloseForm => {
                if let Some(form) = self.selected_target().and_then(|t| t.form_key()) {
                    self.close_form(form);
                }
            }
            Action::Refresh => callbacks.on_refresh(),
            other => return other,
        }
        Action::None
    }

    fn add_from_selection(&mut self, callbacks: &mut dyn TreeCallbacks) {
        if self.root_add.is_some() {
            self.open_add_root();
            return;
        }
        let Some(id) = self.selected_target().and_then(|t| t.node_id()) else {
            return;
        };
        if self.open_add_child(id) {
            return;
        }
        if let Some(node) = self.node(id) {
            callbacks.on_notice(Notice::info(format!(
                "{} is the last level; it has no children",
                node.node_type.label()
            )));
        }
    }

    fn handle_form_key(
        &mut self,
        key_ref: FormKey,
        key: KeyEvent,
        callbacks: &mut dyn TreeCallbacks,
    ) -> Action {
        let command = form_command(&key);
        match command {
            Some(FormCommand::Leave) => {
                self.focus = None;
                return Action::None;
            }
            Some(FormCommand::Save) => {
                self.submit_form(key_ref, callbacks);
                return Action::None;
            }
            _ => {}
        }

        let Some(form) = self.form_mut(key_ref) else {
            self.focus = None;
            return Action::None;
        };

        if let Some(command) = command {
            match command {
                FormCommand::AddIndicator => form.draft.add_indicator(),
                FormCommand::AddTarget => form.add_target_to_focused(),
                FormCommand::Remove => {
                    if let Err(e) = form.draft.remove_focused() {
                        form.error = Some(e.to_string());
                    }
                }
                FormCommand::NextField => form.draft.focus_next(),
                FormCommand::PrevField => form.draft.focus_prev(),
                FormCommand::Leave | FormCommand::Save => {}
            }
            return Action::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Left => edit_focused(form, |i| i.move_left()),
            KeyCode::Right => edit_focused(form, |i| i.move_right()),
            KeyCode::Home => edit_focused(form, |i| i.move_home()),
            KeyCode::End => edit_focused(form, |i| i.move_end()),
            KeyCode::Backspace => edit_focused(form, |i| i.backspace()),
            KeyCode::Char(c) if !ctrl => edit_focused(form, |i| i.insert_char(c)),
            _ => {}
        }
        Action::None
    }

    // ── Rows ─────────────────────────────────────────────────────────

    fn rebuild(&mut self) {
        let old = self.selected_target();
        self.rows = flatten(
            &self.roots,
            &self.expanded,
            &self.add_forms,
            &self.edit_forms,
            self.root_form.as_ref(),
        );

        if let Some(pos) = old.and_then(|t| self.rows.iter().position(|r| r.target == t)) {
            self.selected = pos;
            return;
        }
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }
}

fn edit_focused(form: &mut NodeForm, f: impl FnOnce(&mut pokin_core::text_input::TextInput)) {
    if let Some(input) = form.draft.focused_input_mut() {
        f(input);
    }
}

fn collect_ids(nodes: &[PerformanceNode], out: &mut HashSet<i64>) {
    for node in nodes {
        out.insert(node.id);
        collect_ids(&node.children, out);
    }
}

/// Walk the roots and emit the visible rows.
pub fn flatten(
    roots: &[PerformanceNode],
    expanded: &HashSet<i64>,
    add_forms: &HashMap<i64, NodeForm>,
    edit_forms: &HashMap<i64, NodeForm>,
    root_form: Option<&NodeForm>,
) -> Vec<Row> {
    let mut rows = Vec::new();
    let walk = Walk {
        expanded,
        add_forms,
        edit_forms,
    };
    walk.nodes(roots, 0, &[], root_form.is_some(), &mut rows);

    if let Some(form) = root_form {
        rows.push(Row {
            target: RowTarget::AddRoot,
            depth: 0,
            guides: Vec::new(),
            level: form.level(),
            title: form.title(),
            expanded: false,
            has_children: false,
        });
    }
    rows
}

struct Walk<'a> {
    expanded: &'a HashSet<i64>,
    add_forms: &'a HashMap<i64, NodeForm>,
    edit_forms: &'a HashMap<i64, NodeForm>,
}

impl Walk<'_> {
    /// `trailing` is true when another row follows this sibling group at
    /// the same depth (an add-form row).
    fn nodes(
        &self,
        nodes: &[PerformanceNode],
        depth: usize,
        guides: &[bool],
        trailing: bool,
        out: &mut Vec<Row>,
    ) {
        for (i, node) in nodes.iter().enumerate() {
            let has_more = i + 1 < nodes.len() || trailing;
            let expanded = self.expanded.contains(&node.id);
            let target = if self.edit_forms.contains_key(&node.id) {
                RowTarget::Edit(node.id)
            } else {
                RowTarget::Node(node.id)
            };

            out.push(Row {
                target,
                depth,
                guides: guides.to_vec(),
                level: node.level,
                title: node.name.clone(),
                expanded,
                has_children: node.has_children(),
            });

            let add_form = self.add_forms.get(&node.id);
            let mut child_guides = guides.to_vec();
            child_guides.push(has_more);

            if expanded && node.has_children() {
                self.nodes(&node.children, depth + 1, &child_guides, add_form.is_some(), out);
            }

            if let Some(form) = add_form {
                out.push(Row {
                    target: RowTarget::AddChild(node.id),
                    depth: depth + 1,
                    guides: child_guides,
                    level: form.level(),
                    title: form.title(),
                    expanded: false,
                    has_children: false,
                });
            }
        }
    }
}
