//! Create and edit forms for a node with its indicators and targets.
//!
//! Both forms share one draft shape. Edits to the draft are local; nothing
//! reaches the backend until [`NodeForm::build_request`] succeeds and the
//! caller submits the request.

use pokin_api::{
    ApiRequest, IndicatorPayload, NodePayload, NodeStatus, NodeType, PerformanceNode,
    TargetPayload,
};
use pokin_core::text_input::TextInput;
use thiserror::Error;

use crate::level::ChildInfo;

/// Client-side validation failures. Positions are 1-based for display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Name is required")]
    MissingName,

    #[error("Indicator {indicator}: text is required")]
    MissingIndicatorText { indicator: usize },

    #[error("Indicator {indicator}: at least one target is required")]
    NoTargets { indicator: usize },

    #[error("Indicator {indicator}, target {target}: value is required")]
    MissingValue { indicator: usize, target: usize },

    #[error("Indicator {indicator}, target {target}: {value:?} is not a number")]
    NotANumber {
        indicator: usize,
        target: usize,
        value: String,
    },

    #[error("Indicator {indicator}, target {target}: unit is required")]
    MissingUnit { indicator: usize, target: usize },

    #[error("An indicator needs at least one target")]
    LastTarget,
}

/// Identifies an open form inside a tree view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKey {
    /// Create form under the node with this id.
    AddChild(i64),
    /// Create form for a new root.
    AddRoot,
    /// Edit form replacing the node with this id.
    Edit(i64),
}

/// One opening of a form. Closing and reopening a form under the same key
/// yields a new stamp, so replies meant for the old one can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormId {
    pub key: FormKey,
    pub stamp: u64,
}

/// One focusable input of a form, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef {
    Name,
    Description,
    IndicatorText(usize),
    IndicatorNote(usize),
    TargetValue(usize, usize),
    TargetUnit(usize, usize),
}

impl FieldRef {
    pub fn indicator(&self) -> Option<usize> {
        match *self {
            FieldRef::Name | FieldRef::Description => None,
            FieldRef::IndicatorText(i)
            | FieldRef::IndicatorNote(i)
            | FieldRef::TargetValue(i, _)
            | FieldRef::TargetUnit(i, _) => Some(i),
        }
    }

    pub fn target(&self) -> Option<(usize, usize)> {
        match *self {
            FieldRef::TargetValue(i, j) | FieldRef::TargetUnit(i, j) => Some((i, j)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetDraft {
    pub id: Option<i64>,
    pub value: TextInput,
    pub unit: TextInput,
}

#[derive(Debug, Clone)]
pub struct IndicatorDraft {
    pub id: Option<i64>,
    pub text: TextInput,
    pub note: TextInput,
    pub targets: Vec<TargetDraft>,
}

impl IndicatorDraft {
    fn empty() -> Self {
        Self {
            id: None,
            text: TextInput::new(),
            note: TextInput::new(),
            targets: vec![TargetDraft::default()],
        }
    }
}

/// Editable content shared by the create and edit forms.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub name: TextInput,
    pub description: TextInput,
    pub indicators: Vec<IndicatorDraft>,
    focus: usize,
}

impl Default for NodeDraft {
    /// One empty indicator holding one empty target.
    fn default() -> Self {
        Self {
            name: TextInput::new(),
            description: TextInput::new(),
            indicators: vec![IndicatorDraft::empty()],
            focus: 0,
        }
    }
}

impl NodeDraft {
    /// All inputs in tab order.
    pub fn fields(&self) -> Vec<FieldRef> {
        let mut fields = vec![FieldRef::Name, FieldRef::Description];
        for (i, ind) in self.indicators.iter().enumerate() {
            fields.push(FieldRef::IndicatorText(i));
            fields.push(FieldRef::IndicatorNote(i));
            for j in 0..ind.targets.len() {
                fields.push(FieldRef::TargetValue(i, j));
                fields.push(FieldRef::TargetUnit(i, j));
            }
        }
        fields
    }

    pub fn focused(&self) -> FieldRef {
        let fields = self.fields();
        fields
            .get(self.focus.min(fields.len() - 1))
            .copied()
            .unwrap_or(FieldRef::Name)
    }

    pub fn focus_next(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + 1) % len;
    }

    pub fn focus_prev(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn focus_field(&mut self, field: FieldRef) {
        if let Some(pos) = self.fields().iter().position(|f| *f == field) {
            self.focus = pos;
        }
    }

    pub fn input(&self, field: FieldRef) -> Option<&TextInput> {
        match field {
            FieldRef::Name => Some(&self.name),
            FieldRef::Description => Some(&self.description),
            FieldRef::IndicatorText(i) => self.indicators.get(i).map(|ind| &ind.text),
            FieldRef::IndicatorNote(i) => self.indicators.get(i).map(|ind| &ind.note),
            FieldRef::TargetValue(i, j) => self.target(i, j).map(|t| &t.value),
            FieldRef::TargetUnit(i, j) => self.target(i, j).map(|t| &t.unit),
        }
    }

    pub fn input_mut(&mut self, field: FieldRef) -> Option<&mut TextInput> {
        match field {
            FieldRef::Name => Some(&mut self.name),
            FieldRef::Description => Some(&mut self.description),
            FieldRef::IndicatorText(i) => self.indicators.get_mut(i).map(|ind| &mut ind.text),
            FieldRef::IndicatorNote(i) => self.indicators.get_mut(i).map(|ind| &mut ind.note),
            FieldRef::TargetValue(i, j) => self.target_mut(i, j).map(|t| &mut t.value),
            FieldRef::TargetUnit(i, j) => self.target_mut(i, j).map(|t| &mut t.unit),
        }
    }

    pub fn focused_input_mut(&mut self) -> Option<&mut TextInput> {
        let field = self.focused();
        self.input_mut(field)
    }

    fn target(&self, i: usize, j: usize) -> Option<&TargetDraft> {
        self.indicators.get(i).and_then(|ind| ind.targets.get(j))
    }

    fn target_mut(&mut self, i: usize, j: usize) -> Option<&mut TargetDraft> {
        self.indicators.get_mut(i).and_then(|ind| ind.targets.get_mut(j))
    }

    /// Append an empty indicator with one empty target and focus its text.
    pub fn add_indicator(&mut self) {
        self.indicators.push(IndicatorDraft::empty());
        self.focus_field(FieldRef::IndicatorText(self.indicators.len() - 1));
    }

    pub fn remove_indicator(&mut self, index: usize) {
        if index >= self.indicators.len() {
            return;
        }
        self.indicators.remove(index);
        let fallback = match self.indicators.len() {
            0 => FieldRef::Description,
            n => FieldRef::IndicatorText(index.min(n - 1)),
        };
        self.focus_field(fallback);
    }

    /// Append an empty target to indicator `index` and focus its value.
    pub fn add_target(&mut self, index: usize) {
        if let Some(ind) = self.indicators.get_mut(index) {
            ind.targets.push(TargetDraft::default());
            let j = ind.targets.len() - 1;
            self.focus_field(FieldRef::TargetValue(index, j));
        }
    }

    /// Remove a target. The last target of an indicator is kept.
    pub fn remove_target(&mut self, index: usize, target: usize) -> Result<(), FormError> {
        let Some(ind) = self.indicators.get_mut(index) else {
            return Ok(());
        };
        if target >= ind.targets.len() {
            return Ok(());
        }
        if ind.targets.len() == 1 {
            return Err(FormError::LastTarget);
        }
        ind.targets.remove(target);
        let j = target.min(ind.targets.len() - 1);
        self.focus_field(FieldRef::TargetValue(index, j));
        Ok(())
    }

    /// Remove the focused target, or the focused indicator when the focus is
    /// on its text or note. No-op on the node fields.
    pub fn remove_focused(&mut self) -> Result<(), FormError> {
        match self.focused() {
            FieldRef::Name | FieldRef::Description => Ok(()),
            FieldRef::IndicatorText(i) | FieldRef::IndicatorNote(i) => {
                self.remove_indicator(i);
                Ok(())
            }
            FieldRef::TargetValue(i, j) | FieldRef::TargetUnit(i, j) => self.remove_target(i, j),
        }
    }

    /// Validate and convert. Numeric strings are parsed here, not per keystroke.
    fn to_payloads(&self, fiscal_year: i32) -> Result<Vec<IndicatorPayload>, FormError> {
        if self.name.is_blank() {
            return Err(FormError::MissingName);
        }

        let mut out = Vec::with_capacity(self.indicators.len());
        for (i, ind) in self.indicators.iter().enumerate() {
            let indicator = i + 1;
            if ind.text.is_blank() {
                return Err(FormError::MissingIndicatorText { indicator });
            }
            if ind.targets.is_empty() {
                return Err(FormError::NoTargets { indicator });
            }

            let mut targets = Vec::with_capacity(ind.targets.len());
            for (j, t) in ind.targets.iter().enumerate() {
                let target = j + 1;
                let raw = t.value.value().trim();
                if raw.is_empty() {
                    return Err(FormError::MissingValue { indicator, target });
                }
                let value = parse_number(raw).ok_or_else(|| FormError::NotANumber {
                    indicator,
                    target,
                    value: raw.to_string(),
                })?;
                if t.unit.is_blank() {
                    return Err(FormError::MissingUnit { indicator, target });
                }
                targets.push(TargetPayload {
                    id: t.id,
                    value,
                    unit: t.unit.value().trim().to_string(),
                    fiscal_year,
                });
            }

            out.push(IndicatorPayload {
                id: ind.id,
                text: ind.text.value().trim().to_string(),
                description: ind.note.value().trim().to_string(),
                fiscal_year,
                targets,
            });
        }
        Ok(out)
    }
}

/// Accepts `12`, `12.5` and the Indonesian decimal comma `12,5`.
fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// What a form submits and where.
#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create {
        parent_id: Option<i64>,
        child: ChildInfo,
        fiscal_year: i32,
        org_unit_code: Option<String>,
    },
    Edit {
        node_id: i64,
        parent_id: Option<i64>,
        node_type: NodeType,
        level: i32,
        fiscal_year: i32,
        org_unit_code: Option<String>,
        region_code: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct NodeForm {
    pub mode: FormMode,
    pub draft: NodeDraft,
    /// A submit is in flight; further submits are ignored.
    pub busy: bool,
    /// Last validation or backend failure, shown inside the form.
    pub error: Option<String>,
    /// Assigned by the view when the form is opened.
    pub(crate) stamp: u64,
}

impl NodeForm {
    /// Create form for a child described by `child`. `org_unit_code` is
    /// only attached to org-scoped levels (4-6).
    pub fn create(
        parent_id: Option<i64>,
        child: ChildInfo,
        fiscal_year: i32,
        org_unit_code: Option<String>,
    ) -> Self {
        let org_unit_code = org_unit_code.filter(|_| child.next_type.is_org_scoped());
        Self {
            mode: FormMode::Create {
                parent_id,
                child,
                fiscal_year,
                org_unit_code,
            },
            draft: NodeDraft::default(),
            busy: false,
            error: None,
            stamp: 0,
        }
    }

    /// Edit form pre-filled from `node`. Each indicator is flattened to its
    /// first target; an indicator without targets gets one empty target.
    pub fn edit(node: &PerformanceNode) -> Self {
        let indicators = node
            .indicators
            .iter()
            .map(|ind| {
                let target = ind
                    .targets
                    .first()
                    .map(|t| TargetDraft {
                        id: t.id,
                        value: TextInput::with_value(format_number(t.value)),
                        unit: TextInput::with_value(t.unit.clone()),
                    })
                    .unwrap_or_default();
                IndicatorDraft {
                    id: ind.id,
                    text: TextInput::with_value(ind.text.clone()),
                    note: TextInput::with_value(ind.description.clone().unwrap_or_default()),
                    targets: vec![target],
                }
            })
            .collect();

        Self {
            mode: FormMode::Edit {
                node_id: node.id,
                parent_id: node.parent_id,
                node_type: node.node_type,
                level: node.level,
                fiscal_year: node.fiscal_year,
                org_unit_code: node.org_unit_code.clone(),
                region_code: node.region_code.clone(),
            },
            draft: NodeDraft {
                name: TextInput::with_value(node.name.clone()),
                description: TextInput::with_value(node.description.clone().unwrap_or_default()),
                indicators,
                focus: 0,
            },
            busy: false,
            error: None,
            stamp: 0,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit { .. })
    }

    /// Level of the node being created or edited.
    pub fn level(&self) -> i32 {
        match &self.mode {
            FormMode::Create { child, .. } => child.next_level,
            FormMode::Edit { level, .. } => *level,
        }
    }

    pub fn title(&self) -> String {
        match &self.mode {
            FormMode::Create { child, .. } => format!("New {}", child.label),
            FormMode::Edit { node_type, .. } => format!("Edit {}", node_type.label()),
        }
    }

    /// Edit forms keep one target per indicator.
    pub fn allows_extra_targets(&self) -> bool {
        !self.is_edit()
    }

    pub fn add_target_to_focused(&mut self) {
        if !self.allows_extra_targets() {
            return;
        }
        if let Some(i) = self.draft.focused().indicator() {
            self.draft.add_target(i);
        }
    }

    /// Validate and build the request. Sends nothing.
    pub fn build_request(&self) -> Result<ApiRequest, FormError> {
        match &self.mode {
            FormMode::Create {
                parent_id,
                child,
                fiscal_year,
                org_unit_code,
            } => {
                let indicators = self.draft.to_payloads(*fiscal_year)?;
                Ok(ApiRequest::CreateNode(NodePayload {
                    parent_id: *parent_id,
                    name: self.draft.name.value().trim().to_string(),
                    description: self.draft.description.value().trim().to_string(),
                    fiscal_year: *fiscal_year,
                    node_type: child.next_type,
                    level: child.next_level,
                    status: NodeStatus::Draft,
                    org_unit_code: org_unit_code.clone(),
                    region_code: None,
                    indicators,
                }))
            }
            FormMode::Edit {
                node_id,
                parent_id,
                node_type,
                level,
                fiscal_year,
                org_unit_code,
                region_code,
            } => {
                let indicators = self.draft.to_payloads(*fiscal_year)?;
                Ok(ApiRequest::UpdateNode {
                    id: *node_id,
                    payload: NodePayload {
                        parent_id: *parent_id,
                        name: self.draft.name.value().trim().to_string(),
                        description: self.draft.description.value().trim().to_string(),
                        fiscal_year: *fiscal_year,
                        node_type: *node_type,
                        level: *level,
                        status: NodeStatus::Update,
                        org_unit_code: org_unit_code.clone(),
                        region_code: region_code.clone(),
                        indicators,
                    },
                })
            }
        }
    }
}
