use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Input modes, modeled after vim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Default mode. Tree navigation and actions via keybinds.
    #[default]
    Normal,
    /// A form field has focus and receives typed text. Exited with `Esc`.
    Insert,
    /// Command-line mode. Entered with `:`. Supports `:q`, `:tahun`, etc.
    Command,
}

impl InputMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
            Self::Command => "COMMAND",
        }
    }
}

/// Actions that can result from processing a key event.
/// Tools and the hub return these to signal what should happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The key was consumed but nothing happens at hub level.
    None,
    /// Quit the current tool or the hub entirely.
    Quit,
    /// Switch to a specific input mode.
    SetMode(InputMode),
    MoveDown(usize),
    MoveUp(usize),
    GotoTop,
    GotoBottom,
    HalfPageDown,
    HalfPageUp,
    /// Toggle the selected node, or focus the form on a form row.
    Confirm,
    /// Expand the selected node (`l`).
    Expand,
    /// Collapse the selected node or jump to its parent (`h`).
    Collapse,
    /// Delete the selected node (`dd`).
    Delete,
    /// Open the add-child form under the selected node.
    Add,
    /// Open the in-place edit form for the selected node.
    Edit,
    /// Close the form on the selected row (`x`).
    CloseForm,
    /// Refetch the displayed tree (`r`).
    Refresh,
    /// Open a tool-specific picker (`t`).
    Pick,
    /// Open which-key leader menu.
    LeaderKey,
    /// A leader key sequence was completed with this key.
    LeaderSequence(char),
    /// Switch to tool by index (0-based).
    SwitchTool(usize),
    NextTool,
    PrevTool,
    /// Tool picker (telescope over tools).
    ToolPicker,
    Help,
    /// Open telescope fuzzy finder.
    Telescope,
}

impl Action {
    /// Actions a tool does not handle itself and passes back to the hub.
    pub fn bubbles(&self) -> bool {
        matches!(
            self,
            Action::Quit
                | Action::SetMode(InputMode::Command)
                | Action::LeaderKey
                | Action::LeaderSequence(_)
                | Action::SwitchTool(_)
                | Action::NextTool
                | Action::PrevTool
                | Action::ToolPicker
                | Action::Telescope
                | Action::Help
        )
    }

    /// Label shown in the help popup and the which-key menu.
    pub fn describe(&self) -> &'static str {
        match self {
            Action::None => "",
            Action::Quit => "Quit / close tool",
            Action::SetMode(InputMode::Command) => "Command line",
            Action::SetMode(_) => "Change mode",
            Action::MoveDown(_) => "Move down",
            Action::MoveUp(_) => "Move up",
            Action::GotoTop => "Go to top",
            Action::GotoBottom => "Go to bottom",
            Action::HalfPageDown => "Half-page down",
            Action::HalfPageUp => "Half-page up",
            Action::Confirm => "Toggle node / focus form",
            Action::Expand => "Expand",
            Action::Collapse => "Collapse or go to parent",
            Action::Delete => "Delete node (confirm with y)",
            Action::Add => "Add child",
            Action::Edit => "Edit node in place",
            Action::CloseForm => "Close form on selected row",
            Action::Refresh => "Refresh",
            Action::Pick => "Open picker",
            Action::LeaderKey => "Leader menu",
            Action::LeaderSequence(_) => "Tool action",
            Action::SwitchTool(_) => "Switch to tool",
            Action::NextTool => "Next tool tab",
            Action::PrevTool => "Previous tool tab",
            Action::ToolPicker => "Tool picker",
            Action::Help => "Help",
            Action::Telescope => "Find (telescope)",
        }
    }
}

/// A key as written in a binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A plain character, without Ctrl.
    Char(char),
    Ctrl(char),
    /// A non-character key such as `Down` or `Enter`.
    Code(KeyCode),
    /// A two-character sequence like `gg` or `dd`.
    Seq(char, char),
}

impl Key {
    pub fn matches(&self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match *self {
            Key::Char(c) => !ctrl && key.code == KeyCode::Char(c),
            Key::Ctrl(c) => ctrl && key.code == KeyCode::Char(c),
            Key::Code(code) => key.code == code,
            Key::Seq(..) => false,
        }
    }

    pub fn label(&self) -> String {
        match *self {
            Key::Char(' ') => "<Space>".to_string(),
            Key::Char(c) => c.to_string(),
            Key::Ctrl(c) => format!("Ctrl-{c}"),
            Key::Code(code) => match code {
                KeyCode::BackTab => "S-Tab".to_string(),
                KeyCode::Char(c) => c.to_string(),
                other => format!("{other:?}"),
            },
            Key::Seq(a, b) => format!("{a}{b}"),
        }
    }
}

/// A row of a binding table: every key listed triggers `action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub keys: &'static [Key],
    pub action: Action,
}

impl Binding {
    const fn new(keys: &'static [Key], action: Action) -> Self {
        Self { keys, action }
    }

    /// Keys joined for display, e.g. `j/Down`.
    pub fn label(&self) -> String {
        keys_label(self.keys)
    }

    fn matches(&self, key: &KeyEvent) -> bool {
        self.keys.iter().any(|k| k.matches(key))
    }
}

pub fn keys_label(keys: &[Key]) -> String {
    keys.iter().map(Key::label).collect::<Vec<_>>().join("/")
}

/// Cursor movement and tab switching.
pub const NAVIGATION: &[Binding] = &[
    Binding::new(&[Key::Char('j'), Key::Code(KeyCode::Down)], Action::MoveDown(1)),
    Binding::new(&[Key::Char('k'), Key::Code(KeyCode::Up)], Action::MoveUp(1)),
    Binding::new(&[Key::Seq('g', 'g')], Action::GotoTop),
    Binding::new(&[Key::Char('G')], Action::GotoBottom),
    Binding::new(&[Key::Ctrl('d')], Action::HalfPageDown),
    Binding::new(&[Key::Ctrl('u')], Action::HalfPageUp),
    Binding::new(&[Key::Seq('g', 't')], Action::NextTool),
    Binding::new(&[Key::Seq('g', 'T')], Action::PrevTool),
];

/// Keys acting on the selected tree row.
pub const TREE: &[Binding] = &[
    Binding::new(&[Key::Code(KeyCode::Enter), Key::Char('i')], Action::Confirm),
    Binding::new(&[Key::Char('l'), Key::Code(KeyCode::Right)], Action::Expand),
    Binding::new(&[Key::Char('h'), Key::Code(KeyCode::Left)], Action::Collapse),
    Binding::new(&[Key::Char('a')], Action::Add),
    Binding::new(&[Key::Char('e')], Action::Edit),
    Binding::new(&[Key::Seq('d', 'd')], Action::Delete),
    Binding::new(&[Key::Char('x')], Action::CloseForm),
    Binding::new(&[Key::Char('r')], Action::Refresh),
    Binding::new(&[Key::Char('t')], Action::Pick),
];

/// Keys handled by the hub wherever they are pressed.
pub const GLOBAL: &[Binding] = &[
    Binding::new(&[Key::Char(':')], Action::SetMode(InputMode::Command)),
    Binding::new(&[Key::Char('?')], Action::Help),
    Binding::new(&[Key::Char('q')], Action::Quit),
    Binding::new(&[Key::Char(' ')], Action::LeaderKey),
];

/// Keys after `<Space>`. `1`-`9` and tool keys are resolved separately.
pub const LEADER: &[Binding] = &[
    Binding::new(&[Key::Char(' ')], Action::ToolPicker),
    Binding::new(&[Key::Char('f')], Action::Telescope),
    Binding::new(&[Key::Char('r')], Action::Refresh),
    Binding::new(&[Key::Char('?')], Action::Help),
    Binding::new(&[Key::Char('q')], Action::Quit),
];

/// Resolve the key pressed after `<Space>`, if the hub table owns it.
pub fn leader_action(c: char) -> Option<Action> {
    if let Some(digit) = c.to_digit(10).filter(|d| *d >= 1) {
        return Some(Action::SwitchTool(digit as usize - 1));
    }
    LEADER
        .iter()
        .find(|b| b.keys.contains(&Key::Char(c)))
        .map(|b| b.action.clone())
}

fn normal_tables() -> impl Iterator<Item = &'static Binding> {
    NAVIGATION.iter().chain(TREE).chain(GLOBAL)
}

/// Pending key state for multi-key sequences like `gg`, `dd`, `gt`, `gT`.
#[derive(Debug, Default, Clone)]
pub struct KeyState {
    /// Whether the leader key (Space) was just pressed.
    pub leader_active: bool,
    /// Pending first key of a two-key sequence (e.g., 'g' for gg/gt/gT, 'd' for dd).
    pub pending_key: Option<char>,
}

impl KeyState {
    pub fn reset(&mut self) {
        self.leader_active = false;
        self.pending_key = None;
    }
}

/// Process a key event in Normal mode, accounting for multi-key sequences.
pub fn process_normal_key(key: KeyEvent, state: &mut KeyState) -> Action {
    if state.leader_active {
        state.leader_active = false;
        return match key.code {
            KeyCode::Char(c) => leader_action(c).unwrap_or(Action::LeaderSequence(c)),
            _ => Action::None,
        };
    }

    if let Some(pending) = state.pending_key.take() {
        let KeyCode::Char(second) = key.code else {
            return Action::None;
        };
        return normal_tables()
            .find(|b| b.keys.contains(&Key::Seq(pending, second)))
            .map(|b| b.action.clone())
            .unwrap_or(Action::None);
    }

    if let Some(binding) = normal_tables().find(|b| b.matches(&key)) {
        if binding.action == Action::LeaderKey {
            state.leader_active = true;
        }
        return binding.action.clone();
    }

    if let KeyCode::Char(c) = key.code {
        let starts_sequence = normal_tables()
            .flat_map(|b| b.keys)
            .any(|k| matches!(k, Key::Seq(first, _) if *first == c));
        if starts_sequence && !key.modifiers.contains(KeyModifiers::CONTROL) {
            state.pending_key = Some(c);
        }
    }
    Action::None
}
