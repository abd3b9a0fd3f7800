use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{Frame, layout::Rect};
use rusqlite::Connection;

use pokin_core::{
    help_popup::{self, HelpEntry, HelpPopup},
    keybinds::{self, Action, InputMode, KeyState},
    notice::Notice,
    settings::{self, FilterContext, OrgUnit},
    telescope::{Telescope, TelescopeEvent, TelescopeItem},
    text_input::TextInput,
    tool::Tool,
    ui,
    which_key::{self, WhichKey, WhichKeyEntry},
};

/// The main application state.
pub struct App {
    /// Registry of all available tools.
    tools: Vec<Box<dyn Tool>>,
    /// Index of the currently active tool (None = dashboard).
    active_tool: Option<usize>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Current global input mode.
    mode: InputMode,
    which_key: WhichKey,
    help_popup: HelpPopup,
    telescope: Telescope,
    /// Command-line input.
    command: TextInput,
    /// Key state for dashboard (persistent so gg/gt work).
    key_state: KeyState,
    /// Settings database, for persisting the filter.
    conn: Connection,
    /// Fiscal year and OPD shared by every tool.
    filter: FilterContext,
    /// Hub-level message (command errors, filter changes).
    notice: Option<Notice>,
}

impl App {
    /// Create the app and hand the initial filter to every tool.
    pub fn new(mut tools: Vec<Box<dyn Tool>>, conn: Connection, filter: FilterContext) -> Self {
        for tool in tools.iter_mut() {
            tool.apply_filter(&filter);
        }
        Self {
            tools,
            active_tool: None,
            should_quit: false,
            mode: InputMode::Normal,
            which_key: WhichKey::new(),
            help_popup: HelpPopup::new(),
            telescope: Telescope::new(),
            command: TextInput::new(),
            key_state: KeyState::default(),
            conn,
            filter,
            notice: None,
        }
    }

    /// Reset all pending key state (hub + active tool).
    /// Called when the hub takes over input for overlays.
    fn reset_all_key_state(&mut self) {
        self.key_state.reset();
        if let Some(idx) = self.active_tool {
            self.tools[idx].reset_key_state();
        }
    }

    /// Tick every tool so replies for background tabs are applied too.
    pub fn tick(&mut self) {
        for tool in self.tools.iter_mut() {
            tool.tick();
        }
        if self.notice.as_ref().is_some_and(|n| n.expired()) {
            self.notice = None;
        }
    }

    /// Handle a terminal event.
    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            // Ctrl-c always quits
            if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
                self.should_quit = true;
                return;
            }

            if self.telescope.visible {
                self.handle_telescope_key(key);
                return;
            }

            if self.which_key.visible {
                self.handle_which_key_input(key);
                return;
            }

            if self.help_popup.visible {
                self.handle_help_key(key);
                return;
            }

            if self.mode == InputMode::Command {
                self.handle_command_key(key);
                return;
            }

            let action = match self.active_tool {
                Some(idx) => self.tools[idx].handle_key(key),
                None => keybinds::process_normal_key(key, &mut self.key_state),
            };
            // Anything else was the tool's to handle.
            if action.bubbles() {
                self.process_action(action);
            }
        }
    }

    /// Process an action returned by a tool or global key handler.
    fn process_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.close_or_quit(),
            Action::LeaderKey => self.show_leader_menu(),
            Action::LeaderSequence(c) => self.handle_leader_key(c),
            Action::SetMode(mode) => {
                self.mode = mode;
                if mode == InputMode::Command {
                    self.command.clear();
                }
            }
            Action::SwitchTool(idx) => self.switch_to_tool(idx),
            Action::NextTool => {
                if !self.tools.is_empty() {
                    let current = self.active_tool.unwrap_or(0);
                    let next = (current + 1) % self.tools.len();
                    self.switch_to_tool(next);
                }
            }
            Action::PrevTool => {
                if !self.tools.is_empty() {
                    let current = self.active_tool.unwrap_or(0);
                    let prev = if current == 0 {
                        self.tools.len() - 1
                    } else {
                        current - 1
                    };
                    self.switch_to_tool(prev);
                }
            }
            Action::ToolPicker => self.open_tool_picker(),
            Action::Telescope => self.open_telescope(),
            Action::Help => self.show_help(),
            Action::Refresh => {
                if let Some(idx) = self.active_tool {
                    self.tools[idx].handle_command("refresh");
                }
            }
            _ => {}
        }
    }

    fn close_or_quit(&mut self) {
        match self.active_tool.take() {
            Some(idx) => self.tools[idx].on_blur(),
            None => self.should_quit = true,
        }
    }

    /// Show the leader key which-key menu.
    fn show_leader_menu(&mut self) {
        self.reset_all_key_state();
        let mut entries = which_key::hub_leader_entries();
        entries.extend(
            self.tools
                .iter()
                .filter_map(|t| Some(WhichKeyEntry::new(t.leader_key()?, t.name()))),
        );
        let title = match self.active_tool {
            Some(idx) => {
                entries.extend(self.tools[idx].which_key_entries());
                format!("Leader \u{b7} {}", self.tools[idx].name())
            }
            None => "Leader".to_string(),
        };
        self.which_key.show(title, entries);
    }

    /// Handle the key pressed after `<Space>`.
    /// Hub table first, then tool jump keys, then the active tool.
    fn handle_leader_key(&mut self, c: char) {
        if let Some(action) = keybinds::leader_action(c) {
            self.process_action(action);
            return;
        }
        if let Some(idx) = self.tools.iter().position(|t| t.leader_key() == Some(c)) {
            self.switch_to_tool(idx);
            return;
        }
        if let Some(idx) = self.active_tool {
            if let Some(action) = self.tools[idx].handle_leader_action(c) {
                self.process_action(action);
            }
        }
    }

    /// Handle input while which-key is visible.
    fn handle_which_key_input(&mut self, key: KeyEvent) {
        self.which_key.hide();
        self.reset_all_key_state();
        if let KeyCode::Char(c) = key.code {
            self.handle_leader_key(c);
        }
    }

    fn handle_telescope_key(&mut self, key: KeyEvent) {
        match self.telescope.handle_key(key) {
            TelescopeEvent::Pending => {}
            TelescopeEvent::Closed => self.reset_all_key_state(),
            TelescopeEvent::Selected(id) => {
                self.reset_all_key_state();
                self.handle_telescope_selection(&id);
            }
        }
    }

    /// `tool:<name>` switches tools; anything else goes to the tool that
    /// contributed it, which then becomes active.
    fn handle_telescope_selection(&mut self, id: &str) {
        if let Some(name) = id.strip_prefix("tool:") {
            self.switch_to_named(name);
            return;
        }
        let owner = self
            .tools
            .iter_mut()
            .position(|tool| tool.handle_telescope_selection(id));
        if let Some(idx) = owner {
            self.switch_to_tool(idx);
        }
    }

    /// Handle command-mode key events.
    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = InputMode::Normal;
                self.command.clear();
            }
            KeyCode::Enter => {
                let cmd = self.command.value().trim().to_string();
                self.mode = InputMode::Normal;
                self.command.clear();
                self.execute_command(&cmd);
            }
            KeyCode::Char(c) => self.command.insert_char(c),
            KeyCode::Backspace => self.command.backspace(),
            KeyCode::Left => self.command.move_left(),
            KeyCode::Right => self.command.move_right(),
            KeyCode::Home => self.command.move_home(),
            KeyCode::End => self.command.move_end(),
            _ => {}
        }
    }

    /// Execute a command-mode command.
    fn execute_command(&mut self, cmd: &str) {
        let (name, args) = match cmd.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (cmd, ""),
        };
        match name {
            "" => {}
            "q" | "quit" => self.close_or_quit(),
            "qa" | "qa!" => self.should_quit = true,
            "tahun" => self.set_fiscal_year(args),
            "opd" => self.set_org_unit(args),
            _ => {
                let handled = self
                    .active_tool
                    .is_some_and(|idx| self.tools[idx].handle_command(cmd));
                if !handled {
                    self.notice = Some(Notice::error(format!("Unknown command: {cmd}")));
                }
            }
        }
    }

    fn set_fiscal_year(&mut self, arg: &str) {
        if arg.is_empty() {
            self.notice = Some(Notice::info(format!("Tahun {}", self.filter.fiscal_year)));
            return;
        }
        match arg.parse::<i32>() {
            Ok(year) if (1900..=9999).contains(&year) => {
                let mut filter = self.filter.clone();
                filter.fiscal_year = year;
                self.update_filter(filter);
            }
            _ => self.notice = Some(Notice::error(format!("Not a year: {arg}"))),
        }
    }

    /// `:opd <code> [name...]` selects, `:opd` alone clears.
    fn set_org_unit(&mut self, args: &str) {
        let mut filter = self.filter.clone();
        filter.org_unit = match args.split_once(char::is_whitespace) {
            Some((code, name)) => Some(OrgUnit {
                code: code.to_string(),
                name: name.trim().to_string(),
            }),
            None if !args.is_empty() => Some(OrgUnit {
                code: args.to_string(),
                name: String::new(),
            }),
            None => None,
        };
        self.update_filter(filter);
    }

    /// Persist the filter and push it to every tool.
    fn update_filter(&mut self, filter: FilterContext) {
        if filter == self.filter {
            return;
        }
        tracing::info!(filter = %filter.summary(), "filter changed");
        for tool in self.tools.iter_mut() {
            tool.apply_filter(&filter);
        }
        self.notice = Some(match settings::save_filter(&self.conn, &filter) {
            Ok(()) => Notice::info(filter.summary()),
            Err(e) => {
                tracing::error!(error = ?e, "failed to persist filter");
                Notice::error(format!("{} (not saved: {e})", filter.summary()))
            }
        });
        self.filter = filter;
    }

    fn switch_to_named(&mut self, name: &str) {
        if let Some(idx) = self.tools.iter().position(|t| t.name() == name) {
            self.switch_to_tool(idx);
        }
    }

    /// Switch to a tool by index.
    fn switch_to_tool(&mut self, idx: usize) {
        if idx < self.tools.len() {
            if let Some(old) = self.active_tool {
                self.tools[old].on_blur();
            }
            self.active_tool = Some(idx);
            self.tools[idx].on_focus();
            self.mode = InputMode::Normal;
        }
    }

    fn tool_items(&self) -> Vec<TelescopeItem> {
        self.tools
            .iter()
            .map(|t| {
                TelescopeItem::new(t.name(), t.description(), format!("tool:{}", t.name()))
            })
            .collect()
    }

    fn open_tool_picker(&mut self) {
        let items = self.tool_items();
        self.telescope.open("Tool Picker", items);
    }

    /// Open the general telescope (search across all tools).
    fn open_telescope(&mut self) {
        let mut items = self.tool_items();
        for tool in &self.tools {
            items.extend(tool.telescope_items());
        }
        self.telescope.open("Find", items);
    }

    /// Show the help popup with global + tool-specific keybinds.
    fn show_help(&mut self) {
        self.reset_all_key_state();
        let mut entries = Vec::new();

        if let Some(idx) = self.active_tool {
            entries.extend(self.tools[idx].help_entries());
        }
        entries.extend(help_popup::global_help_entries());
        entries.extend(self.tools.iter().filter_map(|t| {
            let key = t.leader_key()?;
            Some(HelpEntry::new("Tools", format!("<Space>{key}"), t.description()))
        }));

        let title = match self.active_tool {
            Some(idx) => format!("{} Help", self.tools[idx].name()),
            None => "Help".to_string(),
        };

        self.help_popup.show(title, entries);
    }

    /// Handle key events while the help popup is visible.
    fn handle_help_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
                self.help_popup.hide();
                self.reset_all_key_state();
            }
            KeyCode::Char('j') | KeyCode::Down => self.help_popup.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.help_popup.scroll_by(-1),
            KeyCode::Char('d') if key.modifiers == KeyModifiers::CONTROL => {
                self.help_popup.scroll_by(10)
            }
            KeyCode::Char('u') if key.modifiers == KeyModifiers::CONTROL => {
                self.help_popup.scroll_by(-10)
            }
            _ => {}
        }
    }

    /// Render the entire application.
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let (tab_area, content_area, status_area) = ui::standard_layout(area);

        let tool_names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        if !tool_names.is_empty() {
            ui::render_tab_bar(frame, tab_area, &tool_names, self.active_tool);
        }

        if let Some(idx) = self.active_tool {
            self.tools[idx].render(frame, content_area);
        } else {
            self.render_dashboard(frame, content_area);
        }

        if self.mode == InputMode::Command {
            ui::render_command_line(
                frame,
                status_area,
                self.command.value(),
                self.command.cursor_column(),
            );
        } else {
            let (tool_name, mode, tool_notice) = match self.active_tool {
                Some(idx) => {
                    let tool = &self.tools[idx];
                    (tool.name(), tool.mode(), tool.notice())
                }
                None => ("Dashboard", self.mode, None),
            };
            let info = format!("{}  Space: leader  ?: help", self.filter.summary());
            let notice = self.notice.as_ref().or(tool_notice);
            ui::render_status_bar(frame, status_area, mode, tool_name, &info, notice);
        }

        // Overlays (rendered last, on top)
        self.which_key.render(frame, area);
        self.help_popup.render(frame, area);
        self.telescope.render(frame, area);
    }

    /// Render the dashboard when no tool is active.
    fn render_dashboard(&self, frame: &mut Frame, area: Rect) {
        use ratatui::{
            layout::{Alignment, Constraint, Layout},
            style::{Modifier, Style},
            text::{Line, Span},
            widgets::Paragraph,
        };

        let key_line = |key: &str, text: &str| {
            Line::from(vec![
                Span::styled(format!("  {key} "), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("  {text}")),
            ])
        };

        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "pokin",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Pohon Kinerja console",
                Style::default().add_modifier(Modifier::DIM),
            )),
            Line::from(Span::styled(
                self.filter.summary(),
                Style::default().add_modifier(Modifier::DIM),
            )),
            Line::from(""),
            key_line("<Space>", "Open leader menu"),
            key_line("<Space><Space>", "Tool picker"),
            key_line("<Space>f", "Find (telescope)"),
            key_line(":tahun <year>", "Set fiscal year"),
            key_line(":opd <kode> [nama]", "Select OPD"),
            key_line(":q", "Quit"),
            Line::from(""),
        ];

        if !self.tools.is_empty() {
            lines.push(Line::from(Span::styled(
                "Available tools:",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            for (i, tool) in self.tools.iter().enumerate() {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {} ", i + 1),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        tool.name(),
                        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    ),
                    Span::styled(
                        format!("  {}", tool.description()),
                        Style::default().add_modifier(Modifier::DIM),
                    ),
                ]));
            }
        }

        let paragraph = Paragraph::new(lines).alignment(Alignment::Center);

        // Center vertically
        let [_, centered, _] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(20),
            Constraint::Fill(1),
        ])
        .areas(area);

        frame.render_widget(paragraph, centered);
    }
}
