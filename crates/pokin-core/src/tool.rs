use crate::help_popup::HelpEntry;
use crate::keybinds::{Action, InputMode};
use crate::notice::Notice;
use crate::settings::FilterContext;
use crate::telescope::TelescopeItem;
use crate::which_key::WhichKeyEntry;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

/// The trait every pokin tool must implement.
/// Tools are embedded views inside the hub, like neovim buffers.
pub trait Tool {
    /// The display name of the tool (e.g., "Pemda", "OPD").
    fn name(&self) -> &str;

    /// Short description for the tool picker.
    fn description(&self) -> &str;

    /// The tool's current input mode (for status bar display).
    fn mode(&self) -> InputMode;

    /// Key that jumps to this tool from the leader menu (`<Space>p`).
    fn leader_key(&self) -> Option<char> {
        None
    }

    /// Which-key entries for this tool's leader group.
    fn which_key_entries(&self) -> Vec<WhichKeyEntry>;

    /// Items this tool contributes to telescope search.
    fn telescope_items(&self) -> Vec<TelescopeItem>;

    /// Help entries specific to this tool (shown alongside global keybinds).
    fn help_entries(&self) -> Vec<HelpEntry> {
        Vec::new()
    }

    /// Handle a key event. Returns an Action describing what happened.
    fn handle_key(&mut self, key: KeyEvent) -> Action;

    /// Render the tool's UI into the given area.
    fn render(&mut self, frame: &mut Frame, area: Rect);

    /// Handle `<Space><key>` when the hub does not own the key.
    /// Returns None if the tool has no binding for it.
    fn handle_leader_action(&mut self, _key: char) -> Option<Action> {
        None
    }

    /// Handle a `:` command the hub does not know. Returns true if consumed.
    fn handle_command(&mut self, _cmd: &str) -> bool {
        false
    }

    /// Handle a telescope selection whose id this tool contributed.
    fn handle_telescope_selection(&mut self, _id: &str) -> bool {
        false
    }

    /// Receive the fiscal year / organisational unit selection.
    /// Called once at startup and again whenever the user changes it.
    fn apply_filter(&mut self, filter: &FilterContext);

    /// Poll background work (API replies, notice expiry). Called every tick.
    fn tick(&mut self) {}

    /// Transient message for the status bar.
    fn notice(&self) -> Option<&Notice> {
        None
    }

    /// Reset any pending key state (leader, multi-key sequences).
    /// Called by the hub when it takes over input (overlays open/close).
    fn reset_key_state(&mut self) {}

    /// Called when the tool becomes the active view.
    fn on_focus(&mut self) {}

    /// Called when the tool loses focus.
    fn on_blur(&mut self) {}
}
