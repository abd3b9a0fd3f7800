use ratatui::{Frame, layout::Rect};

use pokin_core::ui::{panel_block, render_placeholder};
use pokin_tree::ui::render_tree_view;

use crate::PemdaTool;

pub fn render(frame: &mut Frame, area: Rect, tool: &mut PemdaTool) {
    if tool.current_theme().is_none() {
        let year = tool.session.view.filter().fiscal_year;
        let block = panel_block(&format!("Pohon Pemda {year}"), true);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let hint = if tool.themes_ticket.is_some() {
            "Loading themes\u{2026}"
        } else {
            "Press t to pick a tematik"
        };
        render_placeholder(frame, inner, hint);
    } else {
        let title = match tool.session.view.roots().first() {
            Some(root) => format!("Pohon Pemda \u{b7} {}", root.name),
            None => "Pohon Pemda".to_string(),
        };
        render_tree_view(frame, area, &mut tool.session.view, &title, true);
    }

    tool.picker.render(frame, area);
}
