use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use pokin_api::NodeType;
use pokin_core::ui::{panel_block, render_placeholder};
use pokin_tree::{style_for, ui::render_tree_view};

use crate::{OpdTool, SUMMARY_LEVELS};

pub fn render(frame: &mut Frame, area: Rect, tool: &mut OpdTool) {
    let filter = tool.session.view.filter().clone();
    let Some(org) = filter.org_unit.as_ref() else {
        let block = panel_block(&format!("Pohon OPD {}", filter.fiscal_year), true);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        render_placeholder(frame, inner, "No OPD selected. Use :opd <kode> [nama]");
        return;
    };

    let [summary_area, tree_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(3)]).areas(area);
    render_summary(frame, summary_area, tool);

    let title = format!("Pohon OPD \u{b7} {} \u{b7} {}", org.label(), filter.fiscal_year);
    render_tree_view(frame, tree_area, &mut tool.session.view, &title, true);
}

/// One card per level with its pending and approved totals.
fn render_summary(frame: &mut Frame, area: Rect, tool: &OpdTool) {
    let cards = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(area);
    for (level, card_area) in SUMMARY_LEVELS.iter().zip(cards.iter()) {
        let style = style_for(*level);
        let label = NodeType::from_level(*level)
            .map(|t| t.label())
            .unwrap_or("?");
        let (pending, approved) = tool.count_for(*level);

        let block = panel_block(label, false).border_style(style.card);
        let line = Line::from(vec![
            Span::styled(format!(" {pending} "), style.badge),
            Span::styled(" pending  ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{approved}"), style.header),
            Span::styled(" approved", Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), *card_area);
    }
}
