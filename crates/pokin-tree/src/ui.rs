use pokin_api::PerformanceNode;
use pokin_core::help_popup::HelpEntry;
use pokin_core::keybinds::{Action, TREE};
use pokin_core::ui::panel_block;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::form::{FieldRef, NodeForm, format_number};
use crate::level::style_for;
use crate::view::{FORM_KEYS, FormCommand, Row, RowTarget, TreeView};

const GUIDE_STYLE: Style = Style::new().fg(Color::DarkGray);
const SELECTED_BG: Color = Color::Gray;
const LABEL_WIDTH: usize = 14;

/// Render the tree list on the left and the selected node's card (or the
/// selected form) on the right.
pub fn render_tree_view(
    frame: &mut Frame,
    area: Rect,
    view: &mut TreeView,
    title: &str,
    focused: bool,
) {
    let [list_area, detail_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);

    let list_focused = focused && view.focus().is_none();
    render_list(frame, list_area, view, title, list_focused);

    let Some(row) = view.selected_row() else {
        frame.render_widget(panel_block("Detail", false), detail_area);
        return;
    };
    match row.target {
        RowTarget::Node(_) => match view.selected_node() {
            Some(node) => render_card(frame, detail_area, node),
            None => frame.render_widget(panel_block("Detail", false), detail_area),
        },
        target => {
            if let Some(key) = target.form_key() {
                if let Some(form) = view.form(key) {
                    let form_focused = focused && view.focus() == Some(key);
                    render_form(frame, detail_area, form, form_focused);
                }
            }
        }
    }
}

fn render_list(frame: &mut Frame, area: Rect, view: &mut TreeView, title: &str, focused: bool) {
    let block = panel_block(title, focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let (rows_area, prompt_area) = match view.pending_delete() {
        Some(_) if inner.height > 1 => {
            let [rows, prompt] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
            (rows, Some(prompt))
        }
        _ => (inner, None),
    };
    view.set_visible_height(rows_area.height as usize);

    if view.rows().is_empty() {
        let empty = Paragraph::new("  Nothing to show. Press 'r' to reload.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, rows_area);
        return;
    }

    let visible = rows_area.height as usize;
    let selected = view.selected_index();
    let offset = (selected + 1).saturating_sub(visible);
    let lines: Vec<Line> = view
        .rows()
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible)
        .map(|(i, row)| row_line(row, i == selected, rows_area.width))
        .collect();
    frame.render_widget(Paragraph::new(lines), rows_area);

    if let (Some(prompt_area), Some(id)) = (prompt_area, view.pending_delete()) {
        let text = match view.node(id) {
            Some(node) => match node.subtree_len() - 1 {
                0 => format!("Delete {}? (y/n)", node.name),
                below => format!("Delete {} and {below} below? (y/n)", node.name),
            },
            None => "Delete? (y/n)".to_string(),
        };
        let prompt = Line::from(Span::styled(
            text,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(prompt), prompt_area);
    }
}

fn row_line(row: &Row, selected: bool, width: u16) -> Line<'static> {
    let level_style = style_for(row.level);
    let base = if selected {
        Style::default()
            .bg(SELECTED_BG)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        match row.target {
            RowTarget::Node(_) => level_style.header,
            _ => level_style.card.add_modifier(Modifier::ITALIC),
        }
    };

    let mut spans: Vec<Span<'static>> = Vec::new();
    for d in 0..row.depth {
        if row.guides.get(d).copied().unwrap_or(false) {
            let guide = if selected {
                GUIDE_STYLE.bg(SELECTED_BG)
            } else {
                GUIDE_STYLE
            };
            spans.push(Span::styled("\u{2502} ", guide));
        } else {
            spans.push(Span::styled("  ", base));
        }
    }

    let icon = match row.target {
        RowTarget::Node(_) if row.has_children && row.expanded => "\u{25BC} ",
        RowTarget::Node(_) if row.has_children => "\u{25B6} ",
        RowTarget::Node(_) => "\u{25CF} ",
        RowTarget::Edit(_) => "\u{270E} ",
        RowTarget::AddChild(_) | RowTarget::AddRoot => "+ ",
    };
    spans.push(Span::styled(icon, base));
    spans.push(Span::styled(row.title.clone(), base));

    if selected {
        let used: usize = spans.iter().map(|s| s.content.width()).sum();
        let remaining = (width as usize).saturating_sub(used);
        if remaining > 0 {
            spans.push(Span::styled(" ".repeat(remaining), Style::default().bg(SELECTED_BG)));
        }
    }
    Line::from(spans)
}

fn render_card(frame: &mut Frame, area: Rect, node: &PerformanceNode) {
    let style = style_for(node.level);
    let block = panel_block(node.node_type.label(), false).border_style(style.card);
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!(" {} ", node.node_type.label()), style.badge),
            Span::raw(" "),
            Span::styled(node.status.as_str(), dim),
        ]),
        Line::from(""),
        Line::from(Span::styled(node.name.clone(), style.header)),
    ];
    if let Some(desc) = node.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(Line::from(desc.to_string()));
    }
    lines.push(Line::from(""));
    lines.push(field_line("Tahun", node.fiscal_year.to_string()));
    if let Some(org) = &node.org_unit_code {
        lines.push(field_line("OPD", org.clone()));
    }
    if node.has_children() {
        lines.push(field_line("Children", node.children.len().to_string()));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Indikator",
        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )));
    if node.indicators.is_empty() {
        lines.push(Line::from(Span::styled("  No indicators", dim)));
    }
    for (i, ind) in node.indicators.iter().enumerate() {
        lines.push(Line::from(format!("{}. {}", i + 1, ind.text)));
        if let Some(note) = ind.description.as_deref().filter(|d| !d.trim().is_empty()) {
            lines.push(Line::from(Span::styled(format!("   {note}"), dim)));
        }
        for target in &ind.targets {
            lines.push(Line::from(vec![
                Span::styled("   Target ", dim),
                Span::raw(format!("{} {}", format_number(target.value), target.unit)),
            ]));
        }
    }

    let card = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(card, area);
}

fn field_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label:<width$}", width = LABEL_WIDTH),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(value),
    ])
}

fn field_label(field: FieldRef) -> String {
    match field {
        FieldRef::Name => "Name".to_string(),
        FieldRef::Description => "Description".to_string(),
        FieldRef::IndicatorText(i) => format!("Indikator {}", i + 1),
        FieldRef::IndicatorNote(_) => "  Note".to_string(),
        FieldRef::TargetValue(_, j) => format!("  Target {}", j + 1),
        FieldRef::TargetUnit(_, _) => "  Unit".to_string(),
    }
}

fn render_form(frame: &mut Frame, area: Rect, form: &NodeForm, focused: bool) {
    let block = panel_block(&form.title(), focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let [fields_area, status_area, help_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let current = form.draft.focused();
    let mut lines = Vec::new();
    let mut cursor_line = 0;
    let mut cursor_col = 0;

    for field in form.draft.fields() {
        let Some(input) = form.draft.input(field) else {
            continue;
        };
        let is_current = field == current;
        if matches!(field, FieldRef::IndicatorText(i) if i > 0) {
            lines.push(Line::from(""));
        }
        if is_current {
            cursor_line = lines.len();
            cursor_col = LABEL_WIDTH + input.cursor_column();
        }
        let label_style = if is_current && focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let value_style = if is_current {
            Style::default().add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<width$}", field_label(field), width = LABEL_WIDTH),
                label_style,
            ),
            Span::styled(input.value().to_string(), value_style),
        ]));
    }

    let visible = fields_area.height as usize;
    let offset = (cursor_line + 1).saturating_sub(visible);
    frame.render_widget(
        Paragraph::new(lines).scroll((offset as u16, 0)),
        fields_area,
    );

    if focused && visible > 0 {
        let x = fields_area.x as usize + cursor_col;
        let y = fields_area.y as usize + cursor_line - offset;
        if x < (fields_area.x + fields_area.width) as usize {
            frame.set_cursor_position((x as u16, y as u16));
        }
    }

    let status = if form.busy {
        Line::from(Span::styled("Saving\u{2026}", Style::default().fg(Color::Yellow)))
    } else if let Some(err) = &form.error {
        Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(status), status_area);

    let help = if focused {
        form_hint(form.allows_extra_targets())
    } else {
        format!(
            "{} edit  {} close",
            tree_key(&Action::Confirm),
            tree_key(&Action::CloseForm)
        )
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        help_area,
    );
}

fn tree_key(action: &Action) -> String {
    TREE.iter()
        .find(|b| &b.action == action)
        .map(|b| b.label())
        .unwrap_or_default()
}

/// One line of form keys, first key of each binding only, `Ctrl-` shortened.
fn form_hint(extra_targets: bool) -> String {
    FORM_KEYS
        .iter()
        .filter(|b| extra_targets || b.command != FormCommand::AddTarget)
        .filter_map(|b| {
            let first = b.keys.first()?.label().replace("Ctrl-", "C-");
            Some(format!("{first} {}", b.command.hint()?))
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// Keys shared by every tree view, grouped under `section`, then the form keys.
/// The picker key is left to tools that have a picker.
pub fn tree_help_entries(section: &str) -> Vec<HelpEntry> {
    let mut entries: Vec<HelpEntry> = TREE
        .iter()
        .filter(|b| b.action != Action::Pick)
        .map(|b| HelpEntry::from_binding(section, b))
        .collect();
    entries.extend(
        FORM_KEYS
            .iter()
            .map(|b| HelpEntry::new("Form", b.label(), b.command.describe())),
    );
    entries
}
