//! Level → metadata rules. The level alone drives styling and which child
//! type may be added under a node.

use pokin_api::NodeType;
use ratatui::style::{Color, Modifier, Style};

/// Terminal colours for one level: card body, header text and type badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStyle {
    pub card: Style,
    pub header: Style,
    pub badge: Style,
}

const GRAY_600: Color = Color::Rgb(0x4b, 0x55, 0x63);
const GRAY_500: Color = Color::Rgb(0x6b, 0x72, 0x80);
const GRAY_400: Color = Color::Rgb(0x9c, 0xa3, 0xaf);
const RED: Color = Color::Rgb(0xca, 0x36, 0x36);
const BLUE: Color = Color::Rgb(0x36, 0x73, 0xca);
const GREEN: Color = Color::Rgb(0x00, 0x79, 0x82);

const fn tinted(color: Color) -> NodeStyle {
    NodeStyle {
        card: Style::new().fg(color),
        header: Style::new().fg(color).add_modifier(Modifier::BOLD),
        badge: Style::new().fg(Color::White).bg(color).add_modifier(Modifier::BOLD),
    }
}

/// Used for any level outside 0-6.
pub const FALLBACK: NodeStyle = tinted(GRAY_400);

const THEME: NodeStyle = NodeStyle {
    card: Style::new().fg(Color::White),
    header: Style::new().fg(Color::White).add_modifier(Modifier::BOLD),
    badge: Style::new().fg(Color::White).bg(Color::Black).add_modifier(Modifier::BOLD),
};

pub fn style_for(level: i32) -> NodeStyle {
    match level {
        0 => THEME,
        1 => tinted(GRAY_600),
        2 | 3 => tinted(GRAY_500),
        4 => tinted(RED),
        5 => tinted(BLUE),
        6 => tinted(GREEN),
        _ => FALLBACK,
    }
}

/// What may be created under a node of a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildInfo {
    pub next_level: i32,
    pub next_type: NodeType,
    pub label: &'static str,
}

impl ChildInfo {
    /// Entry for a new root of `node_type` (no parent).
    pub fn root(node_type: NodeType) -> Self {
        Self {
            next_level: node_type.level(),
            next_type: node_type,
            label: node_type.label(),
        }
    }
}

/// `None` for the terminal level (6) and anything outside 0-5.
pub fn child_info_for(level: i32) -> Option<ChildInfo> {
    if !(0..=5).contains(&level) {
        return None;
    }
    NodeType::from_level(level + 1).map(|next_type| ChildInfo {
        next_level: level + 1,
        next_type,
        label: next_type.label(),
    })
}
