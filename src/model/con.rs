use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::model::geometry::Rect;

slotmap::new_key_type! {
    /// Identifies a container in the tree arena.
    pub struct ConId;
}

impl ConId {
    /// Stable integer form of the id, used for criteria matching and replies.
    pub fn to_raw(self) -> u64 {
        slotmap::Key::data(&self).as_ffi()
    }

    pub fn from_raw(raw: u64) -> ConId {
        slotmap::KeyData::from_ffi(raw).into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConKind {
    Root,
    Output,
    Content,
    Dockarea,
    Workspace,
    FloatingWrapper,
    Normal,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
    #[default]
    None,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Layout {
    #[default]
    Default,
    Stacked,
    Tabbed,
}

#[derive(
    Default,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum BorderStyle {
    #[default]
    Normal,
    None,
    OnePixel,
}

impl BorderStyle {
    /// The next style in the toggle cycle, starting from the current style.
    pub fn toggled(self) -> BorderStyle {
        BorderStyle::try_from((u8::from(self) + 1) % 3).unwrap_or_default()
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullscreenMode {
    #[default]
    None,
    Output,
    Global,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// Properties of the native window bound to a container. Pure layout
/// containers have no window at all; individual properties may be missing
/// on windows that never reported them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: u32,
    pub class: Option<String>,
    pub instance: Option<String>,
    pub role: Option<String>,
    pub title: Option<String>,
}

/// One node of the container tree.
///
/// Structural links (`parent`, `children`, `focus`) are only mutated through
/// [`Tree`](crate::model::tree::Tree) operations so that both sides of every
/// link stay consistent. `focus` lists the children in most-recently-focused
/// order; its front decides where `descend_focused` goes and which workspace
/// is visible on an output.
#[derive(Debug, Serialize, Deserialize)]
pub struct Con {
    pub(crate) parent: Option<ConId>,
    pub(crate) children: Vec<ConId>,
    pub(crate) focus: Vec<ConId>,
    pub kind: ConKind,
    pub orientation: Orientation,
    pub layout: Layout,
    /// Size share relative to same-orientation siblings. 0.0 means unset.
    pub percent: f64,
    pub mark: Option<String>,
    pub border: BorderStyle,
    pub fullscreen: FullscreenMode,
    pub rect: Rect,
    pub window: Option<WindowInfo>,
    pub name: String,
}

impl Con {
    pub(crate) fn new(kind: ConKind) -> Con {
        Con {
            parent: None,
            children: Vec::new(),
            focus: Vec::new(),
            kind,
            orientation: Orientation::None,
            layout: Layout::Default,
            percent: 0.0,
            mark: None,
            border: BorderStyle::Normal,
            fullscreen: FullscreenMode::None,
            rect: Rect::default(),
            window: None,
            name: String::new(),
        }
    }

    pub fn parent(&self) -> Option<ConId> {
        self.parent
    }

    pub fn children(&self) -> &[ConId] {
        &self.children
    }

    /// Children in most-recently-focused order.
    pub fn focus_order(&self) -> &[ConId] {
        &self.focus
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn border_style_toggle_cycles_from_current_style() {
        assert_eq!(BorderStyle::Normal.toggled(), BorderStyle::None);
        assert_eq!(BorderStyle::None.toggled(), BorderStyle::OnePixel);
        assert_eq!(BorderStyle::OnePixel.toggled(), BorderStyle::Normal);
    }

    #[test]
    fn direction_orientation_and_opposite() {
        assert_eq!(Direction::Left.orientation(), Orientation::Horizontal);
        assert_eq!(Direction::Down.orientation(), Orientation::Vertical);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
        assert_eq!(Direction::Up.opposite(), Direction::Down);
    }

    #[test]
    fn direction_parses_from_keyword() {
        assert_eq!(Direction::from_str("left").unwrap(), Direction::Left);
        assert_eq!(Direction::from_str("down").unwrap(), Direction::Down);
        assert!(Direction::from_str("sideways").is_err());
    }

    #[test]
    fn con_id_raw_round_trip() {
        let mut map: slotmap::SlotMap<ConId, ()> = slotmap::SlotMap::with_key();
        let id = map.insert(());
        assert_eq!(ConId::from_raw(id.to_raw()), id);
    }
}
