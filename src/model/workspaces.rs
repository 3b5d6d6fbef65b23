use tracing::debug;

use crate::model::con::{ConId, ConKind, Orientation};
use crate::model::outputs::OutputId;
use crate::model::tree::Tree;

/// Workspace names with this prefix are reserved for internal machinery
/// (the scratchpad) and cannot be targeted by name commands.
pub const RESERVED_WS_PREFIX: &str = "__trellis_";

pub fn is_reserved_name(name: &str) -> bool {
    name.get(..RESERVED_WS_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RESERVED_WS_PREFIX))
}

impl Tree {
    /// Creates a workspace on `output` with an orientation derived from the
    /// output's aspect ratio.
    pub fn new_workspace_on(&mut self, output: OutputId, name: &str) -> ConId {
        self.create_workspace(output, name, None)
    }

    pub(crate) fn create_workspace(
        &mut self,
        output: OutputId,
        name: &str,
        orientation: Option<Orientation>,
    ) -> ConId {
        let out = &self.outputs[output.0];
        let rect = out.rect;
        let content = out.content;
        let ws = self.mk_con(ConKind::Workspace);
        self.cons[ws].name = name.to_owned();
        self.cons[ws].rect = rect;
        self.cons[ws].orientation = orientation.unwrap_or(if rect.height > rect.width {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        });
        self.attach(ws, content);
        debug!(name, "created workspace");
        ws
    }

    /// Workspaces on all external outputs, in output order.
    pub fn workspaces(&self) -> Vec<ConId> {
        let mut all = Vec::new();
        for id in self.output_ids() {
            if !self.output(id).is_internal() {
                all.extend(self.workspaces_on(id));
            }
        }
        all
    }

    pub fn workspaces_on(&self, output: OutputId) -> Vec<ConId> {
        let content = self.outputs[output.0].content;
        self.cons[content]
            .children
            .iter()
            .copied()
            .filter(|&c| self.cons[c].kind == ConKind::Workspace)
            .collect()
    }

    /// Finds a workspace by exact name anywhere in the tree, reserved ones
    /// included.
    pub fn workspace_by_name(&self, name: &str) -> Option<ConId> {
        self.output_ids()
            .flat_map(|id| self.workspaces_on(id))
            .find(|&ws| self.cons[ws].name == name)
    }

    /// Looks a workspace up by name, creating it on the focused container's
    /// output (or the first external output) when missing.
    pub fn get_or_create_workspace(
        &mut self,
        name: &str,
        orientation: Option<Orientation>,
    ) -> Option<ConId> {
        if let Some(ws) = self.workspace_by_name(name) {
            return Some(ws);
        }
        let output = self
            .output_of(self.focused)
            .filter(|&id| !self.output(id).is_internal())
            .or_else(|| self.output_ids().find(|&id| !self.output(id).is_internal()))?;
        Some(self.create_workspace(output, name, orientation))
    }

    /// The workspace owning the focused container.
    pub fn current_workspace(&self) -> Option<ConId> {
        self.workspace_of(self.focused)
    }

    /// A workspace is visible iff it leads its content's focus order.
    pub fn workspace_is_visible(&self, ws: ConId) -> bool {
        let Some(content) = self.cons[ws].parent else {
            return false;
        };
        self.cons[content].focus.first() == Some(&ws)
    }

    pub fn visible_workspace_on(&self, output: OutputId) -> Option<ConId> {
        let content = self.outputs[output.0].content;
        self.cons[content]
            .focus
            .first()
            .copied()
            .filter(|&ws| self.cons[ws].kind == ConKind::Workspace)
    }

    /// Switches the visible workspace by focusing whatever is topmost in the
    /// target workspace's focus order. Returns false when the workspace is
    /// already focused.
    pub fn show_workspace(&mut self, ws: ConId) -> bool {
        let old = self.current_workspace();
        if old == Some(ws) {
            debug!("workspace is already focused");
            return false;
        }
        if let Some(old_ws) = old {
            self.previous_workspace = Some(self.cons[old_ws].name.clone());
        }
        let target = self.descend_focused(ws);
        self.focus(target);
        true
    }

    pub fn previous_workspace_name(&self) -> Option<&str> {
        self.previous_workspace.as_deref()
    }

    fn step_workspace(&self, ring: &[ConId], forward: bool) -> Option<ConId> {
        if ring.is_empty() {
            return None;
        }
        let current = self.current_workspace()?;
        let Some(idx) = ring.iter().position(|&ws| ws == current) else {
            return ring.first().copied();
        };
        let len = ring.len();
        let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
        Some(ring[next])
    }

    pub fn next_workspace(&self) -> Option<ConId> {
        self.step_workspace(&self.workspaces(), true)
    }

    pub fn prev_workspace(&self) -> Option<ConId> {
        self.step_workspace(&self.workspaces(), false)
    }

    fn current_output_ring(&self) -> Vec<ConId> {
        self.current_workspace()
            .and_then(|ws| self.output_of(ws))
            .map(|out| self.workspaces_on(out))
            .unwrap_or_default()
    }

    pub fn next_workspace_on_output(&self) -> Option<ConId> {
        self.step_workspace(&self.current_output_ring(), true)
    }

    pub fn prev_workspace_on_output(&self) -> Option<ConId> {
        self.step_workspace(&self.current_output_ring(), false)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::geometry::Rect;

    fn two_outputs() -> (Tree, OutputId, OutputId) {
        let mut tree = Tree::new();
        let a = tree.add_output("out-0", Rect::new(0, 0, 1000, 1000));
        let b = tree.add_output("out-1", Rect::new(1000, 0, 1000, 1000));
        (tree, a, b)
    }

    #[test]
    fn reserved_name_detection_is_case_insensitive() {
        assert!(is_reserved_name("__trellis_scratch"));
        assert!(is_reserved_name("__TRELLIS_foo"));
        assert!(!is_reserved_name("mail"));
        assert!(!is_reserved_name("__other_thing"));
    }

    #[test]
    fn create_and_find_workspace_by_name() {
        let (mut tree, a, _b) = two_outputs();
        let ws = tree.new_workspace_on(a, "mail");
        assert_eq!(tree.workspace_by_name("mail"), Some(ws));
        assert_eq!(tree.workspace_by_name("other"), None);
    }

    #[test]
    fn auto_orientation_follows_output_shape() {
        let mut tree = Tree::new();
        let wide = tree.add_output("wide", Rect::new(0, 0, 1920, 1080));
        let tall = tree.add_output("tall", Rect::new(1920, 0, 1080, 1920));
        let ws_wide = tree.new_workspace_on(wide, "w");
        let ws_tall = tree.new_workspace_on(tall, "t");
        assert_eq!(tree[ws_wide].orientation, Orientation::Horizontal);
        assert_eq!(tree[ws_tall].orientation, Orientation::Vertical);
    }

    #[test]
    fn visibility_follows_content_focus_front() {
        let (mut tree, a, _b) = two_outputs();
        let ws1 = tree.new_workspace_on(a, "1");
        let ws2 = tree.new_workspace_on(a, "2");
        tree.focus(ws1);
        assert!(tree.workspace_is_visible(ws1));
        assert!(!tree.workspace_is_visible(ws2));
        assert_eq!(tree.visible_workspace_on(a), Some(ws1));

        assert!(tree.show_workspace(ws2));
        assert!(tree.workspace_is_visible(ws2));
        assert_eq!(tree.previous_workspace_name(), Some("1"));
    }

    #[test]
    fn show_workspace_lands_on_its_focus_top() {
        let (mut tree, a, _b) = two_outputs();
        let ws1 = tree.new_workspace_on(a, "1");
        let ws2 = tree.new_workspace_on(a, "2");
        let one = tree.open_con(ws2);
        let two = tree.open_con(ws2);
        tree.focus(two);
        tree.focus(one);
        tree.show_workspace(ws1);
        assert!(tree.show_workspace(ws2));
        assert_eq!(tree.focused(), one);
    }

    #[test]
    fn show_already_focused_workspace_is_a_noop() {
        let (mut tree, a, _b) = two_outputs();
        let ws1 = tree.new_workspace_on(a, "1");
        tree.focus(ws1);
        assert!(!tree.show_workspace(ws1));
        assert_eq!(tree.previous_workspace_name(), None);
    }

    #[test]
    fn workspace_ring_wraps_across_outputs() {
        let (mut tree, a, b) = two_outputs();
        let ws1 = tree.new_workspace_on(a, "1");
        let ws2 = tree.new_workspace_on(a, "2");
        let ws3 = tree.new_workspace_on(b, "3");
        tree.focus(ws3);
        assert_eq!(tree.next_workspace(), Some(ws1));
        assert_eq!(tree.prev_workspace(), Some(ws2));
    }

    #[test]
    fn per_output_ring_ignores_other_outputs() {
        let (mut tree, a, b) = two_outputs();
        let ws1 = tree.new_workspace_on(a, "1");
        let ws2 = tree.new_workspace_on(a, "2");
        let _ws3 = tree.new_workspace_on(b, "3");
        tree.focus(ws2);
        assert_eq!(tree.next_workspace_on_output(), Some(ws1));
        assert_eq!(tree.prev_workspace_on_output(), Some(ws1));
    }

    #[test]
    fn get_or_create_prefers_existing() {
        let (mut tree, a, _b) = two_outputs();
        let ws = tree.new_workspace_on(a, "mail");
        tree.focus(ws);
        assert_eq!(tree.get_or_create_workspace("mail", None), Some(ws));
        let created = tree.get_or_create_workspace("web", None).unwrap();
        assert_eq!(tree.output_of(created), Some(a));
    }

    #[test]
    fn scratchpad_workspace_is_not_in_the_ring() {
        let (tree, _a, _b) = two_outputs();
        assert!(tree.workspaces().iter().all(|&ws| !is_reserved_name(&tree[ws].name)));
    }
}
