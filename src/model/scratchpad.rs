use tracing::debug;

use crate::model::con::{ConId, ConKind};
use crate::model::geometry::Rect;
use crate::model::tree::Tree;

/// Reserved output hosting the scratchpad. It has no screen area; its only
/// purpose is to keep scratchpad containers out of every visible workspace.
pub(crate) const SCRATCH_OUTPUT_NAME: &str = "__trellis";

/// The hidden holding workspace for scratchpad containers.
pub const SCRATCH_WORKSPACE_NAME: &str = "__trellis_scratch";

impl Tree {
    pub(crate) fn init_scratchpad(&mut self) {
        let output = self.add_output(SCRATCH_OUTPUT_NAME, Rect::default());
        self.new_workspace_on(output, SCRATCH_WORKSPACE_NAME);
    }

    pub fn scratchpad_workspace(&self) -> Option<ConId> {
        self.workspace_by_name(SCRATCH_WORKSPACE_NAME)
    }

    /// Relocates a container into the scratchpad. Scratchpad containers are
    /// always floating; revealing one never disturbs the target workspace's
    /// tiling.
    pub fn scratchpad_move(&mut self, con: ConId) {
        if !self.cons.contains_key(con) || self.cons[con].kind != ConKind::Normal {
            return;
        }
        if self.workspace_of(con).is_none() {
            debug!("not moving dock container to scratchpad");
            return;
        }
        let Some(scratch) = self.scratchpad_workspace() else {
            return;
        };
        self.floating_enable(con);
        self.move_to_workspace(con, scratch);
        // most recently hidden comes back first on an unfiltered show
        if let Some(wrapper) = self.floating_wrapper_of(con) {
            let focus = &mut self.cons[scratch].focus;
            if let Some(pos) = focus.iter().position(|&c| c == wrapper) {
                focus.remove(pos);
                focus.insert(0, wrapper);
            }
        }
        debug!("moved container to scratchpad");
    }

    /// Reveals a scratchpad container on the focused workspace, centered on
    /// its output. With no explicit target the most recently used
    /// scratchpad container is chosen. Returns false when there is nothing
    /// to show.
    pub fn scratchpad_show(&mut self, con: Option<ConId>) -> bool {
        let Some(scratch) = self.scratchpad_workspace() else {
            return false;
        };
        let wrapper = match con {
            Some(con) => {
                let Some(wrapper) = self.floating_wrapper_of(con) else {
                    return false;
                };
                if self.workspace_of(wrapper) != Some(scratch) {
                    return false;
                }
                wrapper
            }
            None => match self.cons[scratch].focus.first().copied() {
                Some(wrapper) => wrapper,
                None => {
                    debug!("no scratchpad containers to show");
                    return false;
                }
            },
        };
        let Some(ws) = self.current_workspace() else {
            return false;
        };
        self.move_to_workspace(wrapper, ws);
        if let Some(output) = self.output_of(ws) {
            let screen = self.output(output).rect;
            let rect = self.cons[wrapper].rect;
            self.cons[wrapper].rect = rect.centered_in(&screen);
        }
        let target = self.descend_focused(wrapper);
        self.focus(target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::outputs::OutputId;

    fn setup() -> (Tree, OutputId, ConId, ConId, ConId) {
        let mut tree = Tree::new();
        let output = tree.add_output("out-0", Rect::new(0, 0, 1000, 800));
        let ws = tree.new_workspace_on(output, "1");
        let a = tree.open_con(ws);
        let b = tree.open_con(ws);
        tree.focus(a);
        (tree, output, ws, a, b)
    }

    #[test]
    fn move_hides_container_in_scratch_workspace() {
        let (mut tree, _output, ws, a, b) = setup();
        tree.scratchpad_move(a);
        let scratch = tree.scratchpad_workspace().unwrap();
        assert_eq!(tree.workspace_of(a), Some(scratch));
        assert!(tree.is_floating(a));
        assert_eq!(tree.tiling_children(ws), vec![b]);
    }

    #[test]
    fn show_reveals_most_recently_moved() {
        let (mut tree, _output, ws, a, b) = setup();
        let c = tree.open_con(ws);
        tree.scratchpad_move(a);
        tree.scratchpad_move(b);
        tree.focus(c);
        assert!(tree.scratchpad_show(None));
        assert_eq!(tree.workspace_of(b), Some(ws));
        assert!(tree.is_floating(b));
        assert_eq!(tree.focused(), b);
        // a stays hidden
        assert_eq!(tree.workspace_of(a), tree.scratchpad_workspace());
    }

    #[test]
    fn show_centers_the_wrapper_on_the_output() {
        let (mut tree, _output, _ws, a, b) = setup();
        tree.con_mut(a).rect = Rect::new(0, 0, 200, 100);
        tree.scratchpad_move(a);
        tree.focus(b);
        tree.scratchpad_show(None);
        let wrapper = tree.floating_wrapper_of(a).unwrap();
        assert_eq!(tree[wrapper].rect, Rect::new(400, 350, 200, 100));
    }

    #[test]
    fn show_with_empty_scratchpad_reports_nothing() {
        let (mut tree, _output, _ws, _a, _b) = setup();
        assert!(!tree.scratchpad_show(None));
    }

    #[test]
    fn show_specific_candidate_requires_scratchpad_membership() {
        let (mut tree, _output, _ws, a, b) = setup();
        tree.scratchpad_move(a);
        tree.focus(b);
        // b never went to the scratchpad
        assert!(!tree.scratchpad_show(Some(b)));
        assert!(tree.scratchpad_show(Some(a)));
        assert_eq!(tree.focused(), a);
    }
}
