use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::ops::{Index, IndexMut};
use tracing::debug;

use crate::model::con::{Con, ConId, ConKind, Direction, FullscreenMode, Orientation};
use crate::model::outputs::Output;

/// The container tree: one arena of [`Con`] nodes plus the output records
/// and the globally focused container.
///
/// All structural mutation goes through the methods here. `attach` and
/// `detach` update both ends of every link in one step, so the tree is
/// structurally valid between any two operations even when a command fails
/// halfway through its candidate list.
#[derive(Serialize, Deserialize)]
pub struct Tree {
    pub(crate) cons: SlotMap<ConId, Con>,
    pub(crate) root: ConId,
    pub(crate) focused: ConId,
    pub(crate) outputs: Vec<Output>,
    pub(crate) previous_workspace: Option<String>,
}

impl Tree {
    pub fn new() -> Tree {
        let mut cons = SlotMap::with_key();
        let root = cons.insert(Con::new(ConKind::Root));
        let mut tree = Tree {
            cons,
            root,
            focused: root,
            outputs: Vec::new(),
            previous_workspace: None,
        };
        tree.init_scratchpad();
        tree
    }

    pub fn root(&self) -> ConId {
        self.root
    }

    pub fn focused(&self) -> ConId {
        self.focused
    }

    pub fn contains(&self, con: ConId) -> bool {
        self.cons.contains_key(con)
    }

    pub fn con(&self, con: ConId) -> Option<&Con> {
        self.cons.get(con)
    }

    pub fn con_mut(&mut self, con: ConId) -> &mut Con {
        &mut self.cons[con]
    }

    pub(crate) fn mk_con(&mut self, kind: ConKind) -> ConId {
        self.cons.insert(Con::new(kind))
    }

    /// Attaches a parentless container at the end of `parent`'s child list.
    /// The newcomer starts as the least recently focused child; only
    /// [`Tree::focus`] reorders focus lists.
    #[track_caller]
    pub fn attach(&mut self, con: ConId, parent: ConId) {
        debug_assert!(self.cons[con].parent.is_none(), "attach of an attached container");
        debug_assert!(
            !self.ancestors(parent).any(|a| a == con),
            "attach would create a cycle"
        );
        self.cons[con].parent = Some(parent);
        self.cons[parent].children.push(con);
        self.cons[parent].focus.push(con);
    }

    /// Unlinks a container from its parent. The subtree below `con` stays
    /// intact; `con` becomes a detached root until reattached or deleted.
    #[track_caller]
    pub fn detach(&mut self, con: ConId) {
        let Some(parent) = self.cons[con].parent.take() else {
            return;
        };
        let children = &mut self.cons[parent].children;
        if let Some(pos) = children.iter().position(|&c| c == con) {
            children.remove(pos);
        }
        let focus = &mut self.cons[parent].focus;
        if let Some(pos) = focus.iter().position(|&c| c == con) {
            focus.remove(pos);
        }
    }

    /// Makes `con` the globally focused container and records it as the most
    /// recently focused child at every level of its ancestor chain.
    pub fn focus(&mut self, con: ConId) {
        debug_assert!(self.cons.contains_key(con));
        let mut child = con;
        while let Some(parent) = self.cons[child].parent {
            let focus = &mut self.cons[parent].focus;
            if let Some(pos) = focus.iter().position(|&c| c == child) {
                focus.remove(pos);
            }
            focus.insert(0, child);
            child = parent;
        }
        self.focused = con;
    }

    /// Follows the focus lists downward to the most recently focused leaf.
    pub fn descend_focused(&self, con: ConId) -> ConId {
        let mut current = con;
        loop {
            let c = &self.cons[current];
            match c.focus.first().or_else(|| c.children.first()).copied() {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    /// All ancestors of `con`, starting with `con` itself.
    pub fn ancestors(&self, con: ConId) -> impl Iterator<Item = ConId> + '_ {
        let mut next = self.cons.contains_key(con).then_some(con);
        std::iter::from_fn(move || {
            let current = next;
            next = current.and_then(|c| self.cons[c].parent);
            current
        })
    }

    /// The workspace that owns `con`, if any. Containers parked in a dock
    /// area (and the outputs themselves) have none.
    pub fn workspace_of(&self, con: ConId) -> Option<ConId> {
        self.ancestors(con).find(|&a| self.cons[a].kind == ConKind::Workspace)
    }

    /// The floating wrapper around `con`, if `con` is part of a floating
    /// subtree.
    pub fn floating_wrapper_of(&self, con: ConId) -> Option<ConId> {
        self.ancestors(con).find(|&a| self.cons[a].kind == ConKind::FloatingWrapper)
    }

    pub fn is_floating(&self, con: ConId) -> bool {
        self.floating_wrapper_of(con).is_some()
    }

    /// Preorder traversal of the subtree rooted at `top`.
    pub fn preorder(&self, top: ConId) -> impl Iterator<Item = ConId> + '_ {
        let mut stack = if self.cons.contains_key(top) { vec![top] } else { Vec::new() };
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.cons[id].children.iter().rev().copied());
            Some(id)
        })
    }

    /// Every live container in tree-discovery order.
    pub fn all_cons(&self) -> impl Iterator<Item = ConId> + '_ {
        self.preorder(self.root)
    }

    /// Children that participate in tiling, i.e. everything but floating
    /// wrappers. Percent bookkeeping and sibling navigation only ever look
    /// at these.
    pub fn tiling_children(&self, parent: ConId) -> Vec<ConId> {
        self.cons[parent]
            .children
            .iter()
            .copied()
            .filter(|&c| self.cons[c].kind != ConKind::FloatingWrapper)
            .collect()
    }

    pub(crate) fn is_focus_inside(&self, con: ConId) -> bool {
        self.ancestors(self.focused).any(|a| a == con)
    }

    /// The container that should receive focus once `con` goes away.
    /// Must be called while `con` is still attached.
    fn next_focused_after(&self, con: ConId) -> Option<ConId> {
        let mut current = con;
        loop {
            let parent = self.cons[current].parent?;
            if let Some(&next) = self.cons[parent].focus.iter().find(|&&c| c != current) {
                return Some(self.descend_focused(next));
            }
            if self.cons[parent].kind == ConKind::Workspace {
                return Some(parent);
            }
            current = parent;
        }
    }

    /// Redistributes the tiling children's percentages of `parent` so that
    /// set shares sum to one. Called after a child has been removed.
    pub(crate) fn fix_percent(&mut self, parent: ConId) {
        let children = self.tiling_children(parent);
        let count = children.len();
        if count == 0 {
            return;
        }
        let mut distributed = 0.0;
        let mut with_percent = 0;
        for &child in &children {
            let percent = self.cons[child].percent;
            if percent > 0.0 {
                distributed += percent;
                with_percent += 1;
            }
        }
        if with_percent != count {
            let share = if with_percent == 0 {
                1.0 / count as f64
            } else {
                ((1.0 - distributed) / (count - with_percent) as f64).max(0.0)
            };
            for &child in &children {
                if self.cons[child].percent <= 0.0 {
                    self.cons[child].percent = share;
                }
            }
        }
        let total: f64 = children.iter().map(|&c| self.cons[c].percent).sum();
        if total > 0.0 && (total - 1.0).abs() > f64::EPSILON {
            for &child in &children {
                self.cons[child].percent /= total;
            }
        }
    }

    /// Closes a container: the whole subtree is removed, focus moves to the
    /// next container in focus order, and split parents left empty collapse.
    pub fn close(&mut self, con: ConId) {
        if !self.cons.contains_key(con) || con == self.root {
            return;
        }
        let parent = self.cons[con].parent;
        let next = if self.is_focus_inside(con) {
            self.next_focused_after(con)
        } else {
            None
        };
        self.detach(con);
        self.delete_subtree(con);
        if let Some(next) = next {
            self.focus(next);
        } else if self.is_focus_inside(con) || !self.cons.contains_key(self.focused) {
            self.focused = self.root;
        }
        if let Some(parent) = parent {
            self.fix_percent(parent);
            if self.cons[parent].kind == ConKind::Normal && self.cons[parent].children.is_empty() {
                self.close(parent);
            }
        }
    }

    fn delete_subtree(&mut self, con: ConId) {
        debug_assert!(self.cons[con].parent.is_none());
        let subtree: Vec<ConId> = self.preorder(con).collect();
        for id in subtree {
            self.cons.remove(id);
        }
    }

    /// Moves a container under another workspace, keeping floating
    /// containers floating (the wrapper moves as one unit). Reassignment is
    /// atomic: detach from the old parent, then attach to the new one.
    pub fn move_to_workspace(&mut self, con: ConId, workspace: ConId) {
        if !self.cons.contains_key(con) || self.cons[con].kind == ConKind::Workspace {
            return;
        }
        let subject = self.floating_wrapper_of(con).unwrap_or(con);
        if self.workspace_of(subject) == Some(workspace) {
            debug!("not moving, already on this workspace");
            return;
        }
        let old_parent = self.cons[subject].parent;
        let refocus = if self.is_focus_inside(subject) {
            self.next_focused_after(subject)
        } else {
            None
        };
        self.detach(subject);
        self.cons[subject].percent = 0.0;
        self.attach(subject, workspace);
        if let Some(old_parent) = old_parent {
            self.fix_percent(old_parent);
            if self.cons[old_parent].kind == ConKind::Normal
                && self.cons[old_parent].children.is_empty()
            {
                self.close(old_parent);
            }
        }
        if let Some(next) = refocus {
            if self.cons.contains_key(next) {
                self.focus(next);
            }
        }
    }

    /// Inserts a new split boundary above `con`. Splitting a workspace just
    /// changes its orientation; a single-child parent that already splits
    /// along `orientation` makes this a no-op.
    pub fn split(&mut self, con: ConId, orientation: Orientation) {
        if self.cons[con].kind == ConKind::Workspace {
            self.cons[con].orientation = orientation;
            return;
        }
        let Some(parent) = self.cons[con].parent else {
            return;
        };
        if self.cons[parent].orientation == orientation && self.cons[parent].children.len() == 1 {
            return;
        }
        let new = self.mk_con(ConKind::Normal);
        self.cons[new].orientation = orientation;
        self.cons[new].parent = Some(parent);
        // the new split container takes the place (and share) of `con`
        if let Some(pos) = self.cons[parent].children.iter().position(|&c| c == con) {
            self.cons[parent].children[pos] = new;
        }
        if let Some(pos) = self.cons[parent].focus.iter().position(|&c| c == con) {
            self.cons[parent].focus[pos] = new;
        }
        self.cons[new].percent = self.cons[con].percent;
        self.cons[con].percent = 0.0;
        self.cons[con].parent = Some(new);
        self.cons[new].children.push(con);
        self.cons[new].focus.push(con);
    }

    /// Creates an empty container on `workspace`.
    pub fn open_con(&mut self, workspace: ConId) -> ConId {
        let con = self.mk_con(ConKind::Normal);
        self.attach(con, workspace);
        con
    }

    /// Resolves the sibling in the given direction for focus movement,
    /// wrapping around at the ends of the sibling list. Ascends until it
    /// finds an ancestor level that splits along the direction's
    /// orientation.
    pub fn next_in_direction(&self, direction: Direction) -> Option<ConId> {
        let orientation = direction.orientation();
        let mut current = self.focused;
        loop {
            if self.cons[current].kind == ConKind::Workspace {
                return None;
            }
            let parent = self.cons[current].parent?;
            if !matches!(self.cons[parent].kind, ConKind::Workspace | ConKind::Normal) {
                return None;
            }
            let siblings = self.tiling_children(parent);
            if self.cons[parent].orientation == orientation && siblings.len() > 1 {
                let idx = siblings.iter().position(|&c| c == current)?;
                let len = siblings.len();
                let target = match direction {
                    Direction::Right | Direction::Down => siblings[(idx + 1) % len],
                    Direction::Left | Direction::Up => siblings[(idx + len - 1) % len],
                };
                return Some(self.descend_focused(target));
            }
            current = parent;
        }
    }

    /// Moves the focused container one step in tree order: swap with the
    /// neighboring sibling at the first ancestor level splitting along the
    /// direction, or escape to the grandparent at the edge of the list.
    pub fn move_in_direction(&mut self, direction: Direction) -> bool {
        let orientation = direction.orientation();
        let mut current = self.focused;
        if self.cons[current].kind != ConKind::Normal {
            return false;
        }
        let parent = loop {
            let Some(parent) = self.cons[current].parent else {
                return false;
            };
            if !matches!(self.cons[parent].kind, ConKind::Workspace | ConKind::Normal) {
                return false;
            }
            if self.cons[parent].orientation == orientation {
                break parent;
            }
            current = parent;
        };
        let siblings = self.tiling_children(parent);
        let Some(idx) = siblings.iter().position(|&c| c == current) else {
            return false;
        };
        let neighbor = match direction {
            Direction::Left | Direction::Up => idx.checked_sub(1).map(|i| siblings[i]),
            Direction::Right | Direction::Down => siblings.get(idx + 1).copied(),
        };
        match neighbor {
            Some(neighbor) => {
                let children = &mut self.cons[parent].children;
                let a = children.iter().position(|&c| c == current);
                let b = children.iter().position(|&c| c == neighbor);
                if let (Some(a), Some(b)) = (a, b) {
                    children.swap(a, b);
                }
                true
            }
            None => self.move_out_of(parent, current, direction),
        }
    }

    /// Escapes one nesting level: `current` leaves `parent` and becomes its
    /// sibling on the side given by `direction`.
    fn move_out_of(&mut self, parent: ConId, current: ConId, direction: Direction) -> bool {
        let Some(grandparent) = self.cons[parent].parent else {
            return false;
        };
        if !matches!(self.cons[grandparent].kind, ConKind::Workspace | ConKind::Normal) {
            return false;
        }
        let Some(parent_pos) = self.cons[grandparent].children.iter().position(|&c| c == parent)
        else {
            return false;
        };
        self.detach(current);
        self.cons[current].parent = Some(grandparent);
        let insert_at = match direction {
            Direction::Left | Direction::Up => parent_pos,
            Direction::Right | Direction::Down => parent_pos + 1,
        };
        self.cons[grandparent].children.insert(insert_at, current);
        self.cons[grandparent].focus.insert(0, current);
        self.cons[current].percent = 0.0;
        self.fix_percent(parent);
        if self.cons[parent].kind == ConKind::Normal && self.cons[parent].children.is_empty() {
            self.close(parent);
        }
        // restore the focus chain through the new location
        let focused = self.focused;
        if self.cons.contains_key(focused) {
            self.focus(focused);
        }
        true
    }

    /// Wraps a tiling container in a floating wrapper attached to its
    /// workspace. The wrapper inherits the container's rectangle.
    pub fn floating_enable(&mut self, con: ConId) {
        if self.is_floating(con) || self.cons[con].kind != ConKind::Normal {
            return;
        }
        let Some(workspace) = self.workspace_of(con) else {
            return;
        };
        let had_focus = self.is_focus_inside(con);
        let old_parent = self.cons[con].parent;
        self.detach(con);
        let wrapper = self.mk_con(ConKind::FloatingWrapper);
        self.cons[wrapper].rect = self.cons[con].rect;
        self.attach(wrapper, workspace);
        self.cons[con].percent = 0.0;
        self.attach(con, wrapper);
        if let Some(old_parent) = old_parent {
            if self.cons.contains_key(old_parent) {
                self.fix_percent(old_parent);
                if self.cons[old_parent].kind == ConKind::Normal
                    && self.cons[old_parent].children.is_empty()
                {
                    self.close(old_parent);
                }
            }
        }
        if had_focus {
            let focused = self.focused;
            self.focus(focused);
        }
    }

    /// Reverses [`Tree::floating_enable`]: the container rejoins the
    /// workspace's tiling children and the wrapper goes away.
    pub fn floating_disable(&mut self, con: ConId) {
        let Some(wrapper) = self.floating_wrapper_of(con) else {
            return;
        };
        let Some(workspace) = self.workspace_of(wrapper) else {
            return;
        };
        let had_focus = self.is_focus_inside(con);
        let subject = match self.cons[wrapper].children.first().copied() {
            Some(child) => child,
            None => return,
        };
        self.detach(subject);
        self.close(wrapper);
        self.attach(subject, workspace);
        if had_focus {
            self.focus(subject);
        }
    }

    pub fn toggle_floating(&mut self, con: ConId) {
        if self.is_floating(con) {
            self.floating_disable(con);
        } else {
            self.floating_enable(con);
        }
    }

    /// Flips a container in or out of the given fullscreen mode. The toggle
    /// itself is the only state check.
    pub fn toggle_fullscreen(&mut self, con: ConId, mode: FullscreenMode) {
        let current = self.cons[con].fullscreen;
        self.cons[con].fullscreen = if current == FullscreenMode::None {
            mode
        } else {
            FullscreenMode::None
        };
    }

    /// Removes `value` from every container currently holding it. Marks are
    /// unique tree-wide.
    pub fn clear_mark(&mut self, value: &str) {
        for con in self.cons.values_mut() {
            if con.mark.as_deref() == Some(value) {
                con.mark = None;
            }
        }
    }

    /// Debug rendering of the container tree.
    pub fn ascii_tree(&self) -> String {
        fn build(tree: &Tree, id: ConId) -> ascii_tree::Tree {
            let con = &tree.cons[id];
            let mut label = format!("{:?}", con.kind);
            if !con.name.is_empty() {
                label.push_str(&format!(" {:?}", con.name));
            }
            if let Some(window) = &con.window {
                label.push_str(&format!(" window={}", window.id));
            }
            if id == tree.focused {
                label.push_str(" *");
            }
            if con.children.is_empty() {
                ascii_tree::Tree::Leaf(vec![label])
            } else {
                ascii_tree::Tree::Node(
                    label,
                    con.children.iter().map(|&c| build(tree, c)).collect(),
                )
            }
        }
        let mut out = String::new();
        let _ = ascii_tree::write_tree(&mut out, &build(self, self.root));
        out
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Index<ConId> for Tree {
    type Output = Con;

    fn index(&self, index: ConId) -> &Con {
        &self.cons[index]
    }
}

impl IndexMut<ConId> for Tree {
    fn index_mut(&mut self, index: ConId) -> &mut Con {
        &mut self.cons[index]
    }
}
