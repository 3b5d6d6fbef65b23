use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::con::{ConId, ConKind, Direction};
use crate::model::geometry::Rect;
use crate::model::tree::Tree;

/// A physical display region. Owns an output container whose Content child
/// hosts the workspaces; dock clients park under the Dockarea child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub rect: Rect,
    pub con: ConId,
    pub content: ConId,
    pub dockarea: ConId,
}

impl Output {
    /// Reserved outputs (scratchpad host) never take part in directional
    /// navigation or workspace cycling.
    pub fn is_internal(&self) -> bool {
        self.name.starts_with("__")
    }
}

/// Index of an output within the tree's output list. Outputs are never
/// removed in this core, so the index is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputId(pub(crate) usize);

impl Tree {
    /// Registers a new output and builds its container skeleton.
    pub fn add_output(&mut self, name: &str, rect: Rect) -> OutputId {
        let con = self.mk_con(ConKind::Output);
        self.cons[con].name = name.to_owned();
        self.cons[con].rect = rect;
        let root = self.root;
        self.attach(con, root);
        let content = self.mk_con(ConKind::Content);
        self.attach(content, con);
        let dockarea = self.mk_con(ConKind::Dockarea);
        self.attach(dockarea, con);
        self.outputs.push(Output {
            name: name.to_owned(),
            rect,
            con,
            content,
            dockarea,
        });
        debug!(name, ?rect, "added output");
        OutputId(self.outputs.len() - 1)
    }

    pub fn output(&self, id: OutputId) -> &Output {
        &self.outputs[id.0]
    }

    pub fn output_ids(&self) -> impl Iterator<Item = OutputId> + '_ {
        (0..self.outputs.len()).map(OutputId)
    }

    fn external_outputs(&self) -> impl Iterator<Item = OutputId> + '_ {
        self.output_ids().filter(|&id| !self.outputs[id.0].is_internal())
    }

    pub fn output_by_name(&self, name: &str) -> Option<OutputId> {
        self.output_ids().find(|&id| self.outputs[id.0].name.eq_ignore_ascii_case(name))
    }

    /// The output whose rectangle contains the given point.
    pub fn output_containing(&self, x: i32, y: i32) -> Option<OutputId> {
        self.output_ids().find(|&id| self.outputs[id.0].rect.contains(x, y))
    }

    /// The output hosting `con`, resolved through the ancestor chain.
    pub fn output_of(&self, con: ConId) -> Option<OutputId> {
        let output_con = self.ancestors(con).find(|&a| self.cons[a].kind == ConKind::Output)?;
        self.output_ids().find(|&id| self.outputs[id.0].con == output_con)
    }

    /// The output for a container, preferring its on-screen position and
    /// falling back to the ancestor chain for containers with no geometry
    /// yet.
    pub fn output_for_con(&self, con: ConId) -> Option<OutputId> {
        let rect = self.cons.get(con)?.rect;
        self.output_containing(rect.x, rect.y).or_else(|| self.output_of(con))
    }

    /// Strict neighbor lookup: the nearest output whose center lies in the
    /// given direction.
    pub fn next_output(&self, direction: Direction, from: OutputId) -> Option<OutputId> {
        let origin = self.outputs[from.0].rect.center();
        self.external_outputs()
            .filter(|&id| id != from)
            .filter(|&id| {
                let c = self.outputs[id.0].rect.center();
                match direction {
                    Direction::Left => c.x < origin.x,
                    Direction::Right => c.x > origin.x,
                    Direction::Up => c.y < origin.y,
                    Direction::Down => c.y > origin.y,
                }
            })
            .min_by_key(|&id| {
                let c = self.outputs[id.0].rect.center();
                match direction {
                    Direction::Left | Direction::Right => ((c.x - origin.x).abs(), (c.y - origin.y).abs()),
                    Direction::Up | Direction::Down => ((c.y - origin.y).abs(), (c.x - origin.x).abs()),
                }
            })
    }

    /// The outermost output in the given direction (e.g. `Left` resolves to
    /// the leftmost output).
    pub fn outermost_output(&self, direction: Direction) -> Option<OutputId> {
        let key = |id: &OutputId| {
            let c = self.outputs[id.0].rect.center();
            match direction {
                Direction::Left | Direction::Right => c.x,
                Direction::Up | Direction::Down => c.y,
            }
        };
        let mut ids: Vec<OutputId> = self.external_outputs().collect();
        match direction {
            Direction::Left | Direction::Up => ids.sort_by_key(key),
            Direction::Right | Direction::Down => ids.sort_by_key(|id| std::cmp::Reverse(key(id))),
        }
        ids.first().copied()
    }

    /// Directional resolution with cyclic wraparound: when there is no
    /// neighbor in the requested direction, wrap to the outermost output on
    /// the opposite side.
    pub fn output_in_direction(&self, direction: Direction, from: OutputId) -> Option<OutputId> {
        self.next_output(direction, from)
            .or_else(|| self.outermost_output(direction.opposite()))
    }
}
