use tracing::debug;

use super::{CommandError, CommandReply, ResizeWay};
use crate::model::con::{ConId, ConKind, Direction, Layout};
use crate::model::tree::Tree;

/// Containers may never shrink below this share of their sibling group.
pub(crate) const MIN_PERCENT: f64 = 0.05;

/// True if `a` is definitely greater than `b` under a relative epsilon.
pub(crate) fn definitely_greater_than(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b) > (if a.abs() < b.abs() { b.abs() } else { a.abs() }) * epsilon
}

/// Resizes the focused container. Floating containers adjust their
/// rectangle directly; tiling containers redistribute percentages with
/// their neighbor in the requested direction.
pub(crate) fn resize(
    tree: &mut Tree,
    way: ResizeWay,
    direction: Direction,
    px: i32,
    ppt: i32,
) -> Result<CommandReply, CommandError> {
    let (px, ppt) = match way {
        ResizeWay::Grow => (px, ppt),
        ResizeWay::Shrink => (-px, -ppt),
    };
    let focused = tree.focused();
    if let Some(wrapper) = tree.floating_wrapper_of(focused) {
        debug!("floating resize");
        resize_floating(tree, wrapper, direction, px);
        return Ok(CommandReply::ok());
    }
    debug!("tiling resize");
    resize_tiling(tree, direction, ppt)
}

/// Growing toward up/left moves the origin so the opposite edge stays put.
fn resize_floating(tree: &mut Tree, wrapper: ConId, direction: Direction, px: i32) {
    let rect = &mut tree.con_mut(wrapper).rect;
    match direction {
        Direction::Up => {
            rect.y -= px;
            rect.height += px;
        }
        Direction::Down => rect.height += px,
        Direction::Left => {
            rect.x -= px;
            rect.width += px;
        }
        Direction::Right => rect.width += px,
    }
}

fn resize_tiling(tree: &mut Tree, direction: Direction, ppt: i32) -> Result<CommandReply, CommandError> {
    // stacked and tabbed ancestors expose no independent sizes
    let mut current = tree.focused();
    while let Some(parent) = tree[current].parent() {
        if matches!(tree[parent].layout, Layout::Stacked | Layout::Tabbed) {
            current = parent;
        } else {
            break;
        }
    }

    // then go further up until an ancestor's parent splits along the
    // requested orientation
    let search = direction.orientation();
    while !matches!(tree[current].kind, ConKind::Workspace | ConKind::FloatingWrapper) {
        match tree[current].parent() {
            Some(parent) if tree[parent].orientation != search => current = parent,
            _ => break,
        }
    }

    let parent = tree[current].parent().ok_or_else(|| {
        CommandError::Structural("cannot resize: the focused container has no split ancestor".into())
    })?;
    if tree[parent].orientation != search {
        return Err(CommandError::Structural(format!(
            "cannot resize in that direction: the focus is in a {:?} split container",
            tree[parent].orientation
        )));
    }

    let siblings = tree.tiling_children(parent);
    let idx = siblings
        .iter()
        .position(|&c| c == current)
        .ok_or_else(|| CommandError::Structural("focused container left its sibling group".into()))?;
    let other = match direction {
        Direction::Up | Direction::Left => idx.checked_sub(1).map(|i| siblings[i]),
        Direction::Down | Direction::Right => siblings.get(idx + 1).copied(),
    }
    .ok_or_else(|| {
        CommandError::Unsatisfiable("no other container in this direction found, cannot resize".into())
    })?;

    // seed uninitialized shares with the equal split
    let default_percent = 1.0 / siblings.len() as f64;
    if tree[current].percent == 0.0 {
        tree.con_mut(current).percent = default_percent;
    }
    if tree[other].percent == 0.0 {
        tree.con_mut(other).percent = default_percent;
    }

    let delta = f64::from(ppt) / 100.0;
    let new_current = tree[current].percent + delta;
    let new_other = tree[other].percent - delta;
    debug!(new_current, new_other, "computed percentages");
    if definitely_greater_than(new_current, MIN_PERCENT, f64::EPSILON)
        && definitely_greater_than(new_other, MIN_PERCENT, f64::EPSILON)
    {
        tree.con_mut(current).percent = new_current;
        tree.con_mut(other).percent = new_other;
    } else {
        debug!("not resizing, already at minimum size");
    }
    Ok(CommandReply::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitely_greater_than_rejects_noise() {
        assert!(definitely_greater_than(0.06, 0.05, f64::EPSILON));
        assert!(!definitely_greater_than(0.05, 0.05, f64::EPSILON));
        // a difference within rounding error of the operands is not
        // "definitely" greater
        let a = 0.05 + f64::EPSILON * 0.01;
        assert!(!definitely_greater_than(a, 0.05, f64::EPSILON));
    }

    #[test]
    fn definitely_greater_than_scales_with_magnitude() {
        assert!(definitely_greater_than(1000.1, 1000.0, 1e-9));
        assert!(!definitely_greater_than(1000.0 + 1e-10, 1000.0, 1e-9));
    }
}
