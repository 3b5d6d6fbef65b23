use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use super::criteria::{CandidateSet, Criteria};
use super::record::Record;
use super::resize;
use super::{
    BorderArg, Command, CommandError, CommandReply, FloatingArg, FocusLevel, FullscreenArg,
    KillMode, OutputTarget, ResizeWay, Verb, WindowModeArg, WorkspaceTarget,
};
use crate::common::config::Config;
use crate::ipc::{Notification, WorkspaceChange};
use crate::model::con::{
    BorderStyle, ConId, ConKind, Direction, FullscreenMode, Layout, Orientation,
};
use crate::model::outputs::OutputId;
use crate::model::tree::Tree;
use crate::model::workspaces;

/// Re-layout capability. The engine calls it after every mutating command;
/// painting itself happens elsewhere.
pub trait RelayoutSink {
    fn request_relayout(&mut self);
}

/// Sink for callers that repaint on their own schedule.
#[derive(Default)]
pub struct NoopRelayout;

impl RelayoutSink for NoopRelayout {
    fn request_relayout(&mut self) {}
}

/// Executes commands against a container tree.
///
/// All state a command needs is threaded through explicitly: the tree comes
/// in per call, the candidate set is resolved per command, and the engine
/// itself only owns the ambient collaborators (relayout sink, notification
/// channel, command recorder).
pub struct CommandEngine {
    config: Config,
    render: Box<dyn RelayoutSink>,
    notifications: Option<Sender<Notification>>,
    record: Option<Record>,
    shutdown: bool,
}

impl CommandEngine {
    pub fn new(config: Config) -> CommandEngine {
        CommandEngine {
            config,
            render: Box::new(NoopRelayout),
            notifications: None,
            record: None,
            shutdown: false,
        }
    }

    pub fn set_relayout_sink(&mut self, sink: Box<dyn RelayoutSink>) {
        self.render = sink;
    }

    pub fn set_notification_sender(&mut self, tx: Sender<Notification>) {
        self.notifications = Some(tx);
    }

    pub fn set_record(&mut self, record: Record) {
        self.record = Some(record);
    }

    /// True once an `exit` command ran. The caller owns actual process
    /// termination.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    /// Resolves the command's criteria and executes its verb. Failures come
    /// back as structured replies; nothing here aborts the process.
    pub fn run(&mut self, tree: &mut Tree, command: &Command) -> CommandReply {
        info!(verb = ?command.verb, "executing command");
        if let Some(record) = &mut self.record {
            record.on_command(command);
        }
        let matched = CandidateSet::matching(tree, &command.criteria);
        match self.dispatch(tree, command, matched) {
            Ok(reply) => reply,
            Err(err) => {
                warn!("{err}");
                CommandReply::failure(err.to_string())
            }
        }
    }

    fn dispatch(
        &mut self,
        tree: &mut Tree,
        command: &Command,
        matched: CandidateSet,
    ) -> Result<CommandReply, CommandError> {
        let criteria = &command.criteria;
        match &command.verb {
            Verb::MoveToWorkspace(which) => self.cmd_move_to_workspace(tree, criteria, matched, *which),
            Verb::MoveToWorkspaceName(name) => {
                self.cmd_move_to_workspace_name(tree, criteria, matched, name)
            }
            Verb::Resize { way, direction, px, ppt } => {
                self.cmd_resize(tree, *way, *direction, *px, *ppt)
            }
            Verb::Border(style) => self.cmd_border(tree, criteria, matched, *style),
            Verb::Split(orientation) => self.cmd_split(tree, *orientation),
            Verb::Kill(mode) => self.cmd_kill(tree, criteria, matched, *mode),
            Verb::FocusDirection(direction) => self.cmd_focus_direction(tree, *direction),
            Verb::FocusWindowMode(mode) => self.cmd_focus_window_mode(tree, *mode),
            Verb::FocusLevel(level) => self.cmd_focus_level(tree, *level),
            Verb::Focus => self.cmd_focus(tree, criteria, matched),
            Verb::FocusOutput(target) => self.cmd_focus_output(tree, criteria, matched, target),
            Verb::Fullscreen(mode) => self.cmd_fullscreen(tree, criteria, matched, *mode),
            Verb::MoveDirection { direction, px } => self.cmd_move_direction(tree, *direction, *px),
            Verb::Layout(layout) => self.cmd_layout(tree, criteria, matched, *layout),
            Verb::Mark(value) => self.cmd_mark(tree, criteria, matched, value),
            Verb::MoveToOutput(target) => self.cmd_move_to_output(tree, criteria, matched, target),
            Verb::MoveWorkspaceToOutput(target) => {
                self.cmd_move_workspace_to_output(tree, criteria, matched, target)
            }
            Verb::ScratchpadShow => self.cmd_scratchpad_show(tree, criteria, matched),
            Verb::MoveScratchpad => self.cmd_move_scratchpad(tree, criteria, matched),
            Verb::Workspace(which) => self.cmd_workspace(tree, *which),
            Verb::WorkspaceName(name) => self.cmd_workspace_name(tree, name),
            Verb::WorkspaceBackAndForth => self.cmd_workspace_back_and_forth(tree),
            Verb::Floating(arg) => self.cmd_floating(tree, criteria, matched, *arg),
            Verb::Open => self.cmd_open(tree),
            Verb::Nop(comment) => self.cmd_nop(comment.as_deref()),
            Verb::Exit => self.cmd_exit(),
        }
    }

    fn relayout(&mut self) {
        self.render.request_relayout();
    }

    fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.notifications {
            let _ = tx.send(notification);
        }
    }

    /// Workspace switch that publishes the workspace-changed event when a
    /// switch actually happened.
    fn show_workspace(&mut self, tree: &mut Tree, ws: ConId) {
        if tree.show_workspace(ws) {
            self.notify(Notification::Workspace {
                change: WorkspaceChange::Focus,
            });
        }
    }

    fn resolve_workspace_target(
        &self,
        tree: &Tree,
        which: WorkspaceTarget,
    ) -> Result<ConId, CommandError> {
        match which {
            WorkspaceTarget::Next => tree.next_workspace(),
            WorkspaceTarget::Prev => tree.prev_workspace(),
            WorkspaceTarget::NextOnOutput => tree.next_workspace_on_output(),
            WorkspaceTarget::PrevOnOutput => tree.prev_workspace_on_output(),
        }
        .ok_or_else(|| CommandError::Unsatisfiable("no workspace in that direction".into()))
    }

    fn resolve_output_target(
        &self,
        tree: &Tree,
        target: &OutputTarget,
        from: OutputId,
    ) -> Result<OutputId, CommandError> {
        match target {
            OutputTarget::Direction(direction) => tree.output_in_direction(*direction, from),
            OutputTarget::Named(name) => tree.output_by_name(name),
        }
        .ok_or_else(|| CommandError::Unsatisfiable("no such output found".into()))
    }

    /// The output the candidates consider current, derived from the last
    /// candidate's geometry.
    fn current_output_of(&self, tree: &Tree, targets: &[ConId]) -> Result<OutputId, CommandError> {
        targets
            .iter()
            .filter_map(|&con| tree.output_for_con(con))
            .next_back()
            .ok_or_else(|| CommandError::Unsatisfiable("cannot determine the current output".into()))
    }

    fn fullscreen_focus_guard(&self, tree: &Tree) -> Result<(), CommandError> {
        let focused = tree.focused();
        if tree[focused].kind != ConKind::Workspace
            && tree[focused].fullscreen != FullscreenMode::None
        {
            return Err(CommandError::Unsatisfiable(
                "cannot change focus while in fullscreen mode".into(),
            ));
        }
        Ok(())
    }

    fn cmd_move_to_workspace(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        which: WorkspaceTarget,
    ) -> Result<CommandReply, CommandError> {
        let ws = self.resolve_workspace_target(tree, which)?;
        for con in matched.or_focused(tree, criteria) {
            tree.move_to_workspace(con, ws);
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_move_to_workspace_name(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        name: &str,
    ) -> Result<CommandReply, CommandError> {
        if workspaces::is_reserved_name(name) {
            info!("cannot move containers to an internal workspace");
            return Ok(CommandReply::failure(format!(
                "workspace names starting with {} are reserved",
                workspaces::RESERVED_WS_PREFIX
            )));
        }
        // error out early so an unmovable target does not create the
        // workspace as a side effect
        if criteria.is_empty() && tree[tree.focused()].kind == ConKind::Workspace {
            return Ok(CommandReply::failure(
                "the focused container is a workspace and cannot be moved",
            ));
        }
        let targets = matched.or_focused(tree, criteria);
        if targets.is_empty() {
            return Ok(CommandReply::failure("no containers matched"));
        }
        let ws = tree
            .get_or_create_workspace(name, self.config.default_orientation.fixed())
            .ok_or_else(|| CommandError::Unsatisfiable("no output to create the workspace on".into()))?;
        for con in targets {
            tree.move_to_workspace(con, ws);
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_resize(
        &mut self,
        tree: &mut Tree,
        way: ResizeWay,
        direction: Direction,
        px: i32,
        ppt: i32,
    ) -> Result<CommandReply, CommandError> {
        let reply = resize::resize(tree, way, direction, px, ppt)?;
        self.relayout();
        Ok(reply)
    }

    fn cmd_border(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        style: BorderArg,
    ) -> Result<CommandReply, CommandError> {
        for con in matched.or_focused(tree, criteria) {
            let next = match style {
                // the cycle starts from each candidate's current style
                BorderArg::Toggle => tree[con].border.toggled(),
                BorderArg::Normal => BorderStyle::Normal,
                BorderArg::None => BorderStyle::None,
                BorderArg::OnePixel => BorderStyle::OnePixel,
            };
            tree.con_mut(con).border = next;
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_split(
        &mut self,
        tree: &mut Tree,
        orientation: Orientation,
    ) -> Result<CommandReply, CommandError> {
        debug!(?orientation, "splitting focused container");
        let focused = tree.focused();
        tree.split(focused, orientation);
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_kill(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        mode: KillMode,
    ) -> Result<CommandReply, CommandError> {
        debug!(?mode, "kill");
        // the empty-criteria check matters here, not an empty result: a
        // match that found nothing must kill nothing
        if criteria.is_empty() {
            let focused = tree.focused();
            tree.close(focused);
        } else {
            for &con in matched.ids() {
                // candidates may have died with an earlier sibling; keep
                // going regardless
                if tree.contains(con) {
                    tree.close(con);
                }
            }
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_focus_direction(
        &mut self,
        tree: &mut Tree,
        direction: Direction,
    ) -> Result<CommandReply, CommandError> {
        self.fullscreen_focus_guard(tree)?;
        let target = tree.next_in_direction(direction).ok_or_else(|| {
            CommandError::Unsatisfiable("no container in that direction".into())
        })?;
        tree.focus(target);
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_focus_window_mode(
        &mut self,
        tree: &mut Tree,
        mode: WindowModeArg,
    ) -> Result<CommandReply, CommandError> {
        self.fullscreen_focus_guard(tree)?;
        let Some(ws) = tree.current_workspace() else {
            return Ok(CommandReply::failure("no workspace is focused"));
        };
        let order: Vec<ConId> = tree[ws].focus_order().to_vec();
        let want_floating = match mode {
            WindowModeArg::Floating => true,
            WindowModeArg::Tiling => false,
            WindowModeArg::ModeToggle => {
                // the most recently focused child decides which regime to
                // toggle into
                let front_floating = order
                    .first()
                    .is_some_and(|&c| tree[c].kind == ConKind::FloatingWrapper);
                !front_floating
            }
        };
        for con in order {
            if (tree[con].kind == ConKind::FloatingWrapper) != want_floating {
                continue;
            }
            let target = tree.descend_focused(con);
            tree.focus(target);
            break;
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_focus_level(
        &mut self,
        tree: &mut Tree,
        level: FocusLevel,
    ) -> Result<CommandReply, CommandError> {
        self.fullscreen_focus_guard(tree)?;
        let focused = tree.focused();
        match level {
            FocusLevel::Parent => {
                if let Some(parent) = tree[focused].parent() {
                    if matches!(
                        tree[parent].kind,
                        ConKind::Workspace | ConKind::Normal | ConKind::FloatingWrapper
                    ) {
                        tree.focus(parent);
                    }
                }
            }
            FocusLevel::Child => {
                let next = tree[focused]
                    .focus_order()
                    .first()
                    .or_else(|| tree[focused].children().first())
                    .copied();
                if let Some(next) = next {
                    tree.focus(next);
                }
            }
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    /// The focus-transfer protocol. Focusing a candidate on another
    /// workspace first primes that workspace's focus order, restores the
    /// original focus, and only then switches workspaces, so the visible
    /// warp lands on the candidate instead of whatever was focused there
    /// before.
    fn cmd_focus(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
    ) -> Result<CommandReply, CommandError> {
        self.fullscreen_focus_guard(tree)?;
        if criteria.is_empty() {
            return Ok(CommandReply::failure(
                "you have to specify which window/container should be focused",
            ));
        }
        let mut count = 0usize;
        for &con in matched.ids() {
            // dock containers have no workspace and cannot take focus
            let Some(ws) = tree.workspace_of(con) else {
                debug!("skipping dock container");
                continue;
            };
            let currently_focused = tree.focused();
            tree.focus(con);
            tree.focus(currently_focused);
            self.show_workspace(tree, ws);
            tree.focus(con);
            count += 1;
        }
        if count > 1 {
            warn!(
                "the criteria matched {count} containers, but only one container \
                 can be focused at a time"
            );
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_focus_output(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        target: &OutputTarget,
    ) -> Result<CommandReply, CommandError> {
        let targets = matched.or_focused(tree, criteria);
        let from = self.current_output_of(tree, &targets)?;
        let output = self.resolve_output_target(tree, target, from)?;
        let ws = tree.visible_workspace_on(output).ok_or_else(|| {
            CommandError::Unsatisfiable("no visible workspace on that output".into())
        })?;
        self.show_workspace(tree, ws);
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_fullscreen(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        mode: FullscreenArg,
    ) -> Result<CommandReply, CommandError> {
        let mode = match mode {
            FullscreenArg::Output => FullscreenMode::Output,
            FullscreenArg::Global => FullscreenMode::Global,
        };
        for con in matched.or_focused(tree, criteria) {
            tree.toggle_fullscreen(con, mode);
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_move_direction(
        &mut self,
        tree: &mut Tree,
        direction: Direction,
        px: i32,
    ) -> Result<CommandReply, CommandError> {
        let focused = tree.focused();
        if let Some(wrapper) = tree.floating_wrapper_of(focused) {
            debug!("floating move with {px} pixels");
            let rect = &mut tree.con_mut(wrapper).rect;
            match direction {
                Direction::Left => rect.x -= px,
                Direction::Right => rect.x += px,
                Direction::Up => rect.y -= px,
                Direction::Down => rect.y += px,
            }
        } else if !tree.move_in_direction(direction) {
            return Err(CommandError::Unsatisfiable(
                "cannot move the container in that direction".into(),
            ));
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_layout(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        layout: Layout,
    ) -> Result<CommandReply, CommandError> {
        debug!(?layout, "changing layout");
        if criteria.is_empty() {
            // with no criteria the layout applies to the focused
            // container's parent
            if let Some(parent) = tree[tree.focused()].parent() {
                if matches!(
                    tree[parent].kind,
                    ConKind::Workspace | ConKind::Normal | ConKind::FloatingWrapper
                ) {
                    tree.con_mut(parent).layout = layout;
                }
            }
        } else {
            for &con in matched.ids() {
                tree.con_mut(con).layout = layout;
            }
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_mark(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        value: &str,
    ) -> Result<CommandReply, CommandError> {
        // marks are unique tree-wide: strip the value everywhere first
        tree.clear_mark(value);
        for con in matched.or_focused(tree, criteria) {
            tree.con_mut(con).mark = Some(value.to_owned());
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_move_to_output(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        target: &OutputTarget,
    ) -> Result<CommandReply, CommandError> {
        let targets = matched.or_focused(tree, criteria);
        let from = self.current_output_of(tree, &targets)?;
        let output = self.resolve_output_target(tree, target, from)?;
        let ws = tree.visible_workspace_on(output).ok_or_else(|| {
            CommandError::Unsatisfiable("no visible workspace on the destination output".into())
        })?;
        for con in targets {
            tree.move_to_workspace(con, ws);
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_move_workspace_to_output(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        target: &OutputTarget,
    ) -> Result<CommandReply, CommandError> {
        for con in matched.or_focused(tree, criteria) {
            let Some(from) = tree.output_for_con(con) else {
                continue;
            };
            let output = self.resolve_output_target(tree, target, from)?;
            let Some(ws) = tree.workspace_of(con) else {
                continue;
            };
            let Some(source) = tree.output_of(ws) else {
                continue;
            };
            if source == output {
                continue;
            }
            if tree.workspaces_on(source).len() == 1 {
                info!(
                    "not moving workspace {:?}, it is the only workspace on its output",
                    tree[ws].name
                );
                continue;
            }
            let was_visible = tree.workspace_is_visible(ws);
            let old_content = tree[ws].parent();
            tree.detach(ws);
            if was_visible {
                // the detached workspace was showing; let the old output
                // surface the new top of its focus stack before the
                // workspace reappears elsewhere
                if let Some(old_content) = old_content {
                    if let Some(next) = tree[old_content].focus_order().first().copied() {
                        self.show_workspace(tree, next);
                    }
                }
            }
            let content = tree.output(output).content;
            tree.attach(ws, content);
            self.notify(Notification::Workspace {
                change: WorkspaceChange::Move,
            });
            if was_visible {
                self.show_workspace(tree, ws);
            }
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_scratchpad_show(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
    ) -> Result<CommandReply, CommandError> {
        if criteria.is_empty() {
            tree.scratchpad_show(None);
        } else {
            for &con in matched.ids() {
                tree.scratchpad_show(Some(con));
            }
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_move_scratchpad(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
    ) -> Result<CommandReply, CommandError> {
        for con in matched.or_focused(tree, criteria) {
            tree.scratchpad_move(con);
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_workspace(
        &mut self,
        tree: &mut Tree,
        which: WorkspaceTarget,
    ) -> Result<CommandReply, CommandError> {
        let ws = self.resolve_workspace_target(tree, which)?;
        self.show_workspace(tree, ws);
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_workspace_name(
        &mut self,
        tree: &mut Tree,
        name: &str,
    ) -> Result<CommandReply, CommandError> {
        if workspaces::is_reserved_name(name) {
            info!("cannot switch to an internal workspace");
            return Ok(CommandReply::failure(format!(
                "workspace names starting with {} are reserved",
                workspaces::RESERVED_WS_PREFIX
            )));
        }
        if let Some(current) = tree.current_workspace() {
            if tree[current].name == name {
                debug!("this workspace is already focused");
                if self.config.workspace_auto_back_and_forth {
                    self.back_and_forth(tree);
                    self.relayout();
                }
                return Ok(CommandReply::failure("workspace is already focused"));
            }
        }
        let ws = tree
            .get_or_create_workspace(name, self.config.default_orientation.fixed())
            .ok_or_else(|| CommandError::Unsatisfiable("no output to create the workspace on".into()))?;
        self.show_workspace(tree, ws);
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_workspace_back_and_forth(
        &mut self,
        tree: &mut Tree,
    ) -> Result<CommandReply, CommandError> {
        self.back_and_forth(tree);
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn back_and_forth(&mut self, tree: &mut Tree) {
        let Some(name) = tree.previous_workspace_name().map(str::to_owned) else {
            debug!("no previous workspace to switch back to");
            return;
        };
        if let Some(ws) =
            tree.get_or_create_workspace(&name, self.config.default_orientation.fixed())
        {
            self.show_workspace(tree, ws);
        }
    }

    fn cmd_floating(
        &mut self,
        tree: &mut Tree,
        criteria: &Criteria,
        matched: CandidateSet,
        arg: FloatingArg,
    ) -> Result<CommandReply, CommandError> {
        for con in matched.or_focused(tree, criteria) {
            match arg {
                FloatingArg::Enable => tree.floating_enable(con),
                FloatingArg::Disable => tree.floating_disable(con),
                FloatingArg::Toggle => tree.toggle_floating(con),
            }
        }
        self.relayout();
        Ok(CommandReply::ok())
    }

    fn cmd_open(&mut self, tree: &mut Tree) -> Result<CommandReply, CommandError> {
        let ws = tree
            .current_workspace()
            .ok_or_else(|| CommandError::Unsatisfiable("no workspace is focused".into()))?;
        let con = tree.open_con(ws);
        tree.focus(con);
        self.relayout();
        Ok(CommandReply::ok().with_id(con.to_raw()))
    }

    fn cmd_nop(&mut self, comment: Option<&str>) -> Result<CommandReply, CommandError> {
        info!("nop: {}", comment.unwrap_or(""));
        Ok(CommandReply::ok())
    }

    fn cmd_exit(&mut self) -> Result<CommandReply, CommandError> {
        info!("exiting due to user command");
        self.shutdown = true;
        Ok(CommandReply::ok())
    }
}
