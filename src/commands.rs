use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::con::{Direction, Layout, Orientation};

pub mod criteria;
pub mod engine;
pub mod record;
pub mod resize;


pub use criteria::{CandidateSet, Criteria};
pub use engine::{CommandEngine, NoopRelayout, RelayoutSink};

/// One fully parsed command: resolved criteria plus a validated verb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub criteria: Criteria,
    pub verb: Verb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkspaceTarget {
    Next,
    Prev,
    NextOnOutput,
    PrevOnOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResizeWay {
    Grow,
    Shrink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KillMode {
    Window,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BorderArg {
    Normal,
    None,
    #[strum(serialize = "1pixel")]
    #[serde(rename = "1pixel")]
    OnePixel,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowModeArg {
    Floating,
    Tiling,
    ModeToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FocusLevel {
    Parent,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FullscreenArg {
    Output,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FloatingArg {
    Enable,
    Disable,
    Toggle,
}

/// An output referenced either by a directional keyword or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    Direction(Direction),
    Named(String),
}

impl OutputTarget {
    fn parse(value: &str) -> OutputTarget {
        match Direction::from_str(value) {
            Ok(direction) => OutputTarget::Direction(direction),
            Err(_) => OutputTarget::Named(value.to_owned()),
        }
    }
}

/// All verbs the engine understands, with their arguments already validated
/// into closed enums. String comparison happens exactly once, in
/// [`Verb::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    MoveToWorkspace(WorkspaceTarget),
    MoveToWorkspaceName(String),
    Resize {
        way: ResizeWay,
        direction: Direction,
        px: i32,
        ppt: i32,
    },
    Border(BorderArg),
    Split(Orientation),
    Kill(KillMode),
    FocusDirection(Direction),
    FocusWindowMode(WindowModeArg),
    FocusLevel(FocusLevel),
    Focus,
    FocusOutput(OutputTarget),
    Fullscreen(FullscreenArg),
    MoveDirection {
        direction: Direction,
        px: i32,
    },
    Layout(Layout),
    Mark(String),
    MoveToOutput(OutputTarget),
    MoveWorkspaceToOutput(OutputTarget),
    ScratchpadShow,
    MoveScratchpad,
    Workspace(WorkspaceTarget),
    WorkspaceName(String),
    WorkspaceBackAndForth,
    Floating(FloatingArg),
    Open,
    Nop(Option<String>),
    Exit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    UnknownVerb(String),
    #[error("missing argument {index} for {verb}")]
    MissingArgument { verb: &'static str, index: usize },
    #[error("invalid argument for {verb}: {value:?}")]
    InvalidArgument { verb: &'static str, value: String },
    /// No sibling, output or workspace exists in the requested direction.
    #[error("{0}")]
    Unsatisfiable(String),
    /// The tree offers no ancestor the operation could apply to.
    #[error("{0}")]
    Structural(String),
}

fn enum_arg<T: FromStr>(verb: &'static str, value: &str) -> Result<T, CommandError> {
    T::from_str(value).map_err(|_| CommandError::InvalidArgument {
        verb,
        value: value.to_owned(),
    })
}

fn int_arg<T: FromStr>(verb: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidArgument {
        verb,
        value: value.to_owned(),
    })
}

fn req<'a>(verb: &'static str, args: &'a [String], index: usize) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(CommandError::MissingArgument { verb, index })
}

impl Verb {
    /// Validates a `(verb, args)` tuple coming from the caller's parser.
    pub fn parse(name: &str, args: &[String]) -> Result<Verb, CommandError> {
        match name {
            "move_to_workspace" => Ok(Verb::MoveToWorkspace(enum_arg(
                "move_to_workspace",
                req("move_to_workspace", args, 0)?,
            )?)),
            "move_to_workspace_name" => Ok(Verb::MoveToWorkspaceName(
                req("move_to_workspace_name", args, 0)?.to_owned(),
            )),
            "resize" => Ok(Verb::Resize {
                way: enum_arg("resize", req("resize", args, 0)?)?,
                direction: enum_arg("resize", req("resize", args, 1)?)?,
                px: int_arg("resize", req("resize", args, 2)?)?,
                ppt: int_arg("resize", req("resize", args, 3)?)?,
            }),
            "border" => Ok(Verb::Border(enum_arg("border", req("border", args, 0)?)?)),
            "split" => {
                let value = req("split", args, 0)?;
                if value.is_empty() {
                    return Err(CommandError::InvalidArgument {
                        verb: "split",
                        value: value.to_owned(),
                    });
                }
                // the argument's first character picks the orientation
                Ok(Verb::Split(if value.starts_with('v') {
                    Orientation::Vertical
                } else {
                    Orientation::Horizontal
                }))
            }
            "kill" => Ok(Verb::Kill(match args.first() {
                Some(mode) => enum_arg("kill", mode)?,
                None => KillMode::Window,
            })),
            "focus_direction" => Ok(Verb::FocusDirection(enum_arg(
                "focus_direction",
                req("focus_direction", args, 0)?,
            )?)),
            "focus_window_mode" => Ok(Verb::FocusWindowMode(enum_arg(
                "focus_window_mode",
                req("focus_window_mode", args, 0)?,
            )?)),
            "focus_level" => Ok(Verb::FocusLevel(enum_arg(
                "focus_level",
                req("focus_level", args, 0)?,
            )?)),
            "focus" => Ok(Verb::Focus),
            "focus_output" => Ok(Verb::FocusOutput(OutputTarget::parse(req(
                "focus_output",
                args,
                0,
            )?))),
            "fullscreen" => Ok(Verb::Fullscreen(match args.first() {
                Some(mode) => enum_arg("fullscreen", mode)?,
                None => FullscreenArg::Output,
            })),
            "move_direction" => Ok(Verb::MoveDirection {
                direction: enum_arg("move_direction", req("move_direction", args, 0)?)?,
                px: int_arg("move_direction", req("move_direction", args, 1)?)?,
            }),
            "layout" => {
                let mut value = req("layout", args, 0)?;
                if value == "stacking" {
                    value = "stacked";
                }
                Ok(Verb::Layout(enum_arg("layout", value)?))
            }
            "mark" => Ok(Verb::Mark(req("mark", args, 0)?.to_owned())),
            "move_to_output" => Ok(Verb::MoveToOutput(OutputTarget::parse(req(
                "move_to_output",
                args,
                0,
            )?))),
            "move_workspace_to_output" => Ok(Verb::MoveWorkspaceToOutput(OutputTarget::parse(
                req("move_workspace_to_output", args, 0)?,
            ))),
            "scratchpad_show" => Ok(Verb::ScratchpadShow),
            "move_scratchpad" => Ok(Verb::MoveScratchpad),
            "workspace" => Ok(Verb::Workspace(enum_arg(
                "workspace",
                req("workspace", args, 0)?,
            )?)),
            "workspace_name" => Ok(Verb::WorkspaceName(
                req("workspace_name", args, 0)?.to_owned(),
            )),
            "workspace_back_and_forth" => Ok(Verb::WorkspaceBackAndForth),
            "floating" => Ok(Verb::Floating(enum_arg(
                "floating",
                req("floating", args, 0)?,
            )?)),
            "open" => Ok(Verb::Open),
            "nop" => Ok(Verb::Nop(args.first().cloned())),
            "exit" => Ok(Verb::Exit),
            other => Err(CommandError::UnknownVerb(other.to_owned())),
        }
    }
}

/// The reply contract: a success flag, an error string on failure and the
/// created container's id where a verb produces one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl CommandReply {
    pub fn ok() -> CommandReply {
        CommandReply {
            success: true,
            error: None,
            id: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> CommandReply {
        CommandReply {
            success: false,
            error: Some(error.into()),
            id: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> CommandReply {
        self.id = Some(id);
        self
    }
}
