use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::commands::criteria::Criteria;
use crate::commands::engine::CommandEngine;
use crate::commands::{Command, CommandError, CommandReply, Verb};
use crate::model::tree::Tree;

/// One criterion clause as it arrives from the caller's parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionClause {
    pub kind: String,
    pub value: String,
}

/// The wire shape of a command: raw criterion clauses, a verb name and its
/// argument strings. Everything is validated here before the engine sees
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub criteria: Vec<CriterionClause>,
    pub verb: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceChange {
    Focus,
    Move,
}

/// Fire-and-forget event published to whoever subscribed to the engine's
/// notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Workspace { change: WorkspaceChange },
}

/// Builds a typed [`Command`] from a wire request.
pub fn parse_request(request: &CommandRequest) -> Result<Command, CommandError> {
    let mut criteria = Criteria::new();
    for clause in &request.criteria {
        criteria.add(&clause.kind, &clause.value);
    }
    let verb = Verb::parse(&request.verb, &request.args)?;
    Ok(Command { criteria, verb })
}

pub fn handle_request(
    engine: &mut CommandEngine,
    tree: &mut Tree,
    request: &CommandRequest,
) -> CommandReply {
    match parse_request(request) {
        Ok(command) => engine.run(tree, &command),
        Err(err) => {
            warn!("{err}");
            CommandReply::failure(err.to_string())
        }
    }
}

/// Runs one JSON-encoded request and returns the JSON-encoded reply.
pub fn handle_line(engine: &mut CommandEngine, tree: &mut Tree, line: &str) -> String {
    let reply = match serde_json::from_str::<CommandRequest>(line) {
        Ok(request) => handle_request(engine, tree, &request),
        Err(err) => CommandReply::failure(format!("invalid request: {err}")),
    };
    serde_json::to_string(&reply).unwrap_or_else(|_| r#"{"success":false}"#.to_owned())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::config::Config;
    use crate::model::geometry::Rect;

    fn setup() -> (CommandEngine, Tree) {
        let mut tree = Tree::new();
        let output = tree.add_output("out-0", Rect::new(0, 0, 1000, 1000));
        let ws = tree.new_workspace_on(output, "1");
        let con = tree.open_con(ws);
        tree.focus(con);
        (CommandEngine::new(Config::default()), tree)
    }

    #[test]
    fn json_line_round_trip() {
        let (mut engine, mut tree) = setup();
        let reply = handle_line(&mut engine, &mut tree, r#"{"verb":"nop","args":["hello"]}"#);
        assert_eq!(reply, r#"{"success":true}"#);
    }

    #[test]
    fn open_reply_carries_the_new_container_id() {
        let (mut engine, mut tree) = setup();
        let reply = handle_line(&mut engine, &mut tree, r#"{"verb":"open"}"#);
        let parsed: CommandReply = serde_json::from_str(&reply).unwrap();
        assert!(parsed.success);
        assert!(parsed.id.is_some());
    }

    #[test]
    fn malformed_json_is_a_failure_reply() {
        let (mut engine, mut tree) = setup();
        let parsed: CommandReply =
            serde_json::from_str(&handle_line(&mut engine, &mut tree, "{nope")).unwrap();
        assert!(!parsed.success);
        assert!(parsed.error.is_some());
    }

    #[test]
    fn unknown_verb_is_a_failure_reply() {
        let (mut engine, mut tree) = setup();
        let request = CommandRequest {
            criteria: Vec::new(),
            verb: "defenestrate".into(),
            args: Vec::new(),
        };
        let reply = handle_request(&mut engine, &mut tree, &request);
        assert!(!reply.success);
    }

    #[test]
    fn criterion_clauses_feed_the_criteria_engine() {
        let request = CommandRequest {
            criteria: vec![CriterionClause {
                kind: "class".into(),
                value: "Term".into(),
            }],
            verb: "kill".into(),
            args: Vec::new(),
        };
        let command = parse_request(&request).unwrap();
        assert!(!command.criteria.is_empty());
        assert_eq!(command.criteria.class.as_ref().map(|p| p.source()), Some("Term"));
    }
}
