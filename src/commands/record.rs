use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[cfg(test)]
use tempfile::NamedTempFile;
use tracing::warn;

use super::Command;
use crate::model::tree::Tree;

/// Records the dispatch stream: one tree snapshot followed by one line per
/// executed command. A recording can be replayed against a fresh engine to
/// reproduce the final tree.
pub struct Record {
    file: Option<File>,
    #[cfg(test)]
    temp: Option<NamedTempFile>,
}

impl Record {
    pub fn new(path: Option<&Path>) -> std::io::Result<Record> {
        Ok(Record {
            file: path.map(File::create).transpose()?,
            #[cfg(test)]
            temp: None,
        })
    }

    #[cfg(test)]
    pub fn new_for_test(temp: NamedTempFile) -> Record {
        Record {
            file: None,
            temp: Some(temp),
        }
    }

    fn file(&mut self) -> Option<&mut File> {
        #[cfg(test)]
        return self.file.as_mut().or(self.temp.as_mut().map(|temp| temp.as_file_mut()));
        #[cfg(not(test))]
        self.file.as_mut()
    }

    /// Writes the starting tree. Call once before the first command.
    pub fn start(&mut self, tree: &Tree) {
        let Some(file) = self.file() else { return };
        match ron::ser::to_string(tree) {
            Ok(snapshot) => {
                if let Err(err) = writeln!(file, "{snapshot}") {
                    warn!("could not write tree snapshot: {err}");
                }
            }
            Err(err) => warn!("could not serialize tree snapshot: {err}"),
        }
    }

    pub(crate) fn on_command(&mut self, command: &Command) {
        let Some(file) = self.file() else { return };
        match ron::ser::to_string(command) {
            Ok(line) => {
                if let Err(err) = writeln!(file, "{line}") {
                    warn!("could not record command: {err}");
                }
            }
            Err(err) => warn!("could not serialize command: {err}"),
        }
    }
}

/// Reads a recording back: the starting tree and the command stream, ready
/// to be fed through a fresh engine.
pub fn replay(path: &Path) -> anyhow::Result<(Tree, Vec<Command>)> {
    let file = BufReader::new(File::open(path)?);
    let mut lines = file.lines();
    let snapshot = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty record file"))??;
    let tree: Tree = ron::de::from_str(&snapshot)?;
    let mut commands = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        commands.push(ron::de::from_str(&line)?);
    }
    Ok((tree, commands))
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek};

    use super::*;
    use crate::commands::engine::CommandEngine;
    use crate::commands::{Command, Criteria, Verb};
    use crate::common::config::Config;
    use crate::model::geometry::Rect;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let output = tree.add_output("out-0", Rect::new(0, 0, 1000, 1000));
        let ws = tree.new_workspace_on(output, "1");
        let con = tree.open_con(ws);
        tree.focus(con);
        tree
    }

    #[test]
    fn record_then_replay_reproduces_the_command_stream() {
        let mut tree = sample_tree();
        // keep the tempfile handle alive past the engine so replay can
        // reopen the path
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();

        let mut record = Record::new(Some(&path)).unwrap();
        record.start(&tree);

        let mut engine = CommandEngine::new(Config::default());
        engine.set_record(record);

        let commands = [
            Command { criteria: Criteria::new(), verb: Verb::Open },
            Command {
                criteria: Criteria::new(),
                verb: Verb::Mark("scratch".into()),
            },
        ];
        for command in &commands {
            engine.run(&mut tree, command);
        }
        drop(engine);

        let (replayed_tree, replayed_commands) = replay(&path).unwrap();
        assert_eq!(replayed_commands.len(), 2);
        assert_eq!(replayed_commands[0].verb, Verb::Open);
        assert_eq!(replayed_commands[1].verb, Verb::Mark("scratch".into()));

        // running the stream against the snapshot ends in the same state
        let mut fresh = replayed_tree;
        let mut engine = CommandEngine::new(Config::default());
        for command in &replayed_commands {
            engine.run(&mut fresh, command);
        }
        let marked: Vec<_> = fresh
            .all_cons()
            .filter(|&c| fresh[c].mark.as_deref() == Some("scratch"))
            .collect();
        assert_eq!(marked.len(), 1);
    }

    #[test]
    fn replay_of_empty_file_fails() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.as_file_mut().flush().unwrap();
        assert!(replay(temp.path()).is_err());
    }

    #[test]
    fn criteria_survive_the_record_format() {
        let mut criteria = Criteria::new();
        criteria.add("class", "^Term$");
        let command = Command {
            criteria,
            verb: Verb::Kill(crate::commands::KillMode::Window),
        };
        let line = ron::ser::to_string(&command).unwrap();
        let back: Command = ron::de::from_str(&line).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn record_writes_snapshot_first() {
        let tree = sample_tree();
        let temp = NamedTempFile::new().unwrap();
        let mut record = Record::new_for_test(temp);
        record.start(&tree);
        record.on_command(&Command {
            criteria: Criteria::new(),
            verb: Verb::Nop(None),
        });

        let temp = record.temp.take().unwrap();
        let mut contents = String::new();
        let mut file = temp.reopen().unwrap();
        file.rewind().unwrap();
        file.read_to_string(&mut contents).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("cons"));
        assert!(lines[1].contains("nop"));
    }
}
