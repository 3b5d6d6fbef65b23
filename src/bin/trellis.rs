use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use trellis_wm::commands::engine::CommandEngine;
use trellis_wm::commands::record::{self, Record};
use trellis_wm::common::config::{Config, config_file};
use trellis_wm::common::log;
use trellis_wm::ipc;
use trellis_wm::model::geometry::Rect;
use trellis_wm::model::tree::Tree;

/// Command-execution core of the trellis window manager.
///
/// Reads one JSON command request per line from stdin, e.g.
/// `{"criteria":[{"kind":"class","value":"Term"}],"verb":"kill","args":[]}`,
/// and writes the JSON reply per line to stdout.
#[derive(Parser)]
struct Cli {
    /// Record executed commands to the specified file path. Overwrites the
    /// file if it exists.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Replay a previously recorded command stream and exit.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the container tree to stderr after every command.
    #[arg(long)]
    dump_tree: bool,
}

fn main() -> anyhow::Result<()> {
    sigpipe::reset();
    log::init_logging();
    let opt = Cli::parse();

    let config_path = opt.config.clone().unwrap_or_else(config_file);
    let config = if config_path.exists() {
        Config::read(&config_path)
            .with_context(|| format!("reading config {}", config_path.display()))?
    } else {
        Config::default()
    };

    if let Some(path) = &opt.replay {
        let (mut tree, commands) = record::replay(path)?;
        let mut engine = CommandEngine::new(config);
        for command in &commands {
            let reply = engine.run(&mut tree, command);
            println!("{}", serde_json::to_string(&reply)?);
            if engine.shutdown_requested() {
                break;
            }
        }
        return Ok(());
    }

    let mut tree = Tree::new();
    let output = tree.add_output("default", Rect::new(0, 0, 1920, 1080));
    let ws = tree.new_workspace_on(output, "1");
    tree.focus(ws);

    let mut engine = CommandEngine::new(config);
    if let Some(path) = &opt.record {
        let mut record = Record::new(Some(path))
            .with_context(|| format!("creating record file {}", path.display()))?;
        record.start(&tree);
        engine.set_record(record);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        println!("{}", ipc::handle_line(&mut engine, &mut tree, &line));
        if opt.dump_tree {
            eprintln!("{}", tree.ascii_tree());
        }
        if engine.shutdown_requested() {
            break;
        }
    }
    Ok(())
}
