//! `gsync load`: fetch the task table and print it as an outline.

use crate::output::{CliError, OutputMode, pretty_section, render, render_error};
use anyhow::Context;
use clap::Args;
use ganttsync_core::TaskTree;
use ganttsync_core::codec::TimestampCodec;
use ganttsync_core::config::EffectiveConfig;
use ganttsync_core::model::{ParentRef, TaskId};
use ganttsync_core::persist::HttpClient;
use ganttsync_core::tree::table::{LoadError, TaskRow, parse_table};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Read the task table from a JSON file instead of the data endpoint.
    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,
}

/// One row of the printed outline.
#[derive(Debug, Serialize)]
pub struct TaskLine {
    pub depth: usize,
    pub id: TaskId,
    pub name: String,
    pub actual_start: String,
    pub actual_end: String,
    pub progress_value: String,
    pub parent: ParentRef,
}

pub fn outline_lines(tree: &TaskTree, codec: TimestampCodec) -> Vec<TaskLine> {
    let show = |ms: i64| codec.encode(ms).unwrap_or_else(|_| ms.to_string());
    tree.outline()
        .into_iter()
        .map(|(depth, node)| TaskLine {
            depth,
            id: node.id.clone(),
            name: node.name.clone(),
            actual_start: show(node.actual_start),
            actual_end: show(node.actual_end),
            progress_value: node.progress_value.clone(),
            parent: ParentRef::from_option(node.parent.as_ref()),
        })
        .collect()
}

/// Write the outline for pretty (indented) or text (tab-separated) output.
pub fn write_outline(lines: &[TaskLine], mode: OutputMode, w: &mut dyn Write) -> io::Result<()> {
    if mode == OutputMode::Pretty {
        pretty_section(w, &format!("Tasks ({})", lines.len()))?;
        for line in lines {
            writeln!(
                w,
                "{:indent$}{}  {}  [{} .. {}]  {}",
                "",
                line.id,
                line.name,
                line.actual_start,
                line.actual_end,
                line.progress_value,
                indent = line.depth * 2
            )?;
        }
        return Ok(());
    }
    for line in lines {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            line.id, line.parent, line.name, line.actual_start, line.actual_end, line.progress_value
        )?;
    }
    Ok(())
}

/// Fetch rows from `table` or the data endpoint and build the tree.
///
/// Load failures are rendered with their error code before being returned.
pub fn load_tree(
    table: Option<&Path>,
    config: &EffectiveConfig,
    output: OutputMode,
) -> anyhow::Result<TaskTree> {
    let rows = match table {
        Some(path) => read_table_file(path)?,
        None => HttpClient::new(&config.endpoint).fetch_table(),
    };
    let tree = rows.and_then(|rows| TaskTree::from_table(rows, config.codec()));
    match tree {
        Ok(tree) => {
            info!(tasks = tree.len(), "task table loaded");
            Ok(tree)
        }
        Err(err) => {
            render_error(output, &CliError::with_code(err.code(), err.to_string()))?;
            Err(anyhow::Error::new(err).context("failed to load the task table"))
        }
    }
}

fn read_table_file(path: &Path) -> anyhow::Result<Result<Vec<TaskRow>, LoadError>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let body: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as JSON", path.display()))?;
    Ok(parse_table(body))
}

pub fn run_load(args: &LoadArgs, config: &EffectiveConfig, output: OutputMode) -> anyhow::Result<()> {
    let tree = load_tree(args.table.as_deref(), config, output)?;
    let lines = outline_lines(&tree, config.codec());
    render(output, &lines, |lines, w| write_outline(lines, output, w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ganttsync_core::model::NewTask;

    const NINE_AM: i64 = 1_493_715_600_000; // 2017-05-02 09:00:00 UTC

    fn sample() -> TaskTree {
        let mut tree = TaskTree::new();
        tree.add_child(None, TaskId::persistent("42"), NewTask::new("Phase", NINE_AM, NINE_AM))
            .unwrap();
        tree.add_child(
            Some(&TaskId::persistent("42")),
            TaskId::persistent("43"),
            NewTask::new("Spec", NINE_AM, NINE_AM + 3_600_000),
        )
        .unwrap();
        tree
    }

    #[test]
    fn outline_encodes_timestamps_and_parents() {
        let lines = outline_lines(&sample(), TimestampCodec::with_offset(0));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].parent, ParentRef::Root);
        assert_eq!(lines[1].depth, 1);
        assert_eq!(lines[1].actual_end, "2017-05-02 10:00:00");
    }

    #[test]
    fn text_outline_is_tab_separated() {
        let lines = outline_lines(&sample(), TimestampCodec::with_offset(0));
        let mut buf = Vec::new();
        write_outline(&lines, OutputMode::Text, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("42\tNULL\tPhase\t2017-05-02 09:00:00\t2017-05-02 09:00:00\t0%")
        );
    }

    #[test]
    fn pretty_outline_indents_children() {
        let lines = outline_lines(&sample(), TimestampCodec::with_offset(0));
        let mut buf = Vec::new();
        write_outline(&lines, OutputMode::Pretty, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Tasks (2)"));
        assert!(text.contains("\n  43  Spec"));
    }
}
