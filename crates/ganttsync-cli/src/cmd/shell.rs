//! `gsync shell`: line-oriented editing session.
//!
//! Each input line is one user action against the task tree. Requests the
//! action produces are sent to the edit endpoint right away and their
//! outcomes are printed.

use crate::cmd::load::{load_tree, outline_lines, write_outline};
use crate::output::{CliError, OutputMode, pretty_kv, render_error, render_to};
use clap::Args;
use ganttsync_core::Session;
use ganttsync_core::codec::TimestampCodec;
use ganttsync_core::config::EffectiveConfig;
use ganttsync_core::form::{FormInput, FormView};
use ganttsync_core::model::{Field, FieldChange, TaskId};
use ganttsync_core::persist::{HttpClient, PersistenceClient, RecordingClient};
use ganttsync_core::session::{Completion, Exchange, SessionError};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Read the task table from a JSON file instead of the data endpoint.
    #[arg(long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    /// Answer edit requests locally instead of posting them.
    #[arg(long)]
    pub dry_run: bool,

    /// First identifier assigned to created tasks in --dry-run mode.
    #[arg(long, default_value_t = 1000, requires = "dry_run")]
    pub first_id: u64,
}

const HELP: &str = "\
commands:
  select <id>                 select a task
  unselect                    clear the selection
  save <name> | <start> | <end>
                              save the selected task, or add a root task
  add <name> | <start> | <end>
                              add a child under the selected task
  remove                      remove the selected task and its children
  move <id> <parent|root>     reparent a task
  set <id> <field> <value>    write one field (name, actualStart, actualEnd, progressValue, id)
  form                        show the edit form
  tree                        print the task tree
  stats                       request counters
  quit                        leave the shell";

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Select(TaskId),
    Unselect,
    Save(FormInput),
    Add(FormInput),
    Remove,
    Move { id: TaskId, parent: Option<TaskId> },
    Set { id: TaskId, change: FieldChange },
    Form,
    Tree,
    Stats,
    Help,
    Quit,
}

/// Parse one input line. Blank lines and `#` comments yield `Ok(None)`.
///
/// # Errors
///
/// Returns a message describing the problem for malformed lines.
pub fn parse_command(line: &str, codec: TimestampCodec) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    let command = match verb {
        "select" => ShellCommand::Select(parse_id(rest)?),
        "unselect" => ShellCommand::Unselect,
        "save" => ShellCommand::Save(FormInput::parse_line(rest)),
        "add" => ShellCommand::Add(FormInput::parse_line(rest)),
        "remove" => ShellCommand::Remove,
        "move" => {
            let mut parts = rest.split_whitespace();
            let (Some(id), Some(parent), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err("usage: move <id> <parent|root>".to_string());
            };
            let parent = match parent {
                "root" | "NULL" => None,
                other => Some(parse_id(other)?),
            };
            ShellCommand::Move {
                id: parse_id(id)?,
                parent,
            }
        }
        "set" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let (Some(id), Some(field), Some(value)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err("usage: set <id> <field> <value>".to_string());
            };
            let field: Field = field.parse().map_err(|err| format!("{err}"))?;
            ShellCommand::Set {
                id: parse_id(id)?,
                change: parse_change(field, value.trim(), codec)?,
            }
        }
        "form" => ShellCommand::Form,
        "tree" => ShellCommand::Tree,
        "stats" => ShellCommand::Stats,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try `help`)")),
    };
    Ok(Some(command))
}

fn parse_id(raw: &str) -> Result<TaskId, String> {
    TaskId::parse(raw).map_err(|err| format!("{err}"))
}

fn parse_change(field: Field, value: &str, codec: TimestampCodec) -> Result<FieldChange, String> {
    let timestamp = |value: &str| codec.decode(value).map_err(|err| format!("{err}"));
    match field {
        Field::Id => parse_id(value).map(FieldChange::Id),
        Field::Name => Ok(FieldChange::Name(value.to_string())),
        Field::ActualStart => timestamp(value).map(FieldChange::ActualStart),
        Field::ActualEnd => timestamp(value).map(FieldChange::ActualEnd),
        Field::ProgressValue => Ok(FieldChange::ProgressValue(value.to_string())),
        Field::Parent => Err("use `move <id> <parent|root>` to reparent".to_string()),
    }
}

/// What one command produced, for JSON output.
#[derive(Debug, Serialize)]
struct StepReport<'a> {
    command: &'a str,
    form: FormView,
    exchanges: Vec<Exchange>,
}

pub fn run_shell(args: &ShellArgs, config: &EffectiveConfig, output: OutputMode) -> anyhow::Result<()> {
    let tree = load_tree(args.table.as_deref(), config, output)?;
    let mut session = Session::new(tree, config.codec());

    let mut client: Box<dyn PersistenceClient> = if args.dry_run {
        Box::new(RecordingClient::new(args.first_id))
    } else {
        Box::new(HttpClient::new(&config.endpoint))
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_script(&mut session, client.as_mut(), stdin.lock(), &mut out, output)
}

/// Drive `session` from `input` until EOF or `quit`.
pub fn run_script<R: BufRead>(
    session: &mut Session,
    client: &mut dyn PersistenceClient,
    input: R,
    out: &mut dyn Write,
    output: OutputMode,
) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line, session.codec()) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                render_error(output, &CliError::new(message))?;
                continue;
            }
        };
        debug!(?command, "shell command");

        if command == ShellCommand::Quit {
            break;
        }
        execute(session, client, &command, out, output)?;
    }

    let stats = session.stats();
    render_to(out, output, &stats, |stats, w| {
        writeln!(
            w,
            "requests: {} sent, {} ok, {} failed",
            stats.dispatched, stats.succeeded, stats.failed
        )
    })
}

fn execute(
    session: &mut Session,
    client: &mut dyn PersistenceClient,
    command: &ShellCommand,
    out: &mut dyn Write,
    output: OutputMode,
) -> anyhow::Result<()> {
    let (label, result) = match command {
        ShellCommand::Select(id) => ("select", session.select(Some(id)).map(|_| ())),
        ShellCommand::Unselect => ("unselect", session.select(None).map(|_| ())),
        ShellCommand::Save(input) => ("save", session.save(input).map(|_| ())),
        ShellCommand::Add(input) => ("add", session.add_child(input).map(|_| ())),
        ShellCommand::Remove => ("remove", session.remove_selected().map(|_| ())),
        ShellCommand::Move { id, parent } => ("move", session.move_task(id, parent.as_ref())),
        ShellCommand::Set { id, change } => ("set", session.set_field(id, change.clone())),
        ShellCommand::Tree => {
            let lines = outline_lines(session.tree(), session.codec());
            return render_to(out, output, &lines, |lines, w| write_outline(lines, output, w));
        }
        ShellCommand::Stats => {
            return render_to(out, output, &session.stats(), |stats, w| {
                pretty_kv(w, "sent", stats.dispatched.to_string())?;
                pretty_kv(w, "ok", stats.succeeded.to_string())?;
                pretty_kv(w, "failed", stats.failed.to_string())
            });
        }
        ShellCommand::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(());
        }
        ShellCommand::Form => ("form", Ok(())),
        ShellCommand::Quit => return Ok(()),
    };

    if let Err(err) = result {
        report_session_error(output, &err)?;
        return Ok(());
    }

    let exchanges = session.pump(client);
    let report = StepReport {
        command: label,
        form: session.form_view(),
        exchanges,
    };
    render_to(out, output, &report, |report, w| {
        for exchange in &report.exchanges {
            writeln!(w, "{} -> {}", exchange.request, describe(&exchange.completion))?;
        }
        writeln!(w, "{}", report.form.title())
    })
}

fn describe(completion: &Completion) -> String {
    match completion {
        Completion::Confirmed { placeholder, id, .. } => format!("confirmed {placeholder} => {id}"),
        Completion::Acknowledged { .. } => "ok".to_string(),
        Completion::Failed { reason, .. } => format!("failed: {reason}"),
        Completion::Unknown { ticket } => format!("unknown ticket {ticket}"),
    }
}

fn report_session_error(output: OutputMode, err: &SessionError) -> anyhow::Result<()> {
    render_error(output, &CliError::with_code(err.code(), err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ganttsync_core::TaskTree;
    use ganttsync_core::model::NewTask;

    const UTC: TimestampCodec = TimestampCodec::with_offset(0);

    fn parse(line: &str) -> ShellCommand {
        parse_command(line, UTC).unwrap().unwrap()
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_command("   ", UTC), Ok(None));
        assert_eq!(parse_command("# setup", UTC), Ok(None));
    }

    #[test]
    fn select_parses_placeholder_and_persistent_ids() {
        assert_eq!(parse("select 42"), ShellCommand::Select(TaskId::persistent("42")));
        assert_eq!(parse("select -2"), ShellCommand::Select(TaskId::Placeholder(2)));
        assert!(parse_command("select", UTC).is_err());
    }

    #[test]
    fn save_splits_form_fields() {
        assert_eq!(
            parse("save Design | 2017-05-02 09:00 | 2017-05-02 17:00"),
            ShellCommand::Save(FormInput::new("Design", "2017-05-02 09:00", "2017-05-02 17:00"))
        );
    }

    #[test]
    fn move_accepts_root_keyword() {
        assert_eq!(
            parse("move 42 root"),
            ShellCommand::Move {
                id: TaskId::persistent("42"),
                parent: None,
            }
        );
        assert_eq!(
            parse("move 42 50"),
            ShellCommand::Move {
                id: TaskId::persistent("42"),
                parent: Some(TaskId::persistent("50")),
            }
        );
        assert!(parse_command("move 42", UTC).is_err());
    }

    #[test]
    fn set_decodes_timestamps_and_keeps_spaces_in_text() {
        assert_eq!(
            parse("set 42 name Phase one"),
            ShellCommand::Set {
                id: TaskId::persistent("42"),
                change: FieldChange::Name("Phase one".into()),
            }
        );
        assert_eq!(
            parse("set 42 actualStart 2017-05-02 09:00:00"),
            ShellCommand::Set {
                id: TaskId::persistent("42"),
                change: FieldChange::ActualStart(1_493_715_600_000),
            }
        );
        assert!(parse_command("set 42 parent 50", UTC).is_err());
        assert!(parse_command("set 42 colour red", UTC).is_err());
    }

    #[test]
    fn unknown_verb_is_an_error() {
        let err = parse_command("frobnicate", UTC).unwrap_err();
        assert!(err.contains("frobnicate"));
    }

    #[test]
    fn script_creates_and_confirms() {
        let mut session = Session::new(TaskTree::new(), UTC);
        let mut client = RecordingClient::new(57);
        let script = "save Design | 2017-05-02 09:00 | 2017-05-02 17:00\nselect 57\nquit\nremove\n";
        let mut buf = Vec::new();

        run_script(&mut session, &mut client, script.as_bytes(), &mut buf, OutputMode::Text)
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(
            "action=create name=Design actualStart=2017-05-02 09:00:00 actualEnd=2017-05-02 17:00:00 parent=NULL -> confirmed -1 => 57"
        ));
        assert!(text.contains("Selected item ID: 57"));
        assert!(text.ends_with("requests: 1 sent, 1 ok, 0 failed\n"));
        assert!(session.tree().contains(&TaskId::persistent("57")));
        assert_eq!(client.sent().len(), 1);
    }

    #[test]
    fn script_json_reports_each_step() {
        let mut tree = TaskTree::new();
        tree.add_child(None, TaskId::persistent("42"), NewTask::new("Root", 0, 60_000))
            .unwrap();
        tree.add_child(
            Some(&TaskId::persistent("42")),
            TaskId::persistent("43"),
            NewTask::new("Child", 0, 60_000),
        )
        .unwrap();
        let mut session = Session::new(tree, UTC);
        let mut client = RecordingClient::new(1);
        let mut buf = Vec::new();

        run_script(
            &mut session,
            &mut client,
            "select 42\nremove\n".as_bytes(),
            &mut buf,
            OutputMode::Json,
        )
        .unwrap();

        let steps: Vec<serde_json::Value> = String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0]["form"]["mode"], "edit_existing");
        let delete = &steps[1]["exchanges"][0]["request"];
        assert_eq!(delete["action"], "delete");
        assert_eq!(delete["ids"], serde_json::json!(["42", "43"]));
        assert_eq!(steps[1]["form"]["mode"], "create_root");
        assert_eq!(steps[2]["dispatched"], 1);
    }
}
