//! End-to-end editing scenarios: user actions on a session, requests as the
//! backend would receive them, and responses fed back in.

use ganttsync_core::codec::TimestampCodec;
use ganttsync_core::form::FormInput;
use ganttsync_core::intent::{Action, PersistRequest};
use ganttsync_core::model::{Field, ParentRef, TaskId};
use ganttsync_core::persist::{PersistResponse, RecordingClient, TransportError};
use ganttsync_core::session::{Completion, Session};
use ganttsync_core::tree::TaskTree;
use ganttsync_core::tree::table::parse_table;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const UTC: TimestampCodec = TimestampCodec::with_offset(0);

fn id(raw: &str) -> TaskId {
    TaskId::persistent(raw)
}

/// 42 ─┬─ 43 ── 45
///     └─ 44
/// 50
fn loaded_session() -> Session {
    let rows = parse_table(json!([
        {"id": 42, "name": "Phase 1", "actualStart": "2017-05-01 09:00:00", "actualEnd": "2017-05-10 17:00:00", "progressValue": "10%", "parent": null},
        {"id": 43, "name": "Spec", "actualStart": "2017-05-01 09:00:00", "actualEnd": "2017-05-03 17:00:00", "progressValue": "100%", "parent": 42},
        {"id": 44, "name": "Build", "actualStart": "2017-05-04 09:00:00", "actualEnd": "2017-05-10 17:00:00", "progressValue": "0%", "parent": "42"},
        {"id": 45, "name": "Review", "actualStart": "2017-05-03 09:00:00", "actualEnd": "2017-05-03 12:00:00", "progressValue": "0%", "parent": 43},
        {"id": 50, "name": "Phase 2", "actualStart": "2017-05-11 09:00:00", "actualEnd": "2017-05-20 17:00:00", "progressValue": "0%", "parent": "NULL"},
    ]))
    .expect("rows parse");
    let tree = TaskTree::from_table(rows, UTC).expect("table loads");
    Session::new(tree, UTC)
}

fn deletes(requests: &[PersistRequest]) -> usize {
    requests
        .iter()
        .filter(|request| request.action() == Action::Delete)
        .count()
}

// ---------------------------------------------------------------------------
// Create and confirm
// ---------------------------------------------------------------------------

#[test]
fn create_root_then_confirm_replaces_placeholder() {
    let mut session = loaded_session();
    session
        .save(&FormInput::new(
            "Design",
            "2017-05-02 09:00:00",
            "2017-05-02 17:00:00",
        ))
        .expect("valid form");

    let dispatches = session.take_dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(
        dispatches[0].request,
        PersistRequest::Create {
            name: "Design".into(),
            actual_start: "2017-05-02 09:00:00".into(),
            actual_end: "2017-05-02 17:00:00".into(),
            parent: ParentRef::Root,
        }
    );
    assert!(
        dispatches[0]
            .request
            .form_pairs()
            .contains(&("parent".to_string(), "NULL".to_string()))
    );

    let placeholder = TaskId::Placeholder(1);
    assert!(session.tree().contains(&placeholder));

    let completion = session.complete(
        dispatches[0].ticket,
        PersistResponse::from_value(json!({"success": 57})),
    );
    assert_eq!(
        completion,
        Completion::Confirmed {
            ticket: dispatches[0].ticket,
            placeholder: placeholder.clone(),
            id: id("57"),
        }
    );

    // Exactly one node holds the new id, none the placeholder, and the
    // substitution queued nothing.
    assert!(session.tree().contains(&id("57")));
    assert!(!session.tree().contains(&placeholder));
    assert_eq!(
        session
            .tree()
            .outline()
            .iter()
            .filter(|(_, node)| node.id == id("57"))
            .count(),
        1
    );
    assert!(session.outbox().is_empty());
    assert!(session.reconciler().is_empty());
}

#[test]
fn first_task_on_empty_chart_takes_server_id() {
    let mut session = Session::new(TaskTree::new(), UTC);
    session
        .save(&FormInput::new(
            "Design",
            "2017-05-02 09:00:00",
            "2017-05-02 17:00:00",
        ))
        .expect("valid form");

    let dispatches = session.take_dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(
        dispatches[0].request.to_string(),
        "action=create name=Design actualStart=2017-05-02 09:00:00 actualEnd=2017-05-02 17:00:00 parent=NULL"
    );

    session.complete(
        dispatches[0].ticket,
        PersistResponse::from_value(json!({"success": 42})),
    );

    let tree = session.tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.roots(), &[id("42")]);
    assert_eq!(tree.search(&id("42")).map(|n| n.name.as_str()), Some("Design"));
    assert!(!tree.contains(&TaskId::Placeholder(1)));
    assert!(session.outbox().is_empty());
}

#[test]
fn add_child_under_selection_names_parent() {
    let mut session = loaded_session();
    session.select(Some(&id("42"))).expect("42 exists");
    session
        .add_child(&FormInput::new(
            "Implement",
            "2017-05-04 09:00",
            "2017-05-05 17:00",
        ))
        .expect("valid form");

    let dispatches = session.take_dispatches();
    assert_eq!(dispatches.len(), 1);
    match &dispatches[0].request {
        PersistRequest::Create { name, parent, .. } => {
            assert_eq!(name, "Implement");
            assert_eq!(parent, &ParentRef::Task(id("42")));
        }
        other => panic!("expected create, got {other:?}"),
    }
    assert_eq!(session.tree().search(&id("42")).map(|n| n.children.len()), Some(3));
}

#[test]
fn failed_create_keeps_placeholder() {
    let mut session = loaded_session();
    session
        .save(&FormInput::new("Design", "2017-05-02 09:00", "2017-05-02 17:00"))
        .expect("valid form");

    let mut client = RecordingClient::new(1);
    client.script(Ok(PersistResponse::failure("insert failed")));
    let completions: Vec<Completion> = session
        .pump(&mut client)
        .into_iter()
        .map(|exchange| exchange.completion)
        .collect();

    assert!(matches!(completions[0], Completion::Failed { action: Action::Create, .. }));
    assert!(session.tree().contains(&TaskId::Placeholder(1)));
    assert!(session.reconciler().is_empty());
    assert_eq!(session.stats().failed, 1);
}

#[test]
fn creates_complete_out_of_order() {
    let mut session = loaded_session();
    for name in ["First", "Second"] {
        session
            .save(&FormInput::new(name, "2017-05-02 09:00", "2017-05-02 17:00"))
            .expect("valid form");
    }
    let dispatches = session.take_dispatches();
    assert_eq!(dispatches.len(), 2);

    session.complete(dispatches[1].ticket, Ok(PersistResponse::with_id(71)));
    session.complete(dispatches[0].ticket, Ok(PersistResponse::with_id(70)));

    let tree = session.tree();
    assert_eq!(tree.search(&id("70")).map(|n| n.name.as_str()), Some("First"));
    assert_eq!(tree.search(&id("71")).map(|n| n.name.as_str()), Some("Second"));
    assert!(!tree.contains(&TaskId::Placeholder(1)));
    assert!(!tree.contains(&TaskId::Placeholder(2)));
}

#[test]
fn edits_on_unconfirmed_task_use_placeholder() {
    let mut session = loaded_session();
    session
        .save(&FormInput::new("Design", "2017-05-02 09:00", "2017-05-02 17:00"))
        .expect("valid form");
    session.select(Some(&TaskId::Placeholder(1))).expect("placeholder exists");
    session
        .save(&FormInput::new("Design v2", "2017-05-02 09:00", "2017-05-02 17:00"))
        .expect("valid form");

    let dispatches = session.take_dispatches();
    assert_eq!(dispatches.len(), 4);
    assert_eq!(
        dispatches[1].request.target(),
        Some(&TaskId::Placeholder(1))
    );
    assert_eq!(
        dispatches[1].request.to_string(),
        "action=update id=-1 field=name value=Design v2"
    );
}

// ---------------------------------------------------------------------------
// Remove and move
// ---------------------------------------------------------------------------

#[test]
fn remove_sends_one_delete_with_cascade() {
    let mut session = loaded_session();
    session.select(Some(&id("42"))).expect("42 exists");
    session.remove_selected().expect("selection present");

    let requests: Vec<_> = session
        .take_dispatches()
        .into_iter()
        .map(|dispatch| dispatch.request)
        .collect();
    assert_eq!(
        requests,
        vec![PersistRequest::Delete {
            id: id("42"),
            ids: vec![id("42"), id("43"), id("45"), id("44")],
        }]
    );
    assert_eq!(session.selection(), None);
    assert_eq!(session.tree().len(), 1);
}

#[test]
fn remove_leaf_lists_only_itself() {
    let mut session = loaded_session();
    session.select(Some(&id("44"))).expect("44 exists");
    session.remove_selected().expect("selection present");
    let dispatches = session.take_dispatches();
    assert_eq!(
        dispatches[0].request.form_pairs(),
        vec![
            ("action".to_string(), "delete".to_string()),
            ("id".to_string(), "44".to_string()),
            ("ids[]".to_string(), "44".to_string()),
        ]
    );
}

#[test]
fn drag_under_other_task_is_single_parent_update() {
    let mut session = loaded_session();
    session
        .move_task(&id("42"), Some(&id("50")))
        .expect("valid move");

    let requests: Vec<_> = session
        .take_dispatches()
        .into_iter()
        .map(|dispatch| dispatch.request)
        .collect();
    assert_eq!(
        requests,
        vec![PersistRequest::Update {
            id: id("42"),
            field: Field::Parent,
            value: "50".into(),
        }]
    );
    assert_eq!(deletes(&requests), 0);
}

#[test]
fn drag_to_root_sends_null_parent() {
    let mut session = loaded_session();
    session.move_task(&id("45"), None).expect("valid move");
    let dispatches = session.take_dispatches();
    assert_eq!(
        dispatches[0].request.to_string(),
        "action=update id=45 field=parent value=NULL"
    );
}

#[test]
fn remove_then_move_never_deletes_twice() {
    let mut session = loaded_session();
    session.select(Some(&id("44"))).expect("44 exists");
    session.remove_selected().expect("selection present");
    session.move_task(&id("43"), Some(&id("50"))).expect("valid move");
    session.move_task(&id("45"), None).expect("valid move");

    let requests: Vec<_> = session
        .take_dispatches()
        .into_iter()
        .map(|dispatch| dispatch.request)
        .collect();
    assert_eq!(requests.len(), 3);
    assert_eq!(deletes(&requests), 1);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn failed_delete_leaves_local_removal() {
    let mut session = loaded_session();
    session.select(Some(&id("43"))).expect("43 exists");
    session.remove_selected().expect("selection present");

    let mut client = RecordingClient::new(1);
    client.script(Err(TransportError::Transport("connection refused".into())));
    let completions: Vec<Completion> = session
        .pump(&mut client)
        .into_iter()
        .map(|exchange| exchange.completion)
        .collect();

    assert!(matches!(completions[0], Completion::Failed { action: Action::Delete, .. }));
    assert!(!session.tree().contains(&id("43")));
    assert!(!session.tree().contains(&id("45")));
    assert_eq!(client.sent().len(), 1);
}

#[test]
fn stats_count_every_request() {
    let mut session = loaded_session();
    session.select(Some(&id("44"))).expect("44 exists");
    session
        .save(&FormInput::new("Build", "2017-05-04 09:00", "2017-05-11 17:00"))
        .expect("valid form");

    let mut client = RecordingClient::new(1);
    client.script(Ok(PersistResponse::ok()));
    client.script(Ok(PersistResponse::failure("locked")));
    session.pump(&mut client);

    let stats = session.stats();
    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(session.in_flight(), 0);
}
