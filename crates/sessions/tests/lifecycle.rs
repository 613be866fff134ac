use std::path::Path;
use std::sync::Arc;

use models::{ErrorCode, ParameterMap};
use registry::Registry;
use sessions::{Position, SessionManager, SessionStore};

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_docs_root(root: &Path) {
    write(
        &root.join("templates/finance/news_email/template.yaml"),
        r#"
template_id: news_email
group: finance
name: News Email
global_parameters:
  - name: subject
    type: string
  - name: tone
    type: string
    required: false
fragments:
  - fragment_id: news
    name: News Item
    parameters:
      - name: story_summary
        type: string
      - name: author
        type: string
        required: false
  - fragment_id: table
    name: Data Table
    parameters:
      - name: rows
        type: array
      - name: has_header
        type: boolean
        required: false
      - name: column_widths
        type: object
        required: false
"#,
    );
    write(
        &root.join("templates/finance/news_email/shell.html"),
        "<html>{{global_params.subject}}</html>",
    );
    write(
        &root.join("templates/finance/news_email/fragments/news.html"),
        "<p>{{story_summary}}</p>",
    );
    write(
        &root.join("templates/finance/news_email/fragments/table.html"),
        "<table/>",
    );

    write(
        &root.join("templates/alpha/note/template.yaml"),
        r#"
template_id: note
group: alpha
name: Note
global_parameters:
  - name: body
    type: string
fragments: []
"#,
    );
    write(&root.join("templates/alpha/note/shell.html"), "{{global_params.body}}");
}

struct Fixture {
    _tmp: tempfile::TempDir,
    manager: SessionManager,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    write_docs_root(&tmp.path().join("docs"));
    let registry = Arc::new(Registry::load(&tmp.path().join("docs")).unwrap());
    let store = SessionStore::open(&tmp.path().join("sessions")).unwrap();
    Fixture {
        manager: SessionManager::new(store, registry),
        _tmp: tmp,
    }
}

fn params(v: serde_json::Value) -> ParameterMap {
    serde_json::from_value(v).unwrap()
}

#[tokio::test]
async fn create_requires_template_in_group() {
    let fx = fixture();

    let created = fx
        .manager
        .create_session("news_email", "finance", None)
        .await
        .unwrap();
    assert!(models::parse_guid(&created.session_id).is_some());

    // Same template id, wrong group.
    let err = fx
        .manager
        .create_session("news_email", "alpha", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TemplateNotFound);
}

#[tokio::test]
async fn global_parameters_validate_and_replace() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("news_email", "finance", None)
        .await
        .unwrap()
        .session_id;

    let err = fx
        .manager
        .set_global_parameters(&sid, "finance", params(serde_json::json!({"wrong": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidOperation);

    fx.manager
        .set_global_parameters(&sid, "finance", params(serde_json::json!({"subject": "Q3"})))
        .await
        .unwrap();

    // Setting again replaces wholesale; identical calls are idempotent.
    fx.manager
        .set_global_parameters(&sid, "finance", params(serde_json::json!({"subject": "Q3"})))
        .await
        .unwrap();

    let session = fx.manager.get_session(&sid, "finance").await.unwrap();
    assert_eq!(
        session.global_parameters.unwrap().get("subject").unwrap(),
        "Q3"
    );
}

#[tokio::test]
async fn fragment_ordering_protocol() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("news_email", "finance", None)
        .await
        .unwrap()
        .session_id;

    let story = |s: &str| params(serde_json::json!({"story_summary": s}));

    let a = fx
        .manager
        .add_fragment(&sid, "finance", "news", story("a"), Position::End)
        .await
        .unwrap();
    let _b = fx
        .manager
        .add_fragment(&sid, "finance", "news", story("b"), Position::End)
        .await
        .unwrap();
    let c = fx
        .manager
        .add_fragment(&sid, "finance", "news", story("c"), Position::Start)
        .await
        .unwrap();
    let d = fx
        .manager
        .add_fragment(
            &sid,
            "finance",
            "news",
            story("d"),
            Position::After(a.fragment_instance_guid.clone()),
        )
        .await
        .unwrap();
    assert_eq!(c.position, 0);
    assert_eq!(d.position, 2);

    let listing = fx
        .manager
        .list_session_fragments(&sid, "finance")
        .await
        .unwrap();
    let summaries: Vec<_> = listing
        .fragments
        .iter()
        .map(|f| f.parameters.get("story_summary").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(summaries, vec!["c", "a", "d", "b"]);
    assert_eq!(listing.fragments[0].fragment_name, "News Item");

    // Removal, then a position referencing the removed guid is refused
    // before any mutation.
    fx.manager
        .remove_fragment(&sid, "finance", &a.fragment_instance_guid)
        .await
        .unwrap();
    let err = fx
        .manager
        .add_fragment(
            &sid,
            "finance",
            "news",
            story("e"),
            Position::Before(a.fragment_instance_guid.clone()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidOperation);
    let listing = fx
        .manager
        .list_session_fragments(&sid, "finance")
        .await
        .unwrap();
    assert_eq!(listing.fragment_count, 3);
}

#[tokio::test]
async fn undeclared_fragment_type_fails() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("news_email", "finance", None)
        .await
        .unwrap()
        .session_id;

    let err = fx
        .manager
        .add_fragment(
            &sid,
            "finance",
            "chart",
            params(serde_json::json!({})),
            Position::End,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FragmentNotFound);
}

#[tokio::test]
async fn table_fragments_pass_the_table_validator() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("news_email", "finance", None)
        .await
        .unwrap()
        .session_id;

    let err = fx
        .manager
        .add_fragment(
            &sid,
            "finance",
            "table",
            params(serde_json::json!({"rows": [["a", "b"], ["c"]]})),
            Position::End,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InconsistentColumns);

    fx.manager
        .add_fragment(
            &sid,
            "finance",
            "table",
            params(serde_json::json!({
                "rows": [["Name", "Price"], ["A", "10"]],
                "column_widths": {"0": "50%", "1": "50%"},
            })),
            Position::End,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn cross_group_access_is_indistinguishable_from_absence() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("note", "alpha", None)
        .await
        .unwrap()
        .session_id;

    let missing = fx
        .manager
        .list_session_fragments("00000000-0000-4000-8000-000000000000", "beta")
        .await
        .unwrap_err();
    let cross = fx
        .manager
        .list_session_fragments(&sid, "beta")
        .await
        .unwrap_err();

    assert_eq!(missing.code, ErrorCode::SessionNotFound);
    assert_eq!(cross.code, ErrorCode::SessionNotFound);

    // And the cross-group call mutated nothing.
    let err = fx
        .manager
        .set_global_parameters(&sid, "beta", params(serde_json::json!({"body": "x"})))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionNotFound);
    let session = fx.manager.get_session(&sid, "alpha").await.unwrap();
    assert!(session.global_parameters.is_none());
}

#[tokio::test]
async fn aliases_are_group_scoped() {
    let fx = fixture();

    let finance = fx
        .manager
        .create_session("news_email", "finance", Some("weekly-digest"))
        .await
        .unwrap();
    let alpha = fx
        .manager
        .create_session("note", "alpha", Some("weekly-digest"))
        .await
        .unwrap();

    // The same alias denotes different sessions per group.
    assert_eq!(
        fx.manager.resolve("weekly-digest", "finance").unwrap(),
        finance.session_id
    );
    assert_eq!(
        fx.manager.resolve("weekly-digest", "alpha").unwrap(),
        alpha.session_id
    );

    // A duplicate within one group refuses creation.
    let err = fx
        .manager
        .create_session("news_email", "finance", Some("weekly-digest"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidOperation);

    // Aborting releases the alias.
    fx.manager
        .abort_session("weekly-digest", "finance")
        .await
        .unwrap();
    assert!(fx.manager.resolve("weekly-digest", "finance").is_none());
}

#[tokio::test]
async fn status_and_listing() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("news_email", "finance", Some("digest"))
        .await
        .unwrap()
        .session_id;
    fx.manager
        .create_session("note", "alpha", None)
        .await
        .unwrap();

    let status = fx.manager.get_session_status("digest", "finance").await.unwrap();
    assert_eq!(status.session_id, sid);
    assert!(!status.has_global_parameters);
    assert_eq!(status.fragment_count, 0);

    let finance_sessions = fx.manager.list_active_sessions("finance").await.unwrap();
    assert_eq!(finance_sessions.len(), 1);
    let beta_sessions = fx.manager.list_active_sessions("beta").await.unwrap();
    assert!(beta_sessions.is_empty());
}

#[tokio::test]
async fn readiness_requires_global_parameters() {
    let fx = fixture();
    let sid = fx
        .manager
        .create_session("news_email", "finance", None)
        .await
        .unwrap()
        .session_id;

    let session = fx.manager.get_session(&sid, "finance").await.unwrap();
    let err = fx.manager.validate_session_for_render(&session).unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionNotReady);

    fx.manager
        .set_global_parameters(&sid, "finance", params(serde_json::json!({"subject": "S"})))
        .await
        .unwrap();
    let session = fx.manager.get_session(&sid, "finance").await.unwrap();
    assert!(fx.manager.validate_session_for_render(&session).is_ok());
}
