use serde_json::json;
use tasktrack_core::bus::{Notification, NotificationBus};
use tasktrack_core::codec::CodecError;
use tasktrack_core::db::{open_db, open_db_in_memory};
use tasktrack_core::model::todo::{
    Bug, Feature, Severity, TaskItem, Todo, TodoHeader, TodoKind, TodoVariant, ValidationError,
};
use tasktrack_core::model::user::User;
use tasktrack_core::repo::{
    InMemoryRepository, RepoError, Repository, SqliteTodoRepository, SqliteUserRepository,
};
use tasktrack_core::service::context::UserContext;
use tasktrack_core::service::editor::{BugDraft, DraftHeader, FeatureDraft, TodoEditor};
use tasktrack_core::service::query::search_unfinished;
use tasktrack_core::service::transfer::{
    export_to_path, import_from_path, import_text, ImportReport,
};
use tasktrack_core::service::ServiceError;
use tasktrack_core::view::ViewSynchronizer;
use uuid::Uuid;

#[test]
fn first_task_flows_from_repository_into_views() {
    let users = InMemoryRepository::<User>::new();
    let tasks = InMemoryRepository::<TaskItem>::new();
    let bus = NotificationBus::new();

    let user = User::new("A");
    users.add(&user).unwrap();
    let t1 = TaskItem::new("Buy milk", user);
    tasks.add(&t1).unwrap();
    tasks.commit().unwrap();

    let views = ViewSynchronizer::new();
    views.initialize::<TaskItem, _>(&tasks).unwrap();
    views.attach(&bus);
    assert_eq!(views.unfinished(), vec![Todo::from(t1.clone())]);

    let done = t1.with_completed(true);
    bus.publish(&Notification::Saved(done.clone().into_todo()))
        .unwrap();
    assert!(views.unfinished().is_empty());
    assert_eq!(views.completed(), vec![Todo::from(done)]);
}

#[test]
fn editor_saves_and_deletes_through_sqlite() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTodoRepository::<TaskItem>::try_new(&conn).unwrap();
    let bus = NotificationBus::new();
    let ctx = UserContext::bootstrap(&users, "A").unwrap();

    let views = ViewSynchronizer::new();
    views.attach(&bus);
    let editor = TodoEditor::<TaskItem, _>::new(&tasks, &bus);

    let created = editor
        .save(&ctx, None, DraftHeader::titled("Buy milk"))
        .unwrap();
    assert_eq!(created.header.created_by, *ctx.current_user());
    assert_eq!(tasks.get(created.id()).unwrap(), created);
    assert_eq!(views.unfinished_ids(), vec![created.id()]);

    let mut change = DraftHeader::titled("Buy oat milk");
    change.is_completed = true;
    let revised = editor.save(&ctx, Some(&created), change).unwrap();
    assert_eq!(revised.id(), created.id());
    assert_eq!(tasks.get(created.id()).unwrap().title(), "Buy oat milk");
    assert!(views.unfinished().is_empty());
    assert_eq!(views.completed_ids(), vec![created.id()]);

    let deleted = editor.delete(&revised).unwrap();
    assert!(deleted.is_deleted());
    assert!(tasks.get(created.id()).unwrap().is_deleted());
    // Deleted only prunes the unfinished view.
    assert_eq!(views.completed_ids(), vec![created.id()]);
}

#[test]
fn editor_creates_features_and_bugs_with_defaults() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let features = SqliteTodoRepository::<Feature>::try_new(&conn).unwrap();
    let bugs = SqliteTodoRepository::<Bug>::try_new(&conn).unwrap();
    let bus = NotificationBus::new();
    let ctx = UserContext::bootstrap(&users, "A").unwrap();

    let feature = TodoEditor::<Feature, _>::new(&features, &bus)
        .save(
            &ctx,
            None,
            FeatureDraft {
                header: DraftHeader::titled("Dark mode"),
                component: "UI".to_string(),
                priority: 1,
                ..FeatureDraft::default()
            },
        )
        .unwrap();
    assert_eq!(feature.assigned_to, *ctx.current_user());
    assert!(feature.header.due_date.is_some());

    let assignee = User::new("B");
    let bug = TodoEditor::<Bug, _>::new(&bugs, &bus)
        .save(
            &ctx,
            None,
            BugDraft {
                header: DraftHeader::titled("Crash"),
                severity: Severity::Critical,
                assigned_to: Some(assignee.clone()),
                ..BugDraft::default()
            },
        )
        .unwrap();
    assert_eq!(bugs.get(bug.id()).unwrap().assigned_to, assignee);
    assert_eq!(users.find_by_title("B").unwrap(), assignee);
}

#[test]
fn blank_titles_are_rejected_without_side_effects() {
    let tasks = InMemoryRepository::<TaskItem>::new();
    let bus = NotificationBus::new();
    let views = ViewSynchronizer::new();
    views.attach(&bus);
    let ctx = UserContext::new(User::new("A"));

    let err = TodoEditor::<TaskItem, _>::new(&tasks, &bus)
        .save(&ctx, None, DraftHeader::titled("   "))
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::EmptyTitle)
    ));
    assert!(tasks.is_empty());
    assert!(views.unfinished().is_empty());
}

#[test]
fn failing_subscriber_surfaces_after_commit() {
    let tasks = InMemoryRepository::<TaskItem>::new();
    let bus = NotificationBus::new();
    let _broken = bus.subscribe("broken", |_| Err("render failed".to_string()));
    let ctx = UserContext::new(User::new("A"));

    let err = TodoEditor::<TaskItem, _>::new(&tasks, &bus)
        .save(&ctx, None, DraftHeader::titled("Buy milk"))
        .unwrap_err();

    assert!(matches!(err, ServiceError::Bus(_)));
    assert_eq!(tasks.len(), 1);
}

#[test]
fn export_then_import_into_fresh_database() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("todos.json");
    let owner = User::new("A");

    let source = InMemoryRepository::<Todo>::new();
    let parent = TaskItem::new("parent", owner.clone());
    let child = TaskItem::new("child", owner.clone()).with_parent(Some(parent.id()));
    let done = TaskItem::new("done", owner.clone()).with_completed(true);
    let gone = TaskItem::new("gone", owner).mark_deleted();
    for item in [&child, &parent, &done, &gone] {
        source.add(&item.clone().into_todo()).unwrap();
    }
    assert_eq!(export_to_path(&source, &file).unwrap(), 4);

    let conn = open_db(dir.path().join("tasks.db")).unwrap();
    let target = SqliteTodoRepository::<Todo>::try_new(&conn).unwrap();
    let bus = NotificationBus::new();
    let views = ViewSynchronizer::new();
    views.attach(&bus);

    let report = import_from_path(&target, &bus, &file).unwrap();

    assert_eq!(
        report,
        ImportReport {
            imported: 4,
            replaced: 0,
            ignored: 0,
        }
    );
    assert_eq!(target.list_all().unwrap(), source.list_all().unwrap());
    assert_eq!(views.unfinished_ids(), vec![child.id(), parent.id()]);
    assert_eq!(views.completed_ids(), vec![done.id()]);

    let again = import_from_path(&target, &bus, &file).unwrap();
    assert_eq!(again.ignored, 4);
    assert_eq!(again.total(), 4);
}

#[test]
fn rejected_import_stores_nothing() {
    let conn = open_db_in_memory().unwrap();
    let target = SqliteTodoRepository::<Todo>::try_new(&conn).unwrap();
    let bus = NotificationBus::new();
    let payload = json!([
        {
            "$type": "TaskItem",
            "id": "6f1c8e0a-0f55-4a53-9d0c-2b5f3c8b7a11",
            "title": "Buy milk",
            "created_date": 1_700_000_000_000_i64,
            "is_completed": false,
            "is_deleted": false,
            "created_by": { "id": "0b6e1d4e-8c8b-4f83-a1f0-6b1f0d8a2c33", "name": "A" },
            "parent": null,
            "due_date": null
        },
        { "$type": "ObjectDataProvider" }
    ])
    .to_string();

    let err = import_text(&target, &bus, &payload).unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Codec(CodecError::TypeRejected { index: 1, .. })
    ));
    assert!(target.list_all().unwrap().is_empty());
}

#[test]
fn missing_import_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let target = InMemoryRepository::<Todo>::new();

    match import_from_path(&target, &NotificationBus::new(), &missing) {
        Err(ServiceError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn bootstrap_reuses_user_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let first = {
        let conn = open_db(&path).unwrap();
        let users = SqliteUserRepository::try_new(&conn).unwrap();
        UserContext::bootstrap(&users, "Otis Ngo").unwrap()
    };

    let conn = open_db(&path).unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let second = UserContext::bootstrap(&users, "Otis Ngo").unwrap();

    assert_eq!(first, second);
    assert_eq!(users.list_all().unwrap().len(), 1);
}

#[test]
fn search_reads_the_union_repository() {
    let repo = InMemoryRepository::<Todo>::new();
    let owner = User::new("A");
    repo.add(&TaskItem::new("Fix login", owner.clone()).into_todo())
        .unwrap();
    repo.add(&TaskItem::new("Write docs", owner).into_todo())
        .unwrap();

    let hits = search_unfinished::<Todo, _>(&repo, "LOGIN").unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind(), TodoKind::TaskItem);
}

fn task_json(id: Uuid, title: &str, user_name: &str) -> serde_json::Value {
    json!({
        "$type": "TaskItem",
        "id": id.to_string(),
        "title": title,
        "created_date": 1_700_000_000_000_i64,
        "is_completed": false,
        "is_deleted": false,
        "created_by": { "id": Uuid::new_v4().to_string(), "name": user_name },
        "parent": null,
        "due_date": null
    })
}

#[test]
fn import_with_a_nameless_user_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let target = SqliteTodoRepository::<Todo>::try_new(&conn).unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let bus = NotificationBus::new();
    let payload = json!([
        task_json(Uuid::new_v4(), "first", "A"),
        task_json(Uuid::new_v4(), "second", ""),
    ])
    .to_string();

    let err = import_text(&target, &bus, &payload).unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Codec(CodecError::Invalid {
            index: 1,
            source: ValidationError::EmptyName
        })
    ));
    target.commit().unwrap();
    assert!(target.list_all().unwrap().is_empty());
    assert!(users.list_all().unwrap().is_empty());
}

#[test]
fn failed_import_leaves_nothing_for_a_later_commit() {
    let conn = open_db_in_memory().unwrap();
    let features = SqliteTodoRepository::<Feature>::try_new(&conn).unwrap();
    let target = SqliteTodoRepository::<Todo>::try_new(&conn).unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let bus = NotificationBus::new();
    let views = ViewSynchronizer::new();
    views.attach(&bus);

    let owner = User::new("A");
    let existing = Feature {
        header: TodoHeader::new("Dark mode", owner.clone()),
        description: String::new(),
        component: "UI".to_string(),
        priority: 1,
        assigned_to: owner.clone(),
    };
    features.add(&existing).unwrap();
    features.commit().unwrap();

    // The second element reuses the feature's id under another variant.
    let payload = json!([
        task_json(Uuid::new_v4(), "first", "B"),
        task_json(existing.id(), "clash", "C"),
    ])
    .to_string();

    let err = import_text(&target, &bus, &payload).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repo(RepoError::VariantMismatch {
            expected: TodoKind::TaskItem,
            actual: TodoKind::Feature,
            ..
        })
    ));

    target.commit().unwrap();
    assert_eq!(target.list_all().unwrap(), vec![Todo::from(existing)]);
    assert_eq!(users.list_all().unwrap(), vec![owner]);
    assert!(views.unfinished().is_empty());
}
