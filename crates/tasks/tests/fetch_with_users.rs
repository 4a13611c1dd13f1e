mod common;

use common::{fixture, rest_as};
use db::{
    BackendError, TaskQuery,
    models::task::{Assignee, Task},
};
use test_support::{FailPoint, TaskSeed};

#[tokio::test]
async fn referenced_users_are_fetched_in_one_batch() {
    let fx = fixture().await;
    let (admin, alice, bob) = (fx.admin.id, fx.alice.id, fx.bob.id);
    fx.backend
        .seed_task(TaskSeed::new("a").assigned_to(alice).assigned_by(admin));
    fx.backend
        .seed_task(TaskSeed::new("b").assigned_to(bob).assigned_by(admin));
    fx.backend
        .seed_task(TaskSeed::new("c").assigned_to(alice).assigned_by(admin));
    fx.backend.seed_task(TaskSeed::new("d").assigned_by(admin));

    let db = rest_as(&fx.backend, &fx.admin);
    let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

    assert_eq!(fx.backend.count("GET", "/rest/v1/tasks"), 1);
    assert_eq!(fx.backend.count("GET", "/rest/v1/users"), 1);

    let lookup = fx
        .backend
        .requests()
        .into_iter()
        .find(|req| req.path == "/rest/v1/users")
        .unwrap();
    assert_eq!(lookup.query_param("select").as_deref(), Some("id,username,email"));
    let filter = lookup.query_param("id").unwrap();
    let ids: Vec<&str> = filter
        .trim_start_matches("in.(")
        .trim_end_matches(')')
        .split(',')
        .collect();
    assert_eq!(ids.len(), 3);
    for id in [admin, alice, bob] {
        assert!(ids.contains(&id.to_string().as_str()));
    }

    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["d", "c", "b", "a"]);

    let a = tasks.iter().find(|t| t.title == "a").unwrap();
    assert_eq!(a.assigned_to.as_ref().and_then(Assignee::user).unwrap().username, "alice");
    assert_eq!(a.assigned_by.as_ref().and_then(Assignee::user).unwrap().username, "admin");
    assert_eq!(
        a.assigned_to.as_ref().and_then(Assignee::user).unwrap().email,
        "alice@example.com"
    );
    let d = tasks.iter().find(|t| t.title == "d").unwrap();
    assert!(d.assigned_to.is_none());
}

#[tokio::test]
async fn failed_user_lookup_keeps_bare_ids() {
    let fx = fixture().await;
    let seeded = fx.backend.seed_task(
        TaskSeed::new("a")
            .assigned_to(fx.alice.id)
            .assigned_by(fx.admin.id),
    );
    fx.backend.fail(FailPoint::SelectUsersByIds);

    let db = rest_as(&fx.backend, &fx.admin);
    let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, seeded.id);
    assert_eq!(tasks[0].assigned_to, Some(Assignee::Id(fx.alice.id)));
    assert_eq!(tasks[0].assigned_by, Some(Assignee::Id(fx.admin.id)));
    assert_eq!(fx.backend.count("GET", "/rest/v1/users"), 1);
}

#[tokio::test]
async fn users_hidden_from_the_caller_stay_bare_ids() {
    let fx = fixture().await;
    fx.backend.seed_task(
        TaskSeed::new("a")
            .assigned_to(fx.alice.id)
            .assigned_by(fx.admin.id),
    );
    fx.backend.hide_user(fx.admin.id);

    let db = rest_as(&fx.backend, &fx.alice);
    let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0].assigned_to.as_ref().and_then(Assignee::user).map(|u| u.id),
        Some(fx.alice.id)
    );
    assert_eq!(tasks[0].assigned_by, Some(Assignee::Id(fx.admin.id)));
}

#[tokio::test]
async fn no_lookup_without_references() {
    let fx = fixture().await;
    fx.backend.seed_task(TaskSeed::new("orphan"));

    let db = rest_as(&fx.backend, &fx.admin);
    let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(fx.backend.count("GET", "/rest/v1/users"), 0);
}

#[tokio::test]
async fn failed_task_fetch_is_an_error() {
    let fx = fixture().await;
    fx.backend.fail(FailPoint::SelectTasks);

    let db = rest_as(&fx.backend, &fx.admin);
    let err = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap_err();

    assert!(matches!(err, BackendError::Api { status: 500, .. }));
    assert_eq!(fx.backend.count("GET", "/rest/v1/users"), 0);
}

#[tokio::test]
async fn non_admins_only_see_their_own_rows() {
    let fx = fixture().await;
    fx.backend
        .seed_task(TaskSeed::new("mine").assigned_to(fx.alice.id));
    fx.backend
        .seed_task(TaskSeed::new("theirs").assigned_to(fx.bob.id));
    fx.backend.seed_task(TaskSeed::new("nobody"));

    let db = rest_as(&fx.backend, &fx.alice);
    let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "mine");
}
