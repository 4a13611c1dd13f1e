use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::{
    models::task::TaskRow,
    types::{TaskPriority, TaskStatus},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::{Caller, FailPoint, FakeState, Shared, injected_failure, lock, rest_error};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub(super) fn router() -> Router<Shared> {
    Router::new()
        .route("/tasks", get(select_tasks).post(insert_task).patch(update_task))
        .route("/users", get(select_users).patch(update_user))
        .route("/rpc/{name}", post(call_rpc))
}

type Params = HashMap<String, String>;

fn bad_uuid(value: &str) -> Response {
    rest_error(
        StatusCode::BAD_REQUEST,
        "22P02",
        &format!("invalid input syntax for type uuid: \"{value}\""),
    )
}

fn parse_eq(value: &str) -> Result<Uuid, Response> {
    value
        .strip_prefix("eq.")
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| bad_uuid(value))
}

fn parse_in(value: &str) -> Result<Vec<Uuid>, Response> {
    let inner = value
        .strip_prefix("in.(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| bad_uuid(value))?;
    inner
        .split(',')
        .filter(|raw| !raw.is_empty())
        .map(|raw| Uuid::parse_str(raw.trim()).map_err(|_| bad_uuid(raw)))
        .collect()
}

fn visible_task(state: &FakeState, caller: Caller, task: &TaskRow) -> bool {
    match caller {
        Caller::Anon => false,
        Caller::User(id) => state.is_admin(caller) || task.assigned_to == Some(id),
    }
}

fn sort_tasks(tasks: &mut [TaskRow], order: Option<&str>) {
    match order {
        Some("created_at.desc") => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        Some("due_date.asc") => tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        _ => {}
    }
}

async fn select_tasks(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<Params>,
) -> Response {
    let state = lock(&shared);
    let caller = match state.authenticate(&headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    if state.is_failing(FailPoint::SelectTasks) {
        return injected_failure();
    }

    let assignee = match params.get("assigned_to").map(|value| parse_eq(value)) {
        Some(Ok(id)) => Some(id),
        Some(Err(resp)) => return resp,
        None => None,
    };

    let mut rows: Vec<TaskRow> = state
        .tasks
        .iter()
        .filter(|task| visible_task(&state, caller, task))
        .filter(|task| assignee.is_none() || task.assigned_to == assignee)
        .cloned()
        .collect();
    sort_tasks(&mut rows, params.get("order").map(String::as_str));

    Json(rows).into_response()
}

#[derive(Debug, Deserialize)]
struct NewTaskBody {
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<TaskPriority>,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    assigned_to: Option<Uuid>,
    #[serde(default)]
    assigned_by: Option<Uuid>,
}

async fn insert_task(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&shared);
    let caller = match state.authenticate(&headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    if state.is_failing(FailPoint::InsertTask) {
        return injected_failure();
    }
    if !state.is_admin(caller) {
        return rest_error(
            StatusCode::FORBIDDEN,
            "42501",
            "new row violates row-level security policy for table \"tasks\"",
        );
    }

    let new_task: NewTaskBody = match serde_json::from_value(body) {
        Ok(task) => task,
        Err(err) => return rest_error(StatusCode::BAD_REQUEST, "PGRST102", &err.to_string()),
    };
    let Some(title) = new_task.title else {
        return rest_error(
            StatusCode::BAD_REQUEST,
            "23502",
            "null value in column \"title\" of relation \"tasks\" violates not-null constraint",
        );
    };
    if let Some(assignee) = new_task.assigned_to
        && state.user(assignee).is_none()
    {
        return rest_error(
            StatusCode::CONFLICT,
            "23503",
            "insert or update on table \"tasks\" violates foreign key constraint",
        );
    }

    let now = Utc::now();
    let row = TaskRow {
        id: Uuid::new_v4(),
        title,
        description: new_task.description,
        priority: new_task.priority.unwrap_or_default(),
        status: new_task.status.unwrap_or_default(),
        due_date: new_task.due_date,
        assigned_to: new_task.assigned_to,
        assigned_by: new_task.assigned_by,
        created_at: now,
        updated_at: now,
    };
    state.tasks.push(row.clone());

    (StatusCode::CREATED, Json(vec![row])).into_response()
}

#[derive(Debug, Deserialize)]
struct TaskPatchBody {
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

async fn update_task(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&shared);
    let caller = match state.authenticate(&headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    if state.is_failing(FailPoint::UpdateTask) {
        return injected_failure();
    }
    let task_id = match params.get("id").map(|value| parse_eq(value)) {
        Some(Ok(id)) => id,
        Some(Err(resp)) => return resp,
        None => {
            return rest_error(
                StatusCode::BAD_REQUEST,
                "21000",
                "UPDATE requires a WHERE clause",
            );
        }
    };
    let patch: TaskPatchBody = match serde_json::from_value(body) {
        Ok(patch) => patch,
        Err(err) => return rest_error(StatusCode::BAD_REQUEST, "22P02", &err.to_string()),
    };

    let allowed = state
        .tasks
        .iter()
        .find(|task| task.id == task_id)
        .is_some_and(|task| visible_task(&state, caller, task));
    if allowed && let Some(task) = state.tasks.iter_mut().find(|task| task.id == task_id) {
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(updated_at) = patch.updated_at {
            task.updated_at = updated_at;
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

fn project(user: &db::models::user::User, columns: &str) -> Value {
    let full = json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "role": user.role,
    });
    if columns == "*" {
        return full;
    }
    let mut out = Map::new();
    for column in columns.split(',').map(str::trim) {
        if let Some(value) = full.get(column) {
            out.insert(column.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

async fn select_users(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<Params>,
) -> Response {
    let state = lock(&shared);
    let caller = match state.authenticate(&headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };

    let id_filter = params.get("id").map(String::as_str);
    let fail_point = match id_filter {
        Some(value) if value.starts_with("in.") => FailPoint::SelectUsersByIds,
        Some(_) => FailPoint::SelectUser,
        None => FailPoint::SelectUsers,
    };
    if state.is_failing(fail_point) {
        return injected_failure();
    }

    let wanted: Option<Vec<Uuid>> = match id_filter {
        Some(value) if value.starts_with("in.") => match parse_in(value) {
            Ok(ids) => Some(ids),
            Err(resp) => return resp,
        },
        Some(value) => match parse_eq(value) {
            Ok(id) => Some(vec![id]),
            Err(resp) => return resp,
        },
        None => None,
    };

    let mut users: Vec<&db::models::user::User> = state
        .users
        .iter()
        .map(|entry| &entry.user)
        .filter(|user| match caller {
            Caller::Anon => false,
            Caller::User(id) => user.id == id || !state.hidden_users.contains(&user.id),
        })
        .filter(|user| wanted.as_ref().is_none_or(|ids| ids.contains(&user.id)))
        .collect();
    if params.get("order").map(String::as_str) == Some("username.asc") {
        users.sort_by(|a, b| a.username.cmp(&b.username));
    }

    let columns = params.get("select").map(String::as_str).unwrap_or("*");
    let rows: Vec<Value> = users.iter().map(|user| project(user, columns)).collect();

    let single = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        == Some(SINGLE_OBJECT);
    if single {
        if rows.len() != 1 {
            return (
                StatusCode::NOT_ACCEPTABLE,
                Json(json!({
                    "code": "PGRST116",
                    "message": "JSON object requested, multiple (or no) rows returned",
                    "details": format!("The result contains {} rows", rows.len()),
                    "hint": null,
                })),
            )
                .into_response();
        }
        return Json(rows[0].clone()).into_response();
    }

    Json(rows).into_response()
}

#[derive(Debug, Deserialize)]
struct UserPatchBody {
    #[serde(default)]
    username: Option<String>,
}

async fn update_user(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&shared);
    let caller = match state.authenticate(&headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    if state.is_failing(FailPoint::UpdateUser) {
        return injected_failure();
    }
    let user_id = match params.get("id").map(|value| parse_eq(value)) {
        Some(Ok(id)) => id,
        Some(Err(resp)) => return resp,
        None => {
            return rest_error(
                StatusCode::BAD_REQUEST,
                "21000",
                "UPDATE requires a WHERE clause",
            );
        }
    };
    let patch: UserPatchBody = match serde_json::from_value(body) {
        Ok(patch) => patch,
        Err(err) => return rest_error(StatusCode::BAD_REQUEST, "22P02", &err.to_string()),
    };

    if caller == Caller::User(user_id)
        && let Some(username) = patch.username
        && let Some(entry) = state.users.iter_mut().find(|entry| entry.user.id == user_id)
    {
        entry.user.username = username;
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn call_rpc(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let state = lock(&shared);
    let caller = match state.authenticate(&headers) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    if !matches!(name.as_str(), "get_user_role" | "get_current_user_role") {
        return rest_error(
            StatusCode::NOT_FOUND,
            "PGRST202",
            &format!("Could not find the function public.{name}"),
        );
    }
    if state.is_failing(FailPoint::RoleRpc) {
        return injected_failure();
    }

    let role = match caller {
        Caller::User(id) => state.user(id).map(|entry| entry.user.role),
        Caller::Anon => None,
    };
    Json(role).into_response()
}
