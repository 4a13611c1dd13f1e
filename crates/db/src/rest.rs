use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::{
    backend::{ApiErrorBody, Backend, BackendError, RoleRpc, TaskQuery},
    models::{
        task::{CreateTask, TaskRow, TaskStatusUpdate},
        user::{ProfileUpdate, User, UserSummary},
    },
    types::Role,
};

const REST_PATH: &str = "rest/v1/";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const NO_ROWS_CODE: &str = "PGRST116";

const TASK_COLUMNS: &str = "*";
const USER_COLUMNS: &str = "id,username,email,role";
const USER_SUMMARY_COLUMNS: &str = "id,username,email";

/// Ensure the base url ends with `/` so relative joins keep its path.
pub fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("{trimmed}/"))
    }
}

/// [`Backend`] over the hosted REST API (`/rest/v1`).
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    rest_url: Url,
    anon_key: String,
    access_token: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url, anon_key)
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        anon_key: &str,
    ) -> Result<Self, BackendError> {
        let rest_url = normalize_base_url(base_url)?.join(REST_PATH)?;
        Ok(Self {
            client,
            rest_url,
            anon_key: anon_key.to_string(),
            access_token: None,
        })
    }

    /// A copy of this backend that acts as the signed-in user.
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..self.clone()
        }
    }

    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        Ok(self.rest_url.join(table)?)
    }

    fn rpc_url(&self, name: &str) -> Result<Url, BackendError> {
        Ok(self.rest_url.join(&format!("rpc/{name}"))?)
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        rb.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    async fn send(
        &self,
        rb: RequestBuilder,
        method: &'static str,
        url: &Url,
    ) -> Result<String, BackendError> {
        let resp = self.authorize(rb).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::debug!(
                method,
                path = url.path(),
                status = status.as_u16(),
                "Backend request rejected"
            );
            return Err(api_error(status, &body));
        }

        tracing::debug!(
            method,
            path = url.path(),
            status = status.as_u16(),
            "Backend request completed"
        );
        Ok(body)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        method: &'static str,
        url: &Url,
    ) -> Result<T, BackendError> {
        let body = self.send(rb, method, url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

pub(crate) fn api_error(status: StatusCode, body: &str) -> BackendError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();

    if parsed.code.as_deref() == Some(NO_ROWS_CODE) || status == StatusCode::NOT_ACCEPTABLE {
        return BackendError::RecordNotFound(
            parsed
                .details
                .or(parsed.message)
                .unwrap_or_else(|| "no matching row".to_string()),
        );
    }

    let message = parsed
        .message
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    BackendError::Api {
        status: status.as_u16(),
        code: parsed.code,
        message,
    }
}

pub(crate) fn in_filter(ids: &[Uuid]) -> String {
    let joined = ids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

pub(crate) fn task_query_params(query: &TaskQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", TASK_COLUMNS.to_string()),
        ("order", query.order.as_param().to_string()),
    ];
    if let Some(user_id) = query.assigned_to {
        params.push(("assigned_to", format!("eq.{user_id}")));
    }
    params
}

#[async_trait]
impl Backend for RestBackend {
    async fn select_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRow>, BackendError> {
        let url = self.table_url("tasks")?;
        let rb = self
            .client
            .get(url.clone())
            .query(&task_query_params(query));
        self.fetch_json(rb, "GET", &url).await
    }

    async fn insert_task(&self, task: &CreateTask) -> Result<TaskRow, BackendError> {
        let url = self.table_url("tasks")?;
        let rb = self
            .client
            .post(url.clone())
            .header("Prefer", RETURN_REPRESENTATION)
            .json(task);
        let mut rows: Vec<TaskRow> = self.fetch_json(rb, "POST", &url).await?;
        if rows.is_empty() {
            return Err(BackendError::RecordNotFound(
                "insert returned no task".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update_task_status(
        &self,
        task_id: Uuid,
        update: &TaskStatusUpdate,
    ) -> Result<(), BackendError> {
        let url = self.table_url("tasks")?;
        let rb = self
            .client
            .patch(url.clone())
            .query(&[("id", format!("eq.{task_id}"))])
            .json(update);
        self.send(rb, "PATCH", &url).await?;
        Ok(())
    }

    async fn select_users(&self) -> Result<Vec<User>, BackendError> {
        let url = self.table_url("users")?;
        let rb = self
            .client
            .get(url.clone())
            .query(&[("select", USER_COLUMNS), ("order", "username.asc")]);
        self.fetch_json(rb, "GET", &url).await
    }

    async fn select_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, BackendError> {
        let url = self.table_url("users")?;
        let rb = self.client.get(url.clone()).query(&[
            ("select", USER_SUMMARY_COLUMNS.to_string()),
            ("id", in_filter(ids)),
        ]);
        self.fetch_json(rb, "GET", &url).await
    }

    async fn select_user(&self, user_id: Uuid) -> Result<User, BackendError> {
        let url = self.table_url("users")?;
        let rb = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, SINGLE_OBJECT)
            .query(&[
                ("select", USER_COLUMNS.to_string()),
                ("id", format!("eq.{user_id}")),
            ]);
        self.fetch_json(rb, "GET", &url).await
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError> {
        let url = self.table_url("users")?;
        let rb = self
            .client
            .patch(url.clone())
            .query(&[("id", format!("eq.{user_id}"))])
            .json(update);
        self.send(rb, "PATCH", &url).await?;
        Ok(())
    }

    async fn call_role_rpc(&self, rpc: RoleRpc) -> Result<Role, BackendError> {
        let url = self.rpc_url(rpc.name())?;
        let rb = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({}));
        let role: Option<Role> = self.fetch_json(rb, "POST", &url).await?;
        Ok(role.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TaskOrder;

    #[test]
    fn base_url_keeps_project_path() {
        let backend =
            RestBackend::with_client(Client::new(), "https://example.test/project", "anon")
                .unwrap();
        assert_eq!(
            backend.table_url("tasks").unwrap().as_str(),
            "https://example.test/project/rest/v1/tasks"
        );
        assert_eq!(
            backend.rpc_url("get_user_role").unwrap().as_str(),
            "https://example.test/project/rest/v1/rpc/get_user_role"
        );
    }

    #[test]
    fn task_params_follow_filter_and_order() {
        let user_id = Uuid::new_v4();
        let params =
            task_query_params(&TaskQuery::assigned_to(user_id).ordered_by(TaskOrder::DueDateAsc));
        assert_eq!(
            params,
            vec![
                ("select", "*".to_string()),
                ("order", "due_date.asc".to_string()),
                ("assigned_to", format!("eq.{user_id}")),
            ]
        );

        let all = task_query_params(&TaskQuery::all());
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1, "created_at.desc");
    }

    #[test]
    fn in_filter_lists_every_id() {
        let a = Uuid::nil();
        let b = Uuid::max();
        assert_eq!(in_filter(&[a, b]), format!("in.({a},{b})"));
    }

    #[test]
    fn api_errors_keep_backend_message() {
        let err = api_error(
            StatusCode::FORBIDDEN,
            r#"{"code":"42501","message":"new row violates row-level security policy"}"#,
        );
        match err {
            BackendError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code.as_deref(), Some("42501"));
                assert!(message.contains("row-level security"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_single_row_maps_to_not_found() {
        let err = api_error(
            StatusCode::NOT_ACCEPTABLE,
            r#"{"code":"PGRST116","details":"The result contains 0 rows"}"#,
        );
        assert!(matches!(err, BackendError::RecordNotFound(_)));
    }

    #[test]
    fn non_json_error_body_is_used_verbatim() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("upstream unavailable"));
    }
}
