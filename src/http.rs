//! HTTP implementation of [`TaskService`] for the remote REST API.
//!
//! Routes mirror the server: `/projects`, `/projects/{id}/tasks/{id}`,
//! `/projects/{id}/tasks/{id}/status`, `.../notes`, `/projects/{id}/team`,
//! `/auth/user`, `/auth/profile`, `/auth/update-password`,
//! `/auth/check-password`, `/auth/logout`. Failed requests carry the `error` field of the JSON body as
//! their reason when the server supplies one.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::fields::Status;
use crate::project::{Project, ProjectForm, ProjectSummary};
use crate::service::{ServiceError, ServiceResult, TaskService};
use crate::task::{NoteForm, PasswordForm, ProfileForm, Task, TaskForm, TeamMember, User};

/// REST client for the remote task service.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTaskService {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpTaskService { client: Client::new(), base_url, token: None }
    }

    /// Authenticate requests with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "api request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ServiceResult<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "api unreachable");
            ServiceError::Unreachable(e.to_string())
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let reason = error_reason(&body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("Request failed").to_string()
        });
        warn!(%status, %reason, "api rejected request");
        Err(ServiceError::Rejected { reason })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        response.json::<T>().await.map_err(|e| ServiceError::Malformed(e.to_string()))
    }

    async fn fetch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ServiceResult<T> {
        let response = self.send(self.request(method, path).json(body)).await?;
        response.json::<T>().await.map_err(|e| ServiceError::Malformed(e.to_string()))
    }

    /// Mutations answer with a message, usually as a JSON string.
    async fn message(&self, builder: RequestBuilder) -> ServiceResult<String> {
        let response = self.send(builder).await?;
        let body = response.text().await.map_err(|e| ServiceError::Malformed(e.to_string()))?;
        Ok(parse_message(&body))
    }
}

/// Pull the `error` field out of a failure payload.
pub fn error_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error") {
        Some(Value::String(reason)) if !reason.is_empty() => Some(reason.clone()),
        _ => None,
    }
}

/// A success body is either a JSON string or plain text.
pub fn parse_message(body: &str) -> String {
    serde_json::from_str::<String>(body).unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait(?Send)]
impl TaskService for HttpTaskService {
    async fn current_user(&self) -> ServiceResult<User> {
        self.get("/auth/user").await
    }

    async fn update_profile(&self, form: &ProfileForm) -> ServiceResult<String> {
        self.message(self.request(Method::PUT, "/auth/profile").json(form)).await
    }

    async fn update_password(&self, form: &PasswordForm) -> ServiceResult<String> {
        self.message(self.request(Method::POST, "/auth/update-password").json(form)).await
    }

    async fn check_password(&self, password: &str) -> ServiceResult<String> {
        let body = json!({ "password": password });
        self.message(self.request(Method::POST, "/auth/check-password").json(&body)).await
    }

    async fn logout(&self) -> ServiceResult<String> {
        self.message(self.request(Method::POST, "/auth/logout")).await
    }

    async fn projects(&self) -> ServiceResult<Vec<ProjectSummary>> {
        self.get("/projects").await
    }

    async fn create_project(&self, form: &ProjectForm) -> ServiceResult<String> {
        self.message(self.request(Method::POST, "/projects").json(form)).await
    }

    async fn project(&self, project_id: &str) -> ServiceResult<Project> {
        self.get(&format!("/projects/{project_id}")).await
    }

    async fn update_project(&self, project_id: &str, form: &ProjectForm) -> ServiceResult<String> {
        self.message(self.request(Method::PUT, &format!("/projects/{project_id}")).json(form)).await
    }

    async fn delete_project(&self, project_id: &str) -> ServiceResult<String> {
        self.message(self.request(Method::DELETE, &format!("/projects/{project_id}"))).await
    }

    async fn create_task(&self, project_id: &str, form: &TaskForm) -> ServiceResult<String> {
        self.message(self.request(Method::POST, &format!("/projects/{project_id}/tasks")).json(form)).await
    }

    async fn task(&self, project_id: &str, task_id: &str) -> ServiceResult<Task> {
        self.get(&format!("/projects/{project_id}/tasks/{task_id}")).await
    }

    async fn update_task(&self, project_id: &str, task_id: &str, form: &TaskForm) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/tasks/{task_id}");
        self.message(self.request(Method::PUT, &path).json(form)).await
    }

    async fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/tasks/{task_id}");
        self.message(self.request(Method::DELETE, &path)).await
    }

    async fn change_task_status(&self, project_id: &str, task_id: &str, status: Status) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/tasks/{task_id}/status");
        self.message(self.request(Method::POST, &path).json(&json!({ "status": status }))).await
    }

    async fn create_note(&self, project_id: &str, task_id: &str, form: &NoteForm) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/tasks/{task_id}/notes");
        self.message(self.request(Method::POST, &path).json(form)).await
    }

    async fn delete_note(&self, project_id: &str, task_id: &str, note_id: &str) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/tasks/{task_id}/notes/{note_id}");
        self.message(self.request(Method::DELETE, &path)).await
    }

    async fn team(&self, project_id: &str) -> ServiceResult<Vec<TeamMember>> {
        self.get(&format!("/projects/{project_id}/team")).await
    }

    async fn find_member(&self, project_id: &str, email: &str) -> ServiceResult<TeamMember> {
        let path = format!("/projects/{project_id}/team/find");
        self.fetch_json(Method::POST, &path, &json!({ "email": email })).await
    }

    async fn add_member(&self, project_id: &str, user_id: &str) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/team");
        self.message(self.request(Method::POST, &path).json(&json!({ "id": user_id }))).await
    }

    async fn remove_member(&self, project_id: &str, user_id: &str) -> ServiceResult<String> {
        let path = format!("/projects/{project_id}/team/{user_id}");
        self.message(self.request(Method::DELETE, &path)).await
    }
}
