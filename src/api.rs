//! API gateway: one call shape per backend capability.
//!
//! A thin, uniform translation from typed calls to HTTP requests: no
//! retry, no caching. Every method attaches `Authorization: Bearer <token>`
//! when a token is set, serializes bodies as JSON, and normalizes non-2xx
//! responses into `ApiError` carrying the server's `message` field when
//! the error body parses.
//!
//! The `EventApi` trait is the seam the session store, detail orchestrator,
//! and tests all talk through; `ApiClient` is the real implementation.

use crate::error::ApiError;
use crate::model::{
    AuthResponse, Event, EventInput, EventProgress, Identity, NewUser, ProfileUpdate, Role, Task,
    TaskInput, TaskStatus,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::RwLock;

#[async_trait]
pub trait EventApi: Send + Sync {
    /// Install or clear the bearer token used by subsequent calls
    fn set_token(&self, token: Option<String>);

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError>;
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthResponse, ApiError>;
    /// Canonical "who am I", the authority on the session role
    async fn me(&self) -> Result<Identity, ApiError>;
    async fn list_users(&self) -> Result<Vec<Identity>, ApiError>;
    async fn create_user(&self, user: &NewUser) -> Result<Identity, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthResponse, ApiError>;

    async fn list_events(&self) -> Result<Vec<Event>, ApiError>;
    async fn get_event(&self, id: &str) -> Result<Event, ApiError>;
    async fn create_event(&self, input: &EventInput) -> Result<Event, ApiError>;
    async fn update_event(&self, id: &str, input: &EventInput) -> Result<Event, ApiError>;
    async fn delete_event(&self, id: &str) -> Result<(), ApiError>;
    async fn add_attendee(&self, event_id: &str, user_id: &str) -> Result<(), ApiError>;
    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<(), ApiError>;

    async fn create_task(&self, input: &TaskInput) -> Result<Task, ApiError>;
    async fn event_tasks(&self, event_id: &str) -> Result<Vec<Task>, ApiError>;
    async fn update_task_status(&self, task_id: &str, status: TaskStatus)
    -> Result<Task, ApiError>;
    async fn event_progress(&self, event_id: &str) -> Result<EventProgress, ApiError>;
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = self.bearer() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            resp.json::<T>().await.map_err(|e| ApiError::Api {
                status: status.as_u16(),
                message: format!("malformed response body: {}", e),
            })
        } else {
            let message = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| fallback.to_string());
            Err(normalize_status(status, message))
        }
    }

    /// Like `send`, for endpoints whose success body we don't care about
    async fn send_ack(
        &self,
        builder: reqwest::RequestBuilder,
        fallback: &str,
    ) -> Result<(), ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| fallback.to_string());
        Err(normalize_status(status, message))
    }
}

fn normalize_status(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Auth(message)
    } else {
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl EventApi for ApiClient {
    fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.send(
            self.request(reqwest::Method::POST, "/users/login").json(&body),
            "Login failed",
        )
        .await
    }

    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({
            "name": name,
            "email": email,
            "password": password,
            "role": role,
        });
        self.send(
            self.request(reqwest::Method::POST, "/users/register")
                .json(&body),
            "Registration failed",
        )
        .await
    }

    async fn me(&self) -> Result<Identity, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, "/users/me"),
            "Failed to fetch current user",
        )
        .await
    }

    async fn list_users(&self) -> Result<Vec<Identity>, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, "/users"),
            "Failed to fetch users",
        )
        .await
    }

    async fn create_user(&self, user: &NewUser) -> Result<Identity, ApiError> {
        self.send(
            self.request(reqwest::Method::POST, "/users").json(user),
            "Failed to create user",
        )
        .await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthResponse, ApiError> {
        self.send(
            self.request(reqwest::Method::PUT, "/users/profile")
                .json(update),
            "Failed to update profile",
        )
        .await
    }

    async fn list_events(&self) -> Result<Vec<Event>, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, "/events"),
            "Failed to fetch events",
        )
        .await
    }

    async fn get_event(&self, id: &str) -> Result<Event, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, &format!("/events/{}", id)),
            "Failed to fetch event",
        )
        .await
    }

    async fn create_event(&self, input: &EventInput) -> Result<Event, ApiError> {
        self.send(
            self.request(reqwest::Method::POST, "/events").json(input),
            "Failed to create event",
        )
        .await
    }

    async fn update_event(&self, id: &str, input: &EventInput) -> Result<Event, ApiError> {
        self.send(
            self.request(reqwest::Method::PUT, &format!("/events/{}", id))
                .json(input),
            "Failed to update event",
        )
        .await
    }

    async fn delete_event(&self, id: &str) -> Result<(), ApiError> {
        self.send_ack(
            self.request(reqwest::Method::DELETE, &format!("/events/{}", id)),
            "Failed to delete event",
        )
        .await
    }

    async fn add_attendee(&self, event_id: &str, user_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "userId": user_id });
        self.send_ack(
            self.request(
                reqwest::Method::POST,
                &format!("/events/{}/attendees", event_id),
            )
            .json(&body),
            "Failed to add attendee",
        )
        .await
    }

    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "userId": user_id });
        self.send_ack(
            self.request(
                reqwest::Method::DELETE,
                &format!("/events/{}/attendees", event_id),
            )
            .json(&body),
            "Failed to remove attendee",
        )
        .await
    }

    async fn create_task(&self, input: &TaskInput) -> Result<Task, ApiError> {
        self.send(
            self.request(reqwest::Method::POST, "/tasks").json(input),
            "Failed to create task",
        )
        .await
    }

    async fn event_tasks(&self, event_id: &str) -> Result<Vec<Task>, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, &format!("/tasks/event/{}", event_id)),
            "Failed to fetch tasks",
        )
        .await
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, ApiError> {
        let body = serde_json::json!({ "status": status });
        self.send(
            self.request(reqwest::Method::PUT, &format!("/tasks/{}", task_id))
                .json(&body),
            "Failed to update task status",
        )
        .await
    }

    async fn event_progress(&self, event_id: &str) -> Result<EventProgress, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, &format!("/tasks/progress/{}", event_id)),
            "Failed to fetch progress",
        )
        .await
    }
}
