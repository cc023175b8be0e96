//! Wire and domain types shared across the dashboard.
//!
//! The backend is Mongo-flavored: ids arrive as `_id` and field names are
//! camelCase. Everything here serializes back out the same way so request
//! bodies match what the server expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated user's minimal profile. Role is immutable for the
/// session; privileged operations are gated on `role == Admin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Identity subset embedded in event attendee lists and task assignments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(rename = "createdBy", default)]
    pub created_by: Option<String>,
}

impl Event {
    /// Derived each call against the caller's clock, never cached, since
    /// "now" advances between renders.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date > now
    }

    pub fn has_attendee(&self, user_id: &str) -> bool {
        self.attendees.iter().any(|a| a.id == user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn toggled(&self) -> TaskStatus {
        match self {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub deadline: DateTime<Utc>,
    pub status: TaskStatus,
    /// None when the assigned attendee was removed from the event
    #[serde(rename = "assignedAttendee", default)]
    pub assigned_attendee: Option<Attendee>,
    #[serde(rename = "eventId", default)]
    pub event_id: String,
}

impl Task {
    /// Assignee display name; an orphaned assignment shows "N/A"
    pub fn assignee_name(&self) -> &str {
        self.assigned_attendee
            .as_ref()
            .map(|a| a.name.as_str())
            .unwrap_or("N/A")
    }
}

/// Task-completion percentage for one event
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventProgress {
    #[serde(default)]
    pub progress: u8,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct EventInput {
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskInput {
    pub name: String,
    pub deadline: DateTime<Utc>,
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "assignedAttendeeId")]
    pub assigned_attendee_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Login/register/profile responses: the identity fields spread alongside
/// a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl AuthResponse {
    /// The identity embedded in the auth response. Callers should prefer
    /// re-fetching the canonical identity over trusting this one.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}
