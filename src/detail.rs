//! Entity detail orchestrator: one event, three role-scoped panels.
//!
//! Loads the full event record plus its tasks and completion progress,
//! resolves the viewer's role once into a closed `RoleView`, and owns the
//! role-correct mutation paths. Whether the event is still upcoming is
//! computed once per load and gates every mutating affordance: nothing
//! about a past event can be changed.
//!
//! Task status toggles are the one optimistic write in the app. The
//! per-task `WriteState` machine applies the new status locally, calls
//! the gateway, and on failure reconciles against the server's
//! authoritative list so the UI never keeps a value the server rejected.

use crate::api::EventApi;
use crate::error::ApiError;
use crate::logging;
use crate::model::{Event, Identity, Role, Task, TaskInput, TaskStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Closed tagged union over the two viewer roles, resolved once at the
/// orchestrator boundary. Leaves branch on this, never on the raw role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleView {
    Admin,
    User,
}

impl RoleView {
    pub fn from_role(role: Role) -> Self {
        match role {
            Role::Admin => RoleView::Admin,
            Role::User => RoleView::User,
        }
    }

    /// The attendees tab is hidden entirely from users, not disabled
    pub fn tabs(&self) -> &'static [Tab] {
        match self {
            RoleView::Admin => &[Tab::Details, Tab::Attendees, Tab::Tasks],
            RoleView::User => &[Tab::Details, Tab::Tasks],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Details,
    Attendees,
    Tasks,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Details => "Details",
            Tab::Attendees => "Attendees",
            Tab::Tasks => "Tasks",
        }
    }
}

/// Pending-write wrapper around a task's authoritative status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Displayed value matches the server
    Authoritative,
    /// Local value applied ahead of confirmation; `prev` is the last
    /// known authoritative status
    Optimistic { prev: TaskStatus },
    /// A rejected write is being collapsed back to the server's value
    Reconciling,
}

#[derive(Debug, Clone)]
pub struct TaskSlot {
    pub task: Task,
    pub write: WriteState,
}

impl TaskSlot {
    fn authoritative(task: Task) -> Self {
        Self {
            task,
            write: WriteState::Authoritative,
        }
    }
}

pub struct EventDetail {
    api: Arc<dyn EventApi>,
    pub event: Event,
    pub tasks: Vec<TaskSlot>,
    pub progress: u8,
    /// Computed once per loaded event and threaded to every mutating
    /// control; past events are read-only everywhere.
    pub upcoming: bool,
    pub view: RoleView,
    pub tab: Tab,
    /// Inline, non-blocking failure messages scoped per panel so an
    /// error never clears other in-progress edits
    pub attendee_error: Option<String>,
    pub task_error: Option<String>,
    viewer: Identity,
}

impl EventDetail {
    /// Load the event, its tasks, and progress. For a user viewer the
    /// server already scopes the task list to their own assignments; the
    /// client passes no extra filter.
    pub async fn open(
        api: Arc<dyn EventApi>,
        event_id: &str,
        viewer: Identity,
    ) -> Result<Self, ApiError> {
        let event = api.get_event(event_id).await?;
        let tasks = api.event_tasks(event_id).await?;
        // Progress is decoration; a failed fetch shows 0 rather than
        // blocking the whole panel
        let progress = api
            .event_progress(event_id)
            .await
            .unwrap_or_default()
            .progress;

        let upcoming = event.is_upcoming(Utc::now());
        let view = RoleView::from_role(viewer.role);

        Ok(Self {
            api,
            event,
            tasks: tasks.into_iter().map(TaskSlot::authoritative).collect(),
            progress,
            upcoming,
            view,
            tab: Tab::Details,
            attendee_error: None,
            task_error: None,
            viewer,
        })
    }

    pub fn viewer(&self) -> &Identity {
        &self.viewer
    }

    /// All mutating affordances hang off this one gate
    pub fn can_mutate(&self) -> bool {
        self.upcoming
    }

    pub fn select_tab(&mut self, tab: Tab) {
        if self.view.tabs().contains(&tab) {
            self.tab = tab;
        }
    }

    pub fn next_tab(&mut self) {
        let tabs = self.view.tabs();
        let idx = tabs.iter().position(|t| *t == self.tab).unwrap_or(0);
        self.tab = tabs[(idx + 1) % tabs.len()];
    }

    /// Identities that can still be added as attendees: the set
    /// difference against the current attendee list, recomputed from the
    /// latest event record each call.
    pub fn available_attendees<'a>(&self, all_users: &'a [Identity]) -> Vec<&'a Identity> {
        all_users
            .iter()
            .filter(|u| !self.event.has_attendee(&u.id))
            .collect()
    }

    /// Optimistic task-status toggle: flip locally, confirm with the
    /// server, reconcile on failure.
    pub async fn toggle_task(&mut self, task_id: &str) {
        if !self.can_mutate() {
            self.task_error = Some("This event has ended; tasks can no longer change".to_string());
            return;
        }
        let Some(idx) = self.tasks.iter().position(|s| s.task.id == task_id) else {
            return;
        };

        let prev = self.tasks[idx].task.status;
        let next = prev.toggled();
        self.tasks[idx].task.status = next;
        self.tasks[idx].write = WriteState::Optimistic { prev };
        self.task_error = None;

        let api = Arc::clone(&self.api);
        match api.update_task_status(task_id, next).await {
            Ok(server_task) => {
                // Last resolved response wins; adopt the server's value
                let slot = &mut self.tasks[idx];
                slot.task = server_task;
                slot.write = WriteState::Authoritative;
                self.refresh_progress().await;
            }
            Err(e) => {
                logging::warn(&format!("Task toggle rejected: {}", e));
                self.task_error = Some(e.to_string());
                self.tasks[idx].write = WriteState::Reconciling;
                self.reload_tasks().await;
            }
        }
    }

    /// Replace the task list with the server's authoritative copy. When
    /// even the reload fails, collapse pending writes back to their last
    /// known authoritative value so the display never drifts.
    pub async fn reload_tasks(&mut self) {
        match self.api.event_tasks(&self.event.id).await {
            Ok(tasks) => {
                self.tasks = tasks.into_iter().map(TaskSlot::authoritative).collect();
            }
            Err(e) => {
                logging::error(&format!("Task reload failed: {}", e));
                for slot in &mut self.tasks {
                    if let WriteState::Optimistic { prev } = slot.write {
                        slot.task.status = prev;
                    }
                    if slot.write != WriteState::Authoritative {
                        // Roll back whatever we know; the value shown is
                        // the last one the server confirmed
                        slot.write = WriteState::Authoritative;
                    }
                }
            }
        }
        self.refresh_progress().await;
    }

    async fn refresh_progress(&mut self) {
        if let Ok(p) = self.api.event_progress(&self.event.id).await {
            self.progress = p.progress;
        }
    }

    /// Admin: create a task for this event. Required fields are checked
    /// client-side and never sent when missing.
    pub async fn create_task(
        &mut self,
        name: &str,
        deadline: DateTime<Utc>,
        assigned_attendee_id: &str,
    ) -> Result<(), ApiError> {
        if !self.can_mutate() {
            return Err(ApiError::Validation(
                "This event has ended; tasks can no longer be added".to_string(),
            ));
        }
        if name.trim().is_empty() || assigned_attendee_id.trim().is_empty() {
            return Err(ApiError::Validation(
                "Task name and assignee are required".to_string(),
            ));
        }

        let input = TaskInput {
            name: name.trim().to_string(),
            deadline,
            event_id: self.event.id.clone(),
            assigned_attendee_id: assigned_attendee_id.to_string(),
        };
        self.api.create_task(&input).await?;
        self.reload_tasks().await;
        Ok(())
    }

    /// Admin: attendee add goes straight to the server, then the whole
    /// event reloads. No optimism here: the attendee list gates task
    /// assignment, so correctness beats latency.
    pub async fn add_attendee(&mut self, user_id: &str) {
        if !self.can_mutate() {
            self.attendee_error =
                Some("This event has ended; attendees can no longer change".to_string());
            return;
        }
        self.attendee_error = None;
        let api = Arc::clone(&self.api);
        if let Err(e) = api.add_attendee(&self.event.id, user_id).await {
            self.attendee_error = Some(e.to_string());
            return;
        }
        self.reload_event().await;
    }

    pub async fn remove_attendee(&mut self, user_id: &str) {
        if !self.can_mutate() {
            self.attendee_error =
                Some("This event has ended; attendees can no longer change".to_string());
            return;
        }
        self.attendee_error = None;
        let api = Arc::clone(&self.api);
        if let Err(e) = api.remove_attendee(&self.event.id, user_id).await {
            self.attendee_error = Some(e.to_string());
            return;
        }
        self.reload_event().await;
        // A removed attendee may orphan task assignments; pick up the
        // server's view of those too
        self.reload_tasks().await;
    }

    async fn reload_event(&mut self) {
        match self.api.get_event(&self.event.id).await {
            Ok(event) => {
                // `upcoming` is deliberately not recomputed here: it is
                // fixed per load so a panel doesn't flip read-only
                // mid-interaction
                self.event = event;
            }
            Err(e) => {
                logging::error(&format!("Event reload failed: {}", e));
                self.attendee_error = Some(e.to_string());
            }
        }
    }
}
