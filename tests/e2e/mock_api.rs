//! In-memory implementation of the API seam for end-to-end tests.
//!
//! Behaves like a tiny backend: events, tasks, and users live in a
//! mutex-held state, and every call is counted so tests can assert on
//! traffic (or the absence of it).

use async_trait::async_trait;
use eventdeck::api::EventApi;
use eventdeck::error::ApiError;
use eventdeck::model::{
    Attendee, AuthResponse, Event, EventInput, EventProgress, Identity, NewUser, ProfileUpdate,
    Role, Task, TaskInput, TaskStatus,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockApi {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    token: Option<String>,
    me: Option<Identity>,
    login: Option<AuthResponse>,
    users: Vec<Identity>,
    events: Vec<Event>,
    tasks: HashMap<String, Vec<Task>>,
    progress: HashMap<String, u8>,
    fail_update_task: bool,
    next_id: u32,
    calls: HashMap<&'static str, usize>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_me(&self, identity: Option<Identity>) {
        self.state.lock().unwrap().me = identity;
    }

    pub fn set_login(&self, response: AuthResponse) {
        self.state.lock().unwrap().login = Some(response);
    }

    pub fn add_user(&self, user: Identity) {
        self.state.lock().unwrap().users.push(user);
    }

    pub fn add_event(&self, event: Event) {
        self.state.lock().unwrap().events.push(event);
    }

    pub fn set_tasks(&self, event_id: &str, tasks: Vec<Task>) {
        self.state
            .lock()
            .unwrap()
            .tasks
            .insert(event_id.to_string(), tasks);
    }

    pub fn fail_task_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_update_task = fail;
    }

    pub fn call_count(&self, name: &str) -> usize {
        *self.state.lock().unwrap().calls.get(name).unwrap_or(&0)
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().unwrap().token.clone()
    }

    fn count(state: &mut State, name: &'static str) {
        *state.calls.entry(name).or_insert(0) += 1;
    }
}

#[async_trait]
impl EventApi for MockApi {
    fn set_token(&self, token: Option<String>) {
        self.state.lock().unwrap().token = token;
    }

    async fn login(&self, _email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "login");
        if password != "secret" {
            return Err(ApiError::Auth("Invalid email or password".to_string()));
        }
        state
            .login
            .clone()
            .ok_or_else(|| ApiError::Auth("No login configured".to_string()))
    }

    async fn register(
        &self,
        _name: &str,
        _email: &str,
        _password: &str,
        _role: Role,
    ) -> Result<AuthResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "register");
        state
            .login
            .clone()
            .ok_or_else(|| ApiError::Auth("No login configured".to_string()))
    }

    async fn me(&self) -> Result<Identity, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "me");
        state
            .me
            .clone()
            .ok_or_else(|| ApiError::Auth("Not authorized, token failed".to_string()))
    }

    async fn list_users(&self) -> Result<Vec<Identity>, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "list_users");
        Ok(state.users.clone())
    }

    async fn create_user(&self, user: &NewUser) -> Result<Identity, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "create_user");
        state.next_id += 1;
        let identity = Identity {
            id: format!("u{}", state.next_id),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        };
        state.users.push(identity.clone());
        Ok(identity)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "update_profile");
        let me = state
            .me
            .clone()
            .ok_or_else(|| ApiError::Auth("Not authorized".to_string()))?;
        Ok(AuthResponse {
            token: "fresh-token".to_string(),
            id: me.id,
            name: update.name.clone(),
            email: me.email,
            role: me.role,
        })
    }

    async fn list_events(&self) -> Result<Vec<Event>, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "list_events");
        Ok(state.events.clone())
    }

    async fn get_event(&self, id: &str) -> Result<Event, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "get_event");
        state
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: "Event not found".to_string(),
            })
    }

    async fn create_event(&self, input: &EventInput) -> Result<Event, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "create_event");
        state.next_id += 1;
        let event = Event {
            id: format!("e{}", state.next_id),
            name: input.name.clone(),
            description: Some(input.description.clone()),
            location: input.location.clone(),
            date: input.date,
            attendees: Vec::new(),
            created_by: None,
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: &str, input: &EventInput) -> Result<Event, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "update_event");
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: "Event not found".to_string(),
            })?;
        event.name = input.name.clone();
        event.description = Some(input.description.clone());
        event.location = input.location.clone();
        event.date = input.date;
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "delete_event");
        state.events.retain(|e| e.id != id);
        state.tasks.remove(id);
        Ok(())
    }

    async fn add_attendee(&self, event_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "add_attendee");
        let user = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: "User not found".to_string(),
            })?;
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: "Event not found".to_string(),
            })?;
        if !event.attendees.iter().any(|a| a.id == user_id) {
            event.attendees.push(Attendee {
                id: user.id,
                name: user.name,
                email: user.email,
            });
        }
        Ok(())
    }

    async fn remove_attendee(&self, event_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "remove_attendee");
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: "Event not found".to_string(),
            })?;
        event.attendees.retain(|a| a.id != user_id);
        // The backend orphans tasks assigned to a removed attendee
        if let Some(tasks) = state.tasks.get_mut(event_id) {
            for task in tasks.iter_mut() {
                if task
                    .assigned_attendee
                    .as_ref()
                    .is_some_and(|a| a.id == user_id)
                {
                    task.assigned_attendee = None;
                }
            }
        }
        Ok(())
    }

    async fn create_task(&self, input: &TaskInput) -> Result<Task, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "create_task");
        let assignee = state
            .events
            .iter()
            .find(|e| e.id == input.event_id)
            .and_then(|e| {
                e.attendees
                    .iter()
                    .find(|a| a.id == input.assigned_attendee_id)
            })
            .cloned();
        state.next_id += 1;
        let task = Task {
            id: format!("t{}", state.next_id),
            name: input.name.clone(),
            deadline: input.deadline,
            status: TaskStatus::Pending,
            assigned_attendee: assignee,
            event_id: input.event_id.clone(),
        };
        state
            .tasks
            .entry(input.event_id.clone())
            .or_default()
            .push(task.clone());
        Ok(task)
    }

    async fn event_tasks(&self, event_id: &str) -> Result<Vec<Task>, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "event_tasks");
        Ok(state.tasks.get(event_id).cloned().unwrap_or_default())
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<Task, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "update_task_status");
        if state.fail_update_task {
            return Err(ApiError::Api {
                status: 500,
                message: "Task update rejected".to_string(),
            });
        }
        for tasks in state.tasks.values_mut() {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                task.status = status;
                return Ok(task.clone());
            }
        }
        Err(ApiError::Api {
            status: 404,
            message: "Task not found".to_string(),
        })
    }

    async fn event_progress(&self, event_id: &str) -> Result<EventProgress, ApiError> {
        let mut state = self.state.lock().unwrap();
        Self::count(&mut state, "event_progress");
        let progress = state.progress.get(event_id).copied().unwrap_or_else(|| {
            // Derive from the task list when not explicitly configured
            let tasks = state.tasks.get(event_id);
            match tasks {
                Some(tasks) if !tasks.is_empty() => {
                    let done = tasks
                        .iter()
                        .filter(|t| t.status == TaskStatus::Completed)
                        .count();
                    ((done * 100) / tasks.len()) as u8
                }
                _ => 0,
            }
        });
        Ok(EventProgress { progress })
    }
}
