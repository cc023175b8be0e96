//! End-to-end scenarios against the in-memory mock backend.
//!
//! These drive the session store, collection view, and detail
//! orchestrator through the same seam trait the real HTTP client
//! implements, so everything above the wire is exercised for real.

mod mock_api;

use chrono::{Duration, TimeZone, Utc};
use eventdeck::api::EventApi;
use eventdeck::detail::{EventDetail, Tab, WriteState};
use eventdeck::model::{
    Attendee, AuthResponse, Event, EventInput, Identity, ProfileUpdate, Role, Task, TaskStatus,
};
use eventdeck::session::SessionStore;
use eventdeck::view::{CollectionView, EventFilter, SortOrder};
use mock_api::MockApi;
use std::sync::{Arc, Mutex};

// Tests that point EVENTDECK_HOME at a tempdir must not interleave
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn identity(id: &str, name: &str, role: Role) -> Identity {
    Identity {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
    }
}

fn attendee(user: &Identity) -> Attendee {
    Attendee {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
    }
}

fn event(id: &str, name: &str, date: chrono::DateTime<chrono::Utc>) -> Event {
    Event {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(format!("{} description", name)),
        location: "HQ".to_string(),
        date,
        attendees: Vec::new(),
        created_by: None,
    }
}

fn task(id: &str, event_id: &str, deadline: chrono::DateTime<chrono::Utc>) -> Task {
    Task {
        id: id.to_string(),
        name: format!("Task {}", id),
        deadline,
        status: TaskStatus::Pending,
        assigned_attendee: None,
        event_id: event_id.to_string(),
    }
}

#[tokio::test]
async fn test_created_event_sorts_first_under_newest() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    mock.add_event(event("e1", "Retro", now + Duration::days(1)));
    mock.add_event(event("e2", "Standup", now - Duration::days(2)));

    let created = mock
        .create_event(&EventInput {
            name: "Launch Party".to_string(),
            description: "Ship it".to_string(),
            location: "Rooftop".to_string(),
            date: now + Duration::days(10),
        })
        .await
        .unwrap();

    let mut view = CollectionView::new();
    view.set_events(mock.list_events().await.unwrap());
    view.set_filter(EventFilter::All);
    view.set_sort(SortOrder::Newest);

    let derived = view.derived();
    assert_eq!(derived[0].id, created.id);
    assert_eq!(derived.len(), 3);

    // The same event leads the upcoming slice and is absent from completed
    view.set_filter(EventFilter::Upcoming);
    assert_eq!(view.derived()[0].id, created.id);
    view.set_filter(EventFilter::Completed);
    assert!(view.derived().iter().all(|e| e.id != created.id));
}

#[tokio::test]
async fn test_toggle_allowed_past_deadline_while_event_upcoming() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    // Deadline already passed, but the event itself has not
    mock.add_event(event("e1", "Conference", now + Duration::days(3)));
    mock.set_tasks("e1", vec![task("t1", "e1", now - Duration::days(1))]);

    let viewer = identity("u1", "Ada", Role::User);
    let api: Arc<dyn EventApi> = mock.clone();
    let mut detail = EventDetail::open(api, "e1", viewer).await.unwrap();
    assert!(detail.can_mutate());

    detail.toggle_task("t1").await;

    assert_eq!(detail.tasks[0].task.status, TaskStatus::Completed);
    assert_eq!(detail.tasks[0].write, WriteState::Authoritative);
    assert!(detail.task_error.is_none());
    assert_eq!(mock.call_count("update_task_status"), 1);
    // Progress re-derived from the confirmed server state
    assert_eq!(detail.progress, 100);
}

#[tokio::test]
async fn test_past_event_is_read_only() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    mock.add_event(event("e1", "Offsite", now - Duration::days(7)));
    mock.set_tasks("e1", vec![task("t1", "e1", now - Duration::days(8))]);

    let viewer = identity("u1", "Ada", Role::Admin);
    let api: Arc<dyn EventApi> = mock.clone();
    let mut detail = EventDetail::open(api, "e1", viewer).await.unwrap();
    assert!(!detail.can_mutate());

    detail.toggle_task("t1").await;
    assert_eq!(detail.tasks[0].task.status, TaskStatus::Pending);
    assert!(detail.task_error.is_some());
    assert_eq!(mock.call_count("update_task_status"), 0);

    detail.add_attendee("u2").await;
    assert!(detail.attendee_error.is_some());
    assert_eq!(mock.call_count("add_attendee"), 0);
}

#[tokio::test]
async fn test_removed_attendee_orphans_task_assignment() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    let ada = identity("u1", "Ada", Role::User);
    let bob = identity("u2", "Bob", Role::User);
    mock.add_user(ada.clone());
    mock.add_user(bob.clone());

    let mut ev = event("e1", "Hackathon", now + Duration::days(2));
    ev.attendees = vec![attendee(&ada), attendee(&bob)];
    mock.add_event(ev);

    let mut assigned = task("t1", "e1", now + Duration::days(1));
    assigned.assigned_attendee = Some(attendee(&bob));
    mock.set_tasks("e1", vec![assigned]);

    let admin = identity("u9", "Root", Role::Admin);
    let api: Arc<dyn EventApi> = mock.clone();
    let mut detail = EventDetail::open(api, "e1", admin).await.unwrap();
    assert_eq!(detail.tasks[0].task.assignee_name(), "Bob");

    detail.remove_attendee("u2").await;

    assert!(detail.attendee_error.is_none());
    assert!(!detail.event.has_attendee("u2"));
    // The orphaned assignment renders as N/A instead of crashing
    assert_eq!(detail.tasks[0].task.assignee_name(), "N/A");

    // Bob is offered again once removed
    let all = vec![ada.clone(), bob.clone()];
    let available = detail.available_attendees(&all);
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, "u2");
}

#[tokio::test]
async fn test_available_attendees_is_set_difference() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    let ada = identity("u1", "Ada", Role::User);
    let bob = identity("u2", "Bob", Role::User);
    let eve = identity("u3", "Eve", Role::User);
    mock.add_user(ada.clone());
    mock.add_user(bob.clone());
    mock.add_user(eve.clone());

    let mut ev = event("e1", "Workshop", now + Duration::days(2));
    ev.attendees = vec![attendee(&ada)];
    mock.add_event(ev);

    let admin = identity("u9", "Root", Role::Admin);
    let api: Arc<dyn EventApi> = mock.clone();
    let mut detail = EventDetail::open(api, "e1", admin).await.unwrap();

    let all = vec![ada.clone(), bob.clone(), eve.clone()];
    let available = detail.available_attendees(&all);
    let ids: Vec<&str> = available.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u2", "u3"]);

    detail.add_attendee("u2").await;
    let available = detail.available_attendees(&all);
    let ids: Vec<&str> = available.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u3"]);
}

#[tokio::test]
async fn test_rejected_toggle_reconciles_to_server_value() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    mock.add_event(event("e1", "Summit", now + Duration::days(2)));
    mock.set_tasks("e1", vec![task("t1", "e1", now + Duration::days(1))]);
    mock.fail_task_updates(true);

    let viewer = identity("u1", "Ada", Role::User);
    let api: Arc<dyn EventApi> = mock.clone();
    let mut detail = EventDetail::open(api, "e1", viewer).await.unwrap();

    detail.toggle_task("t1").await;

    // The optimistic Completed never sticks: the authoritative reload
    // restores Pending and the slot leaves its pending-write state
    assert_eq!(detail.tasks[0].task.status, TaskStatus::Pending);
    assert_eq!(detail.tasks[0].write, WriteState::Authoritative);
    assert!(detail.task_error.is_some());
    assert_eq!(mock.call_count("update_task_status"), 1);
    assert_eq!(mock.call_count("event_tasks"), 2); // open + reconcile

    // A later toggle succeeds normally once the server recovers
    mock.fail_task_updates(false);
    detail.toggle_task("t1").await;
    assert_eq!(detail.tasks[0].task.status, TaskStatus::Completed);
    assert!(detail.task_error.is_none());
}

#[tokio::test]
async fn test_role_scoped_tabs_in_detail() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    mock.add_event(event("e1", "Gala", now + Duration::days(2)));

    let api: Arc<dyn EventApi> = mock.clone();
    let mut admin_detail = EventDetail::open(
        Arc::clone(&api),
        "e1",
        identity("u9", "Root", Role::Admin),
    )
    .await
    .unwrap();
    admin_detail.select_tab(Tab::Attendees);
    assert_eq!(admin_detail.tab, Tab::Attendees);

    let mut user_detail = EventDetail::open(api, "e1", identity("u1", "Ada", Role::User))
        .await
        .unwrap();
    // Selecting a tab outside the role's set is a no-op
    user_detail.select_tab(Tab::Attendees);
    assert_eq!(user_detail.tab, Tab::Details);
    user_detail.next_tab();
    assert_eq!(user_detail.tab, Tab::Tasks);
    user_detail.next_tab();
    assert_eq!(user_detail.tab, Tab::Details);
}

#[tokio::test]
async fn test_bootstrap_with_valid_token_restores_session() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    unsafe { std::env::set_var("EVENTDECK_HOME", dir.path()) };

    let persisted = serde_json::json!({
        "token": "tok-1",
        "identity": {"_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "admin"}
    });
    std::fs::write(dir.path().join("session.json"), persisted.to_string()).unwrap();

    let mock = Arc::new(MockApi::new());
    mock.set_me(Some(identity("u1", "Ada", Role::Admin)));

    let api: Arc<dyn EventApi> = mock.clone();
    let mut store = SessionStore::new(api);
    assert!(store.loading());

    store.bootstrap().await;

    assert!(!store.loading());
    assert!(store.is_authenticated());
    assert!(store.is_admin());
    assert_eq!(mock.token(), Some("tok-1".to_string()));
    assert_eq!(mock.call_count("me"), 1);

    unsafe { std::env::remove_var("EVENTDECK_HOME") };
}

#[tokio::test]
async fn test_bootstrap_with_rejected_token_logs_out_silently() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    unsafe { std::env::set_var("EVENTDECK_HOME", dir.path()) };

    let persisted = serde_json::json!({
        "token": "tok-stale",
        "identity": {"_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "admin"}
    });
    let session_file = dir.path().join("session.json");
    std::fs::write(&session_file, persisted.to_string()).unwrap();

    // me() fails: the server no longer honors this token
    let mock = Arc::new(MockApi::new());
    mock.set_me(None);

    let api: Arc<dyn EventApi> = mock.clone();
    let mut store = SessionStore::new(api);
    store.bootstrap().await;

    assert!(!store.loading());
    assert!(!store.is_authenticated());
    assert_eq!(mock.token(), None);
    assert!(!session_file.exists());

    unsafe { std::env::remove_var("EVENTDECK_HOME") };
}

#[tokio::test]
async fn test_login_keeps_canonical_identity_not_login_payload() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    unsafe { std::env::set_var("EVENTDECK_HOME", dir.path()) };

    let mock = Arc::new(MockApi::new());
    // The login payload claims "user"; the canonical record says admin
    mock.set_login(AuthResponse {
        token: "tok-9".to_string(),
        id: "u1".to_string(),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        role: Role::User,
    });
    mock.set_me(Some(identity("u1", "Ada", Role::Admin)));

    let api: Arc<dyn EventApi> = mock.clone();
    let mut store = SessionStore::new(api);
    let who = store.login("ada@example.com", "secret").await.unwrap();

    assert_eq!(who.role, Role::Admin);
    assert!(store.is_admin());
    assert_eq!(mock.token(), Some("tok-9".to_string()));
    assert!(dir.path().join("session.json").exists());

    // Wrong password surfaces as an auth error and installs nothing
    let mut fresh = SessionStore::new(mock.clone() as Arc<dyn EventApi>);
    mock.set_token(None);
    let err = fresh.login("ada@example.com", "wrong").await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(mock.token(), None);

    unsafe { std::env::remove_var("EVENTDECK_HOME") };
}

#[tokio::test]
async fn test_profile_edit_rotates_token_and_recaches_identity() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    unsafe { std::env::set_var("EVENTDECK_HOME", dir.path()) };

    let mock = Arc::new(MockApi::new());
    mock.set_login(AuthResponse {
        token: "tok-9".to_string(),
        id: "u1".to_string(),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        role: Role::Admin,
    });
    mock.set_me(Some(identity("u1", "Ada", Role::Admin)));

    let api: Arc<dyn EventApi> = mock.clone();
    let mut store = SessionStore::new(api);
    store.login("ada@example.com", "secret").await.unwrap();

    let update = ProfileUpdate {
        name: "Ada Lovelace".to_string(),
        password: None,
    };
    let auth = mock.update_profile(&update).await.unwrap();
    store.update_identity(auth.identity(), Some(auth.token.clone()));

    // Cached identity picks up the new name, the rotated token is
    // installed on the gateway, and both are persisted
    assert_eq!(store.identity().unwrap().name, "Ada Lovelace");
    assert_eq!(mock.token(), Some("fresh-token".to_string()));

    let raw = std::fs::read_to_string(dir.path().join("session.json")).unwrap();
    let persisted: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted["token"], "fresh-token");
    assert_eq!(persisted["identity"]["name"], "Ada Lovelace");

    unsafe { std::env::remove_var("EVENTDECK_HOME") };
}

#[tokio::test]
async fn test_admin_creates_task_and_list_reloads() {
    let mock = Arc::new(MockApi::new());
    let now = Utc::now();
    let ada = identity("u1", "Ada", Role::User);
    mock.add_user(ada.clone());

    let mut ev = event("e1", "Hackathon", now + Duration::days(2));
    ev.attendees = vec![attendee(&ada)];
    mock.add_event(ev);

    let admin = identity("u9", "Root", Role::Admin);
    let api: Arc<dyn EventApi> = mock.clone();
    let mut detail = EventDetail::open(api, "e1", admin).await.unwrap();

    let deadline = Utc.with_ymd_and_hms(2026, 12, 1, 9, 0, 0).unwrap();
    detail.create_task("Order pizza", deadline, "u1").await.unwrap();

    assert_eq!(detail.tasks.len(), 1);
    assert_eq!(detail.tasks[0].task.name, "Order pizza");
    assert_eq!(detail.tasks[0].task.assignee_name(), "Ada");
    assert_eq!(detail.progress, 0);

    // Missing required fields are rejected before any request
    let before = mock.call_count("create_task");
    let err = detail.create_task("  ", deadline, "u1").await.unwrap_err();
    assert!(matches!(err, eventdeck::error::ApiError::Validation(_)));
    assert_eq!(mock.call_count("create_task"), before);
}
