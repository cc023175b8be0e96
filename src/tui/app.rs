//! Dashboard shell: top-level screen composition and event loop.
//!
//! Owns which modal is open, which event is selected, and the active
//! filter/sort/search. All data operations are delegated to the session
//! store, API gateway, view model, and detail orchestrator. Exactly one
//! live channel exists per mount and is torn down on exit.
//!
//! The user variant renders no create/edit/delete affordances at all;
//! those keys are not even bound. The admin variant adds event CRUD,
//! user provisioning, the user listing, and free-text search.

use crate::api::{ApiClient, EventApi};
use crate::assist::Assistant;
use crate::config::config;
use crate::detail::{EventDetail, Tab};
use crate::live::{ChannelStatus, LiveChannel, socket_url};
use crate::logging;
use crate::model::{EventInput, Identity, NewUser, ProfileUpdate, Role};
use crate::session::SessionStore;
use crate::view::{CalendarMonth, CollectionView};
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use crossterm::event::{Event as TermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

pub struct TextField {
    pub label: &'static str,
    pub value: String,
    pub masked: bool,
}

impl TextField {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            masked: false,
        }
    }

    fn masked(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            masked: true,
        }
    }

    fn with_value(label: &'static str, value: String) -> Self {
        Self {
            label,
            value,
            masked: false,
        }
    }
}

/// A vertical stack of text fields with one focused. Submit failures set
/// `error` inline; field values are never cleared on error.
pub struct Form {
    pub title: String,
    pub fields: Vec<TextField>,
    pub focus: usize,
    pub error: Option<String>,
}

impl Form {
    fn new(title: &str, fields: Vec<TextField>) -> Self {
        Self {
            title: title.to_string(),
            fields,
            focus: 0,
            error: None,
        }
    }

    pub fn value(&self, idx: usize) -> &str {
        self.fields[idx].value.trim()
    }

    /// Returns true when the key was a submit (Enter on the last field)
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) => {
                self.fields[self.focus].value.push(c);
            }
            KeyCode::Backspace => {
                self.fields[self.focus].value.pop();
            }
            KeyCode::Tab | KeyCode::Down => {
                self.focus = (self.focus + 1) % self.fields.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
            }
            KeyCode::Enter => {
                if self.focus + 1 < self.fields.len() {
                    self.focus += 1;
                } else {
                    return true;
                }
            }
            _ => {}
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Modals
// ---------------------------------------------------------------------------

pub struct DetailState {
    pub detail: Box<EventDetail>,
    pub cursor: usize,
    pub task_form: Option<Form>,
}

#[derive(Default)]
pub enum Modal {
    #[default]
    None,
    EventForm {
        form: Form,
        editing: Option<String>,
    },
    CreateUser {
        form: Form,
    },
    Profile {
        form: Form,
    },
    ConfirmDelete {
        event_id: String,
        name: String,
    },
    Detail(DetailState),
    Assistant {
        assistant: Box<Assistant>,
        input: String,
    },
    Users,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Two renderings of the same derived collection; toggled with `v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Calendar,
}

impl ViewMode {
    pub fn toggled(&self) -> ViewMode {
        match self {
            ViewMode::List => ViewMode::Calendar,
            ViewMode::Calendar => ViewMode::List,
        }
    }
}

pub struct App {
    seam: Arc<dyn EventApi>,
    api_base: String,
    pub session: SessionStore,
    pub view: CollectionView,
    pub users: Vec<Identity>,
    live: Option<LiveChannel>,
    refresh_rx: Option<mpsc::UnboundedReceiver<()>>,
    pub last_refresh: Option<DateTime<Local>>,
    pub modal: Modal,
    pub login_form: Form,
    pub register_mode: bool,
    pub view_mode: ViewMode,
    pub calendar_month: CalendarMonth,
    pub selected: usize,
    pub searching: bool,
    pub status_note: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let api_base = api.base_url().to_string();
        let seam: Arc<dyn EventApi> = api;
        Self {
            session: SessionStore::new(Arc::clone(&seam)),
            seam,
            api_base,
            view: CollectionView::new(),
            users: Vec::new(),
            live: None,
            refresh_rx: None,
            last_refresh: None,
            modal: Modal::None,
            login_form: login_form(),
            register_mode: false,
            view_mode: ViewMode::List,
            calendar_month: CalendarMonth::containing(Utc::now().date_naive()),
            selected: 0,
            searching: false,
            status_note: None,
            should_quit: false,
        }
    }

    pub fn channel_status(&self) -> Option<ChannelStatus> {
        self.live.as_ref().map(|l| l.status())
    }

    pub async fn run(mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
        let backend = ratatui::backend::CrosstermBackend::new(stdout);
        let mut terminal = ratatui::Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    ) -> Result<()> {
        self.session.bootstrap().await;
        if self.session.is_authenticated() {
            self.enter_dashboard().await;
        }

        let mut term_events = EventStream::new();
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        let mut refresh_rx: Option<mpsc::UnboundedReceiver<()>> = None;

        loop {
            // Pick up a channel created by a fresh login
            if let Some(rx) = self.refresh_rx.take() {
                refresh_rx = Some(rx);
            }

            terminal.draw(|f| super::ui::draw(f, self))?;

            tokio::select! {
                maybe_event = term_events.next() => {
                    match maybe_event {
                        Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                            self.handle_key(key).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                signal = recv_or_pending(&mut refresh_rx) => {
                    match signal {
                        Some(()) => self.reload_events().await,
                        None => refresh_rx = None,
                    }
                }
                _ = tick.tick() => {}
            }

            if self.should_quit {
                break;
            }
        }

        self.teardown_live();
        Ok(())
    }

    // -- data loading ------------------------------------------------------

    /// The one loader both the live channel and manual refresh feed.
    /// Concurrent triggers are safe: the last resolved response wins.
    async fn reload_events(&mut self) {
        match self.seam.list_events().await {
            Ok(events) => {
                self.view.set_events(events);
                self.last_refresh = Some(Local::now());
                self.clamp_selection();
            }
            Err(e) => {
                logging::error(&format!("Event reload failed: {}", e));
                self.status_note = Some(e.to_string());
            }
        }
    }

    async fn reload_users(&mut self) {
        if !self.session.is_admin() {
            return;
        }
        match self.seam.list_users().await {
            Ok(users) => self.users = users,
            Err(e) => {
                logging::error(&format!("User reload failed: {}", e));
                self.status_note = Some(e.to_string());
            }
        }
    }

    async fn enter_dashboard(&mut self) {
        self.reload_events().await;
        self.reload_users().await;

        let url = socket_url(&self.api_base);
        let poll = Duration::from_secs(config().live.poll_interval_secs);
        let (live, rx) = LiveChannel::connect(url, poll);
        self.live = Some(live);
        self.refresh_rx = Some(rx);
    }

    fn teardown_live(&mut self) {
        if let Some(live) = self.live.take() {
            live.shutdown();
        }
        self.refresh_rx = None;
    }

    fn clamp_selection(&mut self) {
        let len = self.view.derived().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn selected_event_id(&mut self) -> Option<String> {
        let idx = self.selected;
        self.view.derived().get(idx).map(|e| e.id.clone())
    }

    // -- key routing -------------------------------------------------------

    async fn handle_key(&mut self, key: KeyEvent) {
        if self.session.loading() {
            return;
        }
        if !self.session.is_authenticated() {
            self.handle_login_key(key).await;
            return;
        }

        if !matches!(self.modal, Modal::None) {
            let mut modal = std::mem::take(&mut self.modal);
            let keep = self.handle_modal_key(&mut modal, key).await;
            if keep {
                self.modal = modal;
            }
            return;
        }

        if self.searching {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.searching = false,
                KeyCode::Backspace => {
                    let mut term = self.view.search().to_string();
                    term.pop();
                    self.view.set_search(term);
                    self.clamp_selection();
                }
                KeyCode::Char(c) => {
                    let mut term = self.view.search().to_string();
                    term.push(c);
                    self.view.set_search(term);
                    self.clamp_selection();
                }
                _ => {}
            }
            return;
        }

        let admin = self.session.is_admin();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => {
                self.reload_events().await;
                self.reload_users().await;
            }
            KeyCode::Char('f') => {
                let next = self.view.filter().next();
                self.view.set_filter(next);
                self.clamp_selection();
            }
            KeyCode::Char('s') => {
                let next = self.view.sort().toggled();
                self.view.set_sort(next);
            }
            KeyCode::Char('v') => {
                self.view_mode = self.view_mode.toggled();
                if self.view_mode == ViewMode::Calendar {
                    self.calendar_month = CalendarMonth::containing(Utc::now().date_naive());
                }
            }
            KeyCode::Char('[') if self.view_mode == ViewMode::Calendar => {
                self.calendar_month = self.calendar_month.prev();
            }
            KeyCode::Char(']') if self.view_mode == ViewMode::Calendar => {
                self.calendar_month = self.calendar_month.next();
            }
            KeyCode::Char('/') if admin => {
                self.searching = true;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected += 1;
                self.clamp_selection();
            }
            KeyCode::Enter if self.view_mode == ViewMode::List => self.open_detail().await,
            KeyCode::Char('n') if admin => {
                self.modal = Modal::EventForm {
                    form: event_form(None),
                    editing: None,
                };
            }
            KeyCode::Char('e') if admin => {
                if let Some(id) = self.selected_event_id() {
                    let event = self.view.events().iter().find(|e| e.id == id).cloned();
                    if let Some(event) = event {
                        self.modal = Modal::EventForm {
                            form: event_form(Some(&event)),
                            editing: Some(id),
                        };
                    }
                }
            }
            KeyCode::Char('d') if admin => {
                if let Some(id) = self.selected_event_id() {
                    let name = self
                        .view
                        .events()
                        .iter()
                        .find(|e| e.id == id)
                        .map(|e| e.name.clone())
                        .unwrap_or_default();
                    self.modal = Modal::ConfirmDelete {
                        event_id: id,
                        name,
                    };
                }
            }
            KeyCode::Char('u') if admin => {
                self.reload_users().await;
                self.modal = Modal::Users;
            }
            KeyCode::Char('c') if admin => {
                self.modal = Modal::CreateUser { form: user_form() };
            }
            KeyCode::Char('a') => {
                let assistant =
                    Assistant::new(Arc::clone(&self.seam), config().assistant.clone());
                self.modal = Modal::Assistant {
                    assistant: Box::new(assistant),
                    input: String::new(),
                };
            }
            KeyCode::Char('p') => {
                let name = self
                    .session
                    .identity()
                    .map(|i| i.name.clone())
                    .unwrap_or_default();
                self.modal = Modal::Profile {
                    form: profile_form(name),
                };
            }
            KeyCode::Char('l') => {
                self.teardown_live();
                self.session.logout();
                self.view = CollectionView::new();
                self.users.clear();
                self.login_form = login_form();
            }
            _ => {}
        }
    }

    async fn open_detail(&mut self) {
        let Some(id) = self.selected_event_id() else {
            return;
        };
        let Some(viewer) = self.session.identity().cloned() else {
            return;
        };
        match EventDetail::open(Arc::clone(&self.seam), &id, viewer).await {
            Ok(detail) => {
                self.modal = Modal::Detail(DetailState {
                    detail: Box::new(detail),
                    cursor: 0,
                    task_form: None,
                });
            }
            Err(e) => self.status_note = Some(e.to_string()),
        }
    }

    // -- login screen ------------------------------------------------------

    async fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::F(2) => {
                self.register_mode = !self.register_mode;
                self.login_form = if self.register_mode {
                    register_form()
                } else {
                    login_form()
                };
            }
            _ => {
                if self.login_form.handle_key(key) {
                    self.submit_login().await;
                }
            }
        }
    }

    async fn submit_login(&mut self) {
        let result = if self.register_mode {
            let name = self.login_form.value(0).to_string();
            let email = self.login_form.value(1).to_string();
            let password = self.login_form.fields[2].value.clone();
            if name.is_empty() || email.is_empty() || password.is_empty() {
                self.login_form.error = Some("All fields are required".to_string());
                return;
            }
            self.session
                .register(&name, &email, &password, Role::User)
                .await
        } else {
            let email = self.login_form.value(0).to_string();
            let password = self.login_form.fields[1].value.clone();
            if email.is_empty() || password.is_empty() {
                self.login_form.error = Some("Email and password are required".to_string());
                return;
            }
            self.session.login(&email, &password).await
        };

        match result {
            Ok(identity) => {
                logging::info(&format!("Signed in as {}", identity.email));
                self.enter_dashboard().await;
            }
            // Inline on the form; the typed values stay put
            Err(e) => self.login_form.error = Some(e.to_string()),
        }
    }

    // -- modal handling ----------------------------------------------------

    /// Returns false when the modal should close
    async fn handle_modal_key(&mut self, modal: &mut Modal, key: KeyEvent) -> bool {
        match modal {
            Modal::None => false,
            Modal::Users => !matches!(key.code, KeyCode::Esc | KeyCode::Char('q')),
            Modal::ConfirmDelete { event_id, .. } => match key.code {
                KeyCode::Char('y') => {
                    let id = event_id.clone();
                    if let Err(e) = self.seam.delete_event(&id).await {
                        self.status_note = Some(e.to_string());
                    } else {
                        self.reload_events().await;
                    }
                    false
                }
                KeyCode::Char('n') | KeyCode::Esc => false,
                _ => true,
            },
            Modal::EventForm { form, editing } => {
                if key.code == KeyCode::Esc {
                    return false;
                }
                if form.handle_key(key) {
                    return self.submit_event_form(form, editing.clone()).await;
                }
                true
            }
            Modal::CreateUser { form } => {
                if key.code == KeyCode::Esc {
                    return false;
                }
                if form.handle_key(key) {
                    return self.submit_user_form(form).await;
                }
                true
            }
            Modal::Profile { form } => {
                if key.code == KeyCode::Esc {
                    return false;
                }
                if form.handle_key(key) {
                    return self.submit_profile_form(form).await;
                }
                true
            }
            Modal::Detail(state) => self.handle_detail_key(state, key).await,
            Modal::Assistant { assistant, input } => match key.code {
                KeyCode::Esc => false,
                KeyCode::Enter => {
                    let text = std::mem::take(input);
                    let events = self.view.events().to_vec();
                    assistant.send(&text, &events).await;
                    true
                }
                KeyCode::Char('y') if ctrl(key) => {
                    if assistant.confirm_draft().await.is_ok() {
                        self.reload_events().await;
                    }
                    true
                }
                KeyCode::Char('d') if ctrl(key) => {
                    assistant.discard_draft();
                    true
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    true
                }
                KeyCode::Backspace => {
                    input.pop();
                    true
                }
                _ => true,
            },
        }
    }

    async fn submit_event_form(&mut self, form: &mut Form, editing: Option<String>) -> bool {
        let name = form.value(0).to_string();
        let description = form.value(1).to_string();
        let location = form.value(2).to_string();
        let date_str = form.value(3).to_string();

        if name.is_empty() || location.is_empty() {
            form.error = Some("Name and location are required".to_string());
            return true;
        }
        let date = match NaiveDateTime::parse_from_str(&date_str, "%Y-%m-%d %H:%M") {
            Ok(naive) => Utc.from_utc_datetime(&naive),
            Err(_) => {
                form.error = Some("Date must be YYYY-MM-DD HH:MM".to_string());
                return true;
            }
        };

        let input = EventInput {
            name,
            description,
            location,
            date,
        };
        let result = match editing {
            Some(id) => self.seam.update_event(&id, &input).await.map(|_| ()),
            None => self.seam.create_event(&input).await.map(|_| ()),
        };
        match result {
            Ok(()) => {
                self.reload_events().await;
                false
            }
            Err(e) => {
                // Keep the form and its values; surface the failure inline
                form.error = Some(e.to_string());
                true
            }
        }
    }

    async fn submit_user_form(&mut self, form: &mut Form) -> bool {
        let name = form.value(0).to_string();
        let email = form.value(1).to_string();
        let password = form.fields[2].value.clone();
        let role = match form.value(3) {
            "admin" => Role::Admin,
            "user" | "" => Role::User,
            other => {
                form.error = Some(format!("Unknown role \"{}\" (user or admin)", other));
                return true;
            }
        };
        if name.is_empty() || email.is_empty() || password.is_empty() {
            form.error = Some("Name, email, and password are required".to_string());
            return true;
        }

        let user = NewUser {
            name,
            email,
            password,
            role,
        };
        match self.seam.create_user(&user).await {
            Ok(_) => {
                self.reload_users().await;
                false
            }
            Err(e) => {
                form.error = Some(e.to_string());
                true
            }
        }
    }

    async fn submit_profile_form(&mut self, form: &mut Form) -> bool {
        let name = form.value(0).to_string();
        let password = form.fields[1].value.clone();
        if name.is_empty() {
            form.error = Some("Name is required".to_string());
            return true;
        }

        let update = ProfileUpdate {
            name,
            password: if password.is_empty() {
                None
            } else {
                Some(password)
            },
        };
        match self.seam.update_profile(&update).await {
            Ok(auth) => {
                // Profile responses carry the identity plus a fresh token
                let token = auth.token.clone();
                self.session.update_identity(auth.identity(), Some(token));
                false
            }
            Err(e) => {
                form.error = Some(e.to_string());
                true
            }
        }
    }

    async fn handle_detail_key(&mut self, state: &mut DetailState, key: KeyEvent) -> bool {
        // An open add-task form captures input first
        if let Some(form) = &mut state.task_form {
            if key.code == KeyCode::Esc {
                state.task_form = None;
                return true;
            }
            if form.handle_key(key) {
                let name = form.value(0).to_string();
                let deadline_str = form.value(1).to_string();
                let assignee_email = form.value(2).to_string();

                let deadline = match NaiveDateTime::parse_from_str(&deadline_str, "%Y-%m-%d %H:%M")
                {
                    Ok(naive) => Utc.from_utc_datetime(&naive),
                    Err(_) => {
                        form.error = Some("Deadline must be YYYY-MM-DD HH:MM".to_string());
                        return true;
                    }
                };
                let Some(assignee) = state
                    .detail
                    .event
                    .attendees
                    .iter()
                    .find(|a| a.email.eq_ignore_ascii_case(&assignee_email))
                    .map(|a| a.id.clone())
                else {
                    form.error = Some("No attendee with that email".to_string());
                    return true;
                };

                match state.detail.create_task(&name, deadline, &assignee).await {
                    Ok(()) => state.task_form = None,
                    Err(e) => form.error = Some(e.to_string()),
                }
            }
            return true;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return false,
            KeyCode::Tab => {
                state.detail.next_tab();
                state.cursor = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.cursor = state.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = match state.detail.tab {
                    Tab::Tasks => state.detail.tasks.len(),
                    Tab::Attendees => self.users.len(),
                    Tab::Details => 0,
                };
                if state.cursor + 1 < len {
                    state.cursor += 1;
                }
            }
            KeyCode::Char(' ') if state.detail.tab == Tab::Tasks => {
                if let Some(slot) = state.detail.tasks.get(state.cursor) {
                    let id = slot.task.id.clone();
                    state.detail.toggle_task(&id).await;
                }
            }
            KeyCode::Char('n')
                if state.detail.tab == Tab::Tasks && state.detail.view == crate::detail::RoleView::Admin =>
            {
                state.task_form = Some(task_form());
            }
            KeyCode::Enter if state.detail.tab == Tab::Attendees => {
                // The attendee roster lists every user: Enter removes an
                // attending user, adds a non-attending one
                if let Some(user) = self.users.get(state.cursor) {
                    let user_id = user.id.clone();
                    if state.detail.event.has_attendee(&user_id) {
                        state.detail.remove_attendee(&user_id).await;
                    } else {
                        state.detail.add_attendee(&user_id).await;
                    }
                }
            }
            _ => {}
        }
        true
    }
}

fn ctrl(key: KeyEvent) -> bool {
    key.modifiers
        .contains(crossterm::event::KeyModifiers::CONTROL)
}

async fn recv_or_pending(rx: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Form constructors
// ---------------------------------------------------------------------------

fn login_form() -> Form {
    Form::new(
        "Sign in",
        vec![TextField::new("Email"), TextField::masked("Password")],
    )
}

fn register_form() -> Form {
    Form::new(
        "Register",
        vec![
            TextField::new("Name"),
            TextField::new("Email"),
            TextField::masked("Password"),
        ],
    )
}

fn event_form(event: Option<&crate::model::Event>) -> Form {
    match event {
        Some(e) => Form::new(
            "Edit event",
            vec![
                TextField::with_value("Name", e.name.clone()),
                TextField::with_value("Description", e.description.clone().unwrap_or_default()),
                TextField::with_value("Location", e.location.clone()),
                TextField::with_value("Date", e.date.format("%Y-%m-%d %H:%M").to_string()),
            ],
        ),
        None => Form::new(
            "Create event",
            vec![
                TextField::new("Name"),
                TextField::new("Description"),
                TextField::new("Location"),
                TextField::new("Date (YYYY-MM-DD HH:MM)"),
            ],
        ),
    }
}

fn user_form() -> Form {
    Form::new(
        "Create user",
        vec![
            TextField::new("Name"),
            TextField::new("Email"),
            TextField::masked("Password"),
            TextField::new("Role (user/admin)"),
        ],
    )
}

fn profile_form(name: String) -> Form {
    Form::new(
        "Edit profile",
        vec![
            TextField::with_value("Name", name),
            TextField::masked("New password (blank keeps current)"),
        ],
    )
}

fn task_form() -> Form {
    Form::new(
        "Add task",
        vec![
            TextField::new("Name"),
            TextField::new("Deadline (YYYY-MM-DD HH:MM)"),
            TextField::new("Assignee email"),
        ],
    )
}
