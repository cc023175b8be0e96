//! Frame rendering for the dashboard shell.
//!
//! Pure presentation: everything here reads app state and draws; no data
//! operation is ever issued from the render path.

use super::app::{App, DetailState, Form, Modal, ViewMode};
use crate::assist::{ChatRole, Severity};
use crate::detail::{Tab, WriteState};
use crate::live::ChannelStatus;
use crate::model::TaskStatus;
use chrono::{Datelike, Utc};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Clear, Gauge, Paragraph, Row, Table, TableState, Tabs, Wrap,
};

pub fn draw(frame: &mut Frame, app: &mut App) {
    if app.session.loading() {
        // Bootstrap in flight: hold the screen instead of flashing the
        // login form at a user who is actually signed in
        let msg = Paragraph::new("Checking session…")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("eventdeck"));
        frame.render_widget(msg, centered_rect(40, 20, frame.area()));
        return;
    }

    if !app.session.is_authenticated() {
        draw_login(frame, app);
        return;
    }

    draw_dashboard(frame, app);

    // Modal overlays
    match &app.modal {
        Modal::None => {}
        Modal::EventForm { form, .. } => draw_form(frame, form, 50, 50),
        Modal::CreateUser { form } => draw_form(frame, form, 50, 50),
        Modal::Profile { form } => draw_form(frame, form, 50, 40),
        Modal::ConfirmDelete { name, .. } => draw_confirm(frame, name),
        Modal::Users => draw_users(frame, &app.users),
        Modal::Detail(state) => draw_detail(frame, state, &app.users),
        Modal::Assistant { assistant, input } => draw_assistant(frame, assistant, input),
    }
}

fn draw_login(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 50, frame.area());
    frame.render_widget(Clear, area);

    let title = if app.register_mode {
        "eventdeck — register (F2: sign in)"
    } else {
        "eventdeck — sign in (F2: register)"
    };
    let mut lines = form_lines(&app.login_form);
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "Enter: submit   Esc: quit",
        Style::default().fg(Color::DarkGray),
    ));

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_dashboard(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    // Header: who, channel mode, last refresh, view parameters
    let identity = app.session.identity();
    let who = identity
        .map(|i| format!("{} ({})", i.name, i.role.as_str()))
        .unwrap_or_default();
    let channel = app
        .channel_status()
        .map(|s| s.label())
        .unwrap_or("starting");
    let channel_style = match app.channel_status() {
        Some(ChannelStatus::Connected) => Style::default().fg(Color::Green),
        Some(ChannelStatus::Connecting) | None => Style::default().fg(Color::DarkGray),
        // Degraded modes must look different from live
        Some(ChannelStatus::ConnectError) => Style::default().fg(Color::Yellow),
        Some(ChannelStatus::Disconnected) => Style::default().fg(Color::Red),
    };
    let refreshed = app
        .last_refresh
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "—".to_string());

    let header_line = Line::from(vec![
        Span::styled("eventdeck  ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(who),
        Span::raw("   updates: "),
        Span::styled(channel, channel_style),
        Span::raw(format!("   refreshed: {}", refreshed)),
    ]);
    let filter_line = Line::from(vec![
        Span::raw(format!(
            "filter: {}   sort: {}",
            app.view.filter().label(),
            app.view.sort().label()
        )),
        Span::raw(if app.session.is_admin() {
            format!(
                "   search: {}{}",
                app.view.search(),
                if app.searching { "▏" } else { "" }
            )
        } else {
            String::new()
        }),
    ]);
    let header = Paragraph::new(vec![header_line, filter_line])
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.view_mode {
        ViewMode::List => draw_event_table(frame, app, chunks[1]),
        ViewMode::Calendar => draw_calendar(frame, app, chunks[1]),
    }

    // Footer: role-scoped keybinds. The user variant simply has no
    // create/edit/delete bindings to show.
    let view_keys = match app.view_mode {
        ViewMode::List => "v:calendar",
        ViewMode::Calendar => "v:list  [:prev month  ]:next month",
    };
    let keys = if app.session.is_admin() {
        format!(
            "enter:open  n:new  e:edit  d:delete  c:user  u:users  /:search  f:filter  s:sort  {}  a:assistant  r:refresh  p:profile  l:logout  q:quit",
            view_keys
        )
    } else {
        format!(
            "enter:open  f:filter  s:sort  {}  a:assistant  r:refresh  p:profile  l:logout  q:quit",
            view_keys
        )
    };
    let footer = match &app.status_note {
        Some(note) => Line::styled(note.clone(), Style::default().fg(Color::Red)),
        None => Line::styled(keys, Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(Paragraph::new(footer), chunks[2]);
}

fn draw_event_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let now = Utc::now();
    let selected = app.selected;
    let events = app.view.derived();
    let rows: Vec<Row> = events
        .iter()
        .map(|e| {
            let status = if e.is_upcoming(now) {
                Span::styled("upcoming", Style::default().fg(Color::Green))
            } else {
                Span::styled("past", Style::default().fg(Color::DarkGray))
            };
            Row::new(vec![
                Line::raw(e.name.clone()),
                Line::raw(e.date.format("%Y-%m-%d %H:%M").to_string()),
                Line::raw(e.location.clone()),
                Line::raw(e.attendees.len().to_string()),
                Line::from(status),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(35),
            Constraint::Length(17),
            Constraint::Percentage(25),
            Constraint::Length(9),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["Name", "Date", "Location", "Attending", "Status"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .row_highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
    .block(Block::default().borders(Borders::NONE));

    let mut state = TableState::default();
    if !events.is_empty() {
        state.select(Some(selected.min(events.len() - 1)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

/// Month grid over the same derived collection the table shows; days
/// carry their event count and the month's events list below.
fn draw_calendar(frame: &mut Frame, app: &mut App, area: Rect) {
    let month = app.calendar_month;
    let today = Utc::now().date_naive();
    let events = app.view.derived();
    let weeks = crate::view::month_weeks(month);

    let header: String = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
        .iter()
        .map(|d| format!("  {:<6}", d))
        .collect();
    let mut lines = vec![
        Line::styled(
            month.label(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::styled(header, Style::default().fg(Color::DarkGray)),
    ];

    for week in &weeks {
        let mut spans = Vec::new();
        for cell in week {
            match cell {
                Some(day) => {
                    let count = crate::view::events_on(events, *day).len();
                    let text = if count > 0 {
                        format!("  {:>2} ({})", day.day(), count)
                    } else {
                        format!("  {:>2}    ", day.day())
                    };
                    let style = if *day == today {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    } else if count > 0 {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default()
                    };
                    spans.push(Span::styled(text, style));
                }
                None => spans.push(Span::raw("        ")),
            }
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::raw(""));
    let mut in_month: Vec<_> = events
        .iter()
        .filter(|e| month.contains(e.date.date_naive()))
        .collect();
    in_month.sort_by_key(|e| e.date);
    if in_month.is_empty() {
        lines.push(Line::styled(
            "No events this month",
            Style::default().fg(Color::DarkGray),
        ));
    }
    for e in in_month {
        lines.push(Line::raw(format!(
            "  {}  {} at {}",
            e.date.format("%d %H:%M"),
            e.name,
            e.location
        )));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_form(frame: &mut Frame, form: &Form, pct_x: u16, pct_y: u16) {
    let area = centered_rect(pct_x, pct_y, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = form_lines(form);
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "Enter on last field: save   Esc: cancel",
        Style::default().fg(Color::DarkGray),
    ));

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(form.title.clone()),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn form_lines(form: &Form) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, field) in form.fields.iter().enumerate() {
        let marker = if i == form.focus { "> " } else { "  " };
        let shown = if field.masked {
            "•".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        let style = if i == form.focus {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::styled(
            format!("{}{}: {}", marker, field.label, shown),
            style,
        ));
    }
    if let Some(error) = &form.error {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        ));
    }
    lines
}

fn draw_confirm(frame: &mut Frame, name: &str) {
    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);
    let widget = Paragraph::new(vec![
        Line::raw(format!("Delete \"{}\"?", name)),
        Line::raw(""),
        Line::styled("y: delete   n/Esc: cancel", Style::default().fg(Color::DarkGray)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Confirm"))
    .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_users(frame: &mut Frame, users: &[crate::model::Identity]) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let rows: Vec<Row> = users
        .iter()
        .map(|u| {
            Row::new(vec![
                u.name.clone(),
                u.email.clone(),
                u.role.as_str().to_string(),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(35),
            Constraint::Percentage(45),
            Constraint::Percentage(20),
        ],
    )
    .header(
        Row::new(vec!["Name", "Email", "Role"]).style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("Users (Esc: close)"));
    frame.render_widget(table, area);
}

fn draw_detail(frame: &mut Frame, state: &DetailState, users: &[crate::model::Identity]) {
    let area = centered_rect(80, 80, frame.area());
    frame.render_widget(Clear, area);

    let detail = &state.detail;
    let title = format!(
        "{} — {}{}",
        detail.event.name,
        detail.event.date.format("%Y-%m-%d %H:%M"),
        if detail.upcoming { "" } else { "  [ended: read-only]" }
    );
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let tabs = detail.view.tabs();
    let titles: Vec<&str> = tabs.iter().map(|t| t.title()).collect();
    let selected = tabs.iter().position(|t| *t == detail.tab).unwrap_or(0);
    frame.render_widget(
        Tabs::new(titles)
            .select(selected)
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    match detail.tab {
        Tab::Details => draw_detail_details(frame, state, chunks[1]),
        Tab::Attendees => draw_detail_attendees(frame, state, users, chunks[1]),
        Tab::Tasks => draw_detail_tasks(frame, state, chunks[1]),
    }
}

fn draw_detail_details(frame: &mut Frame, state: &DetailState, area: Rect) {
    let detail = &state.detail;
    let mut lines = vec![
        Line::raw(format!("Location: {}", detail.event.location)),
        Line::raw(format!(
            "Description: {}",
            detail
                .event
                .description
                .as_deref()
                .unwrap_or("No description provided")
        )),
        Line::raw(""),
        Line::raw(format!("Attendees ({}):", detail.event.attendees.len())),
    ];
    for a in &detail.event.attendees {
        lines.push(Line::raw(format!("  {} <{}>", a.name, a.email)));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_detail_attendees(
    frame: &mut Frame,
    state: &DetailState,
    users: &[crate::model::Identity],
    area: Rect,
) {
    let detail = &state.detail;
    let mut lines = Vec::new();
    if let Some(error) = &detail.attendee_error {
        lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }
    for (i, user) in users.iter().enumerate() {
        let marker = if i == state.cursor { "> " } else { "  " };
        let attending = detail.event.has_attendee(&user.id);
        let action = if attending { "[attending — Enter removes]" } else { "[Enter adds]" };
        let style = if attending {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        lines.push(Line::styled(
            format!("{}{} <{}> {}", marker, user.name, user.email, action),
            style,
        ));
    }
    if users.is_empty() {
        lines.push(Line::raw("No users available"));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_detail_tasks(frame: &mut Frame, state: &DetailState, area: Rect) {
    let detail = &state.detail;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(area);

    let gauge = Gauge::default()
        .ratio(f64::from(detail.progress).min(100.0) / 100.0)
        .label(format!("progress {}%", detail.progress))
        .gauge_style(Style::default().fg(Color::Cyan));
    frame.render_widget(gauge, chunks[0]);

    if let Some(form) = &state.task_form {
        draw_form(frame, form, 50, 40);
        return;
    }

    let mut lines = Vec::new();
    if let Some(error) = &detail.task_error {
        lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }
    for (i, slot) in detail.tasks.iter().enumerate() {
        let marker = if i == state.cursor { "> " } else { "  " };
        let check = match slot.task.status {
            TaskStatus::Completed => "[x]",
            TaskStatus::Pending => "[ ]",
        };
        let pending_write = match slot.write {
            WriteState::Authoritative => "",
            WriteState::Optimistic { .. } => " (saving…)",
            WriteState::Reconciling => " (reverting…)",
        };
        lines.push(Line::raw(format!(
            "{}{} {} — due {} — {}{}",
            marker,
            check,
            slot.task.name,
            slot.task.deadline.format("%Y-%m-%d %H:%M"),
            slot.task.assignee_name(),
            pending_write,
        )));
    }
    if detail.tasks.is_empty() {
        lines.push(Line::raw("No tasks yet"));
    }
    lines.push(Line::raw(""));
    let hint = match detail.view {
        crate::detail::RoleView::Admin => "space:toggle  n:add task  tab:switch  Esc:close",
        crate::detail::RoleView::User => "space:toggle  tab:switch  Esc:close",
    };
    lines.push(Line::styled(hint, Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[1]);
}

fn draw_assistant(frame: &mut Frame, assistant: &crate::assist::Assistant, input: &str) {
    let area = centered_rect(70, 80, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Assistant (Esc: close)");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(inner);

    let mut lines = Vec::new();
    for msg in &assistant.messages {
        let (prefix, style) = match (msg.role, msg.severity) {
            (ChatRole::User, _) => ("you: ", Style::default().fg(Color::Cyan)),
            (ChatRole::Assistant, Some(Severity::Error)) => {
                ("bot: ", Style::default().fg(Color::Red))
            }
            (ChatRole::Assistant, _) => ("bot: ", Style::default()),
        };
        for (i, part) in msg.content.lines().enumerate() {
            let head = if i == 0 { prefix } else { "     " };
            lines.push(Line::styled(format!("{}{}", head, part), style));
        }
    }
    if let Some(draft) = &assistant.draft {
        lines.push(Line::raw(""));
        lines.push(Line::styled(
            format!(
                "Draft: {} @ {} on {}   (ctrl+y: create, ctrl+d: discard)",
                draft.name, draft.location, draft.date
            ),
            Style::default().fg(Color::Yellow),
        ));
    }

    // Keep the tail visible
    let visible = chunks[0].height as usize;
    let skip = lines.len().saturating_sub(visible);
    let tail: Vec<Line> = lines.into_iter().skip(skip).collect();
    frame.render_widget(Paragraph::new(tail).wrap(Wrap { trim: false }), chunks[0]);

    let busy = if assistant.is_busy() { " (thinking…)" } else { "" };
    let input_widget = Paragraph::new(format!("{}▏", input)).block(
        Block::default()
            .borders(Borders::TOP)
            .title(format!("message{}", busy)),
    );
    frame.render_widget(input_widget, chunks[1]);
}

/// Centered sub-rectangle by percentage of the parent
fn centered_rect(pct_x: u16, pct_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - pct_y) / 2),
            Constraint::Percentage(pct_y),
            Constraint::Percentage((100 - pct_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - pct_x) / 2),
            Constraint::Percentage(pct_x),
            Constraint::Percentage((100 - pct_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
