//! Collection view model: pure derivation of the displayed event list.
//!
//! Filter, sort, and search fully determine the output for a given raw
//! collection; `derive_view` is side-effect-free and order-stable.
//! `CollectionView` wraps it with the memoization contract: recompute
//! only when the collection or one of the three parameters changes.

use crate::model::Event;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Upcoming,
    Completed,
}

impl EventFilter {
    pub fn label(&self) -> &'static str {
        match self {
            EventFilter::All => "all",
            EventFilter::Upcoming => "upcoming",
            EventFilter::Completed => "completed",
        }
    }

    pub fn next(&self) -> EventFilter {
        match self {
            EventFilter::All => EventFilter::Upcoming,
            EventFilter::Upcoming => EventFilter::Completed,
            EventFilter::Completed => EventFilter::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
        }
    }

    pub fn toggled(&self) -> SortOrder {
        match self {
            SortOrder::Newest => SortOrder::Oldest,
            SortOrder::Oldest => SortOrder::Newest,
        }
    }
}

/// Filter by status, stable-sort by date, then free-text search.
///
/// "upcoming" means `date > now` at evaluation time and "completed" is
/// the complement, so the two filters partition the collection. Equal
/// dates keep their original collection order. A blank search term is a
/// no-op; matching is a case-insensitive substring test against name,
/// description, and location.
pub fn derive_view(
    events: &[Event],
    filter: EventFilter,
    sort: SortOrder,
    search: &str,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let mut selected: Vec<&Event> = events
        .iter()
        .filter(|e| match filter {
            EventFilter::All => true,
            EventFilter::Upcoming => e.is_upcoming(now),
            EventFilter::Completed => !e.is_upcoming(now),
        })
        .collect();

    // Vec::sort_by is stable: ties keep collection order
    match sort {
        SortOrder::Newest => selected.sort_by(|a, b| b.date.cmp(&a.date)),
        SortOrder::Oldest => selected.sort_by(|a, b| a.date.cmp(&b.date)),
    }

    let term = search.trim().to_lowercase();
    if !term.is_empty() {
        selected.retain(|e| {
            e.name.to_lowercase().contains(&term)
                || e.location.to_lowercase().contains(&term)
                || e.description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&term))
                    .unwrap_or(false)
        });
    }

    selected.into_iter().cloned().collect()
}

/// Owns the raw collection plus the three view parameters and caches the
/// derived list until one of them changes.
#[derive(Default)]
pub struct CollectionView {
    events: Vec<Event>,
    revision: u64,
    filter: EventFilter,
    sort: SortOrder,
    search: String,
    cached: Option<Cached>,
    recompute_count: u64,
}

struct Cached {
    revision: u64,
    filter: EventFilter,
    sort: SortOrder,
    search: String,
    derived: Vec<Event>,
}

impl CollectionView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw collection (initial fetch or live-channel refresh)
    pub fn set_events(&mut self, events: Vec<Event>) {
        self.events = events;
        self.revision += 1;
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    pub fn set_search(&mut self, search: String) {
        self.search = search;
    }

    /// The derived list, recomputed only when an input changed since the
    /// last call. "Now" is snapshotted at recompute time, matching the
    /// derivation inputs rather than the wall clock of every render.
    pub fn derived(&mut self) -> &[Event] {
        let fresh = match &self.cached {
            Some(c) => {
                c.revision == self.revision
                    && c.filter == self.filter
                    && c.sort == self.sort
                    && c.search == self.search
            }
            None => false,
        };

        if !fresh {
            let derived = derive_view(
                &self.events,
                self.filter,
                self.sort,
                &self.search,
                Utc::now(),
            );
            self.recompute_count += 1;
            self.cached = Some(Cached {
                revision: self.revision,
                filter: self.filter,
                sort: self.sort,
                search: self.search.clone(),
                derived,
            });
        }

        &self.cached.as_ref().unwrap().derived
    }

    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }
}

// ---------------------------------------------------------------------------
// Calendar derivation
// ---------------------------------------------------------------------------

/// One visible month of the calendar view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// "August 2026"
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }
}

/// The month laid out as Sunday-first weeks; leading and trailing cells
/// outside the month are None.
pub fn month_weeks(month: CalendarMonth) -> Vec<[Option<NaiveDate>; 7]> {
    let first = month.first_day();
    let days = month
        .next()
        .first_day()
        .signed_duration_since(first)
        .num_days() as u32;

    let mut weeks = Vec::new();
    let mut week = [None; 7];
    let mut slot = first.weekday().num_days_from_sunday() as usize;
    for day in 1..=days {
        week[slot] = first.with_day(day);
        slot += 1;
        if slot == 7 {
            weeks.push(week);
            week = [None; 7];
            slot = 0;
        }
    }
    if slot > 0 {
        weeks.push(week);
    }
    weeks
}

/// Events whose date falls on the given calendar day
pub fn events_on<'a>(events: &'a [Event], day: NaiveDate) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|e| e.date.date_naive() == day)
        .collect()
}
