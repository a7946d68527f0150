use crate::domain::models::{Session, SessionType, TimerSettings};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Issued by [`FocusScheduler::request_start`]; carries the duration snapshot
/// and the generation the eventual session must match to be activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub ticket: u64,
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub discarded: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ignored,
    Counting { remaining_seconds: u32 },
    Completed(Completion),
}

/// A finished session plus, when the progression rule proposes one, the start
/// request for the follow-up break. The request is issued while the scheduler
/// is still borrowed, so any later start or stop supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub session: Session,
    pub next: Option<StartRequest>,
}

impl Completion {
    pub fn next_type(&self) -> Option<SessionType> {
        self.next.as_ref().map(|request| request.session_type)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSnapshot {
    pub active_session: Option<Session>,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub completed_focus_count: u32,
    pub focus_sessions_started: u32,
    pub target_focus_sessions: u32,
}

#[derive(Debug, Clone)]
pub struct FocusScheduler {
    settings: TimerSettings,
    active_session: Option<Session>,
    remaining_seconds: u32,
    is_running: bool,
    completed_focus_count: u32,
    focus_sessions_started: u32,
    generation: u64,
}

impl FocusScheduler {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            active_session: None,
            remaining_seconds: 0,
            is_running: false,
            completed_focus_count: 0,
            focus_sessions_started: 0,
            generation: 0,
        }
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Durations are snapshotted at start, so a running session keeps its length.
    pub fn update_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active_session.as_ref()
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session.as_ref().map(|session| session.id.as_str())
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.completed_focus_count
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            active_session: self.active_session.clone(),
            remaining_seconds: self.remaining_seconds,
            is_running: self.is_running,
            completed_focus_count: self.completed_focus_count,
            focus_sessions_started: self.focus_sessions_started,
            target_focus_sessions: self.settings.target_focus_sessions,
        }
    }

    /// First half of `start(type)`: discards any active session and snapshots
    /// the duration. The session itself is supplied later via [`Self::activate`].
    pub fn request_start(&mut self, session_type: SessionType) -> StartRequest {
        let discarded = self.discard_active();
        self.generation = self.generation.wrapping_add(1);
        if session_type == SessionType::Focus {
            self.focus_sessions_started = self.focus_sessions_started.saturating_add(1);
        }
        StartRequest {
            ticket: self.generation,
            session_type,
            duration_minutes: self.settings.duration_for(session_type),
            discarded,
        }
    }

    /// Returns false when the request was superseded by a stop or a newer start.
    pub fn activate(&mut self, request: &StartRequest, mut session: Session) -> bool {
        if request.ticket != self.generation || self.active_session.is_some() {
            return false;
        }
        session.session_type = request.session_type;
        session.duration_minutes = request.duration_minutes;
        session.completed = false;
        session.completed_at = None;

        self.remaining_seconds = session.total_seconds();
        self.is_running = self.remaining_seconds > 0;
        self.active_session = Some(session);
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.is_running {
            return false;
        }
        self.is_running = false;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.active_session.is_none() || self.is_running {
            return false;
        }
        self.is_running = true;
        true
    }

    /// Discards the active session without counting it. Also invalidates any
    /// start still waiting for its session.
    pub fn stop(&mut self) -> Option<Session> {
        self.generation = self.generation.wrapping_add(1);
        self.discard_active()
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.is_running || self.active_session.is_none() {
            return TickOutcome::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return TickOutcome::Counting {
                remaining_seconds: self.remaining_seconds,
            };
        }

        match self.on_session_complete(now) {
            Some(completion) => TickOutcome::Completed(completion),
            None => TickOutcome::Ignored,
        }
    }

    pub fn reset_counters(&mut self) {
        self.completed_focus_count = 0;
        self.focus_sessions_started = 0;
    }

    fn on_session_complete(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        let mut session = self.active_session.take()?;
        self.remaining_seconds = 0;
        self.is_running = false;

        session.completed = true;
        session.completed_at = Some(now);

        if session.session_type == SessionType::Focus {
            self.completed_focus_count = self.completed_focus_count.saturating_add(1);
        }

        let next = self
            .next_after(session.session_type)
            .map(|next_type| self.request_start(next_type));
        Some(Completion { session, next })
    }

    // Reads the already incremented count so the decision and the counter agree.
    fn next_after(&self, completed: SessionType) -> Option<SessionType> {
        if completed != SessionType::Focus || !self.settings.auto_start_breaks {
            return None;
        }
        if self.completed_focus_count >= self.settings.target_focus_sessions {
            Some(SessionType::LongBreak)
        } else {
            Some(SessionType::ShortBreak)
        }
    }

    fn discard_active(&mut self) -> Option<Session> {
        self.remaining_seconds = 0;
        self.is_running = false;
        self.active_session.take()
    }
}

impl Default for FocusScheduler {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}
