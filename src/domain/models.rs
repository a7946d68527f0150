use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub const LOCAL_SESSION_PREFIX: &str = "local-";

static NEXT_LOCAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub const FOCUS_MINUTES_RANGE: (u32, u32) = (15, 60);
pub const SHORT_BREAK_MINUTES_RANGE: (u32, u32) = (3, 10);
pub const LONG_BREAK_MINUTES_RANGE: (u32, u32) = (10, 30);
pub const TARGET_FOCUS_SESSIONS_RANGE: (u32, u32) = (1, 20);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        }
    }

    /// Path segment under `/timer/` used by the backend.
    pub fn endpoint_segment(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "break",
            Self::LongBreak => "long-break",
        }
    }

    /// Tag sent to the ambient-sound and motivational-message feeds.
    pub fn recommendation_tag(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak | Self::LongBreak => "relax",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "focus" => Some(Self::Focus),
            "short_break" | "short-break" | "break" | "short" => Some(Self::ShortBreak),
            "long_break" | "long-break" | "long" => Some(Self::LongBreak),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    pub focus_duration_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub auto_start_breaks: bool,
    pub target_focus_sessions: u32,
    pub eye_care_reminders_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_duration_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            auto_start_breaks: true,
            target_focus_sessions: 4,
            eye_care_reminders_enabled: true,
        }
    }
}

impl TimerSettings {
    pub fn duration_for(&self, session_type: SessionType) -> u32 {
        match session_type {
            SessionType::Focus => self.focus_duration_minutes,
            SessionType::ShortBreak => self.short_break_minutes,
            SessionType::LongBreak => self.long_break_minutes,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_range(
            self.focus_duration_minutes,
            FOCUS_MINUTES_RANGE,
            "settings.focus_duration_minutes",
        )?;
        validate_range(
            self.short_break_minutes,
            SHORT_BREAK_MINUTES_RANGE,
            "settings.short_break_minutes",
        )?;
        validate_range(
            self.long_break_minutes,
            LONG_BREAK_MINUTES_RANGE,
            "settings.long_break_minutes",
        )?;
        validate_range(
            self.target_focus_sessions,
            TARGET_FOCUS_SESSIONS_RANGE,
            "settings.target_focus_sessions",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl Session {
    /// Id is `local-<unix millis>-<sequence>`; the sequence keeps sessions
    /// created within the same millisecond apart.
    pub fn local(session_type: SessionType, duration_minutes: u32, now: DateTime<Utc>) -> Self {
        let sequence = NEXT_LOCAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{LOCAL_SESSION_PREFIX}{}-{sequence}", now.timestamp_millis()),
            session_type,
            duration_minutes,
            started_at: now,
            completed_at: None,
            completed: false,
        }
    }

    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_SESSION_PREFIX)
    }

    pub fn origin(&self) -> SessionOrigin {
        if self.is_local() {
            SessionOrigin::Local
        } else {
            SessionOrigin::Remote
        }
    }

    pub fn total_seconds(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "session.id")?;
        if self.duration_minutes == 0 {
            return Err("session.duration_minutes must be > 0".to_string());
        }
        if let Some(completed_at) = self.completed_at {
            if completed_at < self.started_at {
                return Err("session.completed_at must be >= session.started_at".to_string());
            }
            if !self.completed {
                return Err("session.completed_at requires session.completed".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    Remote,
    Local,
}

impl SessionOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "remote" => Some(Self::Remote),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Stopped,
}

impl SessionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(Self::Completed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistoryEntry {
    pub session_id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub origin: SessionOrigin,
    pub duration_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: SessionOutcome,
}

impl SessionHistoryEntry {
    pub fn from_session(session: &Session, outcome: SessionOutcome, ended_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id.clone(),
            session_type: session.session_type,
            origin: session.origin(),
            duration_minutes: session.duration_minutes,
            started_at: session.started_at,
            ended_at,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AmbientSound {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MotivationalMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FocusTechnique {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_range(value: u32, (min, max): (u32, u32), field_name: &str) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("{field_name} must be between {min} and {max}"));
    }
    Ok(())
}
