use crate::application::bootstrap::bootstrap_workspace;
use crate::application::controller::SchedulerController;
use crate::application::recommendations::{CarouselKey, RecommendationBoard};
use crate::domain::models::{
    FocusTechnique, SessionHistoryEntry, SessionOutcome, SessionType, TimerSettings,
};
use crate::domain::scheduler::SchedulerSnapshot;
use crate::infrastructure::config::{load_api_config, read_timer_settings, save_timer_settings};
use crate::infrastructure::credential_store::{
    ApiTokenStore, InMemoryApiTokenStore, KeyringApiTokenStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::learning_api_client::{LearningApiClient, ReqwestLearningApiClient};
use crate::infrastructure::session_history_repository::{
    SessionHistoryRepository, SqliteSessionHistoryRepository,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    controller: SchedulerController,
    token_store: Arc<dyn ApiTokenStore>,
    history: Arc<dyn SessionHistoryRepository>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let layout = bootstrap_workspace(&workspace_root)?;
        let api_config = load_api_config(&layout.config_dir)?;
        let token_store: Arc<dyn ApiTokenStore> = match api_config.token {
            Some(token) => Arc::new(InMemoryApiTokenStore::with_token(token)),
            None => Arc::new(KeyringApiTokenStore::default()),
        };
        let api = Arc::new(ReqwestLearningApiClient::new(
            api_config.base_url,
            Arc::clone(&token_store),
        ));
        let history = Arc::new(SqliteSessionHistoryRepository::new(&layout.database_path));
        let settings = read_timer_settings(&layout.config_dir)?;
        let controller = SchedulerController::new(settings, api, history.clone());

        Ok(Self {
            config_dir: layout.config_dir,
            database_path: layout.database_path,
            logs_dir: layout.logs_dir,
            controller,
            token_store,
            history,
            log_guard: Mutex::new(()),
        })
    }

    /// Uses the given backend and never spawns a tick source; callers drive
    /// the countdown through [`SchedulerController::tick`].
    pub fn with_api_client(
        workspace_root: PathBuf,
        api: Arc<dyn LearningApiClient>,
        token_store: Arc<dyn ApiTokenStore>,
    ) -> Result<Self, InfraError> {
        let layout = bootstrap_workspace(&workspace_root)?;
        let history = Arc::new(SqliteSessionHistoryRepository::new(&layout.database_path));
        let settings = read_timer_settings(&layout.config_dir)?;
        let controller = SchedulerController::without_ticker(settings, api, history.clone());

        Ok(Self {
            config_dir: layout.config_dir,
            database_path: layout.database_path,
            logs_dir: layout.logs_dir,
            controller,
            token_store,
            history,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn controller(&self) -> &SchedulerController {
        &self.controller
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// Raw settings form input. Numeric fields arrive as text and are validated
/// before anything is persisted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettingsInput {
    pub focus_duration_minutes: Option<String>,
    pub short_break_minutes: Option<String>,
    pub long_break_minutes: Option<String>,
    pub target_focus_sessions: Option<String>,
    pub auto_start_breaks: Option<bool>,
    pub eye_care_reminders_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryItem {
    pub session_id: String,
    pub session_type: String,
    pub origin: String,
    pub outcome: String,
    pub duration_minutes: u32,
    pub started_at: String,
    pub ended_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryResponse {
    pub start: String,
    pub end: String,
    pub completed_focus_count: u32,
    pub stopped_count: u32,
    pub total_focus_minutes: i64,
    pub sessions: Vec<SessionSummaryItem>,
}

pub async fn get_timer_state_impl(state: &AppState) -> SchedulerSnapshot {
    state.controller.snapshot().await
}

pub async fn start_session_impl(
    state: &AppState,
    session_type: String,
) -> Result<SchedulerSnapshot, InfraError> {
    let session_type = parse_session_type(&session_type)?;
    let snapshot = state.controller.start(session_type).await;
    if let Some(session) = &snapshot.active_session {
        state.log_info(
            "start_session",
            &format!(
                "session_id={} type={} origin={}",
                session.id,
                session_type.as_str(),
                session.origin().as_str()
            ),
        );
    }
    Ok(snapshot)
}

pub async fn pause_timer_impl(state: &AppState) -> SchedulerSnapshot {
    let snapshot = state.controller.pause().await;
    state.log_info(
        "pause_timer",
        &format!("remaining_seconds={}", snapshot.remaining_seconds),
    );
    snapshot
}

pub async fn resume_timer_impl(state: &AppState) -> SchedulerSnapshot {
    let snapshot = state.controller.resume().await;
    state.log_info(
        "resume_timer",
        &format!("remaining_seconds={}", snapshot.remaining_seconds),
    );
    snapshot
}

pub async fn stop_timer_impl(state: &AppState) -> SchedulerSnapshot {
    let snapshot = state.controller.stop().await;
    state.log_info("stop_timer", "stopped");
    snapshot
}

pub async fn reset_counters_impl(state: &AppState) -> SchedulerSnapshot {
    let snapshot = state.controller.reset_counters().await;
    state.log_info("reset_counters", "counters reset");
    snapshot
}

pub async fn get_timer_settings_impl(state: &AppState) -> TimerSettings {
    state.controller.settings().await
}

/// Persists and applies new settings. The running session keeps its duration.
pub async fn update_timer_settings_impl(
    state: &AppState,
    input: TimerSettingsInput,
) -> Result<TimerSettings, InfraError> {
    let current = state.controller.settings().await;
    let settings = TimerSettings {
        focus_duration_minutes: parse_minutes_input(
            input.focus_duration_minutes.as_deref(),
            current.focus_duration_minutes,
            "focusDurationMinutes",
        )?,
        short_break_minutes: parse_minutes_input(
            input.short_break_minutes.as_deref(),
            current.short_break_minutes,
            "shortBreakMinutes",
        )?,
        long_break_minutes: parse_minutes_input(
            input.long_break_minutes.as_deref(),
            current.long_break_minutes,
            "longBreakMinutes",
        )?,
        target_focus_sessions: parse_minutes_input(
            input.target_focus_sessions.as_deref(),
            current.target_focus_sessions,
            "targetFocusSessions",
        )?,
        auto_start_breaks: input.auto_start_breaks.unwrap_or(current.auto_start_breaks),
        eye_care_reminders_enabled: input
            .eye_care_reminders_enabled
            .unwrap_or(current.eye_care_reminders_enabled),
    };

    save_timer_settings(&state.config_dir, &settings)?;
    state.controller.update_settings(settings.clone()).await;
    state.log_info("update_timer_settings", "timer settings saved");
    Ok(settings)
}

pub fn get_recommendations_impl(state: &AppState) -> RecommendationBoard {
    state.controller.recommendations()
}

/// Requests a fresh quote. The board reflects the result once it lands.
pub async fn refresh_motivation_impl(state: &AppState) -> RecommendationBoard {
    let _ = state.controller.refresh_motivational_message().await;
    state.controller.recommendations()
}

pub async fn refresh_ambient_sound_impl(state: &AppState) -> RecommendationBoard {
    let _ = state.controller.refresh_ambient_sound().await;
    state.controller.recommendations()
}

pub fn load_focus_techniques_impl(state: &AppState) -> RecommendationBoard {
    let _ = state.controller.reload_focus_techniques();
    state.controller.recommendations()
}

pub fn cycle_focus_technique_impl(
    state: &AppState,
    direction: String,
) -> Result<Option<FocusTechnique>, InfraError> {
    let key = CarouselKey::parse(&direction).ok_or_else(|| {
        InfraError::InvalidConfig(format!("unsupported carousel direction: {direction}"))
    })?;
    Ok(state.controller.cycle_focus_technique(key))
}

pub fn save_api_token_impl(state: &AppState, token: String) -> Result<bool, InfraError> {
    state.token_store.save_token(&token)?;
    state.log_info("save_api_token", "api token stored");
    Ok(true)
}

pub fn clear_api_token_impl(state: &AppState) -> Result<bool, InfraError> {
    state.token_store.delete_token()?;
    state.log_info("clear_api_token", "api token cleared");
    Ok(true)
}

pub fn get_session_summary_impl(
    state: &AppState,
    start: Option<String>,
    end: Option<String>,
) -> Result<SessionSummaryResponse, InfraError> {
    let start = match start {
        Some(raw) => parse_datetime_input(&raw, "start")?,
        None => Utc::now() - Duration::days(7),
    };
    let end = match end {
        Some(raw) => parse_datetime_input(&raw, "end")?,
        None => Utc::now(),
    };
    if end <= start {
        return Err(InfraError::InvalidConfig(
            "end must be greater than start".to_string(),
        ));
    }

    let entries = state.history.list_between(start, end)?;
    let completed_focus_count = entries
        .iter()
        .filter(|entry| {
            entry.session_type == SessionType::Focus && entry.outcome == SessionOutcome::Completed
        })
        .count() as u32;
    let stopped_count = entries
        .iter()
        .filter(|entry| entry.outcome == SessionOutcome::Stopped)
        .count() as u32;
    let total_focus_minutes = entries
        .iter()
        .filter(|entry| entry.session_type == SessionType::Focus)
        .map(focused_minutes)
        .sum();

    let sessions = entries
        .into_iter()
        .map(|entry| SessionSummaryItem {
            session_id: entry.session_id,
            session_type: entry.session_type.as_str().to_string(),
            origin: entry.origin.as_str().to_string(),
            outcome: entry.outcome.as_str().to_string(),
            duration_minutes: entry.duration_minutes,
            started_at: entry.started_at.to_rfc3339(),
            ended_at: entry.ended_at.to_rfc3339(),
        })
        .collect();

    Ok(SessionSummaryResponse {
        start: start.to_rfc3339(),
        end: end.to_rfc3339(),
        completed_focus_count,
        stopped_count,
        total_focus_minutes,
        sessions,
    })
}

fn focused_minutes(entry: &SessionHistoryEntry) -> i64 {
    let planned = i64::from(entry.duration_minutes);
    match entry.outcome {
        SessionOutcome::Completed => planned,
        SessionOutcome::Stopped => (entry.ended_at - entry.started_at)
            .num_minutes()
            .clamp(0, planned),
    }
}

fn parse_session_type(value: &str) -> Result<SessionType, InfraError> {
    SessionType::parse(value).ok_or_else(|| {
        InfraError::InvalidConfig(format!("unsupported session type: {}", value.trim()))
    })
}

fn parse_minutes_input(
    value: Option<&str>,
    current: u32,
    field_name: &str,
) -> Result<u32, InfraError> {
    let Some(raw) = value else {
        return Ok(current);
    };
    raw.trim().parse::<u32>().map_err(|_| {
        InfraError::InvalidSettings(format!("{field_name} must be a whole number, got '{raw}'"))
    })
}

fn parse_datetime_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    Err(InfraError::InvalidConfig(format!(
        "{field_name} must be RFC3339 or YYYY-MM-DD"
    )))
}
