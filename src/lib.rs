pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_support;

use application::commands::{
    clear_api_token_impl, cycle_focus_technique_impl, get_recommendations_impl,
    get_session_summary_impl, get_timer_settings_impl, get_timer_state_impl,
    load_focus_techniques_impl, pause_timer_impl, refresh_ambient_sound_impl,
    refresh_motivation_impl, reset_counters_impl, resume_timer_impl, save_api_token_impl,
    start_session_impl, stop_timer_impl, update_timer_settings_impl, AppState,
    TimerSettingsInput,
};
use infrastructure::error::InfraError;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub use application::controller::SchedulerController;
pub use domain::models::{Session, SessionType, TimerSettings};
pub use domain::scheduler::{FocusScheduler, SchedulerSnapshot};

const HELP: &str = "commands: focus | short | long | pause | resume | stop | reset | status | \
next | prev | motivate | sound | board | techniques | summary | settings | \
set <focus|short|long|target|auto|eyecare> <value> | token <value> | token-clear | quit";

enum DriverReply {
    Output(serde_json::Value),
    Quit,
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, InfraError> {
    Ok(serde_json::to_value(value)?)
}

fn settings_input(field: &str, value: &str) -> Result<TimerSettingsInput, InfraError> {
    let mut input = TimerSettingsInput::default();
    let value = value.to_string();
    match field {
        "focus" => input.focus_duration_minutes = Some(value),
        "short" => input.short_break_minutes = Some(value),
        "long" => input.long_break_minutes = Some(value),
        "target" => input.target_focus_sessions = Some(value),
        "auto" => input.auto_start_breaks = Some(parse_switch(field, &value)?),
        "eyecare" => input.eye_care_reminders_enabled = Some(parse_switch(field, &value)?),
        other => {
            return Err(InfraError::InvalidSettings(format!(
                "unknown setting: {other}"
            )));
        }
    }
    Ok(input)
}

fn parse_switch(field: &str, value: &str) -> Result<bool, InfraError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(InfraError::InvalidSettings(format!(
            "{field} must be on or off, got '{value}'"
        ))),
    }
}

async fn dispatch(state: &AppState, line: &str) -> Result<DriverReply, InfraError> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_ascii_lowercase();
    let args = words.collect::<Vec<_>>();
    let output = match (command.as_str(), args.as_slice()) {
        ("focus" | "short" | "long", []) => {
            to_json(&start_session_impl(state, command.clone()).await?)?
        }
        ("pause", []) => to_json(&pause_timer_impl(state).await)?,
        ("resume", []) => to_json(&resume_timer_impl(state).await)?,
        ("stop", []) => to_json(&stop_timer_impl(state).await)?,
        ("reset", []) => to_json(&reset_counters_impl(state).await)?,
        ("status", []) => to_json(&get_timer_state_impl(state).await)?,
        ("next", []) => to_json(&cycle_focus_technique_impl(state, "right".to_string())?)?,
        ("prev", []) => to_json(&cycle_focus_technique_impl(state, "left".to_string())?)?,
        ("motivate", []) => to_json(&refresh_motivation_impl(state).await)?,
        ("sound", []) => to_json(&refresh_ambient_sound_impl(state).await)?,
        ("board", []) => to_json(&get_recommendations_impl(state))?,
        ("techniques", []) => to_json(&load_focus_techniques_impl(state))?,
        ("summary", []) => to_json(&get_session_summary_impl(state, None, None)?)?,
        ("settings", []) => to_json(&get_timer_settings_impl(state).await)?,
        ("set", [field, value]) => {
            let input = settings_input(&field.to_ascii_lowercase(), value)?;
            to_json(&update_timer_settings_impl(state, input).await?)?
        }
        ("token", [token]) => to_json(&save_api_token_impl(state, token.to_string())?)?,
        ("token-clear", []) => to_json(&clear_api_token_impl(state)?)?,
        ("quit" | "exit", []) => return Ok(DriverReply::Quit),
        _ => serde_json::json!({ "help": HELP }),
    };
    Ok(DriverReply::Output(output))
}

/// Headless driver: one command per stdin line, one JSON document per reply.
pub async fn run() -> Result<(), InfraError> {
    let workspace_root = std::env::current_dir()?;
    let state = AppState::new(workspace_root)?;
    log::info!("focusroom ready, database at {}", state.database_path().display());

    let _ = state.controller().mount();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let output = match dispatch(&state, &line).await {
            Ok(DriverReply::Output(value)) => value,
            Ok(DriverReply::Quit) => break,
            Err(error) => serde_json::json!({ "error": state.command_error(line.trim(), &error) }),
        };
        stdout.write_all(format!("{output}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    state.controller().unmount().await;
    log::info!("focusroom shutting down");
    Ok(())
}
