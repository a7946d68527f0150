use crate::infrastructure::config::{ensure_default_configs, load_configs};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_history_repository::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE: &str = "focusroom.sqlite";

#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

impl WorkspaceLayout {
    pub fn under(workspace_root: &Path) -> Self {
        Self {
            workspace_root: workspace_root.to_path_buf(),
            config_dir: workspace_root.join("config"),
            logs_dir: workspace_root.join("logs"),
            database_path: workspace_root.join("state").join(DATABASE_FILE),
        }
    }
}

/// Creates `config/`, `state/` and `logs/`, writes missing default configs and
/// migrates the history database. Safe to call on an existing workspace.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<WorkspaceLayout, InfraError> {
    let layout = WorkspaceLayout::under(workspace_root);
    fs::create_dir_all(&layout.config_dir)?;
    fs::create_dir_all(&layout.logs_dir)?;
    if let Some(state_dir) = layout.database_path.parent() {
        fs::create_dir_all(state_dir)?;
    }

    ensure_default_configs(&layout.config_dir)?;
    load_configs(&layout.config_dir)?;
    initialize_database(&layout.database_path)?;

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_idempotent() {
        let root = std::env::temp_dir().join(format!("focusroom-bootstrap-{}", std::process::id()));
        let first = bootstrap_workspace(&root).expect("first bootstrap");
        let timer_json = fs::read_to_string(first.config_dir.join("timer.json")).expect("timer.json");

        let second = bootstrap_workspace(&root).expect("second bootstrap");
        assert_eq!(first.database_path, second.database_path);
        assert!(second.database_path.ends_with("state/focusroom.sqlite"));
        assert!(second.logs_dir.is_dir());
        assert_eq!(
            fs::read_to_string(second.config_dir.join("timer.json")).expect("timer.json"),
            timer_json
        );

        let _ = fs::remove_dir_all(&root);
    }
}
