use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

/// Sub-folder of the config root holding list-mode directives.
pub const LIST_FOLDER: &str = "list_personalization";

/// Sub-folder of the config root holding command-mode directives.
pub const COMMAND_FOLDER: &str = "command_personalization";

/// File name of the master directive file inside each category folder.
pub const CONTROL_FILE: &str = "control.csv";

// ── Engine config ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root holding `list_personalization/` and `command_personalization/`.
    pub config_root: PathBuf,
    /// Root of the host's source declarations that namespaces mirror.
    pub source_root: PathBuf,
    /// Root receiving generated artifacts; mirrors the namespace hierarchy.
    pub generated_root: PathBuf,
    /// Initial value of the enable flag (the host may flip it later).
    pub enabled: bool,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            config_root: PathBuf::from(env_or("PERSONALIZE_CONFIG_ROOT", "settings")),
            source_root: PathBuf::from(env_or("PERSONALIZE_SOURCE_ROOT", "source")),
            generated_root: PathBuf::from(env_or("PERSONALIZE_GENERATED_ROOT", "generated")),
            enabled: env_bool("PERSONALIZE_ENABLED", false),
        }
    }

    /// Directory holding one category's control and auxiliary files.
    pub fn category_dir(&self, folder: &str) -> PathBuf {
        self.config_root.join(folder)
    }

    /// Path of one category's `control.csv`.
    pub fn control_file(&self, folder: &str) -> PathBuf {
        self.category_dir(folder).join(CONTROL_FILE)
    }

    /// Whether `path` lies under the config root.
    pub fn is_config_path(&self, path: &Path) -> bool {
        path.starts_with(&self.config_root)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Personalization config loaded:");
        tracing::info!("  config_root:    {}", self.config_root.display());
        tracing::info!("  source_root:    {}", self.source_root.display());
        tracing::info!("  generated_root: {}", self.generated_root.display());
        tracing::info!("  enabled:        {}", self.enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_file_paths() {
        let cfg = Config {
            config_root: PathBuf::from("/tmp/settings"),
            source_root: PathBuf::from("/tmp/source"),
            generated_root: PathBuf::from("/tmp/generated"),
            enabled: true,
        };
        assert_eq!(
            cfg.control_file(LIST_FOLDER),
            PathBuf::from("/tmp/settings/list_personalization/control.csv")
        );
        assert!(cfg.is_config_path(Path::new("/tmp/settings/command_personalization/x.csv")));
        assert!(!cfg.is_config_path(Path::new("/tmp/source/apps/terminal.decl")));
    }
}
