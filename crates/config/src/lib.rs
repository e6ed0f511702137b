use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory whose `todos/` subfolder holds the goal files.
    /// Overridden at runtime by the `DAYOKR_WORKSPACE` environment variable
    /// when set.
    pub path: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriterConfig {
    /// Default state of the save-time rewrite toggle.  The user can still
    /// flip it per save.
    pub enabled: bool,
    /// Bearer credential for the rewrite endpoint.  Can also be set via
    /// `DAYOKR_API_KEY` (env takes precedence).  Empty means rewriting is
    /// skipped with a warning.
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Bound on one rewrite round trip.  A save never waits longer than
    /// this per key result.
    pub timeout_secs: u64,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            api_url: "https://api.siliconflow.cn/v1/chat/completions".to_string(),
            model: "Pro/deepseek-ai/DeepSeek-V3".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Redraw tick in milliseconds for the interactive checklist.
    pub tick_ms: u64,
    /// Color theme name, e.g. "catppuccin-mocha", "tokyo-night", "nord".
    pub theme: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            theme: "catppuccin-mocha".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub rewriter: RewriterConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(key) = env::var("DAYOKR_API_KEY") {
            if !key.is_empty() {
                config.rewriter.api_key = key;
            }
        }

        if let Ok(dir) = env::var("DAYOKR_WORKSPACE") {
            if !dir.is_empty() {
                config.workspace.path = dir;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// True when the save flow should attempt rewriting by default.
    pub fn rewrite_by_default(&self) -> bool {
        self.rewriter.enabled
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.workspace.path, ".");
        assert!(!cfg.rewriter.enabled);
        assert!(cfg.rewriter.api_key.is_empty());
        assert_eq!(
            cfg.rewriter.api_url,
            "https://api.siliconflow.cn/v1/chat/completions"
        );
        assert_eq!(cfg.rewriter.model, "Pro/deepseek-ai/DeepSeek-V3");
        assert_eq!(cfg.rewriter.timeout_secs, 30);
        assert_eq!(cfg.ui.tick_ms, 250);
        assert_eq!(cfg.ui.theme, "catppuccin-mocha");
    }

    // ── load_from ──────────────────────────────────────────────────────────

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(cfg.workspace.path, ".");
        assert!(!cfg.rewriter.enabled);
    }

    #[test]
    fn load_from_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.toml");
        fs::write(
            &path,
            r#"
[workspace]
path = "/home/me/daily"

[rewriter]
enabled = true
api_key = "sk-test"
model = "deepseek-ai/DeepSeek-V2.5"
timeout_secs = 10

[ui]
tick_ms = 100
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.workspace.path, "/home/me/daily");
        assert!(cfg.rewriter.enabled);
        assert_eq!(cfg.rewriter.api_key, "sk-test");
        assert_eq!(cfg.rewriter.model, "deepseek-ai/DeepSeek-V2.5");
        assert_eq!(cfg.rewriter.timeout_secs, 10);
        assert_eq!(cfg.ui.tick_ms, 100);
        // Unspecified fields keep their defaults.
        assert_eq!(
            cfg.rewriter.api_url,
            "https://api.siliconflow.cn/v1/chat/completions"
        );
    }

    #[test]
    fn load_from_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[rewriter]\nenabled = true\n").unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert!(cfg.rewriter.enabled);
        assert_eq!(cfg.workspace.path, ".");
        assert_eq!(cfg.ui.tick_ms, 250);
    }

    #[test]
    fn load_from_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    // ── save_to + roundtrip ────────────────────────────────────────────────

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/config.toml");

        let mut cfg = AppConfig::default();
        cfg.workspace.path = "/tmp/goals".to_string();
        cfg.rewriter.enabled = true;
        cfg.rewriter.api_key = "sk-roundtrip".to_string();
        cfg.ui.tick_ms = 500;

        cfg.save_to(&path).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.workspace.path, "/tmp/goals");
        assert!(loaded.rewriter.enabled);
        assert_eq!(loaded.rewriter.api_key, "sk-roundtrip");
        assert_eq!(loaded.ui.tick_ms, 500);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/config.toml");
        AppConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    // ── Env var overrides ──────────────────────────────────────────────────

    #[test]
    fn env_api_key_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        fs::write(&path, "[rewriter]\napi_key = \"from-file\"\n").unwrap();

        // SAFETY: test is single-threaded for this env var.
        unsafe { env::set_var("DAYOKR_API_KEY", "from-env") };
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.rewriter.api_key, "from-env");
        unsafe { env::remove_var("DAYOKR_API_KEY") };
    }

    #[test]
    fn env_workspace_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.toml");
        fs::write(&path, "[workspace]\npath = \"/from/file\"\n").unwrap();

        // SAFETY: test is single-threaded for this env var.
        unsafe { env::set_var("DAYOKR_WORKSPACE", "/from/env") };
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.workspace.path, "/from/env");
        unsafe { env::remove_var("DAYOKR_WORKSPACE") };
    }
}
