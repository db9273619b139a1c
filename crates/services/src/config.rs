//! Loading research settings from disk.
//!
//! The file uses the same camelCase layout as an exported configuration.
//! Search and reader keys left empty fall back to environment variables.

use anyhow::{Context, Result};
use shared::settings::ResearchSettings;
use std::fs;
use std::path::{Path, PathBuf};

pub const TAVILY_KEY_ENV: &str = "TAVILY_API_KEY";
pub const JINA_KEY_ENV: &str = "JINA_API_KEY";

pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("com.local", "Deep Search", "DeepSearch")
        .map(|p| p.config_dir().join("config.json"))
        .unwrap_or_else(|| PathBuf::from("./deepsearch.json"))
}

/// Read settings from `path` (or the default location). A missing file yields
/// defaults; a malformed one is an error.
pub fn load_settings(path: Option<&Path>) -> Result<ResearchSettings> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    let settings = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        ResearchSettings::default()
    };

    Ok(apply_env_fallbacks(settings, |name| std::env::var(name).ok()))
}

fn apply_env_fallbacks(
    mut settings: ResearchSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> ResearchSettings {
    if settings.tavily_key.trim().is_empty() {
        if let Some(key) = lookup(TAVILY_KEY_ENV) {
            settings.tavily_key = key;
        }
    }
    if settings.jina_key.trim().is_empty() {
        if let Some(key) = lookup(JINA_KEY_ENV) {
            settings.jina_key = key;
        }
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(Some(dir.path().join("absent.json").as_path())).unwrap();
        assert_eq!(settings.cse_spacing_ms, 1100);
        assert!(settings.ai_endpoints.is_empty());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"aiEndpoints\": 5}").unwrap();
        let err = load_settings(Some(path.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
    }

    #[test]
    fn test_env_fallbacks_only_fill_empty_keys() {
        let mut settings = ResearchSettings::default();
        settings.tavily_key = "from-file".into();

        let settings = apply_env_fallbacks(settings, |name| match name {
            TAVILY_KEY_ENV => Some("from-env".into()),
            JINA_KEY_ENV => Some("jina-env".into()),
            _ => None,
        });
        assert_eq!(settings.tavily_key, "from-file");
        assert_eq!(settings.jina_key, "jina-env");
    }
}
