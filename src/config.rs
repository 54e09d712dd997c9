//! Configuration handling for the form

use crate::remote::DEFAULT_BASE_URL;
use crate::state::{CriteriaMode, FormOptions, ReValidateMode, ValidationMode};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the user directory URL
const API_URL_ENV: &str = "YOUTUBE_FORM_API_URL";

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// User configuration, every field optional
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FormConfig {
    /// Base URL of the user directory
    pub api_base_url: Option<String>,
    /// Timeout applied to every remote request
    pub request_timeout_secs: Option<u64>,
    /// When fields validate before the first submission
    pub mode: Option<ValidationMode>,
    /// When fields re-validate after a submission
    pub re_validate_mode: Option<ReValidateMode>,
    pub criteria_mode: Option<CriteriaMode>,
    /// Reset the form after a successful submission
    pub reset_on_success: Option<bool>,
}

impl FormConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "youtube-form", "youtube-form")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: FormConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Base URL, with the environment taking precedence over the file
    pub fn api_base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn form_options(&self) -> FormOptions {
        FormOptions {
            mode: self.mode.unwrap_or_default(),
            re_validate_mode: self.re_validate_mode.unwrap_or_default(),
            criteria_mode: self.criteria_mode.unwrap_or_default(),
        }
    }

    pub fn reset_on_success(&self) -> bool {
        self.reset_on_success.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = FormConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.form_options(), FormOptions::default());
        assert!(config.reset_on_success());
    }

    #[test]
    fn test_modes_use_camel_case_names() {
        let json = r#"{"mode": "onTouched", "re_validate_mode": "onBlur", "criteria_mode": "all"}"#;
        let parsed: FormConfig = serde_json::from_str(json).unwrap();
        let options = parsed.form_options();
        assert_eq!(options.mode, ValidationMode::OnTouched);
        assert_eq!(options.re_validate_mode, ReValidateMode::OnBlur);
        assert_eq!(options.criteria_mode, CriteriaMode::All);
    }

    #[test]
    fn test_partial_serialization() {
        let config = FormConfig {
            request_timeout_secs: Some(2),
            reset_on_success: Some(false),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: FormConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_timeout(), Duration::from_secs(2));
        assert!(!parsed.reset_on_success());
        assert!(parsed.mode.is_none());
    }

    #[test]
    fn test_deserialize_with_extra_fields() {
        let json = r#"{"api_base_url": "http://localhost:3000", "unknown_field": "value"}"#;
        let parsed: FormConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.api_base_url.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_load_from_reports_invalid_file() {
        let path = std::env::temp_dir().join(format!("youtube-form-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{ not json").unwrap();
        let result = FormConfig::load_from(&path);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
