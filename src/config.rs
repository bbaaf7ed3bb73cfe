//! Configuration loader and validator for the Canvas assignment dashboard.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub canvas: Canvas,
    #[serde(default)]
    pub courses: Courses,
    #[serde(default)]
    pub app: App,
}

/// Canvas API access for the observer account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Canvas {
    pub base_url: String,
    pub token: String,
    /// Canvas user id of the observed student.
    #[serde(default)]
    pub student_id: String,
}

/// Courses to watch, in display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Courses {
    pub ids: Vec<String>,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    #[serde(default = "default_submission_concurrency")]
    pub submission_concurrency: usize,
}

impl Default for App {
    fn default() -> Self {
        Self {
            submission_concurrency: default_submission_concurrency(),
        }
    }
}

fn default_submission_concurrency() -> usize {
    1
}

impl Config {
    /// Apply `CANVAS_API_TOKEN`, `CANVAS_URL`, `STUDENT_ID` and `COURSE_IDS`
    /// overrides. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("CANVAS_API_TOKEN") {
            self.canvas.token = token;
        }
        if let Some(url) = lookup("CANVAS_URL") {
            self.canvas.base_url = url;
        }
        if let Some(student) = lookup("STUDENT_ID") {
            self.canvas.student_id = student;
        }
        if let Some(ids) = lookup("COURSE_IDS") {
            self.courses.ids = split_course_ids(&ids);
        }
    }
}

/// Split a comma-separated id list, dropping blanks.
pub fn split_course_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load configuration from a YAML file, apply environment overrides and
/// validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = read(path)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Parse the YAML file and apply environment overrides without validating.
pub fn read(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_overrides(|key| std::env::var(key).ok());
    Ok(cfg)
}

/// Check only what is needed to talk to Canvas at all.
pub fn validate_access(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.canvas.token.trim().is_empty() {
        return Err(ConfigError::Invalid("canvas.token must be non-empty"));
    }
    match Url::parse(cfg.canvas.base_url.trim()) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(ConfigError::Invalid("canvas.base_url must be an http(s) URL")),
    }
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    validate_access(cfg)?;
    if cfg.canvas.student_id.trim().is_empty() {
        return Err(ConfigError::Invalid("canvas.student_id must be non-empty"));
    }

    if cfg.courses.ids.is_empty() {
        return Err(ConfigError::Invalid("courses.ids must list at least one course"));
    }
    if cfg.courses.ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ConfigError::Invalid("courses.ids must not contain blank ids"));
    }

    if cfg.app.submission_concurrency == 0 {
        return Err(ConfigError::Invalid("app.submission_concurrency must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the project.
pub fn example() -> &'static str {
    r#"canvas:
  base_url: "https://school.instructure.com"
  token: "YOUR_CANVAS_API_TOKEN"
  student_id: "12345"

courses:
  ids: ["4559", "4579", "4531", "4519", "4900"]
  names:
    "4559": "Algebra II"
    "4579": "Chemistry"
    "4531": "English II"
    "4519": "Spanish II"
    "4900": "Classical Civilizations"

app:
  submission_concurrency: 1
"#
}
