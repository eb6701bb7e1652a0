use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use reqwest::Url;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://shoob.gg/cards";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_url: String,
    pub start_page: u32,
    pub end_page: Option<u32>,
    pub output_folder: PathBuf,
    pub page_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            start_page: 1,
            end_page: None,
            output_folder: "scraped_data".into(),
            page_delay_ms: 1000,
            request_timeout_secs: 30,
            max_retries: 3,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Config {
    /// Reads a JSON configuration file. Without a path the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https: {url}"
            )));
        }
        check_range(self.start_page, self.end_page)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {:?}: {e}", self.base_url)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The page range and flags of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub start: u32,
    /// `None` runs until the site stops returning cards. Failed pages are
    /// skipped, not treated as the end, so a run against an unreachable site
    /// only ends when cancelled.
    pub end: Option<u32>,
    pub resume: bool,
    pub page_delay: Duration,
}

impl Plan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start: config.start_page,
            end: config.end_page,
            resume: false,
            page_delay: Duration::from_millis(config.page_delay_ms),
        }
    }

    /// Applies command line overrides on top of the configured range.
    pub fn with_overrides(
        mut self,
        start: Option<u32>,
        end: Option<u32>,
        resume: bool,
    ) -> Result<Self, ConfigError> {
        if let Some(start) = start {
            self.start = start;
        }
        if end.is_some() {
            self.end = end;
        }
        self.resume = resume;
        check_range(self.start, self.end)?;
        Ok(self)
    }
}

fn check_range(start: u32, end: Option<u32>) -> Result<(), ConfigError> {
    if start == 0 {
        return Err(ConfigError::Invalid("start page must be at least 1".into()));
    }
    match end {
        Some(end) if end < start => Err(ConfigError::Invalid(format!(
            "end page {end} is before start page {start}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.start_page, 1);
        assert_eq!(config.end_page, None);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "end_page": 12, "output_folder": "out" }"#).unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.end_page, Some(12));
        assert_eq!(config.output_folder, PathBuf::from("out"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(dir.path().join("missing.json").as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "{err:?}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "start": 3 }"#).unwrap();

        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn bad_values_fail_validation() {
        let config = Config {
            base_url: "ftp://shoob.gg".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            start_page: 5,
            end_page: Some(4),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            start_page: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_replace_only_what_is_given() {
        let config = Config {
            start_page: 2,
            end_page: Some(9),
            page_delay_ms: 0,
            ..Default::default()
        };

        let plan = Plan::from_config(&config)
            .with_overrides(None, Some(4), true)
            .unwrap();
        assert_eq!(
            plan,
            Plan {
                start: 2,
                end: Some(4),
                resume: true,
                page_delay: Duration::ZERO,
            }
        );

        let err = Plan::from_config(&config)
            .with_overrides(Some(10), None, false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
