//! Configuration management for aidb-export
//!
//! Configuration is loaded from `./config/aidb-export.toml`.
//! Defaults live only in the embedded template written by `--init`.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/aidb-export.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/aidb-export.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be at least 1")]
    ZeroValue { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Output file location
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    /// 0 means no cap.
    #[serde(default)]
    pub max_pages: u32,
}

fn default_start_page() -> u32 {
    1
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            start_page: default_start_page(),
            max_pages: 0,
        }
    }
}

impl PaginationConfig {
    pub fn page_cap(&self) -> Option<u32> {
        (self.max_pages > 0).then_some(self.max_pages)
    }
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_pages: Option<u32>,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded template, for runs without a config file.
    pub fn builtin() -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command line overrides and re-validates.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(base_url) = overrides.base_url {
            self.http.base_url = base_url;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.export.output_dir = output_dir;
        }
        if let Some(max_pages) = overrides.max_pages {
            self.pagination.max_pages = max_pages;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.accept.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.accept".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        let base_ok = Url::parse(&self.http.base_url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !base_ok {
            return Err(ConfigError::InvalidUrl {
                field: "http.base_url".to_string(),
                url: self.http.base_url.clone(),
            });
        }

        if self.export.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "export.output_dir".to_string(),
            });
        }
        if self.export.file_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "export.file_prefix".to_string(),
            });
        }

        if self.pagination.start_page == 0 {
            return Err(ConfigError::ZeroValue {
                field: "pagination.start_page".to_string(),
            });
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
[http]
base_url = "https://listing.test/companies"
user_agent = "test/1.0"
accept = "text/html"
request_timeout_secs = 5

[export]
output_dir = "out"
file_prefix = "export"
"#;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::builtin().unwrap();
        assert_eq!(config.export.output_dir, PathBuf::from("ai_database_exports"));
        assert_eq!(config.export.file_prefix, "ai_database_export");
        assert_eq!(config.pagination.start_page, 1);
        assert_eq!(config.pagination.page_cap(), None);
    }

    #[test]
    fn test_pagination_section_is_optional() {
        let config: AppConfig = toml::from_str(MINIMAL).expect("Config should parse");
        assert_eq!(config.pagination.start_page, 1);
        assert_eq!(config.pagination.max_pages, 0);
        assert!(!config.http.accept_invalid_certs);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.http.base_url = "ftp://listing.test".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        config.http.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_rejects_empty_and_zero_fields() {
        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.http.user_agent.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRequired { .. })));

        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.http.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroValue { .. })));

        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.pagination.start_page = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroValue { .. })));

        let mut config: AppConfig = toml::from_str(MINIMAL).unwrap();
        config.export.file_prefix = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRequired { .. })));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        let config = config
            .with_overrides(ConfigOverrides {
                base_url: Some("http://127.0.0.1:9000/list".to_string()),
                output_dir: Some(PathBuf::from("elsewhere")),
                max_pages: Some(3),
            })
            .unwrap();

        assert_eq!(config.http.base_url, "http://127.0.0.1:9000/list");
        assert_eq!(config.export.output_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.pagination.page_cap(), Some(3));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        let result = config.with_overrides(ConfigOverrides {
            base_url: Some("nope".to_string()),
            ..ConfigOverrides::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_create_and_load_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("aidb-export.toml");

        AppConfig::create_default_config_at(&path).unwrap();
        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.http.base_url, "http://51.12.241.183");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
